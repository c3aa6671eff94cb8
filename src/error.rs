// Copyright 2025 Chisomo Makombo Sakala
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error enum for the labberize library.
#[derive(Error, Debug)]
pub enum LabberizeError {
  #[error("Settings document error")]
  Settings(#[from] SettingsError),

  #[error("Node tree error")]
  Node(#[from] NodeError),

  #[error("Export failed")]
  Export(#[from] ExportError),

  #[error("Configuration error")]
  Config(#[from] ConfigError),

  #[error("Failed to read {path}")]
  ReadInput {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JSON serialization/deserialization error: {0}")]
  Json(#[from] serde_json::Error),
}

/// Structural errors in the override document (src/settings.rs).
///
/// Every variant is fatal for a generation run.
#[derive(Error, Debug)]
pub enum SettingsError {
  #[error("Failed to parse settings document")]
  Parse(#[from] serde_json::Error),

  #[error("Settings document must be a JSON object")]
  NotAnObject,

  #[error("Settings document is missing required key '{key}'")]
  MissingKey { key: String },

  #[error("Settings key '{key}' must be a string")]
  InvalidVersion { key: String },

  #[error("Invalid settings section '{key}'")]
  InvalidSection {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("Invalid glob pattern '{pattern}' under '{key}'")]
  InvalidPattern {
    key: String,
    pattern: String,
    #[source]
    source: regex::Error,
  },
}

/// Errors related to node-tree records (src/node.rs).
#[derive(Error, Debug)]
pub enum NodeError {
  #[error("Node '{node}' is missing required field '{field}'")]
  MissingField { node: String, field: &'static str },

  #[error("Node '{node}' has an empty path")]
  EmptyPath { node: String },

  #[error("Failed to parse node tree")]
  ParseTree(#[from] serde_json::Error),
}

/// Errors related to writing driver files (src/export.rs).
#[derive(Error, Debug)]
pub enum ExportError {
  #[error("Driver file already exists: {0}. Pass --upgrade to regenerate it.")]
  DriverExists(PathBuf),

  #[error("Failed to create output directory: {path}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to write {path}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to serialize driver")]
  Serialize(#[from] serde_json::Error),
}

/// Errors related to configuration resolution (src/config.rs).
#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to load configuration: {0}")]
  Figment(Box<figment::Error>),

  #[error("Configuration file not found: {}", .0.display())]
  MissingFile(PathBuf),
}

impl From<figment::Error> for ConfigError {
  fn from(err: figment::Error) -> Self {
    Self::Figment(Box::new(err))
  }
}

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
use crate::export::OutputFormat;
use crate::generator::IndexEntry;
use crate::settings::Mode;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about = "Labber driver generator for instrument node trees")]
pub struct Cli {
  #[command(subcommand)]
  pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
  /// Generate a driver file and its connection settings for one device.
  Generate(GenerateArgs),

  /// Print every concrete path a wildcard template expands to.
  Expand {
    /// JSON node tree of the device.
    #[arg(long)]
    nodes: PathBuf,

    /// Template with one `*` per index, e.g. 'qachannels/*/generator/waveforms/*/wave'.
    #[arg(long)]
    pattern: String,

    /// Comma-separated cardinality per wildcard: 'dev' or a count. Missing entries are 'dev'.
    #[arg(long, value_delimiter = ',')]
    indexes: Vec<IndexEntry>,
  },
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
  /// JSON node tree of the device.
  #[arg(long)]
  pub nodes: PathBuf,

  /// Settings document with overrides and extensions.
  #[arg(long)]
  pub settings: PathBuf,

  /// Device type, e.g. 'SHFQA4'.
  #[arg(long)]
  pub device: String,

  /// Which ignore lists apply.
  #[arg(long, value_enum)]
  pub mode: Option<Mode>,

  /// Driver file format.
  #[arg(long, value_enum)]
  pub format: Option<OutputFormat>,

  /// Replaces '/' in titles, sections and groups.
  #[arg(long)]
  pub delimiter: Option<String>,

  /// Directory the driver and settings files are written to.
  #[arg(long)]
  pub output_dir: Option<PathBuf>,

  /// Data server host recorded in the connection settings.
  #[arg(long)]
  pub host: Option<String>,

  /// Data server port recorded in the connection settings.
  #[arg(long)]
  pub port: Option<u16>,

  /// Regenerate an existing driver file in place.
  #[arg(long)]
  pub upgrade: bool,

  /// Rewrite the connection settings file even if it exists.
  #[arg(long)]
  pub overwrite_settings: bool,

  /// TOML configuration file. Defaults to './labberize.toml' when present.
  #[arg(long, env = "LABBERIZE_CONFIG")]
  pub config: Option<PathBuf>,
}

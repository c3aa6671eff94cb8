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
use crate::cli::GenerateArgs;
use crate::error::ConfigError;
use crate::export::ExportOptions;
use crate::export::OutputFormat;
use crate::settings::Mode;
use figment::Figment;
use figment::providers::Env;
use figment::providers::Format;
use figment::providers::Serialized;
use figment::providers::Toml;
use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "labberize.toml";
const ENV_PREFIX: &str = "LABBERIZE_";

// --- Default Values ---
fn default_delimiter() -> String {
  " - ".to_string()
}

fn default_output_dir() -> PathBuf {
  PathBuf::from(".")
}

fn default_host() -> String {
  "localhost".to_string()
}

fn default_port() -> u16 {
  8004
}

/// Settings that may come from the config file, the environment or flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layered {
  #[serde(default)]
  pub mode: Mode,
  #[serde(default)]
  pub format: OutputFormat,
  #[serde(default = "default_delimiter")]
  pub delimiter: String,
  #[serde(default = "default_output_dir")]
  pub output_dir: PathBuf,
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
}

impl Default for Layered {
  fn default() -> Self {
    Self {
      mode: Mode::default(),
      format: OutputFormat::default(),
      delimiter: default_delimiter(),
      output_dir: default_output_dir(),
      host: default_host(),
      port: default_port(),
    }
  }
}

/// Flags given on the command line; only those present override.
#[derive(Debug, Default, Serialize)]
struct FlagOverrides {
  #[serde(skip_serializing_if = "Option::is_none")]
  mode: Option<Mode>,
  #[serde(skip_serializing_if = "Option::is_none")]
  format: Option<OutputFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  delimiter: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  output_dir: Option<PathBuf>,
  #[serde(skip_serializing_if = "Option::is_none")]
  host: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  port: Option<u16>,
}

/// Fully resolved configuration for one `generate` run.
#[derive(Debug, Clone)]
pub struct Config {
  pub nodes: PathBuf,
  pub settings: PathBuf,
  pub device: String,
  pub mode: Mode,
  pub host: String,
  pub port: u16,
  pub export: ExportOptions,
}

/// Defaults, then the TOML file, then `LABBERIZE_*` variables.
/// Defaults, then the TOML file, then `LABBERIZE_` variables.
///
/// `labberize.toml` is optional, but a file named explicitly must exist.
pub fn layered_figment(config_file: Option<PathBuf>) -> Result<Figment, ConfigError> {
  let file = match config_file {
    Some(path) if !path.is_file() => return Err(ConfigError::MissingFile(path)),
    Some(path) => path,
    None => PathBuf::from(DEFAULT_CONFIG_FILE),
  };
  Ok(
    Figment::from(Serialized::defaults(Layered::default()))
      .merge(Toml::file(file))
      .merge(Env::prefixed(ENV_PREFIX).only(&["mode", "format", "delimiter", "output_dir", "host", "port"])),
  )
}

impl TryFrom<GenerateArgs> for Config {
  type Error = ConfigError;

  fn try_from(
    GenerateArgs {
      nodes,
      settings,
      device,
      mode,
      format,
      delimiter,
      output_dir,
      host,
      port,
      upgrade,
      overwrite_settings,
      config,
    }: GenerateArgs,
  ) -> Result<Self, Self::Error> {
    let flags = FlagOverrides {
      mode,
      format,
      delimiter,
      output_dir,
      host,
      port,
    };
    let layered: Layered = layered_figment(config)?
      .merge(Serialized::defaults(flags))
      .extract()?;

    tracing::debug!(?layered, "Resolved configuration");

    Ok(Config {
      nodes,
      settings,
      device,
      mode: layered.mode,
      host: layered.host,
      port: layered.port,
      export: ExportOptions {
        output_dir: layered.output_dir,
        format: layered.format,
        delimiter: layered.delimiter,
        upgrade,
        overwrite_settings,
      },
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn explicit_config_file_must_exist() {
    let missing = PathBuf::from("does/not/exist/labberize.toml");
    assert!(matches!(
      layered_figment(Some(missing.clone())),
      Err(ConfigError::MissingFile(path)) if path == missing
    ));
  }

  #[test]
  fn default_config_file_is_optional() {
    let layered: Layered = layered_figment(None).unwrap().extract().unwrap();
    assert_eq!(layered.port, 8004);
    assert_eq!(layered.delimiter, " - ");
  }
}

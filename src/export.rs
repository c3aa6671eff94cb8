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
use crate::config::Config;
use crate::error::ExportError;
use crate::error::LabberizeError;
use crate::helpers::segments;
use crate::labber_config::LabberConfig;
use crate::labber_config::LabberDriver;
use crate::node::NodeTree;
use crate::quant::QuantDefinition;
use crate::settings::SettingsDocument;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;

/// File format of the generated driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
  #[default]
  Ini,
  Json,
}

impl OutputFormat {
  pub fn extension(&self) -> &'static str {
    match self {
      OutputFormat::Ini => "ini",
      OutputFormat::Json => "json",
    }
  }
}

/// Connection parameters needed to reopen the same target at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
  pub host: String,
  pub port: u16,
  pub device: String,
  pub family: String,
  pub base_type: String,
}

/// Where and how to write a driver.
#[derive(Debug, Clone)]
pub struct ExportOptions {
  pub output_dir: PathBuf,
  pub format: OutputFormat,
  pub delimiter: String,
  /// Regenerate an existing driver file in place.
  pub upgrade: bool,
  /// Rewrite the connection settings file even if it exists.
  pub overwrite_settings: bool,
}

/// What an export wrote.
#[derive(Debug, Clone)]
pub struct ExportReport {
  pub driver_path: PathBuf,
  pub settings_path: PathBuf,
  pub settings_written: bool,
}

/// Capitalizes all-lowercase segments; anything with an uppercase letter
/// is an acronym or deliberate spelling and stays untouched.
pub fn title_case(segment: &str) -> String {
  if segment.chars().any(char::is_uppercase) {
    return segment.to_string();
  }
  let mut chars = segment.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// Renders a driver as the host platform's INI file.
#[derive(Debug, Clone)]
pub struct IniWriter<'a> {
  delimiter: &'a str,
}

impl<'a> IniWriter<'a> {
  pub fn new(delimiter: &'a str) -> Self {
    Self { delimiter }
  }

  /// A slash path in display form: `qachannels/0/centerfreq` becomes
  /// `Qachannels - 0 - Centerfreq` with the default delimiter.
  pub fn display_path(&self, path: &str) -> String {
    segments(path)
      .into_iter()
      .map(title_case)
      .collect::<Vec<_>>()
      .join(self.delimiter)
  }

  pub fn render(&self, driver: &LabberDriver) -> String {
    let mut out = String::new();
    out.push_str("[General settings]\n");
    for (key, value) in &driver.general {
      push_field(&mut out, key, value);
    }
    for quant in driver.quants.values() {
      out.push('\n');
      self.render_quant(&mut out, quant);
    }
    out
  }

  fn render_quant(&self, out: &mut String, quant: &QuantDefinition) {
    out.push_str(&format!("[{}]\n", self.display_path(&quant.title)));
    push_field(out, "label", &quant.label);
    push_field(out, "datatype", quant.datatype.as_str());
    if let Some(unit) = &quant.unit {
      push_field(out, "unit", unit);
    }
    push_field(out, "permission", quant.permission.as_str());
    if let Some(set_cmd) = &quant.set_cmd {
      push_field(out, "set_cmd", set_cmd);
    }
    if let Some(get_cmd) = &quant.get_cmd {
      push_field(out, "get_cmd", get_cmd);
    }
    push_field(out, "section", &self.display_path(&quant.section));
    push_field(out, "group", &self.display_path(&quant.group));
    push_field(out, "tooltip", &quant.tooltip);
    for (i, option) in quant.combo_options.iter().enumerate() {
      push_field(out, &format!("combo_def_{}", i + 1), &option.label);
      push_field(out, &format!("cmd_def_{}", i + 1), &option.code);
    }
    if let Some(show) = quant.show_in_measurement_dialog {
      push_field(out, "show_in_measurement_dialog", if show { "True" } else { "False" });
    }
    if let Some(x_name) = &quant.x_name {
      push_field(out, "x_name", x_name);
    }
    if let Some(x_unit) = &quant.x_unit {
      push_field(out, "x_unit", x_unit);
    }
    for (key, value) in &quant.extra {
      push_field(out, key, value);
    }
  }
}

/// Empty values are left out entirely. Line breaks inside a value are
/// folded into single spaces so every field stays on one line.
fn push_field(out: &mut String, key: &str, value: &str) {
  let value = value
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .collect::<Vec<_>>()
    .join(" ");
  if !value.is_empty() {
    out.push_str(&format!("{key} = {value}\n"));
  }
}

/// Renders a driver in the requested format.
pub fn render(driver: &LabberDriver, format: OutputFormat, delimiter: &str) -> Result<String, ExportError> {
  match format {
    OutputFormat::Ini => Ok(IniWriter::new(delimiter).render(driver)),
    OutputFormat::Json => Ok(serde_json::to_string_pretty(driver)?),
  }
}

/// Reads the inputs named by `config`, generates the driver and writes it.
pub async fn generate_and_export(config: &Config) -> Result<ExportReport, LabberizeError> {
  let nodes_json = read_input(&config.nodes).await?;
  let settings_json = read_input(&config.settings).await?;

  let tree = NodeTree::from_json_str(&nodes_json)?;
  let document = SettingsDocument::from_json_str(&settings_json)?;
  tracing::info!(version = %document.version, families = document.families.len(), "Loaded settings document");

  let labber = LabberConfig::from_provider(&tree, &config.device, config.mode, &document)?;
  let driver = labber.generate();

  let connection = ConnectionSettings {
    host: config.host.clone(),
    port: config.port,
    device: config.device.clone(),
    family: labber
      .settings()
      .family()
      .map(str::to_string)
      .unwrap_or_else(|| config.device.to_uppercase()),
    base_type: "device".to_string(),
  };

  Ok(export_driver(&driver, &connection, &config.export).await?)
}

async fn read_input(path: &Path) -> Result<String, LabberizeError> {
  tokio::fs::read_to_string(path)
    .await
    .map_err(|source| LabberizeError::ReadInput {
      path: path.to_path_buf(),
      source,
    })
}

/// Writes the driver file and, unless one already exists, the connection
/// settings file next to it.
pub async fn export_driver(
  driver: &LabberDriver,
  connection: &ConnectionSettings,
  options: &ExportOptions,
) -> Result<ExportReport, ExportError> {
  let dir = &options.output_dir;
  tokio::fs::create_dir_all(dir)
    .await
    .map_err(|source| ExportError::CreateDir {
      path: dir.clone(),
      source,
    })?;

  let driver_path = dir.join(format!("{}.{}", connection.device, options.format.extension()));
  if exists(&driver_path).await && !options.upgrade {
    return Err(ExportError::DriverExists(driver_path));
  }
  let content = render(driver, options.format, &options.delimiter)?;
  write_file(&driver_path, content).await?;
  tracing::info!(path = %driver_path.display(), quants = driver.quants.len(), "Driver written");

  let settings_path = dir.join(format!("{}_settings.json", connection.device));
  let settings_written = if exists(&settings_path).await && !options.overwrite_settings {
    tracing::info!(path = %settings_path.display(), "Keeping existing connection settings");
    false
  } else {
    let json = serde_json::to_string_pretty(connection)?;
    write_file(&settings_path, json).await?;
    tracing::info!(path = %settings_path.display(), "Connection settings written");
    true
  };

  Ok(ExportReport {
    driver_path,
    settings_path,
    settings_written,
  })
}

async fn exists(path: &Path) -> bool {
  tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn write_file(path: &Path, content: String) -> Result<(), ExportError> {
  tokio::fs::write(path, content)
    .await
    .map_err(|source| ExportError::Write {
      path: path.to_path_buf(),
      source,
    })
}

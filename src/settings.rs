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

//! The settings document and its per-device view.
//!
//! The document has a `common` section and any number of family sections
//! (`SHFQA`, `HDAWG`, ...) sharing one shape. [`LabberConfiguration`]
//! folds the two levels that apply to a device into the tables the
//! generator consumes.

use crate::error::SettingsError;
use crate::generator::IndexSpec;
use crate::helpers::family_matches;
use crate::helpers::glob_to_regex;
use crate::helpers::setting_value;
use crate::quant::QuantConf;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

const VERSION_KEY: &str = "version";
const COMMON_KEY: &str = "common";

/// Which ignore lists hide nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  /// Hide everything listed under `normal` and `advanced`.
  #[default]
  Normal,
  /// Hide only what is listed under `advanced`.
  Advanced,
}

impl fmt::Display for Mode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Mode::Normal => f.write_str("normal"),
      Mode::Advanced => f.write_str("advanced"),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IgnoredNodes {
  pub normal: Vec<String>,
  pub advanced: Vec<String>,
}

/// Per-family redirection of a rule to another template.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleMapping {
  pub path: String,
  #[serde(default)]
  pub indexes: IndexSpec,
}

/// One entry of a `quants` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OverrideRule {
  /// The table key; filled in after deserialization.
  #[serde(skip)]
  pub pattern: String,
  pub conf: Option<QuantConf>,
  pub extend: Option<QuantConf>,
  pub add: bool,
  pub indexes: IndexSpec,
  pub dev_type: Option<Vec<String>>,
  pub mapping: Option<IndexMap<String, RuleMapping>>,
}

/// One level of the document: `common` or a device family.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsSection {
  #[serde(rename = "generalSettings", alias = "general_settings")]
  pub general_settings: IndexMap<String, serde_json::Value>,
  pub quants: IndexMap<String, OverrideRule>,
  #[serde(alias = "sections")]
  pub quant_sections: IndexMap<String, String>,
  #[serde(alias = "groups")]
  pub quant_groups: IndexMap<String, String>,
  #[serde(rename = "ignoredNodes", alias = "ignored_nodes")]
  pub ignored_nodes: IgnoredNodes,
}

impl SettingsSection {
  fn parse(key: &str, value: serde_json::Value) -> Result<Self, SettingsError> {
    let mut section: SettingsSection =
      serde_json::from_value(value).map_err(|source| SettingsError::InvalidSection {
        key: key.to_string(),
        source,
      })?;
    for (pattern, rule) in section.quants.iter_mut() {
      rule.pattern = pattern.clone();
    }
    section.validate(key)?;
    Ok(section)
  }

  /// Rejects globs that cannot be compiled.
  fn validate(&self, key: &str) -> Result<(), SettingsError> {
    let tables = [
      ("quants", self.quants.keys().collect::<Vec<_>>()),
      ("quant_sections", self.quant_sections.keys().collect()),
      ("quant_groups", self.quant_groups.keys().collect()),
      ("ignoredNodes", self.ignored_nodes.normal.iter().chain(&self.ignored_nodes.advanced).collect()),
    ];
    for (table, patterns) in tables {
      for pattern in patterns {
        glob_to_regex(pattern).map_err(|source| SettingsError::InvalidPattern {
          key: format!("{key}.{table}"),
          pattern: pattern.clone(),
          source,
        })?;
      }
    }
    Ok(())
  }
}

/// The whole settings document.
#[derive(Debug, Clone)]
pub struct SettingsDocument {
  pub version: String,
  pub common: SettingsSection,
  pub families: IndexMap<String, SettingsSection>,
}

impl SettingsDocument {
  pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    Self::from_value(value)
  }

  /// Validates the document structure. Any failure names the offending key.
  pub fn from_value(value: serde_json::Value) -> Result<Self, SettingsError> {
    let serde_json::Value::Object(mut map) = value else {
      return Err(SettingsError::NotAnObject);
    };

    let version = match map.shift_remove(VERSION_KEY) {
      Some(serde_json::Value::String(version)) => version,
      Some(_) => {
        return Err(SettingsError::InvalidVersion {
          key: VERSION_KEY.to_string(),
        });
      }
      None => {
        return Err(SettingsError::MissingKey {
          key: VERSION_KEY.to_string(),
        });
      }
    };

    let common = map
      .shift_remove(COMMON_KEY)
      .ok_or_else(|| SettingsError::MissingKey {
        key: COMMON_KEY.to_string(),
      })?;
    let common = SettingsSection::parse(COMMON_KEY, common)?;

    let mut families = IndexMap::new();
    for (key, section) in map {
      let section = SettingsSection::parse(&key, section)?;
      families.insert(key, section);
    }

    Ok(Self {
      version,
      common,
      families,
    })
  }

  /// The first family section, in document order, whose key names `device`.
  pub fn family(&self, device: &str) -> Option<(&String, &SettingsSection)> {
    self
      .families
      .iter()
      .find(|(key, _)| family_matches(key, device))
  }
}

/// The settings that apply to one device in one mode.
#[derive(Debug, Clone)]
pub struct LabberConfiguration {
  device: String,
  family: Option<String>,
  version: String,
  quants: IndexMap<String, OverrideRule>,
  ignored_nodes: Vec<String>,
  quant_sections: IndexMap<String, String>,
  quant_groups: IndexMap<String, String>,
  general_settings: IndexMap<String, String>,
}

impl LabberConfiguration {
  pub fn new(device: &str, mode: Mode, document: &SettingsDocument) -> Self {
    let family = document.family(device);
    match family {
      Some((key, _)) => tracing::debug!(%device, family = %key, "Resolved device family"),
      None => tracing::info!(%device, "No family section found; using common settings only"),
    }
    let levels: Vec<&SettingsSection> = std::iter::once(&document.common)
      .chain(family.map(|(_, section)| section))
      .collect();

    let mut quants = IndexMap::new();
    let mut quant_sections = IndexMap::new();
    let mut quant_groups = IndexMap::new();
    let mut general_settings = IndexMap::new();
    let mut ignored_nodes = Vec::new();
    for level in &levels {
      for (pattern, rule) in &level.quants {
        quants.insert(pattern.clone(), rule.clone());
      }
      quant_sections.extend(level.quant_sections.iter().map(|(k, v)| (k.clone(), v.clone())));
      quant_groups.extend(level.quant_groups.iter().map(|(k, v)| (k.clone(), v.clone())));
      general_settings.extend(
        level
          .general_settings
          .iter()
          .map(|(k, v)| (k.clone(), setting_value(v))),
      );
      if mode == Mode::Normal {
        ignored_nodes.extend(level.ignored_nodes.normal.iter().cloned());
      }
      ignored_nodes.extend(level.ignored_nodes.advanced.iter().cloned());
    }

    Self {
      device: device.to_string(),
      family: family.map(|(key, _)| key.clone()),
      version: document.version.clone(),
      quants: filter_rules(device, quants),
      ignored_nodes,
      quant_sections,
      quant_groups,
      general_settings,
    }
  }

  pub fn device(&self) -> &str {
    &self.device
  }

  /// The family key that matched the device, if any.
  pub fn family(&self) -> Option<&str> {
    self.family.as_deref()
  }

  pub fn version(&self) -> &str {
    &self.version
  }

  /// Actionable rules, keyed by their (possibly remapped) pattern.
  pub fn quants(&self) -> &IndexMap<String, OverrideRule> {
    &self.quants
  }

  pub fn ignored_nodes(&self) -> &[String] {
    &self.ignored_nodes
  }

  pub fn quant_sections(&self) -> &IndexMap<String, String> {
    &self.quant_sections
  }

  pub fn quant_groups(&self) -> &IndexMap<String, String> {
    &self.quant_groups
  }

  pub fn general_settings(&self) -> &IndexMap<String, String> {
    &self.general_settings
  }
}

/// Drops rules that cannot apply to `device` and resolves mappings.
fn filter_rules(device: &str, rules: IndexMap<String, OverrideRule>) -> IndexMap<String, OverrideRule> {
  let mut kept = IndexMap::new();
  for (pattern, mut rule) in rules {
    if rule.conf.is_none() && !rule.add {
      tracing::warn!(%pattern, "Dropping rule with neither conf nor add");
      continue;
    }
    if let Some(dev_types) = &rule.dev_type {
      if !dev_types.iter().any(|family| family_matches(family, device)) {
        tracing::trace!(%pattern, "Dropping rule for other device types");
        continue;
      }
    }
    if let Some(mapping) = rule.mapping.take() {
      let Some(target) = mapping
        .into_iter()
        .find(|(family, _)| family_matches(family, device))
        .map(|(_, target)| target)
      else {
        tracing::trace!(%pattern, "Dropping mapped rule without an entry for this device");
        continue;
      };
      tracing::trace!(%pattern, to = %target.path, "Remapped rule");
      rule.pattern = target.path.clone();
      rule.indexes = target.indexes;
      kept.insert(target.path, rule);
      continue;
    }
    kept.insert(pattern, rule);
  }
  kept
}

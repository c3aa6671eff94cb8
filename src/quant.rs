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

//! Quantity definitions and the two ways of building them.
//!
//! A [`NodeQuant`] infers a definition from a live node. A [`Quant`] builds
//! one for a path that only the settings document knows about, such as a
//! virtual control or a file-backed shadow of a node. Both produce a
//! [`QuantDefinition`], which [`QuantConf`] overlays then refine.

use crate::helpers::command_path;
use crate::helpers::enum_description;
use crate::helpers::ensure_tooltip;
use crate::helpers::is_index;
use crate::helpers::normalize_path;
use crate::helpers::segments;
use crate::helpers::setting_value;
use crate::helpers::tooltip;
use crate::node::NodeDescriptor;
use crate::node::NodeProperties;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde::de::Error as _;
use std::fmt;
use std::str::FromStr;

/// Leaf names that are booleans whatever type the node declares.
const BOOLEAN_NODES: &[&str] = &["enable", "single", "on", "busy", "ready", "reset", "preampenable"];

/// Leaf names that are strings whatever type the node declares.
const STRING_NODES: &[&str] = &["alias", "serial", "devtype", "fwrevision"];

/// Datatypes understood by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum DataType {
  Double,
  Boolean,
  Combo,
  String,
  Complex,
  Vector,
  VectorComplex,
  Path,
  Button,
}

impl DataType {
  pub fn as_str(&self) -> &'static str {
    match self {
      DataType::Double => "DOUBLE",
      DataType::Boolean => "BOOLEAN",
      DataType::Combo => "COMBO",
      DataType::String => "STRING",
      DataType::Complex => "COMPLEX",
      DataType::Vector => "VECTOR",
      DataType::VectorComplex => "VECTOR_COMPLEX",
      DataType::Path => "PATH",
      DataType::Button => "BUTTON",
    }
  }

  fn is_vector(&self) -> bool {
    matches!(self, DataType::Vector | DataType::VectorComplex)
  }
}

impl fmt::Display for DataType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for DataType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_uppercase().as_str() {
      "DOUBLE" => Ok(DataType::Double),
      "BOOLEAN" => Ok(DataType::Boolean),
      "COMBO" => Ok(DataType::Combo),
      "STRING" => Ok(DataType::String),
      "COMPLEX" => Ok(DataType::Complex),
      "VECTOR" => Ok(DataType::Vector),
      "VECTOR_COMPLEX" => Ok(DataType::VectorComplex),
      "PATH" => Ok(DataType::Path),
      "BUTTON" => Ok(DataType::Button),
      other => Err(format!("unknown datatype '{other}'")),
    }
  }
}

impl TryFrom<String> for DataType {
  type Error = String;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

/// Access a quantity grants the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum Permission {
  Read,
  Write,
  Both,
  None,
}

impl Permission {
  pub fn from_properties(properties: NodeProperties) -> Self {
    match (properties.read, properties.write) {
      (true, true) => Permission::Both,
      (true, false) => Permission::Read,
      (false, true) => Permission::Write,
      (false, false) => Permission::None,
    }
  }

  pub fn readable(&self) -> bool {
    matches!(self, Permission::Read | Permission::Both)
  }

  pub fn writable(&self) -> bool {
    matches!(self, Permission::Write | Permission::Both)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Permission::Read => "READ",
      Permission::Write => "WRITE",
      Permission::Both => "BOTH",
      Permission::None => "NONE",
    }
  }
}

impl fmt::Display for Permission {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Permission {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_uppercase().as_str() {
      "READ" => Ok(Permission::Read),
      "WRITE" => Ok(Permission::Write),
      "BOTH" => Ok(Permission::Both),
      "NONE" => Ok(Permission::None),
      other => Err(format!("unknown permission '{other}'")),
    }
  }
}

impl TryFrom<String> for Permission {
  type Error = String;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

/// How one field of a settings `conf` block affects a definition.
///
/// In the document an absent key is `Unset`, a `null` or empty value
/// (`""`, `[]`, `{}`) is `Clear`, anything else is `Set`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOverride<T> {
  Set(T),
  Clear,
  Unset,
}

impl<T> Default for FieldOverride<T> {
  fn default() -> Self {
    FieldOverride::Unset
  }
}

impl<T> FieldOverride<T> {
  pub fn is_unset(&self) -> bool {
    matches!(self, FieldOverride::Unset)
  }

  /// Applies the override to an optional field.
  pub fn apply(&self, slot: &mut Option<T>)
  where
    T: Clone,
  {
    match self {
      FieldOverride::Set(value) => *slot = Some(value.clone()),
      FieldOverride::Clear => *slot = None,
      FieldOverride::Unset => {}
    }
  }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for FieldOverride<T> {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    if is_blank(&value) {
      return Ok(FieldOverride::Clear);
    }
    serde_json::from_value(value)
      .map(FieldOverride::Set)
      .map_err(D::Error::custom)
  }
}

fn is_blank(value: &serde_json::Value) -> bool {
  match value {
    serde_json::Value::Null => true,
    serde_json::Value::String(s) => s.is_empty(),
    serde_json::Value::Array(a) => a.is_empty(),
    serde_json::Value::Object(o) => o.is_empty(),
    _ => false,
  }
}

/// A partial definition from the settings document (`conf` or `extend`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QuantConf {
  pub label: FieldOverride<String>,
  pub section: FieldOverride<String>,
  pub group: FieldOverride<String>,
  pub datatype: FieldOverride<DataType>,
  pub unit: FieldOverride<String>,
  pub tooltip: FieldOverride<String>,
  pub permission: FieldOverride<Permission>,
  pub set_cmd: FieldOverride<String>,
  pub get_cmd: FieldOverride<String>,
  pub combo_options: FieldOverride<IndexMap<String, String>>,
  pub show_in_measurement_dialog: FieldOverride<bool>,
  pub x_name: FieldOverride<String>,
  pub x_unit: FieldOverride<String>,
  /// Trailing segment appended to a synthetic quant's title and label.
  pub suffix: Option<String>,
  /// Platform keys without a dedicated field, passed through verbatim.
  #[serde(flatten)]
  pub extra: IndexMap<String, FieldOverride<serde_json::Value>>,
}

/// One entry of a combo box: `label` is shown, `code` is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComboOption {
  pub code: String,
  pub label: String,
}

/// A finished quantity, as handed to the driver writer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantDefinition {
  pub title: String,
  pub label: String,
  pub section: String,
  pub group: String,
  pub datatype: DataType,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub unit: Option<String>,
  pub tooltip: String,
  pub permission: Permission,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub set_cmd: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub get_cmd: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub combo_options: Vec<ComboOption>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub show_in_measurement_dialog: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub x_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub x_unit: Option<String>,
  #[serde(skip_serializing_if = "IndexMap::is_empty")]
  pub extra: IndexMap<String, String>,
  /// Device command the quantity reads and writes.
  #[serde(skip)]
  command: String,
  /// Set once a `conf` block chose the section, so document-level
  /// section tables no longer apply.
  #[serde(skip)]
  section_pinned: bool,
  #[serde(skip)]
  group_pinned: bool,
}

impl QuantDefinition {
  pub fn command(&self) -> &str {
    &self.command
  }

  pub fn section_pinned(&self) -> bool {
    self.section_pinned
  }

  pub fn group_pinned(&self) -> bool {
    self.group_pinned
  }

  /// Overlays a `conf` block, then restores the permission contract.
  pub fn apply(&mut self, conf: &QuantConf) {
    match &conf.label {
      FieldOverride::Set(label) => self.label = label.clone(),
      FieldOverride::Clear => self.label.clear(),
      FieldOverride::Unset => {}
    }
    match &conf.section {
      FieldOverride::Set(section) => self.section = section.clone(),
      FieldOverride::Clear => self.section.clear(),
      FieldOverride::Unset => {}
    }
    self.section_pinned |= !conf.section.is_unset();
    match &conf.group {
      FieldOverride::Set(group) => self.group = group.clone(),
      FieldOverride::Clear => self.group.clear(),
      FieldOverride::Unset => {}
    }
    self.group_pinned |= !conf.group.is_unset();
    match &conf.datatype {
      FieldOverride::Set(datatype) => self.datatype = *datatype,
      FieldOverride::Clear => self.datatype = DataType::String,
      FieldOverride::Unset => {}
    }
    match &conf.permission {
      FieldOverride::Set(permission) => self.permission = *permission,
      FieldOverride::Clear => self.permission = Permission::None,
      FieldOverride::Unset => {}
    }
    match &conf.tooltip {
      FieldOverride::Set(text) => self.tooltip = ensure_tooltip(text, Some(self.command.as_str())),
      FieldOverride::Clear => self.tooltip.clear(),
      FieldOverride::Unset => {}
    }
    match &conf.combo_options {
      FieldOverride::Set(options) => {
        self.combo_options = options
          .iter()
          .map(|(code, label)| ComboOption {
            code: code.clone(),
            label: label.clone(),
          })
          .collect();
      }
      FieldOverride::Clear => self.combo_options.clear(),
      FieldOverride::Unset => {}
    }
    conf.unit.apply(&mut self.unit);
    conf.set_cmd.apply(&mut self.set_cmd);
    conf.get_cmd.apply(&mut self.get_cmd);
    conf.show_in_measurement_dialog.apply(&mut self.show_in_measurement_dialog);
    conf.x_name.apply(&mut self.x_name);
    conf.x_unit.apply(&mut self.x_unit);
    for (key, value) in &conf.extra {
      match value {
        FieldOverride::Set(value) => {
          self.extra.insert(key.clone(), setting_value(value));
        }
        FieldOverride::Clear => {
          self.extra.shift_remove(key);
        }
        FieldOverride::Unset => {}
      }
    }
    self.finalize();
  }

  /// Commands follow permission: `set_cmd` exists iff writable, `get_cmd`
  /// iff readable. A missing command falls back to the quantity's own path.
  /// Combo options only survive on combo quantities.
  fn finalize(&mut self) {
    if self.permission.writable() {
      self.set_cmd.get_or_insert_with(|| self.command.clone());
    } else {
      self.set_cmd = None;
    }
    if self.permission.readable() {
      self.get_cmd.get_or_insert_with(|| self.command.clone());
    } else {
      self.get_cmd = None;
    }
    if self.datatype != DataType::Combo {
      self.combo_options.clear();
    }
  }
}

/// Section for a path: the first segment, plus the second when it is an index.
pub fn section_of(path: &str) -> String {
  let parts = segments(path);
  match parts.as_slice() {
    [] => String::new(),
    [first, second, ..] if is_index(second) => format!("{first}/{second}"),
    [first, ..] => first.to_string(),
  }
}

/// Label for a path: the last segment, or the last two when it is an index.
pub fn label_of(path: &str) -> String {
  let parts = segments(path);
  match parts.as_slice() {
    [] => String::new(),
    [.., parent, last] if is_index(last) => format!("{parent}/{last}"),
    [.., last] => last.to_string(),
  }
}

/// Joins the non-index segments of `parts`, falling back to `fallback`.
fn group_from(parts: &[&str], fallback: &str) -> String {
  let group: Vec<&str> = parts.iter().copied().filter(|s| !is_index(s)).collect();
  if group.is_empty() {
    fallback.to_string()
  } else {
    group.join("/")
  }
}

/// Builds a definition from a live node.
#[derive(Debug, Clone, Copy)]
pub struct NodeQuant<'a> {
  node: &'a NodeDescriptor,
}

impl<'a> NodeQuant<'a> {
  pub fn new(node: &'a NodeDescriptor) -> Self {
    Self { node }
  }

  pub fn permission(&self) -> Permission {
    Permission::from_properties(self.node.properties)
  }

  /// Ordered naming and type rules; the first that applies wins.
  pub fn datatype(&self) -> DataType {
    let leaf = self.node.leaf();
    let node_type = self.node.node_type.trim().to_ascii_lowercase();
    if BOOLEAN_NODES.contains(&leaf) {
      DataType::Boolean
    } else if STRING_NODES.contains(&leaf) {
      DataType::String
    } else if node_type.contains("enumerated") && self.permission().writable() {
      DataType::Combo
    } else if node_type == "double" || node_type.contains("integer") {
      DataType::Double
    } else if node_type == "complex" || node_type == "complex double" {
      DataType::VectorComplex
    } else if node_type == "zivectordata" || node_type == "ziadvisorwave" {
      DataType::Vector
    } else if node_type == "zidemodsample" || node_type == "zidiosample" {
      DataType::Complex
    } else {
      DataType::String
    }
  }

  pub fn section(&self) -> String {
    section_of(&self.node.path)
  }

  /// `qachannels/0/wave/0` groups under `qachannels/wave`.
  pub fn group(&self) -> String {
    let parts = segments(&self.node.path);
    let parent = &parts[..parts.len().saturating_sub(1)];
    group_from(parent, parts.first().copied().unwrap_or_default())
  }

  pub fn label(&self) -> String {
    label_of(&self.node.path)
  }

  /// Combo entries, only for writable nodes.
  pub fn combo_options(&self) -> Vec<ComboOption> {
    if !self.permission().writable() {
      return Vec::new();
    }
    self
      .node
      .options
      .iter()
      .map(|(code, description)| {
        let name = enum_description(description).0.unwrap_or_else(|| code.clone());
        ComboOption {
          code: name.clone(),
          label: name,
        }
      })
      .collect()
  }

  pub fn tooltip(&self) -> String {
    let options: Vec<String> = self
      .node
      .options
      .iter()
      .map(|(code, description)| match enum_description(description) {
        (Some(name), text) => format!("{name}: {text}"),
        (None, text) => format!("{code}: {text}"),
      })
      .collect();
    tooltip(&self.node.description, &options, Some(self.node.command().as_str()))
  }

  pub fn definition(&self) -> QuantDefinition {
    let datatype = self.datatype();
    let mut quant = QuantDefinition {
      title: self.node.path.clone(),
      label: self.label(),
      section: self.section(),
      group: self.group(),
      datatype,
      unit: self.node.unit.clone(),
      tooltip: self.tooltip(),
      permission: self.permission(),
      set_cmd: None,
      get_cmd: None,
      combo_options: self.combo_options(),
      show_in_measurement_dialog: (datatype.is_vector() || datatype == DataType::Complex).then_some(true),
      x_name: datatype.is_vector().then(|| "Length".to_string()),
      x_unit: datatype.is_vector().then(|| "Sample".to_string()),
      extra: IndexMap::new(),
      command: self.node.command(),
      section_pinned: false,
      group_pinned: false,
    };
    quant.finalize();
    quant
  }
}

/// Builds a definition for a path declared only in the settings document.
#[derive(Debug, Clone)]
pub struct Quant {
  path: String,
}

impl Quant {
  pub fn new(path: &str) -> Self {
    Self {
      path: normalize_path(path),
    }
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn label(&self) -> String {
    label_of(&self.path)
  }

  /// Non-index segments minus the last; paths with two or more indexes
  /// are grouped one level higher.
  pub fn group(&self) -> String {
    let parts = segments(&self.path);
    let indexes = parts.iter().filter(|s| is_index(s)).count();
    let named: Vec<&str> = parts.iter().copied().filter(|s| !is_index(s)).collect();
    let cut = if indexes >= 2 { 2 } else { 1 };
    let kept = &named[..named.len().saturating_sub(cut)];
    group_from(kept, parts.first().copied().unwrap_or_default())
  }

  /// Creates the definition and overlays `conf` on it.
  pub fn definition(&self, conf: &QuantConf) -> QuantDefinition {
    let command = command_path(&self.path);
    let (title, label) = match conf.suffix.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
      Some(suffix) => {
        let suffix = suffix.to_lowercase();
        (format!("{}/{suffix}", self.path), format!("{}/{suffix}", self.label()))
      }
      None => (self.path.clone(), self.label()),
    };
    let mut quant = QuantDefinition {
      title,
      label,
      section: section_of(&self.path),
      group: self.group(),
      datatype: DataType::String,
      unit: None,
      tooltip: tooltip("", &[], Some(command.as_str())),
      permission: Permission::Write,
      set_cmd: None,
      get_cmd: None,
      combo_options: Vec::new(),
      show_in_measurement_dialog: None,
      x_name: None,
      x_unit: None,
      extra: IndexMap::new(),
      command,
      section_pinned: false,
      group_pinned: false,
    };
    quant.apply(conf);
    quant
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn node(path: &str, properties: &str, node_type: &str) -> NodeDescriptor {
    NodeDescriptor {
      path: normalize_path(path),
      description: "A node.".to_string(),
      properties: NodeProperties::parse(properties),
      node_type: node_type.to_string(),
      unit: None,
      options: IndexMap::new(),
    }
  }

  #[test]
  fn naming_rules_beat_declared_type() {
    let enable = node("/dev1/sigouts/0/enable", "Read, Write", "Integer (64 bit)");
    assert_eq!(NodeQuant::new(&enable).datatype(), DataType::Boolean);
    let serial = node("/dev1/features/serial", "Read", "Integer (64 bit)");
    assert_eq!(NodeQuant::new(&serial).datatype(), DataType::String);
  }

  #[test]
  fn type_rules() {
    let cases = [
      ("Read, Write", "Integer (enumerated)", DataType::Combo),
      ("Read", "Integer (enumerated)", DataType::Double),
      ("Read", "Complex Double", DataType::VectorComplex),
      ("Read", "ZIVectorData", DataType::Vector),
      ("Read", "ZIDemodSample", DataType::Complex),
      ("Read", "ZIPWAWave", DataType::String),
    ];
    for (properties, node_type, expected) in cases {
      let n = node("/dev1/a/0/value", properties, node_type);
      assert_eq!(NodeQuant::new(&n).datatype(), expected, "{node_type}");
    }
  }

  #[test]
  fn group_drops_indexes() {
    let n = node("/dev1/qachannels/0/wave/0", "Read", "ZIVectorData");
    let quant = NodeQuant::new(&n);
    assert_eq!(quant.group(), "qachannels/wave");
    assert_eq!(quant.section(), "qachannels/0");
    assert_eq!(quant.label(), "wave/0");
    let single = node("/dev1/clockbase", "Read", "Double");
    assert_eq!(NodeQuant::new(&single).group(), "clockbase");
    assert_eq!(NodeQuant::new(&single).section(), "clockbase");
  }

  #[test]
  fn blank_conf_values_clear() {
    let conf: QuantConf =
      serde_json::from_str(r#"{"unit": null, "label": "Gain", "def_value": 1.5, "state_quant": ""}"#).unwrap();
    assert_eq!(conf.unit, FieldOverride::Clear);
    assert_eq!(conf.label, FieldOverride::Set("Gain".to_string()));
    assert!(conf.datatype.is_unset());
    assert_eq!(conf.extra["def_value"], FieldOverride::Set(serde_json::json!(1.5)));
    assert_eq!(conf.extra["state_quant"], FieldOverride::Clear);
  }

  #[test]
  fn suffix_shadows_base_command() {
    let conf: QuantConf = serde_json::from_str(r#"{"suffix": "file", "datatype": "path"}"#).unwrap();
    let quant = Quant::new("qachannels/0/generator/waveforms/3/wave").definition(&conf);
    assert_eq!(quant.title, "qachannels/0/generator/waveforms/3/wave/file");
    assert_eq!(quant.label, "wave/file");
    assert_eq!(quant.datatype, DataType::Path);
    assert_eq!(quant.permission, Permission::Write);
    assert_eq!(
      quant.set_cmd.as_deref(),
      Some("QACHANNELS/0/GENERATOR/WAVEFORMS/3/WAVE")
    );
    assert_eq!(quant.get_cmd, None);
    assert_eq!(quant.group, "qachannels/generator");
  }
}

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
use crate::error::NodeError;
use crate::helpers::command_path;
use crate::helpers::normalize_path;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

/// Access flags a node advertises in its `Properties` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeProperties {
  pub read: bool,
  pub write: bool,
  pub setting: bool,
}

impl NodeProperties {
  /// Parses a comma-separated list such as `"Read, Write, Setting"`.
  pub fn parse(properties: &str) -> Self {
    let mut parsed = Self::default();
    for flag in properties.split(',').map(|p| p.trim().to_ascii_lowercase()) {
      match flag.as_str() {
        "read" => parsed.read = true,
        "write" => parsed.write = true,
        "setting" => parsed.setting = true,
        _ => {}
      }
    }
    parsed
  }
}

/// One node record exactly as found in a node tree.
///
/// Every field is optional here; [`NodeDescriptor::try_from_raw`] decides
/// which ones a usable node must carry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNode {
  #[serde(rename = "Node")]
  pub node: Option<String>,
  #[serde(rename = "Description")]
  pub description: Option<String>,
  #[serde(rename = "Properties")]
  pub properties: Option<String>,
  #[serde(rename = "Type")]
  pub node_type: Option<String>,
  #[serde(rename = "Unit")]
  pub unit: Option<String>,
  #[serde(rename = "Options", default)]
  pub options: IndexMap<String, String>,
}

/// A validated node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDescriptor {
  /// Normalized device-relative path, lowercase (`qachannels/0/centerfreq`).
  pub path: String,
  pub description: String,
  pub properties: NodeProperties,
  pub node_type: String,
  /// `None` when the tree reports no unit, `"None"` or `"Dependent"`.
  pub unit: Option<String>,
  pub options: IndexMap<String, String>,
}

impl NodeDescriptor {
  /// Validates a raw record. `key` is the record's key in the tree and only
  /// labels errors. The path always comes from the record's `Node` field.
  pub fn try_from_raw(key: &str, raw: RawNode) -> Result<Self, NodeError> {
    let missing = |field| NodeError::MissingField {
      node: key.to_string(),
      field,
    };

    let node = raw.node.ok_or_else(|| missing("Node"))?;
    let description = raw.description.ok_or_else(|| missing("Description"))?;
    let properties = raw.properties.ok_or_else(|| missing("Properties"))?;
    let node_type = raw.node_type.ok_or_else(|| missing("Type"))?;

    let path = normalize_path(&node);
    if path.is_empty() {
      return Err(NodeError::EmptyPath {
        node: key.to_string(),
      });
    }

    let unit = raw
      .unit
      .map(|u| u.trim().to_string())
      .filter(|u| !u.is_empty() && u != "None" && u != "Dependent");

    Ok(Self {
      path,
      description,
      properties: NodeProperties::parse(&properties),
      node_type,
      unit,
      options: raw.options,
    })
  }

  /// The uppercase device command (`QACHANNELS/0/CENTERFREQ`).
  pub fn command(&self) -> String {
    command_path(&self.path)
  }

  /// Last path segment, lowercase.
  pub fn leaf(&self) -> &str {
    self.path.rsplit('/').next().unwrap_or(&self.path)
  }
}

/// Source of node records for a generation run.
///
/// Implemented by whatever talks to the instrument; the engine only ever
/// sees the complete snapshot this returns.
pub trait NodeProvider {
  /// Returns every raw record keyed by its tree path, in tree order.
  fn raw_nodes(&self) -> Result<IndexMap<String, RawNode>, NodeError>;

  /// Returns the validated nodes, skipping malformed records.
  fn nodes(&self) -> Result<Vec<NodeDescriptor>, NodeError> {
    let raw = self.raw_nodes()?;
    let mut nodes = Vec::with_capacity(raw.len());
    for (key, record) in raw {
      match NodeDescriptor::try_from_raw(&key, record) {
        Ok(node) => nodes.push(node),
        Err(e) => tracing::warn!(node = %key, error = %e, "Skipping malformed node"),
      }
    }
    Ok(nodes)
  }
}

/// A node tree held in memory, as produced by a JSON node listing.
#[derive(Debug, Clone, Default)]
pub struct NodeTree {
  records: IndexMap<String, RawNode>,
}

impl NodeTree {
  /// Parses a JSON object keyed by node path.
  ///
  /// A record that is not an object is kept as an empty record, which then
  /// fails validation on its own without affecting its neighbours.
  pub fn from_json_str(json: &str) -> Result<Self, NodeError> {
    let values: IndexMap<String, serde_json::Value> = serde_json::from_str(json)?;
    let records = values
      .into_iter()
      .map(|(key, value)| {
        let record = serde_json::from_value::<RawNode>(value).unwrap_or_else(|e| {
          tracing::debug!(node = %key, error = %e, "Unreadable node record");
          RawNode::default()
        });
        (key, record)
      })
      .collect();
    Ok(Self { records })
  }

  pub fn from_records(records: IndexMap<String, RawNode>) -> Self {
    Self { records }
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}

impl NodeProvider for NodeTree {
  fn raw_nodes(&self) -> Result<IndexMap<String, RawNode>, NodeError> {
    Ok(self.records.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn malformed_records_are_skipped() {
    let tree = NodeTree::from_json_str(
      r#"{
        "/dev1/a/b": {"Node": "/DEV1/A/B", "Description": "ok", "Properties": "Read", "Type": "Double", "Unit": "None"},
        "/dev1/a/c": {"Node": "/DEV1/A/C", "Properties": "Read", "Type": "Double"},
        "/dev1/a/d": 42
      }"#,
    )
    .unwrap();
    let nodes = tree.nodes().unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].path, "a/b");
    assert_eq!(nodes[0].unit, None);
    assert!(nodes[0].properties.read && !nodes[0].properties.write);
  }

  #[test]
  fn key_does_not_stand_in_for_node() {
    let raw = RawNode {
      description: Some("ok".to_string()),
      properties: Some("Read".to_string()),
      node_type: Some("Double".to_string()),
      ..RawNode::default()
    };
    let err = NodeDescriptor::try_from_raw("/dev1/a/b", raw).unwrap_err();
    assert!(matches!(
      err,
      NodeError::MissingField { ref node, field: "Node" } if node == "/dev1/a/b"
    ));
  }
}

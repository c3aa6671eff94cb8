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
use labberize::error::SettingsError;
use labberize::export::IniWriter;
use labberize::generator::IndexSpec;
use labberize::generator::QuantGenerator;
use labberize::helpers::PatternCache;
use labberize::helpers::natural_cmp;
use labberize::labber_config::LabberConfig;
use labberize::labber_config::LabberDriver;
use labberize::node::NodeDescriptor;
use labberize::node::NodeProvider;
use labberize::node::NodeTree;
use labberize::quant::DataType;
use labberize::quant::Permission;
use labberize::quant::Quant;
use labberize::quant::QuantConf;
use labberize::settings::LabberConfiguration;
use labberize::settings::Mode;
use labberize::settings::SettingsDocument;
use pretty_assertions::assert_eq;
use serde_json::json;

const NODES: &str = include_str!("fixtures/shfqa_nodes.json");
const SETTINGS: &str = include_str!("fixtures/settings.json");

fn fixture_nodes() -> Vec<NodeDescriptor> {
  NodeTree::from_json_str(NODES).unwrap().nodes().unwrap()
}

fn fixture_document() -> SettingsDocument {
  SettingsDocument::from_json_str(SETTINGS).unwrap()
}

fn generate(device: &str, mode: Mode) -> LabberDriver {
  LabberConfig::new(device, mode, fixture_nodes(), &fixture_document()).generate()
}

fn nodes(value: serde_json::Value) -> Vec<NodeDescriptor> {
  NodeTree::from_json_str(&value.to_string())
    .unwrap()
    .nodes()
    .unwrap()
}

fn document(value: serde_json::Value) -> SettingsDocument {
  SettingsDocument::from_value(value).unwrap()
}

#[test]
fn test_generation_is_idempotent() {
  let first = generate("SHFQA4", Mode::Normal);
  let second = generate("SHFQA4", Mode::Normal);

  assert_eq!(first, second);
  assert_eq!(
    first.quants.keys().collect::<Vec<_>>(),
    second.quants.keys().collect::<Vec<_>>()
  );
  let writer = IniWriter::new(" - ");
  assert_eq!(writer.render(&first), writer.render(&second));
}

#[test]
fn test_wildcard_cardinality() {
  let paths: Vec<String> = ["foo/0/bar/0", "foo/0/bar/1", "foo/1/bar/0", "foo/1/bar/1"]
    .iter()
    .map(|p| p.to_string())
    .collect();
  let spec: IndexSpec = serde_json::from_value(json!(["dev", "dev"])).unwrap();

  let expanded = QuantGenerator::new(&paths).expand("foo/*/bar/*", &spec);

  assert_eq!(expanded, paths);
}

#[test]
fn test_short_index_list_defaults_to_dev() {
  let paths: Vec<String> = ["foo/0/bar/0", "foo/0/bar/1", "foo/0/bar/2"]
    .iter()
    .map(|p| p.to_string())
    .collect();
  let spec: IndexSpec = serde_json::from_value(json!([3])).unwrap();

  let expanded = QuantGenerator::new(&paths).expand("foo/*/bar/*", &spec);

  assert_eq!(expanded.len(), 9);
  assert_eq!(expanded.last().map(String::as_str), Some("foo/2/bar/2"));
}

#[test]
fn test_ignored_nodes_never_emitted() {
  for mode in [Mode::Normal, Mode::Advanced] {
    let labber = LabberConfig::new("SHFQA4", mode, fixture_nodes(), &fixture_document());
    let driver = labber.generate();
    let cache = PatternCache::new();
    for title in driver.quants.keys() {
      assert!(
        !cache.matches_any(title, labber.settings().ignored_nodes()),
        "{title} is ignored in {mode} mode"
      );
    }
  }

  let normal = generate("SHFQA4", Mode::Normal);
  let advanced = generate("SHFQA4", Mode::Advanced);
  assert!(!normal.quants.contains_key("system/debug/level"));
  assert!(advanced.quants.contains_key("system/debug/level"));
  assert!(!normal.quants.contains_key("stats/physical/temperatures/0"));
  assert!(!advanced.quants.contains_key("stats/physical/temperatures/0"));
}

#[test]
fn test_permission_contract() {
  for mode in [Mode::Normal, Mode::Advanced] {
    for quant in generate("SHFQA4", mode).quants.values() {
      assert_eq!(quant.set_cmd.is_some(), quant.permission.writable(), "{}", quant.title);
      assert_eq!(quant.get_cmd.is_some(), quant.permission.readable(), "{}", quant.title);
      if quant.datatype != DataType::Combo {
        assert!(quant.combo_options.is_empty(), "{}", quant.title);
      }
    }
  }
}

#[test]
fn test_override_precedence() {
  let nodes = nodes(json!({
    "/dev1/foo/bar": {
      "Node": "/DEV1/FOO/BAR",
      "Description": "A string node.",
      "Properties": "Read, Write",
      "Type": "String"
    }
  }));
  let document = document(json!({
    "version": "1",
    "common": {"quants": {"foo/*": {"conf": {"datatype": "COMBO"}}}}
  }));

  let driver = LabberConfig::new("DEV", Mode::Normal, nodes, &document).generate();

  assert_eq!(driver.quants["foo/bar"].datatype, DataType::Combo);
}

#[test]
fn test_most_specific_rule_wins_then_document_order() {
  let nodes = nodes(json!({
    "/dev1/foo/bar": {
      "Node": "/DEV1/FOO/BAR",
      "Description": "",
      "Properties": "Read",
      "Type": "Double"
    }
  }));
  let document = document(json!({
    "version": "1",
    "common": {"quants": {
      "*": {"conf": {"label": "any"}},
      "foo/*": {"conf": {"label": "first"}},
      "*/bar": {"conf": {"label": "second"}},
      "f*": {"conf": {"label": "short"}}
    }}
  }));

  let driver = LabberConfig::new("DEV", Mode::Normal, nodes, &document).generate();

  assert_eq!(driver.quants["foo/bar"].label, "first");
}

#[test]
fn test_blank_override_clears_field() {
  let nodes = nodes(json!({
    "/dev1/sigins/0/range": {
      "Node": "/DEV1/SIGINS/0/RANGE",
      "Description": "Input range.",
      "Properties": "Read, Write",
      "Type": "Double",
      "Unit": "V"
    }
  }));
  let document = document(json!({
    "version": "1",
    "common": {"quants": {"sigins/*/range": {"conf": {"unit": null, "permission": "READ"}}}}
  }));

  let driver = LabberConfig::new("DEV", Mode::Normal, nodes, &document).generate();
  let quant = &driver.quants["sigins/0/range"];

  assert_eq!(quant.unit, None);
  assert_eq!(quant.permission, Permission::Read);
  assert_eq!(quant.set_cmd, None);
  assert_eq!(quant.get_cmd.as_deref(), Some("SIGINS/0/RANGE"));
}

#[test]
fn test_centerfreq_scenario() {
  let driver = generate("SHFQA4", Mode::Normal);
  let quant = &driver.quants["qachannels/0/centerfreq"];

  assert_eq!(quant.section, "qachannels/0");
  assert_eq!(quant.group, "qachannels");
  assert_eq!(quant.datatype, DataType::Double);
  assert_eq!(quant.unit.as_deref(), Some("Hz"));
  assert_eq!(quant.permission, Permission::Both);
  assert_eq!(quant.set_cmd.as_deref(), Some("QACHANNELS/0/CENTERFREQ"));
  assert_eq!(quant.get_cmd.as_deref(), Some("QACHANNELS/0/CENTERFREQ"));
  assert!(quant.tooltip.contains("<b>QACHANNELS/0/CENTERFREQ</b>"));
}

#[test]
fn test_read_only_enumeration_is_not_combo() {
  let nodes = nodes(json!({
    "/dev1/status": {
      "Node": "/DEV1/STATUS",
      "Description": "Lock status.",
      "Properties": "Read",
      "Type": "Integer (enumerated)",
      "Options": {"0": "\"locked\": desc1", "1": "\"error\": desc2"}
    }
  }));
  let document = document(json!({"version": "1", "common": {}}));

  let driver = LabberConfig::new("DEV", Mode::Normal, nodes, &document).generate();
  let quant = &driver.quants["status"];

  assert_ne!(quant.datatype, DataType::Combo);
  assert!(quant.combo_options.is_empty());
  assert!(quant.tooltip.contains("<li>locked: desc1</li>"));
  assert!(quant.tooltip.contains("<li>error: desc2</li>"));
}

#[test]
fn test_writable_enumeration_is_combo() {
  let driver = generate("SHFQA4", Mode::Normal);
  let mode = &driver.quants["qachannels/0/mode"];

  assert_eq!(mode.datatype, DataType::Combo);
  let labels: Vec<&str> = mode.combo_options.iter().map(|o| o.label.as_str()).collect();
  assert_eq!(labels, vec!["Spectroscopy", "Readout"]);
  let codes: Vec<&str> = mode.combo_options.iter().map(|o| o.code.as_str()).collect();
  assert_eq!(codes, vec!["spectroscopy", "readout"]);
}

#[test]
fn test_quant_labels() {
  let conf = QuantConf::default();
  assert_eq!(Quant::new("/qachannels/0/wave/0").definition(&conf).label, "wave/0");
  assert_eq!(Quant::new("/qachannels").definition(&conf).label, "qachannels");
}

#[test]
fn test_extensions_follow_matched_nodes() {
  let driver = generate("SHFQA4", Mode::Normal);
  let wave = &driver.quants["qachannels/1/generator/waveforms/0/wave"];
  let file = &driver.quants["qachannels/1/generator/waveforms/0/wave/file"];

  assert_eq!(wave.datatype, DataType::Vector);
  assert_eq!(wave.show_in_measurement_dialog, None);
  assert_eq!(file.datatype, DataType::Path);
  assert_eq!(file.label, "Wave file 1 0");
  assert_eq!(file.set_cmd.as_deref(), Some("QACHANNELS/1/GENERATOR/WAVEFORMS/0/WAVE"));
  assert_eq!(file.section, "Generator 1");
  assert_eq!(file.group, "Waveforms 1");
  // A rule with only `extend` carries nothing actionable.
  assert!(!driver.quants.contains_key("features/serial/copy"));
}

#[test]
fn test_add_rules_synthesize_quants() {
  let driver = generate("SHFQA4", Mode::Normal);

  let enable = &driver.quants["qachannels/1/generator/enable"];
  assert_eq!(enable.datatype, DataType::Boolean);
  assert_eq!(enable.label, "Generator");
  assert_eq!(enable.section, "Generator 1");
  assert_eq!(enable.set_cmd.as_deref(), Some("QACHANNELS/1/GENERATOR/ENABLE"));

  let results: Vec<&String> = driver
    .quants
    .keys()
    .filter(|k| k.contains("/readout/result/"))
    .collect();
  assert_eq!(
    results,
    vec![
      "qachannels/0/readout/result/0/wave",
      "qachannels/0/readout/result/1/wave",
      "qachannels/1/readout/result/0/wave",
      "qachannels/1/readout/result/1/wave",
    ]
  );
  assert_eq!(driver.quants["qachannels/0/readout/result/1/wave"].extra["def_value"], "0");

  assert!(!driver.quants.keys().any(|k| k.starts_with("triggers/")));
}

#[test]
fn test_mapping_and_dev_type_filtering() {
  let document = fixture_document();

  let shfqa = LabberConfiguration::new("SHFQA4", Mode::Normal, &document);
  assert_eq!(shfqa.family(), Some("SHFQA"));
  assert!(shfqa.quants().contains_key("qachannels/*/oscs/*/freq"));
  assert!(!shfqa.quants().contains_key("oscs/*/freq"));
  assert!(!shfqa.quants().contains_key("sigouts/*/range"));
  assert!(!shfqa.quants().contains_key("awgs/*/single"));
  assert!(!shfqa.quants().contains_key("features/*"));

  let driver = generate("SHFQA4", Mode::Normal);
  let oscs = driver.quants.keys().filter(|k| k.contains("/oscs/")).count();
  assert_eq!(oscs, 12);
  assert_eq!(driver.quants["qachannels/1/oscs/5/freq"].unit.as_deref(), Some("Hz"));
}

#[test]
fn test_family_level_combines_with_common() {
  let document = fixture_document();

  let normal = LabberConfiguration::new("SHFQA4", Mode::Normal, &document);
  assert_eq!(
    normal.ignored_nodes(),
    ["system/debug/*", "stats/*", "qachannels/*/output/on", "system/clocks/*"]
  );
  let advanced = LabberConfiguration::new("SHFQA4", Mode::Advanced, &document);
  assert_eq!(advanced.ignored_nodes(), ["stats/*", "system/clocks/*"]);
  assert_eq!(normal.quant_sections()["qachannels/*/output/*"], "Signal output <n>");
  assert_eq!(normal.quant_groups()["qachannels/*/output/*"], "Outputs <n>");

  let normal = generate("SHFQA4", Mode::Normal);
  let advanced = generate("SHFQA4", Mode::Advanced);

  // Hidden by the family's normal list only.
  assert!(!normal.quants.contains_key("qachannels/0/output/on"));
  let output = &advanced.quants["qachannels/0/output/on"];
  assert_eq!(output.section, "Signal output 0");
  assert_eq!(output.group, "Outputs 0");
  assert_eq!(output.datatype, DataType::Boolean);

  // Hidden by the family's advanced list in every mode.
  for driver in [&normal, &advanced] {
    assert!(!driver.quants.contains_key("system/clocks/referenceclock/in/status"));
  }

  // A family rule replaces the common rule with the same pattern.
  assert_eq!(normal.quants["qachannels/0/centerfreq"].label, "Center frequency");
  assert_eq!(advanced.quants["qachannels/1/centerfreq"].label, "Center frequency");

  let common_only = generate("UHFLI", Mode::Normal);
  assert_eq!(common_only.quants["qachannels/0/centerfreq"].label, "Center frequency (common)");
  let output = &common_only.quants["qachannels/0/output/on"];
  assert_eq!(output.section, "Output 0");
  assert_eq!(output.group, "Output");
  assert!(common_only.quants.contains_key("system/clocks/referenceclock/in/status"));
}

#[test]
fn test_unknown_family_uses_common_only() {
  let document = fixture_document();
  let settings = LabberConfiguration::new("UHFLI", Mode::Normal, &document);

  assert_eq!(settings.family(), None);
  assert!(!settings.quants().contains_key("qachannels/*/mode"));
  assert_eq!(settings.general_settings()["interface"], "Other");

  let driver = LabberConfig::new("UHFLI", Mode::Normal, fixture_nodes(), &document).generate();
  assert_eq!(driver.general["name"], "UHFLI");
  assert!(!driver.quants.keys().any(|k| k.contains("/oscs/")));
}

#[test]
fn test_general_settings() {
  let driver = generate("SHFQA4", Mode::Normal);

  assert_eq!(driver.general["name"], "SHFQA");
  assert_eq!(driver.general["version"], "0.3.1");
  assert_eq!(driver.general["interface"], "TCPIP");
  assert_eq!(driver.general["support_arm"], "True");
}

#[test]
fn test_output_is_naturally_ordered() {
  let driver = generate("SHFQA4", Mode::Advanced);
  let titles: Vec<&String> = driver.quants.keys().collect();

  assert!(titles.windows(2).all(|w| natural_cmp(w[0], w[1]).is_lt()));
  assert_eq!(titles.first().map(|t| t.as_str()), Some("features/serial"));
}

#[test]
fn test_malformed_node_is_isolated() {
  let driver = generate("SHFQA4", Mode::Normal);

  assert!(!driver.quants.contains_key("system/broken"));
  assert_eq!(driver.quants["system/fwrevision"].label, "Firmware revision");
  assert_eq!(driver.quants["system/fwrevision"].datatype, DataType::String);
}

#[test]
fn test_document_structure_errors_are_fatal() {
  let missing_common = SettingsDocument::from_value(json!({"version": "1"}));
  assert!(matches!(
    missing_common,
    Err(SettingsError::MissingKey { ref key }) if key == "common"
  ));

  let missing_version = SettingsDocument::from_value(json!({"common": {}}));
  assert!(matches!(
    missing_version,
    Err(SettingsError::MissingKey { ref key }) if key == "version"
  ));

  let bad_family = SettingsDocument::from_value(json!({
    "version": "1",
    "common": {},
    "HDAWG": {"quants": {"sigouts/*/on": {"conf": {"datatype": "SLIDER"}}}}
  }));
  assert!(matches!(
    bad_family,
    Err(SettingsError::InvalidSection { ref key, .. }) if key == "HDAWG"
  ));
}

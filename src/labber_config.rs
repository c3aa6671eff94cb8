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

//! The generation pipeline for one device.
//!
//! Stages run strictly in order: default quants from nodes, ignore
//! filtering, override merge (with extensions), synthetic quants from `add`
//! rules, section and group placement, then natural-order emission.

use crate::error::LabberizeError;
use crate::generator::QuantGenerator;
use crate::helpers::PatternCache;
use crate::helpers::natural_cmp;
use crate::helpers::substitute_indexes;
use crate::node::NodeDescriptor;
use crate::node::NodeProvider;
use crate::quant::NodeQuant;
use crate::quant::Quant;
use crate::quant::QuantDefinition;
use crate::settings::LabberConfiguration;
use crate::settings::Mode;
use crate::settings::SettingsDocument;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;

/// Everything the driver writer needs for one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabberDriver {
  pub general: IndexMap<String, String>,
  pub quants: IndexMap<String, QuantDefinition>,
}

/// Drives generation for one device, one node snapshot and one settings document.
#[derive(Debug)]
pub struct LabberConfig {
  mode: Mode,
  nodes: Vec<NodeDescriptor>,
  node_paths: Vec<String>,
  settings: LabberConfiguration,
  patterns: PatternCache,
}

impl LabberConfig {
  pub fn new(device: &str, mode: Mode, nodes: Vec<NodeDescriptor>, document: &SettingsDocument) -> Self {
    let node_paths = nodes.iter().map(|n| n.path.clone()).collect();
    Self {
      mode,
      nodes,
      node_paths,
      settings: LabberConfiguration::new(device, mode, document),
      patterns: PatternCache::new(),
    }
  }

  /// Pulls the node snapshot from `provider` and prepares a run.
  pub fn from_provider<P: NodeProvider + ?Sized>(
    provider: &P,
    device: &str,
    mode: Mode,
    document: &SettingsDocument,
  ) -> Result<Self, LabberizeError> {
    let nodes = provider.nodes()?;
    tracing::info!(%device, nodes = nodes.len(), "Discovered nodes");
    Ok(Self::new(device, mode, nodes, document))
  }

  pub fn settings(&self) -> &LabberConfiguration {
    &self.settings
  }

  pub fn nodes(&self) -> &[NodeDescriptor] {
    &self.nodes
  }

  /// Runs the pipeline and returns the finished driver.
  pub fn generate(&self) -> LabberDriver {
    let span = tracing::info_span!("generate", device = %self.settings.device(), mode = %self.mode);
    let _enter = span.enter();

    let mut quants = self.default_quants();
    tracing::debug!(count = quants.len(), "Generated default quants");

    let matched = self.merge_overrides(&mut quants);
    tracing::debug!(rules = matched.len(), "Merged override rules");

    self.add_synthetic_quants(&mut quants, &matched);
    quants.retain(|title, _| !self.is_ignored(title));

    self.infer_placement(&mut quants);
    quants.sort_by(|a, _, b, _| natural_cmp(a, b));
    tracing::info!(count = quants.len(), "Generated quants");

    LabberDriver {
      general: self.general_settings(),
      quants,
    }
  }

  fn is_ignored(&self, path: &str) -> bool {
    self.patterns.matches_any(path, self.settings.ignored_nodes())
  }

  /// One quant per node that no ignore pattern hides.
  fn default_quants(&self) -> IndexMap<String, QuantDefinition> {
    let mut quants = IndexMap::new();
    for node in &self.nodes {
      if self.is_ignored(&node.path) {
        tracing::trace!(path = %node.path, "Ignored node");
        continue;
      }
      let quant = NodeQuant::new(node).definition();
      quants.entry(quant.title.clone()).or_insert(quant);
    }
    quants
  }

  /// Overlays the most specific matching rule on each quant and collects
  /// the extensions those rules declare. Returns the patterns that matched.
  fn merge_overrides(&self, quants: &mut IndexMap<String, QuantDefinition>) -> HashSet<String> {
    let mut matched = HashSet::new();
    let mut extensions = Vec::new();
    for quant in quants.values_mut() {
      let Some((pattern, rule)) = self.patterns.best_match(&quant.title, self.settings.quants()) else {
        continue;
      };
      tracing::trace!(title = %quant.title, %pattern, "Applying override");
      matched.insert(pattern.clone());
      if let Some(conf) = &rule.conf {
        quant.apply(conf);
      }
      if let Some(extend) = &rule.extend {
        extensions.push(Quant::new(&quant.title).definition(extend));
      }
    }
    for extension in extensions {
      if self.is_ignored(&extension.title) {
        continue;
      }
      quants.entry(extension.title.clone()).or_insert(extension);
    }
    matched
  }

  /// Instantiates `add` rules that matched no node, expanding their
  /// templates against the full node set.
  fn add_synthetic_quants(&self, quants: &mut IndexMap<String, QuantDefinition>, matched: &HashSet<String>) {
    let generator = QuantGenerator::new(&self.node_paths);
    for (pattern, rule) in self.settings.quants() {
      if !rule.add || matched.contains(pattern) {
        continue;
      }
      let conf = rule.conf.clone().unwrap_or_default();
      let paths = generator.expand(pattern, &rule.indexes);
      tracing::debug!(%pattern, count = paths.len(), "Expanded synthetic quant");
      for path in paths {
        if self.is_ignored(&path) {
          continue;
        }
        let quant = Quant::new(&path);
        let definition = quant.definition(&conf);
        quants.entry(definition.title.clone()).or_insert(definition);
        if let Some(extend) = &rule.extend {
          let extension = quant.definition(extend);
          quants.entry(extension.title.clone()).or_insert(extension);
        }
      }
    }
  }

  /// Applies the document's section and group tables to quants whose
  /// placement no `conf` pinned, then fills `<n>` placeholders.
  fn infer_placement(&self, quants: &mut IndexMap<String, QuantDefinition>) {
    for quant in quants.values_mut() {
      if !quant.section_pinned() {
        if let Some((_, section)) = self.patterns.best_match(&quant.title, self.settings.quant_sections()) {
          quant.section = section.clone();
        }
      }
      if !quant.group_pinned() {
        if let Some((_, group)) = self.patterns.best_match(&quant.title, self.settings.quant_groups()) {
          quant.group = group.clone();
        }
      }
      quant.section = substitute_indexes(&quant.section, &quant.title);
      quant.group = substitute_indexes(&quant.group, &quant.title);
      quant.label = substitute_indexes(&quant.label, &quant.title);
    }
  }

  fn general_settings(&self) -> IndexMap<String, String> {
    let mut general = IndexMap::new();
    let name = self
      .settings
      .family()
      .map(str::to_string)
      .unwrap_or_else(|| self.settings.device().to_uppercase());
    general.insert("name".to_string(), name);
    general.insert("version".to_string(), self.settings.version().to_string());
    for (key, value) in self.settings.general_settings() {
      if key != "version" {
        general.insert(key.clone(), value.clone());
      }
    }
    general
  }
}

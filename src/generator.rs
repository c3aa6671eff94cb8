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

//! Expansion of wildcarded path templates into concrete paths.
//!
//! A template such as `qachannels/*/generator/waveforms/*/wave` carries one
//! `*` per index. How many values each index takes is either fixed in the
//! settings document or discovered from the nodes the device exposes.

use crate::helpers::normalize_path;
use regex::Regex;
use regex::RegexBuilder;
use serde::Deserialize;
use serde::Deserializer;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Cardinality source for one wildcard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexEntry {
  /// Count the distinct values present on the device.
  #[default]
  Dev,
  /// Exactly this many values, `0..n`.
  Fixed(usize),
}

impl FromStr for IndexEntry {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("dev") {
      return Ok(IndexEntry::Dev);
    }
    s.parse::<usize>()
      .map(IndexEntry::Fixed)
      .map_err(|_| format!("expected 'dev' or a count, got '{s}'"))
  }
}

impl fmt::Display for IndexEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      IndexEntry::Dev => f.write_str("dev"),
      IndexEntry::Fixed(n) => write!(f, "{n}"),
    }
  }
}

impl<'de> Deserialize<'de> for IndexEntry {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
      Count(usize),
      Text(String),
    }

    match Raw::deserialize(deserializer)? {
      Raw::Count(n) => Ok(IndexEntry::Fixed(n)),
      Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
  }
}

/// One entry per wildcard, left to right. Missing trailing entries are `Dev`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct IndexSpec(Vec<IndexEntry>);

impl IndexSpec {
  pub fn new(entries: Vec<IndexEntry>) -> Self {
    Self(entries)
  }

  pub fn entry(&self, position: usize) -> IndexEntry {
    self.0.get(position).copied().unwrap_or_default()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl FromIterator<IndexEntry> for IndexSpec {
  fn from_iter<I: IntoIterator<Item = IndexEntry>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

/// Expands templates against the set of concrete node paths of one device.
#[derive(Debug, Clone, Copy)]
pub struct QuantGenerator<'a> {
  paths: &'a [String],
}

impl<'a> QuantGenerator<'a> {
  /// `paths` are normalized node paths (see [`normalize_path`]).
  pub fn new(paths: &'a [String]) -> Self {
    Self { paths }
  }

  /// Number of distinct values the wildcard at `position` takes on the device.
  pub fn cardinality(&self, template: &str, position: usize) -> usize {
    let pieces: Vec<&str> = template.split('*').collect();
    if position + 1 >= pieces.len() {
      return 0;
    }
    let regex = match prefix_regex(&pieces[..=position + 1]) {
      Ok(regex) => regex,
      Err(e) => {
        tracing::warn!(%template, error = %e, "Cannot build wildcard matcher");
        return 0;
      }
    };
    let values: BTreeSet<u64> = self
      .paths
      .iter()
      .filter_map(|path| regex.captures(path))
      .filter_map(|captures| captures.get(1))
      .filter_map(|m| m.as_str().parse().ok())
      .collect();
    values.len()
  }

  /// Every concrete path the template stands for, in cartesian order with
  /// the leftmost wildcard varying slowest.
  pub fn expand(&self, template: &str, spec: &IndexSpec) -> Vec<String> {
    let template = normalize_path(template);
    let pieces: Vec<&str> = template.split('*').collect();
    let wildcards = pieces.len() - 1;
    if wildcards == 0 {
      return vec![template];
    }

    let counts: Vec<usize> = (0..wildcards)
      .map(|position| match spec.entry(position) {
        IndexEntry::Fixed(n) => n,
        IndexEntry::Dev => self.cardinality(&template, position),
      })
      .collect();
    tracing::trace!(%template, ?counts, "Resolved wildcard cardinalities");

    let mut combinations: Vec<Vec<usize>> = vec![Vec::new()];
    for &count in &counts {
      combinations = combinations
        .into_iter()
        .flat_map(|prefix| {
          (0..count).map(move |index| {
            let mut next = prefix.clone();
            next.push(index);
            next
          })
        })
        .collect();
    }

    combinations
      .iter()
      .map(|indexes| {
        let mut path = String::from(pieces[0]);
        for (index, piece) in indexes.iter().zip(&pieces[1..]) {
          path.push_str(&index.to_string());
          path.push_str(piece);
        }
        path
      })
      .collect()
  }
}

/// Matches the template up to its last wildcard, capturing that wildcard.
fn prefix_regex(pieces: &[&str]) -> Result<Regex, regex::Error> {
  let last = pieces.len() - 1;
  let mut pattern = String::from("^");
  for (i, piece) in pieces.iter().enumerate() {
    if i == last {
      pattern.push_str("([0-9]+)");
    } else if i > 0 {
      pattern.push_str("[0-9]+");
    }
    if i < last {
      pattern.push_str(&regex::escape(piece));
    }
  }
  pattern.push_str("(?:/|$)");
  RegexBuilder::new(&pattern).case_insensitive(true).build()
}

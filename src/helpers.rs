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

//! String and pattern utilities shared by the generation pipeline.
//!
//! Paths handled here are always device-relative: the `/devNNNN` prefix a
//! node tree carries is removed by [`normalize_path`] before anything else
//! looks at them.

use regex::Regex;
use regex::RegexBuilder;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Placeholder substituted with captured index values in section and group names.
pub const INDEX_PLACEHOLDER: &str = "<n>";

/// Returns `true` if `segment` is a non-empty run of ASCII digits.
pub fn is_index(segment: &str) -> bool {
  !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Splits a path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
  path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Normalizes a node path to its lowercase, device-relative form.
///
/// `/DEV1234/QACHANNELS/0/CENTERFREQ` becomes `qachannels/0/centerfreq`.
pub fn normalize_path(path: &str) -> String {
  let mut parts = segments(path);
  if let Some(first) = parts.first() {
    let lower = first.to_ascii_lowercase();
    if lower.strip_prefix("dev").is_some_and(is_index) {
      parts.remove(0);
    }
  }
  parts.join("/").to_lowercase()
}

/// The device command for a normalized path: uppercase, no leading slash.
pub fn command_path(path: &str) -> String {
  segments(path).join("/").to_uppercase()
}

/// Values of all purely numeric segments, in path order.
pub fn index_values(path: &str) -> Vec<&str> {
  segments(path).into_iter().filter(|s| is_index(s)).collect()
}

/// Splits an option description following the `"name": description` convention.
///
/// Returns the extracted name (quotes removed), if any, and the description.
pub fn enum_description(value: &str) -> (Option<String>, String) {
  match value.split_once(": ") {
    Some((name, description)) => {
      let name = name.trim().trim_matches('"').trim();
      if name.is_empty() {
        (None, value.trim().to_string())
      } else {
        (Some(name.to_string()), description.trim().to_string())
      }
    }
    None => (None, value.trim().to_string()),
  }
}

/// Builds the HTML tooltip shown by the host platform.
pub fn tooltip(description: &str, options: &[String], node: Option<&str>) -> String {
  let mut body = format!("<p>{}</p>", description.trim());
  if !options.is_empty() {
    body.push_str("<ul>");
    for option in options {
      body.push_str(&format!("<li>{option}</li>"));
    }
    body.push_str("</ul>");
  }
  if let Some(node) = node {
    body.push_str(&format!("<p><b>{}</b></p>", node.trim()));
  }
  format!("<html><body>{body}</body></html>")
}

/// Wraps free text into tooltip HTML unless it already is.
pub fn ensure_tooltip(text: &str, node: Option<&str>) -> String {
  if text.trim_start().starts_with("<html>") {
    text.to_string()
  } else {
    tooltip(text, &[], node)
  }
}

/// Renders a document value the way the host platform's INI files expect.
pub fn setting_value(value: &serde_json::Value) -> String {
  match value {
    serde_json::Value::String(s) => s.clone(),
    serde_json::Value::Bool(true) => "True".to_string(),
    serde_json::Value::Bool(false) => "False".to_string(),
    serde_json::Value::Null => String::new(),
    other => other.to_string(),
  }
}

/// One unit of an fnmatch-style glob.
#[derive(Debug, Clone, PartialEq, Eq)]
enum GlobToken {
  Literal(char),
  /// `*`
  Star,
  /// `?`
  Any,
  /// `[...]`: single characters and inclusive ranges.
  Class { negated: bool, items: Vec<(char, char)> },
}

/// Splits a glob the way fnmatch reads it. A `]` right after `[` or `[!`
/// belongs to the class, and an unterminated `[` is a literal.
fn tokenize(pattern: &str) -> Vec<GlobToken> {
  let chars: Vec<char> = pattern.chars().collect();
  let mut tokens = Vec::new();
  let mut i = 0;
  while i < chars.len() {
    match chars[i] {
      '*' => tokens.push(GlobToken::Star),
      '?' => tokens.push(GlobToken::Any),
      '[' => {
        let mut j = i + 1;
        if j < chars.len() && chars[j] == '!' {
          j += 1;
        }
        if j < chars.len() && chars[j] == ']' {
          j += 1;
        }
        while j < chars.len() && chars[j] != ']' {
          j += 1;
        }
        if j >= chars.len() {
          tokens.push(GlobToken::Literal('['));
        } else {
          let body = &chars[i + 1..j];
          let (negated, body) = match body.split_first() {
            Some((&'!', rest)) => (true, rest),
            _ => (false, body),
          };
          tokens.push(GlobToken::Class {
            negated,
            items: class_items(body),
          });
          i = j;
        }
      }
      c => tokens.push(GlobToken::Literal(c)),
    }
    i += 1;
  }
  tokens
}

/// `a-z` is a range unless the `-` is first or last. Reversed ranges match nothing.
fn class_items(body: &[char]) -> Vec<(char, char)> {
  let mut items = Vec::new();
  let mut k = 0;
  while k < body.len() {
    if k + 2 < body.len() && body[k + 1] == '-' {
      if body[k] <= body[k + 2] {
        items.push((body[k], body[k + 2]));
      }
      k += 3;
    } else {
      items.push((body[k], body[k]));
      k += 1;
    }
  }
  items
}

/// Translates an fnmatch-style glob into an anchored, case-insensitive regex.
///
/// `*` matches any run of characters (including `/`), `?` a single
/// character, `[seq]` and `[!seq]` character classes. Every class member is
/// escaped, so `^`, `[`, `&&`, `--` and `~~` stay literal.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
  let mut out = String::from("^");
  for token in tokenize(pattern) {
    match token {
      GlobToken::Star => out.push_str(".*"),
      GlobToken::Any => out.push('.'),
      GlobToken::Literal(c) => out.push_str(&regex::escape(&c.to_string())),
      GlobToken::Class { negated, items } if items.is_empty() => {
        // An empty class never matches; its negation matches anything.
        out.push_str(if negated { "." } else { "[a&&b]" });
      }
      GlobToken::Class { negated, items } => {
        out.push('[');
        if negated {
          out.push('^');
        }
        for (lo, hi) in items {
          out.push_str(&regex::escape(&lo.to_string()));
          if hi != lo {
            out.push('-');
            out.push_str(&regex::escape(&hi.to_string()));
          }
        }
        out.push(']');
      }
    }
  }
  out.push('$');
  RegexBuilder::new(&out).case_insensitive(true).build()
}

/// Glob patterns compiled once and reused across lookups.
#[derive(Debug, Default)]
pub struct PatternCache {
  compiled: RefCell<HashMap<String, Regex>>,
}

impl PatternCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Compiles `pattern`, or returns the cached regex.
  pub fn compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
    if let Some(regex) = self.compiled.borrow().get(pattern) {
      return Ok(regex.clone());
    }
    let regex = glob_to_regex(pattern)?;
    self
      .compiled
      .borrow_mut()
      .insert(pattern.to_string(), regex.clone());
    Ok(regex)
  }

  /// Returns `true` if `text` matches the glob `pattern`.
  ///
  /// Patterns are validated when the settings document is loaded, so an
  /// invalid one here only logs and never matches.
  pub fn is_match(&self, pattern: &str, text: &str) -> bool {
    match self.compile(pattern) {
      Ok(regex) => regex.is_match(text),
      Err(e) => {
        tracing::warn!(%pattern, error = %e, "Skipping invalid glob pattern");
        false
      }
    }
  }

  /// Returns `true` if `text` matches any of `patterns`.
  pub fn matches_any<'a>(&self, text: &str, patterns: impl IntoIterator<Item = &'a String>) -> bool {
    patterns.into_iter().any(|p| self.is_match(p, text))
  }

  /// Finds the most specific pattern matching `text`.
  ///
  /// Specificity is the number of literal characters in the pattern. Ties go
  /// to the entry that comes first in iteration order, which for the
  /// settings document is declaration order.
  pub fn best_match<'a, V>(
    &self,
    text: &str,
    entries: impl IntoIterator<Item = (&'a String, V)>,
  ) -> Option<(&'a String, V)> {
    let mut best: Option<(usize, &'a String, V)> = None;
    for (pattern, value) in entries {
      if !self.is_match(pattern, text) {
        continue;
      }
      let score = specificity(pattern);
      if best.as_ref().is_none_or(|(top, _, _)| score > *top) {
        best = Some((score, pattern, value));
      }
    }
    best.map(|(_, pattern, value)| (pattern, value))
  }

  pub fn len(&self) -> usize {
    self.compiled.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Number of literal characters in a glob. Wildcards and whole `[...]`
/// classes count for nothing, so an exact path beats any class covering it.
pub fn specificity(pattern: &str) -> usize {
  tokenize(pattern)
    .iter()
    .filter(|token| matches!(token, GlobToken::Literal(_)))
    .count()
}

/// Returns `true` if a settings document key names the family of `device`.
///
/// Matching is a case-insensitive prefix tolerant of a trailing numeric model
/// suffix, so `SHFQA4` and `shfqa2` both resolve to `SHFQA`.
pub fn family_matches(key: &str, device: &str) -> bool {
  let key = key.to_ascii_uppercase();
  let device = device.to_ascii_uppercase();
  match device.strip_prefix(key.as_str()) {
    Some(rest) => rest.is_empty() || is_index(rest),
    None => false,
  }
}

/// Substitutes each `<n>` in `template` with the next numeric segment of `path`.
///
/// Placeholders beyond the available indexes are left in place.
pub fn substitute_indexes(template: &str, path: &str) -> String {
  let mut values = index_values(path).into_iter();
  let mut out = String::with_capacity(template.len());
  let mut rest = template;
  while let Some(pos) = rest.find(INDEX_PLACEHOLDER) {
    out.push_str(&rest[..pos]);
    match values.next() {
      Some(value) => out.push_str(value),
      None => out.push_str(INDEX_PLACEHOLDER),
    }
    rest = &rest[pos + INDEX_PLACEHOLDER.len()..];
  }
  out.push_str(rest);
  out
}

/// Orders paths segment by segment, comparing digit runs numerically.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
  let left = segments(a);
  let right = segments(b);
  for (x, y) in left.iter().zip(right.iter()) {
    let ord = natural_cmp_segment(x, y);
    if ord != Ordering::Equal {
      return ord;
    }
  }
  left.len().cmp(&right.len())
}

fn natural_cmp_segment(a: &str, b: &str) -> Ordering {
  let left = chunks(a);
  let right = chunks(b);
  for (x, y) in left.iter().zip(right.iter()) {
    let ord = match (is_index(x), is_index(y)) {
      (true, true) => {
        let xs = x.trim_start_matches('0');
        let ys = y.trim_start_matches('0');
        xs.len().cmp(&ys.len()).then_with(|| xs.cmp(ys))
      }
      _ => x.to_lowercase().cmp(&y.to_lowercase()),
    };
    if ord != Ordering::Equal {
      return ord;
    }
  }
  left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}

/// Splits a segment into alternating digit and non-digit runs.
fn chunks(s: &str) -> Vec<&str> {
  let mut out = Vec::new();
  let mut start = 0;
  let mut prev: Option<bool> = None;
  for (i, c) in s.char_indices() {
    let digit = c.is_ascii_digit();
    if prev.is_some_and(|p| p != digit) {
      out.push(&s[start..i]);
      start = i;
    }
    prev = Some(digit);
  }
  if start < s.len() {
    out.push(&s[start..]);
  }
  out
}

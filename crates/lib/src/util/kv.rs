//! The line-oriented `KEY=value` format shared by `.env`, `project.lock` and
//! `project.buildinfo`.
//!
//! One assignment per line, order-independent. Blank lines and `#` comments
//! are skipped, an optional leading `export ` is accepted, and values wrapped
//! in double quotes are unescaped (`\"`, `\\`, `\n`). Single-quoted values are
//! taken literally. A later assignment to the same key replaces an earlier one.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvError {
  #[error("line {line}: expected KEY=value, found '{content}'")]
  Malformed { line: usize, content: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvFile {
  entries: BTreeMap<String, String>,
}

impl KvFile {
  pub fn parse(text: &str) -> Result<Self, KvError> {
    let mut entries = BTreeMap::new();

    for (index, raw) in text.lines().enumerate() {
      let line = raw.trim();
      if line.is_empty() || line.starts_with('#') {
        continue;
      }
      let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

      let malformed = || KvError::Malformed {
        line: index + 1,
        content: raw.to_string(),
      };
      let (key, value) = line.split_once('=').ok_or_else(malformed)?;
      let key = key.trim();
      if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(malformed());
      }

      entries.insert(key.to_string(), unquote(value.trim()));
    }

    Ok(Self { entries })
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.entries.get(key).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

fn unquote(value: &str) -> String {
  if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
    return value[1..value.len() - 1].to_string();
  }
  if !(value.len() >= 2 && value.starts_with('"') && value.ends_with('"')) {
    return value.to_string();
  }

  let inner = &value[1..value.len() - 1];
  let mut out = String::with_capacity(inner.len());
  let mut chars = inner.chars();
  while let Some(c) = chars.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    match chars.next() {
      Some('n') => out.push('\n'),
      Some(other) => out.push(other),
      None => out.push('\\'),
    }
  }
  out
}

/// Double-quote `value`, escaping anything `parse` would otherwise interpret.
pub fn quote(value: &str) -> String {
  let mut out = String::with_capacity(value.len() + 2);
  out.push('"');
  for c in value.chars() {
    match c {
      '"' => out.push_str("\\\""),
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      other => out.push(other),
    }
  }
  out.push('"');
  out
}

/// Render `KEY=value` lines in the given order.
pub fn render<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> String
where
  K: AsRef<str>,
  V: AsRef<str>,
{
  let mut out = String::new();
  for (key, value) in pairs {
    out.push_str(key.as_ref());
    out.push('=');
    out.push_str(value.as_ref());
    out.push('\n');
  }
  out
}

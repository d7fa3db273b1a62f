//! Terminal output for devcell commands.
//!
//! Every status line is a [`Mark`] followed by a message. Marks are coloured
//! only when the stream they go to supports it. `--output json` skips all of
//! this and goes through [`print_json`].

use std::fmt::Display;
use std::io::{self, Write};
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream, Style};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

/// Leading symbol of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
  Done,
  Failed,
  Caution,
  Note,
  Removed,
}

impl Mark {
  fn symbol(self) -> &'static str {
    match self {
      Mark::Done => "✓",
      Mark::Failed => "✗",
      Mark::Caution => "⚠",
      Mark::Note => "•",
      Mark::Removed => "-",
    }
  }

  fn style(self) -> Style {
    match self {
      Mark::Done => Style::new().green(),
      Mark::Failed | Mark::Removed => Style::new().red(),
      Mark::Caution => Style::new().yellow(),
      Mark::Note => Style::new().blue(),
    }
  }

  /// Problems go to stderr.
  fn stream(self) -> Stream {
    match self {
      Mark::Failed | Mark::Caution => Stream::Stderr,
      _ => Stream::Stdout,
    }
  }

  fn indent(self) -> &'static str {
    if self == Mark::Removed { "  " } else { "" }
  }
}

fn emit(mark: Mark, message: &str) {
  let stream = mark.stream();
  let style = mark.style();
  let symbol = mark.symbol();
  let symbol = symbol.if_supports_color(stream, |s| s.style(style));
  // Problems colour the whole line, progress only its mark.
  let line = if matches!(stream, Stream::Stderr) {
    format!("{}{symbol} {}", mark.indent(), message.if_supports_color(stream, |s| s.style(style)))
  } else {
    format!("{}{symbol} {message}", mark.indent())
  };

  // Write errors (a closed pipe) are ignored.
  let _ = match stream {
    Stream::Stderr => writeln!(io::stderr().lock(), "{line}"),
    _ => writeln!(io::stdout().lock(), "{line}"),
  };
}

pub fn print_success(message: &str) {
  emit(Mark::Done, message);
}

pub fn print_error(message: &str) {
  emit(Mark::Failed, message);
}

pub fn print_warning(message: &str) {
  emit(Mark::Caution, message);
}

pub fn print_info(message: &str) {
  emit(Mark::Note, message);
}

/// One line of a removal listing, indented under its heading.
pub fn print_removed(message: &str) {
  emit(Mark::Removed, message);
}

pub fn print_stat(label: &str, value: impl Display) {
  println!("  {}: {value}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()));
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{json}");
  Ok(())
}

/// First 12 hex digits of a content hash or engine id, without any
/// `sha256:` algorithm prefix.
pub fn short_id(id: &str) -> &str {
  let digest = id.split_once(':').map_or(id, |(_, digest)| digest);
  digest.get(..12).unwrap_or(digest)
}

/// Age at second precision, e.g. `3h 12m 5s`.
pub fn format_age(age: Duration) -> String {
  humantime::format_duration(Duration::from_secs(age.as_secs())).to_string()
}

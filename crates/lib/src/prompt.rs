//! Cancellable interactive prompts.
//!
//! Reading a line from the terminal blocks, so the read runs on a blocking
//! task raced against the caller's [`Cancellation`]. When cancellation wins
//! the read is abandoned and never retried.

use std::io::{self, IsTerminal, Write};

use thiserror::Error;

use crate::cancel::Cancellation;

#[derive(Debug, Error)]
pub enum PromptError {
  #[error("cannot prompt for confirmation in non-interactive mode; use --force to proceed")]
  NotInteractive,

  #[error("failed to read input: {0}")]
  Io(#[from] io::Error),

  #[error("prompt cancelled")]
  Cancelled,
}

/// Run `read` on a blocking task unless `cancel` fires first.
///
/// `read` returns `Ok(None)` at end of input.
pub async fn read_line_with<F>(cancel: &Cancellation, read: F) -> Result<Option<String>, PromptError>
where
  F: FnOnce() -> io::Result<Option<String>> + Send + 'static,
{
  if cancel.is_cancelled() {
    return Err(PromptError::Cancelled);
  }

  let task = tokio::task::spawn_blocking(read);
  tokio::select! {
    biased;
    _ = cancel.cancelled() => Err(PromptError::Cancelled),
    joined = task => match joined {
      Ok(line) => Ok(line?),
      Err(e) => Err(PromptError::Io(io::Error::other(e))),
    },
  }
}

fn read_stdin_line() -> io::Result<Option<String>> {
  let mut input = String::new();
  match io::stdin().read_line(&mut input)? {
    0 => Ok(None),
    _ => Ok(Some(input)),
  }
}

/// Read one line from stdin.
pub async fn read_line(cancel: &Cancellation) -> Result<Option<String>, PromptError> {
  read_line_with(cancel, read_stdin_line).await
}

/// Ask a yes/no question on the terminal; anything but yes is no.
pub async fn confirm(cancel: &Cancellation, message: &str, force: bool) -> Result<bool, PromptError> {
  if force {
    return Ok(true);
  }

  if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
    return Err(PromptError::NotInteractive);
  }

  write!(io::stderr(), "{message} [y/N] ")?;
  io::stderr().flush()?;

  let answer = read_line(cancel).await?;
  Ok(answer.as_deref().is_some_and(is_yes))
}

fn is_yes(input: &str) -> bool {
  matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

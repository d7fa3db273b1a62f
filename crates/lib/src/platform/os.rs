use std::fmt;

/// Directory conventions the data/config resolution distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Windows,
  MacOs,
  /// Linux, the BSDs and anything else following the XDG base-directory layout.
  Other,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Self {
    match std::env::consts::OS {
      "windows" => Self::Windows,
      "macos" => Self::MacOs,
      _ => Self::Other,
    }
  }

  /// Whether created paths can be handed to another uid/gid.
  pub fn supports_ownership(&self) -> bool {
    !matches!(self, Self::Windows)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Windows => "windows",
      Self::MacOs => "darwin",
      Self::Other => "xdg",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// A stand-in `docker` that logs its arguments and answers from marker files
/// next to it: `built` (image exists), `running` (leader container up),
/// `exec-code` (exit status of `exec`).
#[cfg(unix)]
const FAKE_DOCKER: &str = r#"#!/bin/sh
dir="$(dirname "$0")"
echo "$*" >> "$dir/calls.log"
case "$1" in
  --version) echo "Docker version 27.0.0, build fake" ;;
  info) ;;
  image)
    if [ "$2" = "inspect" ]; then
      if [ -f "$dir/built" ]; then
        printf 'sha256:0123456789abcdef\t2026-01-01T00:00:00Z\t1024\n'
      else
        echo "Error: No such image: devcell" >&2
        exit 1
      fi
    fi
    ;;
  compose)
    for arg in "$@"; do
      if [ "$arg" = "build" ]; then touch "$dir/built"; fi
    done
    ;;
  ps)
    if [ -f "$dir/running" ]; then
      printf 'c0ffee\tdevcell-demo\tdevcell:demo\trunning\tUp 5 minutes\n'
    fi
    printf 'beef01\tunrelated\tnginx\trunning\tUp 1 day\n'
    ;;
  images)
    if [ -f "$dir/built" ]; then
      printf 'sha256:01\tdevcell\tdemo\t2026-01-01 00:00:00 +0000 UTC\t1GB\n'
    fi
    ;;
  volume)
    if [ "$2" = "ls" ]; then printf 'devcell-demo_home\tlocal\ndevcell-other_home\tlocal\n'; fi
    ;;
  network)
    if [ "$2" = "ls" ]; then printf 'n1\tdevcell-demo_default\tbridge\n'; fi
    ;;
  exec)
    if [ -f "$dir/exec-code" ]; then exit "$(cat "$dir/exec-code")"; fi
    ;;
esac
exit 0
"#;

/// Isolated test environment.
///
/// Each test gets its own home, data and config directories and a workspace
/// directory to mount into projects.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    Self { temp }
  }

  fn dir(&self, name: &str) -> PathBuf {
    let p = self.temp.path().join(name);
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn home_path(&self) -> PathBuf {
    self.dir("home")
  }

  /// XDG data root; the store lives in `devcell/` below it.
  pub fn data_path(&self) -> PathBuf {
    self.dir("data")
  }

  pub fn config_path(&self) -> PathBuf {
    self.dir("config")
  }

  /// A host directory suitable for `create --path`.
  pub fn workspace_path(&self) -> PathBuf {
    self.dir("workspace")
  }

  /// Directory holding the fake engine and its marker files.
  pub fn bin_path(&self) -> PathBuf {
    self.dir("bin")
  }

  pub fn project_dir(&self, name: &str) -> PathBuf {
    self.data_path().join("devcell").join("projects").join(name)
  }

  /// Install the fake `docker` on this environment's `PATH`.
  #[cfg(unix)]
  pub fn install_fake_docker(&self) {
    use std::os::unix::fs::PermissionsExt;

    let path = self.bin_path().join("docker");
    std::fs::write(&path, FAKE_DOCKER).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }

  /// Create or remove a marker file next to the fake engine.
  #[cfg(unix)]
  pub fn set_marker(&self, marker: &str, contents: Option<&str>) {
    let path = self.bin_path().join(marker);
    match contents {
      Some(contents) => std::fs::write(path, contents).unwrap(),
      None => {
        let _ = std::fs::remove_file(path);
      }
    }
  }

  /// Every invocation of the fake engine so far, one line each.
  #[cfg(unix)]
  pub fn engine_calls(&self) -> Vec<String> {
    std::fs::read_to_string(self.bin_path().join("calls.log"))
      .unwrap_or_default()
      .lines()
      .map(str::to_string)
      .collect()
  }

  /// Get a pre-configured Command for the devcell binary.
  ///
  /// Sets environment variables for isolated testing:
  /// - `HOME`: isolated home
  /// - `XDG_DATA_HOME` / `LOCALAPPDATA`: isolated data root
  /// - `XDG_CONFIG_HOME` / `APPDATA`: isolated config root
  /// - `PATH`: the fake engine directory first
  ///
  /// and clears `SUDO_USER` and the `DEVCELL_*` variables.
  pub fn devcell_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("devcell");
    cmd.env("HOME", self.home_path());
    cmd.env("XDG_DATA_HOME", self.data_path());
    cmd.env("XDG_CONFIG_HOME", self.config_path());
    cmd.env("LOCALAPPDATA", self.data_path()); // For Windows
    cmd.env("APPDATA", self.config_path()); // For Windows
    cmd.env_remove("SUDO_USER");
    cmd.env_remove("DEVCELL_ENGINE");
    cmd.env_remove("DEVCELL_DOTFILES_DIR");
    cmd.env_remove("RUST_LOG");

    let path = std::env::var_os("PATH").unwrap_or_default();
    let mut paths = vec![self.bin_path()];
    paths.extend(std::env::split_paths(&path));
    cmd.env("PATH", std::env::join_paths(paths).unwrap());
    cmd
  }

  /// Run `devcell create <name>` against the workspace directory.
  pub fn create_project(&self, name: &str) {
    self
      .devcell_cmd()
      .args(["create", name, "--path"])
      .arg(self.workspace_path())
      .assert()
      .success();
  }

  /// Run a command with `--output json` and parse what it printed.
  pub fn json(&self, args: &[&str]) -> serde_json::Value {
    let output = self
      .devcell_cmd()
      .args(["--output", "json"])
      .args(args)
      .output()
      .unwrap();
    assert!(
      output.status.success(),
      "devcell {args:?} failed: {}",
      String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
  }
}

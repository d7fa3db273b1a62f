//! Project file commands: create, list and their failure modes.

use predicates::prelude::*;
use serial_test::serial;

use super::common::TestEnv;

#[test]
#[serial]
fn create_writes_project_files() {
  let env = TestEnv::new();

  env
    .devcell_cmd()
    .args(["create", "demo", "--path"])
    .arg(env.workspace_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Created project demo"));

  let dir = env.project_dir("demo");
  for file in ["docker-compose.yml", ".env", "project.lock"] {
    assert!(dir.join(file).is_file(), "{file} should exist");
  }
  assert!(!dir.join("project.buildinfo").exists(), "nothing is built yet");

  let dotenv = std::fs::read_to_string(dir.join(".env")).unwrap();
  let workspace = env.workspace_path().display().to_string().replace('\\', "\\\\");
  let expected = format!("PROJECT_PATH=\"{workspace}\"");
  assert!(dotenv.contains(&expected), "{dotenv}");

  let lock = std::fs::read_to_string(dir.join("project.lock")).unwrap();
  assert!(lock.contains("VERSION="));
  assert!(lock.contains("DOCKERFILE_VERSION="));

  let root = env.data_path().join("devcell");
  assert!(root.join("Dockerfile").is_file());
  assert!(root.join("entrypoint.sh").is_file());
}

#[test]
#[serial]
fn create_passes_ports_volumes_and_env_to_compose() {
  let env = TestEnv::new();

  env
    .devcell_cmd()
    .args(["create", "web", "--path"])
    .arg(env.workspace_path())
    .args(["--port", "8080:80", "--volume", "cache:/cache", "--env", "RUST_LOG=debug"])
    .assert()
    .success();

  let compose = std::fs::read_to_string(env.project_dir("web").join("docker-compose.yml")).unwrap();
  assert!(compose.contains("8080:80"), "{compose}");
  assert!(compose.contains("cache:/cache"), "{compose}");
  assert!(compose.contains("RUST_LOG"), "{compose}");
}

#[test]
#[serial]
fn create_twice_fails_and_keeps_files() {
  let env = TestEnv::new();
  env.create_project("demo");

  let dotenv_path = env.project_dir("demo").join(".env");
  let before = std::fs::read_to_string(&dotenv_path).unwrap();

  let other = env.temp.path().join("other");
  std::fs::create_dir_all(&other).unwrap();
  env
    .devcell_cmd()
    .args(["create", "demo", "--path"])
    .arg(&other)
    .assert()
    .failure()
    .stderr(predicate::str::contains("already exists"));

  assert_eq!(std::fs::read_to_string(&dotenv_path).unwrap(), before);
}

#[test]
#[serial]
fn create_json_reports_the_project() {
  let env = TestEnv::new();
  let workspace = env.workspace_path();

  let project = env.json(&["create", "demo", "--path", workspace.to_str().unwrap()]);
  assert_eq!(project["name"], "demo");
  assert_eq!(project["host_mount_path"], workspace.to_str().unwrap());
}

#[test]
#[serial]
fn list_shows_projects_in_name_order() {
  let env = TestEnv::new();
  env.create_project("zeta");
  env.create_project("alpha");

  let listing = env.json(&["list"]);
  let names: Vec<&str> = listing["projects"]
    .as_array()
    .unwrap()
    .iter()
    .map(|p| p["name"].as_str().unwrap())
    .collect();
  assert_eq!(names, ["alpha", "zeta"]);
  assert!(listing["failures"].as_array().unwrap().is_empty());

  env
    .devcell_cmd()
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("alpha").and(predicate::str::contains("zeta")));
}

#[test]
#[serial]
fn list_reports_unreadable_projects_separately() {
  let env = TestEnv::new();
  env.create_project("good");

  let broken = env.project_dir("broken");
  std::fs::create_dir_all(&broken).unwrap();
  std::fs::write(broken.join("project.lock"), "VERSION=not-a-version\n").unwrap();

  let listing = env.json(&["list"]);
  assert_eq!(listing["projects"].as_array().unwrap().len(), 1);
  let failures = listing["failures"].as_array().unwrap();
  assert_eq!(failures.len(), 1);
  assert_eq!(failures[0]["name"], "broken");

  env
    .devcell_cmd()
    .arg("list")
    .assert()
    .success()
    .stderr(predicate::str::contains("broken"));
}

#[test]
#[serial]
fn rm_without_force_needs_a_terminal() {
  let env = TestEnv::new();
  env.create_project("demo");

  env
    .devcell_cmd()
    .args(["rm", "demo"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("non-interactive"));

  assert!(env.project_dir("demo").is_dir());
}

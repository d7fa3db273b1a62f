//! Commands that drive the engine, run against the fake `docker` from
//! `common.rs`.

use predicates::prelude::*;
use serial_test::serial;

use super::common::TestEnv;

fn env_with_project() -> TestEnv {
  let env = TestEnv::new();
  env.install_fake_docker();
  env.create_project("demo");
  env
}

#[test]
#[serial]
fn build_records_the_build() {
  let env = env_with_project();

  env
    .devcell_cmd()
    .args(["build", "demo"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Built devcell:demo"));

  let info = std::fs::read_to_string(env.project_dir("demo").join("project.buildinfo")).unwrap();
  assert!(info.contains("CONTAINER_ENGINE=docker"), "{info}");
  assert!(info.contains("CONTAINER_ENGINE_VERSION=27.0.0"), "{info}");
  assert!(env.data_path().join("devcell").join("machine-id").is_file());
  assert!(env.data_path().join("devcell").join("dotfiles").is_dir());

  let calls = env.engine_calls();
  assert!(
    calls.iter().any(|c| c.starts_with("compose -p devcell-demo") && c.ends_with("build")),
    "{calls:?}"
  );
}

#[test]
#[serial]
fn build_skips_an_up_to_date_image_unless_forced() {
  let env = env_with_project();
  env.devcell_cmd().args(["build", "demo"]).assert().success();

  env
    .devcell_cmd()
    .args(["build", "demo"])
    .assert()
    .success()
    .stdout(predicate::str::contains("up to date"));

  let builds = |env: &TestEnv| env.engine_calls().iter().filter(|c| c.ends_with(" build")).count();
  assert_eq!(builds(&env), 1);

  env.devcell_cmd().args(["build", "demo", "--force"]).assert().success();
  assert_eq!(builds(&env), 2);
}

#[test]
#[serial]
fn editing_compose_triggers_a_rebuild() {
  let env = env_with_project();
  env.devcell_cmd().args(["build", "demo"]).assert().success();

  let compose = env.project_dir("demo").join("docker-compose.yml");
  let mut text = std::fs::read_to_string(&compose).unwrap();
  text.push_str("# local edit\n");
  std::fs::write(&compose, text).unwrap();

  let status = env.json(&["status", "demo"]);
  assert_eq!(status["freshness"]["state"], "stale");
  assert_eq!(status["freshness"]["reason"], "compose_changed");

  env
    .devcell_cmd()
    .args(["build", "demo"])
    .assert()
    .success()
    .stdout(predicate::str::contains("compose file changed"));
}

#[test]
#[serial]
fn status_reports_build_and_containers() {
  let env = env_with_project();

  let status = env.json(&["status", "demo"]);
  assert_eq!(status["freshness"]["state"], "never_built");
  assert!(status["build"].is_null());

  env.devcell_cmd().args(["build", "demo"]).assert().success();
  env.set_marker("running", Some(""));

  let status = env.json(&["status", "demo"]);
  assert_eq!(status["freshness"]["state"], "current");
  assert_eq!(status["engine"]["name"], "docker");
  assert_eq!(status["build"]["engine_name"], "docker");
  assert_eq!(status["image"]["id"], "sha256:0123456789abcdef");

  let containers = status["containers"].as_array().unwrap();
  assert_eq!(containers.len(), 1, "unrelated containers are filtered out");
  assert_eq!(containers[0]["name"], "devcell-demo");
}

#[test]
#[serial]
fn run_requires_a_build() {
  let env = env_with_project();

  env
    .devcell_cmd()
    .args(["run", "demo", "--", "true"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("has not been built"));
}

#[test]
#[serial]
fn run_starts_a_one_shot_container() {
  let env = env_with_project();
  env.devcell_cmd().args(["build", "demo"]).assert().success();

  env.devcell_cmd().args(["run", "demo", "--", "cargo", "test"]).assert().success();

  let calls = env.engine_calls();
  let run = calls.iter().find(|c| c.contains(" run --rm ")).expect("compose run");
  assert!(run.ends_with("dev cargo test"), "{run}");
  assert!(!run.contains("--name"), "one-shot runs are not the leader: {run}");
}

#[test]
#[serial]
fn run_joins_the_running_leader_and_keeps_its_exit_code() {
  let env = env_with_project();
  env.set_marker("running", Some(""));
  env.set_marker("exec-code", Some("7"));

  env.devcell_cmd().args(["run", "demo", "--", "ls"]).assert().code(7);

  let calls = env.engine_calls();
  assert!(calls.iter().any(|c| c == "exec -i c0ffee ls"), "{calls:?}");
  assert!(!calls.iter().any(|c| c.contains(" run --rm ")), "{calls:?}");
}

#[test]
#[serial]
fn rm_removes_engine_resources_and_files() {
  let env = env_with_project();
  env.devcell_cmd().args(["build", "demo"]).assert().success();
  env.set_marker("running", Some(""));

  env
    .devcell_cmd()
    .args(["rm", "demo", "--force"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Removed project demo"));

  assert!(!env.project_dir("demo").exists());

  let calls = env.engine_calls();
  for expected in [
    "rm --force c0ffee",
    "image rm devcell:demo",
    "volume rm devcell-demo_home",
    "network rm devcell-demo_default",
  ] {
    assert!(calls.iter().any(|c| c == expected), "missing '{expected}' in {calls:?}");
  }
  assert!(!calls.iter().any(|c| c.contains("devcell-other_home") && c.starts_with("volume rm")));
  assert!(!calls.iter().any(|c| c.contains("beef01")));
}

#[test]
#[serial]
fn prune_clears_the_build_cache() {
  let env = TestEnv::new();
  env.install_fake_docker();

  env.devcell_cmd().arg("prune").assert().success();
  assert!(env.engine_calls().iter().any(|c| c == "builder prune --force"));
}

#[test]
#[serial]
fn info_reports_the_engine() {
  let env = TestEnv::new();
  env.install_fake_docker();

  let info = env.json(&["info"]);
  assert_eq!(info["engine"]["name"], "docker");
  assert_eq!(info["engine"]["version"], "27.0.0");
  assert!(info["engine_error"].is_null());
  assert!(info["identity"]["owner"].is_null());
}

// tests/config_loading.rs

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;
use venvdeploy::config::{load_and_validate, load_from_path};
use venvdeploy::errors::DeployError;
use venvdeploy::types::PullPolicy;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn loads_snake_case_config() {
    let file = config_file(
        r#"
python_path = "/usr/bin/python3"
workdir = "/var/lib/venvdeploy"
python_semver = "3.11.4"
module_pull_policy = "Always"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.python_path, "/usr/bin/python3");
    assert_eq!(cfg.workdir, PathBuf::from("/var/lib/venvdeploy"));
    assert_eq!(cfg.python_semver.as_deref(), Some("3.11.4"));
    assert_eq!(cfg.module_pull_policy, PullPolicy::Always);
}

#[test]
fn accepts_camel_case_aliases() {
    let file = config_file(
        r#"
pythonPath = "python3"
workdir = "/tmp/w"
modulePullPolicy = "IfNotPresent"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.python_path, "python3");
    assert_eq!(cfg.module_pull_policy, PullPolicy::IfNotPresent);
    assert_eq!(cfg.python_semver, None);
}

#[test]
fn unknown_pull_policy_is_a_toml_error() {
    let file = config_file(
        r#"
workdir = "/tmp/w"
module_pull_policy = "Sometimes"
"#,
    );

    match load_from_path(file.path()) {
        Err(DeployError::Toml(e)) => assert!(e.to_string().contains("Sometimes")),
        other => panic!("expected Toml error, got {other:?}"),
    }
}

#[test]
fn missing_workdir_is_rejected() {
    let file = config_file(r#"python_path = "python3""#);

    match load_and_validate(file.path()) {
        Err(DeployError::Configuration(msg)) => assert!(msg.contains("workdir")),
        other => panic!("expected Configuration error, got {other:?}"),
    }
}

#[test]
fn missing_file_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.toml");

    match load_from_path(&path) {
        Err(DeployError::Path { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected Path error, got {other:?}"),
    }
}

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use venvdeploy::connector::ConnectorFactory;
use venvdeploy::env::Materializer;
use venvdeploy::errors::{DeployError, InstallStep};
use venvdeploy::exec::{
    BridgeEnd, ModuleBackend, PluginHandle, PythonBackend, bridge, launch,
};
use venvdeploy::module::{ModuleSpec, venv_python};
use venvdeploy::types::PullPolicy;
use venvdeploy_test_utils::{ConfigBuilder, init_tracing, with_timeout, write_script};

/// Stand-in for a base interpreter. It reports a version, and `-m venv`
/// lays out a `pip` that logs its arguments next to the environment plus a
/// `python` that echoes stdin back like a plugin would.
const FAKE_PYTHON: &str = r#"
if [ "$1" = "--version" ]; then
  echo "Python 3.11.4"
  exit 0
fi
if [ "$1" = "-m" ] && [ "$2" = "venv" ]; then
  mkdir -p "$3/bin"
  cat > "$3/bin/pip" <<'PIP'
#!/bin/sh
echo "$*" >> "$(dirname "$0")/../../pip.log"
if [ "$GIT_TERMINAL_PROMPT" != "0" ]; then
  echo "terminal prompts are enabled" >&2
  exit 3
fi
case "$*" in
  *example.invalid*)
    echo "fatal: repository 'https://example.invalid/missing.git/' not found" >&2
    exit 1
    ;;
esac
echo "Successfully installed"
PIP
  cat > "$3/bin/python" <<'PY'
#!/bin/sh
echo "plugin args: $*" >&2
echo "plugin cwd: $(pwd)" >&2
exec cat
PY
  chmod +x "$3/bin/pip" "$3/bin/python"
  exit 0
fi
echo "unexpected invocation: $*" >&2
exit 2
"#;

fn fake_python(dir: &Path) -> PathBuf {
    let python = dir.join("tools").join("python");
    write_script(&python, FAKE_PYTHON);
    python
}

fn pip_log(env_path: &Path) -> String {
    std::fs::read_to_string(env_path.join("pip.log")).unwrap_or_default()
}

#[tokio::test]
async fn materialize_creates_venv_and_installs_requirement() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let materializer = Materializer::new(fake_python(dir.path()), dir.path().join("envs"));
    let spec = ModuleSpec::parse("pkg@1.2.3").unwrap();

    with_timeout(materializer.materialize(&spec, PullPolicy::IfNotPresent))
        .await
        .unwrap();

    let env_path = materializer.env_path(&spec);
    assert_eq!(env_path, dir.path().join("envs").join("pkg_1.2.3"));
    assert!(venv_python(&env_path).exists());
    assert_eq!(pip_log(&env_path).trim(), "install --no-input pkg==1.2.3");

    with_timeout(materializer.materialize(&spec, PullPolicy::Always))
        .await
        .unwrap();
    let log = pip_log(&env_path);
    assert_eq!(
        log.lines().last(),
        Some("install --no-input --force-reinstall pkg==1.2.3")
    );
}

#[tokio::test]
async fn missing_repository_fails_fast_with_tool_output() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let materializer = Materializer::new(fake_python(dir.path()), dir.path());
    let spec =
        ModuleSpec::parse("pkg@git+https://example.invalid/missing.git@0123abc").unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        materializer.materialize(&spec, PullPolicy::IfNotPresent),
    )
    .await
    .expect("install against a missing repository hung");

    match result {
        Err(DeployError::Install {
            step, diagnostics, ..
        }) => {
            assert_eq!(step, InstallStep::InstallPackage);
            assert!(diagnostics.contains("not found"), "{diagnostics}");
        }
        other => panic!("expected install failure, got {other:?}"),
    }
    assert!(
        pip_log(&materializer.env_path(&spec))
            .contains("pkg @ git+https://example.invalid/missing.git@0123abc")
    );
}

#[tokio::test]
async fn venv_creation_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let python = dir.path().join("broken-python");
    write_script(&python, "echo 'No module named venv' >&2\nexit 1");
    let materializer = Materializer::new(python, dir.path());
    let spec = ModuleSpec::parse("pkg").unwrap();

    match with_timeout(materializer.materialize(&spec, PullPolicy::IfNotPresent)).await {
        Err(DeployError::Install {
            step, diagnostics, ..
        }) => {
            assert_eq!(step, InstallStep::CreateEnvironment);
            assert!(diagnostics.contains("No module named venv"));
        }
        other => panic!("expected venv failure, got {other:?}"),
    }
}

#[tokio::test]
async fn backend_creates_environment_without_installing() {
    let dir = tempfile::tempdir().unwrap();
    let backend = PythonBackend::new(fake_python(dir.path()), dir.path());
    let spec = ModuleSpec::parse("pkg@git+https://example.com/r.git@abcd123").unwrap();

    assert!(!backend.module_exists(&spec));
    with_timeout(backend.create_environment(&spec)).await.unwrap();

    let env_path = backend.module_path(&spec);
    assert_eq!(env_path, dir.path().join("pkg_abcd123"));
    assert!(backend.module_exists(&spec));
    assert!(venv_python(&env_path).exists());
    assert!(pip_log(&env_path).is_empty());
}

#[tokio::test]
async fn launch_runs_module_in_plugin_dir_with_piped_stdio() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let env_path = dir.path().join("my-plugin_latest");
    write_script(
        &venv_python(&env_path),
        "echo \"plugin args: $*\" >&2\necho \"plugin cwd: $(pwd)\" >&2\nexec cat",
    );
    let plugin_dir = dir.path().join("plugin_x");
    std::fs::create_dir(&plugin_dir).unwrap();
    let spec = ModuleSpec::parse("my-plugin").unwrap();

    let launched = launch(&spec, &env_path, &plugin_dir).unwrap();
    let mut handle = PluginHandle::new("my-plugin", launched);
    assert!(handle.pid().is_some());

    handle.write_all(b"ping\n").await.unwrap();
    let mut buf = [0u8; 5];
    with_timeout(handle.read_exact(&mut buf)).await.unwrap();
    assert_eq!(&buf, b"ping\n");

    let cwd = plugin_dir.canonicalize().unwrap();
    with_timeout(async {
        loop {
            let diagnostics = handle.diagnostics();
            if diagnostics.contains("plugin cwd:") {
                assert!(diagnostics.contains("plugin args: -m my_plugin --atp"));
                assert!(diagnostics.contains(&cwd.display().to_string()));
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    with_timeout(handle.close()).await.unwrap();
}

fn launch_script(dir: &Path, module_id: &str, body: &str) -> PluginHandle {
    let spec = ModuleSpec::parse(module_id).unwrap();
    let env_path = dir.join(format!("{}_latest", spec.name()));
    write_script(&venv_python(&env_path), body);
    let plugin_dir = dir.join(format!("plugin_{}", spec.name()));
    std::fs::create_dir_all(&plugin_dir).unwrap();
    PluginHandle::new(module_id, launch(&spec, &env_path, &plugin_dir).unwrap())
}

#[tokio::test]
async fn bridge_waits_for_a_slow_reply_after_input_ends() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let handle = launch_script(
        dir.path(),
        "slow-reply",
        "read line\nsleep 0.5\necho \"reply:$line\"",
    );
    let mut output = Vec::new();

    let end = with_timeout(bridge(handle, &b"req\n"[..], &mut output, std::future::pending()))
        .await
        .unwrap();

    assert_eq!(end, BridgeEnd::PluginFinished);
    assert_eq!(String::from_utf8(output).unwrap(), "reply:req\n");
}

#[tokio::test]
async fn bridge_returns_when_plugin_exits_before_input_ends() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let handle = launch_script(dir.path(), "says-bye", "echo bye");
    // Local input stays open for the whole test.
    let (input, _input_writer) = tokio::io::duplex(64);
    let mut output = Vec::new();

    let end = with_timeout(bridge(handle, input, &mut output, std::future::pending()))
        .await
        .unwrap();

    assert_eq!(end, BridgeEnd::PluginFinished);
    assert_eq!(String::from_utf8(output).unwrap(), "bye\n");
}

#[tokio::test]
async fn launch_without_environment_is_a_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let spec = ModuleSpec::parse("ghost").unwrap();

    let err = launch(&spec, &dir.path().join("ghost_latest"), dir.path()).unwrap_err();
    assert!(matches!(err, DeployError::Spawn { module, .. } if module == "ghost"));
}

#[tokio::test]
async fn factory_connector_deploys_end_to_end() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigBuilder::new(dir.path().join("work"))
        .python(fake_python(dir.path()))
        .build();

    let factory = ConnectorFactory::new();
    let connector = with_timeout(factory.create(&config)).await.unwrap();
    assert_eq!(
        connector.connector_dir(),
        dir.path().join("work").join("connector_3-11-4_1")
    );

    let mut handle = with_timeout(connector.deploy("echo-plugin@0.1")).await.unwrap();
    handle.write_all(b"{\"hello\":1}\n").await.unwrap();
    let mut buf = vec![0u8; 12];
    with_timeout(handle.read_exact(&mut buf)).await.unwrap();
    assert_eq!(buf, b"{\"hello\":1}\n");
    with_timeout(handle.close()).await.unwrap();

    let second = with_timeout(connector.deploy("echo-plugin@0.1")).await.unwrap();
    with_timeout(second.close()).await.unwrap();

    let env_path = connector.environment_path("echo-plugin@0.1").unwrap();
    assert_eq!(pip_log(&env_path).lines().count(), 1);

    let next = with_timeout(factory.create(&config.clone().with_python_semver("3.12.0")))
        .await
        .unwrap();
    assert_eq!(
        next.connector_dir(),
        dir.path().join("work").join("connector_3-12-0_2")
    );
}

#[tokio::test]
#[ignore = "needs a real python3 with venv and network access"]
async fn real_python_installs_and_runs_template_plugin() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigBuilder::new(dir.path()).python("python3").build();
    let connector = ConnectorFactory::new().create(&config).await.unwrap();

    let handle = connector
        .deploy("arcaflow-plugin-template-python@git+https://github.com/arcalot/arcaflow-plugin-template-python.git")
        .await
        .unwrap();
    handle.close().await.unwrap();
}

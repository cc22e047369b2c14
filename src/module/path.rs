// src/module/path.rs

use std::path::{Path, PathBuf};

use super::spec::ModuleSpec;

/// Directory holding the isolated environment for `spec` under `root`.
///
/// `root/<name>_<version-or-latest>`. Pure; the result doubles as the
/// connector's pull-cache key, so nothing else may derive environment
/// locations on its own.
pub fn resolve(root: &Path, spec: &ModuleSpec) -> PathBuf {
    root.join(format!("{}_{}", spec.name(), spec.version_or_latest()))
}

/// Subdirectory of an environment path that holds the virtualenv itself.
pub const VENV_DIR: &str = "venv";

/// Interpreter inside a module environment.
pub fn venv_python(env_path: &Path) -> PathBuf {
    venv_bin_dir(env_path).join(if cfg!(windows) { "python.exe" } else { "python" })
}

/// Package installer inside a module environment.
pub fn venv_pip(env_path: &Path) -> PathBuf {
    venv_bin_dir(env_path).join(if cfg!(windows) { "pip.exe" } else { "pip" })
}

fn venv_bin_dir(env_path: &Path) -> PathBuf {
    let bin = if cfg!(windows) { "Scripts" } else { "bin" };
    env_path.join(VENV_DIR).join(bin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_pinned_and_latest() {
        let root = Path::new("/work");
        let pinned = ModuleSpec::parse("pkg@1.2.3").unwrap();
        let latest = ModuleSpec::parse("pkg").unwrap();
        let commit = ModuleSpec::parse("pkg@git+https://example.com/r.git@abcd123").unwrap();

        assert_eq!(resolve(root, &pinned), PathBuf::from("/work/pkg_1.2.3"));
        assert_eq!(resolve(root, &latest), PathBuf::from("/work/pkg_latest"));
        assert_eq!(resolve(root, &commit), PathBuf::from("/work/pkg_abcd123"));
    }

    #[cfg(unix)]
    #[test]
    fn venv_tools_live_under_bin() {
        let env = Path::new("/work/pkg_latest");
        assert_eq!(venv_python(env), PathBuf::from("/work/pkg_latest/venv/bin/python"));
        assert_eq!(venv_pip(env), PathBuf::from("/work/pkg_latest/venv/bin/pip"));
    }
}

// src/module/spec.rs

//! Module identifier grammar.
//!
//! Two mutually exclusive forms are accepted:
//!
//! - package index: `<name>` or `<name>@<version>`
//! - version control: `<name>@<scheme>+<url>[@<commit>]`
//!
//! Anything that looks like it is reaching for the second form (it contains
//! `@<letters>+`) is held to the full version-control grammar and never falls
//! back to being read as a package-index version.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{DeployError, Result};

/// Placeholder used in environment paths for unpinned modules.
pub const LATEST: &str = "latest";

const NAME: &str = r"[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?";
const VERSION: &str = r"[A-Za-z0-9](?:[A-Za-z0-9.+!_-]*[A-Za-z0-9])?";

static PACKAGE_INDEX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?P<name>{NAME})(?:@(?P<version>{VERSION}))?$"))
        .expect("package index grammar is a valid regex")
});

static VERSION_CONTROL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<name>{NAME})@(?P<scheme>git|hg|svn|bzr)\+(?P<url>(?:https?|ssh|git|file)://(?:[^\s@/]+@)?[^\s@/]*/[^\s@]+)(?:@(?P<rev>[A-Za-z0-9._-]+))?$"
    ))
    .expect("version control grammar is a valid regex")
});

/// Anything of the shape `@<letters>+` commits the input to the
/// version-control grammar.
static VERSION_CONTROL_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[A-Za-z]+\+").expect("marker is a valid regex"));

/// Version control systems pip knows how to fetch from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VcsScheme {
    Git,
    Mercurial,
    Subversion,
    Bazaar,
}

impl VcsScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            VcsScheme::Git => "git",
            VcsScheme::Mercurial => "hg",
            VcsScheme::Subversion => "svn",
            VcsScheme::Bazaar => "bzr",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "git" => Some(VcsScheme::Git),
            "hg" => Some(VcsScheme::Mercurial),
            "svn" => Some(VcsScheme::Subversion),
            "bzr" => Some(VcsScheme::Bazaar),
            _ => None,
        }
    }
}

impl fmt::Display for VcsScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a module's package comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleSource {
    /// Resolved by name (and optional version) against the package index.
    PackageIndex,
    /// Fetched from a repository; `version` on the spec is the commit.
    VersionControl { scheme: VcsScheme, url: String },
}

/// A parsed, validated module identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleSpec {
    name: String,
    source: ModuleSource,
    version: Option<String>,
}

impl ModuleSpec {
    /// Parse a raw module identifier.
    ///
    /// Leading and trailing whitespace is ignored. Performs no IO.
    pub fn parse(raw: &str) -> Result<Self> {
        let input = raw.trim();
        let invalid = || DeployError::InvalidModuleFormat {
            input: raw.to_string(),
        };

        let spec = if VERSION_CONTROL_MARKER_RE.is_match(input) {
            let caps = VERSION_CONTROL_RE.captures(input).ok_or_else(invalid)?;
            let scheme = VcsScheme::from_token(&caps["scheme"]).ok_or_else(invalid)?;
            ModuleSpec {
                name: caps["name"].to_string(),
                source: ModuleSource::VersionControl {
                    scheme,
                    url: caps["url"].to_string(),
                },
                version: caps.name("rev").map(|m| m.as_str().to_string()),
            }
        } else {
            let caps = PACKAGE_INDEX_RE.captures(input).ok_or_else(invalid)?;
            ModuleSpec {
                name: caps["name"].to_string(),
                source: ModuleSource::PackageIndex,
                version: caps.name("version").map(|m| m.as_str().to_string()),
            }
        };

        // A literal "latest" pin would share a directory with the unpinned
        // form while asking the installer for something different.
        if spec
            .version
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case(LATEST))
        {
            return Err(invalid());
        }

        Ok(spec)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &ModuleSource {
        &self.source
    }

    /// Pinned version (package index) or commit (version control).
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn version_or_latest(&self) -> &str {
        self.version.as_deref().unwrap_or(LATEST)
    }

    pub fn is_version_control(&self) -> bool {
        matches!(self.source, ModuleSource::VersionControl { .. })
    }

    /// Name under which the package is importable, as passed to `python -m`.
    pub fn invocable_name(&self) -> String {
        self.name.replace('-', "_")
    }

    /// Requirement string handed to `pip install`.
    ///
    /// Version-control modules use the PEP 508 direct reference form so the
    /// installed distribution name is pinned to the module name.
    pub fn pip_requirement(&self) -> String {
        match (&self.source, &self.version) {
            (ModuleSource::PackageIndex, None) => self.name.clone(),
            (ModuleSource::PackageIndex, Some(version)) => format!("{}=={}", self.name, version),
            (ModuleSource::VersionControl { scheme, url }, None) => {
                format!("{} @ {}+{}", self.name, scheme, url)
            }
            (ModuleSource::VersionControl { scheme, url }, Some(commit)) => {
                format!("{} @ {}+{}@{}", self.name, scheme, url, commit)
            }
        }
    }
}

impl FromStr for ModuleSpec {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self> {
        ModuleSpec::parse(s)
    }
}

/// Renders the canonical identifier (the trimmed form that was parsed).
impl fmt::Display for ModuleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let ModuleSource::VersionControl { scheme, url } = &self.source {
            write!(f, "@{scheme}+{url}")?;
        }
        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_index_forms() {
        let spec = ModuleSpec::parse("krkn-lib-kubernetes@0.1.0").unwrap();
        assert_eq!(spec.name(), "krkn-lib-kubernetes");
        assert_eq!(spec.version(), Some("0.1.0"));
        assert_eq!(spec.source(), &ModuleSource::PackageIndex);
        assert_eq!(spec.pip_requirement(), "krkn-lib-kubernetes==0.1.0");

        let spec = ModuleSpec::parse("krkn-lib-kubernetes").unwrap();
        assert_eq!(spec.version(), None);
        assert_eq!(spec.version_or_latest(), "latest");
        assert_eq!(spec.pip_requirement(), "krkn-lib-kubernetes");
    }

    #[test]
    fn version_control_with_commit() {
        let spec = ModuleSpec::parse(
            "arcaflow-plugin-template-python@git+https://github.com/arcalot/arcaflow-plugin-template-python.git@8e43b657db73929d6f8ccb893f059bb67658523f",
        )
        .unwrap();
        assert_eq!(spec.name(), "arcaflow-plugin-template-python");
        assert_eq!(
            spec.source(),
            &ModuleSource::VersionControl {
                scheme: VcsScheme::Git,
                url: "https://github.com/arcalot/arcaflow-plugin-template-python.git".to_string(),
            }
        );
        assert_eq!(spec.version(), Some("8e43b657db73929d6f8ccb893f059bb67658523f"));
        assert_eq!(spec.invocable_name(), "arcaflow_plugin_template_python");
    }

    #[test]
    fn version_control_ssh_userinfo_is_not_a_commit() {
        let spec = ModuleSpec::parse("plugin@git+ssh://git@github.com/org/plugin.git").unwrap();
        assert_eq!(spec.version(), None);
        assert_eq!(
            spec.pip_requirement(),
            "plugin @ git+ssh://git@github.com/org/plugin.git"
        );

        let spec =
            ModuleSpec::parse("plugin@git+ssh://git@github.com/org/plugin.git@v1.2").unwrap();
        assert_eq!(spec.version(), Some("v1.2"));
        assert_eq!(
            spec.pip_requirement(),
            "plugin @ git+ssh://git@github.com/org/plugin.git@v1.2"
        );
    }

    #[test]
    fn display_is_canonical() {
        let raw = "  pkg@hg+https://example.com/repo@abc123 \n";
        let spec = ModuleSpec::parse(raw).unwrap();
        assert_eq!(spec.to_string(), raw.trim());
        assert_eq!(ModuleSpec::parse(&spec.to_string()).unwrap(), spec);
    }

    #[test]
    fn rejects_mixed_and_malformed_input() {
        for raw in [
            "https://arcalot.io",
            "",
            "   ",
            "pkg@",
            "@1.0",
            "pkg@git+",
            "pkg@git+notaurl",
            "pkg@git+https://example.com",
            "pkg@foo+https://example.com/r.git",
            "pkg@1.0@2.0",
            "my pkg",
            "pkg@latest",
            "pkg@git+https://example.com/r.git@LATEST",
        ] {
            match ModuleSpec::parse(raw) {
                Err(DeployError::InvalidModuleFormat { input }) => assert_eq!(input, raw),
                other => panic!("expected InvalidModuleFormat for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn error_message_names_both_forms() {
        let err = ModuleSpec::parse("https://arcalot.io").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("wrong module name format"));
        assert!(msg.contains("<module-name>[@<version>]"));
        assert!(msg.contains("<module-name>@<scheme>+<repo_url>[@<commit>]"));
    }
}

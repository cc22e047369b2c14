use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// When a connector (re)installs a module into its environment.
///
/// - `IfNotPresent`: materialize once per connector; later deploys of the
///   same environment reuse it (default behaviour).
/// - `Always`: recreate the environment and force a reinstall on every
///   deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum PullPolicy {
    Always,
    #[default]
    IfNotPresent,
}

impl PullPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullPolicy::Always => "Always",
            PullPolicy::IfNotPresent => "IfNotPresent",
        }
    }
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PullPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "always" => Ok(PullPolicy::Always),
            "ifnotpresent" => Ok(PullPolicy::IfNotPresent),
            other => Err(format!(
                "invalid module pull policy: {other} (expected \"Always\" or \"IfNotPresent\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_policy_spellings() {
        assert_eq!("Always".parse::<PullPolicy>(), Ok(PullPolicy::Always));
        assert_eq!("if-not-present".parse::<PullPolicy>(), Ok(PullPolicy::IfNotPresent));
        assert_eq!(" IfNotPresent ".parse::<PullPolicy>(), Ok(PullPolicy::IfNotPresent));
        assert!("sometimes".parse::<PullPolicy>().is_err());
    }

    #[test]
    fn default_is_if_not_present() {
        assert_eq!(PullPolicy::default(), PullPolicy::IfNotPresent);
    }
}

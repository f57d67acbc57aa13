//! # Validator Configuration
//!
//! Optional YAML file controlling where the rule set and its external
//! references come from:
//!
//! ```yaml
//! schema: schemas/en10168.schema.json
//! references:
//!   https://schemas.s1seven.com/schema-definitions/: vendor/schema-definitions
//! network:
//!   enabled: false
//!   timeout_secs: 30
//! ```
//!
//! Relative paths are resolved against the directory of the configuration
//! file. `EN10168_ALLOW_NETWORK` and `EN10168_FETCH_TIMEOUT_SECS` override
//! the `network` section.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable enabling HTTP reference fetching.
pub const ENV_ALLOW_NETWORK: &str = "EN10168_ALLOW_NETWORK";
/// Environment variable overriding the fetch timeout in seconds.
pub const ENV_FETCH_TIMEOUT_SECS: &str = "EN10168_FETCH_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const POSITIVE_TIMEOUT: &str = "expected a positive number of seconds";

/// Configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config '{path}': {field}: {reason}")]
    Invalid {
        path: String,
        field: String,
        reason: String,
    },

    #[error("invalid value '{value}' for {variable}: {reason}")]
    Environment {
        variable: String,
        value: String,
        reason: String,
    },
}

/// Where the rule set and its references are loaded from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Rule-set file replacing the bundled EN 10168 schema.
    pub schema: Option<PathBuf>,
    /// URI prefix → local directory holding a mirror of that prefix.
    pub references: BTreeMap<String, PathBuf>,
    pub network: NetworkConfig,
}

/// HTTP fetching of external references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Off by default: the bundled references and mirrors are used instead.
    pub enabled: bool,
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ValidatorConfig {
    /// Load a configuration file. Relative paths inside it are rebased onto
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        if config.network.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                path: path.display().to_string(),
                field: "network.timeout_secs".into(),
                reason: POSITIVE_TIMEOUT.into(),
            });
        }

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.rebase(base);
        tracing::debug!(path = %path.display(), "loaded validator config");
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        if let Some(schema) = &self.schema {
            if schema.is_relative() {
                self.schema = Some(base.join(schema));
            }
        }
        for dir in self.references.values_mut() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its
    /// value.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup(ENV_ALLOW_NETWORK) {
            self.network.enabled = parse_flag(&raw).ok_or_else(|| ConfigError::Environment {
                variable: ENV_ALLOW_NETWORK.into(),
                value: raw.clone(),
                reason: "expected true/false, yes/no, on/off or 1/0".into(),
            })?;
        }
        if let Some(raw) = lookup(ENV_FETCH_TIMEOUT_SECS) {
            self.network.timeout_secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::Environment {
                    variable: ENV_FETCH_TIMEOUT_SECS.into(),
                    value: raw.clone(),
                    reason: POSITIVE_TIMEOUT.into(),
                })?;
        }
        Ok(self)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_are_offline() {
        let config = ValidatorConfig::default();
        assert!(config.schema.is_none());
        assert!(config.references.is_empty());
        assert!(!config.network.enabled);
        assert_eq!(config.network.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn zero_timeout_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("en10168.yaml");
        std::fs::write(&path, "network:\n  enabled: true\n  timeout_secs: 0\n").unwrap();

        let err = ValidatorConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "network.timeout_secs"));
        assert!(err.to_string().contains("expected a positive number of seconds"));
    }

    #[test]
    fn load_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("en10168.yaml");
        std::fs::write(
            &path,
            "schema: schemas/custom.json\n\
             references:\n  \
               https://schemas.s1seven.com/schema-definitions/: vendor/defs\n  \
               https://example.com/: /opt/mirror\n\
             network:\n  enabled: true\n",
        )
        .unwrap();

        let config = ValidatorConfig::load(&path).unwrap();
        assert_eq!(config.schema, Some(dir.path().join("schemas/custom.json")));
        assert_eq!(
            config.references["https://schemas.s1seven.com/schema-definitions/"],
            dir.path().join("vendor/defs")
        );
        assert_eq!(config.references["https://example.com/"], PathBuf::from("/opt/mirror"));
        assert!(config.network.enabled);
        assert_eq!(config.network.timeout_secs, 30);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "network:\n  enabled: true\n  retries: 3\n").unwrap();
        assert!(matches!(ValidatorConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ValidatorConfig::load(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn environment_overrides_network_section() {
        let config = ValidatorConfig::default()
            .with_overrides(lookup(&[
                (ENV_ALLOW_NETWORK, "Yes"),
                (ENV_FETCH_TIMEOUT_SECS, " 5 "),
            ]))
            .unwrap();
        assert!(config.network.enabled);
        assert_eq!(config.network.timeout(), Duration::from_secs(5));

        let unchanged = ValidatorConfig::default().with_overrides(lookup(&[])).unwrap();
        assert_eq!(unchanged, ValidatorConfig::default());
    }

    #[test]
    fn bad_environment_values_are_rejected() {
        let err = ValidatorConfig::default()
            .with_overrides(lookup(&[(ENV_ALLOW_NETWORK, "sometimes")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Environment { ref variable, .. } if variable == ENV_ALLOW_NETWORK));

        let err = ValidatorConfig::default()
            .with_overrides(lookup(&[(ENV_FETCH_TIMEOUT_SECS, "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("positive number"));
    }
}

//! # en10168-cli — Command-Line Certificate Validation
//!
//! Provides the `en10168` binary so certificate files can be checked from
//! CI the same way the library checks them.
//!
//! ## Subcommands
//!
//! - `en10168 validate <FILES…>`: validate certificates (JSON or YAML);
//!   exit code 0 when every file is valid, 1 otherwise.
//! - `en10168 check-schema`: compile the rule set and report its size, so
//!   a broken rule set fails CI before any certificate is looked at.
//!
//! ```bash
//! en10168 validate certificates/*.json --format json
//! en10168 --config en10168.yaml check-schema --schema schema.json
//! ```

pub mod check_schema;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use en10168_schema::{CertificateValidator, ValidatorConfig};

/// Build the validator from an optional config file, environment
/// overrides and an optional `--schema` override, in that order of
/// increasing precedence.
pub fn load_validator(config: Option<&Path>, schema: Option<&Path>) -> Result<CertificateValidator> {
    let config = load_config(config, schema)?;
    CertificateValidator::from_config(&config).context("failed to compile the certificate rule set")
}

fn load_config(config: Option<&Path>, schema: Option<&Path>) -> Result<ValidatorConfig> {
    let mut config = match config {
        Some(path) => ValidatorConfig::load(path)?,
        None => ValidatorConfig::default(),
    }
    .with_env_overrides()?;
    if let Some(schema) = schema {
        config.schema = Some(schema.to_path_buf());
    }
    tracing::debug!(?config, "validator configuration");
    Ok(config)
}

//! # EN 10168 Certificate Validator
//!
//! The bundled EN 10168 rule set and a validator built on it.
//!
//! The rule set (`schemas/en10168.schema.json`) and the chemical-element
//! definitions it references are embedded in the binary, so
//! [`CertificateValidator::en10168`] works offline. A
//! [`ValidatorConfig`] can swap in another rule-set file, point URI
//! prefixes at local mirrors, or allow fetching references over HTTP.
//!
//! ## RefSchemaUrl
//!
//! Certificates name the rule-set version they were written against in
//! their top-level `RefSchemaUrl`
//! (`https://schemas.s1seven.com/en10168-schemas/<version>/schema.json`).
//! [`CertificateValidator::check_ref_schema_url`] compares it with the
//! `$id` of the compiled rule set. A mismatch is not a violation: the
//! caller decides whether to warn or refuse.

use std::sync::Arc;

use en10168_core::ValidationReport;
use serde_json::Value;
use url::Url;

use crate::compile::{RuleSet, RuleSetBuilder};
use crate::config::ValidatorConfig;
use crate::document::load_document;
use crate::error::CompileError;
use crate::resolve::{ChainResolver, FileResolver, HttpResolver, ReferenceCache, StaticResolver};

/// The bundled EN 10168 rule set.
pub const EN10168_SCHEMA: &str = include_str!("../schemas/en10168.schema.json");

/// The bundled chemical-element definitions.
pub const CHEMICAL_ELEMENT_SCHEMA: &str = include_str!("../schemas/chemical-element.json");

/// Where [`CHEMICAL_ELEMENT_SCHEMA`] is published.
pub const CHEMICAL_ELEMENT_URI: &str =
    "https://schemas.s1seven.com/schema-definitions/v0.0.5/chemical-element/chemical-element.json";

/// Root under which rule-set versions are published.
pub const SCHEMA_SERVER_URL: &str = "https://schemas.s1seven.com/en10168-schemas";

/// The published URL of rule-set `version`, e.g. `v0.1.0`.
pub fn ref_schema_url(version: &str) -> String {
    format!("{SCHEMA_SERVER_URL}/{version}/schema.json")
}

fn http_resolver(timeout: std::time::Duration) -> Result<HttpResolver, CompileError> {
    HttpResolver::new(timeout).map_err(|source| CompileError::HttpClient { source })
}

/// How a certificate's `RefSchemaUrl` relates to the rule set in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefSchemaUrlCheck {
    /// The certificate names no rule-set version.
    Absent,
    /// The certificate was written against this rule set.
    Matches,
    /// The certificate names another rule set (or a non-string value).
    Differs { found: String, expected: String },
}

/// Validates certificates against a compiled rule set.
///
/// Cheap to clone; clones share the rule set.
#[derive(Debug, Clone)]
pub struct CertificateValidator {
    rule_set: Arc<RuleSet>,
}

impl CertificateValidator {
    /// Compile the bundled EN 10168 rule set without touching the network.
    ///
    /// # Errors
    ///
    /// Only fails if the bundled documents are corrupt.
    pub fn en10168() -> Result<Self, CompileError> {
        Self::from_config(&ValidatorConfig::default())
    }

    /// Compile the rule set described by `config`.
    ///
    /// References are resolved from configured mirrors first, then from the
    /// bundled documents, then over HTTP when the network is enabled. Every
    /// document lands in the process-wide [`ReferenceCache`], so a URI is
    /// fetched at most once per process.
    ///
    /// # Errors
    ///
    /// [`CompileError::SchemaLoad`] when the configured rule-set file cannot
    /// be read; any other [`CompileError`] from compilation.
    pub fn from_config(config: &ValidatorConfig) -> Result<Self, CompileError> {
        let mut builder = match &config.schema {
            None => RuleSetBuilder::new(parse_bundled("en10168.schema.json", EN10168_SCHEMA)?),
            Some(path) => {
                let schema = load_document(path).map_err(|e| CompileError::SchemaLoad {
                    source_name: e.path,
                    reason: e.reason,
                })?;
                let mut builder = RuleSetBuilder::new(schema);
                let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
                if let Ok(uri) = Url::from_file_path(&absolute) {
                    builder = builder.base_uri(uri);
                }
                builder
            }
        };

        let mut mirrors = FileResolver::new();
        for (prefix, dir) in &config.references {
            mirrors = mirrors.with_mirror(prefix.clone(), dir.clone());
        }
        let bundled = StaticResolver::new().with_document(
            CHEMICAL_ELEMENT_URI,
            parse_bundled("chemical-element.json", CHEMICAL_ELEMENT_SCHEMA)?,
        );
        let mut chain = ChainResolver::new().with(mirrors).with(bundled);
        if config.network.enabled {
            chain = chain.with(http_resolver(config.network.timeout())?);
        }
        builder = builder.resolver(chain).cache(ReferenceCache::global());

        let rule_set = builder.build()?;
        tracing::info!(
            id = rule_set.id(),
            nodes = rule_set.node_count(),
            "certificate rule set ready"
        );
        Ok(Self::from_rule_set(Arc::new(rule_set)))
    }

    /// Wrap an already compiled rule set.
    pub fn from_rule_set(rule_set: Arc<RuleSet>) -> Self {
        Self { rule_set }
    }

    pub fn rule_set(&self) -> &Arc<RuleSet> {
        &self.rule_set
    }

    /// Evaluate one certificate.
    pub fn validate(&self, certificate: &Value) -> ValidationReport {
        self.rule_set.validate(certificate)
    }

    /// Compare the certificate's `RefSchemaUrl` with the rule set's `$id`.
    pub fn check_ref_schema_url(&self, certificate: &Value) -> RefSchemaUrlCheck {
        let expected = self.rule_set.id();
        match certificate.get("RefSchemaUrl") {
            None => RefSchemaUrlCheck::Absent,
            Some(Value::String(found)) if found == expected => RefSchemaUrlCheck::Matches,
            Some(Value::String(found)) => RefSchemaUrlCheck::Differs {
                found: found.clone(),
                expected: expected.to_string(),
            },
            Some(other) => RefSchemaUrlCheck::Differs {
                found: other.to_string(),
                expected: expected.to_string(),
            },
        }
    }
}

fn parse_bundled(name: &str, text: &str) -> Result<Value, CompileError> {
    serde_json::from_str(text).map_err(|e| CompileError::SchemaLoad {
        source_name: name.to_string(),
        reason: format!("invalid JSON: {e}"),
    })
}

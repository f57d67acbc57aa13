//! # Error Types — Rule-Set Faults
//!
//! Two failure classes that are never document defects:
//!
//! - [`MalformedRuleSet`]: the rule set itself cannot be compiled (unknown
//!   keyword, invalid keyword value, unsupported dialect, meta-schema
//!   failure, dangling pointer, reference cycle).
//! - [`CompileError::ReferenceResolutionFailed`]: an external document could
//!   not be fetched or parsed.
//!
//! Both are raised by [`RuleSetBuilder::build`](crate::compile::RuleSetBuilder::build)
//! before any document is evaluated. Document defects are reported through
//! [`ValidationReport`](en10168_core::ValidationReport) instead.

use thiserror::Error;

use crate::resolve::ResolveError;

/// Compilation of a rule set failed.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The rule set is not a valid certificate rule set.
    #[error(transparent)]
    Malformed(#[from] MalformedRuleSet),

    /// An external reference could not be fetched or parsed.
    #[error("cannot resolve reference '{uri}': {source}")]
    ReferenceResolutionFailed {
        /// Absolute URI of the document that failed to resolve.
        uri: String,
        /// Underlying resolver failure.
        #[source]
        source: ResolveError,
    },

    /// The HTTP client for reference fetching could not be built.
    #[error(transparent)]
    HttpClient { source: ResolveError },

    /// The rule-set document could not be loaded.
    #[error("rule set load error for '{source_name}': {reason}")]
    SchemaLoad {
        /// File path or identifier of the rule set.
        source_name: String,
        /// Reason the rule set could not be loaded.
        reason: String,
    },
}

/// The rule set violates the supported schema subset.
///
/// Every variant carries the location (`<document>#<pointer>`) of the
/// offending schema node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRuleSet {
    #[error("unknown keyword '{keyword}' at {location}")]
    UnknownKeyword { keyword: String, location: String },

    #[error("invalid '{keyword}' at {location}: {reason}")]
    InvalidKeyword {
        keyword: String,
        location: String,
        reason: String,
    },

    #[error("unsupported dialect '{dialect}' in {document}")]
    UnsupportedDialect { dialect: String, document: String },

    #[error("{document} is not a valid schema: {reason}")]
    MetaSchema { document: String, reason: String },

    #[error("unknown format '{format}' at {location}")]
    UnknownFormat { format: String, location: String },

    #[error("invalid pattern '{pattern}' at {location}: {reason}")]
    InvalidPattern {
        pattern: String,
        location: String,
        reason: String,
    },

    #[error("reference '{reference}' at {location} cannot be resolved: {reason}")]
    UnresolvableReference {
        reference: String,
        location: String,
        reason: String,
    },

    /// A chain of references and combinators returns to a node without
    /// descending into the document.
    #[error("reference cycle through {location}")]
    ReferenceCycle { location: String },
}

/// A certificate document could not be read or parsed.
#[derive(Error, Debug)]
#[error("document load error for '{path}': {reason}")]
pub struct DocumentLoadError {
    /// Path to the document that failed to load.
    pub path: String,
    /// Reason the document could not be loaded.
    pub reason: String,
}

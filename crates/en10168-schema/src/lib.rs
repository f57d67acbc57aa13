//! # en10168-schema — Certificate Rule Set, Compiler & Evaluator
//!
//! Compiles the declarative EN 10168 certificate rule set into an explicit
//! rule tree and evaluates certificates against it, producing the full,
//! ordered list of violations.
//!
//! ## Pipeline
//!
//! - [`compile`]: [`RuleSetBuilder`] checks the dialect, meta-validates,
//!   resolves external references through a [`Resolve`] implementation and
//!   a [`ReferenceCache`], and freezes the result as a [`RuleSet`].
//! - [`evaluate`]: walks a [`RuleSet`] over a document. Pure and
//!   deterministic; a document can never make it fail.
//! - [`certificate`]: the bundled EN 10168 rule set behind
//!   [`CertificateValidator`], plus `RefSchemaUrl` checks.
//!
//! Supporting modules: [`rules`] (the rule tree), [`resolve`] (reference
//! resolvers and cache), [`format`] (string formats), [`config`]
//! ([`ValidatorConfig`]) and [`document`] (JSON/YAML loading).
//!
//! ## Crate Policy
//!
//! - Depends only on `en10168-core` internally.
//! - Strict mode: a keyword, format or dialect outside the supported set
//!   fails compilation. Nothing is silently ignored.
//! - Rule-set faults ([`CompileError`]) are raised before any document is
//!   evaluated; document defects only ever appear in a
//!   [`ValidationReport`](en10168_core::ValidationReport).

pub mod certificate;
pub mod compile;
pub mod config;
pub mod document;
pub mod error;
pub mod evaluate;
pub mod format;
pub mod resolve;
pub mod rules;

pub use certificate::{ref_schema_url, CertificateValidator, RefSchemaUrlCheck};
pub use compile::{Dialect, RuleSet, RuleSetBuilder};
pub use config::{ConfigError, NetworkConfig, ValidatorConfig};
pub use document::load_document;
pub use error::{CompileError, DocumentLoadError, MalformedRuleSet};
pub use evaluate::validate;
pub use resolve::{
    ChainResolver, FileResolver, HttpResolver, ReferenceCache, Resolve, ResolveError,
    StaticResolver,
};
pub use rules::{Node, NodeId, Rule};

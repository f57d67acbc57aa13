//! # en10168-core — Foundational Types for Certificate Validation
//!
//! Defines the types every other crate in the workspace speaks: where a
//! defect is (`JsonPointer`), what the defect is (`Violation`), and what a
//! validation run produced (`ValidationReport`).
//!
//! ## Key Design Principles
//!
//! 1. **Structured violations.** A violation is never just a string. It
//!    carries the instance location, the rule location, the rule category
//!    and rule-specific parameters, so callers can localize a defect
//!    without parsing messages.
//!
//! 2. **Wire-compatible shape.** `Violation` serializes to the same
//!    `instancePath` / `schemaPath` / `keyword` / `params` / `message`
//!    objects the certificate test-suite has always asserted against.
//!
//! 3. **`valid` cannot disagree with `errors`.** `ValidationReport` is only
//!    constructed from a violation list; validity is derived.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `en10168-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod pointer;
pub mod report;
pub mod violation;

pub use error::DocumentInvalid;
pub use pointer::{escape_token, JsonPointer};
pub use report::ValidationReport;
pub use violation::{Keyword, Violation, ViolationParams, Violations};

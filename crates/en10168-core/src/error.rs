//! # Error Types — Document-Level Failures
//!
//! A certificate that fails its rule set is the normal, expected failure
//! mode. It is reported as [`DocumentInvalid`] carrying every violation in
//! evaluation order, never just the first one.
//!
//! Faults of the rule set itself (malformed schema, unresolvable reference)
//! live with the compiler in `en10168-schema`; they are a different class of
//! error and must never be confused with a document defect.

use thiserror::Error;

use crate::violation::Violations;

/// The document did not conform to the rule set.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("document failed validation with {} violation(s):\n{violations}", .violations.len())]
pub struct DocumentInvalid {
    /// Every violation, in evaluation order.
    pub violations: Violations,
}

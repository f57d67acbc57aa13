//! # Validation Report
//!
//! The immutable result of evaluating one document against one compiled
//! rule set: `{ valid, errors }`. `valid` is derived from `errors` at
//! construction and cannot drift from it.

use serde::Serialize;

use crate::error::DocumentInvalid;
use crate::violation::{Violation, Violations};

/// Outcome of a single validation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    valid: bool,
    errors: Vec<Violation>,
}

impl ValidationReport {
    /// Build a report from the ordered violation list.
    pub fn from_violations(errors: Vec<Violation>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// True iff no violation was recorded.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Violations in evaluation order.
    pub fn errors(&self) -> &[Violation] {
        &self.errors
    }

    /// Consumes the report and returns the violations.
    pub fn into_errors(self) -> Vec<Violation> {
        self.errors
    }

    /// Convert into a `Result`, failing with every violation.
    pub fn into_result(self) -> Result<(), DocumentInvalid> {
        if self.valid {
            Ok(())
        } else {
            Err(DocumentInvalid {
                violations: Violations::from(self.errors),
            })
        }
    }
}

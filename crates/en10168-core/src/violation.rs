//! # Violations — Structured Validation Failures
//!
//! A `Violation` is one reason a certificate failed one rule. It carries
//! the instance location, the rule location, the rule category, the
//! rule-specific parameters and a human-readable message.
//!
//! ## Wire Shape
//!
//! Serialized violations are objects with the keys `instancePath`,
//! `schemaPath`, `keyword`, `params` and `message`. `params` mirrors the
//! established certificate tooling exactly (e.g. `{"missingProperty": "A06.1"}`,
//! `{"comparison": "<=", "limit": 100}`, `{"passingSchemas": null}`), so
//! golden error lists written against that tooling compare equal.

use std::fmt;

use serde::Serialize;
use serde_json::{Number, Value};

use crate::pointer::JsonPointer;

/// The category of rule that produced a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Keyword {
    Required,
    Type,
    Maximum,
    Minimum,
    ExclusiveMaximum,
    ExclusiveMinimum,
    MinItems,
    MaxItems,
    UniqueItems,
    MinLength,
    MaxLength,
    Pattern,
    Format,
    Enum,
    Const,
    Not,
    OneOf,
    AnyOf,
    AdditionalProperties,
    UnevaluatedProperties,
    /// A `false` schema was applied.
    #[serde(rename = "false schema")]
    FalseSchema,
}

impl Keyword {
    /// The keyword as it appears in schemas and serialized violations.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Type => "type",
            Self::Maximum => "maximum",
            Self::Minimum => "minimum",
            Self::ExclusiveMaximum => "exclusiveMaximum",
            Self::ExclusiveMinimum => "exclusiveMinimum",
            Self::MinItems => "minItems",
            Self::MaxItems => "maxItems",
            Self::UniqueItems => "uniqueItems",
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::Pattern => "pattern",
            Self::Format => "format",
            Self::Enum => "enum",
            Self::Const => "const",
            Self::Not => "not",
            Self::OneOf => "oneOf",
            Self::AnyOf => "anyOf",
            Self::AdditionalProperties => "additionalProperties",
            Self::UnevaluatedProperties => "unevaluatedProperties",
            Self::FalseSchema => "false schema",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule-specific detail attached to a violation.
///
/// Serialized untagged: each variant becomes the plain params object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ViolationParams {
    /// A mandated key is absent.
    Required {
        #[serde(rename = "missingProperty")]
        missing_property: String,
    },
    /// The value has the wrong JSON type. Multiple accepted types are
    /// joined with `,`.
    Type {
        #[serde(rename = "type")]
        expected: String,
    },
    /// A numeric bound was violated.
    Comparison {
        comparison: String,
        limit: Number,
    },
    /// A count bound (items, characters) was violated.
    Limit { limit: u64 },
    /// Two array items are equal; `i` is the later one, `j` the earlier.
    Duplicate { i: usize, j: usize },
    Pattern { pattern: String },
    Format { format: String },
    AllowedValues {
        #[serde(rename = "allowedValues")]
        allowed_values: Vec<Value>,
    },
    AllowedValue {
        #[serde(rename = "allowedValue")]
        allowed_value: Value,
    },
    /// `None` when no alternative matched, otherwise the first two matches.
    PassingSchemas {
        #[serde(rename = "passingSchemas")]
        passing_schemas: Option<[usize; 2]>,
    },
    AdditionalProperty {
        #[serde(rename = "additionalProperty")]
        additional_property: String,
    },
    UnevaluatedProperty {
        #[serde(rename = "unevaluatedProperty")]
        unevaluated_property: String,
    },
    /// No parameters (`anyOf`, `not`, `false` schema).
    Empty {},
}

/// A single structured reason a document failed validation against one rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Pointer to the offending node in the document.
    pub instance_path: JsonPointer,
    /// Pointer to the rule that fired, possibly rooted at an external
    /// document URI.
    pub schema_path: String,
    /// Rule category.
    pub keyword: Keyword,
    /// Rule-specific detail.
    pub params: ViolationParams,
    /// Human-readable description.
    pub message: String,
}

impl Violation {
    /// Build a violation, deriving the message from the keyword and params.
    pub fn new(
        instance_path: JsonPointer,
        schema_path: impl Into<String>,
        keyword: Keyword,
        params: ViolationParams,
    ) -> Self {
        let message = describe(keyword, &params);
        Self {
            instance_path,
            schema_path: schema_path.into(),
            keyword,
            params,
            message,
        }
    }
}

fn describe(keyword: Keyword, params: &ViolationParams) -> String {
    match (keyword, params) {
        (_, ViolationParams::Required { missing_property }) => {
            format!("must have required property '{missing_property}'")
        }
        (_, ViolationParams::Type { expected }) => format!("must be {expected}"),
        (_, ViolationParams::Comparison { comparison, limit }) => {
            format!("must be {comparison} {limit}")
        }
        (Keyword::MinItems, ViolationParams::Limit { limit }) => {
            format!("must NOT have fewer than {limit} items")
        }
        (Keyword::MaxItems, ViolationParams::Limit { limit }) => {
            format!("must NOT have more than {limit} items")
        }
        (Keyword::MinLength, ViolationParams::Limit { limit }) => {
            format!("must NOT have fewer than {limit} characters")
        }
        (_, ViolationParams::Limit { limit }) => {
            format!("must NOT have more than {limit} characters")
        }
        (_, ViolationParams::Duplicate { i, j }) => {
            format!("must NOT have duplicate items (items ## {j} and {i} are identical)")
        }
        (_, ViolationParams::Pattern { pattern }) => format!("must match pattern \"{pattern}\""),
        (_, ViolationParams::Format { format }) => format!("must match format \"{format}\""),
        (_, ViolationParams::AllowedValues { .. }) => {
            "must be equal to one of the allowed values".to_string()
        }
        (_, ViolationParams::AllowedValue { .. }) => "must be equal to constant".to_string(),
        (_, ViolationParams::PassingSchemas { .. }) => {
            "must match exactly one schema in oneOf".to_string()
        }
        (_, ViolationParams::AdditionalProperty { .. }) => {
            "must NOT have additional properties".to_string()
        }
        (_, ViolationParams::UnevaluatedProperty { .. }) => {
            "must NOT have unevaluated properties".to_string()
        }
        (Keyword::AnyOf, ViolationParams::Empty {}) => "must match a schema in anyOf".to_string(),
        (Keyword::Not, ViolationParams::Empty {}) => "must NOT be valid".to_string(),
        (_, ViolationParams::Empty {}) => "boolean schema is false".to_string(),
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_root() {
            write!(f, "  (root): {} [{}]", self.message, self.schema_path)
        } else {
            write!(f, "  {}: {} [{}]", self.instance_path, self.message, self.schema_path)
        }
    }
}

/// Ordered collection of violations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Violations {
    violations: Vec<Violation>,
}

impl Violations {
    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl From<Vec<Violation>> for Violations {
    fn from(violations: Vec<Violation>) -> Self {
        Self { violations }
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

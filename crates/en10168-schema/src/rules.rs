//! # Rule Tree
//!
//! The compiled, engine-independent form of a certificate rule set. Every
//! schema node becomes a [`Node`]: an ordered list of tagged [`Rule`]s.
//! Nodes live in an arena owned by [`RuleSet`](crate::compile::RuleSet) and
//! refer to each other through [`NodeId`], so recursive definitions need no
//! reference counting.
//!
//! ## Rule Order
//!
//! A node's rules are stored in the order they are evaluated, which is also
//! the order violations are reported in:
//!
//! 1. a leading type check,
//! 2. `$ref`, `const`, `enum`, `not`, `anyOf`, `oneOf`, `allOf`,
//! 3. number keywords, then string, array and object keywords.
//!
//! A node declaring exactly one type that also has keywords for that type
//! reports its type mismatch at the position of that keyword group instead
//! of up front. The compiler takes care of this placement.

use regex::Regex;
use serde_json::{Number, Value};

use crate::format::Format;

/// Index of a node in the rule-set arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// A JSON instance type as named in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    /// Parse a schema type name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "null" => Some(Self::Null),
            "boolean" => Some(Self::Boolean),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "string" => Some(Self::String),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    /// The schema name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Whether `value` is an instance of this type. Integers are numbers
    /// without a fractional part, whatever their textual form.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Null, Value::Null) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Number, Value::Number(_)) => true,
            (Self::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            (Self::String, Value::String(_)) => true,
            (Self::Array, Value::Array(_)) => true,
            (Self::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

/// Which side of a numeric limit a value must stay on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericBound {
    Maximum,
    Minimum,
    ExclusiveMaximum,
    ExclusiveMinimum,
}

impl NumericBound {
    /// The comparison a passing value satisfies against the limit.
    pub fn comparison(&self) -> &'static str {
        match self {
            Self::Maximum => "<=",
            Self::Minimum => ">=",
            Self::ExclusiveMaximum => "<",
            Self::ExclusiveMinimum => ">",
        }
    }

    /// Whether `value` satisfies the bound.
    pub fn holds(&self, value: f64, limit: f64) -> bool {
        match self {
            Self::Maximum => value <= limit,
            Self::Minimum => value >= limit,
            Self::ExclusiveMaximum => value < limit,
            Self::ExclusiveMinimum => value > limit,
        }
    }
}

/// Lower or upper bound on a count (items, characters).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountBound {
    Min,
    Max,
}

impl CountBound {
    pub fn holds(&self, count: u64, limit: u64) -> bool {
        match self {
            Self::Min => count >= limit,
            Self::Max => count <= limit,
        }
    }
}

/// What happens to properties a closure rule catches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closure {
    /// Every caught property is a violation (`false`).
    Reject,
    /// Every caught property is validated against a node.
    Validate(NodeId),
}

/// One compiled rule.
#[derive(Debug, Clone)]
pub enum Rule {
    TypeCheck {
        types: Vec<JsonType>,
        schema_path: String,
    },
    RequiredKeys {
        keys: Vec<String>,
        schema_path: String,
    },
    NumericBound {
        bound: NumericBound,
        limit: Number,
        schema_path: String,
    },
    /// `minLength` / `maxLength`, counted in Unicode scalar values.
    Length {
        bound: CountBound,
        limit: u64,
        schema_path: String,
    },
    Pattern {
        regex: Regex,
        schema_path: String,
    },
    Format {
        format: Format,
        schema_path: String,
    },
    /// `minItems` / `maxItems`.
    ItemCount {
        bound: CountBound,
        limit: u64,
        schema_path: String,
    },
    UniqueItems {
        schema_path: String,
    },
    /// Every array element is validated against `node`.
    Items {
        node: NodeId,
    },
    Enum {
        values: Vec<Value>,
        schema_path: String,
    },
    Const {
        value: Value,
        schema_path: String,
    },
    Properties {
        entries: Vec<(String, NodeId)>,
    },
    PatternProperties {
        entries: Vec<(Regex, NodeId)>,
    },
    /// Properties matched by neither `declared` nor `patterns` of the same node.
    AdditionalProperties {
        declared: Vec<String>,
        patterns: Vec<Regex>,
        closure: Closure,
        schema_path: String,
    },
    /// Exactly one alternative must match.
    OneOf {
        alternatives: Vec<NodeId>,
        schema_path: String,
    },
    /// At least one alternative must match.
    AnyOf {
        alternatives: Vec<NodeId>,
        schema_path: String,
    },
    /// Every member must match; no summary violation of its own.
    AllOf {
        members: Vec<NodeId>,
    },
    Not {
        node: NodeId,
        schema_path: String,
    },
    /// `unevaluatedProperties`: properties explained by no rule of this
    /// node and no matched branch below it.
    ClosureCheck {
        closure: Closure,
        schema_path: String,
    },
    /// `$ref`, local or external. `uri` is the absolute reference.
    /// `inline` targets hold no further references; their evaluated
    /// properties count even when they fail.
    Reference {
        target: NodeId,
        uri: String,
        inline: bool,
    },
    /// The `false` schema.
    Never {
        schema_path: String,
    },
}

/// A compiled schema node.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub(crate) rules: Vec<Rule>,
}

impl Node {
    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Whether the node accepts every instance (the `true` schema or `{}`).
    pub fn is_trivial(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Structural equality of JSON values, comparing numbers by value so that
/// `1` and `1.0` are equal.
pub(crate) fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(fx), Some(fy)) if x.is_f64() || y.is_f64() => fx == fy,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_equal(x, y)))
        }
        _ => a == b,
    }
}

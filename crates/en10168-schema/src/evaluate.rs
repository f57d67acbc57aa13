//! # Evaluator
//!
//! Walks a compiled [`RuleSet`] over a document and collects every
//! violation in rule order. Evaluation is pure: the same rule set and
//! document always yield the same report, and no document can make the
//! evaluator fail.
//!
//! ## Combinators
//!
//! - `allOf` evaluates every member and concatenates their violations.
//! - `anyOf` and `oneOf` evaluate every alternative (no short-circuit). When
//!   they fail, the violations of all alternatives are kept and a summary
//!   violation is added at the combinator.
//!
//! ## Evaluated Properties
//!
//! Each evaluation also reports which properties of the instance it
//! explained. `properties`, `patternProperties` and `additionalProperties`
//! explain the keys they matched; `allOf` members always contribute; a
//! `$ref` target or an `anyOf`/`oneOf` alternative contributes only when it
//! passed. `unevaluatedProperties` acts on whatever is left.

use std::collections::HashSet;

use en10168_core::{JsonPointer, Keyword, ValidationReport, Violation, ViolationParams};
use serde_json::Value;

use crate::compile::RuleSet;
use crate::rules::{json_equal, Closure, CountBound, NodeId, NumericBound, Rule};

/// Evaluate `instance` against `rule_set`.
pub fn validate(rule_set: &RuleSet, instance: &Value) -> ValidationReport {
    let outcome = Evaluator { rule_set }.node(rule_set.root(), instance, &JsonPointer::root());
    ValidationReport::from_violations(outcome.violations)
}

#[derive(Debug, Default)]
struct Evaluated<'v> {
    all: bool,
    names: HashSet<&'v str>,
}

impl<'v> Evaluated<'v> {
    fn mark(&mut self, name: &'v str) {
        if !self.all {
            self.names.insert(name);
        }
    }

    fn mark_all(&mut self) {
        self.all = true;
        self.names.clear();
    }

    fn merge(&mut self, other: Evaluated<'v>) {
        if other.all {
            self.mark_all();
        } else if !self.all {
            self.names.extend(other.names);
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.all || self.names.contains(name)
    }
}

#[derive(Debug, Default)]
struct Outcome<'v> {
    violations: Vec<Violation>,
    evaluated: Evaluated<'v>,
}

impl Outcome<'_> {
    fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    fn report(&mut self, path: &JsonPointer, schema_path: &str, keyword: Keyword, params: ViolationParams) {
        self.violations
            .push(Violation::new(path.clone(), schema_path, keyword, params));
    }
}

struct Evaluator<'r> {
    rule_set: &'r RuleSet,
}

impl Evaluator<'_> {
    fn node<'v>(&self, id: NodeId, instance: &'v Value, path: &JsonPointer) -> Outcome<'v> {
        let mut out = Outcome::default();
        for rule in self.rule_set.node(id).rules() {
            self.rule(rule, instance, path, &mut out);
        }
        out
    }

    fn rule<'v>(&self, rule: &Rule, instance: &'v Value, path: &JsonPointer, out: &mut Outcome<'v>) {
        match rule {
            Rule::TypeCheck { types, schema_path } => {
                if !types.iter().any(|t| t.matches(instance)) {
                    let expected = types.iter().map(|t| t.as_str()).collect::<Vec<_>>().join(",");
                    out.report(path, schema_path, Keyword::Type, ViolationParams::Type { expected });
                }
            }

            Rule::RequiredKeys { keys, schema_path } => {
                if let Value::Object(object) = instance {
                    for key in keys.iter().filter(|k| !object.contains_key(k.as_str())) {
                        out.report(
                            path,
                            schema_path,
                            Keyword::Required,
                            ViolationParams::Required {
                                missing_property: key.clone(),
                            },
                        );
                    }
                }
            }

            Rule::NumericBound {
                bound,
                limit,
                schema_path,
            } => {
                if let Value::Number(n) = instance {
                    if let (Some(value), Some(l)) = (n.as_f64(), limit.as_f64()) {
                        if !bound.holds(value, l) {
                            out.report(
                                path,
                                schema_path,
                                numeric_keyword(*bound),
                                ViolationParams::Comparison {
                                    comparison: bound.comparison().to_string(),
                                    limit: limit.clone(),
                                },
                            );
                        }
                    }
                }
            }

            Rule::Length {
                bound,
                limit,
                schema_path,
            } => {
                if let Value::String(s) = instance {
                    if !bound.holds(s.chars().count() as u64, *limit) {
                        let keyword = match bound {
                            CountBound::Min => Keyword::MinLength,
                            CountBound::Max => Keyword::MaxLength,
                        };
                        out.report(path, schema_path, keyword, ViolationParams::Limit { limit: *limit });
                    }
                }
            }

            Rule::Pattern { regex, schema_path } => {
                if let Value::String(s) = instance {
                    if !regex.is_match(s) {
                        out.report(
                            path,
                            schema_path,
                            Keyword::Pattern,
                            ViolationParams::Pattern {
                                pattern: regex.as_str().to_string(),
                            },
                        );
                    }
                }
            }

            Rule::Format { format, schema_path } => {
                if let Value::String(s) = instance {
                    if !format.accepts(s) {
                        out.report(
                            path,
                            schema_path,
                            Keyword::Format,
                            ViolationParams::Format {
                                format: format.as_str().to_string(),
                            },
                        );
                    }
                }
            }

            Rule::ItemCount {
                bound,
                limit,
                schema_path,
            } => {
                if let Value::Array(items) = instance {
                    if !bound.holds(items.len() as u64, *limit) {
                        let keyword = match bound {
                            CountBound::Min => Keyword::MinItems,
                            CountBound::Max => Keyword::MaxItems,
                        };
                        out.report(path, schema_path, keyword, ViolationParams::Limit { limit: *limit });
                    }
                }
            }

            Rule::UniqueItems { schema_path } => {
                if let Value::Array(items) = instance {
                    if let Some((i, j)) = first_duplicate(items) {
                        out.report(
                            path,
                            schema_path,
                            Keyword::UniqueItems,
                            ViolationParams::Duplicate { i, j },
                        );
                    }
                }
            }

            Rule::Items { node } => {
                if let Value::Array(items) = instance {
                    for (index, item) in items.iter().enumerate() {
                        let child = self.node(*node, item, &path.push_index(index));
                        out.violations.extend(child.violations);
                    }
                }
            }

            Rule::Enum { values, schema_path } => {
                if !values.iter().any(|v| json_equal(v, instance)) {
                    out.report(
                        path,
                        schema_path,
                        Keyword::Enum,
                        ViolationParams::AllowedValues {
                            allowed_values: values.clone(),
                        },
                    );
                }
            }

            Rule::Const { value, schema_path } => {
                if !json_equal(value, instance) {
                    out.report(
                        path,
                        schema_path,
                        Keyword::Const,
                        ViolationParams::AllowedValue {
                            allowed_value: value.clone(),
                        },
                    );
                }
            }

            Rule::Properties { entries } => {
                if let Value::Object(object) = instance {
                    for (name, node) in entries {
                        if let Some((key, value)) = object.get_key_value(name.as_str()) {
                            let child = self.node(*node, value, &path.push_key(key));
                            out.violations.extend(child.violations);
                            out.evaluated.mark(key);
                        }
                    }
                }
            }

            Rule::PatternProperties { entries } => {
                if let Value::Object(object) = instance {
                    for (regex, node) in entries {
                        for (key, value) in object.iter().filter(|(k, _)| regex.is_match(k)) {
                            let child = self.node(*node, value, &path.push_key(key));
                            out.violations.extend(child.violations);
                            out.evaluated.mark(key);
                        }
                    }
                }
            }

            Rule::AdditionalProperties {
                declared,
                patterns,
                closure,
                schema_path,
            } => {
                if let Value::Object(object) = instance {
                    let additional = object.iter().filter(|(key, _)| {
                        !declared.iter().any(|d| d == *key) && !patterns.iter().any(|p| p.is_match(key))
                    });
                    for (key, value) in additional {
                        self.close(*closure, key, value, path, out, |key| {
                            (
                                schema_path.as_str(),
                                Keyword::AdditionalProperties,
                                ViolationParams::AdditionalProperty {
                                    additional_property: key.to_string(),
                                },
                            )
                        });
                    }
                    out.evaluated.mark_all();
                }
            }

            Rule::OneOf {
                alternatives,
                schema_path,
            } => {
                let outcomes = self.alternatives(alternatives, instance, path);
                let passing: Vec<usize> = outcomes
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| o.is_valid())
                    .map(|(i, _)| i)
                    .collect();
                if let [only] = passing.as_slice() {
                    let matched = outcomes.into_iter().nth(*only);
                    if let Some(matched) = matched {
                        out.evaluated.merge(matched.evaluated);
                    }
                } else {
                    let passing_schemas = match passing.as_slice() {
                        [first, second, ..] => Some([*first, *second]),
                        _ => None,
                    };
                    for outcome in outcomes {
                        out.violations.extend(outcome.violations);
                    }
                    out.report(
                        path,
                        schema_path,
                        Keyword::OneOf,
                        ViolationParams::PassingSchemas { passing_schemas },
                    );
                }
            }

            Rule::AnyOf {
                alternatives,
                schema_path,
            } => {
                let outcomes = self.alternatives(alternatives, instance, path);
                if outcomes.iter().any(Outcome::is_valid) {
                    for outcome in outcomes.into_iter().filter(Outcome::is_valid) {
                        out.evaluated.merge(outcome.evaluated);
                    }
                } else {
                    for outcome in outcomes {
                        out.violations.extend(outcome.violations);
                    }
                    out.report(path, schema_path, Keyword::AnyOf, ViolationParams::Empty {});
                }
            }

            Rule::AllOf { members } => {
                for member in members {
                    let outcome = self.node(*member, instance, path);
                    out.violations.extend(outcome.violations);
                    out.evaluated.merge(outcome.evaluated);
                }
            }

            Rule::Not { node, schema_path } => {
                if self.node(*node, instance, path).is_valid() {
                    out.report(path, schema_path, Keyword::Not, ViolationParams::Empty {});
                }
            }

            Rule::ClosureCheck {
                closure,
                schema_path,
            } => {
                if let Value::Object(object) = instance {
                    if !out.evaluated.all {
                        let leftover: Vec<(&'v String, &'v Value)> = object
                            .iter()
                            .filter(|(key, _)| !out.evaluated.contains(key))
                            .collect();
                        for (key, value) in leftover {
                            self.close(*closure, key, value, path, out, |key| {
                                (
                                    schema_path.as_str(),
                                    Keyword::UnevaluatedProperties,
                                    ViolationParams::UnevaluatedProperty {
                                        unevaluated_property: key.to_string(),
                                    },
                                )
                            });
                        }
                    }
                    out.evaluated.mark_all();
                }
            }

            Rule::Reference { target, inline, .. } => {
                let outcome = self.node(*target, instance, path);
                if *inline || outcome.is_valid() {
                    out.evaluated.merge(outcome.evaluated);
                }
                out.violations.extend(outcome.violations);
            }

            Rule::Never { schema_path } => {
                out.report(path, schema_path, Keyword::FalseSchema, ViolationParams::Empty {});
            }
        }
    }

    fn alternatives<'v>(
        &self,
        alternatives: &[NodeId],
        instance: &'v Value,
        path: &JsonPointer,
    ) -> Vec<Outcome<'v>> {
        alternatives
            .iter()
            .map(|alt| self.node(*alt, instance, path))
            .collect()
    }

    /// Apply a closure to one caught property: reject it outright or
    /// validate it against the closure's schema.
    fn close<'v, 's>(
        &self,
        closure: Closure,
        key: &'v str,
        value: &'v Value,
        path: &JsonPointer,
        out: &mut Outcome<'v>,
        rejection: impl FnOnce(&str) -> (&'s str, Keyword, ViolationParams),
    ) {
        match closure {
            Closure::Reject => {
                let (schema_path, keyword, params) = rejection(key);
                out.report(path, schema_path, keyword, params);
            }
            Closure::Validate(node) => {
                let child = self.node(node, value, &path.push_key(key));
                out.violations.extend(child.violations);
            }
        }
    }
}

fn numeric_keyword(bound: NumericBound) -> Keyword {
    match bound {
        NumericBound::Maximum => Keyword::Maximum,
        NumericBound::Minimum => Keyword::Minimum,
        NumericBound::ExclusiveMaximum => Keyword::ExclusiveMaximum,
        NumericBound::ExclusiveMinimum => Keyword::ExclusiveMinimum,
    }
}

/// Scans from the end: `i` is the later item, `j` the nearest earlier equal one.
fn first_duplicate(items: &[Value]) -> Option<(usize, usize)> {
    (0..items.len()).rev().find_map(|i| {
        (0..i)
            .rev()
            .find(|&j| json_equal(&items[i], &items[j]))
            .map(|j| (i, j))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::RuleSetBuilder;
    use crate::resolve::StaticResolver;
    use proptest::prelude::*;
    use serde_json::{json, Map};

    fn compile(schema: Value) -> RuleSet {
        RuleSetBuilder::new(schema).build().unwrap()
    }

    fn errors(schema: Value, instance: Value) -> Value {
        let report = validate(&compile(schema), &instance);
        serde_json::to_value(report.errors()).unwrap()
    }

    #[test]
    fn required_reports_every_missing_key() {
        let errs = errors(json!({ "required": ["a", "b", "c"] }), json!({ "b": 1 }));
        assert_eq!(errs.as_array().unwrap().len(), 2);
        assert_eq!(errs[0]["params"], json!({ "missingProperty": "a" }));
        assert_eq!(errs[1]["params"], json!({ "missingProperty": "c" }));
        assert_eq!(errs[1]["schemaPath"], "#/required");
    }

    #[test]
    fn type_specific_keywords_ignore_other_types() {
        let schema = json!({ "required": ["a"], "maximum": 1, "minLength": 3, "minItems": 2 });
        for instance in [json!("abc"), json!(0), json!([1, 2]), json!(null), json!(true)] {
            assert_eq!(errors(schema.clone(), instance), json!([]));
        }
    }

    #[test]
    fn numeric_bound_reports_comparison_and_limit() {
        let schema = json!({ "properties": { "Actual": { "type": "number", "minimum": 0, "maximum": 100 } } });
        assert_eq!(errors(schema.clone(), json!({ "Actual": 100 })), json!([]));
        assert_eq!(errors(schema.clone(), json!({ "Actual": 0 })), json!([]));
        assert_eq!(
            errors(schema, json!({ "Actual": 100.01 })),
            json!([{
                "instancePath": "/Actual",
                "schemaPath": "#/properties/Actual/maximum",
                "keyword": "maximum",
                "params": { "comparison": "<=", "limit": 100 },
                "message": "must be <= 100"
            }])
        );
    }

    #[test]
    fn exclusive_bounds() {
        let schema = json!({ "exclusiveMinimum": 0, "exclusiveMaximum": 10 });
        assert_eq!(errors(schema.clone(), json!(5)), json!([]));
        let errs = errors(schema, json!(0));
        assert_eq!(errs[0]["keyword"], "exclusiveMinimum");
        assert_eq!(errs[0]["message"], "must be > 0");
    }

    #[test]
    fn multiple_types_are_joined() {
        let errs = errors(json!({ "type": ["string", "null"] }), json!(3));
        assert_eq!(errs[0]["params"], json!({ "type": "string,null" }));
        assert_eq!(errs[0]["message"], "must be string,null");
    }

    #[test]
    fn one_of_with_no_match_keeps_every_alternative() {
        let schema = json!({ "oneOf": [{ "required": ["a"] }, { "required": ["b"] }] });
        let errs = errors(schema, json!({}));
        let keywords: Vec<_> = errs.as_array().unwrap().iter().map(|e| e["schemaPath"].clone()).collect();
        assert_eq!(keywords, vec![json!("#/oneOf/0/required"), json!("#/oneOf/1/required"), json!("#/oneOf")]);
        assert_eq!(errs[2]["params"], json!({ "passingSchemas": null }));
    }

    #[test]
    fn one_of_with_two_matches_names_them() {
        let schema = json!({ "oneOf": [{ "required": ["a"] }, { "required": ["b"] }, true] });
        let errs = errors(schema, json!({ "a": 1, "b": 2 }));
        assert_eq!(errs.as_array().unwrap().len(), 1);
        assert_eq!(errs[0]["params"], json!({ "passingSchemas": [0, 1] }));
        assert_eq!(errs[0]["message"], "must match exactly one schema in oneOf");
    }

    #[test]
    fn one_of_with_single_match_discards_failed_alternatives() {
        let schema = json!({ "oneOf": [{ "required": ["a"] }, { "required": ["b"] }] });
        assert_eq!(errors(schema, json!({ "b": 1 })), json!([]));
    }

    #[test]
    fn any_of_summary_has_empty_params() {
        let schema = json!({ "anyOf": [{ "type": "string" }, { "type": "number" }] });
        let errs = errors(schema.clone(), json!(null));
        assert_eq!(errs.as_array().unwrap().len(), 3);
        assert_eq!(errs[2]["params"], json!({}));
        assert_eq!(errs[2]["message"], "must match a schema in anyOf");
        assert_eq!(errors(schema, json!(1)), json!([]));
    }

    #[test]
    fn all_of_concatenates_without_summary() {
        let schema = json!({ "allOf": [{ "required": ["a"] }, { "required": ["b"] }] });
        let errs = errors(schema, json!({}));
        assert_eq!(errs.as_array().unwrap().len(), 2);
        assert_eq!(errs[1]["schemaPath"], "#/allOf/1/required");
    }

    #[test]
    fn not_passes_when_inner_fails() {
        let schema = json!({ "not": { "type": "string" } });
        assert_eq!(errors(schema.clone(), json!(1)), json!([]));
        let errs = errors(schema, json!("x"));
        assert_eq!(errs[0]["keyword"], "not");
        assert_eq!(errs[0]["message"], "must NOT be valid");
    }

    #[test]
    fn unevaluated_properties_sees_through_all_of() {
        let schema = json!({
            "type": "object",
            "allOf": [
                { "properties": { "B01": { "type": "string" } } },
                { "patternProperties": { "^B1[0-3]$": true } }
            ],
            "unevaluatedProperties": false
        });
        assert_eq!(errors(schema.clone(), json!({ "B01": "x", "B12": 1 })), json!([]));
        let errs = errors(schema, json!({ "B99": 1, "B01": "x", "B14": 2 }));
        assert_eq!(
            errs,
            json!([
                {
                    "instancePath": "",
                    "schemaPath": "#/unevaluatedProperties",
                    "keyword": "unevaluatedProperties",
                    "params": { "unevaluatedProperty": "B99" },
                    "message": "must NOT have unevaluated properties"
                },
                {
                    "instancePath": "",
                    "schemaPath": "#/unevaluatedProperties",
                    "keyword": "unevaluatedProperties",
                    "params": { "unevaluatedProperty": "B14" },
                    "message": "must NOT have unevaluated properties"
                }
            ])
        );
    }

    #[test]
    fn failed_any_of_alternatives_do_not_evaluate() {
        let schema = json!({
            "anyOf": [
                { "required": ["x"], "properties": { "y": true } },
                { "properties": { "z": true } }
            ],
            "unevaluatedProperties": false
        });
        let errs = errors(schema.clone(), json!({ "y": 1, "z": 1 }));
        let flagged: Vec<_> = errs
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["params"]["unevaluatedProperty"].clone())
            .collect();
        assert_eq!(flagged, vec![json!("y")]);
    }

    #[test]
    fn failing_inline_reference_still_evaluates_like_all_of() {
        let through_all_of = errors(
            json!({
                "allOf": [{ "properties": { "a": { "type": "string" } } }],
                "unevaluatedProperties": false
            }),
            json!({ "a": 1 }),
        );
        let through_ref = errors(
            json!({
                "$ref": "#/definitions/X",
                "definitions": { "X": { "properties": { "a": { "type": "string" } } } },
                "unevaluatedProperties": false
            }),
            json!({ "a": 1 }),
        );
        let schema_paths = |errs: &Value| -> Vec<Value> {
            errs.as_array().unwrap().iter().map(|e| e["schemaPath"].clone()).collect()
        };
        assert_eq!(schema_paths(&through_all_of), vec![json!("#/allOf/0/properties/a/type")]);
        assert_eq!(
            schema_paths(&through_ref),
            vec![json!("#/definitions/X/properties/a/type")]
        );
    }

    #[test]
    fn failing_recursive_reference_does_not_evaluate() {
        let schema = json!({
            "$ref": "#/definitions/Part",
            "definitions": {
                "Part": {
                    "required": ["Id"],
                    "properties": { "Parts": { "items": { "$ref": "#/definitions/Part" } } }
                }
            },
            "unevaluatedProperties": false
        });
        let errs = errors(schema, json!({ "Parts": [] }));
        let keywords: Vec<_> = errs.as_array().unwrap().iter().map(|e| e["keyword"].clone()).collect();
        assert_eq!(keywords, vec![json!("required"), json!("unevaluatedProperties")]);
        assert_eq!(errs[0]["schemaPath"], "#/required");
        assert_eq!(errs[1]["params"]["unevaluatedProperty"], "Parts");
    }

    #[test]
    fn additional_properties_false_reports_at_object() {
        let schema = json!({
            "properties": { "C70": { "type": "string" } },
            "patternProperties": { "^C7[1-9]$": { "type": "object" } },
            "additionalProperties": false
        });
        let errs = errors(schema, json!({ "C70": "ICP", "C71": {}, "C99": 1 }));
        assert_eq!(
            errs,
            json!([{
                "instancePath": "",
                "schemaPath": "#/additionalProperties",
                "keyword": "additionalProperties",
                "params": { "additionalProperty": "C99" },
                "message": "must NOT have additional properties"
            }])
        );
    }

    #[test]
    fn additional_properties_schema_validates_leftovers() {
        let schema = json!({ "properties": { "a": true }, "additionalProperties": { "type": "string" } });
        let errs = errors(schema, json!({ "a": 1, "b": 2 }));
        assert_eq!(errs[0]["instancePath"], "/b");
        assert_eq!(errs[0]["schemaPath"], "#/additionalProperties/type");
    }

    #[test]
    fn items_and_counts() {
        let schema = json!({ "type": "array", "minItems": 1, "maxItems": 2, "items": { "type": "string" } });
        assert_eq!(errors(schema.clone(), json!([]))[0]["message"], "must NOT have fewer than 1 items");
        assert_eq!(errors(schema.clone(), json!(["a", "b", "c"]))[0]["keyword"], "maxItems");
        let errs = errors(schema, json!(["a", 2]));
        assert_eq!(errs[0]["instancePath"], "/1");
        assert_eq!(errs[0]["schemaPath"], "#/items/type");
    }

    #[test]
    fn unique_items_reports_first_duplicate_from_the_end() {
        let errs = errors(json!({ "uniqueItems": true }), json!(["EN", "DE", "EN", "DE"]));
        assert_eq!(errs[0]["params"], json!({ "i": 3, "j": 1 }));
        assert_eq!(
            errs[0]["message"],
            "must NOT have duplicate items (items ## 1 and 3 are identical)"
        );
        assert_eq!(errors(json!({ "uniqueItems": true }), json!([1, 1.5, "1"])), json!([]));
        assert_eq!(first_duplicate(&[json!({"a": 1}), json!({"a": 1.0})]), Some((1, 0)));
    }

    #[test]
    fn strings_enum_and_const() {
        let schema = json!({
            "properties": {
                "s": { "type": "string", "minLength": 2, "maxLength": 3, "pattern": "^[A-Z]+$" },
                "e": { "enum": ["EN", "DE"] },
                "c": { "const": 1 },
                "d": { "format": "date" }
            }
        });
        let errs = errors(
            schema.clone(),
            json!({ "s": "ab", "e": "XX", "c": 1.0, "d": "2022-13-01" }),
        );
        let keywords: Vec<_> = errs.as_array().unwrap().iter().map(|e| e["keyword"].clone()).collect();
        assert_eq!(keywords, vec![json!("pattern"), json!("enum"), json!("format")]);
        assert_eq!(errs[1]["params"], json!({ "allowedValues": ["EN", "DE"] }));

        let errs = errors(schema, json!({ "s": "ÄÖÜß", "c": 2 }));
        assert_eq!(errs[0]["keyword"], "maxLength");
        assert_eq!(errs[2]["params"], json!({ "allowedValue": 1 }));
    }

    #[test]
    fn false_schema_reports_boolean_schema() {
        let errs = errors(json!({ "properties": { "x": false } }), json!({ "x": 1 }));
        assert_eq!(errs[0]["keyword"], "false schema");
        assert_eq!(errs[0]["schemaPath"], "#/properties/x");
        assert_eq!(errs[0]["message"], "boolean schema is false");
    }

    #[test]
    fn external_reference_violations_carry_document_uri() {
        let rule_set = RuleSetBuilder::new(json!({
            "properties": {
                "C71": { "$ref": "https://example.com/el.json#/definitions/ChemicalElement" }
            }
        }))
        .resolver(StaticResolver::new().with_document(
            "https://example.com/el.json",
            json!({ "definitions": { "ChemicalElement": { "type": "object", "required": ["Symbol"] } } }),
        ))
        .build()
        .unwrap();
        let report = validate(&rule_set, &json!({ "C71": { "Actual": 1 } }));
        assert_eq!(
            report.errors()[0].schema_path,
            "https://example.com/el.json#/definitions/ChemicalElement/required"
        );
        assert_eq!(report.errors()[0].instance_path.as_str(), "/C71");
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (-200i64..200).prop_map(|n| json!(n)),
            (-200.0f64..200.0).prop_map(|f| json!(f)),
            "[A-Z][0-9]{2}|[a-z]{0,4}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[A-Z][0-9]{2}|Z0[1-4]", inner, 0..5)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    fn closed_schema() -> Value {
        json!({
            "type": "object",
            "allOf": [
                { "properties": { "Z01": { "type": "string" }, "Z02": true } },
                { "anyOf": [{ "required": ["Z01"] }, { "properties": { "Z03": { "type": "number", "maximum": 100 } } }] }
            ],
            "oneOf": [{ "required": ["Z04"] }, { "not": { "required": ["Z04"] } }],
            "unevaluatedProperties": false
        })
    }

    proptest! {
        #[test]
        fn evaluation_is_deterministic(doc in arb_json()) {
            let rule_set = compile(closed_schema());
            let first = validate(&rule_set, &doc);
            let second = validate(&rule_set, &doc);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn unknown_property_at_closed_node_is_named(doc in arb_json(), extra in "[A-Y][0-9]{2}") {
            let rule_set = compile(closed_schema());
            let mut object = match doc {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            object.insert(extra.clone(), json!(1));
            let report = validate(&rule_set, &Value::Object(object));
            let named = report.errors().iter().any(|v| {
                v.keyword == Keyword::UnevaluatedProperties
                    && v.params == ViolationParams::UnevaluatedProperty { unevaluated_property: extra.clone() }
            });
            prop_assert!(named);
            prop_assert!(!report.is_valid());
        }

        #[test]
        fn validity_matches_error_list(doc in arb_json()) {
            let report = validate(&compile(closed_schema()), &doc);
            prop_assert_eq!(report.is_valid(), report.errors().is_empty());
        }
    }
}

//! Integration test: the compiled rule set agrees with the `jsonschema`
//! crate on which certificates are valid.
//!
//! Error lists are not compared; the two engines order and address
//! violations differently. Validity must match for the fixtures and for
//! certificates derived from them by deleting or replacing a single node.

use std::path::PathBuf;
use std::sync::OnceLock;

use en10168_schema::certificate::{CHEMICAL_ELEMENT_SCHEMA, CHEMICAL_ELEMENT_URI, EN10168_SCHEMA};
use en10168_schema::{load_document, CertificateValidator};
use jsonschema::{Retrieve, Uri, Validator};
use proptest::prelude::*;
use proptest::sample::Index;
use serde_json::{json, Value};

/// Serves the bundled chemical-element document; anything else is a test
/// failure rather than a network request.
struct BundledRetriever;

impl Retrieve for BundledRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let document = uri.as_str().split('#').next().unwrap_or_default();
        if document == CHEMICAL_ELEMENT_URI {
            Ok(serde_json::from_str(CHEMICAL_ELEMENT_SCHEMA)?)
        } else {
            Err(format!("unexpected retrieval of {document}").into())
        }
    }
}

fn reference() -> &'static Validator {
    static VALIDATOR: OnceLock<Validator> = OnceLock::new();
    VALIDATOR.get_or_init(|| {
        let schema: Value = serde_json::from_str(EN10168_SCHEMA).unwrap();
        jsonschema::options()
            .with_draft(jsonschema::Draft::Draft201909)
            .should_validate_formats(true)
            .with_retriever(BundledRetriever)
            .build(&schema)
            .expect("reference engine compiles the bundled rule set")
    })
}

fn compiled() -> &'static CertificateValidator {
    static VALIDATOR: OnceLock<CertificateValidator> = OnceLock::new();
    VALIDATOR.get_or_init(|| CertificateValidator::en10168().unwrap())
}

fn fixture(name: &str) -> Value {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(format!("{name}.json"));
    load_document(&path).unwrap()
}

fn valid_fixtures() -> &'static [Value] {
    static FIXTURES: OnceLock<Vec<Value>> = OnceLock::new();
    FIXTURES.get_or_init(|| (1..=6).map(|n| fixture(&format!("valid_certificate_{n}"))).collect())
}

/// Every JSON pointer inside `value`, parents before children.
fn pointers(value: &Value, at: String, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let next = format!("{at}/{}", key.replace('~', "~0").replace('/', "~1"));
                out.push(next.clone());
                pointers(child, next, out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                let next = format!("{at}/{i}");
                out.push(next.clone());
                pointers(child, next, out);
            }
        }
        _ => {}
    }
}

/// Delete the node at `pointer` from its parent.
fn remove(document: &mut Value, pointer: &str) {
    let (parent, last) = match pointer.rsplit_once('/') {
        Some(split) => split,
        None => return,
    };
    let last = last.replace("~1", "/").replace("~0", "~");
    match document.pointer_mut(parent) {
        Some(Value::Object(map)) => {
            map.remove(&last);
        }
        Some(Value::Array(items)) => {
            if let Ok(i) = last.parse::<usize>() {
                if i < items.len() {
                    items.remove(i);
                }
            }
        }
        _ => {}
    }
}

fn replacements() -> Vec<Value> {
    vec![
        Value::Null,
        json!("x"),
        json!(-1),
        json!(101),
        json!([]),
        json!({}),
        json!(true),
    ]
}

#[test]
fn fixtures_agree_with_reference_engine() {
    let names = (1..=6)
        .map(|n| format!("valid_certificate_{n}"))
        .chain((1..=3).map(|n| format!("invalid_certificate_{n}")));
    for name in names {
        let certificate = fixture(&name);
        assert_eq!(
            compiled().validate(&certificate).is_valid(),
            reference().is_valid(&certificate),
            "engines disagree on {name}"
        );
    }
}

#[test]
fn invalid_fixtures_are_rejected_by_both_engines() {
    for n in 1..=3 {
        let certificate = fixture(&format!("invalid_certificate_{n}"));
        assert!(!reference().is_valid(&certificate));
        assert!(!compiled().validate(&certificate).is_valid());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn single_node_mutations_agree_with_reference_engine(
        which in 0..6usize,
        at in any::<Index>(),
        kind in 0..8usize,
    ) {
        let mut certificate = valid_fixtures()[which].clone();
        let mut paths = Vec::new();
        pointers(&certificate, String::new(), &mut paths);
        let pointer = at.get(&paths).clone();

        if kind == 0 {
            remove(&mut certificate, &pointer);
        } else if let Some(slot) = certificate.pointer_mut(&pointer) {
            *slot = replacements()[kind - 1].clone();
        }

        let ours = compiled().validate(&certificate);
        prop_assert_eq!(
            ours.is_valid(),
            reference().is_valid(&certificate),
            "engines disagree after mutating {}: {:?}",
            pointer,
            ours.errors()
        );
    }
}

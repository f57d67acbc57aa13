//! # Document Loading
//!
//! Certificates arrive as JSON or YAML files. The format is chosen by
//! extension (`.yaml`/`.yml` for YAML, anything else is JSON) and the
//! result is always a `serde_json::Value`, so the evaluator sees one data
//! model regardless of the source format.

use std::path::Path;

use en10168_core::JsonPointer;
use serde_json::Value;

use crate::error::DocumentLoadError;

/// Read a certificate from `path`.
///
/// # Errors
///
/// [`DocumentLoadError`] when the file cannot be read or is not valid
/// JSON/YAML.
pub fn load_document(path: &Path) -> Result<Value, DocumentLoadError> {
    let load_error = |reason: String| DocumentLoadError {
        path: path.display().to_string(),
        reason,
    };

    let content =
        std::fs::read_to_string(path).map_err(|e| load_error(format!("cannot read file: {e}")))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yaml" | "yml" => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(&content)
                .map_err(|e| load_error(format!("invalid YAML: {e}")))?;
            from_yaml(&yaml, &JsonPointer::root())
                .map_err(|e| load_error(format!("YAML-to-JSON conversion failed: {e}")))
        }
        _ => serde_json::from_str(&content).map_err(|e| load_error(format!("invalid JSON: {e}"))),
    }
}

/// Convert a parsed YAML node (found at `at`) into JSON. Tags are dropped
/// and scalar keys become strings; anything JSON cannot hold is an error
/// naming the offending location.
fn from_yaml(yaml: &serde_yaml::Value, at: &JsonPointer) -> Result<Value, String> {
    use serde_yaml::Value as Yaml;

    let located = |what: String| {
        if at.is_root() {
            format!("{what} at document root")
        } else {
            format!("{what} at {at}")
        }
    };

    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Number(n) => {
            let number = match (n.as_i64(), n.as_u64(), n.as_f64()) {
                (Some(i), _, _) => Some(i.into()),
                (None, Some(u), _) => Some(u.into()),
                (None, None, Some(f)) => serde_json::Number::from_f64(f),
                _ => None,
            };
            Value::Number(number.ok_or_else(|| located(format!("number {n} has no JSON form")))?)
        }
        Yaml::Sequence(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| from_yaml(item, &at.push_index(i)))
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(entries) => {
            let mut object = serde_json::Map::with_capacity(entries.len());
            for (key, value) in entries {
                let key = match key {
                    Yaml::String(s) => s.clone(),
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    _ => return Err(located("non-scalar mapping key".into())),
                };
                let value = from_yaml(value, &at.push_key(&key))?;
                object.insert(key, value);
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => from_yaml(&tagged.value, at)?,
    })
}

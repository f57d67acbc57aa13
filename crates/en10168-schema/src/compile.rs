//! # Rule-Set Compiler
//!
//! Turns a declarative schema document into an immutable [`RuleSet`].
//!
//! ## Pipeline
//!
//! 1. **Dialect.** `$schema` must name draft-07 or 2019-09, or be absent.
//! 2. **Meta-validation.** Every document is checked against its dialect's
//!    meta-schema with the `jsonschema` crate.
//! 3. **Reference discovery.** `$ref`s are collected transitively; every
//!    external document is fetched once through the [`ReferenceCache`] and
//!    the injected [`Resolve`]r. Documents discovered in the same round are
//!    fetched concurrently.
//! 4. **Node compilation.** Each reachable schema node becomes a
//!    [`Node`] of ordered [`Rule`]s. Unknown keywords are rejected.
//! 5. **Cycle check.** A chain of `$ref`/`allOf`/`anyOf`/`oneOf`/`not`
//!    edges that returns to a node without descending into the instance
//!    would never terminate and fails compilation.
//!
//! ## Schema Paths
//!
//! Nodes of the root document are addressed `#/<pointer>`. A `$ref` target
//! that contains no further references is addressed by the reference itself
//! (`https://…/chemical-element.json#/definitions/ChemicalElement/required`).
//! Any other target restarts at `#` when it lives in the root document and
//! at `<document>#<pointer>` otherwise, so `#/allOf/2/required` names the
//! third `allOf` member of whatever definition the `$ref` pointed at.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use en10168_core::{escape_token, ValidationReport};
use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

use crate::error::{CompileError, MalformedRuleSet};
use crate::format::Format;
use crate::resolve::{document_uri, ReferenceCache, Resolve, ResolveError, StaticResolver};
use crate::rules::{Closure, CountBound, JsonType, Node, NodeId, NumericBound, Rule};

/// Base URI of a rule set that declares no `$id`.
pub const DEFAULT_BASE_URI: &str = "urn:en10168:rule-set";

/// Keywords that carry no validation semantics.
const ANNOTATIONS: &[&str] = &[
    "$schema",
    "$id",
    "$comment",
    "title",
    "description",
    "default",
    "examples",
    "definitions",
    "$defs",
    "deprecated",
    "readOnly",
    "writeOnly",
    "meta:license",
];

const TYPELESS_KEYWORDS: &[&str] = &["$ref", "const", "enum", "not", "anyOf", "oneOf", "allOf"];

/// Keywords whose values are instance data, never schemas.
const DATA_KEYWORDS: &[&str] = &["const", "enum", "default", "examples"];

/// A supported `$schema` dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Draft07,
    Draft201909,
}

impl Dialect {
    /// Read the `$schema` of a document. `None` when the document does not
    /// declare one.
    pub fn of(document: &Value, name: &str) -> Result<Option<Self>, MalformedRuleSet> {
        let declared = match document.get("$schema") {
            None => return Ok(None),
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(MalformedRuleSet::InvalidKeyword {
                    keyword: "$schema".into(),
                    location: format!("{name}#"),
                    reason: "expected a URI string".into(),
                })
            }
        };
        match declared.trim_end_matches('#') {
            "http://json-schema.org/draft-07/schema" => Ok(Some(Self::Draft07)),
            "https://json-schema.org/draft/2019-09/schema" => Ok(Some(Self::Draft201909)),
            _ => Err(MalformedRuleSet::UnsupportedDialect {
                dialect: declared.clone(),
                document: name.to_string(),
            }),
        }
    }

    /// Canonical meta-schema URI.
    pub fn meta_schema(&self) -> &'static str {
        match self {
            Self::Draft07 => "http://json-schema.org/draft-07/schema#",
            Self::Draft201909 => "https://json-schema.org/draft/2019-09/schema",
        }
    }
}

/// Dialect and meta-schema check for one document.
fn check_document(document: &Value, name: &str) -> Result<Option<Dialect>, MalformedRuleSet> {
    let dialect = Dialect::of(document, name)?;

    let target = match (dialect, document) {
        (Some(d), Value::Object(map)) => {
            let mut map = map.clone();
            map.insert("$schema".into(), Value::String(d.meta_schema().into()));
            Cow::Owned(Value::Object(map))
        }
        _ => Cow::Borrowed(document),
    };

    jsonschema::meta::validate(&target).map_err(|e| MalformedRuleSet::MetaSchema {
        document: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok(dialect)
}

// ---------------------------------------------------------------------------
// Rule set
// ---------------------------------------------------------------------------

/// A compiled, immutable rule set. `Send + Sync`; share it behind an `Arc`.
#[derive(Debug)]
pub struct RuleSet {
    id: String,
    root: NodeId,
    nodes: Vec<Node>,
    external_documents: Vec<String>,
}

impl RuleSet {
    /// The rule set's `$id`, or its base URI when it declares none.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// URIs of the external documents the rule set was compiled with.
    pub fn external_documents(&self) -> &[String] {
        &self.external_documents
    }

    /// Evaluate `instance` against the rule set.
    pub fn validate(&self, instance: &Value) -> ValidationReport {
        crate::evaluate::validate(self, instance)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures and runs a rule-set compilation.
pub struct RuleSetBuilder {
    schema: Value,
    base_uri: Option<Url>,
    resolver: Box<dyn Resolve>,
    cache: ReferenceCache,
}

impl RuleSetBuilder {
    /// Start from a schema document. By default no external document can be
    /// resolved and a private cache is used.
    pub fn new(schema: Value) -> Self {
        Self {
            schema,
            base_uri: None,
            resolver: Box::new(StaticResolver::new()),
            cache: ReferenceCache::new(),
        }
    }

    /// Base URI used when the schema declares no absolute `$id`, e.g. the
    /// `file://` URI the schema was read from.
    pub fn base_uri(mut self, uri: Url) -> Self {
        self.base_uri = Some(uri);
        self
    }

    pub fn resolver(mut self, resolver: impl Resolve + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn cache(mut self, cache: ReferenceCache) -> Self {
        self.cache = cache;
        self
    }

    /// Compile the rule set.
    ///
    /// # Errors
    ///
    /// [`CompileError::Malformed`] when the schema is outside the supported
    /// subset; [`CompileError::ReferenceResolutionFailed`] when an external
    /// document cannot be fetched.
    pub fn build(self) -> Result<RuleSet, CompileError> {
        let root_uri = self.root_uri()?;
        let id = match self.schema.get("$id").and_then(Value::as_str) {
            Some(_) => root_uri.to_string(),
            None => document_uri(&root_uri).to_string(),
        };
        let root_key = document_uri(&root_uri).to_string();
        check_document(&self.schema, &root_key)?;

        let mut documents = HashMap::new();
        documents.insert(
            root_key.clone(),
            Document {
                base: document_uri(&root_uri),
                value: Arc::new(self.schema.clone()),
            },
        );
        let external_documents = self.fetch_external(&mut documents, &root_key)?;

        let mut compiler = Compiler::new(&documents, &root_key);
        let root = compiler.compile_root()?;
        compiler.check_cycles()?;

        let rule_set = RuleSet {
            id,
            root,
            nodes: compiler.nodes,
            external_documents,
        };
        tracing::debug!(
            id = %rule_set.id,
            nodes = rule_set.node_count(),
            external = rule_set.external_documents.len(),
            "compiled rule set"
        );
        Ok(rule_set)
    }

    fn root_uri(&self) -> Result<Url, MalformedRuleSet> {
        let fallback = match &self.base_uri {
            Some(uri) => uri.clone(),
            None => Url::parse(DEFAULT_BASE_URI).map_err(|e| MalformedRuleSet::InvalidKeyword {
                keyword: "$id".into(),
                location: DEFAULT_BASE_URI.into(),
                reason: e.to_string(),
            })?,
        };
        match self.schema.get("$id") {
            None => Ok(fallback),
            Some(Value::String(id)) => fallback.join(id).map_err(|e| MalformedRuleSet::InvalidKeyword {
                keyword: "$id".into(),
                location: format!("{fallback}#"),
                reason: e.to_string(),
            }),
            Some(_) => Err(MalformedRuleSet::InvalidKeyword {
                keyword: "$id".into(),
                location: format!("{fallback}#"),
                reason: "expected a URI string".into(),
            }),
        }
    }

    /// Fetch every document reachable by `$ref` from the root, round by
    /// round. Returns the fetched URIs in discovery order.
    fn fetch_external(
        &self,
        documents: &mut HashMap<String, Document>,
        root_key: &str,
    ) -> Result<Vec<String>, CompileError> {
        let mut fetched_order = Vec::new();
        let mut frontier = vec![root_key.to_string()];

        loop {
            let mut wanted = BTreeSet::new();
            for key in &frontier {
                if let Some(doc) = documents.get(key) {
                    collect_references(&doc.base, &doc.value, &mut wanted);
                }
            }
            wanted.retain(|uri: &Url| !documents.contains_key(uri.as_str()));
            if wanted.is_empty() {
                return Ok(fetched_order);
            }

            frontier.clear();
            for (uri, value) in self.fetch_round(&wanted)? {
                let key = uri.to_string();
                check_document(&value, &key)?;
                documents.insert(key.clone(), Document { base: uri, value });
                fetched_order.push(key.clone());
                frontier.push(key);
            }
        }
    }

    fn fetch_round(&self, uris: &BTreeSet<Url>) -> Result<Vec<(Url, Arc<Value>)>, CompileError> {
        let resolver: &dyn Resolve = self.resolver.as_ref();
        let cache = &self.cache;

        let results: Vec<(Url, Result<Arc<Value>, ResolveError>)> = if uris.len() == 1 {
            uris.iter()
                .map(|uri| (uri.clone(), cache.get_or_resolve(uri, resolver)))
                .collect()
        } else {
            std::thread::scope(|scope| {
                let handles: Vec<_> = uris
                    .iter()
                    .map(|uri| {
                        scope.spawn(move || (uri.clone(), cache.get_or_resolve(uri, resolver)))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                    })
                    .collect()
            })
        };

        results
            .into_iter()
            .map(|(uri, result)| match result {
                Ok(value) => Ok((uri, value)),
                Err(source) => Err(CompileError::ReferenceResolutionFailed {
                    uri: uri.to_string(),
                    source,
                }),
            })
            .collect()
    }
}

impl std::fmt::Debug for RuleSetBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSetBuilder")
            .field("base_uri", &self.base_uri)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Document URIs (fragment stripped) of every `$ref` below `value`.
fn collect_references(base: &Url, value: &Value, out: &mut BTreeSet<Url>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                if let Ok(target) = base.join(reference) {
                    out.insert(document_uri(&target));
                }
            }
            for (key, child) in map {
                if !DATA_KEYWORDS.contains(&key.as_str()) {
                    collect_references(base, child, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(base, item, out);
            }
        }
        _ => {}
    }
}

fn contains_reference(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.iter().any(|(key, child)| {
            key == "$ref" || (!DATA_KEYWORDS.contains(&key.as_str()) && contains_reference(child))
        }),
        Value::Array(items) => items.iter().any(contains_reference),
        _ => false,
    }
}

fn decode_fragment(fragment: &str) -> String {
    let bytes = fragment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ---------------------------------------------------------------------------
// Node compilation
// ---------------------------------------------------------------------------

struct Document {
    base: Url,
    value: Arc<Value>,
}

/// Where a schema node sits: its document, its pointer inside that
/// document, and the schema path violations below it are reported under.
#[derive(Debug, Clone)]
struct Site<'a> {
    doc: &'a str,
    pointer: String,
    path: String,
}

impl Site<'_> {
    fn child(&self, segment: &str) -> Self {
        let segment = escape_token(segment);
        Self {
            doc: self.doc,
            pointer: format!("{}/{segment}", self.pointer),
            path: format!("{}/{segment}", self.path),
        }
    }

    fn index(&self, index: usize) -> Self {
        Self {
            doc: self.doc,
            pointer: format!("{}/{index}", self.pointer),
            path: format!("{}/{index}", self.path),
        }
    }

    fn path_of(&self, keyword: &str) -> String {
        format!("{}/{keyword}", self.path)
    }

    fn location(&self) -> String {
        format!("{}#{}", self.doc, self.pointer)
    }

    fn location_of(&self, keyword: &str) -> String {
        format!("{}#{}/{}", self.doc, self.pointer, escape_token(keyword))
    }

    fn invalid(&self, keyword: &str, reason: impl Into<String>) -> MalformedRuleSet {
        MalformedRuleSet::InvalidKeyword {
            keyword: keyword.to_string(),
            location: self.location_of(keyword),
            reason: reason.into(),
        }
    }
}

/// Keyword groups evaluated after the type-independent keywords, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    Number,
    String,
    Array,
    Object,
}

impl Group {
    const ALL: [Group; 4] = [Group::Number, Group::String, Group::Array, Group::Object];

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Number => &["maximum", "minimum", "exclusiveMaximum", "exclusiveMinimum"],
            Self::String => &["maxLength", "minLength", "pattern", "format"],
            Self::Array => &["maxItems", "minItems", "uniqueItems", "items"],
            Self::Object => &["required", "additionalProperties", "properties", "patternProperties"],
        }
    }

    fn of(ty: JsonType) -> Option<Self> {
        match ty {
            JsonType::Number => Some(Self::Number),
            JsonType::String => Some(Self::String),
            JsonType::Array => Some(Self::Array),
            JsonType::Object => Some(Self::Object),
            JsonType::Integer | JsonType::Boolean | JsonType::Null => None,
        }
    }

    fn used_by(&self, map: &Map<String, Value>) -> bool {
        self.keywords().iter().any(|k| map.contains_key(*k))
    }
}

fn is_known_keyword(keyword: &str) -> bool {
    ANNOTATIONS.contains(&keyword)
        || TYPELESS_KEYWORDS.contains(&keyword)
        || keyword == "type"
        || keyword == "unevaluatedProperties"
        || Group::ALL.iter().any(|g| g.keywords().contains(&keyword))
}

struct Compiler<'a> {
    documents: &'a HashMap<String, Document>,
    root_key: &'a str,
    nodes: Vec<Node>,
    locations: Vec<String>,
    /// `$ref` targets by (document, pointer, schema path).
    targets: HashMap<(String, String, String), NodeId>,
}

impl<'a> Compiler<'a> {
    fn new(documents: &'a HashMap<String, Document>, root_key: &'a str) -> Self {
        Self {
            documents,
            root_key,
            nodes: Vec::new(),
            locations: Vec::new(),
            targets: HashMap::new(),
        }
    }

    fn compile_root(&mut self) -> Result<NodeId, MalformedRuleSet> {
        let documents = self.documents;
        let (key, doc) = documents
            .get_key_value(self.root_key)
            .ok_or_else(|| MalformedRuleSet::UnresolvableReference {
                reference: "#".into(),
                location: self.root_key.to_string(),
                reason: "root document missing".into(),
            })?;
        let site = Site {
            doc: key.as_str(),
            pointer: String::new(),
            path: "#".into(),
        };
        let id = self.alloc(&site);
        self.targets
            .insert((key.clone(), String::new(), "#".into()), id);
        let rules = self.compile_rules(&site, &doc.value)?;
        self.nodes[id.0].rules = rules;
        Ok(id)
    }

    fn alloc(&mut self, site: &Site<'_>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::default());
        self.locations.push(site.location());
        id
    }

    fn compile_schema(&mut self, site: &Site<'a>, schema: &'a Value) -> Result<NodeId, MalformedRuleSet> {
        let id = self.alloc(site);
        let rules = self.compile_rules(site, schema)?;
        self.nodes[id.0].rules = rules;
        Ok(id)
    }

    fn compile_rules(&mut self, site: &Site<'a>, schema: &'a Value) -> Result<Vec<Rule>, MalformedRuleSet> {
        let map = match schema {
            Value::Bool(true) => return Ok(Vec::new()),
            Value::Bool(false) => {
                return Ok(vec![Rule::Never {
                    schema_path: site.path.clone(),
                }])
            }
            Value::Object(map) => map,
            _ => {
                return Err(MalformedRuleSet::InvalidKeyword {
                    keyword: "schema".into(),
                    location: site.location(),
                    reason: "a schema must be an object or a boolean".into(),
                })
            }
        };

        for keyword in map.keys() {
            if !is_known_keyword(keyword) {
                return Err(MalformedRuleSet::UnknownKeyword {
                    keyword: keyword.clone(),
                    location: site.location(),
                });
            }
        }
        if !site.pointer.is_empty() && map.contains_key("$id") {
            return Err(site.invalid("$id", "only supported at the document root"));
        }

        let types = self.types(site, map)?;
        let deferred = match types.as_slice() {
            [single] => Group::of(*single).filter(|g| g.used_by(map)),
            _ => None,
        };
        let mut type_check = (!types.is_empty()).then(|| Rule::TypeCheck {
            types,
            schema_path: site.path_of("type"),
        });

        let mut rules = Vec::new();
        if deferred.is_none() {
            rules.extend(type_check.take());
        }

        self.typeless_rules(site, map, &mut rules)?;

        for group in Group::ALL {
            if deferred == Some(group) {
                rules.extend(type_check.take());
            }
            match group {
                Group::Number => number_rules(site, map, &mut rules)?,
                Group::String => string_rules(site, map, &mut rules)?,
                Group::Array => self.array_rules(site, map, &mut rules)?,
                Group::Object => self.object_rules(site, map, &mut rules)?,
            }
        }

        if let Some(schema) = map.get("unevaluatedProperties") {
            if let Some(closure) = self.closure(&site.child("unevaluatedProperties"), schema)? {
                rules.push(Rule::ClosureCheck {
                    closure,
                    schema_path: site.path_of("unevaluatedProperties"),
                });
            }
        }

        Ok(rules)
    }

    fn types(&self, site: &Site<'_>, map: &Map<String, Value>) -> Result<Vec<JsonType>, MalformedRuleSet> {
        let parse = |name: &Value| {
            name.as_str()
                .and_then(JsonType::parse)
                .ok_or_else(|| site.invalid("type", format!("unknown type {name}")))
        };
        match map.get("type") {
            None => Ok(Vec::new()),
            Some(Value::Array(names)) if !names.is_empty() => names.iter().map(parse).collect(),
            Some(Value::Array(_)) => Err(site.invalid("type", "empty type list")),
            Some(name) => Ok(vec![parse(name)?]),
        }
    }

    fn typeless_rules(
        &mut self,
        site: &Site<'a>,
        map: &'a Map<String, Value>,
        rules: &mut Vec<Rule>,
    ) -> Result<(), MalformedRuleSet> {
        if let Some(reference) = map.get("$ref") {
            let reference = reference
                .as_str()
                .ok_or_else(|| site.invalid("$ref", "expected a URI reference string"))?;
            rules.push(self.reference(site, reference)?);
        }
        if let Some(value) = map.get("const") {
            rules.push(Rule::Const {
                value: value.clone(),
                schema_path: site.path_of("const"),
            });
        }
        if let Some(values) = map.get("enum") {
            let values = values
                .as_array()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| site.invalid("enum", "expected a non-empty array"))?;
            rules.push(Rule::Enum {
                values: values.clone(),
                schema_path: site.path_of("enum"),
            });
        }
        if let Some(schema) = map.get("not") {
            let node = self.compile_schema(&site.child("not"), schema)?;
            rules.push(Rule::Not {
                node,
                schema_path: site.path_of("not"),
            });
        }
        if let Some(schemas) = map.get("anyOf") {
            let alternatives = self.schema_list(site, "anyOf", schemas)?;
            rules.push(Rule::AnyOf {
                alternatives,
                schema_path: site.path_of("anyOf"),
            });
        }
        if let Some(schemas) = map.get("oneOf") {
            let alternatives = self.schema_list(site, "oneOf", schemas)?;
            rules.push(Rule::OneOf {
                alternatives,
                schema_path: site.path_of("oneOf"),
            });
        }
        if let Some(schemas) = map.get("allOf") {
            let members = self.schema_list(site, "allOf", schemas)?;
            rules.push(Rule::AllOf { members });
        }
        Ok(())
    }

    fn schema_list(
        &mut self,
        site: &Site<'a>,
        keyword: &str,
        schemas: &'a Value,
    ) -> Result<Vec<NodeId>, MalformedRuleSet> {
        let schemas = schemas
            .as_array()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| site.invalid(keyword, "expected a non-empty array of schemas"))?;
        let list = site.child(keyword);
        schemas
            .iter()
            .enumerate()
            .map(|(i, schema)| self.compile_schema(&list.index(i), schema))
            .collect()
    }

    fn reference(&mut self, site: &Site<'a>, reference: &str) -> Result<Rule, MalformedRuleSet> {
        let unresolvable = |reason: String| MalformedRuleSet::UnresolvableReference {
            reference: reference.to_string(),
            location: site.location_of("$ref"),
            reason,
        };
        let documents = self.documents;

        let base = &documents
            .get(site.doc)
            .ok_or_else(|| unresolvable("enclosing document is not loaded".into()))?
            .base;
        let absolute = base.join(reference).map_err(|e| unresolvable(e.to_string()))?;
        let fragment = decode_fragment(absolute.fragment().unwrap_or(""));
        if !fragment.is_empty() && !fragment.starts_with('/') {
            return Err(unresolvable(
                "only empty or JSON-pointer fragments are supported".into(),
            ));
        }

        let doc_uri = document_uri(&absolute);
        let (doc_key, document) = documents
            .get_key_value(doc_uri.as_str())
            .ok_or_else(|| unresolvable("document was not resolved".into()))?;
        let target = document
            .value
            .pointer(&fragment)
            .ok_or_else(|| unresolvable(format!("no schema at '{fragment}'")))?;

        let inline = !contains_reference(target);
        let path = if inline {
            if doc_key == self.root_key && reference.starts_with('#') {
                reference.to_string()
            } else {
                absolute.to_string()
            }
        } else if doc_key == self.root_key {
            "#".to_string()
        } else {
            format!("{doc_key}#{fragment}")
        };

        let key = (doc_key.clone(), fragment.clone(), path.clone());
        let node = match self.targets.get(&key) {
            Some(node) => *node,
            None => {
                let target_site = Site {
                    doc: doc_key.as_str(),
                    pointer: fragment,
                    path,
                };
                let node = self.alloc(&target_site);
                self.targets.insert(key, node);
                let rules = self.compile_rules(&target_site, target)?;
                self.nodes[node.0].rules = rules;
                node
            }
        };

        Ok(Rule::Reference {
            target: node,
            uri: absolute.to_string(),
            inline,
        })
    }

    fn array_rules(
        &mut self,
        site: &Site<'a>,
        map: &'a Map<String, Value>,
        rules: &mut Vec<Rule>,
    ) -> Result<(), MalformedRuleSet> {
        for (keyword, bound) in [("maxItems", CountBound::Max), ("minItems", CountBound::Min)] {
            if let Some(limit) = map.get(keyword) {
                rules.push(Rule::ItemCount {
                    bound,
                    limit: count_limit(site, keyword, limit)?,
                    schema_path: site.path_of(keyword),
                });
            }
        }
        match map.get("uniqueItems") {
            None | Some(Value::Bool(false)) => {}
            Some(Value::Bool(true)) => rules.push(Rule::UniqueItems {
                schema_path: site.path_of("uniqueItems"),
            }),
            Some(_) => return Err(site.invalid("uniqueItems", "expected a boolean")),
        }
        match map.get("items") {
            None => {}
            Some(Value::Array(_)) => {
                return Err(site.invalid("items", "tuple validation is not supported"));
            }
            Some(schema) => {
                let node = self.compile_schema(&site.child("items"), schema)?;
                rules.push(Rule::Items { node });
            }
        }
        Ok(())
    }

    fn object_rules(
        &mut self,
        site: &Site<'a>,
        map: &'a Map<String, Value>,
        rules: &mut Vec<Rule>,
    ) -> Result<(), MalformedRuleSet> {
        if let Some(required) = map.get("required") {
            let keys = required
                .as_array()
                .ok_or_else(|| site.invalid("required", "expected an array of property names"))?
                .iter()
                .map(|k| {
                    k.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| site.invalid("required", "property names must be strings"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            if !keys.is_empty() {
                rules.push(Rule::RequiredKeys {
                    keys,
                    schema_path: site.path_of("required"),
                });
            }
        }

        let properties = match map.get("properties") {
            None => None,
            Some(Value::Object(props)) => Some(props),
            Some(_) => return Err(site.invalid("properties", "expected an object")),
        };
        let pattern_properties = match map.get("patternProperties") {
            None => None,
            Some(Value::Object(props)) => {
                let list = site.child("patternProperties");
                let mut compiled = Vec::with_capacity(props.len());
                for (pattern, schema) in props {
                    let regex = compile_pattern(&list, pattern)?;
                    compiled.push((regex, pattern.as_str(), schema));
                }
                Some(compiled)
            }
            Some(_) => return Err(site.invalid("patternProperties", "expected an object")),
        };

        if let Some(schema) = map.get("additionalProperties") {
            if let Some(closure) = self.closure(&site.child("additionalProperties"), schema)? {
                rules.push(Rule::AdditionalProperties {
                    declared: properties
                        .map(|p| p.keys().cloned().collect())
                        .unwrap_or_default(),
                    patterns: pattern_properties
                        .iter()
                        .flatten()
                        .map(|(regex, _, _)| regex.clone())
                        .collect(),
                    closure,
                    schema_path: site.path_of("additionalProperties"),
                });
            }
        }

        if let Some(props) = properties {
            let list = site.child("properties");
            let mut entries = Vec::with_capacity(props.len());
            for (name, schema) in props {
                entries.push((name.clone(), self.compile_schema(&list.child(name), schema)?));
            }
            rules.push(Rule::Properties { entries });
        }

        if let Some(patterns) = pattern_properties {
            let list = site.child("patternProperties");
            let mut entries = Vec::with_capacity(patterns.len());
            for (regex, pattern, schema) in patterns {
                entries.push((regex, self.compile_schema(&list.child(pattern), schema)?));
            }
            rules.push(Rule::PatternProperties { entries });
        }
        Ok(())
    }

    /// `additionalProperties` / `unevaluatedProperties`. `true` imposes
    /// nothing but still marks every caught property as evaluated, so it
    /// compiles to a trivial node.
    fn closure(&mut self, site: &Site<'a>, schema: &'a Value) -> Result<Option<Closure>, MalformedRuleSet> {
        match schema {
            Value::Bool(false) => Ok(Some(Closure::Reject)),
            Value::Bool(true) | Value::Object(_) => {
                Ok(Some(Closure::Validate(self.compile_schema(site, schema)?)))
            }
            _ => Err(MalformedRuleSet::InvalidKeyword {
                keyword: site.pointer.rsplit('/').next().unwrap_or_default().to_string(),
                location: site.location(),
                reason: "expected a schema".into(),
            }),
        }
    }

    /// Fail on a cycle of edges that stay on the same instance.
    fn check_cycles(&self) -> Result<(), MalformedRuleSet> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn visit(
            compiler: &Compiler<'_>,
            node: NodeId,
            marks: &mut [Mark],
        ) -> Result<(), MalformedRuleSet> {
            match marks[node.0] {
                Mark::Done => return Ok(()),
                Mark::Active => {
                    return Err(MalformedRuleSet::ReferenceCycle {
                        location: compiler.locations[node.0].clone(),
                    })
                }
                Mark::New => {}
            }
            marks[node.0] = Mark::Active;
            for rule in &compiler.nodes[node.0].rules {
                let next: &[NodeId] = match rule {
                    Rule::Reference { target, .. } => std::slice::from_ref(target),
                    Rule::Not { node, .. } => std::slice::from_ref(node),
                    Rule::AllOf { members } => members,
                    Rule::AnyOf { alternatives, .. } | Rule::OneOf { alternatives, .. } => {
                        alternatives
                    }
                    _ => &[],
                };
                for child in next {
                    visit(compiler, *child, marks)?;
                }
            }
            marks[node.0] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::New; self.nodes.len()];
        for id in 0..self.nodes.len() {
            visit(self, NodeId(id), &mut marks)?;
        }
        Ok(())
    }
}

fn number_rules(
    site: &Site<'_>,
    map: &Map<String, Value>,
    rules: &mut Vec<Rule>,
) -> Result<(), MalformedRuleSet> {
    for (keyword, bound) in [
        ("maximum", NumericBound::Maximum),
        ("minimum", NumericBound::Minimum),
        ("exclusiveMaximum", NumericBound::ExclusiveMaximum),
        ("exclusiveMinimum", NumericBound::ExclusiveMinimum),
    ] {
        if let Some(limit) = map.get(keyword) {
            let limit = match limit {
                Value::Number(n) => n.clone(),
                _ => return Err(site.invalid(keyword, "expected a number")),
            };
            rules.push(Rule::NumericBound {
                bound,
                limit,
                schema_path: site.path_of(keyword),
            });
        }
    }
    Ok(())
}

fn string_rules(
    site: &Site<'_>,
    map: &Map<String, Value>,
    rules: &mut Vec<Rule>,
) -> Result<(), MalformedRuleSet> {
    for (keyword, bound) in [("maxLength", CountBound::Max), ("minLength", CountBound::Min)] {
        if let Some(limit) = map.get(keyword) {
            rules.push(Rule::Length {
                bound,
                limit: count_limit(site, keyword, limit)?,
                schema_path: site.path_of(keyword),
            });
        }
    }
    if let Some(pattern) = map.get("pattern") {
        let pattern = pattern
            .as_str()
            .ok_or_else(|| site.invalid("pattern", "expected a string"))?;
        rules.push(Rule::Pattern {
            regex: compile_pattern(site, pattern)?,
            schema_path: site.path_of("pattern"),
        });
    }
    if let Some(format) = map.get("format") {
        let name = format
            .as_str()
            .ok_or_else(|| site.invalid("format", "expected a string"))?;
        let format = Format::parse(name).ok_or_else(|| MalformedRuleSet::UnknownFormat {
            format: name.to_string(),
            location: site.location_of("format"),
        })?;
        rules.push(Rule::Format {
            format,
            schema_path: site.path_of("format"),
        });
    }
    Ok(())
}

fn count_limit(site: &Site<'_>, keyword: &str, limit: &Value) -> Result<u64, MalformedRuleSet> {
    limit
        .as_u64()
        .ok_or_else(|| site.invalid(keyword, "expected a non-negative integer"))
}

fn compile_pattern(site: &Site<'_>, pattern: &str) -> Result<Regex, MalformedRuleSet> {
    Regex::new(pattern).map_err(|e| MalformedRuleSet::InvalidPattern {
        pattern: pattern.to_string(),
        location: site.location(),
        reason: e.to_string(),
    })
}

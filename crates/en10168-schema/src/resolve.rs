//! # Reference Resolution
//!
//! External sub-schemas are addressed by absolute URI. The compiler never
//! fetches anything itself: it asks an injected [`Resolve`] implementation
//! for the document behind each URI (fragment stripped) and keeps the
//! answer in a [`ReferenceCache`].
//!
//! ## Implementations
//!
//! - [`StaticResolver`]: in-memory URI → document map (bundled schemas, tests).
//! - [`FileResolver`]: `file://` URIs plus URI-prefix → directory mirrors,
//!   so CI can validate against a vendored copy of the schema registry.
//! - [`HttpResolver`]: blocking HTTP(S) fetch with a timeout.
//! - [`ChainResolver`]: tries resolvers in order; the first one that does
//!   not answer [`ResolveError::NotFound`] wins.
//!
//! Any `Fn(&Url) -> Result<Value, ResolveError>` is a resolver too.
//!
//! ## Caching
//!
//! [`ReferenceCache::global`] is shared by every validator in the process;
//! [`ReferenceCache::new`] gives an isolated cache. Only successful
//! resolutions are stored, so a transient fetch failure can be retried by
//! the next compilation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Failure to produce the document behind a URI.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The resolver has no document for this URI.
    #[error("no document for '{uri}'")]
    NotFound { uri: String },

    /// The fetch did not complete within the configured timeout.
    #[error("fetching '{uri}' timed out after {timeout_secs}s")]
    Timeout { uri: String, timeout_secs: u64 },

    /// Transport or I/O failure.
    #[error("failed to fetch '{uri}': {reason}")]
    Fetch { uri: String, reason: String },

    /// The fetched bytes are not a JSON document.
    #[error("'{uri}' is not valid JSON: {reason}")]
    Parse { uri: String, reason: String },

    /// The HTTP client could not be constructed.
    #[error("HTTP client unavailable: {0}")]
    Client(String),
}

impl ResolveError {
    pub fn not_found(uri: &Url) -> Self {
        Self::NotFound {
            uri: uri.to_string(),
        }
    }

    /// Whether another resolver in a chain may still answer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Produces the JSON document behind an absolute, fragment-free URI.
pub trait Resolve: Send + Sync {
    fn resolve(&self, uri: &Url) -> Result<Value, ResolveError>;
}

impl<F> Resolve for F
where
    F: Fn(&Url) -> Result<Value, ResolveError> + Send + Sync,
{
    fn resolve(&self, uri: &Url) -> Result<Value, ResolveError> {
        self(uri)
    }
}

/// Strip the fragment; documents are cached and fetched without it.
pub(crate) fn document_uri(uri: &Url) -> Url {
    let mut doc = uri.clone();
    doc.set_fragment(None);
    doc
}

// ---------------------------------------------------------------------------
// Static
// ---------------------------------------------------------------------------

/// In-memory resolver keyed by document URI.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    documents: HashMap<String, Value>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `document` under `uri` (fragment ignored).
    pub fn with_document(mut self, uri: &str, document: Value) -> Self {
        self.insert(uri, document);
        self
    }

    pub fn insert(&mut self, uri: &str, document: Value) {
        let key = match Url::parse(uri) {
            Ok(url) => document_uri(&url).to_string(),
            Err(_) => uri.to_string(),
        };
        self.documents.insert(key, document);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Resolve for StaticResolver {
    fn resolve(&self, uri: &Url) -> Result<Value, ResolveError> {
        self.documents
            .get(document_uri(uri).as_str())
            .cloned()
            .ok_or_else(|| ResolveError::not_found(uri))
    }
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// Resolves `file://` URIs and URIs under registered prefixes from disk.
///
/// A mirror maps a URI prefix such as
/// `https://schemas.s1seven.com/schema-definitions/` to a local directory;
/// the remainder of the URI path is joined onto that directory.
#[derive(Debug, Clone, Default)]
pub struct FileResolver {
    mirrors: Vec<(String, PathBuf)>,
}

impl FileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mirror(mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.mirrors.push((prefix.into(), dir.into()));
        self
    }

    fn local_path(&self, uri: &Url) -> Option<PathBuf> {
        if uri.scheme() == "file" {
            return uri.to_file_path().ok();
        }
        let doc = document_uri(uri);
        let text = doc.as_str();
        self.mirrors
            .iter()
            .filter(|(prefix, _)| text.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, dir)| dir.join(text[prefix.len()..].trim_start_matches('/')))
    }
}

impl Resolve for FileResolver {
    fn resolve(&self, uri: &Url) -> Result<Value, ResolveError> {
        let path = self
            .local_path(uri)
            .ok_or_else(|| ResolveError::not_found(uri))?;
        read_json_file(uri, &path)
    }
}

fn read_json_file(uri: &Url, path: &Path) -> Result<Value, ResolveError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ResolveError::not_found(uri)
        } else {
            ResolveError::Fetch {
                uri: uri.to_string(),
                reason: format!("{}: {e}", path.display()),
            }
        }
    })?;
    serde_json::from_str(&content).map_err(|e| ResolveError::Parse {
        uri: uri.to_string(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Blocking HTTP(S) resolver.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl HttpResolver {
    /// Build a resolver whose requests fail after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ResolveError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ResolveError::Client(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Resolve for HttpResolver {
    fn resolve(&self, uri: &Url) -> Result<Value, ResolveError> {
        if !matches!(uri.scheme(), "http" | "https") {
            return Err(ResolveError::not_found(uri));
        }
        let doc = document_uri(uri);
        tracing::debug!(uri = %doc, "fetching external schema");

        let response = self
            .client
            .get(doc.clone())
            .send()
            .map_err(|e| self.transport_error(&doc, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ResolveError::not_found(&doc));
        }
        if !status.is_success() {
            return Err(ResolveError::Fetch {
                uri: doc.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let body = response.text().map_err(|e| self.transport_error(&doc, e))?;
        serde_json::from_str(&body).map_err(|e| ResolveError::Parse {
            uri: doc.to_string(),
            reason: e.to_string(),
        })
    }
}

impl HttpResolver {
    fn transport_error(&self, uri: &Url, err: reqwest::Error) -> ResolveError {
        if err.is_timeout() {
            ResolveError::Timeout {
                uri: uri.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            ResolveError::Fetch {
                uri: uri.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Tries each resolver in order until one answers something other than
/// `NotFound`.
#[derive(Default)]
pub struct ChainResolver {
    resolvers: Vec<Box<dyn Resolve>>,
}

impl ChainResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: impl Resolve + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl Resolve for ChainResolver {
    fn resolve(&self, uri: &Url) -> Result<Value, ResolveError> {
        for resolver in &self.resolvers {
            match resolver.resolve(uri) {
                Err(e) if e.is_not_found() => continue,
                other => return other,
            }
        }
        Err(ResolveError::not_found(uri))
    }
}

impl std::fmt::Debug for ChainResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainResolver")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Resolved external documents keyed by fragment-free URI.
///
/// Cloning is cheap; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCache {
    documents: Arc<RwLock<HashMap<String, Arc<Value>>>>,
}

impl ReferenceCache {
    /// A fresh, private cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<ReferenceCache> = OnceLock::new();
        GLOBAL.get_or_init(ReferenceCache::new).clone()
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<Value>> {
        self.documents.read().get(document_uri(uri).as_str()).cloned()
    }

    /// Return the cached document or resolve and store it. Failures are
    /// returned and not stored.
    pub fn get_or_resolve(
        &self,
        uri: &Url,
        resolver: &dyn Resolve,
    ) -> Result<Arc<Value>, ResolveError> {
        let doc = document_uri(uri);
        if let Some(hit) = self.documents.read().get(doc.as_str()) {
            tracing::trace!(uri = %doc, "reference cache hit");
            return Ok(Arc::clone(hit));
        }

        let fetched = Arc::new(resolver.resolve(&doc)?);
        tracing::debug!(uri = %doc, "resolved external document");

        let mut guard = self.documents.write();
        let stored = guard
            .entry(doc.to_string())
            .or_insert_with(|| Arc::clone(&fetched));
        Ok(Arc::clone(stored))
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.documents.read().contains_key(document_uri(uri).as_str())
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    pub fn clear(&self) {
        self.documents.write().clear();
    }
}

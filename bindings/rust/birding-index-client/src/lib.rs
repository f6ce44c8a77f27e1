//! # Birding Index Client
//!
//! A blocking client for an Elasticsearch-compatible document index, and the
//! `durable_index` shelf backend built on it.
//!
//! Every call is a single HTTP round-trip. There is no retry, backoff or
//! circuit breaking here: a slow index stalls the caller, and a failing one
//! surfaces as an error for the caller to handle.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use birding_core::{Shelf, ShelfConfig, ShelfRegistry, DURABLE_INDEX};
//! use birding_index_client::IndexClientOptions;
//! use serde_json::json;
//!
//! let mut registry = ShelfRegistry::new();
//! birding_index_client::register(&mut registry, IndexClientOptions::from_env());
//!
//! let config = ShelfConfig::new(DURABLE_INDEX).with_init("index", "terms");
//! let shelf = registry.build(&config)?;
//! shelf.set("apache storm", json!("2016-01-01T00:00:00Z"))?;
//! assert!(shelf.contains("apache storm")?);
//! # Ok::<(), birding_core::ShelfError>(())
//! ```

mod error;
mod options;

pub use error::Error;
pub use options::{IndexClientOptions, DEFAULT_TIMEOUT, DEFAULT_URL};

use birding_core::{Collection, DocumentIndex, IndexError, ShelfError, ShelfRegistry};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Url;
use serde_json::Value;

/// A client for one document index endpoint.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct ElasticsearchClient {
    http: Client,
    base: Url,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticsearchClient {
    /// Create a client for the given base URL without authentication.
    ///
    /// No connection is made until the first request.
    pub fn connect(url: &str) -> Result<Self, Error> {
        Self::with_options(IndexClientOptions::new(url))
    }

    /// Create a client with custom options.
    pub fn with_options(options: IndexClientOptions) -> Result<Self, Error> {
        let base = Url::parse(&options.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", options.url)))?;
        if base.cannot_be_a_base() {
            return Err(Error::InvalidUrl(options.url));
        }

        let http = Client::builder().timeout(options.timeout).build()?;

        Ok(Self {
            http,
            base,
            username: options.username,
            password: options.password,
        })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn doc_url(&self, collection: &Collection, id: &str) -> Result<Url, Error> {
        self.url(&[&collection.index, &collection.doc_type, id])
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, Error> {
        let request = match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        };

        let response = request.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        Err(Error::from_status(status, body))
    }

    /// Fetch a document's source.
    ///
    /// Returns `Error::NotFound` if the document (or index) does not exist.
    /// A found document without a source yields `Value::Null`.
    pub fn get_document(&self, collection: &Collection, id: &str) -> Result<Value, Error> {
        let url = self.doc_url(collection, id)?;
        tracing::debug!(%url, "GET document");

        let body = self.send(self.http.get(url))?.text()?;
        let mut doc: Value = serde_json::from_str(&body).map_err(Error::Deserialization)?;

        if doc.get("found").and_then(Value::as_bool) == Some(false) {
            return Err(Error::NotFound);
        }
        Ok(doc.get_mut("_source").map(Value::take).unwrap_or(Value::Null))
    }

    /// Create or replace a document.
    ///
    /// With `refresh` set, the index refreshes before responding, so the
    /// document is visible to the next read.
    pub fn index_document(&self, collection: &Collection, id: &str, body: &Value, refresh: bool) -> Result<(), Error> {
        let mut url = self.doc_url(collection, id)?;
        if refresh {
            url.query_pairs_mut().append_pair("refresh", "true");
        }
        tracing::debug!(%url, "PUT document");

        self.send(self.http.put(url).json(body))?;
        Ok(())
    }

    /// Delete a document. Returns `Error::NotFound` if it does not exist.
    pub fn delete_document(&self, collection: &Collection, id: &str) -> Result<(), Error> {
        let url = self.doc_url(collection, id)?;
        tracing::debug!(%url, "DELETE document");

        self.send(self.http.delete(url))?;
        Ok(())
    }

    /// Delete a whole index. Returns `Error::NotFound` if it does not exist.
    pub fn delete_index(&self, index: &str) -> Result<(), Error> {
        let url = self.url(&[index])?;
        tracing::warn!(%url, "DELETE index");

        self.send(self.http.delete(url))?;
        Ok(())
    }
}

impl DocumentIndex for ElasticsearchClient {
    fn get(&self, collection: &Collection, id: &str) -> Result<Value, IndexError> {
        Ok(self.get_document(collection, id)?)
    }

    fn index(&self, collection: &Collection, id: &str, body: &Value, refresh: bool) -> Result<(), IndexError> {
        Ok(self.index_document(collection, id, body, refresh)?)
    }

    fn delete(&self, collection: &Collection, id: &str) -> Result<(), IndexError> {
        Ok(self.delete_document(collection, id)?)
    }

    fn drop_index(&self, index: &str) -> Result<(), IndexError> {
        Ok(self.delete_index(index)?)
    }
}

/// Registers the `durable_index` backend kind, backed by this client.
///
/// `defaults` supply the connection; a shelf's own init parameters
/// (`url`, `username`, `password`, `timeout_secs`) override them.
pub fn register(registry: &mut ShelfRegistry, defaults: IndexClientOptions) -> &mut ShelfRegistry {
    registry.register_index(move |init| {
        let options = defaults.clone().merge_init(init)?;
        ElasticsearchClient::with_options(options)
            .map_err(|e| ShelfError::configuration(format!("cannot create index client: {e}")))
    })
}

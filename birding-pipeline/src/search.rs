//! Search API boundary and the Gnip binding.

use birding_core::SearchConfig;
use reqwest::blocking::Client;
use serde_json::{Map, Value};
use thiserror::Error;

/// Longest response body kept in an error message.
const MAX_BODY_IN_ERROR: usize = 512;

/// Parameters sent with every search unless overridden in configuration.
const DEFAULT_PUBLISHER: &str = "twitter";
const DEFAULT_MAX_RESULTS: u32 = 500;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("No search query provided")]
    EmptyQuery,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed search result: {0}")]
    MalformedResult(String),
}

/// Something that can search for a term and hydrate the result into
/// statuses.
pub trait SearchApi {
    /// Searches for `q`, returning the deserialized response.
    fn search(&self, q: &str) -> Result<Value, SearchError>;

    /// Turns a `search` response into the list of full statuses.
    fn lookup_search_result(&self, result: &Value) -> Result<Vec<Value>, SearchError>;
}

/// Blocking binding to the Gnip full-archive search API.
///
/// Gnip answers searches with complete activities under `results`, so
/// lookup is a local extraction rather than a second round-trip.
pub struct GnipSearch {
    http: Client,
    url: String,
    username: Option<String>,
    password: Option<String>,
    params: Map<String, Value>,
}

impl GnipSearch {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let mut params = Map::new();
        params.insert("publisher".to_string(), Value::from(DEFAULT_PUBLISHER));
        params.insert("maxResults".to_string(), Value::from(DEFAULT_MAX_RESULTS));
        params.extend(config.params.clone());

        Ok(Self {
            http: Client::builder().build()?,
            url: format!("{}/search/{}", config.base_url.trim_end_matches('/'), config.stream),
            username: config.username.clone(),
            password: config.password.clone(),
            params,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Query parameters for a search on `q`.
    fn query(&self, q: &str) -> Vec<(String, String)> {
        let mut query = vec![("q".to_string(), q.to_string())];
        query.extend(self.params.iter().filter(|(k, _)| k.as_str() != "q").map(|(k, v)| {
            let v = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), v)
        }));
        query
    }
}

impl SearchApi for GnipSearch {
    fn search(&self, q: &str) -> Result<Value, SearchError> {
        if q.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let mut request = self.http.get(&self.url).query(&self.query(q));
        if let Some(user) = &self.username {
            request = request.basic_auth(user, self.password.as_ref());
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().unwrap_or_default();
            if body.len() > MAX_BODY_IN_ERROR {
                let mut end = MAX_BODY_IN_ERROR;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
                body.push_str("...");
            }
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json()?)
    }

    fn lookup_search_result(&self, result: &Value) -> Result<Vec<Value>, SearchError> {
        statuses_of(result)
    }
}

/// Extracts the status list from a search response.
///
/// Accepts both the Gnip shape (`results`) and the REST search shape
/// (`statuses`).
pub fn statuses_of(result: &Value) -> Result<Vec<Value>, SearchError> {
    ["results", "statuses"]
        .iter()
        .find_map(|field| result.get(field).and_then(Value::as_array))
        .cloned()
        .ok_or_else(|| SearchError::MalformedResult("no `results` or `statuses` array".to_string()))
}

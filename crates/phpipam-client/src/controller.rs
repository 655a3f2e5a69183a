//! phpIPAM API controllers
//!
//! A controller is one named resource collection of the API (`sections`,
//! `subnets`, `addresses`, `devices`, `tools`, ...). [`Controller`] binds the
//! collection's URL to the client's shared transport and forwards the HTTP
//! verbs to it. Responses come back as [`ApiResponse`] without any parsing,
//! so new server-side routes work without client changes.

use crate::common::catalog::{Catalog, create_index};
use crate::common::{ApiTransport, RequestBody, join_url};
use crate::error::PhpIpamError;
use crate::response::ApiResponse;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Request dispatcher bound to `<host>/api/<app>/<name>/`
#[derive(Clone)]
pub struct Controller {
    name: String,
    base_url: String,
    transport: Arc<ApiTransport>,
}

impl Controller {
    pub(crate) fn new(transport: Arc<ApiTransport>, parent_url: &str, name: &str) -> Self {
        let name = name.trim_matches('/').to_string();
        let base_url = join_url(parent_url, &name);
        Self {
            name,
            base_url,
            transport,
        }
    }

    /// Controller name, e.g. `devices` or `tools/locations`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base URL every request of this controller starts from (ends with `/`)
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for `path` below this controller
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Nested controller, e.g. `tools` → `tools/locations`
    #[must_use]
    pub fn subcontroller(&self, name: &str) -> Controller {
        let mut sub = Controller::new(Arc::clone(&self.transport), &self.base_url, name);
        sub.name = format!("{}/{}", self.name, sub.name);
        sub
    }

    /// Start building a request for `method` on `path`
    #[must_use]
    pub fn request(&self, method: Method, path: &str) -> ControllerRequest {
        ControllerRequest {
            transport: Arc::clone(&self.transport),
            method,
            url: self.url(path),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            error: None,
        }
    }

    /// GET `path`
    pub async fn get(&self, path: &str) -> Result<ApiResponse, PhpIpamError> {
        self.request(Method::GET, path).send().await
    }

    /// GET `path` with query parameters
    pub async fn get_with_query<I, K, V>(&self, path: &str, query: I) -> Result<ApiResponse, PhpIpamError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.request(Method::GET, path).query(query).send().await
    }

    /// GET a single item by id
    ///
    /// The id is percent-encoded as one path segment.
    pub async fn get_by_id(&self, id: &str) -> Result<ApiResponse, PhpIpamError> {
        self.get(&urlencoding::encode(id)).await
    }

    /// POST `body` as JSON to `path`
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, PhpIpamError> {
        self.request(Method::POST, path).json(body).send().await
    }

    /// PUT `body` as JSON to `path`
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, PhpIpamError> {
        self.request(Method::PUT, path).json(body).send().await
    }

    /// PATCH `body` as JSON to `path`
    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse, PhpIpamError> {
        self.request(Method::PATCH, path).json(body).send().await
    }

    /// DELETE `path`
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, PhpIpamError> {
        self.request(Method::DELETE, path).send().await
    }

    /// Fetch every item of this controller and index it by `fields`
    ///
    /// Unlike the verbs, a non-success status is an error here.
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(client: phpipam_client::PhpIpamClient) -> Result<(), phpipam_client::PhpIpamError> {
    /// let racks = client.controller("tools").subcontroller("racks").catalog(&["name", "location"]).await?;
    /// let rack = racks.get(("R01", "3"));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn catalog(&self, fields: &[&str]) -> Result<Catalog, PhpIpamError> {
        let response = self.get("").await?.error_for_status()?;
        let items: Vec<Value> = response.data()?.unwrap_or_default();
        create_index(items, fields)
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phpIPAM controller API url: {}", self.base_url)
    }
}

/// Builder for one controller request
#[must_use = "requests do nothing until sent"]
pub struct ControllerRequest {
    transport: Arc<ApiTransport>,
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<RequestBody>,
    error: Option<PhpIpamError>,
}

impl ControllerRequest {
    /// Append query parameters
    pub fn query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a request header
    ///
    /// Invalid header names or values surface as an error from `send`.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => {
                self.error.get_or_insert(PhpIpamError::InvalidConfig(format!(
                    "invalid header '{name}'"
                )));
            }
        }
        self
    }

    /// Send `body` serialized as JSON
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => self.body = Some(RequestBody::Json(bytes)),
            Err(e) => {
                self.error.get_or_insert(PhpIpamError::Serialization(e));
            }
        }
        self
    }

    /// Send raw bytes as the body, verbatim
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(RequestBody::Raw(body.into()));
        self
    }

    /// Target URL of the request
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send the request
    pub async fn send(self) -> Result<ApiResponse, PhpIpamError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.transport
            .execute(self.method, &self.url, &self.query, self.headers, self.body)
            .await
    }
}

impl fmt::Debug for ControllerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

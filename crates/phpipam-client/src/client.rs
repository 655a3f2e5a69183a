//! phpIPAM API client
//!
//! Entry point of the crate. [`PhpIpamClient`] owns the HTTP transport and
//! the session, and hands out [`Controller`]s for any API controller name.
//! Based on the phpIPAM API layout: `<host>/api/<app>/<controller>/...`

use crate::common::ApiTransport;
use crate::config::ClientConfig;
use crate::controller::Controller;
use crate::error::PhpIpamError;
use crate::session::{SessionManager, SessionState, SessionToken};
use reqwest::Client;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// phpIPAM API client
///
/// Cloning is cheap; clones share the session and the controller cache.
#[derive(Clone)]
pub struct PhpIpamClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<ApiTransport>,
    controllers: Mutex<HashMap<String, Controller>>,
}

impl PhpIpamClient {
    /// Create a new client without contacting the server
    ///
    /// The first request logs in (unless the configuration carries a token).
    ///
    /// # Arguments
    /// * `config` - connection parameters, see [`ClientConfig`]
    pub fn new(config: ClientConfig) -> Result<Self, PhpIpamError> {
        config.validate()?;

        let http = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(!config.verify_tls())
            .build()?;

        let session = SessionManager::new(http.clone(), &config);
        let transport = Arc::new(ApiTransport::new(http, config.api_url(), session));

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                controllers: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Create a client and log in right away
    ///
    /// When the configuration carries a pre-shared token no login is done.
    pub async fn connect(config: ClientConfig) -> Result<Self, PhpIpamError> {
        let skip_login = config.token.is_some();
        let client = Self::new(config)?;
        if skip_login {
            debug!("Using pre-shared token, skipping login");
        } else {
            client.login().await?;
        }
        Ok(client)
    }

    /// Create a client from `PHPIPAM_*` environment variables and log in
    pub async fn from_env() -> Result<Self, PhpIpamError> {
        Self::connect(ClientConfig::from_env()?).await
    }

    /// Configuration the client was built with
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// `<host>/api/<app>`
    #[must_use]
    pub fn api_url(&self) -> &str {
        self.inner.transport.api_url()
    }

    /// Session manager owning the token
    #[must_use]
    pub fn session(&self) -> &SessionManager {
        self.inner.transport.session()
    }

    /// Log in now, replacing any stored token
    pub async fn login(&self) -> Result<SessionToken, PhpIpamError> {
        self.session().login().await
    }

    /// Return a valid token, logging in first if needed
    pub async fn ensure_token(&self) -> Result<String, PhpIpamError> {
        self.session().ensure_token().await
    }

    /// Current authentication state
    pub async fn state(&self) -> SessionState {
        self.session().state().await
    }

    /// Controller bound to `<host>/api/<app>/<name>/`
    ///
    /// Any name works; handles are created on first use and cached for the
    /// lifetime of the client.
    ///
    /// # Example
    /// ```no_run
    /// # async fn example(client: phpipam_client::PhpIpamClient) -> Result<(), phpipam_client::PhpIpamError> {
    /// let res = client.controller("addresses").get("search/172.30.35.1").await?;
    /// if res.is_success() {
    ///     let body: serde_json::Value = res.json()?;
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn controller(&self, name: &str) -> Controller {
        let name = name.trim_matches('/');
        let mut controllers = self
            .inner
            .controllers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        controllers
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Creating controller {}", name);
                Controller::new(
                    Arc::clone(&self.inner.transport),
                    &format!("{}/", self.api_url()),
                    name,
                )
            })
            .clone()
    }

    /// `sections` controller
    #[must_use]
    pub fn sections(&self) -> Controller {
        self.controller("sections")
    }

    /// `subnets` controller
    #[must_use]
    pub fn subnets(&self) -> Controller {
        self.controller("subnets")
    }

    /// `addresses` controller
    #[must_use]
    pub fn addresses(&self) -> Controller {
        self.controller("addresses")
    }

    /// `vlan` controller
    #[must_use]
    pub fn vlans(&self) -> Controller {
        self.controller("vlan")
    }

    /// `vrf` controller
    #[must_use]
    pub fn vrfs(&self) -> Controller {
        self.controller("vrf")
    }

    /// `devices` controller
    #[must_use]
    pub fn devices(&self) -> Controller {
        self.controller("devices")
    }

    /// `tools` controller
    #[must_use]
    pub fn tools(&self) -> Controller {
        self.controller("tools")
    }
}

impl fmt::Debug for PhpIpamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhpIpamClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::expand::expand_ids;
    use crate::mock::MockPhpIpamServer;
    use chrono::{TimeDelta, Utc};
    use reqwest::{Method, StatusCode};
    use serde_json::json;

    async fn server() -> MockPhpIpamServer {
        MockPhpIpamServer::start("api1", "u", "p").await.unwrap()
    }

    fn config(server: &MockPhpIpamServer) -> ClientConfig {
        ClientConfig::new(server.url(), "api1").with_credentials("u", "p")
    }

    #[test]
    fn test_controller_base_url() {
        let client = PhpIpamClient::new(ClientConfig::new("http://ipam.example", "api1")).unwrap();

        for name in ["devices", "subnets", "addresses", "l2domains", "anything_new"] {
            let controller = client.controller(name);
            assert_eq!(controller.base_url(), format!("http://ipam.example/api/api1/{name}/"));
            assert_eq!(controller.name(), name);
        }
    }

    #[test]
    fn test_controller_name_slashes_trimmed() {
        let client = PhpIpamClient::new(ClientConfig::new("http://ipam.example/", "api1")).unwrap();
        assert_eq!(client.controller("/devices/").base_url(), "http://ipam.example/api/api1/devices/");
    }

    #[test]
    fn test_controller_is_cached() {
        let client = PhpIpamClient::new(ClientConfig::new("http://ipam.example", "api1")).unwrap();
        let first = client.controller("devices");
        let second = client.devices();
        assert_eq!(first.base_url(), second.base_url());
        assert_eq!(client.inner.controllers.lock().unwrap().len(), 1);

        let _ = client.controller("subnets");
        let _ = client.clone().controller("devices");
        assert_eq!(client.inner.controllers.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_subcontroller() {
        let client = PhpIpamClient::new(ClientConfig::new("http://ipam.example", "api1")).unwrap();
        let locations = client.tools().subcontroller("locations");

        assert_eq!(locations.name(), "tools/locations");
        assert_eq!(locations.base_url(), "http://ipam.example/api/api1/tools/locations/");
        assert_eq!(locations.url("5"), "http://ipam.example/api/api1/tools/locations/5/");
        assert_eq!(
            locations.to_string(),
            "phpIPAM controller API url: http://ipam.example/api/api1/tools/locations/"
        );
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = PhpIpamClient::new(ClientConfig::new("ipam.example", "api1"));
        assert!(matches!(result, Err(PhpIpamError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_end_to_end_devices_get() {
        let server = server().await;
        server.set_token("T1", "9999-01-01");
        server.route(
            Method::GET,
            "devices/",
            StatusCode::OK,
            json!({"code": 200, "success": true, "data": [{"id": "1", "hostname": "sw1"}]}),
        );

        let client = PhpIpamClient::connect(config(&server)).await.unwrap();
        let response = client.controller("devices").get("").await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let data: Vec<serde_json::Value> = response.data().unwrap().unwrap();
        assert_eq!(data[0]["hostname"], "sw1");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[0].path, "/api/api1/devices/");
        assert_eq!(requests[0].token.as_deref(), Some("T1"));
        assert_eq!(server.login_count(), 1);
    }

    #[tokio::test]
    async fn test_new_logs_in_lazily() {
        let server = server().await;
        server.route(Method::GET, "sections/", StatusCode::OK, json!({"success": true, "data": []}));

        let client = PhpIpamClient::new(config(&server)).unwrap();
        assert_eq!(client.state().await, SessionState::Unauthenticated);
        assert_eq!(server.login_count(), 0);

        client.sections().get("").await.unwrap();
        client.sections().get("").await.unwrap();

        assert_eq!(server.login_count(), 1);
        assert_eq!(client.state().await, SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_expired_preshared_token_refreshes_once() {
        let server = server().await;
        server.set_token("fresh", "9999-01-01");
        server.route(Method::GET, "subnets/7/", StatusCode::OK, json!({"success": true, "data": {"id": "7"}}));

        let config = config(&server).with_token("stale", Some(Utc::now() - TimeDelta::minutes(5)));
        let client = PhpIpamClient::connect(config).await.unwrap();
        assert_eq!(server.login_count(), 0);

        let response = client.subnets().get("7").await.unwrap();

        assert!(response.is_success());
        assert_eq!(server.login_count(), 1);
        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].token.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_connect_fails_on_rejected_login() {
        let server = server().await;
        server.fail_logins(Some(StatusCode::UNAUTHORIZED));

        let err = PhpIpamClient::connect(config(&server)).await.unwrap_err();
        match err {
            PhpIpamError::Authentication { status, .. } => assert_eq!(status, StatusCode::UNAUTHORIZED),
            other => panic!("expected authentication error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_returned_not_raised() {
        let server = server().await;
        server.route(
            Method::GET,
            "addresses/12/",
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"code": 500, "success": false, "message": "Database error"}),
        );

        let client = PhpIpamClient::connect(config(&server)).await.unwrap();
        let response = client.addresses().get("12").await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.text().contains("Database error"));
        assert_eq!(server.requests().len(), 1);
        assert_eq!(server.login_count(), 1);
    }

    #[tokio::test]
    async fn test_verbs_pass_body_and_query_through() {
        let server = server().await;
        server.route(Method::POST, "addresses/", StatusCode::CREATED, json!({"success": true, "id": "44"}));
        server.route(Method::PATCH, "addresses/44/", StatusCode::OK, json!({"success": true}));
        server.route(Method::PUT, "addresses/44/", StatusCode::OK, json!({"success": true}));
        server.route(Method::DELETE, "addresses/44/", StatusCode::OK, json!({"success": true}));
        server.route(Method::GET, "addresses/search/10.0.0.1/", StatusCode::OK, json!({"success": true, "data": []}));

        let client = PhpIpamClient::connect(config(&server)).await.unwrap();
        let addresses = client.addresses();

        let created = addresses.post("", &json!({"subnetId": "3", "ip": "10.0.0.1"})).await.unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(created.json::<serde_json::Value>().unwrap()["id"], "44");

        addresses.patch("44", &json!({"description": "uplink"})).await.unwrap();
        addresses.put("/44/", &json!({"hostname": "sw1"})).await.unwrap();
        addresses.delete("44").await.unwrap();
        addresses
            .get_with_query("search/10.0.0.1", [("links", "false")])
            .await
            .unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 5);

        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].path, "/api/api1/addresses/");
        assert_eq!(requests[0].json().unwrap()["ip"], "10.0.0.1");
        assert_eq!(
            requests[0].headers.get("content-type").unwrap(),
            "application/json"
        );

        assert_eq!(requests[1].method, Method::PATCH);
        assert_eq!(requests[1].json().unwrap()["description"], "uplink");
        assert_eq!(requests[2].method, Method::PUT);
        assert_eq!(requests[2].path, "/api/api1/addresses/44/");
        assert_eq!(requests[3].method, Method::DELETE);
        assert!(requests[3].body.is_empty());

        assert_eq!(requests[4].path, "/api/api1/addresses/search/10.0.0.1/");
        assert_eq!(requests[4].query.as_deref(), Some("links=false"));

        assert!(requests.iter().all(|r| r.token.as_deref() == Some("mock-token")));
    }

    #[tokio::test]
    async fn test_request_builder_raw_body_and_header() {
        let server = server().await;
        server.route(Method::POST, "tools/racks/", StatusCode::OK, json!({"success": true}));

        let client = PhpIpamClient::connect(config(&server)).await.unwrap();
        let request = client
            .tools()
            .subcontroller("racks")
            .request(Method::POST, "")
            .header("x-trace", "abc")
            .body("name=R01&size=47");
        assert_eq!(request.url(), format!("{}/api/api1/tools/racks/", server.url()));

        let response = request.send().await.unwrap();
        assert!(response.is_success());

        let recorded = &server.requests()[0];
        assert_eq!(recorded.body, b"name=R01&size=47");
        assert_eq!(recorded.headers.get("x-trace").unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_invalid_header_is_reported_on_send() {
        let server = server().await;
        let client = PhpIpamClient::connect(config(&server)).await.unwrap();

        let result = client
            .devices()
            .request(Method::GET, "")
            .header("bad header", "x")
            .send()
            .await;

        assert!(matches!(result, Err(PhpIpamError::InvalidConfig(_))));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_response_drops_token_without_retry() {
        let server = server().await;
        server.set_token("A", "9999-01-01");
        server.route(Method::GET, "vlan/", StatusCode::OK, json!({"success": true, "data": []}));

        let client = PhpIpamClient::connect(config(&server)).await.unwrap();

        // Server-side the session is gone; the stale token gets a 401
        server.set_token("B", "9999-01-01");
        let rejected = client.vlans().get("").await.unwrap();
        assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(server.requests().len(), 1);
        assert_eq!(client.state().await, SessionState::Unauthenticated);

        let accepted = client.vlans().get("").await.unwrap();
        assert_eq!(accepted.status(), StatusCode::OK);
        assert_eq!(server.login_count(), 2);
        assert_eq!(server.requests()[1].token.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_token_expired_forbidden_drops_token() {
        let server = server().await;
        server.route(Method::GET, "vlan/", StatusCode::FORBIDDEN, json!({
            "code": 403,
            "success": false,
            "message": "Token expired"
        }));
        server.route(Method::GET, "vrf/", StatusCode::FORBIDDEN, json!({
            "code": 403,
            "success": false,
            "message": "Application disabled"
        }));

        let client = PhpIpamClient::connect(config(&server)).await.unwrap();

        let denied = client.vrfs().get("").await.unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
        assert_eq!(client.state().await, SessionState::Authenticated);

        let expired = client.vlans().get("").await.unwrap();
        assert_eq!(expired.status(), StatusCode::FORBIDDEN);
        assert_eq!(client.state().await, SessionState::Unauthenticated);

        let _ = client.vlans().get("").await.unwrap();
        assert_eq!(server.login_count(), 2);
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_caller_token_header_does_not_replace_session_token() {
        let server = server().await;
        server.route(Method::GET, "devices/", StatusCode::OK, json!({"success": true, "data": []}));

        let client = PhpIpamClient::connect(config(&server)).await.unwrap();
        let response = client
            .devices()
            .request(Method::GET, "")
            .header("token", "forged")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let recorded = &server.requests()[0];
        let tokens: Vec<&str> = recorded
            .headers
            .get_all("token")
            .iter()
            .map(|value| value.to_str().unwrap())
            .collect();
        assert_eq!(tokens, ["mock-token"]);
    }

    #[tokio::test]
    async fn test_transport_error_passes_through() {
        // Grab a free port and release it so nothing listens there
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let config = ClientConfig::new(url, "api1")
            .with_token("T1", None)
            .with_timeout(std::time::Duration::from_secs(2));
        let client = PhpIpamClient::new(config).unwrap();

        let err = client.devices().get("").await.unwrap_err();
        assert!(matches!(err, PhpIpamError::Http(_)));
    }

    #[tokio::test]
    async fn test_catalog() {
        let server = server().await;
        server.route(
            Method::GET,
            "tools/locations/",
            StatusCode::OK,
            json!({"success": true, "data": [
                {"id": "1", "name": "DC1"},
                {"id": "2", "name": "DC2"}
            ]}),
        );

        let client = PhpIpamClient::connect(config(&server)).await.unwrap();
        let catalog = client.tools().subcontroller("locations").catalog(&["name"]).await.unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("DC2").unwrap()["id"], "2");
    }

    #[tokio::test]
    async fn test_catalog_requires_success() {
        let server = server().await;
        let client = PhpIpamClient::connect(config(&server)).await.unwrap();

        let err = client.tools().subcontroller("racks").catalog(&["name"]).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_expand_ids() {
        let server = server().await;
        server.route(Method::GET, "addresses/1/", StatusCode::OK, json!({"success": true, "data": {"id": "1", "ip": "10.0.0.1"}}));
        server.route(Method::GET, "addresses/2/", StatusCode::OK, json!({"success": true, "data": {"id": "2", "ip": "10.0.0.2"}}));

        let client = PhpIpamClient::connect(config(&server)).await.unwrap();
        let items = expand_ids(&client.addresses(), ["1", "2"]).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["ip"], "10.0.0.2");
    }

    #[tokio::test]
    async fn test_expand_ids_partial_on_bad_request() {
        let server = server().await;
        server.route(Method::GET, "addresses/1/", StatusCode::OK, json!({"success": true, "data": {"id": "1"}}));
        server.route(
            Method::GET,
            "addresses/x/",
            StatusCode::BAD_REQUEST,
            json!({"code": 400, "success": false, "message": "Invalid Id"}),
        );

        let client = PhpIpamClient::connect(config(&server)).await.unwrap();
        let err = expand_ids(&client.addresses(), ["1", "x", "3"]).await.unwrap_err();

        match err {
            PhpIpamError::PartialExpansion { id, processed, response } => {
                assert_eq!(id, "x");
                assert_eq!(processed.len(), 1);
                assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            }
            other => panic!("expected partial expansion, got {other:?}"),
        }
        // Stops at the failing id
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_expand_ids_other_failure_is_status_error() {
        let server = server().await;
        let client = PhpIpamClient::connect(config(&server)).await.unwrap();

        let err = expand_ids(&client.addresses(), ["99"]).await.unwrap_err();
        assert!(matches!(err, PhpIpamError::Status { .. }));
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }
}

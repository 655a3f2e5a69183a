//! Mock phpIPAM server for testing
//!
//! An in-process axum server that speaks enough of the phpIPAM API to test
//! clients without a running phpIPAM instance:
//!
//! - `POST /api/<app>/user/` checks basic-auth credentials and issues the
//!   configured token and expiry (or fails with a configured status)
//! - every other request is recorded, rejected with 401 unless it carries the
//!   current token, and answered from the registered routes (404 otherwise)

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::debug;

/// A request received by the mock server (login requests excluded)
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method
    pub method: Method,
    /// Request path, e.g. `/api/api1/devices/`
    pub path: String,
    /// Raw query string, if any
    pub query: Option<String>,
    /// Value of the `token` header, if any
    pub token: Option<String>,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Parse the request body as JSON
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Debug)]
struct MockState {
    app: String,
    user: String,
    password: String,
    token: Mutex<String>,
    expires: Mutex<String>,
    login_failure: Mutex<Option<StatusCode>>,
    login_delay: Mutex<Option<Duration>>,
    logins: AtomicUsize,
    routes: Mutex<HashMap<(Method, String), (StatusCode, Value)>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockState {
    fn login_path(&self) -> String {
        format!("/api/{}/user/", self.app)
    }

    fn resource_path(&self, path: &str) -> String {
        format!("/api/{}/{}", self.app, path.trim_start_matches('/'))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock phpIPAM server bound to an ephemeral localhost port
///
/// The server stops when this value is dropped.
#[derive(Debug)]
pub struct MockPhpIpamServer {
    addr: SocketAddr,
    url: String,
    state: Arc<MockState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockPhpIpamServer {
    /// Start a server for API `app` accepting `user`/`password`
    ///
    /// Logins issue the token `mock-token` expiring `9999-12-31 23:59:59`
    /// until changed with [`MockPhpIpamServer::set_token`].
    pub async fn start(app: &str, user: &str, password: &str) -> std::io::Result<Self> {
        let state = Arc::new(MockState {
            app: app.trim_matches('/').to_string(),
            user: user.to_string(),
            password: password.to_string(),
            token: Mutex::new("mock-token".to_string()),
            expires: Mutex::new("9999-12-31 23:59:59".to_string()),
            login_failure: Mutex::new(None),
            login_delay: Mutex::new(None),
            logins: AtomicUsize::new(0),
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let router = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let (shutdown, stopped) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = stopped.await;
            });
            if let Err(e) = server.await {
                debug!("Mock phpIPAM server stopped with error: {}", e);
            }
        });

        debug!("Mock phpIPAM server listening on {}", addr);

        Ok(Self {
            addr,
            url: format!("http://{addr}"),
            state,
            shutdown: Some(shutdown),
        })
    }

    /// Base URL of the server, e.g. `http://127.0.0.1:41234`
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Socket address the server listens on
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Token and expiry issued by later logins
    ///
    /// Requests carrying any other token are rejected with 401 from now on.
    pub fn set_token(&self, token: &str, expires: &str) {
        *lock(&self.state.token) = token.to_string();
        *lock(&self.state.expires) = expires.to_string();
    }

    /// Make logins fail with `status` (`None` restores normal logins)
    pub fn fail_logins(&self, status: Option<StatusCode>) {
        *lock(&self.state.login_failure) = status;
    }

    /// Delay every login answer by `delay`
    pub fn set_login_delay(&self, delay: Duration) {
        *lock(&self.state.login_delay) = Some(delay);
    }

    /// Answer `method` on `path` (relative to `/api/<app>/`) with `status` and `body`
    pub fn route(&self, method: Method, path: &str, status: StatusCode, body: Value) {
        let path = self.state.resource_path(path);
        lock(&self.state.routes).insert((method, path), (status, body));
    }

    /// Number of login requests received, failed ones included
    #[must_use]
    pub fn login_count(&self) -> usize {
        self.state.logins.load(Ordering::SeqCst)
    }

    /// Resource requests received so far, oldest first
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state.requests).clone()
    }
}

impl Drop for MockPhpIpamServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();

    if method == Method::POST && (path == state.login_path() || path == state.login_path().trim_end_matches('/')) {
        return login(&state, &headers).await;
    }

    let token = headers
        .get("token")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    lock(&state.requests).push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        token: token.clone(),
        headers,
        body: body.to_vec(),
    });

    let current = lock(&state.token).clone();
    if token.as_deref() != Some(current.as_str()) {
        return envelope_error(StatusCode::UNAUTHORIZED, "Please authenticate");
    }

    let answer = lock(&state.routes).get(&(method, path)).cloned();
    match answer {
        Some((status, body)) => (status, axum::Json(body)).into_response(),
        None => envelope_error(StatusCode::NOT_FOUND, "Invalid request"),
    }
}

async fn login(state: &MockState, headers: &HeaderMap) -> Response {
    state.logins.fetch_add(1, Ordering::SeqCst);

    let delay = *lock(&state.login_delay);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let failure = *lock(&state.login_failure);
    if let Some(status) = failure {
        return envelope_error(status, "Invalid username or password");
    }

    let authorized = basic_credentials(headers)
        .is_some_and(|(user, password)| user == state.user && password == state.password);
    if !authorized {
        return envelope_error(StatusCode::UNAUTHORIZED, "Invalid username or password");
    }

    let token = lock(&state.token).clone();
    let expires = lock(&state.expires).clone();
    (
        StatusCode::OK,
        axum::Json(json!({
            "code": 200,
            "success": true,
            "data": {"token": token, "expires": expires},
            "time": 0.01
        })),
    )
        .into_response()
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

fn envelope_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        axum::Json(json!({
            "code": status.as_u16(),
            "success": false,
            "message": message
        })),
    )
        .into_response()
}

//! phpIPAM REST API Client
//!
//! A Rust client library for the [phpIPAM](https://phpipam.net/) REST API.
//! Handles the token login handshake and exposes every API controller
//! (`sections`, `subnets`, `addresses`, `devices`, ...) as a [`Controller`]
//! that forwards the HTTP verbs and returns the raw [`ApiResponse`].
//!
//! # Example
//!
//! ```no_run
//! use phpipam_client::{ClientConfig, PhpIpamClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("http://phpipam:8080", "myapp")
//!     .with_credentials("admin", "secret");
//! let client = PhpIpamClient::connect(config).await?;
//!
//! // Any controller name works
//! let res = client.controller("addresses").get("search/172.30.35.1").await?;
//! let found: Option<serde_json::Value> = res.data()?;
//!
//! // Nested controllers, e.g. /tools/locations/
//! let locations = client.tools().subcontroller("locations").catalog(&["name"]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Token sessions**: login on demand, refresh on expiry, one login for concurrent callers
//! - **Passthrough**: non-success statuses are returned, never raised
//! - **Catalogs**: index controller items by one or more fields
//! - **Mock server** (`test-util`): in-process phpIPAM stand-in for tests

pub mod client;
pub mod common;
pub mod config;
pub mod controller;
pub mod error;
pub mod response;
pub mod session;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::PhpIpamClient;
pub use common::catalog::{Catalog, CatalogKey, create_index, index_by};
pub use common::expand::expand_ids;
pub use common::{ApiTransport, TOKEN_HEADER};
pub use config::ClientConfig;
pub use controller::{Controller, ControllerRequest};
pub use error::PhpIpamError;
pub use response::{ApiEnvelope, ApiResponse};
pub use session::{SessionManager, SessionState, SessionToken, parse_expiry};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockPhpIpamServer, RecordedRequest};

pub use reqwest::{Method, StatusCode};

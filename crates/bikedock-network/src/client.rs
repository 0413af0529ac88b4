//! HTTP client for the dock authority.
//!
//! The authority exposes three JSON endpoints under a common base URL:
//!
//! ```text
//! POST {base}/dock      {"dockID"}
//! POST {base}/checkin   {"dockID", "bikeID"}
//! POST {base}/checkout  {"dockID", "bikeID", "cardString"}
//! ```
//!
//! A success status authorizes the request. Response bodies are ignored.
//!
//! # Example Usage
//!
//! ```no_run
//! use bikedock_network::{Authority, AuthorityConfig, HttpAuthority};
//! use bikedock_core::{BikeId, DockId};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthorityConfig::new("https://bikes.example.org/api")
//!     .with_timeout(Duration::from_secs(5));
//!
//! let authority = HttpAuthority::new(config, DockId::new("181149779735094")?)?;
//!
//! if authority.check_in(&BikeId::new("BIKE123")?).await {
//!     println!("Bike accepted");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Design Principles
//!
//! - **Fail closed**: transport errors, timeouts and non-success statuses
//!   are all denials
//! - **No automatic retry**: a denied check-in is retried by the rider,
//!   not by the dock
//! - **Bounded latency**: every request carries the configured timeout

use crate::authority::Authority;
use bikedock_core::constants::{DEFAULT_AUTHORITY_BASE_URL, DEFAULT_AUTHORITY_TIMEOUT_MS};
use bikedock_core::{BikeId, CardCode, DockId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration for the authority client
///
/// # Example
///
/// ```
/// use bikedock_network::AuthorityConfig;
/// use std::time::Duration;
///
/// let config = AuthorityConfig::new("http://127.0.0.1:3000/api")
///     .with_timeout(Duration::from_millis(2500));
/// assert_eq!(config.timeout(), Duration::from_millis(2500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Base URL the endpoint names are appended to
    pub base_url: String,

    /// Timeout for a whole request, in milliseconds
    pub timeout_ms: u64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AUTHORITY_BASE_URL.to_string(),
            timeout_ms: DEFAULT_AUTHORITY_TIMEOUT_MS,
        }
    }
}

impl AuthorityConfig {
    /// Create a configuration for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Errors that can occur while talking to the authority
///
/// Only construction errors leave this crate; request errors are logged and
/// collapsed into a denial.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// Base URL is not an absolute http(s) URL
    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),

    /// HTTP client could not be built
    #[error("Client setup failed: {0}")]
    Setup(#[source] reqwest::Error),

    /// Request did not complete within the timeout
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Connection or protocol failure
    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Authority answered with a non-success status
    #[error("Rejected with status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    #[serde(rename = "dockID")]
    dock_id: &'a str,
}

#[derive(Debug, Serialize)]
struct CheckInRequest<'a> {
    #[serde(rename = "dockID")]
    dock_id: &'a str,
    #[serde(rename = "bikeID")]
    bike_id: &'a str,
}

#[derive(Debug, Serialize)]
struct CheckOutRequest<'a> {
    #[serde(rename = "dockID")]
    dock_id: &'a str,
    #[serde(rename = "bikeID")]
    bike_id: &'a str,
    #[serde(rename = "cardString")]
    card_string: &'a str,
}

/// Authority reached over HTTP+JSON
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpAuthority {
    client: reqwest::Client,
    base_url: String,
    dock_id: DockId,
    timeout_ms: u64,
}

impl HttpAuthority {
    /// Create a client speaking for `dock_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute http(s) URL or the
    /// HTTP client cannot be built.
    pub fn new(config: AuthorityConfig, dock_id: DockId) -> Result<Self, AuthorityError> {
        let url = reqwest::Url::parse(&config.base_url)
            .map_err(|e| AuthorityError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AuthorityError::InvalidUrl(config.base_url));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(AuthorityError::Setup)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            dock_id,
            timeout_ms: config.timeout_ms,
        })
    }

    /// Dock this client speaks for
    pub fn dock_id(&self) -> &DockId {
        &self.dock_id
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url)
    }

    async fn post<T: Serialize>(&self, name: &str, body: &T) -> Result<(), AuthorityError> {
        let url = self.endpoint(name);
        debug!(url = %url, "Sending authority request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuthorityError::Timeout(self.timeout_ms)
                } else {
                    AuthorityError::Transport(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AuthorityError::Status(status))
        }
    }

    /// Collapse a request result into a verdict, logging failures
    fn verdict(operation: &'static str, result: Result<(), AuthorityError>) -> bool {
        match result {
            Ok(()) => true,
            Err(AuthorityError::Status(status)) => {
                info!(operation, status = status.as_u16(), "Authority denied request");
                false
            }
            Err(e) => {
                warn!(operation, error = %e, "Authority unreachable, treating as denied");
                false
            }
        }
    }
}

impl Authority for HttpAuthority {
    async fn register(&self, dock_id: &DockId) -> bool {
        let body = RegisterRequest {
            dock_id: dock_id.as_str(),
        };
        Self::verdict("register", self.post("dock", &body).await)
    }

    async fn check_in(&self, bike_id: &BikeId) -> bool {
        let body = CheckInRequest {
            dock_id: self.dock_id.as_str(),
            bike_id: bike_id.as_str(),
        };
        Self::verdict("check_in", self.post("checkin", &body).await)
    }

    async fn check_out(&self, bike_id: &BikeId, card: &CardCode) -> bool {
        let body = CheckOutRequest {
            dock_id: self.dock_id.as_str(),
            bike_id: bike_id.as_str(),
            card_string: card.as_str(),
        };
        Self::verdict("check_out", self.post("checkout", &body).await)
    }
}

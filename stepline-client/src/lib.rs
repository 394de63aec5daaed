//! Stepline Clients
//!
//! Interfaces to the two remote collaborators the pipeline engine depends on,
//! plus an HTTP implementation of both against the compute manager API.
//!
//! - [`ContentStore`]: blob upload/download inside named storage containers
//! - [`ComputeSessions`]: ephemeral compute sessions that execute code
//!
//! The engine only sees the traits, so tests substitute in-memory fakes.
//!
//! # Example
//!
//! ```no_run
//! use stepline_client::{ContentStore, ManagerClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ManagerClient::new("http://localhost:8081");
//!
//!     for folder in client.list().await? {
//!         println!("{} ({})", folder.name, folder.host);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod folders;
mod sessions;

// Re-export commonly used types
pub use error::{ClientError, Result};

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use stepline_core::dto::folder::FolderInfo;
use stepline_core::dto::session::{ExecuteRequest, ExecuteResponse, SessionHandle, SessionOptions};

/// Blob storage organised in named containers
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Lists every container visible to the caller
    async fn list(&self) -> Result<Vec<FolderInfo>>;

    /// Creates a container on the given storage host
    async fn create(&self, container: &str, host: &str) -> Result<()>;

    /// Creates a directory inside a container
    async fn mkdir(&self, container: &str, path: &str) -> Result<()>;

    /// Writes a blob, replacing any previous content
    async fn upload(&self, container: &str, path: &str, bytes: Vec<u8>) -> Result<()>;

    /// Reads a blob
    ///
    /// Returns [`ClientError::NotFound`] when the blob does not exist.
    async fn download(&self, container: &str, path: &str) -> Result<Vec<u8>>;
}

/// Provider of ephemeral compute sessions
#[async_trait]
pub trait ComputeSessions: Send + Sync {
    /// Starts a session running `image`
    async fn create_session(&self, image: &str, options: &SessionOptions)
    -> Result<SessionHandle>;

    /// Submits one poll to a session
    ///
    /// Callers must not issue a second poll for the same session before this
    /// one returns.
    async fn execute(&self, session_id: &str, request: ExecuteRequest) -> Result<ExecuteResponse>;

    /// Fetches the accumulated container logs of a session
    async fn get_logs(&self, session_id: &str) -> Result<String>;

    /// Terminates a session
    async fn destroy_session(&self, session_id: &str) -> Result<()>;
}

/// HTTP client for the compute manager API
///
/// Implements both [`ContentStore`] (storage folders) and
/// [`ComputeSessions`] (sessions), organised into two groups of endpoints.
#[derive(Debug, Clone)]
pub struct ManagerClient {
    /// Base URL of the manager (e.g., "http://localhost:8081")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl ManagerClient {
    /// Create a new manager client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the manager API (e.g., "http://localhost:8081")
    ///
    /// # Example
    /// ```
    /// use stepline_client::ManagerClient;
    ///
    /// let client = ManagerClient::new("http://localhost:8081");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new manager client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use stepline_client::ManagerClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = ManagerClient::with_client("http://localhost:8081", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the manager
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Fails with the rejection carried by a non-success response
    ///
    /// A 404 becomes [`ClientError::NotFound`] naming `what`.
    async fn check_status(&self, response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(what.to_string()));
        }

        Err(ClientError::rejected(status.as_u16(), error_text))
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        what: &str,
    ) -> Result<T> {
        let response = self.check_status(response, what).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::Malformed(format!("{}: {}", what, e)))
    }

    /// Handle an API response whose body is raw bytes
    async fn handle_bytes_response(&self, response: reqwest::Response, what: &str) -> Result<Vec<u8>> {
        let response = self.check_status(response, what).await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Handle an API response that returns no content
    async fn handle_empty_response(&self, response: reqwest::Response, what: &str) -> Result<()> {
        self.check_status(response, what).await?;
        Ok(())
    }
}

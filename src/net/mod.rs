//! HTTP adapters for the three remote collaborators.
//!
//! ARCHITECTURE
//! ============
//! `types` holds the provider-neutral traits the controller depends on.
//! `auth`, `generation`, and `names` implement them over `reqwest`, sharing
//! one connection pool built by [`http_client`].

pub mod auth;
pub mod generation;
pub mod names;
pub mod types;

use std::time::Duration;

use crate::config::HttpTimeouts;

/// Build the shared HTTP client with request and connect timeouts applied.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client(timeouts: HttpTimeouts) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeouts.request_secs))
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .build()
}

/// Read a response body for an error report without failing the caller.
async fn error_body(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}

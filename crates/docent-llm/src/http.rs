//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

use crate::error::LlmError;

/// Create an HTTP client with standard docent configuration.
///
/// Config: 30s connect timeout, 120s request timeout (large embedding batches),
/// rustls TLS, `docent/{version}` user-agent, redirect limit 10.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn default_client() -> Result<reqwest::Client, LlmError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(120))
        .user_agent(concat!("docent/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?;
    Ok(client)
}

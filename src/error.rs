//! Error type for discovery setup
//!
//! Only construction and configuration can fail with an `Err` here.
//! Upstream failures during resolution (DNS timeouts, control-plane
//! outages, inconsistent task data) are logged and degrade to empty or
//! stale results instead of propagating.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Configuration file could not be read.
    #[error("could not read configuration: {0}")]
    ConfigRead(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("could not parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The system DNS resolver could not be constructed.
    #[error("dns resolver setup failed: {0}")]
    Resolver(String),

    /// The control-plane HTTP client could not be constructed.
    #[error("http client setup failed: {0}")]
    Http(#[from] reqwest::Error),
}

//! Discovery configuration
//!
//! Settings for the discovery registry and its backends. This is the
//! narrow slice of the surrounding system's configuration that the
//! resolution engine needs: per-backend enablement, the cluster DNS
//! domain, the control-plane base URL, the default backend selection,
//! and the output schema version.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DiscoveryError;

/// Registry name of the cluster-DNS backend.
pub const DNS_BACKEND: &str = "dns-backend";

/// Registry name of the control-plane API backend.
pub const API_BACKEND: &str = "api-backend";

/// Registry name of the no-op backend.
pub const NULL_BACKEND: &str = "none";

/// All backend names the registry knows.
pub const BACKEND_NAMES: [&str; 3] = [DNS_BACKEND, API_BACKEND, NULL_BACKEND];

/// Output schema version the legacy flat reshaping applies to.
const LEGACY_VERSION: &str = "0.7";

/// Main configuration for discovery resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Backend used for apps that do not name one themselves.
    pub default_discovery: String,

    /// Output schema version; "0.7" selects the legacy flat schema.
    pub version: String,

    /// Cluster-DNS backend settings.
    pub dns: DnsConfig,

    /// Control-plane API backend settings.
    pub api: ApiConfig,
}

/// Settings for the cluster-DNS backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// Whether the backend may be used at all.
    pub enabled: bool,

    /// Cluster DNS zone the scheduler publishes SRV records into.
    pub domain: String,
}

/// Settings for the control-plane API backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Whether the backend may be used at all.
    pub enabled: bool,

    /// Base URL of the control-plane HTTP API, transport and
    /// authentication pre-configured by the operator.
    pub url: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            default_discovery: NULL_BACKEND.to_string(),
            version: "1.0".to_string(),
            dns: DnsConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

/// Output schema versions the registry can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    /// The flat single-port-record schema ("0.7").
    Legacy,
    /// The current host/port-set schema.
    Current,
}

impl DiscoveryConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, DiscoveryError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), DiscoveryError> {
        let content = toml::to_string_pretty(self)
            .map_err(|err| DiscoveryError::ConfigInvalid(err.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Schema version the compatibility transform should target.
    pub fn schema_version(&self) -> SchemaVersion {
        if self.version == LEGACY_VERSION {
            SchemaVersion::Legacy
        } else {
            SchemaVersion::Current
        }
    }

    // Builder-style methods for CLI/embedder overrides

    pub fn with_default_discovery(mut self, name: impl Into<String>) -> Self {
        self.default_discovery = name.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_dns_domain(mut self, domain: impl Into<String>) -> Self {
        self.dns.domain = domain.into();
        self.dns.enabled = true;
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api.url = url.into();
        self.api.enabled = true;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if !BACKEND_NAMES.contains(&self.default_discovery.as_str()) {
            return Err(DiscoveryError::ConfigInvalid(format!(
                "default_discovery \"{}\" is not one of {:?}",
                self.default_discovery, BACKEND_NAMES
            )));
        }

        if self.dns.enabled && self.dns.domain.is_empty() {
            return Err(DiscoveryError::ConfigInvalid(
                "dns backend is enabled but no domain is configured".to_string(),
            ));
        }

        if self.api.enabled && self.api.url.is_empty() {
            return Err(DiscoveryError::ConfigInvalid(
                "api backend is enabled but no url is configured".to_string(),
            ));
        }

        Ok(())
    }
}

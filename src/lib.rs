//! Harbor Discovery
//!
//! Resolves abstract service declarations attached to cluster
//! applications into concrete, reachable endpoints (hostname, addresses,
//! protocol, port) by querying one of several pluggable discovery
//! backends.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     DISCOVERY REGISTRY                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  DNS Backend          ←── SRV/A records in the cluster zone │
//! │  API Backend          ←── control-plane task/port lists     │
//! │  Null Backend         ←── explicit opt-out, always empty    │
//! │  Compat Transform     ←── legacy output schema reshaping    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A caller asks the [`Registry`] to resolve an [`App`]; the registry
//! picks the backend the app names (or the configured default),
//! delegates when that backend is enabled, and reshapes the result into
//! the output schema version the consuming renderer expects. No failure
//! in a backend is fatal: bad upstream data or a flaky resolver degrade
//! to an empty or partial result plus a log line.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use harbor_discovery::{DiscoveryConfig, HickoryDns, Registry};
//!
//! # async fn run() -> Result<(), harbor_discovery::DiscoveryError> {
//! let config = DiscoveryConfig::default()
//!     .with_default_discovery("dns-backend")
//!     .with_dns_domain("harbor.cluster");
//! config.validate()?;
//!
//! let dns = Arc::new(HickoryDns::from_system_config()?);
//! let registry = Registry::new(&config, dns)?;
//!
//! // registry.update_data().await;
//! // let resolved = registry.resolve(&app).await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod dns_query;
pub mod error;
pub mod registry;
pub mod types;

pub use backend::{ApiBackend, DiscoveryBackend, DnsBackend, NullBackend};
pub use config::{
    ApiConfig, DiscoveryConfig, DnsConfig, SchemaVersion, API_BACKEND, BACKEND_NAMES, DNS_BACKEND,
    NULL_BACKEND,
};
pub use dns_query::{DnsQuery, HickoryDns, SrvRecord, StaticDns};
pub use error::DiscoveryError;
pub use registry::{AppCatalog, Registry};
pub use types::{
    mask_matches, App, HostMap, LegacyHosts, LegacyMap, PortRecord, PortSelector, PortSet,
    Protocol, Resolution, ResolvedHost, ServiceSpec,
};

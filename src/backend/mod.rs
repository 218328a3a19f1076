//! Discovery Backends
//!
//! Every discovery strategy implements the same small capability set:
//! report whether its configuration enables it, refresh any
//! backend-local cache, and resolve an app's service specs into hosts.
//! Backends never fail outward; upstream trouble is logged and degrades
//! to empty or stale results.

mod api;
mod dns;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::config::NULL_BACKEND;
use crate::dns_query::DnsQuery;
use crate::types::{App, HostMap, ResolvedHost};

pub use api::ApiBackend;
pub use dns::DnsBackend;

/// Capability contract implemented by every discovery strategy.
#[async_trait]
pub trait DiscoveryBackend: Send + Sync {
    /// Registry name of this backend.
    fn name(&self) -> &'static str;

    /// Whether configuration enables this backend.
    fn enabled(&self) -> bool;

    /// Refresh any backend-local cache needed before resolution.
    ///
    /// Safe to call repeatedly; transient upstream failure keeps the
    /// previously cached state.
    async fn update_data(&self);

    /// Resolve the app's service specs into discovered hosts.
    async fn resolve(&self, app: &App) -> HostMap;
}

/// The universal fallback: always enabled, never resolves anything.
///
/// Lets an app opt out of discovery explicitly without triggering a
/// "backend not found" warning.
pub struct NullBackend;

#[async_trait]
impl DiscoveryBackend for NullBackend {
    fn name(&self) -> &'static str {
        NULL_BACKEND
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn update_data(&self) {}

    async fn resolve(&self, _app: &App) -> HostMap {
        HostMap::new()
    }
}

/// Ensure a host entry exists under `hostname`, performing the A lookup
/// for its addresses on first sight only.
pub(crate) async fn ensure_host(
    seen: &mut BTreeMap<String, ResolvedHost>,
    hostname: &str,
    dns: &dyn DnsQuery,
) {
    if !seen.contains_key(hostname) {
        let ip = dns.query_addresses(hostname).await;
        seen.insert(hostname.to_string(), ResolvedHost::new(hostname, ip));
    }
}

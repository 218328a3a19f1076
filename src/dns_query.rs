//! DNS query helper
//!
//! Issues the A and SRV lookups the backends depend on. Resolution
//! failure is never surfaced to callers: a failed or timed-out query
//! logs an error and yields an empty answer, so one bad name cannot
//! stall or abort a whole resolution pass.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use tracing::error;

/// Bound on one SRV query, connection and overall lifetime.
const SRV_LIFETIME: Duration = Duration::from_secs(1);

/// One SRV answer: target host and the port it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvRecord {
    /// SRV target with the trailing root-label dot stripped.
    pub target: String,

    /// Port carried by the record.
    pub port: u16,
}

/// The DNS lookups discovery backends are built on.
#[async_trait]
pub trait DnsQuery: Send + Sync {
    /// Resolve an A record set. Empty on any resolution error.
    async fn query_addresses(&self, fqdn: &str) -> Vec<IpAddr>;

    /// Resolve an SRV record set. Empty on any resolution error or
    /// after [`SRV_LIFETIME`] has elapsed.
    async fn query_service_records(&self, fqdn: &str) -> Vec<SrvRecord>;
}

/// [`DnsQuery`] implementation backed by the hickory resolver.
pub struct HickoryDns {
    resolver: TokioResolver,
}

impl HickoryDns {
    /// Construct from env and system configuration, e.g. `resolv.conf`.
    pub fn from_system_config() -> Result<Self, crate::error::DiscoveryError> {
        let mut builder = TokioResolver::builder_tokio()
            .map_err(|err| crate::error::DiscoveryError::Resolver(err.to_string()))?;

        let opts = builder.options_mut();
        opts.timeout = SRV_LIFETIME;
        opts.attempts = 1;

        Ok(Self {
            resolver: builder.build(),
        })
    }
}

#[async_trait]
impl DnsQuery for HickoryDns {
    async fn query_addresses(&self, fqdn: &str) -> Vec<IpAddr> {
        match self.resolver.lookup_ip(fqdn).await {
            Ok(lookup) => lookup.iter().collect(),
            Err(err) => {
                error!("Could not resolve {}. Error: {}", fqdn, err);
                Vec::new()
            }
        }
    }

    async fn query_service_records(&self, fqdn: &str) -> Vec<SrvRecord> {
        let lookup = match tokio::time::timeout(SRV_LIFETIME, self.resolver.srv_lookup(fqdn)).await
        {
            Ok(Ok(lookup)) => lookup,
            Ok(Err(err)) => {
                error!("Could not resolve {}. Error: {}", fqdn, err);
                return Vec::new();
            }
            Err(_) => {
                error!("Could not resolve {}. Error: SRV query timed out", fqdn);
                return Vec::new();
            }
        };

        lookup
            .iter()
            .map(|srv| SrvRecord {
                target: strip_root_dot(&srv.target().to_string()).to_string(),
                port: srv.port(),
            })
            .collect()
    }
}

/// Strip the trailing root-label dot from an absolute DNS name.
fn strip_root_dot(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

/// In-memory [`DnsQuery`] answering from pre-configured records.
///
/// Useful for tests and for embedders wiring discovery against a fixed
/// topology; unknown names resolve to empty answers, like a real
/// resolver failure would.
#[derive(Debug, Default)]
pub struct StaticDns {
    addresses: HashMap<String, Vec<IpAddr>>,
    services: HashMap<String, Vec<SrvRecord>>,
}

impl StaticDns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an A answer for a name.
    pub fn add_address(&mut self, fqdn: impl Into<String>, ip: IpAddr) {
        self.addresses.entry(fqdn.into()).or_default().push(ip);
    }

    /// Add an SRV answer for a name.
    pub fn add_service_record(&mut self, fqdn: impl Into<String>, target: &str, port: u16) {
        self.services.entry(fqdn.into()).or_default().push(SrvRecord {
            target: target.to_string(),
            port,
        });
    }
}

#[async_trait]
impl DnsQuery for StaticDns {
    async fn query_addresses(&self, fqdn: &str) -> Vec<IpAddr> {
        self.addresses.get(fqdn).cloned().unwrap_or_default()
    }

    async fn query_service_records(&self, fqdn: &str) -> Vec<SrvRecord> {
        self.services.get(fqdn).cloned().unwrap_or_default()
    }
}

//! Discovery Registry
//!
//! Holds one long-lived instance per backend name and dispatches an
//! app's resolution request to the backend the app selects (or the
//! configured default), then reshapes the result into the output schema
//! version the consuming renderer expects. Backends are wired in
//! explicitly at construction; there is no process-global state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::backend::{ApiBackend, DiscoveryBackend, DnsBackend, NullBackend};
use crate::config::{DiscoveryConfig, SchemaVersion};
use crate::dns_query::DnsQuery;
use crate::error::DiscoveryError;
use crate::types::{App, HostMap, LegacyHosts, LegacyMap, PortRecord, PortSet, Resolution};

/// External app-list refresher, owned by the configuration subsystem.
///
/// [`Registry::update_data`] calls it before refreshing backend caches
/// so that the next resolution pass sees a current app list.
#[async_trait]
pub trait AppCatalog: Send + Sync {
    async fn refresh_apps(&self);
}

pub struct Registry {
    backends: HashMap<&'static str, Box<dyn DiscoveryBackend>>,
    default_discovery: String,
    version: SchemaVersion,
    catalog: Option<Arc<dyn AppCatalog>>,
}

impl Registry {
    /// Construct the registry with the standard backends wired in:
    /// cluster DNS, the control-plane API, and the no-op fallback.
    pub fn new(config: &DiscoveryConfig, dns: Arc<dyn DnsQuery>) -> Result<Self, DiscoveryError> {
        let backends: Vec<Box<dyn DiscoveryBackend>> = vec![
            Box::new(DnsBackend::new(config.dns.clone(), dns.clone())),
            Box::new(ApiBackend::new(config.api.clone(), dns)?),
            Box::new(NullBackend),
        ];
        Ok(Self::with_backends(
            backends,
            config.default_discovery.clone(),
            config.schema_version(),
        ))
    }

    /// Construct from an explicit backend set, for embedders wiring
    /// custom strategies.
    pub fn with_backends(
        backends: Vec<Box<dyn DiscoveryBackend>>,
        default_discovery: String,
        version: SchemaVersion,
    ) -> Self {
        Self {
            backends: backends
                .into_iter()
                .map(|backend| (backend.name(), backend))
                .collect(),
            default_discovery,
            version,
            catalog: None,
        }
    }

    /// Wire in the external app-list refresher.
    pub fn with_catalog(mut self, catalog: Arc<dyn AppCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Names of the known backends.
    pub fn backend_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.backends.keys().copied()
    }

    /// Resolve an app through its selected backend.
    pub async fn resolve(&self, app: &App) -> Resolution {
        if app.services.is_empty() {
            return Resolution::empty();
        }

        let name = app.discovery.as_deref().unwrap_or(&self.default_discovery);
        let Some(backend) = self.backends.get(name) else {
            warn!("Discovery \"{}\" is not present", name);
            return Resolution::empty();
        };

        if !backend.enabled() {
            error!("Discovery \"{}\" is disabled", name);
            return Resolution::empty();
        }

        self.compatible(backend.resolve(app).await)
    }

    /// Refresh the app catalog, then every enabled backend's cache.
    pub async fn update_data(&self) {
        if let Some(catalog) = &self.catalog {
            catalog.refresh_apps().await;
        }
        for backend in self.backends.values() {
            if backend.enabled() {
                backend.update_data().await;
            }
        }
    }

    /// Reshape resolved hosts into the configured output schema.
    fn compatible(&self, hosts: HostMap) -> Resolution {
        match self.version {
            SchemaVersion::Legacy => Resolution::Legacy(to_legacy(hosts)),
            SchemaVersion::Current => Resolution::Hosts(hosts),
        }
    }
}

/// Reshape into the legacy flat schema: one `{name, ip, port}` record
/// per raw port, and per-port-name groups of such records for named
/// ports. The legacy schema predates udp support, so only the tcp slot
/// is consulted.
fn to_legacy(hosts: HostMap) -> LegacyMap {
    let mut legacy = LegacyMap::new();

    for (service, host_list) in hosts {
        for host in host_list {
            match &host.tcp {
                Some(PortSet::Raw(ports)) => {
                    let entry = legacy
                        .entry(service.clone())
                        .or_insert_with(|| LegacyHosts::Flat(Vec::new()));
                    if let LegacyHosts::Flat(records) = entry {
                        for port in ports {
                            records.push(PortRecord {
                                name: host.name.clone(),
                                ip: host.ip.clone(),
                                port: *port,
                            });
                        }
                    }
                }
                Some(PortSet::Named(ports)) => {
                    let entry = legacy
                        .entry(service.clone())
                        .or_insert_with(|| LegacyHosts::Named(BTreeMap::new()));
                    if let LegacyHosts::Named(groups) = entry {
                        for (port_name, port) in ports {
                            groups.entry(port_name.clone()).or_default().push(PortRecord {
                                name: host.name.clone(),
                                ip: host.ip.clone(),
                                port: *port,
                            });
                        }
                    }
                }
                None => {
                    legacy
                        .entry(service.clone())
                        .or_insert_with(|| LegacyHosts::Flat(Vec::new()));
                }
            }
        }
    }

    legacy
}

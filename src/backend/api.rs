//! Control-plane API backend
//!
//! Periodically pulls the full task list and container port-mapping
//! list from the cluster control plane, then resolves services by
//! correlating per-task live ports against the port masks a service
//! spec declares. Stale-but-available data is preferred over no data:
//! each refresh request fails independently and leaves its half of the
//! cache untouched.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{error, warn};

use crate::backend::{ensure_host, DiscoveryBackend};
use crate::config::{ApiConfig, API_BACKEND};
use crate::dns_query::DnsQuery;
use crate::error::DiscoveryError;
use crate::types::{mask_matches, App, HostMap, PortSelector, Protocol, ResolvedHost};

#[derive(Debug, Clone, Deserialize)]
struct AppsResponse {
    apps: Vec<ControlPlaneApp>,
}

#[derive(Debug, Clone, Deserialize)]
struct ControlPlaneApp {
    id: String,
    container: Option<Container>,
}

#[derive(Debug, Clone, Deserialize)]
struct Container {
    #[serde(rename = "type")]
    kind: Option<String>,
    docker: Option<Docker>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Docker {
    #[serde(default)]
    port_mappings: Vec<PortMapping>,
}

/// One declared container port of a control-plane app.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortMapping {
    #[serde(default)]
    protocol: String,
    #[serde(default)]
    name: String,
    service_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
struct TasksResponse {
    tasks: Vec<TaskInfo>,
}

/// One live task placement reported by the control plane.
///
/// `ports` and `service_ports` are positionally aligned: the live port
/// allocated for a declared service port sits at the same index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskInfo {
    app_id: String,
    host: String,
    #[serde(default)]
    ports: Vec<u16>,
    #[serde(default)]
    service_ports: Vec<u16>,
}

#[derive(Debug, Default)]
struct ApiCache {
    /// Port-mapping list per control-plane app id; empty for apps that
    /// are not container-backed.
    port_mappings: HashMap<String, Vec<PortMapping>>,
    /// Current task list.
    tasks: Vec<TaskInfo>,
}

pub struct ApiBackend {
    config: ApiConfig,
    client: reqwest::Client,
    dns: Arc<dyn DnsQuery>,
    cache: RwLock<ApiCache>,
}

impl ApiBackend {
    pub fn new(config: ApiConfig, dns: Arc<dyn DnsQuery>) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            config,
            client,
            dns,
            cache: RwLock::new(ApiCache::default()),
        })
    }

    async fn fetch_port_mappings(
        &self,
        url: &str,
    ) -> Result<HashMap<String, Vec<PortMapping>>, reqwest::Error> {
        let response: AppsResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut port_mappings = HashMap::new();
        for app in response.apps {
            let mappings = app
                .container
                .filter(|container| container.kind.as_deref() == Some("DOCKER"))
                .and_then(|container| container.docker)
                .map(|docker| docker.port_mappings)
                .unwrap_or_default();
            port_mappings.insert(app.id, mappings);
        }
        Ok(port_mappings)
    }

    async fn fetch_tasks(&self, url: &str) -> Result<Vec<TaskInfo>, reqwest::Error> {
        let response: TasksResponse = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.tasks)
    }
}

#[async_trait]
impl DiscoveryBackend for ApiBackend {
    fn name(&self) -> &'static str {
        API_BACKEND
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn update_data(&self) {
        let base = self.config.url.trim_end_matches('/');

        let apps_url = format!("{}/v2/apps", base);
        match self.fetch_port_mappings(&apps_url).await {
            Ok(port_mappings) => self.cache.write().await.port_mappings = port_mappings,
            Err(err) => warn!(
                "Apps ({}) request to the control plane failed: {}",
                apps_url, err
            ),
        }

        let tasks_url = format!("{}/v2/tasks", base);
        match self.fetch_tasks(&tasks_url).await {
            Ok(tasks) => self.cache.write().await.tasks = tasks,
            Err(err) => warn!(
                "Tasks ({}) request to the control plane failed: {}",
                tasks_url, err
            ),
        }
    }

    async fn resolve(&self, app: &App) -> HostMap {
        let cache = self.cache.read().await;
        let mut hosts: BTreeMap<String, BTreeMap<String, ResolvedHost>> = BTreeMap::new();

        for service in &app.services {
            let Some(group) = service.effective_group(app) else {
                error!(
                    "Group for service \"{}\" of config \"{}\" not found",
                    service.name, app.conf_name
                );
                continue;
            };

            let group_path = reverse_group_path(group);
            let service_mask = format!("{}{}", group_path, service.name);

            for task in &cache.tasks {
                if !mask_matches(&service_mask, &task.app_id) {
                    continue;
                }

                let derived = derive_service_name(&task.app_id, &group_path);
                let seen = hosts.entry(derived).or_default();

                let Some(mappings) = cache.port_mappings.get(&task.app_id) else {
                    continue;
                };

                for mapping in mappings {
                    let Some(protocol) = Protocol::parse(&mapping.protocol) else {
                        continue;
                    };
                    let Some(selector) = service.selector(protocol) else {
                        continue;
                    };
                    let Some(port) = lookup_task_port(task, mapping.service_port) else {
                        warn!(
                            "Service port {} of \"{}\" not present in the task on {}; skipping",
                            mapping.service_port, task.app_id, task.host
                        );
                        continue;
                    };

                    match selector {
                        PortSelector::Masks(masks) => {
                            if masks.iter().any(|mask| mask_matches(mask, &mapping.name)) {
                                ensure_host(seen, &task.host, &*self.dns).await;
                                if let Some(host) = seen.get_mut(&task.host) {
                                    host.insert_named(protocol, &mapping.name, port);
                                }
                            }
                        }
                        PortSelector::Any => {
                            ensure_host(seen, &task.host, &*self.dns).await;
                            if let Some(host) = seen.get_mut(&task.host) {
                                host.push_raw(protocol, port);
                            }
                        }
                    }
                }
            }
        }

        hosts
            .into_iter()
            .map(|(name, seen)| (name, seen.into_values().collect()))
            .collect()
    }
}

/// Convert a dotted group into the control plane's path convention:
/// `zzz.yyy.xxx` becomes `/xxx/yyy/zzz/`.
fn reverse_group_path(group: &str) -> String {
    let mut segments: Vec<&str> = group.split('.').collect();
    segments.reverse();
    format!("/{}/", segments.join("/"))
}

/// Derive the externally visible service name from a task's app id by
/// stripping the group prefix and re-reversing the remaining path
/// segments back into dot notation.
fn derive_service_name(app_id: &str, group_path: &str) -> String {
    let remainder = app_id.get(group_path.len()..).unwrap_or("");
    let mut segments: Vec<&str> = remainder.split('/').collect();
    segments.reverse();
    segments.join(".")
}

/// Resolve the live port allocated for a declared service port. The
/// declared port being absent from the task's service-port list is a
/// data inconsistency; the caller skips that one port.
fn lookup_task_port(task: &TaskInfo, service_port: u16) -> Option<u16> {
    let index = task
        .service_ports
        .iter()
        .position(|declared| *declared == service_port)?;
    task.ports.get(index).copied()
}

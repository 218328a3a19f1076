//! Cluster-DNS backend
//!
//! Resolves services from the SRV records a cluster scheduler publishes
//! into its DNS zone. The query-name conventions are a contract with
//! that zone and must not change:
//!
//! - named ports:  `_<portName>._<serviceName>.<group>._<protocol>.<domain>`
//! - any port:     `_<serviceName>.<group>._<protocol>.<domain>`

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::backend::{ensure_host, DiscoveryBackend};
use crate::config::{DnsConfig, DNS_BACKEND};
use crate::dns_query::DnsQuery;
use crate::types::{App, HostMap, PortSelector, Protocol, ResolvedHost};

pub struct DnsBackend {
    config: DnsConfig,
    dns: Arc<dyn DnsQuery>,
}

impl DnsBackend {
    pub fn new(config: DnsConfig, dns: Arc<dyn DnsQuery>) -> Self {
        Self { config, dns }
    }
}

#[async_trait]
impl DiscoveryBackend for DnsBackend {
    fn name(&self) -> &'static str {
        DNS_BACKEND
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn update_data(&self) {}

    async fn resolve(&self, app: &App) -> HostMap {
        let mut hosts = HostMap::new();
        let domain = &self.config.domain;

        for service in &app.services {
            let Some(group) = service.effective_group(app) else {
                error!(
                    "Group for service \"{}\" of config \"{}\" not found",
                    service.name, app.conf_name
                );
                continue;
            };

            let mut seen: BTreeMap<String, ResolvedHost> = BTreeMap::new();
            for protocol in Protocol::ALL {
                let Some(selector) = service.selector(protocol) else {
                    continue;
                };

                match selector {
                    PortSelector::Masks(port_names) => {
                        for port_name in port_names {
                            let fqdn = format!(
                                "_{}._{}.{}._{}.{}",
                                port_name, service.name, group, protocol, domain
                            );
                            for record in self.dns.query_service_records(&fqdn).await {
                                ensure_host(&mut seen, &record.target, &*self.dns).await;
                                if let Some(host) = seen.get_mut(&record.target) {
                                    host.insert_named(protocol, port_name, record.port);
                                }
                            }
                        }
                    }
                    PortSelector::Any => {
                        let fqdn =
                            format!("_{}.{}._{}.{}", service.name, group, protocol, domain);
                        for record in self.dns.query_service_records(&fqdn).await {
                            ensure_host(&mut seen, &record.target, &*self.dns).await;
                            if let Some(host) = seen.get_mut(&record.target) {
                                host.push_raw(protocol, record.port);
                            }
                        }
                    }
                }
            }

            hosts.insert(service.name.clone(), seen.into_values().collect());
        }

        hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns_query::StaticDns;
    use crate::types::PortSet;
    use std::net::IpAddr;

    fn backend(dns: StaticDns) -> DnsBackend {
        DnsBackend::new(
            DnsConfig {
                enabled: true,
                domain: "harbor.cluster".to_string(),
            },
            Arc::new(dns),
        )
    }

    fn app(services: Vec<crate::types::ServiceSpec>) -> App {
        App {
            group: Some("prod".to_string()),
            services,
            discovery: None,
            conf_name: "app.conf".to_string(),
        }
    }

    fn service(name: &str, tcp: Option<PortSelector>, udp: Option<PortSelector>) -> crate::types::ServiceSpec {
        crate::types::ServiceSpec {
            name: name.to_string(),
            group: None,
            tcp,
            udp,
        }
    }

    fn ip(addr: &str) -> IpAddr {
        addr.parse().unwrap()
    }

    #[tokio::test]
    async fn test_named_ports_query_per_port_records() {
        let mut dns = StaticDns::new();
        dns.add_service_record("_web._frontend.prod._tcp.harbor.cluster", "h1", 31000);
        dns.add_service_record("_admin._frontend.prod._tcp.harbor.cluster", "h1", 31001);
        dns.add_address("h1", ip("10.0.0.1"));

        let backend = backend(dns);
        let app = app(vec![service(
            "frontend",
            Some(PortSelector::Masks(vec![
                "web".to_string(),
                "admin".to_string(),
            ])),
            None,
        )]);

        let hosts = backend.resolve(&app).await;
        let frontend = &hosts["frontend"];
        assert_eq!(frontend.len(), 1);
        assert_eq!(frontend[0].name, "h1");
        assert_eq!(frontend[0].ip, vec![ip("10.0.0.1")]);

        let mut expected = BTreeMap::new();
        expected.insert("web".to_string(), 31000);
        expected.insert("admin".to_string(), 31001);
        assert_eq!(frontend[0].tcp, Some(PortSet::Named(expected)));
    }

    #[tokio::test]
    async fn test_any_port_queries_group_level_records() {
        let mut dns = StaticDns::new();
        dns.add_service_record("_frontend.prod._tcp.harbor.cluster", "h1", 31000);
        dns.add_service_record("_frontend.prod._tcp.harbor.cluster", "h1", 31001);
        dns.add_address("h1", ip("10.0.0.1"));

        let backend = backend(dns);
        let app = app(vec![service("frontend", Some(PortSelector::Any), None)]);

        let hosts = backend.resolve(&app).await;
        let frontend = &hosts["frontend"];
        assert_eq!(frontend.len(), 1);
        assert_eq!(frontend[0].tcp, Some(PortSet::Raw(vec![31000, 31001])));
    }

    #[tokio::test]
    async fn test_protocols_resolve_independently() {
        let mut dns = StaticDns::new();
        dns.add_service_record("_dns.prod._tcp.harbor.cluster", "h1", 31053);
        dns.add_service_record("_dns.prod._udp.harbor.cluster", "h1", 31054);
        dns.add_address("h1", ip("10.0.0.1"));

        let backend = backend(dns);
        let app = app(vec![service(
            "dns",
            Some(PortSelector::Any),
            Some(PortSelector::Any),
        )]);

        let hosts = backend.resolve(&app).await;
        let entry = &hosts["dns"];
        assert_eq!(entry.len(), 1);
        assert_eq!(entry[0].tcp, Some(PortSet::Raw(vec![31053])));
        assert_eq!(entry[0].udp, Some(PortSet::Raw(vec![31054])));
    }

    #[tokio::test]
    async fn test_failed_a_lookup_keeps_host_entry() {
        let mut dns = StaticDns::new();
        dns.add_service_record("_frontend.prod._tcp.harbor.cluster", "h-gone", 31000);

        let backend = backend(dns);
        let app = app(vec![service("frontend", Some(PortSelector::Any), None)]);

        let hosts = backend.resolve(&app).await;
        let frontend = &hosts["frontend"];
        assert_eq!(frontend.len(), 1);
        assert_eq!(frontend[0].name, "h-gone");
        assert!(frontend[0].ip.is_empty());
        assert_eq!(frontend[0].tcp, Some(PortSet::Raw(vec![31000])));
    }

    #[tokio::test]
    async fn test_missing_group_skips_service_but_not_siblings() {
        let mut dns = StaticDns::new();
        dns.add_service_record("_web._good.prod._tcp.harbor.cluster", "h1", 31000);
        dns.add_address("h1", ip("10.0.0.1"));

        let backend = backend(dns);
        let mut app = app(vec![
            service("orphan", Some(PortSelector::Any), None),
            service(
                "good",
                Some(PortSelector::Masks(vec!["web".to_string()])),
                None,
            ),
        ]);
        app.group = None;
        app.services[1].group = Some("prod".to_string());

        let hosts = backend.resolve(&app).await;
        assert!(!hosts.contains_key("orphan"));
        assert_eq!(hosts["good"].len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_hostnames_merge_into_one_entry() {
        let mut dns = StaticDns::new();
        dns.add_service_record("_web._frontend.prod._tcp.harbor.cluster", "h1", 31000);
        dns.add_service_record("_admin._frontend.prod._tcp.harbor.cluster", "h1", 31001);
        dns.add_service_record("_admin._frontend.prod._tcp.harbor.cluster", "h2", 31002);
        dns.add_address("h1", ip("10.0.0.1"));
        dns.add_address("h2", ip("10.0.0.2"));

        let backend = backend(dns);
        let app = app(vec![service(
            "frontend",
            Some(PortSelector::Masks(vec![
                "web".to_string(),
                "admin".to_string(),
            ])),
            None,
        )]);

        let hosts = backend.resolve(&app).await;
        let frontend = &hosts["frontend"];
        assert_eq!(frontend.len(), 2);

        let h1 = frontend.iter().find(|h| h.name == "h1").unwrap();
        let mut expected = BTreeMap::new();
        expected.insert("web".to_string(), 31000);
        expected.insert("admin".to_string(), 31001);
        assert_eq!(h1.tcp, Some(PortSet::Named(expected)));
    }

    #[tokio::test]
    async fn test_unanswered_service_keeps_empty_host_list() {
        let backend = backend(StaticDns::new());
        let app = app(vec![service("frontend", Some(PortSelector::Any), None)]);

        let hosts = backend.resolve(&app).await;
        assert!(hosts["frontend"].is_empty());
    }
}

//! Core types for discovery resolution
//!
//! These types define the contract between the configuration subsystem
//! (which supplies apps and service specs), the discovery backends, and
//! the renderer that consumes resolved hosts. The two physical port
//! encodings (raw list vs. named map) are part of that contract and are
//! preserved exactly by the serde representations here.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// A unit of deployment under discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    /// Hierarchical namespace, dot-separated. Services may override it.
    #[serde(default)]
    pub group: Option<String>,

    /// Ordered list of service specs to resolve.
    pub services: Vec<ServiceSpec>,

    /// Backend to use for this app; falls back to the configured default.
    #[serde(default)]
    pub discovery: Option<String>,

    /// Diagnostic label naming the configuration source of this app.
    #[serde(default)]
    pub conf_name: String,
}

/// Declaration of a named service and its required protocols/ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Service name.
    pub name: String,

    /// Group override for this service.
    #[serde(default)]
    pub group: Option<String>,

    /// TCP port selection; absent means TCP is not requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp: Option<PortSelector>,

    /// UDP port selection; absent means UDP is not requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp: Option<PortSelector>,
}

impl ServiceSpec {
    /// Port selection for the given protocol, if the spec declares it.
    pub fn selector(&self, protocol: Protocol) -> Option<&PortSelector> {
        match protocol {
            Protocol::Tcp => self.tcp.as_ref(),
            Protocol::Udp => self.udp.as_ref(),
        }
    }

    /// Service-level group override, else the app-level group.
    pub fn effective_group<'a>(&'a self, app: &'a App) -> Option<&'a str> {
        self.group.as_deref().or(app.group.as_deref())
    }
}

/// How ports of one protocol are selected by a service spec.
///
/// Declared as a plain list in configuration: an empty list accepts any
/// port, a non-empty list gives port-name masks (exact names or
/// trailing-`*` prefix wildcards).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum PortSelector {
    /// Any port is accepted; resolved ports land in a raw list.
    Any,
    /// Only ports whose name matches one of the masks; resolved ports
    /// land in a name-to-port map.
    Masks(Vec<String>),
}

impl From<Vec<String>> for PortSelector {
    fn from(masks: Vec<String>) -> Self {
        if masks.is_empty() {
            PortSelector::Any
        } else {
            PortSelector::Masks(masks)
        }
    }
}

impl From<PortSelector> for Vec<String> {
    fn from(selector: PortSelector) -> Self {
        match selector {
            PortSelector::Any => Vec::new(),
            PortSelector::Masks(masks) => masks,
        }
    }
}

/// Transport protocols a service spec may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Both protocols, in spec evaluation order.
    pub const ALL: [Protocol; 2] = [Protocol::Tcp, Protocol::Udp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }

    /// Parse a wire-format protocol name ("tcp"/"udp").
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved ports of one protocol on one host.
///
/// The physical shape is selected by the originating service spec: a raw
/// list when no port masks were declared, a name-to-port map when named
/// ports were requested. The shapes never mix within one protocol slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortSet {
    Raw(Vec<u16>),
    Named(BTreeMap<String, u16>),
}

/// A discovered host with its resolved addresses and ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedHost {
    /// DNS/host identifier.
    pub name: String,

    /// Resolved addresses; may be empty when the A lookup failed.
    pub ip: Vec<IpAddr>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp: Option<PortSet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp: Option<PortSet>,
}

impl ResolvedHost {
    pub fn new(name: impl Into<String>, ip: Vec<IpAddr>) -> Self {
        Self {
            name: name.into(),
            ip,
            tcp: None,
            udp: None,
        }
    }

    fn slot_mut(&mut self, protocol: Protocol) -> &mut Option<PortSet> {
        match protocol {
            Protocol::Tcp => &mut self.tcp,
            Protocol::Udp => &mut self.udp,
        }
    }

    /// Append a port to the raw list of the given protocol.
    pub fn push_raw(&mut self, protocol: Protocol, port: u16) {
        let slot = self
            .slot_mut(protocol)
            .get_or_insert_with(|| PortSet::Raw(Vec::new()));
        if let PortSet::Raw(ports) = slot {
            ports.push(port);
        }
    }

    /// Record a named port under the given protocol.
    pub fn insert_named(&mut self, protocol: Protocol, port_name: &str, port: u16) {
        let slot = self
            .slot_mut(protocol)
            .get_or_insert_with(|| PortSet::Named(BTreeMap::new()));
        if let PortSet::Named(ports) = slot {
            ports.insert(port_name.to_string(), port);
        }
    }
}

/// Resolution result: service name to the hosts discovered for it.
///
/// Unknown or unresolvable services are simply absent, never null.
pub type HostMap = BTreeMap<String, Vec<ResolvedHost>>;

/// One host/port pair in the legacy flat schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortRecord {
    pub name: String,
    pub ip: Vec<IpAddr>,
    pub port: u16,
}

/// Per-service shape of the legacy flat schema: a sequence of single-port
/// records for raw ports, or port-name groups of such records for named
/// ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyHosts {
    Flat(Vec<PortRecord>),
    Named(BTreeMap<String, Vec<PortRecord>>),
}

/// Resolution result reshaped into the legacy flat schema.
pub type LegacyMap = BTreeMap<String, LegacyHosts>;

/// Final output of a registry resolution, shaped for the configured
/// output schema version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resolution {
    Hosts(HostMap),
    Legacy(LegacyMap),
}

impl Resolution {
    /// The empty result returned on every skipped or failed resolution.
    pub fn empty() -> Self {
        Resolution::Hosts(HostMap::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Resolution::Hosts(hosts) => hosts.is_empty(),
            Resolution::Legacy(hosts) => hosts.is_empty(),
        }
    }
}

/// Match a value against a mask: a trailing `*` matches any value with
/// the preceding prefix, anything else matches by exact equality.
pub fn mask_matches(mask: &str, value: &str) -> bool {
    match mask.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => mask == value,
    }
}

use crate::arm;
use crate::error::{InventoryError, Result};
use crate::record::{ParsedRecord, PeeringRecord, RawRecord, RawResource, ResourceKind, SubnetRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Collector document sections, in the order the collector writes them.
pub const DOCUMENT_SECTIONS: &[(&str, ResourceKind)] = &[
    ("vnets", ResourceKind::VirtualNetwork),
    ("subnets", ResourceKind::Subnet),
    ("nsgs", ResourceKind::NetworkSecurityGroup),
    ("firewalls", ResourceKind::Firewall),
    ("firewall_policies", ResourceKind::FirewallPolicy),
    ("route_tables", ResourceKind::RouteTable),
    ("private_endpoints", ResourceKind::PrivateEndpoint),
    ("peerings", ResourceKind::Peering),
    ("application_gateways", ResourceKind::ApplicationGateway),
    ("load_balancers", ResourceKind::LoadBalancer),
    ("virtual_network_gateways", ResourceKind::VNetGateway),
    ("bastion_hosts", ResourceKind::BastionHost),
    ("nics", ResourceKind::NetworkInterface),
    ("private_dns_zones", ResourceKind::PrivateDnsZone),
];

/// Sections holding resource kinds the engine keeps as generic nodes.
const GENERIC_SECTIONS: &[(&str, &str)] = &[("public_ips", "public_ip")];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    #[serde(default)]
    pub collected_at: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub resource_groups: Vec<String>,
}

/// A record that could not be loaded. The rest of the snapshot still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotIssue {
    pub section: String,
    pub index: usize,
    pub reason: String,
}

/// An immutable, already-collected inventory.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub metadata: SnapshotMetadata,
    pub resources: Vec<RawResource>,
    pub peerings: Vec<PeeringRecord>,
    pub issues: Vec<SnapshotIssue>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, resource: RawResource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_peering(mut self, peering: PeeringRecord) -> Self {
        self.peerings.push(peering);
        self
    }

    /// Builds a snapshot from typed-at-the-edge records. Records without a
    /// declared type or with an unparseable body become issues.
    pub fn from_records(records: impl IntoIterator<Item = RawRecord>) -> Self {
        let mut snapshot = Snapshot::new();
        for (index, record) in records.into_iter().enumerate() {
            snapshot.push_record("records", index, record);
        }
        snapshot.expand_embedded_subnets();
        snapshot
    }

    /// Parses a collector document (`{"vnets": [...], "subnets": [...], ...}`).
    /// A top-level `resources` array of objects carrying their own `type`
    /// field is accepted as well.
    pub fn from_document(document: Value) -> Result<Self> {
        let Value::Object(mut sections) = document else {
            return Err(InventoryError::InvalidDocument(
                "expected a JSON object at the top level".to_string(),
            ));
        };

        let mut snapshot = Snapshot::new();

        if let Some(metadata) = sections.remove("metadata") {
            match serde_json::from_value::<SnapshotMetadata>(metadata) {
                Ok(metadata) => snapshot.metadata = metadata,
                Err(e) => warn!("Ignoring unreadable snapshot metadata: {}", e),
            }
        }

        for (section, kind) in DOCUMENT_SECTIONS {
            for (index, body) in section_items(&mut sections, section) {
                snapshot.push_record(section, index, RawRecord::new(kind.as_str(), body));
            }
        }

        for (section, resource_type) in GENERIC_SECTIONS {
            for (index, body) in section_items(&mut sections, section) {
                snapshot.push_record(section, index, RawRecord::new(*resource_type, body));
            }
        }

        for (index, body) in section_items(&mut sections, "resources") {
            snapshot.push_record(
                "resources",
                index,
                RawRecord {
                    resource_type: None,
                    body,
                },
            );
        }

        for leftover in sections.keys() {
            debug!("Ignoring unknown snapshot section '{}'", leftover);
        }

        snapshot.expand_embedded_subnets();

        info!(
            "Loaded snapshot: {} resources, {} peerings, {} skipped records",
            snapshot.resources.len(),
            snapshot.peerings.len(),
            snapshot.issues.len()
        );

        Ok(snapshot)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(content)?;
        Self::from_document(document)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn len(&self) -> usize {
        self.resources.len() + self.peerings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.peerings.is_empty()
    }

    fn push_record(&mut self, section: &str, index: usize, record: RawRecord) {
        match record.parse() {
            Ok(ParsedRecord::Resource(resource)) => self.resources.push(resource),
            Ok(ParsedRecord::Peering(peering)) => self.peerings.push(peering),
            Err(e) => {
                warn!("Skipping {}[{}]: {}", section, index, e);
                self.issues.push(SnapshotIssue {
                    section: section.to_string(),
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Subnets embedded in a VNet record but missing from the flat subnet list
    /// become subnet records of their own.
    fn expand_embedded_subnets(&mut self) {
        let mut known: HashSet<String> = self
            .resources
            .iter()
            .filter(|resource| matches!(resource, RawResource::Subnet(_)))
            .filter_map(|resource| resource.id().map(arm::normalize_id))
            .collect();

        let mut expanded = Vec::new();
        for resource in &self.resources {
            let RawResource::VirtualNetwork(vnet) = resource else {
                continue;
            };
            for embedded in &vnet.subnets {
                let Some(id) = embedded.id.as_deref() else {
                    continue;
                };
                if known.insert(arm::normalize_id(id)) {
                    debug!("Expanding embedded subnet {}", id);
                    expanded.push(RawResource::Subnet(SubnetRecord::from_embedded(vnet, embedded)));
                }
            }
        }
        self.resources.extend(expanded);
    }
}

fn section_items(
    sections: &mut serde_json::Map<String, Value>,
    section: &str,
) -> Vec<(usize, Value)> {
    match sections.remove(section) {
        Some(Value::Array(items)) => items.into_iter().enumerate().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            warn!("Snapshot section '{}' is not an array, ignoring it", section);
            Vec::new()
        }
    }
}

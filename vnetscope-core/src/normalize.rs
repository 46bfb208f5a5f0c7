// Raw records to uniform nodes, plus the relationship hints each record implies

use crate::model::{Attributes, EdgeKind, NetworkNode, NodeType};
use serde::Serialize;
use serde_json::{Map, Value, json};
use vnetscope_inventory::arm;
use vnetscope_inventory::record::{ApplianceRecord, IpConfigRecord, PeeringRecord, RawResource};
use vnetscope_inventory::{InventoryError, Result};

/// Where a hint points: a resource id, or a private IP that has to be
/// resolved against the nodes' `private_ips`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum HintTarget {
    Id(String),
    PrivateIp(String),
}

/// A relationship read from a record's own fields. The builder turns each
/// hint into exactly one edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipHint {
    pub source: String,
    pub target: HintTarget,
    pub kind: EdgeKind,
    pub attributes: Attributes,
}

impl RelationshipHint {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        RelationshipHint {
            source: source.into(),
            target: HintTarget::Id(target.into()),
            kind,
            attributes: Attributes::new(),
        }
    }

    pub fn to_private_ip(source: impl Into<String>, ip: impl Into<String>, kind: EdgeKind) -> Self {
        RelationshipHint {
            source: source.into(),
            target: HintTarget::PrivateIp(ip.into()),
            kind,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.attributes.insert(key.to_string(), value);
        }
        self
    }
}

fn required_id<'a>(resource: &'a RawResource) -> Result<&'a str> {
    resource
        .id()
        .ok_or_else(|| InventoryError::malformed(resource.type_label(), "missing resource id"))
}

fn base_node(id: &str, node_type: NodeType, name: &Option<String>, resource_group: &Option<String>) -> NetworkNode {
    let name = name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| arm::resource_name(id));
    let resource_group = resource_group
        .as_deref()
        .or_else(|| arm::resource_group(id))
        .map(String::from);
    NetworkNode::new(id, node_type, name).with_resource_group(resource_group)
}

fn ip_config_addresses(configs: &[IpConfigRecord]) -> Vec<String> {
    let mut ips: Vec<String> = Vec::new();
    for ip in configs.iter().filter_map(|c| c.private_ip_address.as_ref()) {
        if !ips.contains(ip) {
            ips.push(ip.clone());
        }
    }
    ips
}

fn public_ip_ids(configs: &[IpConfigRecord]) -> Vec<String> {
    configs
        .iter()
        .filter_map(|c| c.public_ip_address.as_ref().and_then(|r| r.id()))
        .map(String::from)
        .collect()
}

/// Converts one record into a node. Fails only when the record has no
/// identifying id; unknown kinds become `Other` nodes with their body kept.
pub fn normalize(resource: &RawResource) -> Result<NetworkNode> {
    let node = match resource {
        RawResource::VirtualNetwork(vnet) => {
            let id = required_id(resource)?;
            base_node(id, NodeType::VirtualNetwork, &vnet.name, &vnet.resource_group)
                .with_attribute("location", vnet.location.clone())
                .with_attribute("address_prefixes", vnet.address_prefixes().to_vec())
                .with_attribute("dns_servers", vnet.dns_servers().to_vec())
                .with_attribute("enable_ddos_protection", vnet.enable_ddos_protection)
                .with_attribute("subnet_count", vnet.subnets.len())
        }
        RawResource::Subnet(subnet) => {
            let id = required_id(resource)?;
            base_node(id, NodeType::Subnet, &subnet.name, &subnet.resource_group)
                .with_attribute("address_prefixes", subnet.all_prefixes())
                .with_attribute("vnet", subnet.vnet.clone())
                .with_attribute("service_endpoints", subnet.service_endpoint_names())
                .with_attribute("delegations", subnet.delegation_names())
                .with_attribute("ip_configuration_count", subnet.ip_configurations.len())
                .with_attribute("private_endpoint_count", subnet.private_endpoints.len())
        }
        RawResource::NetworkSecurityGroup(nsg) => {
            let id = required_id(resource)?;
            base_node(id, NodeType::NetworkSecurityGroup, &nsg.name, &nsg.resource_group)
                .with_attribute("location", nsg.location.clone())
                .with_attribute("rule_count", nsg.security_rules.len().max(nsg.custom_rules.len()))
                .with_attribute("default_rule_count", nsg.default_security_rules.len())
        }
        RawResource::Firewall(firewall) => {
            let id = required_id(resource)?;
            base_node(id, NodeType::Firewall, &firewall.name, &firewall.resource_group)
                .with_attribute("location", firewall.location.clone())
                .with_attribute("sku", firewall.sku.clone())
                .with_attribute("threat_intel_mode", firewall.threat_intel_mode.clone())
                .with_attribute("private_ips", ip_config_addresses(firewall.ip_configs()))
                .with_attribute("public_ip_ids", public_ip_ids(firewall.ip_configs()))
        }
        RawResource::FirewallPolicy(policy) => {
            let id = required_id(resource)?;
            let rule_count: usize = policy
                .rule_collection_groups
                .iter()
                .flat_map(|group| &group.rule_collections)
                .map(|collection| collection.rules.len())
                .sum();
            base_node(id, NodeType::FirewallPolicy, &policy.name, &policy.resource_group)
                .with_attribute("location", policy.location.clone())
                .with_attribute("sku", policy.sku.clone())
                .with_attribute("threat_intel_mode", policy.threat_intel_mode.clone())
                .with_attribute("default_action", policy.default_action.clone())
                .with_attribute("rule_collection_group_count", policy.rule_collection_groups.len())
                .with_attribute("rule_count", rule_count)
        }
        RawResource::RouteTable(table) => {
            let id = required_id(resource)?;
            let routes: Vec<Value> = table
                .all_routes()
                .iter()
                .map(|route| {
                    json!({
                        "name": route.name,
                        "address_prefix": route.address_prefix,
                        "next_hop_type": route.next_hop_type,
                        "next_hop_ip": route.next_hop_ip_address,
                    })
                })
                .collect();
            base_node(id, NodeType::RouteTable, &table.name, &table.resource_group)
                .with_attribute("location", table.location.clone())
                .with_attribute("disable_bgp_route_propagation", table.disable_bgp_route_propagation)
                .with_attribute("routes", routes)
        }
        RawResource::PrivateEndpoint(endpoint) => {
            let id = required_id(resource)?;
            let fqdns: Vec<String> = endpoint
                .custom_dns_configs
                .iter()
                .filter_map(|config| config.fqdn.clone())
                .collect();
            base_node(id, NodeType::PrivateEndpoint, &endpoint.name, &endpoint.resource_group)
                .with_attribute("location", endpoint.location.clone())
                .with_attribute("private_ips", endpoint.private_ips())
                .with_attribute("fqdns", fqdns)
                .with_attribute("connection_count", endpoint.connections.len())
        }
        RawResource::LoadBalancer(appliance) => appliance_node(resource, NodeType::LoadBalancer, appliance)?,
        RawResource::ApplicationGateway(appliance) => {
            appliance_node(resource, NodeType::ApplicationGateway, appliance)?
        }
        RawResource::VNetGateway(appliance) => appliance_node(resource, NodeType::VNetGateway, appliance)?,
        RawResource::BastionHost(appliance) => appliance_node(resource, NodeType::BastionHost, appliance)?,
        RawResource::NetworkInterface(nic) => {
            // A NIC attached to a VM stands for the VM; several NICs merge.
            let (id, node_type, name) = match (nic.vm_id(), nic.id.as_deref()) {
                (Some(vm_id), _) => (vm_id, NodeType::VirtualMachine, None),
                (None, Some(nic_id)) if !nic_id.trim().is_empty() => (nic_id, NodeType::Other, nic.name.clone()),
                _ => {
                    return Err(InventoryError::malformed(
                        resource.type_label(),
                        "missing both interface id and virtual machine id",
                    ));
                }
            };
            let mut node = base_node(id, node_type, &name, &nic.resource_group)
                .with_attribute("location", nic.location.clone())
                .with_attribute("private_ips", ip_config_addresses(&nic.ip_configurations))
                .with_attribute("network_interfaces", nic.id.iter().cloned().collect::<Vec<_>>());
            if node_type == NodeType::Other {
                node.set_attribute("resource_type", resource.type_label());
            }
            node
        }
        RawResource::PrivateDnsZone(zone) => {
            let id = required_id(resource)?;
            base_node(id, NodeType::PrivateDnsZone, &zone.name, &zone.resource_group)
                .with_attribute("number_of_record_sets", zone.number_of_record_sets)
                .with_attribute("linked_vnet_count", zone.virtual_network_links.len())
        }
        RawResource::Other { resource_type, fields } => {
            let id = required_id(resource)?;
            let name = fields.get("name").and_then(Value::as_str).map(String::from);
            let resource_group = fields
                .get("resourceGroup")
                .and_then(Value::as_str)
                .map(String::from);
            let mut node = base_node(id, NodeType::Other, &name, &resource_group);
            for (key, value) in fields {
                if !matches!(key.as_str(), "id" | "name" | "resourceGroup") {
                    node.set_attribute(key, value.clone());
                }
            }
            node.set_attribute("resource_type", resource_type.as_str());
            node
        }
    };
    Ok(node)
}

fn appliance_node(resource: &RawResource, node_type: NodeType, appliance: &ApplianceRecord) -> Result<NetworkNode> {
    let id = required_id(resource)?;
    let mut node = base_node(id, node_type, &appliance.name, &appliance.resource_group)
        .with_attribute("location", appliance.location.clone())
        .with_attribute("sku", appliance.sku.clone())
        .with_attribute("private_ips", appliance.private_ips());
    for (key, value) in scalar_fields(&appliance.extra) {
        node.set_attribute(&key, value);
    }
    Ok(node)
}

/// Kind-specific scalar fields (`gatewayType`, `scaleUnits`...) as snake_case
/// attributes.
fn scalar_fields(extra: &Map<String, Value>) -> Vec<(String, Value)> {
    extra
        .iter()
        .filter(|(key, value)| {
            !matches!(key.as_str(), "type" | "etag" | "tags")
                && (value.is_string() || value.is_number() || value.is_boolean())
        })
        .map(|(key, value)| (snake_case(key), value.clone()))
        .collect()
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Relationship hints carried by a record. Containment always comes from the
/// id hierarchy or explicit references, never from names.
pub fn relationship_hints(resource: &RawResource) -> Vec<RelationshipHint> {
    let Some(id) = resource.id() else {
        return nic_hints(resource);
    };
    let mut hints = Vec::new();

    match resource {
        RawResource::VirtualNetwork(vnet) => {
            for subnet in &vnet.subnets {
                if let Some(subnet_id) = subnet.id.as_deref().filter(|s| !s.trim().is_empty()) {
                    hints.push(RelationshipHint::new(id, subnet_id, EdgeKind::Contains));
                }
            }
        }
        RawResource::Subnet(subnet) => {
            if let Some(vnet_id) = arm::parent_id(id, "subnets") {
                hints.push(RelationshipHint::new(vnet_id, id, EdgeKind::Contains));
            }
            if let Some(nsg_id) = subnet.nsg() {
                hints.push(RelationshipHint::new(id, nsg_id, EdgeKind::SecuredBy));
            }
            if let Some(table_id) = subnet.route_table() {
                hints.push(RelationshipHint::new(id, table_id, EdgeKind::RoutesVia));
            }
        }
        RawResource::NetworkSecurityGroup(nsg) => {
            for subnet_id in nsg.subnets.iter().filter_map(|r| r.id()) {
                hints.push(RelationshipHint::new(subnet_id, id, EdgeKind::SecuredBy));
            }
        }
        RawResource::Firewall(firewall) => {
            for config in firewall.ip_configs() {
                if let Some(subnet_id) = config.subnet_id() {
                    hints.push(RelationshipHint::new(subnet_id, id, EdgeKind::Contains));
                }
            }
            if let Some(policy_id) = firewall.policy_id() {
                hints.push(RelationshipHint::new(id, policy_id, EdgeKind::SecuredBy));
            }
            for public_ip in public_ip_ids(firewall.ip_configs()) {
                hints.push(RelationshipHint::new(id, public_ip, EdgeKind::ConnectsTo));
            }
        }
        RawResource::RouteTable(table) => {
            for subnet_id in table.subnets.iter().filter_map(|r| r.id()) {
                hints.push(RelationshipHint::new(subnet_id, id, EdgeKind::RoutesVia));
            }
            for route in table.all_routes() {
                if let Some(next_hop) = route.next_hop_ip_address.as_deref().filter(|ip| !ip.trim().is_empty()) {
                    hints.push(
                        RelationshipHint::to_private_ip(id, next_hop.trim(), EdgeKind::RoutesVia)
                            .with_attribute("route", route.name.clone())
                            .with_attribute("address_prefix", route.address_prefix.clone())
                            .with_attribute("next_hop_type", route.next_hop_type.clone()),
                    );
                }
            }
        }
        RawResource::PrivateEndpoint(endpoint) => {
            if let Some(subnet_id) = endpoint.subnet_id() {
                hints.push(RelationshipHint::new(subnet_id, id, EdgeKind::Contains));
            }
            for connection in &endpoint.connections {
                if let Some(service_id) = connection
                    .get("privateLinkServiceId")
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                {
                    hints.push(
                        RelationshipHint::new(id, service_id, EdgeKind::ConnectsTo)
                            .with_attribute("status", connection.get("status").cloned()),
                    );
                }
            }
        }
        RawResource::LoadBalancer(appliance)
        | RawResource::ApplicationGateway(appliance)
        | RawResource::VNetGateway(appliance)
        | RawResource::BastionHost(appliance) => {
            for subnet_id in appliance.subnet_ids() {
                hints.push(RelationshipHint::new(subnet_id, id, EdgeKind::Contains));
            }
        }
        RawResource::NetworkInterface(_) => return nic_hints(resource),
        RawResource::PrivateDnsZone(zone) => {
            for vnet_id in zone.linked_vnet_ids() {
                hints.push(RelationshipHint::new(id, vnet_id, EdgeKind::DnsLinked));
            }
        }
        RawResource::FirewallPolicy(_) | RawResource::Other { .. } => {}
    }

    hints
}

/// NIC hints hang off the node the NIC normalizes to (the VM when attached).
fn nic_hints(resource: &RawResource) -> Vec<RelationshipHint> {
    let RawResource::NetworkInterface(nic) = resource else {
        return Vec::new();
    };
    let Some(node_id) = nic.vm_id().or(nic.id.as_deref()).filter(|id| !id.trim().is_empty()) else {
        return Vec::new();
    };

    let mut hints = Vec::new();
    for config in &nic.ip_configurations {
        if let Some(subnet_id) = config.subnet_id() {
            hints.push(RelationshipHint::new(subnet_id, node_id, EdgeKind::Contains));
        }
    }
    if let Some(nsg_id) = nic.nsg_id() {
        hints.push(RelationshipHint::new(node_id, nsg_id, EdgeKind::SecuredBy));
    }
    hints
}

/// The Peering edge a peering record describes. The local VNet comes from
/// the peering's own id when the record does not name it.
pub fn peering_hint(peering: &PeeringRecord) -> Result<RelationshipHint> {
    let local = peering
        .source_vnet_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .or_else(|| {
            peering
                .id
                .as_deref()
                .and_then(|id| arm::parent_id(id, "virtualNetworkPeerings"))
        })
        .ok_or_else(|| InventoryError::malformed("peering", "cannot determine the local virtual network"))?;
    let remote = peering
        .remote_id()
        .ok_or_else(|| InventoryError::malformed("peering", "missing remote virtual network id"))?;

    Ok(RelationshipHint::new(local, remote, EdgeKind::Peering)
        .with_attribute("name", peering.name.clone())
        .with_attribute("peering_state", peering.peering_state.clone())
        .with_attribute("allow_virtual_network_access", peering.allow_virtual_network_access)
        .with_attribute("allow_forwarded_traffic", peering.allow_forwarded_traffic)
        .with_attribute("allow_gateway_transit", peering.allow_gateway_transit)
        .with_attribute("use_remote_gateways", peering.use_remote_gateways))
}

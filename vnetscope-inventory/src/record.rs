//! Raw resource records as produced by a collector.
//!
//! Every resource kind the engine models has its own record type. Field names
//! follow the collector document (camelCase, with a few `_id`/`_processed`
//! suffixed fields the collector adds), and every field is optional so that
//! partial inventories still deserialize.

use crate::error::{InventoryError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Treats an explicit JSON `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A reference to another resource. Collectors emit either the bare id or the
/// ARM `{"id": "..."}` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceRef {
    Id(String),
    Object {
        #[serde(default)]
        id: Option<String>,
    },
}

impl ResourceRef {
    pub fn id(&self) -> Option<&str> {
        match self {
            ResourceRef::Id(id) => Some(id.as_str()),
            ResourceRef::Object { id } => id.as_deref(),
        }
        .filter(|id| !id.trim().is_empty())
    }
}

fn ref_id(reference: &Option<ResourceRef>) -> Option<&str> {
    reference.as_ref().and_then(ResourceRef::id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    VirtualNetwork,
    Subnet,
    NetworkSecurityGroup,
    Firewall,
    FirewallPolicy,
    RouteTable,
    PrivateEndpoint,
    Peering,
    LoadBalancer,
    ApplicationGateway,
    VNetGateway,
    BastionHost,
    NetworkInterface,
    PrivateDnsZone,
}

impl ResourceKind {
    /// Resolves a declared type, accepting collector section names, singular
    /// forms and ARM provider types. Returns `None` for kinds the engine does
    /// not model.
    pub fn from_declared(declared: &str) -> Option<Self> {
        let key: String = declared
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect();

        let kind = match key.as_str() {
            "vnet" | "vnets" | "virtualnetwork" | "virtualnetworks"
            | "microsoft.network/virtualnetworks" => ResourceKind::VirtualNetwork,
            "subnet" | "subnets" | "microsoft.network/virtualnetworks/subnets" => {
                ResourceKind::Subnet
            }
            "nsg" | "nsgs" | "networksecuritygroup" | "networksecuritygroups"
            | "microsoft.network/networksecuritygroups" => ResourceKind::NetworkSecurityGroup,
            "firewall" | "firewalls" | "azurefirewall" | "azurefirewalls"
            | "microsoft.network/azurefirewalls" => ResourceKind::Firewall,
            "firewallpolicy" | "firewallpolicies" | "microsoft.network/firewallpolicies" => {
                ResourceKind::FirewallPolicy
            }
            "routetable" | "routetables" | "microsoft.network/routetables" => {
                ResourceKind::RouteTable
            }
            "privateendpoint" | "privateendpoints" | "microsoft.network/privateendpoints" => {
                ResourceKind::PrivateEndpoint
            }
            "peering" | "peerings" | "virtualnetworkpeering" | "virtualnetworkpeerings"
            | "microsoft.network/virtualnetworks/virtualnetworkpeerings" => ResourceKind::Peering,
            "loadbalancer" | "loadbalancers" | "microsoft.network/loadbalancers" => {
                ResourceKind::LoadBalancer
            }
            "applicationgateway" | "applicationgateways"
            | "microsoft.network/applicationgateways" => ResourceKind::ApplicationGateway,
            "vnetgateway" | "vnetgateways" | "virtualnetworkgateway" | "virtualnetworkgateways"
            | "microsoft.network/virtualnetworkgateways" => ResourceKind::VNetGateway,
            "bastion" | "bastions" | "bastionhost" | "bastionhosts"
            | "microsoft.network/bastionhosts" => ResourceKind::BastionHost,
            "nic" | "nics" | "networkinterface" | "networkinterfaces"
            | "microsoft.network/networkinterfaces" => ResourceKind::NetworkInterface,
            "privatednszone" | "privatednszones" | "microsoft.network/privatednszones" => {
                ResourceKind::PrivateDnsZone
            }
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::VirtualNetwork => "virtual_network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::NetworkSecurityGroup => "network_security_group",
            ResourceKind::Firewall => "firewall",
            ResourceKind::FirewallPolicy => "firewall_policy",
            ResourceKind::RouteTable => "route_table",
            ResourceKind::PrivateEndpoint => "private_endpoint",
            ResourceKind::Peering => "peering",
            ResourceKind::LoadBalancer => "load_balancer",
            ResourceKind::ApplicationGateway => "application_gateway",
            ResourceKind::VNetGateway => "vnet_gateway",
            ResourceKind::BastionHost => "bastion_host",
            ResourceKind::NetworkInterface => "network_interface",
            ResourceKind::PrivateDnsZone => "private_dns_zone",
        }
    }
}

// ============================================================================
// Virtual networks and subnets
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressSpace {
    #[serde(deserialize_with = "nullable")]
    pub address_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DhcpOptions {
    #[serde(deserialize_with = "nullable")]
    pub dns_servers: Vec<String>,
}

/// Subnet as embedded in a virtual network record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmbeddedSubnet {
    pub id: Option<String>,
    pub name: Option<String>,
    pub address_prefix: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub address_prefixes: Vec<String>,
    pub network_security_group: Option<ResourceRef>,
    pub route_table: Option<ResourceRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VirtualNetworkRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub address_space: Option<AddressSpace>,
    pub dhcp_options: Option<DhcpOptions>,
    pub enable_ddos_protection: Option<bool>,
    #[serde(deserialize_with = "nullable")]
    pub subnets: Vec<EmbeddedSubnet>,
}

impl VirtualNetworkRecord {
    pub fn address_prefixes(&self) -> &[String] {
        self.address_space
            .as_ref()
            .map(|space| space.address_prefixes.as_slice())
            .unwrap_or(&[])
    }

    pub fn dns_servers(&self) -> &[String] {
        self.dhcp_options
            .as_ref()
            .map(|options| options.dns_servers.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubnetRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    /// Name of the parent virtual network; informational only.
    pub vnet: Option<String>,
    pub resource_group: Option<String>,
    pub address_prefix: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub address_prefixes: Vec<String>,
    #[serde(rename = "nsg_id")]
    pub nsg_id: Option<String>,
    #[serde(rename = "routeTable_id")]
    pub route_table_id: Option<String>,
    pub network_security_group: Option<ResourceRef>,
    pub route_table: Option<ResourceRef>,
    #[serde(deserialize_with = "nullable")]
    pub service_endpoints: Vec<Value>,
    #[serde(deserialize_with = "nullable")]
    pub delegations: Vec<Value>,
    #[serde(deserialize_with = "nullable")]
    pub ip_configurations: Vec<Value>,
    #[serde(deserialize_with = "nullable")]
    pub private_endpoints: Vec<Value>,
}

impl SubnetRecord {
    pub fn from_embedded(vnet: &VirtualNetworkRecord, subnet: &EmbeddedSubnet) -> Self {
        SubnetRecord {
            id: subnet.id.clone(),
            name: subnet.name.clone(),
            vnet: vnet.name.clone(),
            resource_group: vnet.resource_group.clone(),
            address_prefix: subnet.address_prefix.clone(),
            address_prefixes: subnet.address_prefixes.clone(),
            network_security_group: subnet.network_security_group.clone(),
            route_table: subnet.route_table.clone(),
            ..Default::default()
        }
    }

    pub fn nsg(&self) -> Option<&str> {
        self.nsg_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| ref_id(&self.network_security_group))
    }

    pub fn route_table(&self) -> Option<&str> {
        self.route_table_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| ref_id(&self.route_table))
    }

    /// All declared prefixes, single and plural fields combined.
    pub fn all_prefixes(&self) -> Vec<String> {
        let mut prefixes: Vec<String> = self.address_prefix.iter().cloned().collect();
        for prefix in &self.address_prefixes {
            if !prefixes.contains(prefix) {
                prefixes.push(prefix.clone());
            }
        }
        prefixes
    }

    /// Service endpoint names; collectors emit either strings or
    /// `{"service": ...}` objects.
    pub fn service_endpoint_names(&self) -> Vec<String> {
        names_from(&self.service_endpoints, "service")
    }

    pub fn delegation_names(&self) -> Vec<String> {
        names_from(&self.delegations, "serviceName")
    }
}

fn names_from(values: &[Value], key: &str) -> Vec<String> {
    values
        .iter()
        .filter_map(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map.get(key).and_then(Value::as_str).map(String::from),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Network security groups
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NsgRuleRecord {
    pub name: Option<String>,
    pub priority: Option<i64>,
    pub direction: Option<String>,
    pub access: Option<String>,
    pub protocol: Option<String>,
    pub source_address_prefix: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub source_address_prefixes: Vec<String>,
    pub source_port_range: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub source_port_ranges: Vec<String>,
    pub destination_address_prefix: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub destination_address_prefixes: Vec<String>,
    pub destination_port_range: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub destination_port_ranges: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NsgRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub subnets: Vec<ResourceRef>,
    #[serde(deserialize_with = "nullable")]
    pub network_interfaces: Vec<ResourceRef>,
    #[serde(deserialize_with = "nullable")]
    pub security_rules: Vec<NsgRuleRecord>,
    #[serde(deserialize_with = "nullable")]
    pub custom_rules: Vec<NsgRuleRecord>,
    #[serde(deserialize_with = "nullable")]
    pub default_security_rules: Vec<NsgRuleRecord>,
}

// ============================================================================
// Firewalls and firewall policies
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IpConfigRecord {
    pub name: Option<String>,
    #[serde(alias = "privateIPAddress")]
    pub private_ip_address: Option<String>,
    #[serde(alias = "publicIPAddress")]
    pub public_ip_address: Option<ResourceRef>,
    pub subnet: Option<ResourceRef>,
}

impl IpConfigRecord {
    pub fn subnet_id(&self) -> Option<&str> {
        ref_id(&self.subnet)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirewallRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub sku: Option<Value>,
    pub threat_intel_mode: Option<String>,
    pub firewall_policy: Option<ResourceRef>,
    #[serde(deserialize_with = "nullable")]
    pub ip_configurations: Vec<IpConfigRecord>,
    #[serde(rename = "ipConfigurations_processed", deserialize_with = "nullable")]
    pub ip_configurations_processed: Vec<IpConfigRecord>,
}

impl FirewallRecord {
    /// Collector-flattened ip configurations when present, raw ones otherwise.
    pub fn ip_configs(&self) -> &[IpConfigRecord] {
        if self.ip_configurations_processed.is_empty() {
            &self.ip_configurations
        } else {
            &self.ip_configurations_processed
        }
    }

    pub fn policy_id(&self) -> Option<&str> {
        ref_id(&self.firewall_policy)
    }
}

/// Rule collection action: `"Allow"` after collector processing, or the raw
/// ARM `{"type": "Allow"}` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionAction {
    Plain(String),
    Typed {
        #[serde(rename = "type", default)]
        kind: Option<String>,
    },
}

impl CollectionAction {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CollectionAction::Plain(action) => Some(action.as_str()),
            CollectionAction::Typed { kind } => kind.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppProtocolRecord {
    pub protocol_type: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirewallRuleRecord {
    pub name: Option<String>,
    pub rule_type: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub source_addresses: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub source_ip_groups: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub destination_addresses: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub destination_ip_groups: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub destination_fqdns: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub destination_ports: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub ip_protocols: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub protocols: Vec<AppProtocolRecord>,
    #[serde(deserialize_with = "nullable")]
    pub target_fqdns: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub target_urls: Vec<String>,
    pub translated_address: Option<String>,
    pub translated_port: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleCollectionRecord {
    pub name: Option<String>,
    pub priority: Option<i64>,
    pub rule_collection_type: Option<String>,
    pub action: Option<CollectionAction>,
    #[serde(deserialize_with = "nullable")]
    pub rules: Vec<FirewallRuleRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleCollectionGroupRecord {
    pub name: Option<String>,
    pub priority: Option<i64>,
    #[serde(deserialize_with = "nullable")]
    pub rule_collections: Vec<RuleCollectionRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirewallPolicyRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub sku: Option<Value>,
    pub threat_intel_mode: Option<String>,
    /// Declared action for traffic no rule matches.
    pub default_action: Option<String>,
    #[serde(
        rename = "ruleCollectionGroups_detail",
        alias = "ruleCollectionGroups",
        deserialize_with = "nullable"
    )]
    pub rule_collection_groups: Vec<RuleCollectionGroupRecord>,
}

// ============================================================================
// Routing
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteRecord {
    pub name: Option<String>,
    pub address_prefix: Option<String>,
    pub next_hop_type: Option<String>,
    pub next_hop_ip_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteTableRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub disable_bgp_route_propagation: Option<bool>,
    #[serde(deserialize_with = "nullable")]
    pub subnets: Vec<ResourceRef>,
    #[serde(deserialize_with = "nullable")]
    pub routes: Vec<RouteRecord>,
    #[serde(rename = "routes_processed", deserialize_with = "nullable")]
    pub routes_processed: Vec<RouteRecord>,
}

impl RouteTableRecord {
    pub fn all_routes(&self) -> &[RouteRecord] {
        if self.routes_processed.is_empty() {
            &self.routes
        } else {
            &self.routes_processed
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeeringRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub source_vnet: Option<String>,
    pub source_vnet_id: Option<String>,
    pub source_resource_group: Option<String>,
    pub remote_vnet_id: Option<String>,
    pub remote_virtual_network: Option<ResourceRef>,
    pub peering_state: Option<String>,
    pub allow_virtual_network_access: Option<bool>,
    pub allow_forwarded_traffic: Option<bool>,
    pub allow_gateway_transit: Option<bool>,
    pub use_remote_gateways: Option<bool>,
}

impl PeeringRecord {
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_vnet_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| ref_id(&self.remote_virtual_network))
    }
}

// ============================================================================
// Endpoints, appliances, interfaces, DNS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomDnsConfig {
    pub fqdn: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub ip_addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivateEndpointRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub subnet: Option<ResourceRef>,
    #[serde(deserialize_with = "nullable")]
    pub connections: Vec<Value>,
    #[serde(deserialize_with = "nullable")]
    pub custom_dns_configs: Vec<CustomDnsConfig>,
}

impl PrivateEndpointRecord {
    pub fn subnet_id(&self) -> Option<&str> {
        ref_id(&self.subnet)
    }

    pub fn private_ips(&self) -> Vec<String> {
        let mut ips = Vec::new();
        for config in &self.custom_dns_configs {
            for ip in &config.ip_addresses {
                if !ips.contains(ip) {
                    ips.push(ip.clone());
                }
            }
        }
        ips
    }
}

/// Load balancers, application gateways, VNet gateways and bastion hosts
/// share this shape; kind-specific fields stay in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplianceRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub sku: Option<Value>,
    #[serde(deserialize_with = "nullable")]
    pub ip_configurations: Vec<IpConfigRecord>,
    #[serde(deserialize_with = "nullable")]
    pub gateway_ip_configurations: Vec<IpConfigRecord>,
    #[serde(deserialize_with = "nullable")]
    pub frontend_ip_configurations: Vec<IpConfigRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApplianceRecord {
    /// Subnets the appliance has an ip configuration in.
    pub fn subnet_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for config in self
            .ip_configurations
            .iter()
            .chain(&self.gateway_ip_configurations)
            .chain(&self.frontend_ip_configurations)
        {
            if let Some(id) = config.subnet_id()
                && !ids.contains(&id)
            {
                ids.push(id);
            }
        }
        ids
    }

    pub fn private_ips(&self) -> Vec<String> {
        self.ip_configurations
            .iter()
            .chain(&self.frontend_ip_configurations)
            .filter_map(|config| config.private_ip_address.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NicRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub virtual_machine: Option<ResourceRef>,
    pub network_security_group: Option<ResourceRef>,
    #[serde(deserialize_with = "nullable")]
    pub ip_configurations: Vec<IpConfigRecord>,
}

impl NicRecord {
    pub fn vm_id(&self) -> Option<&str> {
        ref_id(&self.virtual_machine)
    }

    pub fn nsg_id(&self) -> Option<&str> {
        ref_id(&self.network_security_group)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DnsLinkRecord {
    pub name: Option<String>,
    pub virtual_network: Option<ResourceRef>,
    pub registration_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivateDnsZoneRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub resource_group: Option<String>,
    pub number_of_record_sets: Option<u64>,
    #[serde(deserialize_with = "nullable")]
    pub virtual_network_links: Vec<DnsLinkRecord>,
}

impl PrivateDnsZoneRecord {
    pub fn linked_vnet_ids(&self) -> Vec<&str> {
        self.virtual_network_links
            .iter()
            .filter_map(|link| ref_id(&link.virtual_network))
            .collect()
    }
}

// ============================================================================
// Tagged union
// ============================================================================

/// One node-producing resource, tagged by kind.
#[derive(Debug, Clone, Serialize)]
pub enum RawResource {
    VirtualNetwork(VirtualNetworkRecord),
    Subnet(SubnetRecord),
    NetworkSecurityGroup(NsgRecord),
    Firewall(FirewallRecord),
    FirewallPolicy(FirewallPolicyRecord),
    RouteTable(RouteTableRecord),
    PrivateEndpoint(PrivateEndpointRecord),
    LoadBalancer(ApplianceRecord),
    ApplicationGateway(ApplianceRecord),
    VNetGateway(ApplianceRecord),
    BastionHost(ApplianceRecord),
    NetworkInterface(NicRecord),
    PrivateDnsZone(PrivateDnsZoneRecord),
    /// A kind the engine does not model; the body is kept verbatim.
    Other {
        resource_type: String,
        fields: Map<String, Value>,
    },
}

impl RawResource {
    /// Declared type label, as it would appear in a diagnostic.
    pub fn type_label(&self) -> &str {
        match self {
            RawResource::VirtualNetwork(_) => ResourceKind::VirtualNetwork.as_str(),
            RawResource::Subnet(_) => ResourceKind::Subnet.as_str(),
            RawResource::NetworkSecurityGroup(_) => ResourceKind::NetworkSecurityGroup.as_str(),
            RawResource::Firewall(_) => ResourceKind::Firewall.as_str(),
            RawResource::FirewallPolicy(_) => ResourceKind::FirewallPolicy.as_str(),
            RawResource::RouteTable(_) => ResourceKind::RouteTable.as_str(),
            RawResource::PrivateEndpoint(_) => ResourceKind::PrivateEndpoint.as_str(),
            RawResource::LoadBalancer(_) => ResourceKind::LoadBalancer.as_str(),
            RawResource::ApplicationGateway(_) => ResourceKind::ApplicationGateway.as_str(),
            RawResource::VNetGateway(_) => ResourceKind::VNetGateway.as_str(),
            RawResource::BastionHost(_) => ResourceKind::BastionHost.as_str(),
            RawResource::NetworkInterface(_) => ResourceKind::NetworkInterface.as_str(),
            RawResource::PrivateDnsZone(_) => ResourceKind::PrivateDnsZone.as_str(),
            RawResource::Other { resource_type, .. } => resource_type.as_str(),
        }
    }

    /// The record's own id, when it has one.
    pub fn id(&self) -> Option<&str> {
        let id = match self {
            RawResource::VirtualNetwork(r) => r.id.as_deref(),
            RawResource::Subnet(r) => r.id.as_deref(),
            RawResource::NetworkSecurityGroup(r) => r.id.as_deref(),
            RawResource::Firewall(r) => r.id.as_deref(),
            RawResource::FirewallPolicy(r) => r.id.as_deref(),
            RawResource::RouteTable(r) => r.id.as_deref(),
            RawResource::PrivateEndpoint(r) => r.id.as_deref(),
            RawResource::LoadBalancer(r)
            | RawResource::ApplicationGateway(r)
            | RawResource::VNetGateway(r)
            | RawResource::BastionHost(r) => r.id.as_deref(),
            RawResource::NetworkInterface(r) => r.id.as_deref(),
            RawResource::PrivateDnsZone(r) => r.id.as_deref(),
            RawResource::Other { fields, .. } => fields.get("id").and_then(Value::as_str),
        };
        id.filter(|id| !id.trim().is_empty())
    }
}

/// A record as handed over by a collector: a declared type plus the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub resource_type: Option<String>,
    pub body: Value,
}

/// What a raw record turns into once its declared type is resolved.
#[derive(Debug, Clone)]
pub enum ParsedRecord {
    Resource(RawResource),
    Peering(PeeringRecord),
}

impl RawRecord {
    pub fn new(resource_type: impl Into<String>, body: Value) -> Self {
        RawRecord {
            resource_type: Some(resource_type.into()),
            body,
        }
    }

    /// Declared type, falling back to the body's own `type` field.
    pub fn declared_type(&self) -> Option<&str> {
        self.resource_type
            .as_deref()
            .or_else(|| self.body.get("type").and_then(Value::as_str))
            .filter(|t| !t.trim().is_empty())
    }

    pub fn parse(self) -> Result<ParsedRecord> {
        let declared = self
            .declared_type()
            .map(String::from)
            .ok_or_else(|| InventoryError::malformed("unknown", "record has no declared type"))?;

        let Value::Object(fields) = self.body else {
            return Err(InventoryError::malformed(declared, "record body is not an object"));
        };

        let Some(kind) = ResourceKind::from_declared(&declared) else {
            return Ok(ParsedRecord::Resource(RawResource::Other {
                resource_type: declared,
                fields,
            }));
        };

        let body = Value::Object(fields);
        let malformed = |e: serde_json::Error| InventoryError::malformed(kind.as_str(), e.to_string());
        let resource = match kind {
            ResourceKind::Peering => {
                return serde_json::from_value(body)
                    .map(ParsedRecord::Peering)
                    .map_err(malformed);
            }
            ResourceKind::VirtualNetwork => {
                RawResource::VirtualNetwork(serde_json::from_value(body).map_err(malformed)?)
            }
            ResourceKind::Subnet => RawResource::Subnet(serde_json::from_value(body).map_err(malformed)?),
            ResourceKind::NetworkSecurityGroup => {
                RawResource::NetworkSecurityGroup(serde_json::from_value(body).map_err(malformed)?)
            }
            ResourceKind::Firewall => RawResource::Firewall(serde_json::from_value(body).map_err(malformed)?),
            ResourceKind::FirewallPolicy => {
                RawResource::FirewallPolicy(serde_json::from_value(body).map_err(malformed)?)
            }
            ResourceKind::RouteTable => {
                RawResource::RouteTable(serde_json::from_value(body).map_err(malformed)?)
            }
            ResourceKind::PrivateEndpoint => {
                RawResource::PrivateEndpoint(serde_json::from_value(body).map_err(malformed)?)
            }
            ResourceKind::LoadBalancer => {
                RawResource::LoadBalancer(serde_json::from_value(body).map_err(malformed)?)
            }
            ResourceKind::ApplicationGateway => {
                RawResource::ApplicationGateway(serde_json::from_value(body).map_err(malformed)?)
            }
            ResourceKind::VNetGateway => {
                RawResource::VNetGateway(serde_json::from_value(body).map_err(malformed)?)
            }
            ResourceKind::BastionHost => {
                RawResource::BastionHost(serde_json::from_value(body).map_err(malformed)?)
            }
            ResourceKind::NetworkInterface => {
                RawResource::NetworkInterface(serde_json::from_value(body).map_err(malformed)?)
            }
            ResourceKind::PrivateDnsZone => {
                RawResource::PrivateDnsZone(serde_json::from_value(body).map_err(malformed)?)
            }
        };
        Ok(ParsedRecord::Resource(resource))
    }
}

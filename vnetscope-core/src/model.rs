// Typed network graph: nodes, edges and read accessors

use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use vnetscope_inventory::arm;

pub type Attributes = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    VirtualNetwork,
    Subnet,
    NetworkSecurityGroup,
    Firewall,
    FirewallPolicy,
    RouteTable,
    PrivateEndpoint,
    LoadBalancer,
    ApplicationGateway,
    VNetGateway,
    BastionHost,
    VirtualMachine,
    PrivateDnsZone,
    Other,
}

impl NodeType {
    pub const ALL: [NodeType; 14] = [
        NodeType::VirtualNetwork,
        NodeType::Subnet,
        NodeType::NetworkSecurityGroup,
        NodeType::Firewall,
        NodeType::FirewallPolicy,
        NodeType::RouteTable,
        NodeType::PrivateEndpoint,
        NodeType::LoadBalancer,
        NodeType::ApplicationGateway,
        NodeType::VNetGateway,
        NodeType::BastionHost,
        NodeType::VirtualMachine,
        NodeType::PrivateDnsZone,
        NodeType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::VirtualNetwork => "virtual_network",
            NodeType::Subnet => "subnet",
            NodeType::NetworkSecurityGroup => "network_security_group",
            NodeType::Firewall => "firewall",
            NodeType::FirewallPolicy => "firewall_policy",
            NodeType::RouteTable => "route_table",
            NodeType::PrivateEndpoint => "private_endpoint",
            NodeType::LoadBalancer => "load_balancer",
            NodeType::ApplicationGateway => "application_gateway",
            NodeType::VNetGateway => "vnet_gateway",
            NodeType::BastionHost => "bastion_host",
            NodeType::VirtualMachine => "virtual_machine",
            NodeType::PrivateDnsZone => "private_dns_zone",
            NodeType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    Contains,
    Peering,
    SecuredBy,
    RoutesVia,
    DnsLinked,
    ConnectsTo,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 6] = [
        EdgeKind::Contains,
        EdgeKind::Peering,
        EdgeKind::SecuredBy,
        EdgeKind::RoutesVia,
        EdgeKind::DnsLinked,
        EdgeKind::ConnectsTo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "contains",
            EdgeKind::Peering => "peering",
            EdgeKind::SecuredBy => "secured_by",
            EdgeKind::RoutesVia => "routes_via",
            EdgeKind::DnsLinked => "dns_linked",
            EdgeKind::ConnectsTo => "connects_to",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: String,
    pub node_type: NodeType,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    pub attributes: Attributes,
    /// Synthesized for a reference to a resource missing from the snapshot.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

impl NetworkNode {
    pub fn new(id: impl Into<String>, node_type: NodeType, name: impl Into<String>) -> Self {
        NetworkNode {
            id: id.into(),
            node_type,
            name: name.into(),
            resource_group: None,
            attributes: Attributes::new(),
            placeholder: false,
        }
    }

    /// Stand-in for an id some hint referenced but no record described.
    pub fn placeholder(id: &str) -> Self {
        let mut node = NetworkNode::new(id, NodeType::Other, arm::resource_name(id));
        node.resource_group = arm::resource_group(id).map(String::from);
        node.placeholder = true;
        node
    }

    pub fn with_resource_group(mut self, resource_group: Option<String>) -> Self {
        self.resource_group = resource_group;
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Sets an attribute, skipping nulls and empty arrays.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        match &value {
            Value::Null => {}
            Value::Array(items) if items.is_empty() => {}
            _ => {
                self.attributes.insert(key.to_string(), value);
            }
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// String items of an array attribute, or the attribute itself when it
    /// is a single string.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.attributes.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn address_prefixes(&self) -> Vec<String> {
        self.string_list("address_prefixes")
    }

    pub fn private_ips(&self) -> Vec<String> {
        self.string_list("private_ips")
    }

    /// Folds another description of the same resource into this node.
    /// Arrays are unioned, the first value wins for scalars, and the node
    /// type never changes unless this node is a placeholder.
    pub fn merge(&mut self, other: NetworkNode) {
        if self.placeholder && !other.placeholder {
            self.node_type = other.node_type;
            self.name = other.name;
            self.placeholder = false;
            if other.resource_group.is_some() {
                self.resource_group = other.resource_group;
            }
        } else if self.resource_group.is_none() {
            self.resource_group = other.resource_group;
        }

        for (key, value) in other.attributes {
            match (self.attributes.get_mut(&key), value) {
                (Some(Value::Array(existing)), Value::Array(incoming)) => {
                    for item in incoming {
                        if !existing.contains(&item) {
                            existing.push(item);
                        }
                    }
                }
                (Some(_), _) => {}
                (None, value) => {
                    self.attributes.insert(key, value);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
}

impl NetworkEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        NetworkEdge {
            source: source.into(),
            target: target.into(),
            kind,
            attributes: Attributes::new(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Serializable view of a graph: nodes and edges in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
}

/// Nodes and edges of one snapshot, stored in a petgraph arena with an
/// id index. Ids are compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct NetworkGraph {
    graph: DiGraph<NetworkNode, NetworkEdge>,
    index: HashMap<String, NodeIndex>,
}

impl NetworkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> Option<&NetworkNode> {
        self.node_index(id)
            .and_then(|index| self.graph.node_weight(index))
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(&arm::normalize_id(id)).copied()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(&arm::normalize_id(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NetworkNode> {
        self.graph.node_weights()
    }

    pub fn edges(&self) -> impl Iterator<Item = &NetworkEdge> {
        self.graph.edge_weights()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes().cloned().collect(),
            edges: self.edges().cloned().collect(),
        }
    }

    /// Targets of `kind` edges leaving `id`, in edge insertion order.
    pub fn outgoing(&self, id: &str, kind: EdgeKind) -> Vec<&NetworkNode> {
        self.neighbors(id, kind, Direction::Outgoing)
    }

    /// Sources of `kind` edges entering `id`, in edge insertion order.
    pub fn incoming(&self, id: &str, kind: EdgeKind) -> Vec<&NetworkNode> {
        self.neighbors(id, kind, Direction::Incoming)
    }

    pub fn has_edge(&self, source: &str, target: &str, kind: EdgeKind) -> bool {
        match (self.node_index(source), self.node_index(target)) {
            (Some(a), Some(b)) => self.find_edge(a, b, kind).is_some(),
            _ => false,
        }
    }

    pub fn nodes_of_type(&self, node_type: NodeType) -> Vec<&NetworkNode> {
        self.nodes()
            .filter(|node| node.node_type == node_type)
            .collect()
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> Vec<&NetworkEdge> {
        self.edges().filter(|edge| edge.kind == kind).collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// The underlying arena, for index-based traversal.
    pub fn inner(&self) -> &DiGraph<NetworkNode, NetworkEdge> {
        &self.graph
    }

    pub(crate) fn insert_node(&mut self, node: NetworkNode) -> NodeIndex {
        let key = arm::normalize_id(&node.id);
        let index = self.graph.add_node(node);
        self.index.insert(key, index);
        index
    }

    pub(crate) fn node_mut(&mut self, index: NodeIndex) -> Option<&mut NetworkNode> {
        self.graph.node_weight_mut(index)
    }

    pub(crate) fn node_at(&self, index: NodeIndex) -> Option<&NetworkNode> {
        self.graph.node_weight(index)
    }

    pub(crate) fn find_edge(&self, source: NodeIndex, target: NodeIndex, kind: EdgeKind) -> Option<EdgeIndex> {
        self.graph
            .edges_connecting(source, target)
            .find(|edge| edge.weight().kind == kind)
            .map(|edge| edge.id())
    }

    pub(crate) fn insert_edge(&mut self, source: NodeIndex, target: NodeIndex, edge: NetworkEdge) -> EdgeIndex {
        self.graph.add_edge(source, target, edge)
    }

    fn neighbors(&self, id: &str, kind: EdgeKind, direction: Direction) -> Vec<&NetworkNode> {
        let Some(index) = self.node_index(id) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(index, direction)
            .filter(|edge| edge.weight().kind == kind)
            .collect();
        // petgraph walks adjacency lists newest first
        edges.sort_by_key(|edge| edge.id());
        edges
            .into_iter()
            .filter_map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                self.graph.node_weight(other)
            })
            .collect()
    }
}

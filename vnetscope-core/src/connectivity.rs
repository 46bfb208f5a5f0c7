//! Connectivity analysis: which addressable entities can reach which, and
//! on which ports.
//!
//! Structural reachability comes first. A breadth-first search over the
//! traversal graph (Contains and active Peering edges in both directions,
//! RoutesVia edges forward only) marks every pair without a path as
//! [`Verdict::NoPath`] before any rule is looked at. For the remaining pairs
//! the analyzer enumerates bounded simple paths and asks every enforcement
//! point on a path for a decision:
//!
//! - NSGs on nodes before the first transit hop (VNet, route table or
//!   firewall) are evaluated Outbound,
//! - NSGs on nodes after the last transit hop are evaluated Inbound,
//! - firewall policies of firewalls on the path are evaluated Outbound.
//!
//! A path allows traffic only when every point on it does. A pair allows
//! traffic when at least one path does.

use crate::cidr::Cidr;
use crate::config::AnalysisConfig;
use crate::model::{EdgeKind, NetworkEdge, NetworkGraph, NetworkNode, NodeType};
use crate::rules::{
    Action, Decision, Direction, Protocol, RuleReference, RuleSet, RuleSetKind, RuleSets,
    ServiceTagTable, TrafficTuple, evaluate,
};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, info};
use vnetscope_inventory::arm;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortProbe {
    pub protocol: Protocol,
    /// `None` stands for every port.
    pub port: Option<u16>,
}

impl PortProbe {
    pub fn tcp(port: u16) -> Self {
        PortProbe {
            protocol: Protocol::Tcp,
            port: Some(port),
        }
    }

    /// Any protocol on any port.
    pub fn any() -> Self {
        PortProbe {
            protocol: Protocol::Any,
            port: None,
        }
    }

    /// Risky ports over TCP, deduplicated, followed by the any-port probe.
    pub fn standard_set(risky_ports: &[u16]) -> Vec<PortProbe> {
        let mut probes: Vec<PortProbe> = Vec::new();
        for port in risky_ports {
            let probe = PortProbe::tcp(*port);
            if !probes.contains(&probe) {
                probes.push(probe);
            }
        }
        probes.push(PortProbe::any());
        probes
    }
}

impl fmt::Display for PortProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}/{}", self.protocol, port),
            None => write!(f, "{}/*", self.protocol),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Allowed,
    Denied,
    NoPath,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allowed => "allowed",
            Verdict::Denied => "denied",
            Verdict::NoPath => "no_path",
        }
    }
}

/// The verdict for one probe between one ordered pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeVerdict {
    pub probe: PortProbe,
    pub verdict: Verdict,
    /// The rule that caused the verdict, when one did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deciding_rule: Option<RuleReference>,
}

/// Aggregate over all probes of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectivityStatus {
    /// Every probe allowed.
    Allowed,
    /// Some probes allowed, some denied.
    Conditional,
    Denied,
    NoPath,
}

impl ConnectivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityStatus::Allowed => "allowed",
            ConnectivityStatus::Conditional => "conditional",
            ConnectivityStatus::Denied => "denied",
            ConnectivityStatus::NoPath => "no_path",
        }
    }

    fn from_verdicts(verdicts: &[ProbeVerdict]) -> Self {
        let allowed = verdicts.iter().filter(|v| v.verdict == Verdict::Allowed).count();
        if verdicts.iter().all(|v| v.verdict == Verdict::NoPath) {
            ConnectivityStatus::NoPath
        } else if allowed == verdicts.len() {
            ConnectivityStatus::Allowed
        } else if allowed == 0 {
            ConnectivityStatus::Denied
        } else {
            ConnectivityStatus::Conditional
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivitySummary {
    pub source: String,
    pub destination: String,
    pub reachable: bool,
    pub status: ConnectivityStatus,
    pub verdicts: Vec<ProbeVerdict>,
    pub paths_considered: usize,
}

impl ConnectivitySummary {
    pub fn verdict(&self, probe: &PortProbe) -> Option<Verdict> {
        self.verdicts
            .iter()
            .find(|v| &v.probe == probe)
            .map(|v| v.verdict)
    }

    /// Deciding rules of all probes, without repeats.
    pub fn deciding_rules(&self) -> Vec<&RuleReference> {
        let mut rules: Vec<&RuleReference> = Vec::new();
        for rule in self.verdicts.iter().filter_map(|v| v.deciding_rule.as_ref()) {
            if !rules.contains(&rule) {
                rules.push(rule);
            }
        }
        rules
    }

    /// Ports of TCP probes that were allowed.
    pub fn allowed_ports(&self) -> Vec<u16> {
        self.verdicts
            .iter()
            .filter(|v| v.verdict == Verdict::Allowed)
            .filter_map(|v| v.probe.port)
            .collect()
    }
}

/// Summaries keyed by (source id, destination id), ordered by id.
/// Serializes as a list of summaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectivityMatrix {
    entries: BTreeMap<(String, String), ConnectivitySummary>,
}

impl ConnectivityMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, summary: ConnectivitySummary) {
        let key = (arm::normalize_id(&summary.source), arm::normalize_id(&summary.destination));
        self.entries.insert(key, summary);
    }

    pub fn get(&self, source: &str, destination: &str) -> Option<&ConnectivitySummary> {
        self.entries
            .get(&(arm::normalize_id(source), arm::normalize_id(destination)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectivitySummary> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_status(&self, status: ConnectivityStatus) -> usize {
        self.iter().filter(|summary| summary.status == status).count()
    }

    pub fn reachable_count(&self) -> usize {
        self.iter().filter(|summary| summary.reachable).count()
    }
}

impl Serialize for ConnectivityMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for summary in self.entries.values() {
            seq.serialize_element(summary)?;
        }
        seq.end()
    }
}

/// One rule set consulted in one direction along a path.
#[derive(Debug, Clone, Copy)]
pub struct EnforcementPoint<'a> {
    pub rule_set: &'a RuleSet,
    pub direction: Direction,
}

/// Conjunctive evaluation along one path: the first point that denies
/// decides. When every point allows, the last point's decision is returned.
/// A path without enforcement points allows everything.
pub fn evaluate_path(points: &[EnforcementPoint<'_>], tuple: &TrafficTuple, tags: Option<&ServiceTagTable>) -> Decision {
    let mut last = Decision {
        action: Action::Allow,
        rule: None,
    };
    for point in points {
        let decision = evaluate(point.rule_set, &tuple.with_direction(point.direction), tags);
        debug!(
            "{} {} {} -> {}: {}",
            point.rule_set.name,
            point.direction.as_str(),
            tuple.source,
            tuple.destination,
            decision.action.as_str()
        );
        if !decision.is_allowed() {
            return decision;
        }
        last = decision;
    }
    last
}

/// Nodes that carry address space and take part in the matrix.
pub fn is_addressable(node: &NetworkNode) -> bool {
    !node.placeholder
        && matches!(
            node.node_type,
            NodeType::VirtualNetwork | NodeType::Subnet | NodeType::PrivateEndpoint | NodeType::VirtualMachine
        )
        && endpoint_address(node).is_some()
}

/// The address a node is probed with: its first parseable address prefix,
/// else its first private IP as a host prefix.
pub fn endpoint_address(node: &NetworkNode) -> Option<Cidr> {
    node.address_prefixes()
        .iter()
        .find_map(|prefix| Cidr::parse(prefix))
        .or_else(|| node.private_ips().iter().find_map(|ip| Cidr::parse(ip)))
}

fn is_transit(node_type: NodeType) -> bool {
    matches!(node_type, NodeType::VirtualNetwork | NodeType::RouteTable | NodeType::Firewall)
}

fn peering_active(edge: &NetworkEdge) -> bool {
    let connected = edge
        .attribute("peering_state")
        .and_then(Value::as_str)
        .is_none_or(|state| state.eq_ignore_ascii_case("connected"));
    let access = edge
        .attribute("allow_virtual_network_access")
        .and_then(Value::as_bool)
        != Some(false);
    connected && access
}

/// Index-aligned adjacency of the edges traffic can follow.
struct Traversal {
    graph: DiGraph<(), ()>,
    adjacency: Vec<Vec<NodeIndex>>,
}

impl Traversal {
    fn new(network: &NetworkGraph) -> Self {
        let inner = network.inner();
        let mut graph = DiGraph::with_capacity(inner.node_count(), inner.edge_count() * 2);
        for _ in inner.node_indices() {
            graph.add_node(());
        }

        for edge in inner.edge_references() {
            let (source, target) = (edge.source(), edge.target());
            match edge.weight().kind {
                EdgeKind::Contains => {
                    graph.update_edge(source, target, ());
                    graph.update_edge(target, source, ());
                }
                EdgeKind::Peering if peering_active(edge.weight()) => {
                    graph.update_edge(source, target, ());
                    graph.update_edge(target, source, ());
                }
                EdgeKind::RoutesVia => {
                    graph.update_edge(source, target, ());
                }
                _ => {}
            }
        }

        let adjacency = graph
            .node_indices()
            .map(|index| {
                let mut next: Vec<NodeIndex> = graph.neighbors(index).collect();
                next.sort();
                next
            })
            .collect();

        Traversal { graph, adjacency }
    }

    fn reachable_from(&self, source: NodeIndex) -> HashSet<NodeIndex> {
        let mut reached = HashSet::new();
        let mut bfs = Bfs::new(&self.graph, source);
        while let Some(index) = bfs.next(&self.graph) {
            reached.insert(index);
        }
        reached
    }

    /// Simple paths from `source` to `target` of at most `max_depth` edges,
    /// at most `max_paths` of them, in neighbor index order.
    fn paths(&self, source: NodeIndex, target: NodeIndex, max_depth: usize, max_paths: usize) -> Vec<Vec<NodeIndex>> {
        let mut paths = Vec::new();
        let mut path = vec![source];
        let mut visited = HashSet::from([source]);
        self.extend(target, max_depth, max_paths, &mut path, &mut visited, &mut paths);
        paths
    }

    fn extend(
        &self,
        target: NodeIndex,
        max_depth: usize,
        max_paths: usize,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
        paths: &mut Vec<Vec<NodeIndex>>,
    ) {
        let Some(&current) = path.last() else {
            return;
        };
        if current == target {
            paths.push(path.clone());
            return;
        }
        if path.len() > max_depth {
            return;
        }

        for &next in &self.adjacency[current.index()] {
            if paths.len() >= max_paths {
                return;
            }
            if !visited.insert(next) {
                continue;
            }
            path.push(next);
            self.extend(target, max_depth, max_paths, path, visited, paths);
            path.pop();
            visited.remove(&next);
        }
    }
}

struct Analyzer<'a> {
    graph: &'a NetworkGraph,
    rule_sets: &'a RuleSets,
    config: &'a AnalysisConfig,
    tags: ServiceTagTable,
    traversal: Traversal,
    probes: Vec<PortProbe>,
}

impl<'a> Analyzer<'a> {
    fn node(&self, index: NodeIndex) -> Option<&'a NetworkNode> {
        self.graph.inner().node_weight(index)
    }

    /// Rule sets of `kind` attached to `node` by SecuredBy edges.
    fn attached(&self, node: &NetworkNode, kind: RuleSetKind) -> Vec<&'a RuleSet> {
        self.graph
            .outgoing(&node.id, EdgeKind::SecuredBy)
            .into_iter()
            .filter_map(|target| {
                let rule_set = self.rule_sets.get(&target.id);
                if rule_set.is_none() {
                    debug!("No rules known for {} attached to {}", target.id, node.id);
                }
                rule_set
            })
            .filter(|rule_set| rule_set.kind == kind)
            .collect()
    }

    fn enforcement_points(&self, path: &[NodeIndex]) -> Vec<EnforcementPoint<'a>> {
        let nodes: Vec<&NetworkNode> = path.iter().filter_map(|index| self.node(*index)).collect();
        let first_transit = nodes.iter().position(|node| is_transit(node.node_type));
        let last_transit = nodes.iter().rposition(|node| is_transit(node.node_type));
        let (source_side, destination_side) = match (first_transit, last_transit) {
            (Some(first), Some(last)) => (&nodes[..first], &nodes[last + 1..]),
            _ => (&nodes[..], &nodes[..]),
        };

        let mut points = Vec::new();
        for node in source_side {
            for rule_set in self.attached(node, RuleSetKind::NetworkSecurityGroup) {
                points.push(EnforcementPoint {
                    rule_set,
                    direction: Direction::Outbound,
                });
            }
        }
        for node in nodes.iter().filter(|node| node.node_type == NodeType::Firewall) {
            for rule_set in self.attached(node, RuleSetKind::FirewallPolicy) {
                points.push(EnforcementPoint {
                    rule_set,
                    direction: Direction::Outbound,
                });
            }
        }
        for node in destination_side {
            for rule_set in self.attached(node, RuleSetKind::NetworkSecurityGroup) {
                points.push(EnforcementPoint {
                    rule_set,
                    direction: Direction::Inbound,
                });
            }
        }
        points
    }

    fn no_path(&self, source: &NetworkNode, destination: &NetworkNode) -> ConnectivitySummary {
        ConnectivitySummary {
            source: source.id.clone(),
            destination: destination.id.clone(),
            reachable: false,
            status: ConnectivityStatus::NoPath,
            verdicts: self
                .probes
                .iter()
                .map(|probe| ProbeVerdict {
                    probe: probe.clone(),
                    verdict: Verdict::NoPath,
                    deciding_rule: None,
                })
                .collect(),
            paths_considered: 0,
        }
    }

    fn evaluate_pair(&self, source: NodeIndex, destination: NodeIndex) -> Option<ConnectivitySummary> {
        let source_node = self.node(source)?;
        let destination_node = self.node(destination)?;
        let source_address = endpoint_address(source_node)?;
        let destination_address = endpoint_address(destination_node)?;

        let paths = self.traversal.paths(
            source,
            destination,
            self.config.max_path_depth,
            self.config.max_paths_per_pair,
        );
        if paths.is_empty() {
            debug!(
                "{} -> {} reachable only beyond {} hops",
                source_node.name, destination_node.name, self.config.max_path_depth
            );
            return Some(self.no_path(source_node, destination_node));
        }

        // Paths with the same enforcement points decide the same way
        let mut point_sets: Vec<Vec<EnforcementPoint<'a>>> = Vec::new();
        let mut seen: HashSet<Vec<(&str, Direction)>> = HashSet::new();
        for path in &paths {
            let points = self.enforcement_points(path);
            let key: Vec<(&str, Direction)> = points
                .iter()
                .map(|point| (point.rule_set.id.as_str(), point.direction))
                .collect();
            if seen.insert(key) {
                point_sets.push(points);
            }
        }

        let verdicts: Vec<ProbeVerdict> = self
            .probes
            .iter()
            .map(|probe| {
                let tuple = TrafficTuple::new(
                    source_address,
                    destination_address,
                    probe.protocol.clone(),
                    probe.port,
                    Direction::Outbound,
                );
                let decisions: Vec<Decision> = point_sets
                    .iter()
                    .map(|points| evaluate_path(points, &tuple, Some(&self.tags)))
                    .collect();
                let decision = decisions
                    .iter()
                    .find(|decision| decision.is_allowed())
                    .or(decisions.first());
                match decision {
                    Some(decision) => ProbeVerdict {
                        probe: probe.clone(),
                        verdict: if decision.is_allowed() {
                            Verdict::Allowed
                        } else {
                            Verdict::Denied
                        },
                        deciding_rule: decision.rule.clone(),
                    },
                    None => ProbeVerdict {
                        probe: probe.clone(),
                        verdict: Verdict::Allowed,
                        deciding_rule: None,
                    },
                }
            })
            .collect();

        let status = ConnectivityStatus::from_verdicts(&verdicts);
        debug!(
            "{} -> {}: {} over {} paths",
            source_node.name,
            destination_node.name,
            status.as_str(),
            paths.len()
        );
        Some(ConnectivitySummary {
            source: source_node.id.clone(),
            destination: destination_node.id.clone(),
            reachable: true,
            status,
            verdicts,
            paths_considered: paths.len(),
        })
    }
}

/// Computes the connectivity matrix over every ordered pair of addressable
/// nodes.
pub fn analyze(graph: &NetworkGraph, rule_sets: &RuleSets, config: &AnalysisConfig) -> ConnectivityMatrix {
    let analyzer = Analyzer {
        graph,
        rule_sets,
        config,
        tags: config.service_tag_table(graph),
        traversal: Traversal::new(graph),
        probes: PortProbe::standard_set(&config.risky_ports),
    };

    let endpoints: Vec<NodeIndex> = graph
        .inner()
        .node_indices()
        .filter(|index| analyzer.node(*index).is_some_and(is_addressable))
        .collect();
    info!(
        "Analyzing connectivity between {} addressable nodes with {} probes",
        endpoints.len(),
        analyzer.probes.len()
    );

    let mut matrix = ConnectivityMatrix::new();
    for &source in &endpoints {
        let reachable = analyzer.traversal.reachable_from(source);
        for &destination in &endpoints {
            if source == destination {
                continue;
            }
            let summary = if reachable.contains(&destination) {
                analyzer.evaluate_pair(source, destination)
            } else {
                match (analyzer.node(source), analyzer.node(destination)) {
                    (Some(a), Some(b)) => Some(analyzer.no_path(a, b)),
                    _ => None,
                }
            };
            if let Some(summary) = summary {
                matrix.insert(summary);
            }
        }
    }

    info!(
        "Connectivity: {} pairs, {} reachable, {} allowed, {} conditional, {} denied",
        matrix.len(),
        matrix.reachable_count(),
        matrix.count_status(ConnectivityStatus::Allowed),
        matrix.count_status(ConnectivityStatus::Conditional),
        matrix.count_status(ConnectivityStatus::Denied)
    );
    matrix
}

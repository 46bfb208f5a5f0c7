// Graph construction from normalized nodes and relationship hints

use crate::config::AnalysisConfig;
use crate::data::{Diagnostic, DiagnosticKind};
use crate::model::{NetworkEdge, NetworkGraph, NetworkNode, NodeType};
use crate::normalize::{HintTarget, RelationshipHint, normalize, peering_hint, relationship_hints};
use crate::rules::{RuleSet, RuleSets};
use petgraph::graph::NodeIndex;
use tracing::{debug, info, warn};
use vnetscope_inventory::{RawResource, Snapshot};

/// Accumulates nodes and hints, then resolves every hint into an edge.
///
/// Hints are resolved in [`GraphBuilder::finish`], after all nodes are known,
/// so the order in which records arrive does not matter.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: NetworkGraph,
    hints: Vec<RelationshipHint>,
    diagnostics: Vec<Diagnostic>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, merging it into an existing node with the same id.
    pub fn add_node(&mut self, node: NetworkNode) -> NodeIndex {
        let Some(index) = self.graph.node_index(&node.id) else {
            debug!("Adding {} node {}", node.node_type.as_str(), node.id);
            return self.graph.insert_node(node);
        };

        if let Some(existing) = self.graph.node_mut(index) {
            if !existing.placeholder && !node.placeholder && existing.node_type != node.node_type {
                warn!(
                    "Resource {} described as both {} and {}; keeping {}",
                    existing.id,
                    existing.node_type.as_str(),
                    node.node_type.as_str(),
                    existing.node_type.as_str()
                );
            }
            existing.merge(node);
        }
        index
    }

    pub fn add_hint(&mut self, hint: RelationshipHint) {
        self.hints.push(hint);
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn finish(mut self) -> (NetworkGraph, Vec<Diagnostic>) {
        let hints = std::mem::take(&mut self.hints);
        for hint in hints {
            self.resolve_hint(hint);
        }
        (self.graph, self.diagnostics)
    }

    fn resolve_hint(&mut self, hint: RelationshipHint) {
        let Some(source) = self.endpoint(&hint.source, &hint) else {
            return;
        };

        let target = match &hint.target {
            HintTarget::Id(id) => self.endpoint(id, &hint),
            HintTarget::PrivateIp(ip) => {
                let found = self.node_with_private_ip(ip);
                if found.is_none() {
                    debug!(
                        "Dropping {} hint from {}: nothing owns private IP {}",
                        hint.kind.as_str(),
                        hint.source,
                        ip
                    );
                }
                found
            }
        };
        let Some(target) = target else {
            return;
        };

        if source == target {
            warn!("Dropping {} self-loop on {}", hint.kind.as_str(), hint.source);
            return;
        }
        if self.graph.find_edge(source, target, hint.kind).is_some() {
            debug!("Edge {} {} -> {} already present", hint.kind.as_str(), hint.source, describe(&hint.target));
            return;
        }

        let (Some(source_node), Some(target_node)) = (self.graph.node_at(source), self.graph.node_at(target)) else {
            return;
        };
        let edge = NetworkEdge {
            source: source_node.id.clone(),
            target: target_node.id.clone(),
            kind: hint.kind,
            attributes: hint.attributes,
        };
        self.graph.insert_edge(source, target, edge);
    }

    /// Index of the node with `id`, synthesizing a placeholder when the
    /// snapshot never described it.
    fn endpoint(&mut self, id: &str, hint: &RelationshipHint) -> Option<NodeIndex> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        if let Some(index) = self.graph.node_index(id) {
            return Some(index);
        }

        warn!(
            "{} hint references {} which is not in the snapshot; adding a placeholder",
            hint.kind.as_str(),
            id
        );
        self.diagnostics.push(Diagnostic::new(
            DiagnosticKind::DanglingReference,
            id,
            format!(
                "{} relationship from {} to {} names a resource missing from the snapshot",
                hint.kind.as_str(),
                hint.source,
                describe(&hint.target)
            ),
        ));
        Some(self.graph.insert_node(NetworkNode::placeholder(id)))
    }

    fn node_with_private_ip(&self, ip: &str) -> Option<NodeIndex> {
        self.graph
            .inner()
            .node_indices()
            .find(|index| {
                self.graph
                    .node_at(*index)
                    .is_some_and(|node| node.private_ips().iter().any(|owned| owned == ip))
            })
    }
}

fn describe(target: &HintTarget) -> &str {
    match target {
        HintTarget::Id(id) => id,
        HintTarget::PrivateIp(ip) => ip,
    }
}

/// Builds a graph from already-normalized nodes and their hints.
pub fn build(nodes: impl IntoIterator<Item = NetworkNode>, hints: impl IntoIterator<Item = RelationshipHint>) -> NetworkGraph {
    let mut builder = GraphBuilder::new();
    for node in nodes {
        builder.add_node(node);
    }
    for hint in hints {
        builder.add_hint(hint);
    }
    let (graph, diagnostics) = builder.finish();
    debug!("Built graph with {} diagnostics", diagnostics.len());
    graph
}

/// Everything derived from a snapshot before analysis runs.
#[derive(Debug, Clone)]
pub struct BuiltSnapshot {
    pub graph: NetworkGraph,
    pub rule_sets: RuleSets,
    pub diagnostics: Vec<Diagnostic>,
}

/// Normalizes every record, collects rule sets and builds the graph.
/// Malformed records are skipped with a diagnostic; nothing here fails.
pub fn build_snapshot(snapshot: &Snapshot, config: &AnalysisConfig) -> BuiltSnapshot {
    let mut builder = GraphBuilder::new();
    let mut rule_sets = RuleSets::new();

    for issue in &snapshot.issues {
        builder.add_diagnostic(Diagnostic::new(
            DiagnosticKind::MalformedResource,
            format!("{}[{}]", issue.section, issue.index),
            issue.reason.clone(),
        ));
    }

    for resource in &snapshot.resources {
        let node = match normalize(resource) {
            Ok(node) => node,
            Err(e) => {
                warn!("Skipping {} record: {}", resource.type_label(), e);
                builder.add_diagnostic(Diagnostic::new(
                    DiagnosticKind::MalformedResource,
                    resource.type_label(),
                    e.to_string(),
                ));
                continue;
            }
        };
        builder.add_node(node);

        for hint in relationship_hints(resource) {
            builder.add_hint(hint);
        }

        let parsed = match resource {
            RawResource::NetworkSecurityGroup(nsg) => Some(RuleSet::from_nsg(nsg)),
            RawResource::FirewallPolicy(policy) => {
                Some(RuleSet::from_firewall_policy(policy, config.firewall_default_action))
            }
            _ => None,
        };
        if let Some((rule_set, diagnostics)) = parsed {
            for diagnostic in diagnostics {
                builder.add_diagnostic(diagnostic);
            }
            rule_sets.insert(rule_set);
        }
    }

    for peering in &snapshot.peerings {
        match peering_hint(peering) {
            Ok(hint) => builder.add_hint(hint),
            Err(e) => {
                let reference = peering.id.clone().unwrap_or_else(|| "peering".to_string());
                warn!("Skipping peering {}: {}", reference, e);
                builder.add_diagnostic(Diagnostic::new(
                    DiagnosticKind::MalformedResource,
                    reference,
                    e.to_string(),
                ));
            }
        }
    }

    let (graph, diagnostics) = builder.finish();
    let placeholders = graph.nodes().filter(|node| node.placeholder).count();
    info!(
        "Built graph: {} nodes ({} placeholders), {} edges, {} rule sets, {} subnets",
        graph.node_count(),
        placeholders,
        graph.edge_count(),
        rule_sets.len(),
        graph.nodes_of_type(NodeType::Subnet).len()
    );

    BuiltSnapshot {
        graph,
        rule_sets,
        diagnostics,
    }
}

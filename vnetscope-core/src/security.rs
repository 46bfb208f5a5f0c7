// Risk patterns over parsed rules and graph structure

use crate::config::AnalysisConfig;
use crate::data::{AffectedReference, FindingCategory, SecurityFinding, Severity};
use crate::model::{EdgeKind, NetworkGraph, NodeType};
use crate::rules::{AccessRule, Action, Protocol, RuleSet, RuleSets};
use serde_json::Value;
use tracing::{debug, info};

fn rule_finding(
    rule: &AccessRule,
    severity: Severity,
    category: FindingCategory,
    title: &str,
    description: String,
    recommendation: &str,
) -> SecurityFinding {
    SecurityFinding {
        severity,
        category,
        reference: AffectedReference::rule(rule.rule_set.clone(), rule.name.clone()),
        title: title.to_string(),
        description,
        recommendation: recommendation.to_string(),
    }
}

fn allow_rules(rule_sets: &RuleSets) -> impl Iterator<Item = (&RuleSet, &AccessRule)> {
    rule_sets.iter().flat_map(|rule_set| {
        rule_set
            .rules()
            .iter()
            .filter(|rule| rule.action == Action::Allow)
            .map(move |rule| (rule_set, rule))
    })
}

pub fn check_overly_permissive_rules(rule_sets: &RuleSets) -> Vec<SecurityFinding> {
    let mut findings = Vec::new();

    for (rule_set, rule) in allow_rules(rule_sets) {
        if rule.source_is_any() && rule.destination_is_any() {
            findings.push(rule_finding(
                rule,
                Severity::High,
                FindingCategory::OverlyPermissiveRule,
                "Overly Permissive Rule",
                format!(
                    "Rule '{}' in {} allows traffic from any source to any destination ({}).",
                    rule.name,
                    rule_set.name,
                    rule.describe()
                ),
                "Restrict the source and destination to the address ranges that actually need this traffic.",
            ));
        }
    }

    findings
}

pub fn check_risky_ports(rule_sets: &RuleSets, risky_ports: &[u16]) -> Vec<SecurityFinding> {
    let mut findings = Vec::new();

    for (rule_set, rule) in allow_rules(rule_sets) {
        // No ports to expose
        if matches!(rule.protocol, Protocol::Icmp | Protocol::Esp | Protocol::Ah) {
            continue;
        }
        if !rule.source_is_internet() {
            continue;
        }

        let exposed = rule.destination_ports.exposed(risky_ports);
        if exposed.is_empty() {
            continue;
        }
        let ports = exposed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        findings.push(rule_finding(
            rule,
            Severity::High,
            FindingCategory::RiskyPortExposed,
            "Risky Port Exposed to the Internet",
            format!(
                "Rule '{}' in {} allows {} traffic from the internet to sensitive port(s) {}.",
                rule.name, rule_set.name, rule.protocol, ports
            ),
            "Remove internet access to administrative and database ports; use Bastion, a VPN or private endpoints instead.",
        ));
    }

    findings
}

pub fn check_all_ports_open(rule_sets: &RuleSets) -> Vec<SecurityFinding> {
    let mut findings = Vec::new();

    for (rule_set, rule) in allow_rules(rule_sets) {
        if rule.source_is_any() && rule.destination_ports.covers_all() {
            findings.push(rule_finding(
                rule,
                Severity::Medium,
                FindingCategory::AllPortsOpenFromAny,
                "All Ports Open From Any Source",
                format!(
                    "Rule '{}' in {} allows every destination port from any source.",
                    rule.name, rule_set.name
                ),
                "Limit the rule to the specific ports the workload serves.",
            ));
        }
    }

    findings
}

pub fn check_subnets_without_nsg(graph: &NetworkGraph, config: &AnalysisConfig) -> Vec<SecurityFinding> {
    let mut findings = Vec::new();

    for subnet in graph.nodes_of_type(NodeType::Subnet) {
        if config.is_exempt_subnet(&subnet.name) {
            debug!("Subnet {} is a platform subnet, not checking for an NSG", subnet.name);
            continue;
        }
        if !graph.outgoing(&subnet.id, EdgeKind::SecuredBy).is_empty() {
            continue;
        }
        findings.push(SecurityFinding {
            severity: Severity::Medium,
            category: FindingCategory::SubnetWithoutNsg,
            reference: AffectedReference::node(subnet.id.clone()),
            title: "Subnet Without NSG".to_string(),
            description: format!("Subnet '{}' has no network security group attached.", subnet.name),
            recommendation: "Associate a network security group with the subnet to filter inbound and outbound traffic."
                .to_string(),
        });
    }

    findings
}

pub fn check_peering_state(graph: &NetworkGraph) -> Vec<SecurityFinding> {
    let mut findings = Vec::new();

    for edge in graph.edges_of_kind(EdgeKind::Peering) {
        let Some(state) = edge.attribute("peering_state").and_then(Value::as_str) else {
            continue;
        };
        if state.eq_ignore_ascii_case("connected") {
            continue;
        }
        let name = edge
            .attribute("name")
            .and_then(Value::as_str)
            .unwrap_or("(unnamed)");
        findings.push(SecurityFinding {
            severity: Severity::Low,
            category: FindingCategory::PeeringNotConnected,
            reference: AffectedReference::node(edge.source.clone()),
            title: "Peering Not Connected".to_string(),
            description: format!(
                "Peering '{}' from {} to {} is in state '{}'.",
                name, edge.source, edge.target, state
            ),
            recommendation: "Create the matching peering on the remote virtual network or remove the stale one."
                .to_string(),
        });
    }

    findings
}

/// Runs every check. Checks are independent; one rule can trigger several.
pub fn detect(graph: &NetworkGraph, rule_sets: &RuleSets, config: &AnalysisConfig) -> Vec<SecurityFinding> {
    let mut all_findings = Vec::new();

    all_findings.extend(check_overly_permissive_rules(rule_sets));
    all_findings.extend(check_risky_ports(rule_sets, &config.risky_ports));
    all_findings.extend(check_all_ports_open(rule_sets));
    all_findings.extend(check_subnets_without_nsg(graph, config));
    all_findings.extend(check_peering_state(graph));

    info!("Detected {} security findings", all_findings.len());
    all_findings
}

/// Severity descending, then category, then reference.
pub fn sort_findings(findings: &mut [SecurityFinding]) {
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.category.cmp(&b.category))
            .then_with(|| a.reference.cmp(&b.reference))
    });
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FindingCategory {
    OverlyPermissiveRule,
    RiskyPortExposed,
    AllPortsOpenFromAny,
    SubnetWithoutNsg,
    PeeringNotConnected,
}

impl FindingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingCategory::OverlyPermissiveRule => "overly_permissive_rule",
            FindingCategory::RiskyPortExposed => "risky_port_exposed",
            FindingCategory::AllPortsOpenFromAny => "all_ports_open_from_any",
            FindingCategory::SubnetWithoutNsg => "subnet_without_nsg",
            FindingCategory::PeeringNotConnected => "peering_not_connected",
        }
    }
}

/// What a finding points at: a graph node or one rule inside a rule set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AffectedReference {
    Node { id: String },
    Rule { rule_set: String, rule: String },
}

impl AffectedReference {
    pub fn node(id: impl Into<String>) -> Self {
        AffectedReference::Node { id: id.into() }
    }

    pub fn rule(rule_set: impl Into<String>, rule: impl Into<String>) -> Self {
        AffectedReference::Rule {
            rule_set: rule_set.into(),
            rule: rule.into(),
        }
    }

    /// The node id, or the owning rule set id for a rule reference.
    pub fn resource_id(&self) -> &str {
        match self {
            AffectedReference::Node { id } => id,
            AffectedReference::Rule { rule_set, .. } => rule_set,
        }
    }
}

impl std::fmt::Display for AffectedReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AffectedReference::Node { id } => write!(f, "{}", id),
            AffectedReference::Rule { rule_set, rule } => write!(f, "{} (rule {})", rule_set, rule),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityFinding {
    pub severity: Severity,
    pub category: FindingCategory,
    pub reference: AffectedReference,
    pub title: String,
    pub description: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    MalformedResource,
    DanglingReference,
    RuleConfiguration,
    DuplicatePriority,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::MalformedResource => "malformed_resource",
            DiagnosticKind::DanglingReference => "dangling_reference",
            DiagnosticKind::RuleConfiguration => "rule_configuration",
            DiagnosticKind::DuplicatePriority => "duplicate_priority",
        }
    }
}

/// A non-fatal problem found while building or parsing. The run continues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub reference: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, reference: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            reference: reference.into(),
            message: message.into(),
        }
    }
}

// Report generation from an analysis run

use crate::analysis::Analysis;
use crate::connectivity::{ConnectivityMatrix, ConnectivityStatus};
use crate::data::{Diagnostic, SecurityFinding, Severity};
use crate::model::{EdgeKind, GraphSnapshot, NodeType};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use vnetscope_inventory::arm;

const HEAVY_RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const LIGHT_RULE: &str =
    "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectivityCounts {
    pub pairs: usize,
    pub reachable: usize,
    pub allowed: usize,
    pub conditional: usize,
    pub denied: usize,
    pub no_path: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    /// Where the snapshot came from, e.g. a file path.
    pub source: String,
    pub node_counts: BTreeMap<String, usize>,
    pub edge_counts: BTreeMap<String, usize>,
    pub placeholder_count: usize,
    pub rule_set_count: usize,
    pub rule_count: usize,
    pub severity_counts: SeverityCounts,
    pub connectivity: ConnectivityCounts,
    pub findings: Vec<SecurityFinding>,
    pub diagnostics: Vec<Diagnostic>,
    pub graph: GraphSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<ConnectivityMatrix>,
}

impl ReportData {
    pub fn from_analysis(analysis: &Analysis, source: &str, include_matrix: bool) -> Self {
        let mut node_counts = BTreeMap::new();
        for node_type in NodeType::ALL {
            let count = analysis.graph.nodes_of_type(node_type).len();
            if count > 0 {
                node_counts.insert(node_type.as_str().to_string(), count);
            }
        }

        let mut edge_counts = BTreeMap::new();
        for kind in EdgeKind::ALL {
            let count = analysis.graph.edges_of_kind(kind).len();
            if count > 0 {
                edge_counts.insert(kind.as_str().to_string(), count);
            }
        }

        let mut severity_counts = SeverityCounts::default();
        for finding in &analysis.findings {
            match finding.severity {
                Severity::High => severity_counts.high += 1,
                Severity::Medium => severity_counts.medium += 1,
                Severity::Low => severity_counts.low += 1,
            }
        }

        let matrix = &analysis.matrix;
        let connectivity = ConnectivityCounts {
            pairs: matrix.len(),
            reachable: matrix.reachable_count(),
            allowed: matrix.count_status(ConnectivityStatus::Allowed),
            conditional: matrix.count_status(ConnectivityStatus::Conditional),
            denied: matrix.count_status(ConnectivityStatus::Denied),
            no_path: matrix.count_status(ConnectivityStatus::NoPath),
        };

        ReportData {
            source: source.to_string(),
            node_counts,
            edge_counts,
            placeholder_count: analysis.graph.nodes().filter(|node| node.placeholder).count(),
            rule_set_count: analysis.rule_sets.len(),
            rule_count: analysis.rule_sets.rule_count(),
            severity_counts,
            connectivity,
            findings: analysis.findings.clone(),
            diagnostics: analysis.diagnostics.clone(),
            graph: analysis.graph.snapshot(),
            matrix: include_matrix.then(|| matrix.clone()),
        }
    }

    pub fn total_nodes(&self) -> usize {
        self.node_counts.values().sum()
    }

    pub fn total_edges(&self) -> usize {
        self.edge_counts.values().sum()
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    // Header
    report.push_str(HEAVY_RULE);
    report.push_str("                      VNETSCOPE NETWORK ANALYSIS REPORT\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    report.push_str(&format!("Snapshot:     {}\n", data.source));
    report.push_str(&format!("Generated:    {}\n", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")));
    report.push_str(&format!("Nodes:        {}\n", data.total_nodes()));
    report.push_str(&format!("Edges:        {}\n", data.total_edges()));
    report.push_str(&format!("Rule Sets:    {} ({} rules)\n", data.rule_set_count, data.rule_count));
    if data.placeholder_count > 0 {
        report.push_str(&format!("Placeholders: {}\n", data.placeholder_count));
    }
    report.push('\n');

    // Inventory
    report.push_str(HEAVY_RULE);
    report.push_str("INVENTORY\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');
    for (node_type, count) in &data.node_counts {
        report.push_str(&format!("  {:<28} {}\n", format_label(node_type), count));
    }
    report.push('\n');
    for (kind, count) in &data.edge_counts {
        report.push_str(&format!("  {:<28} {}\n", format_label(kind), count));
    }
    report.push('\n');

    // Executive summary
    report.push_str(HEAVY_RULE);
    report.push_str("EXECUTIVE SUMMARY\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    report.push_str(&format!("Total Findings: {}\n\n", data.severity_counts.total()));
    if data.severity_counts.high > 0 {
        report.push_str(&format!("  [HIGH]     {}  (High priority)\n", data.severity_counts.high));
    }
    if data.severity_counts.medium > 0 {
        report.push_str(&format!("  [MEDIUM]   {}  (Should be addressed)\n", data.severity_counts.medium));
    }
    if data.severity_counts.low > 0 {
        report.push_str(&format!("  [LOW]      {}  (Minor issues)\n", data.severity_counts.low));
    }
    report.push('\n');

    let counts = &data.connectivity;
    report.push_str(&format!(
        "Connectivity:   {} pairs, {} reachable ({} allowed, {} conditional, {} denied)\n\n",
        counts.pairs, counts.reachable, counts.allowed, counts.conditional, counts.denied
    ));

    // Detailed findings
    if !data.findings.is_empty() {
        report.push_str(HEAVY_RULE);
        report.push_str("DETAILED FINDINGS\n");
        report.push_str(HEAVY_RULE);
        report.push('\n');

        for (idx, finding) in data.findings.iter().enumerate() {
            report.push_str(&format!("[{}] {}\n", idx + 1, finding.title));
            report.push_str(&format!("Severity:     {}\n", finding.severity.as_str().to_uppercase()));
            report.push_str(&format!("Category:     {}\n", format_label(finding.category.as_str())));
            report.push_str(&format!("Affects:      {}\n", finding.reference));

            report.push_str("\nDescription:\n");
            report.push_str(&wrap_text(&finding.description, 80, "  "));
            report.push('\n');

            report.push_str("Recommendation:\n");
            report.push_str(&wrap_text(&finding.recommendation, 80, "  "));
            report.push('\n');

            report.push_str(LIGHT_RULE);
            report.push('\n');
        }
    }

    // Connectivity detail
    if let Some(matrix) = &data.matrix {
        report.push_str(HEAVY_RULE);
        report.push_str("CONNECTIVITY MATRIX\n");
        report.push_str(HEAVY_RULE);
        report.push('\n');

        let mut listed = 0;
        for summary in matrix.iter().filter(|summary| summary.reachable) {
            listed += 1;
            report.push_str(&format!(
                "  {} -> {}  [{}]\n",
                arm::resource_name(&summary.source),
                arm::resource_name(&summary.destination),
                summary.status.as_str().to_uppercase()
            ));
            let ports = summary.allowed_ports();
            if !ports.is_empty() {
                let ports: Vec<String> = ports.iter().map(ToString::to_string).collect();
                report.push_str(&format!("      risky ports allowed: {}\n", ports.join(", ")));
            }
            for rule in summary.deciding_rules() {
                report.push_str(&format!("      decided by: {}\n", rule));
            }
        }
        if listed == 0 {
            report.push_str("  No structurally reachable pairs.\n");
        }
        report.push('\n');
    }

    // Diagnostics
    if !data.diagnostics.is_empty() {
        report.push_str(HEAVY_RULE);
        report.push_str("DIAGNOSTICS\n");
        report.push_str(HEAVY_RULE);
        report.push('\n');
        for diagnostic in &data.diagnostics {
            report.push_str(&format!(
                "  [{}] {}\n",
                diagnostic.kind.as_str(),
                diagnostic.reference
            ));
            report.push_str(&wrap_text(&diagnostic.message, 80, "      "));
        }
        report.push('\n');
    }

    // Footer
    report.push_str(HEAVY_RULE);
    report.push_str("                          End of Report\n");
    report.push_str(HEAVY_RULE);
    report.push_str("\nGenerated by vnetscope - static Azure network analysis\n\n");

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "vnetscope",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json",
                "source": data.source
            },
            "summary": {
                "total_nodes": data.total_nodes(),
                "total_edges": data.total_edges(),
                "placeholder_nodes": data.placeholder_count,
                "node_types": data.node_counts,
                "edge_kinds": data.edge_counts,
                "rule_sets": data.rule_set_count,
                "rules": data.rule_count,
                "total_findings": data.severity_counts.total(),
                "severity_breakdown": data.severity_counts,
                "connectivity": data.connectivity
            },
            "findings": data.findings,
            "connectivity_matrix": data.matrix,
            "graph": data.graph,
            "diagnostics": data.diagnostics
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn format_label(label: &str) -> String {
    label
        .replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.len() + word.len() + 1 > width - indent.len() && !current_line.is_empty() {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}

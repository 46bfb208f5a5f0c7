// One analysis run: build, connectivity, detection

use crate::builder::{BuiltSnapshot, build_snapshot};
use crate::config::AnalysisConfig;
use crate::connectivity::{ConnectivityMatrix, analyze};
use crate::data::{Diagnostic, SecurityFinding};
use crate::model::NetworkGraph;
use crate::rules::RuleSets;
use crate::security::{detect, sort_findings};
use tracing::info;
use vnetscope_inventory::Snapshot;

/// Everything one run produces. Read-only once returned.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub graph: NetworkGraph,
    pub rule_sets: RuleSets,
    pub matrix: ConnectivityMatrix,
    /// Sorted by severity, highest first.
    pub findings: Vec<SecurityFinding>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn analyze_snapshot(snapshot: &Snapshot, config: &AnalysisConfig) -> Analysis {
    info!("Analyzing snapshot with {} resources", snapshot.len());

    let BuiltSnapshot {
        graph,
        rule_sets,
        diagnostics,
    } = build_snapshot(snapshot, config);

    let matrix = analyze(&graph, &rule_sets, config);
    let mut findings = detect(&graph, &rule_sets, config);
    sort_findings(&mut findings);

    Analysis {
        graph,
        rule_sets,
        matrix,
        findings,
        diagnostics,
    }
}

// Tests for structural reachability and per-port connectivity verdicts

use std::collections::BTreeMap;
use vnetscope_core::builder::build;
use vnetscope_core::cidr::Cidr;
use vnetscope_core::config::AnalysisConfig;
use vnetscope_core::connectivity::{
    ConnectivityStatus, EnforcementPoint, PortProbe, Verdict, analyze, endpoint_address, evaluate_path,
    is_addressable,
};
use vnetscope_core::model::{EdgeKind, NetworkGraph, NetworkNode, NodeType};
use vnetscope_core::normalize::RelationshipHint;
use vnetscope_core::rules::{
    AccessRule, Action, Direction, Protocol, RuleSet, RuleSets, TrafficTuple,
};

const RG: &str = "/subscriptions/xxx/resourceGroups/rg-net/providers/Microsoft.Network";

fn id(path: &str) -> String {
    format!("{}/{}", RG, path)
}

fn vnet(name: &str, prefix: &str) -> NetworkNode {
    NetworkNode::new(id(&format!("virtualNetworks/{}", name)), NodeType::VirtualNetwork, name)
        .with_attribute("address_prefixes", vec![prefix])
}

fn subnet(vnet: &str, name: &str, prefix: &str) -> NetworkNode {
    NetworkNode::new(subnet_id(vnet, name), NodeType::Subnet, name).with_attribute("address_prefixes", vec![prefix])
}

fn subnet_id(vnet: &str, name: &str) -> String {
    id(&format!("virtualNetworks/{}/subnets/{}", vnet, name))
}

fn vnet_id(name: &str) -> String {
    id(&format!("virtualNetworks/{}", name))
}

fn nsg_id(name: &str) -> String {
    id(&format!("networkSecurityGroups/{}", name))
}

fn nsg(name: &str) -> NetworkNode {
    NetworkNode::new(nsg_id(name), NodeType::NetworkSecurityGroup, name)
}

fn config(risky_ports: &[u16]) -> AnalysisConfig {
    AnalysisConfig {
        risky_ports: risky_ports.to_vec(),
        ..AnalysisConfig::default()
    }
}

fn allow_all(name: &str, priority: u64, direction: Direction) -> AccessRule {
    AccessRule::new(name, priority, direction, Action::Allow)
        .with_source(&["*"])
        .with_destination(&["*"])
        .with_destination_ports(&["*"])
}

fn deny_all(name: &str, priority: u64, direction: Direction) -> AccessRule {
    AccessRule::new(name, priority, direction, Action::Deny)
        .with_source(&["*"])
        .with_destination(&["*"])
        .with_destination_ports(&["*"])
}

/// vnet-a (10.1.0.0/16) with subnets web and db, each behind its own NSG.
fn create_test_vnet_graph() -> NetworkGraph {
    let nodes = vec![
        vnet("vnet-a", "10.1.0.0/16"),
        subnet("vnet-a", "web", "10.1.1.0/24"),
        subnet("vnet-a", "db", "10.1.2.0/24"),
        nsg("nsg-web"),
        nsg("nsg-db"),
    ];
    let hints = vec![
        RelationshipHint::new(vnet_id("vnet-a"), subnet_id("vnet-a", "web"), EdgeKind::Contains),
        RelationshipHint::new(vnet_id("vnet-a"), subnet_id("vnet-a", "db"), EdgeKind::Contains),
        RelationshipHint::new(subnet_id("vnet-a", "web"), nsg_id("nsg-web"), EdgeKind::SecuredBy),
        RelationshipHint::new(subnet_id("vnet-a", "db"), nsg_id("nsg-db"), EdgeKind::SecuredBy),
    ];
    build(nodes, hints)
}

/// nsg-web lets everything out; nsg-db gets the given rules.
fn create_test_rule_sets(db_rules: Vec<AccessRule>) -> RuleSets {
    let web = RuleSet::nsg(nsg_id("nsg-web")).with_rule(allow_all("allow-out", 100, Direction::Outbound));
    let mut db = RuleSet::nsg(nsg_id("nsg-db"));
    for rule in db_rules {
        db.insert_rule(rule);
    }
    RuleSets::new().with(web).with(db)
}

/// Two VNets without NSGs, optionally joined by a peering edge.
fn create_test_two_vnets(peering: Option<RelationshipHint>) -> NetworkGraph {
    let nodes = vec![
        vnet("vnet-a", "10.1.0.0/16"),
        subnet("vnet-a", "web", "10.1.1.0/24"),
        vnet("vnet-b", "10.2.0.0/16"),
        subnet("vnet-b", "app", "10.2.1.0/24"),
    ];
    let mut hints = vec![
        RelationshipHint::new(vnet_id("vnet-a"), subnet_id("vnet-a", "web"), EdgeKind::Contains),
        RelationshipHint::new(vnet_id("vnet-b"), subnet_id("vnet-b", "app"), EdgeKind::Contains),
    ];
    hints.extend(peering);
    build(nodes, hints)
}

fn peering(state: &str) -> RelationshipHint {
    RelationshipHint::new(vnet_id("vnet-a"), vnet_id("vnet-b"), EdgeKind::Peering).with_attribute("peering_state", state)
}

/// Hub with a firewall, and a spoke whose app subnet routes through it.
/// The spoke is not peered, so the route is the only way across.
fn create_test_forced_tunnel() -> NetworkGraph {
    let firewall = NetworkNode::new(id("azureFirewalls/fw-hub"), NodeType::Firewall, "fw-hub")
        .with_attribute("private_ips", vec!["10.0.1.4"]);
    let nodes = vec![
        vnet("vnet-hub", "10.0.0.0/16"),
        subnet("vnet-hub", "AzureFirewallSubnet", "10.0.1.0/26"),
        subnet("vnet-hub", "shared", "10.0.2.0/24"),
        firewall,
        NetworkNode::new(id("firewallPolicies/fwp-hub"), NodeType::FirewallPolicy, "fwp-hub"),
        NetworkNode::new(id("routeTables/rt-spoke"), NodeType::RouteTable, "rt-spoke"),
        vnet("vnet-spoke", "10.2.0.0/16"),
        subnet("vnet-spoke", "app", "10.2.1.0/24"),
    ];
    let hints = vec![
        RelationshipHint::new(vnet_id("vnet-hub"), subnet_id("vnet-hub", "AzureFirewallSubnet"), EdgeKind::Contains),
        RelationshipHint::new(vnet_id("vnet-hub"), subnet_id("vnet-hub", "shared"), EdgeKind::Contains),
        RelationshipHint::new(subnet_id("vnet-hub", "AzureFirewallSubnet"), id("azureFirewalls/fw-hub"), EdgeKind::Contains),
        RelationshipHint::new(id("azureFirewalls/fw-hub"), id("firewallPolicies/fwp-hub"), EdgeKind::SecuredBy),
        RelationshipHint::new(vnet_id("vnet-spoke"), subnet_id("vnet-spoke", "app"), EdgeKind::Contains),
        RelationshipHint::new(subnet_id("vnet-spoke", "app"), id("routeTables/rt-spoke"), EdgeKind::RoutesVia),
        RelationshipHint::to_private_ip(id("routeTables/rt-spoke"), "10.0.1.4", EdgeKind::RoutesVia),
    ];
    build(nodes, hints)
}

// ============================================================================
// Probe Tests
// ============================================================================

#[test]
fn test_standard_probe_set() {
    let probes = PortProbe::standard_set(&[22, 3389, 22]);
    let labels: Vec<String> = probes.iter().map(ToString::to_string).collect();
    assert_eq!(labels, vec!["TCP/22", "TCP/3389", "Any/*"]);
}

// ============================================================================
// Path Evaluation Tests
// ============================================================================

#[test]
fn test_evaluate_path_without_points_allows() {
    let tuple = TrafficTuple::new(
        Cidr::parse("10.1.1.0/24").unwrap(),
        Cidr::parse("10.1.2.0/24").unwrap(),
        Protocol::Tcp,
        Some(22),
        Direction::Outbound,
    );
    let decision = evaluate_path(&[], &tuple, None);
    assert_eq!(decision.action, Action::Allow);
    assert!(decision.rule.is_none());
}

#[test]
fn test_evaluate_path_is_conjunctive() {
    let outbound = RuleSet::nsg(nsg_id("nsg-a")).with_rule(allow_all("allow-out", 100, Direction::Outbound));
    let inbound_deny = RuleSet::nsg(nsg_id("nsg-b")).with_rule(deny_all("deny-in", 100, Direction::Inbound));
    let inbound_allow = RuleSet::nsg(nsg_id("nsg-c")).with_rule(allow_all("allow-in", 200, Direction::Inbound));
    let tuple = TrafficTuple::new(
        Cidr::parse("10.1.1.0/24").unwrap(),
        Cidr::parse("10.1.2.0/24").unwrap(),
        Protocol::Tcp,
        Some(443),
        Direction::Outbound,
    );

    let denied = evaluate_path(
        &[
            EnforcementPoint { rule_set: &outbound, direction: Direction::Outbound },
            EnforcementPoint { rule_set: &inbound_deny, direction: Direction::Inbound },
            EnforcementPoint { rule_set: &inbound_allow, direction: Direction::Inbound },
        ],
        &tuple,
        None,
    );
    assert_eq!(denied.action, Action::Deny);
    assert_eq!(denied.rule.unwrap().rule, "deny-in");

    let allowed = evaluate_path(
        &[
            EnforcementPoint { rule_set: &outbound, direction: Direction::Outbound },
            EnforcementPoint { rule_set: &inbound_allow, direction: Direction::Inbound },
        ],
        &tuple,
        None,
    );
    assert_eq!(allowed.action, Action::Allow);
    assert_eq!(allowed.rule.unwrap().rule, "allow-in");
}

// ============================================================================
// Endpoint Tests
// ============================================================================

#[test]
fn test_endpoint_address_preference() {
    let prefixed = NetworkNode::new(subnet_id("vnet-a", "web"), NodeType::Subnet, "web")
        .with_attribute("address_prefixes", vec!["not-a-prefix", "10.1.1.0/24"])
        .with_attribute("private_ips", vec!["10.1.1.4"]);
    assert_eq!(endpoint_address(&prefixed), Cidr::parse("10.1.1.0/24"));

    let vm = NetworkNode::new(id("virtualMachines/vm-web"), NodeType::VirtualMachine, "vm-web")
        .with_attribute("private_ips", vec!["10.1.1.4"]);
    assert_eq!(endpoint_address(&vm), Cidr::parse("10.1.1.4/32"));
    assert!(is_addressable(&vm));

    let bare = NetworkNode::new(subnet_id("vnet-a", "empty"), NodeType::Subnet, "empty");
    assert!(endpoint_address(&bare).is_none());
    assert!(!is_addressable(&bare));
}

#[test]
fn test_placeholders_and_nsgs_are_not_addressable() {
    let mut placeholder = NetworkNode::placeholder(&vnet_id("vnet-gone"));
    placeholder.node_type = NodeType::VirtualNetwork;
    placeholder.set_attribute("address_prefixes", vec!["10.9.0.0/16"]);
    assert!(!is_addressable(&placeholder));

    let security_group = nsg("nsg-web").with_attribute("address_prefixes", vec!["10.1.1.0/24"]);
    assert!(!is_addressable(&security_group));
}

#[test]
fn test_matrix_covers_ordered_pairs_of_addressable_nodes() {
    let graph = create_test_vnet_graph();
    let matrix = analyze(&graph, &create_test_rule_sets(Vec::new()), &config(&[22]));

    // vnet-a, web and db; the NSGs stay out
    assert_eq!(matrix.len(), 6);
    assert!(matrix.get(&nsg_id("nsg-web"), &subnet_id("vnet-a", "db")).is_none());
    assert!(matrix.get(&subnet_id("vnet-a", "web"), &subnet_id("vnet-a", "web")).is_none());
    assert_eq!(matrix.reachable_count(), 6);
}

#[test]
fn test_vm_with_private_ip_joins_the_matrix() {
    let mut nodes = vec![
        vnet("vnet-a", "10.1.0.0/16"),
        subnet("vnet-a", "web", "10.1.1.0/24"),
    ];
    nodes.push(
        NetworkNode::new(id("virtualMachines/vm-web"), NodeType::VirtualMachine, "vm-web")
            .with_attribute("private_ips", vec!["10.1.1.4"]),
    );
    let hints = vec![
        RelationshipHint::new(vnet_id("vnet-a"), subnet_id("vnet-a", "web"), EdgeKind::Contains),
        RelationshipHint::new(subnet_id("vnet-a", "web"), id("virtualMachines/vm-web"), EdgeKind::Contains),
    ];
    let graph = build(nodes, hints);

    let matrix = analyze(&graph, &RuleSets::new(), &config(&[22]));
    assert_eq!(matrix.len(), 6);
    let summary = matrix.get(&vnet_id("vnet-a"), &id("virtualMachines/vm-web")).unwrap();
    assert_eq!(summary.status, ConnectivityStatus::Allowed);
}

// ============================================================================
// Verdict Tests
// ============================================================================

#[test]
fn test_destination_nsg_denies_after_source_allows() {
    let graph = create_test_vnet_graph();
    let rule_sets = create_test_rule_sets(vec![deny_all("deny-all-in", 100, Direction::Inbound)]);
    let matrix = analyze(&graph, &rule_sets, &config(&[22, 3389]));

    let summary = matrix.get(&subnet_id("vnet-a", "web"), &subnet_id("vnet-a", "db")).unwrap();
    assert!(summary.reachable);
    assert_eq!(summary.status, ConnectivityStatus::Denied);
    assert_eq!(summary.verdicts.len(), 3);
    for verdict in &summary.verdicts {
        assert_eq!(verdict.verdict, Verdict::Denied);
        let rule = verdict.deciding_rule.as_ref().unwrap();
        assert_eq!(rule.rule, "deny-all-in");
        assert_eq!(rule.rule_set, nsg_id("nsg-db"));
    }
}

#[test]
fn test_allowed_when_every_point_allows() {
    let graph = create_test_vnet_graph();
    let rule_sets = create_test_rule_sets(vec![allow_all("allow-all-in", 100, Direction::Inbound)]);
    let matrix = analyze(&graph, &rule_sets, &config(&[22, 3389]));

    let summary = matrix.get(&subnet_id("vnet-a", "web"), &subnet_id("vnet-a", "db")).unwrap();
    assert_eq!(summary.status, ConnectivityStatus::Allowed);
    assert_eq!(summary.allowed_ports(), vec![22, 3389]);

    let rules = summary.deciding_rules();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].rule, "allow-all-in");
}

#[test]
fn test_conditional_when_some_ports_allowed() {
    let graph = create_test_vnet_graph();
    let rule_sets = create_test_rule_sets(vec![
        AccessRule::new("allow-ssh", 100, Direction::Inbound, Action::Allow)
            .with_protocol(Protocol::Tcp)
            .with_source(&["*"])
            .with_destination(&["*"])
            .with_destination_ports(&["22"]),
    ]);
    let matrix = analyze(&graph, &rule_sets, &config(&[22, 3389]));

    let summary = matrix.get(&subnet_id("vnet-a", "web"), &subnet_id("vnet-a", "db")).unwrap();
    assert_eq!(summary.status, ConnectivityStatus::Conditional);
    assert_eq!(summary.verdict(&PortProbe::tcp(22)), Some(Verdict::Allowed));
    assert_eq!(summary.verdict(&PortProbe::tcp(3389)), Some(Verdict::Denied));
    assert_eq!(summary.verdict(&PortProbe::any()), Some(Verdict::Denied));
    assert_eq!(summary.allowed_ports(), vec![22]);
}

#[test]
fn test_source_nsg_default_denies_outbound() {
    let graph = create_test_vnet_graph();
    let rule_sets = RuleSets::new()
        .with(RuleSet::nsg(nsg_id("nsg-web")))
        .with(RuleSet::nsg(nsg_id("nsg-db")).with_rule(allow_all("allow-all-in", 100, Direction::Inbound)));
    let matrix = analyze(&graph, &rule_sets, &config(&[22]));

    let summary = matrix.get(&subnet_id("vnet-a", "web"), &subnet_id("vnet-a", "db")).unwrap();
    assert_eq!(summary.status, ConnectivityStatus::Denied);
    assert!(summary.verdicts.iter().all(|v| v.deciding_rule.is_none()));

    // The reverse direction passes nsg-db outbound (default deny) as well
    let reverse = matrix.get(&subnet_id("vnet-a", "db"), &subnet_id("vnet-a", "web")).unwrap();
    assert_eq!(reverse.status, ConnectivityStatus::Denied);
}

#[test]
fn test_virtual_network_tag_covers_vnet_space() {
    let graph = create_test_vnet_graph();
    let rule_sets = create_test_rule_sets(vec![
        AccessRule::new("allow-vnet-in", 100, Direction::Inbound, Action::Allow)
            .with_source(&["VirtualNetwork"])
            .with_destination(&["VirtualNetwork"])
            .with_destination_ports(&["*"]),
    ]);

    let matrix = analyze(&graph, &rule_sets, &config(&[22]));
    let summary = matrix.get(&subnet_id("vnet-a", "web"), &subnet_id("vnet-a", "db")).unwrap();
    assert_eq!(summary.status, ConnectivityStatus::Allowed);

    // A configured tag replaces the derived one
    let mut service_tags = BTreeMap::new();
    service_tags.insert("VirtualNetwork".to_string(), vec!["192.168.0.0/16".to_string()]);
    let custom = AnalysisConfig {
        service_tags,
        ..config(&[22])
    };
    let matrix = analyze(&graph, &rule_sets, &custom);
    let summary = matrix.get(&subnet_id("vnet-a", "web"), &subnet_id("vnet-a", "db")).unwrap();
    assert_eq!(summary.status, ConnectivityStatus::Denied);
}

// ============================================================================
// Reachability Tests
// ============================================================================

#[test]
fn test_unpeered_vnets_have_no_path() {
    let graph = create_test_two_vnets(None);
    let matrix = analyze(&graph, &RuleSets::new(), &config(&[22]));

    assert_eq!(matrix.len(), 12);
    let summary = matrix.get(&subnet_id("vnet-a", "web"), &subnet_id("vnet-b", "app")).unwrap();
    assert!(!summary.reachable);
    assert_eq!(summary.status, ConnectivityStatus::NoPath);
    assert_eq!(summary.paths_considered, 0);
    assert!(summary.verdicts.iter().all(|v| v.verdict == Verdict::NoPath));

    assert_eq!(matrix.count_status(ConnectivityStatus::NoPath), 8);
    assert_eq!(matrix.count_status(ConnectivityStatus::Allowed), 4);
}

#[test]
fn test_connected_peering_joins_vnets() {
    let graph = create_test_two_vnets(Some(peering("Connected")));
    let matrix = analyze(&graph, &RuleSets::new(), &config(&[22]));

    let forward = matrix.get(&subnet_id("vnet-a", "web"), &subnet_id("vnet-b", "app")).unwrap();
    assert!(forward.reachable);
    assert_eq!(forward.status, ConnectivityStatus::Allowed);

    // A peering edge carries traffic both ways
    let reverse = matrix.get(&subnet_id("vnet-b", "app"), &subnet_id("vnet-a", "web")).unwrap();
    assert!(reverse.reachable);
    assert_eq!(matrix.count_status(ConnectivityStatus::NoPath), 0);
}

#[test]
fn test_inactive_peering_carries_no_traffic() {
    let disconnected = create_test_two_vnets(Some(peering("Disconnected")));
    let matrix = analyze(&disconnected, &RuleSets::new(), &config(&[22]));
    let summary = matrix.get(&subnet_id("vnet-a", "web"), &subnet_id("vnet-b", "app")).unwrap();
    assert_eq!(summary.status, ConnectivityStatus::NoPath);

    let no_access = create_test_two_vnets(Some(peering("Connected").with_attribute("allow_virtual_network_access", false)));
    let matrix = analyze(&no_access, &RuleSets::new(), &config(&[22]));
    let summary = matrix.get(&subnet_id("vnet-a", "web"), &subnet_id("vnet-b", "app")).unwrap();
    assert_eq!(summary.status, ConnectivityStatus::NoPath);
}

#[test]
fn test_path_depth_bound() {
    let graph = create_test_vnet_graph();
    let rule_sets = create_test_rule_sets(vec![allow_all("allow-all-in", 100, Direction::Inbound)]);
    let shallow = AnalysisConfig {
        max_path_depth: 1,
        ..config(&[22])
    };
    let matrix = analyze(&graph, &rule_sets, &shallow);

    // web -> vnet -> db needs two hops
    let summary = matrix.get(&subnet_id("vnet-a", "web"), &subnet_id("vnet-a", "db")).unwrap();
    assert_eq!(summary.status, ConnectivityStatus::NoPath);

    let direct = matrix.get(&vnet_id("vnet-a"), &subnet_id("vnet-a", "db")).unwrap();
    assert!(direct.reachable);
}

#[test]
fn test_routes_are_one_way() {
    let graph = create_test_forced_tunnel();
    let matrix = analyze(&graph, &RuleSets::new(), &config(&[22]));

    let out = matrix.get(&subnet_id("vnet-spoke", "app"), &subnet_id("vnet-hub", "shared")).unwrap();
    assert!(out.reachable);
    let back = matrix.get(&subnet_id("vnet-hub", "shared"), &subnet_id("vnet-spoke", "app")).unwrap();
    assert!(!back.reachable);
    assert_eq!(back.status, ConnectivityStatus::NoPath);
}

#[test]
fn test_firewall_policy_on_routed_path() {
    let graph = create_test_forced_tunnel();
    let policy = RuleSet::firewall_policy(id("firewallPolicies/fwp-hub"), Action::Deny).with_rule(
        AccessRule::new("allow-ssh", 100, Direction::Outbound, Action::Allow)
            .with_protocol(Protocol::Tcp)
            .with_source(&["10.2.0.0/16"])
            .with_destination(&["10.0.0.0/16"])
            .with_destination_ports(&["22"]),
    );
    let matrix = analyze(&graph, &RuleSets::new().with(policy), &config(&[22, 3389]));

    let summary = matrix.get(&subnet_id("vnet-spoke", "app"), &subnet_id("vnet-hub", "shared")).unwrap();
    assert_eq!(summary.status, ConnectivityStatus::Conditional);
    assert_eq!(summary.verdict(&PortProbe::tcp(22)), Some(Verdict::Allowed));
    assert_eq!(summary.verdict(&PortProbe::tcp(3389)), Some(Verdict::Denied));
    assert_eq!(summary.deciding_rules()[0].rule, "allow-ssh");
}

#[test]
fn test_any_allowing_path_allows_the_pair() {
    // web routes through a denying firewall, but also reaches db directly
    let firewall = NetworkNode::new(id("azureFirewalls/fw-a"), NodeType::Firewall, "fw-a")
        .with_attribute("private_ips", vec!["10.1.0.4"]);
    let nodes = vec![
        vnet("vnet-a", "10.1.0.0/16"),
        subnet("vnet-a", "AzureFirewallSubnet", "10.1.0.0/26"),
        subnet("vnet-a", "web", "10.1.1.0/24"),
        subnet("vnet-a", "db", "10.1.2.0/24"),
        firewall,
        NetworkNode::new(id("firewallPolicies/fwp-a"), NodeType::FirewallPolicy, "fwp-a"),
        NetworkNode::new(id("routeTables/rt-web"), NodeType::RouteTable, "rt-web"),
    ];
    let hints = vec![
        RelationshipHint::new(vnet_id("vnet-a"), subnet_id("vnet-a", "AzureFirewallSubnet"), EdgeKind::Contains),
        RelationshipHint::new(vnet_id("vnet-a"), subnet_id("vnet-a", "web"), EdgeKind::Contains),
        RelationshipHint::new(vnet_id("vnet-a"), subnet_id("vnet-a", "db"), EdgeKind::Contains),
        RelationshipHint::new(subnet_id("vnet-a", "AzureFirewallSubnet"), id("azureFirewalls/fw-a"), EdgeKind::Contains),
        RelationshipHint::new(id("azureFirewalls/fw-a"), id("firewallPolicies/fwp-a"), EdgeKind::SecuredBy),
        RelationshipHint::new(subnet_id("vnet-a", "web"), id("routeTables/rt-web"), EdgeKind::RoutesVia),
        RelationshipHint::to_private_ip(id("routeTables/rt-web"), "10.1.0.4", EdgeKind::RoutesVia),
    ];
    let graph = build(nodes, hints);
    let rule_sets = RuleSets::new().with(RuleSet::firewall_policy(id("firewallPolicies/fwp-a"), Action::Deny));

    let matrix = analyze(&graph, &rule_sets, &config(&[22]));
    let summary = matrix.get(&subnet_id("vnet-a", "web"), &subnet_id("vnet-a", "db")).unwrap();
    assert!(summary.paths_considered >= 2);
    assert_eq!(summary.status, ConnectivityStatus::Allowed);
}

// ============================================================================
// Serialization Tests
// ============================================================================

#[test]
fn test_matrix_serializes_as_list() {
    let graph = create_test_two_vnets(None);
    let matrix = analyze(&graph, &RuleSets::new(), &config(&[22]));

    let value = serde_json::to_value(&matrix).unwrap();
    let entries = value.as_array().unwrap();
    assert_eq!(entries.len(), matrix.len());
    assert!(entries[0].get("status").is_some());
    assert!(entries[0].get("verdicts").unwrap().is_array());
}

// Tests for rule parsing and first-match evaluation

use serde_json::json;
use vnetscope_core::cidr::Cidr;
use vnetscope_core::data::DiagnosticKind;
use vnetscope_core::rules::{
    AccessRule, Action, AddressEntry, Direction, PortSpec, Protocol, RuleSet, RuleSetKind,
    ServiceTagTable, TrafficTuple, evaluate,
};
use vnetscope_inventory::record::{FirewallPolicyRecord, NsgRecord};

const NSG_ID: &str =
    "/subscriptions/xxx/resourceGroups/rg-net/providers/Microsoft.Network/networkSecurityGroups/nsg-web";
const POLICY_ID: &str =
    "/subscriptions/xxx/resourceGroups/rg-net/providers/Microsoft.Network/firewallPolicies/fwp-hub";

fn cidr(value: &str) -> Cidr {
    Cidr::parse(value).unwrap()
}

fn create_test_tuple(source: &str, destination: &str, protocol: Protocol, port: Option<u16>, direction: Direction) -> TrafficTuple {
    TrafficTuple::new(cidr(source), cidr(destination), protocol, port, direction)
}

fn inbound_tcp(port: u16) -> TrafficTuple {
    create_test_tuple("203.0.113.0/24", "10.1.1.0/24", Protocol::Tcp, Some(port), Direction::Inbound)
}

/// The six rules Azure attaches to every NSG.
fn azure_default_rules() -> serde_json::Value {
    json!([
        {"name": "AllowVnetInBound", "priority": 65000, "direction": "Inbound", "access": "Allow", "protocol": "*",
         "sourceAddressPrefix": "VirtualNetwork", "sourcePortRange": "*",
         "destinationAddressPrefix": "VirtualNetwork", "destinationPortRange": "*"},
        {"name": "AllowAzureLoadBalancerInBound", "priority": 65001, "direction": "Inbound", "access": "Allow",
         "protocol": "*", "sourceAddressPrefix": "AzureLoadBalancer", "sourcePortRange": "*",
         "destinationAddressPrefix": "*", "destinationPortRange": "*"},
        {"name": "DenyAllInBound", "priority": 65500, "direction": "Inbound", "access": "Deny", "protocol": "*",
         "sourceAddressPrefix": "*", "sourcePortRange": "*",
         "destinationAddressPrefix": "*", "destinationPortRange": "*"},
        {"name": "AllowVnetOutBound", "priority": 65000, "direction": "Outbound", "access": "Allow", "protocol": "*",
         "sourceAddressPrefix": "VirtualNetwork", "sourcePortRange": "*",
         "destinationAddressPrefix": "VirtualNetwork", "destinationPortRange": "*"},
        {"name": "AllowInternetOutBound", "priority": 65001, "direction": "Outbound", "access": "Allow",
         "protocol": "*", "sourceAddressPrefix": "*", "sourcePortRange": "*",
         "destinationAddressPrefix": "Internet", "destinationPortRange": "*"},
        {"name": "DenyAllOutBound", "priority": 65500, "direction": "Outbound", "access": "Deny", "protocol": "*",
         "sourceAddressPrefix": "*", "sourcePortRange": "*",
         "destinationAddressPrefix": "*", "destinationPortRange": "*"}
    ])
}

fn create_test_rule(name: &str, priority: u64, direction: Direction, action: Action) -> AccessRule {
    AccessRule::new(name, priority, direction, action)
        .with_source(&["*"])
        .with_destination(&["*"])
        .with_destination_ports(&["*"])
}

// ============================================================================
// Default Action Tests
// ============================================================================

#[test]
fn test_empty_nsg_denies_everything() {
    let rule_set = RuleSet::nsg(NSG_ID);
    let tuples = vec![
        inbound_tcp(22),
        inbound_tcp(443),
        create_test_tuple("10.0.0.0/8", "10.1.1.4", Protocol::Udp, Some(53), Direction::Outbound),
        create_test_tuple("0.0.0.0/0", "10.1.1.0/24", Protocol::Any, None, Direction::Inbound),
    ];

    for tuple in tuples {
        let decision = evaluate(&rule_set, &tuple, None);
        assert_eq!(decision.action, Action::Deny);
        assert!(decision.rule.is_none());
    }
}

#[test]
fn test_firewall_policy_default_action_when_no_match() {
    for default in [Action::Allow, Action::Deny] {
        let rule_set = RuleSet::firewall_policy(POLICY_ID, default).with_rule(
            AccessRule::new("only-dns", 100, Direction::Outbound, Action::Allow)
                .with_protocol(Protocol::Udp)
                .with_source(&["10.0.0.0/8"])
                .with_destination(&["168.63.129.16"])
                .with_destination_ports(&["53"]),
        );

        let decision = evaluate(&rule_set, &inbound_tcp(8080).with_direction(Direction::Outbound), None);
        assert_eq!(decision.action, default);
        assert!(decision.rule.is_none());
    }
}

// ============================================================================
// First Match Tests
// ============================================================================

#[test]
fn test_lower_priority_number_wins() {
    // Inserted out of order on purpose
    let rule_set = RuleSet::nsg(NSG_ID)
        .with_rule(create_test_rule("allow-all", 200, Direction::Inbound, Action::Allow))
        .with_rule(create_test_rule("deny-all", 100, Direction::Inbound, Action::Deny));

    assert_eq!(rule_set.rules()[0].name, "deny-all");
    for port in [22, 80, 3389] {
        let decision = evaluate(&rule_set, &inbound_tcp(port), None);
        assert_eq!(decision.action, Action::Deny);
        let rule = decision.rule.unwrap();
        assert_eq!(rule.rule, "deny-all");
        assert_eq!(rule.priority, 100);
        assert_eq!(rule.rule_set, NSG_ID);
    }
}

#[test]
fn test_specific_allow_before_general_deny() {
    let rule_set = RuleSet::nsg(NSG_ID)
        .with_rule(
            AccessRule::new("allow-https", 100, Direction::Inbound, Action::Allow)
                .with_protocol(Protocol::Tcp)
                .with_source(&["*"])
                .with_destination(&["10.1.1.0/24"])
                .with_destination_ports(&["443"]),
        )
        .with_rule(create_test_rule("deny-all", 4096, Direction::Inbound, Action::Deny));

    assert!(evaluate(&rule_set, &inbound_tcp(443), None).is_allowed());
    assert!(!evaluate(&rule_set, &inbound_tcp(22), None).is_allowed());
}

#[test]
fn test_direction_filters_rules() {
    let rule_set = RuleSet::nsg(NSG_ID).with_rule(create_test_rule("allow-out", 100, Direction::Outbound, Action::Allow));

    assert_eq!(evaluate(&rule_set, &inbound_tcp(22), None).action, Action::Deny);
    assert_eq!(
        evaluate(&rule_set, &inbound_tcp(22).with_direction(Direction::Outbound), None).action,
        Action::Allow
    );
}

#[test]
fn test_cidr_containment_matching() {
    let rule_set = RuleSet::nsg(NSG_ID).with_rule(
        AccessRule::new("allow-from-corp", 100, Direction::Inbound, Action::Allow)
            .with_source(&["203.0.113.0/24"])
            .with_destination(&["10.1.0.0/16"])
            .with_destination_ports(&["22"]),
    );

    assert!(evaluate(&rule_set, &inbound_tcp(22), None).is_allowed());

    // Wider source than the rule covers
    let wide = create_test_tuple("203.0.0.0/16", "10.1.1.0/24", Protocol::Tcp, Some(22), Direction::Inbound);
    assert!(!evaluate(&rule_set, &wide, None).is_allowed());
}

#[test]
fn test_port_range_matching() {
    let rule_set = RuleSet::nsg(NSG_ID).with_rule(
        AccessRule::new("allow-high", 100, Direction::Inbound, Action::Allow)
            .with_source(&["*"])
            .with_destination(&["*"])
            .with_destination_ports(&["8000-8100", "443"]),
    );

    assert!(evaluate(&rule_set, &inbound_tcp(8000), None).is_allowed());
    assert!(evaluate(&rule_set, &inbound_tcp(8100), None).is_allowed());
    assert!(evaluate(&rule_set, &inbound_tcp(443), None).is_allowed());
    assert!(!evaluate(&rule_set, &inbound_tcp(8101), None).is_allowed());

    // An "every port" probe needs a rule covering every port
    let any_port = create_test_tuple("1.2.3.4", "10.1.1.4", Protocol::Tcp, None, Direction::Inbound);
    assert!(!evaluate(&rule_set, &any_port, None).is_allowed());
}

#[test]
fn test_protocol_matching() {
    let tcp_only = AccessRule::new("tcp", 100, Direction::Inbound, Action::Allow)
        .with_protocol(Protocol::Tcp)
        .with_source(&["*"])
        .with_destination(&["*"])
        .with_destination_ports(&["*"]);
    let rule_set = RuleSet::nsg(NSG_ID).with_rule(tcp_only);

    assert!(evaluate(&rule_set, &inbound_tcp(53), None).is_allowed());
    let udp = create_test_tuple("1.2.3.4", "10.1.1.4", Protocol::Udp, Some(53), Direction::Inbound);
    assert!(!evaluate(&rule_set, &udp, None).is_allowed());
    let any = create_test_tuple("1.2.3.4", "10.1.1.4", Protocol::Any, None, Direction::Inbound);
    assert!(!evaluate(&rule_set, &any, None).is_allowed());

    assert!(Protocol::Any.matches(&Protocol::Udp));
    assert!(Protocol::Https.matches(&Protocol::Tcp));
    assert!(!Protocol::Udp.matches(&Protocol::Tcp));
}

// ============================================================================
// Service Tag Tests
// ============================================================================

#[test]
fn test_service_tag_without_table_never_matches() {
    let rule_set = RuleSet::nsg(NSG_ID).with_rule(
        AccessRule::new("allow-lb", 100, Direction::Inbound, Action::Allow)
            .with_source(&["AzureLoadBalancer"])
            .with_destination(&["*"])
            .with_destination_ports(&["*"]),
    );
    let tuple = create_test_tuple("168.63.129.16", "10.1.1.4", Protocol::Tcp, Some(80), Direction::Inbound);

    assert!(!evaluate(&rule_set, &tuple, None).is_allowed());
    assert!(!evaluate(&rule_set, &tuple, Some(&ServiceTagTable::new())).is_allowed());

    let tags = ServiceTagTable::new().with_tag("azureloadbalancer", &["168.63.129.16/32"]);
    assert!(evaluate(&rule_set, &tuple, Some(&tags)).is_allowed());
}

#[test]
fn test_address_entry_parsing() {
    assert_eq!(AddressEntry::parse("*"), Some(AddressEntry::Any));
    assert_eq!(AddressEntry::parse("0.0.0.0/0"), Some(AddressEntry::Any));
    assert_eq!(AddressEntry::parse("10.0.0.0/8"), Some(AddressEntry::Cidr(cidr("10.0.0.0/8"))));
    assert_eq!(
        AddressEntry::parse("Internet"),
        Some(AddressEntry::ServiceTag("Internet".to_string()))
    );
    assert_eq!(AddressEntry::parse("  "), None);
    assert!(AddressEntry::parse("Internet").unwrap().is_internet());
    assert!(!AddressEntry::parse("VirtualNetwork").unwrap().is_internet());
}

#[test]
fn test_port_spec_covers_all() {
    assert!(PortSpec::Any.covers_all());
    assert!(PortSpec::parse(["0-65535"]).covers_all());
    assert!(PortSpec::parse(["0-1000", "1001-65535"]).covers_all());
    assert!(!PortSpec::parse(["1-65535"]).covers_all());
    assert!(PortSpec::parse(["*"]) == PortSpec::Any);
    assert!(PortSpec::parse(Vec::<&str>::new()).is_empty());
    assert_eq!(PortSpec::parse(["20-25"]).exposed(&[22, 23, 80]), vec![22, 23]);
}

// ============================================================================
// Rule Set Construction Tests
// ============================================================================

#[test]
fn test_insert_rejects_unspecified_rule() {
    let mut rule_set = RuleSet::nsg(NSG_ID);
    let diagnostic = rule_set
        .insert_rule(AccessRule::new("empty", 100, Direction::Inbound, Action::Allow))
        .unwrap();

    assert_eq!(diagnostic.kind, DiagnosticKind::RuleConfiguration);
    assert!(rule_set.is_empty());
}

#[test]
fn test_insert_duplicate_priority() {
    let mut rule_set = RuleSet::nsg(NSG_ID);
    assert!(rule_set.insert_rule(create_test_rule("first", 100, Direction::Inbound, Action::Allow)).is_none());

    let duplicate = rule_set
        .insert_rule(create_test_rule("second", 100, Direction::Inbound, Action::Deny))
        .unwrap();
    assert_eq!(duplicate.kind, DiagnosticKind::DuplicatePriority);

    // Same priority in the other direction is fine
    assert!(rule_set.insert_rule(create_test_rule("outbound", 100, Direction::Outbound, Action::Deny)).is_none());

    // An exact repeat is ignored silently
    assert!(rule_set.insert_rule(create_test_rule("first", 100, Direction::Inbound, Action::Allow)).is_none());

    assert_eq!(rule_set.len(), 2);
    assert_eq!(evaluate(&rule_set, &inbound_tcp(22), None).action, Action::Allow);
}

#[test]
fn test_from_nsg_record() {
    let record: NsgRecord = serde_json::from_value(json!({
        "id": NSG_ID,
        "name": "nsg-web",
        "securityRules": [
            {"name": "allow-ssh", "priority": 100, "direction": "Inbound", "access": "Allow", "protocol": "Tcp",
             "sourceAddressPrefix": "Internet", "sourcePortRange": "*",
             "destinationAddressPrefix": "*", "destinationPortRange": "22"},
            {"name": "allow-web", "priority": 110, "direction": "Inbound", "access": "Allow", "protocol": "Tcp",
             "sourceAddressPrefixes": ["203.0.113.0/24", "198.51.100.0/24"],
             "destinationAddressPrefix": "10.1.1.0/24", "destinationPortRanges": ["80", "443"]},
            {"name": "no-priority", "direction": "Inbound", "access": "Allow"}
        ],
        "defaultSecurityRules": [
            {"name": "DenyAllInBound", "priority": 65500, "direction": "Inbound", "access": "Deny", "protocol": "*",
             "sourceAddressPrefix": "*", "destinationAddressPrefix": "*", "destinationPortRange": "*"}
        ]
    }))
    .unwrap();

    let (rule_set, diagnostics) = RuleSet::from_nsg(&record);
    assert_eq!(rule_set.kind, RuleSetKind::NetworkSecurityGroup);
    assert_eq!(rule_set.default_action, Action::Deny);
    assert_eq!(rule_set.name, "nsg-web");
    assert_eq!(rule_set.len(), 2);
    assert_eq!(rule_set.default_rules().len(), 1);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::RuleConfiguration);

    let web = &rule_set.rules()[1];
    assert_eq!(web.name, "allow-web");
    assert_eq!(web.source.len(), 2);
    assert_eq!(web.destination_ports, PortSpec::ports(&[80, 443]));
    assert!(rule_set.rules()[0].source_is_internet());
    assert!(!rule_set.rules()[0].source_is_any());
}

#[test]
fn test_from_nsg_keeps_azure_defaults_apart() {
    let record: NsgRecord = serde_json::from_value(json!({
        "id": NSG_ID,
        "securityRules": [
            {"name": "deny-ssh", "priority": 100, "direction": "Inbound", "access": "Deny", "protocol": "Tcp",
             "sourceAddressPrefix": "*", "destinationAddressPrefix": "*", "destinationPortRange": "22"}
        ],
        "defaultSecurityRules": azure_default_rules()
    }))
    .unwrap();

    let (rule_set, diagnostics) = RuleSet::from_nsg(&record);
    assert!(diagnostics.is_empty());
    assert_eq!(rule_set.len(), 1);
    assert_eq!(rule_set.default_rules().len(), 6);
    assert_eq!(rule_set.effective_rules().count(), 7);

    let tags = ServiceTagTable::new().with_tag("VirtualNetwork", &["10.0.0.0/8"]);

    // Explicit rules win over the defaults
    let ssh = create_test_tuple("10.2.0.4", "10.1.1.4", Protocol::Tcp, Some(22), Direction::Inbound);
    let decision = evaluate(&rule_set, &ssh, Some(&tags));
    assert_eq!(decision.action, Action::Deny);
    assert_eq!(decision.rule.unwrap().rule, "deny-ssh");

    let https = create_test_tuple("10.2.0.4", "10.1.1.4", Protocol::Tcp, Some(443), Direction::Inbound);
    let decision = evaluate(&rule_set, &https, Some(&tags));
    assert_eq!(decision.action, Action::Allow);
    assert_eq!(decision.rule.unwrap().rule, "AllowVnetInBound");

    let decision = evaluate(&rule_set, &inbound_tcp(443), Some(&tags));
    assert_eq!(decision.action, Action::Deny);
    assert_eq!(decision.rule.unwrap().rule, "DenyAllInBound");
}

#[test]
fn test_from_nsg_missing_specifier_means_any() {
    let record: NsgRecord = serde_json::from_value(json!({
        "id": NSG_ID,
        "securityRules": [
            {"name": "ssh-no-destination", "priority": 100, "direction": "Inbound", "access": "Allow",
             "protocol": "Tcp", "sourceAddressPrefix": "*", "destinationPortRange": "22"},
            {"name": "web-empty-source", "priority": 110, "direction": "Inbound", "access": "Allow",
             "protocol": "Tcp", "sourceAddressPrefix": "", "sourceAddressPrefixes": [],
             "destinationAddressPrefix": "10.1.1.0/24", "destinationPortRange": "443"}
        ]
    }))
    .unwrap();

    let (rule_set, diagnostics) = RuleSet::from_nsg(&record);
    assert!(diagnostics.is_empty());
    assert_eq!(rule_set.len(), 2);
    assert_eq!(rule_set.rules()[0].destination, vec![AddressEntry::Any]);
    assert_eq!(rule_set.rules()[1].source, vec![AddressEntry::Any]);

    let decision = evaluate(&rule_set, &inbound_tcp(22), None);
    assert_eq!(decision.action, Action::Allow);
    assert_eq!(decision.rule.unwrap().rule, "ssh-no-destination");
    assert!(evaluate(&rule_set, &inbound_tcp(443), None).is_allowed());
}

#[test]
fn test_from_nsg_rule_without_specifiers_is_reported() {
    let record: NsgRecord = serde_json::from_value(json!({
        "id": NSG_ID,
        "securityRules": [
            {"name": "bare", "priority": 100, "direction": "Inbound", "access": "Allow", "protocol": "Tcp"},
            {"name": "bad-ports", "priority": 110, "direction": "Inbound", "access": "Allow", "protocol": "Tcp",
             "sourceAddressPrefix": "*", "destinationAddressPrefix": "*", "destinationPortRange": "ssh"}
        ]
    }))
    .unwrap();

    let (rule_set, diagnostics) = RuleSet::from_nsg(&record);
    assert!(rule_set.is_empty());
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics.iter().all(|d| d.kind == DiagnosticKind::RuleConfiguration));
    assert!(diagnostics[0].message.contains("bare"));
    assert!(diagnostics[1].message.contains("bad-ports"));
}

#[test]
fn test_from_nsg_custom_rules_repeat_security_rules() {
    let rule = json!({"name": "allow-rdp", "priority": 100, "direction": "Inbound", "access": "Allow",
                      "protocol": "Tcp", "sourceAddressPrefix": "*", "destinationAddressPrefix": "*",
                      "destinationPortRange": "3389"});
    let record: NsgRecord = serde_json::from_value(json!({
        "id": NSG_ID,
        "securityRules": [rule.clone()],
        "customRules": [rule]
    }))
    .unwrap();

    let (rule_set, diagnostics) = RuleSet::from_nsg(&record);
    assert_eq!(rule_set.len(), 1);
    assert!(diagnostics.is_empty());
}

#[test]
fn test_from_firewall_policy_record() {
    let record: FirewallPolicyRecord = serde_json::from_value(json!({
        "id": POLICY_ID,
        "name": "fwp-hub",
        "ruleCollectionGroups": [{
            "name": "DefaultNetworkRuleCollectionGroup",
            "priority": 200,
            "ruleCollections": [{
                "name": "allow-dns",
                "priority": 100,
                "action": {"type": "Allow"},
                "rules": [{
                    "name": "dns",
                    "ruleType": "NetworkRule",
                    "ipProtocols": ["TCP", "UDP"],
                    "sourceAddresses": ["10.0.0.0/8"],
                    "destinationAddresses": ["168.63.129.16"],
                    "destinationPorts": ["53"]
                }]
            }, {
                "name": "block-smb",
                "priority": 50,
                "action": "Deny",
                "rules": [{
                    "name": "smb",
                    "ruleType": "NetworkRule",
                    "ipProtocols": ["TCP"],
                    "sourceAddresses": ["*"],
                    "destinationAddresses": ["*"],
                    "destinationPorts": ["445"]
                }]
            }]
        }, {
            "name": "DefaultApplicationRuleCollectionGroup",
            "priority": 300,
            "ruleCollections": [{
                "name": "allow-web",
                "priority": 100,
                "action": {"type": "Allow"},
                "rules": [{
                    "name": "microsoft",
                    "ruleType": "ApplicationRule",
                    "sourceAddresses": ["10.0.0.0/8"],
                    "targetFqdns": ["*.microsoft.com"],
                    "protocols": [{"protocolType": "Https"}]
                }]
            }]
        }, {
            "name": "DefaultDnatRuleCollectionGroup",
            "priority": 100,
            "ruleCollections": [{
                "name": "inbound-web",
                "priority": 100,
                "action": {"type": "DNAT"},
                "rules": [{
                    "name": "web",
                    "ruleType": "NatRule",
                    "ipProtocols": ["TCP"],
                    "sourceAddresses": ["*"],
                    "destinationAddresses": ["20.1.2.3"],
                    "destinationPorts": ["443"]
                }]
            }]
        }]
    }))
    .unwrap();

    let (rule_set, diagnostics) = RuleSet::from_firewall_policy(&record, Action::Deny);
    assert!(diagnostics.is_empty());
    assert_eq!(rule_set.kind, RuleSetKind::FirewallPolicy);
    assert_eq!(rule_set.default_action, Action::Deny);

    let names: Vec<&str> = rule_set.rules().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["web", "smb", "dns", "dns", "microsoft"]);

    let dnat = &rule_set.rules()[0];
    assert_eq!(dnat.direction, Direction::Inbound);
    assert_eq!(dnat.action, Action::Allow);

    let protocols: Vec<&Protocol> = rule_set.rules()[2..4].iter().map(|r| &r.protocol).collect();
    assert_eq!(protocols, vec![&Protocol::Tcp, &Protocol::Udp]);

    let app = &rule_set.rules()[4];
    assert_eq!(app.protocol, Protocol::Https);
    assert_eq!(app.destination_ports, PortSpec::ports(&[443]));
    assert_eq!(app.destination, vec![AddressEntry::Fqdn("*.microsoft.com".to_string())]);

    // SMB is blocked before anything else outbound
    let smb = create_test_tuple("10.1.1.4", "10.2.1.4", Protocol::Tcp, Some(445), Direction::Outbound);
    assert_eq!(evaluate(&rule_set, &smb, None).action, Action::Deny);
    let dns = create_test_tuple("10.1.1.4", "168.63.129.16", Protocol::Udp, Some(53), Direction::Outbound);
    assert_eq!(evaluate(&rule_set, &dns, None).action, Action::Allow);
}

#[test]
fn test_from_firewall_policy_dnat_targets_translated_backend() {
    let record: FirewallPolicyRecord = serde_json::from_value(json!({
        "id": POLICY_ID,
        "ruleCollectionGroups": [{
            "name": "DefaultDnatRuleCollectionGroup",
            "priority": 100,
            "ruleCollections": [{
                "name": "publish-web",
                "priority": 100,
                "ruleCollectionType": "FirewallPolicyNatRuleCollection",
                "action": {"type": "Dnat"},
                "rules": [{
                    "name": "web",
                    "ruleType": "NatRule",
                    "ipProtocols": ["TCP"],
                    "sourceAddresses": ["*"],
                    "destinationAddresses": ["20.1.2.3"],
                    "destinationPorts": ["443"],
                    "translatedAddress": "10.1.1.4",
                    "translatedPort": "8443"
                }, {
                    "name": "ssh",
                    "ruleType": "NatRule",
                    "ipProtocols": ["TCP"],
                    "sourceAddresses": ["203.0.113.10"],
                    "destinationAddresses": ["20.1.2.3"],
                    "destinationPorts": ["2222"],
                    "translatedAddress": "10.1.2.5",
                    "translatedPort": 22
                }]
            }]
        }]
    }))
    .unwrap();

    let (rule_set, diagnostics) = RuleSet::from_firewall_policy(&record, Action::Deny);
    assert!(diagnostics.is_empty());
    assert_eq!(rule_set.len(), 2);

    let web = &rule_set.rules()[0];
    assert_eq!(web.direction, Direction::Inbound);
    assert_eq!(web.action, Action::Allow);
    assert_eq!(web.destination, vec![AddressEntry::Cidr(cidr("10.1.1.4"))]);
    assert_eq!(web.destination_ports, PortSpec::ports(&[8443]));
    assert_eq!(rule_set.rules()[1].destination_ports, PortSpec::ports(&[22]));

    let to_backend = create_test_tuple("198.51.100.7", "10.1.1.4", Protocol::Tcp, Some(8443), Direction::Inbound);
    assert!(evaluate(&rule_set, &to_backend, None).is_allowed());
    let to_frontend = create_test_tuple("198.51.100.7", "20.1.2.3", Protocol::Tcp, Some(443), Direction::Inbound);
    assert_eq!(evaluate(&rule_set, &to_frontend, None).action, Action::Deny);
}

#[test]
fn test_from_firewall_policy_many_protocols_keep_their_order() {
    let protocols: Vec<serde_json::Value> = (0..20u16)
        .map(|i| json!({"protocolType": "Https", "port": 8000 + i}))
        .collect();
    let record: FirewallPolicyRecord = serde_json::from_value(json!({
        "id": POLICY_ID,
        "ruleCollectionGroups": [{
            "name": "apps",
            "priority": 300,
            "ruleCollections": [{
                "name": "allow-apps",
                "priority": 100,
                "action": {"type": "Allow"},
                "rules": [{
                    "name": "many-ports",
                    "ruleType": "ApplicationRule",
                    "sourceAddresses": ["10.0.0.0/8"],
                    "targetFqdns": ["app.contoso.com"],
                    "protocols": protocols
                }, {
                    "name": "next",
                    "ruleType": "ApplicationRule",
                    "sourceAddresses": ["10.0.0.0/8"],
                    "targetFqdns": ["api.contoso.com"],
                    "protocols": [{"protocolType": "Https"}]
                }]
            }, {
                "name": "same-priority",
                "priority": 100,
                "action": {"type": "Deny"},
                "rules": [{
                    "name": "later",
                    "ruleType": "NetworkRule",
                    "ipProtocols": ["TCP"],
                    "sourceAddresses": ["*"],
                    "destinationAddresses": ["*"],
                    "destinationPorts": ["445"]
                }]
            }]
        }]
    }))
    .unwrap();

    let (rule_set, diagnostics) = RuleSet::from_firewall_policy(&record, Action::Deny);
    assert!(diagnostics.is_empty());
    assert_eq!(rule_set.len(), 22);

    let names: Vec<&str> = rule_set.rules().iter().map(|r| r.name.as_str()).collect();
    assert!(names[..20].iter().all(|name| *name == "many-ports"));
    assert_eq!(&names[20..], &["next", "later"]);
    assert_eq!(rule_set.rules()[19].destination_ports, PortSpec::ports(&[8019]));
}

#[test]
fn test_from_firewall_policy_declared_default_wins() {
    let record: FirewallPolicyRecord = serde_json::from_value(json!({
        "id": POLICY_ID,
        "defaultAction": "Allow"
    }))
    .unwrap();

    let (rule_set, _) = RuleSet::from_firewall_policy(&record, Action::Deny);
    assert_eq!(rule_set.default_action, Action::Allow);
    assert!(evaluate(&rule_set, &inbound_tcp(22).with_direction(Direction::Outbound), None).is_allowed());
}

// Access rules: parsing NSG and firewall policy rules into one canonical
// form, and first-match evaluation of a traffic tuple against a rule set.

use crate::cidr::Cidr;
use crate::data::{Diagnostic, DiagnosticKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, warn};
use vnetscope_inventory::arm;
use vnetscope_inventory::record::{
    FirewallPolicyRecord, FirewallRuleRecord, NsgRecord, NsgRuleRecord, RuleCollectionGroupRecord,
    RuleCollectionRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inbound" | "in" => Some(Direction::Inbound),
            "outbound" | "out" => Some(Direction::Outbound),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "Inbound",
            Direction::Outbound => "Outbound",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Allow,
    Deny,
}

impl Action {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "allow" => Some(Action::Allow),
            "deny" => Some(Action::Deny),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "Allow",
            Action::Deny => "Deny",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Esp,
    Ah,
    Http,
    Https,
    Any,
    Other(String),
}

impl Protocol {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "*" | "any" => Protocol::Any,
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            "icmp" => Protocol::Icmp,
            "esp" => Protocol::Esp,
            "ah" => Protocol::Ah,
            "http" => Protocol::Http,
            "https" => Protocol::Https,
            // SQL application rules run over TCP 1433
            "mssql" => Protocol::Tcp,
            _ => Protocol::Other(value.trim().to_string()),
        }
    }

    /// Whether a rule with this protocol covers `requested`. A requested
    /// `Any` stands for "every protocol" and is only covered by a rule
    /// protocol of `Any`. HTTP(S) application rules ride on TCP.
    pub fn matches(&self, requested: &Protocol) -> bool {
        match (self, requested) {
            (Protocol::Any, _) => true,
            (_, Protocol::Any) => false,
            (Protocol::Http | Protocol::Https, Protocol::Tcp) => true,
            (rule, requested) => rule == requested,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
            Protocol::Icmp => write!(f, "ICMP"),
            Protocol::Esp => write!(f, "ESP"),
            Protocol::Ah => write!(f, "AH"),
            Protocol::Http => write!(f, "HTTP"),
            Protocol::Https => write!(f, "HTTPS"),
            Protocol::Any => write!(f, "Any"),
            Protocol::Other(label) => write!(f, "{}", label),
        }
    }
}

// ============================================================================
// Addresses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AddressEntry {
    Any,
    Cidr(Cidr),
    ServiceTag(String),
    Fqdn(String),
}

impl AddressEntry {
    /// Parses an address prefix as written in an NSG or network rule.
    /// Anything that is not a wildcard or an IP prefix is a service tag.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if value == "*" || value.eq_ignore_ascii_case("any") {
            return Some(AddressEntry::Any);
        }
        if let Some(cidr) = Cidr::parse(value) {
            if cidr.is_default_route() {
                return Some(AddressEntry::Any);
            }
            return Some(AddressEntry::Cidr(cidr));
        }
        Some(AddressEntry::ServiceTag(value.to_string()))
    }

    pub fn fqdn(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(AddressEntry::Fqdn(value.to_string()))
        }
    }

    /// `Any`, the default route, or the `Internet` tag.
    pub fn is_internet(&self) -> bool {
        match self {
            AddressEntry::Any => true,
            AddressEntry::Cidr(cidr) => cidr.is_default_route(),
            AddressEntry::ServiceTag(tag) => tag.eq_ignore_ascii_case("internet"),
            AddressEntry::Fqdn(_) => false,
        }
    }

    pub fn matches(&self, range: &Cidr, tags: Option<&ServiceTagTable>) -> bool {
        match self {
            AddressEntry::Any => true,
            AddressEntry::Cidr(cidr) => cidr.contains(range),
            AddressEntry::ServiceTag(tag) => tags
                .and_then(|table| table.lookup(tag))
                .is_some_and(|prefixes| prefixes.iter().any(|prefix| prefix.contains(range))),
            AddressEntry::Fqdn(_) => false,
        }
    }
}

impl fmt::Display for AddressEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressEntry::Any => write!(f, "*"),
            AddressEntry::Cidr(cidr) => write!(f, "{}", cidr),
            AddressEntry::ServiceTag(tag) => write!(f, "{}", tag),
            AddressEntry::Fqdn(fqdn) => write!(f, "{}", fqdn),
        }
    }
}

/// Parses every non-empty value, deduplicated, in order.
pub fn parse_addresses<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<AddressEntry> {
    let mut entries = Vec::new();
    for entry in values.into_iter().filter_map(AddressEntry::parse) {
        if !entries.contains(&entry) {
            entries.push(entry);
        }
    }
    entries
}

fn is_any(entries: &[AddressEntry]) -> bool {
    entries.contains(&AddressEntry::Any)
}

fn format_entries(entries: &[AddressEntry]) -> String {
    if entries.is_empty() {
        return "(none)".to_string();
    }
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Service tag name to address prefixes. Lookups ignore case.
#[derive(Debug, Clone, Default)]
pub struct ServiceTagTable {
    tags: HashMap<String, Vec<Cidr>>,
}

impl ServiceTagTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: &str, prefixes: impl IntoIterator<Item = Cidr>) {
        let entry = self.tags.entry(tag.to_ascii_lowercase()).or_default();
        for prefix in prefixes {
            if !entry.contains(&prefix) {
                entry.push(prefix);
            }
        }
    }

    pub fn with_tag(mut self, tag: &str, prefixes: &[&str]) -> Self {
        self.insert(tag, prefixes.iter().filter_map(|p| Cidr::parse(p)));
        self
    }

    /// Builds a table from tag → prefix strings, skipping unparseable prefixes.
    pub fn from_map(map: &BTreeMap<String, Vec<String>>) -> Self {
        let mut table = ServiceTagTable::new();
        for (tag, prefixes) in map {
            let parsed: Vec<Cidr> = prefixes
                .iter()
                .filter_map(|prefix| {
                    let cidr = Cidr::parse(prefix);
                    if cidr.is_none() {
                        warn!("Ignoring invalid prefix '{}' for service tag {}", prefix, tag);
                    }
                    cidr
                })
                .collect();
            table.insert(tag, parsed);
        }
        table
    }

    pub fn contains_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(&tag.to_ascii_lowercase())
    }

    pub fn lookup(&self, tag: &str) -> Option<&[Cidr]> {
        self.tags.get(&tag.to_ascii_lowercase()).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

// ============================================================================
// Ports
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Self {
        if start <= end {
            PortRange { start, end }
        } else {
            PortRange { start: end, end: start }
        }
    }

    pub fn single(port: u16) -> Self {
        PortRange { start: port, end: port }
    }

    pub fn contains(&self, port: u16) -> bool {
        self.start <= port && port <= self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortSpec {
    Any,
    Ranges(Vec<PortRange>),
}

impl Default for PortSpec {
    fn default() -> Self {
        PortSpec::Ranges(Vec::new())
    }
}

impl PortSpec {
    /// Parses port strings (`*`, `22`, `1000-2000`). Unparseable entries are
    /// dropped with a warning; no entries at all gives an empty port list.
    pub fn parse<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut ranges = Vec::new();
        for value in values {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if value == "*" || value.eq_ignore_ascii_case("any") {
                return PortSpec::Any;
            }
            match parse_range(value) {
                Some(range) => {
                    if !ranges.contains(&range) {
                        ranges.push(range);
                    }
                }
                None => warn!("Ignoring unparseable port range '{}'", value),
            }
        }
        ranges.sort();
        PortSpec::Ranges(ranges)
    }

    pub fn ports(ports: &[u16]) -> Self {
        let mut ranges: Vec<PortRange> = ports.iter().copied().map(PortRange::single).collect();
        ranges.sort();
        ranges.dedup();
        PortSpec::Ranges(ranges)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PortSpec::Ranges(ranges) if ranges.is_empty())
    }

    pub fn contains(&self, port: u16) -> bool {
        match self {
            PortSpec::Any => true,
            PortSpec::Ranges(ranges) => ranges.iter().any(|range| range.contains(port)),
        }
    }

    /// True for `Any` or ranges whose union is 0-65535.
    pub fn covers_all(&self) -> bool {
        match self {
            PortSpec::Any => true,
            PortSpec::Ranges(ranges) => {
                let mut sorted = ranges.clone();
                sorted.sort();
                let mut next: u32 = 0;
                for range in sorted {
                    if u32::from(range.start) > next {
                        return false;
                    }
                    next = next.max(u32::from(range.end) + 1);
                }
                next > u32::from(u16::MAX)
            }
        }
    }

    /// Ports of `candidates` this port list includes, in candidate order.
    pub fn exposed(&self, candidates: &[u16]) -> Vec<u16> {
        candidates
            .iter()
            .copied()
            .filter(|port| self.contains(*port))
            .collect()
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Any => write!(f, "*"),
            PortSpec::Ranges(ranges) if ranges.is_empty() => write!(f, "(none)"),
            PortSpec::Ranges(ranges) => {
                let parts: Vec<String> = ranges.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

fn parse_range(value: &str) -> Option<PortRange> {
    match value.split_once('-') {
        Some((start, end)) => Some(PortRange::new(
            start.trim().parse().ok()?,
            end.trim().parse().ok()?,
        )),
        None => value.parse().ok().map(PortRange::single),
    }
}

// ============================================================================
// Rules and rule sets
// ============================================================================

/// Identifies the rule that decided a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleReference {
    pub rule_set: String,
    pub rule: String,
    pub priority: u64,
}

impl fmt::Display for RuleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} (priority {})",
            arm::resource_name(&self.rule_set),
            self.rule,
            self.priority
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRule {
    pub name: String,
    pub priority: u64,
    pub direction: Direction,
    pub action: Action,
    pub protocol: Protocol,
    pub source: Vec<AddressEntry>,
    pub destination: Vec<AddressEntry>,
    pub source_ports: PortSpec,
    pub destination_ports: PortSpec,
    pub rule_set: String,
}

impl AccessRule {
    pub fn new(name: impl Into<String>, priority: u64, direction: Direction, action: Action) -> Self {
        AccessRule {
            name: name.into(),
            priority,
            direction,
            action,
            protocol: Protocol::Any,
            source: Vec::new(),
            destination: Vec::new(),
            source_ports: PortSpec::Any,
            destination_ports: PortSpec::default(),
            rule_set: String::new(),
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_source(mut self, source: &[&str]) -> Self {
        self.source = parse_addresses(source.iter().copied());
        self
    }

    pub fn with_destination(mut self, destination: &[&str]) -> Self {
        self.destination = parse_addresses(destination.iter().copied());
        self
    }

    pub fn with_destination_ports(mut self, ports: &[&str]) -> Self {
        self.destination_ports = PortSpec::parse(ports.iter().copied());
        self
    }

    /// Converts one NSG rule. Priority, direction and access are required.
    ///
    /// A missing address or port specifier means `*`, the way the portal
    /// shows it. A rule with none of source, destination and destination
    /// ports, or whose specifiers all fail to parse, is rejected.
    pub fn from_nsg_rule(rule_set: &str, record: &NsgRuleRecord) -> Result<Self, String> {
        let name = record.name.clone().unwrap_or_else(|| "(unnamed)".to_string());
        let priority = record
            .priority
            .filter(|p| *p >= 0)
            .ok_or_else(|| format!("rule '{}' has no valid priority", name))? as u64;
        let direction = record
            .direction
            .as_deref()
            .and_then(Direction::parse)
            .ok_or_else(|| format!("rule '{}' has no valid direction", name))?;
        let action = record
            .access
            .as_deref()
            .and_then(Action::parse)
            .ok_or_else(|| format!("rule '{}' has no valid access", name))?;

        let source = single_and_plural(&record.source_address_prefix, &record.source_address_prefixes);
        let destination = single_and_plural(
            &record.destination_address_prefix,
            &record.destination_address_prefixes,
        );
        let destination_ports = single_and_plural(
            &record.destination_port_range,
            &record.destination_port_ranges,
        );
        if source.is_empty() && destination.is_empty() && destination_ports.is_empty() {
            return Err(format!(
                "rule '{}' has no source, destination or destination port specifiers",
                name
            ));
        }

        let rule = AccessRule {
            protocol: Protocol::parse(record.protocol.as_deref().unwrap_or("*")),
            source: parse_addresses(or_wildcard(source)),
            destination: parse_addresses(or_wildcard(destination)),
            source_ports: PortSpec::parse(or_wildcard(single_and_plural(
                &record.source_port_range,
                &record.source_port_ranges,
            ))),
            destination_ports: PortSpec::parse(or_wildcard(destination_ports)),
            rule_set: rule_set.to_string(),
            ..AccessRule::new(name, priority, direction, action)
        };
        if rule.source.is_empty() || rule.destination.is_empty() || rule.destination_ports.is_empty() {
            return Err(format!(
                "rule '{}' has no usable source, destination or destination port",
                rule.name
            ));
        }
        Ok(rule)
    }

    /// A rule with no source, destination or destination ports can never be
    /// applied meaningfully.
    pub fn is_unspecified(&self) -> bool {
        self.source.is_empty() && self.destination.is_empty() && self.destination_ports.is_empty()
    }

    pub fn source_is_any(&self) -> bool {
        is_any(&self.source)
    }

    pub fn destination_is_any(&self) -> bool {
        is_any(&self.destination)
    }

    pub fn source_is_internet(&self) -> bool {
        self.source.iter().any(AddressEntry::is_internet)
    }

    pub fn matches(&self, tuple: &TrafficTuple, tags: Option<&ServiceTagTable>) -> bool {
        if !self.protocol.matches(&tuple.protocol) {
            return false;
        }
        let port_matches = match tuple.port {
            Some(port) => self.destination_ports.contains(port),
            None => self.destination_ports == PortSpec::Any,
        };
        port_matches
            && self
                .source
                .iter()
                .any(|entry| entry.matches(&tuple.source, tags))
            && self
                .destination
                .iter()
                .any(|entry| entry.matches(&tuple.destination, tags))
    }

    pub fn reference(&self) -> RuleReference {
        RuleReference {
            rule_set: self.rule_set.clone(),
            rule: self.name.clone(),
            priority: self.priority,
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{} {} {} from [{}] to [{}] ports {}",
            self.direction.as_str(),
            self.action.as_str(),
            self.protocol,
            format_entries(&self.source),
            format_entries(&self.destination),
            self.destination_ports
        )
    }
}

fn single_and_plural<'a>(single: &'a Option<String>, plural: &'a [String]) -> Vec<&'a str> {
    single
        .as_deref()
        .into_iter()
        .chain(plural.iter().map(String::as_str))
        .filter(|value| !value.trim().is_empty())
        .collect()
}

fn or_wildcard(values: Vec<&str>) -> Vec<&str> {
    if values.is_empty() { vec!["*"] } else { values }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleSetKind {
    NetworkSecurityGroup,
    FirewallPolicy,
}

impl RuleSetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleSetKind::NetworkSecurityGroup => "network_security_group",
            RuleSetKind::FirewallPolicy => "firewall_policy",
        }
    }
}

/// An ordered collection of rules owned by one NSG or firewall policy.
/// Rules stay sorted by ascending priority; a priority is unique per
/// direction.
///
/// Platform defaults (an NSG's `defaultSecurityRules`) are kept apart from
/// the rules an operator wrote. They are consulted after every explicit rule
/// but are not what findings are raised against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub id: String,
    pub name: String,
    pub kind: RuleSetKind,
    pub default_action: Action,
    rules: Vec<AccessRule>,
    #[serde(default)]
    default_rules: Vec<AccessRule>,
}

impl RuleSet {
    pub fn new(id: impl Into<String>, kind: RuleSetKind, default_action: Action) -> Self {
        let id = id.into();
        RuleSet {
            name: arm::resource_name(&id).to_string(),
            id,
            kind,
            default_action,
            rules: Vec::new(),
            default_rules: Vec::new(),
        }
    }

    /// An empty NSG: default deny.
    pub fn nsg(id: impl Into<String>) -> Self {
        RuleSet::new(id, RuleSetKind::NetworkSecurityGroup, Action::Deny)
    }

    pub fn firewall_policy(id: impl Into<String>, default_action: Action) -> Self {
        RuleSet::new(id, RuleSetKind::FirewallPolicy, default_action)
    }

    /// Explicit rules, without platform defaults.
    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    pub fn default_rules(&self) -> &[AccessRule] {
        &self.default_rules
    }

    /// Explicit rules first, then platform defaults: the evaluation order.
    pub fn effective_rules(&self) -> impl Iterator<Item = &AccessRule> {
        self.rules.iter().chain(&self.default_rules)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Builder form of [`RuleSet::insert_rule`] that drops diagnostics.
    pub fn with_rule(mut self, rule: AccessRule) -> Self {
        self.insert_rule(rule);
        self
    }

    /// Inserts a rule in priority order. Unspecified rules and rules whose
    /// priority is already taken in the same direction are rejected with a
    /// diagnostic; an exact repeat of an existing rule is ignored.
    pub fn insert_rule(&mut self, rule: AccessRule) -> Option<Diagnostic> {
        insert_ordered(&mut self.rules, &self.id, &self.name, rule)
    }

    /// Same checks as [`RuleSet::insert_rule`], into the platform defaults.
    pub fn insert_default_rule(&mut self, rule: AccessRule) -> Option<Diagnostic> {
        insert_ordered(&mut self.default_rules, &self.id, &self.name, rule)
    }

    /// Security and custom rules of an NSG, in that order of precedence for
    /// duplicates. `defaultSecurityRules` land in the platform defaults.
    pub fn from_nsg(record: &NsgRecord) -> (RuleSet, Vec<Diagnostic>) {
        let id = record.id.clone().unwrap_or_default();
        let mut rule_set = RuleSet::nsg(id);
        if let Some(name) = &record.name {
            rule_set.name = name.clone();
        }

        let mut diagnostics = Vec::new();
        let explicit = record.security_rules.iter().chain(&record.custom_rules);
        let defaults = record.default_security_rules.iter();
        for (is_default, rule) in explicit.map(|r| (false, r)).chain(defaults.map(|r| (true, r))) {
            match AccessRule::from_nsg_rule(&rule_set.id, rule) {
                Ok(rule) if is_default => diagnostics.extend(rule_set.insert_default_rule(rule)),
                Ok(rule) => diagnostics.extend(rule_set.insert_rule(rule)),
                Err(reason) => {
                    warn!("Skipping rule in {}: {}", rule_set.name, reason);
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::RuleConfiguration,
                        rule_set.id.clone(),
                        reason,
                    ));
                }
            }
        }

        debug!(
            "Parsed {} rules and {} defaults for NSG {}",
            rule_set.len(),
            rule_set.default_rules.len(),
            rule_set.name
        );
        (rule_set, diagnostics)
    }

    /// Network, application and NAT rules of a firewall policy. The policy's
    /// declared default action wins over `default_action`.
    ///
    /// Rules are numbered densely by group priority, collection priority,
    /// position and protocol variant, in that order, so evaluation follows
    /// the firewall's own order. Ties between groups or collections keep
    /// document order.
    pub fn from_firewall_policy(
        record: &FirewallPolicyRecord,
        default_action: Action,
    ) -> (RuleSet, Vec<Diagnostic>) {
        let declared = record.default_action.as_deref().and_then(Action::parse);
        let id = record.id.clone().unwrap_or_default();
        let mut rule_set = RuleSet::firewall_policy(id, declared.unwrap_or(default_action));
        if let Some(name) = &record.name {
            rule_set.name = name.clone();
        }

        let mut diagnostics = Vec::new();
        let mut groups: Vec<&RuleCollectionGroupRecord> = record.rule_collection_groups.iter().collect();
        groups.sort_by_key(|group| collection_priority(group.priority));

        // (group rank, collection rank, position, expanded rules)
        let mut slots: Vec<(u64, u64, u64, Vec<AccessRule>)> = Vec::new();
        for (group_rank, group) in groups.into_iter().enumerate() {
            let mut collections: Vec<&RuleCollectionRecord> = group.rule_collections.iter().collect();
            collections.sort_by_key(|collection| collection_priority(collection.priority));

            for (collection_rank, collection) in collections.into_iter().enumerate() {
                let Some(semantics) = collection_semantics(collection) else {
                    let name = collection.name.as_deref().unwrap_or("(unnamed)");
                    warn!("Skipping rule collection '{}' in {}: unknown action", name, rule_set.name);
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::RuleConfiguration,
                        rule_set.id.clone(),
                        format!("rule collection '{}' has no recognised action", name),
                    ));
                    continue;
                };

                for (position, rule) in collection.rules.iter().enumerate() {
                    slots.push((
                        group_rank as u64,
                        collection_rank as u64,
                        position as u64,
                        firewall_rules(rule, semantics),
                    ));
                }
            }
        }

        let collection_width = slots.iter().map(|slot| slot.1 + 1).max().unwrap_or(1);
        let position_width = slots.iter().map(|slot| slot.2 + 1).max().unwrap_or(1);
        let variant_width = slots
            .iter()
            .map(|slot| slot.3.len() as u64)
            .max()
            .unwrap_or(1)
            .max(1);

        for (group_rank, collection_rank, position, expanded) in slots {
            let base = ((group_rank * collection_width + collection_rank) * position_width + position) * variant_width;
            for (variant, mut rule) in expanded.into_iter().enumerate() {
                rule.priority = base + variant as u64;
                diagnostics.extend(rule_set.insert_rule(rule));
            }
        }

        debug!("Parsed {} rules for firewall policy {}", rule_set.len(), rule_set.name);
        (rule_set, diagnostics)
    }
}

fn insert_ordered(rules: &mut Vec<AccessRule>, set_id: &str, set_name: &str, mut rule: AccessRule) -> Option<Diagnostic> {
    rule.rule_set = set_id.to_string();

    if rule.is_unspecified() {
        warn!(
            "Skipping rule '{}' in {}: no source, destination or port specifiers",
            rule.name, set_name
        );
        return Some(Diagnostic::new(
            DiagnosticKind::RuleConfiguration,
            set_id,
            format!(
                "rule '{}' has no source, destination or destination port specifiers and was skipped",
                rule.name
            ),
        ));
    }

    if let Some(existing) = rules
        .iter()
        .find(|r| r.priority == rule.priority && r.direction == rule.direction)
    {
        if existing.name == rule.name {
            debug!("Rule '{}' listed twice in {}", rule.name, set_name);
            return None;
        }
        warn!(
            "Rule '{}' in {} reuses priority {} of rule '{}', keeping the first",
            rule.name, set_name, rule.priority, existing.name
        );
        return Some(Diagnostic::new(
            DiagnosticKind::DuplicatePriority,
            set_id,
            format!(
                "rule '{}' reuses priority {} ({}) of rule '{}' and was dropped",
                rule.name,
                rule.priority,
                rule.direction.as_str(),
                existing.name
            ),
        ));
    }

    let position = rules.partition_point(|r| (r.priority, r.direction) < (rule.priority, rule.direction));
    rules.insert(position, rule);
    None
}

fn collection_priority(priority: Option<i64>) -> i64 {
    priority.unwrap_or(65_000).clamp(0, 65_535)
}

/// How a rule collection's rules apply at the firewall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CollectionSemantics {
    direction: Direction,
    action: Action,
    /// DNAT: rules allow inbound traffic to their translated target.
    translates: bool,
}

fn collection_semantics(collection: &RuleCollectionRecord) -> Option<CollectionSemantics> {
    let action = collection.action.as_ref().and_then(|a| a.as_str())?;
    if action.eq_ignore_ascii_case("dnat") {
        return Some(CollectionSemantics {
            direction: Direction::Inbound,
            action: Action::Allow,
            translates: true,
        });
    }
    Action::parse(action).map(|action| CollectionSemantics {
        direction: Direction::Outbound,
        action,
        translates: false,
    })
}

/// One canonical rule per protocol the firewall rule names.
///
/// A DNAT rule is expressed on its translated target: the backend address
/// and, when given, the translated port. The public frontend it listens on
/// is not an endpoint of the graph.
fn firewall_rules(record: &FirewallRuleRecord, semantics: CollectionSemantics) -> Vec<AccessRule> {
    let name = record.name.clone().unwrap_or_else(|| "(unnamed)".to_string());
    let source = parse_addresses(
        record
            .source_addresses
            .iter()
            .chain(&record.source_ip_groups)
            .map(String::as_str),
    );

    let translated = semantics
        .translates
        .then(|| record.translated_address.as_deref().and_then(AddressEntry::parse))
        .flatten();

    let destination = match translated {
        Some(target) => vec![target],
        None => {
            let mut destination = parse_addresses(
                record
                    .destination_addresses
                    .iter()
                    .chain(&record.destination_ip_groups)
                    .map(String::as_str),
            );
            for fqdn in record
                .destination_fqdns
                .iter()
                .chain(&record.target_fqdns)
                .chain(&record.target_urls)
            {
                if let Some(entry) = AddressEntry::fqdn(fqdn)
                    && !destination.contains(&entry)
                {
                    destination.push(entry);
                }
            }
            destination
        }
    };

    let translated_port = if semantics.translates {
        translated_port(record.translated_port.as_ref())
    } else {
        None
    };
    let destination_ports = match translated_port {
        Some(port) => PortSpec::parse([port.as_str()]),
        None => PortSpec::parse(record.destination_ports.iter().map(String::as_str)),
    };

    let base = AccessRule {
        name,
        priority: 0,
        direction: semantics.direction,
        action: semantics.action,
        protocol: Protocol::Any,
        source,
        destination,
        source_ports: PortSpec::Any,
        destination_ports,
        rule_set: String::new(),
    };

    let is_application = record
        .rule_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case("ApplicationRule"));

    if is_application && !record.protocols.is_empty() {
        return record
            .protocols
            .iter()
            .map(|protocol| {
                let label = protocol.protocol_type.as_deref().unwrap_or("*");
                let protocol_kind = Protocol::parse(label);
                let port = protocol.port.or(match protocol_kind {
                    Protocol::Http => Some(80),
                    Protocol::Https => Some(443),
                    _ => None,
                });
                let mut rule = base.clone();
                rule.protocol = protocol_kind;
                rule.destination_ports = match port {
                    Some(port) => PortSpec::ports(&[port]),
                    None => PortSpec::Any,
                };
                rule
            })
            .collect();
    }

    let protocols: Vec<Protocol> = record
        .ip_protocols
        .iter()
        .map(|p| Protocol::parse(p))
        .collect();
    if protocols.is_empty() || protocols.contains(&Protocol::Any) {
        return vec![base];
    }

    let mut seen = Vec::new();
    protocols
        .into_iter()
        .filter(|p| {
            let fresh = !seen.contains(p);
            if fresh {
                seen.push(p.clone());
            }
            fresh
        })
        .map(|protocol| {
            let mut rule = base.clone();
            rule.protocol = protocol;
            rule
        })
        .collect()
}

/// Collectors write the translated port as a string or a number.
fn translated_port(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(port) if !port.trim().is_empty() => Some(port.trim().to_string()),
        Value::Number(port) => Some(port.to_string()),
        _ => None,
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// A concrete flow to decide: address ranges, protocol, destination port
/// (`None` asks about every port) and the direction at the enforcement point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficTuple {
    pub source: Cidr,
    pub destination: Cidr,
    pub protocol: Protocol,
    pub port: Option<u16>,
    pub direction: Direction,
}

impl TrafficTuple {
    pub fn new(
        source: Cidr,
        destination: Cidr,
        protocol: Protocol,
        port: Option<u16>,
        direction: Direction,
    ) -> Self {
        TrafficTuple {
            source,
            destination,
            protocol,
            port,
            direction,
        }
    }

    pub fn with_direction(&self, direction: Direction) -> Self {
        TrafficTuple {
            direction,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    /// The matching rule; `None` when the default action applied.
    pub rule: Option<RuleReference>,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.action == Action::Allow
    }
}

/// First-match evaluation in ascending priority order, explicit rules before
/// platform defaults. Rules of the other direction are not consulted; no match
/// falls back to the set's default action.
pub fn evaluate(rule_set: &RuleSet, tuple: &TrafficTuple, tags: Option<&ServiceTagTable>) -> Decision {
    for rule in rule_set.effective_rules() {
        if rule.direction != tuple.direction {
            continue;
        }
        if rule.is_unspecified() {
            warn!("Skipping misconfigured rule '{}' in {}", rule.name, rule_set.name);
            continue;
        }
        if rule.matches(tuple, tags) {
            return Decision {
                action: rule.action,
                rule: Some(rule.reference()),
            };
        }
    }

    Decision {
        action: rule_set.default_action,
        rule: None,
    }
}

/// Every rule set of a snapshot, keyed by owning resource id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleSets {
    sets: BTreeMap<String, RuleSet>,
}

impl RuleSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rule_set: RuleSet) {
        self.sets.insert(arm::normalize_id(&rule_set.id), rule_set);
    }

    pub fn with(mut self, rule_set: RuleSet) -> Self {
        self.insert(rule_set);
        self
    }

    pub fn get(&self, id: &str) -> Option<&RuleSet> {
        self.sets.get(&arm::normalize_id(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleSet> {
        self.sets.values()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn rule_count(&self) -> usize {
        self.sets.values().map(RuleSet::len).sum()
    }
}

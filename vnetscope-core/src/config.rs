// Analysis settings, read from a JSON file with every field defaulted

use crate::cidr::Cidr;
use crate::error::{CoreError, Result};
use crate::model::{NetworkGraph, NodeType};
use crate::rules::{Action, ServiceTagTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/vnetscope/config.json";

pub const DEFAULT_RISKY_PORTS: [u16; 14] = [
    22, 23, 135, 139, 445, 1433, 1521, 3306, 3389, 5432, 5985, 5986, 6379, 27017,
];

pub const DEFAULT_NSG_EXEMPT_SUBNETS: [&str; 4] = [
    "GatewaySubnet",
    "AzureFirewallSubnet",
    "AzureFirewallManagementSubnet",
    "RouteServerSubnet",
];

/// The tag that stands for every address space of the snapshot.
pub const VIRTUAL_NETWORK_TAG: &str = "VirtualNetwork";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Ports whose exposure to the internet is reported, and which the
    /// connectivity analyzer probes.
    pub risky_ports: Vec<u16>,
    /// Service tag name to address prefixes.
    pub service_tags: BTreeMap<String, Vec<String>>,
    /// Used for firewall policies that do not declare a default action.
    pub firewall_default_action: Action,
    pub max_path_depth: usize,
    pub max_paths_per_pair: usize,
    /// Platform subnets that cannot carry an NSG.
    pub nsg_exempt_subnets: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            risky_ports: DEFAULT_RISKY_PORTS.to_vec(),
            service_tags: BTreeMap::new(),
            firewall_default_action: Action::Deny,
            max_path_depth: 12,
            max_paths_per_pair: 32,
            nsg_exempt_subnets: DEFAULT_NSG_EXEMPT_SUBNETS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads `path` when given; otherwise the default location if a file
    /// exists there, else the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return AnalysisConfig::load(path);
        }
        let default_path = default_config_path();
        if default_path.is_file() {
            return AnalysisConfig::load(&default_path);
        }
        debug!("No configuration at {}, using defaults", default_path.display());
        Ok(AnalysisConfig::default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_path_depth == 0 {
            return Err(CoreError::Config("max_path_depth must be at least 1".to_string()));
        }
        if self.max_paths_per_pair == 0 {
            return Err(CoreError::Config("max_paths_per_pair must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn is_exempt_subnet(&self, name: &str) -> bool {
        self.nsg_exempt_subnets
            .iter()
            .any(|exempt| exempt.eq_ignore_ascii_case(name))
    }

    /// Configured tags, plus `VirtualNetwork` covering every VNet address
    /// space in `graph` unless the configuration defines it.
    pub fn service_tag_table(&self, graph: &NetworkGraph) -> ServiceTagTable {
        let mut table = ServiceTagTable::from_map(&self.service_tags);
        if !table.contains_tag(VIRTUAL_NETWORK_TAG) {
            let prefixes: Vec<Cidr> = graph
                .nodes_of_type(NodeType::VirtualNetwork)
                .into_iter()
                .flat_map(|vnet| vnet.address_prefixes())
                .filter_map(|prefix| Cidr::parse(&prefix))
                .collect();
            table.insert(VIRTUAL_NETWORK_TAG, prefixes);
        }
        table
    }
}

/// `~/.config/vnetscope/config.json`, tilde expanded.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_PATH).as_ref())
}

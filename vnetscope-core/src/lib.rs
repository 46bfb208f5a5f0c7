pub mod analysis;
pub mod builder;
pub mod cidr;
pub mod config;
pub mod connectivity;
pub mod data;
pub mod error;
pub mod model;
pub mod normalize;
pub mod report;
pub mod rules;
pub mod security;

use colored::Colorize;

pub use analysis::{Analysis, analyze_snapshot};
pub use config::AnalysisConfig;
pub use error::{CoreError, Result};
pub use model::{EdgeKind, NetworkEdge, NetworkGraph, NetworkNode, NodeType};

pub fn print_banner() {
    let banner = r#"
                      __
  _   ______  ___  / /_______________  ____  ___
 | | / / __ \/ _ \/ __/ ___/ ___/ __ \/ __ \/ _ \
 | |/ / / / /  __/ /_(__  ) /__/ /_/ / /_/ /  __/
 |___/_/ /_/\___/\__/____/\___/\____/ .___/\___/
                                   /_/
"#;
    println!("{}", banner.bright_cyan());
    println!(
        "  {} {}\n",
        "static Azure network analysis".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

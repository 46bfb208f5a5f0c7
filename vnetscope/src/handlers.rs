use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{Level, debug};
use vnetscope_core::analysis::{Analysis, analyze_snapshot};
use vnetscope_core::config::AnalysisConfig;
use vnetscope_core::report::{
    ReportData, ReportFormat, generate_json_report, generate_text_report, save_report,
};
use vnetscope_inventory::Snapshot;

/// Hub-and-spoke topology shipped with the binary for `vnetscope sample`.
pub const SAMPLE_SNAPSHOT: &str = include_str!("../samples/hub_spoke.json");

/// Installs the stderr subscriber. Safe to call more than once.
pub fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

pub fn sample_snapshot() -> Result<Snapshot> {
    Snapshot::from_json_str(SAMPLE_SNAPSHOT).context("Bundled sample snapshot is unreadable")
}

pub fn write_sample(path: &Path) -> Result<()> {
    save_report(SAMPLE_SNAPSHOT, path)
        .with_context(|| format!("Failed to write sample to {}", path.display()))
}

/// Loads the snapshot and configuration, then runs the whole pipeline.
pub fn run_analysis(snapshot_path: &Path, config_path: Option<&Path>) -> Result<Analysis> {
    let config = AnalysisConfig::load_or_default(config_path).context("Failed to load configuration")?;
    let snapshot = Snapshot::load(snapshot_path)
        .with_context(|| format!("Failed to load snapshot {}", snapshot_path.display()))?;
    debug!("Snapshot has {} skipped records", snapshot.issues.len());
    Ok(analyze_snapshot(&snapshot, &config))
}

pub fn render_report(
    analysis: &Analysis,
    source: &str,
    format: ReportFormat,
    include_matrix: bool,
) -> Result<String> {
    let data = ReportData::from_analysis(analysis, source, include_matrix);
    match format {
        ReportFormat::Text => Ok(generate_text_report(&data)),
        ReportFormat::Json => generate_json_report(&data).context("Failed to serialize report"),
    }
}

/// Writes the built-in configuration to `path` and returns it.
pub fn write_default_config(path: &Path) -> Result<AnalysisConfig> {
    let config = AnalysisConfig::default();
    config
        .save(path)
        .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
    Ok(config)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

fn spinner(message: &str, quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.to_string());
    Ok(spinner)
}

pub fn handle_analyze(args: &ArgMatches, quiet: bool) -> Result<()> {
    let verbose = args.get_flag("verbose");
    init_logging(verbose, quiet);

    let Some(snapshot_path) = args.get_one::<PathBuf>("SNAPSHOT") else {
        anyhow::bail!("A snapshot path is required");
    };
    let config_path = args.get_one::<PathBuf>("config");
    let output = args.get_one::<PathBuf>("output");
    let include_matrix = !args.get_flag("no-matrix");
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    let progress = spinner(
        &format!("Analyzing {}...", snapshot_path.display()),
        quiet || verbose,
    )?;
    let analysis = match run_analysis(snapshot_path, config_path.map(PathBuf::as_path)) {
        Ok(analysis) => analysis,
        Err(e) => {
            progress.finish_and_clear();
            return Err(e);
        }
    };
    progress.finish_and_clear();

    let source = snapshot_path.display().to_string();
    let report = render_report(&analysis, &source, format, include_matrix)?;

    match output {
        Some(path) => {
            save_report(&report, path)
                .with_context(|| format!("Failed to save report to {}", path.display()))?;
            if !quiet {
                print_summary(&analysis);
                println!(
                    "{} Report saved to: {}",
                    "✓".green().bold(),
                    path.display().to_string().bright_white()
                );
            }
        }
        None => print!("{}", report),
    }

    Ok(())
}

fn print_summary(analysis: &Analysis) {
    println!(
        "{} Graph: {} nodes, {} edges",
        "✓".green().bold(),
        analysis.graph.node_count(),
        analysis.graph.edge_count()
    );
    println!(
        "{} Connectivity: {} of {} pairs reachable",
        "✓".green().bold(),
        analysis.matrix.reachable_count(),
        analysis.matrix.len()
    );
    if analysis.findings.is_empty() {
        println!("{} No security findings", "✓".green().bold());
    } else {
        println!(
            "{} {} security findings",
            "⚠".yellow().bold(),
            analysis.findings.len()
        );
    }
    if !analysis.diagnostics.is_empty() {
        println!(
            "{} {} diagnostics recorded",
            "→".blue(),
            analysis.diagnostics.len()
        );
    }
}

pub fn handle_sample(args: &ArgMatches) -> Result<()> {
    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            write_sample(path)?;
            println!(
                "{} Sample snapshot written to: {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
            println!(
                "{} Try: vnetscope analyze {}",
                "→".blue(),
                path.display()
            );
        }
        None => print!("{}", SAMPLE_SNAPSHOT),
    }
    Ok(())
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  VNETSCOPE INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let Some(config_path) = args.get_one::<String>("PATH") else {
        anyhow::bail!("A configuration path is required");
    };
    let force = args.get_flag("force");
    let expanded = shellexpand::tilde(config_path);
    let config_path = Path::new(expanded.as_ref());

    println!(
        "{} Target: {}",
        "→".blue(),
        config_path.display().to_string().bright_white()
    );
    println!();

    if config_path.exists() && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Configuration file already exists:");
        println!(
            "  {} {}",
            "•".yellow(),
            config_path.display().to_string().bright_white()
        );
        println!();
        println!("{}", "This operation will overwrite it with the defaults.".yellow());

        let response = print_prompt("Do you want to continue? [y/N]:")?;
        println!();

        if response != "y" && response != "yes" {
            println!("{} Initialization cancelled.", "✗".red().bold());
            return Ok(());
        }
        println!("{} Proceeding with overwrite", "→".yellow().bold());
        println!();
    }

    let config = write_default_config(config_path)?;

    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Configuration: {}",
        "✓".green().bold(),
        config_path.display().to_string().bright_white()
    );
    println!(
        "{} Risky ports: {}",
        "✓".green().bold(),
        config
            .risky_ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();
    Ok(())
}

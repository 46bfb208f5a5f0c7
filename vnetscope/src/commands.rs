use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("vnetscope")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("vnetscope")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("analyze")
                .about(
                    "Builds the network graph from a snapshot, evaluates connectivity and \
                reports security findings.",
                )
                .arg(
                    arg!(<SNAPSHOT>)
                        .required(true)
                        .help("Path to a collected network snapshot (JSON)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Analysis configuration file (default: built-in settings)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"no-matrix")
                        .required(false)
                        .help("Leave the per-pair connectivity matrix out of the report")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-v --"verbose")
                        .required(false)
                        .help("Log every rule decision while analyzing")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("sample")
                .about("Writes the bundled hub-and-spoke sample snapshot")
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("File to write the sample to (default: print to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("init")
                .about("Writes the default analysis configuration to your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location of the configuration file")
                        .default_value("~/.config/vnetscope/config.json"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help("Overwrites any existing configuration at the specified location.")
                        .required(false),
                ),
        )
}

use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use std::process::exit;

mod build;
mod index;
mod lookup;

/// Exit code used when the dataset could not be opened.
const EXIT_OPEN_FAILED: i32 = 2;

fn cli() -> Command {
    Command::new("ouidb")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Build and query OUI to vendor datasets")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .global(true)
                .help("Sets debug prints level for the application:\n\t-v   - info\n\t-vv  - debug\n\t-vvv - trace"),
        )
        .subcommand(build::command())
        .subcommand(index::command())
        .subcommand(lookup::command())
}

fn try_to_initialize_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    if let Err(e) = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ) {
        eprintln!("Failed to initialize logging: {e}");
    }
}

fn main() {
    let matches = cli().get_matches();

    try_to_initialize_logging(matches.get_count("verbose"));

    let result = match matches.subcommand() {
        Some(("build", sub)) => build::run(sub),
        Some(("index", sub)) => index::run(sub),
        Some(("lookup", sub)) => lookup::run(sub),
        _ => unreachable!("clap enforces a subcommand"),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:?}");
        if e.downcast_ref::<ouidb::OpenError>().is_some() {
            exit(EXIT_OPEN_FAILED);
        }
        exit(1);
    }
}

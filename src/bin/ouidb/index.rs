use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

use ouidb::create_index;
use ouidb::index::default_index_path;

use std::path::PathBuf;

pub fn command() -> Command {
    Command::new("index")
        .about("Write the line offset index of a newline delimited file")
        .arg(
            Arg::new("FILE")
                .required(true)
                .help("File to index, usually a `vendors` table."),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .value_name("PATH")
                .help("Where to write the index (default: `<FILE>.index`)."),
        )
}

pub fn run(matches: &ArgMatches) -> Result<()> {
    let input = PathBuf::from(matches.get_one::<String>("FILE").context("missing FILE")?);
    let output = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| default_index_path(&input));

    let index = create_index(&input, &output)?;

    eprintln!(
        "Indexed {} lines of {} into {}",
        index.lines(),
        input.display(),
        output.display()
    );

    Ok(())
}

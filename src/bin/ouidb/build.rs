use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use indoc::indoc;
use log::info;

use ouidb::settings::{DEFAULT_ENTRIES_NAME, DEFAULT_INDEX_NAME, DEFAULT_VENDORS_NAME};
use ouidb::{DatasetFiles, Filter, build_dataset};

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

pub fn command() -> Command {
    Command::new("build")
        .about("Build a dataset from the IEEE OUI registry CSV")
        .long_about(indoc!(r#"
            Build a dataset from the IEEE OUI registry CSV.

            The registry is expected to have the columns
            `Registry,Assignment,Organization Name,Organization Address`
            (as published at https://standards-oui.ieee.org/oui/oui.csv).

            Three files are written into the output directory:
            - `entries`: `<oui>,<vendor id>` rows sorted by OUI.
            - `vendors`: one normalized vendor name per line.
            - `vendors.index`: little-endian i64 line offsets into `vendors`.

            When include filters are given, only rows matching every given filter
            are kept. Vendor names are compared after normalization, so
            `--include-vendors "Sony"` matches "Sony Corporation".
        "#))
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .required(true)
                .value_name("PATH")
                .help("Path to the registry CSV, or `-` to read from stdin."),
        )
        .arg(
            Arg::new("outdir")
                .long("outdir")
                .short('d')
                .default_value(".")
                .value_name("DIR")
                .help("Directory to write the dataset into."),
        )
        .arg(
            Arg::new("include-vendors")
                .long("include-vendors")
                .value_delimiter(',')
                .action(ArgAction::Append)
                .value_name("NAMES")
                .help("Comma separated vendor names to keep."),
        )
        .arg(
            Arg::new("include-vendors-file")
                .long("include-vendors-file")
                .value_name("PATH")
                .help("File with one vendor name to keep per line."),
        )
        .arg(
            Arg::new("include-ouis")
                .long("include-ouis")
                .value_delimiter(',')
                .action(ArgAction::Append)
                .value_name("OUIS")
                .help("Comma separated OUIs (or MAC addresses) to keep."),
        )
        .arg(
            Arg::new("include-ouis-file")
                .long("include-ouis-file")
                .value_name("PATH")
                .help("File with one OUI to keep per line."),
        )
        .arg(
            Arg::new("vendor-regex")
                .long("vendor-regex")
                .value_name("REGEX")
                .help("Keep only vendors whose normalized name matches this regular expression."),
        )
        .arg(
            Arg::new("entries-name")
                .long("entries-name")
                .default_value(DEFAULT_ENTRIES_NAME)
                .value_name("NAME"),
        )
        .arg(
            Arg::new("vendors-name")
                .long("vendors-name")
                .default_value(DEFAULT_VENDORS_NAME)
                .value_name("NAME"),
        )
        .arg(
            Arg::new("index-name")
                .long("index-name")
                .default_value(DEFAULT_INDEX_NAME)
                .value_name("NAME"),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting an existing dataset."),
        )
}

fn filter_from_matches(matches: &ArgMatches) -> Result<Option<Filter>> {
    let mut filter = Filter::new();

    if let Some(names) = matches.get_many::<String>("include-vendors") {
        filter = filter.vendor_names(names);
    }
    if let Some(path) = matches.get_one::<String>("include-vendors-file") {
        filter = filter
            .vendor_names_from_file(path)
            .with_context(|| format!("failed to load vendor filter from `{path}`"))?;
    }
    if let Some(ouis) = matches.get_many::<String>("include-ouis") {
        filter = filter.ouis(ouis);
    }
    if let Some(path) = matches.get_one::<String>("include-ouis-file") {
        filter = filter
            .ouis_from_file(path)
            .with_context(|| format!("failed to load OUI filter from `{path}`"))?;
    }
    if let Some(pattern) = matches.get_one::<String>("vendor-regex") {
        filter = filter.vendor_regex(pattern)?;
    }

    Ok((!filter.is_empty()).then_some(filter))
}

fn files_from_matches(matches: &ArgMatches) -> DatasetFiles {
    let name = |id: &str| {
        matches
            .get_one::<String>(id)
            .cloned()
            .unwrap_or_default()
    };

    DatasetFiles {
        entries: name("entries-name"),
        vendors: name("vendors-name"),
        index: name("index-name"),
    }
}

fn open_input(input: &str) -> Result<Box<dyn Read>> {
    if input == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }

    let file = File::open(input).with_context(|| format!("failed to open registry `{input}`"))?;
    Ok(Box::new(BufReader::new(file)))
}

fn confirm_overwrite(outdir: &Path, files: &DatasetFiles, prompt: bool) -> Result<()> {
    if outdir.exists() && !outdir.is_dir() {
        bail!(
            "There is a file at {}, refusing to overwrite",
            outdir.display()
        );
    }

    let existing: Vec<PathBuf> = files
        .names()
        .into_iter()
        .map(|name| outdir.join(name))
        .filter(|path| path.exists())
        .collect();

    if existing.is_empty() || !prompt {
        return Ok(());
    }

    let confirmed = Confirm::new()
        .with_prompt(format!(
            "A dataset already exists in {}, are you sure you want to replace it",
            outdir.display()
        ))
        .default(false)
        .interact()
        .context("failed to write confirmation prompt to term")?;

    if !confirmed {
        bail!("Cancelled");
    }

    Ok(())
}

pub fn run(matches: &ArgMatches) -> Result<()> {
    let input = matches
        .get_one::<String>("input")
        .context("missing --input")?;
    let outdir = PathBuf::from(
        matches
            .get_one::<String>("outdir")
            .context("missing --outdir")?,
    );
    let files = files_from_matches(matches);
    let filter = filter_from_matches(matches)?;

    confirm_overwrite(&outdir, &files, !matches.get_flag("no-confirm-overwrite"))?;

    let reader = open_input(input)?;
    let summary = build_dataset(reader, &outdir, &files, filter.as_ref())
        .with_context(|| format!("failed to build dataset from `{input}`"))?;

    info!("{:?}", summary.stats);
    eprintln!(
        "Wrote {} entries and {} vendors to {} ({} rows read, {} filtered, {} duplicates, {} invalid)",
        summary.entries,
        summary.vendors,
        outdir.display(),
        summary.stats.rows,
        summary.stats.filtered,
        summary.stats.duplicates,
        summary.stats.invalid_oui,
    );

    Ok(())
}

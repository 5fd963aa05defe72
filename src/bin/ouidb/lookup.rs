use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use indoc::indoc;
use serde::Serialize;

use ouidb::{OpenSettings, OuiDb};

use std::io::{self, BufRead, BufWriter, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
    JsonL,
}

impl OutputFormat {
    fn from_name(name: &str) -> Self {
        match name {
            "json" => OutputFormat::Json,
            "jsonl" => OutputFormat::JsonL,
            _ => OutputFormat::Text,
        }
    }
}

#[derive(Debug, Serialize)]
struct LookupRecord<'a> {
    query: &'a str,
    vendor: Option<&'a str>,
}

pub fn command() -> Command {
    Command::new("lookup")
        .about("Look up the vendor of MAC addresses or OUIs")
        .arg(
            Arg::new("QUERY")
                .num_args(0..)
                .help("MAC addresses or OUIs to look up. Read from stdin (one per line) when omitted."),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .short('d')
                .default_value(".")
                .value_name("DIR")
                .help("Directory holding the dataset."),
        )
        .arg(
            Arg::new("entries-name")
                .long("entries-name")
                .value_name("NAME"),
        )
        .arg(
            Arg::new("vendors-name")
                .long("vendors-name")
                .value_name("NAME"),
        )
        .arg(
            Arg::new("index-name")
                .long("index-name")
                .value_name("NAME"),
        )
        .arg(
            Arg::new("output-format")
                .short('o')
                .long("format")
                .value_parser(["text", "json", "jsonl"])
                .default_value("text")
                .help("Sets the output format")
                .long_help(indoc!(r#"
                    Sets the output format:
                        "text"  - prints the vendor, or an empty line when unknown.
                        "json"  - prints an indented {"query", "vendor"} object per query.
                        "jsonl" - same as json, one object per line.
                "#)),
        )
}

fn write_record<W: Write>(out: &mut W, format: OutputFormat, record: &LookupRecord) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{}", record.vendor.unwrap_or_default())?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, record)?;
            writeln!(out)?;
        }
        OutputFormat::JsonL => {
            serde_json::to_writer(&mut *out, record)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

pub fn run(matches: &ArgMatches) -> Result<()> {
    let dir = matches.get_one::<String>("dir").context("missing --dir")?;
    let format = OutputFormat::from_name(
        matches
            .get_one::<String>("output-format")
            .map(String::as_str)
            .unwrap_or("text"),
    );

    let mut settings = OpenSettings::new().dir(dir);
    if let Some(name) = matches.get_one::<String>("entries-name") {
        settings = settings.entries_name(name.as_str());
    }
    if let Some(name) = matches.get_one::<String>("vendors-name") {
        settings = settings.vendors_name(name.as_str());
    }
    if let Some(name) = matches.get_one::<String>("index-name") {
        settings = settings.index_name(name.as_str());
    }

    let db = OuiDb::open(settings)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match matches.get_many::<String>("QUERY") {
        Some(queries) => {
            for query in queries {
                let vendor = db.lookup(query);
                write_record(&mut out, format, &LookupRecord { query, vendor })?;
            }
        }
        None => {
            for line in io::stdin().lock().lines() {
                let line = line.context("failed to read query from stdin")?;
                let query = line.trim();
                if query.is_empty() {
                    continue;
                }
                let vendor = db.lookup(query);
                write_record(&mut out, format, &LookupRecord { query, vendor })?;
            }
        }
    }

    out.flush()?;
    Ok(())
}

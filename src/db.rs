use std::fmt;
use std::num::NonZeroU32;
use std::sync::OnceLock;

use ahash::RandomState;
use csv::{ReaderBuilder, StringRecord};
use hashbrown::HashMap as FastMap;
use log::{debug, info};

use crate::err::{OpenError, OpenResult};
use crate::index::OffsetIndex;
use crate::normalize::{OUI_LEN, Oui, oui_prefix};
use crate::settings::{DatasetFiles, OpenSettings};
use crate::source::{FileSource, resolver_for};

/// An in-memory OUI database backed by the `entries`, `vendors` and
/// `vendors.index` files.
///
/// Nothing is mutated after [`OuiDb::open`] returns, so a single instance can be
/// shared between threads and queried without locking.
pub struct OuiDb {
    entries: FastMap<Oui, NonZeroU32, RandomState>,
    vendors: Vec<u8>,
    index: OffsetIndex,
}

static GLOBAL_DB: OnceLock<OpenResult<OuiDb>> = OnceLock::new();

impl fmt::Debug for OuiDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OuiDb")
            .field("entries", &self.entries.len())
            .field("vendors", &self.index.lines())
            .field("vendor_bytes", &self.vendors.len())
            .finish()
    }
}

impl OuiDb {
    /// Resolves the configured source and loads the dataset from it.
    pub fn open(settings: OpenSettings) -> OpenResult<Self> {
        let source = resolver_for(&settings).resolve(&settings)?;
        let db = OuiDb::from_source(source.as_ref(), settings.get_files())?;

        info!(
            "Loaded {} OUI entries and {} vendors from {}",
            db.len(),
            db.vendor_count(),
            source.describe()
        );

        Ok(db)
    }

    /// Loads the dataset from an already resolved source.
    pub fn from_source(source: &dyn FileSource, files: &DatasetFiles) -> OpenResult<Self> {
        let entries = load_entries(source, &files.entries)?;

        let vendors = source
            .read_all(&files.vendors)
            .map_err(|e| OpenError::io("read", &files.vendors, e))?;

        let index_bytes = source
            .read_all(&files.index)
            .map_err(|e| OpenError::io("read", &files.index, e))?;
        let index = OffsetIndex::from_bytes(&index_bytes).map_err(|e| OpenError::IndexCorrupt {
            name: files.index.clone(),
            source: e,
        })?;

        Ok(OuiDb {
            entries,
            vendors,
            index,
        })
    }

    /// The process wide database, opened from the current directory on first use.
    ///
    /// Concurrent first calls load the dataset exactly once; every caller observes
    /// the same instance, or the same error.
    pub fn global() -> Result<&'static OuiDb, &'static OpenError> {
        GLOBAL_DB
            .get_or_init(|| OuiDb::open(OpenSettings::default()))
            .as_ref()
    }

    /// Looks up the vendor of a MAC address or OUI.
    ///
    /// Separators (`:`, `-`, `.`, space) are ignored and the comparison is
    /// case-insensitive. Inputs longer than an OUI are truncated, so full MAC
    /// addresses work. Malformed or unknown inputs yield `None`.
    pub fn lookup(&self, query: &str) -> Option<&str> {
        let key = oui_prefix(query)?;
        let id = self.entries.get(&key)?;
        self.vendor_by_id(id.get())
    }

    /// Looks up the vendor of a MAC address given as raw bytes.
    pub fn lookup_hardware_addr(&self, mac: &[u8]) -> Option<&str> {
        let octets = mac.get(..3)?;

        let mut key = [0u8; OUI_LEN];
        for (i, octet) in octets.iter().enumerate() {
            key[i * 2] = HEX_DIGITS[usize::from(octet >> 4)];
            key[i * 2 + 1] = HEX_DIGITS[usize::from(octet & 0x0f)];
        }

        let id = self.entries.get(&key)?;
        self.vendor_by_id(id.get())
    }

    /// Looks up many queries at once, in parallel when the `multithreading` feature is enabled.
    #[cfg(feature = "multithreading")]
    pub fn lookup_many<S: AsRef<str> + Sync>(&self, queries: &[S]) -> Vec<Option<&str>> {
        use rayon::prelude::*;

        queries.par_iter().map(|q| self.lookup(q.as_ref())).collect()
    }

    #[cfg(not(feature = "multithreading"))]
    pub fn lookup_many<S: AsRef<str> + Sync>(&self, queries: &[S]) -> Vec<Option<&str>> {
        queries.iter().map(|q| self.lookup(q.as_ref())).collect()
    }

    /// Resolves a 1-based vendor ID to its name.
    ///
    /// When the recorded offsets do not describe a valid span of the vendor file,
    /// the line is found by scanning from its start offset instead.
    pub fn vendor_by_id(&self, id: u32) -> Option<&str> {
        let line = usize::try_from(id).ok()?.checked_sub(1)?;
        let (start, end) = self.index.line_span(line)?;
        let len = self.vendors.len();

        let span = match (usize::try_from(start), usize::try_from(end)) {
            (Ok(start), Ok(end)) if start <= end && end <= len => start..end,
            _ => {
                let start = usize::try_from(start).ok().filter(|&s| s < len)?;
                debug!(
                    "Offsets ({}, {}) of vendor {id} are out of range for a {len} byte table, scanning",
                    start, end
                );
                let rest = &self.vendors[start..];
                let end = rest
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(len, |pos| start + pos);
                start..end
            }
        };

        let line = trim_line_ending(&self.vendors[span]);
        std::str::from_utf8(line).ok()
    }

    /// Number of OUIs in the database.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn vendor_count(&self) -> usize {
        self.index.lines()
    }
}

/// Looks up `query` in the [global](OuiDb::global) database.
///
/// Returns `None` if the global database failed to load.
pub fn lookup(query: &str) -> Option<&'static str> {
    OuiDb::global().ok()?.lookup(query)
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

fn trim_line_ending(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\r' | b'\n'] = line {
        line = rest;
    }
    line
}

fn load_entries(source: &dyn FileSource, name: &str) -> OpenResult<FastMap<Oui, NonZeroU32, RandomState>> {
    let reader = source
        .open(name)
        .map_err(|e| OpenError::io("open", name, e))?;

    let mut csv = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut entries = FastMap::with_capacity_and_hasher(4096, RandomState::new());
    let mut record = StringRecord::new();
    let mut skipped = 0usize;

    loop {
        let more = csv
            .read_record(&mut record)
            .map_err(|e| OpenError::MalformedEntries {
                name: name.to_owned(),
                source: e,
            })?;
        if !more {
            break;
        }

        match parse_entry(&record) {
            Some((oui, id)) => {
                entries.insert(oui, id);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!("Skipped {skipped} malformed rows in `{name}`");
    }

    Ok(entries)
}

fn parse_entry(record: &StringRecord) -> Option<(Oui, NonZeroU32)> {
    if record.len() < 2 {
        return None;
    }

    let mut oui: Oui = record[0].as_bytes().try_into().ok()?;
    oui.make_ascii_lowercase();
    // Non-positive IDs can never address a vendor line.
    let id = record[1].trim().parse::<i64>().ok()?;
    let id = NonZeroU32::new(u32::try_from(id).ok()?)?;

    Some((oui, id))
}

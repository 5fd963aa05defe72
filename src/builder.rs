//! Turns the raw IEEE registry CSV into the three dataset files.
//!
//! The registry has the columns `Registry,Assignment,Organization Name,Organization Address`.
//! Only the assignment (the OUI) and the organization name are used.

use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::fs;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use log::{debug, info, trace, warn};
use tempfile::NamedTempFile;

use crate::err::{BuildError, BuildResult};
use crate::filter::Filter;
use crate::index::OffsetIndex;
use crate::normalize::{is_valid_oui, simplify_vendor_name};
use crate::settings::DatasetFiles;

const OUI_COLUMN: usize = 1;
const VENDOR_COLUMN: usize = 2;
const MIN_COLUMNS: usize = 3;

/// Mode of the written dataset files.
#[cfg(unix)]
const DATASET_FILE_MODE: u32 = 0o644;

/// A single `(OUI, VendorID)` row of the entries table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub oui: String,
    /// 1-based line number in the vendor table.
    pub vendor_id: u32,
}

/// Row accounting for a single build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Data rows read, excluding the header.
    pub rows: u64,
    /// Rows rejected by the filter.
    pub filtered: u64,
    /// Rows skipped because their OUI was already assigned.
    pub duplicates: u64,
    /// Rows skipped because the assignment is not six hex digits.
    pub invalid_oui: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub stats: BuildStats,
    pub entries: usize,
    pub vendors: usize,
}

/// A deduplicated, sorted dataset held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    entries: Vec<Entry>,
    vendors: Vec<String>,
    stats: BuildStats,
}

impl Dataset {
    /// Parses a raw registry.
    ///
    /// The first OUI assignment wins, later duplicates are logged and dropped.
    /// Vendor IDs are handed out in order of first appearance, starting at 1.
    pub fn from_registry<R: Read>(reader: R, filter: Option<&Filter>) -> BuildResult<Self> {
        let filter = filter.filter(|f| !f.is_empty());

        let mut csv = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut record = StringRecord::new();
        if !read_record(&mut csv, &mut record)? {
            return Err(BuildError::malformed(1, "missing header row"));
        }
        if record.len() < MIN_COLUMNS {
            return Err(BuildError::malformed(
                line_of(&record),
                format!("header has {} columns, expected at least {MIN_COLUMNS}", record.len()),
            ));
        }

        let mut stats = BuildStats::default();
        let mut assigned: HashMap<String, String> = HashMap::new();
        let mut vendor_ids: HashMap<String, u32> = HashMap::new();
        let mut vendors: Vec<String> = Vec::new();
        let mut entries: Vec<Entry> = Vec::new();

        while read_record(&mut csv, &mut record)? {
            stats.rows += 1;
            let line = line_of(&record);

            if record.len() < MIN_COLUMNS {
                return Err(BuildError::malformed(
                    line,
                    format!("row has {} columns, expected at least {MIN_COLUMNS}", record.len()),
                ));
            }

            let oui = record[OUI_COLUMN].trim().to_ascii_lowercase();
            // Quoted fields may span lines, which would break the line <-> vendor ID mapping.
            let raw_vendor: String = record[VENDOR_COLUMN]
                .chars()
                .filter(|&c| c != '"')
                .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
                .collect();
            let raw_vendor = raw_vendor.trim();

            if !is_valid_oui(&oui) {
                warn!("Line {line}: skipping invalid assignment `{oui}` ({raw_vendor})");
                stats.invalid_oui += 1;
                continue;
            }

            if let Some(filter) = filter {
                if !filter.allow_oui(&oui) || !filter.allow_vendor(raw_vendor) {
                    trace!("Line {line}: `{oui}` ({raw_vendor}) rejected by filter");
                    stats.filtered += 1;
                    continue;
                }
            }

            let vendor = simplify_vendor_name(raw_vendor);

            // 080030 is a known duplicate in the IEEE registry.
            let slot = match assigned.entry(oui) {
                MapEntry::Occupied(prev) => {
                    warn!(
                        "OUI `{}` ({}) is already registered to `{}`, skipping",
                        prev.key(),
                        vendor,
                        prev.get()
                    );
                    stats.duplicates += 1;
                    continue;
                }
                MapEntry::Vacant(slot) => slot,
            };

            let vendor_id = match vendor_ids.get(&vendor) {
                Some(&id) => id,
                None => {
                    let id = u32::try_from(vendors.len() + 1)
                        .map_err(|_| BuildError::malformed(line, "too many distinct vendors"))?;
                    vendor_ids.insert(vendor.clone(), id);
                    vendors.push(vendor.clone());
                    id
                }
            };

            entries.push(Entry {
                oui: slot.key().clone(),
                vendor_id,
            });
            slot.insert(vendor);
        }

        entries.sort_by_cached_key(|e| u32::from_str_radix(&e.oui, 16).unwrap_or(u32::MAX));

        debug!("{stats:?}");
        info!(
            "Parsed registry: {} entries, {} vendors ({} duplicates skipped)",
            entries.len(),
            vendors.len(),
            stats.duplicates
        );

        Ok(Dataset {
            entries,
            vendors,
            stats,
        })
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn vendors(&self) -> &[String] {
        &self.vendors
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Vendor name for a 1-based vendor ID.
    pub fn vendor(&self, id: u32) -> Option<&str> {
        let idx = usize::try_from(id).ok()?.checked_sub(1)?;
        self.vendors.get(idx).map(String::as_str)
    }

    /// Writes `<oui>,<vendor id>` lines.
    pub fn write_entries<W: Write>(&self, mut w: W) -> io::Result<()> {
        for entry in &self.entries {
            writeln!(w, "{},{}", entry.oui, entry.vendor_id)?;
        }
        w.flush()
    }

    /// Writes one vendor name per line, in vendor ID order.
    pub fn write_vendors<W: Write>(&self, mut w: W) -> io::Result<()> {
        for vendor in &self.vendors {
            writeln!(w, "{vendor}")?;
        }
        w.flush()
    }

    /// Writes entries, vendors and the vendor offset index into `dir`.
    ///
    /// All files are first written to temporary files in `dir` and only moved into
    /// place once every one of them is complete. The index is moved first and the
    /// entries last; if a move fails, the files already moved are removed again so
    /// the directory never holds a mix of old and new tables that opens cleanly.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>, files: &DatasetFiles) -> BuildResult<BuildSummary> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| BuildError::io("create directory", dir, e))?;

        let mut buf = Vec::new();
        self.write_entries(&mut buf)
            .map_err(|e| BuildError::io("serialize", &files.entries, e))?;
        let entries_tmp = write_temp(dir, &files.entries, &buf)?;

        buf.clear();
        self.write_vendors(&mut buf)
            .map_err(|e| BuildError::io("serialize", &files.vendors, e))?;
        let vendors_tmp = write_temp(dir, &files.vendors, &buf)?;

        let vendors_file = vendors_tmp
            .reopen()
            .map_err(|e| BuildError::io("reopen", vendors_tmp.path(), e))?;
        let index = OffsetIndex::scan(BufReader::new(vendors_file))
            .map_err(|e| BuildError::io("index", vendors_tmp.path(), e))?;
        let index_tmp = write_temp(dir, &files.index, &index.to_bytes())?;

        debug_assert_eq!(index.lines(), self.vendors.len());

        let mut persisted: Vec<PathBuf> = Vec::with_capacity(3);
        for (tmp, name) in [
            (index_tmp, &files.index),
            (vendors_tmp, &files.vendors),
            (entries_tmp, &files.entries),
        ] {
            let path = dir.join(name);
            if let Err(e) = tmp.persist(&path) {
                for done in &persisted {
                    if let Err(rm) = fs::remove_file(done) {
                        warn!("Failed to remove partially written `{}`: {rm}", done.display());
                    }
                }
                return Err(BuildError::io("persist", path, e.error));
            }
            persisted.push(path);
        }

        info!(
            "Wrote dataset to `{}`: {} entries, {} vendors",
            dir.display(),
            self.entries.len(),
            self.vendors.len()
        );

        Ok(BuildSummary {
            stats: self.stats,
            entries: self.entries.len(),
            vendors: self.vendors.len(),
        })
    }
}

/// Parses `reader` and writes the resulting dataset into `dir`.
pub fn build_dataset<R: Read>(
    reader: R,
    dir: impl AsRef<Path>,
    files: &DatasetFiles,
    filter: Option<&Filter>,
) -> BuildResult<BuildSummary> {
    Dataset::from_registry(reader, filter)?.write_to_dir(dir, files)
}

fn read_record<R: Read>(csv: &mut csv::Reader<R>, record: &mut StringRecord) -> BuildResult<bool> {
    csv.read_record(record).map_err(|e| {
        let line = e.position().map_or(0, |p| p.line());
        BuildError::malformed(line, e.to_string())
    })
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

fn write_temp(dir: &Path, name: &str, contents: &[u8]) -> BuildResult<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| BuildError::io("create temporary file in", dir, e))?;

    tmp.write_all(contents)
        .and_then(|_| tmp.flush())
        .map_err(|e| BuildError::io("write", dir.join(name), e))?;

    // Temporary files are created owner-only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(DATASET_FILE_MODE))
            .map_err(|e| BuildError::io("set permissions of", dir.join(name), e))?;
    }

    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "Registry,Assignment,Organization Name,Organization Address\n";

    fn registry(rows: &[&str]) -> String {
        let mut s = HEADER.to_owned();
        for row in rows {
            s.push_str(row);
            s.push('\n');
        }
        s
    }

    fn entries_of(dataset: &Dataset) -> Vec<(&str, u32)> {
        dataset
            .entries()
            .iter()
            .map(|e| (e.oui.as_str(), e.vendor_id))
            .collect()
    }

    #[test]
    fn test_assigns_ids_in_first_seen_order_and_sorts_by_oui() {
        let input = registry(&[
            "MA-L,FCFBFB,Cisco Systems Inc,San Jose",
            "MA-L,00000C,\"Cisco Systems, Inc\",San Jose",
            "MA-L,B827EB,Raspberry Pi Foundation,Cambridge",
            "MA-L,0A0000,Cisco Systems,San Jose",
        ]);

        let dataset = Dataset::from_registry(input.as_bytes(), None).unwrap();

        assert_eq!(dataset.vendors(), &["Cisco Systems", "Raspberry Pi Foundation"]);
        assert_eq!(
            entries_of(&dataset),
            vec![("00000c", 1), ("0a0000", 1), ("b827eb", 2), ("fcfbfb", 1)]
        );
        assert_eq!(dataset.vendor(2), Some("Raspberry Pi Foundation"));
        assert_eq!(dataset.vendor(0), None);
        assert_eq!(dataset.vendor(3), None);
    }

    #[test]
    fn test_first_occurrence_wins() {
        crate::ensure_env_logger_initialized();
        let input = registry(&[
            "MA-L,080030,NETWORK RESEARCH CORPORATION,US",
            "MA-L,080030,ROYAL MELBOURNE INST OF TECH,AU",
        ]);

        let dataset = Dataset::from_registry(input.as_bytes(), None).unwrap();

        assert_eq!(dataset.vendors(), &["NETWORK RESEARCH"]);
        assert_eq!(entries_of(&dataset), vec![("080030", 1)]);
        assert_eq!(dataset.stats().duplicates, 1);
    }

    #[test]
    fn test_filter_is_applied_before_assignment() {
        let input = registry(&[
            "MA-L,001122,Sony Corp,JP",
            "MA-L,0CB4A4,Sony Corp,JP",
            "MA-L,0CB4A5,Apple Inc,US",
        ]);
        let filter = Filter::new().vendor_names(["Sony"]).ouis(["0cb4a4"]);

        let dataset = Dataset::from_registry(input.as_bytes(), Some(&filter)).unwrap();

        assert_eq!(entries_of(&dataset), vec![("0cb4a4", 1)]);
        assert_eq!(dataset.vendors(), &["Sony"]);
        assert_eq!(dataset.stats().filtered, 2);
    }

    #[test]
    fn test_filtered_rows_do_not_consume_duplicates() {
        // A row rejected by the filter must not block a later, accepted row for the same OUI.
        let input = registry(&["MA-L,0CB4A4,Apple Inc,US", "MA-L,0CB4A4,Sony Corp,JP"]);
        let filter = Filter::new().vendor_names(["Sony"]);

        let dataset = Dataset::from_registry(input.as_bytes(), Some(&filter)).unwrap();
        assert_eq!(dataset.vendors(), &["Sony"]);
        assert_eq!(dataset.stats().duplicates, 0);
    }

    #[test]
    fn test_invalid_assignments_are_skipped() {
        let input = registry(&["MA-M,0CB4A41,Too Long,XX", "MA-L,ZZZZZZ,Not Hex,XX", "MA-L,0cb4a4,Ok,XX"]);

        let dataset = Dataset::from_registry(input.as_bytes(), None).unwrap();
        assert_eq!(entries_of(&dataset), vec![("0cb4a4", 1)]);
        assert_eq!(dataset.stats().invalid_oui, 2);
        assert_eq!(dataset.stats().rows, 3);
    }

    #[test]
    fn test_multiline_vendor_names_stay_on_one_line() {
        let input = registry(&["MA-L,0CB4A4,\"Two\nLines Inc\",JP"]);

        let dataset = Dataset::from_registry(input.as_bytes(), None).unwrap();
        assert_eq!(dataset.vendors(), &["Two Lines"]);
    }

    #[test]
    fn test_malformed_input() {
        let err = Dataset::from_registry("".as_bytes(), None).unwrap_err();
        assert!(matches!(err, BuildError::MalformedInput { .. }));

        let err = Dataset::from_registry("Registry,Assignment\n".as_bytes(), None).unwrap_err();
        assert!(matches!(err, BuildError::MalformedInput { line: 1, .. }));

        let input = registry(&["MA-L,001122,Fine,XX", "MA-L,001123"]);
        let err = Dataset::from_registry(input.as_bytes(), None).unwrap_err();
        assert!(matches!(err, BuildError::MalformedInput { line: 3, .. }));
    }

    #[test]
    fn test_serialized_tables() {
        let input = registry(&["MA-L,0CB4A4,Sony Corp,JP", "MA-L,000001,Xerox Corporation,US"]);
        let dataset = Dataset::from_registry(input.as_bytes(), None).unwrap();

        let mut entries = Vec::new();
        dataset.write_entries(&mut entries).unwrap();
        assert_eq!(String::from_utf8(entries).unwrap(), "000001,2\n0cb4a4,1\n");

        let mut vendors = Vec::new();
        dataset.write_vendors(&mut vendors).unwrap();
        assert_eq!(String::from_utf8(vendors).unwrap(), "Sony\nXerox\n");
    }

    #[test]
    fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("data");
        let input = registry(&["MA-L,0CB4A4,Sony Corp,JP", "MA-L,000001,Xerox Corporation,US"]);

        let files = DatasetFiles::default();
        let summary = build_dataset(input.as_bytes(), &out, &files, None).unwrap();

        assert_eq!(summary.entries, 2);
        assert_eq!(summary.vendors, 2);
        assert_eq!(fs::read_to_string(out.join("vendors")).unwrap(), "Sony\nXerox\n");

        let index = OffsetIndex::from_bytes(&fs::read(out.join("vendors.index")).unwrap()).unwrap();
        assert_eq!(index.offsets(), &[0, 5, 11]);

        // Only the three dataset files remain, no temporary leftovers.
        assert_eq!(fs::read_dir(&out).unwrap().count(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_dataset_files_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let input = registry(&["MA-L,0CB4A4,Sony Corp,JP"]);
        let files = DatasetFiles::default();
        build_dataset(input.as_bytes(), dir.path(), &files, None).unwrap();

        for name in files.names() {
            let mode = fs::metadata(dir.path().join(name)).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644, "unexpected mode of `{name}`");
        }
    }

    #[test]
    fn test_failed_persist_leaves_no_partial_dataset() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory where the entries file should go cannot be replaced.
        let blocker = dir.path().join("entries");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), "").unwrap();

        let input = registry(&["MA-L,0CB4A4,Sony Corp,JP"]);
        let err = build_dataset(input.as_bytes(), dir.path(), &DatasetFiles::default(), None).unwrap_err();

        assert!(
            matches!(err, BuildError::Io { action: "persist", .. }),
            "unexpected error {err:?}"
        );
        assert!(!dir.path().join("vendors").exists());
        assert!(!dir.path().join("vendors.index").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}

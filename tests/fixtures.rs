#![allow(dead_code)]
use std::fs;
use std::path::{Path, PathBuf};

use std::sync::Once;

static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}

pub fn samples_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("samples")
        .canonicalize()
        .unwrap()
}

/// A small excerpt of the IEEE MA-L registry, including the three `080030` assignments.
pub fn sample_registry() -> PathBuf {
    samples_dir().join("oui_sample.csv")
}

pub fn index_bytes(offsets: &[i64]) -> Vec<u8> {
    offsets.iter().flat_map(|o| o.to_le_bytes()).collect()
}

/// Offsets of every line start in `text`, followed by its length.
pub fn line_offsets(text: &str) -> Vec<i64> {
    let mut offsets = vec![0];
    let mut pos = 0;
    for line in text.split_inclusive('\n') {
        pos += line.len() as i64;
        offsets.push(pos);
    }
    offsets
}

/// Writes a hand made dataset with the default file names into `dir`.
pub fn write_dataset(dir: &Path, entries: &str, vendors: &str) {
    fs::write(dir.join("entries"), entries).unwrap();
    fs::write(dir.join("vendors"), vendors).unwrap();
    fs::write(dir.join("vendors.index"), index_bytes(&line_offsets(vendors))).unwrap();
}

/// The `Vendor One` / `Vendor Two` dataset.
pub fn write_two_vendor_dataset(dir: &Path) {
    write_dataset(dir, "abcdef,1\nabcd12,2\n", "Vendor One\nVendor Two\n");
}

//! OUI (MAC address prefix) to vendor lookups backed by three flat files.
//!
//! A dataset consists of:
//!
//! - `entries`: `<oui>,<vendor id>` rows sorted by OUI,
//! - `vendors`: one normalized vendor name per line, line `n` is vendor ID `n`,
//! - `vendors.index`: little-endian `i64` line offsets into `vendors`.
//!
//! Datasets are produced from the IEEE registry CSV with [`build_dataset`] (or the
//! `ouidb build` command) and served by [`OuiDb`].
//!
//! ```no_run
//! use ouidb::{OpenSettings, OuiDb};
//!
//! let db = OuiDb::open(OpenSettings::new().dir("/var/lib/ouidb")).unwrap();
//! if let Some(vendor) = db.lookup("b8:27:eb:12:34:56") {
//!     println!("{vendor}");
//! }
//! ```
#![deny(unused_must_use)]
#![forbid(unsafe_code)]

pub mod builder;
pub mod db;
pub mod err;
pub mod filter;
pub mod index;
pub mod normalize;
pub mod settings;
pub mod source;

pub use builder::{BuildStats, BuildSummary, Dataset, Entry, build_dataset};
pub use db::{OuiDb, lookup};
pub use err::{BuildError, FilterError, IndexError, OpenError};
pub use filter::Filter;
pub use index::{OffsetIndex, create_index};
pub use settings::{DataSource, DatasetFiles, OpenSettings};
pub use source::{
    BuildOnDemandResolver, DirSource, FileSource, MemorySource, RegistryFetcher, SourceResolver,
    StaticResolver,
};

#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
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
            .is_test(true)
            .init();
    });
}

//! Named-file sources a dataset can be loaded from, and the resolvers that
//! decide which source [`crate::OuiDb::open`] ends up reading.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use crate::builder::build_dataset;
use crate::err::{OpenError, OpenResult};
use crate::settings::{DataSource, OpenSettings};

/// A read-only collection of named files.
pub trait FileSource: Send + Sync {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + '_>>;

    fn read_all(&self, name: &str) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open(name)?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn contains(&self, name: &str) -> bool;

    /// Human readable description, used in error messages.
    fn describe(&self) -> String;
}

/// Files in a directory on disk.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        DirSource {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileSource for DirSource {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
        let file = File::open(self.root.join(name))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn read_all(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.root.join(name))
    }

    fn contains(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }

    fn describe(&self) -> String {
        format!("directory `{}`", self.root.display())
    }
}

/// Files held in memory, typically embedded with `include_bytes!`.
///
/// ```
/// use ouidb::{MemorySource, OpenSettings, OuiDb};
///
/// let index = [0i64, 11].iter().flat_map(|o| o.to_le_bytes()).collect::<Vec<u8>>();
///
/// let source = MemorySource::new()
///     .with_file("entries", &b"abcdef,1\n"[..])
///     .with_file("vendors", &b"Vendor One\n"[..])
///     .with_file("vendors.index", index);
///
/// let db = OuiDb::open(OpenSettings::new().source(source)).unwrap();
/// assert_eq!(db.lookup("ab:cd:ef:00:00:01"), Some("Vendor One"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, Cow<'static, [u8]>>,
}

impl MemorySource {
    pub fn new() -> Self {
        MemorySource::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, bytes: impl Into<Cow<'static, [u8]>>) -> Self {
        self.files.insert(name.into(), bytes.into());
        self
    }

    fn get(&self, name: &str) -> io::Result<&[u8]> {
        self.files.get(name).map(|b| &**b).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("`{name}` is not part of the in-memory source"),
            )
        })
    }
}

impl FileSource for MemorySource {
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.get(name)?)))
    }

    fn read_all(&self, name: &str) -> io::Result<Vec<u8>> {
        self.get(name).map(<[u8]>::to_vec)
    }

    fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    fn describe(&self) -> String {
        format!("in-memory source ({} files)", self.files.len())
    }
}

/// Supplies the raw registry CSV a dataset is built from.
///
/// Downloading the registry is left to the embedding application; this crate
/// ships an implementation for local files only.
pub trait RegistryFetcher: Send + Sync {
    fn fetch(&self) -> io::Result<Box<dyn Read>>;

    fn describe(&self) -> String;
}

impl RegistryFetcher for PathBuf {
    fn fetch(&self) -> io::Result<Box<dyn Read>> {
        Ok(Box::new(BufReader::new(File::open(self)?)))
    }

    fn describe(&self) -> String {
        self.display().to_string()
    }
}

/// Decides which [`FileSource`] a database is loaded from.
pub trait SourceResolver {
    fn resolve(&self, settings: &OpenSettings) -> OpenResult<Arc<dyn FileSource>>;
}

/// Uses the configured source as-is, failing when dataset files are missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticResolver;

impl SourceResolver for StaticResolver {
    fn resolve(&self, settings: &OpenSettings) -> OpenResult<Arc<dyn FileSource>> {
        let source: Arc<dyn FileSource> = match settings.get_source() {
            DataSource::Dir(path) => Arc::new(DirSource::new(path)),
            DataSource::Custom(source) => Arc::clone(source),
        };

        if let Some(missing) = first_missing(source.as_ref(), settings) {
            return Err(OpenError::DatasetNotFound {
                source_desc: source.describe(),
                name: missing.to_owned(),
            });
        }

        Ok(source)
    }
}

/// Builds the dataset into the configured directory when it is missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildOnDemandResolver;

impl SourceResolver for BuildOnDemandResolver {
    fn resolve(&self, settings: &OpenSettings) -> OpenResult<Arc<dyn FileSource>> {
        let DataSource::Dir(dir) = settings.get_source() else {
            return Err(OpenError::NoRegistry {
                missing: "a directory data source",
            });
        };

        let source = DirSource::new(dir);
        if first_missing(&source, settings).is_none() {
            return Ok(Arc::new(source));
        }

        let registry = settings.get_registry().ok_or(OpenError::NoRegistry {
            missing: "a registry fetcher",
        })?;

        info!(
            "Dataset not found in `{}`, building from `{}`",
            dir.display(),
            registry.describe()
        );

        let reader = registry
            .fetch()
            .map_err(|e| OpenError::io("fetch registry", registry.describe(), e))?;

        build_dataset(reader, dir, settings.get_files(), settings.get_filter())?;

        Ok(Arc::new(source))
    }
}

/// Picks the resolver matching `settings.build_on_demand`.
pub fn resolver_for(settings: &OpenSettings) -> Box<dyn SourceResolver> {
    if settings.should_build_on_demand() {
        Box::new(BuildOnDemandResolver)
    } else {
        Box::new(StaticResolver)
    }
}

fn first_missing<'a>(source: &dyn FileSource, settings: &'a OpenSettings) -> Option<&'a str> {
    settings
        .get_files()
        .names()
        .into_iter()
        .find(|name| !source.contains(name))
}

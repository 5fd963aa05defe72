use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::filter::Filter;
use crate::source::{FileSource, RegistryFetcher};

pub const DEFAULT_ENTRIES_NAME: &str = "entries";
pub const DEFAULT_VENDORS_NAME: &str = "vendors";
pub const DEFAULT_INDEX_NAME: &str = "vendors.index";

/// Names of the three files making up a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFiles {
    pub entries: String,
    pub vendors: String,
    pub index: String,
}

impl Default for DatasetFiles {
    fn default() -> Self {
        DatasetFiles {
            entries: DEFAULT_ENTRIES_NAME.to_owned(),
            vendors: DEFAULT_VENDORS_NAME.to_owned(),
            index: DEFAULT_INDEX_NAME.to_owned(),
        }
    }
}

impl DatasetFiles {
    pub fn names(&self) -> [&str; 3] {
        [
            self.entries.as_str(),
            self.vendors.as_str(),
            self.index.as_str(),
        ]
    }
}

/// Where a dataset is loaded from.
#[derive(Clone)]
pub enum DataSource {
    /// A directory on disk. Required for building datasets on demand.
    Dir(PathBuf),
    /// Any other source, e.g. a [`crate::MemorySource`] wrapping embedded bytes.
    Custom(Arc<dyn FileSource>),
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Dir(path) => f.debug_tuple("Dir").field(path).finish(),
            DataSource::Custom(source) => f.debug_tuple("Custom").field(&source.describe()).finish(),
        }
    }
}

/// Configuration for [`crate::OuiDb::open`].
///
/// ```
/// use ouidb::OpenSettings;
///
/// let settings = OpenSettings::new()
///     .dir("/var/lib/ouidb")
///     .index_name("vendors.idx");
/// assert_eq!(settings.get_files().index, "vendors.idx");
/// ```
#[derive(Clone)]
pub struct OpenSettings {
    source: DataSource,
    files: DatasetFiles,
    filter: Option<Filter>,
    build_on_demand: bool,
    registry: Option<Arc<dyn RegistryFetcher>>,
}

impl Default for OpenSettings {
    fn default() -> Self {
        OpenSettings {
            source: DataSource::Dir(PathBuf::from(".")),
            files: DatasetFiles::default(),
            filter: None,
            build_on_demand: false,
            registry: None,
        }
    }
}

impl fmt::Debug for OpenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenSettings")
            .field("source", &self.source)
            .field("files", &self.files)
            .field("filter", &self.filter)
            .field("build_on_demand", &self.build_on_demand)
            .field("registry", &self.registry.as_ref().map(|r| r.describe()))
            .finish()
    }
}

impl OpenSettings {
    pub fn new() -> Self {
        OpenSettings::default()
    }

    /// Loads the dataset from a directory on disk.
    pub fn dir(mut self, path: impl AsRef<Path>) -> Self {
        self.source = DataSource::Dir(path.as_ref().to_path_buf());
        self
    }

    /// Loads the dataset from an arbitrary file source.
    pub fn source(mut self, source: impl FileSource + 'static) -> Self {
        self.source = DataSource::Custom(Arc::new(source));
        self
    }

    pub fn files(mut self, files: DatasetFiles) -> Self {
        self.files = files;
        self
    }

    // Empty names keep the current value.
    pub fn entries_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.files.entries = name;
        }
        self
    }

    pub fn vendors_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.files.vendors = name;
        }
        self
    }

    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.files.index = name;
        }
        self
    }

    /// Filter applied when a dataset is built on demand. Has no effect on an
    /// existing dataset.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// When set, a missing dataset is built from the configured registry
    /// instead of failing with [`crate::OpenError::DatasetNotFound`].
    pub fn build_on_demand(mut self, enabled: bool) -> Self {
        self.build_on_demand = enabled;
        self
    }

    pub fn registry(mut self, registry: impl RegistryFetcher + 'static) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    pub fn get_source(&self) -> &DataSource {
        &self.source
    }

    pub fn get_files(&self) -> &DatasetFiles {
        &self.files
    }

    pub fn get_filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn should_build_on_demand(&self) -> bool {
        self.build_on_demand
    }

    pub fn get_registry(&self) -> Option<&dyn RegistryFetcher> {
        self.registry.as_deref()
    }
}

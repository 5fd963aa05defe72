use std::collections::HashSet;
use std::fs;
use std::path::Path;

use regex::Regex;

use crate::err::FilterError;
use crate::normalize::{parse_oui_filter_entry, simplify_vendor_name};

/// Restricts a generated dataset to a subset of vendors and/or OUIs.
///
/// A filter is only consulted while building a dataset, lookups never see it.
/// Vendor names and the regex are compared against simplified names (see
/// [`simplify_vendor_name`]), OUIs are compared as six lowercase hex characters.
///
/// ```
/// use ouidb::Filter;
///
/// let filter = Filter::new().vendor_names(["Sony"]).ouis(["0C:B4:A4"]);
/// assert!(filter.allow_oui("0cb4a4"));
/// assert!(filter.allow_vendor("Sony Corp"));
/// assert!(!filter.allow_oui("001122"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Filter {
    vendor_set: HashSet<String>,
    vendor_regex: Option<Regex>,
    oui_set: HashSet<String>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    pub fn vendor_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.vendor_set.extend(
            names
                .into_iter()
                .map(|name| simplify_vendor_name(name.as_ref()))
                .filter(|name| !name.is_empty()),
        );
        self
    }

    pub fn vendor_regex(mut self, pattern: &str) -> Result<Self, FilterError> {
        let regex = Regex::new(pattern).map_err(|e| FilterError::InvalidRegex {
            pattern: pattern.to_owned(),
            source: e,
        })?;
        self.vendor_regex = Some(regex);
        Ok(self)
    }

    /// Adds OUIs in any common notation (`0CB4A4`, `0c:b4:a4`, `0c-b4-a4-11`).
    /// Entries with fewer than six hex digits are dropped.
    pub fn ouis<I, S>(mut self, ouis: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.oui_set.extend(
            ouis.into_iter()
                .filter_map(|oui| parse_oui_filter_entry(oui.as_ref())),
        );
        self
    }

    /// Merges vendor names listed one per line in `path`.
    pub fn vendor_names_from_file(self, path: impl AsRef<Path>) -> Result<Self, FilterError> {
        let lines = read_lines(path.as_ref())?;
        Ok(self.vendor_names(lines))
    }

    /// Merges OUIs listed one per line in `path`.
    pub fn ouis_from_file(self, path: impl AsRef<Path>) -> Result<Self, FilterError> {
        let lines = read_lines(path.as_ref())?;
        Ok(self.ouis(lines))
    }

    /// True when the filter accepts everything.
    pub fn is_empty(&self) -> bool {
        self.vendor_set.is_empty() && self.oui_set.is_empty() && self.vendor_regex.is_none()
    }

    pub fn allow_oui(&self, oui: &str) -> bool {
        self.oui_set.is_empty() || self.oui_set.contains(&oui.to_ascii_lowercase())
    }

    pub fn allow_vendor(&self, name: &str) -> bool {
        let simplified = simplify_vendor_name(name);

        if !self.vendor_set.is_empty() && !self.vendor_set.contains(&simplified) {
            return false;
        }

        match &self.vendor_regex {
            Some(regex) => regex.is_match(&simplified),
            None => true,
        }
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>, FilterError> {
    let text = fs::read_to_string(path).map_err(|e| FilterError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_accepts_everything() {
        let filter = Filter::new();
        assert!(filter.is_empty());
        assert!(filter.allow_oui("001122"));
        assert!(filter.allow_vendor("Anything At All, Inc."));
    }

    #[test]
    fn test_vendor_set_is_compared_simplified() {
        let filter = Filter::new().vendor_names(["Sony Corporation", "  ", "Apple, Inc."]);

        assert!(!filter.is_empty());
        assert!(filter.allow_vendor("Sony Corp"));
        assert!(filter.allow_vendor("\"Apple Inc\""));
        assert!(!filter.allow_vendor("Samsung"));
    }

    #[test]
    fn test_regex_applies_to_simplified_name() {
        let filter = Filter::new().vendor_regex("^Raspberry Pi").unwrap();

        assert!(filter.allow_vendor("Raspberry Pi Trading Ltd"));
        assert!(!filter.allow_vendor("Espressif Inc."));
    }

    #[test]
    fn test_vendor_set_and_regex_are_conjunctive() {
        let filter = Filter::new()
            .vendor_names(["Sony", "Samsung"])
            .vendor_regex("^S.n")
            .unwrap();

        assert!(filter.allow_vendor("Sony"));
        assert!(!filter.allow_vendor("Samsung"));
    }

    #[test]
    fn test_oui_set_drops_malformed_entries() {
        let filter = Filter::new().ouis(["0C:B4:A4", "00.11.22.33", "abc", "xyzxyz"]);

        assert!(filter.allow_oui("0cb4a4"));
        assert!(filter.allow_oui("0CB4A4"));
        assert!(filter.allow_oui("001122"));
        assert!(!filter.allow_oui("000abc"));
        assert!(!filter.allow_oui("xyzxyz"));
    }

    #[test]
    fn test_invalid_regex() {
        let err = Filter::new().vendor_regex("(unclosed").unwrap_err();
        assert!(matches!(err, FilterError::InvalidRegex { .. }));
    }

    #[test]
    fn test_file_sourced_entries_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        let vendors = dir.path().join("vendors.txt");
        let ouis = dir.path().join("ouis.txt");
        std::fs::write(&vendors, "Sony Corp\n\n  Espressif Inc.  \n").unwrap();
        std::fs::write(&ouis, "0c:b4:a4\n\n24-0A-C4\n").unwrap();

        let filter = Filter::new()
            .vendor_names(["Apple"])
            .vendor_names_from_file(&vendors)
            .unwrap()
            .ouis_from_file(&ouis)
            .unwrap();

        assert!(filter.allow_vendor("Apple"));
        assert!(filter.allow_vendor("Sony"));
        assert!(filter.allow_vendor("Espressif"));
        assert!(filter.allow_oui("240ac4"));
        assert!(!filter.allow_oui("001122"));
    }

    #[test]
    fn test_missing_filter_file() {
        let err = Filter::new().ouis_from_file("/definitely/not/here").unwrap_err();
        assert!(matches!(err, FilterError::Io { .. }));
    }
}

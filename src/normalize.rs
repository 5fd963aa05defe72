//! Vendor name and hardware address normalization.
//!
//! Vendor names in the IEEE registry carry a lot of incidental noise
//! ("Foo, Inc.", "Foo Inc", "\"Foo\" GmbH"). Collapsing them to one canonical
//! spelling is what keeps the vendor table small.

use regex::Regex;
use std::sync::LazyLock;

/// Number of characters in an OUI (24 bits, hex encoded).
pub const OUI_LEN: usize = 6;

/// An OUI in its canonical form: six lowercase ASCII hex characters.
pub type Oui = [u8; OUI_LEN];

// Applied in order, each one strips at most a single trailing suffix.
static SUFFIX_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        suffix_regex(r"llc|ltd|limited|inc|incorporated"),
        suffix_regex(r"co|company|corp|corporation"),
        suffix_regex(r"gmbh"),
    ]
});

fn suffix_regex(alternatives: &str) -> Regex {
    Regex::new(&format!(r"(?i),?\s*(?:{alternatives})\.?$"))
        .expect("suffix patterns are static and valid")
}

/// Strips corporate suffixes, quotes and surrounding whitespace from a vendor name.
///
/// ```
/// use ouidb::normalize::simplify_vendor_name;
///
/// assert_eq!(simplify_vendor_name("  \"Sony\" Corp. "), "Sony");
/// assert_eq!(simplify_vendor_name("Intel Corporate"), "Intel Corporate");
/// ```
pub fn simplify_vendor_name(raw: &str) -> String {
    let mut name = raw.trim().replace('"', "");

    for pattern in SUFFIX_PATTERNS.iter() {
        if let Some(m) = pattern.find(&name) {
            name.truncate(m.start());
        }
    }

    name.trim().to_owned()
}

#[inline]
fn is_separator(c: char) -> bool {
    matches!(c, ':' | '-' | '.' | ' ')
}

/// Removes MAC address separators (`:`, `-`, `.` and space).
pub fn clean_hardware_address(s: &str) -> String {
    s.chars().filter(|&c| !is_separator(c)).collect()
}

/// Normalizes a lookup query (a MAC address or an OUI in any common notation)
/// into the key used by the entries table.
///
/// Returns `None` when fewer than six characters remain after removing separators.
/// Longer inputs are truncated, so full MAC addresses are accepted.
pub fn oui_prefix(query: &str) -> Option<Oui> {
    let mut key = [0u8; OUI_LEN];
    let mut filled = 0;

    for b in query.bytes().filter(|&b| !is_separator(b as char)) {
        key[filled] = b.to_ascii_lowercase();
        filled += 1;
        if filled == OUI_LEN {
            return Some(key);
        }
    }

    None
}

/// Normalizes an OUI given on a filter list.
///
/// Unlike [`oui_prefix`], the result must be valid hex, malformed entries yield `None`.
pub fn parse_oui_filter_entry(s: &str) -> Option<String> {
    let cleaned = clean_hardware_address(s.trim()).to_ascii_lowercase();
    let prefix = cleaned.get(..OUI_LEN)?;

    if prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(prefix.to_owned())
    } else {
        None
    }
}

/// Checks that `oui` is exactly six hex digits.
pub fn is_valid_oui(oui: &str) -> bool {
    oui.len() == OUI_LEN && oui.bytes().all(|b| b.is_ascii_hexdigit())
}

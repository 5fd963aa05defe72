//! Binary line-offset index for newline-delimited text files.
//!
//! ## Format
//!
//! A sequence of `lines + 1` little-endian `i64` values:
//!
//! - `offset[i]` is the byte position where line `i` (0-based) starts,
//! - `offset[lines]` is the total length of the text file.
//!
//! Entry `i` lives at byte `8 * i` of the index file, so a single line can be
//! located without scanning either file.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use log::debug;

use crate::err::IndexError;

/// Width of a single encoded offset.
pub const OFFSET_WIDTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetIndex {
    offsets: Vec<i64>,
}

impl OffsetIndex {
    /// Scans `reader` line by line and records where every line starts.
    ///
    /// The running offset advances by the bytes actually consumed, so the final
    /// entry equals the input length even if the last line has no trailing newline.
    pub fn scan<R: BufRead>(mut reader: R) -> io::Result<Self> {
        let mut offsets = vec![0i64];
        let mut offset = 0i64;
        let mut line = Vec::new();

        loop {
            line.clear();
            let consumed = reader.read_until(b'\n', &mut line)?;
            if consumed == 0 {
                break;
            }

            offset += consumed as i64;
            offsets.push(offset);
        }

        Ok(OffsetIndex { offsets })
    }

    /// Decodes an index previously written by [`OffsetIndex::write_to`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        if bytes.is_empty() {
            return Err(IndexError::Empty);
        }

        if bytes.len() % OFFSET_WIDTH != 0 {
            return Err(IndexError::TruncatedEntry {
                len: bytes.len(),
                width: OFFSET_WIDTH,
            });
        }

        let offsets = bytes
            .chunks_exact(OFFSET_WIDTH)
            .map(LittleEndian::read_i64)
            .collect();

        Ok(OffsetIndex { offsets })
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        for &offset in &self.offsets {
            w.write_i64::<LittleEndian>(offset)?;
        }
        w.flush()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.offsets.len() * OFFSET_WIDTH);
        for &offset in &self.offsets {
            buf.extend_from_slice(&offset.to_le_bytes());
        }
        buf
    }

    /// Number of indexed lines.
    pub fn lines(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    /// Returns `(start, end)` of line `line` (0-based), as recorded in the index.
    ///
    /// The values are returned unchecked; a corrupted index may yield spans outside
    /// of the data file.
    pub fn line_span(&self, line: usize) -> Option<(i64, i64)> {
        let start = *self.offsets.get(line)?;
        let end = *self.offsets.get(line.checked_add(1)?)?;
        Some((start, end))
    }
}

/// Builds the offset index of `data_path` and writes it to `index_path`.
pub fn create_index(
    data_path: impl AsRef<Path>,
    index_path: impl AsRef<Path>,
) -> Result<OffsetIndex, IndexError> {
    let data_path = data_path.as_ref();
    let index_path = index_path.as_ref();

    let file = File::open(data_path).map_err(|e| IndexError::Io {
        action: "open",
        path: data_path.to_path_buf(),
        source: e,
    })?;

    let index = OffsetIndex::scan(BufReader::new(file)).map_err(|e| IndexError::Io {
        action: "scan",
        path: data_path.to_path_buf(),
        source: e,
    })?;

    let out = File::create(index_path).map_err(|e| IndexError::Io {
        action: "create",
        path: index_path.to_path_buf(),
        source: e,
    })?;

    index
        .write_to(BufWriter::new(out))
        .map_err(|e| IndexError::Io {
            action: "write",
            path: index_path.to_path_buf(),
            source: e,
        })?;

    debug!(
        "Indexed {} lines of `{}` into `{}`",
        index.lines(),
        data_path.display(),
        index_path.display()
    );

    Ok(index)
}

/// Default index file name for a data file: `<data file>.index`.
pub fn default_index_path(data_path: impl AsRef<Path>) -> std::path::PathBuf {
    let mut name = data_path.as_ref().as_os_str().to_owned();
    name.push(".index");
    name.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_scan_records_line_starts() {
        let index = OffsetIndex::scan(Cursor::new("Vendor One\nVendor Two\n")).unwrap();

        assert_eq!(index.offsets(), &[0, 11, 22]);
        assert_eq!(index.lines(), 2);
        assert_eq!(index.line_span(1), Some((11, 22)));
        assert_eq!(index.line_span(2), None);
    }

    #[test]
    fn test_scan_without_trailing_newline() {
        let index = OffsetIndex::scan(Cursor::new("a\nbc")).unwrap();
        assert_eq!(index.offsets(), &[0, 2, 4]);
    }

    #[test]
    fn test_scan_empty_input() {
        let index = OffsetIndex::scan(Cursor::new("")).unwrap();
        assert_eq!(index.offsets(), &[0]);
        assert_eq!(index.lines(), 0);
    }

    #[test]
    fn test_encoding_is_little_endian_i64() {
        let index = OffsetIndex::scan(Cursor::new("ab\n")).unwrap();
        let bytes = index.to_bytes();

        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[8..], &[3, 0, 0, 0, 0, 0, 0, 0]);

        let mut written = Vec::new();
        index.write_to(&mut written).unwrap();
        assert_eq!(written, bytes);
        assert_eq!(OffsetIndex::from_bytes(&bytes).unwrap(), index);
    }

    #[test]
    fn test_rejects_empty_and_truncated() {
        assert!(matches!(OffsetIndex::from_bytes(&[]), Err(IndexError::Empty)));
        assert!(matches!(
            OffsetIndex::from_bytes(&[0u8; 12]),
            Err(IndexError::TruncatedEntry { len: 12, width: 8 })
        ));
    }

    #[test]
    fn test_create_index_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("vendors");
        std::fs::write(&data, "First\nSecond\r\nThird\n").unwrap();

        let index_path = default_index_path(&data);
        let index = create_index(&data, &index_path).unwrap();

        assert_eq!(index.offsets(), &[0, 6, 14, 20]);
        assert_eq!(std::fs::read(&index_path).unwrap(), index.to_bytes());
        assert!(index_path.ends_with("vendors.index"));
    }

    #[test]
    fn test_create_index_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = create_index(dir.path().join("nope"), dir.path().join("nope.index")).unwrap_err();
        assert!(matches!(err, IndexError::Io { action: "open", .. }));
    }
}

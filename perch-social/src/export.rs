//! Line-oriented batch export for collected items.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;

/// Write the string form of each item, one per line, in the given order.
/// Any existing file at `path` is truncated.
pub fn write_lines<T: Display>(path: &Path, items: &[T]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for item in items {
        writeln!(out, "{item}")?;
    }
    out.flush()?;
    tracing::debug!(path = %path.display(), lines = items.len(), "export.written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_item_per_line_in_order() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        write_lines(tmp.path(), &[101u64, 102, 103]).unwrap();
        assert_eq!(
            std::fs::read_to_string(tmp.path()).unwrap(),
            "101\n102\n103\n"
        );
    }

    #[test]
    fn truncates_previous_content() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "stale\n").unwrap();
        write_lines(tmp.path(), &["fresh"]).unwrap();
        assert_eq!(std::fs::read_to_string(tmp.path()).unwrap(), "fresh\n");
    }

    #[test]
    fn empty_batch_writes_an_empty_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        write_lines::<String>(tmp.path(), &[]).unwrap();
        assert_eq!(std::fs::read_to_string(tmp.path()).unwrap(), "");
    }
}

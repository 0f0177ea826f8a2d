//! ZIP container access.

use std::collections::BTreeMap;
use std::io::{Read, Seek, Write};

use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::Result;
use crate::path;

pub const MIMETYPE_PATH: &str = "mimetype";
pub const MIMETYPE: &[u8] = b"application/epub+zip";

/// Every file entry of the archive, keyed by normalized path, without the
/// `mimetype` entry.
pub fn read_entries<R: Read + Seek>(reader: R) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut archive = ZipArchive::new(reader)?;
    let mut entries = BTreeMap::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = path::normalize(file.name());
        if name.is_empty() || name == MIMETYPE_PATH {
            continue;
        }

        let mut data = Vec::with_capacity(file.size() as usize);
        if let Err(e) = file.read_to_end(&mut data) {
            warn!("Skipping unreadable archive entry {}: {}", name, e);
            continue;
        }
        if entries.insert(name.clone(), data).is_some() {
            debug!("Duplicate archive entry {}, keeping the last one", name);
        }
    }

    Ok(entries)
}

/// Write an EPUB archive: `mimetype` first and stored, then every entry
/// deflated at `compression_level` (0-9).
pub fn write_entries<'a, W, I>(writer: W, entries: I, compression_level: u32) -> Result<W>
where
    W: Write + Seek,
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut zip = ZipWriter::new(writer);

    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(compression_level.min(9) as i64));

    zip.start_file(MIMETYPE_PATH, stored)?;
    zip.write_all(MIMETYPE)?;

    for (name, data) in entries {
        zip.start_file(name, deflated)?;
        zip.write_all(data)?;
    }

    Ok(zip.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_mimetype_first_and_stored() {
        let entries = [("META-INF/container.xml", &b"<container/>"[..])];
        let cursor = write_entries(Cursor::new(Vec::new()), entries, 6).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), CompressionMethod::Stored);
    }

    #[test]
    fn test_read_entries_strips_mimetype() {
        let entries = [
            ("OEBPS/a.xhtml", &b"a"[..]),
            ("OEBPS/Text/../b.xhtml", &b"b"[..]),
        ];
        let cursor = write_entries(Cursor::new(Vec::new()), entries, 6).unwrap();

        let read = read_entries(Cursor::new(cursor.into_inner())).unwrap();
        let names: Vec<_> = read.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["OEBPS/a.xhtml", "OEBPS/b.xhtml"]);
        assert_eq!(read["OEBPS/a.xhtml"], b"a");
    }
}

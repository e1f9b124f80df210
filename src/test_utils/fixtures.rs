//! Zip archive fixtures.

use std::fs::File;
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

fn write_entries<W: Write + Seek>(writer: W, entries: &[(&str, &str)]) -> W {
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, contents) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap()
}

/// Write a zip with the given `(name, contents)` entries to `path`.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    write_entries(File::create(path).unwrap(), entries);
}

/// Zip with the given entries, in memory.
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    write_entries(Cursor::new(Vec::new()), entries).into_inner()
}

/// Entry names of the zip at `path`, in archive order.
pub fn zip_entry_names(path: &Path) -> Vec<String> {
    let archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}

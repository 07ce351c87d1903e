//! Snapshot format: whole-catalog persistence.
//!
//! ```text
//! Offset  Size  Field
//! 0       5     magic: b"TAGDB"
//! 5       1     format: u8 = 1
//! 6       ..    files table: bincode BTreeMap<FileId, FileRecord>
//! ..      ..    tags table:  bincode BTreeMap<Tag, BTreeSet<FileId>>
//! ```
//!
//! Both tables are ordered maps, so saving the same catalog twice produces
//! identical bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, FileId, FileRecord, Tag};
use crate::error::{Result, TagDbError};

/// Magic bytes at the start of every snapshot.
pub const MAGIC: [u8; 5] = *b"TAGDB";

/// Current format byte.
pub const FORMAT_VERSION: u8 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 6;

fn validate_header(header: &[u8; HEADER_SIZE]) -> Result<()> {
    if header[..5] != MAGIC {
        return Err(TagDbError::InvalidFormat(format!(
            "Not a tag database snapshot: expected TAGDB, got {:?}",
            &header[..5]
        )));
    }
    if header[5] != FORMAT_VERSION {
        return Err(TagDbError::InvalidFormat(format!(
            "Unsupported snapshot format: {}",
            header[5]
        )));
    }
    Ok(())
}

/// Serialize the catalog to `writer`.
pub fn write_snapshot<W: Write>(catalog: &Catalog, writer: &mut W) -> Result<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[FORMAT_VERSION])?;
    bincode::serialize_into(&mut *writer, &catalog.files)?;
    bincode::serialize_into(&mut *writer, &catalog.tags)?;
    Ok(())
}

/// Serialize the catalog into a fresh buffer.
pub fn encode(catalog: &Catalog) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_snapshot(catalog, &mut buf)?;
    Ok(buf)
}

/// Read a catalog from `reader`. Decoding and integrity failures are
/// reported as `InvalidFormat`; plain I/O errors stay `Io`.
pub fn read_snapshot<R: Read>(reader: &mut R) -> Result<Catalog> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TagDbError::InvalidFormat("File too small for snapshot header".into())
        } else {
            TagDbError::Io(e)
        }
    })?;
    validate_header(&header)?;

    let files: BTreeMap<FileId, FileRecord> = bincode::deserialize_from(&mut *reader)
        .map_err(|e| TagDbError::InvalidFormat(format!("files table: {}", e)))?;
    let tags: BTreeMap<Tag, BTreeSet<FileId>> = bincode::deserialize_from(&mut *reader)
        .map_err(|e| TagDbError::InvalidFormat(format!("tags table: {}", e)))?;

    for (id, record) in &files {
        if *id != record.id {
            return Err(TagDbError::InvalidFormat(format!(
                "file table key {} does not match record {}",
                id, record.id
            )));
        }
    }

    Catalog::from_parts(files, tags)
}

/// Sibling path used while saving: `<path>.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write already-encoded snapshot bytes to `path` atomically: write
/// `<path>.tmp`, fsync, rename over `path`.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "snapshot saved");
    Ok(())
}

/// Load a catalog from the snapshot at `path`.
pub fn load_from_path(path: &Path) -> Result<Catalog> {
    let mut reader = BufReader::new(File::open(path)?);
    let catalog = read_snapshot(&mut reader)?;
    tracing::info!(
        path = %path.display(),
        files = catalog.file_count(),
        tags = catalog.tag_count(),
        "snapshot loaded"
    );
    Ok(catalog)
}

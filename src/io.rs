//! Flash persistence for the card table.
//!
//! Every save rewrites the whole registry image: header first, then the
//! full slot array, in two contiguous transfers. No partial-slot update
//! is ever written. A failed save can leave the file partially written;
//! callers must not assume the on-disk state is valid until the next
//! save succeeds.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use crate::checksum::table_checksum;
use crate::error::{LoadError, Result};
use crate::record::{TableHeader, FILE_SIZE, HEADER_SIZE, TABLE_SIZE};
use crate::table::CardTable;

/// Write the full registry image to `path`, truncating any previous
/// content. The header checksum is recomputed over the slot array on
/// every save.
pub fn save(path: &Path, table: &CardTable) -> Result<()> {
    let body = table.to_bytes();
    let header = TableHeader::new(table.active_count(), table_checksum(&body));

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(&header.to_bytes())?;
    file.write_all(&body)?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

/// Read and validate the registry image at `path`.
///
/// The slot array is read into a scratch buffer and only returned after
/// every validation passes, so a failed load can never leak a partially
/// corrupt table to the caller. Validation order: presence, file size,
/// header capacity and count, full-array read, checksum.
pub fn load(path: &Path) -> std::result::Result<CardTable, LoadError> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(LoadError::FileAbsent),
        Err(err) => return Err(LoadError::Io(err)),
    };
    if metadata.len() != FILE_SIZE as u64 {
        return Err(LoadError::InvalidSize {
            actual: metadata.len(),
            expected: FILE_SIZE as u64,
        });
    }

    let mut file = File::open(path)?;

    let mut header_bytes = [0u8; HEADER_SIZE];
    read_exact_or_truncated(&mut file, &mut header_bytes)?;
    let header = TableHeader::from_bytes(&header_bytes);
    header.validate()?;

    let mut body = vec![0u8; TABLE_SIZE];
    read_exact_or_truncated(&mut file, &mut body)?;

    let computed = table_checksum(&body);
    if computed != header.checksum {
        return Err(LoadError::ChecksumMismatch {
            stored: header.checksum,
            computed,
        });
    }

    CardTable::from_bytes(&body)
}

fn read_exact_or_truncated(
    file: &mut File,
    buf: &mut [u8],
) -> std::result::Result<(), LoadError> {
    file.read_exact(buf).map_err(|err| {
        if err.kind() == ErrorKind::UnexpectedEof {
            LoadError::Truncated
        } else {
            LoadError::Io(err)
        }
    })
}

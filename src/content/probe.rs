//! Content probe
//!
//! Full sequential scan of the content artifact. Rebuilds the in-memory
//! index on open and doubles as the integrity check: any malformed record
//! fails the whole probe.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;

use crate::error::{Result, StorageError};
use crate::model::ContentId;

use super::record::check_file_header;
use super::{RecordHeader, RecordKind, FILE_HEADER_SIZE, RECORD_HEADER_SIZE};

/// Where a blob's data lives in the artifact
#[derive(Debug, Clone, Copy)]
pub(crate) struct Location {
    /// Offset of the first data byte
    pub offset: u64,
    pub header: RecordHeader,
}

/// In-memory index rebuilt from a scan
#[derive(Debug, Default)]
pub(crate) struct Scan {
    pub locations: HashMap<ContentId, Location>,
    pub purged: HashSet<ContentId>,
    pub next_id: u64,
    pub end_offset: u64,
}

/// Summary of a successful probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    /// Blobs whose bytes are physically present
    pub blob_count: u64,
    /// Ids carrying a purge tombstone
    pub purged_count: u64,
    /// Total data bytes of present blobs
    pub blob_bytes: u64,
    /// Id the next stored blob would get
    pub next_id: u64,
    /// Bytes covered by valid records (header included)
    pub end_offset: u64,
}

impl Scan {
    pub(crate) fn empty() -> Self {
        Self {
            end_offset: FILE_HEADER_SIZE,
            ..Self::default()
        }
    }

    pub(crate) fn report(&self) -> ProbeReport {
        ProbeReport {
            blob_count: self.locations.len() as u64,
            purged_count: self.purged.len() as u64,
            blob_bytes: self.locations.values().map(|l| l.header.len as u64).sum(),
            next_id: self.next_id,
            end_offset: self.end_offset,
        }
    }
}

/// Probe the artifact at `path` without modifying it
pub fn probe(path: &Path) -> Result<ProbeReport> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    scan(BufReader::new(file), file_len).map(|scan| scan.report())
}

/// Scan a complete artifact from its first byte
///
/// Records must claim ids in order: a blob takes exactly the next id; a
/// tombstone either marks an already claimed id or, after compaction
/// dropped the blob, claims the next id itself.
///
/// `file_len` bounds every record: a length field pointing past the end of
/// the artifact is rejected before any buffer is allocated for it.
pub(crate) fn scan<R: Read>(mut reader: R, file_len: u64) -> Result<Scan> {
    let mut file_header = [0u8; FILE_HEADER_SIZE as usize];
    reader.read_exact(&mut file_header).map_err(truncated)?;
    check_file_header(&file_header)?;

    let mut scan = Scan::empty();

    loop {
        let mut header_bytes = [0u8; RECORD_HEADER_SIZE];
        if !read_record_header(&mut reader, &mut header_bytes)? {
            break;
        }
        let header = RecordHeader::decode(&header_bytes)?;

        let data_offset = scan.end_offset + RECORD_HEADER_SIZE as u64;
        let remaining = file_len.saturating_sub(data_offset);
        if header.len as u64 > remaining {
            return Err(StorageError::content_corruption(
                Some(header.id),
                format!(
                    "Record length {} exceeds the {} bytes left in the artifact",
                    header.len, remaining
                ),
            ));
        }

        let mut data = vec![0u8; header.len as usize];
        reader.read_exact(&mut data).map_err(truncated)?;
        header.verify(&data)?;

        match header.kind {
            RecordKind::Blob => {
                if header.id.0 != scan.next_id {
                    return Err(StorageError::content_corruption(
                        Some(header.id),
                        format!("Blob out of order: expected id {}", scan.next_id),
                    ));
                }
                scan.locations.insert(
                    header.id,
                    Location {
                        offset: data_offset,
                        header,
                    },
                );
                scan.next_id += 1;
            }
            RecordKind::Purge => {
                if header.id.0 == scan.next_id {
                    scan.next_id += 1;
                } else if header.id.0 > scan.next_id {
                    return Err(StorageError::content_corruption(
                        Some(header.id),
                        format!("Tombstone for unallocated id (next is {})", scan.next_id),
                    ));
                }
                scan.purged.insert(header.id);
            }
        }

        scan.end_offset = data_offset + header.len as u64;
    }

    Ok(scan)
}

/// Read and verify the data of one blob
///
/// `file_len` is the current length of the artifact; a location running
/// past it is corruption, not a short read.
pub(crate) fn read_location<F: Read + Seek>(
    file: &mut F,
    file_len: u64,
    location: &Location,
) -> Result<Bytes> {
    if location.offset + location.header.len as u64 > file_len {
        return Err(StorageError::content_corruption(
            Some(location.header.id),
            format!("Record runs past the end of the artifact ({} bytes)", file_len),
        ));
    }

    file.seek(SeekFrom::Start(location.offset))?;
    let mut data = vec![0u8; location.header.len as usize];
    file.read_exact(&mut data).map_err(truncated)?;
    location.header.verify(&data)?;
    Ok(Bytes::from(data))
}

/// Fill `buf` with the next record header
///
/// Returns `false` on a clean end of file, errors on a partial header.
fn read_record_header<R: Read>(reader: &mut R, buf: &mut [u8; RECORD_HEADER_SIZE]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    match filled {
        0 => Ok(false),
        n if n == buf.len() => Ok(true),
        n => Err(StorageError::content_corruption(
            None,
            format!("Partial record header: {} of {} bytes", n, RECORD_HEADER_SIZE),
        )),
    }
}

fn truncated(e: std::io::Error) -> StorageError {
    if e.kind() == ErrorKind::UnexpectedEof {
        StorageError::content_corruption(None, "Truncated record")
    } else {
        StorageError::Io(e)
    }
}

//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{FsError, Result};

use super::{WalEntry, HEADER_SIZE};

/// Largest buffer reserved before an entry's bytes have been read
const MAX_PREALLOC: usize = 64 * 1024;

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset just past the last entry that decoded cleanly
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file and `WalCorruption` for a
    /// torn or damaged frame.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let mut header = [0u8; HEADER_SIZE];
        match read_full(&mut self.reader, &mut header)? {
            0 => return Ok(None),
            n if n < HEADER_SIZE => {
                return Err(FsError::WalCorruption(format!(
                    "torn header at offset {} ({} of {} bytes)",
                    self.position, n, HEADER_SIZE
                )))
            }
            _ => {}
        }

        let [l0, l1, l2, l3, l4, l5, l6, l7, c0, c1, c2, c3, n0, n1, n2, n3] = header;
        let lsn = u64::from_le_bytes([l0, l1, l2, l3, l4, l5, l6, l7]);
        let crc = u32::from_le_bytes([c0, c1, c2, c3]);
        let len = u32::from_le_bytes([n0, n1, n2, n3]) as usize;

        // The length comes from an unverified header; let the buffer grow
        // with what is actually there instead of trusting it up front
        let mut data = Vec::with_capacity(len.min(MAX_PREALLOC));
        let got = (&mut self.reader).take(len as u64).read_to_end(&mut data)?;
        if got < len {
            return Err(FsError::WalCorruption(format!(
                "torn entry at offset {} ({} of {} bytes)",
                self.position, got, len
            )));
        }

        let entry = WalEntry::decode(lsn, crc, &data)?;
        self.position += (HEADER_SIZE + len) as u64;
        Ok(Some(entry))
    }

    /// Offset just past the last cleanly decoded entry
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator { reader: self, failed: false }
    }
}

/// Iterator over WAL entries; stops after the first error
pub struct WalIterator {
    reader: WalReader,
    failed: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Read until `buf` is full or EOF, returning the byte count
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

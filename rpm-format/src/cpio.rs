//! Reading the SVR4 (`newc`) cpio archives that package payloads are stored in.

use std::io::{self, Read, Write};

use crate::copy::{copy, CopyError};
use crate::de::invalid_data;

pub(crate) const NEWC_MAGIC: &[u8; 6] = b"070701";
pub(crate) const NEWC_CRC_MAGIC: &[u8; 6] = b"070702";
pub(crate) const TRAILER_NAME: &str = "TRAILER!!!";

const HEADER_SIZE: usize = 110;
const MAX_NAME_SIZE: u32 = 64 * 1024;

const S_IFMT: u32 = 0o170000;
const S_IFREG: u32 = 0o100000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// The name as stored, usually relative and starting with `./`.
    pub name: String,
    pub mode: u32,
    pub nlink: u32,
    pub file_size: u64,
}

impl ArchiveEntry {
    /// The name as an absolute path, the way package file lists spell it.
    pub fn path(&self) -> String {
        let name = self.name.strip_prefix('.').unwrap_or(&self.name);
        if name.starts_with('/') {
            name.to_string()
        } else {
            format!("/{}", name)
        }
    }

    #[inline(always)]
    pub fn is_file(&self) -> bool {
        self.mode & S_IFMT == S_IFREG
    }
}

/// Walks the entries of a newc archive in a single forward pass.
///
/// Contents that are not read before the next call to
/// [`ArchiveReader::next_entry`] are skipped.
pub struct ArchiveReader<R: Read> {
    reader: R,
    offset: u64,
    pending: u64,
}

impl<R: Read> ArchiveReader<R> {
    pub fn new(reader: R) -> ArchiveReader<R> {
        ArchiveReader {
            reader,
            offset: 0,
            pending: 0,
        }
    }

    /// Reads the next entry header. Returns `None` once the trailer is reached.
    pub fn next_entry(&mut self) -> io::Result<Option<ArchiveEntry>> {
        let pending = self.pending;
        self.skip(pending)?;
        self.pending = 0;
        self.align()?;

        let start = self.offset;
        let mut header = [0u8; HEADER_SIZE];
        self.read_exact(&mut header)?;

        let magic = &header[..6];
        if magic != NEWC_MAGIC && magic != NEWC_CRC_MAGIC {
            return Err(invalid_data(format!(
                "unsupported cpio entry at {:#x}: magic {:?}",
                start,
                String::from_utf8_lossy(magic)
            )));
        }

        let field = |index: usize| -> io::Result<u32> {
            let at = 6 + index * 8;
            std::str::from_utf8(&header[at..at + 8])
                .ok()
                .and_then(|digits| u32::from_str_radix(digits, 16).ok())
                .ok_or_else(|| invalid_data(format!("malformed cpio header at {:#x}", start)))
        };

        let mode = field(1)?;
        let nlink = field(4)?;
        let file_size = u64::from(field(6)?);
        let name_size = field(11)?;
        if name_size == 0 || name_size > MAX_NAME_SIZE {
            return Err(invalid_data(format!(
                "cpio entry at {:#x} has a name of {} bytes",
                start, name_size
            )));
        }

        let mut name = vec![0u8; name_size as usize];
        self.read_exact(&mut name)?;
        if name.pop() != Some(0) {
            return Err(invalid_data(format!(
                "cpio entry name at {:#x} is not terminated",
                start
            )));
        }
        let name = String::from_utf8(name)
            .map_err(|_| invalid_data(format!("cpio entry name at {:#x} is not UTF-8", start)))?;
        self.align()?;

        tracing::debug!(
            start = format_args!("{:#x}", start),
            end = format_args!("{:#x}", self.offset),
            %name,
            file_size,
            "read cpio entry"
        );

        if name == TRAILER_NAME {
            return Ok(None);
        }

        self.pending = file_size;
        Ok(Some(ArchiveEntry {
            name,
            mode,
            nlink,
            file_size,
        }))
    }

    /// Copies the contents of the current entry into `writer`.
    pub fn read_contents<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<u64, CopyError> {
        let expected = self.pending;
        let copied = copy(&mut (&mut self.reader).take(expected), writer)?;
        self.offset += copied;
        self.pending -= copied;

        if copied != expected {
            return Err(CopyError::Read(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "cpio archive ended inside an entry",
            )));
        }

        Ok(copied)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.reader.read_exact(buf)?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    fn skip(&mut self, len: u64) -> io::Result<()> {
        let skipped = io::copy(&mut (&mut self.reader).take(len), &mut io::sink())?;
        self.offset += skipped;
        if skipped != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "cpio archive ended inside an entry",
            ));
        }
        Ok(())
    }

    fn align(&mut self) -> io::Result<()> {
        let padding = (4 - self.offset % 4) % 4;
        self.skip(padding)
    }
}

use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use crate::de::{deserialize_header, DeserializeOwned};
use crate::header::HeaderKind;
use crate::lead::{self, Lead};

mod blob;
pub(crate) mod meta;
pub mod reader;
pub mod writer;

pub use self::blob::{build_blob, BlobError, BlobStats};
pub use self::meta::{Metadata, PackageFile, PayloadInfo};
pub use self::reader::{split, OpenError, PackageReader, SplitError, SplitStats};
pub use self::writer::{join, JoinError, JoinStats};

/// Parses the lead, signature header and main header of a package.
///
/// The reader is rewound to the start first. On success it is left at the
/// first payload byte, and that offset is returned along with the metadata.
pub fn read_package<R: Read + Seek>(reader: &mut R, path: &Path) -> Result<(Metadata, u64), OpenError> {
    let read_failed = |e: std::io::Error| OpenError::ReadFailed(e, path.to_path_buf());

    reader.seek(SeekFrom::Start(0)).map_err(read_failed)?;
    if !has_magic(reader).map_err(read_failed)? {
        return Err(OpenError::NotAPackage);
    }
    reader.seek(SeekFrom::Start(0)).map_err(read_failed)?;

    let classify = |e: std::io::Error| match e.kind() {
        ErrorKind::InvalidData | ErrorKind::UnexpectedEof => OpenError::InvalidHeader(e),
        _ => OpenError::ReadFailed(e, path.to_path_buf()),
    };

    let lead = Lead::deserialize_owned(reader).map_err(classify)?;
    let signature = read_signature(reader).map_err(classify)?;
    let header = deserialize_header(reader, HeaderKind::Main).map_err(classify)?;
    let payload_offset = reader.stream_position().map_err(read_failed)?;

    tracing::debug!(
        path = %path.display(),
        payload_offset = format_args!("{:#x}", payload_offset),
        "read package metadata"
    );

    Ok((
        Metadata {
            lead,
            signature,
            header,
        },
        payload_offset,
    ))
}

fn has_magic<R: Read>(reader: &mut R) -> std::io::Result<bool> {
    let mut magic_bytes = Vec::with_capacity(lead::MAGIC_BYTES.len());
    reader
        .take(lead::MAGIC_BYTES.len() as u64)
        .read_to_end(&mut magic_bytes)?;
    Ok(magic_bytes == lead::MAGIC_BYTES)
}

/// The signature header is padded to an 8 byte boundary.
fn read_signature<R: Read + Seek>(reader: &mut R) -> std::io::Result<crate::Header> {
    let start = reader.stream_position()?;
    let signature = deserialize_header(reader, HeaderKind::Signature)?;
    let end = reader.stream_position()?;

    let padding = (8 - (end - start) % 8) % 8;
    reader.read_exact(&mut [0u8; 8][..padding as usize])?;

    Ok(signature)
}

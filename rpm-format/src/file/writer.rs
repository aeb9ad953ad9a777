use std::fs::File;
use std::io::{prelude::*, BufReader, BufWriter, SeekFrom};
use std::path::{Path, PathBuf};

use super::{read_package, OpenError};
use crate::compression::{CodecError, Compression};
use crate::copy::{copy, CopyError};
use crate::output::OutputFile;

#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("Opening file failed. Path: '{}'", .1.display())]
    OpenFailed(#[source] std::io::Error, PathBuf),

    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Creating package failed. Path: '{}'", .1.display())]
    CreateFailed(#[source] std::io::Error, PathBuf),

    #[error("Reading input failed. Path: '{}'", .1.display())]
    ReadFailed(#[source] std::io::Error, PathBuf),

    #[error("Compressing payload failed. Path: '{}'", .1.display())]
    CompressionFailed(#[source] std::io::Error, PathBuf),

    #[error("Moving package into place failed. Path: '{}'", .1.display())]
    PersistFailed(#[source] std::io::Error, PathBuf),

    #[error("Payload size mismatch: header declares {expected} bytes, payload file holds {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStats {
    /// Bytes of metadata copied verbatim.
    pub header_size: u64,
    /// Bytes of payload read before compression.
    pub payload_size: u64,
    pub compression: Compression,
}

/// Writes the metadata file `header` verbatim to `package`, followed by
/// `payload` compressed the way the metadata declares.
///
/// The whole metadata file is copied, not just the part the parser consumed.
/// The package only appears once the join has succeeded.
pub fn join<H, Y, P>(header: H, payload: Y, package: P) -> Result<JoinStats, JoinError>
where
    H: AsRef<Path>,
    Y: AsRef<Path>,
    P: AsRef<Path>,
{
    let (header, payload, package) = (header.as_ref(), payload.as_ref(), package.as_ref());

    let mut header_file =
        File::open(header).map_err(|e| JoinError::OpenFailed(e, header.to_path_buf()))?;
    let payload_file =
        File::open(payload).map_err(|e| JoinError::OpenFailed(e, payload.to_path_buf()))?;

    let (meta, header_end) = read_package(&mut BufReader::new(&mut header_file), header)?;
    let info = meta.payload_info()?;

    let header_size = header_file
        .metadata()
        .map_err(|e| JoinError::ReadFailed(e, header.to_path_buf()))?
        .len();
    if header_size > header_end {
        tracing::warn!(
            path = %header.display(),
            trailing = header_size - header_end,
            "metadata file continues past the end of its header; copying it whole"
        );
    }

    let mut out =
        OutputFile::create(package).map_err(|e| JoinError::CreateFailed(e, package.to_path_buf()))?;

    header_file
        .seek(SeekFrom::Start(0))
        .map_err(|e| JoinError::ReadFailed(e, header.to_path_buf()))?;
    let copied = copy(&mut (&mut header_file).take(header_size), &mut out).map_err(|e| match e {
        CopyError::Read(e) => JoinError::ReadFailed(e, header.to_path_buf()),
        CopyError::Write(e) => JoinError::CreateFailed(e, package.to_path_buf()),
    })?;
    if copied != header_size {
        return Err(JoinError::ReadFailed(
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "metadata file shrank while it was copied",
            ),
            header.to_path_buf(),
        ));
    }
    drop(header_file);

    // The output moves into the encoder here and comes back from `finish`.
    let mut encoder = info.codec.encoder(BufWriter::new(out))?;
    let payload_size = copy(&mut BufReader::new(payload_file), &mut encoder).map_err(|e| match e {
        CopyError::Read(e) => JoinError::ReadFailed(e, payload.to_path_buf()),
        CopyError::Write(e) => JoinError::CompressionFailed(e, package.to_path_buf()),
    })?;

    let out = encoder
        .finish()
        .map_err(|e| JoinError::CompressionFailed(e, package.to_path_buf()))?
        .into_inner()
        .map_err(|e| JoinError::CompressionFailed(e.into_error(), package.to_path_buf()))?;

    if payload_size != info.size {
        return Err(JoinError::SizeMismatch {
            expected: info.size,
            actual: payload_size,
        });
    }

    out.persist()
        .map_err(|e| JoinError::PersistFailed(e, package.to_path_buf()))?;

    tracing::info!(
        package = %package.display(),
        header_size,
        payload_size,
        filter = %info.codec,
        "joined package"
    );

    Ok(JoinStats {
        header_size,
        payload_size,
        compression: info.codec.compression().clone(),
    })
}

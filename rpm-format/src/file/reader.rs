use std::fs::File;
use std::io::{prelude::*, BufReader, BufWriter, SeekFrom};
use std::path::{Path, PathBuf};

use super::{read_package, Metadata, PayloadInfo};
use crate::compression::{CodecError, Compression};
use crate::copy::{copy, CopyError};
use crate::output::OutputFile;

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("argument is not an RPM package")]
    NotAPackage,

    #[error("error reading header from package")]
    InvalidHeader(#[source] std::io::Error),

    #[error("Failed to read package. Path: '{}'", .1.display())]
    ReadFailed(#[source] std::io::Error, PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Creating output failed. Path: '{}'", .1.display())]
    CreateFailed(#[source] std::io::Error, PathBuf),

    #[error("Reading package failed. Path: '{}'", .1.display())]
    ReadFailed(#[source] std::io::Error, PathBuf),

    #[error("Decompressing payload failed. Path: '{}'", .1.display())]
    DecompressionFailed(#[source] std::io::Error, PathBuf),

    #[error("Writing output failed. Path: '{}'", .1.display())]
    WriteFailed(#[source] std::io::Error, PathBuf),

    #[error("Moving output into place failed. Path: '{}'", .1.display())]
    PersistFailed(#[source] std::io::Error, PathBuf),

    #[error("Payload size mismatch: header declares {expected} bytes, payload holds {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitStats {
    /// Bytes of lead, signature and header copied verbatim.
    pub header_size: u64,
    /// Bytes of decompressed payload.
    pub payload_size: u64,
    pub compression: Compression,
}

/// An opened package whose metadata has been parsed.
#[derive(Debug)]
pub struct PackageReader {
    file: File,
    path: PathBuf,
    meta: Metadata,
    payload_offset: u64,
}

impl PackageReader {
    /// Opens a package and parses everything up to the payload. Digests and signatures are not checked.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<PackageReader, OpenError> {
        let path = path.as_ref();
        let mut file =
            File::open(path).map_err(|e| OpenError::ReadFailed(e, path.to_path_buf()))?;
        let (meta, payload_offset) = read_package(&mut BufReader::new(&mut file), path)?;

        Ok(PackageReader {
            file,
            path: path.to_path_buf(),
            meta,
            payload_offset,
        })
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline(always)]
    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    /// Where the payload starts, which is also the length of the metadata.
    #[inline(always)]
    pub fn payload_offset(&self) -> u64 {
        self.payload_offset
    }

    /// Payload size and compressor, enough to decompress. See [`Metadata::decoding_info`].
    #[inline(always)]
    pub fn decoding_info(&self) -> Result<PayloadInfo, CodecError> {
        self.meta.decoding_info()
    }

    /// Consumes the reader, returning the package file positioned at its first payload byte.
    pub fn into_payload(self) -> Result<BufReader<File>, OpenError> {
        let PackageReader {
            mut file,
            path,
            payload_offset,
            ..
        } = self;

        file.seek(SeekFrom::Start(payload_offset))
            .map_err(|e| OpenError::ReadFailed(e, path))?;
        Ok(BufReader::new(file))
    }

    /// Copies the metadata verbatim into `header` and the decompressed payload into `payload`.
    ///
    /// The package file moves into the payload decoder and is closed with it.
    pub fn split_into(
        self,
        info: &PayloadInfo,
        header: &mut OutputFile,
        payload: &mut OutputFile,
    ) -> Result<SplitStats, SplitError> {
        let PackageReader {
            mut file,
            path,
            payload_offset,
            ..
        } = self;

        file.seek(SeekFrom::Start(0))
            .map_err(|e| SplitError::ReadFailed(e, path.clone()))?;
        let mut input = BufReader::new(file);

        let header_path = header.path().to_path_buf();
        let header_size = copy(&mut (&mut input).take(payload_offset), header).map_err(|e| match e {
            CopyError::Read(e) => SplitError::ReadFailed(e, path.clone()),
            CopyError::Write(e) => SplitError::WriteFailed(e, header_path.clone()),
        })?;

        if header_size != payload_offset {
            return Err(SplitError::ReadFailed(
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "package ended inside its header",
                ),
                path,
            ));
        }
        header
            .flush()
            .map_err(|e| SplitError::WriteFailed(e, header_path))?;

        let mut decoder = info.codec.decoder(input)?;
        let payload_path = payload.path().to_path_buf();
        let mut out = BufWriter::new(payload);

        let payload_size = copy(&mut decoder, &mut out).map_err(|e| match e {
            CopyError::Read(e) => SplitError::DecompressionFailed(e, path.clone()),
            CopyError::Write(e) => SplitError::WriteFailed(e, payload_path.clone()),
        })?;
        out.flush()
            .map_err(|e| SplitError::WriteFailed(e, payload_path))?;

        if payload_size != info.size {
            return Err(SplitError::SizeMismatch {
                expected: info.size,
                actual: payload_size,
            });
        }

        Ok(SplitStats {
            header_size,
            payload_size,
            compression: info.codec.compression().clone(),
        })
    }
}

/// Splits `package` into its verbatim metadata at `header` and its decompressed payload at `payload`.
///
/// Neither output appears unless the whole split succeeds.
pub fn split<P, H, Y>(package: P, header: H, payload: Y) -> Result<SplitStats, SplitError>
where
    P: AsRef<Path>,
    H: AsRef<Path>,
    Y: AsRef<Path>,
{
    let reader = PackageReader::open(package.as_ref())?;
    let info = reader.decoding_info()?;

    let mut header_out = OutputFile::create(header.as_ref())
        .map_err(|e| SplitError::CreateFailed(e, header.as_ref().to_path_buf()))?;
    let mut payload_out = OutputFile::create(payload.as_ref())
        .map_err(|e| SplitError::CreateFailed(e, payload.as_ref().to_path_buf()))?;

    let stats = reader.split_into(&info, &mut header_out, &mut payload_out)?;

    header_out
        .persist()
        .map_err(|e| SplitError::PersistFailed(e, header.as_ref().to_path_buf()))?;
    payload_out
        .persist()
        .map_err(|e| SplitError::PersistFailed(e, payload.as_ref().to_path_buf()))?;

    tracing::info!(
        package = %package.as_ref().display(),
        header_size = stats.header_size,
        payload_size = stats.payload_size,
        compression = %stats.compression,
        "split package"
    );

    Ok(stats)
}

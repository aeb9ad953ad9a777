use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{OpenError, PackageFile, PackageReader};
use crate::compression::CodecError;
use crate::copy::CopyError;
use crate::cpio::ArchiveReader;
use crate::output::OutputFile;

const PAYLOAD_FORMAT_CPIO: &str = "cpio";

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Cannot read the file list of the package header")]
    FileList(#[source] std::io::Error),

    #[error("Cannot handle payload format `{0}`")]
    UnsupportedPayloadFormat(String),

    #[error("Creating output failed. Path: '{}'", .1.display())]
    CreateFailed(#[source] std::io::Error, PathBuf),

    #[error("Reading payload archive failed. Path: '{}'", .1.display())]
    ArchiveFailed(#[source] std::io::Error, PathBuf),

    #[error("Writing output failed. Path: '{}'", .1.display())]
    WriteFailed(#[source] std::io::Error, PathBuf),

    #[error("Moving output into place failed. Path: '{}'", .1.display())]
    PersistFailed(#[source] std::io::Error, PathBuf),

    #[error("File not found in the payload archive: {0}")]
    MissingFile(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobStats {
    /// Files whose contents went into the blob.
    pub files: usize,
    pub size: u64,
}

/// Config files and symlinks are left out of a blob.
fn wanted(file: &PackageFile) -> bool {
    !file.is_config() && !file.is_symlink()
}

/// Concatenates the payload contents of every regular, non-config file of
/// `package`, in file list order, into `blob`.
///
/// The payload is decompressed and walked once. Archive entries that arrive
/// ahead of their place in the file list are held in memory until their turn.
pub fn build_blob<P, B>(package: P, blob: B) -> Result<BlobStats, BlobError>
where
    P: AsRef<Path>,
    B: AsRef<Path>,
{
    let (package, blob) = (package.as_ref(), blob.as_ref());

    let reader = PackageReader::open(package)?;
    let meta = reader.metadata();

    let format = meta.payload_format().unwrap_or(PAYLOAD_FORMAT_CPIO);
    if format != PAYLOAD_FORMAT_CPIO {
        return Err(BlobError::UnsupportedPayloadFormat(format.to_string()));
    }

    let files: Vec<String> = meta
        .files()
        .map_err(BlobError::FileList)?
        .into_iter()
        .filter(wanted)
        .map(|f| f.path)
        .collect();
    let info = reader.decoding_info()?;

    let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, path) in files.iter().enumerate() {
        positions.entry(path.as_str()).or_default().push(i);
    }

    let mut out =
        OutputFile::create(blob).map_err(|e| BlobError::CreateFailed(e, blob.to_path_buf()))?;
    let decoder = info.codec.decoder(reader.into_payload()?)?;
    let mut archive = ArchiveReader::new(decoder);

    let archive_failed = |e: std::io::Error| BlobError::ArchiveFailed(e, package.to_path_buf());
    let copy_failed = |e: CopyError| match e {
        CopyError::Read(e) => BlobError::ArchiveFailed(e, package.to_path_buf()),
        CopyError::Write(e) => BlobError::WriteFailed(e, blob.to_path_buf()),
    };

    let mut writer = BufWriter::new(&mut out);
    let mut next = 0;
    let mut held: HashMap<usize, Vec<u8>> = HashMap::new();
    let mut size = 0u64;

    while let Some(entry) = archive.next_entry().map_err(archive_failed)? {
        let indexes = match positions.remove(entry.path().as_str()) {
            Some(indexes) => indexes,
            None => continue,
        };

        if indexes == [next] {
            size += archive.read_contents(&mut writer).map_err(copy_failed)?;
            next += 1;
        } else {
            let mut contents = Vec::with_capacity(entry.file_size.min(1 << 20) as usize);
            archive.read_contents(&mut contents).map_err(copy_failed)?;
            for index in indexes {
                held.insert(index, contents.clone());
            }
        }

        while let Some(contents) = held.remove(&next) {
            writer
                .write_all(&contents)
                .map_err(|e| BlobError::WriteFailed(e, blob.to_path_buf()))?;
            size += contents.len() as u64;
            next += 1;
        }
    }

    if let Some(missing) = files.get(next) {
        return Err(BlobError::MissingFile(missing.clone()));
    }

    writer
        .flush()
        .map_err(|e| BlobError::WriteFailed(e, blob.to_path_buf()))?;
    drop(writer);
    out.persist()
        .map_err(|e| BlobError::PersistFailed(e, blob.to_path_buf()))?;

    tracing::info!(
        package = %package.display(),
        blob = %blob.display(),
        files = files.len(),
        size,
        "built blob"
    );

    Ok(BlobStats {
        files: files.len(),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{encode_cpio, PackageBuilder};
    use crate::header::{file_flags, tags, Value};

    const FILE: u32 = 0o100644;

    fn write_package(path: &Path, builder: PackageBuilder, archive: &[u8]) {
        let builder = builder.payload_size(archive.len() as u64);
        std::fs::write(path, builder.package_bytes(archive).unwrap()).unwrap();
    }

    #[test]
    fn skips_config_files_and_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("hello.rpm");
        let builder = PackageBuilder::new("hello").compressor("xz").files(&[
            ("/etc/hello.conf", file_flags::CONFIG, ""),
            ("/usr/bin/hello", 0, ""),
            ("/usr/bin/hi", 0, "hello"),
            ("/usr/share/hello/data", 0, ""),
        ]);
        let archive = encode_cpio(&[
            ("./etc/hello.conf", FILE, "greeting=hi\n"),
            ("./usr/bin/hello", 0o100755, "ELF"),
            ("./usr/bin/hi", 0o120777, "hello"),
            ("./usr/share/hello/data", FILE, "0123456789"),
        ]);
        write_package(&package, builder, &archive);

        let stats = build_blob(&package, dir.path().join("hello.blob")).unwrap();

        assert_eq!(stats, BlobStats { files: 2, size: 13 });
        assert_eq!(
            std::fs::read(dir.path().join("hello.blob")).unwrap(),
            b"ELF0123456789"
        );
    }

    #[test]
    fn follows_file_list_order() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("order.rpm");
        let builder = PackageBuilder::new("order").files(&[
            ("/opt/a", 0, ""),
            ("/opt/b", 0, ""),
            ("/opt/c", 0, ""),
        ]);
        let archive = encode_cpio(&[
            ("./opt/c", FILE, "C"),
            ("./opt/a", FILE, "A"),
            ("./opt/b", FILE, "B"),
        ]);
        write_package(&package, builder, &archive);

        build_blob(&package, dir.path().join("order.blob")).unwrap();

        assert_eq!(std::fs::read(dir.path().join("order.blob")).unwrap(), b"ABC");
    }

    #[test]
    fn missing_file_leaves_no_blob() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("gone.rpm");
        let builder =
            PackageBuilder::new("gone").files(&[("/opt/here", 0, ""), ("/opt/gone", 0, "")]);
        write_package(&package, builder, &encode_cpio(&[("./opt/here", FILE, "x")]));

        let err = build_blob(&package, dir.path().join("gone.blob")).unwrap_err();

        match err {
            BlobError::MissingFile(path) => assert_eq!(path, "/opt/gone"),
            other => panic!("unexpected error: {}", other),
        }
        assert!(!dir.path().join("gone.blob").exists());
    }

    #[test]
    fn other_payload_formats_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("delta.rpm");
        let builder = PackageBuilder::new("delta")
            .tag(tags::PAYLOADFORMAT, Value::String("drpm".into()));
        write_package(&package, builder, b"");

        let err = build_blob(&package, dir.path().join("delta.blob")).unwrap_err();
        assert!(matches!(err, BlobError::UnsupportedPayloadFormat(ref f) if f == "drpm"));
    }
}

use std::io::{Error, ErrorKind};

use crate::compression::{CodecError, PayloadCodec};
use crate::header::{file_flags, tags, Header, Value};
use crate::lead::Lead;

/// Everything in front of the payload: lead, signature header and main header.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub(crate) lead: Lead,
    pub(crate) signature: Header,
    pub(crate) header: Header,
}

/// The payload fields of a package header, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadInfo {
    /// Declared uncompressed payload size.
    pub size: u64,
    pub codec: PayloadCodec,
}

/// One entry of the file list in a package header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
    /// Absolute path, as installed.
    pub path: String,
    pub flags: u32,
    /// Symlink target, empty for anything that is not a symlink.
    pub link_to: String,
}

impl PackageFile {
    #[inline(always)]
    pub fn is_config(&self) -> bool {
        self.flags & file_flags::CONFIG != 0
    }

    #[inline(always)]
    pub fn is_symlink(&self) -> bool {
        !self.link_to.is_empty()
    }
}

impl Metadata {
    #[inline(always)]
    pub fn lead(&self) -> &Lead {
        &self.lead
    }

    #[inline(always)]
    pub fn signature(&self) -> &Header {
        &self.signature
    }

    #[inline(always)]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Looks a tag up in the main header, falling back to the signature header.
    ///
    /// Legacy signature tags are translated to their main header counterparts.
    pub fn get(&self, tag: u32) -> Option<&Value> {
        if let Some(value) = self.header.get(tag) {
            return Some(value);
        }

        let signature_tag = match tag {
            tags::SIGSIZE => tags::SIGTAG_SIZE,
            tags::ARCHIVESIZE => tags::SIGTAG_PAYLOADSIZE,
            256..=999 => tag,
            _ => return None,
        };

        self.signature.get(signature_tag)
    }

    #[inline(always)]
    pub fn get_str(&self, tag: u32) -> Option<&str> {
        self.get(tag).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str(tags::NAME)
    }

    pub fn version(&self) -> Option<&str> {
        self.get_str(tags::VERSION)
    }

    pub fn release(&self) -> Option<&str> {
        self.get_str(tags::RELEASE)
    }

    pub fn arch(&self) -> Option<&str> {
        self.get_str(tags::ARCH)
    }

    pub fn payload_format(&self) -> Option<&str> {
        self.get_str(tags::PAYLOADFORMAT)
    }

    /// The declared uncompressed payload size, preferring the 64 bit field.
    pub fn payload_size(&self) -> Option<u64> {
        self.get(tags::LONGARCHIVESIZE)
            .or_else(|| self.get(tags::ARCHIVESIZE))
            .and_then(Value::as_u64)
    }

    pub fn payload_compressor(&self) -> &str {
        self.get_str(tags::PAYLOADCOMPRESSOR).unwrap_or("gzip")
    }

    pub fn payload_flags(&self) -> &str {
        self.get_str(tags::PAYLOADFLAGS).unwrap_or("")
    }

    /// The file list of the main header, in header order.
    ///
    /// Paths come from the compressed `DIRNAMES`/`BASENAMES`/`DIRINDEXES` triple,
    /// or from `OLDFILENAMES` in packages that predate it. A package without
    /// either has no files.
    pub fn files(&self) -> std::io::Result<Vec<PackageFile>> {
        fn invalid(message: String) -> Error {
            Error::new(ErrorKind::InvalidData, message)
        }

        fn strings(header: &Header, tag: u32) -> std::io::Result<Option<Vec<&str>>> {
            match header.get(tag) {
                None => Ok(None),
                Some(value) => value
                    .as_strings()
                    .map(Some)
                    .ok_or_else(|| invalid(format!("tag {} is not a string array", tag))),
            }
        }

        fn integers(header: &Header, tag: u32) -> std::io::Result<Option<Vec<u64>>> {
            match header.get(tag) {
                None => Ok(None),
                Some(value) => value
                    .to_u64s()
                    .map(Some)
                    .ok_or_else(|| invalid(format!("tag {} is not an integer array", tag))),
            }
        }

        let header = &self.header;
        let paths: Vec<String> = match strings(header, tags::BASENAMES)? {
            Some(basenames) => {
                let dirnames = strings(header, tags::DIRNAMES)?
                    .ok_or_else(|| invalid("file list has no directory names".into()))?;
                let indexes = integers(header, tags::DIRINDEXES)?
                    .ok_or_else(|| invalid("file list has no directory indexes".into()))?;
                if indexes.len() != basenames.len() {
                    return Err(invalid(format!(
                        "{} directory indexes for {} files",
                        indexes.len(),
                        basenames.len()
                    )));
                }

                basenames
                    .iter()
                    .zip(&indexes)
                    .map(|(base, index)| {
                        dirnames
                            .get(*index as usize)
                            .map(|dir| format!("{}{}", dir, base))
                            .ok_or_else(|| invalid(format!("directory index {} out of range", index)))
                    })
                    .collect::<std::io::Result<_>>()?
            }
            None => strings(header, tags::OLDFILENAMES)?
                .unwrap_or_default()
                .into_iter()
                .map(String::from)
                .collect(),
        };

        let flags = integers(header, tags::FILEFLAGS)?.unwrap_or_default();
        let links = strings(header, tags::FILELINKTOS)?.unwrap_or_default();
        for (tag, len) in &[(tags::FILEFLAGS, flags.len()), (tags::FILELINKTOS, links.len())] {
            if *len != 0 && *len != paths.len() {
                return Err(invalid(format!(
                    "tag {} has {} entries for {} files",
                    tag,
                    len,
                    paths.len()
                )));
            }
        }

        Ok(paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| PackageFile {
                path,
                flags: flags.get(i).map_or(0, |f| *f as u32),
                link_to: links.get(i).map_or_else(String::new, |l| l.to_string()),
            })
            .collect())
    }

    fn declared_size(&self) -> u64 {
        match self.payload_size() {
            Some(size) => size,
            None => {
                tracing::warn!("package header does not declare a payload size, assuming 0");
                0
            }
        }
    }

    /// Resolves what reading the payload needs: its size and compressor.
    ///
    /// The flags only describe how the payload was written and are left alone,
    /// so packages written with flags this crate cannot encode still open.
    /// A missing size resolves to 0, so any non-empty payload will then fail
    /// the size check.
    pub fn decoding_info(&self) -> Result<PayloadInfo, CodecError> {
        let size = self.declared_size();
        let codec = PayloadCodec::for_decoding(self.payload_compressor())?;
        tracing::debug!(size, filter = %codec.read_spec(), "resolved payload fields");

        Ok(PayloadInfo { size, codec })
    }

    /// Resolves what writing the payload needs: size, compressor and parsed flags.
    pub fn payload_info(&self) -> Result<PayloadInfo, CodecError> {
        let size = self.declared_size();
        let codec = PayloadCodec::new(self.payload_compressor(), self.payload_flags())?;
        tracing::debug!(size, filter = %codec, "resolved payload fields");

        Ok(PayloadInfo { size, codec })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::Compression;
    use crate::fixture::PackageBuilder;

    fn metadata(builder: PackageBuilder) -> Metadata {
        let bytes = builder.metadata_bytes();
        crate::read_package(&mut std::io::Cursor::new(bytes), std::path::Path::new("test.hdr"))
            .unwrap()
            .0
    }

    #[test]
    fn defaults_when_fields_are_missing() {
        let meta = metadata(PackageBuilder::new("bare"));
        let info = meta.payload_info().unwrap();

        assert_eq!(info.size, 0);
        assert_eq!(info.codec.compression(), &Compression::Gzip);
        assert_eq!(info.codec.flags().as_str(), "");
        assert_eq!(meta.payload_compressor(), "gzip");
    }

    #[test]
    fn reading_ignores_flags() {
        let meta = metadata(
            PackageBuilder::new("zlib")
                .payload_size(5)
                .flags("9f"),
        );

        let info = meta.decoding_info().unwrap();
        assert_eq!(info.size, 5);
        assert_eq!(info.codec.read_spec(), "r.gzip");
        assert_eq!(meta.payload_flags(), "9f");

        assert!(matches!(
            meta.payload_info(),
            Err(CodecError::InvalidFlags { .. })
        ));
    }

    #[test]
    fn file_list_from_dirnames() {
        let meta = metadata(PackageBuilder::new("files").files(&[
            ("/etc/hello.conf", file_flags::CONFIG, ""),
            ("/usr/bin/hello", 0, ""),
            ("/usr/bin/hi", 0, "hello"),
        ]));

        let files = meta.files().unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["/etc/hello.conf", "/usr/bin/hello", "/usr/bin/hi"]);
        assert!(files[0].is_config());
        assert!(!files[1].is_config() && !files[1].is_symlink());
        assert!(files[2].is_symlink());
    }

    #[test]
    fn file_list_from_old_filenames() {
        let meta = metadata(PackageBuilder::new("old").tag(
            tags::OLDFILENAMES,
            Value::StringArray(vec!["/bin/sh".into(), "/bin/true".into()]),
        ));

        let files = meta.files().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].path, "/bin/true");
        assert_eq!(files[1].flags, 0);

        assert!(metadata(PackageBuilder::new("empty")).files().unwrap().is_empty());
    }

    #[test]
    fn inconsistent_file_list_is_invalid() {
        let meta = metadata(
            PackageBuilder::new("broken")
                .files(&[("/a", 0, ""), ("/b", 0, "")])
                .tag(tags::FILEFLAGS, Value::Int32(vec![0])),
        );

        assert_eq!(meta.files().unwrap_err().kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn declared_fields() {
        let meta = metadata(
            PackageBuilder::new("hello")
                .payload_size(1024)
                .compressor("xz")
                .flags("2")
                .tag(tags::VERSION, Value::String("1.0".into()))
                .tag(tags::RELEASE, Value::String("1".into()))
                .tag(tags::ARCH, Value::String("x86_64".into())),
        );
        let info = meta.payload_info().unwrap();

        assert_eq!(info.size, 1024);
        assert_eq!(info.codec.compression(), &Compression::Xz);
        assert_eq!(info.codec.write_spec(), "w2.xz");
        assert_eq!(meta.version(), Some("1.0"));
        assert_eq!(meta.release(), Some("1"));
        assert_eq!(meta.arch(), Some("x86_64"));
    }

    #[test]
    fn long_size_wins_over_short_size() {
        let meta = metadata(
            PackageBuilder::new("big")
                .tag(tags::ARCHIVESIZE, Value::Int32(vec![1]))
                .tag(tags::LONGARCHIVESIZE, Value::Int64(vec![5 << 32])),
        );
        assert_eq!(meta.payload_size(), Some(5 << 32));
    }

    #[test]
    fn size_from_signature_header() {
        let meta = metadata(
            PackageBuilder::new("signed")
                .signature_tag(tags::SIGTAG_PAYLOADSIZE, Value::Int32(vec![4096])),
        );
        assert_eq!(meta.payload_size(), Some(4096));
        assert!(!meta.header().contains(tags::ARCHIVESIZE));

        let meta = metadata(
            PackageBuilder::new("signed")
                .signature_tag(tags::LONGARCHIVESIZE, Value::Int64(vec![8192])),
        );
        assert_eq!(meta.payload_size(), Some(8192));
    }

    #[test]
    fn main_header_wins_over_signature() {
        let meta = metadata(
            PackageBuilder::new("both")
                .payload_size(10)
                .signature_tag(tags::SIGTAG_PAYLOADSIZE, Value::Int32(vec![20])),
        );
        assert_eq!(meta.payload_size(), Some(10));
    }

    #[test]
    fn legacy_signature_tags_do_not_leak() {
        // 1000 is the package size in the signature header but the name in the main header.
        let meta = metadata(
            PackageBuilder::new("leak").signature_tag(tags::SIGTAG_SIZE, Value::Int32(vec![99])),
        );
        assert_eq!(meta.name(), Some("leak"));
        assert_eq!(meta.get(tags::SIGSIZE).and_then(Value::as_u64), Some(99));
    }

    #[test]
    fn unknown_compressor_fails_resolution() {
        let meta = metadata(PackageBuilder::new("odd").compressor("lzip"));
        assert!(matches!(
            meta.payload_info(),
            Err(CodecError::UnsupportedCompressor(_))
        ));
    }
}

//! Synthetic packages for tests.
//!
//! Only enough of the format is written to exercise splitting and joining:
//! a lead, a signature header, a main header and a compressed payload.

use std::io::Write;

use crate::compression::PayloadCodec;
use crate::header::{self, tags, Entry, Value};
use crate::lead;

/// Placeholder for the MD5 digest signature tag, so the signature header is never empty.
const SIGTAG_MD5: u32 = 1004;

pub fn encode_lead(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(lead::LEAD_SIZE);
    out.extend_from_slice(lead::MAGIC_BYTES);
    out.extend_from_slice(&[3, 0]); // version 3.0
    out.extend_from_slice(&0u16.to_be_bytes()); // binary package
    out.extend_from_slice(&1u16.to_be_bytes()); // archnum

    let mut name_bytes = [0u8; lead::LEAD_NAME_SIZE];
    let len = name.len().min(lead::LEAD_NAME_SIZE - 1);
    name_bytes[..len].copy_from_slice(&name.as_bytes()[..len]);
    out.extend_from_slice(&name_bytes);

    out.extend_from_slice(&1u16.to_be_bytes()); // osnum
    out.extend_from_slice(&lead::SIGTYPE_HEADERSIG.to_be_bytes());
    out.extend_from_slice(&[0u8; 16]);
    out
}

pub fn encode_header(entries: &[Entry]) -> Vec<u8> {
    let mut index = Vec::with_capacity(entries.len() * 16);
    let mut store: Vec<u8> = Vec::new();

    for entry in entries {
        let align = match entry.value {
            Value::Int16(_) => 2,
            Value::Int32(_) => 4,
            Value::Int64(_) => 8,
            _ => 1,
        };
        while store.len() % align != 0 {
            store.push(0);
        }

        let offset = store.len() as u32;
        let count = match &entry.value {
            Value::Null => 1,
            Value::Char(v) | Value::Int8(v) | Value::Bin(v) => {
                store.extend_from_slice(v);
                v.len()
            }
            Value::Int16(v) => {
                v.iter().for_each(|x| store.extend_from_slice(&x.to_be_bytes()));
                v.len()
            }
            Value::Int32(v) => {
                v.iter().for_each(|x| store.extend_from_slice(&x.to_be_bytes()));
                v.len()
            }
            Value::Int64(v) => {
                v.iter().for_each(|x| store.extend_from_slice(&x.to_be_bytes()));
                v.len()
            }
            Value::String(s) => {
                store.extend_from_slice(s.as_bytes());
                store.push(0);
                1
            }
            Value::StringArray(v) | Value::I18nString(v) => {
                for s in v {
                    store.extend_from_slice(s.as_bytes());
                    store.push(0);
                }
                v.len()
            }
        };

        index.extend_from_slice(&entry.tag.to_be_bytes());
        index.extend_from_slice(&entry.value.type_id().to_be_bytes());
        index.extend_from_slice(&offset.to_be_bytes());
        index.extend_from_slice(&(count as u32).to_be_bytes());
    }

    let mut out = Vec::with_capacity(16 + index.len() + store.len());
    out.extend_from_slice(header::MAGIC_BYTES);
    out.push(header::HEADER_VERSION);
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    out.extend_from_slice(&(store.len() as u32).to_be_bytes());
    out.extend_from_slice(&index);
    out.extend_from_slice(&store);
    out
}

/// A newc archive of `(name, mode, contents)` entries, closed by the trailer entry.
pub fn encode_cpio(entries: &[(&str, u32, &str)]) -> Vec<u8> {
    fn pad(out: &mut Vec<u8>) {
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }

    let mut out = Vec::new();
    let trailer = (crate::cpio::TRAILER_NAME, 0, "");

    for (ino, (name, mode, data)) in entries.iter().chain(std::iter::once(&trailer)).enumerate() {
        let fields = [
            ino as u32 + 1,
            *mode,
            0,
            0,
            1,
            0,
            data.len() as u32,
            0,
            0,
            0,
            0,
            name.len() as u32 + 1,
            0,
        ];

        out.extend_from_slice(crate::cpio::NEWC_MAGIC);
        for field in &fields {
            out.extend_from_slice(format!("{:08X}", field).as_bytes());
        }
        out.extend_from_slice(name.as_bytes());
        out.push(0);
        pad(&mut out);
        out.extend_from_slice(data.as_bytes());
        pad(&mut out);
    }

    out
}

fn set(entries: &mut Vec<Entry>, tag: u32, value: Value) {
    match entries.iter_mut().find(|e| e.tag == tag) {
        Some(entry) => entry.value = value,
        None => entries.push(Entry { tag, value }),
    }
}

#[derive(Debug, Clone)]
pub struct PackageBuilder {
    name: String,
    signature: Vec<Entry>,
    header: Vec<Entry>,
}

impl PackageBuilder {
    pub fn new(name: &str) -> PackageBuilder {
        PackageBuilder {
            name: name.to_string(),
            signature: vec![],
            header: vec![Entry {
                tag: tags::NAME,
                value: Value::String(name.to_string()),
            }],
        }
    }

    pub fn tag(mut self, tag: u32, value: Value) -> Self {
        set(&mut self.header, tag, value);
        self
    }

    pub fn signature_tag(mut self, tag: u32, value: Value) -> Self {
        set(&mut self.signature, tag, value);
        self
    }

    pub fn signature_bin(self, tag: u32, value: Vec<u8>) -> Self {
        self.signature_tag(tag, Value::Bin(value))
    }

    /// Declares the uncompressed payload size, using the 64 bit tag only when needed.
    pub fn payload_size(self, size: u64) -> Self {
        if size <= u64::from(u32::MAX) {
            self.tag(tags::ARCHIVESIZE, Value::Int32(vec![size as u32]))
        } else {
            self.tag(tags::LONGARCHIVESIZE, Value::Int64(vec![size]))
        }
    }

    /// Declares the file list as `(path, flags, symlink target)` triples.
    pub fn files(self, files: &[(&str, u32, &str)]) -> Self {
        let mut dirnames: Vec<String> = vec![];
        let mut basenames = vec![];
        let mut indexes = vec![];

        for (path, _, _) in files {
            let split = path.rfind('/').map_or(0, |i| i + 1);
            let (dir, base) = path.split_at(split);
            let index = match dirnames.iter().position(|d| d == dir) {
                Some(index) => index,
                None => {
                    dirnames.push(dir.to_string());
                    dirnames.len() - 1
                }
            };
            basenames.push(base.to_string());
            indexes.push(index as u32);
        }

        self.tag(tags::DIRINDEXES, Value::Int32(indexes))
            .tag(tags::BASENAMES, Value::StringArray(basenames))
            .tag(tags::DIRNAMES, Value::StringArray(dirnames))
            .tag(
                tags::FILEFLAGS,
                Value::Int32(files.iter().map(|(_, flags, _)| *flags).collect()),
            )
            .tag(
                tags::FILELINKTOS,
                Value::StringArray(files.iter().map(|(_, _, link)| link.to_string()).collect()),
            )
    }

    pub fn compressor(self, id: &str) -> Self {
        self.tag(tags::PAYLOADCOMPRESSOR, Value::String(id.to_string()))
    }

    pub fn flags(self, flags: &str) -> Self {
        self.tag(tags::PAYLOADFLAGS, Value::String(flags.to_string()))
    }

    /// Lead, padded signature header and main header: what a split writes as the header file.
    pub fn metadata_bytes(&self) -> Vec<u8> {
        let mut out = encode_lead(&self.name);

        let signature = if self.signature.is_empty() {
            encode_header(&[Entry {
                tag: SIGTAG_MD5,
                value: Value::Bin(vec![0; 16]),
            }])
        } else {
            encode_header(&self.signature)
        };
        let padding = (8 - signature.len() % 8) % 8;
        out.extend_from_slice(&signature);
        out.extend(std::iter::repeat(0u8).take(padding));

        out.extend_from_slice(&encode_header(&self.header));
        out
    }

    /// A complete package with `payload` compressed as the header declares.
    pub fn package_bytes(&self, payload: &[u8]) -> std::io::Result<Vec<u8>> {
        let compressor = self
            .header
            .iter()
            .find(|e| e.tag == tags::PAYLOADCOMPRESSOR)
            .and_then(|e| e.value.as_str())
            .unwrap_or("gzip");
        let flags = self
            .header
            .iter()
            .find(|e| e.tag == tags::PAYLOADFLAGS)
            .and_then(|e| e.value.as_str())
            .unwrap_or("");

        // Flags the encoder cannot honour, such as zlib's `9f`, fall back to the default level.
        let codec = PayloadCodec::new(compressor, flags)
            .or_else(|_| PayloadCodec::for_decoding(compressor))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let mut encoder = codec
            .encoder(self.metadata_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        encoder.write_all(payload)?;
        encoder.finish()
    }
}

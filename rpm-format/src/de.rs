use std::collections::HashSet;
use std::io::{Read, Result, Seek};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};

use crate::header::{self, types, Entry, Header, HeaderKind, IndexEntry, Value};
use crate::lead::{self, Lead};

pub(crate) fn invalid_data<E>(error: E) -> std::io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    std::io::Error::new(std::io::ErrorKind::InvalidData, error)
}

pub(crate) trait DeserializeOwned {
    fn deserialize_owned<R: Read + Seek>(reader: &mut R) -> Result<Self>
    where
        Self: Sized;
}

impl DeserializeOwned for Lead {
    fn deserialize_owned<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let start = reader.stream_position()?;

        let mut magic_bytes = [0u8; 4];
        reader.read_exact(&mut magic_bytes)?;
        if &magic_bytes != lead::MAGIC_BYTES {
            return Err(invalid_data("Magic bytes invalid"));
        }

        let major = reader.read_u8()?;
        let minor = reader.read_u8()?;
        let package_type = reader.read_u16::<BigEndian>()?;
        let archnum = reader.read_u16::<BigEndian>()?;
        let mut name = [0u8; lead::LEAD_NAME_SIZE];
        reader.read_exact(&mut name)?;
        let osnum = reader.read_u16::<BigEndian>()?;
        let signature_type = reader.read_u16::<BigEndian>()?;
        reader.read_exact(&mut [0u8; 16])?; // reserved

        if major != 3 && major != 4 {
            return Err(invalid_data(format!(
                "unsupported package format version {}.{}",
                major, minor
            )));
        }

        if signature_type != lead::SIGTYPE_HEADERSIG {
            return Err(invalid_data(format!(
                "unsupported signature type {}",
                signature_type
            )));
        }

        let name_len = name.iter().position(|b| *b == 0).unwrap_or(name.len());
        let name = String::from_utf8_lossy(&name[..name_len]).into_owned();

        let end = reader.stream_position()?;
        debug_assert_eq!(end - start, lead::LEAD_SIZE as u64);
        tracing::debug!(
            start = format_args!("{:#x}", start),
            end = format_args!("{:#x}", end),
            bytes = end - start,
            major,
            minor,
            %name,
            "deserialized Lead"
        );

        Ok(Lead {
            major,
            minor,
            package_type,
            archnum,
            name,
            osnum,
            signature_type,
        })
    }
}

impl DeserializeOwned for IndexEntry {
    fn deserialize_owned<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        Ok(IndexEntry {
            tag: reader.read_u32::<BigEndian>()?,
            ty: reader.read_u32::<BigEndian>()?,
            offset: reader.read_u32::<BigEndian>()?,
            count: reader.read_u32::<BigEndian>()?,
        })
    }
}

/// Reads one header structure: intro, index and data store.
///
/// No digests or signatures are checked, only the structure itself.
pub(crate) fn deserialize_header<R: Read + Seek>(reader: &mut R, kind: HeaderKind) -> Result<Header> {
    let start = reader.stream_position()?;

    let mut magic_bytes = [0u8; 3];
    reader.read_exact(&mut magic_bytes)?;
    if &magic_bytes != header::MAGIC_BYTES {
        return Err(invalid_data(format!("{} magic bytes invalid", kind)));
    }

    let version = reader.read_u8()?;
    if version != header::HEADER_VERSION {
        return Err(invalid_data(format!(
            "unsupported {} version {}",
            kind, version
        )));
    }
    reader.read_exact(&mut [0u8; 4])?; // reserved

    let index_len = reader.read_u32::<BigEndian>()?;
    let data_len = reader.read_u32::<BigEndian>()?;

    if index_len == 0 || index_len > header::MAX_INDEX_ENTRIES {
        return Err(invalid_data(format!(
            "{} has an invalid number of entries: {}",
            kind, index_len
        )));
    }

    if data_len > kind.max_data_size() {
        return Err(invalid_data(format!(
            "{} data store is too large: {} bytes",
            kind, data_len
        )));
    }

    let mut index = Vec::with_capacity(index_len as usize);
    for _ in 0..index_len {
        index.push(IndexEntry::deserialize_owned(reader)?);
    }

    // Read through `take` so a lying length fails on EOF instead of allocating it up front.
    let mut store = Vec::new();
    (&mut *reader)
        .take(u64::from(data_len))
        .read_to_end(&mut store)?;
    if store.len() != data_len as usize {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("{} data store is truncated", kind),
        ));
    }

    let mut seen = HashSet::with_capacity(index.len());
    let mut entries = Vec::with_capacity(index.len());
    for entry in index.iter() {
        if !seen.insert(entry.tag) {
            return Err(invalid_data(format!(
                "{} contains tag {} more than once",
                kind, entry.tag
            )));
        }

        entries.push(Entry {
            tag: entry.tag,
            value: decode_value(&store, entry)?,
        });
    }

    let end = reader.stream_position()?;
    tracing::debug!(
        start = format_args!("{:#x}", start),
        end = format_args!("{:#x}", end),
        bytes = end - start,
        entries = index_len,
        data = data_len,
        "deserialized {}",
        kind
    );

    Ok(Header { entries })
}

fn decode_value(store: &[u8], entry: &IndexEntry) -> Result<Value> {
    if entry.count == 0 {
        return Err(invalid_data(format!("tag {} has no values", entry.tag)));
    }

    let data = store
        .get(entry.offset as usize..)
        .ok_or_else(|| out_of_bounds(entry))?;
    let count = entry.count as usize;

    let value = match entry.ty {
        types::NULL => Value::Null,
        types::CHAR => Value::Char(take(data, count, entry)?.to_vec()),
        types::INT8 => Value::Int8(take(data, count, entry)?.to_vec()),
        types::BIN => Value::Bin(take(data, count, entry)?.to_vec()),
        types::INT16 => Value::Int16(
            take_aligned(data, count, 2, entry)?
                .chunks_exact(2)
                .map(BigEndian::read_u16)
                .collect(),
        ),
        types::INT32 => Value::Int32(
            take_aligned(data, count, 4, entry)?
                .chunks_exact(4)
                .map(BigEndian::read_u32)
                .collect(),
        ),
        types::INT64 => Value::Int64(
            take_aligned(data, count, 8, entry)?
                .chunks_exact(8)
                .map(BigEndian::read_u64)
                .collect(),
        ),
        types::STRING => {
            if count != 1 {
                return Err(invalid_data(format!(
                    "string tag {} has a count of {}",
                    entry.tag, count
                )));
            }
            let mut strings = take_strings(data, 1, entry)?;
            Value::String(strings.remove(0))
        }
        types::STRING_ARRAY => Value::StringArray(take_strings(data, count, entry)?),
        types::I18NSTRING => Value::I18nString(take_strings(data, count, entry)?),
        ty => {
            return Err(invalid_data(format!(
                "invalid or unsupported value type {} for tag {}",
                ty, entry.tag
            )));
        }
    };

    Ok(value)
}

fn out_of_bounds(entry: &IndexEntry) -> std::io::Error {
    invalid_data(format!(
        "tag {} points outside the data store (offset {}, count {})",
        entry.tag, entry.offset, entry.count
    ))
}

#[inline(always)]
fn take<'a>(data: &'a [u8], len: usize, entry: &IndexEntry) -> Result<&'a [u8]> {
    data.get(..len).ok_or_else(|| out_of_bounds(entry))
}

fn take_aligned<'a>(
    data: &'a [u8],
    count: usize,
    width: usize,
    entry: &IndexEntry,
) -> Result<&'a [u8]> {
    if entry.offset as usize % width != 0 {
        return Err(invalid_data(format!(
            "tag {} is not aligned to {} bytes (offset {})",
            entry.tag, width, entry.offset
        )));
    }

    let len = count.checked_mul(width).ok_or_else(|| out_of_bounds(entry))?;
    take(data, len, entry)
}

fn take_strings(data: &[u8], count: usize, entry: &IndexEntry) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(count.min(1024));
    let mut rest = data;

    for _ in 0..count {
        let nul = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| invalid_data(format!("string in tag {} is not terminated", entry.tag)))?;
        out.push(String::from_utf8_lossy(&rest[..nul]).into_owned());
        rest = &rest[nul + 1..];
    }

    Ok(out)
}

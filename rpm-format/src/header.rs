//! The tagged header structure used for both the signature and the main header.

use std::fmt;

pub mod tags {
    pub const SIGSIZE: u32 = 257;
    pub const LONGARCHIVESIZE: u32 = 271;

    pub const NAME: u32 = 1000;
    pub const VERSION: u32 = 1001;
    pub const RELEASE: u32 = 1002;
    pub const ARCH: u32 = 1022;
    pub const OLDFILENAMES: u32 = 1027;
    pub const FILELINKTOS: u32 = 1036;
    pub const FILEFLAGS: u32 = 1037;
    pub const ARCHIVESIZE: u32 = 1046;
    pub const DIRINDEXES: u32 = 1116;
    pub const BASENAMES: u32 = 1117;
    pub const DIRNAMES: u32 = 1118;
    pub const PAYLOADFORMAT: u32 = 1124;
    pub const PAYLOADCOMPRESSOR: u32 = 1125;
    pub const PAYLOADFLAGS: u32 = 1126;

    /// Legacy signature header tags, numbered in their own space.
    pub const SIGTAG_SIZE: u32 = 1000;
    pub const SIGTAG_PAYLOADSIZE: u32 = 1007;
}

/// Bits of the per-file `FILEFLAGS` values.
pub mod file_flags {
    pub const CONFIG: u32 = 1 << 0;
}

pub mod types {
    pub const NULL: u32 = 0;
    pub const CHAR: u32 = 1;
    pub const INT8: u32 = 2;
    pub const INT16: u32 = 3;
    pub const INT32: u32 = 4;
    pub const INT64: u32 = 5;
    pub const STRING: u32 = 6;
    pub const BIN: u32 = 7;
    pub const STRING_ARRAY: u32 = 8;
    pub const I18NSTRING: u32 = 9;
}

pub(crate) const MAGIC_BYTES: &[u8; 3] = b"\x8e\xad\xe8";
pub(crate) const HEADER_VERSION: u8 = 1;

pub(crate) const MAX_INDEX_ENTRIES: u32 = 0xffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Signature,
    Main,
}

impl HeaderKind {
    pub(crate) fn max_data_size(self) -> u32 {
        match self {
            HeaderKind::Signature => 64 * 1024 * 1024,
            HeaderKind::Main => 256 * 1024 * 1024,
        }
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderKind::Signature => f.write_str("signature header"),
            HeaderKind::Main => f.write_str("header"),
        }
    }
}

/// One 16 byte record of a header's index, pointing into its data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IndexEntry {
    pub(crate) tag: u32,
    pub(crate) ty: u32,
    pub(crate) offset: u32,
    pub(crate) count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Char(Vec<u8>),
    Int8(Vec<u8>),
    Int16(Vec<u16>),
    Int32(Vec<u32>),
    Int64(Vec<u64>),
    String(String),
    Bin(Vec<u8>),
    StringArray(Vec<String>),
    I18nString(Vec<String>),
}

impl Value {
    pub fn type_id(&self) -> u32 {
        use Value::*;

        match self {
            Null => types::NULL,
            Char(_) => types::CHAR,
            Int8(_) => types::INT8,
            Int16(_) => types::INT16,
            Int32(_) => types::INT32,
            Int64(_) => types::INT64,
            String(_) => types::STRING,
            Bin(_) => types::BIN,
            StringArray(_) => types::STRING_ARRAY,
            I18nString(_) => types::I18NSTRING,
        }
    }

    /// The first element of an integer value, widened to 64 bits.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Char(v) | Value::Int8(v) => v.first().map(|x| u64::from(*x)),
            Value::Int16(v) => v.first().map(|x| u64::from(*x)),
            Value::Int32(v) => v.first().map(|x| u64::from(*x)),
            Value::Int64(v) => v.first().copied(),
            _ => None,
        }
    }

    /// All strings of a string or string array value.
    pub fn as_strings(&self) -> Option<Vec<&str>> {
        match self {
            Value::String(s) => Some(vec![s.as_str()]),
            Value::StringArray(v) | Value::I18nString(v) => Some(v.iter().map(|s| s.as_str()).collect()),
            _ => None,
        }
    }

    /// All elements of an integer value, widened to 64 bits.
    pub fn to_u64s(&self) -> Option<Vec<u64>> {
        match self {
            Value::Char(v) | Value::Int8(v) => Some(v.iter().map(|x| u64::from(*x)).collect()),
            Value::Int16(v) => Some(v.iter().map(|x| u64::from(*x)).collect()),
            Value::Int32(v) => Some(v.iter().map(|x| u64::from(*x)).collect()),
            Value::Int64(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// The value as a single string. Translated strings yield their default locale entry.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::I18nString(v) => v.first().map(|s| s.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub tag: u32,
    pub value: Value,
}

/// A parsed header. Entries keep the order of the on-disk index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    pub(crate) entries: Vec<Entry>,
}

impl Header {
    #[inline(always)]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[inline(always)]
    pub fn get(&self, tag: u32) -> Option<&Value> {
        self.entries.iter().find(|e| e.tag == tag).map(|e| &e.value)
    }

    #[inline(always)]
    pub fn contains(&self, tag: u32) -> bool {
        self.get(tag).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The fixed 96 byte preamble at the start of every package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lead {
    pub major: u8,
    pub minor: u8,
    pub package_type: u16,
    pub archnum: u16,
    pub name: String,
    pub osnum: u16,
    pub signature_type: u16,
}

pub(crate) const MAGIC_BYTES: &[u8; 4] = b"\xed\xab\xee\xdb";

pub(crate) const LEAD_SIZE: usize = 96;
pub(crate) const LEAD_NAME_SIZE: usize = 66;

/// The only signature type still in use: a header structure follows the lead.
pub(crate) const SIGTYPE_HEADERSIG: u16 = 5;

impl Lead {
    pub fn is_source(&self) -> bool {
        self.package_type == 1
    }
}

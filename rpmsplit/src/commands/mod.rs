mod blob;
mod info;
mod join;
mod split;

pub use blob::blob;
pub use info::info;
pub use join::join;
pub use split::split;

use humansize::{file_size_opts as options, FileSize};

pub(crate) fn human_size(bytes: u64) -> String {
    bytes
        .file_size(options::BINARY)
        .unwrap_or_else(|_| format!("{} B", bytes))
}

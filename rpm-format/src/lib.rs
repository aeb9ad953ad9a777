mod compression;
mod copy;
mod cpio;
mod de;
mod file;
pub mod header;
mod lead;
mod output;

#[cfg(any(test, feature = "test-util"))]
pub mod fixture;

pub use compression::{
    CodecError, Compression, PayloadCodec, PayloadDecoder, PayloadEncoder, PayloadFlags,
};
pub use copy::{copy, CopyError};
pub use cpio::{ArchiveEntry, ArchiveReader};
pub use file::{
    build_blob, join, read_package, split, BlobError, BlobStats, JoinError, JoinStats, Metadata,
    OpenError, PackageFile, PackageReader, PayloadInfo, SplitError, SplitStats,
};
pub use header::{Header, Value};
pub use lead::Lead;
pub use output::OutputFile;

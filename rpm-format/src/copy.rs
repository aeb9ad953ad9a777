use std::io::{ErrorKind, Read, Write};

const BUFFER_SIZE: usize = 64 * 1024;

/// Which side of a [`copy`] failed.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("Reading failed")]
    Read(#[source] std::io::Error),

    #[error("Writing failed")]
    Write(#[source] std::io::Error),
}

/// Copies `reader` into `writer` until `reader` is exhausted, returning the number of bytes moved.
///
/// The first failure on either side aborts the copy. `writer` is not flushed.
pub fn copy<R, W>(reader: &mut R, writer: &mut W) -> Result<u64, CopyError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let len = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(len) => len,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };

        writer.write_all(&buf[..len]).map_err(CopyError::Write)?;
        total += len as u64;
    }

    Ok(total)
}

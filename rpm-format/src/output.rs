use std::fs::File;
use std::io::{Result, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// An output file that only appears at its path once [`OutputFile::persist`] is called.
///
/// Data is written to a temporary file next to the destination. Dropping an
/// `OutputFile` without persisting it removes the temporary file, so a failed
/// run leaves nothing behind and any existing file at the path is untouched.
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
    file: NamedTempFile,
}

impl OutputFile {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<OutputFile> {
        let path = path.as_ref().to_path_buf();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix(".rpmsplit");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o644));
        }
        let file = builder.tempfile_in(dir)?;

        tracing::debug!(path = %path.display(), temp = %file.path().display(), "created output");
        Ok(OutputFile { path, file })
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves the written data onto the destination path.
    pub fn persist(self) -> Result<File> {
        let path = self.path;
        let file = self.file.persist(&path).map_err(|e| e.error)?;
        tracing::debug!(path = %path.display(), "persisted output");
        Ok(file)
    }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()
    }
}

impl Seek for OutputFile {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.file.seek(pos)
    }
}

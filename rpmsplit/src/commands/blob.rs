use std::path::PathBuf;

use crate::error::{Error, Result};

pub fn blob(package: PathBuf, blob: PathBuf, verbose: bool) -> Result<()> {
    let stats = rpm_format::build_blob(&package, &blob).map_err(|source| Error::Blob {
        path: package.clone(),
        source,
    })?;

    if verbose {
        println!(
            "{} -> {} ({} files, {})",
            package.display(),
            blob.display(),
            stats.files,
            super::human_size(stats.size),
        );
    }

    Ok(())
}

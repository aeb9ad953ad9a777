use std::path::PathBuf;

use crate::error::{Error, Result};

pub fn join(header: PathBuf, payload: PathBuf, package: PathBuf, verbose: bool) -> Result<()> {
    let stats = rpm_format::join(&header, &payload, &package).map_err(|source| Error::Join {
        path: package.clone(),
        source,
    })?;

    if verbose {
        println!(
            "{} + {} ({} as {}) -> {}",
            header.display(),
            payload.display(),
            super::human_size(stats.payload_size),
            stats.compression,
            package.display(),
        );
    }

    Ok(())
}

use std::path::PathBuf;

use crate::error::{Error, Result};

pub fn split(package: PathBuf, header: PathBuf, payload: PathBuf, verbose: bool) -> Result<()> {
    let stats = rpm_format::split(&package, &header, &payload).map_err(|source| Error::Split {
        path: package.clone(),
        source,
    })?;

    if verbose {
        println!(
            "{} -> {} ({}), {} ({}, was {})",
            package.display(),
            header.display(),
            super::human_size(stats.header_size),
            payload.display(),
            super::human_size(stats.payload_size),
            stats.compression,
        );
    }

    Ok(())
}

use std::path::PathBuf;

use rpm_format::PackageReader;

use crate::error::{Error, Result};

pub fn info(path: PathBuf) -> Result<()> {
    let reader = PackageReader::open(&path).map_err(|source| Error::OpenPackage {
        path: path.clone(),
        source,
    })?;
    let payload = reader
        .decoding_info()
        .map_err(|source| Error::Payload {
            path: path.clone(),
            source,
        })?;
    let meta = reader.metadata();

    let field = |value: Option<&str>| value.unwrap_or("-").to_string();

    println!("Name:            {}", field(meta.name()));
    println!("Version:         {}", field(meta.version()));
    println!("Release:         {}", field(meta.release()));
    println!("Architecture:    {}", field(meta.arch()));
    println!(
        "Package type:    {}",
        if meta.lead().is_source() { "source" } else { "binary" }
    );
    println!("Payload format:  {}", field(meta.payload_format()));
    println!("Payload offset:  {}", reader.payload_offset());
    println!("Compressor:      {}", payload.codec.compression().id());
    println!("Flags:           {}", field(Some(meta.payload_flags()).filter(|f| !f.is_empty())));
    println!(
        "Payload size:    {} ({} bytes)",
        super::human_size(payload.size),
        payload.size
    );

    Ok(())
}

use std::fmt;
use std::io::{BufReader, Read, Result, Write};
use std::str::FromStr;

use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use xz2::read::XzDecoder;
use xz2::stream::{Check, LzmaOptions, Stream};
use xz2::write::XzEncoder;

pub mod constants {
    pub const COMPRESSOR_GZIP: &str = "gzip";
    pub const COMPRESSOR_BZIP2: &str = "bzip2";
    pub const COMPRESSOR_XZ: &str = "xz";
    pub const COMPRESSOR_LZMA: &str = "lzma";
    pub const COMPRESSOR_ZSTD: &str = "zstd";
}

use self::constants::*;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Cannot handle payload compressor `{0}`")]
    UnsupportedCompressor(String),

    #[error("Invalid payload flags `{flags}` for {compression}: {reason}")]
    InvalidFlags {
        flags: String,
        compression: Compression,
        reason: String,
    },

    #[error("Cannot set up {compression} stream")]
    Stream {
        compression: Compression,
        #[source]
        source: std::io::Error,
    },
}

/// Payload compressors a package may declare.
#[derive(Clone, Eq, PartialEq, Hash)]
pub enum Compression {
    Gzip,
    Bzip2,
    Xz,
    Lzma,
    Zstd,
    Unknown(String),
}

impl Default for Compression {
    fn default() -> Self {
        Self::Gzip
    }
}

impl Compression {
    pub const fn available_variants() -> &'static [&'static str] {
        &[
            COMPRESSOR_GZIP,
            COMPRESSOR_BZIP2,
            COMPRESSOR_XZ,
            COMPRESSOR_LZMA,
            COMPRESSOR_ZSTD,
        ]
    }

    /// The identifier as it appears in a package header.
    pub fn id(&self) -> &str {
        use Compression::*;

        match self {
            Gzip => COMPRESSOR_GZIP,
            Bzip2 => COMPRESSOR_BZIP2,
            Xz => COMPRESSOR_XZ,
            Lzma => COMPRESSOR_LZMA,
            Zstd => COMPRESSOR_ZSTD,
            Unknown(id) => id,
        }
    }

    fn level_range(&self) -> std::ops::RangeInclusive<u32> {
        use Compression::*;

        match self {
            Gzip | Xz | Lzma => 0..=9,
            Bzip2 => 1..=9,
            Zstd => 1..=22,
            Unknown(_) => 0..=0,
        }
    }

    fn default_level(&self) -> u32 {
        use Compression::*;

        match self {
            Gzip | Xz | Lzma => 6,
            Bzip2 => 9,
            Zstd => 3,
            Unknown(_) => 0,
        }
    }
}

impl FromStr for Compression {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let compression = match s {
            COMPRESSOR_GZIP => Compression::Gzip,
            COMPRESSOR_BZIP2 => Compression::Bzip2,
            COMPRESSOR_XZ => Compression::Xz,
            COMPRESSOR_LZMA => Compression::Lzma,
            COMPRESSOR_ZSTD => Compression::Zstd,
            other => Compression::Unknown(other.to_string()),
        };

        Ok(compression)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Compression::*;

        let s = match self {
            Gzip => "gzip",
            Bzip2 => "bzip2",
            Xz => "xz",
            Lzma => "LZMA",
            Zstd => "Zstandard",
            Unknown(id) => return write!(f, "Unknown(id: {})", id),
        };

        write!(f, "{}", s)
    }
}

impl fmt::Debug for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Parsed payload flags, such as `9`, `19T8` or `19L27`.
///
/// A leading number is the compression level, `T<n>` a thread count and
/// `L<n>` a window log. The raw string is kept so it can be reported as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadFlags {
    raw: String,
    pub level: Option<u32>,
    pub threads: Option<u32>,
    pub window_log: Option<u32>,
}

impl PayloadFlags {
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for PayloadFlags {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        fn number(digits: &str) -> std::result::Result<u32, String> {
            digits
                .parse::<u32>()
                .map_err(|_| format!("`{}` is not a number", digits))
        }

        let mut flags = PayloadFlags {
            raw: s.to_string(),
            ..Default::default()
        };

        let level_len = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        if level_len > 0 {
            flags.level = Some(number(&s[..level_len])?);
        }

        let mut rest = &s[level_len..];
        while let Some(marker) = rest.chars().next() {
            let tail = &rest[marker.len_utf8()..];
            let len = tail.find(|c: char| !c.is_ascii_digit()).unwrap_or(tail.len());
            if len == 0 {
                return Err(format!("`{}` is missing its value", marker));
            }
            let value = number(&tail[..len])?;

            match marker {
                'T' => flags.threads = Some(value),
                'L' => flags.window_log = Some(value),
                other => return Err(format!("unknown flag `{}`", other)),
            }

            rest = &tail[len..];
        }

        Ok(flags)
    }
}

/// A compressor together with its flags, resolved once from the package header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadCodec {
    compression: Compression,
    flags: PayloadFlags,
}

impl PayloadCodec {
    /// A codec for writing, with `flags` parsed and checked against the compressor.
    pub fn new(compressor: &str, flags: &str) -> std::result::Result<PayloadCodec, CodecError> {
        let compression = PayloadCodec::for_decoding(compressor)?.compression;

        let invalid = |reason: String| CodecError::InvalidFlags {
            flags: flags.to_string(),
            compression: compression.clone(),
            reason,
        };

        let flags: PayloadFlags = flags.parse().map_err(invalid)?;

        if let Some(level) = flags.level {
            let range = compression.level_range();
            if !range.contains(&level) {
                return Err(invalid(format!(
                    "level {} is outside {}..={}",
                    level,
                    range.start(),
                    range.end()
                )));
            }
        }

        if let Some(window_log) = flags.window_log {
            if compression != Compression::Zstd {
                return Err(invalid("window log is only supported by zstd".into()));
            }
            if !(10..=31).contains(&window_log) {
                return Err(invalid(format!("window log {} is outside 10..=31", window_log)));
            }
        }

        Ok(PayloadCodec { compression, flags })
    }

    /// A codec for reading only. The payload flags describe how a payload was
    /// written and play no part in decompressing it, so they are not parsed.
    pub fn for_decoding(compressor: &str) -> std::result::Result<PayloadCodec, CodecError> {
        let compression: Compression = match compressor.parse() {
            Ok(v) => v,
            Err(never) => match never {},
        };

        if let Compression::Unknown(id) = &compression {
            return Err(CodecError::UnsupportedCompressor(id.clone()));
        }

        Ok(PayloadCodec {
            compression,
            flags: PayloadFlags::default(),
        })
    }

    #[inline(always)]
    pub fn compression(&self) -> &Compression {
        &self.compression
    }

    #[inline(always)]
    pub fn flags(&self) -> &PayloadFlags {
        &self.flags
    }

    pub fn level(&self) -> u32 {
        self.flags
            .level
            .unwrap_or_else(|| self.compression.default_level())
    }

    /// The read mode filter, such as `r.xz`.
    pub fn read_spec(&self) -> String {
        format!("r.{}", self.compression.id())
    }

    /// The write mode filter, such as `w9.gzip`.
    pub fn write_spec(&self) -> String {
        format!("w{}.{}", self.flags.as_str(), self.compression.id())
    }

    fn stream_error(&self, source: std::io::Error) -> CodecError {
        CodecError::Stream {
            compression: self.compression.clone(),
            source,
        }
    }

    /// Wraps `reader` so that reading yields the decompressed payload.
    ///
    /// The decoder takes ownership of `reader`; it is released when the decoder is dropped.
    pub fn decoder<R: Read>(&self, reader: R) -> std::result::Result<PayloadDecoder<R>, CodecError> {
        use Compression::*;

        tracing::debug!(filter = %self.read_spec(), "opening payload decoder");

        let decoder = match &self.compression {
            Gzip => PayloadDecoder::Gzip(MultiGzDecoder::new(reader)),
            Bzip2 => PayloadDecoder::Bzip2(MultiBzDecoder::new(reader)),
            Xz => PayloadDecoder::Xz(XzDecoder::new_multi_decoder(reader)),
            Lzma => {
                let stream = Stream::new_lzma_decoder(u64::MAX)
                    .map_err(|e| self.stream_error(e.into()))?;
                PayloadDecoder::Xz(XzDecoder::new_stream(reader, stream))
            }
            Zstd => {
                let mut decoder =
                    zstd::stream::read::Decoder::new(reader).map_err(|e| self.stream_error(e))?;
                let window_log_max = if cfg!(target_pointer_width = "64") { 31 } else { 30 };
                decoder
                    .window_log_max(window_log_max)
                    .map_err(|e| self.stream_error(e))?;
                PayloadDecoder::Zstd(decoder)
            }
            Unknown(id) => return Err(CodecError::UnsupportedCompressor(id.clone())),
        };

        Ok(decoder)
    }

    /// Wraps `writer` so that everything written to it is compressed.
    ///
    /// The encoder takes ownership of `writer`; [`PayloadEncoder::finish`] hands it back.
    pub fn encoder<W: Write>(&self, writer: W) -> std::result::Result<PayloadEncoder<W>, CodecError> {
        use Compression::*;

        let level = self.level();
        tracing::debug!(filter = %self.write_spec(), level, "opening payload encoder");

        if let Some(threads) = self.flags.threads {
            tracing::debug!(threads, "thread count in payload flags is ignored");
        }

        let encoder = match &self.compression {
            Gzip => PayloadEncoder::Gzip(GzEncoder::new(writer, flate2::Compression::new(level))),
            Bzip2 => PayloadEncoder::Bzip2(BzEncoder::new(writer, bzip2::Compression::new(level))),
            Xz => {
                let stream = Stream::new_easy_encoder(level, Check::Crc64)
                    .map_err(|e| self.stream_error(e.into()))?;
                PayloadEncoder::Xz(XzEncoder::new_stream(writer, stream))
            }
            Lzma => {
                let options =
                    LzmaOptions::new_preset(level).map_err(|e| self.stream_error(e.into()))?;
                let stream =
                    Stream::new_lzma_encoder(&options).map_err(|e| self.stream_error(e.into()))?;
                PayloadEncoder::Xz(XzEncoder::new_stream(writer, stream))
            }
            Zstd => {
                let mut encoder = zstd::stream::write::Encoder::new(writer, level as i32)
                    .map_err(|e| self.stream_error(e))?;
                if let Some(window_log) = self.flags.window_log {
                    encoder
                        .long_distance_matching(true)
                        .map_err(|e| self.stream_error(e))?;
                    encoder
                        .window_log(window_log)
                        .map_err(|e| self.stream_error(e))?;
                }
                PayloadEncoder::Zstd(encoder)
            }
            Unknown(id) => return Err(CodecError::UnsupportedCompressor(id.clone())),
        };

        Ok(encoder)
    }
}

impl fmt::Display for PayloadCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.write_spec())
    }
}

/// Decompress-on-read filter over a payload stream.
pub enum PayloadDecoder<R: Read> {
    Gzip(MultiGzDecoder<R>),
    Bzip2(MultiBzDecoder<R>),
    /// Both `.xz` and legacy `.lzma` streams.
    Xz(XzDecoder<R>),
    Zstd(zstd::stream::read::Decoder<'static, BufReader<R>>),
}

impl<R: Read> Read for PayloadDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            PayloadDecoder::Gzip(d) => d.read(buf),
            PayloadDecoder::Bzip2(d) => d.read(buf),
            PayloadDecoder::Xz(d) => d.read(buf),
            PayloadDecoder::Zstd(d) => d.read(buf),
        }
    }
}

/// Compress-on-write filter that owns the stream it writes to.
pub enum PayloadEncoder<W: Write> {
    Gzip(GzEncoder<W>),
    Bzip2(BzEncoder<W>),
    /// Both `.xz` and legacy `.lzma` streams.
    Xz(XzEncoder<W>),
    Zstd(zstd::stream::write::Encoder<'static, W>),
}

impl<W: Write> PayloadEncoder<W> {
    /// Writes the end of the compressed stream and returns the underlying writer.
    pub fn finish(self) -> Result<W> {
        match self {
            PayloadEncoder::Gzip(e) => e.finish(),
            PayloadEncoder::Bzip2(e) => e.finish(),
            PayloadEncoder::Xz(e) => e.finish(),
            PayloadEncoder::Zstd(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for PayloadEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            PayloadEncoder::Gzip(e) => e.write(buf),
            PayloadEncoder::Bzip2(e) => e.write(buf),
            PayloadEncoder::Xz(e) => e.write(buf),
            PayloadEncoder::Zstd(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            PayloadEncoder::Gzip(e) => e.flush(),
            PayloadEncoder::Bzip2(e) => e.flush(),
            PayloadEncoder::Xz(e) => e.flush(),
            PayloadEncoder::Zstd(e) => e.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(codec: &PayloadCodec, data: &[u8]) -> Vec<u8> {
        let mut encoder = codec.encoder(Vec::new()).unwrap();
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();
        assert_ne!(compressed, data);

        let mut decoder = codec.decoder(std::io::Cursor::new(compressed)).unwrap();
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn every_compressor_roundtrips() {
        let data = "This, this, this, this, this is a compressable string string string string string.\n"
            .repeat(64);

        for id in Compression::available_variants() {
            let codec = PayloadCodec::new(id, "").unwrap();
            assert_eq!(codec.compression().id(), *id);
            assert_eq!(roundtrip(&codec, data.as_bytes()), data.as_bytes(), "{}", id);
        }
    }

    #[test]
    fn write_spec_concatenates_flags_and_compressor() {
        let codec = PayloadCodec::new("gzip", "9").unwrap();
        assert_eq!(codec.write_spec(), "w9.gzip");
        assert_eq!(codec.read_spec(), "r.gzip");
        assert_eq!(codec.level(), 9);

        let codec = PayloadCodec::new("xz", "").unwrap();
        assert_eq!(codec.to_string(), "w.xz");
        assert_eq!(codec.level(), 6);
    }

    #[test]
    fn gzip_level_nine_marks_maximum_compression() {
        let codec = PayloadCodec::new("gzip", "9").unwrap();
        let mut encoder = codec.encoder(Vec::new()).unwrap();
        encoder.write_all(b"hello world").unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(&compressed[..2], b"\x1f\x8b");
        // XFL = 2: compressor used maximum compression
        assert_eq!(compressed[8], 2);
    }

    #[test]
    fn parse_flags() {
        let flags: PayloadFlags = "19T8".parse().unwrap();
        assert_eq!(flags.level, Some(19));
        assert_eq!(flags.threads, Some(8));
        assert_eq!(flags.window_log, None);
        assert_eq!(flags.as_str(), "19T8");

        let flags: PayloadFlags = "".parse().unwrap();
        assert_eq!(flags, PayloadFlags::default());

        let flags: PayloadFlags = "T0".parse().unwrap();
        assert_eq!(flags.level, None);
        assert_eq!(flags.threads, Some(0));

        assert!("9X".parse::<PayloadFlags>().is_err());
        assert!("9T".parse::<PayloadFlags>().is_err());
    }

    #[test]
    fn zstd_window_log() {
        let codec = PayloadCodec::new("zstd", "19L27").unwrap();
        assert_eq!(codec.flags().window_log, Some(27));
        let data = vec![7u8; 4096];
        assert_eq!(roundtrip(&codec, &data), data);

        assert!(matches!(
            PayloadCodec::new("xz", "6L27"),
            Err(CodecError::InvalidFlags { .. })
        ));
    }

    #[test]
    fn levels_are_checked_per_compressor() {
        assert!(PayloadCodec::new("zstd", "19").is_ok());
        assert!(matches!(
            PayloadCodec::new("gzip", "19"),
            Err(CodecError::InvalidFlags { .. })
        ));
        assert!(matches!(
            PayloadCodec::new("bzip2", "0"),
            Err(CodecError::InvalidFlags { .. })
        ));
    }

    #[test]
    fn unknown_compressor_is_rejected() {
        match PayloadCodec::new("lzip", "") {
            Err(CodecError::UnsupportedCompressor(id)) => assert_eq!(id, "lzip"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(
            "lzip".parse::<Compression>().unwrap(),
            Compression::Unknown("lzip".into())
        );
    }
}

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::str::FromStr;

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

use crate::error::{Error, Result};

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];
const BZIP2_MAGIC: &[u8] = b"BZh";
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

const XZ_LEVEL: u32 = 6;

/// Compression applied to a metadata file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionType {
    None,
    #[default]
    Gzip,
    Xz,
    Bz2,
    Zstd,
}

impl CompressionType {
    /// Suffix appended to the metadata file name.
    pub fn file_extension(&self) -> &'static str {
        match self {
            CompressionType::None => "",
            CompressionType::Gzip => ".gz",
            CompressionType::Xz => ".xz",
            CompressionType::Bz2 => ".bz2",
            CompressionType::Zstd => ".zst",
        }
    }

    /// Identify the compression from the first bytes of a file.
    ///
    /// # Examples
    ///
    /// ```
    /// use rpm_repodata::CompressionType;
    ///
    /// assert_eq!(CompressionType::detect(&[0x1f, 0x8b, 0x08]), CompressionType::Gzip);
    /// assert_eq!(CompressionType::detect(b"<?xml"), CompressionType::None);
    /// ```
    pub fn detect(magic: &[u8]) -> Self {
        if magic.starts_with(GZIP_MAGIC) {
            CompressionType::Gzip
        } else if magic.starts_with(XZ_MAGIC) {
            CompressionType::Xz
        } else if magic.starts_with(ZSTD_MAGIC) {
            CompressionType::Zstd
        } else if magic.starts_with(BZIP2_MAGIC) {
            CompressionType::Bz2
        } else {
            CompressionType::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionType::None => "none",
            CompressionType::Gzip => "gzip",
            CompressionType::Xz => "xz",
            CompressionType::Bz2 => "bz2",
            CompressionType::Zstd => "zstd",
        }
    }
}

impl FromStr for CompressionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(CompressionType::None),
            "gzip" | "gz" => Ok(CompressionType::Gzip),
            "xz" => Ok(CompressionType::Xz),
            "bz2" => Ok(CompressionType::Bz2),
            "zstd" | "zst" => Ok(CompressionType::Zstd),
            _ => Err(Error::UnsupportedCompressionType(s.to_string())),
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wrap `inner` in the decoder matching its magic bytes.
///
/// The magic bytes are peeked, not consumed, so uncompressed input is
/// passed through untouched.
pub fn decompressing_reader<R: Read + 'static>(
    inner: R,
) -> Result<(Box<dyn BufRead>, CompressionType)> {
    let mut buffered = BufReader::new(inner);
    let compression = CompressionType::detect(buffered.fill_buf()?);

    let reader: Box<dyn BufRead> = match compression {
        CompressionType::None => Box::new(buffered),
        CompressionType::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(buffered))),
        CompressionType::Xz => Box::new(BufReader::new(XzDecoder::new(buffered))),
        CompressionType::Bz2 => Box::new(BufReader::new(BzDecoder::new(buffered))),
        CompressionType::Zstd => Box::new(BufReader::new(zstd::Decoder::with_buffer(buffered)?)),
    };
    Ok((reader, compression))
}

/// A metadata output stream, optionally compressed.
///
/// Must be [`finish`](MetadataSink::finish)ed so the compressor writes its
/// trailer before the file is checksummed.
pub enum MetadataSink<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
    Xz(XzEncoder<W>),
    Bz2(BzEncoder<W>),
    Zstd(zstd::Encoder<'static, W>),
}

impl<W: Write> MetadataSink<W> {
    /// Flush the compressor and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        let mut inner = match self {
            MetadataSink::Plain(w) => w,
            MetadataSink::Gzip(e) => e.finish()?,
            MetadataSink::Xz(e) => e.finish()?,
            MetadataSink::Bz2(e) => e.finish()?,
            MetadataSink::Zstd(e) => e.finish()?,
        };
        inner.flush()?;
        Ok(inner)
    }
}

impl<W: Write> Write for MetadataSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            MetadataSink::Plain(w) => w.write(buf),
            MetadataSink::Gzip(e) => e.write(buf),
            MetadataSink::Xz(e) => e.write(buf),
            MetadataSink::Bz2(e) => e.write(buf),
            MetadataSink::Zstd(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            MetadataSink::Plain(w) => w.flush(),
            MetadataSink::Gzip(e) => e.flush(),
            MetadataSink::Xz(e) => e.flush(),
            MetadataSink::Bz2(e) => e.flush(),
            MetadataSink::Zstd(e) => e.flush(),
        }
    }
}

/// Wrap `inner` in an encoder for `compression`.
pub fn compressing_writer<W: Write>(
    inner: W,
    compression: CompressionType,
) -> Result<MetadataSink<W>> {
    Ok(match compression {
        CompressionType::None => MetadataSink::Plain(inner),
        CompressionType::Gzip => {
            MetadataSink::Gzip(GzEncoder::new(inner, flate2::Compression::default()))
        }
        CompressionType::Xz => MetadataSink::Xz(XzEncoder::new(inner, XZ_LEVEL)),
        CompressionType::Bz2 => {
            MetadataSink::Bz2(BzEncoder::new(inner, bzip2::Compression::default()))
        }
        CompressionType::Zstd => {
            MetadataSink::Zstd(zstd::Encoder::new(inner, zstd::DEFAULT_COMPRESSION_LEVEL)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const XML: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<metadata packages=\"0\"/>\n";

    #[test]
    fn extensions() {
        assert_eq!(CompressionType::None.file_extension(), "");
        assert_eq!(CompressionType::Gzip.file_extension(), ".gz");
        assert_eq!(CompressionType::Xz.file_extension(), ".xz");
        assert_eq!(CompressionType::Bz2.file_extension(), ".bz2");
        assert_eq!(CompressionType::Zstd.file_extension(), ".zst");
    }

    #[test]
    fn parse_names() {
        assert_eq!("zstd".parse::<CompressionType>().unwrap(), CompressionType::Zstd);
        assert_eq!("none".parse::<CompressionType>().unwrap(), CompressionType::None);
        assert!(matches!(
            "lz4".parse::<CompressionType>(),
            Err(Error::UnsupportedCompressionType(_))
        ));
    }

    #[test]
    fn detect_magic() {
        assert_eq!(
            CompressionType::detect(&[0xfd, b'7', b'z', b'X', b'Z', 0x00, 0x00]),
            CompressionType::Xz
        );
        assert_eq!(
            CompressionType::detect(&[0x28, 0xb5, 0x2f, 0xfd, 0x00]),
            CompressionType::Zstd
        );
        assert_eq!(CompressionType::detect(b"BZh91AY"), CompressionType::Bz2);
        assert_eq!(CompressionType::detect(&[]), CompressionType::None);
    }

    #[test]
    fn sink_output_is_readable() {
        for compression in [
            CompressionType::None,
            CompressionType::Gzip,
            CompressionType::Xz,
            CompressionType::Bz2,
            CompressionType::Zstd,
        ] {
            let mut sink = compressing_writer(Vec::new(), compression).unwrap();
            sink.write_all(XML).unwrap();
            let bytes = sink.finish().unwrap();
            assert_eq!(CompressionType::detect(&bytes), compression);

            let (mut reader, detected) = decompressing_reader(Cursor::new(bytes)).unwrap();
            assert_eq!(detected, compression);
            let mut out = Vec::new();
            reader.read_to_end(&mut out).unwrap();
            assert_eq!(out, XML);
        }
    }
}

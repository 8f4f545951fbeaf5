use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::compression::{decompressing_reader, CompressionType};
use crate::error::{Error, Result};

const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Digest algorithm named in a `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChecksumType {
    Md5,
    /// Written as `sha1`; `sha` is accepted as an alias when parsing.
    Sha1,
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl ChecksumType {
    /// Length of the hex-encoded digest.
    pub fn hex_len(&self) -> usize {
        match self {
            ChecksumType::Md5 => 32,
            ChecksumType::Sha1 => 40,
            ChecksumType::Sha224 => 56,
            ChecksumType::Sha256 => 64,
            ChecksumType::Sha384 => 96,
            ChecksumType::Sha512 => 128,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumType::Md5 => "md5",
            ChecksumType::Sha1 => "sha1",
            ChecksumType::Sha224 => "sha224",
            ChecksumType::Sha256 => "sha256",
            ChecksumType::Sha384 => "sha384",
            ChecksumType::Sha512 => "sha512",
        }
    }
}

impl FromStr for ChecksumType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "md5" => Ok(ChecksumType::Md5),
            "sha" | "sha1" => Ok(ChecksumType::Sha1),
            "sha224" => Ok(ChecksumType::Sha224),
            "sha256" => Ok(ChecksumType::Sha256),
            "sha384" => Ok(ChecksumType::Sha384),
            "sha512" => Ok(ChecksumType::Sha512),
            _ => Err(Error::UnsupportedChecksumType(s.to_string())),
        }
    }
}

impl fmt::Display for ChecksumType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, hex-encoded digest.
///
/// The hex length is validated against the type on construction, so a
/// `Checksum` always holds a plausible digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    checksum_type: ChecksumType,
    value: String,
}

impl Checksum {
    /// Build a checksum from a type name and hex digest.
    ///
    /// # Examples
    ///
    /// ```
    /// use rpm_repodata::{Checksum, ChecksumType};
    ///
    /// let sum = Checksum::try_create("sha", "da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
    /// assert_eq!(sum.checksum_type(), ChecksumType::Sha1);
    /// assert_eq!(sum.to_values().0, "sha1");
    ///
    /// assert!(Checksum::try_create("sha256", "abc").is_err());
    /// ```
    pub fn try_create(checksum_type: &str, value: &str) -> Result<Self> {
        let checksum_type: ChecksumType = checksum_type.parse()?;
        Checksum::new(checksum_type, value)
    }

    /// Build a checksum from an already parsed type.
    pub fn new(checksum_type: ChecksumType, value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.len() != checksum_type.hex_len() {
            return Err(Error::InvalidChecksum(value, checksum_type));
        }
        Ok(Checksum {
            checksum_type,
            value,
        })
    }

    pub fn checksum_type(&self) -> ChecksumType {
        self.checksum_type
    }

    /// The hex-encoded digest.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// `(type name, hex digest)` as written in metadata.
    pub fn to_values(&self) -> (&'static str, &str) {
        (self.checksum_type.as_str(), &self.value)
    }

    /// Digest everything `reader` yields.
    pub fn from_reader<R: Read>(checksum_type: ChecksumType, mut reader: R) -> Result<Self> {
        let value = match checksum_type {
            ChecksumType::Md5 => digest_hex::<Md5, _>(&mut reader)?,
            ChecksumType::Sha1 => digest_hex::<Sha1, _>(&mut reader)?,
            ChecksumType::Sha224 => digest_hex::<Sha224, _>(&mut reader)?,
            ChecksumType::Sha256 => digest_hex::<Sha256, _>(&mut reader)?,
            ChecksumType::Sha384 => digest_hex::<Sha384, _>(&mut reader)?,
            ChecksumType::Sha512 => digest_hex::<Sha512, _>(&mut reader)?,
        };
        Ok(Checksum {
            checksum_type,
            value,
        })
    }
}

/// The sha256 digest of empty input.
impl Default for Checksum {
    fn default() -> Self {
        Checksum {
            checksum_type: ChecksumType::Sha256,
            value: EMPTY_SHA256.to_string(),
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.checksum_type, self.value)
    }
}

fn digest_hex<D: Digest + io::Write, R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = D::new();
    io::copy(reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Checksum of a file's bytes as stored on disk.
pub fn checksum_file(path: &Path, checksum_type: ChecksumType) -> Result<Checksum> {
    let file = BufReader::new(File::open(path)?);
    Checksum::from_reader(checksum_type, file)
}

/// Checksum of a compressed file's decompressed content.
///
/// Returns `None` when the file is not compressed.
pub fn checksum_inner_file(path: &Path, checksum_type: ChecksumType) -> Result<Option<Checksum>> {
    let (reader, compression) = decompressing_reader(File::open(path)?)?;
    if compression == CompressionType::None {
        return Ok(None);
    }
    Checksum::from_reader(checksum_type, reader).map(Some)
}

/// Size of a compressed file's decompressed content.
///
/// Returns `None` when the file is not compressed.
pub fn size_inner_file(path: &Path) -> Result<Option<u64>> {
    let (mut reader, compression) = decompressing_reader(File::open(path)?)?;
    if compression == CompressionType::None {
        return Ok(None);
    }
    Ok(Some(io::copy(&mut reader, &mut io::sink())?))
}

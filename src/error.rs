use crate::checksum::ChecksumType;

/// Error type for repodata parsing, writing and validation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error reported by the streaming XML reader or writer.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed attribute in a metadata element.
    #[error("xml attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// Malformed or truncated XML document.
    #[error("invalid XML: {0}")]
    InvalidXml(String),

    /// I/O failure while reading or writing metadata files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata text is not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A numeric field could not be parsed.
    #[error("invalid integer field: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// Compression format that cannot be read or written.
    #[error("unsupported compression type: {0}")]
    UnsupportedCompressionType(String),

    /// Checksum algorithm that is unknown or cannot be computed.
    #[error("unsupported checksum type: {0}")]
    UnsupportedChecksumType(String),

    /// Checksum value whose length does not match its type.
    #[error("\"{0}\" is not a valid {1} checksum")]
    InvalidChecksum(String, ChecksumType),

    /// Dependency comparison flag other than LT, GT, EQ, LE or GE.
    #[error("invalid dependency flags: {0}")]
    InvalidFlags(String),

    /// Textual dependency that is not `name [op E:V-R]` or a rich dependency.
    #[error("invalid requirement: {0}")]
    InvalidRequirement(String),

    /// File type other than file, dir or ghost.
    #[error("invalid file type: {0}")]
    InvalidFileType(String),

    /// Malformed epoch-version-release value.
    #[error("invalid EVR: {0}")]
    InvalidEvr(String),

    /// `<package type>` other than `rpm`.
    #[error("unsupported package type: {0}")]
    UnsupportedPackageType(String),

    /// Metadata files disagree with each other.
    #[error("inconsistent metadata: {0}")]
    InconsistentMetadata(String),

    /// Mandatory element missing from a metadata record.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Mandatory attribute missing from a metadata element.
    #[error("missing required attribute: {0}")]
    MissingAttribute(&'static str),

    /// Attribute not allowed on a metadata element.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// Document does not start with the expected root element.
    #[error("missing metadata header")]
    MissingHeader,

    /// `repomd.xml` does not reference a required metadata file.
    #[error("repomd.xml has no {0} record")]
    MissingMetadataRecord(String),

    /// Two implementations disagree on a field.
    #[error("{field} mismatch: {candidate} != {reference}")]
    Mismatch {
        /// Name of the first field that differs.
        field: String,
        /// Value produced by the streaming reader.
        candidate: String,
        /// Value produced by the reference reader.
        reference: String,
    },
}

/// Result type for rpm-repodata operations.
pub type Result<T> = std::result::Result<T, Error>;

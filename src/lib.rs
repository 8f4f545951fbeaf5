//! Reader, writer and cross-validator for RPM repository metadata.
//!
//! An RPM repository describes its packages in a `repodata/` directory:
//! `repomd.xml` indexes the other files, `primary.xml` holds the package
//! headers, `filelists.xml` the owned files, `other.xml` the changelogs and
//! the optional `updateinfo.xml` the errata. The data files are usually
//! compressed.
//!
//! # Overview
//!
//! - [`RepositoryReader`] and [`PackageParser`] stream packages out of the
//!   three package files in lockstep.
//! - [`RepositoryWriter`] writes them back, compressed and indexed by a
//!   fresh `repomd.xml`.
//! - [`Repository`] holds a whole repository in memory.
//! - [`validate_repository`] reads a repository twice, once through the
//!   streaming readers and once through an independent tree parser, and
//!   reports the first field on which they disagree.
//!
//! # Examples
//!
//! Parse a dependency and compare versions:
//!
//! ```
//! use std::cmp::Ordering;
//! use rpm_repodata::{Evr, Requirement, RequirementFlags};
//!
//! let req = Requirement::parse("staircar <= 0:99.1-3").unwrap();
//! assert_eq!(req.flags, Some(RequirementFlags::LE));
//! assert_eq!(req.to_string(), "staircar <= 0:99.1-3");
//!
//! assert_eq!(Evr::parse("1:2.0-1").rpm_cmp(&Evr::parse("2.0-1")), Ordering::Greater);
//! assert_eq!(rpm_repodata::rpmvercmp("1.0~rc1", "1.0"), Ordering::Less);
//! ```
//!
//! Write a repository and read it back:
//!
//! ```no_run
//! use std::path::Path;
//! use rpm_repodata::{Checksum, Evr, Package, RepositoryReader, RepositoryWriter};
//!
//! let pkg = Package::new(
//!     "horse",
//!     Evr::new("0", "4.1", "1"),
//!     "noarch",
//!     Checksum::try_create(
//!         "sha256",
//!         "6d0fd7f08cef63677726973d327e0b99f819b1983f90c2b656bb27cd2112cb7f",
//!     )?,
//!     "horse-4.1-1.noarch.rpm",
//! );
//!
//! let mut writer = RepositoryWriter::new(Path::new("/tmp/repo"), 1)?;
//! writer.add_package(&pkg)?;
//! writer.finish()?;
//!
//! let reader = RepositoryReader::new_from_directory(Path::new("/tmp/repo"))?;
//! for package in reader.iter_packages()? {
//!     println!("{}", package?.nevra());
//! }
//! # Ok::<(), rpm_repodata::Error>(())
//! ```

mod advisory;
mod checksum;
mod compression;
mod dom;
mod error;
mod evr;
mod filelists;
mod other;
mod package;
mod parser;
mod primary;
mod reference;
mod repomd;
mod repository;
mod updateinfo;
mod validate;
mod xml;

// Re-export public types
pub use advisory::{
    UpdateCollection, UpdateCollectionModule, UpdateCollectionPackage, UpdateRecord,
    UpdateReference,
};
pub use checksum::{checksum_file, checksum_inner_file, size_inner_file, Checksum, ChecksumType};
pub use compression::{compressing_writer, decompressing_reader, CompressionType, MetadataSink};
pub use error::{Error, Result};
pub use evr::{compare_versions, rpmvercmp, Evr};
pub use filelists::{FilelistsXmlReader, FilelistsXmlWriter, PackageFiles};
pub use other::{OtherXmlReader, OtherXmlWriter, PackageChangelogs};
pub use package::{
    Changelog, FileType, HeaderRange, Package, PackageFile, Requirement, RequirementFlags,
};
pub use parser::PackageParser;
pub use primary::{PrimaryXmlReader, PrimaryXmlWriter};
pub use reference::{
    ReferenceAdvisory, ReferenceAdvisoryReference, ReferenceChangelog, ReferenceCollection,
    ReferenceCollectionPackage, ReferenceModule, ReferencePackage, ReferenceRepository,
    ReferenceRequirement,
};
pub use repomd::{DistroTag, RepomdData, RepomdRecord, RepomdXmlReader, RepomdXmlWriter};
pub use repository::{
    Repository, RepositoryOptions, RepositoryReader, RepositoryWriter, UpdateinfoIterator,
};
pub use updateinfo::{UpdateinfoXmlReader, UpdateinfoXmlWriter};
pub use validate::{
    compare_advisories, compare_packages, find_repos, validate_repository, ValidationReport,
};
pub use xml::{
    open_metadata, MetadataReader, XML_NS_COMMON, XML_NS_FILELISTS, XML_NS_OTHER, XML_NS_REPO,
    XML_NS_RPM,
};

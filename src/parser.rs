//! Lockstep parsing of primary, filelists and other.

use std::io::BufRead;
use std::path::Path;

use tracing::trace;

use crate::error::{Error, Result};
use crate::filelists::FilelistsXmlReader;
use crate::other::OtherXmlReader;
use crate::package::Package;
use crate::primary::PrimaryXmlReader;
use crate::repomd::RepomdData;
use crate::xml::{open_metadata, MetadataReader};

/// Streams complete [`Package`]s out of the three package metadata files.
///
/// Each step reads one package from primary.xml and the matching entries
/// of filelists.xml and other.xml, which must appear in the same order.
/// The iterator stops after the first error.
pub struct PackageParser {
    primary: PrimaryXmlReader<MetadataReader>,
    filelists: FilelistsXmlReader<MetadataReader>,
    other: OtherXmlReader<MetadataReader>,
    total_packages: usize,
    packages_parsed: usize,
    done: bool,
}

impl PackageParser {
    /// Open the files a repomd.xml points at, relative to `base`.
    pub fn from_repodata(base: &Path, repomd: &RepomdData) -> Result<Self> {
        let path_of = |name: &str| {
            repomd
                .get_record(name)
                .map(|record| base.join(&record.location_href))
                .ok_or_else(|| Error::MissingMetadataRecord(name.to_string()))
        };
        Self::from_files(
            &path_of("primary")?,
            &path_of("filelists")?,
            &path_of("other")?,
        )
    }

    pub fn from_files(primary: &Path, filelists: &Path, other: &Path) -> Result<Self> {
        Self::from_readers(
            open_metadata(primary)?,
            open_metadata(filelists)?,
            open_metadata(other)?,
        )
    }

    /// Parse already decompressed documents.
    pub fn from_readers(
        primary: impl BufRead + 'static,
        filelists: impl BufRead + 'static,
        other: impl BufRead + 'static,
    ) -> Result<Self> {
        let mut primary = PrimaryXmlReader::new(Box::new(primary) as MetadataReader);
        let mut filelists = FilelistsXmlReader::new(Box::new(filelists) as MetadataReader);
        let mut other = OtherXmlReader::new(Box::new(other) as MetadataReader);

        let primary_count = primary.read_header()?;
        let filelists_count = filelists.read_header()?;
        let other_count = other.read_header()?;
        if primary_count != filelists_count || primary_count != other_count {
            return Err(Error::InconsistentMetadata(format!(
                "package counts differ: primary {primary_count}, filelists {filelists_count}, other {other_count}"
            )));
        }

        Ok(PackageParser {
            primary,
            filelists,
            other,
            total_packages: primary_count,
            packages_parsed: 0,
            done: false,
        })
    }

    /// Number of packages the headers declare.
    pub fn total_packages(&self) -> usize {
        self.total_packages
    }

    /// Declared packages not yet parsed.
    pub fn remaining_packages(&self) -> usize {
        self.total_packages.saturating_sub(self.packages_parsed)
    }

    /// Parse the next package, or `None` once every declared package has
    /// been read.
    pub fn parse_package(&mut self) -> Result<Option<Package>> {
        let Some(mut package) = self.primary.read_package()? else {
            if self.packages_parsed < self.total_packages {
                return Err(Error::InconsistentMetadata(format!(
                    "expected {} packages, primary ended after {}",
                    self.total_packages, self.packages_parsed
                )));
            }
            if self.filelists.read_package()?.is_some() || self.other.read_package()?.is_some() {
                return Err(Error::InconsistentMetadata(
                    "filelists or other has more packages than primary".to_string(),
                ));
            }
            return Ok(None);
        };

        if self.packages_parsed == self.total_packages {
            return Err(Error::InconsistentMetadata(format!(
                "more packages than the {} declared",
                self.total_packages
            )));
        }

        let files = self.filelists.read_package()?.ok_or_else(|| {
            Error::InconsistentMetadata(format!("{} missing from filelists", package.nevra()))
        })?;
        if files.pkgid != package.pkgid() {
            return Err(Error::InconsistentMetadata(format!(
                "filelists pkgid {} does not match primary {}",
                files.pkgid,
                package.pkgid()
            )));
        }

        let changelogs = self.other.read_package()?.ok_or_else(|| {
            Error::InconsistentMetadata(format!("{} missing from other", package.nevra()))
        })?;
        if changelogs.pkgid != package.pkgid() {
            return Err(Error::InconsistentMetadata(format!(
                "other pkgid {} does not match primary {}",
                changelogs.pkgid,
                package.pkgid()
            )));
        }

        package.files = files.files;
        package.changelogs = changelogs.changelogs;
        self.packages_parsed += 1;
        trace!("parsed {}", package.nevra());
        Ok(Some(package))
    }
}

impl Iterator for PackageParser {
    type Item = Result<Package>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.parse_package() {
            Ok(Some(package)) => Some(Ok(package)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

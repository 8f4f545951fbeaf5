use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, warn};

use crate::advisory::UpdateRecord;
use crate::checksum::{checksum_file, checksum_inner_file, size_inner_file, ChecksumType};
use crate::compression::{compressing_writer, CompressionType, MetadataSink};
use crate::error::{Error, Result};
use crate::filelists::FilelistsXmlWriter;
use crate::other::OtherXmlWriter;
use crate::package::Package;
use crate::parser::PackageParser;
use crate::primary::PrimaryXmlWriter;
use crate::repomd::{RepomdData, RepomdRecord, RepomdXmlReader, RepomdXmlWriter};
use crate::updateinfo::{UpdateinfoXmlReader, UpdateinfoXmlWriter};
use crate::xml::{open_metadata, MetadataReader};

const REPODATA_DIR: &str = "repodata";
const REPOMD_FILE: &str = "repomd.xml";

/// Record types the writer produces.
const WRITTEN_RECORDS: [&str; 4] = ["primary", "filelists", "other", "updateinfo"];

type MetadataFile = MetadataSink<BufWriter<File>>;

/// A repository held fully in memory.
///
/// Packages are keyed by pkgid and advisories by id.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    repomd: RepomdData,
    packages: BTreeMap<String, Package>,
    advisories: BTreeMap<String, UpdateRecord>,
}

impl Repository {
    pub fn new() -> Self {
        Repository::default()
    }

    /// Load every package and advisory of the repository rooted at `path`.
    pub fn load_from_directory(path: &Path) -> Result<Self> {
        RepositoryReader::new_from_directory(path)?.into_repo()
    }

    /// Write the repository with default options.
    pub fn write_to_directory(&self, path: &Path) -> Result<()> {
        self.write_to_directory_with_options(path, RepositoryOptions::default())
    }

    /// Write the repository under `path`, creating `repodata/`.
    ///
    /// Tags and revision carry over; records the writer does not produce
    /// are dropped.
    pub fn write_to_directory_with_options(
        &self,
        path: &Path,
        options: RepositoryOptions,
    ) -> Result<()> {
        let mut writer = RepositoryWriter::new_with_options(path, self.packages.len(), options)?;

        let repomd = writer.repomd_mut();
        repomd.revision = self.repomd.revision.clone();
        repomd.repo_tags = self.repomd.repo_tags.clone();
        repomd.content_tags = self.repomd.content_tags.clone();
        repomd.distro_tags = self.repomd.distro_tags.clone();
        for record in &self.repomd.records {
            if !WRITTEN_RECORDS.contains(&record.metadata_name.as_str()) {
                warn!("not rewriting {} metadata", record.metadata_name);
            }
        }

        for package in self.packages.values() {
            writer.add_package(package)?;
        }
        for advisory in self.advisories.values() {
            writer.add_advisory(advisory)?;
        }
        writer.finish()
    }

    pub fn packages(&self) -> &BTreeMap<String, Package> {
        &self.packages
    }

    pub fn packages_mut(&mut self) -> &mut BTreeMap<String, Package> {
        &mut self.packages
    }

    pub fn advisories(&self) -> &BTreeMap<String, UpdateRecord> {
        &self.advisories
    }

    pub fn advisories_mut(&mut self) -> &mut BTreeMap<String, UpdateRecord> {
        &mut self.advisories
    }

    pub fn repomd(&self) -> &RepomdData {
        &self.repomd
    }

    pub fn repomd_mut(&mut self) -> &mut RepomdData {
        &mut self.repomd
    }
}

/// Write-side configuration.
///
/// # Examples
///
/// ```
/// use rpm_repodata::{ChecksumType, CompressionType, RepositoryOptions};
///
/// let options = RepositoryOptions::default()
///     .metadata_compression_type(CompressionType::Zstd)
///     .metadata_checksum_type(ChecksumType::Sha512)
///     .simple_metadata_filenames(true);
/// assert_eq!(options.metadata_compression_type, CompressionType::Zstd);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Keep `primary.xml.gz` instead of `<checksum>-primary.xml.gz`.
    pub simple_metadata_filenames: bool,
    pub metadata_compression_type: CompressionType,
    /// Used for the checksums recorded in repomd.xml.
    pub metadata_checksum_type: ChecksumType,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        RepositoryOptions {
            simple_metadata_filenames: false,
            metadata_compression_type: CompressionType::Gzip,
            metadata_checksum_type: ChecksumType::Sha256,
        }
    }
}

impl RepositoryOptions {
    pub fn simple_metadata_filenames(self, simple: bool) -> Self {
        RepositoryOptions {
            simple_metadata_filenames: simple,
            ..self
        }
    }

    pub fn metadata_compression_type(self, compression: CompressionType) -> Self {
        RepositoryOptions {
            metadata_compression_type: compression,
            ..self
        }
    }

    pub fn metadata_checksum_type(self, checksum_type: ChecksumType) -> Self {
        RepositoryOptions {
            metadata_checksum_type: checksum_type,
            ..self
        }
    }
}

/// Streaming access to an on-disk repository.
pub struct RepositoryReader {
    repomd: RepomdData,
    path: PathBuf,
}

impl RepositoryReader {
    /// Read `repodata/repomd.xml` under `path`.
    pub fn new_from_directory(path: &Path) -> Result<Self> {
        let repomd_path = path.join(REPODATA_DIR).join(REPOMD_FILE);
        let repomd = RepomdXmlReader::new(BufReader::new(File::open(&repomd_path)?)).read_data()?;
        debug!("read {}", repomd_path.display());

        for name in ["primary", "filelists", "other"] {
            if repomd.get_record(name).is_none() {
                return Err(Error::MissingMetadataRecord(name.to_string()));
            }
        }

        Ok(RepositoryReader {
            repomd,
            path: path.to_owned(),
        })
    }

    pub fn repomd(&self) -> &RepomdData {
        &self.repomd
    }

    pub fn iter_packages(&self) -> Result<PackageParser> {
        PackageParser::from_repodata(&self.path, &self.repomd)
    }

    /// Advisories from updateinfo, if the repository has any.
    pub fn iter_advisories(&self) -> Result<UpdateinfoIterator> {
        UpdateinfoIterator::from_repodata(&self.path, &self.repomd)
    }

    /// Load everything into a [`Repository`].
    pub fn into_repo(self) -> Result<Repository> {
        let mut packages = BTreeMap::new();
        for package in self.iter_packages()? {
            let package = package?;
            packages.insert(package.pkgid().to_string(), package);
        }

        let mut advisories = BTreeMap::new();
        for advisory in self.iter_advisories()? {
            let advisory = advisory?;
            advisories.insert(advisory.id.clone(), advisory);
        }

        Ok(Repository {
            repomd: self.repomd,
            packages,
            advisories,
        })
    }
}

/// Iterator over the `<update>` records of updateinfo.xml.
///
/// Empty when the repository has no updateinfo record. Stops after the
/// first error.
pub struct UpdateinfoIterator {
    reader: Option<UpdateinfoXmlReader<MetadataReader>>,
}

impl UpdateinfoIterator {
    fn from_repodata(base: &Path, repomd: &RepomdData) -> Result<Self> {
        let Some(record) = repomd.get_record("updateinfo") else {
            return Ok(UpdateinfoIterator { reader: None });
        };
        let mut reader = UpdateinfoXmlReader::new(open_metadata(
            &base.join(&record.location_href),
        )?);
        reader.read_header()?;
        Ok(UpdateinfoIterator {
            reader: Some(reader),
        })
    }
}

impl Iterator for UpdateinfoIterator {
    type Item = Result<UpdateRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.reader.as_mut()?.read_update();
        match result {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.reader = None;
                None
            }
            Err(e) => {
                self.reader = None;
                Some(Err(e))
            }
        }
    }
}

/// Writes a repository's metadata one package at a time.
///
/// The package count goes into the file headers up front, so it must be
/// known before the first package is added.
pub struct RepositoryWriter {
    options: RepositoryOptions,
    path: PathBuf,

    primary: PrimaryXmlWriter<MetadataFile>,
    filelists: FilelistsXmlWriter<MetadataFile>,
    other: OtherXmlWriter<MetadataFile>,
    updateinfo: Option<UpdateinfoXmlWriter<MetadataFile>>,

    num_pkgs: usize,
    num_pkgs_written: usize,

    repomd: RepomdData,
}

impl RepositoryWriter {
    pub fn new(path: &Path, num_pkgs: usize) -> Result<Self> {
        Self::new_with_options(path, num_pkgs, RepositoryOptions::default())
    }

    pub fn new_with_options(
        path: &Path,
        num_pkgs: usize,
        options: RepositoryOptions,
    ) -> Result<Self> {
        fs::create_dir_all(path.join(REPODATA_DIR))?;

        let mut primary = PrimaryXmlWriter::new(create_metadata_file(path, "primary", options)?);
        primary.write_header(num_pkgs)?;
        let mut filelists =
            FilelistsXmlWriter::new(create_metadata_file(path, "filelists", options)?);
        filelists.write_header(num_pkgs)?;
        let mut other = OtherXmlWriter::new(create_metadata_file(path, "other", options)?);
        other.write_header(num_pkgs)?;

        Ok(RepositoryWriter {
            options,
            path: path.to_owned(),
            primary,
            filelists,
            other,
            updateinfo: None,
            num_pkgs,
            num_pkgs_written: 0,
            repomd: RepomdData::default(),
        })
    }

    /// The repomd.xml contents, written by [`finish`](Self::finish).
    pub fn repomd_mut(&mut self) -> &mut RepomdData {
        &mut self.repomd
    }

    /// Append a package to primary, filelists and other.
    ///
    /// Only packages that were written in full count towards the declared
    /// total.
    pub fn add_package(&mut self, package: &Package) -> Result<()> {
        if self.num_pkgs_written == self.num_pkgs {
            return Err(Error::InconsistentMetadata(format!(
                "more packages than the {} declared",
                self.num_pkgs
            )));
        }
        package.epoch()?;

        self.primary.write_package(package)?;
        self.filelists.write_package(package)?;
        self.other.write_package(package)?;
        self.num_pkgs_written += 1;
        Ok(())
    }

    pub fn add_advisory(&mut self, record: &UpdateRecord) -> Result<()> {
        let updateinfo = match self.updateinfo.take() {
            Some(updateinfo) => updateinfo,
            None => {
                let mut updateinfo = UpdateinfoXmlWriter::new(create_metadata_file(
                    &self.path,
                    "updateinfo",
                    self.options,
                )?);
                updateinfo.write_header()?;
                updateinfo
            }
        };
        self.updateinfo.insert(updateinfo).write_update(record)
    }

    /// Complete every metadata file and write repomd.xml.
    pub fn finish(mut self) -> Result<()> {
        if self.num_pkgs_written != self.num_pkgs {
            return Err(Error::InconsistentMetadata(format!(
                "{} packages written, {} declared",
                self.num_pkgs_written, self.num_pkgs
            )));
        }

        close_metadata_file(self.primary.finish()?)?;
        close_metadata_file(self.filelists.finish()?)?;
        close_metadata_file(self.other.finish()?)?;
        let mut written = vec!["primary", "filelists", "other"];
        if let Some(updateinfo) = self.updateinfo.take() {
            close_metadata_file(updateinfo.finish()?)?;
            written.push("updateinfo");
        }

        for name in written {
            let record = metadata_record(&self.path, name, self.options)?;
            debug!(
                "{} record: {} ({} bytes)",
                name,
                record.location_href,
                record.size.unwrap_or_default()
            );
            self.repomd.add_record(record);
        }

        let repomd_path = self.path.join(REPODATA_DIR).join(REPOMD_FILE);
        let file = RepomdXmlWriter::new(BufWriter::new(File::create(&repomd_path)?))
            .write_data(&self.repomd)?;
        close_file(file)
    }
}

/// Describe a finished metadata file, renaming it first unless simple
/// file names were requested.
fn metadata_record(
    repo_path: &Path,
    name: &str,
    options: RepositoryOptions,
) -> Result<RepomdRecord> {
    let checksum_type = options.metadata_checksum_type;
    let filename = metadata_filename(name, options.metadata_compression_type);
    let mut path = repo_path.join(REPODATA_DIR).join(&filename);

    let checksum = checksum_file(&path, checksum_type)?;
    let open_checksum = checksum_inner_file(&path, checksum_type)?;
    let open_size = size_inner_file(&path)?;
    let metadata = fs::metadata(&path)?;
    let timestamp = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();

    let mut href_name = filename;
    if !options.simple_metadata_filenames {
        href_name = format!("{}-{}", checksum.value(), href_name);
        let renamed = path.with_file_name(&href_name);
        fs::rename(&path, &renamed)?;
        path = renamed;
    }
    debug!("wrote {}", path.display());

    Ok(RepomdRecord {
        metadata_name: name.to_string(),
        location_href: format!("{REPODATA_DIR}/{href_name}"),
        location_base: None,
        timestamp,
        size: Some(metadata.len()),
        checksum,
        open_checksum,
        open_size,
        header_checksum: None,
        header_size: None,
        database_version: None,
    })
}

fn metadata_filename(name: &str, compression: CompressionType) -> String {
    format!("{name}.xml{}", compression.file_extension())
}

fn create_metadata_file(
    path: &Path,
    name: &str,
    options: RepositoryOptions,
) -> Result<MetadataFile> {
    let file_path = path
        .join(REPODATA_DIR)
        .join(metadata_filename(name, options.metadata_compression_type));
    let file = BufWriter::new(File::create(file_path)?);
    compressing_writer(file, options.metadata_compression_type)
}

fn close_metadata_file(sink: MetadataFile) -> Result<()> {
    close_file(sink.finish()?)
}

fn close_file(file: BufWriter<File>) -> Result<()> {
    file.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Checksum;
    use crate::evr::Evr;
    use crate::package::FileType;

    fn horse() -> Package {
        let mut pkg = Package::new(
            "horse",
            Evr::new("0", "4.1", "1"),
            "noarch",
            Checksum::new(
                ChecksumType::Sha256,
                "6d0fd7f08cef63677726973d327e0b99f819b1983f90c2b656bb27cd2112cb7f",
            )
            .unwrap(),
            "horse-4.1-1.noarch.rpm",
        );
        pkg.summary = "A horse".to_string();
        pkg.add_file(FileType::File, "/usr/bin/horse");
        pkg.add_changelog("Buster <buster@bluth.com> - 4.1-1", 1617192000, "- Initial");
        pkg
    }

    #[test]
    fn write_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RepositoryWriter::new(dir.path(), 1).unwrap();
        writer.add_package(&horse()).unwrap();
        writer.finish().unwrap();

        let repo = Repository::load_from_directory(dir.path()).unwrap();
        assert_eq!(repo.packages().len(), 1);
        assert!(repo.advisories().is_empty());
        let loaded = &repo.packages()[horse().pkgid()];
        assert_eq!(loaded, &horse());

        let primary = repo.repomd().get_record("primary").unwrap();
        assert!(primary.location_href.starts_with("repodata/"));
        assert!(primary
            .location_href
            .ends_with(&format!("{}-primary.xml.gz", primary.checksum.value())));
        assert!(primary.open_checksum.is_some());
        assert!(repo.repomd().get_record("updateinfo").is_none());
    }

    #[test]
    fn simple_filenames_uncompressed() {
        let dir = tempfile::tempdir().unwrap();
        let options = RepositoryOptions::default()
            .simple_metadata_filenames(true)
            .metadata_compression_type(CompressionType::None);
        let mut writer = RepositoryWriter::new_with_options(dir.path(), 0, options).unwrap();
        writer.add_advisory(&UpdateRecord::default()).unwrap();
        writer.finish().unwrap();

        assert!(dir.path().join("repodata/primary.xml").exists());
        assert!(dir.path().join("repodata/updateinfo.xml").exists());

        let reader = RepositoryReader::new_from_directory(dir.path()).unwrap();
        let other = reader.repomd().get_record("other").unwrap();
        assert_eq!(other.location_href, "repodata/other.xml");
        assert_eq!(other.open_checksum, None);
        assert_eq!(reader.iter_advisories().unwrap().count(), 1);
    }

    #[test]
    fn package_count_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RepositoryWriter::new(dir.path(), 0).unwrap();
        assert!(matches!(
            writer.add_package(&horse()),
            Err(Error::InconsistentMetadata(_))
        ));

        let writer = RepositoryWriter::new(dir.path(), 2).unwrap();
        assert!(matches!(
            writer.finish(),
            Err(Error::InconsistentMetadata(_))
        ));
    }

    #[test]
    fn rejected_package_is_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RepositoryWriter::new(dir.path(), 1).unwrap();

        let mut bad = horse();
        bad.evr = Evr::new("x", "4.1", "1");
        assert!(matches!(writer.add_package(&bad), Err(Error::InvalidEvr(_))));

        writer.add_package(&horse()).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let options = RepositoryOptions::default().simple_metadata_filenames(true);
        RepositoryWriter::new_with_options(dir.path(), 0, options)
            .unwrap()
            .finish()
            .unwrap();

        let repomd_path = dir.path().join("repodata/repomd.xml");
        let mut repomd = RepomdXmlReader::new(BufReader::new(File::open(&repomd_path).unwrap()))
            .read_data()
            .unwrap();
        repomd.remove_record("filelists");
        RepomdXmlWriter::new(File::create(&repomd_path).unwrap())
            .write_data(&repomd)
            .unwrap();

        assert!(matches!(
            RepositoryReader::new_from_directory(dir.path()),
            Err(Error::MissingMetadataRecord(name)) if name == "filelists"
        ));
    }

    #[test]
    fn rewrite_keeps_tags() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = Repository::new();
        repo.packages_mut().insert(horse().pkgid().to_string(), horse());
        repo.repomd_mut().revision = Some("42".to_string());
        repo.repomd_mut().content_tags.push("binary-noarch".to_string());
        repo.write_to_directory(dir.path()).unwrap();

        let loaded = Repository::load_from_directory(dir.path()).unwrap();
        assert_eq!(loaded.repomd().revision.as_deref(), Some("42"));
        assert_eq!(loaded.repomd().content_tags, ["binary-noarch"]);
        assert_eq!(loaded.packages().len(), 1);
    }
}

//! Cross-checking of the streaming readers against the tree-based reader.
//!
//! Both readers load the same repository and every field is compared. The
//! first difference is reported as [`Error::Mismatch`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::advisory::UpdateRecord;
use crate::error::{Error, Result};
use crate::package::{FileType, Package, Requirement};
use crate::reference::{
    ReferenceAdvisory, ReferencePackage, ReferenceRepository, ReferenceRequirement,
};
use crate::repository::RepositoryReader;

/// What a successful validation covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub packages: usize,
    pub advisories: usize,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} packages, {} advisories",
            self.packages, self.advisories
        )
    }
}

fn check<T: PartialEq + fmt::Debug + ?Sized>(
    field: &str,
    candidate: &T,
    reference: &T,
) -> Result<()> {
    if candidate == reference {
        return Ok(());
    }
    Err(Error::Mismatch {
        field: field.to_string(),
        candidate: format!("{candidate:?}"),
        reference: format!("{reference:?}"),
    })
}

/// Parse a number as written, an empty string counting as zero.
fn number<T: std::str::FromStr + Default>(raw: &str) -> Option<T> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(T::default());
    }
    raw.parse().ok()
}

/// Attribute value normalization: literal tabs and line breaks read as
/// spaces.
fn normalize_whitespace(value: &str) -> String {
    value
        .replace("\r\n", " ")
        .replace(|c: char| matches!(c, '\t' | '\n' | '\r'), " ")
}

/// `sha` is an alias of `sha1`.
fn canonical_checksum_type(name: &str) -> &str {
    if name == "sha" {
        "sha1"
    } else {
        name
    }
}

type RequirementTuple<'a> = (
    &'a str,
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
    bool,
);

fn candidate_requirements(list: &[Requirement]) -> Vec<RequirementTuple<'_>> {
    list.iter()
        .map(|r| {
            (
                r.name.as_str(),
                r.flags.as_ref().map(|f| f.as_str()),
                r.epoch.as_deref(),
                r.version.as_deref(),
                r.release.as_deref(),
                r.preinstall,
            )
        })
        .collect()
}

fn reference_requirements(list: &[ReferenceRequirement]) -> Vec<RequirementTuple<'_>> {
    list.iter()
        .map(|r| {
            (
                r.name.as_str(),
                r.flags.as_deref(),
                r.epoch.as_deref(),
                r.version.as_deref(),
                r.release.as_deref(),
                r.pre.as_deref().is_some_and(|p| !matches!(p, "0" | "false")),
            )
        })
        .collect()
}

/// Compare a package from the streaming readers with its reference record.
pub fn compare_packages(candidate: &Package, reference: &ReferencePackage) -> Result<()> {
    check("name", candidate.name.as_str(), reference.name.as_str())?;
    check(
        "epoch",
        &candidate.epoch().ok(),
        &number::<u32>(&reference.epoch),
    )?;
    check("version", candidate.evr.version(), reference.version.as_str())?;
    check("release", candidate.evr.release(), reference.release.as_str())?;
    check("arch", candidate.arch.as_str(), reference.arch.as_str())?;
    check("nevra", &candidate.nevra(), &reference.nevra())?;
    check("nvra", &candidate.nvra(), &reference.nvra())?;
    check("pkgid", candidate.pkgid(), reference.pkgid.as_str())?;
    check(
        "checksum",
        &candidate.checksum.to_values(),
        &(
            canonical_checksum_type(&reference.checksum_type),
            reference.pkgid.as_str(),
        ),
    )?;

    check("summary", candidate.summary.as_str(), reference.summary.trim())?;
    check(
        "description",
        candidate.description.as_str(),
        reference.description.trim(),
    )?;
    check("packager", candidate.packager.as_str(), reference.packager.as_str())?;
    check("url", candidate.url.as_str(), reference.url.as_str())?;
    check(
        "location_href",
        candidate.location_href.as_str(),
        reference.location_href.as_str(),
    )?;
    check(
        "location_base",
        &candidate.location_base,
        &reference.location_base,
    )?;

    for (field, value, raw) in [
        ("time_file", candidate.time_file, &reference.time_file),
        ("time_build", candidate.time_build, &reference.time_build),
        ("size_package", candidate.size_package, &reference.size_package),
        (
            "size_installed",
            candidate.size_installed,
            &reference.size_installed,
        ),
        ("size_archive", candidate.size_archive, &reference.size_archive),
    ] {
        check(field, &Some(value), &number::<u64>(raw))?;
    }

    for (field, value, raw) in [
        ("rpm_license", &candidate.rpm_license, &reference.rpm_license),
        ("rpm_vendor", &candidate.rpm_vendor, &reference.rpm_vendor),
        ("rpm_group", &candidate.rpm_group, &reference.rpm_group),
        ("rpm_buildhost", &candidate.rpm_buildhost, &reference.rpm_buildhost),
        ("rpm_sourcerpm", &candidate.rpm_sourcerpm, &reference.rpm_sourcerpm),
    ] {
        check(field, value.as_str(), raw.trim())?;
    }

    let range = candidate.rpm_header_range;
    check(
        "rpm_header_range",
        &(Some(range.start), Some(range.end)),
        &(
            number::<u64>(&reference.rpm_header_start),
            number::<u64>(&reference.rpm_header_end),
        ),
    )?;

    let files: Vec<(&str, &str, &str)> = candidate
        .files_split()
        .map(|(filetype, dir, name)| {
            let filetype = match filetype {
                FileType::File => "",
                other => other.as_str(),
            };
            (filetype, dir, name)
        })
        .collect();
    let reference_files: Vec<(&str, &str, &str)> = reference
        .files
        .iter()
        .map(|(filetype, dir, name)| (filetype.as_str(), dir.as_str(), name.as_str()))
        .collect();
    check("files", &files, &reference_files)?;

    let changelogs: Vec<(String, Option<u64>, &str)> = candidate
        .changelogs
        .iter()
        .map(|c| {
            (
                normalize_whitespace(&c.author),
                Some(c.timestamp),
                c.description.as_str(),
            )
        })
        .collect();
    let reference_changelogs: Vec<(String, Option<u64>, &str)> = reference
        .changelogs
        .iter()
        .map(|c| {
            (
                normalize_whitespace(&c.author),
                c.date.trim().parse().ok(),
                c.text.trim(),
            )
        })
        .collect();
    check("changelogs", &changelogs, &reference_changelogs)?;

    for (field, list, raw) in [
        ("requires", &candidate.requires, &reference.requires),
        ("provides", &candidate.provides, &reference.provides),
        ("obsoletes", &candidate.obsoletes, &reference.obsoletes),
        ("recommends", &candidate.recommends, &reference.recommends),
        ("suggests", &candidate.suggests, &reference.suggests),
        ("enhances", &candidate.enhances, &reference.enhances),
        ("supplements", &candidate.supplements, &reference.supplements),
        ("conflicts", &candidate.conflicts, &reference.conflicts),
    ] {
        check(
            field,
            &candidate_requirements(list),
            &reference_requirements(raw),
        )?;
    }

    Ok(())
}

/// Compare an advisory from the streaming reader with its reference record.
pub fn compare_advisories(candidate: &UpdateRecord, reference: &ReferenceAdvisory) -> Result<()> {
    for (field, value, raw) in [
        ("fromstr", &candidate.from, &reference.fromstr),
        ("status", &candidate.status, &reference.status),
        ("type", &candidate.update_type, &reference.update_type),
        ("version", &candidate.version, &reference.version),
        ("id", &candidate.id, &reference.id),
        ("title", &candidate.title, &reference.title),
    ] {
        check(field, value.as_str(), raw.trim())?;
    }
    for (field, value, raw) in [
        ("issued_date", &candidate.issued_date, &reference.issued_date),
        ("updated_date", &candidate.updated_date, &reference.updated_date),
        ("pushcount", &candidate.pushcount, &reference.pushcount),
    ] {
        check(field, &value.as_deref(), &raw.as_deref().map(str::trim))?;
    }
    for (field, value, raw) in [
        ("rights", &candidate.rights, &reference.rights),
        ("release", &candidate.release, &reference.release),
        ("severity", &candidate.severity, &reference.severity),
        ("summary", &candidate.summary, &reference.summary),
        ("description", &candidate.description, &reference.description),
        ("solution", &candidate.solution, &reference.solution),
    ] {
        check(field, value.as_str(), raw.trim())?;
    }

    let references: Vec<_> = candidate
        .references
        .iter()
        .map(|r| (r.href.as_str(), r.id.as_str(), r.reftype.as_str(), r.title.as_str()))
        .collect();
    let reference_references: Vec<_> = reference
        .references
        .iter()
        .map(|r| (r.href.as_str(), r.id.as_str(), r.reftype.as_str(), r.title.as_str()))
        .collect();
    check("references", &references, &reference_references)?;

    check(
        "pkglist",
        &candidate.pkglist.len(),
        &reference.collections.len(),
    )?;
    for (collection, raw) in candidate.pkglist.iter().zip(&reference.collections) {
        check(
            "collection.shortname",
            collection.shortname.as_str(),
            raw.shortname.as_str(),
        )?;
        check(
            "collection.name",
            collection.name.as_str(),
            raw.name.trim(),
        )?;
        let module = collection.module.as_ref().map(|m| {
            (
                m.name.clone(),
                m.stream.clone(),
                Some(m.version),
                m.context.clone(),
                m.arch.clone(),
            )
        });
        let raw_module = raw.module.as_ref().map(|m| {
            (
                m.name.clone(),
                m.stream.clone(),
                m.version.parse::<u64>().ok(),
                m.context.clone(),
                m.arch.clone(),
            )
        });
        check("collection.module", &module, &raw_module)?;

        check(
            "collection.packages",
            &collection.packages.len(),
            &raw.packages.len(),
        )?;
        for (package, raw) in collection.packages.iter().zip(&raw.packages) {
            check("package.name", package.name.as_str(), raw.name.as_str())?;
            check(
                "package.version",
                package.version.as_str(),
                raw.version.as_str(),
            )?;
            check(
                "package.release",
                package.release.as_str(),
                raw.release.as_str(),
            )?;
            check(
                "package.epoch",
                &Some(package.epoch),
                &number::<u32>(&raw.epoch),
            )?;
            check("package.arch", package.arch.as_str(), raw.arch.as_str())?;
            check("package.src", package.src.as_str(), raw.src.as_str())?;
            check(
                "package.filename",
                package.filename.as_str(),
                raw.filename.trim(),
            )?;
            check(
                "package.sum",
                &package.checksum.as_ref().map(|c| c.value()),
                &raw.sum.as_deref().map(str::trim),
            )?;
            check(
                "package.sum_type",
                &package
                    .checksum
                    .as_ref()
                    .map(|c| c.checksum_type().as_str()),
                &raw.sum_type.as_deref().map(canonical_checksum_type),
            )?;
            check(
                "package.reboot_suggested",
                &package.reboot_suggested,
                &raw.reboot_suggested,
            )?;
        }
    }

    Ok(())
}

/// Read the repository at `path` with both readers and compare everything.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
///
/// let report = rpm_repodata::validate_repository(Path::new("tests/assets/fixture_repos/complex_repo"))?;
/// println!("{report}");
/// # Ok::<(), rpm_repodata::Error>(())
/// ```
pub fn validate_repository(path: &Path) -> Result<ValidationReport> {
    let reader = RepositoryReader::new_from_directory(path)?;
    let reference = ReferenceRepository::load(path)?;

    let mut parser = reader.iter_packages()?;
    check(
        "package count",
        &parser.total_packages(),
        &reference.packages.len(),
    )?;
    let mut report = ValidationReport::default();
    for expected in &reference.packages {
        let Some(package) = parser.next().transpose()? else {
            return Err(Error::Mismatch {
                field: "packages".to_string(),
                candidate: format!("{} packages", report.packages),
                reference: format!("{} packages", reference.packages.len()),
            });
        };
        compare_packages(&package, expected)?;
        report.packages += 1;
    }
    if let Some(extra) = parser.next().transpose()? {
        return Err(Error::Mismatch {
            field: "packages".to_string(),
            candidate: extra.nevra(),
            reference: "end of metadata".to_string(),
        });
    }
    check("remaining_packages", &parser.remaining_packages(), &0)?;

    let mut advisories = reader.iter_advisories()?;
    for expected in &reference.advisories {
        let Some(advisory) = advisories.next().transpose()? else {
            return Err(Error::Mismatch {
                field: "advisories".to_string(),
                candidate: format!("{} advisories", report.advisories),
                reference: format!("{} advisories", reference.advisories.len()),
            });
        };
        compare_advisories(&advisory, expected)?;
        report.advisories += 1;
    }
    if let Some(extra) = advisories.next().transpose()? {
        return Err(Error::Mismatch {
            field: "advisories".to_string(),
            candidate: extra.id,
            reference: "end of metadata".to_string(),
        });
    }

    info!("{}: {report}", path.display());
    Ok(report)
}

/// Repository directories under `dir`, sorted, without hidden entries and
/// `.md` files.
pub fn find_repos(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut repos = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || name.ends_with(".md") {
            continue;
        }
        repos.push(entry.path());
    }
    repos.sort();
    Ok(repos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Checksum;
    use crate::evr::Evr;
    use crate::package::RequirementFlags;
    use crate::reference::ReferenceChangelog;

    const PKGID: &str = "6d0fd7f08cef63677726973d327e0b99f819b1983f90c2b656bb27cd2112cb7f";

    fn candidate() -> Package {
        let mut pkg = Package::new(
            "horse",
            Evr::new("0", "4.1", "1"),
            "noarch",
            Checksum::try_create("sha256", PKGID).unwrap(),
            "horse-4.1-1.noarch.rpm",
        );
        pkg.summary = "A horse".to_string();
        pkg.add_file(FileType::Dir, "/usr/share/horse");
        pkg.add_changelog("Buster\tBluth - 4.1-1", 1617192000, "- Initial");
        pkg.requires.push(Requirement {
            name: "/usr/sbin/useradd".to_string(),
            preinstall: true,
            ..Requirement::default()
        });
        pkg.provides.push(Requirement {
            name: "horse".to_string(),
            flags: Some(RequirementFlags::EQ),
            epoch: Some("0".to_string()),
            version: Some("4.1".to_string()),
            release: Some("1".to_string()),
            preinstall: false,
        });
        pkg
    }

    fn reference() -> ReferencePackage {
        ReferencePackage {
            name: "horse".to_string(),
            arch: "noarch".to_string(),
            epoch: "0".to_string(),
            version: "4.1".to_string(),
            release: "1".to_string(),
            pkgid: PKGID.to_string(),
            checksum_type: "sha256".to_string(),
            summary: "\n    A horse\n  ".to_string(),
            location_href: "horse-4.1-1.noarch.rpm".to_string(),
            time_file: "0".to_string(),
            time_build: "0".to_string(),
            size_package: "0".to_string(),
            size_installed: "0".to_string(),
            size_archive: "0".to_string(),
            rpm_header_start: "0".to_string(),
            rpm_header_end: "0".to_string(),
            requires: vec![ReferenceRequirement {
                name: "/usr/sbin/useradd".to_string(),
                pre: Some("1".to_string()),
                ..ReferenceRequirement::default()
            }],
            provides: vec![ReferenceRequirement {
                name: "horse".to_string(),
                flags: Some("EQ".to_string()),
                epoch: Some("0".to_string()),
                version: Some("4.1".to_string()),
                release: Some("1".to_string()),
                pre: None,
            }],
            files: vec![(
                "dir".to_string(),
                "/usr/share/".to_string(),
                "horse".to_string(),
            )],
            changelogs: vec![ReferenceChangelog {
                author: "Buster Bluth - 4.1-1".to_string(),
                date: "1617192000".to_string(),
                text: "- Initial".to_string(),
            }],
            ..ReferencePackage::default()
        }
    }

    #[test]
    fn matching_package() {
        compare_packages(&candidate(), &reference()).unwrap();
    }

    #[test]
    fn first_mismatch_is_reported() {
        let mut raw = reference();
        raw.release = "2".to_string();
        raw.url = "http://example.com".to_string();
        match compare_packages(&candidate(), &raw) {
            Err(Error::Mismatch { field, .. }) => assert_eq!(field, "release"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sha_alias() {
        let sha1 = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
        let mut pkg = candidate();
        pkg.checksum = Checksum::try_create("sha1", sha1).unwrap();
        let mut raw = reference();
        raw.pkgid = sha1.to_string();
        raw.checksum_type = "sha".to_string();
        compare_packages(&pkg, &raw).unwrap();
    }

    #[test]
    fn pre_attribute() {
        let mut raw = reference();
        raw.requires[0].pre = Some("0".to_string());
        assert!(matches!(
            compare_packages(&candidate(), &raw),
            Err(Error::Mismatch { field, .. }) if field == "requires"
        ));
    }

    #[test]
    fn advisories() {
        let candidate = UpdateRecord {
            id: "ID-1".to_string(),
            issued_date: Some("2020-05-27 04:10:31".to_string()),
            ..UpdateRecord::default()
        };
        let mut raw = ReferenceAdvisory {
            id: "ID-1".to_string(),
            issued_date: Some("2020-05-27 04:10:31".to_string()),
            ..ReferenceAdvisory::default()
        };
        compare_advisories(&candidate, &raw).unwrap();

        raw.pushcount = Some("1".to_string());
        assert!(matches!(
            compare_advisories(&candidate, &raw),
            Err(Error::Mismatch { field, .. }) if field == "pushcount"
        ));
    }

    #[test]
    fn repo_discovery() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_repo", "a_repo", ".hidden", "README.md"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let repos = find_repos(dir.path()).unwrap();
        assert_eq!(
            repos,
            [dir.path().join("a_repo"), dir.path().join("b_repo")]
        );
    }
}

//! Whole-document reading of a repository through the winnow tree parser.
//!
//! Values are kept close to how they appear in the files: numbers stay
//! strings, text is not trimmed and checksum type names are not
//! canonicalized. The validator compares these against the streaming
//! readers.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::dom::{parse_document, Element};
use crate::error::{Error, Result};
use crate::xml::open_metadata;

/// A dependency entry as written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceRequirement {
    pub name: String,
    pub flags: Option<String>,
    pub epoch: Option<String>,
    pub version: Option<String>,
    pub release: Option<String>,
    pub pre: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceChangelog {
    pub author: String,
    pub date: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferencePackage {
    pub name: String,
    pub arch: String,
    pub epoch: String,
    pub version: String,
    pub release: String,
    pub pkgid: String,
    /// The checksum type exactly as written, `sha` included.
    pub checksum_type: String,
    pub summary: String,
    pub description: String,
    pub packager: String,
    pub url: String,
    pub location_href: String,
    pub location_base: Option<String>,
    pub time_file: String,
    pub time_build: String,
    pub size_package: String,
    pub size_installed: String,
    pub size_archive: String,
    pub rpm_license: String,
    pub rpm_vendor: String,
    pub rpm_group: String,
    pub rpm_buildhost: String,
    pub rpm_sourcerpm: String,
    pub rpm_header_start: String,
    pub rpm_header_end: String,
    pub requires: Vec<ReferenceRequirement>,
    pub provides: Vec<ReferenceRequirement>,
    pub conflicts: Vec<ReferenceRequirement>,
    pub obsoletes: Vec<ReferenceRequirement>,
    pub suggests: Vec<ReferenceRequirement>,
    pub enhances: Vec<ReferenceRequirement>,
    pub recommends: Vec<ReferenceRequirement>,
    pub supplements: Vec<ReferenceRequirement>,
    /// `(type, directory, file name)`, with an empty type for plain files.
    pub files: Vec<(String, String, String)>,
    pub changelogs: Vec<ReferenceChangelog>,
}

impl ReferencePackage {
    /// `name-epoch:version-release.arch`, an empty epoch shown as `0`.
    pub fn nevra(&self) -> String {
        let epoch = if self.epoch.is_empty() { "0" } else { &self.epoch };
        format!(
            "{}-{}:{}-{}.{}",
            self.name, epoch, self.version, self.release, self.arch
        )
    }

    pub fn nvra(&self) -> String {
        format!(
            "{}-{}-{}.{}",
            self.name, self.version, self.release, self.arch
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceAdvisoryReference {
    pub href: String,
    pub id: String,
    pub reftype: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceModule {
    pub name: String,
    pub stream: String,
    pub version: String,
    pub context: String,
    pub arch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceCollectionPackage {
    pub name: String,
    pub version: String,
    pub release: String,
    pub epoch: String,
    pub arch: String,
    pub src: String,
    pub filename: String,
    pub sum: Option<String>,
    pub sum_type: Option<String>,
    pub reboot_suggested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceCollection {
    pub shortname: String,
    pub name: String,
    pub module: Option<ReferenceModule>,
    pub packages: Vec<ReferenceCollectionPackage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceAdvisory {
    pub fromstr: String,
    pub status: String,
    pub update_type: String,
    pub version: String,
    pub id: String,
    pub title: String,
    pub issued_date: Option<String>,
    pub updated_date: Option<String>,
    pub rights: String,
    pub release: String,
    pub pushcount: Option<String>,
    pub severity: String,
    pub summary: String,
    pub description: String,
    pub solution: String,
    pub references: Vec<ReferenceAdvisoryReference>,
    pub collections: Vec<ReferenceCollection>,
}

/// Every package and advisory of a repository, read in one go.
#[derive(Debug, Clone, Default)]
pub struct ReferenceRepository {
    pub packages: Vec<ReferencePackage>,
    pub advisories: Vec<ReferenceAdvisory>,
}

impl ReferenceRepository {
    pub fn load(path: &Path) -> Result<Self> {
        let repomd = parse_document(&fs::read_to_string(
            path.join("repodata").join("repomd.xml"),
        )?)?;

        let mut locations = HashMap::new();
        for data in repomd.children_named("data") {
            let (Some(kind), Some(href)) = (
                data.attr("type"),
                data.child("location").and_then(|l| l.attr("href")),
            ) else {
                return Err(Error::MissingField("location"));
            };
            locations.insert(kind.to_string(), path.join(href));
        }
        let location = |kind: &str| {
            locations
                .get(kind)
                .ok_or_else(|| Error::MissingMetadataRecord(kind.to_string()))
        };

        let primary = load_document(location("primary")?)?;
        let filelists = load_document(location("filelists")?)?;
        let other = load_document(location("other")?)?;

        let mut file_entries = filelists.children_named("package");
        let mut changelog_entries = other.children_named("package");

        let mut packages = Vec::new();
        for element in primary.children_named("package") {
            let mut package = primary_package(element);
            let file_entry = matching_entry(file_entries.next(), &package, "filelists")?;
            let changelog_entry = matching_entry(changelog_entries.next(), &package, "other")?;
            package.files = file_entry
                .children_named("file")
                .map(|f| {
                    let path = f.text();
                    let (dir, name) = match path.rfind('/') {
                        Some(idx) => path.split_at(idx + 1),
                        None => ("", path.as_str()),
                    };
                    (
                        f.attr("type").unwrap_or_default().to_string(),
                        dir.to_string(),
                        name.to_string(),
                    )
                })
                .collect();
            package.changelogs = changelog_entry
                .children_named("changelog")
                .map(|c| ReferenceChangelog {
                    author: c.attr("author").unwrap_or_default().to_string(),
                    date: c.attr("date").unwrap_or_default().to_string(),
                    text: c.text(),
                })
                .collect();
            packages.push(package);
        }
        if file_entries.next().is_some() || changelog_entries.next().is_some() {
            return Err(Error::InconsistentMetadata(
                "filelists or other has more packages than primary".to_string(),
            ));
        }

        let advisories = match locations.get("updateinfo") {
            Some(updateinfo) => load_document(updateinfo)?
                .children_named("update")
                .map(advisory)
                .collect(),
            None => Vec::new(),
        };

        Ok(ReferenceRepository {
            packages,
            advisories,
        })
    }
}

/// The filelists or other entry at the same position as `package`.
fn matching_entry<'a>(
    entry: Option<&'a Element>,
    package: &ReferencePackage,
    document: &str,
) -> Result<&'a Element> {
    let entry = entry.ok_or_else(|| {
        Error::InconsistentMetadata(format!("{} missing from {document}", package.pkgid))
    })?;
    let pkgid = entry.attr("pkgid").unwrap_or_default();
    if pkgid != package.pkgid {
        return Err(Error::InconsistentMetadata(format!(
            "{document} pkgid {pkgid} does not match primary {}",
            package.pkgid
        )));
    }
    Ok(entry)
}

fn load_document(path: &Path) -> Result<Element> {
    let mut content = String::new();
    open_metadata(path)?.read_to_string(&mut content)?;
    parse_document(&content)
}

fn attr(element: Option<&Element>, name: &str) -> String {
    element
        .and_then(|e| e.attr(name))
        .unwrap_or_default()
        .to_string()
}

fn text(element: &Element, name: &str) -> String {
    element.child_text(name).unwrap_or_default()
}

fn primary_package(element: &Element) -> ReferencePackage {
    let version = element.child("version");
    let checksum = element.child("checksum");
    let time = element.child("time");
    let size = element.child("size");
    let location = element.child("location");
    let format = element.child("format");
    let header_range = format.and_then(|f| f.child("rpm:header-range"));
    let format_text = |name: &str| format.map(|f| text(f, name)).unwrap_or_default();
    let requirements = |name: &str| {
        format
            .and_then(|f| f.child(name))
            .map(|section| {
                section
                    .children_named("rpm:entry")
                    .map(requirement)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
    };

    ReferencePackage {
        name: text(element, "name"),
        arch: text(element, "arch"),
        epoch: attr(version, "epoch"),
        version: attr(version, "ver"),
        release: attr(version, "rel"),
        pkgid: checksum.map(Element::text).unwrap_or_default(),
        checksum_type: attr(checksum, "type"),
        summary: text(element, "summary"),
        description: text(element, "description"),
        packager: text(element, "packager"),
        url: text(element, "url"),
        location_href: attr(location, "href"),
        location_base: location
            .and_then(|l| l.attr("xml:base").or_else(|| l.attr("base")))
            .map(str::to_string),
        time_file: attr(time, "file"),
        time_build: attr(time, "build"),
        size_package: attr(size, "package"),
        size_installed: attr(size, "installed"),
        size_archive: attr(size, "archive"),
        rpm_license: format_text("rpm:license"),
        rpm_vendor: format_text("rpm:vendor"),
        rpm_group: format_text("rpm:group"),
        rpm_buildhost: format_text("rpm:buildhost"),
        rpm_sourcerpm: format_text("rpm:sourcerpm"),
        rpm_header_start: attr(header_range, "start"),
        rpm_header_end: attr(header_range, "end"),
        requires: requirements("rpm:requires"),
        provides: requirements("rpm:provides"),
        conflicts: requirements("rpm:conflicts"),
        obsoletes: requirements("rpm:obsoletes"),
        suggests: requirements("rpm:suggests"),
        enhances: requirements("rpm:enhances"),
        recommends: requirements("rpm:recommends"),
        supplements: requirements("rpm:supplements"),
        ..ReferencePackage::default()
    }
}

fn requirement(entry: &Element) -> ReferenceRequirement {
    let get = |name: &str| entry.attr(name).map(str::to_string);
    ReferenceRequirement {
        name: get("name").unwrap_or_default(),
        flags: get("flags"),
        epoch: get("epoch"),
        version: get("ver"),
        release: get("rel"),
        pre: get("pre"),
    }
}

fn date(element: Option<&Element>) -> Option<String> {
    let element = element?;
    match element.attr("date") {
        Some(date) => Some(date.to_string()),
        None => Some(element.text()).filter(|t| !t.trim().is_empty()),
    }
}

fn advisory(update: &Element) -> ReferenceAdvisory {
    let root = Some(update);
    ReferenceAdvisory {
        fromstr: attr(root, "from"),
        status: attr(root, "status"),
        update_type: attr(root, "type"),
        version: attr(root, "version"),
        id: text(update, "id"),
        title: text(update, "title"),
        issued_date: date(update.child("issued")),
        updated_date: date(update.child("updated")),
        rights: text(update, "rights"),
        release: text(update, "release"),
        pushcount: update.child_text("pushcount"),
        severity: text(update, "severity"),
        summary: text(update, "summary"),
        description: text(update, "description"),
        solution: text(update, "solution"),
        references: update
            .child("references")
            .map(|refs| {
                refs.children_named("reference")
                    .map(|r| ReferenceAdvisoryReference {
                        href: attr(Some(r), "href"),
                        id: attr(Some(r), "id"),
                        reftype: attr(Some(r), "type"),
                        title: attr(Some(r), "title"),
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default(),
        collections: update
            .child("pkglist")
            .map(|pkglist| {
                pkglist
                    .children_named("collection")
                    .map(collection)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default(),
    }
}

fn collection(element: &Element) -> ReferenceCollection {
    ReferenceCollection {
        shortname: attr(Some(element), "short"),
        name: text(element, "name"),
        module: element.child("module").map(|m| ReferenceModule {
            name: attr(Some(m), "name"),
            stream: attr(Some(m), "stream"),
            version: attr(Some(m), "version"),
            context: attr(Some(m), "context"),
            arch: attr(Some(m), "arch"),
        }),
        packages: element
            .children_named("package")
            .map(|p| {
                let sum = p.child("sum");
                ReferenceCollectionPackage {
                    name: attr(Some(p), "name"),
                    version: attr(Some(p), "version"),
                    release: attr(Some(p), "release"),
                    epoch: attr(Some(p), "epoch"),
                    arch: attr(Some(p), "arch"),
                    src: attr(Some(p), "src"),
                    filename: text(p, "filename"),
                    sum: sum.map(Element::text),
                    sum_type: sum.and_then(|s| s.attr("type")).map(str::to_string),
                    reboot_suggested: p
                        .child_text("reboot_suggested")
                        .is_some_and(|t| matches!(t.trim(), "1" | "true" | "True")),
                }
            })
            .collect(),
    }
}

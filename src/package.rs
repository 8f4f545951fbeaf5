use std::fmt;
use std::str::FromStr;

use winnow::ascii::space1;
use winnow::combinator::{alt, cut_err, dispatch, opt, peek, preceded};
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::prelude::*;
use winnow::token::{any, rest, take_while};

use crate::checksum::Checksum;
use crate::error::{Error, Result};
use crate::evr::Evr;

/// A binary or source RPM as described by primary, filelists and other.
///
/// The fields mirror the union of the three metadata files. `checksum` is
/// the package's pkgid and links the records across files.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Package {
    pub name: String,
    pub arch: String,
    pub evr: Evr,
    /// Checksum of the `.rpm` file, also used as the pkgid.
    pub checksum: Checksum,
    pub location_href: String,
    /// Optional base URL the `location_href` is relative to.
    pub location_base: Option<String>,
    pub summary: String,
    pub description: String,
    pub packager: String,
    pub url: String,
    pub time_file: u64,
    pub time_build: u64,
    pub size_package: u64,
    pub size_installed: u64,
    pub size_archive: u64,

    pub rpm_license: String,
    pub rpm_vendor: String,
    pub rpm_group: String,
    pub rpm_buildhost: String,
    pub rpm_sourcerpm: String,
    pub rpm_header_range: HeaderRange,

    pub requires: Vec<Requirement>,
    pub provides: Vec<Requirement>,
    pub conflicts: Vec<Requirement>,
    pub obsoletes: Vec<Requirement>,
    pub suggests: Vec<Requirement>,
    pub enhances: Vec<Requirement>,
    pub recommends: Vec<Requirement>,
    pub supplements: Vec<Requirement>,

    /// Changelog entries, from other.xml.
    pub changelogs: Vec<Changelog>,
    /// Every file the package owns, from filelists.xml.
    pub files: Vec<PackageFile>,
}

impl Package {
    /// Create a package with its identifying fields set and everything else
    /// empty.
    pub fn new(
        name: impl Into<String>,
        evr: Evr,
        arch: impl Into<String>,
        checksum: Checksum,
        location_href: impl Into<String>,
    ) -> Self {
        Package {
            name: name.into(),
            arch: arch.into(),
            evr,
            checksum,
            location_href: location_href.into(),
            ..Package::default()
        }
    }

    /// The hex checksum identifying this package across metadata files.
    pub fn pkgid(&self) -> &str {
        self.checksum.value()
    }

    /// The epoch as a number; an empty epoch is `0`.
    pub fn epoch(&self) -> Result<u32> {
        self.evr.epoch_number()
    }

    /// `name-version-release.arch`
    pub fn nvra(&self) -> String {
        format!(
            "{}-{}-{}.{}",
            self.name, self.evr.version, self.evr.release, self.arch
        )
    }

    /// `name-epoch:version-release.arch`, with an empty epoch shown as `0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rpm_repodata::{Checksum, Evr, Package};
    ///
    /// let pkg = Package::new(
    ///     "horse",
    ///     Evr::new("", "4.1", "1"),
    ///     "noarch",
    ///     Checksum::default(),
    ///     "horse-4.1-1.noarch.rpm",
    /// );
    /// assert_eq!(pkg.nevra(), "horse-0:4.1-1.noarch");
    /// assert_eq!(pkg.nevra_short(), "horse-4.1-1.noarch");
    /// ```
    pub fn nevra(&self) -> String {
        let epoch = if self.evr.epoch.is_empty() {
            "0"
        } else {
            self.evr.epoch.as_str()
        };
        format!(
            "{}-{}:{}-{}.{}",
            self.name, epoch, self.evr.version, self.evr.release, self.arch
        )
    }

    /// [`nvra`](Package::nvra) for epoch 0, [`nevra`](Package::nevra) otherwise.
    pub fn nevra_short(&self) -> String {
        match self.evr.epoch.as_str() {
            "" | "0" => self.nvra(),
            _ => self.nevra(),
        }
    }

    pub fn add_file(&mut self, filetype: FileType, path: impl Into<String>) -> &mut Self {
        self.files.push(PackageFile {
            filetype,
            path: path.into(),
        });
        self
    }

    pub fn add_changelog(
        &mut self,
        author: impl Into<String>,
        timestamp: u64,
        description: impl Into<String>,
    ) -> &mut Self {
        self.changelogs.push(Changelog {
            author: author.into(),
            timestamp,
            description: description.into(),
        });
        self
    }

    /// Files as `(type, directory with trailing '/', file name)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rpm_repodata::{FileType, Package};
    ///
    /// let mut pkg = Package::default();
    /// pkg.add_file(FileType::File, "/usr/bin/bash");
    /// let split: Vec<_> = pkg.files_split().collect();
    /// assert_eq!(split, [(FileType::File, "/usr/bin/", "bash")]);
    /// ```
    pub fn files_split(&self) -> impl Iterator<Item = (FileType, &str, &str)> + '_ {
        self.files.iter().map(|file| {
            let (dir, name) = file.split();
            (file.filetype, dir, name)
        })
    }
}

/// Byte range of the RPM header inside the package file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderRange {
    pub start: u64,
    pub end: u64,
}

/// One changelog entry from other.xml.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Changelog {
    /// Author line, usually `Name <email> - version`.
    pub author: String,
    /// UNIX timestamp of the entry.
    pub timestamp: u64,
    pub description: String,
}

/// Kind of a packaged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileType {
    #[default]
    File,
    Dir,
    /// Owned by the package but not shipped in the payload.
    Ghost,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::File => "file",
            FileType::Dir => "dir",
            FileType::Ghost => "ghost",
        }
    }
}

impl FromStr for FileType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(FileType::File),
            "dir" => Ok(FileType::Dir),
            "ghost" => Ok(FileType::Ghost),
            _ => Err(Error::InvalidFileType(s.to_string())),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A path owned by a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PackageFile {
    pub filetype: FileType,
    pub path: String,
}

impl PackageFile {
    /// Split the path after its last `/`. A path without a slash has an
    /// empty directory part.
    pub fn split(&self) -> (&str, &str) {
        match self.path.rfind('/') {
            Some(idx) => self.path.split_at(idx + 1),
            None => ("", self.path.as_str()),
        }
    }
}

/// Comparison operator of a versioned dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequirementFlags {
    LT,
    GT,
    EQ,
    LE,
    GE,
}

impl RequirementFlags {
    /// The name used in `flags` attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementFlags::LT => "LT",
            RequirementFlags::GT => "GT",
            RequirementFlags::EQ => "EQ",
            RequirementFlags::LE => "LE",
            RequirementFlags::GE => "GE",
        }
    }

    /// The operator used in textual dependencies.
    pub fn operator(&self) -> &'static str {
        match self {
            RequirementFlags::LT => "<",
            RequirementFlags::GT => ">",
            RequirementFlags::EQ => "=",
            RequirementFlags::LE => "<=",
            RequirementFlags::GE => ">=",
        }
    }
}

impl FromStr for RequirementFlags {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LT" => Ok(RequirementFlags::LT),
            "GT" => Ok(RequirementFlags::GT),
            "EQ" => Ok(RequirementFlags::EQ),
            "LE" => Ok(RequirementFlags::LE),
            "GE" => Ok(RequirementFlags::GE),
            _ => Err(Error::InvalidFlags(s.to_string())),
        }
    }
}

impl fmt::Display for RequirementFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dependency entry (`rpm:entry`) of a package.
///
/// Rich (boolean) dependencies such as `(foo or bar)` are stored verbatim
/// in `name` without flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Requirement {
    pub name: String,
    pub flags: Option<RequirementFlags>,
    pub epoch: Option<String>,
    pub version: Option<String>,
    pub release: Option<String>,
    /// Needed before the package's `%pre` scriptlet runs.
    pub preinstall: bool,
}

impl Requirement {
    /// An unversioned dependency.
    pub fn new(name: impl Into<String>) -> Self {
        Requirement {
            name: name.into(),
            ..Requirement::default()
        }
    }

    /// Parse a textual dependency such as `bash >= 0:5.1-2`.
    ///
    /// A missing epoch or release stays `None`; a string starting with `(`
    /// is taken as a rich dependency.
    ///
    /// # Examples
    ///
    /// ```
    /// use rpm_repodata::{Requirement, RequirementFlags};
    ///
    /// let req = Requirement::parse("arson >= 0:1.0.0-1").unwrap();
    /// assert_eq!(req.name, "arson");
    /// assert_eq!(req.flags, Some(RequirementFlags::GE));
    /// assert_eq!(req.epoch.as_deref(), Some("0"));
    /// assert_eq!(req.release.as_deref(), Some("1"));
    ///
    /// let rich = Requirement::parse("(dove and return)").unwrap();
    /// assert_eq!(rich.name, "(dove and return)");
    /// assert_eq!(rich.flags, None);
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        parse_requirement_string()
            .parse(input.trim())
            .map_err(|e| Error::InvalidRequirement(format!("{e}")))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(flags) = self.flags {
            write!(f, " {} ", flags.operator())?;
            if let Some(epoch) = &self.epoch {
                write!(f, "{epoch}:")?;
            }
            if let Some(version) = &self.version {
                f.write_str(version)?;
            }
            if let Some(release) = &self.release {
                write!(f, "-{release}")?;
            }
        }
        if self.preinstall {
            f.write_str(" (pre)")?;
        }
        Ok(())
    }
}

// Winnow parsers

fn parse_token<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| !c.is_whitespace()).parse_next(input)
}

fn parse_operator(input: &mut &str) -> ModalResult<RequirementFlags> {
    alt((
        "<=".value(RequirementFlags::LE),
        ">=".value(RequirementFlags::GE),
        "==".value(RequirementFlags::EQ),
        "=".value(RequirementFlags::EQ),
        "<".value(RequirementFlags::LT),
        ">".value(RequirementFlags::GT),
    ))
    .parse_next(input)
}

/// Parse `name [op [E:]V[-R]]`.
fn parse_simple_dependency(input: &mut &str) -> ModalResult<Requirement> {
    let name = parse_token(input)?;
    let constraint = opt(preceded(
        space1,
        (
            parse_operator,
            preceded(
                space1,
                cut_err(parse_token).context(StrContext::Label("version")),
            ),
        ),
    ))
    .parse_next(input)?;

    let mut requirement = Requirement::new(name);
    if let Some((flags, evr)) = constraint {
        let Evr {
            epoch,
            version,
            release,
        } = Evr::parse(evr);
        requirement.flags = Some(flags);
        requirement.epoch = (!epoch.is_empty()).then_some(epoch);
        requirement.version = Some(version);
        requirement.release = (!release.is_empty()).then_some(release);
    }
    Ok(requirement)
}

/// Parse a parenthesized rich dependency, kept verbatim.
fn parse_rich_dependency(input: &mut &str) -> ModalResult<Requirement> {
    rest.verify(|s: &str| s.ends_with(')'))
        .context(StrContext::Label("closing ')'"))
        .map(Requirement::new)
        .parse_next(input)
}

fn parse_requirement_string<'s>() -> impl Parser<&'s str, Requirement, ErrMode<ContextError>> {
    move |input: &mut &'s str| {
        dispatch! {peek(any);
            '(' => parse_rich_dependency,
            _ => parse_simple_dependency,
        }
        .parse_next(input)
    }
}

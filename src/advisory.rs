use crate::checksum::Checksum;

/// An erratum from updateinfo.xml.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateRecord {
    /// Issuer address, the `from` attribute.
    pub from: String,
    /// `stable`, `testing`, ...
    pub status: String,
    /// `bugfix`, `security`, `enhancement`, ...
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
    pub references: Vec<UpdateReference>,
    pub pkglist: Vec<UpdateCollection>,
}

impl UpdateRecord {
    /// Iterate over the packages of every collection.
    pub fn packages(&self) -> impl Iterator<Item = &UpdateCollectionPackage> {
        self.pkglist.iter().flat_map(|c| c.packages.iter())
    }
}

/// A link to a bug tracker entry or security notice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateReference {
    pub href: String,
    pub id: String,
    pub title: String,
    /// `bugzilla`, `cve`, `self`, ...
    pub reftype: String,
}

/// A set of packages an erratum applies to, usually one per release.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateCollection {
    pub name: String,
    /// The `short` attribute.
    pub shortname: String,
    pub module: Option<UpdateCollectionModule>,
    pub packages: Vec<UpdateCollectionPackage>,
}

/// Module stream a collection belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateCollectionModule {
    pub name: String,
    pub stream: String,
    pub version: u64,
    pub context: String,
    pub arch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateCollectionPackage {
    pub name: String,
    pub version: String,
    pub release: String,
    pub epoch: u32,
    pub arch: String,
    /// Source RPM file name.
    pub src: String,
    pub filename: String,
    pub checksum: Option<Checksum>,
    pub reboot_suggested: bool,
    pub restart_suggested: bool,
    pub relogin_suggested: bool,
}

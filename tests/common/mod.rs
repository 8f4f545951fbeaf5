#![allow(dead_code)]

use std::path::Path;

use rpm_repodata::{
    Checksum, Evr, FileType, HeaderRange, Package, Requirement, RequirementFlags,
    RepositoryWriter, UpdateCollection, UpdateCollectionModule, UpdateCollectionPackage,
    UpdateRecord, UpdateReference,
};

fn versioned(
    name: &str,
    flags: RequirementFlags,
    epoch: &str,
    version: &str,
    release: Option<&str>,
) -> Requirement {
    Requirement {
        name: name.to_owned(),
        flags: Some(flags),
        epoch: Some(epoch.to_owned()),
        version: Some(version.to_owned()),
        release: release.map(str::to_owned),
        preinstall: false,
    }
}

pub fn complex_package() -> Package {
    let mut package = Package::new(
        "complex-package",
        Evr::new("1", "2.3.4", "5.el8"),
        "x86_64",
        Checksum::try_create(
            "sha256",
            "bbb7b0e9350a0f75b923bdd0ef4f9af39765c668a3e70bfd3486ea9f0f618aaf",
        )
        .unwrap(),
        "complex-package-2.3.4-5.el8.x86_64.rpm",
    );
    package.summary = "A package for exercising many different features of RPM metadata".into();
    package.description = "Complex package".into();
    package.packager = "Michael Bluth".into();
    package.url = "http://bobloblaw.com".into();
    package.time_file = 1627052744;
    package.time_build = 1627052743;
    package.size_package = 8680;
    package.size_installed = 117;
    package.size_archive = 932;
    package.rpm_license = "MPLv2".into();
    package.rpm_vendor = "Bluth Company".into();
    package.rpm_group = "Development/Tools".into();
    package.rpm_buildhost = "localhost".into();
    package.rpm_sourcerpm = "complex-package-2.3.4-5.el8.src.rpm".into();
    package.rpm_header_range = HeaderRange {
        start: 4504,
        end: 8413,
    };

    package.provides = vec![
        Requirement::new("/usr/bin/ls"),
        versioned("complex-package", RequirementFlags::EQ, "1", "2.3.4", Some("5.el8")),
        versioned(
            "complex-package(x86-64)",
            RequirementFlags::EQ,
            "1",
            "2.3.4",
            Some("5.el8"),
        ),
        versioned("laughter", RequirementFlags::EQ, "0", "33", None),
        Requirement::new("narration(ronhoward)"),
    ];
    package.requires = vec![
        Requirement::new("/usr/bin/bash"),
        Requirement {
            preinstall: true,
            ..Requirement::new("/usr/sbin/useradd")
        },
        versioned("arson", RequirementFlags::GE, "0", "1.0.0", Some("1")),
        versioned("fur", RequirementFlags::LE, "0", "2", None),
        versioned("staircar", RequirementFlags::LE, "0", "99.1", Some("3")),
    ];
    package.conflicts = vec![versioned("foxnetwork", RequirementFlags::GT, "0", "5555", None)];
    package.obsoletes = vec![
        versioned("bluemangroup", RequirementFlags::LT, "0", "32.1", Some("0")),
        versioned("cornballer", RequirementFlags::LT, "0", "444", None),
    ];
    package.suggests = vec![
        Requirement::new("(bobloblaw >= 1.1 if maritimelaw else anyone < 0.5.1-2)"),
        Requirement::new("(dove and return)"),
        Requirement::new("(job or money > 9000)"),
    ];
    package.enhances = vec![Requirement::new("(bananas or magic)")];
    package.recommends = vec![
        Requirement::new("((hiding and attic) if light-treason)"),
        Requirement::new("GeneParmesan(PI)"),
        versioned("yacht", RequirementFlags::GT, "9", "11.0", Some("0")),
    ];
    package.supplements = vec![
        Requirement::new("((hiding and illusion) unless alliance-of-magicians)"),
        versioned("comedy", RequirementFlags::EQ, "0", "11.1", Some("4")),
    ];

    package
        .add_file(FileType::File, "/etc/complex/pkg.cfg")
        .add_file(FileType::File, "/usr/bin/complex_a")
        .add_file(FileType::Dir, "/usr/share/doc/complex-package")
        .add_file(FileType::File, "/usr/share/doc/complex-package/README")
        .add_file(FileType::Dir, "/var/lib/complex")
        .add_file(FileType::Ghost, "/var/log/complex.log");

    package
        .add_changelog(
            "Lucille Bluth <lucille@bluthcompany.com> - 1.1.1-1",
            1617192000,
            "- It's a banana, Michael. How much could it cost, $10?",
        )
        .add_changelog(
            "Job Bluth <job@alliance-of-magicians.com> - 2.2.2-2",
            1619352000,
            "- I've made a huge mistake",
        )
        .add_changelog(
            "George Bluth <george@federalprison.gov> - 3.3.3-3",
            1623672000,
            "- There’s always money in the banana stand",
        );
    package
}

pub fn rpm_empty() -> Package {
    let mut package = Package::new(
        "rpm-empty",
        Evr::new("0", "0", "0"),
        "x86_64",
        Checksum::try_create(
            "sha256",
            "90fbba546300f507473547f33e229ee7bad94bbbe6e84b21d485e8e43b5f1132",
        )
        .unwrap(),
        "rpm-empty-0-0.x86_64.rpm",
    );
    package.summary = "\"\"".into();
    package.time_file = 1625930845;
    package.time_build = 1615686424;
    package.size_package = 6005;
    package.size_installed = 0;
    package.size_archive = 124;
    package.rpm_license = "LGPL".into();
    package.rpm_group = "Unspecified".into();
    package.rpm_buildhost = "localhost".into();
    package.rpm_sourcerpm = "rpm-empty-0-0.src.rpm".into();
    package.rpm_header_range = HeaderRange {
        start: 4504,
        end: 5961,
    };
    package.provides = vec![
        versioned("rpm-empty", RequirementFlags::EQ, "0", "0", Some("0")),
        versioned("rpm-empty(x86-64)", RequirementFlags::EQ, "0", "0", Some("0")),
    ];
    package
}

pub fn rpm_with_invalid_chars() -> Package {
    let mut package = Package::new(
        "rpm-with-invalid-chars",
        Evr::new("0", "1", "1.fc33"),
        "noarch",
        Checksum::try_create(
            "sha256",
            "64f1444f8e86a9ae6accdc2c4b12cb4a87fb2414c0998df461a8623a52eb3cc4",
        )
        .unwrap(),
        "rpm-with-invalid-chars-1-1.fc33.noarch.rpm",
    );
    package.summary = "An RPM file with invalid characters in its description.".into();
    package.description = "This RPM that contains XML-illegal characters such as ampersand & \
        and less-than < greater-than > in its </description>. These must be escaped in the \
        final XML metadata. XML does not strictly require escaping 'single' or \
        \"double\" quotes within text content, and not all XML libraries do so."
        .into();
    package.url = "https://github.com/dralley/rpmrepo_rs/".into();
    package.time_file = 1627052743;
    package.time_build = 1627052743;
    package.size_package = 6072;
    package.size_archive = 124;
    package.rpm_license = "MIT".into();
    package.rpm_group = "Unspecified".into();
    package.rpm_buildhost = "localhost".into();
    package.rpm_sourcerpm = "rpm-with-invalid-chars-1-1.fc33.src.rpm".into();
    package.rpm_header_range = HeaderRange {
        start: 4504,
        end: 6021,
    };
    package.provides = vec![versioned(
        "rpm-with-invalid-chars",
        RequirementFlags::EQ,
        "0",
        "1",
        Some("1.fc33"),
    )];
    package
}

pub fn security_advisory() -> UpdateRecord {
    UpdateRecord {
        from: "errata@redhat.com".into(),
        status: "stable".into(),
        update_type: "security".into(),
        version: "2".into(),
        id: "RHSA-2021:1234".into(),
        title: "Important: complex-package security update".into(),
        issued_date: Some("2021-07-23 00:00:00".into()),
        updated_date: Some("2021-07-24 00:00:00".into()),
        rights: "Copyright 2021 Bluth Company".into(),
        release: "Bluth Linux 8".into(),
        pushcount: Some("1".into()),
        severity: "Important".into(),
        summary: "An update for complex-package is now available.".into(),
        description: "Fixes the banana stand & the staircar.".into(),
        solution: "Run `dnf update` <now>.".into(),
        references: vec![UpdateReference {
            href: "https://bugzilla.example.com/show_bug.cgi?id=1234".into(),
            id: "1234".into(),
            title: "complex-package: money in the banana stand".into(),
            reftype: "bugzilla".into(),
        }],
        pkglist: vec![UpdateCollection {
            name: "Bluth Linux 8".into(),
            shortname: "bluth-8".into(),
            module: Some(UpdateCollectionModule {
                name: "complex".into(),
                stream: "2".into(),
                version: 8040020210723,
                context: "5ea3b708".into(),
                arch: "x86_64".into(),
            }),
            packages: vec![UpdateCollectionPackage {
                name: "complex-package".into(),
                version: "2.3.4".into(),
                release: "5.el8".into(),
                epoch: 1,
                arch: "x86_64".into(),
                src: "complex-package-2.3.4-5.el8.src.rpm".into(),
                filename: "complex-package-2.3.4-5.el8.x86_64.rpm".into(),
                checksum: Some(
                    Checksum::try_create(
                        "sha256",
                        "bbb7b0e9350a0f75b923bdd0ef4f9af39765c668a3e70bfd3486ea9f0f618aaf",
                    )
                    .unwrap(),
                ),
                reboot_suggested: true,
                restart_suggested: false,
                relogin_suggested: false,
            }],
        }],
    }
}

pub fn all_packages() -> Vec<Package> {
    vec![complex_package(), rpm_empty(), rpm_with_invalid_chars()]
}

/// Write the fixture packages and advisory as a repository under `path`.
pub fn write_fixture_repo(path: &Path, writer: RepositoryWriter) {
    let mut writer = writer;
    for package in all_packages() {
        writer.add_package(&package).unwrap();
    }
    writer.add_advisory(&security_advisory()).unwrap();
    writer.finish().unwrap();
    assert!(path.join("repodata/repomd.xml").exists());
}

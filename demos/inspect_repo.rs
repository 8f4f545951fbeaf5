use std::path::PathBuf;

use rpm_repodata::RepositoryReader;

fn main() {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .expect("usage: inspect_repo <repository directory>");

    let reader = RepositoryReader::new_from_directory(&path).expect("failed to read repomd.xml");
    let repomd = reader.repomd();

    println!("=== {} ===", path.display());
    if let Some(revision) = &repomd.revision {
        println!("Revision:     {revision}");
    }
    for record in &repomd.records {
        println!(
            "{:<13} {} ({} bytes)",
            format!("{}:", record.metadata_name),
            record.location_href,
            record.size.unwrap_or_default()
        );
    }

    let packages = reader.iter_packages().expect("failed to open package metadata");
    println!();
    println!("{} packages", packages.total_packages());
    for package in packages {
        let package = package.expect("failed to parse package");
        println!();
        println!("{}", package.nevra_short());
        println!("  Summary:    {}", package.summary);
        println!("  Files:      {}", package.files.len());
        println!("  Changelogs: {}", package.changelogs.len());
        for requirement in &package.requires {
            println!("  Requires:   {requirement}");
        }
        for provide in &package.provides {
            println!("  Provides:   {provide}");
        }
    }

    for advisory in reader.iter_advisories().expect("failed to open updateinfo") {
        let advisory = advisory.expect("failed to parse advisory");
        println!();
        println!("{} [{}] {}", advisory.id, advisory.update_type, advisory.title);
        for package in advisory.packages() {
            println!(
                "  {}-{}:{}-{}.{}",
                package.name, package.epoch, package.version, package.release, package.arch
            );
        }
    }
}

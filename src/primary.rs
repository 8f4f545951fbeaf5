use std::io::{BufRead, Write};

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::checksum::Checksum;
use crate::error::{Error, Result};
use crate::evr::Evr;
use crate::filelists::write_file_element;
use crate::package::{HeaderRange, Package, PackageFile, Requirement};
use crate::xml::{
    configure_reader, new_writer, optional_attribute, read_package_count, read_text,
    required_attribute, skip_element, unexpected_eof, write_declaration, write_footer,
    write_text_element, XML_NS_COMMON, XML_NS_RPM,
};

const TAG_METADATA: &str = "metadata";
const TAG_PACKAGE: &str = "package";
const TAG_FORMAT: &str = "format";
const TAG_RPM_ENTRY: &[u8] = b"rpm:entry";

const TAG_RPM_PROVIDES: &str = "rpm:provides";
const TAG_RPM_REQUIRES: &str = "rpm:requires";
const TAG_RPM_CONFLICTS: &str = "rpm:conflicts";
const TAG_RPM_OBSOLETES: &str = "rpm:obsoletes";
const TAG_RPM_SUGGESTS: &str = "rpm:suggests";
const TAG_RPM_ENHANCES: &str = "rpm:enhances";
const TAG_RPM_RECOMMENDS: &str = "rpm:recommends";
const TAG_RPM_SUPPLEMENTS: &str = "rpm:supplements";

/// Streaming reader for primary.xml.
pub struct PrimaryXmlReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    text_buf: Vec<u8>,
}

impl<R: BufRead> PrimaryXmlReader<R> {
    pub fn new(inner: R) -> Self {
        PrimaryXmlReader {
            reader: configure_reader(inner),
            buf: Vec::new(),
            text_buf: Vec::new(),
        }
    }

    /// Read up to the `<metadata>` root and return its declared package
    /// count.
    pub fn read_header(&mut self) -> Result<usize> {
        read_package_count(&mut self.reader, TAG_METADATA.as_bytes(), &mut self.buf)
    }

    /// Read the next `<package>`, or `None` once the document is exhausted.
    ///
    /// Files listed in primary's `<format>` section are a subset of
    /// filelists.xml and are not collected here.
    pub fn read_package(&mut self) -> Result<Option<Package>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) if e.name().as_ref() == TAG_PACKAGE.as_bytes() => {
                    if let Some(ptype) = optional_attribute(&e, "type")? {
                        if ptype != "rpm" {
                            return Err(Error::UnsupportedPackageType(ptype));
                        }
                    }
                    return parse_package(&mut self.reader, &mut self.text_buf).map(Some);
                }
                Event::Eof => return Ok(None),
                _ => (),
            }
        }
    }
}

fn parse_package<R: BufRead>(reader: &mut Reader<R>, buf: &mut Vec<u8>) -> Result<Package> {
    let mut package = Package::default();
    let mut text_buf = Vec::new();
    let mut checksum = None;

    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"name" => package.name = read_text(reader, b"name", &mut text_buf)?,
                b"arch" => package.arch = read_text(reader, b"arch", &mut text_buf)?,
                b"version" => {
                    package.evr = Evr::new(
                        required_attribute(&e, "epoch")?,
                        required_attribute(&e, "ver")?,
                        required_attribute(&e, "rel")?,
                    );
                    skip_element(reader, &e, &mut text_buf)?;
                }
                b"checksum" => {
                    let checksum_type = required_attribute(&e, "type")?;
                    let value = read_text(reader, b"checksum", &mut text_buf)?;
                    checksum = Some(Checksum::try_create(&checksum_type, &value)?);
                }
                b"summary" => package.summary = read_text(reader, b"summary", &mut text_buf)?,
                b"description" => {
                    package.description = read_text(reader, b"description", &mut text_buf)?
                }
                b"packager" => package.packager = read_text(reader, b"packager", &mut text_buf)?,
                b"url" => package.url = read_text(reader, b"url", &mut text_buf)?,
                b"time" => {
                    package.time_file = required_attribute(&e, "file")?.parse()?;
                    package.time_build = required_attribute(&e, "build")?.parse()?;
                    skip_element(reader, &e, &mut text_buf)?;
                }
                b"size" => {
                    package.size_package = required_attribute(&e, "package")?.parse()?;
                    package.size_installed = required_attribute(&e, "installed")?.parse()?;
                    package.size_archive = required_attribute(&e, "archive")?.parse()?;
                    skip_element(reader, &e, &mut text_buf)?;
                }
                b"location" => {
                    package.location_href = required_attribute(&e, "href")?;
                    package.location_base = match optional_attribute(&e, "xml:base")? {
                        Some(base) => Some(base),
                        None => optional_attribute(&e, "base")?,
                    };
                    skip_element(reader, &e, &mut text_buf)?;
                }
                b"format" => parse_format(reader, &mut package, &mut text_buf)?,
                _ => skip_element(reader, &e, &mut text_buf)?,
            },
            Event::End(e) if e.name().as_ref() == TAG_PACKAGE.as_bytes() => break,
            Event::Eof => return Err(unexpected_eof(TAG_PACKAGE.as_bytes())),
            _ => (),
        }
    }

    package.checksum = checksum.ok_or(Error::MissingField("checksum"))?;
    Ok(package)
}

fn parse_format<R: BufRead>(
    reader: &mut Reader<R>,
    package: &mut Package,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let mut text_buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = e.name();
                let section = match name.as_ref() {
                    b"rpm:license" => {
                        package.rpm_license = read_text(reader, b"rpm:license", &mut text_buf)?;
                        continue;
                    }
                    b"rpm:vendor" => {
                        package.rpm_vendor = read_text(reader, b"rpm:vendor", &mut text_buf)?;
                        continue;
                    }
                    b"rpm:group" => {
                        package.rpm_group = read_text(reader, b"rpm:group", &mut text_buf)?;
                        continue;
                    }
                    b"rpm:buildhost" => {
                        package.rpm_buildhost =
                            read_text(reader, b"rpm:buildhost", &mut text_buf)?;
                        continue;
                    }
                    b"rpm:sourcerpm" => {
                        package.rpm_sourcerpm =
                            read_text(reader, b"rpm:sourcerpm", &mut text_buf)?;
                        continue;
                    }
                    b"rpm:header-range" => {
                        package.rpm_header_range = HeaderRange {
                            start: required_attribute(&e, "start")?.parse()?,
                            end: required_attribute(&e, "end")?.parse()?,
                        };
                        skip_element(reader, &e, &mut text_buf)?;
                        continue;
                    }
                    b"rpm:provides" => &mut package.provides,
                    b"rpm:requires" => &mut package.requires,
                    b"rpm:conflicts" => &mut package.conflicts,
                    b"rpm:obsoletes" => &mut package.obsoletes,
                    b"rpm:suggests" => &mut package.suggests,
                    b"rpm:enhances" => &mut package.enhances,
                    b"rpm:recommends" => &mut package.recommends,
                    b"rpm:supplements" => &mut package.supplements,
                    _ => {
                        skip_element(reader, &e, &mut text_buf)?;
                        continue;
                    }
                };
                *section = parse_requirement_list(reader, name.as_ref(), &mut text_buf)?;
            }
            Event::End(e) if e.name().as_ref() == TAG_FORMAT.as_bytes() => return Ok(()),
            Event::Eof => return Err(unexpected_eof(TAG_FORMAT.as_bytes())),
            _ => (),
        }
    }
}

fn parse_requirement_list<R: BufRead>(
    reader: &mut Reader<R>,
    section: &[u8],
    buf: &mut Vec<u8>,
) -> Result<Vec<Requirement>> {
    let mut list = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) if e.name().as_ref() == TAG_RPM_ENTRY => {
                list.push(parse_requirement(&e)?);
            }
            Event::End(e) if e.name().as_ref() == section => return Ok(list),
            Event::Eof => return Err(unexpected_eof(section)),
            _ => (),
        }
    }
}

/// Build a requirement from the attributes of an `rpm:entry`.
fn parse_requirement(e: &BytesStart) -> Result<Requirement> {
    let mut requirement = Requirement::default();
    let mut name = None;

    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"name" => name = Some(value.into_owned()),
            b"flags" => requirement.flags = Some(value.parse()?),
            b"epoch" => requirement.epoch = Some(value.into_owned()),
            b"ver" => requirement.version = Some(value.into_owned()),
            b"rel" => requirement.release = Some(value.into_owned()),
            b"pre" => requirement.preinstall = !matches!(value.as_ref(), "0" | "false"),
            other => {
                return Err(Error::UnknownAttribute(
                    String::from_utf8_lossy(other).into_owned(),
                ))
            }
        }
    }

    requirement.name = name.ok_or(Error::MissingAttribute("name"))?;
    Ok(requirement)
}

/// Streaming writer for primary.xml.
pub struct PrimaryXmlWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> PrimaryXmlWriter<W> {
    pub fn new(inner: W) -> Self {
        PrimaryXmlWriter {
            writer: new_writer(inner),
        }
    }

    pub fn write_header(&mut self, num_pkgs: usize) -> Result<()> {
        write_declaration(&mut self.writer)?;

        let mut metadata_tag = BytesStart::new(TAG_METADATA);
        metadata_tag.push_attribute(("xmlns", XML_NS_COMMON));
        metadata_tag.push_attribute(("xmlns:rpm", XML_NS_RPM));
        metadata_tag.push_attribute(("packages", num_pkgs.to_string().as_str()));
        self.writer.write_event(Event::Start(metadata_tag))?;
        Ok(())
    }

    pub fn write_package(&mut self, package: &Package) -> Result<()> {
        let writer = &mut self.writer;

        let mut package_tag = BytesStart::new(TAG_PACKAGE);
        package_tag.push_attribute(("type", "rpm"));
        writer.write_event(Event::Start(package_tag.borrow()))?;

        write_text_element(writer, "name", &package.name)?;
        write_text_element(writer, "arch", &package.arch)?;

        let (epoch, version, release) = package.evr.values();
        writer
            .create_element("version")
            .with_attribute(("epoch", epoch))
            .with_attribute(("ver", version))
            .with_attribute(("rel", release))
            .write_empty()?;

        let (checksum_type, checksum_value) = package.checksum.to_values();
        writer
            .create_element("checksum")
            .with_attribute(("type", checksum_type))
            .with_attribute(("pkgid", "YES"))
            .write_text_content(BytesText::new(checksum_value))?;

        write_text_element(writer, "summary", &package.summary)?;
        write_text_element(writer, "description", &package.description)?;
        write_text_element(writer, "packager", &package.packager)?;
        write_text_element(writer, "url", &package.url)?;

        writer
            .create_element("time")
            .with_attribute(("file", package.time_file.to_string().as_str()))
            .with_attribute(("build", package.time_build.to_string().as_str()))
            .write_empty()?;

        writer
            .create_element("size")
            .with_attribute(("package", package.size_package.to_string().as_str()))
            .with_attribute(("installed", package.size_installed.to_string().as_str()))
            .with_attribute(("archive", package.size_archive.to_string().as_str()))
            .write_empty()?;

        let mut location = writer.create_element("location");
        if let Some(base) = &package.location_base {
            location = location.with_attribute(("xml:base", base.as_str()));
        }
        location
            .with_attribute(("href", package.location_href.as_str()))
            .write_empty()?;

        let format_tag = BytesStart::new(TAG_FORMAT);
        writer.write_event(Event::Start(format_tag.borrow()))?;

        write_text_element(writer, "rpm:license", &package.rpm_license)?;
        write_text_element(writer, "rpm:vendor", &package.rpm_vendor)?;
        write_text_element(writer, "rpm:group", &package.rpm_group)?;
        write_text_element(writer, "rpm:buildhost", &package.rpm_buildhost)?;
        write_text_element(writer, "rpm:sourcerpm", &package.rpm_sourcerpm)?;

        let range = package.rpm_header_range;
        writer
            .create_element("rpm:header-range")
            .with_attribute(("start", range.start.to_string().as_str()))
            .with_attribute(("end", range.end.to_string().as_str()))
            .write_empty()?;

        write_requirement_section(writer, TAG_RPM_PROVIDES, &package.provides)?;
        write_requirement_section(writer, TAG_RPM_REQUIRES, &package.requires)?;
        write_requirement_section(writer, TAG_RPM_CONFLICTS, &package.conflicts)?;
        write_requirement_section(writer, TAG_RPM_OBSOLETES, &package.obsoletes)?;
        write_requirement_section(writer, TAG_RPM_SUGGESTS, &package.suggests)?;
        write_requirement_section(writer, TAG_RPM_ENHANCES, &package.enhances)?;
        write_requirement_section(writer, TAG_RPM_RECOMMENDS, &package.recommends)?;
        write_requirement_section(writer, TAG_RPM_SUPPLEMENTS, &package.supplements)?;

        for file in package.files.iter().filter(|f| is_primary_file(f)) {
            write_file_element(writer, file)?;
        }

        writer.write_event(Event::End(format_tag.to_end()))?;
        writer.write_event(Event::End(package_tag.to_end()))?;
        Ok(())
    }

    /// Close the document and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        write_footer(&mut self.writer, TAG_METADATA)?;
        Ok(self.writer.into_inner())
    }
}

/// Files that primary.xml repeats from filelists.xml so that common file
/// dependencies resolve without loading filelists.
fn is_primary_file(file: &PackageFile) -> bool {
    file.path.starts_with("/etc/")
        || file.path.contains("bin/")
        || file.path.starts_with("/usr/lib/sendmail")
}

fn write_requirement_section<W: Write>(
    writer: &mut Writer<W>,
    section: &str,
    entries: &[Requirement],
) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }

    let section_tag = BytesStart::new(section);
    writer.write_event(Event::Start(section_tag.borrow()))?;

    for entry in entries {
        let mut entry_tag = BytesStart::new("rpm:entry");
        entry_tag.push_attribute(("name", entry.name.as_str()));
        if let Some(flags) = entry.flags {
            entry_tag.push_attribute(("flags", flags.as_str()));
        }
        if let Some(epoch) = &entry.epoch {
            entry_tag.push_attribute(("epoch", epoch.as_str()));
        }
        if let Some(version) = &entry.version {
            entry_tag.push_attribute(("ver", version.as_str()));
        }
        if let Some(release) = &entry.release {
            entry_tag.push_attribute(("rel", release.as_str()));
        }
        if entry.preinstall {
            entry_tag.push_attribute(("pre", "1"));
        }
        writer.write_event(Event::Empty(entry_tag))?;
    }

    writer.write_event(Event::End(section_tag.to_end()))?;
    Ok(())
}

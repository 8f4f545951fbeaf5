use std::io::{BufRead, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::checksum::Checksum;
use crate::error::{Error, Result};
use crate::xml::{
    configure_reader, new_writer, optional_attribute, read_text, required_attribute,
    skip_element, unexpected_eof, write_declaration, write_footer, write_text_element,
    XML_NS_REPO, XML_NS_RPM,
};

const TAG_REPOMD: &str = "repomd";
const TAG_DATA: &str = "data";
const TAG_TAGS: &str = "tags";

/// The contents of `repodata/repomd.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RepomdData {
    /// Usually the UNIX time the repository was generated.
    pub revision: Option<String>,
    pub repo_tags: Vec<String>,
    pub content_tags: Vec<String>,
    pub distro_tags: Vec<DistroTag>,
    pub records: Vec<RepomdRecord>,
}

impl RepomdData {
    /// Look up the record of a metadata type such as `primary`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rpm_repodata::{RepomdData, RepomdRecord};
    ///
    /// let mut repomd = RepomdData::default();
    /// repomd.add_record(RepomdRecord::new("primary", "repodata/primary.xml.gz"));
    /// assert!(repomd.get_record("primary").is_some());
    /// assert!(repomd.get_record("updateinfo").is_none());
    /// ```
    pub fn get_record(&self, metadata_name: &str) -> Option<&RepomdRecord> {
        self.records
            .iter()
            .find(|r| r.metadata_name == metadata_name)
    }

    /// Add a record, replacing any existing record of the same type.
    pub fn add_record(&mut self, record: RepomdRecord) {
        match self
            .records
            .iter_mut()
            .find(|r| r.metadata_name == record.metadata_name)
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn remove_record(&mut self, metadata_name: &str) -> Option<RepomdRecord> {
        let idx = self
            .records
            .iter()
            .position(|r| r.metadata_name == metadata_name)?;
        Some(self.records.remove(idx))
    }
}

/// A `<distro>` tag, with its optional CPE id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DistroTag {
    pub name: String,
    pub cpeid: Option<String>,
}

/// One `<data type="...">` entry of repomd.xml.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RepomdRecord {
    /// `primary`, `filelists`, `other`, `updateinfo`, ...
    pub metadata_name: String,
    /// Path relative to the repository root.
    pub location_href: String,
    pub location_base: Option<String>,
    /// Modification time of the file.
    pub timestamp: i64,
    pub size: Option<u64>,
    /// Checksum of the file as stored.
    pub checksum: Checksum,
    /// Checksum of the decompressed content.
    pub open_checksum: Option<Checksum>,
    pub open_size: Option<u64>,
    /// Checksum of the zchunk header.
    pub header_checksum: Option<Checksum>,
    pub header_size: Option<u64>,
    /// Schema version of sqlite databases.
    pub database_version: Option<u32>,
}

impl RepomdRecord {
    pub fn new(metadata_name: impl Into<String>, location_href: impl Into<String>) -> Self {
        RepomdRecord {
            metadata_name: metadata_name.into(),
            location_href: location_href.into(),
            ..RepomdRecord::default()
        }
    }
}

/// Reader for repomd.xml.
pub struct RepomdXmlReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    text_buf: Vec<u8>,
}

impl<R: BufRead> RepomdXmlReader<R> {
    pub fn new(inner: R) -> Self {
        RepomdXmlReader {
            reader: configure_reader(inner),
            buf: Vec::new(),
            text_buf: Vec::new(),
        }
    }

    /// Read the whole document.
    pub fn read_data(&mut self) -> Result<RepomdData> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => (),
                Event::Start(e) if e.name().as_ref() == TAG_REPOMD.as_bytes() => break,
                _ => return Err(Error::MissingHeader),
            }
        }

        let mut repomd = RepomdData::default();
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => match e.name().as_ref() {
                    b"revision" => {
                        repomd.revision =
                            Some(read_text(&mut self.reader, b"revision", &mut self.text_buf)?)
                    }
                    b"tags" => parse_tags(&mut self.reader, &mut repomd, &mut self.text_buf)?,
                    b"data" => {
                        let metadata_name = required_attribute(&e, "type")?;
                        let record =
                            parse_record(&mut self.reader, metadata_name, &mut self.text_buf)?;
                        repomd.records.push(record);
                    }
                    _ => skip_element(&mut self.reader, &e, &mut self.text_buf)?,
                },
                Event::End(e) if e.name().as_ref() == TAG_REPOMD.as_bytes() => return Ok(repomd),
                Event::Eof => return Err(unexpected_eof(TAG_REPOMD.as_bytes())),
                _ => (),
            }
        }
    }
}

fn parse_tags<R: BufRead>(
    reader: &mut Reader<R>,
    repomd: &mut RepomdData,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let mut text_buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"repo" => repomd
                    .repo_tags
                    .push(read_text(reader, b"repo", &mut text_buf)?),
                b"content" => repomd
                    .content_tags
                    .push(read_text(reader, b"content", &mut text_buf)?),
                b"distro" => {
                    let cpeid = optional_attribute(&e, "cpeid")?;
                    let name = read_text(reader, b"distro", &mut text_buf)?;
                    repomd.distro_tags.push(DistroTag { name, cpeid });
                }
                _ => skip_element(reader, &e, &mut text_buf)?,
            },
            Event::End(e) if e.name().as_ref() == TAG_TAGS.as_bytes() => return Ok(()),
            Event::Eof => return Err(unexpected_eof(TAG_TAGS.as_bytes())),
            _ => (),
        }
    }
}

fn parse_record<R: BufRead>(
    reader: &mut Reader<R>,
    metadata_name: String,
    buf: &mut Vec<u8>,
) -> Result<RepomdRecord> {
    let mut text_buf = Vec::new();
    let mut location = None;
    let mut timestamp = None;
    let mut checksum = None;
    let mut record = RepomdRecord {
        metadata_name,
        ..RepomdRecord::default()
    };

    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"checksum" => checksum = Some(read_checksum(reader, &e, &mut text_buf)?),
                b"open-checksum" => {
                    record.open_checksum = Some(read_checksum(reader, &e, &mut text_buf)?)
                }
                b"header-checksum" => {
                    record.header_checksum = Some(read_checksum(reader, &e, &mut text_buf)?)
                }
                b"location" => {
                    location = Some(required_attribute(&e, "href")?);
                    record.location_base = optional_attribute(&e, "xml:base")?;
                    skip_element(reader, &e, &mut text_buf)?;
                }
                b"timestamp" => {
                    timestamp = Some(read_text(reader, b"timestamp", &mut text_buf)?.parse()?)
                }
                b"size" => record.size = Some(read_text(reader, b"size", &mut text_buf)?.parse()?),
                b"open-size" => {
                    record.open_size = Some(read_text(reader, b"open-size", &mut text_buf)?.parse()?)
                }
                b"header-size" => {
                    record.header_size =
                        Some(read_text(reader, b"header-size", &mut text_buf)?.parse()?)
                }
                b"database_version" => {
                    record.database_version =
                        Some(read_text(reader, b"database_version", &mut text_buf)?.parse()?)
                }
                _ => skip_element(reader, &e, &mut text_buf)?,
            },
            Event::End(e) if e.name().as_ref() == TAG_DATA.as_bytes() => break,
            Event::Eof => return Err(unexpected_eof(TAG_DATA.as_bytes())),
            _ => (),
        }
    }

    record.location_href = location.ok_or(Error::MissingField("location"))?;
    record.timestamp = timestamp.ok_or(Error::MissingField("timestamp"))?;
    record.checksum = checksum.ok_or(Error::MissingField("checksum"))?;
    Ok(record)
}

fn read_checksum<R: BufRead>(
    reader: &mut Reader<R>,
    e: &BytesStart,
    buf: &mut Vec<u8>,
) -> Result<Checksum> {
    let checksum_type = required_attribute(e, "type")?;
    let value = read_text(reader, e.name().as_ref(), buf)?;
    Checksum::try_create(&checksum_type, &value)
}

/// Writer for repomd.xml.
pub struct RepomdXmlWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> RepomdXmlWriter<W> {
    pub fn new(inner: W) -> Self {
        RepomdXmlWriter {
            writer: new_writer(inner),
        }
    }

    /// Write the whole document and return the underlying writer.
    ///
    /// Without a revision the current UNIX time is used.
    pub fn write_data(mut self, repomd: &RepomdData) -> Result<W> {
        let writer = &mut self.writer;
        write_declaration(writer)?;

        let mut repomd_tag = BytesStart::new(TAG_REPOMD);
        repomd_tag.push_attribute(("xmlns", XML_NS_REPO));
        repomd_tag.push_attribute(("xmlns:rpm", XML_NS_RPM));
        writer.write_event(Event::Start(repomd_tag))?;

        let revision = match &repomd.revision {
            Some(revision) => revision.clone(),
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
                .to_string(),
        };
        write_text_element(writer, "revision", &revision)?;

        if !repomd.repo_tags.is_empty()
            || !repomd.content_tags.is_empty()
            || !repomd.distro_tags.is_empty()
        {
            let tags_tag = BytesStart::new(TAG_TAGS);
            writer.write_event(Event::Start(tags_tag.borrow()))?;
            for tag in &repomd.content_tags {
                write_text_element(writer, "content", tag)?;
            }
            for tag in &repomd.repo_tags {
                write_text_element(writer, "repo", tag)?;
            }
            for distro in &repomd.distro_tags {
                let mut element = writer.create_element("distro");
                if let Some(cpeid) = &distro.cpeid {
                    element = element.with_attribute(("cpeid", cpeid.as_str()));
                }
                element.write_text_content(BytesText::new(&distro.name))?;
            }
            writer.write_event(Event::End(tags_tag.to_end()))?;
        }

        for record in &repomd.records {
            write_record(writer, record)?;
        }

        write_footer(writer, TAG_REPOMD)?;
        Ok(self.writer.into_inner())
    }
}

fn write_record<W: Write>(writer: &mut Writer<W>, record: &RepomdRecord) -> Result<()> {
    let mut data_tag = BytesStart::new(TAG_DATA);
    data_tag.push_attribute(("type", record.metadata_name.as_str()));
    writer.write_event(Event::Start(data_tag.borrow()))?;

    write_checksum(writer, "checksum", &record.checksum)?;
    if let Some(checksum) = &record.open_checksum {
        write_checksum(writer, "open-checksum", checksum)?;
    }
    if let Some(checksum) = &record.header_checksum {
        write_checksum(writer, "header-checksum", checksum)?;
    }

    let mut location = writer
        .create_element("location")
        .with_attribute(("href", record.location_href.as_str()));
    if let Some(base) = &record.location_base {
        location = location.with_attribute(("xml:base", base.as_str()));
    }
    location.write_empty()?;

    write_text_element(writer, "timestamp", &record.timestamp.to_string())?;
    if let Some(size) = record.size {
        write_text_element(writer, "size", &size.to_string())?;
    }
    if let Some(size) = record.open_size {
        write_text_element(writer, "open-size", &size.to_string())?;
    }
    if let Some(size) = record.header_size {
        write_text_element(writer, "header-size", &size.to_string())?;
    }
    if let Some(version) = record.database_version {
        write_text_element(writer, "database_version", &version.to_string())?;
    }

    writer.write_event(Event::End(data_tag.to_end()))?;
    Ok(())
}

fn write_checksum<W: Write>(writer: &mut Writer<W>, name: &str, checksum: &Checksum) -> Result<()> {
    let (checksum_type, value) = checksum.to_values();
    writer
        .create_element(name)
        .with_attribute(("type", checksum_type))
        .write_text_content(BytesText::new(value))?;
    Ok(())
}

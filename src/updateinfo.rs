use std::io::{BufRead, Write};

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::advisory::{
    UpdateCollection, UpdateCollectionModule, UpdateCollectionPackage, UpdateRecord,
    UpdateReference,
};
use crate::checksum::Checksum;
use crate::error::{Error, Result};
use crate::xml::{
    configure_reader, new_writer, optional_attribute, parse_bool, read_text, required_attribute,
    skip_element, unexpected_eof, write_cdata_element, write_declaration, write_footer,
    write_text_element,
};

const TAG_UPDATES: &str = "updates";
const TAG_UPDATE: &str = "update";
const TAG_REFERENCES: &str = "references";
const TAG_PKGLIST: &str = "pkglist";
const TAG_COLLECTION: &str = "collection";
const TAG_PACKAGE: &str = "package";

/// Streaming reader for updateinfo.xml.
pub struct UpdateinfoXmlReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    text_buf: Vec<u8>,
}

impl<R: BufRead> UpdateinfoXmlReader<R> {
    pub fn new(inner: R) -> Self {
        UpdateinfoXmlReader {
            reader: configure_reader(inner),
            buf: Vec::new(),
            text_buf: Vec::new(),
        }
    }

    /// Read up to the `<updates>` root. updateinfo.xml declares no count.
    pub fn read_header(&mut self) -> Result<()> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => (),
                Event::Start(e) if e.name().as_ref() == TAG_UPDATES.as_bytes() => return Ok(()),
                _ => return Err(Error::MissingHeader),
            }
        }
    }

    /// Read the next `<update>`, or `None` once the document is exhausted.
    pub fn read_update(&mut self) -> Result<Option<UpdateRecord>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) if e.name().as_ref() == TAG_UPDATE.as_bytes() => {
                    let mut record = UpdateRecord {
                        from: optional_attribute(&e, "from")?.unwrap_or_default(),
                        status: optional_attribute(&e, "status")?.unwrap_or_default(),
                        update_type: optional_attribute(&e, "type")?.unwrap_or_default(),
                        version: optional_attribute(&e, "version")?.unwrap_or_default(),
                        ..UpdateRecord::default()
                    };
                    parse_update(&mut self.reader, &mut record, &mut self.text_buf)?;
                    return Ok(Some(record));
                }
                Event::Eof => return Ok(None),
                _ => (),
            }
        }
    }
}

fn parse_update<R: BufRead>(
    reader: &mut Reader<R>,
    record: &mut UpdateRecord,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let mut text_buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"id" => record.id = read_text(reader, b"id", &mut text_buf)?,
                b"title" => record.title = read_text(reader, b"title", &mut text_buf)?,
                b"issued" => record.issued_date = read_date(reader, &e, &mut text_buf)?,
                b"updated" => record.updated_date = read_date(reader, &e, &mut text_buf)?,
                b"rights" => record.rights = read_text(reader, b"rights", &mut text_buf)?,
                b"release" => record.release = read_text(reader, b"release", &mut text_buf)?,
                b"pushcount" => {
                    record.pushcount = Some(read_text(reader, b"pushcount", &mut text_buf)?)
                }
                b"severity" => record.severity = read_text(reader, b"severity", &mut text_buf)?,
                b"summary" => record.summary = read_text(reader, b"summary", &mut text_buf)?,
                b"description" => {
                    record.description = read_text(reader, b"description", &mut text_buf)?
                }
                b"solution" => record.solution = read_text(reader, b"solution", &mut text_buf)?,
                b"references" => record.references = parse_references(reader, &mut text_buf)?,
                b"pkglist" => record.pkglist = parse_pkglist(reader, &mut text_buf)?,
                _ => skip_element(reader, &e, &mut text_buf)?,
            },
            Event::End(e) if e.name().as_ref() == TAG_UPDATE.as_bytes() => return Ok(()),
            Event::Eof => return Err(unexpected_eof(TAG_UPDATE.as_bytes())),
            _ => (),
        }
    }
}

/// `<issued date="..."/>`, falling back to text content for older writers.
fn read_date<R: BufRead>(
    reader: &mut Reader<R>,
    e: &BytesStart,
    buf: &mut Vec<u8>,
) -> Result<Option<String>> {
    let text = read_text(reader, e.name().as_ref(), buf)?;
    Ok(optional_attribute(e, "date")?.or((!text.is_empty()).then_some(text)))
}

fn parse_references<R: BufRead>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
) -> Result<Vec<UpdateReference>> {
    let mut references = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) if e.name().as_ref() == b"reference" => {
                references.push(UpdateReference {
                    href: optional_attribute(&e, "href")?.unwrap_or_default(),
                    id: optional_attribute(&e, "id")?.unwrap_or_default(),
                    title: optional_attribute(&e, "title")?.unwrap_or_default(),
                    reftype: optional_attribute(&e, "type")?.unwrap_or_default(),
                });
            }
            Event::End(e) if e.name().as_ref() == TAG_REFERENCES.as_bytes() => {
                return Ok(references)
            }
            Event::Eof => return Err(unexpected_eof(TAG_REFERENCES.as_bytes())),
            _ => (),
        }
    }
}

fn parse_pkglist<R: BufRead>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
) -> Result<Vec<UpdateCollection>> {
    let mut text_buf = Vec::new();
    let mut pkglist = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) if e.name().as_ref() == TAG_COLLECTION.as_bytes() => {
                let mut collection = UpdateCollection {
                    shortname: optional_attribute(&e, "short")?.unwrap_or_default(),
                    ..UpdateCollection::default()
                };
                parse_collection(reader, &mut collection, &mut text_buf)?;
                pkglist.push(collection);
            }
            Event::End(e) if e.name().as_ref() == TAG_PKGLIST.as_bytes() => return Ok(pkglist),
            Event::Eof => return Err(unexpected_eof(TAG_PKGLIST.as_bytes())),
            _ => (),
        }
    }
}

fn parse_collection<R: BufRead>(
    reader: &mut Reader<R>,
    collection: &mut UpdateCollection,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let mut text_buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"name" => collection.name = read_text(reader, b"name", &mut text_buf)?,
                b"module" => {
                    collection.module = Some(UpdateCollectionModule {
                        name: required_attribute(&e, "name")?,
                        stream: required_attribute(&e, "stream")?,
                        version: required_attribute(&e, "version")?.parse()?,
                        context: required_attribute(&e, "context")?,
                        arch: required_attribute(&e, "arch")?,
                    });
                    skip_element(reader, &e, &mut text_buf)?;
                }
                b"package" => {
                    let mut package = UpdateCollectionPackage {
                        name: required_attribute(&e, "name")?,
                        version: optional_attribute(&e, "version")?.unwrap_or_default(),
                        release: optional_attribute(&e, "release")?.unwrap_or_default(),
                        epoch: match optional_attribute(&e, "epoch")? {
                            Some(epoch) if !epoch.is_empty() => epoch.parse()?,
                            _ => 0,
                        },
                        arch: optional_attribute(&e, "arch")?.unwrap_or_default(),
                        src: optional_attribute(&e, "src")?.unwrap_or_default(),
                        ..UpdateCollectionPackage::default()
                    };
                    parse_collection_package(reader, &mut package, &mut text_buf)?;
                    collection.packages.push(package);
                }
                _ => skip_element(reader, &e, &mut text_buf)?,
            },
            Event::End(e) if e.name().as_ref() == TAG_COLLECTION.as_bytes() => return Ok(()),
            Event::Eof => return Err(unexpected_eof(TAG_COLLECTION.as_bytes())),
            _ => (),
        }
    }
}

fn parse_collection_package<R: BufRead>(
    reader: &mut Reader<R>,
    package: &mut UpdateCollectionPackage,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let mut text_buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"filename" => package.filename = read_text(reader, b"filename", &mut text_buf)?,
                b"sum" => {
                    let sum_type = required_attribute(&e, "type")?;
                    let value = read_text(reader, b"sum", &mut text_buf)?;
                    package.checksum = Some(Checksum::try_create(&sum_type, &value)?);
                }
                b"reboot_suggested" => {
                    package.reboot_suggested =
                        parse_bool(&read_text(reader, b"reboot_suggested", &mut text_buf)?)
                }
                b"restart_suggested" => {
                    package.restart_suggested =
                        parse_bool(&read_text(reader, b"restart_suggested", &mut text_buf)?)
                }
                b"relogin_suggested" => {
                    package.relogin_suggested =
                        parse_bool(&read_text(reader, b"relogin_suggested", &mut text_buf)?)
                }
                _ => skip_element(reader, &e, &mut text_buf)?,
            },
            Event::End(e) if e.name().as_ref() == TAG_PACKAGE.as_bytes() => return Ok(()),
            Event::Eof => return Err(unexpected_eof(TAG_PACKAGE.as_bytes())),
            _ => (),
        }
    }
}

/// Streaming writer for updateinfo.xml.
pub struct UpdateinfoXmlWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> UpdateinfoXmlWriter<W> {
    pub fn new(inner: W) -> Self {
        UpdateinfoXmlWriter {
            writer: new_writer(inner),
        }
    }

    pub fn write_header(&mut self) -> Result<()> {
        write_declaration(&mut self.writer)?;
        self.writer
            .write_event(Event::Start(BytesStart::new(TAG_UPDATES)))?;
        Ok(())
    }

    pub fn write_update(&mut self, record: &UpdateRecord) -> Result<()> {
        let writer = &mut self.writer;

        let mut update_tag = BytesStart::new(TAG_UPDATE);
        update_tag.push_attribute(("from", record.from.as_str()));
        update_tag.push_attribute(("status", record.status.as_str()));
        update_tag.push_attribute(("type", record.update_type.as_str()));
        update_tag.push_attribute(("version", record.version.as_str()));
        writer.write_event(Event::Start(update_tag.borrow()))?;

        write_text_element(writer, "id", &record.id)?;
        write_text_element(writer, "title", &record.title)?;
        if let Some(issued) = &record.issued_date {
            writer
                .create_element("issued")
                .with_attribute(("date", issued.as_str()))
                .write_empty()?;
        }
        if let Some(updated) = &record.updated_date {
            writer
                .create_element("updated")
                .with_attribute(("date", updated.as_str()))
                .write_empty()?;
        }
        write_optional(writer, "rights", &record.rights)?;
        write_optional(writer, "release", &record.release)?;
        if let Some(pushcount) = &record.pushcount {
            write_text_element(writer, "pushcount", pushcount)?;
        }
        write_optional(writer, "severity", &record.severity)?;
        write_optional(writer, "summary", &record.summary)?;
        write_optional(writer, "description", &record.description)?;
        if !record.solution.is_empty() {
            write_cdata_element(writer, "solution", &record.solution)?;
        }

        let references_tag = BytesStart::new(TAG_REFERENCES);
        if record.references.is_empty() {
            writer.write_event(Event::Empty(references_tag))?;
        } else {
            writer.write_event(Event::Start(references_tag.borrow()))?;
            for reference in &record.references {
                writer
                    .create_element("reference")
                    .with_attribute(("href", reference.href.as_str()))
                    .with_attribute(("id", reference.id.as_str()))
                    .with_attribute(("type", reference.reftype.as_str()))
                    .with_attribute(("title", reference.title.as_str()))
                    .write_empty()?;
            }
            writer.write_event(Event::End(references_tag.to_end()))?;
        }

        let pkglist_tag = BytesStart::new(TAG_PKGLIST);
        if record.pkglist.is_empty() {
            writer.write_event(Event::Empty(pkglist_tag))?;
        } else {
            writer.write_event(Event::Start(pkglist_tag.borrow()))?;
            for collection in &record.pkglist {
                write_collection(writer, collection)?;
            }
            writer.write_event(Event::End(pkglist_tag.to_end()))?;
        }

        writer.write_event(Event::End(update_tag.to_end()))?;
        Ok(())
    }

    /// Close the document and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        write_footer(&mut self.writer, TAG_UPDATES)?;
        Ok(self.writer.into_inner())
    }
}

fn write_optional<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    write_text_element(writer, name, text)
}

fn write_collection<W: Write>(writer: &mut Writer<W>, collection: &UpdateCollection) -> Result<()> {
    let mut collection_tag = BytesStart::new(TAG_COLLECTION);
    collection_tag.push_attribute(("short", collection.shortname.as_str()));
    writer.write_event(Event::Start(collection_tag.borrow()))?;

    write_text_element(writer, "name", &collection.name)?;

    if let Some(module) = &collection.module {
        writer
            .create_element("module")
            .with_attribute(("name", module.name.as_str()))
            .with_attribute(("stream", module.stream.as_str()))
            .with_attribute(("version", module.version.to_string().as_str()))
            .with_attribute(("context", module.context.as_str()))
            .with_attribute(("arch", module.arch.as_str()))
            .write_empty()?;
    }

    for package in &collection.packages {
        let mut package_tag = BytesStart::new(TAG_PACKAGE);
        package_tag.push_attribute(("name", package.name.as_str()));
        package_tag.push_attribute(("version", package.version.as_str()));
        package_tag.push_attribute(("release", package.release.as_str()));
        package_tag.push_attribute(("epoch", package.epoch.to_string().as_str()));
        package_tag.push_attribute(("arch", package.arch.as_str()));
        package_tag.push_attribute(("src", package.src.as_str()));
        writer.write_event(Event::Start(package_tag.borrow()))?;

        write_text_element(writer, "filename", &package.filename)?;
        if let Some(checksum) = &package.checksum {
            let (sum_type, value) = checksum.to_values();
            writer
                .create_element("sum")
                .with_attribute(("type", sum_type))
                .write_text_content(BytesText::new(value))?;
        }
        if package.reboot_suggested {
            write_text_element(writer, "reboot_suggested", "1")?;
        }
        if package.restart_suggested {
            write_text_element(writer, "restart_suggested", "1")?;
        }
        if package.relogin_suggested {
            write_text_element(writer, "relogin_suggested", "1")?;
        }

        writer.write_event(Event::End(package_tag.to_end()))?;
    }

    writer.write_event(Event::End(collection_tag.to_end()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPDATEINFO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<updates>
  <update from="updates@fedoraproject.org" status="stable" type="bugfix" version="2.0">
    <id>FEDORA-2020-15f9382449</id>
    <title>nano-4.9.3-1.fc32</title>
    <issued date="2020-05-27 04:10:31"/>
    <updated>2021-04-03 00:15:00</updated>
    <rights>Copyright (C) 2021 Red Hat, Inc. and others.</rights>
    <release>Fedora 32</release>
    <pushcount>1</pushcount>
    <severity>None</severity>
    <summary>nano-4.9.3-1.fc32 bugfix update</summary>
    <description>- update to the latest upstream bugfix release</description>
    <solution><![CDATA[Run dnf update nano]]></solution>
    <references>
      <reference href="https://bugzilla.redhat.com/show_bug.cgi?id=1839351" id="1839351" type="bugzilla" title="nano-4.9.3 is available"/>
    </references>
    <pkglist>
      <collection short="F32">
        <name>Fedora 32</name>
        <module name="nano" stream="4" version="8000020190425181943" context="75ec4169" arch="x86_64"/>
        <package name="nano" version="4.9.3" release="1.fc32" epoch="0" arch="x86_64" src="nano-4.9.3-1.fc32.src.rpm">
          <filename>nano-4.9.3-1.fc32.x86_64.rpm</filename>
          <sum type="sha256">8e214681104e4ba73726e0ce11d21b963ec0390fd70458d439ddc72372082034</sum>
          <reboot_suggested>True</reboot_suggested>
        </package>
      </collection>
    </pkglist>
  </update>
  <update from="errata@example.com" status="final" type="security" version="1">
    <id>EX-2021-0001</id>
    <title>empty</title>
    <references/>
    <pkglist/>
  </update>
</updates>
"#;

    #[test]
    fn read_updates() {
        let mut reader = UpdateinfoXmlReader::new(UPDATEINFO.as_bytes());
        reader.read_header().unwrap();

        let record = reader.read_update().unwrap().unwrap();
        assert_eq!(record.from, "updates@fedoraproject.org");
        assert_eq!(record.update_type, "bugfix");
        assert_eq!(record.issued_date.as_deref(), Some("2020-05-27 04:10:31"));
        assert_eq!(record.updated_date.as_deref(), Some("2021-04-03 00:15:00"));
        assert_eq!(record.pushcount.as_deref(), Some("1"));
        assert_eq!(record.solution, "Run dnf update nano");
        assert_eq!(record.references[0].reftype, "bugzilla");

        let collection = &record.pkglist[0];
        assert_eq!(collection.shortname, "F32");
        assert_eq!(
            collection.module.as_ref().unwrap().version,
            8000020190425181943
        );
        let package = &collection.packages[0];
        assert_eq!(package.filename, "nano-4.9.3-1.fc32.x86_64.rpm");
        assert!(package.reboot_suggested);
        assert!(!package.restart_suggested);
        assert_eq!(record.packages().count(), 1);

        let empty = reader.read_update().unwrap().unwrap();
        assert_eq!(empty.id, "EX-2021-0001");
        assert!(empty.references.is_empty());
        assert!(empty.pkglist.is_empty());
        assert_eq!(empty.issued_date, None);

        assert!(reader.read_update().unwrap().is_none());
    }

    #[test]
    fn missing_header() {
        let mut reader = UpdateinfoXmlReader::new(&b"<metadata packages=\"0\"/>"[..]);
        assert!(matches!(reader.read_header(), Err(Error::MissingHeader)));
    }

    #[test]
    fn write_then_read() {
        let mut reader = UpdateinfoXmlReader::new(UPDATEINFO.as_bytes());
        reader.read_header().unwrap();
        let first = reader.read_update().unwrap().unwrap();
        let second = reader.read_update().unwrap().unwrap();

        let mut writer = UpdateinfoXmlWriter::new(Vec::new());
        writer.write_header().unwrap();
        writer.write_update(&first).unwrap();
        writer.write_update(&second).unwrap();
        let xml = String::from_utf8(writer.finish().unwrap()).unwrap();

        assert!(xml.contains(r#"<issued date="2020-05-27 04:10:31"/>"#));
        assert!(xml.contains("<solution><![CDATA[Run dnf update nano]]></solution>"));
        assert!(xml.contains("<reboot_suggested>1</reboot_suggested>"));
        assert!(xml.contains("<references/>"));
        assert!(xml.contains("<pkglist/>"));

        let mut reader = UpdateinfoXmlReader::new(xml.as_bytes());
        reader.read_header().unwrap();
        assert_eq!(reader.read_update().unwrap().unwrap(), first);
        assert_eq!(reader.read_update().unwrap().unwrap(), second);
        assert!(reader.read_update().unwrap().is_none());
    }
}

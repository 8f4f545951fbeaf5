use std::io::{BufRead, Write};

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::Result;
use crate::evr::Evr;
use crate::package::{Changelog, Package};
use crate::xml::{
    configure_reader, new_writer, read_package_count, read_text, required_attribute,
    skip_element, unexpected_eof, write_declaration, write_footer, XML_NS_OTHER,
};

const TAG_OTHERDATA: &str = "otherdata";
const TAG_PACKAGE: &str = "package";

/// The other.xml record of one package.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PackageChangelogs {
    pub pkgid: String,
    pub name: String,
    pub arch: String,
    pub evr: Evr,
    pub changelogs: Vec<Changelog>,
}

/// Streaming reader for other.xml.
pub struct OtherXmlReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    text_buf: Vec<u8>,
}

impl<R: BufRead> OtherXmlReader<R> {
    pub fn new(inner: R) -> Self {
        OtherXmlReader {
            reader: configure_reader(inner),
            buf: Vec::new(),
            text_buf: Vec::new(),
        }
    }

    pub fn read_header(&mut self) -> Result<usize> {
        read_package_count(&mut self.reader, TAG_OTHERDATA.as_bytes(), &mut self.buf)
    }

    /// Read the next `<package>`, or `None` once the document is exhausted.
    pub fn read_package(&mut self) -> Result<Option<PackageChangelogs>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) if e.name().as_ref() == TAG_PACKAGE.as_bytes() => {
                    let mut entry = PackageChangelogs {
                        pkgid: required_attribute(&e, "pkgid")?,
                        name: required_attribute(&e, "name")?,
                        arch: required_attribute(&e, "arch")?,
                        ..PackageChangelogs::default()
                    };
                    parse_changelogs(&mut self.reader, &mut entry, &mut self.text_buf)?;
                    return Ok(Some(entry));
                }
                Event::Eof => return Ok(None),
                _ => (),
            }
        }
    }
}

fn parse_changelogs<R: BufRead>(
    reader: &mut Reader<R>,
    entry: &mut PackageChangelogs,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let mut text_buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"version" => {
                    entry.evr = Evr::new(
                        required_attribute(&e, "epoch")?,
                        required_attribute(&e, "ver")?,
                        required_attribute(&e, "rel")?,
                    );
                    skip_element(reader, &e, &mut text_buf)?;
                }
                b"changelog" => {
                    let author = required_attribute(&e, "author")?;
                    let timestamp = required_attribute(&e, "date")?.parse()?;
                    let description = read_text(reader, b"changelog", &mut text_buf)?;
                    entry.changelogs.push(Changelog {
                        author,
                        timestamp,
                        description,
                    });
                }
                _ => skip_element(reader, &e, &mut text_buf)?,
            },
            Event::End(e) if e.name().as_ref() == TAG_PACKAGE.as_bytes() => return Ok(()),
            Event::Eof => return Err(unexpected_eof(TAG_PACKAGE.as_bytes())),
            _ => (),
        }
    }
}

/// Streaming writer for other.xml.
pub struct OtherXmlWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> OtherXmlWriter<W> {
    pub fn new(inner: W) -> Self {
        OtherXmlWriter {
            writer: new_writer(inner),
        }
    }

    pub fn write_header(&mut self, num_pkgs: usize) -> Result<()> {
        write_declaration(&mut self.writer)?;

        let mut otherdata_tag = BytesStart::new(TAG_OTHERDATA);
        otherdata_tag.push_attribute(("xmlns", XML_NS_OTHER));
        otherdata_tag.push_attribute(("packages", num_pkgs.to_string().as_str()));
        self.writer.write_event(Event::Start(otherdata_tag))?;
        Ok(())
    }

    pub fn write_package(&mut self, package: &Package) -> Result<()> {
        let writer = &mut self.writer;

        let mut package_tag = BytesStart::new(TAG_PACKAGE);
        package_tag.push_attribute(("pkgid", package.pkgid()));
        package_tag.push_attribute(("name", package.name.as_str()));
        package_tag.push_attribute(("arch", package.arch.as_str()));
        writer.write_event(Event::Start(package_tag.borrow()))?;

        let (epoch, version, release) = package.evr.values();
        writer
            .create_element("version")
            .with_attribute(("epoch", epoch))
            .with_attribute(("ver", version))
            .with_attribute(("rel", release))
            .write_empty()?;

        for changelog in &package.changelogs {
            writer
                .create_element("changelog")
                .with_attribute(("author", changelog.author.as_str()))
                .with_attribute(("date", changelog.timestamp.to_string().as_str()))
                .write_text_content(BytesText::new(&changelog.description))?;
        }

        writer.write_event(Event::End(package_tag.to_end()))?;
        Ok(())
    }

    /// Close the document and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        write_footer(&mut self.writer, TAG_OTHERDATA)?;
        Ok(self.writer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Checksum;
    use crate::error::Error;

    const OTHER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<otherdata xmlns="http://linux.duke.edu/metadata/other" packages="1">
<package pkgid="6d0fd7f08cef63677726973d327e0b99f819b1983f90c2b656bb27cd2112cb7f" name="horse" arch="noarch">
  <version epoch="0" ver="4.1" rel="1"/>
  <changelog author="Lucille Bluth &lt;lucille@bluthcompany.com&gt; - 1.1.1-1" date="1617192000">- It's a banana, Michael. How much could it cost, $10?</changelog>
  <changelog author="Job Bluth &lt;job@alliance-of-magicians.com&gt; - 2.2.2-2" date="1619352000">- I've made a huge mistake</changelog>
</package>
</otherdata>
"#;

    #[test]
    fn read_changelogs() {
        let mut reader = OtherXmlReader::new(OTHER.as_bytes());
        assert_eq!(reader.read_header().unwrap(), 1);
        let entry = reader.read_package().unwrap().unwrap();
        assert_eq!(entry.changelogs.len(), 2);
        assert_eq!(
            entry.changelogs[0].author,
            "Lucille Bluth <lucille@bluthcompany.com> - 1.1.1-1"
        );
        assert_eq!(entry.changelogs[1].timestamp, 1619352000);
        assert_eq!(entry.changelogs[1].description, "- I've made a huge mistake");
        assert!(reader.read_package().unwrap().is_none());
    }

    #[test]
    fn bad_date() {
        let xml = OTHER.replace(r#"date="1617192000""#, r#"date="yesterday""#);
        let mut reader = OtherXmlReader::new(xml.as_bytes());
        reader.read_header().unwrap();
        assert!(matches!(reader.read_package(), Err(Error::ParseInt(_))));
    }

    #[test]
    fn write_then_read() {
        let mut pkg = Package::new(
            "horse",
            Evr::new("0", "4.1", "1"),
            "noarch",
            Checksum::default(),
            "horse-4.1-1.noarch.rpm",
        );
        pkg.add_changelog(
            "George Bluth <george@federalprison.gov> - 3.3.3-3",
            1623672000,
            "- There’s always money in the banana stand",
        );

        let mut writer = OtherXmlWriter::new(Vec::new());
        writer.write_header(1).unwrap();
        writer.write_package(&pkg).unwrap();
        let xml = writer.finish().unwrap();

        let mut reader = OtherXmlReader::new(&xml[..]);
        assert_eq!(reader.read_header().unwrap(), 1);
        let entry = reader.read_package().unwrap().unwrap();
        assert_eq!(entry.pkgid, pkg.pkgid());
        assert_eq!(entry.changelogs, pkg.changelogs);
    }
}

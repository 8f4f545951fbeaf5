//! Helpers shared by the streaming metadata readers and writers.

use std::fs::File;
use std::io::{BufRead, Write};
use std::path::Path;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::compression::decompressing_reader;
use crate::error::{Error, Result};

/// Default namespace of primary.xml.
pub const XML_NS_COMMON: &str = "http://linux.duke.edu/metadata/common";
/// Default namespace of filelists.xml.
pub const XML_NS_FILELISTS: &str = "http://linux.duke.edu/metadata/filelists";
/// Default namespace of other.xml.
pub const XML_NS_OTHER: &str = "http://linux.duke.edu/metadata/other";
/// Default namespace of repomd.xml.
pub const XML_NS_REPO: &str = "http://linux.duke.edu/metadata/repo";
/// The `rpm:` namespace used in primary.xml and repomd.xml.
pub const XML_NS_RPM: &str = "http://linux.duke.edu/metadata/rpm";

/// Reader over a possibly compressed metadata file.
pub type MetadataReader = Box<dyn BufRead>;

pub(crate) fn configure_reader<R: BufRead>(inner: R) -> Reader<R> {
    let mut reader = Reader::from_reader(inner);
    reader.trim_text(true).expand_empty_elements(true);
    reader
}

/// Open a metadata file, transparently decompressing it.
pub fn open_metadata(path: &Path) -> Result<MetadataReader> {
    let (reader, compression) = decompressing_reader(File::open(path)?)?;
    debug!("opened {} ({compression})", path.display());
    Ok(reader)
}

pub(crate) fn new_writer<W: Write>(inner: W) -> Writer<W> {
    Writer::new_with_indent(inner, b' ', 2)
}

pub(crate) fn write_declaration<W: Write>(writer: &mut Writer<W>) -> Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    Ok(())
}

/// Close the root element and add the trailing newline.
pub(crate) fn write_footer<W: Write>(writer: &mut Writer<W>, root: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(root)))?;
    writer.write_event(Event::Text(BytesText::new("\n")))?;
    writer.get_mut().flush()?;
    Ok(())
}

pub(crate) fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<()> {
    writer
        .create_element(name)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

/// Write `text` as a CDATA section, or as escaped text if it cannot be one.
pub(crate) fn write_cdata_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<()> {
    if text.contains("]]>") {
        return write_text_element(writer, name, text);
    }
    writer
        .create_element(name)
        .write_cdata_content(BytesCData::new(text))?;
    Ok(())
}

/// Collect the text and CDATA content of an element up to its end tag.
pub(crate) fn read_text<R: BufRead>(
    reader: &mut Reader<R>,
    end: &[u8],
    buf: &mut Vec<u8>,
) -> Result<String> {
    let mut text = String::new();
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(c) => text.push_str(std::str::from_utf8(&c.into_inner())?),
            Event::End(e) if e.name().as_ref() == end => return Ok(text),
            Event::Eof => return Err(unexpected_eof(end)),
            _ => (),
        }
    }
}

/// Consume everything up to and including the end tag of `start`.
pub(crate) fn skip_element<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    buf: &mut Vec<u8>,
) -> Result<()> {
    buf.clear();
    reader.read_to_end_into(start.name(), buf)?;
    Ok(())
}

pub(crate) fn unexpected_eof(inside: &[u8]) -> Error {
    Error::InvalidXml(format!(
        "unexpected end of file inside <{}>",
        String::from_utf8_lossy(inside)
    ))
}

pub(crate) fn required_attribute(e: &BytesStart, name: &'static str) -> Result<String> {
    optional_attribute(e, name)?.ok_or(Error::MissingAttribute(name))
}

pub(crate) fn optional_attribute(e: &BytesStart, name: &str) -> Result<Option<String>> {
    match e.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Read a header element such as `<metadata packages="N">` and return N.
///
/// Only the XML declaration and comments may precede it.
pub(crate) fn read_package_count<R: BufRead>(
    reader: &mut Reader<R>,
    root: &[u8],
    buf: &mut Vec<u8>,
) -> Result<usize> {
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => (),
            Event::Start(e) if e.name().as_ref() == root => {
                return Ok(required_attribute(&e, "packages")?.parse()?);
            }
            _ => return Err(Error::MissingHeader),
        }
    }
}

/// `1`, `true` and `True` are true; anything else is false.
pub(crate) fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "True")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_cdata_are_joined() {
        let mut reader = configure_reader(&b"<a>x &amp; <![CDATA[<y>]]></a>"[..]);
        let mut buf = Vec::new();
        assert!(matches!(reader.read_event_into(&mut buf).unwrap(), Event::Start(_)));
        let text = read_text(&mut reader, b"a", &mut buf).unwrap();
        assert_eq!(text, "x &<y>");
    }

    #[test]
    fn truncated_text() {
        let mut reader = configure_reader(&b"<a>never closed"[..]);
        let mut buf = Vec::new();
        reader.read_event_into(&mut buf).unwrap();
        assert!(matches!(
            read_text(&mut reader, b"a", &mut buf),
            Err(Error::InvalidXml(_))
        ));
    }

    #[test]
    fn header_count() {
        let xml = br#"<?xml version="1.0"?><!-- x --><metadata packages="3"></metadata>"#;
        let mut reader = configure_reader(&xml[..]);
        let mut buf = Vec::new();
        assert_eq!(read_package_count(&mut reader, b"metadata", &mut buf).unwrap(), 3);

        let mut reader = configure_reader(&b"<filelists packages=\"1\"/>"[..]);
        assert!(matches!(
            read_package_count(&mut reader, b"metadata", &mut buf),
            Err(Error::MissingHeader)
        ));

        let mut reader = configure_reader(&b"<metadata/>"[..]);
        assert!(matches!(
            read_package_count(&mut reader, b"metadata", &mut buf),
            Err(Error::MissingAttribute("packages"))
        ));
    }

    #[test]
    fn booleans() {
        assert!(parse_bool("1"));
        assert!(parse_bool("True"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("False"));
    }

    #[test]
    fn cdata_fallback() {
        let mut writer = new_writer(Vec::new());
        write_cdata_element(&mut writer, "solution", "a ]]> b").unwrap();
        write_cdata_element(&mut writer, "solution", "a < b").unwrap();
        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert!(out.contains("<solution>a ]]&gt; b</solution>"));
        assert!(out.contains("<solution><![CDATA[a < b]]></solution>"));
    }
}

use std::io::{BufRead, Write};

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::Result;
use crate::evr::Evr;
use crate::package::{FileType, Package, PackageFile};
use crate::xml::{
    configure_reader, new_writer, optional_attribute, read_package_count, read_text,
    required_attribute, skip_element, unexpected_eof, write_declaration, write_footer,
    XML_NS_FILELISTS,
};

const TAG_FILELISTS: &str = "filelists";
const TAG_PACKAGE: &str = "package";

/// The filelists.xml record of one package.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PackageFiles {
    pub pkgid: String,
    pub name: String,
    pub arch: String,
    pub evr: Evr,
    pub files: Vec<PackageFile>,
}

/// Streaming reader for filelists.xml.
pub struct FilelistsXmlReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    text_buf: Vec<u8>,
}

impl<R: BufRead> FilelistsXmlReader<R> {
    pub fn new(inner: R) -> Self {
        FilelistsXmlReader {
            reader: configure_reader(inner),
            buf: Vec::new(),
            text_buf: Vec::new(),
        }
    }

    pub fn read_header(&mut self) -> Result<usize> {
        read_package_count(&mut self.reader, TAG_FILELISTS.as_bytes(), &mut self.buf)
    }

    /// Read the next `<package>`, or `None` once the document is exhausted.
    pub fn read_package(&mut self) -> Result<Option<PackageFiles>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) if e.name().as_ref() == TAG_PACKAGE.as_bytes() => {
                    let mut entry = PackageFiles {
                        pkgid: required_attribute(&e, "pkgid")?,
                        name: required_attribute(&e, "name")?,
                        arch: required_attribute(&e, "arch")?,
                        ..PackageFiles::default()
                    };
                    parse_files(&mut self.reader, &mut entry, &mut self.text_buf)?;
                    return Ok(Some(entry));
                }
                Event::Eof => return Ok(None),
                _ => (),
            }
        }
    }
}

fn parse_files<R: BufRead>(
    reader: &mut Reader<R>,
    entry: &mut PackageFiles,
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
                b"file" => {
                    let filetype = match optional_attribute(&e, "type")? {
                        Some(t) => t.parse()?,
                        None => FileType::File,
                    };
                    let path = read_text(reader, b"file", &mut text_buf)?;
                    entry.files.push(PackageFile { filetype, path });
                }
                _ => skip_element(reader, &e, &mut text_buf)?,
            },
            Event::End(e) if e.name().as_ref() == TAG_PACKAGE.as_bytes() => return Ok(()),
            Event::Eof => return Err(unexpected_eof(TAG_PACKAGE.as_bytes())),
            _ => (),
        }
    }
}

/// Streaming writer for filelists.xml.
pub struct FilelistsXmlWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> FilelistsXmlWriter<W> {
    pub fn new(inner: W) -> Self {
        FilelistsXmlWriter {
            writer: new_writer(inner),
        }
    }

    pub fn write_header(&mut self, num_pkgs: usize) -> Result<()> {
        write_declaration(&mut self.writer)?;

        let mut filelists_tag = BytesStart::new(TAG_FILELISTS);
        filelists_tag.push_attribute(("xmlns", XML_NS_FILELISTS));
        filelists_tag.push_attribute(("packages", num_pkgs.to_string().as_str()));
        self.writer.write_event(Event::Start(filelists_tag))?;
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

        for file in &package.files {
            write_file_element(writer, file)?;
        }

        writer.write_event(Event::End(package_tag.to_end()))?;
        Ok(())
    }

    /// Close the document and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        write_footer(&mut self.writer, TAG_FILELISTS)?;
        Ok(self.writer.into_inner())
    }
}

/// `<file>` with a `type` attribute for directories and ghosts only.
pub(crate) fn write_file_element<W: Write>(
    writer: &mut Writer<W>,
    file: &PackageFile,
) -> Result<()> {
    let mut element = writer.create_element("file");
    if file.filetype != FileType::File {
        element = element.with_attribute(("type", file.filetype.as_str()));
    }
    element.write_text_content(BytesText::new(&file.path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Checksum;
    use crate::error::Error;

    const FILELISTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<filelists xmlns="http://linux.duke.edu/metadata/filelists" packages="2">
<package pkgid="6d0fd7f08cef63677726973d327e0b99f819b1983f90c2b656bb27cd2112cb7f" name="horse" arch="noarch">
  <version epoch="0" ver="4.1" rel="1"/>
  <file>/usr/bin/horse</file>
  <file type="dir">/usr/share/horse</file>
  <file type="ghost">/var/log/horse.log</file>
</package>
<package pkgid="90fbba546300f507473547f33e229ee7bad94bbbe6e84b21d485e8e43b5f1132" name="rpm-empty" arch="x86_64">
  <version epoch="0" ver="0" rel="0"/>
</package>
</filelists>
"#;

    #[test]
    fn read_packages() {
        let mut reader = FilelistsXmlReader::new(FILELISTS.as_bytes());
        assert_eq!(reader.read_header().unwrap(), 2);

        let horse = reader.read_package().unwrap().unwrap();
        assert_eq!(horse.name, "horse");
        assert_eq!(horse.evr.values(), ("0", "4.1", "1"));
        assert_eq!(
            horse.files,
            [
                PackageFile {
                    filetype: FileType::File,
                    path: "/usr/bin/horse".to_string()
                },
                PackageFile {
                    filetype: FileType::Dir,
                    path: "/usr/share/horse".to_string()
                },
                PackageFile {
                    filetype: FileType::Ghost,
                    path: "/var/log/horse.log".to_string()
                },
            ]
        );

        let empty = reader.read_package().unwrap().unwrap();
        assert_eq!(empty.name, "rpm-empty");
        assert!(empty.files.is_empty());

        assert!(reader.read_package().unwrap().is_none());
    }

    #[test]
    fn invalid_file_type() {
        let xml = FILELISTS.replace(r#"type="ghost""#, r#"type="socket""#);
        let mut reader = FilelistsXmlReader::new(xml.as_bytes());
        reader.read_header().unwrap();
        assert!(matches!(
            reader.read_package(),
            Err(Error::InvalidFileType(t)) if t == "socket"
        ));
    }

    #[test]
    fn write_package() {
        let mut pkg = Package::new(
            "horse",
            Evr::new("0", "4.1", "1"),
            "noarch",
            Checksum::default(),
            "horse-4.1-1.noarch.rpm",
        );
        pkg.add_file(FileType::File, "/usr/bin/horse")
            .add_file(FileType::Dir, "/usr/share/horse")
            .add_file(FileType::Ghost, "/var/log/horse.log");

        let mut writer = FilelistsXmlWriter::new(Vec::new());
        writer.write_header(1).unwrap();
        writer.write_package(&pkg).unwrap();
        let xml = String::from_utf8(writer.finish().unwrap()).unwrap();

        assert!(xml.contains("<file>/usr/bin/horse</file>"));
        assert!(xml.contains(r#"<file type="dir">/usr/share/horse</file>"#));
        assert!(xml.contains(r#"<file type="ghost">/var/log/horse.log</file>"#));

        let mut reader = FilelistsXmlReader::new(xml.as_bytes());
        assert_eq!(reader.read_header().unwrap(), 1);
        let entry = reader.read_package().unwrap().unwrap();
        assert_eq!(entry.pkgid, pkg.pkgid());
        assert_eq!(entry.files, pkg.files);
    }
}

//! A small XML tree parser built on winnow.
//!
//! It loads a whole document into memory and is independent of quick-xml,
//! so the two readers can check each other.

use std::borrow::Cow;

use winnow::ascii::{digit1, hex_digit1, multispace0, multispace1};
use winnow::combinator::{alt, cut_err, delimited, fail, opt, preceded, repeat};
use winnow::error::StrContext;
use winnow::prelude::*;
use winnow::token::{literal, take_till, take_until, take_while};

use crate::error::{Error, Result};

/// Deepest element nesting accepted; repodata documents stay under ten.
const MAX_DEPTH: usize = 64;

/// An element with its attributes and child nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Element(Element),
    /// Character data or a CDATA section, with references decoded.
    Text(String),
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements, in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// The concatenated text directly inside this element.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Text of the first child named `name`.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(Element::text)
    }
}

/// Parse a complete document and return its root element.
pub(crate) fn parse_document(input: &str) -> Result<Element> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    document
        .parse(input)
        .map_err(|e| Error::InvalidXml(format!("{e}")))
}

fn document(input: &mut &str) -> ModalResult<Element> {
    let _: () = repeat(0.., misc).parse_next(input)?;
    let root = (|input: &mut &str| element(input, 1))
        .context(StrContext::Label("root element"))
        .parse_next(input)?;
    let _: () = repeat(0.., misc).parse_next(input)?;
    Ok(root)
}

/// Anything allowed around the root element.
fn misc(input: &mut &str) -> ModalResult<()> {
    alt((comment, processing_instruction, doctype, multispace1.void())).parse_next(input)
}

fn comment(input: &mut &str) -> ModalResult<()> {
    delimited("<!--", take_until(0.., "-->"), "-->")
        .void()
        .parse_next(input)
}

/// Also covers the `<?xml ...?>` declaration.
fn processing_instruction(input: &mut &str) -> ModalResult<()> {
    delimited("<?", take_until(0.., "?>"), "?>")
        .void()
        .parse_next(input)
}

/// `<!DOCTYPE name ...>`, with or without an internal `[...]` subset.
fn doctype(input: &mut &str) -> ModalResult<()> {
    (
        "<!DOCTYPE",
        take_till(0.., ['[', '>']),
        opt(delimited('[', take_until(0.., "]"), ']')),
        take_till(0.., '>'),
        '>',
    )
        .void()
        .parse_next(input)
}

fn cdata(input: &mut &str) -> ModalResult<String> {
    delimited("<![CDATA[", take_until(0.., "]]>"), "]]>")
        .map(str::to_string)
        .parse_next(input)
}

fn name<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| {
        c.is_alphanumeric() || matches!(c, ':' | '_' | '-' | '.')
    })
    .parse_next(input)
}

/// `&lt;`, `&#10;`, `&#x2019;` and friends.
fn reference(input: &mut &str) -> ModalResult<char> {
    delimited(
        '&',
        cut_err(alt((char_reference, entity_reference))).context(StrContext::Label("reference")),
        cut_err(';'),
    )
    .parse_next(input)
}

fn char_reference(input: &mut &str) -> ModalResult<char> {
    preceded(
        '#',
        alt((
            preceded('x', hex_digit1).try_map(|h| u32::from_str_radix(h, 16)),
            digit1.try_map(str::parse::<u32>),
        )),
    )
    .verify_map(char::from_u32)
    .parse_next(input)
}

fn entity_reference(input: &mut &str) -> ModalResult<char> {
    alt((
        "lt".value('<'),
        "gt".value('>'),
        "amp".value('&'),
        "apos".value('\''),
        "quot".value('"'),
    ))
    .parse_next(input)
}

fn char_data(input: &mut &str) -> ModalResult<String> {
    repeat(
        1..,
        alt((
            take_till(1.., ['<', '&']).map(Cow::Borrowed),
            reference.map(|c| Cow::Owned(c.to_string())),
        )),
    )
    .fold(String::new, |mut acc, piece: Cow<'_, str>| {
        acc.push_str(&piece);
        acc
    })
    .parse_next(input)
}

/// Literal tabs and line breaks in attribute values read as spaces.
/// Character references are left alone.
fn normalize_attribute_whitespace(raw: &str) -> String {
    raw.replace("\r\n", " ")
        .replace(|c: char| matches!(c, '\t' | '\n' | '\r'), " ")
}

fn attribute_value(input: &mut &str) -> ModalResult<String> {
    let quote = alt(('"', '\'')).parse_next(input)?;
    let value = repeat(
        0..,
        alt((
            take_till(1.., move |c: char| c == quote || c == '&' || c == '<')
                .map(normalize_attribute_whitespace),
            reference.map(String::from),
        )),
    )
    .fold(String::new, |mut acc, piece: String| {
        acc.push_str(&piece);
        acc
    })
    .parse_next(input)?;
    cut_err(quote)
        .context(StrContext::Label("closing quote"))
        .parse_next(input)?;
    Ok(value)
}

fn attribute(input: &mut &str) -> ModalResult<(String, String)> {
    let key = name.parse_next(input)?;
    (multispace0, '=', multispace0).parse_next(input)?;
    let value = cut_err(attribute_value)
        .context(StrContext::Label("attribute value"))
        .parse_next(input)?;
    Ok((key.to_string(), value))
}

fn node(input: &mut &str, depth: usize) -> ModalResult<Option<Node>> {
    alt((
        comment.value(None),
        processing_instruction.value(None),
        cdata.map(|text| Some(Node::Text(text))),
        (|input: &mut &str| element(input, depth)).map(|e| Some(Node::Element(e))),
        char_data.map(|text| Some(Node::Text(text))),
    ))
    .parse_next(input)
}

/// An element `depth` levels below the document, the root being 1.
fn element(input: &mut &str, depth: usize) -> ModalResult<Element> {
    '<'.parse_next(input)?;
    let tag = name.parse_next(input)?;
    if depth > MAX_DEPTH {
        return cut_err(fail)
            .context(StrContext::Label("element nesting depth"))
            .parse_next(input);
    }
    let attributes = repeat(0.., preceded(multispace1, attribute)).parse_next(input)?;
    multispace0.parse_next(input)?;

    let mut element = Element {
        name: tag.to_string(),
        attributes,
        children: Vec::new(),
    };
    if opt("/>").parse_next(input)?.is_some() {
        return Ok(element);
    }
    cut_err('>')
        .context(StrContext::Label("end of start tag"))
        .parse_next(input)?;

    element.children = repeat(0.., |input: &mut &str| node(input, depth + 1))
        .fold(Vec::new, |mut acc: Vec<Node>, node: Option<Node>| {
            acc.extend(node);
            acc
        })
        .parse_next(input)?;

    cut_err(("</", literal(tag), multispace0, '>'))
        .context(StrContext::Label("matching end tag"))
        .parse_next(input)?;
    Ok(element)
}

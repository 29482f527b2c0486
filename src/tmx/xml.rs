//! Generic XML element tree used to round-trip TMX documents.
//!
//! Only the parts the scripter understands (the map header and its layers)
//! are modelled in [`Map`](super::Map); everything else is carried through
//! this tree untouched. Text is kept byte for byte unless it is entirely
//! whitespace; such text is dropped on read and the document is re-indented
//! on write.

use super::MapError;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Ordered `(name, value)` attribute list, unescaped.
pub type Attributes = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    /// `<?target data?>`, stored without the delimiters.
    ProcessingInstruction(String),
    /// `<!DOCTYPE …>` contents, only valid in the prolog.
    DocType(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Attributes,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        get_attribute(&self.attributes, key)
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Concatenated text and CDATA content of the direct children.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            if let Node::Text(t) | Node::CData(t) = node {
                text.push_str(t);
            }
        }
        text
    }

    fn from_start(start: &BytesStart) -> Result<Self, MapError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(xml_error)?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }
}

pub fn get_attribute<'a>(attributes: &'a Attributes, key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Overwrites `key` in place, or appends it if absent.
pub fn set_attribute(attributes: &mut Attributes, key: &str, value: impl Into<String>) {
    let value = value.into();
    match attributes.iter_mut().find(|(k, _)| k == key) {
        Some((_, v)) => *v = value,
        None => attributes.push((key.to_string(), value)),
    }
}

pub fn remove_attribute(attributes: &mut Attributes, key: &str) {
    attributes.retain(|(k, _)| k != key);
}

/// The `<?xml … ?>` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: Some("UTF-8".to_string()),
            standalone: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub declaration: Option<Declaration>,
    /// Comments, processing instructions and the doctype before the root.
    pub prolog: Vec<Node>,
    pub root: Element,
}

pub fn parse_document(input: &str) -> Result<Document, MapError> {
    let mut reader = Reader::from_str(input);

    let mut declaration = None;
    let mut prolog = Vec::new();
    let mut root: Option<Element> = None;
    let mut stack: Vec<Element> = Vec::new();

    loop {
        let node = match reader.read_event().map_err(xml_error)? {
            Event::Decl(decl) => {
                declaration = Some(read_declaration(&decl)?);
                continue;
            }
            Event::Start(start) => {
                stack.push(Element::from_start(&start)?);
                continue;
            }
            Event::Empty(start) => Node::Element(Element::from_start(&start)?),
            Event::End(_) => match stack.pop() {
                Some(element) => Node::Element(element),
                None => return Err(MapError::Xml("unexpected closing tag".to_string())),
            },
            Event::Text(text) => {
                let text = text.unescape().map_err(xml_error)?;
                if text.trim().is_empty() {
                    continue;
                }
                Node::Text(text.into_owned())
            }
            Event::CData(data) => {
                Node::CData(String::from_utf8_lossy(&data.into_inner()).into_owned())
            }
            Event::Comment(comment) => {
                Node::Comment(String::from_utf8_lossy(&comment.into_inner()).into_owned())
            }
            Event::PI(pi) => Node::ProcessingInstruction(String::from_utf8_lossy(&pi).into_owned()),
            Event::DocType(doctype) => {
                Node::DocType(String::from_utf8_lossy(&doctype.into_inner()).into_owned())
            }
            Event::Eof => break,
        };

        match (stack.last_mut(), node) {
            (Some(parent), node) => parent.children.push(node),
            (None, Node::Element(element)) => {
                if root.is_some() {
                    return Err(MapError::Xml("more than one root element".to_string()));
                }
                root = Some(element);
            }
            (None, node @ (Node::Comment(_) | Node::ProcessingInstruction(_) | Node::DocType(_)))
                if root.is_none() =>
            {
                prolog.push(node)
            }
            // Text and trailing comments outside the root are not kept.
            (None, _) => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(MapError::Xml(format!("unclosed element <{}>", open.name)));
    }
    let root = root.ok_or_else(|| MapError::Xml("document has no root element".to_string()))?;
    Ok(Document {
        declaration,
        prolog,
        root,
    })
}

pub fn write_document(document: &Document) -> Result<String, MapError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);
    if let Some(decl) = &document.declaration {
        writer
            .write_event(Event::Decl(BytesDecl::new(
                &decl.version,
                decl.encoding.as_deref(),
                decl.standalone.as_deref(),
            )))
            .map_err(write_error)?;
    }
    for node in &document.prolog {
        write_node(&mut writer, node)?;
    }
    write_element(&mut writer, &document.root)?;

    let mut output = String::from_utf8(writer.into_inner())
        .map_err(|e| MapError::Write(e.to_string()))?;
    output.push('\n');
    Ok(output)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), MapError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        let value = escape_attribute(value);
        start.push_attribute(Attribute::from((key.as_bytes(), value.as_bytes())));
    }
    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_error);
    }
    writer.write_event(Event::Start(start)).map_err(write_error)?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_error)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), MapError> {
    let event = match node {
        Node::Element(element) => return write_element(writer, element),
        Node::Text(text) => Event::Text(BytesText::new(text)),
        Node::CData(data) => Event::CData(BytesCData::new(data.as_str())),
        Node::Comment(comment) => Event::Comment(BytesText::from_escaped(comment.as_str())),
        Node::ProcessingInstruction(pi) => Event::PI(BytesPI::new(pi.as_str())),
        Node::DocType(doctype) => Event::DocType(BytesText::from_escaped(doctype.as_str())),
    };
    writer.write_event(event).map_err(write_error)
}

/// Escapes an attribute value so a reader gets it back unchanged.
///
/// Attribute value normalization turns literal tabs and line breaks into
/// spaces, so those are written as character references.
fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in quick_xml::escape::escape(value).chars() {
        match ch {
            '\t' => escaped.push_str("&#9;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn read_declaration(decl: &BytesDecl) -> Result<Declaration, MapError> {
    let version = String::from_utf8_lossy(&decl.version().map_err(xml_error)?).into_owned();
    let encoding = match decl.encoding() {
        Some(enc) => Some(String::from_utf8_lossy(&enc.map_err(xml_error)?).into_owned()),
        None => None,
    };
    let standalone = match decl.standalone() {
        Some(sa) => Some(String::from_utf8_lossy(&sa.map_err(xml_error)?).into_owned()),
        None => None,
    };
    Ok(Declaration {
        version,
        encoding,
        standalone,
    })
}

fn xml_error(err: impl std::fmt::Display) -> MapError {
    MapError::Xml(err.to_string())
}

fn write_error(err: impl std::fmt::Display) -> MapError {
    MapError::Write(err.to_string())
}

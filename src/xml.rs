//! Owned markup tree used for data files: parsed with `quick-xml`, printed
//! with a deterministic four-space indentation.

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::MarkupError;

pub const DECLARATION: &str = "<?xml version='1.0' encoding='utf-8'?>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(index).1)
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First direct child named `tag`.
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.elements().find(|e| e.tag == tag)
    }

    /// Every descendant (depth first, self excluded) named `tag`.
    pub fn descendants<'a>(&'a self, tag: &'a str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        for child in self.elements() {
            if child.tag == tag {
                found.push(child);
            }
            found.extend(child.descendants(tag));
        }
        found
    }

    /// Concatenated text and CDATA content of direct children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Parses a document with exactly one root element.
    pub fn parse(text: &str) -> Result<Element, MarkupError> {
        let mut roots: Vec<Element> = parse_fragment(text)?
            .into_iter()
            .filter_map(|node| match node {
                Node::Element(e) => Some(e),
                _ => None,
            })
            .collect();
        match roots.len() {
            0 => Err(MarkupError::NoRoot),
            1 => Ok(roots.remove(0)),
            n => Err(MarkupError::MultipleRoots(n)),
        }
    }

    /// Serializes the element and its subtree, without a declaration.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        write_element(&mut out, self, 0);
        out
    }

    /// Serializes as a standalone document, declaration included.
    pub fn to_document(&self) -> String {
        let mut out = String::from(DECLARATION);
        out.push('\n');
        write_element(&mut out, self, 0);
        out
    }
}

/// Parses a sequence of sibling nodes. Whitespace-only text is dropped
/// unless its siblings carry text too, so mixed content keeps its spacing.
pub fn parse_fragment(text: &str) -> Result<Vec<Node>, MarkupError> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut top: Vec<Node> = Vec::new();

    fn attach(stack: &mut [Element], top: &mut Vec<Node>, node: Node) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => top.push(node),
        }
    }

    loop {
        let event = reader
            .read_event()
            .map_err(|e| MarkupError::Syntax(e.to_string()))?;
        match event {
            Event::Start(start) => stack.push(start_element(&start)?),
            Event::Empty(start) => {
                let element = start_element(&start)?;
                attach(&mut stack, &mut top, Node::Element(element));
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| MarkupError::Syntax("unexpected closing tag".to_string()))?;
                drop_blank_text(&mut element.children);
                attach(&mut stack, &mut top, Node::Element(element));
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| MarkupError::Syntax(e.to_string()))?;
                attach(&mut stack, &mut top, Node::Text(text.into_owned()));
            }
            Event::CData(data) => {
                let data = String::from_utf8_lossy(&data.into_inner()).into_owned();
                attach(&mut stack, &mut top, Node::CData(data));
            }
            Event::Comment(comment) => {
                let comment = String::from_utf8_lossy(&comment).into_owned();
                attach(&mut stack, &mut top, Node::Comment(comment));
            }
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if let Some(open) = stack.last() {
        return Err(MarkupError::Syntax(format!("unclosed element <{}>", open.tag)));
    }
    drop_blank_text(&mut top);
    Ok(top)
}

fn drop_blank_text(nodes: &mut Vec<Node>) {
    let mixed = nodes.iter().any(|node| match node {
        Node::Text(t) => !t.trim().is_empty(),
        Node::CData(_) => true,
        _ => false,
    });
    if !mixed {
        nodes.retain(|node| !matches!(node, Node::Text(t) if t.trim().is_empty()));
    }
}

fn start_element(start: &BytesStart<'_>) -> Result<Element, MarkupError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| MarkupError::Syntax(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| MarkupError::Syntax(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn write_element(out: &mut String, element: &Element, depth: usize) {
    out.push_str(&"    ".repeat(depth));
    write_tree(out, element, Some(depth));
    out.push('\n');
}

/// Writes `element` starting at the current position. Children go on their
/// own indented lines when `depth` is set and every child is an element or
/// comment; mixed content stays on one line.
fn write_tree(out: &mut String, element: &Element, depth: Option<usize>) {
    write_open(out, element);
    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');

    let block = element
        .children
        .iter()
        .all(|node| matches!(node, Node::Element(_) | Node::Comment(_)));
    match depth {
        Some(depth) if block => {
            out.push('\n');
            for child in &element.children {
                match child {
                    Node::Element(e) => write_element(out, e, depth + 1),
                    Node::Comment(c) => {
                        out.push_str(&"    ".repeat(depth + 1));
                        out.push_str(&format!("<!--{c}-->\n"));
                    }
                    _ => {}
                }
            }
            out.push_str(&"    ".repeat(depth));
        }
        _ => {
            for child in &element.children {
                write_node_inline(out, child);
            }
        }
    }
    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
}

fn write_node_inline(out: &mut String, node: &Node) {
    match node {
        Node::Element(e) => write_tree(out, e, None),
        Node::Text(t) => out.push_str(&partial_escape(t.as_str())),
        Node::CData(d) => {
            out.push_str("<![CDATA[");
            out.push_str(&d.replace("]]>", "]]]]><![CDATA[>"));
            out.push_str("]]>");
        }
        Node::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
    }
}

fn write_open(out: &mut String, element: &Element) {
    out.push('<');
    out.push_str(&element.tag);
    for (key, value) in &element.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_attribute(value));
        out.push('"');
    }
}

fn escape_attribute(value: &str) -> String {
    partial_escape(value)
        .replace('"', "&quot;")
        .replace('\n', "&#10;")
}

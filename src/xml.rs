//! Owned XML element tree for editing package parts.
//!
//! Parts are parsed with quick-xml's event reader into [`Element`] values,
//! edited in place, and written back with quick-xml's writer. Names are kept
//! as qualified strings (`w:p`, `a:t`, `row`) and matched literally.

use crate::error::{Error, Result};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// A child node of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

/// A parsed XML part: the root element plus a standard declaration on output.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: Element,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Parse a standalone element from markup.
    pub fn parse(xml: &str) -> Result<Self> {
        Ok(XmlDocument::parse(xml)?.root)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Name without the namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Keep only the attributes whose key satisfies `keep`; returns how many were dropped.
    pub fn retain_attrs(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.attributes.len();
        self.attributes.retain(|(k, _)| keep(k));
        before - self.attributes.len()
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.name == name)
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.child(name).is_some()
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Return the named child, appending an empty one when absent.
    pub fn ensure_child(&mut self, name: &str) -> &mut Element {
        let pos = match self.position_of(name) {
            Some(pos) => pos,
            None => {
                self.children.push(Node::Element(Element::new(name)));
                self.children.len() - 1
            }
        };
        match &mut self.children[pos] {
            Node::Element(e) => e,
            _ => unreachable!("position_of only returns element nodes"),
        }
    }

    /// Return the named child, inserting it where `order` places it when absent.
    ///
    /// `order` lists child names in schema sequence; unknown names sort last.
    pub fn ensure_child_ordered(&mut self, name: &str, order: &[&str]) -> &mut Element {
        let pos = match self.position_of(name) {
            Some(pos) => pos,
            None => self.insert_ordered(Element::new(name), order),
        };
        match &mut self.children[pos] {
            Node::Element(e) => e,
            _ => unreachable!("position_of only returns element nodes"),
        }
    }

    /// Insert `child` before the first sibling that `order` places after it.
    pub fn insert_ordered(&mut self, child: Element, order: &[&str]) -> usize {
        let rank = |name: &str| order.iter().position(|n| *n == name).unwrap_or(order.len());
        let own = rank(&child.name);
        let pos = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if rank(&e.name) > own))
            .unwrap_or(self.children.len());
        self.children.insert(pos, Node::Element(child));
        pos
    }

    /// Replace the named child (or insert it in schema order).
    pub fn replace_child_ordered(&mut self, child: Element, order: &[&str]) {
        match self.position_of(&child.name) {
            Some(pos) => self.children[pos] = Node::Element(child),
            None => {
                self.insert_ordered(child, order);
            }
        }
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.name == name))
    }

    pub fn remove_children(&mut self, name: &str) -> usize {
        self.retain_children(|e| e.name != name)
    }

    /// Keep child elements satisfying `keep`; text nodes are untouched.
    pub fn retain_children(&mut self, mut keep: impl FnMut(&Element) -> bool) -> usize {
        let before = self.children.len();
        self.children.retain(|n| match n {
            Node::Element(e) => keep(e),
            _ => true,
        });
        before - self.children.len()
    }

    /// Concatenated text of every descendant text node.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) | Node::CData(t) => out.push_str(t),
                Node::Element(e) => e.collect_text(out),
                Node::Comment(_) => {}
            }
        }
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    /// Every descendant element in document order, excluding `self`.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a Element>) {
        for e in self.elements() {
            out.push(e);
            e.collect_descendants(out);
        }
    }

    pub fn find(&self, name: &str) -> Option<&Element> {
        for e in self.elements() {
            if e.name == name {
                return Some(e);
            }
            if let Some(found) = e.find(name) {
                return Some(found);
            }
        }
        None
    }

    pub fn find_all(&self, name: &str) -> Vec<&Element> {
        self.descendants()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }

    pub fn count_named(&self, name: &str) -> usize {
        self.elements()
            .map(|e| usize::from(e.name == name) + e.count_named(name))
            .sum()
    }

    /// Visit `self` and every descendant, parents before children.
    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        f(self);
        for e in self.elements_mut() {
            e.visit_mut(f);
        }
    }

    /// Remove every descendant matching `pred` (matches are not descended into).
    pub fn remove_descendants(&mut self, pred: &dyn Fn(&Element) -> bool) -> usize {
        let mut removed = 0;
        self.children.retain(|n| match n {
            Node::Element(e) if pred(e) => {
                removed += 1;
                false
            }
            _ => true,
        });
        for e in self.elements_mut() {
            removed += e.remove_descendants(pred);
        }
        removed
    }

    /// Replace every descendant matching `pred` with its own children.
    pub fn unwrap_descendants(&mut self, pred: &dyn Fn(&Element) -> bool) -> usize {
        let mut unwrapped = 0;
        let mut children = Vec::with_capacity(self.children.len());
        for node in std::mem::take(&mut self.children) {
            match node {
                Node::Element(mut e) => {
                    unwrapped += e.unwrap_descendants(pred);
                    if pred(&e) {
                        unwrapped += 1;
                        children.extend(e.children);
                    } else {
                        children.push(Node::Element(e));
                    }
                }
                other => children.push(other),
            }
        }
        self.children = children;
        unwrapped
    }

    /// Serialize this element without a declaration.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, self)?;
        String::from_utf8(writer.into_inner()).map_err(|e| Error::XmlParse(e.to_string()))
    }
}

impl XmlDocument {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parse markup into an element tree.
    ///
    /// Whitespace-only text is kept so that `xml:space="preserve"` runs survive
    /// a round trip unchanged.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => stack.push(element_from_start(&e)?),
                Ok(Event::Empty(e)) => {
                    let element = element_from_start(&e)?;
                    attach(&mut stack, &mut root, element);
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::XmlParse("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element);
                }
                Ok(Event::Text(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = e.unescape().map_err(|e| Error::XmlParse(e.to_string()))?;
                        parent.children.push(Node::Text(text.into_owned()));
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        parent.children.push(Node::CData(text));
                    }
                }
                Ok(Event::Comment(e)) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(Node::Comment(String::from_utf8_lossy(&e).into_owned()));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlParse(format!(
                        "at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(Error::XmlParse(format!("unclosed element <{}>", open.name)));
        }
        root.map(Self::new)
            .ok_or_else(|| Error::XmlParse("document has no root element".to_string()))
    }

    /// Serialize with a standalone UTF-8 declaration, the form Office writes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(write_error)?;
        writer.get_mut().extend_from_slice(b"\r\n");
        write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner())
    }

    pub fn to_xml_string(&self) -> Result<String> {
        String::from_utf8(self.to_bytes()?).map_err(|e| Error::XmlParse(e.to_string()))
    }
}

fn element_from_start(e: &BytesStart) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::XmlParse(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::XmlParse(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => *root = Some(element),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(write_error)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => writer
                .write_event(Event::Text(BytesText::new(t)))
                .map_err(write_error)?,
            Node::CData(t) => writer
                .write_event(Event::CData(BytesCData::new(t.as_str())))
                .map_err(write_error)?,
            Node::Comment(t) => writer
                .write_event(Event::Comment(BytesText::from_escaped(t.as_str())))
                .map_err(write_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_error)?;
    Ok(())
}

fn write_error(e: impl std::fmt::Display) -> Error {
    Error::XmlParse(format!("write failed: {}", e))
}

//! XLSX shared string table.

use crate::error::{Error, Result};
use crate::xml::{Element, XmlDocument};
use std::collections::HashMap;

const SST_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// Shared strings: the strings read from the package plus any added since.
#[derive(Debug, Clone, Default)]
pub struct SharedStrings {
    /// All strings in order
    strings: Vec<String>,
    lookup: HashMap<String, usize>,
    /// Number of entries that came from the package
    loaded: usize,
}

impl SharedStrings {
    /// Parse shared strings from XML content.
    ///
    /// Rich text runs are concatenated; phonetic hints (`rPh`) are skipped.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut strings = Vec::new();
        let mut reader = quick_xml::Reader::from_str(xml);

        let mut buf = Vec::new();
        let mut in_si = false;
        let mut in_t = false;
        let mut in_phonetic = false;
        let mut current_text = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(quick_xml::events::Event::Start(e)) => match e.name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current_text.clear();
                    }
                    b"rPh" => in_phonetic = true,
                    b"t" if in_si && !in_phonetic => in_t = true,
                    _ => {}
                },
                Ok(quick_xml::events::Event::Empty(e)) if e.name().as_ref() == b"si" => {
                    strings.push(String::new());
                }
                Ok(quick_xml::events::Event::Text(e)) if in_t => {
                    let text = e.unescape().map_err(|e| Error::XmlParse(e.to_string()))?;
                    current_text.push_str(&text);
                }
                Ok(quick_xml::events::Event::CData(e)) if in_t => {
                    current_text.push_str(&String::from_utf8_lossy(&e));
                }
                Ok(quick_xml::events::Event::End(e)) => match e.name().as_ref() {
                    b"si" => {
                        strings.push(std::mem::take(&mut current_text));
                        in_si = false;
                    }
                    b"rPh" => in_phonetic = false,
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(quick_xml::events::Event::Eof) => break,
                Err(e) => return Err(Error::XmlParse(e.to_string())),
                _ => {}
            }
            buf.clear();
        }

        let mut lookup = HashMap::with_capacity(strings.len());
        for (i, s) in strings.iter().enumerate() {
            lookup.entry(s.clone()).or_insert(i);
        }
        let loaded = strings.len();
        Ok(Self {
            strings,
            lookup,
            loaded,
        })
    }

    /// Get a string by index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(|s| s.as_str())
    }

    /// Index of `text`, appending it when new.
    pub fn intern(&mut self, text: &str) -> usize {
        if let Some(&i) = self.lookup.get(text) {
            return i;
        }
        let i = self.strings.len();
        self.strings.push(text.to_string());
        self.lookup.insert(text.to_string(), i);
        i
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Whether strings were added since loading.
    pub fn is_modified(&self) -> bool {
        self.strings.len() > self.loaded
    }

    /// Treat every current string as written.
    pub fn mark_saved(&mut self) {
        self.loaded = self.strings.len();
    }

    /// The table as a part.
    ///
    /// Entries read from `existing` are kept as they are, rich text included;
    /// new strings are appended as plain `<si><t>` items.
    pub fn to_document(&self, existing: Option<XmlDocument>) -> XmlDocument {
        let mut doc = existing.unwrap_or_else(|| {
            XmlDocument::new(Element::new("sst").with_attr("xmlns", SST_NS))
        });
        for text in &self.strings[self.loaded.min(self.strings.len())..] {
            let mut t = Element::new("t").with_text(text.as_str());
            if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
                t.set_attr("xml:space", "preserve");
            }
            doc.root.push(Element::new("si").with_child(t));
        }
        let unique = doc.root.count_named("si");
        doc.root.set_attr("uniqueCount", unique.to_string());
        doc.root.remove_attr("count");
        doc
    }
}

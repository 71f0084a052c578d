//! In-memory OOXML package: read parts, edit them, write the archive back.

use crate::error::{Error, Result};
use crate::xml::{Element, XmlDocument};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// A relationship entry from a .rels file.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path (relative or absolute)
    pub target: String,
    /// Whether the target is external
    pub external: bool,
}

impl Relationship {
    /// Whether the type URI ends with `/{kind}` (e.g. `image`, `slideLayout`).
    pub fn is_kind(&self, kind: &str) -> bool {
        self.rel_type
            .rsplit('/')
            .next()
            .is_some_and(|last| last == kind)
    }
}

/// Relationships of one part, in file order.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    pub ordered: Vec<Relationship>,
    by_id: HashMap<String, usize>,
}

impl Relationships {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.by_id.get(id).map(|&i| &self.ordered[i])
    }

    /// Relationships whose type URI ends with `/{kind}`.
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.ordered.iter().filter(move |r| r.is_kind(kind))
    }

    pub fn add(&mut self, rel: Relationship) {
        self.by_id.insert(rel.id.clone(), self.ordered.len());
        self.ordered.push(rel);
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    fn parse(content: &str) -> Result<Self> {
        let mut rels = Relationships::new();
        if content.trim().is_empty() {
            return Ok(rels);
        }
        let doc = XmlDocument::parse(content)?;
        for e in doc.root.children_named("Relationship") {
            let id = e.attr("Id").unwrap_or_default().to_string();
            if id.is_empty() {
                continue;
            }
            rels.add(Relationship {
                id,
                rel_type: e.attr("Type").unwrap_or_default().to_string(),
                target: e.attr("Target").unwrap_or_default().to_string(),
                external: e
                    .attr("TargetMode")
                    .is_some_and(|m| m.eq_ignore_ascii_case("external")),
            });
        }
        Ok(rels)
    }
}

/// One zip entry.
#[derive(Debug, Clone)]
struct Part {
    name: String,
    data: Vec<u8>,
}

/// Office Open XML package held fully in memory.
///
/// Part order is preserved on save, with `[Content_Types].xml` written first.
#[derive(Clone)]
pub struct OoxmlPackage {
    parts: Vec<Part>,
}

/// Fix XML encoding declaration from UTF-16 to UTF-8 after transcoding.
fn fix_xml_encoding_declaration(content: &str) -> String {
    if content.starts_with("<?xml") {
        if let Some(end_decl) = content.find("?>") {
            let (decl, rest) = content.split_at(end_decl + 2);
            let fixed = decl
                .replace("\"UTF-16\"", "\"UTF-8\"")
                .replace("'UTF-16'", "'UTF-8'")
                .replace("\"utf-16\"", "\"UTF-8\"")
                .replace("'utf-16'", "'UTF-8'");
            return format!("{}{}", fixed, rest);
        }
    }
    content.to_string()
}

/// Decode XML bytes handling UTF-8 (with or without BOM) and UTF-16 LE/BE.
pub fn decode_xml_bytes(bytes: &[u8]) -> Result<String> {
    let invalid = |e: std::string::FromUtf8Error| {
        Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    };

    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8(rest.to_vec()).map_err(invalid);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return Ok(fix_xml_encoding_declaration(&decode_utf16(rest, u16::from_le_bytes)?));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return Ok(fix_xml_encoding_declaration(&decode_utf16(rest, u16::from_be_bytes)?));
    }

    match String::from_utf8(bytes.to_vec()) {
        Ok(s) => Ok(s),
        Err(_) if bytes.len() >= 4 && bytes[1] == 0 && bytes[3] == 0 => {
            Ok(fix_xml_encoding_declaration(&decode_utf16(bytes, u16::from_le_bytes)?))
        }
        Err(_) if bytes.len() >= 4 && bytes[0] == 0 && bytes[2] == 0 => {
            Ok(fix_xml_encoding_declaration(&decode_utf16(bytes, u16::from_be_bytes)?))
        }
        Err(_) => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String> {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Path of the .rels part that belongs to `part_path` (`""` for the package).
pub fn rels_path_for(part_path: &str) -> String {
    if part_path.is_empty() || part_path == "/" {
        return "_rels/.rels".to_string();
    }
    match part_path.rsplit_once('/') {
        Some((parent, file)) => format!("{}/_rels/{}.rels", parent, file),
        None => format!("_rels/{}.rels", part_path),
    }
}

/// Resolve a relationship target against the part that owns it.
pub fn resolve_path(base: &str, relative: &str) -> String {
    if let Some(stripped) = relative.strip_prefix('/') {
        return stripped.to_string();
    }

    let base_path = Path::new(base);
    let base_dir = base_path.parent().unwrap_or(Path::new(""));

    let mut result = base_dir.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            std::path::Component::ParentDir => {
                result.pop();
            }
            std::path::Component::Normal(c) => {
                result.push(c);
            }
            _ => {}
        }
    }

    result.to_string_lossy().replace('\\', "/")
}

/// Express `target` (a package path) relative to the directory of `base`.
pub fn relative_target(base: &str, target: &str) -> String {
    let base_dir: Vec<&str> = match base.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let target_parts: Vec<&str> = target.split('/').collect();
    let common = base_dir
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut out: Vec<&str> = vec![".."; base_dir.len() - common];
    out.extend(&target_parts[common..]);
    out.join("/")
}

fn is_media(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    [".png", ".jpg", ".jpeg", ".gif", ".mp4", ".mp3", ".wav", ".wmv", ".m4a"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}

impl OoxmlPackage {
    /// Open a package from a file path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use redoc::package::OoxmlPackage;
    ///
    /// let package = OoxmlPackage::open("document.docx")?;
    /// assert!(package.exists("word/document.xml"));
    /// # Ok::<(), redoc::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        crate::error::ensure_exist(&[path])?;
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// Read every entry of a zip archive held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            parts.push(Part {
                name: file.name().to_string(),
                data,
            });
        }
        Ok(Self { parts })
    }

    pub fn from_reader<R: Read + Seek>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// An empty package, used to assemble documents from templates.
    pub fn empty() -> Self {
        Self { parts: Vec::new() }
    }

    fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }

    /// Read an XML part as a string, transcoding UTF-16 when needed.
    pub fn read_xml(&self, path: &str) -> Result<String> {
        let part = self
            .part(path)
            .ok_or_else(|| Error::MissingComponent(path.to_string()))?;
        decode_xml_bytes(&part.data)
    }

    pub fn read_binary(&self, path: &str) -> Result<Vec<u8>> {
        self.part(path)
            .map(|p| p.data.clone())
            .ok_or_else(|| Error::MissingComponent(path.to_string()))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.part(path).is_some()
    }

    pub fn list_files(&self) -> Vec<String> {
        self.parts.iter().map(|p| p.name.clone()).collect()
    }

    pub fn list_files_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.parts
            .iter()
            .filter(|p| p.name.starts_with(prefix))
            .map(|p| p.name.clone())
            .collect()
    }

    /// Replace the content of a part, appending it when new.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(Part {
                name: name.to_string(),
                data,
            }),
        }
    }

    pub fn remove_part(&mut self, name: &str) -> bool {
        let before = self.parts.len();
        self.parts.retain(|p| p.name != name);
        before != self.parts.len()
    }

    pub fn parse_xml_part(&self, name: &str) -> Result<XmlDocument> {
        XmlDocument::parse(&self.read_xml(name)?)
    }

    pub fn write_xml_part(&mut self, name: &str, doc: &XmlDocument) -> Result<()> {
        let bytes = doc.to_bytes()?;
        self.set_part(name, bytes);
        Ok(())
    }

    /// A part name under `dir` with `stem{N}.ext` not used yet, N starting at 1.
    pub fn next_part_name(&self, dir: &str, stem: &str, ext: &str) -> String {
        (1..)
            .map(|n| format!("{}/{}{}.{}", dir, stem, n, ext))
            .find(|name| !self.exists(name))
            .unwrap_or_else(|| format!("{}/{}.{}", dir, stem, ext))
    }

    /// Read the relationships of a part; a missing .rels file yields none.
    pub fn read_relationships(&self, part_path: &str) -> Result<Relationships> {
        match self.read_xml(&rels_path_for(part_path)) {
            Ok(content) => Relationships::parse(&content),
            Err(Error::MissingComponent(_)) => Ok(Relationships::new()),
            Err(e) => Err(e),
        }
    }

    fn rels_document(&self, part_path: &str) -> Result<XmlDocument> {
        let path = rels_path_for(part_path);
        if self.exists(&path) {
            self.parse_xml_part(&path)
        } else {
            Ok(XmlDocument::new(
                Element::new("Relationships").with_attr("xmlns", RELS_NS),
            ))
        }
    }

    /// Add a relationship from `part_path` and return its new id.
    pub fn add_relationship(&mut self, part_path: &str, rel_type: &str, target: &str) -> Result<String> {
        let mut doc = self.rels_document(part_path)?;
        let taken: Vec<&str> = doc
            .root
            .children_named("Relationship")
            .filter_map(|e| e.attr("Id"))
            .collect();
        let id = (1..)
            .map(|n| format!("rId{}", n))
            .find(|id| !taken.contains(&id.as_str()))
            .unwrap_or_default();
        doc.root.push(
            Element::new("Relationship")
                .with_attr("Id", id.clone())
                .with_attr("Type", rel_type)
                .with_attr("Target", target),
        );
        self.write_xml_part(&rels_path_for(part_path), &doc)?;
        Ok(id)
    }

    /// Remove the relationships of `part_path` matching `pred`.
    pub fn remove_relationships(
        &mut self,
        part_path: &str,
        pred: impl Fn(&Relationship) -> bool,
    ) -> Result<usize> {
        let path = rels_path_for(part_path);
        if !self.exists(&path) {
            return Ok(0);
        }
        let mut doc = self.parse_xml_part(&path)?;
        let removed = doc.root.retain_children(|e| {
            let rel = Relationship {
                id: e.attr("Id").unwrap_or_default().to_string(),
                rel_type: e.attr("Type").unwrap_or_default().to_string(),
                target: e.attr("Target").unwrap_or_default().to_string(),
                external: e.attr("TargetMode").is_some(),
            };
            !pred(&rel)
        });
        if removed > 0 {
            self.write_xml_part(&path, &doc)?;
        }
        Ok(removed)
    }

    fn content_types(&self) -> Result<XmlDocument> {
        if self.exists(CONTENT_TYPES_PART) {
            self.parse_xml_part(CONTENT_TYPES_PART)
        } else {
            Ok(XmlDocument::new(
                Element::new("Types").with_attr("xmlns", CONTENT_TYPES_NS),
            ))
        }
    }

    /// Content type of a part, from its override or its extension default.
    pub fn content_type_of(&self, part: &str) -> Result<Option<String>> {
        let types = self.content_types()?;
        let part_name = format!("/{}", part);
        if let Some(ct) = types
            .root
            .children_named("Override")
            .find(|e| e.attr("PartName") == Some(part_name.as_str()))
            .and_then(|e| e.attr("ContentType"))
        {
            return Ok(Some(ct.to_string()));
        }
        let ext = part.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
        let found = types
            .root
            .children_named("Default")
            .find(|e| e.attr("Extension").map(str::to_ascii_lowercase) == Some(ext.clone()))
            .and_then(|e| e.attr("ContentType"))
            .map(String::from);
        Ok(found)
    }

    /// Register an override for `part` (replacing an existing one).
    pub fn add_override(&mut self, part: &str, content_type: &str) -> Result<()> {
        let mut types = self.content_types()?;
        let part_name = format!("/{}", part);
        types
            .root
            .retain_children(|e| !(e.is("Override") && e.attr("PartName") == Some(part_name.as_str())));
        types.root.push(
            Element::new("Override")
                .with_attr("PartName", part_name)
                .with_attr("ContentType", content_type),
        );
        self.write_xml_part(CONTENT_TYPES_PART, &types)
    }

    /// Register a default content type for an extension if none exists.
    pub fn ensure_default(&mut self, extension: &str, content_type: &str) -> Result<()> {
        let mut types = self.content_types()?;
        let ext = extension.to_ascii_lowercase();
        let present = types
            .root
            .children_named("Default")
            .any(|e| e.attr("Extension").map(str::to_ascii_lowercase) == Some(ext.clone()));
        if present {
            return Ok(());
        }
        let default = Element::new("Default")
            .with_attr("Extension", ext)
            .with_attr("ContentType", content_type);
        types.root.insert_ordered(default, &["Default", "Override"]);
        self.write_xml_part(CONTENT_TYPES_PART, &types)
    }

    /// Remove overrides whose part name matches `pred`.
    pub fn remove_overrides(&mut self, pred: impl Fn(&str) -> bool) -> Result<usize> {
        let mut types = self.content_types()?;
        let removed = types.root.retain_children(|e| {
            !(e.is("Override") && e.attr("PartName").is_some_and(|name| pred(name)))
        });
        if removed > 0 {
            self.write_xml_part(CONTENT_TYPES_PART, &types)?;
        }
        Ok(removed)
    }

    /// Serialize the package as a zip archive.
    ///
    /// XML parts are deflated; already-compressed media are stored.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

        let ordered = self
            .parts
            .iter()
            .filter(|p| p.name == CONTENT_TYPES_PART)
            .chain(self.parts.iter().filter(|p| p.name != CONTENT_TYPES_PART));
        for part in ordered {
            let method = if is_media(&part.name) {
                CompressionMethod::Stored
            } else {
                CompressionMethod::Deflated
            };
            let options = SimpleFileOptions::default().compression_method(method);
            writer.start_file(part.name.as_str(), options)?;
            writer.write_all(&part.data)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

impl std::fmt::Debug for OoxmlPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OoxmlPackage")
            .field("parts", &self.parts.len())
            .finish()
    }
}

//! Reading and writing `<c>` elements.

use super::reference::CellRef;
use super::shared_strings::SharedStrings;
use crate::xml::{Element, Node};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A cell value as stored (for formulas: the cached result).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Bool(bool),
    Text(String),
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            CellValue::Text(s) | CellValue::Error(s) => f.write_str(s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

/// Position of a cell element from its `r` attribute.
pub fn position(cell: &Element) -> Option<CellRef> {
    cell.attr("r").and_then(|r| CellRef::parse(r).ok())
}

pub fn style_index(cell: &Element) -> u32 {
    cell.attr("s").and_then(|s| s.parse().ok()).unwrap_or(0)
}

pub fn set_style_index(cell: &mut Element, index: u32) {
    if index == 0 {
        cell.remove_attr("s");
    } else {
        cell.set_attr("s", index.to_string());
    }
}

/// Formula text, if the cell has one.
pub fn formula(cell: &Element) -> Option<&Element> {
    cell.child("f")
}

pub fn has_formula(cell: &Element) -> bool {
    cell.has_child("f")
}

fn inline_text(cell: &Element) -> String {
    cell.child("is")
        .map(|is| is.find_all("t").into_iter().map(Element::text).collect())
        .unwrap_or_default()
}

/// The value of a cell; formulas yield their cached result.
pub fn read_value(cell: &Element, strings: &SharedStrings) -> CellValue {
    let raw = cell.child("v").map(Element::text);
    match cell.attr("t").unwrap_or("n") {
        "s" => raw
            .and_then(|v| v.trim().parse::<usize>().ok())
            .and_then(|i| strings.get(i))
            .map(|s| CellValue::Text(s.to_string()))
            .unwrap_or(CellValue::Empty),
        "inlineStr" => CellValue::Text(inline_text(cell)),
        "str" => raw.map(CellValue::Text).unwrap_or(CellValue::Empty),
        "b" => raw
            .map(|v| CellValue::Bool(v.trim() == "1"))
            .unwrap_or(CellValue::Empty),
        "e" => raw.map(CellValue::Error).unwrap_or(CellValue::Empty),
        _ => match raw {
            Some(v) if !v.trim().is_empty() => v
                .trim()
                .parse::<f64>()
                .map(CellValue::Number)
                .unwrap_or(CellValue::Text(v)),
            _ => CellValue::Empty,
        },
    }
}

/// Replace the content of a cell with a plain value, dropping any formula.
///
/// Text goes to the shared string table. The style is kept.
pub fn write_value(cell: &mut Element, value: &CellValue, strings: &mut SharedStrings) {
    cell.retain_children(|c| c.is("extLst"));
    cell.children.retain(|n| matches!(n, Node::Element(_)));
    cell.remove_attr("t");
    cell.remove_attr("cm");
    cell.remove_attr("vm");
    let v = match value {
        CellValue::Empty => return,
        CellValue::Number(n) => format_number(*n),
        CellValue::Bool(b) => {
            cell.set_attr("t", "b");
            if *b { "1" } else { "0" }.to_string()
        }
        CellValue::Text(s) => {
            cell.set_attr("t", "s");
            strings.intern(s).to_string()
        }
        CellValue::Error(e) => {
            cell.set_attr("t", "e");
            e.clone()
        }
    };
    cell.children.insert(0, Node::Element(Element::new("v").with_text(v)));
}

/// Shortest decimal text that reads back as the same number.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// A new `<c>` element at `at`.
pub fn new_cell(at: CellRef) -> Element {
    Element::new("c").with_attr("r", at.to_string())
}

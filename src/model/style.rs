//! Paragraph style definitions as written to and read from style files.

use serde::{Deserialize, Serialize};

/// RGB color, written as `#RRGGBB`.
///
/// Style files may also give `RRGGBB` or `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ColorRepr", into = "String")]
pub struct Color(pub [u8; 3]);

/// Accepted spellings of a [`Color`].
#[derive(Deserialize)]
#[serde(untagged)]
pub enum ColorRepr {
    Hex(String),
    Rgb([u8; 3]),
}

impl Color {
    pub fn parse(value: &str) -> Option<Self> {
        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Color([channel(0)?, channel(2)?, channel(4)?]))
    }

    /// `RRGGBB` as stored in `w:color` and spreadsheet `rgb` attributes (without alpha).
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

impl TryFrom<ColorRepr> for Color {
    type Error = String;

    fn try_from(value: ColorRepr) -> Result<Self, Self::Error> {
        match value {
            ColorRepr::Hex(s) => Color::parse(&s).ok_or_else(|| format!("invalid color: {}", s)),
            ColorRepr::Rgb(rgb) => Ok(Color(rgb)),
        }
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        format!("#{}", color.hex())
    }
}

/// Paragraph alignment. Accepts names or the integers 0-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AlignmentRepr", into = "String")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

/// Accepted spellings of an [`Alignment`].
#[derive(Deserialize)]
#[serde(untagged)]
pub enum AlignmentRepr {
    Name(String),
    Index(u8),
}

impl Alignment {
    pub fn name(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }

    /// Value of `w:jc`.
    pub fn to_ooxml(&self) -> &'static str {
        match self {
            Alignment::Justify => "both",
            other => other.name(),
        }
    }

    pub fn from_ooxml(value: &str) -> Option<Self> {
        match value {
            "left" | "start" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "both" | "distribute" | "justify" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

impl TryFrom<AlignmentRepr> for Alignment {
    type Error = String;

    fn try_from(value: AlignmentRepr) -> Result<Self, Self::Error> {
        match value {
            AlignmentRepr::Name(name) => Alignment::from_ooxml(&name.to_ascii_lowercase())
                .ok_or_else(|| format!("unknown alignment: {}", name)),
            AlignmentRepr::Index(0) => Ok(Alignment::Left),
            AlignmentRepr::Index(1) => Ok(Alignment::Center),
            AlignmentRepr::Index(2) => Ok(Alignment::Right),
            AlignmentRepr::Index(3) => Ok(Alignment::Justify),
            AlignmentRepr::Index(n) => Err(format!("unknown alignment: {}", n)),
        }
    }
}

impl From<Alignment> for String {
    fn from(alignment: Alignment) -> Self {
        alignment.name().to_string()
    }
}

/// Character formatting. Sizes are in points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Font for East-Asian text (`w:eastAsia`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub east_asia: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

/// Paragraph formatting. Lengths are in points.
///
/// `line_spacing` up to 10 is a multiple of single spacing; larger values
/// are an exact height in points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParagraphFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_line_indent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_indent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_indent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_spacing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_before: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_after: Option<f64>,
    /// Outline level 1-9.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline_level: Option<u8>,
}

pub const MAX_LINE_MULTIPLE: f64 = 10.0;

/// A paragraph style as reported by extraction and accepted by application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleDefinition {
    pub style_id: String,
    #[serde(rename = "type")]
    pub style_type: String,
    pub font: FontSpec,
    pub paragraph_format: ParagraphFormat,
    pub base_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading_level: Option<u8>,
}

impl Default for StyleDefinition {
    fn default() -> Self {
        Self {
            style_id: String::new(),
            style_type: "paragraph".to_string(),
            font: FontSpec::default(),
            paragraph_format: ParagraphFormat::default(),
            base_style: None,
            heading_level: None,
        }
    }
}

/// Style name → definition, sorted by name.
pub type StyleSet = std::collections::BTreeMap<String, StyleDefinition>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_forms() {
        let from_hex: Color = serde_json::from_str(r##""#1F4E79""##).unwrap();
        let from_bare: Color = serde_json::from_str(r#""1f4e79""#).unwrap();
        let from_rgb: Color = serde_json::from_str("[31, 78, 121]").unwrap();
        assert_eq!(from_hex, from_bare);
        assert_eq!(from_hex, from_rgb);
        assert_eq!(serde_json::to_string(&from_rgb).unwrap(), r##""#1F4E79""##);
        assert!(serde_json::from_str::<Color>(r#""blue""#).is_err());
    }

    #[test]
    fn test_alignment_forms() {
        let a: Alignment = serde_json::from_str(r#""Center""#).unwrap();
        assert_eq!(a, Alignment::Center);
        let b: Alignment = serde_json::from_str("3").unwrap();
        assert_eq!(b, Alignment::Justify);
        assert_eq!(b.to_ooxml(), "both");
        assert!(serde_json::from_str::<Alignment>("7").is_err());
    }

    #[test]
    fn test_style_file_shape() {
        let json = r##"{
            "正文": {
                "font": {"name": "宋体", "size": 10.5, "color": "#000000"},
                "paragraph_format": {"alignment": "justify", "first_line_indent": 21}
            }
        }"##;
        let set: StyleSet = serde_json::from_str(json).unwrap();
        let body = &set["正文"];
        assert_eq!(body.font.size, Some(10.5));
        assert_eq!(body.paragraph_format.first_line_indent, Some(21.0));
        assert_eq!(body.style_type, "paragraph");
    }
}

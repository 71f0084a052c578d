//! Reading and writing run (`w:rPr`) and paragraph (`w:pPr`) properties.
//!
//! Word rejects property elements out of schema order, so every insertion
//! goes through the order tables below.

use crate::model::{Alignment, Color, FontSpec, ParagraphFormat, MAX_LINE_MULTIPLE};
use crate::xml::Element;

pub const PPR_ORDER: &[&str] = &[
    "w:pStyle", "w:keepNext", "w:keepLines", "w:pageBreakBefore", "w:framePr",
    "w:widowControl", "w:numPr", "w:suppressLineNumbers", "w:pBdr", "w:shd", "w:tabs",
    "w:suppressAutoHyphens", "w:kinsoku", "w:wordWrap", "w:overflowPunct", "w:topLinePunct",
    "w:autoSpaceDE", "w:autoSpaceDN", "w:bidi", "w:adjustRightInd", "w:snapToGrid",
    "w:spacing", "w:ind", "w:contextualSpacing", "w:mirrorIndents", "w:suppressOverlap",
    "w:jc", "w:textDirection", "w:textAlignment", "w:textboxTightWrap", "w:outlineLvl",
    "w:divId", "w:cnfStyle", "w:rPr", "w:sectPr", "w:pPrChange",
];

pub const RPR_ORDER: &[&str] = &[
    "w:rStyle", "w:rFonts", "w:b", "w:bCs", "w:i", "w:iCs", "w:caps", "w:smallCaps",
    "w:strike", "w:dstrike", "w:outline", "w:shadow", "w:emboss", "w:imprint", "w:noProof",
    "w:snapToGrid", "w:vanish", "w:webHidden", "w:color", "w:spacing", "w:w", "w:kern",
    "w:position", "w:sz", "w:szCs", "w:highlight", "w:u", "w:effect", "w:bdr", "w:shd",
    "w:fitText", "w:vertAlign", "w:rtl", "w:cs", "w:em", "w:lang", "w:eastAsianLayout",
    "w:specVanish", "w:oMath", "w:ins", "w:del", "w:rPrChange",
];

/// Children of `w:style` in schema order.
pub const STYLE_ORDER: &[&str] = &[
    "w:name", "w:aliases", "w:basedOn", "w:next", "w:link", "w:autoRedefine", "w:hidden",
    "w:uiPriority", "w:semiHidden", "w:unhideWhenUsed", "w:qFormat", "w:locked",
    "w:personal", "w:personalCompose", "w:personalReply", "w:rsid", "w:pPr", "w:rPr",
    "w:tblPr", "w:trPr", "w:tcPr", "w:tblStylePr",
];

/// `w:pPr` or `w:rPr` come first inside paragraphs and runs.
const LEADING_PROPS: &[&str] = &["w:pPr", "w:rPr"];

pub fn twips_to_pt(twips: &str) -> Option<f64> {
    twips.parse::<f64>().ok().map(|v| v / 20.0)
}

pub fn pt_to_twips(pt: f64) -> String {
    ((pt * 20.0).round() as i64).to_string()
}

fn half_points(pt: f64) -> String {
    ((pt * 2.0).round() as i64).to_string()
}

/// Value of an on/off property such as `w:b`; a bare element means on.
pub fn toggle_value(e: &Element) -> bool {
    !matches!(e.attr("w:val"), Some("0" | "false" | "off" | "none"))
}

pub fn set_toggle(props: &mut Element, name: &str, on: bool) {
    let e = props.ensure_child_ordered(name, RPR_ORDER);
    e.attributes.clear();
    if !on {
        e.set_attr("w:val", "0");
    }
}

/// The paragraph's `w:pPr`, created as its first child when missing.
pub fn paragraph_props(p: &mut Element) -> &mut Element {
    p.ensure_child_ordered("w:pPr", LEADING_PROPS)
}

/// The run's `w:rPr`, created as its first child when missing.
pub fn run_props(r: &mut Element) -> &mut Element {
    r.ensure_child_ordered("w:rPr", LEADING_PROPS)
}

pub fn read_font(rpr: &Element) -> FontSpec {
    let mut font = FontSpec::default();
    if let Some(fonts) = rpr.child("w:rFonts") {
        font.name = fonts
            .attr("w:ascii")
            .or_else(|| fonts.attr("w:hAnsi"))
            .map(String::from);
        font.east_asia = fonts.attr("w:eastAsia").map(String::from);
    }
    font.size = rpr
        .child("w:sz")
        .and_then(|e| e.attr("w:val"))
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| v / 2.0);
    font.bold = rpr.child("w:b").map(toggle_value);
    font.italic = rpr.child("w:i").map(toggle_value);
    font.underline = rpr.child("w:u").map(toggle_value);
    font.color = rpr
        .child("w:color")
        .and_then(|e| e.attr("w:val"))
        .filter(|v| *v != "auto")
        .and_then(Color::parse);
    font
}

pub fn apply_font(rpr: &mut Element, font: &FontSpec) {
    if font.name.is_some() || font.east_asia.is_some() {
        let fonts = rpr.ensure_child_ordered("w:rFonts", RPR_ORDER);
        if let Some(name) = &font.name {
            fonts.set_attr("w:ascii", name.as_str());
            fonts.set_attr("w:hAnsi", name.as_str());
            fonts.set_attr("w:cs", name.as_str());
        }
        if let Some(east_asia) = &font.east_asia {
            fonts.set_attr("w:eastAsia", east_asia.as_str());
        }
    }
    if let Some(size) = font.size {
        rpr.ensure_child_ordered("w:sz", RPR_ORDER)
            .set_attr("w:val", half_points(size));
        rpr.ensure_child_ordered("w:szCs", RPR_ORDER)
            .set_attr("w:val", half_points(size));
    }
    if let Some(bold) = font.bold {
        set_toggle(rpr, "w:b", bold);
    }
    if let Some(italic) = font.italic {
        set_toggle(rpr, "w:i", italic);
    }
    if let Some(underline) = font.underline {
        rpr.ensure_child_ordered("w:u", RPR_ORDER)
            .set_attr("w:val", if underline { "single" } else { "none" });
    }
    if let Some(color) = font.color {
        rpr.ensure_child_ordered("w:color", RPR_ORDER)
            .set_attr("w:val", color.hex());
    }
}

pub fn read_paragraph_format(ppr: &Element) -> ParagraphFormat {
    let mut format = ParagraphFormat {
        alignment: ppr
            .child("w:jc")
            .and_then(|e| e.attr("w:val"))
            .and_then(Alignment::from_ooxml),
        ..Default::default()
    };

    if let Some(ind) = ppr.child("w:ind") {
        format.first_line_indent = ind
            .attr("w:firstLine")
            .and_then(twips_to_pt)
            .or_else(|| ind.attr("w:hanging").and_then(twips_to_pt).map(|v| -v));
        format.left_indent = ind
            .attr("w:left")
            .or_else(|| ind.attr("w:start"))
            .and_then(twips_to_pt);
        format.right_indent = ind
            .attr("w:right")
            .or_else(|| ind.attr("w:end"))
            .and_then(twips_to_pt);
    }

    if let Some(spacing) = ppr.child("w:spacing") {
        format.space_before = spacing.attr("w:before").and_then(twips_to_pt);
        format.space_after = spacing.attr("w:after").and_then(twips_to_pt);
        format.line_spacing = spacing.attr("w:line").and_then(|line| {
            let value = line.parse::<f64>().ok()?;
            match spacing.attr("w:lineRule") {
                None | Some("auto") => Some(value / 240.0),
                Some(_) => Some(value / 20.0),
            }
        });
    }

    format.outline_level = ppr
        .child("w:outlineLvl")
        .and_then(|e| e.attr("w:val"))
        .and_then(|v| v.parse::<u8>().ok())
        .map(|v| v + 1);
    format
}

pub fn apply_paragraph_format(ppr: &mut Element, format: &ParagraphFormat) {
    if format.space_before.is_some() || format.space_after.is_some() || format.line_spacing.is_some() {
        let spacing = ppr.ensure_child_ordered("w:spacing", PPR_ORDER);
        if let Some(before) = format.space_before {
            spacing.set_attr("w:before", pt_to_twips(before));
        }
        if let Some(after) = format.space_after {
            spacing.set_attr("w:after", pt_to_twips(after));
        }
        if let Some(line) = format.line_spacing {
            if line <= MAX_LINE_MULTIPLE {
                spacing.set_attr("w:line", ((line * 240.0).round() as i64).to_string());
                spacing.set_attr("w:lineRule", "auto");
            } else {
                spacing.set_attr("w:line", pt_to_twips(line));
                spacing.set_attr("w:lineRule", "exact");
            }
        }
    }

    if format.first_line_indent.is_some() || format.left_indent.is_some() || format.right_indent.is_some() {
        let ind = ppr.ensure_child_ordered("w:ind", PPR_ORDER);
        if let Some(first) = format.first_line_indent {
            ind.remove_attr("w:firstLine");
            ind.remove_attr("w:firstLineChars");
            ind.remove_attr("w:hanging");
            ind.remove_attr("w:hangingChars");
            if first >= 0.0 {
                ind.set_attr("w:firstLine", pt_to_twips(first));
            } else {
                ind.set_attr("w:hanging", pt_to_twips(-first));
            }
        }
        if let Some(left) = format.left_indent {
            ind.set_attr("w:left", pt_to_twips(left));
        }
        if let Some(right) = format.right_indent {
            ind.set_attr("w:right", pt_to_twips(right));
        }
    }

    if let Some(alignment) = format.alignment {
        ppr.ensure_child_ordered("w:jc", PPR_ORDER)
            .set_attr("w:val", alignment.to_ooxml());
    }

    if let Some(level) = format.outline_level {
        let value = level.clamp(1, 9) - 1;
        ppr.ensure_child_ordered("w:outlineLvl", PPR_ORDER)
            .set_attr("w:val", value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_round_trip() {
        let mut rpr = Element::new("w:rPr");
        let font = FontSpec {
            name: Some("Arial".into()),
            east_asia: Some("黑体".into()),
            size: Some(10.5),
            bold: Some(true),
            italic: Some(false),
            underline: Some(true),
            color: Some(Color([0x1F, 0x4E, 0x79])),
        };
        apply_font(&mut rpr, &font);
        assert_eq!(rpr.child("w:sz").unwrap().attr("w:val"), Some("21"));
        assert_eq!(read_font(&rpr), font);

        let names: Vec<&str> = rpr.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["w:rFonts", "w:b", "w:i", "w:color", "w:sz", "w:szCs", "w:u"]);
    }

    #[test]
    fn test_paragraph_format_round_trip() {
        let mut ppr = Element::new("w:pPr");
        let format = ParagraphFormat {
            alignment: Some(Alignment::Justify),
            first_line_indent: Some(21.0),
            left_indent: Some(0.0),
            right_indent: None,
            line_spacing: Some(1.5),
            space_before: Some(6.0),
            space_after: Some(6.0),
            outline_level: Some(1),
        };
        apply_paragraph_format(&mut ppr, &format);
        assert_eq!(ppr.child("w:ind").unwrap().attr("w:firstLine"), Some("420"));
        assert_eq!(ppr.child("w:spacing").unwrap().attr("w:line"), Some("360"));
        assert_eq!(ppr.child("w:outlineLvl").unwrap().attr("w:val"), Some("0"));
        assert_eq!(read_paragraph_format(&ppr), format);
    }

    #[test]
    fn test_exact_line_spacing_and_hanging() {
        let mut ppr = Element::new("w:pPr");
        apply_paragraph_format(
            &mut ppr,
            &ParagraphFormat {
                line_spacing: Some(18.0),
                first_line_indent: Some(-12.0),
                ..Default::default()
            },
        );
        let read = read_paragraph_format(&ppr);
        assert_eq!(read.line_spacing, Some(18.0));
        assert_eq!(read.first_line_indent, Some(-12.0));
    }

    #[test]
    fn test_toggle_values() {
        let on = Element::parse("<w:b/>").unwrap();
        let off = Element::parse(r#"<w:b w:val="0"/>"#).unwrap();
        assert!(toggle_value(&on));
        assert!(!toggle_value(&off));
    }
}

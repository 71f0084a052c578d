//! Walking the shape tree of slides, layouts and masters.

use crate::xml::Element;

const SHAPE_TAGS: &[&str] = &["p:sp", "p:grpSp", "p:graphicFrame", "p:pic", "p:cxnSp"];

const CHART_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/chart";

/// `p:cSld/p:spTree` of a slide-like part.
pub fn shape_tree(root: &Element) -> Option<&Element> {
    root.child("p:cSld")?.child("p:spTree")
}

/// Direct shapes of a tree or group, in z-order.
pub fn child_shapes(container: &Element) -> impl Iterator<Item = &Element> {
    container
        .elements()
        .filter(|e| SHAPE_TAGS.contains(&e.name.as_str()))
}

/// Visit every shape under `container`, descending into groups after the
/// group itself.
pub fn walk<'a>(container: &'a Element, f: &mut dyn FnMut(&'a Element)) {
    for shape in child_shapes(container) {
        f(shape);
        if shape.is("p:grpSp") {
            walk(shape, f);
        }
    }
}

/// The `p:ph` element of a placeholder shape.
pub fn placeholder(shape: &Element) -> Option<&Element> {
    let non_visual = ["p:nvSpPr", "p:nvPicPr", "p:nvGraphicFramePr"]
        .iter()
        .find_map(|name| shape.child(name))?;
    non_visual.child("p:nvPr")?.child("p:ph")
}

/// Title or centered-title placeholder.
pub fn is_title(shape: &Element) -> bool {
    placeholder(shape)
        .and_then(|ph| ph.attr("type"))
        .is_some_and(|kind| kind == "title" || kind == "ctrTitle")
}

/// First title placeholder among the top-level shapes.
pub fn title_shape(root: &Element) -> Option<&Element> {
    child_shapes(shape_tree(root)?).find(|s| is_title(s))
}

/// Text of a paragraph: runs and fields, line breaks as `\n`.
pub fn paragraph_text(p: &Element) -> String {
    let mut text = String::new();
    for child in p.elements() {
        match child.name.as_str() {
            "a:r" | "a:fld" => {
                if let Some(t) = child.child("a:t") {
                    text.push_str(&t.text());
                }
            }
            "a:br" => text.push('\n'),
            _ => {}
        }
    }
    text
}

/// Paragraphs of a shape's or a table cell's text body.
pub fn paragraphs(owner: &Element) -> impl Iterator<Item = &Element> {
    owner
        .child("p:txBody")
        .or_else(|| owner.child("a:txBody"))
        .into_iter()
        .flat_map(|body| body.children_named("a:p"))
}

/// Paragraph texts joined by newlines.
pub fn text_body(owner: &Element) -> String {
    paragraphs(owner)
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn table(shape: &Element) -> Option<&Element> {
    shape.find("a:tbl")
}

pub fn is_chart(shape: &Element) -> bool {
    shape
        .find("a:graphicData")
        .and_then(|g| g.attr("uri"))
        .is_some_and(|uri| uri == CHART_URI)
}

/// Relationship id of a picture's image (`r:embed` of its blip).
pub fn picture_blip(shape: &Element) -> Option<&str> {
    shape.child("p:blipFill")?.child("a:blip")?.attr("r:embed")
}

/// Relationship id of a picture background fill.
pub fn background_blip(root: &Element) -> Option<&str> {
    root.child("p:cSld")?
        .child("p:bg")?
        .child("p:bgPr")?
        .child("a:blipFill")?
        .child("a:blip")?
        .attr("r:embed")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE: &str = r#"<p:sld xmlns:a="a" xmlns:p="p" xmlns:r="r"><p:cSld><p:bg><p:bgPr><a:blipFill><a:blip r:embed="rId9"/></a:blipFill></p:bgPr></p:bg><p:spTree><p:nvGrpSpPr/><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="t"/><p:cNvSpPr/><p:nvPr><p:ph type="ctrTitle"/></p:nvPr></p:nvSpPr><p:txBody><a:p><a:r><a:t>年度</a:t></a:r><a:br/><a:r><a:t>总结</a:t></a:r></a:p><a:p><a:fld id="x" type="slidenum"><a:t>3</a:t></a:fld></a:p></p:txBody></p:sp><p:grpSp><p:nvGrpSpPr/><p:grpSpPr/><p:pic><p:blipFill><a:blip r:embed="rId2"/></p:blipFill></p:pic></p:grpSp></p:spTree></p:cSld></p:sld>"#;

    #[test]
    fn test_title_and_text() {
        let root = Element::parse(SLIDE).unwrap();
        let title = title_shape(&root).unwrap();
        assert_eq!(text_body(title), "年度\n总结\n3");
        assert_eq!(background_blip(&root), Some("rId9"));
    }

    #[test]
    fn test_walk_descends_into_groups() {
        let root = Element::parse(SLIDE).unwrap();
        let mut names = Vec::new();
        walk(shape_tree(&root).unwrap(), &mut |s| names.push(s.name.clone()));
        assert_eq!(names, vec!["p:sp", "p:grpSp", "p:pic"]);

        let mut blips = Vec::new();
        walk(shape_tree(&root).unwrap(), &mut |s| blips.extend(picture_blip(s)));
        assert_eq!(blips, vec!["rId2"]);
    }
}

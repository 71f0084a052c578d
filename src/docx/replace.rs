//! Batch find-and-replace over paragraph text.

use super::paragraph::{for_each_text_mut, set_paragraph_text, text_of};
use super::DocxDocument;
use crate::error::{Error, Result};
use crate::xml::Element;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub old: String,
    pub new: String,
}

/// Ordered replacement pairs, applied one after another.
///
/// ```toml
/// [[replacements]]
/// old = "原文本1"
/// new = "替换文本1"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaceConfig {
    pub replacements: Vec<Replacement>,
}

impl ReplaceConfig {
    /// Parse `old=new` command-line pairs.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Self> {
        let replacements = pairs
            .iter()
            .map(|pair| {
                let pair = pair.as_ref();
                pair.split_once('=')
                    .map(|(old, new)| Replacement {
                        old: old.to_string(),
                        new: new.to_string(),
                    })
                    .ok_or_else(|| Error::Config(format!("expected old=new, got '{}'", pair)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { replacements })
    }

    fn validate(&self) -> Result<()> {
        if self.replacements.iter().any(|r| r.old.is_empty()) {
            return Err(Error::Config("replacement with empty search text".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplacementCount {
    pub old: String,
    pub new: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaceReport {
    pub pairs: Vec<ReplacementCount>,
}

impl ReplaceReport {
    pub fn total(&self) -> usize {
        self.pairs.iter().map(|p| p.count).sum()
    }
}

/// Replace `old` in one paragraph and return the occurrence count.
///
/// When every occurrence sits inside a single `w:t`, each is replaced in place
/// so run formatting survives; otherwise the paragraph text is collapsed into
/// its first run.
fn replace_in_paragraph(p: &mut Element, old: &str, new: &str) -> usize {
    let original = text_of(p);
    let total = original.matches(old).count();
    if total == 0 {
        return 0;
    }

    let mut in_runs = 0;
    for_each_text_mut(p, &mut |t| {
        in_runs += t.text().matches(old).count();
    });

    if in_runs == total {
        for_each_text_mut(p, &mut |t| {
            let text = t.text();
            if text.contains(old) {
                t.set_text(text.replace(old, new));
                t.set_attr("xml:space", "preserve");
            }
        });
    } else {
        set_paragraph_text(p, &original.replace(old, new));
    }
    total
}

/// Apply each replacement pair to every paragraph, table cells included.
pub fn replace_text(doc: &mut DocxDocument, config: &ReplaceConfig) -> Result<ReplaceReport> {
    config.validate()?;
    let mut report = ReplaceReport::default();
    for pair in &config.replacements {
        let mut count = 0;
        doc.for_each_paragraph_mut(&mut |p| {
            count += replace_in_paragraph(p, &pair.old, &pair.new);
        })?;
        debug!(old = %pair.old, new = %pair.new, count, "replaced");
        report.pairs.push(ReplacementCount {
            old: pair.old.clone(),
            new: pair.new.clone(),
            count,
        });
    }
    info!(total = report.total(), "text replacement finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::paragraph::{new_run, push_block, runs};

    fn doc_with_runs(paragraphs: &[&[&str]]) -> DocxDocument {
        let mut doc = DocxDocument::blank().unwrap();
        let body = doc.body_mut().unwrap();
        for texts in paragraphs {
            let mut p = Element::new("w:p");
            for (i, text) in texts.iter().enumerate() {
                let rpr = (i == 0).then(|| Element::new("w:rPr").with_child(Element::new("w:b")));
                p.push(new_run(text, rpr));
            }
            push_block(body, p);
        }
        doc
    }

    #[test]
    fn test_replace_within_runs_keeps_formatting() {
        let mut doc = doc_with_runs(&[&["甲方甲方", "与乙方"]]);
        let config = ReplaceConfig::from_pairs(&["甲方=委托方", "乙方=受托方"]).unwrap();
        let report = replace_text(&mut doc, &config).unwrap();
        assert_eq!(report.pairs[0].count, 2);
        assert_eq!(report.pairs[1].count, 1);
        assert_eq!(report.total(), 3);

        let p = doc.paragraphs().unwrap()[0];
        let texts: Vec<String> = runs(p).map(text_of).collect();
        assert_eq!(texts, vec!["委托方委托方", "与受托方"]);
    }

    #[test]
    fn test_replace_across_runs_collapses() {
        let mut doc = doc_with_runs(&[&["合同", "编号：", "001"]]);
        let config = ReplaceConfig::from_pairs(&["同编=X"]).unwrap();
        let report = replace_text(&mut doc, &config).unwrap();
        assert_eq!(report.total(), 1);
        let p = doc.paragraphs().unwrap()[0];
        assert_eq!(text_of(p), "合X号：001");
        let first = runs(p).next().unwrap();
        assert!(first.child("w:rPr").unwrap().has_child("w:b"));
    }

    #[test]
    fn test_replace_across_runs_beside_text_box() {
        let mut doc = DocxDocument::blank().unwrap();
        let p = Element::parse(
            r#"<w:p><w:r><w:t>甲</w:t></w:r><w:r><w:t>方签字</w:t><w:drawing><w:txbxContent><w:p><w:r><w:t>甲方</w:t></w:r></w:p></w:txbxContent></w:drawing></w:r></w:p>"#,
        )
        .unwrap();
        push_block(doc.body_mut().unwrap(), p);

        let config = ReplaceConfig::from_pairs(&["甲方=委托方"]).unwrap();
        assert_eq!(replace_text(&mut doc, &config).unwrap().total(), 1);
        let p = doc.paragraphs().unwrap()[0];
        assert_eq!(text_of(p), "委托方签字");
        assert_eq!(p.find("w:drawing").unwrap().text(), "甲方");
    }

    #[test]
    fn test_replacement_containing_search_text() {
        let mut doc = doc_with_runs(&[&["a-b"]]);
        let config = ReplaceConfig::from_pairs(&["a=aa"]).unwrap();
        assert_eq!(replace_text(&mut doc, &config).unwrap().total(), 1);
        assert_eq!(text_of(doc.paragraphs().unwrap()[0]), "aa-b");
    }

    #[test]
    fn test_invalid_pairs() {
        assert!(ReplaceConfig::from_pairs(&["no separator"]).is_err());
        let mut doc = doc_with_runs(&[&["x"]]);
        let config = ReplaceConfig::from_pairs(&["=y"]).unwrap();
        assert!(matches!(replace_text(&mut doc, &config), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_from_toml() {
        let config: ReplaceConfig = toml::from_str(
            "[[replacements]]\nold = \"旧\"\nnew = \"新\"\n\n[[replacements]]\nold = \"A\"\nnew = \"\"\n",
        )
        .unwrap();
        assert_eq!(config.replacements.len(), 2);
        assert_eq!(config.replacements[1].new, "");
    }
}

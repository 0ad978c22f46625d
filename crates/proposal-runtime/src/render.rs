//! Output document rendering.
//!
//! The builder writes one file per proposal, named `proposal_{uuid}.{ext}`,
//! into the output folder and returns that file name as the artifact id.

use std::fmt::Write as _;
use std::path::Path;

use proposal_core::Result;
use proposal_ingest::Locale;
use tracing::info;

use crate::provenance::SourcesMap;
use crate::types::{FinanceItem, ProposalDocument, SectionKey};

/// Renders a proposal into an output artifact.
pub trait DocumentBuilder: Send + Sync {
    /// Write the artifact and return its file name.
    fn build(
        &self,
        document: &ProposalDocument,
        sources: &SourcesMap,
        locale: Locale,
        output_dir: &Path,
    ) -> Result<String>;
}

/// Localized labels for one output language.
struct Labels {
    title: &'static str,
    sources: &'static str,
    columns: [&'static str; 5],
    grand_total: &'static str,
}

const EN: Labels = Labels {
    title: "Proposal",
    sources: "Resources & References",
    columns: ["Item", "UOM", "Qty", "Unit Price", "Total"],
    grand_total: "Grand Total",
};

const AR: Labels = Labels {
    title: "العرض",
    sources: "المصادر والمراجع",
    columns: ["البند", "الوحدة", "الكمية", "سعر الوحدة", "الإجمالي"],
    grand_total: "الإجمالي الكلي",
};

fn labels(locale: Locale) -> &'static Labels {
    match locale {
        Locale::En => &EN,
        Locale::Ar => &AR,
    }
}

pub fn section_title(key: SectionKey, locale: Locale) -> &'static str {
    match (locale, key) {
        (Locale::En, SectionKey::ExecutiveSummary) => "Executive Summary",
        (Locale::En, SectionKey::Scope) => "Scope of Work",
        (Locale::En, SectionKey::TechnicalProposal) => "Technical Proposal",
        (Locale::En, SectionKey::Timeline) => "Timeline",
        (Locale::En, SectionKey::Assumptions) => "Assumptions",
        (Locale::En, SectionKey::Team) => "Team",
        (Locale::En, SectionKey::Quality) => "Quality",
        (Locale::En, SectionKey::FinancialProposal) => "Financial Proposal",
        (Locale::Ar, SectionKey::ExecutiveSummary) => "الملخص التنفيذي",
        (Locale::Ar, SectionKey::Scope) => "نطاق العمل",
        (Locale::Ar, SectionKey::TechnicalProposal) => "الخطة الفنية",
        (Locale::Ar, SectionKey::Timeline) => "الجدول الزمني",
        (Locale::Ar, SectionKey::Assumptions) => "الافتراضات",
        (Locale::Ar, SectionKey::Team) => "الفريق",
        (Locale::Ar, SectionKey::Quality) => "الجودة",
        (Locale::Ar, SectionKey::FinancialProposal) => "الاقتراح المالي",
    }
}

/// Sum of the `Total` column.
pub fn grand_total(items: &[FinanceItem]) -> f64 {
    items.iter().map(|item| item.total).sum()
}

/// Writes proposals as Markdown (`proposal_{uuid}.md`).
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownBuilder;

impl MarkdownBuilder {
    /// Render the Markdown body without touching the filesystem.
    pub fn render(&self, document: &ProposalDocument, sources: &SourcesMap, locale: Locale) -> String {
        let labels = labels(locale);
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", labels.title);

        for key in SectionKey::PROSE {
            let text = document.prose(key).unwrap_or_default().trim();
            if text.is_empty() {
                continue;
            }
            let _ = writeln!(out, "## {}\n\n{}\n", section_title(key, locale), text);
        }

        let items = &document.financial_proposal;
        if !items.is_empty() {
            let _ = writeln!(
                out,
                "## {}\n",
                section_title(SectionKey::FinancialProposal, locale)
            );
            let _ = writeln!(out, "| {} |", labels.columns.join(" | "));
            out.push_str("|---|---|---|---|---|\n");
            for item in items {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {} |",
                    cell(&item.item),
                    cell(&item.uom),
                    item.qty,
                    item.unit_price,
                    item.total
                );
            }
            let _ = writeln!(
                out,
                "| **{}** | | | | **{}** |\n",
                labels.grand_total,
                grand_total(items)
            );
        }

        if !sources.is_empty() {
            let _ = writeln!(out, "## {}\n", labels.sources);
            for (key, citations) in sources {
                let _ = writeln!(out, "### {}\n", section_title(*key, locale));
                for citation in citations {
                    let _ = writeln!(out, "- {}", citation);
                }
                out.push('\n');
            }
        }

        out
    }
}

impl DocumentBuilder for MarkdownBuilder {
    fn build(
        &self,
        document: &ProposalDocument,
        sources: &SourcesMap,
        locale: Locale,
        output_dir: &Path,
    ) -> Result<String> {
        std::fs::create_dir_all(output_dir)?;
        let file_name = format!("proposal_{}.md", uuid::Uuid::new_v4().simple());
        let path = output_dir.join(&file_name);
        std::fs::write(&path, self.render(document, sources, locale))?;
        info!("Proposal written to {}", path.display());
        Ok(file_name)
    }
}

/// Keep a value on one table row.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FALLBACK_SOURCE;

    fn item(name: &str, total: f64) -> FinanceItem {
        FinanceItem {
            item: name.into(),
            uom: "LS".into(),
            qty: 1.0,
            unit_price: total,
            total,
        }
    }

    fn sample() -> (ProposalDocument, SourcesMap) {
        let doc = ProposalDocument {
            executive_summary: "We will deliver.".into(),
            scope: "   ".into(),
            financial_proposal: vec![item("Design", 10.0), item("Build | test", 20.5), item("QA", 5.0)],
            ..ProposalDocument::default()
        };
        let mut sources = SourcesMap::new();
        sources.insert(SectionKey::ExecutiveSummary, vec!["a.txt".into()]);
        sources.insert(SectionKey::FinancialProposal, vec![FALLBACK_SOURCE.into()]);
        (doc, sources)
    }

    #[test]
    fn test_grand_total() {
        let items = vec![item("a", 10.0), item("b", 20.5), item("c", 5.0)];
        assert_eq!(grand_total(&items), 35.5);
        assert_eq!(grand_total(&[]), 0.0);
    }

    #[test]
    fn test_render_english() {
        let (doc, sources) = sample();
        let md = MarkdownBuilder.render(&doc, &sources, Locale::En);

        assert!(md.starts_with("# Proposal\n"));
        assert!(md.contains("## Executive Summary\n\nWe will deliver."));
        assert!(!md.contains("Scope of Work"));
        assert!(md.contains("| Item | UOM | Qty | Unit Price | Total |"));
        assert!(md.contains("| Build \\| test | LS | 1 | 20.5 | 20.5 |"));
        assert!(md.contains("| **Grand Total** | | | | **35.5** |"));
        assert!(md.contains("## Resources & References\n\n### Executive Summary\n\n- a.txt"));
        assert!(md.contains("### Financial Proposal\n\n- LLM (Internal Knowledge)"));
        assert!(!md.contains("### Team"));
    }

    #[test]
    fn test_render_arabic() {
        let (doc, sources) = sample();
        let md = MarkdownBuilder.render(&doc, &sources, Locale::Ar);

        assert!(md.contains("## الملخص التنفيذي"));
        assert!(md.contains("| البند | الوحدة | الكمية | سعر الوحدة | الإجمالي |"));
        assert!(md.contains("الإجمالي الكلي"));
        assert!(md.contains("## المصادر والمراجع"));
    }

    #[test]
    fn test_empty_sections_omitted() {
        let md = MarkdownBuilder.render(&ProposalDocument::default(), &SourcesMap::new(), Locale::En);
        assert_eq!(md, "# Proposal\n\n");
    }

    #[test]
    fn test_build_writes_unique_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("Proposals");
        let (doc, sources) = sample();

        let first = MarkdownBuilder.build(&doc, &sources, Locale::En, &out).unwrap();
        let second = MarkdownBuilder.build(&doc, &sources, Locale::En, &out).unwrap();

        assert_ne!(first, second);
        assert!(first.starts_with("proposal_") && first.ends_with(".md"));
        let written = std::fs::read_to_string(out.join(&first)).unwrap();
        assert!(written.contains("We will deliver."));
    }
}

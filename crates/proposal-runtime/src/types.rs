//! Proposal document types.
//!
//! Field names on the wire are the JSON keys the model is asked to produce
//! (`ExecutiveSummary`, `FinancialProposal`, ...). Deserialization repairs the
//! common near-misses: numeric strings, single-string citation lists, absent
//! keys. Anything else is a schema violation.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Citation used when a section is not grounded in a retrieved document.
pub const FALLBACK_SOURCE: &str = "LLM (Internal Knowledge)";

/// Proposal sections, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SectionKey {
    ExecutiveSummary,
    Scope,
    TechnicalProposal,
    Timeline,
    Assumptions,
    Team,
    Quality,
    FinancialProposal,
}

impl SectionKey {
    pub const ALL: [SectionKey; 8] = [
        Self::ExecutiveSummary,
        Self::Scope,
        Self::TechnicalProposal,
        Self::Timeline,
        Self::Assumptions,
        Self::Team,
        Self::Quality,
        Self::FinancialProposal,
    ];

    /// Every section except `FinancialProposal`.
    pub const PROSE: [SectionKey; 7] = [
        Self::ExecutiveSummary,
        Self::Scope,
        Self::TechnicalProposal,
        Self::Timeline,
        Self::Assumptions,
        Self::Team,
        Self::Quality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExecutiveSummary => "ExecutiveSummary",
            Self::Scope => "Scope",
            Self::TechnicalProposal => "TechnicalProposal",
            Self::Timeline => "Timeline",
            Self::Assumptions => "Assumptions",
            Self::Team => "Team",
            Self::Quality => "Quality",
            Self::FinancialProposal => "FinancialProposal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    pub fn is_prose(&self) -> bool {
        !matches!(self, Self::FinancialProposal)
    }
}

impl std::fmt::Display for SectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the financial proposal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinanceItem {
    #[serde(rename = "Item", default, deserialize_with = "lenient_text")]
    pub item: String,
    #[serde(rename = "UOM", default, deserialize_with = "lenient_text")]
    pub uom: String,
    #[serde(rename = "Qty", default, deserialize_with = "lenient_number")]
    pub qty: f64,
    #[serde(rename = "UnitPrice", default, deserialize_with = "lenient_number")]
    pub unit_price: f64,
    #[serde(rename = "Total", default, deserialize_with = "lenient_number")]
    pub total: f64,
}

/// Raw citation lists keyed by section name, as the model returned them.
pub type RawSources = BTreeMap<String, Vec<String>>;

/// The structured proposal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalDocument {
    #[serde(rename = "ExecutiveSummary", default, deserialize_with = "lenient_prose")]
    pub executive_summary: String,
    #[serde(rename = "Scope", default, deserialize_with = "lenient_prose")]
    pub scope: String,
    #[serde(rename = "TechnicalProposal", default, deserialize_with = "lenient_prose")]
    pub technical_proposal: String,
    #[serde(rename = "Timeline", default, deserialize_with = "lenient_prose")]
    pub timeline: String,
    #[serde(rename = "Assumptions", default, deserialize_with = "lenient_prose")]
    pub assumptions: String,
    #[serde(rename = "Team", default, deserialize_with = "lenient_prose")]
    pub team: String,
    #[serde(rename = "Quality", default, deserialize_with = "lenient_prose")]
    pub quality: String,
    #[serde(rename = "FinancialProposal", default, deserialize_with = "lenient_items")]
    pub financial_proposal: Vec<FinanceItem>,
    /// `None` when the model omitted the key.
    #[serde(
        rename = "Sources",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_sources"
    )]
    pub sources: Option<RawSources>,
}

impl ProposalDocument {
    /// Text of a prose section. `None` for `FinancialProposal`.
    pub fn prose(&self, key: SectionKey) -> Option<&str> {
        let text = match key {
            SectionKey::ExecutiveSummary => &self.executive_summary,
            SectionKey::Scope => &self.scope,
            SectionKey::TechnicalProposal => &self.technical_proposal,
            SectionKey::Timeline => &self.timeline,
            SectionKey::Assumptions => &self.assumptions,
            SectionKey::Team => &self.team,
            SectionKey::Quality => &self.quality,
            SectionKey::FinancialProposal => return None,
        };
        Some(text)
    }

    /// The document used when the model response could not be parsed:
    /// the raw text as executive summary, attributed to the fallback source.
    pub fn degraded(raw_text: &str) -> Self {
        let mut sources = RawSources::new();
        sources.insert(
            SectionKey::ExecutiveSummary.as_str().to_string(),
            vec![FALLBACK_SOURCE.to_string()],
        );
        Self {
            executive_summary: raw_text.to_string(),
            sources: Some(sources),
            ..Self::default()
        }
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected text, got {}", other))),
    }
}

/// Numbers, numeric strings (`"1,250.00"`) or null.
fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(0.0),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom(format!("number out of range: {}", n))),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
            if cleaned.is_empty() {
                return Ok(0.0);
            }
            cleaned
                .parse::<f64>()
                .map_err(|_| D::Error::custom(format!("not a number: {:?}", s)))
        }
        other => Err(D::Error::custom(format!("expected number, got {}", other))),
    }
}

/// A string, null, or a list of strings joined by newlines.
fn lenient_prose<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Array(items) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                other => Err(D::Error::custom(format!("expected text, got {}", other))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|lines| lines.join("\n")),
        other => Err(D::Error::custom(format!("expected text, got {}", other))),
    }
}

fn lenient_items<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<FinanceItem>, D::Error> {
    Option::<Vec<FinanceItem>>::deserialize(d).map(Option::unwrap_or_default)
}

/// Citation map whose values may be a list, a single string, or null.
fn lenient_sources<'de, D: Deserializer<'de>>(d: D) -> Result<Option<RawSources>, D::Error> {
    let Some(map) = Option::<BTreeMap<String, Value>>::deserialize(d)? else {
        return Ok(None);
    };

    let mut sources = RawSources::new();
    for (section, value) in map {
        let citations = match value {
            Value::Null => Vec::new(),
            Value::String(s) => vec![s],
            Value::Array(items) => items
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s),
                    other => Err(D::Error::custom(format!("expected citation, got {}", other))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                return Err(D::Error::custom(format!(
                    "expected citation list for {}, got {}",
                    section, other
                )))
            }
        };
        sources.insert(section, citations);
    }
    Ok(Some(sources))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_names_round_trip() {
        for key in SectionKey::ALL {
            assert_eq!(SectionKey::from_name(key.as_str()), Some(key));
        }
        assert_eq!(SectionKey::from_name("Sources"), None);
        assert_eq!(SectionKey::PROSE.len(), 7);
        assert!(!SectionKey::FinancialProposal.is_prose());
        assert!(SectionKey::ExecutiveSummary < SectionKey::FinancialProposal);
    }

    #[test]
    fn test_finance_item_repairs_numbers() {
        let item: FinanceItem = serde_json::from_str(
            r#"{"Item": "Survey", "UOM": "LS", "Qty": "2", "UnitPrice": "1,250.50", "Total": 2501}"#,
        )
        .unwrap();
        assert_eq!(item.qty, 2.0);
        assert_eq!(item.unit_price, 1250.5);
        assert_eq!(item.total, 2501.0);

        let sparse: FinanceItem = serde_json::from_str(r#"{"Item": "Travel"}"#).unwrap();
        assert_eq!(sparse.uom, "");
        assert_eq!(sparse.total, 0.0);

        assert!(serde_json::from_str::<FinanceItem>(r#"{"Total": "lots"}"#).is_err());
        assert!(serde_json::from_str::<FinanceItem>(r#"{"Total": [1]}"#).is_err());
    }

    #[test]
    fn test_document_defaults_and_sources() {
        let doc: ProposalDocument = serde_json::from_str(
            r#"{"ExecutiveSummary": "Summary", "Timeline": ["Week 1", "Week 2"],
                "Sources": {"ExecutiveSummary": "a.txt", "Scope": null}}"#,
        )
        .unwrap();
        assert_eq!(doc.executive_summary, "Summary");
        assert_eq!(doc.timeline, "Week 1\nWeek 2");
        assert_eq!(doc.scope, "");
        assert!(doc.financial_proposal.is_empty());

        let sources = doc.sources.unwrap();
        assert_eq!(sources["ExecutiveSummary"], vec!["a.txt"]);
        assert!(sources["Scope"].is_empty());
    }

    #[test]
    fn test_missing_sources_is_none() {
        let doc: ProposalDocument = serde_json::from_str(r#"{"Scope": "x"}"#).unwrap();
        assert!(doc.sources.is_none());
        assert_eq!(doc.prose(SectionKey::Scope), Some("x"));
        assert_eq!(doc.prose(SectionKey::FinancialProposal), None);
    }

    #[test]
    fn test_wrong_types_rejected() {
        assert!(serde_json::from_str::<ProposalDocument>(r#"{"Scope": 42}"#).is_err());
        assert!(serde_json::from_str::<ProposalDocument>(r#"{"FinancialProposal": "none"}"#).is_err());
        assert!(serde_json::from_str::<ProposalDocument>(r#"{"Sources": ["a.txt"]}"#).is_err());
    }

    #[test]
    fn test_degraded_document() {
        let doc = ProposalDocument::degraded("not json at all");
        assert_eq!(doc.executive_summary, "not json at all");
        assert!(SectionKey::PROSE[1..].iter().all(|k| doc.prose(*k) == Some("")));
        assert!(doc.financial_proposal.is_empty());
        assert_eq!(
            doc.sources.unwrap()["ExecutiveSummary"],
            vec![FALLBACK_SOURCE.to_string()]
        );
    }
}

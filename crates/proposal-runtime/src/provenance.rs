//! Provenance assembly: the final Sources map of a proposal.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::types::{ProposalDocument, SectionKey, FALLBACK_SOURCE};

/// Section → sorted, deduplicated citations. Sections without citations are absent.
pub type SourcesMap = BTreeMap<SectionKey, Vec<String>>;

/// Normalizes the citation lists a model attached to a proposal.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceAssembler {
    /// When set, citations outside this set become the fallback marker.
    allowed: Option<BTreeSet<String>>,
}

impl ProvenanceAssembler {
    /// Only retrieved document ids and the fallback marker survive.
    pub fn strict(allowed: BTreeSet<String>) -> Self {
        Self {
            allowed: Some(allowed),
        }
    }

    /// Citations are kept as the model wrote them.
    pub fn permissive() -> Self {
        Self { allowed: None }
    }

    pub fn assemble(&self, document: &ProposalDocument) -> SourcesMap {
        let mut assembled = SourcesMap::new();
        let Some(raw) = document.sources.as_ref() else {
            return assembled;
        };

        for name in raw.keys() {
            if SectionKey::from_name(name).is_none() {
                debug!("Ignoring citations for unknown section {:?}", name);
            }
        }

        for key in SectionKey::ALL {
            let Some(citations) = raw.get(key.as_str()) else {
                continue;
            };

            let unique: BTreeSet<String> = citations
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(|c| self.admit(key, c))
                .collect();

            if !unique.is_empty() {
                assembled.insert(key, unique.into_iter().collect());
            }
        }
        assembled
    }

    fn admit(&self, key: SectionKey, citation: &str) -> String {
        match &self.allowed {
            Some(allowed) if citation != FALLBACK_SOURCE && !allowed.contains(citation) => {
                warn!(
                    "{} cites {:?}, which was not retrieved; attributing to {}",
                    key, citation, FALLBACK_SOURCE
                );
                FALLBACK_SOURCE.to_string()
            }
            _ => citation.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawSources;

    fn document(sources: Vec<(&str, Vec<&str>)>) -> ProposalDocument {
        let raw: RawSources = sources
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
            .collect();
        ProposalDocument {
            sources: Some(raw),
            ..ProposalDocument::default()
        }
    }

    #[test]
    fn test_dedup_and_sort() {
        let doc = document(vec![("Scope", vec!["b", "a", "a"]), ("Team", vec![])]);
        let map = ProvenanceAssembler::permissive().assemble(&doc);

        assert_eq!(map[&SectionKey::Scope], vec!["a", "b"]);
        assert!(!map.contains_key(&SectionKey::Team));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_canonical_order_and_unknown_sections() {
        let doc = document(vec![
            ("Quality", vec!["q.txt"]),
            ("FinancialProposal", vec!["f.txt"]),
            ("ExecutiveSummary", vec!["e.txt"]),
            ("Appendix", vec!["x.txt"]),
        ]);
        let map = ProvenanceAssembler::permissive().assemble(&doc);
        let keys: Vec<SectionKey> = map.keys().copied().collect();
        assert_eq!(
            keys,
            vec![
                SectionKey::ExecutiveSummary,
                SectionKey::Quality,
                SectionKey::FinancialProposal
            ]
        );
    }

    #[test]
    fn test_strict_mode_replaces_unretrieved_citations() {
        let doc = document(vec![
            ("Scope", vec!["a.txt", "invented.pdf", FALLBACK_SOURCE]),
            ("Team", vec!["made-up.docx"]),
        ]);
        let allowed: BTreeSet<String> = ["a.txt".to_string()].into_iter().collect();
        let map = ProvenanceAssembler::strict(allowed).assemble(&doc);

        assert_eq!(map[&SectionKey::Scope], vec![FALLBACK_SOURCE, "a.txt"]);
        assert_eq!(map[&SectionKey::Team], vec![FALLBACK_SOURCE]);
    }

    #[test]
    fn test_no_sources_yields_empty_map() {
        let doc = ProposalDocument::default();
        assert!(ProvenanceAssembler::permissive().assemble(&doc).is_empty());
    }
}

//! Proposal prompt construction.

use std::collections::BTreeSet;

use proposal_ingest::Locale;

use crate::types::FALLBACK_SOURCE;

fn language_name(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "English",
        Locale::Ar => "Arabic",
    }
}

/// Build the single generation prompt.
///
/// The model is asked for a JSON object with the eight section keys plus
/// `Sources`, citing only `allowed_sources` or the fallback marker.
pub fn build_prompt(
    context: &str,
    brief: &str,
    locale: Locale,
    allowed_sources: &BTreeSet<String>,
) -> String {
    let allowed = serde_json::to_string(allowed_sources).unwrap_or_else(|_| "[]".into());

    format!(
        r#"You are a professional proposal writer. Generate a complete professional proposal in {language} language.
Include the following sections:

1. Executive Summary
2. Scope of Work
3. Technical Proposal
4. Timeline
5. Assumptions
6. Team
7. Quality
8. Financial Proposal

Return strictly as JSON (no markdown, no code fences) in this format:

{{
"ExecutiveSummary": "...",
"Scope": "...",
"TechnicalProposal": "...",
"Timeline": "...",
"Assumptions": "...",
"Team": "...",
"Quality": "...",
"FinancialProposal": [
    {{"Item": "...", "UOM": "...", "Qty": 1, "UnitPrice": 0, "Total": 0}}
],
"Sources": {{
    "ExecutiveSummary": ["source1", "source2"],
    "Scope": ["source1", "source3"],
    ...
    "FinancialProposal": ["source5"]
}}
}}

The sources must be either one of the following:
{allowed}
or '{fallback}' if the information is not from the provided documents.

Client Brief:
{brief}

Reference Documents:
{context}
"#,
        language = language_name(locale),
        allowed = allowed,
        fallback = FALLBACK_SOURCE,
        brief = brief,
        context = context,
    )
}

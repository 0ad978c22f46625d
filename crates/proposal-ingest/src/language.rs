//! Coarse language detection: Arabic or English.
//!
//! Only two output locales exist because the document builder only carries
//! English and Arabic templates. Anything that is not confidently Arabic
//! falls back to English, and the fallback is reported explicitly.

use serde::{Deserialize, Serialize};
use whatlang::Lang;

/// Characters sampled from the head of the text.
const SAMPLE_CHARS: usize = 4096;

/// Output locale of a generated proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Ar,
}

impl Locale {
    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ar => "ar",
        }
    }
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Why detection fell back to English.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultReason {
    /// Nothing but whitespace to look at.
    EmptyInput,
    /// The detector could not decide.
    Undetermined,
    /// A language other than English or Arabic (ISO 639-3 code).
    Unsupported(String),
}

/// Result of language detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageDetection {
    Detected(Locale),
    Defaulted { reason: DefaultReason },
}

impl LanguageDetection {
    /// The locale to render with. Defaults collapse to English.
    pub fn locale(&self) -> Locale {
        match self {
            Self::Detected(locale) => *locale,
            Self::Defaulted { .. } => Locale::En,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Self::Defaulted { .. })
    }
}

pub fn detect_language(text: &str) -> LanguageDetection {
    let text = text.trim();
    if text.is_empty() {
        return LanguageDetection::Defaulted {
            reason: DefaultReason::EmptyInput,
        };
    }

    let sample = match text.char_indices().nth(SAMPLE_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    };

    match whatlang::detect(sample) {
        Some(info) if info.lang() == Lang::Ara => LanguageDetection::Detected(Locale::Ar),
        Some(info) if info.lang() == Lang::Eng => LanguageDetection::Detected(Locale::En),
        Some(info) => LanguageDetection::Defaulted {
            reason: DefaultReason::Unsupported(info.lang().code().to_string()),
        },
        None => LanguageDetection::Defaulted {
            reason: DefaultReason::Undetermined,
        },
    }
}

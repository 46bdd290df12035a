use tracing::{debug, warn};

use crate::services::companion::Language;

/// Detects which supported language a message is written in
#[cfg_attr(test, mockall::automock)]
pub trait LanguageDetector: Send + Sync {
    /// `fallback` is returned whenever the text does not settle the question
    fn detect(&self, text: &str, fallback: Language) -> Language;
}

/// Texts shorter than this (in chars, trimmed) are not worth detecting
const MIN_DETECTABLE_CHARS: usize = 3;

/// `whatlang` backed detector. Short text, unreliable guesses and
/// languages outside the supported set all resolve to the caller's fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangDetector;

impl WhatlangDetector {
    pub fn new() -> Self {
        Self
    }

    /// whatlang reports ISO 639-3 codes
    fn map_code(iso639_3: &str) -> Option<Language> {
        let code = match iso639_3 {
            "eng" => "en",
            "deu" => "de",
            "spa" => "es",
            "fra" => "fr",
            "ita" => "it",
            "por" => "pt",
            "rus" => "ru",
            "jpn" => "ja",
            "kor" => "ko",
            "cmn" => "zh",
            "arb" => "ar",
            "hin" => "hi",
            "nld" => "nl",
            "swe" => "sv",
            "nob" => "no",
            "dan" => "da",
            "fin" => "fi",
            "pol" => "pl",
            "tur" => "tr",
            "heb" => "he",
            _ => return None,
        };
        Language::from_code(code)
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str, fallback: Language) -> Language {
        let trimmed = text.trim();
        if trimmed.chars().count() < MIN_DETECTABLE_CHARS {
            return fallback;
        }

        let Some(info) = whatlang::detect(trimmed) else {
            warn!("Language detection gave no result, keeping {}", fallback);
            return fallback;
        };

        if !info.is_reliable() {
            debug!(
                "Unreliable guess {} (confidence {:.2}), keeping {}",
                info.lang().code(),
                info.confidence(),
                fallback
            );
            return fallback;
        }

        match Self::map_code(info.lang().code()) {
            Some(language) => {
                debug!(
                    "Detected language {} (confidence {:.2})",
                    language,
                    info.confidence()
                );
                language
            }
            None => {
                warn!(
                    "Detected language {} is not supported, keeping {}",
                    info.lang().code(),
                    fallback
                );
                fallback
            }
        }
    }
}

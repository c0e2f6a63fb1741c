use crate::language_utils::get_language_name;

/// Default system prompt. `{source_language}` and `{target_language}` are
/// replaced with English language names.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional translator for video dubbing. \
Translate the user's text from {source_language} to {target_language}. \
The translation will be spoken aloud in the same time slot as the original, so keep it \
about as long as the source. Reply with the translation only, without quotes, notes or explanations.";

/// Prompt text shared by the LLM translators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationPrompt {
    system_template: String,
}

impl Default for TranslationPrompt {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl TranslationPrompt {
    pub fn new(system_template: impl Into<String>) -> Self {
        Self {
            system_template: system_template.into(),
        }
    }

    /// System message for a language pair. An unknown source language is
    /// left for the model to detect.
    pub fn system_message(&self, source_language: Option<&str>, target_language: &str) -> String {
        let source = source_language
            .and_then(|code| get_language_name(code).ok())
            .unwrap_or_else(|| "the detected source language".to_string());
        let target = get_language_name(target_language).unwrap_or_else(|_| target_language.to_string());

        self.system_template
            .replace("{source_language}", &source)
            .replace("{target_language}", &target)
    }

    pub fn user_message(&self, text: &str) -> String {
        text.trim().to_string()
    }

    /// Strip the wrapping models like to add around a bare translation
    pub fn clean_response(response: &str) -> String {
        let mut text = response.trim();

        for prefix in ["Translation:", "translation:", "Translated text:"] {
            if let Some(rest) = text.strip_prefix(prefix) {
                text = rest.trim_start();
            }
        }

        for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\'', '\''), ('«', '»')] {
            if text.chars().count() >= 2 && text.starts_with(open) && text.ends_with(close) {
                let inner = &text[open.len_utf8()..text.len() - close.len_utf8()];
                if !inner.contains(open) {
                    text = inner.trim();
                }
                break;
            }
        }

        text.to_string()
    }
}

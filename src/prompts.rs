// Prompt strings for the language-model backends.

use std::fs;

use tracing::warn;

use crate::models::{Language, Length, Tone};

pub const DEFAULT_PREAMBLE: &str =
    "You are Lexi, a helpful writing assistant that provides clear, concise suggestions.";

/// Prompt builders sharing one preamble. The preamble can be replaced by the
/// contents of a user file.
#[derive(Clone, Debug)]
pub struct Prompts {
    preamble: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            preamble: DEFAULT_PREAMBLE.to_string(),
        }
    }
}

impl Prompts {
    /// Loads the preamble from `path` (`~` and env vars expanded), falling
    /// back to the built-in one when the file is missing or empty.
    pub fn load(path: Option<&str>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        let expanded = match shellexpand::full(path) {
            Ok(p) => p.into_owned(),
            Err(e) => {
                warn!(path, error = %e, "could not expand prompt path");
                return Self::default();
            }
        };
        match fs::read_to_string(&expanded) {
            Ok(text) if !text.trim().is_empty() => Self {
                preamble: text.trim().to_string(),
            },
            Ok(_) => Self::default(),
            Err(e) => {
                warn!(path = %expanded, error = %e, "could not read prompt file");
                Self::default()
            }
        }
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    pub fn grammar(&self, text: &str) -> String {
        format!(
            r#"{preamble}

Fix grammar, spelling, and punctuation errors in the text below.
- Keep the meaning, wording and language of the original wherever it is already correct.
- Reply with the corrected text only, no explanations, no quotes.

Text:
{text}"#,
            preamble = self.preamble,
            text = text
        )
    }

    pub fn tone(&self, text: &str, tone: Tone) -> String {
        let style = match tone {
            Tone::Professional => "more professional: formal, polite, precise",
            Tone::Casual => "more casual: friendly, relaxed, conversational",
        };
        format!(
            r#"{preamble}

Rewrite the text below to sound {style}.
- Keep the language of the original.
- Reply with the rewritten text only.

Text:
{text}"#,
            preamble = self.preamble,
            style = style,
            text = text
        )
    }

    pub fn translate(&self, text: &str, source: Option<Language>, target: Language) -> String {
        let from = source
            .map(|l| format!(" from {}", l.name()))
            .unwrap_or_default();
        format!(
            r#"{preamble}

Translate the text below{from} to {target}.
- Preserve formatting and line breaks.
- Reply with the translation only.

Text:
{text}"#,
            preamble = self.preamble,
            from = from,
            target = target.name(),
            text = text
        )
    }

    pub fn generate(&self, prompt: &str, tone: Tone, length: Length) -> String {
        let size = match length {
            Length::Short => "one or two sentences",
            Length::Medium => "one paragraph",
            Length::Long => "three to four paragraphs",
        };
        format!(
            r#"{preamble}

Write text for the following request in a {tone} tone, {size} long.
- Reply with the text only, ready to paste.

Request:
{prompt}"#,
            preamble = self.preamble,
            tone = tone.as_str(),
            size = size,
            prompt = prompt
        )
    }

    pub fn detect_language(&self, text: &str) -> String {
        let codes: Vec<&str> = Language::ALL.iter().map(|l| l.code()).collect();
        format!(
            "Which language is the following text written in? Answer with exactly one of these ISO codes: {}.\n\nText:\n{}",
            codes.join(", "),
            text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_default() {
        let prompts = Prompts::load(Some("/definitely/not/here.txt"));
        assert_eq!(prompts.preamble(), DEFAULT_PREAMBLE);
    }

    #[test]
    fn custom_preamble_is_used() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "You edit for a newspaper.").unwrap();
        let prompts = Prompts::load(file.path().to_str());
        assert!(prompts.grammar("teh cat").starts_with("You edit for a newspaper."));
    }

    #[test]
    fn translation_mentions_both_languages() {
        let p = Prompts::default().translate("hola", Some(Language::Es), Language::De);
        assert!(p.contains("from Spanish to German"));
    }
}

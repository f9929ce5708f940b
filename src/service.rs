use std::time::Duration;

use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::models::{Language, Length, Tone};

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("backend error: {0}")]
    Backend(String),
    #[error("the backend returned no text")]
    EmptyResponse,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub type TransformResult<T> = Result<T, TransformError>;

/// Backend that performs the actual text transformations. Every call is
/// asynchronous and may fail.
pub trait TextTransformService: Send + Sync {
    fn grammar_check<'a>(&'a self, text: &'a str) -> BoxFuture<'a, TransformResult<String>>;

    fn change_tone<'a>(&'a self, text: &'a str, tone: Tone) -> BoxFuture<'a, TransformResult<String>>;

    fn translate<'a>(
        &'a self,
        text: &'a str,
        source: Option<Language>,
        target: Language,
    ) -> BoxFuture<'a, TransformResult<String>>;

    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        tone: Tone,
        length: Length,
    ) -> BoxFuture<'a, TransformResult<String>>;

    fn detect_language<'a>(&'a self, text: &'a str) -> BoxFuture<'a, TransformResult<Language>>;
}

#[derive(Clone, Copy, Debug)]
pub struct StubDelays {
    pub transform: Duration,
    pub generate: Duration,
    pub detect: Duration,
}

impl Default for StubDelays {
    fn default() -> Self {
        Self {
            transform: Duration::from_millis(1000),
            generate: Duration::from_millis(2000),
            detect: Duration::from_millis(500),
        }
    }
}

/// Offline backend: waits, then answers with canned text. Never fails.
#[derive(Clone, Debug, Default)]
pub struct StubTransformService {
    delays: StubDelays,
}

static LANGUAGE_HINTS: Lazy<Vec<(Language, Regex)>> = Lazy::new(|| {
    [
        (Language::Es, r"(?i)\b(hola|gracias|el|los|por favor|usted|que)\b"),
        (Language::Fr, r"(?i)\b(bonjour|merci|le|les|vous|est|avec)\b"),
        (Language::De, r"(?i)\b(hallo|danke|und|nicht|ich|ist|mit)\b"),
        (Language::It, r"(?i)\b(ciao|grazie|sono|della|questo)\b"),
        (Language::Pt, r"(?i)\b(olá|obrigado|você|não|muito)\b"),
        (Language::Ja, r"[\p{Hiragana}\p{Katakana}]"),
        (Language::Zh, r"\p{Han}"),
    ]
    .into_iter()
    .filter_map(|(lang, pattern)| Regex::new(pattern).ok().map(|re| (lang, re)))
    .collect()
});

/// Picks the language with the most hint matches, English when nothing hits.
pub fn guess_language(text: &str) -> Language {
    LANGUAGE_HINTS
        .iter()
        .map(|(lang, re)| (*lang, re.find_iter(text).count()))
        .filter(|(_, hits)| *hits > 0)
        .max_by_key(|(_, hits)| *hits)
        .map(|(lang, _)| lang)
        .unwrap_or(Language::En)
}

impl StubDelays {
    pub const fn none() -> Self {
        Self {
            transform: Duration::ZERO,
            generate: Duration::ZERO,
            detect: Duration::ZERO,
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

impl StubTransformService {
    pub fn new(delays: StubDelays) -> Self {
        Self { delays }
    }

    async fn answer(delay: Duration, text: String) -> TransformResult<String> {
        pause(delay).await;
        Ok(text)
    }
}

impl TextTransformService for StubTransformService {
    fn grammar_check<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, TransformResult<String>> {
        Box::pin(Self::answer(
            self.delays.transform,
            "This is a simulated grammar-corrected version of your text.".to_string(),
        ))
    }

    fn change_tone<'a>(&'a self, _text: &'a str, tone: Tone) -> BoxFuture<'a, TransformResult<String>> {
        Box::pin(Self::answer(
            self.delays.transform,
            format!("This is a simulated {} version of your text.", tone.as_str()),
        ))
    }

    fn translate<'a>(
        &'a self,
        _text: &'a str,
        _source: Option<Language>,
        target: Language,
    ) -> BoxFuture<'a, TransformResult<String>> {
        Box::pin(Self::answer(
            self.delays.transform,
            format!("This is a simulated {} translation of your text.", target.name()),
        ))
    }

    fn generate<'a>(
        &'a self,
        _prompt: &'a str,
        tone: Tone,
        length: Length,
    ) -> BoxFuture<'a, TransformResult<String>> {
        Box::pin(Self::answer(
            self.delays.generate,
            format!(
                "This is simulated generated content based on your prompt. It will be {} and written in a {} tone.",
                length.as_str(),
                tone.as_str()
            ),
        ))
    }

    fn detect_language<'a>(&'a self, text: &'a str) -> BoxFuture<'a, TransformResult<Language>> {
        let delay = self.delays.detect;
        Box::pin(async move {
            pause(delay).await;
            Ok(guess_language(text))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_common_languages() {
        assert_eq!(guess_language("hola, gracias por todo"), Language::Es);
        assert_eq!(guess_language("Bonjour, merci beaucoup"), Language::Fr);
        assert_eq!(guess_language("hey john, ur presentation was pretty good"), Language::En);
        assert_eq!(guess_language("こんにちは"), Language::Ja);
    }

    #[tokio::test]
    async fn stub_always_answers() {
        let stub = StubTransformService::new(StubDelays::none());
        let text = stub.grammar_check("hey john").await.unwrap();
        assert!(!text.is_empty());
        let generated = stub.generate("launch announcement", Tone::Professional, Length::Short).await.unwrap();
        assert!(generated.contains("short"));
        assert!(generated.contains("professional"));
        assert_eq!(stub.detect_language("danke und tschüss").await.unwrap(), Language::De);
    }
}

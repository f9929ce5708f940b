//! Language-model backends for [`TextTransformService`].

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Language, Length, Tone};
use crate::prompts::Prompts;
use crate::service::{TextTransformService, TransformError, TransformResult};

/// Something that turns a prompt into a completion.
pub trait Completer: Send + Sync {
    fn complete(&self, prompt: String) -> BoxFuture<'_, TransformResult<String>>;
}

/// Sends the prompt to Gemini and returns the first candidate's text.
pub struct GeminiCompleter {
    model: String,
}

impl GeminiCompleter {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

impl Completer for GeminiCompleter {
    fn complete(&self, prompt: String) -> BoxFuture<'_, TransformResult<String>> {
        Box::pin(async move {
            let response = gemini_rs::chat(self.model.as_str())
                .send_message(&prompt)
                .await
                .map_err(|e| TransformError::Backend(e.to_string()))?;
            response
                .candidates
                .first()
                .and_then(|c| c.content.parts.first())
                .and_then(|p| p.text.as_ref())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or(TransformError::EmptyResponse)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct ChatCompletionsCompleter {
    base_url: String,
    api_key: Option<String>,
    model: String,
    http_client: Client,
}

impl ChatCompletionsCompleter {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            http_client: Client::new(),
        }
    }
}

impl Completer for ChatCompletionsCompleter {
    fn complete(&self, prompt: String) -> BoxFuture<'_, TransformResult<String>> {
        Box::pin(async move {
            let request = ChatRequest {
                model: &self.model,
                messages: vec![ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                }],
                temperature: Some(0.3),
            };
            let url = format!("{}/v1/chat/completions", self.base_url);
            let mut builder = self.http_client.post(&url).json(&request);
            if let Some(key) = &self.api_key {
                builder = builder.bearer_auth(key);
            }
            let response = builder.send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await?;
                return Err(TransformError::Backend(format!("{status}: {error_text}")));
            }
            let body = response.json::<ChatResponse>().await?;
            body.choices
                .into_iter()
                .next()
                .map(|c| c.message.content.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or(TransformError::EmptyResponse)
        })
    }
}

pub type GeminiTransformService = PromptedService<GeminiCompleter>;
pub type ChatCompletionsService = PromptedService<ChatCompletionsCompleter>;

/// Implements every transformation as a prompt sent to a [`Completer`].
pub struct PromptedService<C> {
    completer: C,
    prompts: Prompts,
}

impl<C: Completer> PromptedService<C> {
    pub fn new(completer: C, prompts: Prompts) -> Self {
        Self { completer, prompts }
    }
}

impl<C: Completer> TextTransformService for PromptedService<C> {
    fn grammar_check<'a>(&'a self, text: &'a str) -> BoxFuture<'a, TransformResult<String>> {
        self.completer.complete(self.prompts.grammar(text))
    }

    fn change_tone<'a>(&'a self, text: &'a str, tone: Tone) -> BoxFuture<'a, TransformResult<String>> {
        self.completer.complete(self.prompts.tone(text, tone))
    }

    fn translate<'a>(
        &'a self,
        text: &'a str,
        source: Option<Language>,
        target: Language,
    ) -> BoxFuture<'a, TransformResult<String>> {
        self.completer.complete(self.prompts.translate(text, source, target))
    }

    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        tone: Tone,
        length: Length,
    ) -> BoxFuture<'a, TransformResult<String>> {
        self.completer.complete(self.prompts.generate(prompt, tone, length))
    }

    fn detect_language<'a>(&'a self, text: &'a str) -> BoxFuture<'a, TransformResult<Language>> {
        let prompt = self.prompts.detect_language(text);
        Box::pin(async move {
            let answer = self.completer.complete(prompt).await?;
            let language = answer
                .split(|c: char| !c.is_alphabetic())
                .find_map(Language::from_code)
                .unwrap_or_default();
            debug!(%answer, ?language, "language detected");
            Ok(language)
        })
    }
}

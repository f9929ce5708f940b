//! Runs transformations off the UI loop and hands results back to it.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::models::{ActionKind, ActionRequest, Language, PendingAction};
use crate::overlay::DetectionRequest;
use crate::service::{TextTransformService, TransformResult};

#[derive(Debug)]
pub struct ActionOutcome {
    pub token: u64,
    pub kind: ActionKind,
    pub result: TransformResult<String>,
}

#[derive(Debug)]
pub enum PipelineEvent {
    Completed(ActionOutcome),
    LanguageDetected { ticket: u64, language: Language },
}

pub struct ActionPipeline {
    service: Arc<dyn TextTransformService>,
    runtime: Handle,
    tx: mpsc::UnboundedSender<PipelineEvent>,
    rx: mpsc::UnboundedReceiver<PipelineEvent>,
    inflight: Option<(u64, CancellationToken)>,
    shutdown: CancellationToken,
}

async fn run(service: &dyn TextTransformService, action: &PendingAction) -> TransformResult<String> {
    let text = action.original.as_str();
    match &action.request {
        ActionRequest::GrammarCheck => service.grammar_check(text).await,
        ActionRequest::ChangeTone(tone) => service.change_tone(text, *tone).await,
        ActionRequest::Translate { source, target } => service.translate(text, *source, *target).await,
        ActionRequest::Generate {
            prompt,
            tone,
            length,
        } => service.generate(prompt, *tone, *length).await,
    }
}

impl ActionPipeline {
    pub fn new(service: Arc<dyn TextTransformService>, runtime: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            service,
            runtime,
            tx,
            rx,
            inflight: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Starts `action`. Whatever was still running is cancelled first; only
    /// one transformation is in flight at a time.
    pub fn dispatch(&mut self, action: PendingAction) {
        self.cancel_inflight();
        let cancel = self.shutdown.child_token();
        self.inflight = Some((action.token, cancel.clone()));
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        info!(token = action.token, kind = ?action.request.kind(), "dispatching action");
        self.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(token = action.token, "action cancelled");
                }
                result = run(service.as_ref(), &action) => {
                    let _ = tx.send(PipelineEvent::Completed(ActionOutcome {
                        token: action.token,
                        kind: action.request.kind(),
                        result,
                    }));
                }
            }
        });
    }

    /// Runs source-language detection for an open translation form. Failures
    /// leave the selector as it is.
    pub fn detect_language(&self, request: DetectionRequest) {
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        let cancel = self.shutdown.child_token();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                result = service.detect_language(&request.text) => match result {
                    Ok(language) => {
                        let _ = tx.send(PipelineEvent::LanguageDetected {
                            ticket: request.ticket,
                            language,
                        });
                    }
                    Err(e) => debug!(ticket = request.ticket, error = %e, "language detection failed"),
                },
            }
        });
    }

    pub fn inflight_token(&self) -> Option<u64> {
        self.inflight.as_ref().map(|(token, _)| *token)
    }

    pub fn cancel_inflight(&mut self) {
        if let Some((token, cancel)) = self.inflight.take() {
            debug!(token, "cancelling in-flight action");
            cancel.cancel();
        }
    }

    /// Next finished piece of work, without waiting.
    pub fn try_next(&mut self) -> Option<PipelineEvent> {
        let event = self.rx.try_recv().ok()?;
        if let PipelineEvent::Completed(outcome) = &event {
            if self.inflight_token() == Some(outcome.token) {
                self.inflight = None;
            }
        }
        Some(event)
    }

    /// Waits for the next finished piece of work.
    pub async fn next(&mut self) -> Option<PipelineEvent> {
        let event = self.rx.recv().await?;
        if let PipelineEvent::Completed(outcome) = &event {
            if self.inflight_token() == Some(outcome.token) {
                self.inflight = None;
            }
        }
        Some(event)
    }

    /// Cancels everything this pipeline started.
    pub fn shutdown(&mut self) {
        self.inflight = None;
        self.shutdown.cancel();
    }
}

impl Drop for ActionPipeline {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Length, Tone};
    use crate::service::{StubDelays, StubTransformService, TransformError};
    use futures::future::BoxFuture;
    use std::time::Duration;

    fn action(token: u64, request: ActionRequest) -> PendingAction {
        PendingAction {
            token,
            request,
            original: "hey john".to_string(),
        }
    }

    #[tokio::test]
    async fn completed_action_comes_back_with_its_token() {
        let stub = Arc::new(StubTransformService::new(StubDelays::none()));
        let mut pipeline = ActionPipeline::new(stub, Handle::current());
        pipeline.dispatch(action(3, ActionRequest::ChangeTone(Tone::Casual)));
        match pipeline.next().await {
            Some(PipelineEvent::Completed(outcome)) => {
                assert_eq!(outcome.token, 3);
                assert_eq!(outcome.kind, ActionKind::ChangeTone);
                assert!(outcome.result.unwrap().contains("casual"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(pipeline.inflight_token(), None);
    }

    #[tokio::test]
    async fn newer_dispatch_cancels_the_older_one() {
        let slow = StubDelays {
            transform: Duration::from_secs(30),
            generate: Duration::ZERO,
            detect: Duration::ZERO,
        };
        let mut pipeline = ActionPipeline::new(Arc::new(StubTransformService::new(slow)), Handle::current());
        pipeline.dispatch(action(1, ActionRequest::GrammarCheck));
        pipeline.dispatch(action(
            2,
            ActionRequest::Generate {
                prompt: "launch announcement".into(),
                tone: Tone::Professional,
                length: Length::Short,
            },
        ));
        match pipeline.next().await {
            Some(PipelineEvent::Completed(outcome)) => assert_eq!(outcome.token, 2),
            other => panic!("unexpected event {other:?}"),
        }
    }

    struct Broken;

    impl TextTransformService for Broken {
        fn grammar_check<'a>(&'a self, _: &'a str) -> BoxFuture<'a, TransformResult<String>> {
            Box::pin(async { Err(TransformError::Backend("model unavailable".into())) })
        }
        fn change_tone<'a>(&'a self, _: &'a str, _: Tone) -> BoxFuture<'a, TransformResult<String>> {
            Box::pin(async { Err(TransformError::EmptyResponse) })
        }
        fn translate<'a>(&'a self, _: &'a str, _: Option<Language>, _: Language) -> BoxFuture<'a, TransformResult<String>> {
            Box::pin(async { Err(TransformError::EmptyResponse) })
        }
        fn generate<'a>(&'a self, _: &'a str, _: Tone, _: Length) -> BoxFuture<'a, TransformResult<String>> {
            Box::pin(async { Err(TransformError::EmptyResponse) })
        }
        fn detect_language<'a>(&'a self, _: &'a str) -> BoxFuture<'a, TransformResult<Language>> {
            Box::pin(async { Err(TransformError::EmptyResponse) })
        }
    }

    #[tokio::test]
    async fn failures_are_reported_not_swallowed() {
        let mut pipeline = ActionPipeline::new(Arc::new(Broken), Handle::current());
        pipeline.dispatch(action(9, ActionRequest::GrammarCheck));
        match pipeline.next().await {
            Some(PipelineEvent::Completed(outcome)) => {
                assert!(matches!(outcome.result, Err(TransformError::Backend(_))));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn detection_reports_ticket() {
        let stub = Arc::new(StubTransformService::new(StubDelays::none()));
        let mut pipeline = ActionPipeline::new(stub, Handle::current());
        pipeline.detect_language(DetectionRequest { ticket: 4, text: "hola amigo, gracias".into() });
        match pipeline.next().await {
            Some(PipelineEvent::LanguageDetected { ticket, language }) => {
                assert_eq!(ticket, 4);
                assert_eq!(language, Language::Es);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}

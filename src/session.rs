//! One assistant attached to one page. Owns every component and routes page
//! events, pipeline results and view requests between them.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::approval::ApprovalGate;
use crate::change_watcher::ChangeWatcher;
use crate::config::Settings;
use crate::diagnostics::{self, DiagnosticClient, DiagnosticEndpoint};
use crate::field_registry::{FieldCriteria, FieldRegistry};
use crate::host::{DomEvent, DomEventKind, ElementId, HostDocument, Viewport};
use crate::indicator::IndicatorPresenter;
use crate::models::{ActionRequest, Language};
use crate::overlay::{
    ClickTarget, OverlayActions, OverlayController, OverlayError, OverlayStateKind, SubPanel,
};
use crate::pipeline::{ActionPipeline, PipelineEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    pub criteria: FieldCriteria,
    pub blur_grace: Duration,
    pub indicator_offset: i32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            criteria: FieldCriteria::default(),
            blur_grace: Duration::from_millis(200),
            indicator_offset: 45,
        }
    }
}

impl From<&Settings> for SessionOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            criteria: settings.field_criteria(),
            blur_grace: settings.blur_grace(),
            indicator_offset: settings.indicator_offset,
        }
    }
}

/// Last user-visible outcome, shown in the status line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Applied(ElementId),
    Rejected,
    Error(String),
}

pub struct AssistantSession {
    registry: FieldRegistry,
    watcher: ChangeWatcher,
    indicator: IndicatorPresenter,
    overlay: OverlayController,
    pipeline: ActionPipeline,
    gate: ApprovalGate,
    diagnostics: DiagnosticEndpoint,
    client: DiagnosticClient,
    blur_grace: Duration,
    blur_deadline: Option<Instant>,
    notice: Option<Notice>,
}

impl AssistantSession {
    /// Scans the page once and starts watching it for new fields.
    pub fn attach(doc: &mut HostDocument, options: SessionOptions, pipeline: ActionPipeline) -> Self {
        let mut registry = FieldRegistry::new(options.criteria);
        let found = registry.scan(doc);
        let root = doc.root();
        let mut watcher = ChangeWatcher::new();
        watcher.observe(doc, root);
        let (client, endpoint) = diagnostics::channel();
        info!(url = doc.url(), fields = found, "assistant attached");
        Self {
            registry,
            watcher,
            indicator: IndicatorPresenter::new(options.indicator_offset),
            overlay: OverlayController::new(),
            pipeline,
            gate: ApprovalGate,
            diagnostics: endpoint,
            client,
            blur_grace: options.blur_grace,
            blur_deadline: None,
            notice: None,
        }
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn indicator(&self) -> &IndicatorPresenter {
        &self.indicator
    }

    pub fn overlay(&self) -> &OverlayController {
        &self.overlay
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn diagnostic_client(&self) -> DiagnosticClient {
        self.client.clone()
    }

    /// One turn of the loop: structural changes, page events, the blur
    /// timer, finished work and diagnostic queries, in that order.
    pub fn pump(&mut self, doc: &mut HostDocument, now: Instant) {
        doc.flush_mutations();
        self.watcher.pump(doc, &mut self.registry);

        for event in doc.drain_events() {
            self.handle_event(doc, event, now);
        }

        if self.blur_deadline.is_some_and(|deadline| now >= deadline) {
            self.blur_deadline = None;
            if !self.overlay.is_visible() {
                debug!("blur grace elapsed");
                self.registry.clear_active();
                self.indicator.hide();
            }
        }

        while let Some(event) = self.pipeline.try_next() {
            match event {
                PipelineEvent::Completed(outcome) => {
                    self.overlay.resolve(outcome.token, outcome.result);
                }
                PipelineEvent::LanguageDetected { ticket, language } => {
                    self.overlay.apply_detected_language(ticket, language);
                }
            }
        }

        let registry = &mut self.registry;
        self.diagnostics.serve(doc.url(), || registry.live_count(doc));
    }

    fn handle_event(&mut self, doc: &HostDocument, event: DomEvent, now: Instant) {
        let DomEvent { target, kind } = event;
        if !self.registry.contains(target) {
            return;
        }
        match kind {
            DomEventKind::Focus => {
                if self.registry.set_active(target).is_err() {
                    return;
                }
                self.blur_deadline = None;
                self.registry.refresh(doc, target);
                if !self.overlay.is_visible() {
                    self.indicator.show(doc, &self.registry, target);
                }
            }
            DomEventKind::Blur => {
                if self.registry.active_id() == Some(target) {
                    self.blur_deadline = Some(now + self.blur_grace);
                }
            }
            DomEventKind::Input => {
                self.registry.refresh(doc, target);
                self.indicator.update(&self.registry, target);
            }
        }
    }

    /// The page's window changed size.
    pub fn resize(&mut self, doc: &mut HostDocument, viewport: Viewport) {
        doc.set_viewport(viewport);
        self.indicator.reposition(doc);
        debug!(width = viewport.width, height = viewport.height, "viewport resized");
    }

    /// Activation of the indicator: hide it and open the overlay for its
    /// field. A repeated click on the same indicator does nothing.
    pub fn click_indicator(&mut self, doc: &HostDocument) -> Option<OverlayStateKind> {
        let field = self.indicator.click()?;
        self.indicator.hide();
        let text = match self.registry.text(doc, field) {
            Ok(text) => text,
            Err(e) => {
                warn!(field = %field, error = %e, "cannot open overlay");
                return None;
            }
        };
        match self.overlay.open(field, &text) {
            Ok(kind) => {
                self.notice = None;
                Some(kind)
            }
            Err(e) => {
                debug!(error = %e, "overlay not opened");
                None
            }
        }
    }

    /// Capability handed to the view for the lifetime of one input event.
    pub fn actions<'a>(&'a mut self, doc: &'a mut HostDocument) -> SessionActions<'a> {
        SessionActions { session: self, doc }
    }

    /// Stops watching the page and cancels outstanding work.
    pub fn detach(&mut self, doc: &mut HostDocument) {
        self.watcher.stop(doc);
        self.diagnostics.close();
        self.pipeline.shutdown();
        self.overlay.close();
        self.indicator.hide();
        self.registry.clear_active();
        self.blur_deadline = None;
        info!(url = doc.url(), "assistant detached");
    }

    fn fail(&mut self, message: String) {
        warn!(%message, "overlay request failed");
        self.notice = Some(Notice::Error(message));
    }
}

pub struct SessionActions<'a> {
    session: &'a mut AssistantSession,
    doc: &'a mut HostDocument,
}

impl OverlayActions for SessionActions<'_> {
    fn on_action(&mut self, request: ActionRequest) {
        match self.session.overlay.request(request) {
            Ok(action) => self.session.pipeline.dispatch(action),
            // Shown inline in the writing prompt.
            Err(OverlayError::EmptyPrompt) => {}
            Err(e) => self.session.fail(e.to_string()),
        }
    }

    fn on_toggle(&mut self, panel: SubPanel) {
        match self.session.overlay.toggle(panel) {
            Ok(Some(detection)) => self.session.pipeline.detect_language(detection),
            Ok(None) => {}
            Err(e) => self.session.fail(e.to_string()),
        }
    }

    fn on_target_language(&mut self, language: Language) {
        self.session.overlay.set_translation_target(language);
    }

    fn on_approve(&mut self) {
        let session = &mut *self.session;
        match session
            .gate
            .approve(self.doc, &mut session.registry, &mut session.overlay)
        {
            Ok(field) => session.notice = Some(Notice::Applied(field)),
            Err(e) => session.fail(e.to_string()),
        }
    }

    fn on_reject(&mut self) {
        match self.session.gate.reject(&mut self.session.overlay) {
            Ok(()) => self.session.notice = Some(Notice::Rejected),
            Err(e) => self.session.fail(e.to_string()),
        }
    }

    fn on_retry(&mut self) {
        match self.session.overlay.retry() {
            Ok(action) => self.session.pipeline.dispatch(action),
            Err(e) => self.session.fail(e.to_string()),
        }
    }

    fn on_close(&mut self) {
        if self.session.overlay.close().is_some() {
            self.session.pipeline.cancel_inflight();
        }
    }

    fn on_click(&mut self, target: ClickTarget) {
        let pending = self.session.overlay.pending().is_some();
        if self.session.overlay.click(target) && pending {
            self.session.pipeline.cancel_inflight();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ElementSpec, InputType, Rect};
    use crate::indicator::IndicatorLabel;
    use crate::overlay::OverlayState;
    use crate::service::{StubDelays, StubTransformService};
    use std::sync::Arc;
    use tokio::runtime::Handle;

    struct Page {
        doc: HostDocument,
        message: ElementId,
        subject: ElementId,
    }

    fn page() -> Page {
        let mut doc = HostDocument::new("https://mail.example.test/compose", Viewport { width: 1280, height: 800 });
        let root = doc.root();
        let subject = doc
            .append(root, ElementSpec::input(InputType::Text, "subject", Rect::new(100, 100, 600, 30)))
            .unwrap();
        let message = doc
            .append(
                root,
                ElementSpec::text_area("message", Rect::new(100, 200, 600, 200))
                    .with_text("hey john, ur presentation was pretty good"),
            )
            .unwrap();
        Page { doc, message, subject }
    }

    fn session(doc: &mut HostDocument) -> AssistantSession {
        let stub = Arc::new(StubTransformService::new(StubDelays::none()));
        let pipeline = ActionPipeline::new(stub, Handle::current());
        AssistantSession::attach(doc, SessionOptions::default(), pipeline)
    }

    async fn settle(session: &mut AssistantSession, doc: &mut HostDocument, until: OverlayStateKind) {
        for _ in 0..200 {
            session.pump(doc, Instant::now());
            if session.overlay().kind() == until {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("overlay never reached {until:?}, stuck at {:?}", session.overlay().kind());
    }

    #[tokio::test]
    async fn focus_shows_indicator_with_label_for_content() {
        let Page { mut doc, message, subject } = page();
        let mut s = session(&mut doc);
        let now = Instant::now();

        doc.focus(message);
        s.pump(&mut doc, now);
        let view = s.indicator().view().unwrap();
        assert_eq!(view.field, message);
        assert_eq!(view.label, IndicatorLabel::AssistWithExisting);
        assert_eq!(view.anchor.top, 200 - 45);

        doc.focus(subject);
        s.pump(&mut doc, now);
        let view = s.indicator().view().unwrap();
        assert_eq!(view.field, subject);
        assert_eq!(view.label, IndicatorLabel::AssistWithEmpty);
        assert_eq!(s.registry().active_id(), Some(subject));
    }

    #[tokio::test]
    async fn blur_clears_after_grace_only() {
        let Page { mut doc, message, .. } = page();
        let mut s = session(&mut doc);
        let start = Instant::now();

        doc.focus(message);
        s.pump(&mut doc, start);
        doc.blur();
        s.pump(&mut doc, start);
        s.pump(&mut doc, start + Duration::from_millis(100));
        assert!(s.indicator().is_visible());

        s.pump(&mut doc, start + Duration::from_millis(250));
        assert!(!s.indicator().is_visible());
        assert_eq!(s.registry().active_id(), None);
    }

    #[tokio::test]
    async fn refocus_within_grace_keeps_indicator() {
        let Page { mut doc, message, subject } = page();
        let mut s = session(&mut doc);
        let start = Instant::now();

        doc.focus(message);
        s.pump(&mut doc, start);
        doc.focus(subject);
        s.pump(&mut doc, start);
        s.pump(&mut doc, start + Duration::from_secs(1));
        assert_eq!(s.indicator().view().map(|v| v.field), Some(subject));
    }

    #[tokio::test]
    async fn typing_updates_label_in_place() {
        let Page { mut doc, subject, .. } = page();
        let mut s = session(&mut doc);
        doc.focus(subject);
        s.pump(&mut doc, Instant::now());
        let anchor = s.indicator().view().unwrap().anchor;

        doc.type_text(subject, "Q3 review");
        s.pump(&mut doc, Instant::now());
        let view = s.indicator().view().unwrap();
        assert_eq!(view.label, IndicatorLabel::AssistWithExisting);
        assert_eq!(view.anchor, anchor);
    }

    #[tokio::test]
    async fn indicator_and_overlay_are_exclusive() {
        let Page { mut doc, message, .. } = page();
        let mut s = session(&mut doc);
        let start = Instant::now();
        doc.focus(message);
        s.pump(&mut doc, start);

        assert_eq!(s.click_indicator(&doc), Some(OverlayStateKind::ActionMenu));
        assert!(!s.indicator().is_visible());
        assert_eq!(s.click_indicator(&doc), None);

        // Blur while open keeps the active field for the write-back.
        doc.blur();
        s.pump(&mut doc, start);
        s.pump(&mut doc, start + Duration::from_secs(1));
        assert_eq!(s.registry().active_id(), Some(message));
        assert!(!s.indicator().is_visible());
    }

    #[tokio::test]
    async fn grammar_check_round_trip_writes_back() {
        let Page { mut doc, message, .. } = page();
        let mut s = session(&mut doc);
        doc.focus(message);
        s.pump(&mut doc, Instant::now());
        s.click_indicator(&doc);

        s.actions(&mut doc).on_action(ActionRequest::GrammarCheck);
        assert_eq!(s.overlay().kind(), OverlayStateKind::Loading);
        settle(&mut s, &mut doc, OverlayStateKind::Comparison).await;
        let candidate = s.overlay().candidate().unwrap().to_string();

        s.actions(&mut doc).on_approve();
        assert_eq!(s.overlay().kind(), OverlayStateKind::Hidden);
        assert_eq!(doc.text(message), Some(candidate.as_str()));
        assert_eq!(s.notice(), Some(&Notice::Applied(message)));
    }

    #[tokio::test]
    async fn approve_writes_to_the_field_the_overlay_was_opened_for() {
        let Page { mut doc, message, subject } = page();
        let mut s = session(&mut doc);
        doc.focus(message);
        s.pump(&mut doc, Instant::now());
        s.click_indicator(&doc);
        s.actions(&mut doc).on_action(ActionRequest::GrammarCheck);
        settle(&mut s, &mut doc, OverlayStateKind::Comparison).await;
        let candidate = s.overlay().candidate().unwrap().to_string();

        doc.focus(subject);
        s.pump(&mut doc, Instant::now());
        assert!(!s.indicator().is_visible());

        s.actions(&mut doc).on_approve();
        assert_eq!(doc.text(message), Some(candidate.as_str()));
        assert_eq!(doc.text(subject), Some(""));
        assert_eq!(s.notice(), Some(&Notice::Applied(message)));
    }

    #[tokio::test]
    async fn resize_moves_the_indicator_with_the_page() {
        let Page { mut doc, message, .. } = page();
        let mut s = session(&mut doc);
        doc.focus(message);
        s.pump(&mut doc, Instant::now());
        assert_eq!(s.indicator().view().unwrap().anchor.right, 1280 - 700);

        s.resize(&mut doc, Viewport { width: 900, height: 600 });
        assert_eq!(doc.viewport(), Viewport { width: 900, height: 600 });
        assert_eq!(s.indicator().view().unwrap().anchor.right, 900 - 700);
        assert_eq!(s.click_indicator(&doc), Some(OverlayStateKind::ActionMenu));
    }

    #[tokio::test]
    async fn reject_leaves_field_untouched() {
        let Page { mut doc, message, .. } = page();
        let mut s = session(&mut doc);
        doc.focus(message);
        s.pump(&mut doc, Instant::now());
        s.click_indicator(&doc);
        s.actions(&mut doc).on_toggle(SubPanel::ToneMenu);
        s.actions(&mut doc).on_action(ActionRequest::ChangeTone(crate::models::Tone::Professional));
        settle(&mut s, &mut doc, OverlayStateKind::Comparison).await;

        s.actions(&mut doc).on_reject();
        assert_eq!(doc.text(message), Some("hey john, ur presentation was pretty good"));
        assert_eq!(s.notice(), Some(&Notice::Rejected));
    }

    #[tokio::test]
    async fn empty_prompt_stays_in_writing_prompt() {
        let Page { mut doc, subject, .. } = page();
        let mut s = session(&mut doc);
        doc.focus(subject);
        s.pump(&mut doc, Instant::now());
        assert_eq!(s.click_indicator(&doc), Some(OverlayStateKind::WritingPrompt));

        s.actions(&mut doc).on_action(ActionRequest::Generate {
            prompt: "   ".into(),
            tone: crate::models::Tone::Casual,
            length: crate::models::Length::Medium,
        });
        match s.overlay().state() {
            OverlayState::WritingPrompt(form) => assert!(form.validation.is_some()),
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(s.notice(), None);
    }

    #[tokio::test]
    async fn close_while_loading_discards_late_result() {
        let Page { mut doc, message, .. } = page();
        let mut s = session(&mut doc);
        doc.focus(message);
        s.pump(&mut doc, Instant::now());
        s.click_indicator(&doc);
        s.actions(&mut doc).on_action(ActionRequest::GrammarCheck);
        s.actions(&mut doc).on_click(ClickTarget::Scrim);
        for _ in 0..20 {
            s.pump(&mut doc, Instant::now());
            tokio::task::yield_now().await;
        }
        assert_eq!(s.overlay().kind(), OverlayStateKind::Hidden);
        assert_eq!(doc.text(message), Some("hey john, ur presentation was pretty good"));
    }

    #[tokio::test]
    async fn late_fields_are_tracked_and_counted() {
        let Page { mut doc, message, .. } = page();
        let mut s = session(&mut doc);
        let client = s.diagnostic_client();
        let root = doc.root();
        doc.append(
            root,
            ElementSpec::block("comments", Rect::new(0, 500, 800, 200))
                .child(ElementSpec::editable("reply", Rect::new(10, 510, 500, 80))),
        );
        doc.remove(message);

        let query = tokio::spawn(async move { client.test_detection().await });
        let report = loop {
            s.pump(&mut doc, Instant::now());
            if query.is_finished() {
                break query.await.unwrap().unwrap();
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        };
        assert!(report.success);
        assert_eq!(report.text_fields, 2);
        assert_eq!(report.url, "https://mail.example.test/compose");
    }

    #[tokio::test]
    async fn detach_stops_observing() {
        let Page { mut doc, message, .. } = page();
        let mut s = session(&mut doc);
        doc.focus(message);
        s.pump(&mut doc, Instant::now());
        s.detach(&mut doc);
        assert_eq!(doc.observer_count(), 0);
        assert!(!s.indicator().is_visible());
        assert_eq!(s.registry().active_id(), None);
    }

    #[tokio::test]
    async fn detection_query_after_detach_fails_instead_of_hanging() {
        let Page { mut doc, .. } = page();
        let mut s = session(&mut doc);
        let client = s.diagnostic_client();
        s.detach(&mut doc);

        let answer = tokio::time::timeout(Duration::from_secs(1), client.test_detection())
            .await
            .expect("query should not hang");
        assert_eq!(answer, Err(crate::diagnostics::DiagnosticError::ChannelClosed));
    }
}

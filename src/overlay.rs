//! Modal workflow: action menu, writing prompt, loading, results.
//!
//! Transitions:
//!
//! ```text
//! Hidden --open(text)--> ActionMenu --grammar/tone/translate--> Loading
//! Hidden --open("")---> WritingPrompt --submit(prompt)--------> Loading
//! Loading --result--> Comparison | GeneratedContent
//! Loading --error---> Failed --retry--> Loading
//! Comparison | GeneratedContent --approve/reject--> Hidden
//! any --close--> Hidden
//! ```

use thiserror::Error;
use tracing::{debug, warn};

use crate::host::ElementId;
use crate::models::{ActionKind, ActionRequest, Language, Length, PendingAction, Tone};
use crate::service::TransformError;

pub const EMPTY_PROMPT_MESSAGE: &str = "Please describe what you want to write!";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayStateKind {
    Hidden,
    ActionMenu,
    WritingPrompt,
    Loading,
    Comparison,
    GeneratedContent,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceLanguage {
    Detecting { ticket: u64 },
    Detected(Language),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslationForm {
    pub source: SourceLanguage,
    pub target: Language,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionMenu {
    pub original: String,
    pub tone_menu_open: bool,
    pub translation: Option<TranslationForm>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WritingPrompt {
    pub prompt: String,
    pub tone: Tone,
    pub length: Length,
    pub validation: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadingView {
    pub kind: ActionKind,
    pub action_label: String,
    pub message: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComparisonView {
    pub original: String,
    pub candidate: String,
    pub action_label: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedView {
    pub candidate: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedView {
    pub action_label: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OverlayState {
    #[default]
    Hidden,
    ActionMenu(ActionMenu),
    WritingPrompt(WritingPrompt),
    Loading(LoadingView),
    Comparison(ComparisonView),
    GeneratedContent(GeneratedView),
    Failed(FailedView),
}

impl OverlayState {
    pub fn kind(&self) -> OverlayStateKind {
        match self {
            OverlayState::Hidden => OverlayStateKind::Hidden,
            OverlayState::ActionMenu(_) => OverlayStateKind::ActionMenu,
            OverlayState::WritingPrompt(_) => OverlayStateKind::WritingPrompt,
            OverlayState::Loading(_) => OverlayStateKind::Loading,
            OverlayState::Comparison(_) => OverlayStateKind::Comparison,
            OverlayState::GeneratedContent(_) => OverlayStateKind::GeneratedContent,
            OverlayState::Failed(_) => OverlayStateKind::Failed,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubPanel {
    ToneMenu,
    Translation,
}

/// Where a pointer press landed relative to the overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickTarget {
    Scrim,
    Content,
    CloseButton,
}

/// Source-language detection to run for a freshly opened translation form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectionRequest {
    pub ticket: u64,
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Failed,
    Stale,
}

/// Candidate accepted by the user, to be written into `field`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Approval {
    pub field: Option<ElementId>,
    pub text: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OverlayError {
    #[error("overlay is already open")]
    AlreadyOpen,
    #[error("{action:?} is not available while the overlay is {from:?}")]
    InvalidTransition {
        from: OverlayStateKind,
        action: ActionKind,
    },
    #[error("Please describe what you want to write!")]
    EmptyPrompt,
    #[error("no sub-panel toggling while the overlay is {0:?}")]
    NoMenu(OverlayStateKind),
    #[error("nothing to approve or reject while the overlay is {0:?}")]
    NoResult(OverlayStateKind),
    #[error("nothing to retry while the overlay is {0:?}")]
    NothingToRetry(OverlayStateKind),
}

#[derive(Default)]
pub struct OverlayController {
    state: OverlayState,
    field: Option<ElementId>,
    pending: Option<PendingAction>,
    last_token: u64,
    last_ticket: u64,
}

impl OverlayController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn kind(&self) -> OverlayStateKind {
        self.state.kind()
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self.state, OverlayState::Hidden)
    }

    /// Field the overlay was opened for.
    pub fn field(&self) -> Option<ElementId> {
        self.field
    }

    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    pub fn candidate(&self) -> Option<&str> {
        match &self.state {
            OverlayState::Comparison(view) => Some(&view.candidate),
            OverlayState::GeneratedContent(view) => Some(&view.candidate),
            _ => None,
        }
    }

    /// Opens for `field`: the action menu when it already has text, the
    /// writing prompt otherwise.
    pub fn open(&mut self, field: ElementId, text: &str) -> Result<OverlayStateKind, OverlayError> {
        if self.is_visible() {
            return Err(OverlayError::AlreadyOpen);
        }
        self.field = Some(field);
        self.pending = None;
        self.state = if text.trim().is_empty() {
            OverlayState::WritingPrompt(WritingPrompt::default())
        } else {
            OverlayState::ActionMenu(ActionMenu {
                original: text.to_string(),
                tone_menu_open: false,
                translation: None,
            })
        };
        debug!(field = %field, state = ?self.kind(), "overlay opened");
        Ok(self.kind())
    }

    /// Opens or closes a sub-panel of the action menu. Opening the
    /// translation form asks for source-language detection.
    pub fn toggle(&mut self, panel: SubPanel) -> Result<Option<DetectionRequest>, OverlayError> {
        let from = self.kind();
        let OverlayState::ActionMenu(menu) = &mut self.state else {
            return Err(OverlayError::NoMenu(from));
        };
        match panel {
            SubPanel::ToneMenu => {
                menu.tone_menu_open = !menu.tone_menu_open;
                Ok(None)
            }
            SubPanel::Translation => {
                if menu.translation.take().is_some() {
                    return Ok(None);
                }
                self.last_ticket += 1;
                let ticket = self.last_ticket;
                menu.translation = Some(TranslationForm {
                    source: SourceLanguage::Detecting { ticket },
                    target: Language::En,
                });
                Ok(Some(DetectionRequest {
                    ticket,
                    text: menu.original.clone(),
                }))
            }
        }
    }

    /// Applies a detection result if the form that asked for it is still
    /// open and waiting. Anything else is dropped.
    pub fn apply_detected_language(&mut self, ticket: u64, language: Language) -> bool {
        if let OverlayState::ActionMenu(ActionMenu {
            translation: Some(form),
            ..
        }) = &mut self.state
        {
            if form.source == (SourceLanguage::Detecting { ticket }) {
                form.source = SourceLanguage::Detected(language);
                return true;
            }
        }
        debug!(ticket, "discarding language detection for a closed form");
        false
    }

    pub fn set_translation_target(&mut self, target: Language) {
        if let OverlayState::ActionMenu(ActionMenu {
            translation: Some(form),
            ..
        }) = &mut self.state
        {
            form.target = target;
        }
    }

    /// Starts `request` and moves to Loading. The returned action carries the
    /// token its result must be resolved with.
    pub fn request(&mut self, request: ActionRequest) -> Result<PendingAction, OverlayError> {
        let from = self.kind();
        let invalid = OverlayError::InvalidTransition {
            from,
            action: request.kind(),
        };
        let (request, original) = match (&mut self.state, request) {
            (OverlayState::ActionMenu(_), ActionRequest::Generate { .. }) => return Err(invalid),
            (OverlayState::ActionMenu(menu), ActionRequest::ChangeTone(_)) if !menu.tone_menu_open => {
                return Err(invalid);
            }
            (OverlayState::ActionMenu(menu), ActionRequest::Translate { source, target }) => {
                let detected = match menu.translation.as_ref().map(|f| f.source) {
                    None => return Err(invalid),
                    Some(SourceLanguage::Detected(lang)) => Some(lang),
                    Some(_) => None,
                };
                (
                    ActionRequest::Translate {
                        source: source.or(detected),
                        target,
                    },
                    menu.original.clone(),
                )
            }
            (OverlayState::ActionMenu(menu), request) => (request, menu.original.clone()),
            (
                OverlayState::WritingPrompt(form),
                ActionRequest::Generate {
                    prompt,
                    tone,
                    length,
                },
            ) => {
                form.tone = tone;
                form.length = length;
                if prompt.trim().is_empty() {
                    form.prompt = prompt;
                    form.validation = Some(EMPTY_PROMPT_MESSAGE.to_string());
                    return Err(OverlayError::EmptyPrompt);
                }
                form.prompt = prompt.clone();
                form.validation = None;
                (
                    ActionRequest::Generate {
                        prompt,
                        tone,
                        length,
                    },
                    String::new(),
                )
            }
            _ => return Err(invalid),
        };
        Ok(self.begin(request, original))
    }

    fn begin(&mut self, request: ActionRequest, original: String) -> PendingAction {
        self.last_token += 1;
        let action = PendingAction {
            token: self.last_token,
            request,
            original,
        };
        self.state = OverlayState::Loading(LoadingView {
            kind: action.request.kind(),
            action_label: action.request.label(),
            message: action.request.loading_message(),
        });
        debug!(token = action.token, kind = ?action.request.kind(), "action started");
        self.pending = Some(action.clone());
        action
    }

    /// Feeds a service result back in. Only the result for the current
    /// pending action, arriving while Loading, is applied.
    pub fn resolve(&mut self, token: u64, result: Result<String, TransformError>) -> Resolution {
        let loading = matches!(self.state, OverlayState::Loading(_));
        let current = match self.pending.as_ref() {
            Some(pending) if loading && pending.token == token => pending,
            _ => {
                debug!(token, "discarding stale result");
                return Resolution::Stale;
            }
        };
        let label = current.request.label();
        match result {
            Ok(candidate) => {
                self.state = if current.request.kind() == ActionKind::Generate {
                    OverlayState::GeneratedContent(GeneratedView { candidate })
                } else {
                    OverlayState::Comparison(ComparisonView {
                        original: current.original.clone(),
                        candidate,
                        action_label: label,
                    })
                };
                Resolution::Applied
            }
            Err(err) => {
                warn!(token, error = %err, "text transformation failed");
                self.state = OverlayState::Failed(FailedView {
                    action_label: label,
                    message: err.to_string(),
                });
                Resolution::Failed
            }
        }
    }

    /// Re-issues the failed action under a new token.
    pub fn retry(&mut self) -> Result<PendingAction, OverlayError> {
        if !matches!(self.state, OverlayState::Failed(_)) {
            return Err(OverlayError::NothingToRetry(self.kind()));
        }
        let Some(action) = self.pending.take() else {
            return Err(OverlayError::NothingToRetry(self.kind()));
        };
        Ok(self.begin(action.request, action.original))
    }

    /// Accepts the candidate on screen and hides the overlay.
    pub fn approve(&mut self) -> Result<Approval, OverlayError> {
        let Some(text) = self.candidate().map(str::to_string) else {
            return Err(OverlayError::NoResult(self.kind()));
        };
        let field = self.field;
        self.hide();
        Ok(Approval { field, text })
    }

    /// Discards the result (or failure) on screen and hides the overlay.
    pub fn reject(&mut self) -> Result<(), OverlayError> {
        match self.kind() {
            OverlayStateKind::Comparison
            | OverlayStateKind::GeneratedContent
            | OverlayStateKind::Failed => {
                self.hide();
                Ok(())
            }
            other => Err(OverlayError::NoResult(other)),
        }
    }

    /// Closes from any state. Returns the action that was still pending, if
    /// any, so its work can be cancelled.
    pub fn close(&mut self) -> Option<PendingAction> {
        let pending = self.pending.take();
        self.hide();
        pending
    }

    /// Scrim and close-button presses close the overlay; presses on the
    /// content do not. Returns whether the overlay closed.
    pub fn click(&mut self, target: ClickTarget) -> bool {
        if !self.is_visible() {
            return false;
        }
        match target {
            ClickTarget::Scrim | ClickTarget::CloseButton => {
                self.close();
                true
            }
            ClickTarget::Content => false,
        }
    }

    fn hide(&mut self) {
        if self.is_visible() {
            debug!(from = ?self.kind(), "overlay hidden");
        }
        self.state = OverlayState::Hidden;
        self.pending = None;
        self.field = None;
    }
}

/// What the view layer may ask of the overlay. Handed to the view
/// explicitly; the view never looks handlers up by name.
pub trait OverlayActions {
    fn on_action(&mut self, request: ActionRequest);
    fn on_toggle(&mut self, panel: SubPanel);
    fn on_target_language(&mut self, language: Language);
    fn on_approve(&mut self);
    fn on_reject(&mut self);
    fn on_retry(&mut self);
    fn on_close(&mut self);
    fn on_click(&mut self, target: ClickTarget);
}

use thiserror::Error;
use tracing::{info, warn};

use crate::field_registry::{FieldError, FieldRegistry};
use crate::host::{ElementId, HostDocument};
use crate::overlay::{OverlayController, OverlayError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    #[error("no active field to write into")]
    NoActiveField,
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Last step of every action: commit the candidate into the origin field,
/// or throw it away. Either way the overlay ends up hidden.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApprovalGate;

impl ApprovalGate {
    /// Writes the candidate on screen into the field the overlay was opened
    /// for, or the active field when it has none. The overlay is closed even
    /// when the write cannot happen.
    pub fn approve(
        &self,
        doc: &mut HostDocument,
        registry: &mut FieldRegistry,
        overlay: &mut OverlayController,
    ) -> Result<ElementId, ApprovalError> {
        let approval = overlay.approve()?;
        let target = approval
            .field
            .or_else(|| registry.active(doc).map(|f| f.element))
            .ok_or(ApprovalError::NoActiveField)?;
        match registry.set_text(doc, target, &approval.text) {
            Ok(()) => {
                info!(field = %target, chars = approval.text.chars().count(), "changes applied to text field");
                Ok(target)
            }
            Err(e) => {
                warn!(field = %target, error = %e, "could not apply changes");
                Err(e.into())
            }
        }
    }

    /// Drops the candidate and leaves the field as it was.
    pub fn reject(&self, overlay: &mut OverlayController) -> Result<(), ApprovalError> {
        overlay.reject()?;
        info!("changes rejected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_registry::FieldCriteria;
    use crate::host::{ElementSpec, Rect, Viewport};
    use crate::models::ActionRequest;
    use crate::overlay::OverlayStateKind;

    fn setup() -> (HostDocument, FieldRegistry, OverlayController, ElementId) {
        let mut doc = HostDocument::new("https://example.test", Viewport { width: 800, height: 600 });
        let root = doc.root();
        let id = doc
            .append(root, ElementSpec::text_area("message", Rect::new(0, 100, 400, 120)).with_text("teh draft"))
            .unwrap();
        let mut registry = FieldRegistry::new(FieldCriteria::default());
        registry.scan(&doc);
        registry.set_active(id).unwrap();
        let mut overlay = OverlayController::new();
        overlay.open(id, "teh draft").unwrap();
        let action = overlay.request(ActionRequest::GrammarCheck).unwrap();
        overlay.resolve(action.token, Ok("The draft.".into()));
        (doc, registry, overlay, id)
    }

    #[test]
    fn approve_writes_candidate_and_hides() {
        let (mut doc, mut registry, mut overlay, id) = setup();
        let written = ApprovalGate.approve(&mut doc, &mut registry, &mut overlay).unwrap();
        assert_eq!(written, id);
        assert_eq!(doc.text(id), Some("The draft."));
        assert_eq!(overlay.kind(), OverlayStateKind::Hidden);
        assert!(overlay.pending().is_none());
    }

    #[test]
    fn approve_ignores_focus_moving_to_another_field() {
        let (mut doc, mut registry, mut overlay, id) = setup();
        let root = doc.root();
        let other = doc
            .append(root, ElementSpec::text_area("notes", Rect::new(0, 300, 400, 120)))
            .unwrap();
        registry.register(&doc, other);
        registry.set_active(other).unwrap();

        assert_eq!(ApprovalGate.approve(&mut doc, &mut registry, &mut overlay), Ok(id));
        assert_eq!(doc.text(id), Some("The draft."));
        assert_eq!(doc.text(other), Some(""));
    }

    #[test]
    fn reject_keeps_original() {
        let (doc, _registry, mut overlay, id) = setup();
        ApprovalGate.reject(&mut overlay).unwrap();
        assert_eq!(doc.text(id), Some("teh draft"));
        assert_eq!(overlay.kind(), OverlayStateKind::Hidden);
    }

    #[test]
    fn detached_field_still_closes_overlay() {
        let (mut doc, mut registry, mut overlay, id) = setup();
        doc.remove(id);
        let err = ApprovalGate.approve(&mut doc, &mut registry, &mut overlay).unwrap_err();
        assert_eq!(err, ApprovalError::Field(FieldError::Detached(id)));
        assert_eq!(overlay.kind(), OverlayStateKind::Hidden);
    }

    #[test]
    fn nothing_to_approve_outside_results() {
        let (mut doc, mut registry, mut overlay, _) = setup();
        overlay.close();
        assert!(matches!(
            ApprovalGate.approve(&mut doc, &mut registry, &mut overlay),
            Err(ApprovalError::Overlay(OverlayError::NoResult(OverlayStateKind::Hidden)))
        ));
    }
}

//! Discovery and bookkeeping of trackable text fields.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::host::{ElementId, ElementKind, HostDocument};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Input or textarea: text lives in the value property.
    Value,
    /// Content-editable region.
    Editable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackedField {
    pub element: ElementId,
    pub kind: FieldKind,
    pub has_text: bool,
}

/// Minimum on-screen size for a field to be worth decorating.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldCriteria {
    pub min_width: i32,
    pub min_height: i32,
}

impl Default for FieldCriteria {
    fn default() -> Self {
        Self {
            min_width: 50,
            min_height: 20,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("element {0} is not a tracked field")]
    Untracked(ElementId),
    #[error("element {0} is no longer attached to the page")]
    Detached(ElementId),
}

pub struct FieldRegistry {
    criteria: FieldCriteria,
    order: Vec<ElementId>,
    fields: HashMap<ElementId, TrackedField>,
    active: Option<ElementId>,
}

fn has_text(text: &str) -> bool {
    !text.trim().is_empty()
}

impl FieldRegistry {
    pub fn new(criteria: FieldCriteria) -> Self {
        Self {
            criteria,
            order: Vec::new(),
            fields: HashMap::new(),
            active: None,
        }
    }

    /// Validity predicate: a textual, non-password element that is rendered
    /// and at least the configured size.
    pub fn is_trackable(&self, doc: &HostDocument, id: ElementId) -> bool {
        let Some(element) = doc.get(id) else {
            return false;
        };
        if !element.kind.is_text_candidate() || element.kind.is_password() {
            return false;
        }
        if !doc.is_rendered(id) {
            return false;
        }
        element.rect.width >= self.criteria.min_width
            && element.rect.height >= self.criteria.min_height
    }

    /// Adds every valid, not yet tracked field in the document. Returns how
    /// many were added.
    pub fn scan(&mut self, doc: &HostDocument) -> usize {
        doc.descendants(doc.root())
            .into_iter()
            .filter(|id| self.register(doc, *id))
            .count()
    }

    /// Tracks `id` if it is valid and unseen. Returns whether it was added.
    pub fn register(&mut self, doc: &HostDocument, id: ElementId) -> bool {
        if self.fields.contains_key(&id) || !self.is_trackable(doc, id) {
            return false;
        }
        let Some(element) = doc.get(id) else {
            return false;
        };
        let kind = if matches!(element.kind, ElementKind::Editable) {
            FieldKind::Editable
        } else {
            FieldKind::Value
        };
        let field = TrackedField {
            element: id,
            kind,
            has_text: has_text(element.text()),
        };
        debug!(element = %id, label = %element.label, ?kind, "tracking field");
        self.fields.insert(id, field);
        self.order.push(id);
        true
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.fields.contains_key(&id)
    }

    pub fn get(&self, id: ElementId) -> Option<&TrackedField> {
        self.fields.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedField> {
        self.order.iter().filter_map(|id| self.fields.get(id))
    }

    /// Number of entries, stale ones included.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Drops entries whose element has left the page and returns what is
    /// left. Staleness is only checked here and on reads of the active field.
    pub fn live_count(&mut self, doc: &HostDocument) -> usize {
        let before = self.fields.len();
        self.fields.retain(|id, _| doc.is_attached(*id));
        let fields = &self.fields;
        self.order.retain(|id| fields.contains_key(id));
        if self.active.is_some_and(|a| !self.fields.contains_key(&a)) {
            self.active = None;
        }
        let pruned = before - self.fields.len();
        if pruned > 0 {
            debug!(pruned, "pruned detached fields");
        }
        self.fields.len()
    }

    /// The active field, if it is still attached.
    pub fn active(&self, doc: &HostDocument) -> Option<&TrackedField> {
        let id = self.active?;
        if !doc.is_attached(id) {
            return None;
        }
        self.fields.get(&id)
    }

    pub fn active_id(&self) -> Option<ElementId> {
        self.active
    }

    pub fn set_active(&mut self, id: ElementId) -> Result<(), FieldError> {
        if !self.fields.contains_key(&id) {
            return Err(FieldError::Untracked(id));
        }
        self.active = Some(id);
        Ok(())
    }

    pub fn clear_active(&mut self) {
        self.active = None;
    }

    pub fn text(&self, doc: &HostDocument, id: ElementId) -> Result<String, FieldError> {
        if !self.fields.contains_key(&id) {
            return Err(FieldError::Untracked(id));
        }
        if !doc.is_attached(id) {
            return Err(FieldError::Detached(id));
        }
        doc.text(id)
            .map(str::to_string)
            .ok_or(FieldError::Detached(id))
    }

    /// Writes `text` into the field and fires a synthetic content-changed
    /// notification on it. Nothing changes when the field is unknown or gone.
    pub fn set_text(
        &mut self,
        doc: &mut HostDocument,
        id: ElementId,
        text: &str,
    ) -> Result<(), FieldError> {
        if !self.fields.contains_key(&id) {
            return Err(FieldError::Untracked(id));
        }
        if !doc.is_attached(id) || !doc.write_text(id, text) {
            return Err(FieldError::Detached(id));
        }
        doc.dispatch_input(id);
        if let Some(field) = self.fields.get_mut(&id) {
            field.has_text = has_text(text);
        }
        Ok(())
    }

    /// Re-reads the cached `has_text` flag after the field's content changed.
    pub fn refresh(&mut self, doc: &HostDocument, id: ElementId) -> Option<bool> {
        let text = doc.text(id)?;
        let field = self.fields.get_mut(&id)?;
        field.has_text = has_text(text);
        Some(field.has_text)
    }
}

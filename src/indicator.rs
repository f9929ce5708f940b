//! The floating affordance anchored above the active field.

use tracing::debug;

use crate::field_registry::FieldRegistry;
use crate::host::{ElementId, HostDocument};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndicatorLabel {
    AssistWithExisting,
    AssistWithEmpty,
}

impl IndicatorLabel {
    fn for_text(has_text: bool) -> Self {
        if has_text {
            IndicatorLabel::AssistWithExisting
        } else {
            IndicatorLabel::AssistWithEmpty
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            IndicatorLabel::AssistWithExisting => "Let Lexi improve your writing...",
            IndicatorLabel::AssistWithEmpty => "Write with Lexi...",
        }
    }
}

/// Fixed-position anchor: `top` from the viewport top, `right` from the
/// viewport right edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Anchor {
    pub top: i32,
    pub right: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndicatorView {
    pub field: ElementId,
    pub label: IndicatorLabel,
    pub anchor: Anchor,
    /// Bumped on every `show`; lets callers tell instances apart.
    pub instance: u64,
    click_armed: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum IndicatorState {
    #[default]
    Hidden,
    Visible(IndicatorView),
}

pub struct IndicatorPresenter {
    state: IndicatorState,
    offset: i32,
    instances: u64,
}

impl IndicatorPresenter {
    pub fn new(offset: i32) -> Self {
        Self {
            state: IndicatorState::Hidden,
            offset,
            instances: 0,
        }
    }

    pub fn state(&self) -> &IndicatorState {
        &self.state
    }

    pub fn is_visible(&self) -> bool {
        matches!(self.state, IndicatorState::Visible(_))
    }

    pub fn view(&self) -> Option<&IndicatorView> {
        match &self.state {
            IndicatorState::Visible(view) => Some(view),
            IndicatorState::Hidden => None,
        }
    }

    /// Replaces any current indicator with one for `field`. Returns false
    /// (leaving the indicator hidden) when the field is not tracked or gone.
    pub fn show(&mut self, doc: &HostDocument, registry: &FieldRegistry, field: ElementId) -> bool {
        self.hide();
        let Some(tracked) = registry.get(field) else {
            return false;
        };
        let Some(rect) = doc.rect(field).filter(|_| doc.is_attached(field)) else {
            return false;
        };
        let viewport = doc.viewport();
        self.instances += 1;
        let view = IndicatorView {
            field,
            label: IndicatorLabel::for_text(tracked.has_text),
            anchor: Anchor {
                top: rect.top() - self.offset,
                right: viewport.width - rect.right(),
            },
            instance: self.instances,
            click_armed: true,
        };
        debug!(field = %field, label = ?view.label, anchor = ?view.anchor, "indicator shown");
        self.state = IndicatorState::Visible(view);
        true
    }

    /// Recomputes the anchor after the viewport changed. The click stays
    /// armed; this is the same indicator instance.
    pub fn reposition(&mut self, doc: &HostDocument) {
        let IndicatorState::Visible(view) = &mut self.state else {
            return;
        };
        if let Some(rect) = doc.rect(view.field) {
            view.anchor = Anchor {
                top: rect.top() - self.offset,
                right: doc.viewport().width - rect.right(),
            };
        }
    }

    /// Refreshes the label for `field` without moving the indicator.
    pub fn update(&mut self, registry: &FieldRegistry, field: ElementId) {
        let IndicatorState::Visible(view) = &mut self.state else {
            return;
        };
        if view.field != field {
            return;
        }
        if let Some(tracked) = registry.get(field) {
            view.label = IndicatorLabel::for_text(tracked.has_text);
        }
    }

    /// Consumes the click for the current instance. A second click on the
    /// same instance yields nothing.
    pub fn click(&mut self) -> Option<ElementId> {
        let IndicatorState::Visible(view) = &mut self.state else {
            return None;
        };
        if !view.click_armed {
            return None;
        }
        view.click_armed = false;
        Some(view.field)
    }

    pub fn hide(&mut self) {
        if self.is_visible() {
            debug!("indicator hidden");
        }
        self.state = IndicatorState::Hidden;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_registry::FieldCriteria;
    use crate::host::{ElementSpec, Rect, Viewport};

    fn setup(text: &str) -> (HostDocument, FieldRegistry, ElementId) {
        let mut doc = HostDocument::new("https://example.test", Viewport { width: 1000, height: 700 });
        let root = doc.root();
        let id = doc
            .append(root, ElementSpec::text_area("message", Rect::new(100, 200, 400, 120)).with_text(text))
            .unwrap();
        let mut registry = FieldRegistry::new(FieldCriteria::default());
        registry.scan(&doc);
        (doc, registry, id)
    }

    #[test]
    fn anchor_sits_above_and_right_aligned() {
        let (doc, registry, id) = setup("hello");
        let mut indicator = IndicatorPresenter::new(45);
        assert!(indicator.show(&doc, &registry, id));
        let view = indicator.view().unwrap();
        assert_eq!(view.anchor, Anchor { top: 155, right: 500 });
        assert_eq!(view.label, IndicatorLabel::AssistWithExisting);
    }

    #[test]
    fn reposition_follows_the_viewport_and_keeps_the_click() {
        let (mut doc, registry, id) = setup("hello");
        let mut indicator = IndicatorPresenter::new(45);
        indicator.show(&doc, &registry, id);
        let instance = indicator.view().unwrap().instance;

        doc.set_viewport(Viewport { width: 1400, height: 700 });
        indicator.reposition(&doc);
        let view = indicator.view().unwrap();
        assert_eq!(view.anchor, Anchor { top: 155, right: 900 });
        assert_eq!(view.instance, instance);
        assert_eq!(indicator.click(), Some(id));
    }

    #[test]
    fn empty_field_gets_writing_label() {
        let (doc, registry, id) = setup("   ");
        let mut indicator = IndicatorPresenter::new(45);
        indicator.show(&doc, &registry, id);
        assert_eq!(indicator.view().unwrap().label, IndicatorLabel::AssistWithEmpty);
    }

    #[test]
    fn update_changes_label_but_not_position() {
        let (mut doc, mut registry, id) = setup("");
        let mut indicator = IndicatorPresenter::new(45);
        indicator.show(&doc, &registry, id);
        let anchor = indicator.view().unwrap().anchor;

        doc.set_rect(id, Rect::new(0, 0, 400, 120));
        doc.type_text(id, "x");
        registry.refresh(&doc, id);
        indicator.update(&registry, id);

        let view = indicator.view().unwrap();
        assert_eq!(view.label, IndicatorLabel::AssistWithExisting);
        assert_eq!(view.anchor, anchor);
    }

    #[test]
    fn click_fires_once_per_show() {
        let (doc, registry, id) = setup("hi");
        let mut indicator = IndicatorPresenter::new(45);
        indicator.show(&doc, &registry, id);
        let first = indicator.view().unwrap().instance;
        assert_eq!(indicator.click(), Some(id));
        assert_eq!(indicator.click(), None);

        indicator.show(&doc, &registry, id);
        assert!(indicator.view().unwrap().instance > first);
        assert_eq!(indicator.click(), Some(id));
    }

    #[test]
    fn hide_is_idempotent() {
        let (doc, registry, id) = setup("hi");
        let mut indicator = IndicatorPresenter::new(45);
        indicator.show(&doc, &registry, id);
        indicator.hide();
        indicator.hide();
        assert_eq!(indicator.state(), &IndicatorState::Hidden);
        assert_eq!(indicator.click(), None);
    }
}

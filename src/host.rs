//! In-process model of the page the assistant attaches to.
//!
//! Elements live in an arena and are addressed by [`ElementId`]. Everything the
//! assistant keeps about an element is a copy of its id, never the element
//! itself, so a removed element simply stops being attached.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    pub fn raw(self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputType {
    Text,
    Email,
    Search,
    Url,
    Tel,
    Password,
    Number,
    Checkbox,
}

impl InputType {
    fn is_textual(self) -> bool {
        matches!(
            self,
            InputType::Text
                | InputType::Email
                | InputType::Search
                | InputType::Url
                | InputType::Tel
                | InputType::Password
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Input(InputType),
    TextArea,
    /// Content-editable region; text lives in its text content.
    Editable,
    Block,
}

impl ElementKind {
    /// Elements whose text is carried by a settable value property.
    pub fn is_value_bearing(self) -> bool {
        matches!(self, ElementKind::Input(_) | ElementKind::TextArea)
    }

    pub fn is_password(self) -> bool {
        matches!(self, ElementKind::Input(InputType::Password))
    }

    /// Structural shape of something a user could type into.
    pub fn is_text_candidate(self) -> bool {
        match self {
            ElementKind::Input(t) => t.is_textual(),
            ElementKind::TextArea | ElementKind::Editable => true,
            ElementKind::Block => false,
        }
    }

    pub fn is_focusable(self) -> bool {
        !matches!(self, ElementKind::Block)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
}

/// Description of an element (and optionally its subtree) to insert.
#[derive(Clone, Debug)]
pub struct ElementSpec {
    pub kind: ElementKind,
    pub label: String,
    pub rect: Rect,
    pub hidden: bool,
    pub text: String,
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new(kind: ElementKind, label: impl Into<String>, rect: Rect) -> Self {
        Self {
            kind,
            label: label.into(),
            rect,
            hidden: false,
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn input(input_type: InputType, label: impl Into<String>, rect: Rect) -> Self {
        Self::new(ElementKind::Input(input_type), label, rect)
    }

    pub fn text_area(label: impl Into<String>, rect: Rect) -> Self {
        Self::new(ElementKind::TextArea, label, rect)
    }

    pub fn editable(label: impl Into<String>, rect: Rect) -> Self {
        Self::new(ElementKind::Editable, label, rect)
    }

    pub fn block(label: impl Into<String>, rect: Rect) -> Self {
        Self::new(ElementKind::Block, label, rect)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Clone, Debug)]
pub struct Element {
    pub id: ElementId,
    pub kind: ElementKind,
    pub label: String,
    pub rect: Rect,
    pub hidden: bool,
    pub value: String,
    pub text_content: String,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

impl Element {
    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    /// Text as the element exposes it: the value for value-bearing kinds,
    /// the text content otherwise.
    pub fn text(&self) -> &str {
        if self.kind.is_value_bearing() {
            &self.value
        } else {
            &self.text_content
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DomEventKind {
    Focus,
    Blur,
    Input,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DomEvent {
    pub target: ElementId,
    pub kind: DomEventKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Receiving end of a structural-change subscription. Each message is one
/// batch of inserted subtree roots.
pub struct MutationSubscription {
    pub id: ObserverId,
    pub root: ElementId,
    pub batches: mpsc::UnboundedReceiver<Vec<ElementId>>,
}

struct Observer {
    root: ElementId,
    tx: mpsc::UnboundedSender<Vec<ElementId>>,
    pending: Vec<ElementId>,
}

pub struct HostDocument {
    url: String,
    viewport: Viewport,
    root: ElementId,
    elements: HashMap<ElementId, Element>,
    next_id: u64,
    focused: Option<ElementId>,
    events: VecDeque<DomEvent>,
    observers: HashMap<ObserverId, Observer>,
    next_observer: u64,
}

impl HostDocument {
    pub fn new(url: impl Into<String>, viewport: Viewport) -> Self {
        let root = ElementId(0);
        let body = Element {
            id: root,
            kind: ElementKind::Block,
            label: "body".to_string(),
            rect: Rect::new(0, 0, viewport.width, viewport.height),
            hidden: false,
            value: String::new(),
            text_content: String::new(),
            parent: None,
            children: Vec::new(),
        };
        let mut elements = HashMap::new();
        elements.insert(root, body);
        Self {
            url: url.into(),
            viewport,
            root,
            elements,
            next_id: 1,
            focused: None,
            events: VecDeque::new(),
            observers: HashMap::new(),
            next_observer: 0,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Window resize. The body follows the viewport; other layout stays put.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        if let Some(body) = self.elements.get_mut(&self.root) {
            body.rect = Rect::new(0, 0, viewport.width, viewport.height);
        }
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn rect(&self, id: ElementId) -> Option<Rect> {
        self.elements.get(&id).map(|e| e.rect)
    }

    pub fn focused(&self) -> Option<ElementId> {
        self.focused
    }

    /// Inserts `spec` (with its subtree) as the last child of `parent`.
    /// Returns `None` when the parent does not exist.
    pub fn append(&mut self, parent: ElementId, spec: ElementSpec) -> Option<ElementId> {
        if !self.elements.contains_key(&parent) {
            return None;
        }
        let id = self.build(parent, spec);
        if let Some(p) = self.elements.get_mut(&parent) {
            p.children.push(id);
        }
        if self.is_attached(id) {
            self.queue_insertion(parent, id);
        }
        Some(id)
    }

    fn build(&mut self, parent: ElementId, spec: ElementSpec) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        let (value, text_content) = if spec.kind.is_value_bearing() {
            (spec.text, String::new())
        } else {
            (String::new(), spec.text)
        };
        self.elements.insert(
            id,
            Element {
                id,
                kind: spec.kind,
                label: spec.label,
                rect: spec.rect,
                hidden: spec.hidden,
                value,
                text_content,
                parent: Some(parent),
                children: Vec::new(),
            },
        );
        for child in spec.children {
            let child_id = self.build(id, child);
            if let Some(e) = self.elements.get_mut(&id) {
                e.children.push(child_id);
            }
        }
        id
    }

    /// Detaches `id` and its subtree from the document. Observers are not
    /// notified of removals.
    pub fn remove(&mut self, id: ElementId) -> bool {
        if id == self.root {
            return false;
        }
        let Some(parent) = self.elements.get(&id).and_then(|e| e.parent) else {
            return false;
        };
        if let Some(p) = self.elements.get_mut(&parent) {
            p.children.retain(|c| *c != id);
        }
        if let Some(e) = self.elements.get_mut(&id) {
            e.parent = None;
        }
        if self.focused.is_some_and(|f| self.descends_from(f, id)) {
            self.focused = None;
        }
        true
    }

    pub fn set_hidden(&mut self, id: ElementId, hidden: bool) {
        if let Some(e) = self.elements.get_mut(&id) {
            e.hidden = hidden;
        }
    }

    pub fn set_rect(&mut self, id: ElementId, rect: Rect) {
        if let Some(e) = self.elements.get_mut(&id) {
            e.rect = rect;
        }
    }

    pub fn is_attached(&self, id: ElementId) -> bool {
        self.descends_from(id, self.root)
    }

    fn descends_from(&self, id: ElementId, ancestor: ElementId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.elements.get(&current).and_then(|e| e.parent);
        }
        false
    }

    /// Attached, and neither the element nor any ancestor is hidden.
    pub fn is_rendered(&self, id: ElementId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(e) = self.elements.get(&current) else {
                return false;
            };
            if e.hidden {
                return false;
            }
            if current == self.root {
                return true;
            }
            cursor = e.parent;
        }
        false
    }

    /// Inclusive pre-order walk of the subtree under `id`.
    pub fn descendants(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(e) = self.elements.get(&current) else {
                continue;
            };
            out.push(current);
            stack.extend(e.children.iter().rev().copied());
        }
        out
    }

    /// Focusable elements in document order, for tab navigation.
    pub fn focus_order(&self) -> Vec<ElementId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|id| {
                self.elements
                    .get(id)
                    .is_some_and(|e| e.kind.is_focusable())
                    && self.is_rendered(*id)
            })
            .collect()
    }

    pub fn focus(&mut self, id: ElementId) {
        if self.focused == Some(id) || !self.elements.contains_key(&id) {
            return;
        }
        self.blur();
        self.focused = Some(id);
        self.events.push_back(DomEvent {
            target: id,
            kind: DomEventKind::Focus,
        });
    }

    pub fn blur(&mut self) {
        if let Some(prev) = self.focused.take() {
            self.events.push_back(DomEvent {
                target: prev,
                kind: DomEventKind::Blur,
            });
        }
    }

    pub fn text(&self, id: ElementId) -> Option<&str> {
        self.elements.get(&id).map(Element::text)
    }

    /// Writes through the element's text property without notifying anyone.
    pub fn write_text(&mut self, id: ElementId, text: &str) -> bool {
        let Some(e) = self.elements.get_mut(&id) else {
            return false;
        };
        if e.kind.is_value_bearing() {
            e.value = text.to_string();
        } else {
            e.text_content = text.to_string();
        }
        true
    }

    /// User typing: appends and fires a content-changed notification.
    pub fn type_text(&mut self, id: ElementId, s: &str) {
        let Some(current) = self.text(id).map(str::to_string) else {
            return;
        };
        if self.write_text(id, &(current + s)) {
            self.dispatch_input(id);
        }
    }

    pub fn backspace(&mut self, id: ElementId) {
        let Some(mut current) = self.text(id).map(str::to_string) else {
            return;
        };
        if current.pop().is_some() && self.write_text(id, &current) {
            self.dispatch_input(id);
        }
    }

    pub fn dispatch_input(&mut self, id: ElementId) {
        self.events.push_back(DomEvent {
            target: id,
            kind: DomEventKind::Input,
        });
    }

    pub fn drain_events(&mut self) -> Vec<DomEvent> {
        self.events.drain(..).collect()
    }

    pub fn observe(&mut self, root: ElementId) -> MutationSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.insert(
            id,
            Observer {
                root,
                tx,
                pending: Vec::new(),
            },
        );
        MutationSubscription {
            id,
            root,
            batches: rx,
        }
    }

    pub fn disconnect(&mut self, id: ObserverId) {
        self.observers.remove(&id);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn queue_insertion(&mut self, parent: ElementId, inserted: ElementId) {
        let scopes: Vec<(ObserverId, ElementId)> =
            self.observers.iter().map(|(id, o)| (*id, o.root)).collect();
        for (observer_id, root) in scopes {
            if self.descends_from(parent, root) {
                if let Some(o) = self.observers.get_mut(&observer_id) {
                    o.pending.push(inserted);
                }
            }
        }
    }

    /// Delivers queued insertions, one batch per observer.
    pub fn flush_mutations(&mut self) {
        let mut dead = Vec::new();
        for (id, observer) in self.observers.iter_mut() {
            if observer.pending.is_empty() {
                continue;
            }
            let batch = std::mem::take(&mut observer.pending);
            if observer.tx.send(batch).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            self.observers.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> HostDocument {
        HostDocument::new("https://example.test/compose", Viewport { width: 800, height: 600 })
    }

    #[test]
    fn value_and_text_content_are_kept_apart() {
        let mut doc = page();
        let root = doc.root();
        let input = doc
            .append(root, ElementSpec::input(InputType::Text, "subject", Rect::new(0, 0, 200, 30)).with_text("hi"))
            .unwrap();
        let notes = doc
            .append(root, ElementSpec::editable("notes", Rect::new(0, 40, 200, 60)).with_text("draft"))
            .unwrap();
        assert_eq!(doc.get(input).unwrap().value, "hi");
        assert_eq!(doc.get(notes).unwrap().text_content, "draft");
        assert_eq!(doc.text(notes), Some("draft"));
    }

    #[test]
    fn hidden_ancestor_hides_descendants() {
        let mut doc = page();
        let root = doc.root();
        let wrapper = doc
            .append(
                root,
                ElementSpec::block("wrapper", Rect::new(0, 0, 300, 100))
                    .child(ElementSpec::text_area("body", Rect::new(0, 0, 300, 80))),
            )
            .unwrap();
        let area = doc.get(wrapper).unwrap().children()[0];
        assert!(doc.is_rendered(area));
        doc.set_hidden(wrapper, true);
        assert!(!doc.is_rendered(area));
    }

    #[test]
    fn removed_subtree_is_detached_and_loses_focus() {
        let mut doc = page();
        let root = doc.root();
        let input = doc
            .append(root, ElementSpec::input(InputType::Text, "a", Rect::new(0, 0, 100, 30)))
            .unwrap();
        doc.focus(input);
        assert!(doc.remove(input));
        assert!(!doc.is_attached(input));
        assert!(!doc.is_rendered(input));
        assert_eq!(doc.focused(), None);
    }

    #[test]
    fn focus_change_emits_blur_then_focus() {
        let mut doc = page();
        let root = doc.root();
        let a = doc
            .append(root, ElementSpec::input(InputType::Text, "a", Rect::new(0, 0, 100, 30)))
            .unwrap();
        let b = doc
            .append(root, ElementSpec::input(InputType::Text, "b", Rect::new(0, 40, 100, 30)))
            .unwrap();
        doc.focus(a);
        doc.focus(b);
        let kinds: Vec<_> = doc.drain_events().into_iter().map(|e| (e.target, e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (a, DomEventKind::Focus),
                (a, DomEventKind::Blur),
                (b, DomEventKind::Focus)
            ]
        );
    }

    #[test]
    fn insertions_are_batched_until_flush() {
        let mut doc = page();
        let root = doc.root();
        let mut sub = doc.observe(root);
        let a = doc
            .append(root, ElementSpec::input(InputType::Text, "a", Rect::new(0, 0, 100, 30)))
            .unwrap();
        let b = doc
            .append(root, ElementSpec::input(InputType::Text, "b", Rect::new(0, 40, 100, 30)))
            .unwrap();
        assert!(sub.batches.try_recv().is_err());
        doc.flush_mutations();
        assert_eq!(sub.batches.try_recv().unwrap(), vec![a, b]);
    }

    #[test]
    fn observer_scope_limits_notifications() {
        let mut doc = page();
        let root = doc.root();
        let left = doc.append(root, ElementSpec::block("left", Rect::new(0, 0, 100, 100))).unwrap();
        let right = doc.append(root, ElementSpec::block("right", Rect::new(100, 0, 100, 100))).unwrap();
        let mut sub = doc.observe(left);
        doc.append(right, ElementSpec::text_area("x", Rect::new(0, 0, 90, 40)));
        doc.flush_mutations();
        assert!(sub.batches.try_recv().is_err());
        doc.disconnect(sub.id);
        doc.disconnect(sub.id);
        assert_eq!(doc.observer_count(), 0);
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use ego_tree::{NodeId, NodeMut, NodeRef, Tree};
use tokio::sync::mpsc;
use tracing::debug;

use tandem_core::{ActionKind, ActionRecord, Error, Result};

use crate::event::PageEvent;
use crate::locator;
use crate::selector::SimpleSelector;

const DOCUMENT_TAG: &str = "#document";

/// One element node of the page model.
#[derive(Debug, Clone)]
pub struct Element {
    /// Lowercase tag name; `#document` for the synthetic root.
    pub tag: String,
    pub attrs: HashMap<String, String>,
    /// Current value, mutable by user input and by replay.
    pub value: String,
    /// Value as parsed, restored on reload.
    default_value: String,
}

impl Element {
    fn document() -> Self {
        Self {
            tag: DOCUMENT_TAG.to_string(),
            attrs: HashMap::new(),
            value: String::new(),
            default_value: String::new(),
        }
    }

    pub fn is_element(&self) -> bool {
        self.tag != DOCUMENT_TAG
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Uppercase tag name as carried on the wire (`INPUT`, `BUTTON`).
    pub fn tag_name(&self) -> String {
        self.tag.to_uppercase()
    }

    /// The fields `global:control` targets: text/password inputs and textareas.
    fn is_text_entry(&self) -> bool {
        match self.tag.as_str() {
            "textarea" => true,
            "input" => matches!(self.attr("type"), Some("text") | Some("password")),
            _ => false,
        }
    }
}

/// Synchronous capture-phase observer.
pub type Observer = Arc<dyn Fn(&PageEvent) + Send + Sync>;

struct PageInner {
    tree: Tree<Element>,
    /// One-shot programmatic-change markers, keyed by element identity.
    /// Set just before a replay mutates an element, cleared on the first
    /// observation of the resulting event.
    markers: HashSet<NodeId>,
    listeners: Vec<mpsc::UnboundedSender<PageEvent>>,
    observers: Vec<Observer>,
    location: Option<String>,
}

/// Shared handle to one client's page model.
///
/// Stands in for the document of a real client: capture-phase listeners
/// subscribe to its event stream, replay mutates it through synthetic
/// events, and the locator addresses its elements structurally.
#[derive(Clone)]
pub struct PageHandle {
    inner: Arc<Mutex<PageInner>>,
}

impl PageHandle {
    /// Parse an HTML document into a page model. Only element nodes are
    /// retained; text, comments and the doctype have no structural identity.
    pub fn parse(html: &str) -> Self {
        let parsed = scraper::Html::parse_document(html);
        let mut tree = Tree::new(Element::document());
        copy_elements(&parsed.tree.root(), &mut tree.root_mut());
        Self {
            inner: Arc::new(Mutex::new(PageInner {
                tree,
                markers: HashSet::new(),
                listeners: Vec::new(),
                observers: Vec::new(),
                location: None,
            })),
        }
    }

    pub fn empty() -> Self {
        Self::parse("<html><body></body></html>")
    }

    /// Register a document-level listener fed asynchronously, for code that
    /// only observes the page (tests, demo reporting).
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PageEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().listeners.push(tx);
        rx
    }

    /// Register a capture-phase observer, invoked synchronously while the
    /// event is dispatched — before control returns to whatever mutated the
    /// page. This is the hook the capture filter needs: its policy must read
    /// the marker set and the executing flag at event time, not later.
    pub fn add_observer(&self, observer: Observer) {
        self.inner.lock().unwrap().observers.push(observer);
    }

    pub fn locate(&self, id: NodeId) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        locator::locate(&inner.tree, id)
    }

    pub fn resolve(&self, path: &str) -> Option<NodeId> {
        let inner = self.inner.lock().unwrap();
        locator::resolve(&inner.tree, path)
    }

    /// Tag name and current value of an element, as the codec records them.
    pub fn describe(&self, id: NodeId) -> Option<(String, String)> {
        let inner = self.inner.lock().unwrap();
        let node = inner.tree.get(id)?;
        let el = node.value();
        el.is_element().then(|| (el.tag_name(), el.value.clone()))
    }

    pub fn value_of(&self, id: NodeId) -> Option<String> {
        self.describe(id).map(|(_, value)| value)
    }

    pub fn all_elements(&self) -> Vec<NodeId> {
        let inner = self.inner.lock().unwrap();
        inner
            .tree
            .root()
            .descendants()
            .filter(|n| n.value().is_element())
            .map(|n| n.id())
            .collect()
    }

    pub fn select_all(&self, selector: &str) -> Vec<NodeId> {
        let Some(sel) = SimpleSelector::parse(selector) else {
            return Vec::new();
        };
        let inner = self.inner.lock().unwrap();
        inner
            .tree
            .root()
            .descendants()
            .filter(|n| n.value().is_element() && sel.matches(n.value()))
            .map(|n| n.id())
            .collect()
    }

    pub fn select_first(&self, selector: &str) -> Option<NodeId> {
        self.select_all(selector).into_iter().next()
    }

    // ---- markers -----------------------------------------------------

    /// Flag an element so the next observed event on it is ignored.
    pub fn mark_programmatic(&self, id: NodeId) {
        self.inner.lock().unwrap().markers.insert(id);
    }

    /// Consume the marker for an element. Returns whether it was set;
    /// either way it is no longer set afterwards (one-shot).
    pub fn take_marker(&self, id: NodeId) -> bool {
        self.inner.lock().unwrap().markers.remove(&id)
    }

    // ---- events ------------------------------------------------------

    /// A user (or replayed) click on an element.
    pub fn click(&self, id: NodeId) {
        self.dispatch(PageEvent {
            target: id,
            kind: ActionKind::Click,
            value: None,
            ignore: false,
        });
    }

    /// Simulated user input: write the value and raise the event, exactly
    /// what a keystroke or a change commit does in a real document.
    pub fn user_input(&self, id: NodeId, value: &str, kind: ActionKind) {
        self.set_value(id, value);
        self.dispatch(PageEvent {
            target: id,
            kind,
            value: Some(value.to_string()),
            ignore: false,
        });
    }

    fn set_value(&self, id: NodeId, value: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(mut node) = inner.tree.get_mut(id) {
            node.value().value = value.to_string();
        }
    }

    fn dispatch(&self, event: PageEvent) {
        let observers = {
            let mut inner = self.inner.lock().unwrap();
            inner
                .listeners
                .retain(|listener| listener.send(event.clone()).is_ok());
            inner.observers.clone()
        };
        // The page lock is released here: observers call back into the
        // handle (marker reads, locate).
        for observer in observers {
            observer(&event);
        }
    }

    // ---- replay ------------------------------------------------------

    /// Apply one replicated action to the local document.
    ///
    /// Value mutations set the programmatic marker before touching the
    /// element, so the local capture filter discards the synthetic event
    /// instead of treating it as fresh master input.
    pub fn apply_action(&self, record: &ActionRecord) -> Result<()> {
        let id = self.resolve(&record.target_path).ok_or_else(|| {
            Error::AddressResolution(record.target_path.clone())
        })?;
        if record.kind.is_value_mutation() {
            let value = record.value.clone().unwrap_or_default();
            self.mark_programmatic(id);
            self.set_value(id, &value);
            self.dispatch(PageEvent {
                target: id,
                kind: record.kind,
                value: Some(value),
                ignore: false,
            });
        } else {
            self.click(id);
        }
        debug!(path = %record.target_path, kind = %record.kind.as_str(), "applied replicated action");
        Ok(())
    }

    /// Fill every text entry field with `value`, or a per-element fallback,
    /// raising a synthetic ignore-flagged `input` event per field. Returns
    /// the number of fields touched.
    pub fn fill_text_inputs(&self, value: Option<&str>) -> usize {
        let targets: Vec<NodeId> = {
            let inner = self.inner.lock().unwrap();
            inner
                .tree
                .root()
                .descendants()
                .filter(|n| n.value().is_text_entry())
                .map(|n| n.id())
                .collect()
        };
        for (index, id) in targets.iter().enumerate() {
            let filled = match value {
                Some(v) => v.to_string(),
                None => format!("value {index}"),
            };
            self.set_value(*id, &filled);
            self.dispatch(PageEvent {
                target: *id,
                kind: ActionKind::Input,
                value: Some(filled),
                ignore: true,
            });
        }
        targets.len()
    }

    // ---- navigation --------------------------------------------------

    pub fn location(&self) -> Option<String> {
        self.inner.lock().unwrap().location.clone()
    }

    /// Navigate away: the current document is torn down.
    pub fn navigate(&self, url: &str) {
        let mut inner = self.inner.lock().unwrap();
        let mut tree = Tree::new(Element::document());
        copy_elements(
            &scraper::Html::parse_document("<html><body></body></html>")
                .tree
                .root(),
            &mut tree.root_mut(),
        );
        inner.tree = tree;
        inner.markers.clear();
        inner.location = Some(url.to_string());
    }

    /// Reload in place: values reset to their parsed defaults.
    pub fn reload(&self) {
        let mut inner = self.inner.lock().unwrap();
        let ids: Vec<NodeId> = inner.tree.root().descendants().map(|n| n.id()).collect();
        for id in ids {
            if let Some(mut node) = inner.tree.get_mut(id) {
                let el = node.value();
                el.value = el.default_value.clone();
            }
        }
        inner.markers.clear();
    }
}

fn copy_elements(src: &NodeRef<'_, scraper::Node>, dst: &mut NodeMut<'_, Element>) {
    for child in src.children() {
        if let scraper::Node::Element(el) = child.value() {
            let mut attrs = HashMap::new();
            for (name, value) in el.attrs() {
                attrs.insert(name.to_string(), value.to_string());
            }
            let value = attrs.get("value").cloned().unwrap_or_default();
            let mut node = dst.append(Element {
                tag: el.name().to_lowercase(),
                attrs,
                default_value: value.clone(),
                value,
            });
            copy_elements(&child, &mut node);
        }
    }
}

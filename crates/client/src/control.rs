//! The control capability contract and the per-node state behind it.
//!
//! Every control type, container or leaf, is a thin data holder over a
//! [`NodeState`]: a typed attribute store, an optional server-assigned
//! id, the previous-children snapshot used as the diff baseline, and
//! local event handler slots. The synchronization engine only ever
//! talks to controls through the [`Control`] trait.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::attrs::{AttrStore, AttrValue};
use crate::event::EventHandler;
use crate::page::{Page, PageInner};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Stable surrogate key identifying one control instance, assigned in
/// creation order. Child-list diffs compare these keys, so two
/// structurally identical but distinct controls never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u64);

impl NodeKey {
    fn next() -> Self {
        NodeKey(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Shared per-node state embedded in every control type.
pub struct NodeState {
    key: NodeKey,
    attrs: Mutex<AttrStore>,
    uid: Mutex<Option<String>>,
    previous_children: Mutex<Vec<Arc<dyn Control>>>,
    handlers: Mutex<HashMap<String, EventHandler>>,
    page: Mutex<Weak<PageInner>>,
}

impl NodeState {
    pub fn new() -> Self {
        Self {
            key: NodeKey::next(),
            attrs: Mutex::new(AttrStore::new()),
            uid: Mutex::new(None),
            previous_children: Mutex::new(Vec::new()),
            handlers: Mutex::new(HashMap::new()),
            page: Mutex::new(Weak::new()),
        }
    }

    /// State carrying a pre-reserved id, used only for the page root.
    pub(crate) fn with_uid(uid: &str) -> Self {
        let state = Self::new();
        *state.uid.lock() = Some(uid.to_string());
        state.attrs.lock().set_with_dirty("id", Some(uid.into()), true);
        state
    }

    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// The server-assigned id, once the host has acknowledged the node.
    pub fn uid(&self) -> Option<String> {
        self.uid.lock().clone()
    }

    pub(crate) fn set_uid(&self, uid: &str) {
        *self.uid.lock() = Some(uid.to_string());
    }

    // ── Attributes ───────────────────────────────────────────────────

    pub fn get_attr(&self, name: &str) -> Option<AttrValue> {
        self.attrs.lock().get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<String> {
        self.attrs.lock().get_str(name)
    }

    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        self.attrs.lock().get_bool(name, default)
    }

    pub fn get_number(&self, name: &str, default: f64) -> f64 {
        self.attrs.lock().get_number(name, default)
    }

    pub fn get_date(&self, name: &str) -> Option<DateTime<Utc>> {
        self.attrs.lock().get_date(name)
    }

    pub fn set_attr(&self, name: &str, value: Option<AttrValue>) {
        self.attrs.lock().set(name, value);
    }

    /// Apply a host-originated value without marking the slot dirty, so
    /// the next synchronization does not echo it back.
    pub(crate) fn set_attr_clean(&self, name: &str, value: Option<AttrValue>) {
        self.attrs.lock().set_with_dirty(name, value, false);
    }

    pub(crate) fn fold_command_attrs(&self, dirty_only: bool) -> std::collections::BTreeMap<String, String> {
        self.attrs.lock().fold_command_attrs(dirty_only)
    }

    // ── Event handlers ───────────────────────────────────────────────

    pub fn set_handler(&self, event_name: &str, handler: Option<EventHandler>) {
        let mut handlers = self.handlers.lock();
        match handler {
            Some(h) => {
                handlers.insert(event_name.to_string(), h);
            }
            None => {
                handlers.remove(event_name);
            }
        }
    }

    pub fn handler(&self, event_name: &str) -> Option<EventHandler> {
        self.handlers.lock().get(event_name).cloned()
    }

    // ── Page attachment ──────────────────────────────────────────────

    /// The page this control is attached to, if any.
    pub fn page(&self) -> Option<Page> {
        self.page.lock().upgrade().map(Page::from_inner)
    }

    pub(crate) fn attach_page(&self, page: Weak<PageInner>) {
        *self.page.lock() = page;
    }

    // ── Diff baseline ────────────────────────────────────────────────

    pub(crate) fn previous_children(&self) -> Vec<Arc<dyn Control>> {
        self.previous_children.lock().clone()
    }

    pub(crate) fn replace_previous_children(&self, children: Vec<Arc<dyn Control>>) {
        *self.previous_children.lock() = children;
    }

    pub(crate) fn clear_previous_children(&self) {
        self.previous_children.lock().clear();
    }
}

impl Default for NodeState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeState")
            .field("key", &self.key)
            .field("uid", &*self.uid.lock())
            .finish()
    }
}

/// Capability contract every control type implements.
///
/// The synchronization engine needs nothing beyond this: a type name,
/// the shared node state, and the ordered child list (empty for
/// leaves).
pub trait Control: Send + Sync + 'static {
    /// The control type name sent to the host, e.g. `"text"`.
    fn control_name(&self) -> &str;

    /// Shared node state.
    fn state(&self) -> &NodeState;

    /// Current ordered children. Leaves return an empty list.
    fn children(&self) -> Vec<Arc<dyn Control>> {
        Vec::new()
    }

    /// Downcast support for event consumers.
    fn as_any(&self) -> &dyn Any;

    // ── Provided accessors ───────────────────────────────────────────

    /// The server-assigned id, once synchronized.
    fn uid(&self) -> Option<String> {
        self.state().uid()
    }

    fn get_attr(&self, name: &str) -> Option<AttrValue> {
        self.state().get_attr(name)
    }

    fn set_attr(&self, name: &str, value: Option<AttrValue>) {
        self.state().set_attr(name, value);
    }

    fn set_event_handler(&self, event_name: &str, handler: Option<EventHandler>) {
        self.state().set_handler(event_name, handler);
    }

    fn event_handler(&self, event_name: &str) -> Option<EventHandler> {
        self.state().handler(event_name)
    }

    fn visible(&self) -> bool {
        self.state().get_bool("visible", true)
    }

    fn set_visible(&self, visible: bool) {
        self.state().set_attr("visible", Some(visible.into()));
    }

    fn disabled(&self) -> bool {
        self.state().get_bool("disabled", false)
    }

    fn set_disabled(&self, disabled: bool) {
        self.state().set_attr("disabled", Some(disabled.into()));
    }
}

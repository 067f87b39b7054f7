//! Layout container with an ordered child list.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::control::{Control, NodeState};

pub struct Stack {
    state: NodeState,
    children: Mutex<Vec<Arc<dyn Control>>>,
}

impl Stack {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: NodeState::new(),
            children: Mutex::new(Vec::new()),
        })
    }

    pub fn set_horizontal(&self, horizontal: bool) {
        self.state.set_attr("horizontal", Some(horizontal.into()));
    }

    pub fn set_gap(&self, gap: f64) {
        self.state.set_attr("gap", Some(gap.into()));
    }

    pub fn set_align(&self, align: &str) {
        self.state.set_attr("align", Some(align.into()));
    }

    // ── Child list ───────────────────────────────────────────────────
    //
    // Mutations are local; the host sees them on the next page sync.

    pub fn add_child(&self, control: Arc<dyn Control>) {
        self.children.lock().push(control);
    }

    pub fn insert_child(&self, at: usize, control: Arc<dyn Control>) {
        let mut children = self.children.lock();
        let at = at.min(children.len());
        children.insert(at, control);
    }

    /// Remove a child by identity. Unknown controls are ignored.
    pub fn remove_child(&self, control: &Arc<dyn Control>) {
        let key = control.state().key();
        self.children.lock().retain(|c| c.state().key() != key);
    }

    pub fn clear_children(&self) {
        self.children.lock().clear();
    }

    pub fn child_count(&self) -> usize {
        self.children.lock().len()
    }
}

impl Control for Stack {
    fn control_name(&self) -> &str {
        "stack"
    }

    fn state(&self) -> &NodeState {
        &self.state
    }

    fn children(&self) -> Vec<Arc<dyn Control>> {
        self.children.lock().clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

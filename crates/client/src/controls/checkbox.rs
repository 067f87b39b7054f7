//! Two-state checkbox.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use crate::control::{Control, NodeState};
use crate::event::{into_handler, ControlEvent};

pub struct Checkbox {
    state: NodeState,
}

impl Checkbox {
    pub fn new(label: &str) -> Arc<Self> {
        let checkbox = Self { state: NodeState::new() };
        checkbox.state.set_attr("label", Some(label.into()));
        Arc::new(checkbox)
    }

    pub fn value(&self) -> bool {
        self.state.get_bool("value", false)
    }

    pub fn set_value(&self, checked: bool) {
        self.state.set_attr("value", Some(checked.into()));
    }

    pub fn set_label(&self, label: &str) {
        self.state.set_attr("label", Some(label.into()));
    }

    pub fn on_change<F, Fut>(&self, handler: F)
    where
        F: Fn(ControlEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.state.set_handler("change", Some(into_handler(handler)));
    }
}

impl Control for Checkbox {
    fn control_name(&self) -> &str {
        "checkbox"
    }

    fn state(&self) -> &NodeState {
        &self.state
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

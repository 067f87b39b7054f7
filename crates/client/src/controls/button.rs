//! Push button.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use crate::control::{Control, NodeState};
use crate::event::{into_handler, ControlEvent};

pub struct Button {
    state: NodeState,
}

impl Button {
    pub fn new(text: &str) -> Arc<Self> {
        let button = Self { state: NodeState::new() };
        button.state.set_attr("text", Some(text.into()));
        Arc::new(button)
    }

    pub fn text(&self) -> String {
        self.state.get_str("text").unwrap_or_default()
    }

    pub fn set_text(&self, text: &str) {
        self.state.set_attr("text", Some(text.into()));
    }

    /// Render as the view's primary action.
    pub fn set_primary(&self, primary: bool) {
        self.state.set_attr("primary", Some(primary.into()));
    }

    pub fn set_icon(&self, icon: &str) {
        self.state.set_attr("icon", Some(icon.into()));
    }

    pub fn on_click<F, Fut>(&self, handler: F)
    where
        F: Fn(ControlEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.state.set_handler("click", Some(into_handler(handler)));
    }
}

impl Control for Button {
    fn control_name(&self) -> &str {
        "button"
    }

    fn state(&self) -> &NodeState {
        &self.state
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

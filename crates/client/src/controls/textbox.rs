//! Single- or multi-line text input.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use crate::control::{Control, NodeState};
use crate::event::{into_handler, ControlEvent};

pub struct Textbox {
    state: NodeState,
}

impl Textbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { state: NodeState::new() })
    }

    pub fn value(&self) -> String {
        self.state.get_str("value").unwrap_or_default()
    }

    pub fn set_value(&self, value: &str) {
        self.state.set_attr("value", Some(value.into()));
    }

    pub fn set_label(&self, label: &str) {
        self.state.set_attr("label", Some(label.into()));
    }

    pub fn set_placeholder(&self, placeholder: &str) {
        self.state.set_attr("placeholder", Some(placeholder.into()));
    }

    pub fn set_multiline(&self, multiline: bool) {
        self.state.set_attr("multiline", Some(multiline.into()));
    }

    pub fn set_password(&self, password: bool) {
        self.state.set_attr("password", Some(password.into()));
    }

    /// Fired as the user edits; the new value also arrives through the
    /// page `change` delta batch.
    pub fn on_change<F, Fut>(&self, handler: F)
    where
        F: Fn(ControlEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.state.set_handler("change", Some(into_handler(handler)));
    }
}

impl Control for Textbox {
    fn control_name(&self) -> &str {
        "textbox"
    }

    fn state(&self) -> &NodeState {
        &self.state
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_defaults_empty() {
        let textbox = Textbox::new();
        assert_eq!(textbox.value(), "");
        textbox.set_value("typed");
        assert_eq!(textbox.value(), "typed");
    }
}

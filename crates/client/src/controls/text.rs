//! Static text.

use std::any::Any;
use std::sync::Arc;

use crate::control::{Control, NodeState};

pub struct Text {
    state: NodeState,
}

impl Text {
    pub fn new(value: &str) -> Arc<Self> {
        let text = Self { state: NodeState::new() };
        text.state.set_attr("value", Some(value.into()));
        Arc::new(text)
    }

    pub fn value(&self) -> String {
        self.state.get_str("value").unwrap_or_default()
    }

    pub fn set_value(&self, value: &str) {
        self.state.set_attr("value", Some(value.into()));
    }

    /// Type ramp name, e.g. `"small"`, `"large"`, `"xxLarge"`.
    pub fn set_size(&self, size: &str) {
        self.state.set_attr("size", Some(size.into()));
    }

    pub fn set_bold(&self, bold: bool) {
        self.state.set_attr("bold", Some(bold.into()));
    }

    pub fn set_italic(&self, italic: bool) {
        self.state.set_attr("italic", Some(italic.into()));
    }

    pub fn set_color(&self, color: &str) {
        self.state.set_attr("color", Some(color.into()));
    }

    pub fn set_align(&self, align: &str) {
        self.state.set_attr("align", Some(align.into()));
    }
}

impl Control for Text {
    fn control_name(&self) -> &str {
        "text"
    }

    fn state(&self) -> &NodeState {
        &self.state
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

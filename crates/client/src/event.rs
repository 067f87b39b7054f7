//! Event handlers and the events delivered to them.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::control::Control;
use crate::page::Page;

/// Boxed async callback bound to one event name of one control.
///
/// Handlers are purely local; they are never serialized and they run on
/// their own task so a slow handler cannot stall inbound dispatch.
pub type EventHandler = Arc<dyn Fn(ControlEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Wrap an async closure into an [`EventHandler`].
pub fn into_handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(ControlEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

/// A UI event routed to the control it targeted.
#[derive(Clone)]
pub struct ControlEvent {
    /// Assigned id of the target control.
    pub target: String,
    /// Event name, e.g. `click` or `change`.
    pub name: String,
    /// Free-form event data from the host.
    pub data: String,
    /// The control the event targeted.
    pub control: Arc<dyn Control>,
    /// The page the control belongs to.
    pub page: Page,
}

impl std::fmt::Debug for ControlEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlEvent")
            .field("target", &self.target)
            .field("name", &self.name)
            .field("data", &self.data)
            .finish()
    }
}

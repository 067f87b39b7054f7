//! `easel-client`: drive a remote rendering host from a local control
//! tree.
//!
//! Application code builds and mutates a tree of controls; this crate
//! keeps the host synchronized with that tree over one persistent
//! socket connection. Per-node attribute stores track what changed, an
//! ordered diff of each child list produces a minimal command script,
//! and the connection layer multiplexes correlated command replies with
//! host-pushed events.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Your app                                                   │
//! │                                                             │
//! │    let page = connect().page_name("hello").open_page()?;    │
//! │    let txt = Text::new("Hello, world!");                    │
//! │    page.add(vec![txt.clone() as _]).await?;                 │
//! │    txt.set_value("Hello again!");                           │
//! │    page.update().await?;                                    │
//! └───────────────┬─────────────────────────────────────────────┘
//!                 │ control tree + attr dirty flags
//!        ┌────────▼────────┐  diff / serialize   ┌──────────────┐
//!        │      Page       ├─────────────────────►   commands   │
//!        │ (index, lock)   │   minted ids        └──────┬───────┘
//!        └────────┬────────┘◄─────────────────────      │
//!                 │                                     │
//!        ┌────────▼────────┐   correlated replies,      │
//!        │   Connection    │   pushed events     ┌──────▼───────┐
//!        │ (pending map)   ├─────────────────────►     host     │
//!        └─────────────────┘                     └──────────────┘
//! ```
//!
//! # Synchronization flow
//!
//! 1. Mutate attributes and child lists locally; nothing is sent.
//! 2. `page.update()` (or `add`/`insert`/`remove`) diffs every changed
//!    subtree against its last-sent snapshot under the page lock.
//! 3. The resulting command batch travels in one correlated call;
//!    commands apply on the host in emission order.
//! 4. The reply's minted ids bind new controls into the page index,
//!    and the diff baselines advance. A failed call leaves them
//!    untouched, so the next sync retries the same delta.
//!
//! Host-pushed events (clicks, input changes, new app sessions) are
//! dispatched on their own tasks and routed to the control handlers
//! registered locally.

pub mod attrs;
pub mod client;
pub mod connection;
pub mod control;
pub mod controls;
pub mod error;
pub mod event;
pub mod page;
mod sync;
pub mod transport;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use attrs::{AttrStore, AttrValue};
pub use client::{connect, ConnectBuilder};
pub use connection::{Connection, WeakConnection, DEFAULT_REPLY_TIMEOUT};
pub use control::{Control, NodeKey, NodeState};
pub use controls::{Button, Checkbox, Stack, Text, Textbox};
pub use error::{Error, Result};
pub use event::{into_handler, ControlEvent, EventHandler};
pub use page::Page;
pub use transport::{Transport, TransportError, WsTransport};

// Re-export the wire crate so applications rarely need to depend on it
// directly.
pub use easel_protocol as protocol;

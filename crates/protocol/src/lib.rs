//! Wire protocol between a host client and the rendering host.
//!
//! Everything that crosses the socket lives here: the correlation
//! envelope, the indentation-addressed command script, and the typed
//! request/response payloads for each action. The crate is wire-only
//! on purpose; tree state and connection management live in
//! `easel-client`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Session id of a shared (non-app) page.
pub const ZERO_SESSION: &str = "0";

/// Action names understood by the host.
pub mod actions {
    /// Client -> host: register this process as the page's host client.
    pub const REGISTER_HOST_CLIENT: &str = "registerHostClient";
    /// Host -> client push: a new session was created for an app page.
    pub const SESSION_CREATED: &str = "sessionCreated";
    /// Client -> host: execute a single page command.
    pub const PAGE_COMMAND_FROM_HOST: &str = "pageCommandFromHost";
    /// Client -> host: execute an ordered command batch.
    pub const PAGE_COMMANDS_BATCH_FROM_HOST: &str = "pageCommandsBatchFromHost";
    /// Host -> client push: a UI event fired in some session.
    pub const PAGE_EVENT_TO_HOST: &str = "pageEventToHost";
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Envelope
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One frame on the wire: a correlation id, an action name, and an
/// action-specific payload.
///
/// Requests carry a fresh unique `id` and the host echoes it back on
/// the reply. Host-originated pushes carry an empty `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn request(id: impl Into<String>, action: &str, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            action: action.to_string(),
            payload,
        }
    }

    /// A push is any envelope without a correlation id.
    pub fn is_push(&self) -> bool {
        self.id.is_empty()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Commands
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One unit of the command script sent to the host.
///
/// `indent` is the nesting depth the host uses to reconstruct tree
/// structure. A command without a `name` defines a control (its type
/// name is the first positional value). An `add` command carries the
/// new subtree inline in `commands`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default)]
    pub indent: usize,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default)]
    pub commands: Vec<Command>,
}

impl Command {
    /// A named operation at indent 0, e.g. `remove` or `get`.
    pub fn op(name: &str, values: Vec<String>) -> Self {
        Self {
            name: Some(name.to_string()),
            values,
            ..Self::default()
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response payloads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `registerHostClient` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterHostClientRequest {
    #[serde(rename = "hostClientID")]
    pub host_client_id: Option<String>,
    pub page_name: String,
    pub is_app: bool,
    pub update: bool,
    pub auth_token: Option<String>,
    pub permissions: Option<String>,
}

/// `registerHostClient` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterHostClientResponse {
    #[serde(rename = "hostClientID")]
    pub host_client_id: Option<String>,
    pub page_name: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(default)]
    pub error: String,
}

/// `pageCommandFromHost` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCommandRequest {
    pub page_name: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub command: Command,
}

/// `pageCommandFromHost` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCommandResponse {
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub error: String,
}

/// `pageCommandsBatchFromHost` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCommandsBatchRequest {
    pub page_name: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub commands: Vec<Command>,
}

/// `pageCommandsBatchFromHost` reply.
///
/// `results` holds one line per output-producing command: for each
/// `add`, a whitespace-separated list of the ids minted for that
/// command's nodes, in serialization order; for each `get`, the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCommandsBatchResponse {
    #[serde(default)]
    pub results: Vec<String>,
    #[serde(default)]
    pub error: String,
}

/// `pageEventToHost` push payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEventPayload {
    pub page_name: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub event_target: String,
    pub event_name: String,
    #[serde(default)]
    pub event_data: String,
}

/// `sessionCreated` push payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreatedPayload {
    pub page_name: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

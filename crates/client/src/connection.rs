//! Correlated request/reply messaging over one host connection.
//!
//! Every outbound call gets a fresh correlation id and parks on a
//! oneshot until the matching reply arrives or the reply timeout
//! expires. Inbound frames without a correlation id are pushes; each
//! push handler runs on its own task so the dispatch loop never blocks
//! on handler code. Closing the connection completes every pending
//! call with [`Error::ConnectionClosed`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use easel_protocol::{
    actions, Command, Envelope, PageCommandRequest, PageCommandResponse, PageCommandsBatchRequest,
    PageCommandsBatchResponse, PageEventPayload, RegisterHostClientRequest,
    RegisterHostClientResponse, SessionCreatedPayload,
};

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Default time to wait for a correlated reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

type PushHandler<T> = Arc<dyn Fn(T) + Send + Sync>;

#[derive(Default)]
struct HostDetails {
    host_client_id: Option<String>,
    page_name: String,
    page_url: Option<String>,
}

struct ConnInner {
    transport: Arc<dyn Transport>,
    pending: Mutex<HashMap<String, oneshot::Sender<serde_json::Value>>>,
    event_handler: Mutex<Option<PushHandler<PageEventPayload>>>,
    session_handler: Mutex<Option<PushHandler<SessionCreatedPayload>>>,
    details: Mutex<HostDetails>,
    reply_timeout: Duration,
    closed: CancellationToken,
}

impl ConnInner {
    /// Complete every pending call with a closed-connection failure by
    /// dropping its sender.
    fn fail_pending(&self) {
        let dropped = self.pending.lock().drain().count();
        if dropped > 0 {
            tracing::warn!(count = dropped, "connection closed with calls pending");
        }
    }

    fn dispatch(&self, raw: String) {
        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "dropping unparseable frame");
                return;
            }
        };

        if !envelope.is_push() {
            match self.pending.lock().remove(&envelope.id) {
                // the caller may have timed out in the meantime
                Some(tx) => {
                    let _ = tx.send(envelope.payload);
                }
                None => tracing::debug!(id = %envelope.id, "reply for unknown or expired call"),
            }
            return;
        }

        match envelope.action.as_str() {
            actions::PAGE_EVENT_TO_HOST => {
                match serde_json::from_value::<PageEventPayload>(envelope.payload) {
                    Ok(payload) => {
                        if let Some(handler) = self.event_handler.lock().clone() {
                            tokio::spawn(async move { handler(payload) });
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "malformed page event"),
                }
            }
            actions::SESSION_CREATED => {
                match serde_json::from_value::<SessionCreatedPayload>(envelope.payload) {
                    Ok(payload) => {
                        tracing::info!(
                            page = %payload.page_name,
                            session = %payload.session_id,
                            "session created"
                        );
                        if let Some(handler) = self.session_handler.lock().clone() {
                            tokio::spawn(async move { handler(payload) });
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "malformed session notice"),
                }
            }
            other => tracing::debug!(action = %other, "ignoring unknown push"),
        }
    }
}

/// Cloneable handle to one host connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnInner>,
}

/// Weak connection handle for push handlers, which are owned by the
/// connection itself and must not keep it alive.
#[derive(Clone)]
pub struct WeakConnection {
    inner: std::sync::Weak<ConnInner>,
}

impl WeakConnection {
    pub fn upgrade(&self) -> Option<Connection> {
        self.inner.upgrade().map(|inner| Connection { inner })
    }
}

impl Connection {
    /// Start the dispatch loop over a connected transport.
    pub fn start(
        transport: Arc<dyn Transport>,
        mut inbound: mpsc::Receiver<String>,
        reply_timeout: Duration,
    ) -> Self {
        let inner = Arc::new(ConnInner {
            transport,
            pending: Mutex::new(HashMap::new()),
            event_handler: Mutex::new(None),
            session_handler: Mutex::new(None),
            details: Mutex::new(HostDetails::default()),
            reply_timeout,
            closed: CancellationToken::new(),
        });

        let dispatch_inner = inner.clone();
        tokio::spawn(async move {
            while let Some(raw) = inbound.recv().await {
                dispatch_inner.dispatch(raw);
            }
            tracing::debug!("inbound stream ended");
            dispatch_inner.fail_pending();
            dispatch_inner.closed.cancel();
        });

        Self { inner }
    }

    // ── Push handlers ────────────────────────────────────────────────

    /// Install the handler for `pageEventToHost` pushes.
    pub fn set_event_handler(&self, handler: impl Fn(PageEventPayload) + Send + Sync + 'static) {
        *self.inner.event_handler.lock() = Some(Arc::new(handler));
    }

    /// Install the handler for `sessionCreated` pushes.
    pub fn set_session_handler(&self, handler: impl Fn(SessionCreatedPayload) + Send + Sync + 'static) {
        *self.inner.session_handler.lock() = Some(Arc::new(handler));
    }

    // ── Typed calls ──────────────────────────────────────────────────

    /// Register this process as the page's host client.
    pub async fn register_host_client(
        &self,
        request: RegisterHostClientRequest,
    ) -> Result<RegisterHostClientResponse> {
        let payload = self
            .send_with_result(actions::REGISTER_HOST_CLIENT, serde_json::to_value(&request)?)
            .await?;
        let response: RegisterHostClientResponse = parse_reply(actions::REGISTER_HOST_CLIENT, payload)?;
        if !response.error.is_empty() {
            return Err(Error::Host(response.error));
        }
        {
            let mut details = self.inner.details.lock();
            details.host_client_id = response.host_client_id.clone();
            details.page_name = response.page_name.clone();
        }
        Ok(response)
    }

    /// Execute a single page command.
    pub async fn send_command(
        &self,
        page_name: &str,
        session_id: &str,
        command: Command,
    ) -> Result<PageCommandResponse> {
        let request = PageCommandRequest {
            page_name: page_name.to_string(),
            session_id: session_id.to_string(),
            command,
        };
        let payload = self
            .send_with_result(actions::PAGE_COMMAND_FROM_HOST, serde_json::to_value(&request)?)
            .await?;
        let response: PageCommandResponse = parse_reply(actions::PAGE_COMMAND_FROM_HOST, payload)?;
        if !response.error.is_empty() {
            return Err(Error::Host(response.error));
        }
        Ok(response)
    }

    /// Execute an ordered command batch.
    pub async fn send_commands(
        &self,
        page_name: &str,
        session_id: &str,
        commands: Vec<Command>,
    ) -> Result<PageCommandsBatchResponse> {
        let request = PageCommandsBatchRequest {
            page_name: page_name.to_string(),
            session_id: session_id.to_string(),
            commands,
        };
        let payload = self
            .send_with_result(
                actions::PAGE_COMMANDS_BATCH_FROM_HOST,
                serde_json::to_value(&request)?,
            )
            .await?;
        let response: PageCommandsBatchResponse =
            parse_reply(actions::PAGE_COMMANDS_BATCH_FROM_HOST, payload)?;
        if !response.error.is_empty() {
            return Err(Error::Host(response.error));
        }
        Ok(response)
    }

    /// Send a request and wait for its correlated reply.
    async fn send_with_result(&self, action: &str, payload: serde_json::Value) -> Result<serde_json::Value> {
        let id = Uuid::new_v4().simple().to_string();
        let envelope = Envelope::request(id.clone(), action, payload);
        let frame = serde_json::to_string(&envelope)?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(id.clone(), tx);

        tracing::debug!(id = %id, action = %action, "sending request");
        if let Err(e) = self.inner.transport.send(frame).await {
            self.inner.pending.lock().remove(&id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.inner.reply_timeout, rx).await {
            Ok(Ok(payload)) => Ok(payload),
            // sender dropped: connection torn down with the call pending
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                self.inner.pending.lock().remove(&id);
                tracing::warn!(id = %id, action = %action, "reply timed out");
                Err(Error::ReplyTimeout)
            }
        }
    }

    // ── Details / lifecycle ──────────────────────────────────────────

    /// The page name the host confirmed at registration.
    pub fn page_name(&self) -> String {
        self.inner.details.lock().page_name.clone()
    }

    pub fn host_client_id(&self) -> Option<String> {
        self.inner.details.lock().host_client_id.clone()
    }

    pub fn page_url(&self) -> Option<String> {
        self.inner.details.lock().page_url.clone()
    }

    pub(crate) fn set_page_url(&self, url: String) {
        self.inner.details.lock().page_url = Some(url);
    }

    pub fn downgrade(&self) -> WeakConnection {
        WeakConnection {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Close the connection, failing any pending calls.
    pub async fn close(&self) {
        tracing::debug!("closing connection");
        self.inner.transport.close().await;
        self.inner.fail_pending();
        self.inner.closed.cancel();
    }

    /// Resolves once the connection has ended, whichever side closed it.
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await;
    }
}

fn parse_reply<T: serde::de::DeserializeOwned>(action: &str, payload: serde_json::Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| Error::Protocol(format!("malformed {action} reply: {e}")))
}

//! Connecting to a host: the fluent builder, shared-page mode, and
//! app mode.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use easel_protocol::{RegisterHostClientRequest, RegisterHostClientResponse};

use crate::connection::{Connection, DEFAULT_REPLY_TIMEOUT};
use crate::error::Result;
use crate::page::Page;
use crate::transport::WsTransport;

/// Start a [`ConnectBuilder`] with defaults.
pub fn connect() -> ConnectBuilder {
    ConnectBuilder::new()
}

/// Fluent builder for a host connection.
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo() -> easel_client::Result<()> {
/// let page = easel_client::connect()
///     .url("ws://localhost:8550/ws")
///     .page_name("hello")
///     .open_page()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ConnectBuilder {
    url: String,
    page_name: String,
    host_client_id: Option<String>,
    auth_token: Option<String>,
    permissions: Option<String>,
    update: bool,
    reply_timeout: Duration,
}

impl ConnectBuilder {
    pub fn new() -> Self {
        Self {
            url: "ws://localhost:8550/ws".into(),
            page_name: String::new(),
            host_client_id: None,
            auth_token: None,
            permissions: None,
            update: false,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    /// Host WebSocket URL (e.g. `wss://host.example.com/ws`).
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Requested page name. Empty lets the host assign one.
    pub fn page_name(mut self, name: impl Into<String>) -> Self {
        self.page_name = name.into();
        self
    }

    /// Reuse an existing host-client id across reconnects.
    pub fn host_client_id(mut self, id: impl Into<String>) -> Self {
        self.host_client_id = Some(id.into());
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Permission spec forwarded to the host at registration.
    pub fn permissions(mut self, permissions: impl Into<String>) -> Self {
        self.permissions = Some(permissions.into());
        self
    }

    /// Replace the page content instead of appending to it.
    pub fn update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    /// How long a call waits for its correlated reply (default 30s).
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Connect, register as a shared page, and open it.
    pub async fn open_page(self) -> Result<Page> {
        let (conn, response) = self.register(false).await?;
        let page = Page::open(conn.clone(), response.session_id).await?;

        let routed = page.downgrade();
        conn.set_event_handler(move |payload| {
            if let Some(inner) = routed.upgrade() {
                Page::from_inner(inner).handle_event(payload);
            }
        });

        Ok(page)
    }

    /// Connect, register as an app, and serve sessions until the
    /// connection ends.
    ///
    /// Each `sessionCreated` push opens a fresh [`Page`] and runs
    /// `handler` on its own task; the session stays routable until the
    /// handler returns.
    pub async fn serve_app<F, Fut>(self, handler: F) -> Result<()>
    where
        F: Fn(Page) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (conn, _response) = self.register(true).await?;
        let sessions: Arc<Mutex<HashMap<String, Page>>> = Arc::new(Mutex::new(HashMap::new()));
        let handler = Arc::new(handler);

        {
            let sessions = sessions.clone();
            conn.set_event_handler(move |payload| {
                let page = sessions.lock().get(&payload.session_id).cloned();
                match page {
                    Some(page) => page.handle_event(payload),
                    None => {
                        tracing::debug!(session = %payload.session_id, "event for unknown session")
                    }
                }
            });
        }
        {
            let weak_conn = conn.downgrade();
            let sessions = sessions.clone();
            conn.set_session_handler(move |created| {
                let Some(conn) = weak_conn.upgrade() else {
                    return;
                };
                let sessions = sessions.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    let session_id = created.session_id.clone();
                    match Page::open(conn, created.session_id).await {
                        Ok(page) => {
                            sessions.lock().insert(session_id.clone(), page.clone());
                            handler(page).await;
                            sessions.lock().remove(&session_id);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, session = %session_id, "failed to open session page")
                        }
                    }
                });
            });
        }

        conn.closed().await;
        Ok(())
    }

    async fn register(&self, is_app: bool) -> Result<(Connection, RegisterHostClientResponse)> {
        let (transport, inbound) = WsTransport::connect(&self.url).await?;
        let conn = Connection::start(Arc::new(transport), inbound, self.reply_timeout);
        let response = conn
            .register_host_client(RegisterHostClientRequest {
                host_client_id: self.host_client_id.clone(),
                page_name: self.page_name.clone(),
                is_app,
                update: self.update,
                auth_token: self.auth_token.clone(),
                permissions: self.permissions.clone(),
            })
            .await?;
        conn.set_page_url(page_url(&self.url, &response.page_name));
        tracing::info!(page = %response.page_name, is_app, "registered with host");
        Ok((conn, response))
    }
}

impl Default for ConnectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Browser URL of a page, derived from the host's ws endpoint.
fn page_url(ws_url: &str, page_name: &str) -> String {
    let base = ws_url.strip_suffix("/ws").unwrap_or(ws_url);
    let base = if let Some(rest) = base.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = base.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        base.to_string()
    };
    format!("{}/{}", base.trim_end_matches('/'), page_name)
}

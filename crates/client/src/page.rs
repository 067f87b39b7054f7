//! The page: root of the control tree and owner of the id index.
//!
//! All tree mutations funnel through one update lock held for the whole
//! diff-compute-send-commit cycle, so concurrent mutations against the
//! same page can never interleave their command batches or race on the
//! diff baselines. Host-originated events are routed here by the
//! connection layer.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use easel_protocol::{Command, PageEventPayload, ZERO_SESSION};

use crate::attrs::AttrValue;
use crate::connection::Connection;
use crate::control::{Control, NodeState};
use crate::error::{Error, Result};
use crate::event::{into_handler, ControlEvent};
use crate::sync::{remove_from_index, update_commands, Index, SyncPlan};

/// Root attributes fetched from the host when a page opens.
const PAGE_DETAIL_ATTRS: [&str; 9] = [
    "hash",
    "winwidth",
    "winheight",
    "userauthprovider",
    "userid",
    "userlogin",
    "username",
    "useremail",
    "userclientip",
];

/// The root control. Its id is pre-reserved; the host never mints one
/// for it.
struct PageRoot {
    state: NodeState,
    children: Mutex<Vec<Arc<dyn Control>>>,
}

impl PageRoot {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: NodeState::with_uid("page"),
            children: Mutex::new(Vec::new()),
        })
    }
}

impl Control for PageRoot {
    fn control_name(&self) -> &str {
        "page"
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

pub(crate) struct PageInner {
    conn: Connection,
    session_id: String,
    root: Arc<PageRoot>,
    index: Mutex<Index>,
    last_event: Mutex<Option<ControlEvent>>,
    event_notify: Notify,
    update_lock: tokio::sync::Mutex<()>,
}

/// Cloneable handle to one page session.
#[derive(Clone)]
pub struct Page {
    inner: Arc<PageInner>,
}

impl Page {
    /// Wrap a registered session in a page and fetch its details.
    pub async fn open(conn: Connection, session_id: impl Into<String>) -> Result<Self> {
        let root = PageRoot::new();
        let inner = Arc::new(PageInner {
            conn,
            session_id: session_id.into(),
            root: root.clone(),
            index: Mutex::new(Index::new()),
            last_event: Mutex::new(None),
            event_notify: Notify::new(),
            update_lock: tokio::sync::Mutex::new(()),
        });
        root.state.attach_page(Arc::downgrade(&inner));
        inner
            .index
            .lock()
            .insert("page".to_string(), root as Arc<dyn Control>);

        let page = Self { inner };
        page.fetch_page_details().await?;
        Ok(page)
    }

    pub(crate) fn from_inner(inner: Arc<PageInner>) -> Self {
        Self { inner }
    }

    /// Weak handle for push-handler wiring; a handler holding the page
    /// strongly would keep the page alive through its own connection.
    pub(crate) fn downgrade(&self) -> std::sync::Weak<PageInner> {
        Arc::downgrade(&self.inner)
    }

    fn root_control(&self) -> Arc<dyn Control> {
        self.inner.root.clone()
    }

    // ── Tree mutation ────────────────────────────────────────────────

    /// Append controls and synchronize.
    pub async fn add(&self, controls: Vec<Arc<dyn Control>>) -> Result<()> {
        let _guard = self.inner.update_lock.lock().await;
        self.inner.root.children.lock().extend(controls);
        self.sync(&[self.root_control()]).await
    }

    /// Insert controls starting at `at` and synchronize.
    pub async fn insert(&self, at: usize, controls: Vec<Arc<dyn Control>>) -> Result<()> {
        let _guard = self.inner.update_lock.lock().await;
        {
            let mut children = self.inner.root.children.lock();
            let mut at = at.min(children.len());
            for control in controls {
                children.insert(at, control);
                at += 1;
            }
        }
        self.sync(&[self.root_control()]).await
    }

    /// Remove controls and synchronize. Controls that are not current
    /// children are ignored.
    pub async fn remove(&self, controls: &[Arc<dyn Control>]) -> Result<()> {
        let _guard = self.inner.update_lock.lock().await;
        {
            let keys: Vec<_> = controls.iter().map(|c| c.state().key()).collect();
            self.inner
                .root
                .children
                .lock()
                .retain(|c| !keys.contains(&c.state().key()));
        }
        self.sync(&[self.root_control()]).await
    }

    /// Remove the control at `at` and synchronize.
    pub async fn remove_at(&self, at: usize) -> Result<()> {
        let _guard = self.inner.update_lock.lock().await;
        {
            let mut children = self.inner.root.children.lock();
            if at < children.len() {
                children.remove(at);
            }
        }
        self.sync(&[self.root_control()]).await
    }

    /// Synchronize the whole page.
    pub async fn update(&self) -> Result<()> {
        let _guard = self.inner.update_lock.lock().await;
        self.sync(&[self.root_control()]).await
    }

    /// Synchronize specific controls. Every control must already be
    /// attached to this page.
    pub async fn update_controls(&self, controls: &[Arc<dyn Control>]) -> Result<()> {
        for control in controls {
            if control.state().page().is_none() {
                return Err(Error::NotAttached);
            }
        }
        let _guard = self.inner.update_lock.lock().await;
        self.sync(controls).await
    }

    /// Remove every control from the page on the host and reset the
    /// local diff baseline.
    pub async fn clean(&self) -> Result<String> {
        let _guard = self.inner.update_lock.lock().await;
        self.inner.root.state.clear_previous_children();
        {
            let mut index = self.inner.index.lock();
            for child in self.inner.root.children() {
                remove_from_index(&mut index, &child);
            }
        }
        self.inner.root.children.lock().clear();
        self.send_page_command("clean", vec!["page".into()]).await
    }

    /// Remove a control's children on the host and reset its local diff
    /// baseline. The control itself stays.
    pub async fn clean_control(&self, control: &Arc<dyn Control>) -> Result<String> {
        if control.state().page().is_none() {
            return Err(Error::NotAttached);
        }
        let uid = control.state().uid().ok_or(Error::NotAttached)?;
        let _guard = self.inner.update_lock.lock().await;
        control.state().clear_previous_children();
        {
            let mut index = self.inner.index.lock();
            for child in control.children() {
                remove_from_index(&mut index, &child);
            }
        }
        self.send_page_command("clean", vec![uid]).await
    }

    /// Display an error banner in the session.
    pub async fn error(&self, message: &str) -> Result<String> {
        self.send_page_command("error", vec![message.to_string()]).await
    }

    /// Diff the given roots against their snapshots, send the batch,
    /// then bind the minted ids and advance the baselines.
    ///
    /// Caller holds the update lock.
    async fn sync(&self, controls: &[Arc<dyn Control>]) -> Result<()> {
        let mut plan = SyncPlan::new();
        {
            let mut index = self.inner.index.lock();
            for control in controls {
                update_commands(control, &mut index, &mut plan);
            }
        }

        let commands = std::mem::take(&mut plan.commands);
        if commands.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            commands = commands.len(),
            new_controls = plan.added.len(),
            session = %self.inner.session_id,
            "synchronizing page"
        );
        let response = self
            .inner
            .conn
            .send_commands(&self.name(), &self.inner.session_id, commands)
            .await?;

        // Bind minted ids to the accumulated new controls, in lockstep.
        let mut assigned = 0usize;
        {
            let mut index = self.inner.index.lock();
            for line in &response.results {
                for uid in line.split_whitespace() {
                    let control = plan.added.get(assigned).ok_or_else(|| {
                        Error::Protocol(format!(
                            "host assigned more ids than the {} new controls",
                            plan.added.len()
                        ))
                    })?;
                    control.state().set_uid(uid);
                    control.state().attach_page(Arc::downgrade(&self.inner));
                    index.insert(uid.to_string(), control.clone());
                    assigned += 1;
                }
            }
        }
        if assigned != plan.added.len() {
            return Err(Error::Protocol(format!(
                "host assigned {assigned} ids for {} new controls",
                plan.added.len()
            )));
        }

        plan.commit_snapshots();
        Ok(())
    }

    async fn send_page_command(&self, name: &str, values: Vec<String>) -> Result<String> {
        let response = self
            .inner
            .conn
            .send_command(&self.name(), &self.inner.session_id, Command::op(name, values))
            .await?;
        Ok(response.result)
    }

    async fn fetch_page_details(&self) -> Result<()> {
        let commands = PAGE_DETAIL_ATTRS
            .iter()
            .map(|attr| Command::op("get", vec!["page".into(), attr.to_string()]))
            .collect();
        let response = self
            .inner
            .conn
            .send_commands(&self.name(), &self.inner.session_id, commands)
            .await?;
        for (attr, value) in PAGE_DETAIL_ATTRS.iter().zip(response.results) {
            if !value.is_empty() {
                self.inner.root.state.set_attr_clean(attr, Some(value.into()));
            }
        }
        Ok(())
    }

    // ── Event routing ────────────────────────────────────────────────

    /// Route one host event into the tree. Called by the connection's
    /// push dispatch.
    pub fn handle_event(&self, payload: PageEventPayload) {
        tracing::debug!(
            target = %payload.event_target,
            name = %payload.event_name,
            data = %payload.event_data,
            "page event"
        );

        if payload.event_target == "page" && payload.event_name == "change" {
            self.apply_change_deltas(&payload.event_data);
            return;
        }

        let control = self.inner.index.lock().get(&payload.event_target).cloned();
        let Some(control) = control else {
            tracing::debug!(target = %payload.event_target, "event for unknown control");
            return;
        };

        let event = ControlEvent {
            target: payload.event_target,
            name: payload.event_name,
            data: payload.event_data,
            control: control.clone(),
            page: self.clone(),
        };
        if let Some(handler) = control.state().handler(&event.name) {
            // handlers run on their own task; a slow handler cannot
            // stall event delivery
            tokio::spawn(handler(event.clone()));
        }
        *self.inner.last_event.lock() = Some(event);
        self.inner.event_notify.notify_waiters();
    }

    /// Apply a `change` batch: attribute deltas keyed by control id,
    /// stored clean so the next sync does not echo them back.
    fn apply_change_deltas(&self, data: &str) {
        let deltas: Vec<serde_json::Map<String, serde_json::Value>> = match serde_json::from_str(data) {
            Ok(deltas) => deltas,
            Err(e) => {
                tracing::warn!(error = %e, "malformed change event");
                return;
            }
        };
        let index = self.inner.index.lock();
        for props in &deltas {
            let Some(id) = props.get("i").and_then(|v| v.as_str()) else {
                continue;
            };
            let Some(control) = index.get(id) else {
                continue;
            };
            for (name, value) in props {
                if name != "i" {
                    control.state().set_attr_clean(name, json_to_attr(value));
                }
            }
        }
    }

    /// Wait for the next event routed to any control of this page.
    pub async fn wait_event(&self) -> ControlEvent {
        loop {
            self.inner.event_notify.notified().await;
            if let Some(event) = self.inner.last_event.lock().clone() {
                return event;
            }
        }
    }

    // ── Lookup / details ─────────────────────────────────────────────

    /// Look a control up by its assigned id. `"page"` resolves to the
    /// root.
    pub fn get_control(&self, id: &str) -> Option<Arc<dyn Control>> {
        self.inner.index.lock().get(id).cloned()
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// The page name confirmed by the host at registration.
    pub fn name(&self) -> String {
        self.inner.conn.page_name()
    }

    pub fn url(&self) -> Option<String> {
        self.inner.conn.page_url()
    }

    pub fn connection(&self) -> Connection {
        self.inner.conn.clone()
    }

    /// Close the connection if this page owns it (shared pages only;
    /// app sessions share the connection with their siblings).
    pub async fn close(&self) {
        if self.inner.session_id == ZERO_SESSION {
            self.inner.conn.close().await;
        }
    }

    // ── Root attributes ──────────────────────────────────────────────

    pub fn title(&self) -> Option<String> {
        self.inner.root.state.get_str("title")
    }

    pub fn set_title(&self, title: &str) {
        self.inner.root.state.set_attr("title", Some(title.into()));
    }

    pub fn theme(&self) -> Option<String> {
        self.inner.root.state.get_str("theme")
    }

    pub fn set_theme(&self, theme: &str) {
        self.inner.root.state.set_attr("theme", Some(theme.into()));
    }

    pub fn bgcolor(&self) -> Option<String> {
        self.inner.root.state.get_str("bgcolor")
    }

    pub fn set_bgcolor(&self, color: &str) {
        self.inner.root.state.set_attr("bgcolor", Some(color.into()));
    }

    pub fn hash(&self) -> Option<String> {
        self.inner.root.state.get_str("hash")
    }

    pub fn win_width(&self) -> u32 {
        self.inner.root.state.get_number("winwidth", 0.0) as u32
    }

    pub fn win_height(&self) -> u32 {
        self.inner.root.state.get_number("winheight", 0.0) as u32
    }

    // ── Root event handlers ──────────────────────────────────────────

    pub fn on_connect<F, Fut>(&self, handler: F)
    where
        F: Fn(ControlEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.inner.root.state.set_handler("connect", Some(into_handler(handler)));
    }

    pub fn on_disconnect<F, Fut>(&self, handler: F)
    where
        F: Fn(ControlEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.inner.root.state.set_handler("disconnect", Some(into_handler(handler)));
    }

    pub fn on_close<F, Fut>(&self, handler: F)
    where
        F: Fn(ControlEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.inner.root.state.set_handler("close", Some(into_handler(handler)));
    }

    pub fn on_resize<F, Fut>(&self, handler: F)
    where
        F: Fn(ControlEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.inner.root.state.set_handler("resize", Some(into_handler(handler)));
    }

    pub fn on_hash_change<F, Fut>(&self, handler: F)
    where
        F: Fn(ControlEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.inner.root.state.set_handler("hashchange", Some(into_handler(handler)));
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("session_id", &self.inner.session_id)
            .field("name", &self.name())
            .finish()
    }
}

fn json_to_attr(value: &serde_json::Value) -> Option<AttrValue> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(AttrValue::Bool(*b)),
        serde_json::Value::Number(n) => n.as_f64().map(AttrValue::Number),
        serde_json::Value::String(s) => Some(AttrValue::Str(s.clone())),
        other => Some(AttrValue::Str(other.to_string())),
    }
}

//! In-memory host for integration tests.
//!
//! Parses outbound envelopes and replies the way the real host does:
//! minted ids per `add` command, one result line per `get`, and
//! injectable faults for the error paths.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use easel_client::protocol::{actions, Command, Envelope, PageCommandRequest, PageCommandsBatchRequest};
use easel_client::{Connection, Page, Transport, TransportError};

pub struct FakeHost {
    inbound: mpsc::Sender<String>,
    sent: Mutex<Vec<Envelope>>,
    next_uid: AtomicUsize,
    fail_next_batch: Mutex<Option<String>>,
    extra_uid_next_batch: AtomicBool,
}

impl FakeHost {
    pub fn start() -> (Arc<Self>, Connection) {
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        let host = Arc::new(Self {
            inbound: inbound_tx,
            sent: Mutex::new(Vec::new()),
            next_uid: AtomicUsize::new(1),
            fail_next_batch: Mutex::new(None),
            extra_uid_next_batch: AtomicBool::new(false),
        });
        let conn = Connection::start(host.clone(), inbound_rx, Duration::from_secs(5));
        (host, conn)
    }

    /// Fail the next command batch with a host-reported error.
    pub fn fail_next_batch(&self, error: &str) {
        *self.fail_next_batch.lock().unwrap() = Some(error.to_string());
    }

    /// Violate the id-assignment contract on the next batch.
    pub fn extra_uid_on_next_batch(&self) {
        self.extra_uid_next_batch.store(true, Ordering::SeqCst);
    }

    /// Every recorded command batch, oldest first.
    pub fn batches(&self) -> Vec<PageCommandsBatchRequest> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|env| env.action == actions::PAGE_COMMANDS_BATCH_FROM_HOST)
            .map(|env| serde_json::from_value(env.payload.clone()).unwrap())
            .collect()
    }

    /// Command batches produced by tree synchronization, i.e. without
    /// the page-detail `get` batch sent at open.
    pub fn sync_batches(&self) -> Vec<PageCommandsBatchRequest> {
        self.batches()
            .into_iter()
            .filter(|batch| {
                !batch
                    .commands
                    .iter()
                    .any(|cmd| cmd.name.as_deref() == Some("get"))
            })
            .collect()
    }

    /// Every recorded single-command request, oldest first.
    pub fn page_commands(&self) -> Vec<PageCommandRequest> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|env| env.action == actions::PAGE_COMMAND_FROM_HOST)
            .map(|env| serde_json::from_value(env.payload.clone()).unwrap())
            .collect()
    }

    /// Push a UI event, as the host would after user interaction.
    pub async fn push_event(&self, target: &str, name: &str, data: &str) {
        let envelope = Envelope {
            id: String::new(),
            action: actions::PAGE_EVENT_TO_HOST.into(),
            payload: serde_json::json!({
                "pageName": "test-page",
                "sessionID": "0",
                "eventTarget": target,
                "eventName": name,
                "eventData": data,
            }),
        };
        self.inbound
            .send(serde_json::to_string(&envelope).unwrap())
            .await
            .unwrap();
    }

    fn mint_uid(&self) -> String {
        format!("c{}", self.next_uid.fetch_add(1, Ordering::SeqCst))
    }

    fn batch_results(&self, commands: &[Command]) -> Vec<String> {
        let mut results = Vec::new();
        for command in commands {
            match command.name.as_deref() {
                Some("add") => {
                    // one id per node in the inlined subtree
                    let mut ids: Vec<String> =
                        command.commands.iter().map(|_| self.mint_uid()).collect();
                    if self.extra_uid_next_batch.swap(false, Ordering::SeqCst) {
                        ids.push(self.mint_uid());
                    }
                    results.push(ids.join(" "));
                }
                Some("get") => results.push(String::new()),
                _ => {}
            }
        }
        results
    }
}

#[async_trait]
impl Transport for FakeHost {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        let envelope: Envelope = serde_json::from_str(&frame).unwrap();

        let payload = match envelope.action.as_str() {
            actions::REGISTER_HOST_CLIENT => serde_json::json!({
                "hostClientID": "hc1",
                "pageName": "test-page",
                "sessionID": "0",
                "error": "",
            }),
            actions::PAGE_COMMAND_FROM_HOST => serde_json::json!({ "result": "", "error": "" }),
            actions::PAGE_COMMANDS_BATCH_FROM_HOST => {
                let request: PageCommandsBatchRequest =
                    serde_json::from_value(envelope.payload.clone()).unwrap();
                let failure = self.fail_next_batch.lock().unwrap().take();
                match failure {
                    Some(error) => serde_json::json!({ "results": [], "error": error }),
                    None => serde_json::json!({
                        "results": self.batch_results(&request.commands),
                        "error": "",
                    }),
                }
            }
            _ => serde_json::json!({}),
        };

        let reply = Envelope::request(envelope.id.clone(), &envelope.action, payload);
        self.sent.lock().unwrap().push(envelope);
        self.inbound
            .send(serde_json::to_string(&reply).unwrap())
            .await
            .ok();
        Ok(())
    }

    async fn close(&self) {}
}

/// Open a page backed by a fake host, with events wired through.
pub async fn open_test_page() -> (Arc<FakeHost>, Page) {
    let (host, conn) = FakeHost::start();
    let page = Page::open(conn.clone(), "0").await.unwrap();
    let routed = page.clone();
    conn.set_event_handler(move |payload| routed.handle_event(payload));
    (host, page)
}

/// Poll until `condition` holds or a short deadline passes.
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

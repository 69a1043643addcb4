//! In-memory transport for exercising the stream controllers without a
//! server. Every connect, outbound frame and close lands in one ordered
//! event log, so tests can assert cross-socket ordering (e.g. that the old
//! dialog socket was closed before the new one was requested).

use super::transport::{InboundFrame, SocketSink, Transport};
use crate::types::{ClientError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// One observable action taken against the mock transport, in global order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connect { url: String },
    Frame { url: String, text: String },
    Close { url: String, code: u16, reason: String },
}

#[derive(Clone)]
struct Shared {
    log: Arc<Mutex<Vec<TransportEvent>>>,
}

impl Shared {
    fn push(&self, event: TransportEvent) {
        self.log.lock().expect("mock log poisoned").push(event);
    }
}

/// Server-side handle for one mock connection: inject inbound frames or
/// close it from "the server".
#[derive(Clone)]
pub struct MockConnection {
    pub url: String,
    inbound: mpsc::Sender<InboundFrame>,
}

impl MockConnection {
    pub async fn push_text(&self, text: impl Into<String>) {
        let _ = self.inbound.send(InboundFrame::Text(text.into())).await;
    }

    pub async fn push_json(&self, value: serde_json::Value) {
        self.push_text(value.to_string()).await;
    }

    pub async fn server_close(&self, code: u16, reason: &str) {
        let _ = self
            .inbound
            .send(InboundFrame::Closed {
                code: Some(code),
                reason: reason.to_string(),
            })
            .await;
    }
}

/// In-memory [`Transport`] recording everything it is asked to do.
#[derive(Clone, Default)]
pub struct MockTransport {
    log: Arc<Mutex<Vec<TransportEvent>>>,
    connections: Arc<Mutex<Vec<MockConnection>>>,
    refuse: Arc<Mutex<bool>>,
    latency: Arc<Mutex<HashMap<String, Duration>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent connect attempt fail.
    pub fn refuse_connections(&self, refuse: bool) {
        *self.refuse.lock().expect("mock flag poisoned") = refuse;
    }

    /// Delays the handshake for any URL containing `url_fragment`, so tests
    /// can interleave other work with an in-flight connect.
    pub fn set_connect_latency(&self, url_fragment: impl Into<String>, latency: Duration) {
        self.latency
            .lock()
            .expect("mock latency poisoned")
            .insert(url_fragment.into(), latency);
    }

    /// Snapshot of the ordered event log.
    pub fn events(&self) -> Vec<TransportEvent> {
        self.log.lock().expect("mock log poisoned").clone()
    }

    /// Outbound text frames only, in order.
    pub fn sent_frames(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::Frame { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, TransportEvent::Connect { .. }))
            .count()
    }

    /// Handle for the n-th accepted connection (0-based).
    pub fn connection(&self, index: usize) -> MockConnection {
        self.connections
            .lock()
            .expect("mock connections poisoned")[index]
            .clone()
    }

    /// Handle for the most recently accepted connection.
    pub fn last_connection(&self) -> MockConnection {
        let conns = self.connections.lock().expect("mock connections poisoned");
        conns.last().expect("no connections made").clone()
    }
}

struct MockSink {
    url: String,
    shared: Shared,
    closed: bool,
}

#[async_trait]
impl SocketSink for MockSink {
    async fn send_text(&mut self, text: &str) -> Result<()> {
        if self.closed {
            return Err(ClientError::NotConnected);
        }
        self.shared.push(TransportEvent::Frame {
            url: self.url.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        self.closed = true;
        self.shared.push(TransportEvent::Close {
            url: self.url.clone(),
            code,
            reason: reason.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn SocketSink>, mpsc::Receiver<InboundFrame>)> {
        if *self.refuse.lock().expect("mock flag poisoned") {
            return Err(ClientError::Connection(format!(
                "connection refused: {}",
                url
            )));
        }

        let delay = self
            .latency
            .lock()
            .expect("mock latency poisoned")
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, d)| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let shared = Shared {
            log: Arc::clone(&self.log),
        };
        shared.push(TransportEvent::Connect {
            url: url.to_string(),
        });

        let (tx, rx) = mpsc::channel(64);
        self.connections
            .lock()
            .expect("mock connections poisoned")
            .push(MockConnection {
                url: url.to_string(),
                inbound: tx,
            });

        Ok((
            Box::new(MockSink {
                url: url.to_string(),
                shared,
                closed: false,
            }),
            rx,
        ))
    }
}

use super::transport::SocketSink;
use crate::types::{ClientError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Socket lifecycle state. There is deliberately no reconnecting state: a
/// dropped socket stays `Closed` until a state change (dialog switch, auth
/// change, reopen) triggers a fresh connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Closing,
}

/// Holds the write half and lifecycle state for one socket scope, and hands
/// out generation numbers so completions from a replaced socket can be told
/// apart from the live one.
///
/// Shared policy for both stream controllers: every connect first guarantees
/// the previous socket for the same scope is closed (replace never overlap),
/// and a completion is only applied when its generation is still current.
pub struct ConnectionManager {
    sink: Arc<Mutex<Option<Box<dyn SocketSink>>>>,
    state: Arc<RwLock<ConnectionState>>,
    generation: AtomicU64,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            sink: Arc::new(Mutex::new(None)),
            state: Arc::new(RwLock::new(ConnectionState::Closed)),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn set_state(&self, new_state: ConnectionState) {
        *self.state.write().await = new_state;
    }

    pub async fn is_open(&self) -> bool {
        *self.state.read().await == ConnectionState::Open
    }

    /// Starts a new connect attempt; anything carrying an older generation is
    /// stale and must not touch shared state.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Installs the write half after a successful handshake.
    pub async fn install(&self, sink: Box<dyn SocketSink>) {
        *self.sink.lock().await = Some(sink);
    }

    pub async fn send_text(&self, text: &str) -> Result<()> {
        let mut guard = self.sink.lock().await;
        match guard.as_mut() {
            Some(sink) => sink.send_text(text).await,
            None => Err(ClientError::NotConnected),
        }
    }

    /// Closes the current socket, if any, with the given code and diagnostic
    /// reason. Close failures are logged and swallowed: the sink is dropped
    /// either way and the state ends up `Closed`.
    pub async fn close(&self, code: u16, reason: &str) {
        let mut guard = self.sink.lock().await;
        if let Some(mut sink) = guard.take() {
            self.set_state(ConnectionState::Closing).await;
            if let Err(e) = sink.close(code, reason).await {
                tracing::debug!("socket close failed ({}): {}", reason, e);
            }
        }
        drop(guard);
        self.set_state(ConnectionState::Closed).await;
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

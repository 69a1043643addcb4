use crate::context::ActiveContext;
use crate::infrastructure::TaskManager;
use crate::session::SessionManager;
use crate::socket::{ConnectionManager, ConnectionState, InboundFrame, Transport};
use crate::types::constants::{NOTIFICATIONS_WS_PATH, TOKEN_QUERY_PARAM, WS_CLOSE_NORMAL};
use crate::types::{MarkRead, NotificationEvent, NotificationRecord, Result};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use url::Url;

struct NotificationState {
    records: Vec<NotificationRecord>,
    last_id: u64,
    tasks: TaskManager,
}

/// One long-lived socket for the authenticated user plus the locally-owned,
/// mutable notification list it feeds.
///
/// Lifecycle is `Closed -> Connecting -> Open -> Closed`; there is no
/// reconnect state. [`connect`](Self::connect) unconditionally closes any
/// previous socket first, so at most one notification socket is ever live per
/// session; the coordinator calls it again whenever the authenticated
/// identity or the active context changes.
///
/// The suppression rule is applied at delivery time: an event whose `dialog`
/// equals the currently open dialog is dropped before a record is ever
/// created, so it is never counted as unread.
#[derive(Clone)]
pub struct NotificationStream {
    ws_base: String,
    session: SessionManager,
    context: ActiveContext,
    transport: Arc<dyn Transport>,
    connection: Arc<ConnectionManager>,
    state: Arc<RwLock<NotificationState>>,
}

/// Record ids are creation timestamps (millis), bumped when two events land
/// in the same millisecond so ids stay strictly increasing.
fn next_record_id(last: &mut u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let id = if now > *last { now } else { *last + 1 };
    *last = id;
    id
}

impl NotificationStream {
    pub fn new(
        ws_base: impl Into<String>,
        session: SessionManager,
        context: ActiveContext,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            ws_base: ws_base.into(),
            session,
            context,
            transport,
            connection: Arc::new(ConnectionManager::new()),
            state: Arc::new(RwLock::new(NotificationState {
                records: Vec::new(),
                last_id: 0,
                tasks: TaskManager::new(),
            })),
        }
    }

    async fn endpoint_url(&self) -> Result<String> {
        let token = self.session.token().await.unwrap_or_default();
        let mut url = Url::parse(&self.ws_base)?;
        url.set_path(NOTIFICATIONS_WS_PATH);
        url.query_pairs_mut().append_pair(TOKEN_QUERY_PARAM, &token);
        Ok(url.to_string())
    }

    /// Opens (or replaces) the notification socket. Skipped silently while
    /// unauthenticated; the caller retriggers on the next auth change.
    pub async fn connect(&self) -> Result<()> {
        if !self.session.is_authenticated() {
            tracing::debug!("notification connect skipped: not authenticated");
            return Ok(());
        }

        self.state.write().await.tasks.abort_all();
        self.connection.close(WS_CLOSE_NORMAL, "").await;

        let generation = self.connection.next_generation();
        let url = self.endpoint_url().await?;

        self.connection.set_state(ConnectionState::Connecting).await;
        let (mut sink, mut rx) = match self.transport.connect(&url).await {
            Ok(pair) => pair,
            Err(e) => {
                if self.connection.current_generation() == generation {
                    self.connection.set_state(ConnectionState::Closed).await;
                }
                return Err(e);
            }
        };
        // A handshake that resolves after a newer connect must not install.
        if self.connection.current_generation() != generation {
            tracing::debug!("stale notification handshake discarded");
            if let Err(e) = sink.close(WS_CLOSE_NORMAL, "").await {
                tracing::debug!("stale socket close failed: {}", e);
            }
            return Ok(());
        }
        self.connection.install(sink).await;
        self.connection.set_state(ConnectionState::Open).await;
        tracing::debug!("notification socket open");

        let conn = Arc::clone(&self.connection);
        let context = self.context.clone();
        let reader_state = Arc::clone(&self.state);
        self.state.write().await.tasks.spawn(async move {
            while let Some(frame) = rx.recv().await {
                if conn.current_generation() != generation {
                    break;
                }
                match frame {
                    InboundFrame::Text(text) => {
                        let event: NotificationEvent = match serde_json::from_str(&text) {
                            Ok(event) => event,
                            Err(e) => {
                                tracing::error!(
                                    "notification parse error: {} - raw: {}",
                                    e,
                                    text
                                );
                                continue;
                            }
                        };

                        // Suppression is checked against the context value at
                        // delivery time, not at connect time.
                        let open = context.get_open();
                        if event.dialog.is_some() && event.dialog == open {
                            tracing::debug!(
                                "suppressed notification for open dialog {:?}",
                                open
                            );
                            continue;
                        }

                        let mut st = reader_state.write().await;
                        let id = next_record_id(&mut st.last_id);
                        st.records.insert(
                            0,
                            NotificationRecord {
                                id,
                                dialog: event.dialog,
                                text: event.text,
                                read: false,
                                extra: event.extra,
                            },
                        );
                    }
                    InboundFrame::Closed { code, reason } => {
                        tracing::debug!(
                            "notification socket closed: code={:?} reason={:?}",
                            code,
                            reason
                        );
                        break;
                    }
                }
            }
            if conn.current_generation() == generation {
                conn.set_state(ConnectionState::Closed).await;
            }
        });

        Ok(())
    }

    /// Tears the socket down; nothing is delivered afterwards. The list
    /// itself survives until cleared or session end.
    pub async fn disconnect(&self) {
        self.state.write().await.tasks.abort_all();
        self.connection.close(WS_CLOSE_NORMAL, "").await;
    }

    /// `All` empties the list outright (clear, not mark); `One(id)` flips
    /// only that record's read flag.
    pub async fn mark_read(&self, target: MarkRead) {
        let mut st = self.state.write().await;
        match target {
            MarkRead::All => st.records.clear(),
            MarkRead::One(id) => {
                if let Some(record) = st.records.iter_mut().find(|r| r.id == id) {
                    record.read = true;
                }
            }
        }
    }

    /// Snapshot of the list, newest first.
    pub async fn records(&self) -> Vec<NotificationRecord> {
        self.state.read().await.records.clone()
    }

    pub async fn unread_count(&self) -> usize {
        self.state
            .read()
            .await
            .records
            .iter()
            .filter(|r| !r.read)
            .count()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.state().await
    }
}

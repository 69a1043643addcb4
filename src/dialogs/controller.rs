use crate::infrastructure::TaskManager;
use crate::rest::DialogApi;
use crate::session::SessionManager;
use crate::socket::{ConnectionManager, ConnectionState, InboundFrame, Transport};
use crate::types::constants::{
    close_reasons, dialog_ws_path, TOKEN_QUERY_PARAM, WS_CLOSE_NORMAL,
};
use crate::types::records::Dialog;
use crate::types::{ChatMessage, ClientError, OutboundChat, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

struct DialogState {
    dialog_id: Option<i64>,
    messages: Vec<ChatMessage>,
    meta: Option<Dialog>,
    tasks: TaskManager,
}

/// One socket scoped to the currently open conversation, plus the
/// locally-owned ordered message list.
///
/// Switching dialogs is a hard replace: the previous socket is closed with a
/// normal-closure code and the reason `"switch-dialog"` before the new one is
/// requested, so messages can never cross between dialogs. On entry, the REST
/// history snapshot and the socket connect run concurrently with no ordering
/// guarantee between them; the snapshot replaces the list wholesale when it
/// lands, silently dropping anything the socket appended first (known race).
/// A snapshot that resolves after a further switch carries a stale generation
/// and is discarded instead of overwriting the new dialog's list.
#[derive(Clone)]
pub struct DialogStream {
    ws_base: String,
    api: Arc<dyn DialogApi>,
    session: SessionManager,
    transport: Arc<dyn Transport>,
    connection: Arc<ConnectionManager>,
    state: Arc<RwLock<DialogState>>,
}

impl DialogStream {
    pub fn new(
        ws_base: impl Into<String>,
        api: Arc<dyn DialogApi>,
        session: SessionManager,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            ws_base: ws_base.into(),
            api,
            session,
            transport,
            connection: Arc::new(ConnectionManager::new()),
            state: Arc::new(RwLock::new(DialogState {
                dialog_id: None,
                messages: Vec::new(),
                meta: None,
                tasks: TaskManager::new(),
            })),
        }
    }

    async fn endpoint_url(&self, dialog_id: i64) -> Result<String> {
        let token = self.session.token().await.unwrap_or_default();
        let mut url = Url::parse(&self.ws_base)?;
        url.set_path(&dialog_ws_path(dialog_id));
        url.query_pairs_mut().append_pair(TOKEN_QUERY_PARAM, &token);
        Ok(url.to_string())
    }

    /// Enters `dialog_id`, replacing whatever dialog was open before.
    pub async fn open(&self, dialog_id: i64) -> Result<()> {
        if !self.session.is_authenticated() {
            tracing::debug!("dialog open skipped: not authenticated");
            return Ok(());
        }

        {
            let mut st = self.state.write().await;
            st.tasks.abort_all();
            st.dialog_id = Some(dialog_id);
            st.meta = None;
        }

        // Replace never overlap: the old socket must be gone before the new
        // connect is even requested.
        self.connection
            .close(WS_CLOSE_NORMAL, close_reasons::SWITCH_DIALOG)
            .await;
        let generation = self.connection.next_generation();

        // History snapshot and metadata, concurrent with the socket connect.
        {
            let api = Arc::clone(&self.api);
            let conn = Arc::clone(&self.connection);
            let state = Arc::clone(&self.state);
            self.state.write().await.tasks.spawn(async move {
                match api.dialog_messages(dialog_id).await {
                    Ok(snapshot) => {
                        if conn.current_generation() == generation {
                            state.write().await.messages = snapshot;
                        } else {
                            tracing::debug!(
                                "stale history snapshot for dialog {} discarded",
                                dialog_id
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!("history fetch failed for dialog {}: {}", dialog_id, e);
                    }
                }
            });

            let api = Arc::clone(&self.api);
            let conn = Arc::clone(&self.connection);
            let state = Arc::clone(&self.state);
            self.state.write().await.tasks.spawn(async move {
                match api.dialog(dialog_id).await {
                    Ok(meta) => {
                        if conn.current_generation() == generation {
                            state.write().await.meta = Some(meta);
                        }
                    }
                    Err(e) => {
                        tracing::error!("metadata fetch failed for dialog {}: {}", dialog_id, e);
                    }
                }
            });
        }

        let url = self.endpoint_url(dialog_id).await?;
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
        // A handshake that resolves after a further switch must not install:
        // the newer dialog owns the sink slot now.
        if self.connection.current_generation() != generation {
            tracing::debug!("stale handshake for dialog {} discarded", dialog_id);
            if let Err(e) = sink
                .close(WS_CLOSE_NORMAL, close_reasons::SWITCH_DIALOG)
                .await
            {
                tracing::debug!("stale socket close failed: {}", e);
            }
            return Ok(());
        }
        self.connection.install(sink).await;
        self.connection.set_state(ConnectionState::Open).await;
        tracing::debug!("dialog socket open for dialog {}", dialog_id);

        let conn = Arc::clone(&self.connection);
        let state = Arc::clone(&self.state);
        self.state.write().await.tasks.spawn(async move {
            while let Some(frame) = rx.recv().await {
                if conn.current_generation() != generation {
                    break;
                }
                match frame {
                    InboundFrame::Text(text) => {
                        let message: ChatMessage = match serde_json::from_str(&text) {
                            Ok(message) => message,
                            Err(e) => {
                                tracing::error!("chat parse error: {} - raw: {}", e, text);
                                continue;
                            }
                        };
                        // Append-order of arrival; duplicates stay visible.
                        state.write().await.messages.push(message);
                    }
                    InboundFrame::Closed { code, reason } => {
                        tracing::debug!(
                            "dialog socket closed: code={:?} reason={:?}",
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

    /// Sends the trimmed text as the only outbound frame shape. Silent no-op
    /// when the text is empty, no dialog is selected, or the socket is not
    /// open; the local list is never updated optimistically, so the message
    /// shows up only if the backend echoes it back.
    pub async fn send(&self, text: &str) -> Result<()> {
        let body = text.trim();
        if body.is_empty() {
            return Ok(());
        }
        if self.state.read().await.dialog_id.is_none() {
            return Ok(());
        }
        if !self.connection.is_open().await {
            tracing::debug!("send skipped: dialog socket not open");
            return Ok(());
        }

        let frame = serde_json::to_string(&OutboundChat { text: body })?;
        match self.connection.send_text(&frame).await {
            Ok(()) => Ok(()),
            // Raced a teardown between the state check and the send.
            Err(ClientError::NotConnected) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Leaves the current dialog: socket closed with reason `"unmount"`, the
    /// in-memory list and metadata are gone.
    pub async fn close(&self) {
        self.state.write().await.tasks.abort_all();
        self.connection
            .close(WS_CLOSE_NORMAL, close_reasons::UNMOUNT)
            .await;

        let mut st = self.state.write().await;
        st.dialog_id = None;
        st.messages.clear();
        st.meta = None;
    }

    pub async fn dialog_id(&self) -> Option<i64> {
        self.state.read().await.dialog_id
    }

    /// Snapshot of the message list in arrival order.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.read().await.messages.clone()
    }

    pub async fn meta(&self) -> Option<Dialog> {
        self.state.read().await.meta.clone()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.state().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemoryTokenStore, StaticProvider};
    use crate::socket::{MockTransport, TransportEvent};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn msg(id: i64, text: &str) -> ChatMessage {
        ChatMessage {
            id,
            sender_id: 1,
            sender_name: Some("anna_k".to_string()),
            sender_first_name: None,
            sender_last_name: None,
            sender_avatar: None,
            text: text.to_string(),
            created_at: None,
        }
    }

    /// Scripted dialog REST surface; per-dialog artificial latency simulates
    /// slow snapshot responses.
    #[derive(Default)]
    struct ScriptedDialogApi {
        messages: StdMutex<HashMap<i64, Vec<ChatMessage>>>,
        latency: StdMutex<HashMap<i64, Duration>>,
    }

    impl ScriptedDialogApi {
        fn with_history(self, dialog_id: i64, history: Vec<ChatMessage>) -> Self {
            self.messages.lock().unwrap().insert(dialog_id, history);
            self
        }

        fn with_latency(self, dialog_id: i64, latency: Duration) -> Self {
            self.latency.lock().unwrap().insert(dialog_id, latency);
            self
        }
    }

    #[async_trait]
    impl DialogApi for ScriptedDialogApi {
        async fn dialog(&self, dialog_id: i64) -> Result<Dialog> {
            Ok(Dialog {
                id: dialog_id,
                is_group: false,
                group_name: None,
                partner: None,
            })
        }

        async fn dialog_messages(&self, dialog_id: i64) -> Result<Vec<ChatMessage>> {
            let latency = self.latency.lock().unwrap().get(&dialog_id).copied();
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            Ok(self
                .messages
                .lock()
                .unwrap()
                .get(&dialog_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    async fn authed_session() -> SessionManager {
        let session = SessionManager::new(
            Arc::new(StaticProvider),
            Arc::new(MemoryTokenStore::new()),
            Default::default(),
        );
        session.begin_session("tok").await;
        session
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    async fn stream_with(api: ScriptedDialogApi) -> (DialogStream, MockTransport) {
        let transport = MockTransport::new();
        let stream = DialogStream::new(
            "wss://hobbymate.example",
            Arc::new(api),
            authed_session().await,
            Arc::new(transport.clone()),
        );
        (stream, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn switch_closes_the_old_socket_before_the_new_connect() {
        let (stream, transport) = stream_with(ScriptedDialogApi::default()).await;
        stream.open(5).await.unwrap();
        settle().await;
        stream.open(7).await.unwrap();
        settle().await;

        let events = transport.events();
        let close_pos = events
            .iter()
            .position(|e| {
                matches!(
                    e,
                    TransportEvent::Close { code, reason, .. }
                        if *code == WS_CLOSE_NORMAL && reason == close_reasons::SWITCH_DIALOG
                )
            })
            .expect("no switch-dialog close recorded");
        let second_connect_pos = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, TransportEvent::Connect { .. }))
            .map(|(i, _)| i)
            .nth(1)
            .expect("no second connect");
        assert!(close_pos < second_connect_pos);

        assert_eq!(stream.dialog_id().await, Some(7));
        assert_eq!(stream.connection_state().await, ConnectionState::Open);
        match events.last().map(|e| e.clone()) {
            Some(TransportEvent::Connect { url }) => {
                assert_eq!(url, "wss://hobbymate.example/ws/dialogs/7/?token=tok");
            }
            other => panic!("expected trailing connect, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn send_preconditions_are_silent_noops() {
        let (stream, transport) = stream_with(ScriptedDialogApi::default()).await;

        // No dialog selected at all.
        stream.send("hello").await.unwrap();
        assert!(transport.sent_frames().is_empty());

        stream.open(5).await.unwrap();
        settle().await;

        stream.send("").await.unwrap();
        stream.send("   ").await.unwrap();
        assert!(transport.sent_frames().is_empty());
        assert_eq!(stream.messages().await.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn send_while_socket_not_open_is_a_noop() {
        let (stream, transport) = stream_with(ScriptedDialogApi::default()).await;
        transport.refuse_connections(true);
        assert!(stream.open(5).await.is_err());
        assert_eq!(stream.connection_state().await, ConnectionState::Closed);

        stream.send("hello").await.unwrap();
        assert!(transport.sent_frames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn send_trims_and_ships_text_only_without_local_append() {
        let (stream, transport) = stream_with(ScriptedDialogApi::default()).await;
        stream.open(5).await.unwrap();
        settle().await;

        stream.send("  hello there  ").await.unwrap();
        assert_eq!(transport.sent_frames(), vec![r#"{"text":"hello there"}"#]);
        // Not optimistic: the list only changes if the backend echoes.
        assert_eq!(stream.messages().await.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_replaces_the_list_wholesale() {
        let api = ScriptedDialogApi::default()
            .with_history(5, vec![msg(1, "old-1"), msg(2, "old-2")])
            .with_latency(5, Duration::from_millis(100));
        let (stream, transport) = stream_with(api).await;

        stream.open(5).await.unwrap();
        // Socket delivers before the snapshot resolves; the live message is
        // visible briefly, then silently dropped by the wholesale replace.
        transport
            .last_connection()
            .push_json(json!({"id": 3, "sender_id": 2, "text": "live"}))
            .await;
        settle().await;
        assert_eq!(stream.messages().await.len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let texts: Vec<String> = stream.messages().await.into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["old-1", "old-2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_snapshot_after_a_switch_is_discarded() {
        let api = ScriptedDialogApi::default()
            .with_history(5, vec![msg(1, "from-5")])
            .with_latency(5, Duration::from_millis(300))
            .with_history(7, vec![msg(9, "from-7")]);
        let (stream, _transport) = stream_with(api).await;

        stream.open(5).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        stream.open(7).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let texts: Vec<String> = stream.messages().await.into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["from-7"]);
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_messages_append_in_arrival_order_with_duplicates() {
        let (stream, transport) = stream_with(ScriptedDialogApi::default()).await;
        stream.open(5).await.unwrap();
        settle().await;

        let conn = transport.last_connection();
        conn.push_json(json!({"id": 1, "sender_id": 2, "text": "first"})).await;
        conn.push_json(json!({"id": 2, "sender_id": 2, "text": "second"})).await;
        conn.push_json(json!({"id": 1, "sender_id": 2, "text": "first"})).await;
        settle().await;

        let texts: Vec<String> = stream.messages().await.into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["first", "second", "first"]);
    }

    #[tokio::test(start_paused = true)]
    async fn chat_parse_failure_is_dropped_not_fatal() {
        let (stream, transport) = stream_with(ScriptedDialogApi::default()).await;
        stream.open(5).await.unwrap();
        settle().await;

        let conn = transport.last_connection();
        conn.push_text("{{garbage").await;
        conn.push_json(json!({"id": 1, "sender_id": 2, "text": "fine"})).await;
        settle().await;

        assert_eq!(stream.messages().await.len(), 1);
        assert_eq!(stream.connection_state().await, ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn close_unmounts_and_clears_local_state() {
        let api = ScriptedDialogApi::default().with_history(5, vec![msg(1, "old")]);
        let (stream, transport) = stream_with(api).await;
        stream.open(5).await.unwrap();
        settle().await;
        assert_eq!(stream.messages().await.len(), 1);
        assert!(stream.meta().await.is_some());

        stream.close().await;

        assert_eq!(stream.dialog_id().await, None);
        assert!(stream.messages().await.is_empty());
        assert!(stream.meta().await.is_none());
        let last_close = transport
            .events()
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::Close { code, reason, .. } => Some((code, reason)),
                _ => None,
            })
            .last()
            .expect("no close recorded");
        assert_eq!(last_close, (WS_CLOSE_NORMAL, close_reasons::UNMOUNT.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handshake_for_a_replaced_dialog_never_installs() {
        let (stream, transport) = stream_with(ScriptedDialogApi::default()).await;
        transport.set_connect_latency("/ws/dialogs/5/", Duration::from_millis(100));
        transport.set_connect_latency("/ws/dialogs/7/", Duration::from_millis(10));

        // Switch to 7 while 5's handshake is still in flight.
        let racer = stream.clone();
        let first = tokio::spawn(async move { racer.open(5).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        stream.open(7).await.unwrap();
        first.await.unwrap().unwrap();
        settle().await;

        assert_eq!(stream.dialog_id().await, Some(7));
        assert_eq!(stream.connection_state().await, ConnectionState::Open);

        // Outbound traffic rides the dialog-7 socket, never the late one.
        stream.send("x").await.unwrap();
        let frame_urls: Vec<String> = transport
            .events()
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::Frame { url, .. } => Some(url),
                _ => None,
            })
            .collect();
        assert_eq!(
            frame_urls,
            vec!["wss://hobbymate.example/ws/dialogs/7/?token=tok"]
        );

        // The late dialog-5 socket was closed, not leaked.
        let closed_urls: Vec<String> = transport
            .events()
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::Close { url, .. } => Some(url),
                _ => None,
            })
            .collect();
        assert!(closed_urls.iter().any(|u| u.contains("/ws/dialogs/5/")));
    }

    #[tokio::test(start_paused = true)]
    async fn server_drop_stays_closed_until_the_next_switch() {
        let (stream, transport) = stream_with(ScriptedDialogApi::default()).await;
        stream.open(5).await.unwrap();
        settle().await;

        transport.last_connection().server_close(1006, "network").await;
        settle().await;
        assert_eq!(stream.connection_state().await, ConnectionState::Closed);
        assert_eq!(transport.connect_count(), 1);

        // Recovery requires a triggering state change.
        stream.open(5).await.unwrap();
        assert_eq!(transport.connect_count(), 2);
        assert_eq!(stream.connection_state().await, ConnectionState::Open);
    }
}

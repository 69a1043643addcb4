use super::core::RealtimeCoordinator;
use crate::context::ActiveContext;
use crate::dialogs::DialogStream;
use crate::notifications::NotificationStream;
use crate::rest::{ApiClient, DialogApi};
use crate::session::{
    IdentityProvider, MemoryTokenStore, RefreshFailurePolicy, SessionManager, TokenStore,
};
use crate::socket::{Transport, TungsteniteTransport};
use crate::types::constants::{TOKEN_MIN_VALIDITY_SECS, TOKEN_REFRESH_INTERVAL_SECS};
use crate::types::Result;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Base URL of the REST backend, e.g. `https://hobbymate.example/api`.
    pub api_base: String,
    /// Base URL for the WebSocket endpoints, e.g. `wss://hobbymate.example`.
    pub ws_base: String,
    pub refresh_interval: Duration,
    pub min_validity: Duration,
    pub refresh_failure_policy: RefreshFailurePolicy,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            ws_base: String::new(),
            refresh_interval: Duration::from_secs(TOKEN_REFRESH_INTERVAL_SECS),
            min_validity: Duration::from_secs(TOKEN_MIN_VALIDITY_SECS),
            refresh_failure_policy: RefreshFailurePolicy::default(),
        }
    }
}

/// Builder for [`RealtimeCoordinator`]; the token store and the socket
/// transport are injectable, defaulting to the in-memory store and the
/// tungstenite transport.
pub struct CoordinatorBuilder {
    options: CoordinatorOptions,
    provider: Arc<dyn IdentityProvider>,
    store: Option<Arc<dyn TokenStore>>,
    transport: Option<Arc<dyn Transport>>,
}

impl CoordinatorBuilder {
    pub fn new(options: CoordinatorOptions, provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            options,
            provider,
            store: None,
            transport: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Wires everything together and spawns the auth watcher that closes
    /// both sockets the moment the session becomes unauthenticated.
    pub fn build(self) -> Result<RealtimeCoordinator> {
        // Fail early on a malformed socket base instead of on first connect.
        Url::parse(&self.options.ws_base)?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(TungsteniteTransport));

        let session = SessionManager::new(
            self.provider,
            store,
            self.options.refresh_failure_policy,
        )
        .with_refresh_interval(self.options.refresh_interval)
        .with_min_validity(self.options.min_validity);

        let context = ActiveContext::new();
        let api = Arc::new(ApiClient::new(&self.options.api_base, session.token_handle()));
        let dialog_api: Arc<dyn DialogApi> = Arc::clone(&api) as Arc<dyn DialogApi>;

        let notifications = NotificationStream::new(
            self.options.ws_base.clone(),
            session.clone(),
            context.clone(),
            Arc::clone(&transport),
        );
        let dialog = DialogStream::new(
            self.options.ws_base.clone(),
            dialog_api,
            session.clone(),
            transport,
        );

        // Auth loss, however it happens (logout or a ForceLogout refresh
        // failure), must close every socket.
        let mut auth_rx = session.subscribe();
        let watcher_notifications = notifications.clone();
        let watcher_dialog = dialog.clone();
        tokio::spawn(async move {
            while auth_rx.changed().await.is_ok() {
                let authenticated = *auth_rx.borrow_and_update();
                if !authenticated {
                    tracing::info!("session lost, closing sockets");
                    watcher_dialog.close().await;
                    watcher_notifications.disconnect().await;
                }
            }
        });

        Ok(RealtimeCoordinator::new(
            session,
            context,
            api,
            notifications,
            dialog,
        ))
    }
}

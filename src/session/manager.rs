use super::provider::{IdentityProvider, RefreshFailurePolicy};
use super::store::TokenStore;
use crate::infrastructure::TaskManager;
use crate::types::constants::{TOKEN_MIN_VALIDITY_SECS, TOKEN_REFRESH_INTERVAL_SECS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time;

/// Owns the bearer credential for the authenticated principal.
///
/// The token lives behind a shared handle that doubles as the process-wide
/// default authorization source: every REST call reads it at request time, so
/// a refresh updates all future requests at once. In-flight requests keep the
/// token they started with (accepted race, not corrected).
///
/// While a session is active, a timer fires every
/// [`TOKEN_REFRESH_INTERVAL_SECS`] asking the identity provider to renew if
/// the token has less than [`TOKEN_MIN_VALIDITY_SECS`] left. A failed refresh
/// is logged and left for the next tick; see [`RefreshFailurePolicy`] for the
/// stricter alternative.
#[derive(Clone)]
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn TokenStore>,
    token: Arc<RwLock<Option<String>>>,
    auth_tx: Arc<watch::Sender<bool>>,
    policy: RefreshFailurePolicy,
    refresh_interval: Duration,
    min_validity: Duration,
    tasks: Arc<Mutex<TaskManager>>,
}

impl SessionManager {
    /// A saved token from a previous run is preloaded into the auth handle so
    /// REST calls can carry it immediately, but the session only counts as
    /// authenticated after [`begin_session`](Self::begin_session).
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn TokenStore>,
        policy: RefreshFailurePolicy,
    ) -> Self {
        let saved = store.load();
        let (auth_tx, _auth_rx) = watch::channel(false);
        Self {
            provider,
            store,
            token: Arc::new(RwLock::new(saved)),
            auth_tx: Arc::new(auth_tx),
            policy,
            refresh_interval: Duration::from_secs(TOKEN_REFRESH_INTERVAL_SECS),
            min_validity: Duration::from_secs(TOKEN_MIN_VALIDITY_SECS),
            tasks: Arc::new(Mutex::new(TaskManager::new())),
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_min_validity(mut self, min_validity: Duration) -> Self {
        self.min_validity = min_validity;
        self
    }

    /// Current bearer credential, if any.
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Shared handle read by REST calls and socket URL builders.
    pub fn token_handle(&self) -> Arc<RwLock<Option<String>>> {
        Arc::clone(&self.token)
    }

    pub fn is_authenticated(&self) -> bool {
        *self.auth_tx.borrow()
    }

    /// Observe authentication state changes (socket owners watch this to
    /// close on auth loss).
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.auth_tx.subscribe()
    }

    /// Installs the token produced by the login handshake and starts the
    /// periodic refresh timer.
    pub async fn begin_session(&self, token: impl Into<String>) {
        let token = token.into();
        self.store.save(&token);
        *self.token.write().await = Some(token);
        // The value must land even when nobody has subscribed yet.
        self.auth_tx.send_replace(true);

        let mut tasks = self.tasks.lock().await;
        tasks.abort_all();

        let this = self.clone();
        tasks.spawn(async move {
            let start = time::Instant::now() + this.refresh_interval;
            let mut interval = time::interval_at(start, this.refresh_interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                match this.provider.refresh(this.min_validity).await {
                    Ok(Some(new_token)) => {
                        this.store.save(&new_token);
                        *this.token.write().await = Some(new_token);
                        tracing::debug!("session token refreshed");
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::error!("token refresh failed: {}", e);
                        if this.policy == RefreshFailurePolicy::ForceLogout {
                            this.drop_credentials().await;
                            break;
                        }
                        // KeepSession: the next tick retries.
                    }
                }
            }
        });
    }

    /// Explicit logout: stop the refresh timer, drop the credential
    /// everywhere, tell the provider (best-effort).
    pub async fn end_session(&self) {
        self.tasks.lock().await.abort_all();
        self.drop_credentials().await;
        if let Err(e) = self.provider.end_session().await {
            tracing::warn!("provider logout failed: {}", e);
        }
    }

    async fn drop_credentials(&self) {
        self.store.clear();
        *self.token.write().await = None;
        self.auth_tx.send_replace(false);
    }
}

use crate::context::ActiveContext;
use crate::dialogs::DialogStream;
use crate::notifications::NotificationStream;
use crate::rest::ApiClient;
use crate::session::SessionManager;
use crate::types::{MarkRead, Result};
use std::sync::Arc;

/// The realtime session coordinator: one authenticated session, one
/// notification socket, at most one dialog socket, and the active-context
/// value shared between them.
///
/// The notification socket is reopened whenever the authenticated identity
/// or the active context changes; the dialog socket is replaced on every
/// dialog switch. Neither reconnects on its own after a network drop; the
/// next state change re-enters connecting.
pub struct RealtimeCoordinator {
    session: SessionManager,
    context: ActiveContext,
    api: Arc<ApiClient>,
    notifications: NotificationStream,
    dialog: DialogStream,
}

impl RealtimeCoordinator {
    pub(crate) fn new(
        session: SessionManager,
        context: ActiveContext,
        api: Arc<ApiClient>,
        notifications: NotificationStream,
        dialog: DialogStream,
    ) -> Self {
        Self {
            session,
            context,
            api,
            notifications,
            dialog,
        }
    }

    /// Installs the token produced by the login handshake and brings the
    /// notification stream up.
    pub async fn login(&self, token: impl Into<String>) -> Result<()> {
        self.session.begin_session(token).await;
        self.notifications.connect().await
    }

    /// Ends the session: sockets closed, notification list gone, credential
    /// cleared everywhere.
    pub async fn logout(&self) {
        self.dialog.close().await;
        self.context.clear();
        self.notifications.disconnect().await;
        self.notifications.mark_read(MarkRead::All).await;
        self.session.end_session().await;
    }

    /// Brings `dialog_id` to the foreground: the context is updated first so
    /// the notification stream starts suppressing for it, the notification
    /// socket is cycled (context is one of its inputs), and the dialog
    /// stream hard-replaces its socket.
    pub async fn open_dialog(&self, dialog_id: i64) -> Result<()> {
        self.context.set_open(Some(dialog_id));
        if let Err(e) = self.notifications.connect().await {
            tracing::error!("notification reopen failed: {}", e);
        }
        self.dialog.open(dialog_id).await
    }

    /// Leaves the current dialog (view unmount).
    pub async fn close_dialog(&self) {
        self.dialog.close().await;
        self.context.clear();
        if let Err(e) = self.notifications.connect().await {
            tracing::error!("notification reopen failed: {}", e);
        }
    }

    /// See [`DialogStream::send`]: trimmed text only, silent no-op when the
    /// preconditions fail.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        self.dialog.send(text).await
    }

    pub async fn mark_read(&self, target: MarkRead) {
        self.notifications.mark_read(target).await;
    }

    /// Whether the user still has to finish their profile. A failed fetch
    /// counts as incomplete; callers route to onboarding in both cases rather
    /// than surfacing the error.
    pub async fn needs_onboarding(&self) -> bool {
        match self.api.my_profile().await {
            Ok(profile) => !profile.is_complete(),
            Err(e) => {
                tracing::warn!("profile fetch failed, forcing onboarding: {}", e);
                true
            }
        }
    }

    /// Sends the "share my contacts" convenience message into the open
    /// dialog, built from the profile's contact fields.
    pub async fn share_contacts(&self) -> Result<()> {
        let profile = self.api.my_profile().await?;
        self.dialog.send(&profile.contact_offer()).await
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn context(&self) -> &ActiveContext {
        &self.context
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn notifications(&self) -> &NotificationStream {
        &self.notifications
    }

    pub fn dialog(&self) -> &DialogStream {
        &self.dialog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{CoordinatorBuilder, CoordinatorOptions};
    use crate::session::{IdentityProvider, RefreshFailurePolicy, StaticProvider};
    use crate::socket::{ConnectionState, MockTransport, TransportEvent};
    use crate::types::ClientError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FailingProvider;

    #[async_trait]
    impl IdentityProvider for FailingProvider {
        async fn refresh(
            &self,
            _min_validity: Duration,
        ) -> crate::types::Result<Option<String>> {
            Err(ClientError::Connection("provider down".into()))
        }
    }

    fn options() -> CoordinatorOptions {
        CoordinatorOptions {
            // Nothing listens here; REST collaborators fail fast and the
            // coordinator has to shrug that off.
            api_base: "http://127.0.0.1:9/api".to_string(),
            ws_base: "wss://hobbymate.example".to_string(),
            ..Default::default()
        }
    }

    fn notification_connects(transport: &MockTransport) -> usize {
        transport
            .events()
            .iter()
            .filter(|e| matches!(e, TransportEvent::Connect { url } if url.contains("/ws/notifications/")))
            .count()
    }

    #[tokio::test]
    async fn login_opens_the_notification_stream() {
        let transport = MockTransport::new();
        let coordinator = CoordinatorBuilder::new(options(), Arc::new(StaticProvider))
            .with_transport(Arc::new(transport.clone()))
            .build()
            .unwrap();

        coordinator.login("T1").await.unwrap();
        assert!(coordinator.session().is_authenticated());
        assert_eq!(notification_connects(&transport), 1);
        assert_eq!(
            coordinator.notifications().connection_state().await,
            ConnectionState::Open
        );
    }

    #[tokio::test]
    async fn opening_a_dialog_cycles_the_notification_socket() {
        let transport = MockTransport::new();
        let coordinator = CoordinatorBuilder::new(options(), Arc::new(StaticProvider))
            .with_transport(Arc::new(transport.clone()))
            .build()
            .unwrap();

        coordinator.login("T1").await.unwrap();
        coordinator.open_dialog(5).await.unwrap();

        assert_eq!(coordinator.context().get_open(), Some(5));
        assert_eq!(notification_connects(&transport), 2);
        assert_eq!(
            coordinator.dialog().connection_state().await,
            ConnectionState::Open
        );
    }

    #[tokio::test]
    async fn logout_closes_everything_and_drops_the_list() {
        let transport = MockTransport::new();
        let coordinator = CoordinatorBuilder::new(options(), Arc::new(StaticProvider))
            .with_transport(Arc::new(transport.clone()))
            .build()
            .unwrap();

        coordinator.login("T1").await.unwrap();
        coordinator.open_dialog(5).await.unwrap();
        coordinator.logout().await;

        assert!(!coordinator.session().is_authenticated());
        assert_eq!(coordinator.session().token().await, None);
        assert_eq!(coordinator.context().get_open(), None);
        assert_eq!(
            coordinator.notifications().connection_state().await,
            ConnectionState::Closed
        );
        assert_eq!(
            coordinator.dialog().connection_state().await,
            ConnectionState::Closed
        );
        assert!(coordinator.notifications().records().await.is_empty());
    }

    #[tokio::test]
    async fn force_logout_refresh_failure_closes_both_sockets() {
        let transport = MockTransport::new();
        let coordinator = CoordinatorBuilder::new(
            CoordinatorOptions {
                refresh_interval: Duration::from_millis(50),
                refresh_failure_policy: RefreshFailurePolicy::ForceLogout,
                ..options()
            },
            Arc::new(FailingProvider),
        )
        .with_transport(Arc::new(transport.clone()))
        .build()
        .unwrap();

        coordinator.login("T1").await.unwrap();
        coordinator.open_dialog(5).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(!coordinator.session().is_authenticated());
        assert_eq!(
            coordinator.notifications().connection_state().await,
            ConnectionState::Closed
        );
        assert_eq!(
            coordinator.dialog().connection_state().await,
            ConnectionState::Closed
        );
    }

    #[tokio::test]
    async fn needs_onboarding_when_the_profile_fetch_fails() {
        let coordinator = CoordinatorBuilder::new(options(), Arc::new(StaticProvider))
            .with_transport(Arc::new(MockTransport::new()))
            .build()
            .unwrap();

        coordinator.login("T1").await.unwrap();
        assert!(coordinator.needs_onboarding().await);
    }

    #[tokio::test]
    async fn malformed_ws_base_fails_at_build_time() {
        let result = CoordinatorBuilder::new(
            CoordinatorOptions {
                ws_base: "not a url".to_string(),
                ..Default::default()
            },
            Arc::new(StaticProvider),
        )
        .build();
        assert!(result.is_err());
    }
}

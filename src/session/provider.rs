use crate::types::Result;
use async_trait::async_trait;
use std::time::Duration;

/// External identity provider client. The authentication protocol itself
/// (redirects, PKCE, token grants) lives behind this seam.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Renews the token if its remaining lifetime is below `min_validity`.
    /// Yields the new token if one was issued, `None` if the current token is
    /// still valid.
    async fn refresh(&self, min_validity: Duration) -> Result<Option<String>>;

    /// Federated logout. Best-effort; failures are logged, not surfaced.
    async fn end_session(&self) -> Result<()> {
        Ok(())
    }
}

/// Provider for long-lived static tokens: never refreshes, never expires
/// client-side. Handy in tests and for service accounts.
#[derive(Debug, Default)]
pub struct StaticProvider;

#[async_trait]
impl IdentityProvider for StaticProvider {
    async fn refresh(&self, _min_validity: Duration) -> Result<Option<String>> {
        Ok(None)
    }
}

/// What to do when a refresh attempt fails.
///
/// The default keeps the session alive and relies on the provider's own
/// server-side expiry, which avoids disruptive logouts on transient network
/// blips but can leave the client holding a dead token. Surfaced as policy
/// rather than hardcoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshFailurePolicy {
    /// Log and keep the session; the next timer tick retries.
    #[default]
    KeepSession,
    /// Treat the session as lost: flip to unauthenticated, which closes all
    /// sockets.
    ForceLogout,
}

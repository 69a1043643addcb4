// Session module - authenticated principal lifecycle
mod manager;
mod provider;
mod store;

pub use manager::SessionManager;
pub use provider::{IdentityProvider, RefreshFailurePolicy, StaticProvider};
pub use store::{MemoryTokenStore, TokenStore};

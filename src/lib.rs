//! # HobbyMate Realtime
//!
//! Client-side realtime session coordinator for the HobbyMate matchmaking
//! product: a persistent authenticated session that silently refreshes its
//! token, a live notification stream that suppresses events for the dialog
//! currently in the foreground, and a per-dialog chat stream that is torn
//! down and replaced whenever the active dialog changes.
//!
//! ## Example
//!
//! ```no_run
//! use hobbymate_realtime::{CoordinatorBuilder, CoordinatorOptions, StaticProvider};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let coordinator = CoordinatorBuilder::new(
//!         CoordinatorOptions {
//!             api_base: "https://hobbymate.example/api".to_string(),
//!             ws_base: "wss://hobbymate.example".to_string(),
//!             ..Default::default()
//!         },
//!         Arc::new(StaticProvider),
//!     )
//!     .build()?;
//!
//!     coordinator.login("bearer-token-from-login-handshake").await?;
//!     coordinator.open_dialog(5).await?;
//!     coordinator.send_message("hello!").await?;
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod coordinator;
pub mod dialogs;
pub mod infrastructure;
pub mod notifications;
pub mod rest;
pub mod session;
pub mod socket;
pub mod types;

pub use context::ActiveContext;
pub use coordinator::{CoordinatorBuilder, CoordinatorOptions, RealtimeCoordinator};
pub use dialogs::DialogStream;
pub use notifications::NotificationStream;
pub use rest::{ApiClient, DialogApi};
pub use session::{
    IdentityProvider, MemoryTokenStore, RefreshFailurePolicy, SessionManager, StaticProvider,
    TokenStore,
};
pub use socket::{ConnectionState, InboundFrame, SocketSink, Transport, TungsteniteTransport};
pub use types::{
    ChatMessage, ClientError, MarkRead, NotificationEvent, NotificationRecord, Result,
};

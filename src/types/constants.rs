/// Refresh timer period for the session lifecycle manager (seconds).
pub const TOKEN_REFRESH_INTERVAL_SECS: u64 = 50;

/// Minimum remaining token validity requested from the identity provider
/// on each refresh tick (seconds).
pub const TOKEN_MIN_VALIDITY_SECS: u64 = 30;

/// WebSocket normal-closure code.
pub const WS_CLOSE_NORMAL: u16 = 1000;

/// Close reasons (diagnostics only, never interpreted by the backend).
pub mod close_reasons {
    pub const SWITCH_DIALOG: &str = "switch-dialog";
    pub const UNMOUNT: &str = "unmount";
}

/// Query parameter carrying the bearer credential on socket URLs.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Path of the per-user notification socket.
pub const NOTIFICATIONS_WS_PATH: &str = "/ws/notifications/";

/// Path of the per-dialog chat socket.
pub fn dialog_ws_path(dialog_id: i64) -> String {
    format!("/ws/dialogs/{}/", dialog_id)
}

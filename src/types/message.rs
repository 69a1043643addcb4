use serde::{Deserialize, Serialize};

/// One line of conversation as delivered by the backend, either through the
/// REST history snapshot or the dialog socket (both use the same shape).
///
/// Ordering is strictly append-order of arrival and repeat delivery is kept
/// as a visible duplicate; nothing here is deduplicated or re-sorted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: i64,
    /// Older backend revisions ship this as `sender`.
    #[serde(alias = "sender")]
    pub sender_id: i64,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub sender_first_name: Option<String>,
    #[serde(default)]
    pub sender_last_name: Option<String>,
    #[serde(default)]
    pub sender_avatar: Option<String>,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ChatMessage {
    /// Sender display name: "First Last" when either part is present,
    /// otherwise the account username.
    pub fn display_name(&self) -> String {
        let first = self.sender_first_name.as_deref().unwrap_or("");
        let last = self.sender_last_name.as_deref().unwrap_or("");
        let full = format!("{} {}", first, last);
        let full = full.trim();
        if !full.is_empty() {
            full.to_string()
        } else {
            self.sender_name.clone().unwrap_or_default()
        }
    }
}

/// The only frame the client ever sends on a dialog socket.
#[derive(Debug, Serialize)]
pub struct OutboundChat<'a> {
    pub text: &'a str,
}

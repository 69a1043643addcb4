use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One inbound frame on the notification socket.
///
/// The backend guarantees at least a `dialog` field (source conversation, if
/// any) and a `text` field; everything else is passed through untouched in
/// `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationEvent {
    #[serde(default, deserialize_with = "dialog_id_lenient")]
    pub dialog: Option<i64>,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The backend serializes dialog ids inconsistently (integer or numeric
/// string); accept both, treat anything else as "no dialog".
fn dialog_id_lenient<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_i64()),
        Some(Value::String(s)) => match s.parse::<i64>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => Err(de::Error::custom(format!("invalid dialog id: {:?}", s))),
        },
        Some(other) => Err(de::Error::custom(format!(
            "invalid dialog id type: {}",
            other
        ))),
    }
}

/// One realtime event surfaced to the user, as kept in the locally-owned
/// notification list. Created on arrival (unless suppressed), mutated only by
/// flipping `read`, gone on clear-all or session end.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    /// Locally assigned, strictly increasing (creation-timestamp based).
    pub id: u64,
    /// Source conversation, if any.
    pub dialog: Option<i64>,
    pub text: String,
    pub read: bool,
    /// Arbitrary event payload fields passed through from the wire.
    pub extra: serde_json::Map<String, Value>,
}

/// Target of [`mark_read`](crate::notifications::NotificationStream::mark_read).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkRead {
    /// Clears the entire list. Destructive: truncation, not an all-read sweep.
    All,
    /// Flips only the targeted record's `read` flag.
    One(u64),
}

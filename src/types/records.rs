//! Record shapes for the REST collaborators. The backend owns these formats;
//! everything is decoded leniently so a missing optional field never fails a
//! whole fetch.

use serde::{Deserialize, Serialize};

/// The authenticated user's own profile.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Profile {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub tg_link: Option<String>,
    #[serde(default)]
    pub vk_link: Option<String>,
    #[serde(default)]
    pub interest_vector: Option<Vec<i32>>,
    #[serde(default)]
    pub profile_photo: Option<String>,
}

fn filled(s: &Option<String>) -> bool {
    s.as_deref().map(|v| !v.is_empty()).unwrap_or(false)
}

impl Profile {
    /// Onboarding gate: name, email and an interest vector must all exist.
    pub fn is_complete(&self) -> bool {
        filled(&self.first_name)
            && filled(&self.last_name)
            && filled(&self.email)
            && self.interest_vector.is_some()
    }

    /// Match search is only allowed once at least one interest is rated
    /// above 2.
    pub fn has_rated_interests(&self) -> bool {
        self.interest_vector
            .as_deref()
            .map(|v| v.iter().any(|n| *n > 2))
            .unwrap_or(false)
    }

    /// The "share my contacts" convenience message. Missing fields render as
    /// a dash rather than being omitted.
    pub fn contact_offer(&self) -> String {
        let dash = |s: &Option<String>| -> String {
            s.as_deref()
                .filter(|v| !v.is_empty())
                .unwrap_or("—")
                .to_string()
        };
        format!(
            "Let's continue the conversation:\nTelegram: {}\nVK: {}\nPhone: {}",
            dash(&self.tg_link),
            dash(&self.vk_link),
            dash(&self.phone_number),
        )
    }
}

/// Minimal user reference used in dialog partners, interaction history and
/// group member lists.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct UserRef {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// A conversation thread, one-to-one or group. The same shape is used for
/// the dialog list and for single-dialog metadata.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Dialog {
    pub id: i64,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub partner: Option<UserRef>,
}

/// One candidate in the swipe deck.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MatchCandidate {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile_photo: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SwipeAction {
    Like,
    Skip,
    Dislike,
}

/// Outcome of a swipe. A mutual like carries the freshly created dialog id.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SwipeOutcome {
    #[serde(default)]
    pub mutual: bool,
    #[serde(default)]
    pub dialog_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InteractionHistory {
    #[serde(default)]
    pub liked: Vec<UserRef>,
    #[serde(default)]
    pub rejected: Vec<UserRef>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Group {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One support-channel submission.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FeedbackEntry {
    #[serde(default)]
    pub id: Option<i64>,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Greeting {
    pub message: String,
}

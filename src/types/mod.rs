pub mod constants;
pub mod error;
pub mod event;
pub mod message;
pub mod records;

pub use constants::*;
pub use error::{ClientError, Result};
pub use event::{MarkRead, NotificationEvent, NotificationRecord};
pub use message::{ChatMessage, OutboundChat};
pub use records::{
    Dialog, FeedbackEntry, Greeting, Group, InteractionHistory, MatchCandidate, Profile,
    SwipeAction, SwipeOutcome, UserRef,
};

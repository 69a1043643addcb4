// REST module - collaborators consumed by the coordinator
mod api;

pub use api::{ApiClient, DialogApi};

// Coordinator module - wiring of session, context and the two streams
mod builder;
mod core;

pub use builder::{CoordinatorBuilder, CoordinatorOptions};
pub use core::RealtimeCoordinator;

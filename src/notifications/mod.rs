// Notifications module - per-user realtime event stream
mod controller;

pub use controller::NotificationStream;

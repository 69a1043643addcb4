// Dialogs module - per-conversation chat stream
mod controller;

pub use controller::DialogStream;

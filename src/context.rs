//! Active-context tracker: which conversation, if any, is open in the
//! foreground right now.

use std::sync::{Arc, Mutex};

/// Shared handle naming the foreground-open dialog.
///
/// Written by whichever view currently owns the open dialog (on entering a
/// dialog with its id, on leaving with `None`) and read by the notification
/// stream on every inbound event. Exactly one writer exists at a time in the
/// navigation model, so last-write-wins is sufficient; the handle is passed
/// into both stream controllers at construction rather than living as an
/// ambient global.
#[derive(Clone, Default)]
pub struct ActiveContext {
    open: Arc<Mutex<Option<i64>>>,
}

impl ActiveContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records which dialog is currently in the foreground.
    pub fn set_open(&self, dialog_id: Option<i64>) {
        *self.open.lock().expect("active context poisoned") = dialog_id;
    }

    /// Current foreground dialog, read synchronously.
    pub fn get_open(&self) -> Option<i64> {
        *self.open.lock().expect("active context poisoned")
    }

    pub fn clear(&self) {
        self.set_open(None);
    }
}

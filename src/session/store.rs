use std::sync::Mutex;

/// Durable key-value slot for the bearer token, so a restart can resume with
/// the saved credential. Synchronous on purpose: backing stores are local.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str);
    fn clear(&self);
}

/// Process-local store. Default when no durable backing is wired in.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token.lock().expect("token store poisoned").clone()
    }

    fn save(&self, token: &str) {
        *self.token.lock().expect("token store poisoned") = Some(token.to_string());
    }

    fn clear(&self) {
        *self.token.lock().expect("token store poisoned") = None;
    }
}

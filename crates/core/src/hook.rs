//! Single-assignment capture of the identifier the primary channel assigns to a query.

use std::sync::{Arc, OnceLock};
use tracing::warn;

/// Writer half handed to the primary channel. Cheap to clone and `Send`, so a channel may
/// fire it from whichever task learns the identifier.
#[derive(Debug, Clone)]
pub struct IdentifierHook {
    slot: Arc<OnceLock<String>>,
}

/// Reader half kept by the caller.
#[derive(Debug, Clone)]
pub struct IdentifierSlot {
    slot: Arc<OnceLock<String>>,
}

impl IdentifierHook {
    pub fn new() -> (IdentifierHook, IdentifierSlot) {
        let slot = Arc::new(OnceLock::new());
        (
            IdentifierHook { slot: slot.clone() },
            IdentifierSlot { slot },
        )
    }

    /// Record the identifier. Returns `false` if it was empty or one was already captured.
    pub fn capture(&self, identifier: impl Into<String>) -> bool {
        let identifier = identifier.into();
        if identifier.is_empty() {
            return false;
        }
        match self.slot.set(identifier) {
            Ok(()) => true,
            Err(rejected) => {
                warn!(
                    existing = self.slot.get().map(String::as_str).unwrap_or_default(),
                    rejected = %rejected,
                    "Identifier hook fired more than once; keeping the first value"
                );
                false
            }
        }
    }
}

impl IdentifierSlot {
    pub fn get(&self) -> Option<&str> {
        self.slot.get().map(String::as_str)
    }

    /// The captured identifier, or an empty string if the hook never fired.
    pub fn identifier(&self) -> String {
        self.get().unwrap_or_default().to_string()
    }
}

//! Durable storage for the session token.
//!
//! SYSTEM CONTEXT
//! ==============
//! The token is the only state that survives a page reload. `SessionStore` is
//! its sole writer; everything else is rebuilt from the backend on load.
//!
//! TRADE-OFFS
//! ==========
//! `localStorage` writes are best-effort (quota or privacy modes can reject
//! them); failures are logged and the in-memory session stays authoritative
//! for the lifetime of the tab.

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

use std::cell::RefCell;
use std::rc::Rc;

/// Key/value slot holding the raw token string. Absent means logged out.
pub trait TokenStorage {
    fn load(&self) -> Option<String>;
    fn store(&self, token: &str);
    fn clear(&self);
}

/// `window.localStorage` under a configurable key. No-op outside the browser.
#[derive(Clone, Debug)]
pub struct LocalTokenStorage {
    key: String,
}

impl LocalTokenStorage {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    #[cfg(feature = "hydrate")]
    fn storage() -> Option<web_sys::Storage> {
        web_sys::window().and_then(|w| w.local_storage().ok().flatten())
    }
}

impl TokenStorage for LocalTokenStorage {
    fn load(&self) -> Option<String> {
        #[cfg(feature = "hydrate")]
        {
            Self::storage()?.get_item(&self.key).ok().flatten()
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = &self.key;
            None
        }
    }

    fn store(&self, token: &str) {
        #[cfg(feature = "hydrate")]
        {
            let Some(storage) = Self::storage() else {
                log::warn!("localStorage unavailable; session will not survive reload");
                return;
            };
            if storage.set_item(&self.key, token).is_err() {
                log::warn!("failed to persist session token");
            }
        }
        #[cfg(not(feature = "hydrate"))]
        {
            let _ = token;
        }
    }

    fn clear(&self) {
        #[cfg(feature = "hydrate")]
        {
            if let Some(storage) = Self::storage() {
                if storage.remove_item(&self.key).is_err() {
                    log::warn!("failed to remove session token");
                }
            }
        }
    }
}

/// In-memory slot for server rendering and tests. Clones share the slot.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStorage {
    slot: Rc<RefCell<Option<String>>>,
}

impl MemoryTokenStorage {
    #[must_use]
    pub fn with_token(token: &str) -> Self {
        let storage = Self::default();
        storage.store(token);
        storage
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Option<String> {
        self.slot.borrow().clone()
    }

    fn store(&self, token: &str) {
        *self.slot.borrow_mut() = Some(token.to_owned());
    }

    fn clear(&self) {
        self.slot.borrow_mut().take();
    }
}

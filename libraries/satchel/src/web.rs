//! `window.localStorage` backend, compiled for wasm32 only.

use wasm_bindgen::JsValue;

use crate::{StorageBackend, StorageError};

pub struct LocalStorageBackend {
    storage: web_sys::Storage,
}

impl LocalStorageBackend {
    /// Fails when the page has no window or storage access is denied
    /// (private browsing modes, sandboxed iframes).
    pub fn new() -> Result<Self, StorageError> {
        let window = web_sys::window().ok_or_else(|| StorageError::Backend {
            key: String::new(),
            message: "no window object".to_string(),
        })?;
        let storage = window
            .local_storage()
            .map_err(|e| backend_error("", &e))?
            .ok_or_else(|| StorageError::Backend {
                key: String::new(),
                message: "localStorage unavailable".to_string(),
            })?;
        Ok(Self { storage })
    }
}

impl StorageBackend for LocalStorageBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage.set_item(key, value).map_err(|e| {
            // Browsers throw a DOMException named QuotaExceededError; anything
            // else is an opaque backend failure.
            let message = format!("{e:?}");
            if message.contains("QuotaExceeded") {
                StorageError::QuotaExceeded {
                    key: key.to_string(),
                }
            } else {
                backend_error(key, &e)
            }
        })
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.storage.remove_item(key) {
            log::error!("Error removing `{key}` from localStorage: {e:?}");
        }
    }
}

fn backend_error(key: &str, e: &JsValue) -> StorageError {
    StorageError::Backend {
        key: key.to_string(),
        message: format!("{e:?}"),
    }
}

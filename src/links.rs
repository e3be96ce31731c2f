//! Download-link ownership.
//!
//! Every completed item owns exactly one download link. The link is created
//! in a [`DownloadLinkStore`] when the item completes and revoked when the
//! [`OutputHandle`] is dropped, which covers both replacement (a re-run or
//! retry overwrites the completed state) and teardown of the whole batch.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

/// Object-backed download links, as provided by the host UI.
pub trait DownloadLinkStore: Send + Sync {
    /// Registers `payload` under a fresh URL and returns that URL.
    fn create_link(&self, filename: &str, payload: &Bytes) -> String;

    /// Releases the storage behind a previously created URL.
    fn revoke_link(&self, url: &str);
}

/// Owns one download link; revokes it on drop.
pub struct OutputHandle {
    filename: String,
    url: String,
    store: Arc<dyn DownloadLinkStore>,
}

impl OutputHandle {
    pub fn create(store: Arc<dyn DownloadLinkStore>, filename: String, payload: &Bytes) -> Self {
        let url = store.create_link(&filename, payload);
        Self {
            filename,
            url,
            store,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for OutputHandle {
    fn drop(&mut self) {
        self.store.revoke_link(&self.url);
    }
}

impl fmt::Debug for OutputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputHandle")
            .field("filename", &self.filename)
            .field("url", &self.url)
            .finish()
    }
}

/// In-memory link store. Sufficient for hosts that serve payloads straight
/// from memory, and for tests that assert release semantics.
#[derive(Default)]
pub struct MemoryLinkStore {
    next_id: AtomicU64,
    entries: Mutex<HashMap<String, Bytes>>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<Bytes> {
        self.entries.lock().unwrap().get(url).cloned()
    }

    pub fn live_links(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl DownloadLinkStore for MemoryLinkStore {
    fn create_link(&self, filename: &str, payload: &Bytes) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("mem://{}/{}", id, filename);
        self.entries
            .lock()
            .unwrap()
            .insert(url.clone(), payload.clone());
        url
    }

    fn revoke_link(&self, url: &str) {
        self.entries.lock().unwrap().remove(url);
    }
}

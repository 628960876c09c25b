//! In-memory blob registry backing the page URLs served to the browser.
//!
//! Every extracted page is registered here and addressed through an opaque
//! [`BlobHandle`]. The handle stays resolvable until it is released; after
//! release the URL dangles and the server answers 404 for it. Replacing the
//! current archive releases the old handles before new ones are acquired, so
//! stale pages can never be fetched through a fresh view.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Opaque reference to a registered blob.
///
/// Cheap to copy; carries no ownership. Resolution goes through the
/// [`BlobStore`] that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobHandle(u64);

impl BlobHandle {
    /// Server path this handle is reachable under while registered.
    pub fn url(&self) -> String {
        format!("/blob/{}", self.0)
    }

    pub(crate) fn id(&self) -> u64 {
        self.0
    }
}

/// A registered blob: raw bytes plus the content type to serve them with.
#[derive(Debug, Clone)]
pub struct Blob {
    pub content_type: &'static str,
    pub data: Bytes,
}

/// Registry of live blobs, shared between the reader state and the server.
pub struct BlobStore {
    blobs: Arc<RwLock<HashMap<u64, Blob>>>,
    next_id: Arc<AtomicU64>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a blob and return the handle it is reachable under.
    pub fn acquire(&self, content_type: &'static str, data: Bytes) -> BlobHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let blob = Blob { content_type, data };
        self.blobs.write().unwrap().insert(id, blob);
        BlobHandle(id)
    }

    /// Drop a registration. Resolving the handle afterwards yields `None`.
    /// Releasing an already-released handle is a no-op.
    pub fn release(&self, handle: BlobHandle) {
        self.blobs.write().unwrap().remove(&handle.id());
    }

    /// Look up a live blob by id. `Bytes` makes the clone cheap.
    pub fn resolve(&self, id: u64) -> Option<Blob> {
        self.blobs.read().unwrap().get(&id).cloned()
    }

    /// Number of currently registered blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for BlobStore {
    fn clone(&self) -> Self {
        Self {
            blobs: Arc::clone(&self.blobs),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquired_handles_resolve() {
        let store = BlobStore::new();
        let handle = store.acquire("image/png", Bytes::from_static(b"png bytes"));

        let blob = store.resolve(handle.id()).unwrap();
        assert_eq!(blob.content_type, "image/png");
        assert_eq!(blob.data.as_ref(), b"png bytes");
    }

    #[test]
    fn released_handles_stop_resolving() {
        let store = BlobStore::new();
        let handle = store.acquire("image/jpeg", Bytes::from_static(b"jpeg"));
        assert!(store.resolve(handle.id()).is_some());

        store.release(handle);
        assert!(store.resolve(handle.id()).is_none());
        assert!(store.is_empty());

        // A second release of the same handle must not panic or disturb others.
        store.release(handle);
    }

    #[test]
    fn handles_are_distinct_across_acquires() {
        let store = BlobStore::new();
        let a = store.acquire("image/gif", Bytes::from_static(b"a"));
        let b = store.acquire("image/gif", Bytes::from_static(b"b"));
        assert_ne!(a, b);
        assert_ne!(a.url(), b.url());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn clones_share_the_same_registry() {
        let store = BlobStore::new();
        let view = store.clone();
        let handle = store.acquire("image/webp", Bytes::from_static(b"w"));

        assert!(view.resolve(handle.id()).is_some());
        view.release(handle);
        assert!(store.resolve(handle.id()).is_none());
    }
}

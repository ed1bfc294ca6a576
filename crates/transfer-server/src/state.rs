use crate::locks::{NameGuard, NameLocks};
use crate::store::UploadStore;

/// Shared state handed to every request.
pub struct AppState {
    pub(crate) store: UploadStore,
    locks: NameLocks,
    serialize_writes: bool,
}

impl AppState {
    pub(crate) fn new(store: UploadStore, serialize_writes: bool) -> Self {
        Self {
            store,
            locks: NameLocks::new(),
            serialize_writes,
        }
    }

    /// Exclusive access for a write to `file_name`, when writes are serialized.
    pub(crate) async fn write_guard(&self, file_name: &str) -> Option<NameGuard> {
        if self.serialize_writes {
            Some(self.locks.acquire(file_name).await)
        } else {
            None
        }
    }
}

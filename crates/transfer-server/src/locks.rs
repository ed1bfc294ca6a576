//! Per-name exclusive write access.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of async locks keyed by stored file name.
///
/// Entries are weak; a name's lock disappears once no writer holds it.
#[derive(Default)]
pub(crate) struct NameLocks {
    inner: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

/// Held for the duration of one write; releases on drop.
pub(crate) struct NameGuard {
    _guard: OwnedMutexGuard<()>,
}

impl NameLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `name`.
    pub(crate) async fn acquire(&self, name: &str) -> NameGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|_, lock| lock.strong_count() > 0);
            match map.get(name).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    map.insert(name.to_string(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        NameGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of names with a live holder or waiter.
    #[cfg(test)]
    pub(crate) fn active(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.values().filter(|lock| lock.strong_count() > 0).count()
    }
}

/// Lock key for a resolved path.
///
/// `.` components and repeated separators are dropped so spellings of the same
/// file share one lock. `..` is kept as-is.
pub(crate) fn lock_key(path: &Path) -> String {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect::<PathBuf>()
        .to_string_lossy()
        .into_owned()
}

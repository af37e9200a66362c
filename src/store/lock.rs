//! In-process mutual exclusion keyed on the storage directory.
//!
//! The document file and the git working tree are shared by every operation
//! against one storage directory. Read-modify-write sequences and the sync
//! driver's multi-step operations hold this guard for their whole duration so
//! two overlapping invocations never interleave. The guard is not reentrant:
//! code holding it must call only the unlocked primitives.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

static LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Guard held while operating on a storage directory.
pub type DirGuard = OwnedMutexGuard<()>;

fn lock_for(dir: &Path) -> Arc<AsyncMutex<()>> {
    // Absolute, not canonical: the directory may not exist yet.
    let key = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
    let mut locks = LOCKS.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    Arc::clone(locks.entry(key).or_default())
}

/// Wait for exclusive access to a storage directory.
pub async fn lock_dir(dir: &Path) -> DirGuard {
    lock_for(dir).lock_owned().await
}

/// Take exclusive access only if nobody holds it.
#[cfg(test)]
#[must_use]
pub(crate) fn try_lock_dir(dir: &Path) -> Option<DirGuard> {
    lock_for(dir).try_lock_owned().ok()
}

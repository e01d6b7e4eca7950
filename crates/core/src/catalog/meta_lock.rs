//! C3: the meta lock -- an exclusive row-level lock on the `SYS` table used
//! to serialize DDL (`spec.md` §4.3).
//!
//! `lock_meta`/`unlock_meta` are reentrant per session: a session that
//! already holds the lock may call `lock_meta` again (e.g. nested DDL
//! within a compound statement) without deadlocking, and only the call that
//! actually acquired the lock releases it.

use parking_lot::Mutex;
use reldb_primitives::SessionId;

use crate::error::CatalogError;

/// Debug-only record of who holds the meta lock, modeled as
/// `MetaLockOwner { session_id, acquisition_site }` per DESIGN NOTES
/// (`spec.md` §9). Gated behind `meta-lock-debug` (on by default: the
/// check is O(1), see §9's open-question resolution).
#[cfg(feature = "meta-lock-debug")]
#[derive(Debug, Clone)]
pub struct MetaLockOwner {
    pub session_id: SessionId,
    pub acquisition_site: &'static std::panic::Location<'static>,
}

struct Held {
    owner: SessionId,
    #[cfg(feature = "meta-lock-debug")]
    site: &'static std::panic::Location<'static>,
}

/// The exclusive row-level lock on `SYS`.
pub struct MetaLock {
    held: Mutex<Option<Held>>,
}

impl Default for MetaLock {
    fn default() -> Self {
        Self { held: Mutex::new(None) }
    }
}

impl MetaLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `session`, or confirms it already holds it.
    /// Returns whether this call was the one that actually acquired the
    /// lock (the session must only call `unlock_meta` when this is `true`).
    #[track_caller]
    pub fn lock_meta(&self, session: SessionId) -> Result<bool, CatalogError> {
        let mut held = self.held.lock();
        match &*held {
            Some(h) if h.owner == session => Ok(false),
            Some(_) => Err(CatalogError::MetaLockBusy),
            None => {
                *held = Some(Held {
                    owner: session,
                    #[cfg(feature = "meta-lock-debug")]
                    site: std::panic::Location::caller(),
                });
                Ok(true)
            }
        }
    }

    /// Releases the lock iff `acquired_here` (the return value of the
    /// matching `lock_meta` call).
    pub fn unlock_meta(&self, session: SessionId, acquired_here: bool) {
        if !acquired_here {
            return;
        }
        let mut held = self.held.lock();
        if matches!(&*held, Some(h) if h.owner == session) {
            *held = None;
        }
    }

    /// `checkMetaFree` (`spec.md` §9): asserts nobody holds the lock. Always
    /// run after `remove_database_object`/`remove_schema_object`.
    pub fn assert_free(&self) -> Result<(), CatalogError> {
        if self.held.lock().is_some() {
            return Err(CatalogError::Internal("meta lock still held after removal".into()));
        }
        Ok(())
    }

    #[cfg(feature = "meta-lock-debug")]
    pub fn owner(&self) -> Option<MetaLockOwner> {
        self.held.lock().as_ref().map(|h| MetaLockOwner { session_id: h.owner, acquisition_site: h.site })
    }
}

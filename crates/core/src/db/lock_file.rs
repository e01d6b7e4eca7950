//! The on-disk lock file taken during C8's open sequence (`spec.md` §4.8,
//! §6), via `fs2::FileExt::try_lock_exclusive`, dispatching on the
//! `FILE_LOCK` connection option's modes (`NO`, `FILE`, `SOCKET`, `FS`,
//! `SERIALIZED`).

use std::fmt;
use std::fs::File;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use fs2::FileExt as _;

use crate::config::FileLockMethod;
use crate::error::LifecycleError;

/// A held advisory lock on `<database>.lock` (or a no-op, for
/// `FILE_LOCK=NO`). `SOCKET` and `FS` are recognized but not implemented:
/// cross-node coordination beyond the C7 failover hook is out of scope
/// (`spec.md` §1).
pub struct LockFile {
    path: Arc<Path>,
    #[allow(unused)]
    lock: Option<Arc<File>>,
}

impl LockFile {
    /// Acquires the lock file at `<root>/db.lock` per `method`.
    pub fn lock(root: &Path, method: FileLockMethod) -> Result<Self, LifecycleError> {
        let path = root.join("db.lock");
        match method {
            FileLockMethod::No => Ok(Self { path: path.into(), lock: None }),
            FileLockMethod::File | FileLockMethod::Serialized => {
                let file = File::create(&path).map_err(|e| LifecycleError::LockFailed(path.clone(), e))?;
                file.try_lock_exclusive().map_err(|e| LifecycleError::LockFailed(path.clone(), e))?;
                Ok(Self { path: path.into(), lock: Some(file.into()) })
            }
            FileLockMethod::Socket => Err(LifecycleError::Unsupported("FILE_LOCK=SOCKET")),
            FileLockMethod::Fs => Err(LifecycleError::Unsupported("FILE_LOCK=FS")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the auto-server key/value section (`spec.md` §6): line-
    /// oriented `key=value\n` entries such as `server=<ip:port>` and
    /// `hostName=<host>`.
    pub fn write_properties(&self, entries: &[(&str, &str)]) -> std::io::Result<()> {
        let Some(lock) = &self.lock else { return Ok(()) };
        let mut file: &File = lock;
        for (key, value) in entries {
            writeln!(file, "{key}={value}")?;
        }
        file.flush()
    }
}

impl fmt::Debug for LockFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFile").field("path", &self.path).field("held", &self.lock.is_some()).finish()
    }
}

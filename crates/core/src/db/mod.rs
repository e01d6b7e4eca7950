//! C2 (Object Id Allocator) and the on-disk lock file backing C8's open
//! sequence.

pub mod lock_file;
pub mod objectid;

pub use lock_file::LockFile;
pub use objectid::{ObjectIdAllocator, PendingReleases};

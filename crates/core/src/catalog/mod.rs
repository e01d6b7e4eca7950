//! C3 (Catalog Store), C4 (Catalog Manager) and C5 (Meta-Record Executor):
//! manages the database's metadata -- every named object, its persisted
//! `SYS` row, and the lock that serializes structural changes to them.

pub mod executor;
pub mod manager;
pub mod meta_lock;
pub mod object;
pub mod sys_table;

pub use executor::{plan_replay, recompile_invalid_views, ReplayPlan, ViewCompiler};
pub use manager::{Catalog, DependencyProbe, NoDependents};
pub use meta_lock::MetaLock;
pub use object::{CatalogObject, ConstraintKind, Grantable, Grantee, ObjectPayload, Right};
pub use sys_table::{SysRow, SysTable};

//! Error taxonomy for the catalog, session and lifecycle subsystems.
//!
//! One narrow `thiserror` enum per subsystem, composed into [`DbError`]
//! via `#[from]`.

use std::path::PathBuf;

use reldb_primitives::{ObjectId, ObjectType, SessionId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("setting `{0}` is not recognized")]
    UnknownOption(String),
    #[error("setting `{0}` has an invalid value `{1}`")]
    InvalidValue(String, String),
    #[error("DATABASE_TO_UPPER and DATABASE_TO_LOWER cannot both be set")]
    UnsupportedCombination,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{0} `{1}` not found")]
    NotFound(ObjectType, String),
    #[error("{0} `{1}` already exists")]
    AlreadyExists(ObjectType, String),
    #[error("object id {0} not found in SYS")]
    IdNotFound(ObjectId),
    #[error("cannot drop {0} `{1}`: referenced by table `{2}`")]
    CannotDrop(ObjectType, String, String),
    #[error("{0} `{1}` cannot be renamed")]
    NotRenameable(ObjectType, String),
    #[error("internal catalog invariant violated: {0}")]
    Internal(String),
    #[error("meta lock is already held by another session")]
    MetaLockBusy,
    #[error("{0} `{1}` has a circular or missing dependency and can never be prepared")]
    DomainNotPreparable(ObjectType, String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session is closed")]
    ConnectionBroken,
    #[error("statement was canceled")]
    StatementWasCanceled,
    #[error("commit/rollback disabled while table locks are held")]
    CommitRollbackNotAllowed,
    #[error("savepoint `{0}` not found")]
    SavepointNotFound(String),
    #[error("transaction `{0}` not found")]
    TransactionNotFound(String),
    #[error("lock timeout waiting on table")]
    LockTimeout,
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("database is already open at {0}")]
    DatabaseAlreadyOpen(PathBuf),
    #[error("database is closed")]
    DatabaseIsClosed,
    #[error("database is read-only")]
    DatabaseIsReadOnly,
    #[error("database is in exclusive mode")]
    DatabaseIsInExclusiveMode,
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("simulated power-off")]
    SimulatedPowerOff,
    #[error("feature not supported: {0}")]
    Unsupported(&'static str),
    #[error("failed to lock database file at {0}: {1}")]
    LockFailed(PathBuf, #[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("no transports remain and auto-reconnect is disabled")]
    AllTransportsFailed,
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server returned an error frame: {message} (sqlstate {sqlstate})")]
    Server { sqlstate: String, message: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{0}")]
    Settings(#[from] SettingsError),
    #[error("{0}")]
    Catalog(#[from] CatalogError),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("{0}")]
    Remote(#[from] RemoteError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DbError {
    /// Whether this error should close the database (per `spec.md` §7:
    /// "Fatal errors ... close the database; further operations fail with
    /// `DatabaseIsClosed`").
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DbError::Lifecycle(LifecycleError::SimulatedPowerOff) | DbError::Lifecycle(LifecycleError::LockFailed(..))
        )
    }
}

pub type DbResult<T> = Result<T, DbError>;

//! C6: the Local Session.
//!
//! Per-connection transactional state: locks held, undo log, savepoints,
//! local temp resources, current schema, throttle, cancellation, and the
//! prepared-statement cache (`spec.md` §4.6). The state machine is a small,
//! explicit enum with a plain `impl` block -- no generic FSM crate.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use nohash_hasher::IntSet;
use parking_lot::Mutex;
use reldb_primitives::{IsolationLevel, ObjectId, SessionId};
use tracing::{trace, warn};

use crate::db::objectid::{ObjectIdAllocator, PendingReleases};
use crate::error::{DbError, DbResult, SessionError};
use crate::store::StoreTx;
use crate::undo::{UndoLog, UndoLogRecord};

/// Stands in for the out-of-scope SQL parser/planner (`spec.md` §1): a
/// parsed, ready-to-run command.
pub trait PreparedStatement: fmt::Debug + Send + Sync {
    /// Whether this command may be cached, e.g. `false` for statements that
    /// bind LOB parameters (`spec.md` §4.6).
    fn is_cacheable(&self) -> bool {
        true
    }
}

/// Stands in for the out-of-scope SQL parser (`spec.md` §1: "the core only
/// requires a `prepare(sql) -> PreparedStatement` ... surface").
pub trait Parser {
    fn prepare(&self, sql: &str) -> DbResult<std::sync::Arc<dyn PreparedStatement>>;
}

/// `{undo_index, txn_savepoint}` (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavepointMark {
    pub undo_index: usize,
    pub txn_savepoint: u64,
}

/// How a local temporary table behaves at commit (`spec.md` §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempDropPolicy {
    OnCommitDrop,
    OnCommitTruncate,
    Persist,
}

/// A session's local temp tables/indexes/constraints (`spec.md` §3).
#[derive(Debug, Default)]
pub struct LocalTemp {
    pub tables: Vec<(ObjectId, TempDropPolicy)>,
    pub indexes: Vec<ObjectId>,
    pub constraints: Vec<ObjectId>,
}

/// The session state machine (`spec.md` §4.6). Stored as an atomic cell
/// since `cancel()`/exclusive-mode suspension may be driven from another
/// thread (`spec.md` §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Init = 0,
    Sleep = 1,
    Running = 2,
    Blocked = 3,
    Throttled = 4,
    Suspended = 5,
    Closed = 6,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Init,
            1 => Self::Sleep,
            2 => Self::Running,
            3 => Self::Blocked,
            4 => Self::Throttled,
            5 => Self::Suspended,
            _ => Self::Closed,
        }
    }
}

struct AtomicState(AtomicU8);

impl AtomicState {
    fn new(s: SessionState) -> Self {
        Self(AtomicU8::new(s as u8))
    }
    fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }
    fn store(&self, s: SessionState) {
        self.0.store(s as u8, Ordering::Release)
    }
}

/// A single cached prepared statement (`spec.md` §4.6; eviction policy per
/// `SPEC_FULL.md` §4.6.1).
struct CacheEntry {
    stmt: std::sync::Arc<dyn PreparedStatement>,
}

/// The outcome of a successful `commit`/`rollback`: which local temp
/// resources the session needs the (out-of-scope) Table layer to finish
/// tearing down.
#[derive(Debug, Default, Clone)]
pub struct TempCleanup {
    pub dropped: Vec<ObjectId>,
    pub truncated: Vec<ObjectId>,
}

/// Per-connection transactional state (`spec.md` §3, §4.6).
pub struct Session<Tx: StoreTx> {
    pub id: SessionId,
    pub user: String,
    pub auto_commit: bool,
    auto_commit_deferred: bool,
    pub isolation: IsolationLevel,
    pub locks: IntSet<ObjectId>,
    pub undo_log: UndoLog,
    pub savepoints: IndexMap<String, SavepointMark>,
    pub local_temp: LocalTemp,
    pub current_schema: String,
    query_cache: IndexMap<String, CacheEntry>,
    query_cache_size: usize,
    last_seen_modification_meta_id: u64,
    pub commit_or_rollback_disabled: bool,
    cancel_at: Mutex<Option<Instant>>,
    last_throttle: Mutex<Option<Instant>>,
    state: AtomicState,
    current_command: Option<String>,
    pending_releases: PendingReleases,
    prepared_name: Option<String>,
    tx: Tx,
}

impl<Tx: StoreTx> Session<Tx> {
    pub fn new(id: SessionId, user: String, isolation: IsolationLevel, current_schema: String, query_cache_size: usize, tx: Tx) -> Self {
        Self {
            id,
            user,
            auto_commit: true,
            auto_commit_deferred: false,
            isolation,
            locks: IntSet::default(),
            undo_log: UndoLog::default(),
            savepoints: IndexMap::new(),
            local_temp: LocalTemp::default(),
            current_schema,
            query_cache: IndexMap::new(),
            query_cache_size,
            last_seen_modification_meta_id: 0,
            commit_or_rollback_disabled: false,
            cancel_at: Mutex::new(None),
            last_throttle: Mutex::new(None),
            state: AtomicState::new(SessionState::Sleep),
            current_command: None,
            pending_releases: PendingReleases::new(),
            prepared_name: None,
            tx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    fn require_open(&self) -> DbResult<()> {
        if self.state() == SessionState::Closed {
            return Err(SessionError::ConnectionBroken.into());
        }
        Ok(())
    }

    /// `set_current_command` (`spec.md` §4.6): transitions to `Running`;
    /// arms `cancel_at` if a query timeout is configured.
    pub fn set_current_command(&mut self, cmd: String, query_timeout: Option<Duration>) -> DbResult<()> {
        self.require_open()?;
        self.current_command = Some(cmd);
        self.state.store(SessionState::Running);
        if let Some(timeout) = query_timeout {
            *self.cancel_at.lock() = Some(Instant::now() + timeout);
        }
        Ok(())
    }

    /// Normal end-of-command transition back to idle.
    pub fn end_command(&mut self) {
        self.current_command = None;
        *self.cancel_at.lock() = None;
        if self.state() != SessionState::Closed {
            self.state.store(SessionState::Sleep);
        }
    }

    pub fn block(&self) {
        self.state.store(SessionState::Blocked);
    }

    pub fn unblock(&self) {
        self.state.store(SessionState::Running);
    }

    /// `throttle()` (`spec.md` §4.6): at most one sleep per `min_delay`
    /// window, yielding to other sessions during long-running DDL.
    pub fn throttle(&self, throttle_millis: u64, min_delay: Duration) {
        if throttle_millis == 0 {
            return;
        }
        let now = Instant::now();
        let mut last = self.last_throttle.lock();
        if last.map_or(true, |t| now.duration_since(t) >= min_delay) {
            self.state.store(SessionState::Throttled);
            std::thread::sleep(Duration::from_millis(throttle_millis));
            *last = Some(Instant::now());
            self.state.store(SessionState::Running);
        }
    }

    /// Entered only when another session requests exclusive access with
    /// `close_others=true` (`spec.md` §4.6); the session is canceled and
    /// must observe `Closed` at its next `check_canceled`.
    pub fn suspend(&self) {
        self.state.store(SessionState::Suspended);
        *self.cancel_at.lock() = Some(Instant::now());
    }

    /// Soft cancellation signal; `check_canceled()` observes it from the
    /// owning thread (`spec.md` §4.6, §5).
    pub fn cancel(&self) {
        *self.cancel_at.lock() = Some(Instant::now());
    }

    /// Observes a pending cancellation, if any, transitioning the state
    /// machine accordingly (`spec.md` §4.6's `cancel` arrow back to
    /// `Sleep`, or to `Closed` if the session was `Suspended`).
    pub fn check_canceled(&self) -> DbResult<()> {
        let due = self.cancel_at.lock().is_some_and(|at| Instant::now() >= at);
        if !due {
            return Ok(());
        }
        let was_suspended = self.state() == SessionState::Suspended;
        *self.cancel_at.lock() = None;
        self.state.store(if was_suspended { SessionState::Closed } else { SessionState::Sleep });
        Err(SessionError::StatementWasCanceled.into())
    }

    /// `prepare(sql)` (`spec.md` §4.6): consults the session-local LRU
    /// cache, invalidated in full whenever `modification_meta_id` has
    /// advanced since last lookup.
    pub fn prepare(&mut self, sql: &str, modification_meta_id: u64, parser: &dyn Parser) -> DbResult<std::sync::Arc<dyn PreparedStatement>> {
        self.require_open()?;
        if modification_meta_id != self.last_seen_modification_meta_id {
            trace!(session = self.id.0, "query cache invalidated: modification_meta_id advanced");
            self.query_cache.clear();
            self.last_seen_modification_meta_id = modification_meta_id;
        }
        if let Some(entry) = self.query_cache.shift_remove(sql) {
            self.query_cache.insert(sql.to_owned(), CacheEntry { stmt: entry.stmt.clone() });
            return Ok(entry.stmt);
        }
        let stmt = parser.prepare(sql)?;
        if stmt.is_cacheable() {
            if self.query_cache.len() >= self.query_cache_size {
                self.query_cache.shift_remove_index(0);
            }
            self.query_cache.insert(sql.to_owned(), CacheEntry { stmt: stmt.clone() });
        }
        Ok(stmt)
    }

    /// `commit(ddl)` (`spec.md` §4.6).
    pub fn commit(&mut self, ddl: bool, ids: &ObjectIdAllocator, publish_new_snapshot: impl FnOnce() -> u64) -> DbResult<TempCleanup> {
        self.require_open()?;
        if self.commit_or_rollback_disabled && !self.locks.is_empty() {
            return Err(SessionError::CommitRollbackNotAllowed.into());
        }
        for table in &self.locks {
            self.tx.mark_table_updated(*table);
        }
        self.tx.commit().map_err(DbError::Other)?;
        self.undo_log.clear();

        let mut cleanup = TempCleanup::default();
        if !ddl {
            self.local_temp.tables.retain(|(id, policy)| match policy {
                TempDropPolicy::OnCommitDrop => {
                    cleanup.dropped.push(*id);
                    self.pending_releases.schedule(*id);
                    false
                }
                TempDropPolicy::OnCommitTruncate => {
                    cleanup.truncated.push(*id);
                    true
                }
                TempDropPolicy::Persist => true,
            });
        }
        if self.auto_commit_deferred {
            self.auto_commit = true;
            self.auto_commit_deferred = false;
        }

        self.locks.clear();
        self.pending_releases.flush(ids);

        if self.isolation.forbids_non_repeatable_reads() {
            publish_new_snapshot();
        }
        self.end_command();
        Ok(cleanup)
    }

    /// `rollback()` (`spec.md` §4.6): replays undo in reverse via `undo_one`,
    /// then aborts the underlying transaction.
    pub fn rollback(&mut self, ids: &ObjectIdAllocator, mut undo_one: impl FnMut(&UndoLogRecord) -> DbResult<()>) -> DbResult<()> {
        self.require_open()?;
        while let Some(record) = self.undo_log.remove_last(true).map_err(|e| DbError::Other(e.into()))? {
            undo_one(&record)?;
        }
        self.tx.rollback().map_err(DbError::Other)?;
        self.local_temp.tables.clear();
        self.local_temp.indexes.clear();
        self.local_temp.constraints.clear();
        self.locks.clear();
        self.pending_releases.flush(ids);
        self.end_command();
        Ok(())
    }

    /// `savepoint(name)`: captures `(undo_index, txn_savepoint)`.
    pub fn savepoint(&mut self, name: String) -> DbResult<()> {
        self.require_open()?;
        let txn_savepoint = self.tx.savepoint().map_err(DbError::Other)?;
        let mark = SavepointMark { undo_index: self.undo_log.size(), txn_savepoint };
        self.savepoints.insert(name, mark);
        Ok(())
    }

    /// `rollback_to_savepoint(name)`: truncates undo to the captured index,
    /// discards later savepoints.
    pub fn rollback_to_savepoint(&mut self, name: &str, mut undo_one: impl FnMut(&UndoLogRecord) -> DbResult<()>) -> DbResult<()> {
        self.require_open()?;
        let mark = *self.savepoints.get(name).ok_or_else(|| SessionError::SavepointNotFound(name.to_owned()))?;
        while self.undo_log.size() > mark.undo_index {
            let Some(record) = self.undo_log.remove_last(true).map_err(|e| DbError::Other(e.into()))? else { break };
            undo_one(&record)?;
        }
        self.tx.rollback_to_savepoint(mark.txn_savepoint).map_err(DbError::Other)?;
        // discard savepoints taken after `name` (later insertions in the map).
        if let Some(pos) = self.savepoints.get_index_of(name) {
            self.savepoints.truncate(pos + 1);
        }
        Ok(())
    }

    /// `prepare_commit(name)` (`spec.md` §4.6, §4.8): two-phase commit
    /// surface, leaving the transaction's locks held until resolved.
    pub fn prepare_commit(&mut self, name: String) -> DbResult<()> {
        self.require_open()?;
        self.tx.prepare_commit(&name).map_err(DbError::Other)?;
        self.prepared_name = Some(name);
        Ok(())
    }

    /// `set_prepared_transaction(name, commit)`: resolves this session's own
    /// in-doubt transaction. Returns `Err(TransactionNotFound)` if `name`
    /// was prepared by a different session -- the caller (C8) then falls
    /// back to `TransactionStore::resolve_in_doubt`.
    pub fn set_prepared_transaction(&mut self, name: &str, commit: bool, ids: &ObjectIdAllocator) -> DbResult<()> {
        if self.prepared_name.as_deref() != Some(name) {
            return Err(SessionError::TransactionNotFound(name.to_owned()).into());
        }
        if commit {
            self.tx.commit().map_err(DbError::Other)?;
        } else {
            self.tx.rollback().map_err(DbError::Other)?;
        }
        self.prepared_name = None;
        self.locks.clear();
        self.pending_releases.flush(ids);
        Ok(())
    }

    /// Closes the session. Idempotent: closing an already-closed session is
    /// a no-op, matching `Database::close`'s re-entrancy requirement
    /// (`spec.md` §3 Lifecycles).
    pub fn close(&mut self) {
        if self.state() == SessionState::Closed {
            return;
        }
        if !self.locks.is_empty() || self.undo_log.size() > 0 {
            warn!(session = self.id.0, "closing session with live transaction state; caller should rollback first");
        }
        self.state.store(SessionState::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[derive(Default)]
    struct FakeTx {
        committed: bool,
        rolled_back: bool,
        savepoints: u64,
    }

    impl StoreTx for FakeTx {
        fn mark_table_updated(&mut self, _table: ObjectId) {}
        fn commit(&mut self) -> anyhow::Result<()> {
            self.committed = true;
            Ok(())
        }
        fn rollback(&mut self) -> anyhow::Result<()> {
            self.rolled_back = true;
            Ok(())
        }
        fn savepoint(&mut self) -> anyhow::Result<u64> {
            self.savepoints += 1;
            Ok(self.savepoints)
        }
        fn rollback_to_savepoint(&mut self, _savepoint: u64) -> anyhow::Result<()> {
            Ok(())
        }
        fn prepare_commit(&mut self, _name: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn session() -> Session<FakeTx> {
        Session::new(SessionId(1), "SA".to_owned(), IsolationLevel::ReadCommitted, "PUBLIC".to_owned(), 2, FakeTx::default())
    }

    #[test]
    fn commit_clears_undo_and_locks() {
        let mut s = session();
        let ids = ObjectIdAllocator::new();
        s.locks.insert(ObjectId(1));
        s.undo_log.add(UndoLogRecord::new(ObjectId(1), crate::undo::UndoOperation::Insert, Bytes::from_static(b"x"))).unwrap();
        s.commit(false, &ids, || 1).unwrap();
        assert!(s.locks.is_empty());
        assert_eq!(s.undo_log.size(), 0);
        assert_eq!(s.state(), SessionState::Sleep);
    }

    #[test]
    fn rollback_replays_undo_in_reverse() {
        let mut s = session();
        let ids = ObjectIdAllocator::new();
        s.undo_log.add(UndoLogRecord::new(ObjectId(1), crate::undo::UndoOperation::Insert, Bytes::from_static(b"a"))).unwrap();
        s.undo_log.add(UndoLogRecord::new(ObjectId(2), crate::undo::UndoOperation::Insert, Bytes::from_static(b"b"))).unwrap();
        let mut order = Vec::new();
        s.rollback(&ids, |rec| {
            order.push(rec.table_id.0);
            Ok(())
        })
        .unwrap();
        assert_eq!(order, vec![2, 1]);
        assert!(s.tx.rolled_back);
    }

    #[test]
    fn savepoint_then_rollback_to_it_discards_later_work() {
        let mut s = session();
        let ids = ObjectIdAllocator::new();
        s.undo_log.add(UndoLogRecord::new(ObjectId(1), crate::undo::UndoOperation::Insert, Bytes::from_static(b"a"))).unwrap();
        s.savepoint("s1".to_owned()).unwrap();
        s.undo_log.add(UndoLogRecord::new(ObjectId(2), crate::undo::UndoOperation::Insert, Bytes::from_static(b"b"))).unwrap();
        s.savepoint("s2".to_owned()).unwrap();
        s.rollback_to_savepoint("s1", |_| Ok(())).unwrap();
        assert_eq!(s.undo_log.size(), 1);
        assert!(s.savepoints.get("s2").is_none());
        assert!(s.savepoints.get("s1").is_some());
    }

    #[test]
    fn savepoint_not_found_is_an_error() {
        let mut s = session();
        let err = s.rollback_to_savepoint("nope", |_| Ok(())).unwrap_err();
        assert!(matches!(err, DbError::Session(SessionError::SavepointNotFound(_))));
    }

    #[test]
    fn cancel_then_check_canceled_raises_and_resets_state() {
        let mut s = session();
        s.set_current_command("SELECT 1".to_owned(), None).unwrap();
        s.cancel();
        let err = s.check_canceled().unwrap_err();
        assert!(matches!(err, DbError::Session(SessionError::StatementWasCanceled)));
        assert_eq!(s.state(), SessionState::Sleep);
    }

    #[test]
    fn closed_session_rejects_commands() {
        let mut s = session();
        s.close();
        let err = s.set_current_command("SELECT 1".to_owned(), None).unwrap_err();
        assert!(matches!(err, DbError::Session(SessionError::ConnectionBroken)));
    }

    #[test]
    fn query_cache_evicts_past_configured_size() {
        struct Stmt;
        impl fmt::Debug for Stmt {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "Stmt")
            }
        }
        impl PreparedStatement for Stmt {}
        struct FakeParser;
        impl Parser for FakeParser {
            fn prepare(&self, _sql: &str) -> DbResult<std::sync::Arc<dyn PreparedStatement>> {
                Ok(std::sync::Arc::new(Stmt))
            }
        }
        let mut s = session();
        let parser = FakeParser;
        s.prepare("SELECT 1", 0, &parser).unwrap();
        s.prepare("SELECT 2", 0, &parser).unwrap();
        s.prepare("SELECT 3", 0, &parser).unwrap();
        assert_eq!(s.query_cache.len(), 2);
        assert!(!s.query_cache.contains_key("SELECT 1"));
    }

    #[test]
    fn query_cache_clears_when_modification_meta_id_advances() {
        struct Stmt;
        impl fmt::Debug for Stmt {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "Stmt")
            }
        }
        impl PreparedStatement for Stmt {}
        struct FakeParser;
        impl Parser for FakeParser {
            fn prepare(&self, _sql: &str) -> DbResult<std::sync::Arc<dyn PreparedStatement>> {
                Ok(std::sync::Arc::new(Stmt))
            }
        }
        let mut s = session();
        let parser = FakeParser;
        s.prepare("SELECT 1", 0, &parser).unwrap();
        s.prepare("SELECT 1", 5, &parser).unwrap();
        assert_eq!(s.last_seen_modification_meta_id, 5);
    }
}

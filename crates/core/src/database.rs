//! The process-wide `Database` handle and C8, the Lifecycle Controller.
//!
//! Fields are ordered so that resources are released in the right order on
//! drop: the file lock is taken first during `open()` and must be the last
//! field dropped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use reldb_data_structures::CaseFolding;
use reldb_primitives::SessionId;
use tracing::{info, warn};

use crate::catalog::executor::{plan_replay, recompile_invalid_views, ViewCompiler};
use crate::catalog::object::{CatalogObject, ObjectPayload};
use crate::catalog::Catalog;
use crate::config::{DbSettings, FileLockMethod};
use crate::db::lock_file::LockFile;
use crate::db::objectid::ObjectIdAllocator;
use crate::error::{DbError, DbResult, LifecycleError, SessionError};
use crate::session::Session;
use crate::store::TransactionStore;

/// Closed over by the process-wide shutdown hook (`spec.md` §9: "register a
/// single process-wide handler that closes all live databases in reverse
/// open order"). `Database<S>` is generic per store implementation, so the
/// registry is type-erased.
pub trait Closeable: Send + Sync {
    fn shutdown(&self);
}

static SHUTDOWN_REGISTRY: Lazy<Mutex<Vec<Arc<dyn Closeable>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Runs every registered database's shutdown handler in reverse open order.
/// A real embedding calls this from its process-exit hook.
pub fn run_shutdown_hook() {
    let mut registry = SHUTDOWN_REGISTRY.lock();
    for db in registry.drain(..).rev() {
        db.shutdown();
    }
}

fn register_for_shutdown(db: Arc<dyn Closeable>) {
    SHUTDOWN_REGISTRY.lock().push(db);
}

/// The process-wide handle: all catalog maps, the object id allocator, the
/// exclusive-session slot, system/LOB sessions, and the lifecycle counters
/// (`spec.md` §3).
pub struct Database<S: TransactionStore> {
    short_name: String,
    root: PathBuf,
    persistent: bool,
    settings: DbSettings,
    store: S,
    catalog: Mutex<Catalog>,
    object_ids: ObjectIdAllocator,
    sessions: Mutex<HashMap<SessionId, Session<S::Tx>>>,
    next_session_id: AtomicU32,
    exclusive_session: Mutex<Option<SessionId>>,
    system_session: Mutex<Session<S::Tx>>,
    lob_session: Mutex<Session<S::Tx>>,
    background_exception: Mutex<Option<String>>,
    modification_data_id: AtomicU64,
    modification_meta_id: AtomicU64,
    remote_settings_id: AtomicU64,
    power_off_count: AtomicI64,
    closing: AtomicBool,
    close_delay_ms: i64,
    /// Armed when the last session disconnects with `close_delay_ms > 0`;
    /// cleared by the next `create_session`. A real embedding polls
    /// [`Database::process_delayed_close`] from its own reaper loop
    /// (`spec.md` §4.8, §9: "do not spawn a dedicated thread per database").
    delayed_close_deadline: Mutex<Option<std::time::Instant>>,
    in_doubt: Mutex<Vec<String>>,
    /// `DELETE_FILES_ON_DISCONNECT` (`spec.md` §4.8): remove the database's
    /// files from disk once the last session disconnects and `close()` runs.
    delete_files_on_disconnect: bool,
    // Field ordering matters: the lock file is acquired first during open
    // and must be the last field dropped, so it is declared last. It is
    // `Mutex`-wrapped so `close()` can release it explicitly rather than
    // waiting for `Database` itself to drop.
    lock_file: Mutex<Option<LockFile>>,
}

impl<S: TransactionStore> Database<S>
where
    S::Tx: Send,
{
    /// The open sequence (`spec.md` §4.8), persistent-mode steps 1-13.
    /// `existing_objects` stands in for what a real engine would have
    /// decoded from durable `SYS` rows found on disk; a fresh database
    /// passes an empty vec.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        root: PathBuf,
        settings: DbSettings,
        file_lock: FileLockMethod,
        read_only: bool,
        power_off_count: i64,
        close_delay_ms: i64,
        delete_files_on_disconnect: bool,
        store: S,
        existing_objects: Vec<CatalogObject>,
        mut try_prepare_domain: impl FnMut(&CatalogObject) -> Result<bool, DbError>,
        view_compiler: &mut impl ViewCompiler,
    ) -> DbResult<Self> {
        // 1. Derive short name, apply case folding.
        let stem = root.file_stem().and_then(|s| s.to_str()).unwrap_or("db").to_owned();
        let short_name = match settings.case_folding() {
            CaseFolding::Upper => stem.to_uppercase(),
            CaseFolding::Lower => stem.to_lowercase(),
            _ => stem,
        };
        let persistent = root != PathBuf::from(":memory:");

        // 2. Acquire the file lock (unless read-only and lock absent).
        let lock_file = if persistent && !read_only {
            std::fs::create_dir_all(&root).map_err(|e| LifecycleError::LockFailed(root.clone(), e))?;
            Some(LockFile::lock(&root, file_lock)?)
        } else {
            None
        };

        // 3. Delete orphaned temp files. Out of scope beyond the log line:
        // temp file naming belongs to the (out-of-scope) Table layer.
        info!(database = %short_name, "skipping orphaned temp file sweep: no temp file registry in this core");

        // 4. The transaction store is already open (constructing `S` is the
        // caller's job, per `spec.md` §1).

        // 5/6/7/8. Bootstrap the catalog: system user, main/info schemas,
        // public role, the SYS table, and the system/LOB sessions.
        let object_ids = ObjectIdAllocator::new();
        let mut catalog = Catalog::new();
        let bootstrap_session = SessionId(0);
        catalog.add_database_object(bootstrap_session, bootstrap_schema(object_ids.allocate(), "PUBLIC"))?;
        catalog.add_database_object(bootstrap_session, bootstrap_schema(object_ids.allocate(), "INFORMATION_SCHEMA"))?;

        let system_session = Session::new(
            SessionId(0),
            "SYSTEM".to_owned(),
            reldb_primitives::IsolationLevel::Serializable,
            "PUBLIC".to_owned(),
            settings.query_cache_size,
            store.begin().map_err(DbError::Other)?,
        );
        let lob_session = Session::new(
            SessionId(1),
            "LOB".to_owned(),
            reldb_primitives::IsolationLevel::ReadCommitted,
            "PUBLIC".to_owned(),
            settings.query_cache_size,
            store.begin().map_err(DbError::Other)?,
        );

        // 9. Replay meta records (C5). Table objects carry their schema
        // directly; index/constraint/trigger objects only name their
        // target table, so resolving their actual schema would require the
        // out-of-scope Table layer. Every non-table schema-scoped object is
        // replayed into PUBLIC, which is correct for every database this
        // bootstrap itself creates (it only ever creates PUBLIC objects).
        let replay = plan_replay(existing_objects, |obj| try_prepare_domain(obj))?;
        for obj in replay.ordered {
            object_ids.reserve(obj.id);
            match &obj.payload {
                ObjectPayload::Table { schema, .. } => {
                    let schema = schema.clone();
                    catalog.add_schema_object(bootstrap_session, &schema, obj)?;
                }
                ObjectPayload::Index { .. } | ObjectPayload::Constraint { .. } | ObjectPayload::Trigger { .. } | ObjectPayload::Synonym { .. } => {
                    catalog.add_schema_object(bootstrap_session, "PUBLIC", obj)?;
                }
                _ => catalog.add_database_object(bootstrap_session, obj)?,
            }
        }

        // 10. Resolve in-doubt transactions left over from a crash.
        let in_doubt = store.in_doubt_transactions();
        if !in_doubt.is_empty() {
            warn!(database = %short_name, count = in_doubt.len(), "found in-doubt transactions from a prior session");
        }

        // 11. Recompile invalid views to a fixed point.
        // (no views survive a from-scratch bootstrap; `existing_objects`
        // replay above is where any would have been inserted.)
        let _ = recompile_invalid_views(&mut [], view_compiler);

        // 12. Initialize LOB storage -- out of scope beyond the log line.
        info!(database = %short_name, "LOB storage initialization is delegated to the out-of-scope store");

        let db = Self {
            short_name,
            root,
            persistent,
            settings,
            store,
            catalog: Mutex::new(catalog),
            object_ids,
            sessions: Mutex::new(HashMap::new()),
            next_session_id: AtomicU32::new(2),
            exclusive_session: Mutex::new(None),
            system_session: Mutex::new(system_session),
            lob_session: Mutex::new(lob_session),
            background_exception: Mutex::new(None),
            modification_data_id: AtomicU64::new(0),
            modification_meta_id: AtomicU64::new(0),
            remote_settings_id: AtomicU64::new(0),
            power_off_count: AtomicI64::new(power_off_count),
            closing: AtomicBool::new(false),
            close_delay_ms,
            delayed_close_deadline: Mutex::new(None),
            in_doubt: Mutex::new(in_doubt),
            delete_files_on_disconnect,
            lock_file: Mutex::new(lock_file),
        };
        Ok(db)
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn settings(&self) -> &DbSettings {
        &self.settings
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn object_ids(&self) -> &ObjectIdAllocator {
        &self.object_ids
    }

    pub fn catalog(&self) -> &Mutex<Catalog> {
        &self.catalog
    }

    pub fn in_doubt_transactions(&self) -> Vec<String> {
        self.in_doubt.lock().clone()
    }

    /// Resolves a named in-doubt transaction by committing it (`spec.md`
    /// §4.8 scenario 3: `COMMIT TRANSACTION 'name'`), whether or not the
    /// calling session is the one that prepared it.
    pub fn commit_prepared(&self, name: &str) -> DbResult<()> {
        self.resolve_prepared(name, true)
    }

    /// Resolves a named in-doubt transaction by rolling it back.
    pub fn rollback_prepared(&self, name: &str) -> DbResult<()> {
        self.resolve_prepared(name, false)
    }

    /// Tries every live session first, since one of them may still hold the
    /// prepared transaction's locks; falls back to the store's own in-doubt
    /// resolution for a transaction whose session has since disconnected.
    fn resolve_prepared(&self, name: &str, commit: bool) -> DbResult<()> {
        let mut sessions = self.sessions.lock();
        for session in sessions.values_mut() {
            match session.set_prepared_transaction(name, commit, &self.object_ids) {
                Ok(()) => return Ok(()),
                Err(DbError::Session(SessionError::TransactionNotFound(_))) => continue,
                Err(e) => return Err(e),
            }
        }
        drop(sessions);
        self.store.resolve_in_doubt(name, commit).map_err(DbError::Other)?;
        self.in_doubt.lock().retain(|n| n != name);
        Ok(())
    }

    pub fn modification_meta_id(&self) -> u64 {
        self.modification_meta_id.load(Ordering::Acquire)
    }

    /// Advances the catalog modification counter; every DDL commit must
    /// call this (`spec.md` §8: "after any DDL's commit(), database.
    /// modification_meta_id has strictly increased").
    pub fn bump_modification_meta_id(&self) -> u64 {
        self.modification_meta_id.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Publishes a new snapshot data-modification id, invalidating other
    /// sessions' cached results under repeatable-read-or-stronger isolation
    /// (`spec.md` §5, §4.6).
    pub fn bump_modification_data_id(&self) -> u64 {
        self.modification_data_id.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn remote_settings_id(&self) -> u64 {
        self.remote_settings_id.load(Ordering::Acquire)
    }

    /// Bumped whenever connection settings change in a way a
    /// [`crate::remote::RemoteSession`] must notice before its next
    /// failover (`spec.md` §4.7).
    pub fn bump_remote_settings_id(&self) -> u64 {
        self.remote_settings_id.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Exports every currently-cataloged object, for round-tripping through
    /// a fresh `open()` call (`spec.md` §8: "Open -> close -> open yields
    /// identical catalog state").
    pub fn export_objects(&self) -> Vec<CatalogObject> {
        self.catalog.lock().export_all()
    }

    /// C2's deferred-release contract, reachable from the database handle
    /// for callers that don't hold a live `Session`.
    pub fn reserve_object_id(&self) -> reldb_primitives::ObjectId {
        self.object_ids.allocate()
    }

    /// Creates a new user session, subject to the exclusive-mode and
    /// closing-database rules (`spec.md` §3 Lifecycles, §4.8).
    pub fn create_session(&self, user: String, isolation: reldb_primitives::IsolationLevel) -> DbResult<SessionId> {
        if self.closing.load(Ordering::Acquire) {
            return Err(LifecycleError::DatabaseIsClosed.into());
        }
        if self.exclusive_session.lock().is_some() {
            return Err(LifecycleError::DatabaseIsInExclusiveMode.into());
        }
        *self.delayed_close_deadline.lock() = None;
        let id = SessionId(self.next_session_id.fetch_add(1, Ordering::AcqRel));
        let tx = self.store.begin().map_err(DbError::Other)?;
        let session = Session::new(id, user, isolation, "PUBLIC".to_owned(), self.settings.query_cache_size, tx);
        self.sessions.lock().insert(id, session);
        Ok(id)
    }

    /// Runs `f` against a live session's mutable state (locks, undo log,
    /// savepoints, transaction), the shape every command dispatch and
    /// `commit`/`rollback`/`savepoint` entry point goes through
    /// (`spec.md` §4.6).
    pub fn with_session<R>(&self, id: SessionId, f: impl FnOnce(&mut Session<S::Tx>) -> R) -> DbResult<R> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(&id).ok_or(LifecycleError::SessionNotFound(id))?;
        Ok(f(session))
    }

    /// Closes a user session: rolls back any live transaction, removes it
    /// from the session set, and arms or fires the delayed closer if it was
    /// the last one (`spec.md` §3 Lifecycles).
    pub fn close_session(&self, id: SessionId) -> DbResult<()> {
        let mut session = self.sessions.lock().remove(&id).ok_or(LifecycleError::SessionNotFound(id))?;
        if session.undo_log.size() > 0 {
            session.rollback(&self.object_ids, |_record| Ok(()))?;
        }
        session.close();
        if *self.exclusive_session.lock() == Some(id) {
            *self.exclusive_session.lock() = None;
        }
        if self.sessions.lock().is_empty() {
            self.arm_or_close_delayed();
        }
        Ok(())
    }

    fn arm_or_close_delayed(&self) {
        if self.close_delay_ms == 0 {
            self.closing.store(true, Ordering::Release);
            return;
        }
        if self.close_delay_ms < 0 {
            return;
        }
        let deadline = std::time::Instant::now() + Duration::from_millis(self.close_delay_ms as u64);
        *self.delayed_close_deadline.lock() = Some(deadline);
    }

    /// Fires the armed delayed close if its deadline has passed and no
    /// session has reconnected since (`spec.md` §4.8). A real embedding
    /// calls this from whatever reaper loop it already runs; this core
    /// never spawns a thread of its own to drive it.
    pub fn process_delayed_close(&self) {
        let mut deadline = self.delayed_close_deadline.lock();
        if let Some(at) = *deadline {
            if std::time::Instant::now() >= at && self.sessions.lock().is_empty() {
                self.closing.store(true, Ordering::Release);
                *deadline = None;
            }
        }
    }

    /// Exclusive mode: at most one session holds the slot (`spec.md` §5,
    /// §8). `close_others` suspends every other live session.
    pub fn enter_exclusive(&self, session: SessionId, close_others: bool) -> DbResult<()> {
        let mut slot = self.exclusive_session.lock();
        match *slot {
            Some(other) if other != session => return Err(LifecycleError::DatabaseIsInExclusiveMode.into()),
            _ => *slot = Some(session),
        }
        drop(slot);
        if close_others {
            for (id, s) in self.sessions.lock().iter() {
                if *id != session {
                    s.suspend();
                }
            }
        }
        Ok(())
    }

    pub fn exit_exclusive(&self, session: SessionId) {
        let mut slot = self.exclusive_session.lock();
        if *slot == Some(session) {
            *slot = None;
        }
    }

    /// `check_power_off()` (`spec.md` §4.8): a test-only crash simulator.
    /// `power_off_count == 0` disables the feature entirely.
    pub fn check_power_off(&self) -> DbResult<()> {
        let count = self.power_off_count.load(Ordering::Acquire);
        if count == 0 {
            return Ok(());
        }
        if count < 0 {
            return Err(LifecycleError::DatabaseIsClosed.into());
        }
        let new = self.power_off_count.fetch_sub(1, Ordering::AcqRel) - 1;
        if new == 0 {
            self.power_off_count.store(-1, Ordering::Release);
            self.closing.store(true, Ordering::Release);
            return Err(LifecycleError::SimulatedPowerOff.into());
        }
        Ok(())
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// The close sequence (`spec.md` §4.8): rejects if user sessions remain
    /// and this wasn't forced via the shutdown hook. Otherwise flushes the
    /// store, releases the file lock, and -- if configured -- deletes the
    /// database's on-disk files.
    pub fn close(&self, force: bool) -> DbResult<()> {
        self.closing.store(true, Ordering::Release);
        if !force && !self.sessions.lock().is_empty() {
            self.closing.store(false, Ordering::Release);
            return Ok(());
        }
        self.system_session.lock().close();
        self.lob_session.lock().close();
        self.store.flush().map_err(DbError::Other)?;
        let held_lock = self.lock_file.lock().take();
        drop(held_lock);
        if self.persistent && self.delete_files_on_disconnect {
            if let Err(e) = std::fs::remove_dir_all(&self.root) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(DbError::Io(e));
                }
            }
        }
        info!(database = %self.short_name, "database closed");
        Ok(())
    }

    pub fn background_exception(&self) -> Option<String> {
        self.background_exception.lock().clone()
    }

    pub fn set_background_exception(&self, err: impl std::fmt::Display) {
        *self.background_exception.lock() = Some(err.to_string());
    }

    /// Registers this database with the process-wide shutdown hook
    /// (`spec.md` §4.8 step 13, §9). Only persistent databases participate.
    pub fn register_shutdown_hook(self: &Arc<Self>)
    where
        S: 'static,
        S::Tx: 'static,
    {
        if self.persistent {
            register_for_shutdown(self.clone());
        }
    }
}

impl<S: TransactionStore + 'static> Closeable for Database<S>
where
    S::Tx: Send + 'static,
{
    fn shutdown(&self) {
        let _ = self.close(true);
    }
}

fn bootstrap_schema(id: reldb_primitives::ObjectId, name: &str) -> CatalogObject {
    use reldb_data_structures::Identifier;
    CatalogObject::new(id, Identifier::new(name, CaseFolding::Upper), false, ObjectPayload::Schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreTx;
    use anyhow::Result;

    #[derive(Default)]
    struct FakeTx;
    impl StoreTx for FakeTx {
        fn mark_table_updated(&mut self, _table: reldb_primitives::ObjectId) {}
        fn commit(&mut self) -> Result<()> {
            Ok(())
        }
        fn rollback(&mut self) -> Result<()> {
            Ok(())
        }
        fn savepoint(&mut self) -> Result<u64> {
            Ok(1)
        }
        fn rollback_to_savepoint(&mut self, _savepoint: u64) -> Result<()> {
            Ok(())
        }
        fn prepare_commit(&mut self, _name: &str) -> Result<()> {
            Ok(())
        }
    }

    struct FakeStore;
    impl TransactionStore for FakeStore {
        type Tx = FakeTx;
        fn begin(&self) -> Result<FakeTx> {
            Ok(FakeTx)
        }
        fn in_doubt_transactions(&self) -> Vec<String> {
            Vec::new()
        }
        fn resolve_in_doubt(&self, _name: &str, _commit: bool) -> Result<()> {
            Ok(())
        }
    }

    struct NoopViewCompiler;
    impl ViewCompiler for NoopViewCompiler {
        fn recompile(&mut self, _view: &mut CatalogObject) -> bool {
            true
        }
    }

    fn open_memory() -> Database<FakeStore> {
        Database::open(
            PathBuf::from(":memory:"),
            DbSettings::default(),
            FileLockMethod::No,
            false,
            0,
            0,
            false,
            FakeStore,
            Vec::new(),
            |_| Ok(true),
            &mut NoopViewCompiler,
        )
        .unwrap()
    }

    #[test]
    fn open_bootstraps_public_and_information_schema() {
        let db = open_memory();
        assert!(db.catalog().lock().find_database_object("PUBLIC").is_some());
        assert!(db.catalog().lock().find_database_object("INFORMATION_SCHEMA").is_some());
    }

    #[test]
    fn exclusive_mode_blocks_a_second_session() {
        let db = open_memory();
        let a = SessionId(10);
        let b = SessionId(11);
        db.enter_exclusive(a, false).unwrap();
        let err = db.enter_exclusive(b, false).unwrap_err();
        assert!(matches!(err, DbError::Lifecycle(LifecycleError::DatabaseIsInExclusiveMode)));
        db.exit_exclusive(a);
        assert!(db.enter_exclusive(b, false).is_ok());
    }

    #[test]
    fn power_off_count_triggers_on_third_call() {
        let db = open_memory();
        db.power_off_count.store(3, Ordering::Release);
        assert!(db.check_power_off().is_ok());
        assert!(db.check_power_off().is_ok());
        let err = db.check_power_off().unwrap_err();
        assert!(matches!(err, DbError::Lifecycle(LifecycleError::SimulatedPowerOff)));
        let err2 = db.check_power_off().unwrap_err();
        assert!(matches!(err2, DbError::Lifecycle(LifecycleError::DatabaseIsClosed)));
    }

    #[test]
    fn zero_power_off_count_never_triggers() {
        let db = open_memory();
        for _ in 0..10 {
            db.check_power_off().unwrap();
        }
    }

    #[test]
    fn create_and_close_session_round_trips() {
        let db = open_memory();
        let id = db.create_session("ALICE".to_owned(), reldb_primitives::IsolationLevel::ReadCommitted).unwrap();
        db.close_session(id).unwrap();
    }

    #[test]
    fn create_session_rejected_in_exclusive_mode() {
        let db = open_memory();
        db.enter_exclusive(SessionId(99), false).unwrap();
        let err = db.create_session("BOB".to_owned(), reldb_primitives::IsolationLevel::ReadCommitted).unwrap_err();
        assert!(matches!(err, DbError::Lifecycle(LifecycleError::DatabaseIsInExclusiveMode)));
    }

    #[test]
    fn commit_prepared_falls_back_to_the_store_when_no_session_holds_it() {
        let db = open_memory();
        // No session ever prepared "TXN-1"; it must have come from a prior
        // crash and surfaced via `in_doubt_transactions`.
        *db.in_doubt.lock() = vec!["TXN-1".to_owned()];
        db.commit_prepared("TXN-1").unwrap();
        assert!(db.in_doubt_transactions().is_empty());
    }

    #[test]
    fn commit_prepared_resolves_against_the_holding_session_first() {
        let db = open_memory();
        let id = db.create_session("ALICE".to_owned(), reldb_primitives::IsolationLevel::ReadCommitted).unwrap();
        db.with_session(id, |session| session.prepare_commit("TXN-2".to_owned())).unwrap().unwrap();
        db.commit_prepared("TXN-2").unwrap();
        // Resolved entirely through the session: nothing was ever recorded
        // as in-doubt, so there is nothing left for the store fallback to do.
        assert!(db.in_doubt_transactions().is_empty());
    }

    #[test]
    fn close_releases_the_file_lock_so_a_fresh_open_can_reacquire_it() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(
            dir.path().to_path_buf(),
            DbSettings::default(),
            FileLockMethod::File,
            false,
            0,
            0,
            false,
            FakeStore,
            Vec::new(),
            |_| Ok(true),
            &mut NoopViewCompiler,
        )
        .unwrap();
        assert!(db.lock_file.lock().is_some());
        db.close(true).unwrap();
        assert!(db.lock_file.lock().is_none());

        // with the lock released, reopening the same directory must succeed.
        Database::open(
            dir.path().to_path_buf(),
            DbSettings::default(),
            FileLockMethod::File,
            false,
            0,
            0,
            false,
            FakeStore,
            Vec::new(),
            |_| Ok(true),
            &mut NoopViewCompiler,
        )
        .unwrap();
    }

    #[test]
    fn delete_files_on_disconnect_removes_the_database_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("mydb");
        let db = Database::open(
            root.clone(),
            DbSettings::default(),
            FileLockMethod::No,
            false,
            0,
            0,
            true,
            FakeStore,
            Vec::new(),
            |_| Ok(true),
            &mut NoopViewCompiler,
        )
        .unwrap();
        assert!(root.exists());
        db.close(true).unwrap();
        assert!(!root.exists());
    }
}

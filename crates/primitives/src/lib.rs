//! Small `Copy` id types used throughout the catalog, session and transaction
//! engine. Keeping these in their own crate means the catalog, the session
//! layer and the (out-of-scope) storage engine can all agree on wire-stable
//! identifiers without depending on each other.

use std::fmt;
use std::num::NonZeroU32;

macro_rules! system_id_type {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            #[inline]
            pub const fn idx(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }

        impl nohash_hasher::IsEnabled for $name {}
    };
}

system_id_type! {
    /// The id of a catalog object, as allocated by the object id bitset (C2)
    /// and persisted in the `ID` column of the `SYS` table.
    ObjectId
}

system_id_type! {
    /// A per-`Database` session id, monotonically increasing.
    SessionId
}

/// The reserved id of the `SYS` table itself. Never allocated through the
/// bitset; every other object id is `> 0`.
pub const SYS_TABLE_ID: ObjectId = ObjectId(0);

/// A 1-based id of a compound statement's savepoint depth, used only to
/// distinguish nested transaction-store savepoints from session-level ones.
pub type SavepointDepth = NonZeroU32;

/// The kind of a catalog object, mirroring the `TYPE` column of the `SYS`
/// table. The discriminant is what's actually persisted, so it must never
/// be reordered -- only appended to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ObjectType {
    Setting = 0,
    User = 1,
    Role = 2,
    Right = 3,
    Schema = 4,
    Domain = 5,
    Sequence = 6,
    Constant = 7,
    Function = 8,
    Aggregate = 9,
    Table = 10,
    Index = 11,
    Constraint = 12,
    Trigger = 13,
    Synonym = 14,
    Comment = 15,
}

impl ObjectType {
    /// All variants, in the order C5 uses to break ties within a replay
    /// bucket: `Setting < User < Schema < Function < Domain < Sequence <
    /// Constant < Table < Index < Constraint < Trigger < Synonym < Role <
    /// Right < Aggregate < Comment`.
    ///
    /// This is deliberately *not* the same order as the discriminants above:
    /// the discriminants are a stable wire format, whereas this is a replay
    /// policy that the meta-record executor (C5) consults at open time.
    pub const CREATE_ORDER: [ObjectType; 16] = [
        ObjectType::Setting,
        ObjectType::User,
        ObjectType::Schema,
        ObjectType::Function,
        ObjectType::Domain,
        ObjectType::Sequence,
        ObjectType::Constant,
        ObjectType::Table,
        ObjectType::Index,
        ObjectType::Constraint,
        ObjectType::Trigger,
        ObjectType::Synonym,
        ObjectType::Role,
        ObjectType::Right,
        ObjectType::Aggregate,
        ObjectType::Comment,
    ];

    /// Position in [`Self::CREATE_ORDER`]; lower sorts first during replay.
    pub fn create_rank(self) -> usize {
        Self::CREATE_ORDER
            .iter()
            .position(|ty| *ty == self)
            .expect("CREATE_ORDER is exhaustive")
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        use ObjectType::*;
        let all = [
            Setting, User, Role, Right, Schema, Domain, Sequence, Constant, Function, Aggregate, Table, Index,
            Constraint, Trigger, Synonym, Comment,
        ];
        all.into_iter().find(|ty| ty.as_u8() == v)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Isolation levels a [`Session`][crate::SessionId] can run under.
///
/// Ordered from weakest to strongest so that comparisons like
/// `isolation >= IsolationLevel::RepeatableRead` are meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
}

impl IsolationLevel {
    /// Whether this level forbids a transaction from observing different
    /// values of the same row across repeated reads -- i.e. whether a
    /// committing session must publish a new snapshot modification id so
    /// that others invalidate their cached results (see C6 `commit`).
    pub fn forbids_non_repeatable_reads(self) -> bool {
        self >= IsolationLevel::RepeatableRead
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Snapshot => "SNAPSHOT",
            IsolationLevel::Serializable => "SERIALIZABLE",
        };
        f.write_str(s)
    }
}

//! C3/C4 data model: the common `CatalogObject` header plus the per-type
//! payload, per DESIGN NOTES' "tagged variant over the enumerated object
//! types" guidance (`spec.md` §9).

use reldb_data_structures::{CaseFolding, Identifier};
use reldb_primitives::{ObjectId, ObjectType};

/// A grantable right (§4.4.1, supplemented).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Right {
    Select,
    Insert,
    Update,
    Delete,
    Alter,
    Create,
    Drop,
}

/// What a [`Right`] is granted over (§4.4.1, supplemented).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grantable {
    Schema(String),
    Table(String),
    Database,
}

/// The grantee of a [`Right`]: either a user or a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grantee {
    User(String),
    Role(String),
}

/// Per-type payload carried by a [`CatalogObject`]. Shared attributes (id,
/// name, comment, modification id) live in the header; this dispatches on
/// the object's [`ObjectType`] tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectPayload {
    Setting { value: String },
    User { password_hash: Option<Vec<u8>> },
    Role,
    Right { grant: Right, on: Grantable, to: Grantee },
    Schema,
    Domain { base_type_sql: String },
    Sequence { start: i64, increment: i64 },
    Constant { value_sql: String },
    Function { body_sql: String },
    Aggregate { impl_ref: String },
    Table { schema: String, columns_sql: String, is_view: bool, view_valid: bool },
    Index { table: String, columns_sql: String },
    Constraint { table: String, kind: ConstraintKind, definition_sql: String },
    Trigger { table: String, body_sql: String },
    Synonym { target: String },
    Comment { on: String, text: String },
}

/// A constraint's kind, needed to implement C5's "unique/primary-key-first"
/// sort within the constraint replay bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
}

/// Every named, persistent database entity (`spec.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogObject {
    pub id: ObjectId,
    pub ty: ObjectType,
    pub name: Identifier,
    pub temporary: bool,
    pub modification_id: u64,
    pub comment: Option<String>,
    pub payload: ObjectPayload,
}

impl CatalogObject {
    pub fn new(id: ObjectId, name: Identifier, temporary: bool, payload: ObjectPayload) -> Self {
        let ty = payload.object_type();
        Self { id, ty, name, temporary, modification_id: 0, comment: None, payload }
    }

    /// Whether this object type may be the target of `RENAME` (§4.4).
    /// Rights and comments are anonymous and have nothing to rename.
    pub fn is_renameable(&self) -> bool {
        !matches!(self.ty, ObjectType::Right | ObjectType::Comment)
    }

    /// Renders this object as a `CREATE ...` statement for persistence into
    /// the `SYS` table's `SQL` column (§3, §4.3).
    ///
    /// The actual SQL rendering grammar belongs to the out-of-scope parser;
    /// this produces a stable, parser-independent textual form sufficient
    /// for the catalog's own round-trip tests (§8: "parse(obj.create_sql())
    /// -> obj' where obj' == obj modulo object id").
    pub fn create_sql(&self) -> String {
        format!("-- {:?} {} (id={})", self.ty, self.name, self.id)
    }
}

impl ObjectPayload {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectPayload::Setting { .. } => ObjectType::Setting,
            ObjectPayload::User { .. } => ObjectType::User,
            ObjectPayload::Role => ObjectType::Role,
            ObjectPayload::Right { .. } => ObjectType::Right,
            ObjectPayload::Schema => ObjectType::Schema,
            ObjectPayload::Domain { .. } => ObjectType::Domain,
            ObjectPayload::Sequence { .. } => ObjectType::Sequence,
            ObjectPayload::Constant { .. } => ObjectType::Constant,
            ObjectPayload::Function { .. } => ObjectType::Function,
            ObjectPayload::Aggregate { .. } => ObjectType::Aggregate,
            ObjectPayload::Table { .. } => ObjectType::Table,
            ObjectPayload::Index { .. } => ObjectType::Index,
            ObjectPayload::Constraint { .. } => ObjectType::Constraint,
            ObjectPayload::Trigger { .. } => ObjectType::Trigger,
            ObjectPayload::Synonym { .. } => ObjectType::Synonym,
            ObjectPayload::Comment { .. } => ObjectType::Comment,
        }
    }
}

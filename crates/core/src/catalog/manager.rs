//! C4: the Catalog Manager.
//!
//! Owns the name-keyed maps for every database- and schema-scoped object,
//! the `SYS` table (C3), and the meta lock, and enforces the uniqueness,
//! renameability and dependent-object rules in `spec.md` §4.4.

use indexmap::IndexMap;
use reldb_primitives::{ObjectId, SessionId};

use super::meta_lock::MetaLock;
use super::object::CatalogObject;
use super::sys_table::{SysRow, SysTable};
use crate::error::CatalogError;

/// An external hook standing in for the out-of-scope Table layer's
/// dependency graph (`spec.md` §4.4: `get_dependent_table`). A real engine
/// supplies an implementation that walks live tables' foreign keys/view
/// definitions.
pub trait DependencyProbe {
    /// Returns the name of the first non-view table that depends on
    /// `target`, other than `except` itself, if any.
    fn get_dependent_table(&self, target: &str, except: Option<&str>) -> Option<String>;
}

/// A probe with no dependents, for catalogs exercised without a live table
/// layer (unit tests, scenario harnesses).
pub struct NoDependents;

impl DependencyProbe for NoDependents {
    fn get_dependent_table(&self, _target: &str, _except: Option<&str>) -> Option<String> {
        None
    }
}

/// Owns the catalog's name maps, the `SYS` table, and the meta lock.
pub struct Catalog {
    sys: SysTable,
    meta_lock: MetaLock,
    /// Database-scoped objects (users, roles, schemas, settings, comments),
    /// keyed by the object's normalized [`Identifier`][reldb_data_structures::Identifier] key.
    database_objects: IndexMap<String, CatalogObject>,
    /// Schema-scoped objects (tables/views, indexes, constraints, triggers,
    /// synonyms, functions, domains, sequences, constants), keyed by
    /// `(schema_key, name_key)`.
    schema_objects: IndexMap<(String, String), CatalogObject>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self { sys: SysTable::new(), meta_lock: MetaLock::new(), database_objects: IndexMap::new(), schema_objects: IndexMap::new() }
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sys(&self) -> &SysTable {
        &self.sys
    }

    pub fn meta_lock(&self) -> &MetaLock {
        &self.meta_lock
    }

    pub fn find_database_object(&self, key: &str) -> Option<&CatalogObject> {
        self.database_objects.get(key)
    }

    pub fn get_database_object(&self, key: &str) -> Result<&CatalogObject, CatalogError> {
        self.find_database_object(key).ok_or_else(|| self.not_found(key))
    }

    pub fn find_schema_object(&self, schema: &str, key: &str) -> Option<&CatalogObject> {
        self.schema_objects.get(&(schema.to_owned(), key.to_owned()))
    }

    pub fn get_schema_object(&self, schema: &str, key: &str) -> Result<&CatalogObject, CatalogError> {
        self.find_schema_object(schema, key).ok_or_else(|| self.not_found(key))
    }

    fn not_found(&self, key: &str) -> CatalogError {
        CatalogError::NotFound(reldb_primitives::ObjectType::Table, key.to_owned())
    }

    /// Acquires the meta lock for `session` if not already held by it.
    fn with_meta_lock<T>(&mut self, session: SessionId, f: impl FnOnce(&mut Self) -> Result<T, CatalogError>) -> Result<T, CatalogError> {
        let acquired = self.meta_lock.lock_meta(session)?;
        let result = f(self);
        self.meta_lock.unlock_meta(session, acquired);
        result
    }

    /// `add_database_object` (`spec.md` §4.4): persist via C3, then insert
    /// into the database-scoped map. Duplicate names are internal errors.
    pub fn add_database_object(&mut self, session: SessionId, obj: CatalogObject) -> Result<(), CatalogError> {
        let key = obj.name.key().to_owned();
        self.with_meta_lock(session, move |cat| {
            if cat.database_objects.contains_key(&key) {
                return Err(CatalogError::AlreadyExists(obj.ty, obj.name.display().to_owned()));
            }
            cat.sys.insert(SysRow::new(obj.id, obj.ty.as_u8(), obj.create_sql()))?;
            cat.database_objects.insert(key, obj);
            Ok(())
        })
    }

    pub fn add_schema_object(&mut self, session: SessionId, schema: &str, obj: CatalogObject) -> Result<(), CatalogError> {
        let schema = schema.to_owned();
        let key = obj.name.key().to_owned();
        self.with_meta_lock(session, move |cat| {
            let map_key = (schema.clone(), key.clone());
            if cat.schema_objects.contains_key(&map_key) {
                return Err(CatalogError::AlreadyExists(obj.ty, obj.name.display().to_owned()));
            }
            cat.sys.insert(SysRow::new(obj.id, obj.ty.as_u8(), obj.create_sql()))?;
            cat.schema_objects.insert(map_key, obj);
            Ok(())
        })
    }

    /// `rename_database_object` (`spec.md` §4.4): rejects non-renameable
    /// types, moves the map entry under the new key, and re-persists.
    pub fn rename_database_object(&mut self, session: SessionId, old_key: &str, new_name_key: String, new_name_display: String) -> Result<(), CatalogError> {
        let old_key = old_key.to_owned();
        self.with_meta_lock(session, move |cat| {
            let mut obj = cat.database_objects.shift_remove(&old_key).ok_or_else(|| cat.not_found(&old_key))?;
            if !obj.is_renameable() {
                let ty = obj.ty;
                cat.database_objects.insert(old_key, obj);
                return Err(CatalogError::NotRenameable(ty, new_name_display));
            }
            if cat.database_objects.contains_key(&new_name_key) {
                let ty = obj.ty;
                cat.database_objects.insert(old_key, obj);
                return Err(CatalogError::AlreadyExists(ty, new_name_display));
            }
            obj.name = reldb_data_structures::Identifier::new(&new_name_display, reldb_data_structures::CaseFolding::Preserve);
            obj.modification_id += 1;
            cat.sys.update(obj.id, obj.create_sql())?;
            cat.database_objects.insert(new_name_key, obj);
            Ok(())
        })
    }

    /// `remove_database_object` (`spec.md` §4.4, §9): internal error if the
    /// object isn't present (the open question is resolved in favor of
    /// always-checked, never silently ignored).
    pub fn remove_database_object(&mut self, session: SessionId, key: &str) -> Result<ObjectId, CatalogError> {
        let key = key.to_owned();
        let result = self.with_meta_lock(session, move |cat| {
            let obj = cat
                .database_objects
                .shift_remove(&key)
                .ok_or_else(|| CatalogError::Internal(format!("remove_database_object: `{key}` not in map")))?;
            cat.sys.remove(obj.id)?;
            Ok(obj.id)
        });
        self.meta_lock.assert_free()?;
        result
    }

    /// Dependency check is skipped for object kinds `spec.md` §4.4 exempts
    /// from it: dropping a comment, constraint, index, right, or trigger
    /// never needs the out-of-scope Table layer's foreign-key/view graph.
    pub fn remove_schema_object(&mut self, session: SessionId, schema: &str, key: &str, probe: &dyn DependencyProbe) -> Result<ObjectId, CatalogError> {
        use reldb_primitives::ObjectType;
        let checked = !matches!(
            self.schema_objects.get(&(schema.to_owned(), key.to_owned())).map(|o| o.ty),
            Some(ObjectType::Comment | ObjectType::Constraint | ObjectType::Index | ObjectType::Right | ObjectType::Trigger | ObjectType::User)
        );
        if checked {
            if let Some(dependent) = probe.get_dependent_table(key, None) {
                return Err(CatalogError::CannotDrop(reldb_primitives::ObjectType::Table, key.to_owned(), dependent));
            }
        }
        let schema = schema.to_owned();
        let key = key.to_owned();
        let result = self.with_meta_lock(session, move |cat| {
            let map_key = (schema, key);
            let obj = cat
                .schema_objects
                .shift_remove(&map_key)
                .ok_or_else(|| CatalogError::Internal(format!("remove_schema_object: `{}` not in map", map_key.1)))?;
            cat.sys.remove(obj.id)?;
            Ok(obj.id)
        });
        self.meta_lock.assert_free()?;
        result
    }

    /// `update_meta` (`spec.md` §4.4): re-render and overwrite the `SYS` row
    /// after a non-structural change.
    pub fn update_meta(&mut self, session: SessionId, key: &str) -> Result<(), CatalogError> {
        let key = key.to_owned();
        self.with_meta_lock(session, move |cat| {
            let obj = cat.database_objects.get_mut(&key).ok_or_else(|| cat.not_found(&key))?;
            obj.modification_id += 1;
            let sql = obj.create_sql();
            let id = obj.id;
            cat.sys.update(id, sql)
        })
    }

    /// Every currently-cataloged object, database- then schema-scoped. Used
    /// to round-trip a database's catalog through a fresh `open()` call
    /// (`spec.md` §8: "open -> close -> open yields identical catalog
    /// state").
    pub fn export_all(&self) -> Vec<CatalogObject> {
        self.database_objects.values().cloned().chain(self.schema_objects.values().cloned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::object::ObjectPayload;
    use reldb_data_structures::{CaseFolding, Identifier};
    use reldb_primitives::ObjectId;

    fn schema(id: u32, name: &str) -> CatalogObject {
        CatalogObject::new(ObjectId(id), Identifier::new(name, CaseFolding::Upper), false, ObjectPayload::Schema)
    }

    #[test]
    fn add_then_find_database_object() {
        let mut cat = Catalog::new();
        let session = SessionId(1);
        cat.add_database_object(session, schema(1, "PUBLIC")).unwrap();
        assert!(cat.find_database_object("PUBLIC").is_some());
        assert_eq!(cat.sys().len(), 1);
    }

    #[test]
    fn duplicate_add_is_already_exists() {
        let mut cat = Catalog::new();
        let session = SessionId(1);
        cat.add_database_object(session, schema(1, "PUBLIC")).unwrap();
        let err = cat.add_database_object(session, schema(2, "PUBLIC")).unwrap_err();
        assert!(matches!(err, CatalogError::AlreadyExists(..)));
    }

    #[test]
    fn remove_missing_is_internal_error() {
        let mut cat = Catalog::new();
        let err = cat.remove_database_object(SessionId(1), "NOPE").unwrap_err();
        assert!(matches!(err, CatalogError::Internal(_)));
    }

    struct AlwaysDependent;
    impl DependencyProbe for AlwaysDependent {
        fn get_dependent_table(&self, _target: &str, _except: Option<&str>) -> Option<String> {
            Some("ORDERS".to_owned())
        }
    }

    #[test]
    fn remove_dependent_schema_object_is_rejected() {
        let mut cat = Catalog::new();
        let session = SessionId(1);
        let table = CatalogObject::new(
            ObjectId(5),
            Identifier::new("WIDGETS", CaseFolding::Upper),
            false,
            ObjectPayload::Table { schema: "PUBLIC".into(), columns_sql: "(x INT)".into(), is_view: false, view_valid: true },
        );
        cat.add_schema_object(session, "PUBLIC", table).unwrap();
        let err = cat.remove_schema_object(session, "PUBLIC", "WIDGETS", &AlwaysDependent).unwrap_err();
        assert!(matches!(err, CatalogError::CannotDrop(..)));
    }

    /// Indexes (and comments/constraints/rights/triggers) are exempt from
    /// the dependent-table check (`spec.md` §4.4): dropping one never fails
    /// because some unrelated table depends on something else.
    #[test]
    fn remove_index_skips_dependency_check() {
        let mut cat = Catalog::new();
        let session = SessionId(1);
        let idx = CatalogObject::new(
            ObjectId(5),
            Identifier::new("IX_A", CaseFolding::Upper),
            false,
            ObjectPayload::Index { table: "A".into(), columns_sql: "(x)".into() },
        );
        cat.add_schema_object(session, "PUBLIC", idx).unwrap();
        cat.remove_schema_object(session, "PUBLIC", "IX_A", &AlwaysDependent).unwrap();
        assert!(cat.find_schema_object("PUBLIC", "IX_A").is_none());
    }

    #[test]
    fn rename_updates_map_and_sys_row() {
        let mut cat = Catalog::new();
        let session = SessionId(1);
        cat.add_database_object(session, schema(1, "OLD")).unwrap();
        cat.rename_database_object(session, "OLD", "NEW".to_owned(), "NEW".to_owned()).unwrap();
        assert!(cat.find_database_object("OLD").is_none());
        assert!(cat.find_database_object("NEW").is_some());
    }
}

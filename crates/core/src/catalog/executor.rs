//! C5: the Meta-Record Executor.
//!
//! At open, replays every `SYS` row in dependency order (`spec.md` §4.5):
//! five ordered buckets, a fixed-point pass over domains, a two-phase
//! prepare-then-execute constraint bucket, and a final invalid-view
//! recompile loop run against a [`ViewCompiler`] hook (view compilation
//! belongs to the out-of-scope SQL layer).

use reldb_primitives::ObjectType;

use super::object::{CatalogObject, ConstraintKind, ObjectPayload};
use crate::error::CatalogError;

/// An external hook standing in for the out-of-scope SQL/view layer
/// (`spec.md` §4.5: "Invalid-view recompile").
pub trait ViewCompiler {
    /// Attempts to compile `view`; returns `true` if it is now valid.
    fn recompile(&mut self, view: &mut CatalogObject) -> bool;
}

/// Which of the five ordered replay buckets a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bucket {
    First,
    Domains,
    Middle,
    Constraints,
    Last,
}

fn bucket_of(ty: ObjectType) -> Bucket {
    use ObjectType::*;
    match ty {
        Setting | User | Schema | Function => Bucket::First,
        Domain => Bucket::Domains,
        Sequence | Constant | Table | Index => Bucket::Middle,
        Constraint => Bucket::Constraints,
        Role | Right | Aggregate | Comment | Trigger | Synonym => Bucket::Last,
    }
}

/// Sorts records within buckets 1, 3, 5 by `create_rank`, then by id
/// (`spec.md` §4.5).
fn sort_stable(objects: &mut [CatalogObject]) {
    objects.sort_by(|a, b| a.ty.create_rank().cmp(&b.ty.create_rank()).then(a.id.cmp(&b.id)));
}

/// Sorts the constraint bucket with unique/primary-key constraints first,
/// then by id, so referencing foreign keys find their target indexes
/// (`spec.md` §4.5).
fn sort_constraints(objects: &mut [CatalogObject]) {
    fn rank(obj: &CatalogObject) -> u8 {
        match &obj.payload {
            ObjectPayload::Constraint { kind: ConstraintKind::PrimaryKey, .. } => 0,
            ObjectPayload::Constraint { kind: ConstraintKind::Unique, .. } => 0,
            _ => 1,
        }
    }
    objects.sort_by(|a, b| rank(a).cmp(&rank(b)).then(a.id.cmp(&b.id)));
}

/// The outcome of a full replay pass: objects in execution order, plus any
/// domains that never reached a fixed point.
pub struct ReplayPlan {
    pub ordered: Vec<CatalogObject>,
}

/// Groups `objects` into the five ordered buckets and produces the
/// execution order (`spec.md` §4.5). Domains are fixed-pointed first since
/// later buckets may reference them; the caller is responsible for actually
/// executing each record's DDL and reporting failures back via `prepare`
/// (modeled here as every domain record being immediately "preparable" --
/// in a full engine this closure would attempt a parse against the as-yet
/// partial catalog and signal dependency-not-ready errors).
pub fn plan_replay<E: From<CatalogError>>(
    mut objects: Vec<CatalogObject>,
    mut try_prepare_domain: impl FnMut(&CatalogObject) -> Result<bool, E>,
) -> Result<ReplayPlan, E> {
    let mut first = Vec::new();
    let mut domains = Vec::new();
    let mut middle = Vec::new();
    let mut constraints = Vec::new();
    let mut last = Vec::new();

    for obj in objects.drain(..) {
        match bucket_of(obj.ty) {
            Bucket::First => first.push(obj),
            Bucket::Domains => domains.push(obj),
            Bucket::Middle => middle.push(obj),
            Bucket::Constraints => constraints.push(obj),
            Bucket::Last => last.push(obj),
        }
    }

    sort_stable(&mut first);
    sort_stable(&mut last);
    // Middle bucket's internal ordering (Sequence < Constant < Table < Index)
    // is also `create_rank`-derived.
    sort_stable(&mut middle);

    let mut ordered_domains = Vec::new();
    loop {
        let mut progressed = false;
        let mut still_pending = Vec::new();
        for obj in domains.drain(..) {
            match try_prepare_domain(&obj)? {
                true => {
                    progressed = true;
                    ordered_domains.push(obj);
                }
                false => still_pending.push(obj),
            }
        }
        domains = still_pending;
        if domains.is_empty() {
            break;
        }
        if !progressed {
            let stuck = &domains[0];
            return Err(CatalogError::DomainNotPreparable(stuck.ty, stuck.name.display().to_owned()).into());
        }
    }

    sort_constraints(&mut constraints);

    let mut ordered = Vec::with_capacity(first.len() + ordered_domains.len() + middle.len() + constraints.len() + last.len());
    ordered.extend(first);
    ordered.extend(ordered_domains);
    ordered.extend(middle);
    ordered.extend(constraints);
    ordered.extend(last);

    Ok(ReplayPlan { ordered })
}

/// Recompiles invalid views to a fixed point after the main replay
/// (`spec.md` §4.5). Views still invalid after the loop converges are left
/// in place for repair at query time.
pub fn recompile_invalid_views(views: &mut [CatalogObject], compiler: &mut impl ViewCompiler) -> Result<(), CatalogError> {
    loop {
        let mut any_fixed = false;
        for view in views.iter_mut() {
            let was_invalid = matches!(&view.payload, ObjectPayload::Table { is_view: true, view_valid: false, .. });
            if was_invalid && compiler.recompile(view) {
                if let ObjectPayload::Table { view_valid, .. } = &mut view.payload {
                    *view_valid = true;
                }
                any_fixed = true;
            }
        }
        if !any_fixed {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reldb_data_structures::{CaseFolding, Identifier};
    use reldb_primitives::ObjectId;

    fn obj(id: u32, payload: ObjectPayload) -> CatalogObject {
        CatalogObject::new(ObjectId(id), Identifier::new(&format!("o{id}"), CaseFolding::Upper), false, payload)
    }

    #[test]
    fn buckets_replay_before_dependents() {
        let objects = vec![
            obj(3, ObjectPayload::Table { schema: "PUBLIC".into(), columns_sql: String::new(), is_view: false, view_valid: true }),
            obj(1, ObjectPayload::Schema),
            obj(2, ObjectPayload::Sequence { start: 1, increment: 1 }),
        ];
        let plan = plan_replay::<CatalogError>(objects, |_| Ok(true)).unwrap();
        let ids: Vec<_> = plan.ordered.iter().map(|o| o.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn domain_fixed_point_retries_until_no_progress() {
        let objects = vec![
            obj(1, ObjectPayload::Domain { base_type_sql: "INT".into() }),
            obj(2, ObjectPayload::Domain { base_type_sql: "DOMAIN1".into() }),
        ];
        // second domain "depends" on the first: only preparable once id 1
        // has already been emitted.
        let mut emitted = Vec::new();
        let plan = plan_replay::<CatalogError>(objects, |o| {
            let ready = match &o.payload {
                ObjectPayload::Domain { base_type_sql } if base_type_sql == "DOMAIN1" => emitted.contains(&1u32),
                _ => true,
            };
            if ready {
                emitted.push(o.id.0);
            }
            Ok(ready)
        })
        .unwrap();
        let ids: Vec<_> = plan.ordered.iter().map(|o| o.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn domain_true_cycle_is_rejected() {
        let objects = vec![
            obj(1, ObjectPayload::Domain { base_type_sql: "DOMAIN2".into() }),
            obj(2, ObjectPayload::Domain { base_type_sql: "DOMAIN1".into() }),
        ];
        // each depends on the other; no pass ever makes progress.
        let err = plan_replay::<CatalogError>(objects, |_| Ok(false)).unwrap_err();
        assert!(matches!(err, CatalogError::DomainNotPreparable(ObjectType::Domain, _)));
    }

    #[test]
    fn constraints_sort_unique_and_pk_first() {
        let objects = vec![
            obj(10, ObjectPayload::Constraint { table: "A".into(), kind: ConstraintKind::ForeignKey, definition_sql: String::new() }),
            obj(5, ObjectPayload::Constraint { table: "A".into(), kind: ConstraintKind::PrimaryKey, definition_sql: String::new() }),
        ];
        let plan = plan_replay::<CatalogError>(objects, |_| Ok(true)).unwrap();
        let ids: Vec<_> = plan.ordered.iter().map(|o| o.id.0).collect();
        assert_eq!(ids, vec![5, 10]);
    }

    #[test]
    fn recompile_loop_converges() {
        struct OnceCompiler {
            calls: usize,
        }
        impl ViewCompiler for OnceCompiler {
            fn recompile(&mut self, _view: &mut CatalogObject) -> bool {
                self.calls += 1;
                true
            }
        }
        let mut views = vec![obj(1, ObjectPayload::Table { schema: "PUBLIC".into(), columns_sql: String::new(), is_view: true, view_valid: false })];
        let mut compiler = OnceCompiler { calls: 0 };
        recompile_invalid_views(&mut views, &mut compiler).unwrap();
        assert_eq!(compiler.calls, 1);
        assert!(matches!(&views[0].payload, ObjectPayload::Table { view_valid: true, .. }));
    }
}

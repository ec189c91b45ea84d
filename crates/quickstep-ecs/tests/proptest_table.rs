//! Property tests for the entity table lifecycle.
//!
//! Random sequences of create/delete/compact operations are applied to an
//! [`EntityTable`] plus one payload column; after every compaction each
//! surviving entity must still resolve to its own payload through the
//! returned remap, and the live count must match our own bookkeeping.

use proptest::prelude::*;
use quickstep_ecs::prelude::*;

const CAPACITY: usize = 64;

#[derive(Debug, Clone)]
enum TableOp {
    Create,
    Delete(usize),
    DeleteTwice(usize),
    Compact,
}

fn table_op_strategy() -> impl Strategy<Value = TableOp> {
    prop_oneof![
        3 => Just(TableOp::Create),
        2 => (0..CAPACITY).prop_map(TableOp::Delete),
        1 => (0..CAPACITY).prop_map(TableOp::DeleteTwice),
        1 => Just(TableOp::Compact),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn random_lifecycle_preserves_rows(ops in prop::collection::vec(table_op_strategy(), 1..120)) {
        let mut table = EntityTable::with_capacity(CAPACITY);
        let mut payload: Column<u64> = Column::with_capacity(CAPACITY);
        // (current id, payload) for every entity we believe is alive.
        let mut alive: Vec<(EntityId, u64)> = Vec::new();
        let mut next_payload = 1u64;
        let mut queued = 0usize;

        for op in ops {
            match op {
                TableOp::Create => {
                    if table.len() < CAPACITY {
                        let id = table.create(ComponentKind::Physics.into());
                        payload.set(id, next_payload);
                        alive.push((id, next_payload));
                        next_payload += 1;
                    }
                }
                TableOp::Delete(i) | TableOp::DeleteTwice(i) => {
                    if !alive.is_empty() {
                        let (id, _) = alive[i % alive.len()];
                        if table.queue_delete(id) {
                            queued += 1;
                        }
                        if matches!(op, TableOp::DeleteTwice(_)) {
                            prop_assert!(!table.queue_delete(id));
                        }
                    }
                }
                TableOp::Compact => {
                    let before = table.len();
                    let compaction = table.compact();
                    for step in &compaction.steps {
                        payload.apply_step(step, step.moved_mask.contains(ComponentKind::Physics));
                    }
                    prop_assert_eq!(table.len(), before - queued);
                    queued = 0;

                    alive = alive
                        .into_iter()
                        .filter_map(|(id, value)| compaction.remap(id).map(|new| (new, value)))
                        .collect();
                    for &(id, value) in &alive {
                        prop_assert!(table.contains(id));
                        prop_assert_eq!(*payload.get(id), value);
                    }
                }
            }

            // No two tracked entities share an id.
            let mut ids: Vec<u32> = alive.iter().map(|(id, _)| id.to_raw()).collect();
            ids.sort_unstable();
            ids.dedup();
            prop_assert_eq!(ids.len(), alive.len());
            prop_assert_eq!(table.len(), alive.len());
        }
    }
}

//! Property-based testing strategies.
//!
//! Strategies return plain std types so they can be used from any crate's
//! tests without tying them to a particular build of `replay_core`.

use proptest::prelude::*;

use crate::fixtures::{action_record, ui_action_record};

/// Generate one serialized action record: a macro command, a non-macro
/// command, a UI action or a malformed record.
pub fn arb_action_record(macro_id: u32, other_id: u32) -> impl Strategy<Value = String> {
    prop_oneof![
        2 => Just(action_record(macro_id)),
        4 => Just(action_record(other_id)),
        1 => Just(ui_action_record()),
        1 => Just("{broken".to_string()),
    ]
}

/// Generate one step's records (usually empty).
pub fn arb_step(macro_id: u32, other_id: u32) -> impl Strategy<Value = Vec<String>> {
    prop_oneof![
        3 => Just(Vec::new()),
        1 => proptest::collection::vec(arb_action_record(macro_id, other_id), 1..4),
    ]
}

/// Generate an action log of up to 200 steps.
pub fn action_log_steps(macro_id: u32, other_id: u32) -> impl Strategy<Value = Vec<Vec<String>>> {
    proptest::collection::vec(arb_step(macro_id, other_id), 0..200)
}

/// Generate an ascending, duplicate-free frame list on the `step_mul` grid.
pub fn arb_frames(step_mul: u32, max_len: usize) -> impl Strategy<Value = Vec<u32>> {
    proptest::collection::btree_set(1u32..500, 0..max_len)
        .prop_map(move |steps| steps.into_iter().map(|s| s * step_mul).collect())
}

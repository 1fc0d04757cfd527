//! Assertion helpers for delivery tests.
//!
//! Pure functions over id sets: every captured record must be either
//! delivered or still pending, never neither.

use std::collections::HashSet;
use sync_types::RecordId;

/// Ids captured but found neither at the receiver nor in the outbox.
pub fn lost_records(
    captured: &[RecordId],
    delivered: &HashSet<RecordId>,
    pending: &HashSet<RecordId>,
) -> Vec<RecordId> {
    captured
        .iter()
        .filter(|id| !delivered.contains(*id) && !pending.contains(*id))
        .cloned()
        .collect()
}

/// Panics with the missing ids if any captured record was lost.
pub fn assert_no_loss(
    captured: &[RecordId],
    delivered: &HashSet<RecordId>,
    pending: &HashSet<RecordId>,
) {
    let lost = lost_records(captured, delivered, pending);
    assert!(lost.is_empty(), "records lost: {:?}", lost);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> HashSet<RecordId> {
        ids.iter().map(|id| RecordId::from(*id)).collect()
    }

    #[test]
    fn nothing_lost_when_split_between_sides() {
        let captured = vec![RecordId::from("a"), RecordId::from("b")];
        assert!(lost_records(&captured, &set(&["a"]), &set(&["b"])).is_empty());
    }

    #[test]
    fn missing_id_is_reported() {
        let captured = vec![RecordId::from("a"), RecordId::from("b")];
        assert_eq!(
            lost_records(&captured, &set(&["a"]), &set(&[])),
            vec![RecordId::from("b")]
        );
    }
}

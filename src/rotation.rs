//! Rotation policy: who gets the next instance of a recurring task.
//!
//! Pure and deterministic. The candidate with the lowest load score wins;
//! ties break by ascending person id so repeated calls with the same inputs
//! always pick the same member.

use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;

/// Pick the assignee for the next materialized instance.
///
/// A candidate missing from `scores` is treated as load 0 (a brand-new
/// member starts at the front of the queue).
///
/// Returns `NoCandidates` if `candidates` is empty; the caller is expected
/// to treat that as skip-and-retry-next-tick, not as fatal.
pub fn select_assignee(
    group_id: &str,
    candidates: &[String],
    scores: &HashMap<String, i64>,
) -> CoreResult<String> {
    candidates
        .iter()
        .min_by_key(|id| (scores.get(id.as_str()).copied().unwrap_or(0), id.as_str()))
        .cloned()
        .ok_or_else(|| CoreError::no_candidates(group_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn scores(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn lowest_load_wins() {
        let candidates = ids(&["alice", "bob", "carol"]);
        let scores = scores(&[("alice", 5), ("bob", 2), ("carol", 8)]);

        let picked = select_assignee("g1", &candidates, &scores).unwrap();
        assert_eq!(picked, "bob");
    }

    #[test]
    fn tie_breaks_by_ascending_id() {
        let candidates = ids(&["zoe", "ann"]);
        let scores = scores(&[("zoe", 3), ("ann", 3)]);

        // Stable across repeated calls.
        for _ in 0..10 {
            let picked = select_assignee("g1", &candidates, &scores).unwrap();
            assert_eq!(picked, "ann");
        }
    }

    #[test]
    fn missing_score_counts_as_zero() {
        let candidates = ids(&["veteran", "newcomer"]);
        let scores = scores(&[("veteran", 12)]);

        let picked = select_assignee("g1", &candidates, &scores).unwrap();
        assert_eq!(picked, "newcomer");
    }

    #[test]
    fn negative_load_beats_zero() {
        // A member deep in penalties has the lowest net score and is next up.
        let candidates = ids(&["a", "b"]);
        let scores = scores(&[("a", -4), ("b", 0)]);

        let picked = select_assignee("g1", &candidates, &scores).unwrap();
        assert_eq!(picked, "a");
    }

    #[test]
    fn empty_group_is_no_candidates() {
        let err = select_assignee("g1", &[], &HashMap::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoCandidates);
    }
}

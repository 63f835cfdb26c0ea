//! Mutual buddy computation
//!
//! Two users are mutual buddies iff each has an edge pointing at the other.
//! Nothing is stored about mutuality; it is derived from two directed
//! lookups on every read. Duplicate edges only ever matter through
//! existence, never through counts.

use std::collections::BTreeSet;

use crate::traits::BuddyStore;
use crate::UserId;

/// Compute which `candidates` are mutual buddies of `requester`
///
/// Duplicate candidates collapse into one result entry. An empty candidate
/// list returns immediately without touching the store. The requester may
/// appear among the candidates and is reported only if a self-edge exists.
///
/// The first query finds candidates pointing at the requester; the second
/// confirms the requester points back at those candidates.
///
/// # Errors
/// Store errors are returned unchanged and no partial result is produced.
pub fn compute_mutual<S: BuddyStore>(
    store: &S,
    requester: UserId,
    candidates: &[UserId],
) -> Result<BTreeSet<UserId>, S::Error> {
    let candidates: BTreeSet<UserId> = candidates.iter().copied().collect();
    if candidates.is_empty() {
        return Ok(BTreeSet::new());
    }

    let pointing_back: BTreeSet<UserId> = store
        .find_edges_from_owners(&candidates, requester)?
        .into_iter()
        .map(|edge| edge.owner_id)
        .collect();
    if pointing_back.is_empty() {
        return Ok(BTreeSet::new());
    }

    let mutual = store
        .find_edges_to_buddies(requester, &pointing_back)?
        .into_iter()
        .map(|edge| edge.buddy_id)
        .filter(|buddy| pointing_back.contains(buddy))
        .collect();

    Ok(mutual)
}

/// Check whether `a` and `b` are mutual buddies
///
/// Agrees with [`compute_mutual`]: `compute_mutual(a, [b])` contains `b`
/// exactly when this returns true.
pub fn are_mutual_buddies<S: BuddyStore>(store: &S, a: UserId, b: UserId) -> Result<bool, S::Error> {
    store.exists_reciprocal(a, b)
}

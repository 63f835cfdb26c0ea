//! Buddy operations independent of the HTTP transport.
//!
//! Every function here runs synchronously against the store and is meant to
//! be called from a blocking task.

use std::collections::BTreeSet;

use tandem_domain::correlator::correlate;
use tandem_domain::mutuality::compute_mutual;
use tandem_domain::resolver::resolve_emails;
use tandem_domain::traits::{BookingLookup, BuddyStore, Directory};
use tandem_domain::{BuddyListing, CandidateSet, EdgeId, UserId};
use tandem_store::{SqliteStore, StoreError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::RequestUser;

/// Errors returned by buddy operations
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The user to add as a buddy does not exist
    #[error("Unknown buddy user: {0}")]
    BadCandidate(UserId),

    /// Referenced edge does not exist
    #[error("Buddy entry not found: {0}")]
    NotFound(EdgeId),

    /// Requester does not own the edge
    #[error("Buddy entry {0} belongs to another user")]
    Forbidden(EdgeId),

    /// Underlying persistence failed
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

/// Add `buddy` to the buddy list of `owner`
///
/// The buddy must exist in the directory. Adding the same buddy twice, or
/// oneself, is allowed and creates another edge.
pub fn create_buddy(
    store: &mut SqliteStore,
    owner: UserId,
    buddy: UserId,
) -> Result<EdgeId, ServiceError> {
    let buddy_user = store
        .user_by_id(buddy)?
        .ok_or(ServiceError::BadCandidate(buddy))?;

    let id = store.create_edge(owner, buddy_user.id)?;
    info!(edge = %id, owner = %owner, buddy = %buddy_user.id, "Buddy added");

    Ok(id)
}

/// Delete an edge on behalf of `requester`
///
/// Only the owner may delete; otherwise the edge is left untouched. Edges
/// whose buddy has left the directory can still be deleted.
pub fn delete_buddy(
    store: &mut SqliteStore,
    edge: EdgeId,
    requester: UserId,
) -> Result<(), ServiceError> {
    let owner = store.edge_owner(edge)?.ok_or(ServiceError::NotFound(edge))?;

    if owner != requester {
        warn!(edge = %edge, requester = %requester, "Refusing to delete buddy entry of another user");
        return Err(ServiceError::Forbidden(edge));
    }

    store.delete_edge(edge)?;
    info!(edge = %edge, owner = %requester, "Buddy removed");

    Ok(())
}

/// The buddy list of `owner`, newest first, with each buddy's next booking
///
/// A failed booking lookup only drops the booking from that entry, unless
/// the call was cancelled.
pub fn list_buddies(
    store: &SqliteStore,
    owner: UserId,
    now: u64,
) -> Result<Vec<BuddyListing>, ServiceError> {
    let buddies = store.list_by_owner(owner)?;
    let mut listing = Vec::with_capacity(buddies.len());

    for details in buddies {
        let booking = match store.first_upcoming_booking(details.edge.buddy_id, now) {
            Ok(booking) => booking,
            Err(e) if e.is_cancelled() => return Err(e.into()),
            Err(e) => {
                warn!(buddy = %details.edge.buddy_id, "Failed to load upcoming booking: {}", e);
                None
            }
        };
        listing.push(BuddyListing::new(details, booking));
    }

    debug!(owner = %owner, count = listing.len(), "Listed buddies");
    Ok(listing)
}

/// Which of the candidates are mutual buddies of the requester
///
/// Emails are resolved within the requester's organization; those that do
/// not resolve are logged and left out. Results use the identifier form of
/// the request.
pub fn query_mutual_buddies(
    store: &SqliteStore,
    requester: &RequestUser,
    candidates: &CandidateSet,
) -> Result<Vec<String>, ServiceError> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let resolution = resolve_emails(store, requester.organization_id, candidates.emails());
    for (email, failure) in &resolution.unresolved {
        warn!(
            organization = %requester.organization_id,
            "Failed to resolve email {}: {}", email, failure
        );
    }

    let mut ids: BTreeSet<UserId> = candidates.ids().iter().copied().collect();
    ids.extend(resolution.user_ids());
    let ids: Vec<UserId> = ids.into_iter().collect();

    let mutual = compute_mutual(store, requester.user_id, &ids)?;
    let result = correlate(
        candidates.ids(),
        candidates.emails(),
        &resolution.resolved,
        &mutual,
    );

    debug!(
        requester = %requester.user_id,
        candidates = ids.len(),
        mutual = result.len(),
        "Resolved mutual buddies"
    );
    Ok(result)
}

//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use std::collections::BTreeSet;

use crate::{Booking, BuddyDetails, BuddyEdge, EdgeId, OrganizationId, User, UserId};

/// Trait for storing and querying directed buddy edges
///
/// Implemented by the infrastructure layer (tandem-store)
pub trait BuddyStore {
    /// Error type for store operations
    type Error;

    /// Persist a new edge `owner -> buddy`
    ///
    /// Duplicates and self-edges are not rejected here.
    fn create_edge(&mut self, owner: UserId, buddy: UserId) -> Result<EdgeId, Self::Error>;

    /// Get an edge with the buddy's email, `None` if it does not exist
    ///
    /// Edges whose buddy is missing from the directory are not returned,
    /// the same as in [`BuddyStore::list_by_owner`].
    fn get_edge(&self, id: EdgeId) -> Result<Option<BuddyDetails>, Self::Error>;

    /// All edges declared by `owner`, most recently created first
    fn list_by_owner(&self, owner: UserId) -> Result<Vec<BuddyDetails>, Self::Error>;

    /// Delete an edge. Deleting a missing edge is not an error.
    fn delete_edge(&mut self, id: EdgeId) -> Result<(), Self::Error>;

    /// Every edge whose owner is in `owners` and whose buddy is `buddy`
    fn find_edges_from_owners(
        &self,
        owners: &BTreeSet<UserId>,
        buddy: UserId,
    ) -> Result<Vec<BuddyEdge>, Self::Error>;

    /// Every edge owned by `owner` whose buddy is in `buddies`
    fn find_edges_to_buddies(
        &self,
        owner: UserId,
        buddies: &BTreeSet<UserId>,
    ) -> Result<Vec<BuddyEdge>, Self::Error>;

    /// True iff edges `a -> b` and `b -> a` both exist
    fn exists_reciprocal(&self, a: UserId, b: UserId) -> Result<bool, Self::Error>;
}

/// Trait for looking up users
///
/// The directory is owned by the host platform; this crate only reads it.
pub trait Directory {
    /// Error type for lookups
    type Error;

    /// Find a user by email within one organization
    fn user_by_email(
        &self,
        organization: OrganizationId,
        email: &str,
    ) -> Result<Option<User>, Self::Error>;

    /// Find a user by ID
    fn user_by_id(&self, id: UserId) -> Result<Option<User>, Self::Error>;
}

/// Trait for reading a user's bookings
pub trait BookingLookup {
    /// Error type for lookups
    type Error;

    /// The booking of `user` with the earliest start among those whose end
    /// is after `now` (unix seconds)
    fn first_upcoming_booking(&self, user: UserId, now: u64)
        -> Result<Option<Booking>, Self::Error>;
}

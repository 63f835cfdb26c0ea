//! Buddy edges and the records they are rendered with

use crate::ids::{EdgeId, OrganizationId, UserId};

/// A directed buddy declaration: `owner_id` follows `buddy_id`
///
/// The same `(owner_id, buddy_id)` pair may be stored more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuddyEdge {
    /// Edge identifier, assigned at creation
    pub id: EdgeId,

    /// User who declared the relationship
    pub owner_id: UserId,

    /// User being followed
    pub buddy_id: UserId,
}

/// A buddy edge joined with the buddy's display email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuddyDetails {
    /// The stored edge
    pub edge: BuddyEdge,

    /// Email of `edge.buddy_id` as found in the directory
    pub buddy_email: String,
}

/// A directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// User identifier
    pub id: UserId,

    /// Owning organization
    pub organization_id: OrganizationId,

    /// Login email, unique within the organization
    pub email: String,
}

/// A booking as shown next to a buddy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    /// Start of the booking (unix seconds)
    pub enter: u64,

    /// End of the booking (unix seconds)
    pub leave: u64,

    /// Booked space, e.g. a desk
    pub space_name: String,

    /// Location containing the space, e.g. a room or floor
    pub location_name: String,
}

/// One entry of a user's buddy list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuddyListing {
    /// Edge identifier, needed to delete the entry
    pub edge_id: EdgeId,

    /// The followed user
    pub buddy_id: UserId,

    /// The followed user's email
    pub buddy_email: String,

    /// The buddy's next booking that has not ended yet
    pub first_upcoming_booking: Option<Booking>,
}

impl BuddyListing {
    /// Build a listing entry from stored details and an optional booking
    pub fn new(details: BuddyDetails, first_upcoming_booking: Option<Booking>) -> Self {
        Self {
            edge_id: details.edge.id,
            buddy_id: details.edge.buddy_id,
            buddy_email: details.buddy_email,
            first_upcoming_booking,
        }
    }
}

//! Tandem Domain Layer
//!
//! Buddy relationships between users of a shared-space booking platform and
//! the logic deciding which relationships are mutual. The only external
//! dependency is `uuid`; storage and the user directory are reached through
//! the traits in [`traits`].
//!
//! ## Key Concepts
//!
//! - **Buddy edge**: a directed declaration that one user follows another
//! - **Mutual buddies**: two users with edges pointing at each other
//! - **Candidate set**: user IDs or emails a caller wants checked
//!
//! ## Query pipeline
//!
//! 1. [`resolver::resolve_emails`] turns candidate emails into user IDs,
//!    tolerating individual failures
//! 2. [`mutuality::compute_mutual`] asks the store which candidates reciprocate
//! 3. [`correlator::correlate`] reports results in the caller's identifier form

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buddy;
pub mod candidate;
pub mod correlator;
pub mod ids;
pub mod mutuality;
pub mod resolver;
pub mod traits;

#[cfg(test)]
pub mod testkit;

// Re-exports for convenience
pub use buddy::{Booking, BuddyDetails, BuddyEdge, BuddyListing, User};
pub use candidate::{CandidateError, CandidateSet};
pub use ids::{EdgeId, OrganizationId, UserId};
pub use resolver::{EmailResolution, ResolveFailure};

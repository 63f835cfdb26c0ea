//! Best-effort resolution of candidate emails to user IDs

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::traits::Directory;
use crate::{OrganizationId, UserId};

/// Why an email could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveFailure {
    /// No user with this email in the organization
    NotFound,

    /// The directory lookup itself failed
    Lookup(String),
}

impl fmt::Display for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveFailure::NotFound => write!(f, "no such user"),
            ResolveFailure::Lookup(msg) => write!(f, "lookup failed: {}", msg),
        }
    }
}

/// Outcome of resolving a batch of emails
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailResolution {
    /// Emails that matched a user
    pub resolved: BTreeMap<String, UserId>,

    /// Emails that did not, with the reason
    pub unresolved: BTreeMap<String, ResolveFailure>,
}

impl EmailResolution {
    /// Distinct user IDs behind the resolved emails
    ///
    /// Several emails may lead to the same user; each ID appears once.
    pub fn user_ids(&self) -> BTreeSet<UserId> {
        self.resolved.values().copied().collect()
    }
}

/// Resolve each email to a user within `organization`
///
/// Every email gets its own result. A missing user or a failed lookup moves
/// the email to [`EmailResolution::unresolved`] and the batch carries on.
pub fn resolve_emails<D>(directory: &D, organization: OrganizationId, emails: &[String]) -> EmailResolution
where
    D: Directory,
    D::Error: fmt::Display,
{
    let mut resolution = EmailResolution::default();

    for email in emails {
        if resolution.resolved.contains_key(email) || resolution.unresolved.contains_key(email) {
            continue;
        }
        match directory.user_by_email(organization, email) {
            Ok(Some(user)) => {
                resolution.resolved.insert(email.clone(), user.id);
            }
            Ok(None) => {
                resolution
                    .unresolved
                    .insert(email.clone(), ResolveFailure::NotFound);
            }
            Err(e) => {
                resolution
                    .unresolved
                    .insert(email.clone(), ResolveFailure::Lookup(e.to_string()));
            }
        }
    }

    resolution
}

//! Candidate sets for mutual-buddy queries

use std::fmt;

use crate::UserId;

/// Identifiers a caller wants checked for mutuality
///
/// A request names its candidates either by user ID or by email, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSet {
    /// Candidates given as user IDs, in request order
    Ids(Vec<UserId>),

    /// Candidates given as emails, in request order
    Emails(Vec<String>),
}

/// Rejection of a malformed candidate set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateError {
    /// Both ID and email lists were non-empty
    BothForms,

    /// An ID could not be parsed
    InvalidId(String),
}

impl fmt::Display for CandidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateError::BothForms => {
                write!(f, "buddy_ids and buddy_emails are mutually exclusive")
            }
            CandidateError::InvalidId(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CandidateError {}

impl CandidateSet {
    /// Build a candidate set from the raw request lists
    ///
    /// Two empty lists produce an empty ID set.
    ///
    /// # Errors
    /// Returns [`CandidateError::BothForms`] if both lists are non-empty and
    /// [`CandidateError::InvalidId`] if an ID is not a UUID.
    pub fn from_request(ids: &[String], emails: &[String]) -> Result<Self, CandidateError> {
        if !ids.is_empty() && !emails.is_empty() {
            return Err(CandidateError::BothForms);
        }

        if !emails.is_empty() {
            return Ok(CandidateSet::Emails(emails.to_vec()));
        }

        ids.iter()
            .map(|raw| UserId::from_string(raw).map_err(CandidateError::InvalidId))
            .collect::<Result<Vec<_>, _>>()
            .map(CandidateSet::Ids)
    }

    /// Candidate IDs, empty for an email set
    pub fn ids(&self) -> &[UserId] {
        match self {
            CandidateSet::Ids(ids) => ids,
            CandidateSet::Emails(_) => &[],
        }
    }

    /// Candidate emails, empty for an ID set
    pub fn emails(&self) -> &[String] {
        match self {
            CandidateSet::Ids(_) => &[],
            CandidateSet::Emails(emails) => emails,
        }
    }

    /// True if there is nothing to check
    pub fn is_empty(&self) -> bool {
        self.ids().is_empty() && self.emails().is_empty()
    }
}

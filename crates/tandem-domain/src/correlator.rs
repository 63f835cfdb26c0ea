//! Mapping mutual users back to the identifiers the caller asked with

use std::collections::{BTreeMap, BTreeSet};

use crate::UserId;

/// Select the requested identifiers whose user is in `mutual`
///
/// IDs are emitted as IDs and emails as the email string the caller sent.
/// Requested IDs come first, then emails, each in request order. A user is
/// emitted at most once, under the first identifier that named it.
/// Identifiers never requested are not emitted, even if mutual.
pub fn correlate(
    requested_ids: &[UserId],
    requested_emails: &[String],
    email_to_id: &BTreeMap<String, UserId>,
    mutual: &BTreeSet<UserId>,
) -> Vec<String> {
    let mut emitted = BTreeSet::new();
    let mut out = Vec::new();

    for id in requested_ids {
        if mutual.contains(id) && emitted.insert(*id) {
            out.push(id.to_string());
        }
    }

    for email in requested_emails {
        let Some(id) = email_to_id.get(email) else {
            continue;
        };
        if mutual.contains(id) && emitted.insert(*id) {
            out.push(email.clone());
        }
    }

    out
}

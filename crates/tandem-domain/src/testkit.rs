//! In-memory store and directory for this crate's tests

use std::cell::Cell;
use std::collections::BTreeSet;

use crate::traits::{BuddyStore, Directory};
use crate::{BuddyDetails, BuddyEdge, EdgeId, OrganizationId, User, UserId};

/// Error raised by [`MemoryStore`] when a failure was injected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryError(pub String);

impl std::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "memory store error: {}", self.0)
    }
}

impl std::error::Error for MemoryError {}

/// Vec-backed store and directory
#[derive(Debug, Default)]
pub struct MemoryStore {
    edges: Vec<BuddyEdge>,
    users: Vec<User>,
    failing_emails: BTreeSet<String>,
    fail_queries: bool,
    queries: Cell<usize>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory entry
    pub fn add_user(&mut self, user: User) {
        self.users.push(user);
    }

    /// Make directory lookups for `email` fail
    pub fn fail_email(&mut self, email: &str) {
        self.failing_emails.insert(email.to_string());
    }

    /// Make every edge query fail
    pub fn fail_queries(&mut self, fail: bool) {
        self.fail_queries = fail;
    }

    /// Number of edge queries served so far
    pub fn query_count(&self) -> usize {
        self.queries.get()
    }

    fn begin_query(&self) -> Result<(), MemoryError> {
        self.queries.set(self.queries.get() + 1);
        if self.fail_queries {
            return Err(MemoryError("injected query failure".to_string()));
        }
        Ok(())
    }

    fn details(&self, edge: &BuddyEdge) -> Option<BuddyDetails> {
        self.users
            .iter()
            .find(|u| u.id == edge.buddy_id)
            .map(|u| BuddyDetails {
                edge: *edge,
                buddy_email: u.email.clone(),
            })
    }
}

impl BuddyStore for MemoryStore {
    type Error = MemoryError;

    fn create_edge(&mut self, owner: UserId, buddy: UserId) -> Result<EdgeId, Self::Error> {
        let id = EdgeId::new();
        self.edges.push(BuddyEdge {
            id,
            owner_id: owner,
            buddy_id: buddy,
        });
        Ok(id)
    }

    fn get_edge(&self, id: EdgeId) -> Result<Option<BuddyDetails>, Self::Error> {
        self.begin_query()?;
        Ok(self
            .edges
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| self.details(e)))
    }

    fn list_by_owner(&self, owner: UserId) -> Result<Vec<BuddyDetails>, Self::Error> {
        self.begin_query()?;
        Ok(self
            .edges
            .iter()
            .rev()
            .filter(|e| e.owner_id == owner)
            .filter_map(|e| self.details(e))
            .collect())
    }

    fn delete_edge(&mut self, id: EdgeId) -> Result<(), Self::Error> {
        self.begin_query()?;
        self.edges.retain(|e| e.id != id);
        Ok(())
    }

    fn find_edges_from_owners(
        &self,
        owners: &BTreeSet<UserId>,
        buddy: UserId,
    ) -> Result<Vec<BuddyEdge>, Self::Error> {
        self.begin_query()?;
        Ok(self
            .edges
            .iter()
            .filter(|e| e.buddy_id == buddy && owners.contains(&e.owner_id))
            .copied()
            .collect())
    }

    fn find_edges_to_buddies(
        &self,
        owner: UserId,
        buddies: &BTreeSet<UserId>,
    ) -> Result<Vec<BuddyEdge>, Self::Error> {
        self.begin_query()?;
        Ok(self
            .edges
            .iter()
            .filter(|e| e.owner_id == owner && buddies.contains(&e.buddy_id))
            .copied()
            .collect())
    }

    fn exists_reciprocal(&self, a: UserId, b: UserId) -> Result<bool, Self::Error> {
        self.begin_query()?;
        let has = |from: UserId, to: UserId| {
            self.edges
                .iter()
                .any(|e| e.owner_id == from && e.buddy_id == to)
        };
        Ok(has(a, b) && has(b, a))
    }
}

impl Directory for MemoryStore {
    type Error = MemoryError;

    fn user_by_email(
        &self,
        organization: OrganizationId,
        email: &str,
    ) -> Result<Option<User>, Self::Error> {
        if self.failing_emails.contains(email) {
            return Err(MemoryError(format!("lookup of {} failed", email)));
        }
        Ok(self
            .users
            .iter()
            .find(|u| u.organization_id == organization && u.email == email)
            .cloned())
    }

    fn user_by_id(&self, id: UserId) -> Result<Option<User>, Self::Error> {
        Ok(self.users.iter().find(|u| u.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(n: u128) -> User {
        User {
            id: UserId::from_value(n),
            organization_id: OrganizationId::from_value(0xA),
            email: format!("u{}@example.com", n),
        }
    }

    #[test]
    fn test_directory_lookup_by_id() {
        let mut store = MemoryStore::new();
        store.add_user(user(1));

        assert_eq!(store.user_by_id(UserId::from_value(1)).unwrap(), Some(user(1)));
        assert_eq!(store.user_by_id(UserId::from_value(2)).unwrap(), None);
    }

    #[test]
    fn test_edge_without_directory_entry_hidden() {
        let mut store = MemoryStore::new();
        store.add_user(user(2));
        let visible = store.create_edge(UserId::from_value(1), UserId::from_value(2)).unwrap();
        let hidden = store.create_edge(UserId::from_value(1), UserId::from_value(3)).unwrap();

        assert!(store.get_edge(visible).unwrap().is_some());
        assert!(store.get_edge(hidden).unwrap().is_none());
        assert_eq!(store.list_by_owner(UserId::from_value(1)).unwrap().len(), 1);
    }
}

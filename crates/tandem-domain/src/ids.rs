//! Identifier newtypes
//!
//! Users, organizations and buddy edges are all addressed by 128-bit UUIDs.
//! Each gets its own type so an edge ID can never be passed where a user ID
//! is expected.

use std::fmt;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u128);

        impl $name {
            /// Create an identifier from a raw u128 value
            ///
            /// This is primarily for storage layer deserialization and tests.
            pub fn from_value(value: u128) -> Self {
                Self(value)
            }

            /// Parse an identifier from any UUID string form
            pub fn from_string(s: &str) -> Result<Self, String> {
                uuid::Uuid::parse_str(s.trim())
                    .map(|u| Self(u.as_u128()))
                    .map_err(|e| format!("Invalid {} '{}': {}", stringify!($name), s, e))
            }

            /// Get the raw u128 value
            pub fn value(&self) -> u128 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", uuid::Uuid::from_u128(self.0))
            }
        }
    };
}

uuid_id!(
    /// Identifier of a user in the directory
    UserId
);

uuid_id!(
    /// Identifier of the organization a user belongs to
    ///
    /// Email addresses are only unique within an organization.
    OrganizationId
);

uuid_id!(
    /// Identifier of a stored buddy edge
    EdgeId
);

impl EdgeId {
    /// Generate a new UUIDv7-based edge identifier
    ///
    /// # Examples
    ///
    /// ```
    /// use tandem_domain::EdgeId;
    ///
    /// let id = EdgeId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_roundtrip() {
        let id = UserId::from_value(0x1234_5678_9abc_def0_1234_5678_9abc_def0);
        let parsed = UserId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_display_is_lowercase_hyphenated() {
        let id = UserId::from_string("A1A2A3A4-B1B2-C1C2-D1D2-D3D4D5D6D7D8").unwrap();
        assert_eq!(id.to_string(), "a1a2a3a4-b1b2-c1c2-d1d2-d3d4d5d6d7d8");
    }

    #[test]
    fn test_invalid_string_rejected() {
        let err = OrganizationId::from_string("not-a-uuid").unwrap_err();
        assert!(err.contains("OrganizationId"));
    }

    #[test]
    fn test_edge_ids_are_unique() {
        assert_ne!(EdgeId::new(), EdgeId::new());
    }
}

//! Tandem Storage Layer
//!
//! Implements the [`BuddyStore`], [`Directory`] and [`BookingLookup`] traits
//! on SQLite.
//!
//! # Architecture
//!
//! - `buddies` holds directed edges; nothing enforces one edge per pair
//! - `users` and `bookings` mirror the host platform's directory and
//!   bookings so edges can be joined with emails and upcoming bookings
//! - Batch lookups bind every identifier as a parameter
//! - A cancel flag set with [`SqliteStore::set_cancel_flag`] fails every
//!   later call and aborts the statement in progress
//!
//! # Examples
//!
//! ```no_run
//! use tandem_store::SqliteStore;
//!
//! let store = SqliteStore::open(":memory:").unwrap();
//! // Store is now ready for buddy operations
//! store.close().unwrap();
//! ```

#![warn(missing_docs)]

use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::ffi::c_int;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tandem_domain::traits::{BookingLookup, BuddyStore, Directory};
use tandem_domain::{
    Booking, BuddyDetails, BuddyEdge, EdgeId, OrganizationId, User, UserId,
};
use thiserror::Error;

/// Schema version recorded in `PRAGMA user_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Identifiers bound per statement in batch lookups
///
/// Stays well below SQLite's bound parameter limit.
const MAX_BATCH: usize = 500;

/// Virtual machine steps between cancel flag checks
const CANCEL_CHECK_STEPS: c_int = 1_000;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The caller gave up on the store call
    #[error("Store call cancelled")]
    Cancelled,
}

impl StoreError {
    /// Whether the error comes from a cancelled call rather than the data
    pub fn is_cancelled(&self) -> bool {
        match self {
            StoreError::Cancelled => true,
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == ErrorCode::OperationInterrupted
            }
            _ => false,
        }
    }
}

/// SQLite-based implementation of the buddy store and its collaborators
///
/// # Thread Safety
///
/// The store can be moved between threads but not shared; wrap it in a
/// mutex to serve concurrent requests.
pub struct SqliteStore {
    conn: Connection,
    cancel: Option<Arc<AtomicBool>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tandem_store::SqliteStore;
    ///
    /// let store = SqliteStore::open("tandem.db").unwrap();
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn, cancel: None };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create missing tables and indexes, then record the schema version
    fn initialize_schema(&self) -> Result<(), StoreError> {
        let version = self.schema_version()?;
        if version > SCHEMA_VERSION {
            return Err(StoreError::InvalidData(format!(
                "Database schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            )));
        }

        self.conn.execute_batch(include_str!("schema.sql"))?;
        self.conn
            .pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(())
    }

    /// Schema version stored in the database file
    pub fn schema_version(&self) -> Result<i64, StoreError> {
        let version = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(version)
    }

    /// Tie the store to the cancel flag of the call now holding it
    ///
    /// Once `flag` is set, every store method fails with
    /// [`StoreError::Cancelled`] and a statement in progress is aborted.
    /// Pass `None` when the call is done so the next one starts clean.
    pub fn set_cancel_flag(&mut self, flag: Option<Arc<AtomicBool>>) {
        match &flag {
            Some(cancelled) => {
                let cancelled = AssertUnwindSafe(Arc::clone(cancelled));
                self.conn.progress_handler(
                    CANCEL_CHECK_STEPS,
                    Some(move || cancelled.load(Ordering::SeqCst)),
                );
            }
            None => self
                .conn
                .progress_handler(CANCEL_CHECK_STEPS, None::<fn() -> bool>),
        }
        self.cancel = flag;
    }

    fn check_cancelled(&self) -> Result<(), StoreError> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::SeqCst) => Err(StoreError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Check that the database answers queries
    pub fn ping(&self) -> Result<(), StoreError> {
        self.check_cancelled()?;
        self.conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// Close the connection, reporting any error SQLite raises on close
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, e)| StoreError::Database(e))
    }

    /// Insert or update a directory entry
    pub fn insert_user(&mut self, user: &User) -> Result<(), StoreError> {
        self.check_cancelled()?;
        self.conn.execute(
            "INSERT INTO users (id, organization_id, email) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
             organization_id = excluded.organization_id, email = excluded.email",
            params![
                user.id.to_string(),
                user.organization_id.to_string(),
                &user.email,
            ],
        )?;
        Ok(())
    }

    /// Record a booking for `user`
    pub fn insert_booking(&mut self, user: UserId, booking: &Booking) -> Result<(), StoreError> {
        self.check_cancelled()?;
        let enter = Self::secs_to_sql(booking.enter)?;
        let leave = Self::secs_to_sql(booking.leave)?;
        self.conn.execute(
            "INSERT INTO bookings (user_id, enter_time, leave_time, space_name, location_name)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.to_string(),
                enter,
                leave,
                &booking.space_name,
                &booking.location_name,
            ],
        )?;
        Ok(())
    }

    /// Owner of an edge, whether or not its buddy is still in the directory
    pub fn edge_owner(&self, id: EdgeId) -> Result<Option<UserId>, StoreError> {
        self.check_cancelled()?;
        let owner = self
            .conn
            .query_row(
                "SELECT owner_id FROM buddies WHERE id = ?1",
                params![id.to_string()],
                |row| Self::column_id(row, 0, UserId::from_string),
            )
            .optional()?;

        Ok(owner)
    }

    fn secs_to_sql(secs: u64) -> Result<i64, StoreError> {
        i64::try_from(secs)
            .map_err(|_| StoreError::InvalidData(format!("Timestamp {} out of range", secs)))
    }

    /// Read a non-negative seconds column
    fn column_secs(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
        let raw: i64 = row.get(idx)?;
        u64::try_from(raw).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Integer,
                Box::new(StoreError::InvalidData(format!("Negative timestamp {}", raw))),
            )
        })
    }

    /// Read an identifier column stored as UUID text
    fn column_id<T>(
        row: &Row<'_>,
        idx: usize,
        parse: fn(&str) -> Result<T, String>,
    ) -> rusqlite::Result<T> {
        let raw: String = row.get(idx)?;
        parse(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Text,
                Box::new(StoreError::InvalidData(e)),
            )
        })
    }

    /// Map `id, owner_id, buddy_id` starting at column 0
    fn row_to_edge(row: &Row<'_>) -> rusqlite::Result<BuddyEdge> {
        Ok(BuddyEdge {
            id: Self::column_id(row, 0, EdgeId::from_string)?,
            owner_id: Self::column_id(row, 1, UserId::from_string)?,
            buddy_id: Self::column_id(row, 2, UserId::from_string)?,
        })
    }

    /// Map `id, owner_id, buddy_id, email`
    fn row_to_details(row: &Row<'_>) -> rusqlite::Result<BuddyDetails> {
        Ok(BuddyDetails {
            edge: Self::row_to_edge(row)?,
            buddy_email: row.get(3)?,
        })
    }

    fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: Self::column_id(row, 0, UserId::from_string)?,
            organization_id: Self::column_id(row, 1, OrganizationId::from_string)?,
            email: row.get(2)?,
        })
    }

    /// Run `sql` once per chunk of `ids`, binding `fixed` first
    ///
    /// `sql` must contain `{ids}` where the `IN` placeholders go and exactly
    /// one other `?` for `fixed`, placed before the `IN` list.
    fn query_edges_batched(
        &self,
        sql: &str,
        fixed: UserId,
        ids: &BTreeSet<UserId>,
    ) -> Result<Vec<BuddyEdge>, StoreError> {
        let ids: Vec<String> = ids.iter().map(UserId::to_string).collect();
        let mut edges = Vec::new();

        for chunk in ids.chunks(MAX_BATCH) {
            self.check_cancelled()?;
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut stmt = self.conn.prepare(&sql.replace("{ids}", &placeholders))?;
            let bound = std::iter::once(fixed.to_string()).chain(chunk.iter().cloned());
            let rows = stmt
                .query_map(params_from_iter(bound), Self::row_to_edge)?
                .collect::<Result<Vec<_>, _>>()?;
            edges.extend(rows);
        }

        Ok(edges)
    }

    fn now_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .and_then(|d| i64::try_from(d.as_millis()).ok())
            .unwrap_or(0)
    }
}

impl BuddyStore for SqliteStore {
    type Error = StoreError;

    fn create_edge(&mut self, owner: UserId, buddy: UserId) -> Result<EdgeId, Self::Error> {
        self.check_cancelled()?;
        let id = EdgeId::new();

        self.conn.execute(
            "INSERT INTO buddies (id, owner_id, buddy_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                id.to_string(),
                owner.to_string(),
                buddy.to_string(),
                Self::now_millis(),
            ],
        )?;

        Ok(id)
    }

    fn get_edge(&self, id: EdgeId) -> Result<Option<BuddyDetails>, Self::Error> {
        self.check_cancelled()?;
        let details = self
            .conn
            .query_row(
                "SELECT b.id, b.owner_id, b.buddy_id, u.email
                 FROM buddies b
                 INNER JOIN users u ON b.buddy_id = u.id
                 WHERE b.id = ?1",
                params![id.to_string()],
                Self::row_to_details,
            )
            .optional()?;

        Ok(details)
    }

    fn list_by_owner(&self, owner: UserId) -> Result<Vec<BuddyDetails>, Self::Error> {
        self.check_cancelled()?;
        let mut stmt = self.conn.prepare(
            "SELECT b.id, b.owner_id, b.buddy_id, u.email
             FROM buddies b
             INNER JOIN users u ON b.buddy_id = u.id
             WHERE b.owner_id = ?1
             ORDER BY b.created_at DESC, b.rowid DESC",
        )?;

        let details = stmt
            .query_map(params![owner.to_string()], Self::row_to_details)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(details)
    }

    fn delete_edge(&mut self, id: EdgeId) -> Result<(), Self::Error> {
        self.check_cancelled()?;
        self.conn
            .execute("DELETE FROM buddies WHERE id = ?1", params![id.to_string()])?;
        Ok(())
    }

    fn find_edges_from_owners(
        &self,
        owners: &BTreeSet<UserId>,
        buddy: UserId,
    ) -> Result<Vec<BuddyEdge>, Self::Error> {
        self.query_edges_batched(
            "SELECT id, owner_id, buddy_id FROM buddies
             WHERE buddy_id = ? AND owner_id IN ({ids})",
            buddy,
            owners,
        )
    }

    fn find_edges_to_buddies(
        &self,
        owner: UserId,
        buddies: &BTreeSet<UserId>,
    ) -> Result<Vec<BuddyEdge>, Self::Error> {
        self.query_edges_batched(
            "SELECT id, owner_id, buddy_id FROM buddies
             WHERE owner_id = ? AND buddy_id IN ({ids})",
            owner,
            buddies,
        )
    }

    fn exists_reciprocal(&self, a: UserId, b: UserId) -> Result<bool, Self::Error> {
        self.check_cancelled()?;
        let exists = self.conn.query_row(
            "SELECT EXISTS (
                 SELECT 1
                 FROM buddies b1
                 INNER JOIN buddies b2
                 ON b1.owner_id = b2.buddy_id AND b1.buddy_id = b2.owner_id
                 WHERE b1.owner_id = ?1 AND b1.buddy_id = ?2
             )",
            params![a.to_string(), b.to_string()],
            |row| row.get(0),
        )?;

        Ok(exists)
    }
}

impl Directory for SqliteStore {
    type Error = StoreError;

    fn user_by_email(
        &self,
        organization: OrganizationId,
        email: &str,
    ) -> Result<Option<User>, Self::Error> {
        self.check_cancelled()?;
        let user = self
            .conn
            .query_row(
                "SELECT id, organization_id, email FROM users
                 WHERE organization_id = ?1 AND email = ?2",
                params![organization.to_string(), email],
                Self::row_to_user,
            )
            .optional()?;

        Ok(user)
    }

    fn user_by_id(&self, id: UserId) -> Result<Option<User>, Self::Error> {
        self.check_cancelled()?;
        let user = self
            .conn
            .query_row(
                "SELECT id, organization_id, email FROM users WHERE id = ?1",
                params![id.to_string()],
                Self::row_to_user,
            )
            .optional()?;

        Ok(user)
    }
}

impl BookingLookup for SqliteStore {
    type Error = StoreError;

    fn first_upcoming_booking(
        &self,
        user: UserId,
        now: u64,
    ) -> Result<Option<Booking>, Self::Error> {
        self.check_cancelled()?;
        let now = Self::secs_to_sql(now)?;
        let booking = self
            .conn
            .query_row(
                "SELECT enter_time, leave_time, space_name, location_name
                 FROM bookings
                 WHERE user_id = ?1 AND leave_time > ?2
                 ORDER BY enter_time ASC
                 LIMIT 1",
                params![user.to_string(), now],
                |row| {
                    Ok(Booking {
                        enter: Self::column_secs(row, 0)?,
                        leave: Self::column_secs(row, 1)?,
                        space_name: row.get(2)?,
                        location_name: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(booking)
    }
}

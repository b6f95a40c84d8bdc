//! Key-value storage tier contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide raw get/set/remove over one storage tier.
//! - Enforce the capacity limits of the synced tier.
//! - Keep SQL details inside the repository boundary.
//!
//! # Invariants
//! - Values are stored as UTF-8 JSON text.
//! - The synced tier rejects writes larger than its per-item or total quota
//!   instead of truncating them.
//! - A rejected write leaves the previously stored value untouched.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::node::TreeValidationError;
use crate::model::now_epoch_ms;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Per-item byte limit of the synced tier (key + value).
pub const SYNCED_ITEM_QUOTA_BYTES: usize = 8_192;
/// Total byte limit of the synced tier.
pub const SYNCED_TOTAL_QUOTA_BYTES: usize = 102_400;

const KV_TABLE: &str = "kv_entries";

/// Result type used by storage tier and store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage tier role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    /// Large-capacity, device-local tier holding the tree collection.
    Bulk,
    /// Small, cross-device tier holding settings.
    Synced,
}

impl TierKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bulk => "bulk",
            Self::Synced => "synced",
        }
    }

    /// Returns the per-item byte limit, if this tier has one.
    pub fn item_quota(self) -> Option<usize> {
        match self {
            Self::Bulk => None,
            Self::Synced => Some(SYNCED_ITEM_QUOTA_BYTES),
        }
    }

    /// Returns the whole-tier byte limit, if this tier has one.
    pub fn total_quota(self) -> Option<usize> {
        match self {
            Self::Bulk => None,
            Self::Synced => Some(SYNCED_TOTAL_QUOTA_BYTES),
        }
    }
}

impl Display for TierKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from storage tiers and the memo store.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Stored value cannot be encoded or decoded.
    Serialization {
        key: String,
        source: serde_json::Error,
    },
    /// Write would exceed the tier capacity.
    QuotaExceeded {
        tier: TierKind,
        key: String,
        bytes: usize,
        limit: usize,
    },
    /// Tree snapshot violates forest invariants and was not written.
    InvalidTree(TreeValidationError),
    /// At least one tier failed during a two-tier save.
    PartialWrite {
        bulk: Option<Box<StoreError>>,
        synced: Option<Box<StoreError>>,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "storage tier requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "storage tier requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "storage tier requires column `{column}` in table `{table}`"
            ),
            Self::Serialization { key, source } => {
                write!(f, "invalid stored value for `{key}`: {source}")
            }
            Self::QuotaExceeded {
                tier,
                key,
                bytes,
                limit,
            } => write!(
                f,
                "{tier} tier quota exceeded for `{key}`: {bytes} bytes over limit {limit}"
            ),
            Self::InvalidTree(err) => write!(f, "{err}"),
            Self::PartialWrite { bulk, synced } => {
                write!(f, "storage write failed")?;
                if let Some(err) = bulk {
                    write!(f, "; bulk tier: {err}")?;
                }
                if let Some(err) = synced {
                    write!(f, "; synced tier: {err}")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization { source, .. } => Some(source),
            Self::InvalidTree(err) => Some(err),
            Self::PartialWrite { bulk, synced } => bulk
                .as_deref()
                .or(synced.as_deref())
                .map(|err| err as &(dyn Error + 'static)),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<TreeValidationError> for StoreError {
    fn from(value: TreeValidationError) -> Self {
        Self::InvalidTree(value)
    }
}

/// Raw access to one key-value storage tier.
pub trait KeyValueTier {
    /// Role of this tier.
    fn kind(&self) -> TierKind;
    /// Reads the raw JSON text stored at `key`.
    fn get_raw(&self, key: &str) -> StoreResult<Option<String>>;
    /// Stores raw JSON text at `key`, replacing any previous value.
    fn set_raw(&self, key: &str, value: &str) -> StoreResult<()>;
    /// Removes `key`; removing an absent key is a no-op.
    fn remove(&self, key: &str) -> StoreResult<()>;
}

impl<T: KeyValueTier + ?Sized> KeyValueTier for &T {
    fn kind(&self) -> TierKind {
        (**self).kind()
    }

    fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get_raw(key)
    }

    fn set_raw(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set_raw(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        (**self).remove(key)
    }
}

/// Reads and decodes the JSON value at `key`.
pub fn read_json<T: DeserializeOwned>(
    tier: &impl KeyValueTier,
    key: &str,
) -> StoreResult<Option<T>> {
    let Some(raw) = tier.get_raw(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StoreError::Serialization {
            key: key.to_string(),
            source,
        })
}

/// Encodes `value` as JSON and stores it at `key`.
pub fn write_json<T: Serialize + ?Sized>(
    tier: &impl KeyValueTier,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let raw = serde_json::to_string(value).map_err(|source| StoreError::Serialization {
        key: key.to_string(),
        source,
    })?;
    tier.set_raw(key, &raw)
}

/// SQLite-backed storage tier. One database per tier.
pub struct SqliteKvTier<'conn> {
    conn: &'conn Connection,
    kind: TierKind,
}

impl<'conn> SqliteKvTier<'conn> {
    /// Creates a tier from a migrated connection.
    pub fn try_new(conn: &'conn Connection, kind: TierKind) -> StoreResult<Self> {
        ensure_kv_connection_ready(conn)?;
        Ok(Self { conn, kind })
    }

    /// Returns the total bytes (keys + values) currently stored in this tier.
    pub fn bytes_in_use(&self) -> StoreResult<usize> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(byte_size), 0) FROM kv_entries;",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(total).unwrap_or(0))
    }

    fn ensure_within_quota(&self, key: &str, bytes: usize) -> StoreResult<()> {
        if let Some(limit) = self.kind.item_quota() {
            if bytes > limit {
                return Err(self.quota_error(key, bytes, limit));
            }
        }

        if let Some(limit) = self.kind.total_quota() {
            let others: i64 = self.conn.query_row(
                "SELECT COALESCE(SUM(byte_size), 0) FROM kv_entries WHERE entry_key <> ?1;",
                [key],
                |row| row.get(0),
            )?;
            let projected = usize::try_from(others).unwrap_or(0) + bytes;
            if projected > limit {
                return Err(self.quota_error(key, projected, limit));
            }
        }

        Ok(())
    }

    fn quota_error(&self, key: &str, bytes: usize, limit: usize) -> StoreError {
        StoreError::QuotaExceeded {
            tier: self.kind,
            key: key.to_string(),
            bytes,
            limit,
        }
    }
}

impl KeyValueTier for SqliteKvTier<'_> {
    fn kind(&self) -> TierKind {
        self.kind
    }

    fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT entry_value FROM kv_entries WHERE entry_key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_raw(&self, key: &str, value: &str) -> StoreResult<()> {
        let bytes = key.len() + value.len();
        self.ensure_within_quota(key, bytes)?;

        self.conn.execute(
            "INSERT INTO kv_entries (entry_key, entry_value, byte_size, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(entry_key) DO UPDATE SET
                entry_value = excluded.entry_value,
                byte_size = excluded.byte_size,
                updated_at = excluded.updated_at;",
            params![
                key,
                value,
                i64::try_from(bytes).unwrap_or(i64::MAX),
                now_epoch_ms()
            ],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM kv_entries WHERE entry_key = ?1;", [key])?;
        Ok(())
    }
}

fn ensure_kv_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, KV_TABLE)? {
        return Err(StoreError::MissingRequiredTable(KV_TABLE));
    }

    for column in ["entry_key", "entry_value", "updated_at", "byte_size"] {
        if !table_has_column(conn, KV_TABLE, column)? {
            return Err(StoreError::MissingRequiredColumn {
                table: KV_TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

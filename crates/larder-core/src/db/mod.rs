//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `pantry` - Pantry item CRUD and restocking
//! - `lists` - Shopping lists and their items
//! - `receipts` - Imported receipts and line items
//! - `store` - `HouseholdStore` implementation used by trip completion

use std::sync::Arc;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::ids::{HashedIds, IdGenerator};

mod lists;
mod pantry;
mod receipts;
mod store;

pub use receipts::ReceiptInsertResult;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "LARDER_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this invalidates every existing encrypted database
    const APP_SALT: &[u8; 16] = b"larder-salt-v1-f";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Row counts for `larder status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DbStats {
    pub pantry_items: i64,
    pub running_low: i64,
    pub open_lists: i64,
    pub completed_lists: i64,
    pub receipts: i64,
    pub unlinked_receipts: i64,
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
    ids: Arc<dyn IdGenerator>,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `LARDER_DB_KEY` environment variable to be set. Use
    /// `new_unencrypted()` for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        let encryption_key = std::env::var(DB_KEY_ENV).ok();
        match encryption_key {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases.",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let key_pragma = passphrase
            .map(|pass| derive_key(pass).map(|key| format!("PRAGMA key = 'x\"{}\"';", key)))
            .transpose()?;

        // Runs on every new pooled connection
        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            if let Some(pragma) = &key_pragma {
                conn.execute_batch(pragma)?;
            }
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
            ids: Arc::new(HashedIds::default()),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Replace the id generator used for new rows
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because each pooled
    /// connection would otherwise see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "larder_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any leftover from an earlier run
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path.to_string_lossy())
    }

    /// Check if the database is encrypted
    pub fn is_encrypted(&self) -> Result<bool> {
        let conn = self.conn()?;
        // SQLCipher sets cipher_version if encryption is active
        let result: rusqlite::Result<String> =
            conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0));
        Ok(result.is_ok() && std::env::var(DB_KEY_ENV).is_ok())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    pub(crate) fn next_id(&self, prefix: &str) -> String {
        self.ids.next_id(prefix)
    }

    /// Row counts across the household data
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.conn()?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };

        Ok(DbStats {
            pantry_items: count("SELECT COUNT(*) FROM pantry_items")?,
            running_low: count(
                "SELECT COUNT(*) FROM pantry_items WHERE stock_level IN ('low', 'out')",
            )?,
            open_lists: count(
                "SELECT COUNT(*) FROM shopping_lists WHERE status IN ('active', 'shopping')",
            )?,
            completed_lists: count(
                "SELECT COUNT(*) FROM shopping_lists WHERE status = 'completed'",
            )?,
            receipts: count("SELECT COUNT(*) FROM receipts")?,
            unlinked_receipts: count("SELECT COUNT(*) FROM receipts WHERE list_id IS NULL")?,
        })
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Pantry inventory
            CREATE TABLE IF NOT EXISTS pantry_items (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'uncategorized',
                stock_level TEXT NOT NULL DEFAULT 'stocked',  -- stocked, good, low, out
                last_known_price REAL,
                updated_at DATETIME,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_pantry_items_stock ON pantry_items(stock_level);
            CREATE INDEX IF NOT EXISTS idx_pantry_items_category ON pantry_items(category);

            -- Shopping lists
            CREATE TABLE IF NOT EXISTS shopping_lists (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                budget REAL,
                status TEXT NOT NULL DEFAULT 'active',        -- active, shopping, completed, archived
                completed_at DATETIME,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_shopping_lists_status ON shopping_lists(status);

            -- Planned items, in list order
            CREATE TABLE IF NOT EXISTS list_items (
                id INTEGER PRIMARY KEY,
                list_id TEXT NOT NULL REFERENCES shopping_lists(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                quantity REAL NOT NULL DEFAULT 1,
                priority TEXT NOT NULL DEFAULT 'medium',      -- high, medium, low
                pantry_item_id TEXT REFERENCES pantry_items(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_list_items_list ON list_items(list_id, position);

            -- Imported receipts
            CREATE TABLE IF NOT EXISTS receipts (
                id TEXT PRIMARY KEY,
                store_name TEXT,
                purchased_on DATE,
                printed_total REAL,
                list_id TEXT REFERENCES shopping_lists(id) ON DELETE SET NULL,
                content_hash TEXT UNIQUE,                     -- SHA-256 of the imported file
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_receipts_list ON receipts(list_id);

            -- Receipt line items, in receipt order
            CREATE TABLE IF NOT EXISTS receipt_items (
                id INTEGER PRIMARY KEY,
                receipt_id TEXT NOT NULL REFERENCES receipts(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                quantity REAL NOT NULL DEFAULT 1,
                unit_price REAL NOT NULL DEFAULT 0,
                total_price REAL NOT NULL DEFAULT 0,
                category TEXT,
                size TEXT,
                unit TEXT,
                confidence INTEGER                            -- OCR confidence 0-100
            );

            CREATE INDEX IF NOT EXISTS idx_receipt_items_receipt ON receipt_items(receipt_id, position);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

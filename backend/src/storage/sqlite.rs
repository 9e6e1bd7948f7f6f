//! SQLite Persistent Storage for the ledger
//!
//! Provides durable storage for tree nodes, consumed identifiers, custody
//! balances and published events so a node survives restarts. Uses connection
//! pooling via r2d2.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use shielded_pool::{Hash32, LedgerSnapshot, StateDelta};

use super::traits::{check_sequence, Balance, LedgerStore, StorageError, StorageResult};
use crate::types::{decode_hash, record_codes, record_from_codes, EventRecord, StoredEvent};

/// SQLite-backed ledger store with connection pooling
pub struct SqliteLedgerStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteLedgerStore {
    /// Create a new store with the given database path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Get a connection from the pool
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_meta (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                root TEXT NOT NULL,
                next_index INTEGER NOT NULL,
                sequence INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tree_nodes (
                node_key INTEGER PRIMARY KEY,
                hash TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS identifiers (
                id TEXT PRIMARY KEY,
                kind INTEGER NOT NULL,
                operation INTEGER NOT NULL,
                sequence INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                sequence INTEGER NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY (sequence, position)
            );

            -- Amounts are decimal text: u64 does not fit SQLite's INTEGER
            CREATE TABLE IF NOT EXISTS custody_balances (
                asset TEXT NOT NULL,
                account TEXT NOT NULL,
                amount TEXT NOT NULL,
                PRIMARY KEY (asset, account)
            );

            CREATE INDEX IF NOT EXISTS idx_identifiers_sequence ON identifiers(sequence);
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    // Synchronous helper methods for the trait implementations

    fn sequence_sync(&self) -> Result<u64, StorageError> {
        let conn = self.conn()?;
        stored_sequence(&conn)
    }

    fn apply_delta_sync(&self, delta: &StateDelta, balances: &[Balance]) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_error)?;

        check_sequence(stored_sequence(&tx)?, delta.sequence)?;

        tx.execute(
            "INSERT INTO ledger_meta (id, root, next_index, sequence) VALUES (0, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                root = excluded.root,
                next_index = excluded.next_index,
                sequence = excluded.sequence",
            params![hex::encode(delta.root), delta.next_index as i64, delta.sequence as i64],
        )
        .map_err(db_error)?;

        {
            let mut stmt = tx
                .prepare("INSERT OR REPLACE INTO tree_nodes (node_key, hash) VALUES (?1, ?2)")
                .map_err(db_error)?;
            for (key, hash) in &delta.nodes {
                stmt.execute(params![*key as i64, hex::encode(hash)])
                    .map_err(db_error)?;
            }
        }

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO identifiers (id, kind, operation, sequence) VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(db_error)?;
            for (id, record) in &delta.marked {
                let (kind, operation) = record_codes(record);
                stmt.execute(params![hex::encode(id), kind, operation, record.sequence as i64])
                    .map_err(|e| {
                        if is_constraint_violation(&e) {
                            StorageError::Duplicate(hex::encode(id))
                        } else {
                            db_error(e)
                        }
                    })?;
            }
        }

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO events (sequence, position, name, payload) VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(db_error)?;
            for stored in StoredEvent::from_delta(delta) {
                let payload = serde_json::to_string(&stored.event)
                    .map_err(|e| StorageError::InvalidData(e.to_string()))?;
                stmt.execute(params![
                    stored.sequence as i64,
                    stored.position,
                    stored.event.name(),
                    payload
                ])
                .map_err(db_error)?;
            }
        }

        write_balances(&tx, balances)?;

        tx.commit().map_err(db_error)
    }

    fn save_balances_sync(&self, balances: &[Balance]) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_error)?;
        write_balances(&tx, balances)?;
        tx.commit().map_err(db_error)
    }

    fn load_balances_sync(&self) -> Result<Vec<Balance>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT asset, account, amount FROM custody_balances ORDER BY asset, account")
            .map_err(db_error)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(db_error)?;

        let mut balances = Vec::new();
        for row in rows {
            let (asset, account, amount) = row.map_err(db_error)?;
            balances.push(Balance {
                asset: parse_hash("asset", &asset)?,
                account: parse_hash("account", &account)?,
                amount: amount.parse().map_err(|_| {
                    StorageError::InvalidData(format!("bad custody amount: {}", amount))
                })?,
            });
        }
        Ok(balances)
    }

    fn load_snapshot_sync(&self) -> Result<Option<LedgerSnapshot>, StorageError> {
        let conn = self.conn()?;

        let meta = conn
            .query_row(
                "SELECT root, next_index, sequence FROM ledger_meta WHERE id = 0",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(db_error)?;

        let Some((root, next_index, sequence)) = meta else {
            return Ok(None);
        };

        let mut nodes = Vec::new();
        let mut stmt = conn
            .prepare("SELECT node_key, hash FROM tree_nodes ORDER BY node_key")
            .map_err(db_error)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
            .map_err(db_error)?;
        for row in rows {
            let (key, hash) = row.map_err(db_error)?;
            nodes.push((key as u64, parse_hash("tree node", &hash)?));
        }

        // Sorted by raw bytes, matching the in-memory snapshot order
        let mut identifiers = BTreeMap::new();
        let mut stmt = conn
            .prepare("SELECT id, kind, operation, sequence FROM identifiers")
            .map_err(db_error)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u8>(1)?,
                    row.get::<_, u8>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(db_error)?;
        for row in rows {
            let (id, kind, operation, consumed_at) = row.map_err(db_error)?;
            let record = record_from_codes(kind, operation, consumed_at as u64).ok_or_else(|| {
                StorageError::InvalidData(format!("identifier {} has unknown kind/operation", id))
            })?;
            identifiers.insert(parse_hash("identifier", &id)?, record);
        }

        Ok(Some(LedgerSnapshot {
            root: parse_hash("root", &root)?,
            next_index: next_index as u64,
            sequence: sequence as u64,
            nodes,
            identifiers: identifiers.into_iter().collect(),
        }))
    }

    fn events_sync(&self, after_sequence: u64, transitions: u64) -> Result<Vec<StoredEvent>, StorageError> {
        let conn = self.conn()?;
        let last = after_sequence.saturating_add(transitions);
        let mut stmt = conn
            .prepare(
                "SELECT sequence, position, payload FROM events
                 WHERE sequence > ?1 AND sequence <= ?2 ORDER BY sequence, position",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![after_sequence as i64, last.min(i64::MAX as u64) as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(db_error)?;

        let mut events = Vec::new();
        for row in rows {
            let (sequence, position, payload) = row.map_err(db_error)?;
            let event: EventRecord = serde_json::from_str(&payload)
                .map_err(|e| StorageError::InvalidData(e.to_string()))?;
            events.push(StoredEvent {
                sequence: sequence as u64,
                position,
                event,
            });
        }
        Ok(events)
    }
}

fn stored_sequence(conn: &rusqlite::Connection) -> Result<u64, StorageError> {
    let sequence = conn
        .query_row("SELECT sequence FROM ledger_meta WHERE id = 0", [], |row| {
            row.get::<_, i64>(0)
        })
        .optional()
        .map_err(db_error)?;
    Ok(sequence.unwrap_or(0) as u64)
}

fn write_balances(conn: &rusqlite::Connection, balances: &[Balance]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare(
            "INSERT INTO custody_balances (asset, account, amount) VALUES (?1, ?2, ?3)
             ON CONFLICT(asset, account) DO UPDATE SET amount = excluded.amount",
        )
        .map_err(db_error)?;
    for balance in balances {
        stmt.execute(params![
            hex::encode(balance.asset),
            hex::encode(balance.account),
            balance.amount.to_string()
        ])
        .map_err(db_error)?;
    }
    Ok(())
}

fn parse_hash(what: &str, value: &str) -> Result<Hash32, StorageError> {
    decode_hash(value).ok_or_else(|| StorageError::InvalidData(format!("bad {} hash: {}", what, value)))
}

fn db_error(e: rusqlite::Error) -> StorageError {
    StorageError::Database(e.to_string())
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn apply_delta(&self, delta: &StateDelta, balances: &[Balance]) -> StorageResult<()> {
        self.apply_delta_sync(delta, balances)
    }

    async fn save_balances(&self, balances: &[Balance]) -> StorageResult<()> {
        self.save_balances_sync(balances)
    }

    async fn load_snapshot(&self) -> StorageResult<Option<LedgerSnapshot>> {
        self.load_snapshot_sync()
    }

    async fn load_balances(&self) -> StorageResult<Vec<Balance>> {
        self.load_balances_sync()
    }

    async fn events(&self, after_sequence: u64, transitions: u64) -> StorageResult<Vec<StoredEvent>> {
        self.events_sync(after_sequence, transitions)
    }

    async fn sequence(&self) -> StorageResult<u64> {
        self.sequence_sync()
    }
}

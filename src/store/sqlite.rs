//! Durable ledger store on sqlite.
//!
//! Every commit runs in a single sqlite transaction, so a crash leaves either
//! the whole change or none of it. Amounts are stored as decimal text since
//! sqlite integers stop at 64 bits.

use super::traits::*;
use crate::ledger::{Proposal, Record};
use crate::registry::OwnerRegistry;
use crate::serialization::{decode_record, encode_record};
use crate::Principal;
use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Row, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS registry (
    id INTEGER PRIMARY KEY CHECK (id = 0),
    threshold INTEGER NOT NULL,
    balance TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS owners (
    position INTEGER PRIMARY KEY,
    principal TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS proposals (
    idx INTEGER PRIMARY KEY,
    target TEXT NOT NULL,
    value TEXT NOT NULL,
    payload BLOB NOT NULL,
    executed INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS confirmations (
    proposal INTEGER NOT NULL REFERENCES proposals(idx),
    owner TEXT NOT NULL,
    PRIMARY KEY (proposal, owner)
);
CREATE TABLE IF NOT EXISTS records (
    seq INTEGER PRIMARY KEY,
    body BLOB NOT NULL
);
"#;

/// Store backed by a sqlite database file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Other(format!(
                        "failed to create store directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Private in-memory database, for tests.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // One connection that never expires: each sqlite memory connection
        // is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> StoreResult<Self> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    async fn set_executed(
        tx: &mut Transaction<'_, Sqlite>,
        index: u64,
        executed: bool,
    ) -> StoreResult<()> {
        let updated = sqlx::query("UPDATE proposals SET executed = ? WHERE idx = ?")
            .bind(executed)
            .bind(to_i64(index)?)
            .execute(&mut **tx)
            .await?;
        expect_one(updated.rows_affected(), index)
    }

    async fn set_balance(tx: &mut Transaction<'_, Sqlite>, balance: u128) -> StoreResult<()> {
        sqlx::query("UPDATE registry SET balance = ? WHERE id = 0")
            .bind(balance.to_string())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

fn to_i64(value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{} exceeds i64", value)))
}

fn to_u64(value: i64) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative column value {}", value)))
}

fn parse_amount(text: &str) -> StoreResult<u128> {
    text.parse()
        .map_err(|_| StoreError::Corrupt(format!("invalid amount '{}'", text)))
}

fn parse_principal(text: &str) -> StoreResult<Principal> {
    text.parse()
        .map_err(|e| StoreError::Corrupt(format!("invalid principal '{}': {}", text, e)))
}

fn expect_one(rows: u64, index: u64) -> StoreResult<()> {
    if rows == 1 {
        Ok(())
    } else {
        Err(StoreError::Corrupt(format!("no proposal {}", index)))
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn initialize(&self, registry: &OwnerRegistry) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id FROM registry WHERE id = 0")
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(StoreError::AlreadyInitialized);
        }

        sqlx::query("INSERT INTO registry (id, threshold, balance) VALUES (0, ?, '0')")
            .bind(registry.required_confirmations() as i64)
            .execute(&mut *tx)
            .await?;

        for (position, owner) in registry.owners().iter().enumerate() {
            sqlx::query("INSERT INTO owners (position, principal) VALUES (?, ?)")
                .bind(position as i64)
                .bind(owner.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load(&self) -> StoreResult<Option<Snapshot>> {
        let Some(row) = sqlx::query("SELECT threshold, balance FROM registry WHERE id = 0")
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let threshold: i64 = row.try_get("threshold")?;
        let balance = parse_amount(&row.try_get::<String, _>("balance")?)?;

        let owners = sqlx::query("SELECT principal FROM owners ORDER BY position")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| -> StoreResult<Principal> {
                parse_principal(&row.try_get::<String, _>("principal")?)
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let threshold = usize::try_from(threshold)
            .map_err(|_| StoreError::Corrupt(format!("invalid threshold {}", threshold)))?;
        let registry = OwnerRegistry::new(owners, threshold)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let mut proposals = Vec::new();
        for row in sqlx::query(
            "SELECT idx, target, value, payload, executed FROM proposals ORDER BY idx",
        )
        .fetch_all(&self.pool)
        .await?
        {
            let mut proposal = Proposal::new(
                to_u64(row.try_get("idx")?)?,
                parse_principal(&row.try_get::<String, _>("target")?)?,
                parse_amount(&row.try_get::<String, _>("value")?)?,
                row.try_get("payload")?,
            );
            proposal.executed = row.try_get("executed")?;
            proposals.push(proposal);
        }

        for row in sqlx::query("SELECT proposal, owner FROM confirmations")
            .fetch_all(&self.pool)
            .await?
        {
            let index = to_u64(row.try_get("proposal")?)?;
            let owner = parse_principal(&row.try_get::<String, _>("owner")?)?;
            let proposal = usize::try_from(index)
                .ok()
                .and_then(|i| proposals.get_mut(i))
                .ok_or_else(|| {
                    StoreError::Corrupt(format!("confirmation for missing proposal {}", index))
                })?;
            proposal.confirmed_by.insert(owner);
        }

        let next_seq: Option<i64> = sqlx::query_scalar("SELECT MAX(seq) FROM records")
            .fetch_one(&self.pool)
            .await?;
        let next_seq = match next_seq {
            Some(last) => to_u64(last)? + 1,
            None => 0,
        };

        Ok(Some(Snapshot {
            registry,
            proposals,
            balance,
            next_seq,
        }))
    }

    async fn commit(&self, change: &Change, record: Option<&Record>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        match change {
            Change::Submitted(proposal) => {
                sqlx::query(
                    "INSERT INTO proposals (idx, target, value, payload, executed) \
                     VALUES (?, ?, ?, ?, 0)",
                )
                .bind(to_i64(proposal.index())?)
                .bind(proposal.target().to_string())
                .bind(proposal.value().to_string())
                .bind(proposal.payload())
                .execute(&mut *tx)
                .await?;
            }
            Change::Confirmed { index, owner } => {
                sqlx::query("INSERT INTO confirmations (proposal, owner) VALUES (?, ?)")
                    .bind(to_i64(*index)?)
                    .bind(owner.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
            Change::Revoked { index, owner } => {
                let removed =
                    sqlx::query("DELETE FROM confirmations WHERE proposal = ? AND owner = ?")
                        .bind(to_i64(*index)?)
                        .bind(owner.to_string())
                        .execute(&mut *tx)
                        .await?;
                if removed.rows_affected() != 1 {
                    return Err(StoreError::Corrupt(format!(
                        "no confirmation by {} on proposal {}",
                        owner, index
                    )));
                }
            }
            Change::ExecutionStarted { index, balance } => {
                Self::set_executed(&mut tx, *index, true).await?;
                Self::set_balance(&mut tx, *balance).await?;
            }
            Change::ExecutionCompleted { .. } => {}
            Change::ExecutionReverted { index, balance } => {
                Self::set_executed(&mut tx, *index, false).await?;
                Self::set_balance(&mut tx, *balance).await?;
            }
            Change::Deposited { balance } => {
                Self::set_balance(&mut tx, *balance).await?;
            }
        }

        if let Some(record) = record {
            sqlx::query("INSERT INTO records (seq, body) VALUES (?, ?)")
                .bind(to_i64(record.seq)?)
                .bind(encode_record(record)?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn records(&self, limit: Option<usize>) -> StoreResult<Vec<Record>> {
        let rows = match limit {
            Some(limit) => {
                sqlx::query(
                    "SELECT seq, body FROM (SELECT seq, body FROM records ORDER BY seq DESC LIMIT ?) \
                     ORDER BY seq",
                )
                .bind(i64::try_from(limit).unwrap_or(i64::MAX))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT seq, body FROM records ORDER BY seq")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter()
            .map(|row| -> StoreResult<Record> {
                let seq = to_u64(row.try_get("seq")?)?;
                let body: Vec<u8> = row.try_get("body")?;
                Ok(decode_record(seq, &body)?)
            })
            .collect()
    }
}

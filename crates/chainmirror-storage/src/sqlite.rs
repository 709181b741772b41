//! SQLite storage backend.
//!
//! Persists blocks, transactions and cursors to a single SQLite file using
//! `sqlx` with WAL mode. Every commit and rollback runs in one transaction.
//!
//! # Usage
//! ```rust,no_run
//! use chainmirror_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./mirror.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use chainmirror_core::{
    Block, BlockCommit, BlockRef, BlockWithTransactions, ChainId, ChainStore, Cursor, IndexerError,
    QueryStore, Transaction,
};

fn db_err(e: sqlx::Error) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

const BLOCK_COLUMNS: &str = "chain, height, hash, parent_hash, timestamp, indexed_at, tx_count";
const TX_COLUMNS: &str = "chain, hash, from_address, to_address, value, block_height, position";

fn block_from_row(row: &SqliteRow) -> Block {
    Block {
        chain: ChainId::from(row.get::<String, _>("chain")),
        height: row.get::<i64, _>("height") as u64,
        hash: row.get("hash"),
        parent_hash: row.get("parent_hash"),
        timestamp: row.get("timestamp"),
        indexed_at: row.get("indexed_at"),
        tx_count: row.get::<i64, _>("tx_count") as u32,
    }
}

fn tx_from_row(row: &SqliteRow) -> Transaction {
    Transaction {
        chain: ChainId::from(row.get::<String, _>("chain")),
        hash: row.get("hash"),
        from: row.get("from_address"),
        to: row.get("to_address"),
        value: row.get("value"),
        block_height: row.get::<i64, _>("block_height") as u64,
        position: row.get::<i64, _>("position") as u32,
    }
}

/// SQLite-backed mirror store.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./mirror.db"`) or a full
    /// SQLite URL (`"sqlite:./mirror.db"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}")
        };
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(db_err)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Each SQLite connection to `:memory:` is its own database, so the pool
    /// holds exactly one connection and never recycles it. All data is lost
    /// when the storage is dropped.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(db_err)?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and indexes if they don't already exist.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS blocks (
                chain       TEXT    NOT NULL,
                height      INTEGER NOT NULL,
                hash        TEXT    NOT NULL,
                parent_hash TEXT    NOT NULL,
                timestamp   INTEGER NOT NULL,
                indexed_at  INTEGER NOT NULL,
                tx_count    INTEGER NOT NULL,
                PRIMARY KEY (chain, height)
            )",
            "CREATE INDEX IF NOT EXISTS idx_blocks_hash ON blocks (chain, hash)",
            "CREATE TABLE IF NOT EXISTS transactions (
                chain        TEXT    NOT NULL,
                hash         TEXT    NOT NULL,
                from_address TEXT    NOT NULL,
                to_address   TEXT    NOT NULL,
                value        TEXT    NOT NULL,
                block_height INTEGER NOT NULL,
                position     INTEGER NOT NULL,
                PRIMARY KEY (chain, hash),
                FOREIGN KEY (chain, block_height)
                    REFERENCES blocks (chain, height) ON DELETE CASCADE
            )",
            "CREATE INDEX IF NOT EXISTS idx_tx_block ON transactions (chain, block_height, position)",
            "CREATE INDEX IF NOT EXISTS idx_tx_from ON transactions (chain, from_address)",
            "CREATE INDEX IF NOT EXISTS idx_tx_to ON transactions (chain, to_address)",
            "CREATE TABLE IF NOT EXISTS cursors (
                chain      TEXT    NOT NULL PRIMARY KEY,
                height     INTEGER NOT NULL,
                hash       TEXT    NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        ];
        for sql in statements {
            sqlx::query(sql).execute(&self.pool).await.map_err(db_err)?;
        }
        Ok(())
    }

    async fn block_transactions(&self, chain: &ChainId, height: u64) -> Result<Vec<Transaction>, IndexerError> {
        let rows = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM transactions
             WHERE chain = ? AND block_height = ? ORDER BY position"
        ))
        .bind(chain.as_str())
        .bind(height as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.iter().map(tx_from_row).collect())
    }

    /// Total number of stored transactions for `chain`.
    pub async fn transaction_count(&self, chain: &ChainId) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM transactions WHERE chain = ?")
            .bind(chain.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }
}

// ─── ChainStore impl ─────────────────────────────────────────────────────────

#[async_trait]
impl ChainStore for SqliteStorage {
    async fn cursor(&self, chain: &ChainId) -> Result<Option<Cursor>, IndexerError> {
        let row = sqlx::query("SELECT height, hash, updated_at FROM cursors WHERE chain = ?")
            .bind(chain.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|r| Cursor {
            chain: chain.clone(),
            height: r.get::<i64, _>("height") as u64,
            hash: r.get("hash"),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn block_hash(&self, chain: &ChainId, height: u64) -> Result<Option<String>, IndexerError> {
        let row = sqlx::query("SELECT hash FROM blocks WHERE chain = ? AND height = ?")
            .bind(chain.as_str())
            .bind(height as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|r| r.get::<String, _>("hash")))
    }

    async fn commit(&self, commit: &BlockCommit) -> Result<(), IndexerError> {
        let chain = commit.chain().as_str();
        let height = commit.height() as i64;
        let block = &commit.block;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let existing: Option<String> =
            sqlx::query("SELECT hash FROM blocks WHERE chain = ? AND height = ?")
                .bind(chain)
                .bind(height)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?
                .map(|r| r.get("hash"));
        let replaced = existing.as_deref().is_some_and(|h| h != block.hash);

        if replaced {
            // supersede the old block and everything built on it
            sqlx::query("DELETE FROM transactions WHERE chain = ? AND block_height >= ?")
                .bind(chain)
                .bind(height)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            sqlx::query("DELETE FROM blocks WHERE chain = ? AND height >= ?")
                .bind(chain)
                .bind(height)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        } else {
            sqlx::query("DELETE FROM transactions WHERE chain = ? AND block_height = ?")
                .bind(chain)
                .bind(height)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        sqlx::query(&format!(
            "INSERT INTO blocks ({BLOCK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (chain, height) DO UPDATE SET
                hash = excluded.hash,
                parent_hash = excluded.parent_hash,
                timestamp = excluded.timestamp,
                indexed_at = excluded.indexed_at,
                tx_count = excluded.tx_count"
        ))
        .bind(chain)
        .bind(height)
        .bind(&block.hash)
        .bind(&block.parent_hash)
        .bind(block.timestamp)
        .bind(block.indexed_at)
        .bind(block.tx_count as i64)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for t in &commit.transactions {
            sqlx::query(&format!(
                "INSERT INTO transactions ({TX_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (chain, hash) DO UPDATE SET
                    from_address = excluded.from_address,
                    to_address = excluded.to_address,
                    value = excluded.value,
                    block_height = excluded.block_height,
                    position = excluded.position"
            ))
            .bind(chain)
            .bind(&t.hash)
            .bind(&t.from)
            .bind(&t.to)
            .bind(&t.value)
            .bind(t.block_height as i64)
            .bind(t.position as i64)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        let cursor: Option<i64> = sqlx::query("SELECT height FROM cursors WHERE chain = ?")
            .bind(chain)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .map(|r| r.get("height"));
        if cursor.map_or(true, |c| replaced || c < height) {
            sqlx::query(
                "INSERT INTO cursors (chain, height, hash, updated_at) VALUES (?, ?, ?, ?)
                 ON CONFLICT (chain) DO UPDATE SET
                    height = excluded.height,
                    hash = excluded.hash,
                    updated_at = excluded.updated_at",
            )
            .bind(chain)
            .bind(height)
            .bind(&block.hash)
            .bind(block.indexed_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        debug!(chain, height, hash = %block.hash, replaced, "block committed");
        Ok(())
    }

    async fn rollback_to(&self, chain: &ChainId, ancestor: u64) -> Result<u64, IndexerError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("DELETE FROM transactions WHERE chain = ? AND block_height > ?")
            .bind(chain.as_str())
            .bind(ancestor as i64)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        let removed = sqlx::query("DELETE FROM blocks WHERE chain = ? AND height > ?")
            .bind(chain.as_str())
            .bind(ancestor as i64)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        let hash: String = sqlx::query("SELECT hash FROM blocks WHERE chain = ? AND height = ?")
            .bind(chain.as_str())
            .bind(ancestor as i64)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?
            .map(|r| r.get("hash"))
            .unwrap_or_default();
        let cursor = Cursor::new(chain.clone(), ancestor, hash);
        sqlx::query(
            "INSERT INTO cursors (chain, height, hash, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (chain) DO UPDATE SET
                height = excluded.height,
                hash = excluded.hash,
                updated_at = excluded.updated_at",
        )
        .bind(chain.as_str())
        .bind(ancestor as i64)
        .bind(&cursor.hash)
        .bind(cursor.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        debug!(chain = %chain, ancestor, removed, "rolled back storage");
        Ok(removed)
    }
}

// ─── QueryStore impl ─────────────────────────────────────────────────────────

#[async_trait]
impl QueryStore for SqliteStorage {
    async fn latest_blocks(&self, chain: &ChainId, limit: usize) -> Result<Vec<Block>, IndexerError> {
        let rows = sqlx::query(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks WHERE chain = ? ORDER BY height DESC LIMIT ?"
        ))
        .bind(chain.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.iter().map(block_from_row).collect())
    }

    async fn block(
        &self,
        chain: &ChainId,
        at: &BlockRef,
    ) -> Result<Option<BlockWithTransactions>, IndexerError> {
        let filter = match at {
            BlockRef::Height(_) => "height",
            BlockRef::Hash(_) => "hash",
        };
        let sql = format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE chain = ? AND {filter} = ?");
        let query = sqlx::query(&sql).bind(chain.as_str());
        let query = match at {
            BlockRef::Height(h) => query.bind(*h as i64),
            BlockRef::Hash(hash) => query.bind(hash.as_str()),
        };
        let Some(row) = query.fetch_optional(&self.pool).await.map_err(db_err)? else {
            return Ok(None);
        };
        let block = block_from_row(&row);
        let transactions = self.block_transactions(chain, block.height).await?;
        Ok(Some(BlockWithTransactions { block, transactions }))
    }

    async fn transaction(&self, chain: &ChainId, hash: &str) -> Result<Option<Transaction>, IndexerError> {
        let row = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM transactions WHERE chain = ? AND hash = ?"
        ))
        .bind(chain.as_str())
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.as_ref().map(tx_from_row))
    }

    async fn latest_transactions(
        &self,
        chain: &ChainId,
        limit: usize,
    ) -> Result<Vec<Transaction>, IndexerError> {
        let rows = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM transactions WHERE chain = ?
             ORDER BY block_height DESC, position ASC LIMIT ?"
        ))
        .bind(chain.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.iter().map(tx_from_row).collect())
    }

    async fn address_transactions(
        &self,
        chain: &ChainId,
        address: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, IndexerError> {
        if address.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM transactions
             WHERE chain = ? AND (from_address = ? OR to_address = ?)
             ORDER BY block_height DESC, position ASC LIMIT ?"
        ))
        .bind(chain.as_str())
        .bind(address)
        .bind(address)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.iter().map(tx_from_row).collect())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(height: u64, hash: &str, parent: &str, txs: &[(&str, &str)]) -> BlockCommit {
        let chain = ChainId::from("eth");
        BlockCommit {
            block: Block {
                chain: chain.clone(),
                height,
                hash: hash.into(),
                parent_hash: parent.into(),
                timestamp: 1_700_000_000 + height as i64,
                indexed_at: 1_700_000_100,
                tx_count: txs.len() as u32,
            },
            transactions: txs
                .iter()
                .enumerate()
                .map(|(i, (h, value))| Transaction {
                    chain: chain.clone(),
                    hash: h.to_string(),
                    from: "0xsender".into(),
                    to: if i == 0 { String::new() } else { "0xrecipient".into() },
                    value: value.to_string(),
                    block_height: height,
                    position: i as u32,
                })
                .collect(),
        }
    }

    fn eth() -> ChainId {
        ChainId::from("eth")
    }

    #[tokio::test]
    async fn commit_and_read_back() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store
            .commit(&commit(1, "0xa1", "0xa0", &[("t1", "123456789012345678901234"), ("t2", "7")]))
            .await
            .unwrap();

        let cursor = store.cursor(&eth()).await.unwrap().unwrap();
        assert_eq!(cursor.height, 1);
        assert_eq!(cursor.hash, "0xa1");

        let block = store.block(&eth(), &BlockRef::Height(1)).await.unwrap().unwrap();
        assert_eq!(block.block.parent_hash, "0xa0");
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[0].value, "123456789012345678901234");
        assert_eq!(block.transactions[0].to, "");

        let by_hash = store.block(&eth(), &BlockRef::Hash("0xa1".into())).await.unwrap();
        assert_eq!(by_hash.unwrap().block.height, 1);
    }

    #[tokio::test]
    async fn recommit_is_idempotent() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.commit(&commit(1, "0xa1", "0xa0", &[("t1", "1"), ("t2", "2")])).await.unwrap();
        store.commit(&commit(2, "0xa2", "0xa1", &[("t3", "3")])).await.unwrap();
        store.commit(&commit(1, "0xa1", "0xa0", &[("t1", "1"), ("t2", "2")])).await.unwrap();

        assert_eq!(store.transaction_count(&eth()).await.unwrap(), 3);
        assert_eq!(store.cursor(&eth()).await.unwrap().unwrap().height, 2);
    }

    #[tokio::test]
    async fn replacing_a_block_cascades_to_descendants() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.commit(&commit(1, "0xa1", "0xa0", &[("t1", "1")])).await.unwrap();
        store.commit(&commit(2, "0xa2", "0xa1", &[("t2", "1")])).await.unwrap();
        store.commit(&commit(3, "0xa3", "0xa2", &[("t3", "1")])).await.unwrap();

        store.commit(&commit(2, "0xb2", "0xa1", &[("u2", "1")])).await.unwrap();

        assert!(store.block_hash(&eth(), 3).await.unwrap().is_none());
        assert!(store.transaction(&eth(), "t2").await.unwrap().is_none());
        assert!(store.transaction(&eth(), "t3").await.unwrap().is_none());
        assert_eq!(store.transaction_count(&eth()).await.unwrap(), 2);
        let cursor = store.cursor(&eth()).await.unwrap().unwrap();
        assert_eq!((cursor.height, cursor.hash.as_str()), (2, "0xb2"));
    }

    #[tokio::test]
    async fn transaction_moves_to_its_new_block() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.commit(&commit(1, "0xa1", "0xa0", &[("t1", "1")])).await.unwrap();
        store.commit(&commit(2, "0xa2", "0xa1", &[("t1", "1")])).await.unwrap();

        let tx = store.transaction(&eth(), "t1").await.unwrap().unwrap();
        assert_eq!(tx.block_height, 2);
        assert_eq!(store.transaction_count(&eth()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rollback_removes_blocks_above_ancestor() {
        let store = SqliteStorage::in_memory().await.unwrap();
        for h in 10..=15u64 {
            let hash = format!("0x{h}");
            let parent = format!("0x{}", h - 1);
            let t = format!("t{h}");
            store.commit(&commit(h, &hash, &parent, &[(t.as_str(), "1")])).await.unwrap();
        }

        let removed = store.rollback_to(&eth(), 12).await.unwrap();

        assert_eq!(removed, 3);
        assert_eq!(store.transaction_count(&eth()).await.unwrap(), 3);
        let cursor = store.cursor(&eth()).await.unwrap().unwrap();
        assert_eq!((cursor.height, cursor.hash.as_str()), (12, "0x12"));

        // below the first indexed height: no hash to point at
        store.rollback_to(&eth(), 5).await.unwrap();
        let cursor = store.cursor(&eth()).await.unwrap().unwrap();
        assert_eq!((cursor.height, cursor.hash.as_str()), (5, ""));
        assert!(store.latest_blocks(&eth(), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn address_and_latest_queries() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.commit(&commit(1, "0xa1", "0xa0", &[("t1", "1"), ("t2", "2")])).await.unwrap();
        store.commit(&commit(2, "0xa2", "0xa1", &[("t3", "3"), ("t4", "4")])).await.unwrap();

        let latest = store.latest_transactions(&eth(), 3).await.unwrap();
        let hashes: Vec<_> = latest.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["t3", "t4", "t1"]);

        let to_recipient = store.address_transactions(&eth(), "0xrecipient", 10).await.unwrap();
        assert_eq!(to_recipient.len(), 2);
        assert_eq!(to_recipient[0].hash, "t4");

        assert!(store.address_transactions(&eth(), "", 10).await.unwrap().is_empty());

        let blocks = store.latest_blocks(&eth(), 1).await.unwrap();
        assert_eq!(blocks[0].hash, "0xa2");
    }

    /// Make any insert of transaction `poison` fail inside the commit's transaction.
    async fn poison(store: &SqliteStorage) {
        sqlx::query(
            "CREATE TRIGGER poison_tx BEFORE INSERT ON transactions
             WHEN NEW.hash = 'poison'
             BEGIN SELECT RAISE(ABORT, 'poisoned transaction'); END",
        )
        .execute(&store.pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn failure_mid_commit_writes_nothing() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.commit(&commit(1, "0xa1", "0xa0", &[("t1", "1")])).await.unwrap();
        poison(&store).await;

        let err = store
            .commit(&commit(2, "0xa2", "0xa1", &[("t2", "2"), ("poison", "3")]))
            .await
            .unwrap_err();

        assert!(matches!(err, IndexerError::Storage(_)));
        assert!(store.block_hash(&eth(), 2).await.unwrap().is_none());
        assert!(store.transaction(&eth(), "t2").await.unwrap().is_none());
        assert_eq!(store.cursor(&eth()).await.unwrap().unwrap().height, 1);
        assert_eq!(store.transaction_count(&eth()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_replacement_keeps_the_old_block() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.commit(&commit(1, "0xa1", "0xa0", &[("t1", "1")])).await.unwrap();
        store.commit(&commit(2, "0xa2", "0xa1", &[("t2", "2")])).await.unwrap();
        poison(&store).await;

        let err = store
            .commit(&commit(1, "0xb1", "0xa0", &[("u1", "1"), ("poison", "2")]))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(store.block_hash(&eth(), 1).await.unwrap().as_deref(), Some("0xa1"));
        assert_eq!(store.block_hash(&eth(), 2).await.unwrap().as_deref(), Some("0xa2"));
        assert!(store.transaction(&eth(), "t1").await.unwrap().is_some());
        assert!(store.transaction(&eth(), "u1").await.unwrap().is_none());
        assert_eq!(store.cursor(&eth()).await.unwrap().unwrap().hash, "0xa2");

        // the connection is usable again once the failed transaction is gone
        store.commit(&commit(3, "0xa3", "0xa2", &[("t3", "3")])).await.unwrap();
        assert_eq!(store.cursor(&eth()).await.unwrap().unwrap().height, 3);
    }

    #[tokio::test]
    async fn chains_are_isolated() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.commit(&commit(1, "0xa1", "0xa0", &[("t1", "1")])).await.unwrap();

        let btc = ChainId::from("btc");
        assert!(store.cursor(&btc).await.unwrap().is_none());
        assert!(store.block(&btc, &BlockRef::Height(1)).await.unwrap().is_none());
        assert!(store.transaction(&btc, "t1").await.unwrap().is_none());
    }
}

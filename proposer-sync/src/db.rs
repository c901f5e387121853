//! Persistent outer block index, backed by SQLite.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use parking_lot::Mutex;
use rusqlite::{
    Connection, OptionalExtension, ToSql, params,
    types::{FromSql, ToSqlOutput},
};
use tracing::{debug, trace};

use crate::{block::BlockWriter, crypto::Hash, fork::BlockIndex};

const DB_FILE: &str = "outer_blocks.sqlite3";

const FORK_HEIGHT_KEY: &str = "fork_height";
const LAST_ACCEPTED_KEY: &str = "last_accepted";

impl ToSql for Hash {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.to_vec()))
    }
}

impl FromSql for Hash {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        Ok(Hash(<[u8; 32]>::column_result(value)?))
    }
}

// SQLite integers are signed. Heights above `i64::MAX` cannot be stored, which is far beyond any real chain.
fn sql_height(height: u64) -> Result<i64> {
    i64::try_from(height).map_err(|_| anyhow!("height {height} is too large to store"))
}

fn from_sql_height(height: i64) -> Result<u64> {
    u64::try_from(height).map_err(|_| anyhow!("stored height {height} is negative"))
}

#[derive(Debug)]
pub struct Db {
    conn: Mutex<Connection>,
    path: Option<Box<Path>>,
}

impl Db {
    /// Opens the index in `data_dir`, creating it if needed. With no `data_dir`, the index lives in memory and is lost
    /// when dropped.
    pub fn new<P>(data_dir: Option<P>) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let (conn, path) = match data_dir {
            Some(dir) => {
                let dir = dir.as_ref();
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create data directory {}", dir.display()))?;
                let path = dir.join(DB_FILE);
                let conn = Connection::open(&path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                (conn, Some(path.into_boxed_path()))
            }
            None => (Connection::open_in_memory()?, None),
        };

        conn.trace_v2(
            rusqlite::trace::TraceEventCodes::SQLITE_TRACE_STMT,
            Some(|statement| {
                if let rusqlite::trace::TraceEvent::Stmt(_, statement) = statement {
                    trace!(statement, "sql executed");
                }
            }),
        );

        Self::ensure_schema(&conn)?;
        debug!(path = ?path, "opened outer block index");

        Ok(Db {
            conn: Mutex::new(conn),
            path,
        })
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS blocks (
                id BLOB NOT NULL PRIMARY KEY,
                height INTEGER NOT NULL,
                bytes BLOB NOT NULL) WITHOUT ROWID;
            CREATE TABLE IF NOT EXISTS height_index (
                height INTEGER NOT NULL PRIMARY KEY,
                id BLOB NOT NULL REFERENCES blocks (id));
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT NOT NULL PRIMARY KEY,
                value BLOB NOT NULL) WITHOUT ROWID;
            COMMIT;",
        )?;
        Ok(())
    }

    /// The file backing this index, or `None` if it is in memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.path.as_deref().map(Path::to_path_buf)
    }

    pub fn last_accepted(&self) -> Result<Option<Hash>> {
        self.get_metadata(LAST_ACCEPTED_KEY)?
            .map(Hash::from_bytes)
            .transpose()
    }

    /// Returns the height and bytes of a stored post-fork block.
    pub fn block_by_id(&self, id: &Hash) -> Result<Option<(u64, Vec<u8>)>> {
        let row: Option<(i64, Vec<u8>)> = self
            .conn
            .lock()
            .prepare_cached("SELECT height, bytes FROM blocks WHERE id = ?1")?
            .query_row([id], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;
        row.map(|(height, bytes)| Ok((from_sql_height(height)?, bytes)))
            .transpose()
    }

    fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .conn
            .lock()
            .prepare_cached("SELECT value FROM metadata WHERE key = ?1")?
            .query_row([key], |row| row.get(0))
            .optional()?)
    }

    fn set_metadata(&self, key: &str, value: &[u8]) -> Result<()> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl BlockIndex for Db {
    fn block_id_at_height(&self, height: u64) -> Result<Option<Hash>> {
        // Nothing can be stored above `i64::MAX`, so nothing is indexed there.
        let Ok(height) = i64::try_from(height) else {
            return Ok(None);
        };
        Ok(self
            .conn
            .lock()
            .prepare_cached("SELECT id FROM height_index WHERE height = ?1")?
            .query_row([height], |row| row.get(0))
            .optional()?)
    }

    fn fork_height(&self) -> Result<Option<u64>> {
        self.get_metadata(FORK_HEIGHT_KEY)?
            .map(|bytes| {
                let bytes: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| anyhow!("stored fork height has {} bytes", bytes.len()))?;
                Ok(u64::from_be_bytes(bytes))
            })
            .transpose()
    }
}

impl BlockWriter for Db {
    fn put_block(&self, id: Hash, height: u64, bytes: &[u8]) -> Result<()> {
        let height = sql_height(height)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO blocks (id, height, bytes) VALUES (?1, ?2, ?3)",
            params![id, height, bytes],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO height_index (height, id) VALUES (?1, ?2)",
            params![height, id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn set_last_accepted(&self, id: Hash) -> Result<()> {
        self.set_metadata(LAST_ACCEPTED_KEY, id.as_bytes())
    }

    fn set_fork_height(&self, height: u64) -> Result<()> {
        self.set_metadata(FORK_HEIGHT_KEY, &height.to_be_bytes())
    }
}

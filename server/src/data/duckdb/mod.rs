//! DuckDB analytics store
//!
//! One database file, one dedicated writer connection, and a bounded pool
//! of reader connections cloned from it. A readers-share/writers-exclude
//! gate coordinates the two sides: reads hold the gate shared for the
//! duration of a query, writes hold it exclusively for the duration of one
//! transaction. All queries run on the blocking thread pool.

pub mod error;
mod migrations;
pub mod repositories;
pub mod schema;
pub mod sql_types;

pub use error::StoreError;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use duckdb::Connection;
use parking_lot::Mutex;
use tokio::sync::{RwLock, Semaphore, oneshot, watch};
use tokio::task::JoinHandle;

use crate::core::constants::{
    DUCKDB_CHECKPOINT_INTERVAL_SECS, DUCKDB_QUERY_TIMEOUT_SECS, DUCKDB_READ_POOL_SIZE,
};

struct ReaderPool {
    conns: Mutex<Vec<Connection>>,
    slots: Arc<Semaphore>,
}

pub struct Store {
    gate: Arc<RwLock<()>>,
    writer: Arc<Mutex<Option<Connection>>>,
    readers: Arc<ReaderPool>,
}

impl Store {
    /// Open (or create) the database file and prepare the connection set
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let path = path.to_path_buf();
        let (writer, readers) = tokio::task::spawn_blocking(move || {
            let writer = Connection::open(&path)?;
            Self::configure(&writer)?;
            migrations::run_migrations(&writer)?;
            let readers = Self::clone_readers(&writer)?;
            Ok::<_, StoreError>((writer, readers))
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;

        tracing::debug!(pool = readers.len(), "Store opened");
        Ok(Self::assemble(writer, readers))
    }

    /// Open an in-memory database (tests)
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let (writer, readers) = tokio::task::spawn_blocking(|| {
            let writer = Connection::open_in_memory()?;
            Self::configure(&writer)?;
            migrations::run_migrations(&writer)?;
            let readers = Self::clone_readers(&writer)?;
            Ok::<_, StoreError>((writer, readers))
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;

        Ok(Self::assemble(writer, readers))
    }

    fn configure(conn: &Connection) -> Result<(), duckdb::Error> {
        conn.execute_batch(
            "SET autoinstall_known_extensions = false;
             SET autoload_known_extensions = false;
             LOAD json;",
        )
    }

    fn clone_readers(writer: &Connection) -> Result<Vec<Connection>, duckdb::Error> {
        (0..DUCKDB_READ_POOL_SIZE)
            .map(|_| writer.try_clone())
            .collect()
    }

    fn assemble(writer: Connection, readers: Vec<Connection>) -> Self {
        let slots = Arc::new(Semaphore::new(readers.len()));
        Self {
            gate: Arc::new(RwLock::new(())),
            writer: Arc::new(Mutex::new(Some(writer))),
            readers: Arc::new(ReaderPool {
                conns: Mutex::new(readers),
                slots,
            }),
        }
    }

    /// Run a read query on a pooled reader connection.
    ///
    /// Holds the gate shared for the duration of the query, so writers are
    /// excluded but other readers proceed concurrently.
    pub async fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let shared = Arc::clone(&self.gate).read_owned().await;
        let permit = Arc::clone(&self.readers.slots)
            .acquire_owned()
            .await
            .map_err(|_| StoreError::Closed)?;
        let conn = match self.readers.conns.lock().pop() {
            Some(conn) => conn,
            None => return Err(StoreError::Closed),
        };

        let pool = Arc::clone(&self.readers);
        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let result = f(&conn);
            pool.conns.lock().push(conn);
            drop(permit);
            drop(shared);
            let _ = tx.send(result);
        });

        Self::await_result(rx).await
    }

    /// Run a write inside one transaction on the dedicated writer
    /// connection. Holds the gate exclusively: no reader observes a
    /// partially committed batch.
    pub async fn write<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let exclusive = Arc::clone(&self.gate).write_owned().await;
        let writer = Arc::clone(&self.writer);
        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            let guard = writer.lock();
            let result = match guard.as_ref() {
                Some(conn) => in_transaction(conn, f),
                None => Err(StoreError::Closed),
            };
            drop(guard);
            drop(exclusive);
            let _ = tx.send(result);
        });

        Self::await_result(rx).await
    }

    async fn await_result<T>(rx: oneshot::Receiver<Result<T, StoreError>>) -> Result<T, StoreError> {
        let timeout = Duration::from_secs(DUCKDB_QUERY_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(StoreError::Io(std::io::Error::other(
                "query task dropped without a result",
            ))),
            Err(_) => {
                tracing::warn!("Query timed out after {}s", DUCKDB_QUERY_TIMEOUT_SECS);
                Err(StoreError::Timeout {
                    timeout_secs: DUCKDB_QUERY_TIMEOUT_SECS,
                })
            }
        }
    }

    /// Flush the WAL to the main database file. No-op after close.
    pub async fn checkpoint(&self) -> Result<(), StoreError> {
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || {
            let guard = writer.lock();
            if let Some(ref conn) = *guard {
                conn.execute("CHECKPOINT", [])?;
                tracing::debug!("Checkpoint completed");
            }
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }

    /// Close all connections gracefully
    pub async fn close(&self) -> Result<(), StoreError> {
        let _exclusive = Arc::clone(&self.gate).write_owned().await;
        self.readers.slots.close();
        let writer = Arc::clone(&self.writer);
        let readers = Arc::clone(&self.readers);
        tokio::task::spawn_blocking(move || {
            for conn in readers.conns.lock().drain(..) {
                if let Err((_, e)) = conn.close() {
                    tracing::warn!("Reader connection close failed: {}", e);
                }
            }
            let mut guard = writer.lock();
            if let Some(conn) = guard.take() {
                // Best-effort checkpoint before close
                if let Err(e) = conn.execute("CHECKPOINT", []) {
                    tracing::warn!("CHECKPOINT failed during close: {}", e);
                }
                conn.close().map_err(|(_, e)| StoreError::Database(e))?;
                tracing::debug!("Store closed");
            }
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }

    pub fn start_checkpoint_task(
        self: &Arc<Self>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(DUCKDB_CHECKPOINT_INTERVAL_SECS));
            interval.tick().await; // skip the immediate first tick
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("Checkpoint task shutting down");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(e) = store.checkpoint().await {
                            tracing::warn!("Checkpoint failed: {}", e);
                        }
                    }
                }
            }
        })
    }
}

/// Execute a function within a transaction, rolling back on error.
pub(crate) fn in_transaction<F, T>(conn: &Connection, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&Connection) -> Result<T, StoreError>,
{
    conn.execute_batch("BEGIN TRANSACTION")?;
    match f(conn) {
        Ok(val) => {
            conn.execute_batch("COMMIT")?;
            Ok(val)
        }
        Err(e) => {
            if let Err(rollback_err) = conn.execute_batch("ROLLBACK") {
                tracing::warn!("ROLLBACK failed after transaction error: {}", rollback_err);
            }
            Err(e)
        }
    }
}

//! Async, time-bounded access to call records for the webhook path.

use async_trait::async_trait;
use nexcall_calls::{CallParties, CallsError};
use nexcall_db::DbPool;
use nexcall_types::{CallDirection, CallStatus, Role};
use rusqlite::Connection;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error(transparent)]
    Calls(#[from] CallsError),

    #[error("database operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The writes a live call needs. Each one is safe to repeat with the same
/// arguments.
#[async_trait]
pub trait CallRecordStore: Send + Sync {
    async fn upsert_call_status(
        &self,
        call_sid: &str,
        status: CallStatus,
        direction: CallDirection,
        parties: CallParties,
    ) -> Result<(), PersistenceError>;

    /// Returns `false` when `entry_id` was already stored.
    async fn append_transcript_entry(
        &self,
        entry_id: &str,
        call_sid: &str,
        role: Role,
        content: &str,
    ) -> Result<bool, PersistenceError>;

    async fn set_final_transcript(
        &self,
        call_sid: &str,
        transcript: &str,
    ) -> Result<(), PersistenceError>;
}

/// [`CallRecordStore`] over the SQLite pool.
#[derive(Clone)]
pub struct SqliteCallStore {
    pool: DbPool,
    op_timeout: Duration,
}

impl SqliteCallStore {
    pub fn new(pool: DbPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    /// Runs `op` on a pooled connection off the async runtime.
    ///
    /// The timeout covers pool checkout and the query. A timed-out write may
    /// still land later; every write here is idempotent.
    async fn run<T, F>(&self, op: F) -> Result<T, PersistenceError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, CallsError> + Send + 'static,
    {
        let pool = self.pool.clone();
        let task = tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            op(&conn).map_err(PersistenceError::from)
        });

        match tokio::time::timeout(self.op_timeout, task).await {
            Ok(joined) => joined?,
            Err(_) => Err(PersistenceError::Timeout(self.op_timeout)),
        }
    }
}

#[async_trait]
impl CallRecordStore for SqliteCallStore {
    async fn upsert_call_status(
        &self,
        call_sid: &str,
        status: CallStatus,
        direction: CallDirection,
        parties: CallParties,
    ) -> Result<(), PersistenceError> {
        let call_sid = call_sid.to_string();
        self.run(move |conn| {
            nexcall_calls::upsert_call_status(conn, &call_sid, status, direction, &parties)
        })
        .await
    }

    async fn append_transcript_entry(
        &self,
        entry_id: &str,
        call_sid: &str,
        role: Role,
        content: &str,
    ) -> Result<bool, PersistenceError> {
        let entry_id = entry_id.to_string();
        let call_sid = call_sid.to_string();
        let content = content.to_string();
        self.run(move |conn| {
            nexcall_calls::append_transcript_entry(conn, &entry_id, &call_sid, role, &content)
        })
        .await
    }

    async fn set_final_transcript(
        &self,
        call_sid: &str,
        transcript: &str,
    ) -> Result<(), PersistenceError> {
        let call_sid = call_sid.to_string();
        let transcript = transcript.to_string();
        self.run(move |conn| nexcall_calls::set_final_transcript(conn, &call_sid, &transcript))
            .await
    }
}

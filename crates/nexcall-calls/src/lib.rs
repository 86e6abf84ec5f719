//! Call records and per-turn transcripts for nexcall.
//!
//! Synchronous `rusqlite` queries over the `calls` and `call_conversations`
//! tables. Callers own the connection, usually checked out of the
//! `nexcall-db` pool inside `spawn_blocking`.
//!
//! The webhook path only ever uses the three idempotent writes
//! ([`upsert_call_status`], [`append_transcript_entry`],
//! [`set_final_transcript`]); the rest backs the administrative API.

mod error;
mod record;
mod store;

pub use error::CallsError;
pub use record::{CallParties, CallRecord, CallStats, NewCall, TranscriptEntry, UpdateCallParams};
pub use store::{
    append_transcript_entry, call_stats, get_call, get_call_by_sid, insert_call, list_calls,
    list_transcript_entries, set_final_transcript, update_call, upsert_call_status,
};

#[cfg(test)]
mod tests;

//! Queries over `calls` and `call_conversations`.

use nexcall_types::{CallDirection, CallStatus, Role};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::CallsError;
use crate::record::{CallParties, CallRecord, CallStats, NewCall, TranscriptEntry, UpdateCallParams};

const CALL_COLUMNS: &str = "id, twilio_sid, to_number, from_number, status, direction, duration,
     recording_url, transcript, agent_id, created_at, updated_at";

/// Records the latest provider status for a call, creating the row if needed.
///
/// Addresses are only filled in when the stored value is still unknown, and a
/// call that already reached a terminal status keeps it: providers may
/// deliver status callbacks out of order. Calling this twice with the same
/// arguments leaves the row unchanged apart from `updated_at`.
pub fn upsert_call_status(
    conn: &Connection,
    call_sid: &str,
    status: CallStatus,
    direction: CallDirection,
    parties: &CallParties,
) -> Result<(), CallsError> {
    conn.execute(
        "INSERT INTO calls (id, twilio_sid, to_number, from_number, status, direction)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (twilio_sid) DO UPDATE SET
            status = CASE
                WHEN calls.status IN ('completed', 'busy', 'failed', 'no-answer', 'canceled')
                    THEN calls.status
                ELSE excluded.status
            END,
            to_number = COALESCE(calls.to_number, excluded.to_number),
            from_number = COALESCE(calls.from_number, excluded.from_number),
            updated_at = datetime('now')",
        params![
            Uuid::new_v4().to_string(),
            call_sid,
            parties.to,
            parties.from,
            status.as_str(),
            direction.as_str(),
        ],
    )?;
    Ok(())
}

/// Appends one conversation turn to a call's transcript.
///
/// `entry_id` is chosen by the caller; replaying the same entry is a no-op.
/// Returns `true` when a new row was written.
pub fn append_transcript_entry(
    conn: &Connection,
    entry_id: &str,
    call_sid: &str,
    role: Role,
    content: &str,
) -> Result<bool, CallsError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO call_conversations (id, call_sid, role, content)
         VALUES (?1, ?2, ?3, ?4)",
        params![entry_id, call_sid, role.as_str(), content],
    )?;
    Ok(inserted > 0)
}

/// Stores the end-of-call summary on the call record.
pub fn set_final_transcript(
    conn: &Connection,
    call_sid: &str,
    transcript: &str,
) -> Result<(), CallsError> {
    let updated = conn.execute(
        "UPDATE calls SET transcript = ?1, updated_at = datetime('now') WHERE twilio_sid = ?2",
        params![transcript, call_sid],
    )?;
    if updated == 0 {
        return Err(CallsError::NotFound(call_sid.to_string()));
    }
    Ok(())
}

/// Stores a call placed through the provider API and returns the row.
///
/// A status callback can reach the webhook before this runs. In that case
/// the existing row keeps its status and gets the addresses and direction
/// reported by the provider.
pub fn insert_call(conn: &Connection, call: &NewCall) -> Result<CallRecord, CallsError> {
    conn.execute(
        "INSERT INTO calls (id, twilio_sid, to_number, from_number, status, direction)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (twilio_sid) DO UPDATE SET
            to_number = excluded.to_number,
            from_number = excluded.from_number,
            direction = excluded.direction,
            updated_at = datetime('now')",
        params![
            Uuid::new_v4().to_string(),
            call.twilio_sid,
            call.to,
            call.from,
            call.status.as_str(),
            call.direction.as_str(),
        ],
    )?;
    get_call_by_sid(conn, &call.twilio_sid)
}

/// Retrieves a call by its internal identifier.
pub fn get_call(conn: &Connection, id: &str) -> Result<CallRecord, CallsError> {
    conn.query_row(
        &format!("SELECT {CALL_COLUMNS} FROM calls WHERE id = ?1"),
        [id],
        map_row_to_call,
    )
    .optional()?
    .ok_or_else(|| CallsError::NotFound(id.to_string()))?
}

/// Retrieves a call by its provider identifier.
pub fn get_call_by_sid(conn: &Connection, call_sid: &str) -> Result<CallRecord, CallsError> {
    conn.query_row(
        &format!("SELECT {CALL_COLUMNS} FROM calls WHERE twilio_sid = ?1"),
        [call_sid],
        map_row_to_call,
    )
    .optional()?
    .ok_or_else(|| CallsError::NotFound(call_sid.to_string()))?
}

/// Lists calls newest first. `page` is 1-based.
pub fn list_calls(conn: &Connection, page: u32, limit: u32) -> Result<Vec<CallRecord>, CallsError> {
    let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
    let mut stmt = conn.prepare(&format!(
        "SELECT {CALL_COLUMNS} FROM calls ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2"
    ))?;

    let rows = stmt.query_map(params![limit, offset], map_row_to_call)?;
    let mut calls = Vec::new();
    for row in rows {
        calls.push(row??);
    }
    Ok(calls)
}

/// Applies an administrative update and returns the updated row.
///
/// `None` fields keep their stored value.
pub fn update_call(
    conn: &Connection,
    call_sid: &str,
    updates: &UpdateCallParams,
) -> Result<CallRecord, CallsError> {
    let updated = conn.execute(
        "UPDATE calls SET
            status = COALESCE(?1, status),
            transcript = COALESCE(?2, transcript),
            updated_at = datetime('now')
         WHERE twilio_sid = ?3",
        params![
            updates.status.map(CallStatus::as_str),
            updates.transcript,
            call_sid
        ],
    )?;
    if updated == 0 {
        return Err(CallsError::NotFound(call_sid.to_string()));
    }
    get_call_by_sid(conn, call_sid)
}

/// Lists a call's transcript entries in the order they were recorded.
pub fn list_transcript_entries(
    conn: &Connection,
    call_sid: &str,
) -> Result<Vec<TranscriptEntry>, CallsError> {
    let mut stmt = conn.prepare(
        "SELECT id, call_sid, role, content, timestamp
         FROM call_conversations WHERE call_sid = ?1 ORDER BY rowid ASC",
    )?;

    let rows = stmt.query_map([call_sid], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, call_sid, role, content, timestamp) = row?;
        entries.push(TranscriptEntry {
            id,
            call_sid,
            role: role.parse()?,
            content,
            timestamp,
        });
    }
    Ok(entries)
}

/// Computes the dashboard figures over every stored call.
pub fn call_stats(conn: &Connection) -> Result<CallStats, CallsError> {
    let stats = conn.query_row(
        "SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN date(created_at) = date('now') THEN 1 ELSE 0 END), 0),
            AVG(duration),
            SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END),
            SUM(CASE WHEN status IN ('completed', 'busy', 'failed', 'no-answer', 'canceled')
                THEN 1 ELSE 0 END)
         FROM calls",
        [],
        |row| {
            let completed: Option<i64> = row.get(3)?;
            let terminal: Option<i64> = row.get(4)?;
            let success_rate = match (completed, terminal) {
                (Some(done), Some(total)) if total > 0 => {
                    Some(done as f64 * 100.0 / total as f64)
                }
                _ => None,
            };
            Ok(CallStats {
                total_calls: row.get(0)?,
                calls_today: row.get(1)?,
                average_duration_secs: row.get(2)?,
                success_rate,
            })
        },
    )?;
    Ok(stats)
}

fn map_row_to_call(row: &Row) -> rusqlite::Result<Result<CallRecord, CallsError>> {
    let status: String = row.get(4)?;
    let direction: String = row.get(5)?;

    let build = || -> Result<CallRecord, CallsError> {
        Ok(CallRecord {
            id: row.get(0)?,
            twilio_sid: row.get(1)?,
            to: row.get(2)?,
            from: row.get(3)?,
            status: status.parse()?,
            direction: direction.parse()?,
            duration: row.get(6)?,
            recording_url: row.get(7)?,
            transcript: row.get(8)?,
            agent_id: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    };
    Ok(build())
}

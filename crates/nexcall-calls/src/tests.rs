//! Unit tests for call record persistence.

use nexcall_types::{CallDirection, CallStatus, Role};
use rusqlite::Connection;

use crate::error::CallsError;
use crate::record::{CallParties, NewCall, UpdateCallParams};
use crate::store::*;

/// Creates an in-memory SQLite database with migrations applied and
/// foreign keys enforced, matching pooled connections.
fn test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("should open in-memory db");
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .expect("should enable foreign keys");
    nexcall_db::run_migrations(&conn).expect("migrations should succeed");
    conn
}

fn parties(from: &str, to: &str) -> CallParties {
    CallParties {
        from: Some(from.to_string()),
        to: Some(to.to_string()),
    }
}

fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .expect("count query")
}

// ── upsert_call_status ──────────────────────────────────────────────

#[test]
fn upsert_creates_then_updates_call() {
    let conn = test_db();

    upsert_call_status(
        &conn,
        "CA1",
        CallStatus::Ringing,
        CallDirection::Inbound,
        &parties("+33100000001", "+33100000002"),
    )
    .expect("first upsert");
    upsert_call_status(
        &conn,
        "CA1",
        CallStatus::InProgress,
        CallDirection::Inbound,
        &CallParties::default(),
    )
    .expect("second upsert");

    let call = get_call_by_sid(&conn, "CA1").expect("call exists");
    assert_eq!(call.status, CallStatus::InProgress);
    assert_eq!(call.direction, CallDirection::Inbound);
    assert_eq!(call.from.as_deref(), Some("+33100000001"));
    assert_eq!(call.to.as_deref(), Some("+33100000002"));
    assert_eq!(row_count(&conn, "calls"), 1);
}

#[test]
fn upsert_is_idempotent() {
    let conn = test_db();
    for _ in 0..2 {
        upsert_call_status(
            &conn,
            "CA2",
            CallStatus::InProgress,
            CallDirection::Inbound,
            &parties("a", "b"),
        )
        .expect("upsert");
    }
    assert_eq!(row_count(&conn, "calls"), 1);
    assert_eq!(
        get_call_by_sid(&conn, "CA2").unwrap().status,
        CallStatus::InProgress
    );
}

#[test]
fn upsert_never_leaves_terminal_status() {
    let conn = test_db();
    let none = CallParties::default();
    upsert_call_status(&conn, "CA3", CallStatus::Completed, CallDirection::Inbound, &none).unwrap();
    upsert_call_status(&conn, "CA3", CallStatus::InProgress, CallDirection::Inbound, &none).unwrap();

    assert_eq!(
        get_call_by_sid(&conn, "CA3").unwrap().status,
        CallStatus::Completed
    );
}

#[test]
fn upsert_keeps_known_addresses() {
    let conn = test_db();
    upsert_call_status(
        &conn,
        "CA4",
        CallStatus::InProgress,
        CallDirection::Inbound,
        &parties("first", "dest"),
    )
    .unwrap();
    upsert_call_status(
        &conn,
        "CA4",
        CallStatus::Completed,
        CallDirection::Inbound,
        &parties("second", "other"),
    )
    .unwrap();

    let call = get_call_by_sid(&conn, "CA4").unwrap();
    assert_eq!(call.from.as_deref(), Some("first"));
    assert_eq!(call.to.as_deref(), Some("dest"));
}

// ── transcript entries ──────────────────────────────────────────────

#[test]
fn append_transcript_entry_replay_is_noop() {
    let conn = test_db();
    upsert_call_status(
        &conn,
        "CA5",
        CallStatus::InProgress,
        CallDirection::Inbound,
        &CallParties::default(),
    )
    .unwrap();

    assert!(append_transcript_entry(&conn, "e1", "CA5", Role::Assistant, "Bonjour").unwrap());
    assert!(!append_transcript_entry(&conn, "e1", "CA5", Role::Assistant, "Bonjour").unwrap());
    assert!(append_transcript_entry(&conn, "e2", "CA5", Role::User, "Je veux des infos").unwrap());

    let entries = list_transcript_entries(&conn, "CA5").unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].role, Role::Assistant);
    assert_eq!(entries[0].content, "Bonjour");
    assert_eq!(entries[1].role, Role::User);
    assert_eq!(entries[1].call_sid, "CA5");
}

#[test]
fn append_transcript_entry_requires_call() {
    let conn = test_db();
    let err = append_transcript_entry(&conn, "e1", "missing", Role::User, "hello")
        .expect_err("foreign key should reject unknown call");
    assert!(matches!(err, CallsError::Database(_)));
}

#[test]
fn set_final_transcript_overwrites_and_reports_missing() {
    let conn = test_db();
    upsert_call_status(
        &conn,
        "CA6",
        CallStatus::Completed,
        CallDirection::Inbound,
        &CallParties::default(),
    )
    .unwrap();

    set_final_transcript(&conn, "CA6", "Résumé").unwrap();
    set_final_transcript(&conn, "CA6", "Résumé").unwrap();
    assert_eq!(
        get_call_by_sid(&conn, "CA6").unwrap().transcript.as_deref(),
        Some("Résumé")
    );

    let err = set_final_transcript(&conn, "nope", "x").unwrap_err();
    assert!(matches!(err, CallsError::NotFound(sid) if sid == "nope"));
}

// ── administrative CRUD ─────────────────────────────────────────────

fn new_call(sid: &str) -> NewCall {
    NewCall {
        twilio_sid: sid.to_string(),
        to: "+33600000000".to_string(),
        from: "+33100000000".to_string(),
        status: CallStatus::Queued,
        direction: CallDirection::Outbound,
    }
}

#[test]
fn insert_and_get_call() {
    let conn = test_db();
    let created = insert_call(&conn, &new_call("CA7")).expect("insert");

    assert_eq!(created.twilio_sid, "CA7");
    assert_eq!(created.status, CallStatus::Queued);
    assert_eq!(created.direction, CallDirection::Outbound);
    assert!(created.transcript.is_none());

    let fetched = get_call(&conn, &created.id).unwrap();
    assert_eq!(fetched, created);

    assert!(matches!(
        get_call(&conn, "unknown"),
        Err(CallsError::NotFound(_))
    ));
}

#[test]
fn insert_call_after_status_callback_keeps_status() {
    let conn = test_db();
    upsert_call_status(
        &conn,
        "CA9",
        CallStatus::Ringing,
        CallDirection::Inbound,
        &CallParties::default(),
    )
    .unwrap();

    let stored = insert_call(&conn, &new_call("CA9")).unwrap();
    assert_eq!(stored.status, CallStatus::Ringing);
    assert_eq!(stored.direction, CallDirection::Outbound);
    assert_eq!(stored.to.as_deref(), Some("+33600000000"));

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM calls WHERE twilio_sid = 'CA9'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn list_calls_pages_newest_first() {
    let conn = test_db();
    for i in 0..5 {
        insert_call(&conn, &new_call(&format!("CA{i}"))).unwrap();
    }

    let first = list_calls(&conn, 1, 2).unwrap();
    let sids: Vec<_> = first.iter().map(|c| c.twilio_sid.as_str()).collect();
    assert_eq!(sids, ["CA4", "CA3"]);

    let third = list_calls(&conn, 3, 2).unwrap();
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].twilio_sid, "CA0");

    assert!(list_calls(&conn, 4, 2).unwrap().is_empty());
}

#[test]
fn update_call_keeps_unset_fields() {
    let conn = test_db();
    insert_call(&conn, &new_call("CA8")).unwrap();

    let updated = update_call(
        &conn,
        "CA8",
        &UpdateCallParams {
            status: Some(CallStatus::Completed),
            transcript: None,
        },
    )
    .unwrap();
    assert_eq!(updated.status, CallStatus::Completed);
    assert!(updated.transcript.is_none());

    let updated = update_call(
        &conn,
        "CA8",
        &UpdateCallParams {
            status: None,
            transcript: Some("notes".to_string()),
        },
    )
    .unwrap();
    assert_eq!(updated.status, CallStatus::Completed);
    assert_eq!(updated.transcript.as_deref(), Some("notes"));

    assert!(matches!(
        update_call(&conn, "missing", &UpdateCallParams::default()),
        Err(CallsError::NotFound(_))
    ));
}

#[test]
fn call_stats_over_mixed_calls() {
    let conn = test_db();
    assert_eq!(call_stats(&conn).unwrap().total_calls, 0);
    assert_eq!(call_stats(&conn).unwrap().success_rate, None);

    let none = CallParties::default();
    upsert_call_status(&conn, "A", CallStatus::Completed, CallDirection::Inbound, &none).unwrap();
    upsert_call_status(&conn, "B", CallStatus::Completed, CallDirection::Inbound, &none).unwrap();
    upsert_call_status(&conn, "C", CallStatus::Busy, CallDirection::Inbound, &none).unwrap();
    upsert_call_status(&conn, "D", CallStatus::InProgress, CallDirection::Inbound, &none).unwrap();
    conn.execute("UPDATE calls SET duration = 60 WHERE twilio_sid = 'A'", [])
        .unwrap();
    conn.execute("UPDATE calls SET duration = 120 WHERE twilio_sid = 'B'", [])
        .unwrap();

    let stats = call_stats(&conn).unwrap();
    assert_eq!(stats.total_calls, 4);
    assert_eq!(stats.calls_today, 4);
    assert_eq!(stats.average_duration_secs, Some(90.0));
    let rate = stats.success_rate.expect("terminal calls exist");
    assert!((rate - 200.0 / 3.0).abs() < 1e-9);
}

#[test]
fn call_record_serializes_camel_case() {
    let conn = test_db();
    let created = insert_call(&conn, &new_call("CA9")).unwrap();
    let json = serde_json::to_value(&created).unwrap();
    assert_eq!(json["twilioSid"], "CA9");
    assert_eq!(json["status"], "queued");
    assert_eq!(json["direction"], "outbound");
    assert!(json.get("createdAt").is_some());
}

//! Administrative call API: list, inspect, place, update and control calls.

use crate::api::{with_conn, ApiError};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use nexcall_calls::{CallRecord, CallStats, NewCall, TranscriptEntry, UpdateCallParams};
use nexcall_telephony::{ProviderCall, ProviderRecording, TelephonyError};
use nexcall_types::{CallDirection, CallStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

/// Query parameters for `GET /api/calls`.
#[derive(Debug, Default, Deserialize)]
pub struct CallsQuery {
    /// Internal call id. When present the other parameters are ignored.
    pub id: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// A stored call, plus live provider data when it could be fetched.
#[derive(Debug, Serialize)]
pub struct CallDetails {
    #[serde(flatten)]
    pub call: CallRecord,
    #[serde(rename = "twilioDetails", skip_serializing_if = "Option::is_none")]
    pub twilio_details: Option<ProviderCall>,
}

/// Request body for `POST /api/calls`.
#[derive(Debug, Deserialize)]
pub struct CreateCallRequest {
    pub to: Option<String>,
    /// Defaults to the configured caller id.
    pub from: Option<String>,
    /// Defaults to this server's webhook URL.
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

/// Request body for `PUT /api/calls`.
#[derive(Debug, Deserialize)]
pub struct UpdateCallRequest {
    #[serde(rename = "callSid")]
    pub call_sid: Option<String>,
    pub status: Option<String>,
    pub transcript: Option<String>,
}

fn parse_positive(name: &str, value: Option<&str>, default: u32) -> Result<u32, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ApiError::BadRequest(format!(
                "{} must be a positive integer",
                name
            ))),
        },
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn provider_error(e: TelephonyError) -> ApiError {
    match e {
        TelephonyError::Provider { status: 404, message } => ApiError::NotFound(message),
        other => ApiError::BadGateway(other.to_string()),
    }
}

/// Handler for `GET /api/calls`.
///
/// With `id`, returns that call enriched with live provider data; if the
/// provider cannot be reached the stored record is returned alone.
/// Otherwise returns a page of calls, newest first.
pub async fn get_calls_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<CallsQuery>,
) -> Result<Response, ApiError> {
    if let Some(id) = non_empty(query.id) {
        let call = with_conn(&state.pool, move |conn| nexcall_calls::get_call(conn, &id)).await?;

        let twilio_details = match state.telephony.fetch_call(&call.twilio_sid).await {
            Ok(details) => Some(details),
            Err(e) => {
                tracing::warn!(
                    call_sid = %call.twilio_sid,
                    error = %e,
                    "provider lookup failed, serving stored call"
                );
                None
            }
        };
        return Ok(Json(CallDetails {
            call,
            twilio_details,
        })
        .into_response());
    }

    let page = parse_positive("page", query.page.as_deref(), DEFAULT_PAGE)?;
    let limit = parse_positive("limit", query.limit.as_deref(), DEFAULT_LIMIT)?.min(MAX_LIMIT);

    let calls = with_conn(&state.pool, move |conn| {
        nexcall_calls::list_calls(conn, page, limit)
    })
    .await?;
    Ok(Json(calls).into_response())
}

/// Handler for `POST /api/calls`: places an outbound call and records it.
pub async fn create_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<CreateCallRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CallRecord>), ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let to = non_empty(payload.to)
        .ok_or_else(|| ApiError::BadRequest("to is required".to_string()))?;
    let from = non_empty(payload.from)
        .or_else(|| non_empty(Some(state.caller_id.clone())))
        .ok_or_else(|| ApiError::BadRequest("from is required".to_string()))?;
    let callback_url =
        non_empty(payload.callback_url).unwrap_or_else(|| state.webhook_url.clone());

    let placed = state
        .telephony
        .initiate_call(&to, &from, &callback_url)
        .await
        .map_err(provider_error)?;

    let new_call = NewCall {
        twilio_sid: placed.sid.clone(),
        to: placed.to.clone().unwrap_or(to),
        from: placed.from.clone().unwrap_or(from),
        status: placed.status,
        direction: placed.direction.unwrap_or(CallDirection::Outbound),
    };
    let call = with_conn(&state.pool, move |conn| {
        nexcall_calls::insert_call(conn, &new_call)
    })
    .await?;

    tracing::info!(call_id = %call.id, call_sid = %call.twilio_sid, "outbound call created");
    Ok((StatusCode::CREATED, Json(call)))
}

/// Handler for `PUT /api/calls`: updates status and/or transcript by call sid.
pub async fn update_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<UpdateCallRequest>, JsonRejection>,
) -> Result<Json<CallRecord>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let call_sid = non_empty(payload.call_sid)
        .ok_or_else(|| ApiError::BadRequest("callSid is required".to_string()))?;
    let status = non_empty(payload.status)
        .map(|s| {
            s.parse::<CallStatus>()
                .map_err(|_| ApiError::BadRequest(format!("unknown call status: {}", s)))
        })
        .transpose()?;
    let updates = UpdateCallParams {
        status,
        transcript: non_empty(payload.transcript),
    };

    let call = with_conn(&state.pool, move |conn| {
        nexcall_calls::update_call(conn, &call_sid, &updates)
    })
    .await?;
    Ok(Json(call))
}

/// Handler for `GET /api/calls/stats`.
pub async fn call_stats_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<CallStats>, ApiError> {
    let stats = with_conn(&state.pool, nexcall_calls::call_stats).await?;
    Ok(Json(stats))
}

/// Handler for `GET /api/calls/{id}/conversation`.
pub async fn call_conversation_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TranscriptEntry>>, ApiError> {
    let entries = with_conn(&state.pool, move |conn| {
        let call = nexcall_calls::get_call(conn, &id)?;
        nexcall_calls::list_transcript_entries(conn, &call.twilio_sid)
    })
    .await?;
    Ok(Json(entries))
}

/// Handler for `POST /api/calls/{id}/end`: hangs up a live call.
pub async fn end_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CallRecord>, ApiError> {
    let call = with_conn(&state.pool, move |conn| nexcall_calls::get_call(conn, &id)).await?;
    let ended = state
        .telephony
        .end_call(&call.twilio_sid)
        .await
        .map_err(provider_error)?;

    let updates = UpdateCallParams {
        status: Some(ended.status),
        transcript: None,
    };
    let call_sid = call.twilio_sid;
    let call = with_conn(&state.pool, move |conn| {
        nexcall_calls::update_call(conn, &call_sid, &updates)
    })
    .await?;
    tracing::info!(call_sid = %call.twilio_sid, "call ended by operator");
    Ok(Json(call))
}

/// Handler for `POST /api/calls/{id}/recording`.
pub async fn start_recording_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ProviderRecording>), ApiError> {
    let call = with_conn(&state.pool, move |conn| nexcall_calls::get_call(conn, &id)).await?;
    let recording = state
        .telephony
        .start_recording(&call.twilio_sid)
        .await
        .map_err(provider_error)?;
    Ok((StatusCode::CREATED, Json(recording)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_parameters() {
        assert_eq!(parse_positive("page", None, 1).unwrap(), 1);
        assert_eq!(parse_positive("page", Some(" "), 1).unwrap(), 1);
        assert_eq!(parse_positive("limit", Some("25"), 10).unwrap(), 25);
        assert!(parse_positive("limit", Some("0"), 10).is_err());
        assert!(parse_positive("limit", Some("-3"), 10).is_err());
        assert!(parse_positive("page", Some("abc"), 1).is_err());
    }

    #[test]
    fn provider_not_found_maps_to_404() {
        let err = provider_error(TelephonyError::Provider {
            status: 404,
            message: "missing".into(),
        });
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(matches!(
            provider_error(TelephonyError::NotConfigured),
            ApiError::BadGateway(_)
        ));
    }
}

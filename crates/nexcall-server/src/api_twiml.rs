//! Provider webhooks. Every response is TwiML with a 200 status; the live
//! caller must never be left with an HTTP error.

use crate::lifecycle::CallEvent;
use crate::AppState;
use axum::{
    extract::{rejection::FormRejection, Extension, Form},
    http::header,
    response::{IntoResponse, Response},
};
use nexcall_telephony::CONTENT_TYPE;
use serde::Deserialize;
use std::sync::Arc;

/// Form fields the provider posts. Everything is optional so a sparse
/// callback still decodes.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
    #[serde(rename = "SpeechResult")]
    pub speech_result: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "To")]
    pub to: Option<String>,
    #[serde(rename = "Direction")]
    pub direction: Option<String>,
}

impl WebhookForm {
    /// `None` when the call id is missing.
    fn into_event(self) -> Option<CallEvent> {
        let call_sid = self.call_sid.filter(|s| !s.trim().is_empty())?;
        Some(CallEvent {
            call_sid,
            call_status: self.call_status,
            speech_result: self.speech_result,
            from: self.from,
            to: self.to,
            direction: self.direction,
        })
    }
}

fn twiml(body: String) -> Response {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

fn decode(form: Result<Form<WebhookForm>, FormRejection>) -> Option<CallEvent> {
    match form {
        Ok(Form(form)) => {
            let event = form.into_event();
            if event.is_none() {
                tracing::warn!("webhook without CallSid");
            }
            event
        }
        Err(rejection) => {
            tracing::warn!(error = %rejection, "unreadable webhook body");
            None
        }
    }
}

/// Handler for `POST {webhook_path}`.
pub async fn voice_webhook_handler(
    Extension(state): Extension<Arc<AppState>>,
    form: Result<Form<WebhookForm>, FormRejection>,
) -> Response {
    let handler = &state.lifecycle;
    let body = match decode(form) {
        Some(event) => {
            tracing::debug!(
                call_sid = %event.call_sid,
                status = event.call_status.as_deref().unwrap_or("-"),
                has_speech = event.speech_result.is_some(),
                "voice webhook"
            );
            handler.handle(&event).await
        }
        None => handler.unreadable_request(),
    };
    twiml(body)
}

/// Handler for `POST {webhook_path}/status`.
pub async fn status_callback_handler(
    Extension(state): Extension<Arc<AppState>>,
    form: Result<Form<WebhookForm>, FormRejection>,
) -> Response {
    let handler = &state.lifecycle;
    let body = match decode(form) {
        Some(event) => {
            tracing::debug!(
                call_sid = %event.call_sid,
                status = event.call_status.as_deref().unwrap_or("-"),
                "status callback"
            );
            handler.handle_status(&event).await
        }
        None => handler.unreadable_request(),
    };
    twiml(body)
}

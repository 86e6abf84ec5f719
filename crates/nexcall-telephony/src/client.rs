//! Provider REST client (Twilio `2010-04-01` Calls API).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nexcall_types::{CallDirection, CallStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::TwilioConfig;
use crate::error::TelephonyError;

/// Status events the provider reports to the status callback.
const STATUS_EVENTS: [&str; 4] = ["initiated", "ringing", "answered", "completed"];

/// A call as the provider sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCall {
    pub sid: String,
    pub to: Option<String>,
    pub from: Option<String>,
    pub status: CallStatus,
    pub direction: Option<CallDirection>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_secs: Option<u32>,
}

/// Operations against the telephony provider.
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    /// Places an outbound call. The provider fetches markup from
    /// `callback_url` and reports status changes to `{callback_url}/status`.
    async fn initiate_call(
        &self,
        to: &str,
        from: &str,
        callback_url: &str,
    ) -> Result<ProviderCall, TelephonyError>;

    async fn fetch_call(&self, call_sid: &str) -> Result<ProviderCall, TelephonyError>;

    /// Hangs up a live call.
    async fn end_call(&self, call_sid: &str) -> Result<ProviderCall, TelephonyError>;

    async fn start_recording(&self, call_sid: &str) -> Result<ProviderRecording, TelephonyError>;
}

/// A recording started on a live call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecording {
    pub sid: String,
    pub call_sid: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
struct RawCall {
    sid: String,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    from: Option<String>,
    status: String,
    #[serde(default)]
    direction: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    // Sent as a decimal string, or null while the call is live.
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Deserialize)]
struct RawError {
    #[serde(default)]
    message: Option<String>,
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    let value = value?;
    match DateTime::parse_from_rfc2822(&value) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!(value = %value, error = %e, "ignoring unparseable provider timestamp");
            None
        }
    }
}

impl TryFrom<RawCall> for ProviderCall {
    type Error = TelephonyError;

    fn try_from(raw: RawCall) -> Result<Self, Self::Error> {
        let status = raw
            .status
            .parse::<CallStatus>()
            .map_err(|e| TelephonyError::Payload(e.to_string()))?;
        let duration_secs = match raw.duration.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(d) => Some(
                d.parse::<u32>()
                    .map_err(|_| TelephonyError::Payload(format!("invalid duration: {d}")))?,
            ),
        };
        Ok(Self {
            sid: raw.sid,
            to: raw.to,
            from: raw.from,
            status,
            direction: raw.direction.and_then(|d| d.parse().ok()),
            start_time: parse_timestamp(raw.start_time),
            end_time: parse_timestamp(raw.end_time),
            duration_secs,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TwilioClient {
    http: reqwest::Client,
    calls_url: String,
    account_sid: String,
    auth_token: String,
}

impl TwilioClient {
    pub fn new(config: &TwilioConfig) -> Result<Self, TelephonyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("nexcall/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let calls_url = format!(
            "{}/2010-04-01/Accounts/{}/Calls",
            config.api_base_url.trim_end_matches('/'),
            config.account_sid
        );
        Ok(Self {
            http,
            calls_url,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn ensure_configured(&self) -> Result<(), TelephonyError> {
        if self.account_sid.is_empty() || self.auth_token.is_empty() {
            return Err(TelephonyError::NotConfigured);
        }
        Ok(())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, TelephonyError> {
        self.ensure_configured()?;
        let response = request
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<RawError>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(body);
            tracing::warn!(status = status.as_u16(), message = %message, "telephony provider error");
            return Err(TelephonyError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| TelephonyError::Payload(e.to_string()))
    }

    async fn send_call(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<ProviderCall, TelephonyError> {
        let raw: RawCall = self.send(request).await?;
        ProviderCall::try_from(raw)
    }
}

#[async_trait]
impl TelephonyProvider for TwilioClient {
    async fn initiate_call(
        &self,
        to: &str,
        from: &str,
        callback_url: &str,
    ) -> Result<ProviderCall, TelephonyError> {
        let status_callback = format!("{}/status", callback_url.trim_end_matches('/'));
        let mut form: Vec<(&str, &str)> = vec![
            ("To", to),
            ("From", from),
            ("Url", callback_url),
            ("Method", "POST"),
            ("StatusCallback", &status_callback),
            ("StatusCallbackMethod", "POST"),
        ];
        form.extend(STATUS_EVENTS.iter().map(|e| ("StatusCallbackEvent", *e)));

        let call = self
            .send_call(self.http.post(format!("{}.json", self.calls_url)).form(&form))
            .await?;
        tracing::info!(call_sid = %call.sid, to = %to, "outbound call placed");
        Ok(call)
    }

    async fn fetch_call(&self, call_sid: &str) -> Result<ProviderCall, TelephonyError> {
        self.send_call(self.http.get(format!("{}/{}.json", self.calls_url, call_sid)))
            .await
    }

    async fn end_call(&self, call_sid: &str) -> Result<ProviderCall, TelephonyError> {
        let call = self
            .send_call(
                self.http
                    .post(format!("{}/{}.json", self.calls_url, call_sid))
                    .form(&[("Status", "completed")]),
            )
            .await?;
        tracing::info!(call_sid = %call_sid, "call ended");
        Ok(call)
    }

    async fn start_recording(&self, call_sid: &str) -> Result<ProviderRecording, TelephonyError> {
        // The provider answers in snake_case; re-keyed here for the camelCase API.
        #[derive(Deserialize)]
        struct RawRecording {
            sid: String,
            #[serde(default)]
            call_sid: Option<String>,
            #[serde(default)]
            status: Option<String>,
        }

        let raw: RawRecording = self
            .send(
                self.http
                    .post(format!("{}/{}/Recordings.json", self.calls_url, call_sid))
                    .form(&[("RecordingChannels", "dual")]),
            )
            .await?;
        tracing::info!(call_sid = %call_sid, recording_sid = %raw.sid, "recording started");
        Ok(ProviderRecording {
            sid: raw.sid,
            call_sid: raw.call_sid,
            status: raw.status,
        })
    }
}

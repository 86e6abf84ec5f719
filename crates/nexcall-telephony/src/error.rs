use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelephonyError {
    #[error("telephony request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telephony provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("unexpected provider payload: {0}")]
    Payload(String),

    #[error("telephony provider is not configured")]
    NotConfigured,
}

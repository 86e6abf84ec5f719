use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("chat backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat backend returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

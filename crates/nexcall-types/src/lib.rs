//! Shared types for the nexcall platform.
//!
//! This crate holds the vocabulary every other nexcall crate speaks:
//! conversation turns, provider call statuses, call directions, and the
//! closed set of follow-up actions an agent reply can request.
//!
//! Nothing here performs I/O. Parsing is strict: unknown status or role
//! strings are rejected with a typed error instead of being passed through.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Speaker of a single conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Fixed instructions (persona, guidelines). Never stored in a call's turns.
    System,
    /// The caller.
    User,
    /// The agent.
    Assistant,
}

impl Role {
    /// Returns the wire label used by chat-completion backends and the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(ParseError::Role(s.to_string())),
        }
    }
}

/// One message exchanged in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Call status as reported by the telephony provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Queued,
    Initiated,
    Ringing,
    InProgress,
    Completed,
    Busy,
    Failed,
    NoAnswer,
    Canceled,
}

impl CallStatus {
    /// Every status, in provider lifecycle order.
    pub const ALL: [CallStatus; 9] = [
        Self::Queued,
        Self::Initiated,
        Self::Ringing,
        Self::InProgress,
        Self::Completed,
        Self::Busy,
        Self::Failed,
        Self::NoAnswer,
        Self::Canceled,
    ];

    /// Statuses after which no further conversation turns are possible.
    pub const TERMINAL: [CallStatus; 5] = [
        Self::Completed,
        Self::Failed,
        Self::Busy,
        Self::NoAnswer,
        Self::Canceled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Initiated => "initiated",
            Self::Ringing => "ringing",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Busy => "busy",
            Self::Failed => "failed",
            Self::NoAnswer => "no-answer",
            Self::Canceled => "canceled",
        }
    }

    /// Returns `true` for statuses that end the call on the provider side.
    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CallStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseError::CallStatus(s.to_string()))
    }
}

/// Direction of a call relative to this platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

impl CallDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

impl std::str::FromStr for CallDirection {
    type Err = ParseError;

    /// Accepts the provider's variants (`outbound-api`, `outbound-dial`) as outbound.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(Self::Inbound),
            "outbound" | "outbound-api" | "outbound-dial" => Ok(Self::Outbound),
            _ => Err(ParseError::CallDirection(s.to_string())),
        }
    }
}

/// Why a call is handed over to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferReason {
    /// The agent decided the request needs a human.
    AgentRequest,
    /// The response generator failed; escalate rather than leave the caller hanging.
    TechnicalError,
}

/// Follow-up action requested alongside an agent reply.
///
/// Each variant carries only the fields it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentAction {
    /// Keep the conversation going.
    None,
    /// Connect the caller to the fallback destination.
    Transfer { reason: TransferReason },
    /// The caller asked to be called back.
    Callback { note: String },
    /// The caller asked to book an appointment.
    Schedule { note: String },
}

/// A generated assistant message plus the action it requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReply {
    pub message: String,
    pub action: AgentAction,
}

impl AgentReply {
    /// A reply that simply continues the conversation.
    pub fn say(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            action: AgentAction::None,
        }
    }
}

/// Errors produced when parsing wire strings into nexcall types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown role: {0}")]
    Role(String),
    #[error("unknown call status: {0}")]
    CallStatus(String),
    #[error("unknown call direction: {0}")]
    CallDirection(String),
}

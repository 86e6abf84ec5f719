//! Telephony provider integration for nexcall.
//!
//! Two halves:
//!
//! - [`twiml`]: the markup responder. Pure functions that turn a spoken
//!   message and the next conversational step into a TwiML document.
//! - [`client`]: the provider REST API (place, fetch and end calls, start recordings) behind
//!   the [`TelephonyProvider`] trait.

pub mod client;
pub mod config;
pub mod error;
pub mod twiml;

pub use client::{ProviderCall, ProviderRecording, TelephonyProvider, TwilioClient};
pub use config::TwilioConfig;
pub use error::TelephonyError;
pub use twiml::{render, MarkupOptions, NextAction, TwimlBuilder, CONTENT_TYPE};

//! Call lifecycle handler: turns one provider event into side effects and
//! the markup the provider should execute next.
//!
//! Per call the states are `NONE -> ACTIVE -> TERMINATED`, tracked by the
//! presence of a [`ConversationState`]. Events are classified in this order:
//!
//! 1. terminal status: summarize, store the summary, drop the state
//! 2. speech: run one turn, recovering a missing state first
//! 3. `in-progress` with no state: greet and start listening
//! 4. anything else: generic prompt, keep listening
//!
//! Nothing here returns an error. Generator failures become an apology and a
//! transfer; storage failures are logged and the call carries on.

use nexcall_agent::{fallback_reply, ResponseGenerator};
use nexcall_calls::CallParties;
use nexcall_telephony::{render, MarkupOptions, NextAction};
use nexcall_types::{AgentAction, CallDirection, CallStatus, Role, Turn};
use std::sync::Arc;
use uuid::Uuid;

use crate::conversation::{CallLocks, ConversationState, ConversationStore};
use crate::persistence::CallRecordStore;

/// Spoken when an event fits no transition.
pub const NOT_UNDERSTOOD_MESSAGE: &str =
    "Désolé, je n'ai pas compris votre demande. Comment puis-je vous aider?";

/// Spoken when the request itself could not be read.
pub const TECHNICAL_DIFFICULTY_MESSAGE: &str =
    "Désolé, nous rencontrons des difficultés techniques. Veuillez réessayer plus tard.";

/// One provider callback, already decoded from the form body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallEvent {
    pub call_sid: String,
    /// Raw provider status. Unknown values are treated as absent.
    pub call_status: Option<String>,
    pub speech_result: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub direction: Option<String>,
}

impl CallEvent {
    fn status(&self) -> Option<CallStatus> {
        let raw = self.call_status.as_deref()?;
        match raw.parse() {
            Ok(status) => Some(status),
            Err(_) => {
                tracing::debug!(call_sid = %self.call_sid, status = raw, "ignoring unknown call status");
                None
            }
        }
    }

    fn speech(&self) -> Option<&str> {
        self.speech_result
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Calls first seen through the webhook were not placed by us, so they
    /// default to inbound.
    fn direction(&self) -> CallDirection {
        self.direction
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or(CallDirection::Inbound)
    }

    fn parties(&self) -> CallParties {
        CallParties {
            from: self.from.clone().filter(|s| !s.is_empty()),
            to: self.to.clone().filter(|s| !s.is_empty()),
        }
    }
}

pub struct CallLifecycleHandler {
    agent: Arc<dyn ResponseGenerator>,
    records: Arc<dyn CallRecordStore>,
    conversations: Arc<dyn ConversationStore>,
    locks: CallLocks,
    markup: MarkupOptions,
}

impl CallLifecycleHandler {
    pub fn new(
        agent: Arc<dyn ResponseGenerator>,
        records: Arc<dyn CallRecordStore>,
        conversations: Arc<dyn ConversationStore>,
        markup: MarkupOptions,
    ) -> Self {
        Self {
            agent,
            records,
            conversations,
            locks: CallLocks::new(),
            markup,
        }
    }

    pub fn conversations(&self) -> &Arc<dyn ConversationStore> {
        &self.conversations
    }

    pub fn markup(&self) -> &MarkupOptions {
        &self.markup
    }

    /// Handles a voice webhook event and returns the markup document.
    pub async fn handle(&self, event: &CallEvent) -> String {
        let status = event.status();
        if let Some(status) = status.filter(|s| s.is_terminal()) {
            return self.terminate(event, status).await;
        }
        if let Some(speech) = event.speech() {
            return self.converse(event, speech).await;
        }
        if status == Some(CallStatus::InProgress) {
            return self.start(event).await;
        }
        self.not_understood(event, status).await
    }

    /// Handles a status callback. Only the status is recorded, except for
    /// terminal statuses which close the conversation as in [`Self::handle`].
    pub async fn handle_status(&self, event: &CallEvent) -> String {
        match event.status() {
            Some(status) if status.is_terminal() => self.terminate(event, status).await,
            Some(status) => {
                self.record_status(event, status).await;
                render(&self.markup, "", NextAction::None)
            }
            None => render(&self.markup, "", NextAction::None),
        }
    }

    /// Markup for a request that could not be decoded at all.
    pub fn unreadable_request(&self) -> String {
        render(&self.markup, TECHNICAL_DIFFICULTY_MESSAGE, NextAction::Listen)
    }

    async fn start(&self, event: &CallEvent) -> String {
        let sid = event.call_sid.as_str();
        let _lock = self.locks.lock(sid).await;
        if self.conversations.get(sid).await.is_some() {
            tracing::debug!(call_sid = %sid, "in-progress event for an active conversation");
            return self.not_understood(event, Some(CallStatus::InProgress)).await;
        }

        self.record_status(event, CallStatus::InProgress).await;

        let greeting = self.agent.greeting();
        let mut state = ConversationState::new(sid, event.from.clone());
        state.turns.push(Turn::assistant(greeting.clone()));
        self.conversations.put(state).await;
        self.record_turn(sid, Role::Assistant, &greeting).await;

        tracing::info!(call_sid = %sid, "conversation started");
        render(&self.markup, &greeting, NextAction::Listen)
    }

    async fn converse(&self, event: &CallEvent, speech: &str) -> String {
        let sid = event.call_sid.as_str();
        let _lock = self.locks.lock(sid).await;

        let mut state = match self.conversations.get(sid).await {
            Some(state) => state,
            None => {
                // At-least-once delivery or a restart lost the state: start
                // over from this event instead of failing the call.
                tracing::info!(call_sid = %sid, "speech for unknown conversation, recovering");
                self.record_status(event, CallStatus::InProgress).await;
                ConversationState::new(sid, event.from.clone())
            }
        };

        state.turns.push(Turn::user(speech));
        let history = state.turns.clone();
        self.conversations.put(state.clone()).await;
        self.record_turn(sid, Role::User, speech).await;

        let reply = match self.agent.next_reply(&history).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(call_sid = %sid, error = %e, "response generation failed, handing off");
                fallback_reply()
            }
        };

        state.turns.push(Turn::assistant(reply.message.clone()));
        self.conversations.put(state).await;
        self.record_turn(sid, Role::Assistant, &reply.message).await;

        let next = match &reply.action {
            AgentAction::None => NextAction::Listen,
            AgentAction::Transfer { reason } => {
                tracing::info!(call_sid = %sid, reason = ?reason, "transferring call");
                NextAction::Transfer
            }
            AgentAction::Callback { note } => {
                tracing::info!(call_sid = %sid, note = %note, "callback requested");
                NextAction::Listen
            }
            AgentAction::Schedule { note } => {
                tracing::info!(call_sid = %sid, note = %note, "appointment requested");
                NextAction::Listen
            }
        };
        render(&self.markup, &reply.message, next)
    }

    async fn terminate(&self, event: &CallEvent, status: CallStatus) -> String {
        let sid = event.call_sid.as_str();
        self.record_status(event, status).await;

        let _lock = self.locks.lock(sid).await;
        match self.conversations.get(sid).await {
            Some(state) => {
                let summary = self.agent.summarize(&state.turns).await;
                if let Err(e) = self.records.set_final_transcript(sid, &summary).await {
                    tracing::warn!(call_sid = %sid, error = %e, "failed to store call summary");
                }
                self.conversations.delete(sid).await;
                tracing::info!(
                    call_sid = %sid,
                    status = status.as_str(),
                    turns = state.turns.len(),
                    "conversation ended"
                );
            }
            None => {
                tracing::debug!(call_sid = %sid, status = status.as_str(), "terminal status without conversation");
            }
        }
        render(&self.markup, "", NextAction::None)
    }

    async fn not_understood(&self, event: &CallEvent, status: Option<CallStatus>) -> String {
        if let Some(status) = status {
            self.record_status(event, status).await;
        }
        render(&self.markup, NOT_UNDERSTOOD_MESSAGE, NextAction::Listen)
    }

    async fn record_status(&self, event: &CallEvent, status: CallStatus) {
        if let Err(e) = self
            .records
            .upsert_call_status(&event.call_sid, status, event.direction(), event.parties())
            .await
        {
            tracing::warn!(
                call_sid = %event.call_sid,
                status = status.as_str(),
                error = %e,
                "failed to record call status"
            );
        }
    }

    async fn record_turn(&self, call_sid: &str, role: Role, content: &str) {
        let entry_id = Uuid::new_v4().to_string();
        if let Err(e) = self
            .records
            .append_transcript_entry(&entry_id, call_sid, role, content)
            .await
        {
            tracing::warn!(
                call_sid = %call_sid,
                role = role.as_str(),
                error = %e,
                "failed to record transcript entry"
            );
        }
    }
}

use async_trait::async_trait;
use nexcall_types::{AgentAction, AgentReply, Turn, TransferReason};
use tracing::{debug, warn};

use crate::client::{ChatClient, CompletionParams};
use crate::config::{AgentInstructions, LlmConfig};
use crate::error::AgentError;
use crate::prompt;

/// Spoken when reply generation fails; always paired with a transfer.
pub const APOLOGY_MESSAGE: &str =
    "Désolé, je rencontre des difficultés techniques. Un agent humain va prendre le relais.";

/// Spoken when the backend answers without any content.
pub const NO_REPLY_MESSAGE: &str = "Je suis désolé, je n'ai pas compris.";

/// Stored as the call transcript when summarization fails.
pub const SUMMARY_UNAVAILABLE: &str = "Erreur lors de la génération du résumé.";

/// Stored when there is nothing to summarize.
const NO_SUMMARY: &str = "Aucun résumé disponible.";

/// The reply used in place of a failed generation: apologize, then escalate.
pub fn fallback_reply() -> AgentReply {
    AgentReply {
        message: APOLOGY_MESSAGE.to_string(),
        action: AgentAction::Transfer {
            reason: TransferReason::TechnicalError,
        },
    }
}

/// Produces what the agent says next.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Opening line for a newly connected call.
    fn greeting(&self) -> String;

    /// Generates the next assistant message for `history`.
    ///
    /// `history` holds only user and assistant turns; the persona prompt is
    /// prepended by the implementation.
    async fn next_reply(&self, history: &[Turn]) -> Result<AgentReply, AgentError>;

    /// Summarizes a finished conversation. Never fails.
    async fn summarize(&self, history: &[Turn]) -> String;
}

/// [`ResponseGenerator`] backed by a chat-completions API.
#[derive(Debug, Clone)]
pub struct ChatAgent {
    instructions: AgentInstructions,
    system_prompt: String,
    client: ChatClient,
    reply_params: CompletionParams,
    summary_params: CompletionParams,
}

impl ChatAgent {
    pub fn new(instructions: AgentInstructions, config: &LlmConfig) -> Result<Self, AgentError> {
        let client = ChatClient::new(config)?;
        Ok(Self {
            system_prompt: prompt::system_prompt(&instructions),
            instructions,
            client,
            reply_params: CompletionParams {
                model: config.model.clone(),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
            },
            summary_params: CompletionParams {
                model: config.summary_model.clone(),
                temperature: config.summary_temperature,
                max_tokens: config.summary_max_tokens,
            },
        })
    }

    pub fn instructions(&self) -> &AgentInstructions {
        &self.instructions
    }

    /// Full message list sent for a reply: persona prompt, then `history` verbatim.
    pub fn reply_messages(&self, history: &[Turn]) -> Vec<Turn> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Turn::system(self.system_prompt.clone()));
        messages.extend_from_slice(history);
        messages
    }
}

#[async_trait]
impl ResponseGenerator for ChatAgent {
    fn greeting(&self) -> String {
        prompt::greeting(&self.instructions)
    }

    async fn next_reply(&self, history: &[Turn]) -> Result<AgentReply, AgentError> {
        let messages = self.reply_messages(history);
        debug!(turns = history.len(), model = %self.reply_params.model, "requesting agent reply");

        match self.client.complete(&self.reply_params, &messages).await? {
            Some(content) => Ok(prompt::parse_reply(&content)),
            None => {
                warn!("chat backend returned an empty reply");
                Ok(AgentReply::say(NO_REPLY_MESSAGE))
            }
        }
    }

    async fn summarize(&self, history: &[Turn]) -> String {
        let transcript = prompt::flatten_transcript(history);
        if transcript.is_empty() {
            return NO_SUMMARY.to_string();
        }

        let messages = [
            Turn::system(prompt::SUMMARY_INSTRUCTION),
            Turn::user(transcript),
        ];
        match self.client.complete(&self.summary_params, &messages).await {
            Ok(Some(summary)) => summary,
            Ok(None) => NO_SUMMARY.to_string(),
            Err(e) => {
                warn!(error = %e, "conversation summary failed, storing placeholder");
                SUMMARY_UNAVAILABLE.to_string()
            }
        }
    }
}

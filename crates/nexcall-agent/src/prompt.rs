//! Prompt rendering and reply directive parsing.
//!
//! The model may end a reply with one bracketed directive:
//!
//! | Directive | Action |
//! |-----------|--------|
//! | `[TRANSFER]` | hand the caller to a human |
//! | `[CALLBACK: <note>]` | caller wants to be called back |
//! | `[SCHEDULE: <note>]` | caller wants an appointment |
//!
//! Directives are stripped before the message is spoken.

use nexcall_types::{AgentAction, AgentReply, Role, Turn, TransferReason};

use crate::config::AgentInstructions;

/// Instruction sent ahead of the flattened transcript when summarizing.
pub const SUMMARY_INSTRUCTION: &str = "Résume la conversation suivante entre un client et un agent de centre d'appel. Inclus les points clés discutés, les problèmes identifiés et les actions à entreprendre.";

/// Renders the fixed system prompt for a persona.
pub fn system_prompt(instructions: &AgentInstructions) -> String {
    let company = &instructions.company;
    format!(
        "Tu es un agent IA de centre d'appel pour {name}.
Ton rôle: {role}
Ton objectif: {objective}
Persona: {persona}

Informations sur l'entreprise:
{description}

Services offerts:
{services}

Moyens de contact:
{contacts}

Directives à suivre:
{guidelines}

Parle toujours en français, sois professionnel, poli et concis.
N'oublie pas que tu communiques par téléphone, donc garde tes réponses claires et facilement compréhensibles à l'oral.

Si la demande doit être traitée par un humain, termine ta réponse par [TRANSFER].
Si le client demande à être rappelé, termine ta réponse par [CALLBACK: <précisions>].
Si le client veut prendre rendez-vous, termine ta réponse par [SCHEDULE: <précisions>].
N'ajoute aucune autre balise.",
        name = company.name,
        role = instructions.role,
        objective = instructions.objective,
        persona = instructions.persona,
        description = company.description,
        services = company.services.join("\n"),
        contacts = company.contact_methods.join("\n"),
        guidelines = instructions.guidelines.join("\n"),
    )
}

/// Opening line spoken when a call connects.
pub fn greeting(instructions: &AgentInstructions) -> String {
    format!(
        "Bonjour, vous êtes en ligne avec {}. Je suis votre assistant virtuel. Comment puis-je vous aider aujourd'hui?",
        instructions.company.name
    )
}

/// Flattens a conversation into `Client:` / `Agent:` lines for summarization.
///
/// System turns are skipped.
pub fn flatten_transcript(history: &[Turn]) -> String {
    history
        .iter()
        .filter_map(|turn| match turn.role {
            Role::User => Some(format!("Client: {}", turn.content)),
            Role::Assistant => Some(format!("Agent: {}", turn.content)),
            Role::System => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits a raw completion into the spoken message and its requested action.
///
/// Unknown bracketed text is left in the message untouched.
pub fn parse_reply(raw: &str) -> AgentReply {
    let trimmed = raw.trim();
    if let (Some(open), true) = (trimmed.rfind('['), trimmed.ends_with(']')) {
        let directive = &trimmed[open + 1..trimmed.len() - 1];
        let (tag, note) = match directive.split_once(':') {
            Some((tag, note)) => (tag.trim(), note.trim()),
            None => (directive.trim(), ""),
        };
        let action = match tag.to_ascii_uppercase().as_str() {
            "TRANSFER" => Some(AgentAction::Transfer {
                reason: TransferReason::AgentRequest,
            }),
            "CALLBACK" => Some(AgentAction::Callback {
                note: note.to_string(),
            }),
            "SCHEDULE" => Some(AgentAction::Schedule {
                note: note.to_string(),
            }),
            _ => None,
        };
        if let Some(action) = action {
            return AgentReply {
                message: trimmed[..open].trim_end().to_string(),
                action,
            };
        }
    }
    AgentReply::say(trimmed)
}

use serde::{Deserialize, Serialize};
use std::fmt;

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_summary_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    300
}

fn default_summary_temperature() -> f32 {
    0.3
}

fn default_summary_max_tokens() -> u32 {
    200
}

fn default_timeout_ms() -> u64 {
    4_000
}

/// Chat backend connection and sampling settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Model used for live replies.
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used for end-of-call summaries.
    #[serde(default = "default_summary_model")]
    pub summary_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
    /// Upper bound for one backend round trip. The provider is waiting on the
    /// live call, so this stays in the low seconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            summary_model: default_summary_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            summary_temperature: default_summary_temperature(),
            summary_max_tokens: default_summary_max_tokens(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("summary_model", &self.summary_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("summary_temperature", &self.summary_temperature)
            .field("summary_max_tokens", &self.summary_max_tokens)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Who the agent is and what it knows about the company it answers for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentInstructions {
    pub role: String,
    pub objective: String,
    pub persona: String,
    pub guidelines: Vec<String>,
    pub company: CompanyInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    pub name: String,
    pub description: String,
    pub services: Vec<String>,
    pub contact_methods: Vec<String>,
}

impl Default for AgentInstructions {
    fn default() -> Self {
        Self {
            role: "Assistant service client".to_string(),
            objective: "Aider les clients à résoudre leurs problèmes et répondre à leurs questions"
                .to_string(),
            persona: "Professionnel, empathique et efficace".to_string(),
            guidelines: vec![
                "Écouter attentivement les préoccupations du client".to_string(),
                "Fournir des informations précises et utiles".to_string(),
                "Rester poli et professionnel en toutes circonstances".to_string(),
                "Rediriger vers un agent humain pour les questions complexes".to_string(),
            ],
            company: CompanyInfo::default(),
        }
    }
}

impl Default for CompanyInfo {
    fn default() -> Self {
        Self {
            name: "NexCallAI".to_string(),
            description: "Plateforme de gestion de centre d'appels alimentée par l'IA".to_string(),
            services: vec![
                "Service client automatisé".to_string(),
                "Gestion d'appels entrants et sortants".to_string(),
                "Analyse de conversations".to_string(),
                "Intégration avec des systèmes CRM".to_string(),
            ],
            contact_methods: vec![
                "Téléphone: +33 1 23 45 67 89".to_string(),
                "Email: support@nexcallai.com".to_string(),
                "Site web: www.nexcallai.com".to_string(),
            ],
        }
    }
}

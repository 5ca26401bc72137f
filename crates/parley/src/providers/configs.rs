use serde::{Deserialize, Serialize};

pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENAI_MODEL: &str = "gpt-4o-mini";

pub const GROQ_HOST: &str = "https://api.groq.com/openai";
pub const GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Which upstream completion service a request is bound for. This is the
/// value carried in relay request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Groq,
}

impl ProviderKind {
    /// The environment variable holding this provider's API key.
    pub fn credential_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "PARLEY_OPENAI_API_KEY",
            ProviderKind::Groq => "PARLEY_GROQ_API_KEY",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Groq => "groq",
        }
    }
}

// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    Groq(GroqProviderConfig),
}

impl ProviderConfig {
    /// Default configuration for a provider kind with the given key.
    pub fn for_kind(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        match kind {
            ProviderKind::OpenAi => ProviderConfig::OpenAi(OpenAiProviderConfig::new(api_key)),
            ProviderKind::Groq => ProviderConfig::Groq(GroqProviderConfig::new(api_key)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
}

impl OpenAiProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        OpenAiProviderConfig {
            host: OPENAI_HOST.to_string(),
            api_key: api_key.into(),
            model: OPENAI_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroqProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
}

impl GroqProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        GroqProviderConfig {
            host: GROQ_HOST.to_string(),
            api_key: api_key.into(),
            model: GROQ_MODEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_to_wire_names() {
        assert_eq!(
            serde_json::to_string(&ProviderKind::OpenAi).unwrap(),
            "\"openai\""
        );
        assert_eq!(serde_json::to_string(&ProviderKind::Groq).unwrap(), "\"groq\"");
        let kind: ProviderKind = serde_json::from_str("\"groq\"").unwrap();
        assert_eq!(kind, ProviderKind::Groq);
    }

    #[test]
    fn test_credential_vars_are_distinct() {
        assert_ne!(
            ProviderKind::OpenAi.credential_var(),
            ProviderKind::Groq.credential_var()
        );
    }
}

use parley::providers::configs::ProviderKind;

/// Shared application state. Everything in here is resolved once at boot
/// and read-only at request time.
#[derive(Debug, Clone)]
pub struct AppState {
    pub keys: RelayKeys,
    pub upstream: UpstreamHosts,
    pub image: ImageSettings,
}

/// Provider credentials held by the relay; callers never supply one.
#[derive(Debug, Clone, Default)]
pub struct RelayKeys {
    pub openai_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub hf_api_token: Option<String>,
}

impl RelayKeys {
    pub fn key_for(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::OpenAi => self.openai_api_key.as_deref(),
            ProviderKind::Groq => self.groq_api_key.as_deref(),
        }
    }
}

/// Upstream endpoints and model ids, overridable for self-hosted gateways
/// and tests.
#[derive(Debug, Clone)]
pub struct UpstreamHosts {
    pub openai_host: String,
    pub openai_model: String,
    pub groq_host: String,
    pub groq_model: String,
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub host: String,
    pub model: String,
}

use super::{
    base::CompletionProvider, configs::ProviderConfig, groq::GroqProvider, openai::OpenAiProvider,
};
use crate::errors::ChatError;

pub fn get_provider(config: ProviderConfig) -> Result<Box<dyn CompletionProvider>, ChatError> {
    match config {
        ProviderConfig::OpenAi(openai_config) => Ok(Box::new(OpenAiProvider::new(openai_config)?)),
        ProviderConfig::Groq(groq_config) => Ok(Box::new(GroqProvider::new(groq_config)?)),
    }
}

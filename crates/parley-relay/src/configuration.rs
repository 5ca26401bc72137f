use config::{Config, Environment};
use parley::image::{DEFAULT_IMAGE_MODEL, HF_INFERENCE_HOST};
use parley::providers::configs::{GROQ_HOST, GROQ_MODEL, OPENAI_HOST, OPENAI_MODEL};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::state::{AppState, ImageSettings, RelayKeys, UpstreamHosts};

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpstreamSettings {
    #[serde(default = "default_openai_host")]
    pub openai_host: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_groq_host")]
    pub groq_host: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            openai_host: default_openai_host(),
            openai_model: default_openai_model(),
            groq_host: default_groq_host(),
            groq_model: default_groq_model(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ImageModelSettings {
    #[serde(default = "default_image_host")]
    pub host: String,
    #[serde(default = "default_image_model")]
    pub model: String,
}

impl Default for ImageModelSettings {
    fn default() -> Self {
        Self {
            host: default_image_host(),
            model: default_image_model(),
        }
    }
}

/// Relay settings, loaded from `PARLEY`-prefixed environment variables.
/// Credentials are optional at boot: a missing key only fails the requests
/// that need it, with an error naming the variable to set.
#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default)]
    pub hf_api_token: Option<String>,
    #[serde(default)]
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub image: ImageModelSettings,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let config = Config::builder()
            // Layer the environment on top of the defaults: flat keys like
            // PARLEY_OPENAI_API_KEY, nested ones like PARLEY_SERVER__PORT.
            .add_source(
                Environment::with_prefix("PARLEY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn into_state(self) -> AppState {
        AppState {
            keys: RelayKeys {
                openai_api_key: self.openai_api_key,
                groq_api_key: self.groq_api_key,
                hf_api_token: self.hf_api_token,
            },
            upstream: UpstreamHosts {
                openai_host: self.upstream.openai_host,
                openai_model: self.upstream.openai_model,
                groq_host: self.upstream.groq_host,
                groq_model: self.upstream.groq_model,
            },
            image: ImageSettings {
                host: self.image.host,
                model: self.image.model,
            },
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

fn default_openai_model() -> String {
    OPENAI_MODEL.to_string()
}

fn default_groq_host() -> String {
    GROQ_HOST.to_string()
}

fn default_groq_model() -> String {
    GROQ_MODEL.to_string()
}

fn default_image_host() -> String {
    HF_INFERENCE_HOST.to_string()
}

fn default_image_model() -> String {
    DEFAULT_IMAGE_MODEL.to_string()
}

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::CaptureConfig;
use crate::live::{LiveConfig, DEFAULT_LIVE_MODEL, GEMINI_LIVE_ENDPOINT};
use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub live: LiveSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_frame_size")]
    pub frame_size: usize,

    /// Input device name; `None` picks the system default
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LiveSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key; the key itself never
    /// appears in the config file
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_setup_timeout")]
    pub setup_timeout_secs: u64,
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_frame_size() -> usize {
    4096
}

fn default_endpoint() -> String {
    GEMINI_LIVE_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_LIVE_MODEL.to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_setup_timeout() -> u64 {
    30
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Resolve the session configuration, reading the API key from the
    /// environment variable named by `live.api_key_env`
    pub fn session_config(&self) -> Result<SessionConfig> {
        let api_key = std::env::var(&self.live.api_key_env).with_context(|| {
            format!(
                "environment variable {} is not set",
                self.live.api_key_env
            )
        })?;

        Ok(SessionConfig {
            capture: CaptureConfig {
                target_sample_rate: self.audio.sample_rate,
                frame_size: self.audio.frame_size,
                device: self.audio.device.clone(),
            },
            live: LiveConfig {
                endpoint: self.live.endpoint.clone(),
                api_key,
                model: self.live.model.clone(),
                setup_timeout_secs: self.live.setup_timeout_secs,
            },
        })
    }
}

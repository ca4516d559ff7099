use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub llm: LlmConfig,
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub board: BoardConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Candidate models, tried in order until one answers.
    pub models: Vec<String>,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path of the persisted login token file.
    pub token_path: String,
    pub system_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    pub refresh_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Config::builder()
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn api_key() -> Result<String> {
        env::var("OPENROUTER_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENROUTER_API_KEY environment variable not set"))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                models: vec![
                    "deepseek/deepseek-chat".to_string(),
                    "google/gemini-flash-1.5".to_string(),
                    "meta-llama/llama-3.3-70b-instruct".to_string(),
                ],
                base_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
                max_tokens: 512,
                temperature: 0.4,
                timeout_secs: 30,
            },
            store: StoreConfig {
                base_url: "http://localhost:8787".to_string(),
                timeout_secs: 10,
            },
            session: SessionConfig {
                token_path: ".farmstead/session.json".to_string(),
                system_prompt: "You are an agricultural assistant for farmers. \
                                Answer practically and in English, whatever language \
                                the question is asked in."
                    .to_string(),
            },
            board: BoardConfig { refresh_secs: 10 },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

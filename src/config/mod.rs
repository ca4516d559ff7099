mod settings;

pub use settings::{BoardConfig, LlmConfig, LoggingConfig, SessionConfig, Settings, StoreConfig};

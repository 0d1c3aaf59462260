mod settings;

pub use settings::{ChatConfig, LogConfig, LogFormat, ServerConfig, Settings};

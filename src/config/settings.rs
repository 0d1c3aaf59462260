use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// The only upgrade path that joins the chat room
    #[serde(default = "default_chat_path")]
    pub path: String,
    /// Cookie carrying the identity token issued by the sign-in pages
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Outbound frames queued per connection before new frames are dropped
    #[serde(default = "default_send_buffer")]
    pub send_buffer: usize,
    /// Upper bound for a single socket write, in milliseconds
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_chat_path() -> String {
    "/ws/chat".to_string()
}

fn default_cookie_name() -> String {
    "name".to_string()
}

fn default_send_buffer() -> usize {
    64
}

fn default_write_timeout_ms() -> u64 {
    5000 // 5 seconds
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        Self::load(Self::environment())
    }

    /// Environment overrides use `__` between section and field, so
    /// `CHAT__SEND_BUFFER` maps to `chat.send_buffer`
    pub fn environment() -> Environment {
        Environment::default().separator("__").try_parsing(true)
    }

    /// Build settings from defaults, config files and the given environment
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("chat.path", default_chat_path())?
            .set_default("chat.cookie_name", default_cookie_name())?
            .set_default("chat.send_buffer", default_send_buffer() as u64)?
            .set_default("chat.write_timeout_ms", default_write_timeout_ms())?
            .set_default("log.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(environment);

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            path: default_chat_path(),
            cookie_name: default_cookie_name(),
            send_buffer: default_send_buffer(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::connection_manager::ConnectionRegistry;
use crate::error::Result;
use crate::hooks::{ChatHooks, HookChain, MetricsHooks, NoopHooks};
use crate::hub::BroadcastHub;
use crate::identity::{CookieTokenSource, TokenSource};
use crate::metrics::ChatMetrics;

/// Shared state handed to every connection; built once per server
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<ConnectionRegistry>,
    pub hub: Arc<BroadcastHub>,
    pub token_source: Arc<dyn TokenSource>,
    pub hooks: Arc<dyn ChatHooks>,
    pub metrics: Arc<ChatMetrics>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_hooks(settings, Arc::new(NoopHooks))
    }

    /// Build state with application hooks; metrics hooks always run first
    pub fn with_hooks(settings: Settings, hooks: Arc<dyn ChatHooks>) -> Result<Self> {
        let metrics = Arc::new(ChatMetrics::new()?);
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = Arc::new(BroadcastHub::new(registry.clone(), metrics.clone()));
        let token_source: Arc<dyn TokenSource> =
            Arc::new(CookieTokenSource::new(settings.chat.cookie_name.clone()));
        let metrics_hooks: Arc<dyn ChatHooks> = Arc::new(MetricsHooks::new(metrics.clone()));
        let hooks: Arc<dyn ChatHooks> = Arc::new(HookChain::new(vec![metrics_hooks, hooks]));

        Ok(Self {
            settings: Arc::new(settings),
            registry,
            hub,
            token_source,
            hooks,
            metrics,
            started_at: Instant::now(),
        })
    }

    /// Replace where identity tokens are read from
    pub fn with_token_source(mut self, token_source: Arc<dyn TokenSource>) -> Self {
        self.token_source = token_source;
        self
    }
}

//! Connection lifecycle hooks for the surrounding application.

use std::sync::Arc;

use crate::identity::UserIdentity;
use crate::metrics::ChatMetrics;

/// Callbacks fired as users join, talk and leave.
///
/// All methods default to doing nothing. They run on the connection's own
/// task, so they must not block.
pub trait ChatHooks: Send + Sync {
    fn on_connect(&self, _user: &UserIdentity) {}

    fn on_message(&self, _user: &UserIdentity, _text: &str) {}

    fn on_close(&self, _user: &UserIdentity) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl ChatHooks for NoopHooks {}

/// Feeds lifecycle events into Prometheus
pub struct MetricsHooks {
    metrics: Arc<ChatMetrics>,
}

impl MetricsHooks {
    pub fn new(metrics: Arc<ChatMetrics>) -> Self {
        Self { metrics }
    }
}

impl ChatHooks for MetricsHooks {
    fn on_connect(&self, _user: &UserIdentity) {
        self.metrics.connections_opened.inc();
        self.metrics.connections_active.inc();
    }

    fn on_message(&self, _user: &UserIdentity, _text: &str) {
        self.metrics.messages_received.inc();
    }

    fn on_close(&self, _user: &UserIdentity) {
        self.metrics.connections_active.dec();
    }
}

/// Runs several hook sets in order
pub struct HookChain {
    hooks: Vec<Arc<dyn ChatHooks>>,
}

impl HookChain {
    pub fn new(hooks: Vec<Arc<dyn ChatHooks>>) -> Self {
        Self { hooks }
    }
}

impl ChatHooks for HookChain {
    fn on_connect(&self, user: &UserIdentity) {
        for hook in &self.hooks {
            hook.on_connect(user);
        }
    }

    fn on_message(&self, user: &UserIdentity, text: &str) {
        for hook in &self.hooks {
            hook.on_message(user, text);
        }
    }

    fn on_close(&self, user: &UserIdentity) {
        for hook in &self.hooks {
            hook.on_close(user);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_hooks_track_active_connections() {
        let metrics = Arc::new(ChatMetrics::new().unwrap());
        let hooks = MetricsHooks::new(metrics.clone());
        let user = UserIdentity::new(1u64, "Alice", 1);

        hooks.on_connect(&user);
        hooks.on_connect(&user);
        hooks.on_message(&user, "hi");
        hooks.on_close(&user);

        assert_eq!(metrics.connections_opened.get(), 2);
        assert_eq!(metrics.connections_active.get(), 1);
        assert_eq!(metrics.messages_received.get(), 1);
    }

    #[test]
    fn test_chain_runs_every_hook() {
        let first = Arc::new(ChatMetrics::new().unwrap());
        let second = Arc::new(ChatMetrics::new().unwrap());
        let hooks: Vec<Arc<dyn ChatHooks>> = vec![
            Arc::new(NoopHooks),
            Arc::new(MetricsHooks::new(first.clone())),
            Arc::new(MetricsHooks::new(second.clone())),
        ];
        let chain = HookChain::new(hooks);

        chain.on_message(&UserIdentity::new(1u64, "Alice", 1), "hi");
        assert_eq!(first.messages_received.get(), 1);
        assert_eq!(second.messages_received.get(), 1);
    }
}

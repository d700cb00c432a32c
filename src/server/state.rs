use std::sync::Arc;

use crate::config::Settings;
use crate::queue::QueueRegistry;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<QueueRegistry>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let registry = Arc::new(
            QueueRegistry::new(settings.queue.delay())
                .with_max_channels(settings.queue.max_channels),
        );
        Self::with_registry(settings, registry)
    }

    /// Build state around an existing registry (e.g. one on a manual clock)
    pub fn with_registry(settings: Settings, registry: Arc<QueueRegistry>) -> Self {
        Self {
            settings: Arc::new(settings),
            registry,
        }
    }
}

use std::sync::Arc;

use morpho_core::{Config, ConversionService, JobScheduler, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    service: Arc<ConversionService>,
    scheduler: Arc<JobScheduler>,
}

impl AppState {
    pub fn new(config: Config, service: Arc<ConversionService>, scheduler: Arc<JobScheduler>) -> Self {
        Self {
            config,
            service,
            scheduler,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn service(&self) -> &ConversionService {
        &self.service
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }
}

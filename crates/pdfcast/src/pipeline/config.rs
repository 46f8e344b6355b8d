use std::time::Duration;

use crate::config::Config;

use super::retry::RetryPolicy;

pub struct PipelineConfig {
    /// `None` lets a stage run for as long as it takes.
    pub stage_timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stage_timeout: config.stage_timeout_secs.map(Duration::from_secs),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

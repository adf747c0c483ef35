//! Layered configuration (§1a expansion): a config file, overridden by
//! environment variables, the way this repo's other service binaries wire
//! up `config::Config`. Max-row limit and cache TTL are deliberately *not*
//! fields here — they are compile-time contract constants in
//! `continent_core::model` (§6).
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

fn default_worker_concurrency() -> usize {
    10
}

fn default_task_queue() -> String {
    "continent-tq".to_owned()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Durable Store (C1) connection string.
    pub database_url: String,
    /// Hot Cache (C2) connection string.
    pub redis_url: String,
    /// Sizes both the durable-store connection pool and the bounded
    /// workflow worker pool (§5): "recommended pool size ≈ worker
    /// concurrency".
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    /// Orchestrator task queue name; informational in this crate, since the
    /// `WorkflowEngine` is in-process rather than queue-backed (§4.3a).
    #[serde(default = "default_task_queue")]
    pub task_queue: String,
}

impl Settings {
    /// Loads `config/continent.{toml,yaml,json,...}` (if present) then
    /// applies `CONTINENT__*` environment overrides, `__` separating nested
    /// keys (there are none today, but this keeps the convention ready).
    pub fn load() -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .add_source(File::with_name("config/continent").required(false))
            .add_source(Environment::with_prefix("CONTINENT").separator("__"))
            .build()?;
        cfg.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_only_required_fields_are_set() {
        std::env::set_var("CONTINENT__DATABASE_URL", "postgres://localhost/continent_test");
        std::env::set_var("CONTINENT__REDIS_URL", "redis://localhost");
        let settings = Settings::load().expect("settings load from env");
        assert_eq!(settings.worker_concurrency, 10);
        assert_eq!(settings.task_queue, "continent-tq");
        std::env::remove_var("CONTINENT__DATABASE_URL");
        std::env::remove_var("CONTINENT__REDIS_URL");
    }
}

//! Pipeline configuration.
//!
//! Every field has a default; `from_env` overrides them from `JIPCY_*`
//! variables. Values that are set but do not parse are configuration errors,
//! not silently ignored.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{JipcyError, Result};
use crate::evaluator::EvaluatorConfig;
use crate::notify::NotifyConfig;
use crate::retry::RetryPolicy;
use crate::scheduler::SchedulerConfig;
use crate::thread_finder::ThreadFinderConfig;

pub const ENV_SCORE_THRESHOLD: &str = "JIPCY_SCORE_THRESHOLD";
pub const ENV_MAX_CONCURRENCY: &str = "JIPCY_MAX_CONCURRENCY";
pub const ENV_TOP_K: &str = "JIPCY_TOP_K";
pub const ENV_RETRY_ATTEMPTS: &str = "JIPCY_RETRY_ATTEMPTS";
pub const ENV_RETRY_DELAY_MS: &str = "JIPCY_RETRY_DELAY_MS";
pub const ENV_NOTIFY_INTERVAL_MS: &str = "JIPCY_NOTIFY_INTERVAL_MS";
pub const ENV_NOTIFY_CAPACITY: &str = "JIPCY_NOTIFY_CAPACITY";

/// Configuration of the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    pub evaluator: EvaluatorConfig,
    pub scheduler: SchedulerConfig,
    pub threads: ThreadFinderConfig,
    /// Retry policy of query generation plus tracker search.
    pub query_retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            evaluator: EvaluatorConfig::default(),
            scheduler: SchedulerConfig::default(),
            threads: ThreadFinderConfig::default(),
            query_retry: RetryPolicy::new(3, Duration::from_secs(1)),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var(ENV_SCORE_THRESHOLD) {
            cfg.evaluator.score_threshold = parse(ENV_SCORE_THRESHOLD, &v)?;
        }
        if let Some(v) = var(ENV_RETRY_ATTEMPTS) {
            cfg.evaluator.retry.max_attempts = parse(ENV_RETRY_ATTEMPTS, &v)?;
        }
        if let Some(v) = var(ENV_RETRY_DELAY_MS) {
            cfg.evaluator.retry.delay_ms = parse(ENV_RETRY_DELAY_MS, &v)?;
        }
        if let Some(v) = var(ENV_MAX_CONCURRENCY) {
            cfg.scheduler.max_concurrency = parse(ENV_MAX_CONCURRENCY, &v)?;
        }
        if let Some(v) = var(ENV_TOP_K) {
            cfg.scheduler.top_k = parse(ENV_TOP_K, &v)?;
        }
        if let Some(v) = var(ENV_NOTIFY_INTERVAL_MS) {
            cfg.scheduler.notify.interval_ms = parse(ENV_NOTIFY_INTERVAL_MS, &v)?;
        }
        if let Some(v) = var(ENV_NOTIFY_CAPACITY) {
            cfg.scheduler.notify.capacity = parse(ENV_NOTIFY_CAPACITY, &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.evaluator.score_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(JipcyError::InvalidConfig(format!(
                "score threshold {} is outside [0, 1]",
                threshold
            )));
        }
        if self.scheduler.max_concurrency == 0 {
            return Err(JipcyError::InvalidConfig(
                "max concurrency must be at least 1".to_string(),
            ));
        }
        if self.scheduler.top_k == 0 {
            return Err(JipcyError::InvalidConfig(
                "top-k must be at least 1".to_string(),
            ));
        }
        if self.evaluator.retry.max_attempts == 0 || self.query_retry.max_attempts == 0 {
            return Err(JipcyError::InvalidConfig(
                "retry attempts must be at least 1".to_string(),
            ));
        }
        if self.scheduler.notify.capacity == 0 {
            return Err(JipcyError::InvalidConfig(
                "notification capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| JipcyError::InvalidConfig(format!("{}={:?}: {}", name, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.evaluator.score_threshold, 0.3);
        assert_eq!(cfg.scheduler.max_concurrency, 5);
        assert_eq!(cfg.scheduler.top_k, 5);
        assert_eq!(cfg.evaluator.retry.delay_ms, 3_000);
        assert_eq!(cfg.query_retry.delay_ms, 1_000);
        assert_eq!(cfg.threads.search_count, 10);
        assert_eq!(cfg.scheduler.notify.interval_ms, 500);
    }

    #[test]
    fn test_env_overrides() {
        let cfg = PipelineConfig::from_lookup(lookup(&[
            (ENV_SCORE_THRESHOLD, "0.5"),
            (ENV_MAX_CONCURRENCY, "2"),
            (ENV_TOP_K, "3"),
            (ENV_RETRY_ATTEMPTS, "4"),
            (ENV_RETRY_DELAY_MS, "10"),
            (ENV_NOTIFY_CAPACITY, " 8 "),
        ]))
        .unwrap();
        assert_eq!(cfg.evaluator.score_threshold, 0.5);
        assert_eq!(cfg.scheduler.max_concurrency, 2);
        assert_eq!(cfg.scheduler.top_k, 3);
        assert_eq!(cfg.evaluator.retry.max_attempts, 4);
        assert_eq!(cfg.evaluator.retry.delay_ms, 10);
        assert_eq!(cfg.scheduler.notify.capacity, 8);
    }

    #[test]
    fn test_unparseable_value_is_error() {
        let err = PipelineConfig::from_lookup(lookup(&[(ENV_TOP_K, "five")])).unwrap_err();
        assert!(matches!(err, JipcyError::InvalidConfig(_)));
        assert!(err.to_string().contains(ENV_TOP_K));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let err = PipelineConfig::from_lookup(lookup(&[(ENV_SCORE_THRESHOLD, "1.5")])).unwrap_err();
        assert!(err.to_string().contains("outside"));

        let mut cfg = PipelineConfig::default();
        cfg.scheduler.max_concurrency = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PipelineConfig::default();
        cfg.evaluator.retry.max_attempts = 0;
        assert!(cfg.validate().is_err());
    }
}

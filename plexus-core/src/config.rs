//! Graph Configuration
//!
//! Policies that control how long memoized outcomes live and whether
//! failures are replayed. Loadable from JSON so a host application can keep
//! them next to the rest of its settings.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How long memoized node outcomes are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    /// Outcomes persist for the lifetime of the graph.
    #[default]
    Graph,

    /// Every entry point run resolves against a fresh cache.
    EntryPoint,
}

/// What happens to a node whose resolution failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The failure is cached and replayed to later callers.
    #[default]
    Poison,

    /// The node returns to idle and the next resolve re-attempts it.
    Retry,
}

impl FailurePolicy {
    pub fn caches_failures(self) -> bool {
        self == FailurePolicy::Poison
    }
}

/// Configuration for a [`Graph`](crate::Graph).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub cache_scope: CacheScope,
    pub failure_policy: FailurePolicy,

    /// Start each node evaluation on the current tokio runtime, if any, as
    /// soon as it is claimed instead of when some caller first polls it.
    pub spawn_tasks: bool,
}

impl GraphConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_cache_scope(mut self, cache_scope: CacheScope) -> Self {
        self.cache_scope = cache_scope;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn with_spawn_tasks(mut self, spawn_tasks: bool) -> Self {
        self.spawn_tasks = spawn_tasks;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_persist_and_poison() {
        let config = GraphConfig::default();
        assert_eq!(config.cache_scope, CacheScope::Graph);
        assert_eq!(config.failure_policy, FailurePolicy::Poison);
        assert!(!config.spawn_tasks);
    }

    #[test]
    fn parse_partial_json() {
        let config = GraphConfig::from_json(r#"{"failure_policy": "retry"}"#).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Retry);
        assert_eq!(config.cache_scope, CacheScope::Graph);
    }

    #[test]
    fn parse_full_json() {
        let json = r#"{
            "cache_scope": "entry_point",
            "failure_policy": "poison",
            "spawn_tasks": true
        }"#;

        let config = GraphConfig::from_json(json).unwrap();
        assert_eq!(
            config,
            GraphConfig::default()
                .with_cache_scope(CacheScope::EntryPoint)
                .with_spawn_tasks(true)
        );
    }

    #[test]
    fn reject_unknown_policy() {
        let err = GraphConfig::from_json(r#"{"failure_policy": "sometimes"}"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid graph config"));
    }
}

//! Engine configuration with environment overrides.

use std::time::Duration;

/// Tunables for the execution engine.
///
/// Defaults suit tests and small deployments; `from_env` reads
/// `TRELLIS_*` overrides the way the server binary boots.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap on concurrently running parallel-node branches and fork
    /// targets, engine-wide.
    pub max_parallel_branches: usize,
    /// Hard ceiling on rubric-driven auto-backtracks per source node.
    pub rubric_auto_backtrack_cap: u32,
    /// Maximum sub-workflow nesting depth.
    pub max_subworkflow_depth: usize,
    /// Plan revisions allowed per execution of a planning node.
    pub plan_revision_cap: u32,
    /// Timeout applied to tool calls that do not specify one.
    pub default_tool_timeout: Duration,
    /// Safety cap on interpreter iterations per execution.
    pub max_steps: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_branches: 8,
            rubric_auto_backtrack_cap: 3,
            max_subworkflow_depth: 4,
            plan_revision_cap: 1,
            default_tool_timeout: Duration::from_secs(60),
            max_steps: 1000,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `TRELLIS_*` environment variables.
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse("TRELLIS_MAX_PARALLEL_BRANCHES") {
            config.max_parallel_branches = v;
        }
        if let Some(v) = env_parse("TRELLIS_RUBRIC_AUTO_BACKTRACK_CAP") {
            config.rubric_auto_backtrack_cap = v;
        }
        if let Some(v) = env_parse("TRELLIS_MAX_SUBWORKFLOW_DEPTH") {
            config.max_subworkflow_depth = v;
        }
        if let Some(v) = env_parse("TRELLIS_PLAN_REVISION_CAP") {
            config.plan_revision_cap = v;
        }
        if let Some(v) = env_parse::<u64>("TRELLIS_TOOL_TIMEOUT_MS") {
            config.default_tool_timeout = Duration::from_millis(v);
        }
        if let Some(v) = env_parse("TRELLIS_MAX_STEPS") {
            config.max_steps = v;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.rubric_auto_backtrack_cap, 3);
        assert_eq!(config.plan_revision_cap, 1);
        assert!(config.max_parallel_branches > 0);
    }
}

//! Loop-prevention limits read once at workflow construction.

use serde::{Deserialize, Serialize};

/// Hard ceilings that bound every run.
///
/// These are the only knobs the core reads: the total routing-cycle
/// ceiling, the per-node repeat-visit threshold, and the per-entry debate
/// round cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLimits {
    /// Maximum routing decision cycles before the run is forced terminal.
    pub max_iterations: u32,
    /// A node already visited more than this many times is excluded from
    /// routing, so no node executes more than `history_threshold + 1` times.
    pub history_threshold: u32,
    /// Maximum full advocate/arbiter passes per debate entry. Takes
    /// precedence over the arbiter's own continuation verdict.
    pub debate_round_limit: u32,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            history_threshold: 1,
            debate_round_limit: 3,
        }
    }
}

impl RunLimits {
    /// Layer environment overrides over the defaults.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_iterations: env_u32("PANEL_MAX_ITERATIONS", d.max_iterations),
            history_threshold: env_u32("PANEL_HISTORY_THRESHOLD", d.history_threshold),
            debate_round_limit: env_u32("PANEL_DEBATE_ROUND_LIMIT", d.debate_round_limit),
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = RunLimits::default();
        assert_eq!(limits.max_iterations, 8);
        assert_eq!(limits.history_threshold, 1);
        assert_eq!(limits.debate_round_limit, 3);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("PANEL_MAX_ITERATIONS", "3");
        let limits = RunLimits::from_env();
        assert_eq!(limits.max_iterations, 3);
        assert_eq!(limits.history_threshold, RunLimits::default().history_threshold);
        std::env::remove_var("PANEL_MAX_ITERATIONS");
    }

    #[test]
    fn test_env_garbage_falls_back_to_default() {
        std::env::set_var("PANEL_DEBATE_ROUND_LIMIT", "not-a-number");
        let limits = RunLimits::from_env();
        assert_eq!(
            limits.debate_round_limit,
            RunLimits::default().debate_round_limit
        );
        std::env::remove_var("PANEL_DEBATE_ROUND_LIMIT");
    }
}

//! Execution resource limits.

use serde::{Deserialize, Serialize};

/// Default cap on call-stack depth, matching CPython's default recursion
/// limit.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Limits enforced while a program runs.
///
/// The recursion cap is checked before each frame push; the instruction
/// budget, when set, is decremented per dispatched instruction. Hitting
/// either limit aborts the run with a fault.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum call-stack depth, counting the module frame.
    pub max_recursion_depth: usize,
    /// Total instruction budget across all frames, or `None` for
    /// unbounded execution.
    pub max_instructions: Option<u64>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            max_instructions: None,
        }
    }
}

impl ResourceLimits {
    /// No limits at all; runaway programs will not be stopped.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_recursion_depth: usize::MAX,
            max_instructions: None,
        }
    }

    /// Limits with an instruction budget.
    #[must_use]
    pub fn with_budget(max_instructions: u64) -> Self {
        Self {
            max_instructions: Some(max_instructions),
            ..Self::default()
        }
    }
}

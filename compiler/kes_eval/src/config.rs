//! Execution limits.

/// Limits applied while running a module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineConfig {
    /// Instructions (including terminators) executed before giving up.
    pub max_steps: u64,
    /// Nested calls before giving up.
    pub max_call_depth: usize,
    /// Bytes of heap plus stack memory.
    pub memory_limit: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            max_steps: 10_000_000,
            max_call_depth: 2_000,
            memory_limit: 64 * 1024 * 1024,
        }
    }
}

impl MachineConfig {
    /// Tight limits for tests that expect runaway programs to stop quickly.
    pub fn small() -> Self {
        MachineConfig {
            max_steps: 100_000,
            max_call_depth: 200,
            memory_limit: 1024 * 1024,
        }
    }
}

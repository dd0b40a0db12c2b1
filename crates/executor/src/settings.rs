use std::time::Duration;

/// Bounds applied to every storage interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Upper bound on a single storage call.
    pub storage_timeout: Duration,
    /// How many times a conflicting transaction is re-run before giving up.
    pub max_conflict_retries: u32,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            storage_timeout: Duration::from_millis(2000),
            max_conflict_retries: 5,
        }
    }
}

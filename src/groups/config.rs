use std::time::Duration;

/// What to do when the directory refresh for unknown candidates fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectoryFailurePolicy {
    /// Log and keep going with the candidates already known to be registered.
    /// If none are, report `NETWORK`.
    Continue,
    /// Report `NETWORK` immediately.
    Abort,
}

/// Add-members workflow configuration.
#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    /// Upper bound on the capability refresh for announcement groups.
    pub capability_wait: Duration,
    /// Forwarded to the directory refresh.
    pub notify_directory_completion: bool,
    pub directory_failure: DirectoryFailurePolicy,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            capability_wait: Duration::from_secs(10),
            notify_directory_completion: false,
            directory_failure: DirectoryFailurePolicy::Continue,
        }
    }
}

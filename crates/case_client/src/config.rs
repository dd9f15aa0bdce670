use std::time::Duration;

pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(3);
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub notification_ttl: Duration,
    pub reset_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
            reset_delay: DEFAULT_RESET_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

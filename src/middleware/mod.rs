// Middleware for resilient collaborator calls
//
// Provides the retry/backoff decision used by the translation orchestrator

pub mod retry;

// Re-export commonly used types
pub use retry::{policy_from_config, ExponentialBackoff, FixedDelay, RetryPolicy};

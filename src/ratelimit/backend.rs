//! Admission trait for abstracting the limiter used by the submitter.

use async_trait::async_trait;

use crate::error::Result;

/// Trait for anything that gates outbound calls.
///
/// `DocumentSubmitter` only depends on this trait, so tests and embedders
/// can swap the fixed-window `RateLimiter` for another policy.
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Wait until one call may proceed.
    async fn acquire(&self) -> Result<()>;
}

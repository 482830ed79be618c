//! Connectivity probe contract.

use async_trait::async_trait;

/// A cheap yes/no connectivity check for one external dependency.
///
/// Probes are polled by the health monitors; they must not retry internally
/// and should bound their own latency (a hung probe stalls its monitor loop).
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn is_healthy(&self) -> bool;
}

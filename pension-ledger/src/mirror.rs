//! Best-effort chain mirror side channel
//!
//! Contributions and withdrawals may be mirrored to an external chain,
//! which returns a correlation hash that gets attached to the local
//! entry's `tx_token`. Mirroring never gates ledger correctness: every
//! attempt is bounded by a timeout, and failure is logged and counted but
//! never surfaced as a ledger error. The local append proceeds either way,
//! so no compensation is needed when a mirror call fails.

use crate::metrics::Metrics;
use rust_decimal::Decimal;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use uuid::Uuid;

/// Boxed future returned by mirror implementations
pub type MirrorFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

/// External ledger mirror
///
/// Implementations record a proportional value on an external chain and
/// return a correlation hash. The trait is object-safe so the ledger can
/// hold a `dyn` handle injected at startup.
pub trait ChainMirror: Send + Sync {
    /// Attempt to mirror `(user_id, amount)`; the error is a human-readable
    /// reason, consumed only by logs
    fn record(&self, user_id: Uuid, amount: Decimal) -> MirrorFuture<'_>;
}

/// Mirror that records nothing and returns no hash
///
/// Stands in when mirroring is disabled; also useful as a test double.
#[derive(Debug, Default)]
pub struct NoopMirror;

impl ChainMirror for NoopMirror {
    fn record(&self, _user_id: Uuid, _amount: Decimal) -> MirrorFuture<'_> {
        Box::pin(async { Err("mirroring disabled".to_string()) })
    }
}

/// Run one bounded mirror attempt
///
/// Returns the correlation hash on success, `None` on failure or timeout.
/// Failures are logged at warn level and counted in metrics.
pub async fn mirror_or_log(
    mirror: &dyn ChainMirror,
    user_id: Uuid,
    amount: Decimal,
    timeout: Duration,
    metrics: &Metrics,
) -> Option<String> {
    match tokio::time::timeout(timeout, mirror.record(user_id, amount)).await {
        Ok(Ok(hash)) => {
            tracing::debug!(%user_id, %amount, hash = %hash, "Chain mirror recorded");
            Some(hash)
        }
        Ok(Err(reason)) => {
            tracing::warn!(%user_id, %amount, reason = %reason, "Chain mirror failed");
            metrics.record_mirror_failure();
            None
        }
        Err(_) => {
            tracing::warn!(%user_id, %amount, ?timeout, "Chain mirror timed out");
            metrics.record_mirror_failure();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedMirror(String);

    impl ChainMirror for FixedMirror {
        fn record(&self, _user_id: Uuid, _amount: Decimal) -> MirrorFuture<'_> {
            let hash = self.0.clone();
            Box::pin(async move { Ok(hash) })
        }
    }

    struct StalledMirror;

    impl ChainMirror for StalledMirror {
        fn record(&self, _user_id: Uuid, _amount: Decimal) -> MirrorFuture<'_> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok("too-late".to_string())
            })
        }
    }

    #[tokio::test]
    async fn test_successful_mirror_returns_hash() {
        let metrics = Metrics::new().unwrap();
        let mirror = FixedMirror("0xdeadbeef".to_string());
        let hash = mirror_or_log(
            &mirror,
            Uuid::new_v4(),
            Decimal::from(10),
            Duration::from_millis(100),
            &metrics,
        )
        .await;
        assert_eq!(hash.as_deref(), Some("0xdeadbeef"));
        assert_eq!(metrics.mirror_failures_total.get(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_swallowed_and_counted() {
        let metrics = Metrics::new().unwrap();
        let hash = mirror_or_log(
            &NoopMirror,
            Uuid::new_v4(),
            Decimal::from(10),
            Duration::from_millis(100),
            &metrics,
        )
        .await;
        assert!(hash.is_none());
        assert_eq!(metrics.mirror_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_bounded() {
        let metrics = Metrics::new().unwrap();
        let start = std::time::Instant::now();
        let hash = mirror_or_log(
            &StalledMirror,
            Uuid::new_v4(),
            Decimal::from(10),
            Duration::from_millis(20),
            &metrics,
        )
        .await;
        assert!(hash.is_none());
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(metrics.mirror_failures_total.get(), 1);
    }
}

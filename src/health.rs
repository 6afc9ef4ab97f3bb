//! Backend availability monitor.
//!
//! Decides, cheaply, whether the remote backend should be used for the
//! current request. Probe results are cached for a bounded interval so a
//! down backend is not hammered on every request; the timestamp is updated
//! on failures too, which is what prevents retry storms.
//!
//! State is shared process-wide and read concurrently by in-flight requests;
//! concurrent refreshes are last-writer-wins. A briefly stale "available"
//! reading at worst costs one failed remote attempt, which per-call fallback
//! absorbs.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::remote::RemoteBackend;

#[derive(Debug, Clone, Copy)]
struct HealthState {
    available: bool,
    last_checked: Option<Instant>,
}

pub struct BackendMonitor {
    state: RwLock<HealthState>,
    check_interval: Duration,
    probe_timeout: Duration,
}

impl BackendMonitor {
    /// Starts in the "unknown/unavailable, never checked" state, so the
    /// first call always probes.
    pub fn new(check_interval: Duration, probe_timeout: Duration) -> Self {
        Self {
            state: RwLock::new(HealthState {
                available: false,
                last_checked: None,
            }),
            check_interval,
            probe_timeout,
        }
    }

    /// Whether the remote backend should be used right now.
    ///
    /// Returns the cached answer without any I/O when the last probe is
    /// fresher than the check interval; otherwise performs one
    /// bounded-timeout liveness probe. Never returns an error; probe
    /// failures degrade to `false`.
    pub async fn is_available(&self, backend: &dyn RemoteBackend) -> bool {
        {
            let state = self.state.read().unwrap();
            if let Some(last) = state.last_checked {
                if last.elapsed() < self.check_interval {
                    return state.available;
                }
            }
        }

        let available =
            match tokio::time::timeout(self.probe_timeout, backend.health()).await {
                Ok(Ok(())) => true,
                Ok(Err(err)) => {
                    tracing::debug!(error = %err, "backend health probe failed");
                    false
                }
                Err(_) => {
                    tracing::debug!(
                        timeout_secs = self.probe_timeout.as_secs(),
                        "backend health probe timed out"
                    );
                    false
                }
            };

        let mut state = self.state.write().unwrap();
        state.available = available;
        state.last_checked = Some(Instant::now());
        available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use crate::remote::{RemoteChunk, RemoteIngest};

    struct ProbeCounter {
        healthy: bool,
        probes: AtomicUsize,
    }

    impl ProbeCounter {
        fn new(healthy: bool) -> Self {
            Self {
                healthy,
                probes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RemoteBackend for ProbeCounter {
        async fn health(&self) -> Result<()> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.healthy {
                Ok(())
            } else {
                bail!("connection refused")
            }
        }

        async fn upload(&self, _: &str, _: &str, _: &[u8]) -> Result<RemoteIngest> {
            unreachable!("probe-only fake")
        }

        async fn search(&self, _: &str, _: &str, _: i64) -> Result<Vec<RemoteChunk>> {
            unreachable!("probe-only fake")
        }

        async fn delete(&self, _: &str) -> Result<()> {
            unreachable!("probe-only fake")
        }
    }

    #[tokio::test]
    async fn test_result_cached_within_interval() {
        let monitor = BackendMonitor::new(Duration::from_secs(30), Duration::from_secs(2));
        let backend = ProbeCounter::new(true);

        assert!(monitor.is_available(&backend).await);
        assert!(monitor.is_available(&backend).await);
        assert!(monitor.is_available(&backend).await);
        assert_eq!(backend.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_unavailable() {
        let monitor = BackendMonitor::new(Duration::from_secs(30), Duration::from_secs(2));
        let backend = ProbeCounter::new(false);

        assert!(!monitor.is_available(&backend).await);
        // Failure is cached too, so there is no immediate retry storm.
        assert!(!monitor.is_available(&backend).await);
        assert_eq!(backend.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_interval_reprobes() {
        let monitor = BackendMonitor::new(Duration::ZERO, Duration::from_secs(2));
        let backend = ProbeCounter::new(true);

        assert!(monitor.is_available(&backend).await);
        assert!(monitor.is_available(&backend).await);
        assert_eq!(backend.probes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_hung_probe_times_out() {
        struct Hung;

        #[async_trait]
        impl RemoteBackend for Hung {
            async fn health(&self) -> Result<()> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
            async fn upload(&self, _: &str, _: &str, _: &[u8]) -> Result<RemoteIngest> {
                unreachable!()
            }
            async fn search(&self, _: &str, _: &str, _: i64) -> Result<Vec<RemoteChunk>> {
                unreachable!()
            }
            async fn delete(&self, _: &str) -> Result<()> {
                unreachable!()
            }
        }

        tokio::time::pause();
        let monitor = BackendMonitor::new(Duration::from_secs(30), Duration::from_secs(2));
        let fut = monitor.is_available(&Hung);
        tokio::pin!(fut);

        // Advance past the probe timeout; the monitor must give up.
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(!fut.await);
    }
}

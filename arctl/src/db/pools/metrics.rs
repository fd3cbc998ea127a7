//! Database pool metrics sampling.
//!
//! Provides a background task that periodically samples the managed pool and records
//! metrics for observability. Ticks are skipped while the manager has no live pool
//! (before first use or after shutdown).

use std::sync::Arc;
use std::time::Duration;

use metrics::gauge;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::PoolManager;

/// Configuration for pool metrics sampling
#[derive(Debug, Clone)]
pub struct PoolMetricsConfig {
    /// How often to sample pool metrics
    pub sample_interval: Duration,
}

impl Default for PoolMetricsConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(5),
        }
    }
}

/// Point-in-time view of the managed pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSample {
    pub size: u32,
    pub idle: usize,
    pub in_use: usize,
    pub max: u32,
}

/// Sample the live pool without creating one.
pub fn sample(manager: &PoolManager) -> Option<PoolSample> {
    let pool = manager.current()?;
    let size = pool.size();
    let idle = pool.num_idle();
    Some(PoolSample {
        size,
        idle,
        in_use: (size as usize).saturating_sub(idle),
        max: pool.options().get_max_connections(),
    })
}

/// Start the pool metrics sampler background task.
///
/// This task periodically samples the pool state and records:
/// - `arctl_db_pool_connections_total` - Total connections in the pool
/// - `arctl_db_pool_connections_idle` - Idle connections available
/// - `arctl_db_pool_connections_in_use` - Connections currently in use
/// - `arctl_db_pool_connections_max` - Maximum configured connections
pub async fn run_pool_metrics_sampler(
    manager: Arc<PoolManager>,
    config: PoolMetricsConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!("Starting pool metrics sampler with {:?} interval", config.sample_interval);

    let mut interval = tokio::time::interval(config.sample_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Pool metrics sampler shutting down");
                break;
            }
            _ = interval.tick() => {
                let Some(sample) = sample(&manager) else {
                    continue;
                };

                gauge!("arctl_db_pool_connections_max").set(sample.max as f64);
                gauge!("arctl_db_pool_connections_total").set(sample.size as f64);
                gauge!("arctl_db_pool_connections_idle").set(sample.idle as f64);
                gauge!("arctl_db_pool_connections_in_use").set(sample.in_use as f64);

                debug!(
                    size = sample.size,
                    idle = sample.idle,
                    in_use = sample.in_use,
                    "Sampled pool metrics"
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;

    #[tokio::test]
    async fn test_sample_without_pool_is_skipped() {
        let manager = PoolManager::new(create_test_config().database);

        assert_eq!(sample(&manager), None);
        // Sampling must not create a pool
        assert_eq!(manager.pools_created(), 0);
    }

    #[tokio::test]
    async fn test_sample_lazy_pool_has_no_connections() {
        let config = create_test_config();
        let manager = PoolManager::new(config.database.clone());
        manager.acquire().await;

        let sample = sample(&manager).expect("pool is live");

        assert_eq!(sample.size, 0);
        assert_eq!(sample.in_use, 0);
        assert_eq!(sample.max, config.database.pool.max_connections);
    }

    #[tokio::test]
    async fn test_pool_metrics_sampler_runs_and_shuts_down() {
        let manager = Arc::new(PoolManager::new(create_test_config().database));
        manager.acquire().await;

        let shutdown = CancellationToken::new();
        let config = PoolMetricsConfig {
            sample_interval: Duration::from_millis(10),
        };

        let handle = tokio::spawn(run_pool_metrics_sampler(manager.clone(), config, shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished(), "Sampler should still be running");

        shutdown.cancel();

        let result = handle.await.unwrap();
        assert!(result.is_ok(), "Sampler should exit cleanly");
        assert_eq!(manager.pools_created(), 1);
    }

    #[test]
    fn test_pool_metrics_config_default() {
        let config = PoolMetricsConfig::default();
        assert_eq!(config.sample_interval, Duration::from_secs(5));
    }
}

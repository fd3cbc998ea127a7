//! Process-wide database pool lifecycle.
//!
//! This module provides [`PoolManager`], the single owner of the application's Postgres
//! connection pool. The manager is created once at startup and shared by reference
//! (`Arc<PoolManager>` in [`crate::AppState`]); nothing else in the crate builds pools.
//!
//! # Lifecycle
//!
//! ```text
//!                  acquire()                       acquire()
//!   ┌───────────────┐ ───────────────────► ┌────────┐ ◄──┐
//!   │ Uninitialized │                      │ Active │ ───┘
//!   └───────────────┘ ◄─────────────────── └────────┘
//!        ▲    │            shutdown()
//!        └────┘ shutdown() (no-op)
//! ```
//!
//! - [`PoolManager::acquire`] returns the live pool, creating it on first use. Creation is
//!   lazy: no connection is opened until a query needs one, so acquire never fails.
//!   Connection problems surface on first real use as [`DbError::Connection`].
//! - [`PoolManager::shutdown`] clears the live pool and waits for its connections to close.
//!   Calling it with no live pool is a no-op, so it is idempotent.
//!
//! # Concurrency
//!
//! Creation and shutdown are serialized by an async mutex, so concurrent first callers
//! create exactly one pool. Once a pool is live, [`PoolManager::acquire`] is a lock-free
//! atomic load. A shutdown holds the mutex for its whole duration: an acquire racing with
//! it waits and then creates a fresh pool instead of handing out the closing one.
//!
//! # Example
//!
//! ```ignore
//! let manager = Arc::new(PoolManager::new(config.database.clone()));
//!
//! let pool = manager.acquire().await;
//! let mut tx = pool.begin().await?;
//!
//! manager.shutdown().await?;
//! ```

pub mod metrics;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{DatabaseConfig, PoolSettings};
use crate::db::errors::DbError;
use crate::types::abbrev_uuid;

pub use metrics::{PoolMetricsConfig, run_pool_metrics_sampler};

/// Errors raised while tearing a pool down.
#[derive(Error, Debug)]
pub enum ShutdownError {
    /// Connections were still checked out when the shutdown bound elapsed
    #[error("database pool {pool_id} did not drain within {timeout:?}")]
    DrainTimeout { pool_id: Uuid, timeout: Duration },
}

/// Lifecycle state of a [`PoolManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Uninitialized,
    Active,
}

/// A pool created by a [`PoolManager`], together with the identity of its creation event.
///
/// Dereferences to [`PgPool`], so it can be used anywhere a pool is expected
/// (`pool.begin()`, `&**pool` as an executor, ...).
#[derive(Debug)]
pub struct ManagedPool {
    id: Uuid,
    generation: u64,
    created_at: DateTime<Utc>,
    pool: PgPool,
}

impl ManagedPool {
    /// Unique identity of this creation event.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 1 for the first pool a manager creates, 2 for the next, and so on.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The underlying sqlx pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Deref for ManagedPool {
    type Target = PgPool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}

/// Owner of the process-wide connection pool.
pub struct PoolManager {
    config: DatabaseConfig,
    current: ArcSwapOption<ManagedPool>,
    lifecycle: Mutex<()>,
    created: AtomicU64,
}

impl PoolManager {
    /// Create a manager in the `Uninitialized` state. No pool is built until the first
    /// [`acquire`](Self::acquire).
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            current: ArcSwapOption::empty(),
            lifecycle: Mutex::new(()),
            created: AtomicU64::new(0),
        }
    }

    /// Create a manager that is already `Active` with an externally built pool.
    ///
    /// Used when the caller owns pool construction, as `#[sqlx::test]` does. A later
    /// [`shutdown`](Self::shutdown) closes this pool like any other.
    pub fn with_pool(config: DatabaseConfig, pool: PgPool) -> Self {
        let managed = ManagedPool {
            id: Uuid::new_v4(),
            generation: 1,
            created_at: Utc::now(),
            pool,
        };
        Self {
            config,
            current: ArcSwapOption::from_pointee(managed),
            lifecycle: Mutex::new(()),
            created: AtomicU64::new(1),
        }
    }

    /// Return the live pool, creating it if there is none.
    #[instrument(skip(self))]
    pub async fn acquire(&self) -> Arc<ManagedPool> {
        if let Some(pool) = self.current.load_full() {
            return pool;
        }

        let _guard = self.lifecycle.lock().await;
        // Another caller may have created the pool while we waited for the lock
        if let Some(pool) = self.current.load_full() {
            return pool;
        }

        let generation = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let managed = Arc::new(ManagedPool {
            id: Uuid::new_v4(),
            generation,
            created_at: Utc::now(),
            pool: pool_options(&self.config.pool).connect_lazy_with(connect_options(&self.config)),
        });
        self.current.store(Some(managed.clone()));

        ::metrics::counter!("arctl_db_pools_created_total").increment(1);
        info!(
            pool_id = %abbrev_uuid(&managed.id),
            generation,
            host = %self.config.host,
            port = self.config.port,
            database = %self.config.name,
            "Created database connection pool"
        );

        managed
    }

    /// Close the live pool, if any, and return to the `Uninitialized` state.
    ///
    /// Waits for checked-out connections to be returned, up to the configured
    /// `shutdown_timeout`. In-flight queries are not cancelled.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        let _guard = self.lifecycle.lock().await;

        let Some(managed) = self.current.swap(None) else {
            debug!("No database connection pool to shut down");
            return Ok(());
        };

        let timeout = self.config.shutdown_timeout;
        match tokio::time::timeout(timeout, managed.pool.close()).await {
            Ok(()) => {
                info!(
                    pool_id = %abbrev_uuid(&managed.id),
                    generation = managed.generation,
                    "Database connection pool closed"
                );
                Ok(())
            }
            Err(_) => {
                warn!(
                    pool_id = %abbrev_uuid(&managed.id),
                    in_use = (managed.pool.size() as usize).saturating_sub(managed.pool.num_idle()),
                    "Database connection pool did not drain within {:?}",
                    timeout
                );
                Err(ShutdownError::DrainTimeout {
                    pool_id: managed.id,
                    timeout,
                })
            }
        }
    }

    /// The live pool, without creating one.
    pub fn current(&self) -> Option<Arc<ManagedPool>> {
        self.current.load_full()
    }

    pub fn state(&self) -> PoolState {
        if self.current.load().is_some() {
            PoolState::Active
        } else {
            PoolState::Uninitialized
        }
    }

    /// Number of pools this manager has created so far.
    pub fn pools_created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    /// Check that the database is reachable through the live pool.
    #[instrument(skip(self), err)]
    pub async fn ping(&self) -> Result<(), DbError> {
        let pool = self.acquire().await;
        sqlx::query("SELECT 1").execute(pool.pool()).await?;
        Ok(())
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}

/// Connection parameters for the configured database.
pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.name)
        .username(&config.user)
        .application_name("arctl");
    if !config.password.is_empty() {
        options = options.password(&config.password);
    }
    options
}

/// Pool options built from configured settings. A zero timeout means "never".
pub fn pool_options(settings: &PoolSettings) -> PgPoolOptions {
    let to_duration = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(to_duration(settings.idle_timeout_secs))
        .max_lifetime(to_duration(settings.max_lifetime_secs))
}

//! TTL-cached access to the static snapshot.
//!
//! State machine: empty → cached → expired → cached. Readers share a read
//! lock while the snapshot is fresh. A refresh takes the write lock and
//! re-checks freshness first, so concurrent callers on expiry trigger a
//! single load and then observe its result.
//!
//! A failed load leaves the previous snapshot in place. The next call tries
//! again; nothing is retried internally.

use crate::loader::load_static_snapshot;
use crate::snapshot::StaticSnapshot;
use crate::sop::SopResolver;
use chrono::{DateTime, Utc};
use contextweave_core::error::RegistryError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// How long a loaded snapshot stays fresh unless configured otherwise.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Wall-clock source used for expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ── Metrics ───────────────────────────────────────────────────────────────

/// Cache counters.
#[derive(Debug, Default)]
pub struct RegistryMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    reloads: AtomicU64,
    load_failures: AtomicU64,
}

/// Point-in-time copy of [`RegistryMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub hits: u64,
    pub misses: u64,
    pub reloads: u64,
    pub load_failures: u64,
}

impl RegistryMetrics {
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
        }
    }

    fn record(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ── Registry ──────────────────────────────────────────────────────────────

struct CachedSnapshot {
    snapshot: Arc<StaticSnapshot>,
    expires_at: DateTime<Utc>,
}

impl CachedSnapshot {
    fn fresh_at(&self, now: DateTime<Utc>) -> Option<Arc<StaticSnapshot>> {
        (now < self.expires_at).then(|| Arc::clone(&self.snapshot))
    }
}

/// Caches the static snapshot loaded from a configuration root.
pub struct StaticRegistry {
    root: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    sop: Option<Arc<SopResolver>>,
    state: RwLock<Option<CachedSnapshot>>,
    metrics: RegistryMetrics,
}

impl StaticRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ttl: DEFAULT_TTL,
            clock: Arc::new(SystemClock),
            sop: None,
            state: RwLock::new(None),
            metrics: RegistryMetrics::default(),
        }
    }

    /// Set the freshness window. Zero falls back to [`DEFAULT_TTL`].
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = if ttl.is_zero() { DEFAULT_TTL } else { ttl };
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Resolve knowledge SOP references at load time.
    pub fn with_sop_resolver(mut self, resolver: Arc<SopResolver>) -> Self {
        self.sop = Some(resolver);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> RegistryStats {
        self.metrics.stats()
    }

    /// The current snapshot, loading it if absent or expired.
    pub async fn current_snapshot(&self) -> Result<Arc<StaticSnapshot>, RegistryError> {
        {
            let state = self.state.read().await;
            if let Some(snapshot) = state.as_ref().and_then(|c| c.fresh_at(self.clock.now())) {
                RegistryMetrics::record(&self.metrics.hits);
                return Ok(snapshot);
            }
        }

        let mut state = self.state.write().await;
        // Another caller may have refreshed while we waited for the write lock.
        if let Some(snapshot) = state.as_ref().and_then(|c| c.fresh_at(self.clock.now())) {
            RegistryMetrics::record(&self.metrics.hits);
            return Ok(snapshot);
        }

        RegistryMetrics::record(&self.metrics.misses);
        debug!(root = %self.root.display(), "Static context cache miss, loading");

        match self.load().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                let expires_at = ttl_deadline(snapshot.loaded_at, self.ttl);
                RegistryMetrics::record(&self.metrics.reloads);
                info!(
                    version = %snapshot.version,
                    personas = snapshot.personas.len(),
                    goals = snapshot.goals.len(),
                    policies = snapshot.policies.len(),
                    knowledge = snapshot.knowledge.len(),
                    worlds = snapshot.worlds.len(),
                    "Static context loaded"
                );
                *state = Some(CachedSnapshot {
                    snapshot: Arc::clone(&snapshot),
                    expires_at,
                });
                Ok(snapshot)
            }
            Err(e) => {
                RegistryMetrics::record(&self.metrics.load_failures);
                warn!(root = %self.root.display(), error = %e, "Static context load failed");
                Err(e)
            }
        }
    }

    /// Make sure a fresh snapshot is cached.
    pub async fn ensure(&self) -> Result<(), RegistryError> {
        self.current_snapshot().await.map(|_| ())
    }

    /// Like [`current_snapshot`](Self::current_snapshot), but gives up after
    /// `deadline`.
    pub async fn current_snapshot_within(
        &self,
        deadline: Duration,
    ) -> Result<Arc<StaticSnapshot>, RegistryError> {
        tokio::time::timeout(deadline, self.current_snapshot())
            .await
            .map_err(|_| RegistryError::Deadline {
                waited_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            })?
    }

    /// Expire the cached snapshot and drop resolved SOP content, so the
    /// next read reloads from disk.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        if let Some(cached) = state.as_mut() {
            cached.expires_at = DateTime::<Utc>::MIN_UTC;
        }
        if let Some(sop) = &self.sop {
            sop.invalidate();
        }
        debug!(root = %self.root.display(), "Static context invalidated");
    }

    async fn load(&self) -> Result<StaticSnapshot, RegistryError> {
        let root = self.root.clone();
        let sop = self.sop.clone();
        let now = self.clock.now();
        tokio::task::spawn_blocking(move || load_static_snapshot(&root, sop.as_deref(), now))
            .await
            .map_err(|e| RegistryError::LoadTask(e.to_string()))?
    }
}

fn ttl_deadline(loaded_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| loaded_at.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

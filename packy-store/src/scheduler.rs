//! Periodic budget refresh.
//!
//! The scheduler owns one spawned task. Each tick optionally checks cache
//! freshness, fetches, and either stores the snapshot or hands the error to
//! an [`ErrorReporter`]. A failing tick never stops the timer.
//!
//! Ticks are serialized: the fetch is awaited inside the task and missed
//! ticks are skipped, so a slow fetch never overlaps the next one.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use packy_core::{ClassifiedError, ErrorKind};
use packy_fetch::BudgetSource;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::budget_cache::BudgetCache;
use crate::settings_store::DEFAULT_POLLING_INTERVAL_MS;

// ============================================================================
// Policies & Collaborators
// ============================================================================

/// Whether a tick may be skipped while the cache is fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreshnessPolicy {
    /// Fetch on every tick.
    #[default]
    AlwaysFetch,
    /// Skip ticks while [`BudgetCache::is_cache_valid`] holds.
    SkipWhenFresh,
}

/// Receives failures the scheduler absorbs.
pub trait ErrorReporter: Send + Sync {
    /// Reports one failed tick.
    fn report(&self, error: &ClassifiedError);
}

/// Reporter that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, error: &ClassifiedError) {
        warn!(kind = %error.kind(), error = %error, "Budget refresh failed");
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Cache was fresh; nothing fetched.
    Skipped,
    /// Cache updated with a new snapshot.
    Updated,
    /// No credential or endpoint configured.
    NotConfigured,
    /// Fetch failed and was reported.
    Failed(ErrorKind),
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No timer task.
    Stopped,
    /// Timer task active.
    Running,
}

/// Interval and policy applied on the next [`PollingScheduler::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TickConfig {
    interval: Duration,
    policy: FreshnessPolicy,
}

// ============================================================================
// Polling Scheduler
// ============================================================================

/// Drives periodic refresh of a [`BudgetCache`].
pub struct PollingScheduler {
    source: Arc<dyn BudgetSource>,
    cache: Arc<BudgetCache>,
    reporter: Arc<dyn ErrorReporter>,
    config: Mutex<TickConfig>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingScheduler {
    /// Creates a stopped scheduler with the default interval.
    pub fn new(
        source: Arc<dyn BudgetSource>,
        cache: Arc<BudgetCache>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            source,
            cache,
            reporter,
            config: Mutex::new(TickConfig {
                interval: Duration::from_millis(DEFAULT_POLLING_INTERVAL_MS),
                policy: FreshnessPolicy::AlwaysFetch,
            }),
            task: Mutex::new(None),
        }
    }

    /// Sets the interval.
    #[must_use]
    pub fn with_interval(self, interval: Duration) -> Self {
        self.lock_config().interval = interval;
        self
    }

    /// Sets the freshness policy.
    #[must_use]
    pub fn with_policy(self, policy: FreshnessPolicy) -> Self {
        self.lock_config().policy = policy;
        self
    }

    /// Changes interval and policy. Takes effect on the next `start`.
    pub fn configure(&self, interval: Duration, policy: FreshnessPolicy) {
        *self.lock_config() = TickConfig { interval, policy };
    }

    /// Current interval.
    pub fn interval(&self) -> Duration {
        self.lock_config().interval
    }

    /// Current policy.
    pub fn policy(&self) -> FreshnessPolicy {
        self.lock_config().policy
    }

    /// Starts polling. Any running timer is stopped first, so exactly one
    /// task is active afterwards. The first tick fires one interval from now.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        self.stop();

        let TickConfig { interval, policy } = *self.lock_config();
        let interval = interval.max(Duration::from_millis(1));
        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        let reporter = Arc::clone(&self.reporter);
        let first_tick = Instant::now() + interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(first_tick, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                run_tick(source.as_ref(), &cache, reporter.as_ref(), policy).await;
            }
        });

        *self.lock_task() = Some(handle);
        info!(?interval, ?policy, "Polling started");
    }

    /// Stops polling. Stopping a stopped scheduler does nothing.
    pub fn stop(&self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
            info!("Polling stopped");
        }
    }

    /// Same as [`PollingScheduler::stop`].
    pub fn dispose(&self) {
        self.stop();
    }

    /// Returns true while a timer task is active.
    pub fn is_running(&self) -> bool {
        self.lock_task().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Current state.
    pub fn state(&self) -> SchedulerState {
        if self.is_running() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// Runs one tick immediately with the configured policy.
    pub async fn tick_now(&self) -> TickOutcome {
        let policy = self.policy();
        run_tick(self.source.as_ref(), &self.cache, self.reporter.as_ref(), policy).await
    }

    fn lock_config(&self) -> std::sync::MutexGuard<'_, TickConfig> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PollingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingScheduler")
            .field("interval", &self.interval())
            .field("policy", &self.policy())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn run_tick(
    source: &dyn BudgetSource,
    cache: &BudgetCache,
    reporter: &dyn ErrorReporter,
    policy: FreshnessPolicy,
) -> TickOutcome {
    if policy == FreshnessPolicy::SkipWhenFresh && cache.is_cache_valid().await {
        debug!("Cache fresh, skipping tick");
        return TickOutcome::Skipped;
    }

    match source.fetch_budget_data().await {
        Ok(Some(snapshot)) => {
            cache.update_data(snapshot).await;
            TickOutcome::Updated
        }
        Ok(None) => {
            debug!("Not configured, nothing fetched");
            TickOutcome::NotConfigured
        }
        Err(e) => {
            reporter.report(&e);
            TickOutcome::Failed(e.kind())
        }
    }
}

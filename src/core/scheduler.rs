use crate::domain::model::Cafeteria;
use crate::domain::ports::{Clock, MenuRefresher};
use crate::utils::retry::RetryPolicy;
use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_RUN_HOUR: u32 = 6;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    /// Local hour (0..=23) of the daily refresh.
    pub run_hour: u32,
    pub retry: RetryPolicy,
    pub warmup: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            run_hour: DEFAULT_RUN_HOUR,
            retry: RetryPolicy::new(3, Duration::from_secs(300)),
            warmup: true,
        }
    }
}

/// Next occurrence of `hour:00` at or after `now`, in `now`'s offset.
pub fn next_run_after(now: DateTime<FixedOffset>, hour: u32) -> DateTime<FixedOffset> {
    let target = now.date_naive().and_time(NaiveTime::MIN) + TimeDelta::hours(i64::from(hour % 24));
    let candidate = now + (target - now.naive_local());

    if candidate < now {
        candidate + TimeDelta::days(1)
    } else {
        candidate
    }
}

#[derive(Clone)]
struct RefreshCycle {
    refresher: Arc<dyn MenuRefresher>,
    cafeterias: Arc<[Cafeteria]>,
    retry: RetryPolicy,
}

impl RefreshCycle {
    /// Refreshes every cafeteria concurrently; returns how many succeeded.
    async fn run(&self, label: &'static str, cancel: &CancellationToken) -> usize {
        let mut tasks = JoinSet::new();

        for &cafeteria in self.cafeterias.iter() {
            let refresher = self.refresher.clone();
            let retry = self.retry;
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let result = retry
                    .run(&cancel, label, |_| true, |_| refresher.refresh_menu(cafeteria, &cancel))
                    .await;
                (cafeteria, result)
            });
        }

        let mut refreshed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((cafeteria, Ok(menu))) => {
                    refreshed += 1;
                    tracing::info!(%cafeteria, dishes = menu.items.len(), "✅ {} finished", label);
                }
                Ok((cafeteria, Err(e))) if e.is_cancelled() => {
                    tracing::debug!(%cafeteria, "{} cancelled", label);
                }
                Ok((cafeteria, Err(e))) => {
                    tracing::error!(%cafeteria, error = %e, "❌ {} gave up for this cycle", label);
                }
                Err(e) => tracing::error!(error = %e, "{} task aborted", label),
            }
        }
        refreshed
    }
}

struct Running {
    cancel: CancellationToken,
    daily: JoinHandle<()>,
    warmup: Option<JoinHandle<()>>,
}

/// Daily background refresh with a one-shot warmup at start.
pub struct MenuScheduler {
    refresher: Arc<dyn MenuRefresher>,
    cafeterias: Arc<[Cafeteria]>,
    clock: Arc<dyn Clock>,
    options: SchedulerOptions,
    state: Mutex<Option<Running>>,
}

impl MenuScheduler {
    pub fn new(
        refresher: Arc<dyn MenuRefresher>,
        cafeterias: Vec<Cafeteria>,
        clock: Arc<dyn Clock>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            refresher,
            cafeterias: cafeterias.into(),
            clock,
            options,
            state: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Spawns the daily loop and the warmup. Returns `false` if already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_some() {
            tracing::debug!("Scheduler already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let daily_cycle = RefreshCycle {
            refresher: self.refresher.clone(),
            cafeterias: self.cafeterias.clone(),
            retry: self.options.retry,
        };

        let warmup = self.options.warmup.then(|| {
            let cycle = RefreshCycle {
                retry: RetryPolicy::new(1, Duration::ZERO),
                ..daily_cycle.clone()
            };
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let refreshed = cycle.run("warmup", &cancel).await;
                tracing::info!(refreshed, "🔥 Warmup done");
            })
        });

        let daily = tokio::spawn(daily_loop(
            daily_cycle,
            self.clock.clone(),
            self.options.run_hour,
            cancel.clone(),
        ));

        tracing::info!(run_hour = self.options.run_hour, "⏰ Scheduler started");
        *state = Some(Running {
            cancel,
            daily,
            warmup,
        });
        true
    }

    /// Cancels background work and waits until it has exited.
    pub async fn stop(&self) {
        let running = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(running) = running else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.daily.await {
            tracing::warn!(error = %e, "Daily refresh task ended abnormally");
        }
        if let Some(warmup) = running.warmup {
            if let Err(e) = warmup.await {
                tracing::warn!(error = %e, "Warmup task ended abnormally");
            }
        }
        tracing::info!("🛑 Scheduler stopped");
    }
}

async fn daily_loop(
    cycle: RefreshCycle,
    clock: Arc<dyn Clock>,
    run_hour: u32,
    cancel: CancellationToken,
) {
    let mut last_run: Option<DateTime<FixedOffset>> = None;

    loop {
        let now = clock.now();
        let mut next = next_run_after(now, run_hour);
        // 計時器可能比預定時間早一點點醒來，避免同一天重複執行
        if last_run == Some(next) {
            next += TimeDelta::days(1);
        }
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(next_run = %next, "Next scheduled refresh");

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        last_run = Some(next);
        cycle.refresher.clear_cache();
        let refreshed = cycle.run("scheduled refresh", &cancel).await;
        tracing::info!(refreshed, total = cycle.cafeterias.len(), "Scheduled refresh cycle done");

        if cancel.is_cancelled() {
            break;
        }
    }
}

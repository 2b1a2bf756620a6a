/// Periodic job scheduler
///
/// Drives the refresh cycle, the signals poll and the cosmetic countdown. Each scheduler
/// owns one `tokio::time::interval` loop; jobs run on their own task so a slow job never
/// delays the timer, and a tick that lands while the previous job is still running is
/// skipped instead of overlapping it.
use futures::{future::BoxFuture, FutureExt};
use std::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info};

/// Scheduled unit of work
pub type Job = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as a [`Job`]
pub fn job<F, Fut>(f: F) -> Job
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Counters shared between a scheduler loop and its handle
#[derive(Debug, Default)]
pub struct SchedulerStats {
    fired: AtomicU64,
    skipped: AtomicU64,
    in_flight: AtomicBool,
}

impl SchedulerStats {
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Clears the in-flight flag when dropped, including on panic
struct InFlightGuard(Arc<SchedulerStats>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct Scheduler {
    name: &'static str,
    period: Duration,
    immediate: bool,
}

impl Scheduler {
    /// Fires immediately on spawn, then every `period`
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            immediate: true,
        }
    }

    /// Set whether the first tick fires on spawn or one period later
    pub fn with_immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    /// Start the loop on the current runtime
    pub fn spawn(self, job: Job) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let stats = Arc::new(SchedulerStats::default());
        let name = self.name;

        let task = tokio::spawn(run_scheduler(self, job, stats.clone(), shutdown_rx));

        SchedulerHandle {
            name,
            shutdown_tx,
            task,
            stats,
        }
    }
}

async fn run_scheduler(
    scheduler: Scheduler,
    job: Job,
    stats: Arc<SchedulerStats>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let Scheduler {
        name,
        period,
        immediate,
    } = scheduler;
    info!(scheduler = name, period_ms = period.as_millis() as u64, "scheduler started");

    let start = if immediate {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut interval = interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut running: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if stats.in_flight.swap(true, Ordering::AcqRel) {
                    stats.skipped.fetch_add(1, Ordering::Relaxed);
                    debug!(scheduler = name, "previous job still running, skipping tick");
                    continue;
                }
                stats.fired.fetch_add(1, Ordering::Relaxed);

                let guard = InFlightGuard(stats.clone());
                let future = job();
                running = Some(tokio::spawn(async move {
                    let _guard = guard;
                    if AssertUnwindSafe(future).catch_unwind().await.is_err() {
                        error!(scheduler = name, "scheduled job panicked");
                    }
                }));
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    if let Some(task) = running {
        let _ = task.await;
    }
    info!(
        scheduler = name,
        fired = stats.fired(),
        skipped = stats.skipped(),
        "scheduler stopped"
    );
}

/// Handle to a running scheduler
pub struct SchedulerHandle {
    name: &'static str,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
    stats: Arc<SchedulerStats>,
}

impl SchedulerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Stop ticking and wait for any in-flight job to finish
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(error) = self.task.await {
            error!(scheduler = self.name, %error, "scheduler task failed");
        }
    }
}

/// Cosmetic refresh countdown: from `start`, shows `start-1 .. 0` then wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    start: u32,
    value: u32,
}

impl Countdown {
    pub fn new(start: u32) -> Self {
        let start = start.max(1);
        Self { start, value: start }
    }

    /// Value currently on screen
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Advance one tick and return the value to display
    pub fn tick(&mut self) -> u32 {
        self.value = self.value.saturating_sub(1);
        let shown = self.value;
        if self.value == 0 {
            self.value = self.start;
        }
        shown
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    fn counting_job(counter: Arc<AtomicUsize>, work: Duration) -> Job {
        job(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if !work.is_zero() {
                    sleep(work).await;
                }
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_immediately_then_every_period() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = Scheduler::new("test", Duration::from_secs(5))
            .spawn(counting_job(counter.clone(), Duration::ZERO));

        sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);

        handle.stop().await;
        sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_first_tick() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = Scheduler::new("countdown", Duration::from_secs(1))
            .with_immediate(false)
            .spawn(counting_job(counter.clone(), Duration::ZERO));

        sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_during_in_flight_job_are_skipped() {
        let counter = Arc::new(AtomicUsize::new(0));
        // each job outlives two ticks
        let handle = Scheduler::new("slow", Duration::from_secs(5))
            .spawn(counting_job(counter.clone(), Duration::from_secs(12)));

        sleep(Duration::from_millis(16_000)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(handle.stats().fired(), 2);
        assert_eq!(handle.stats().skipped(), 2);
        assert!(handle.stats().in_flight());

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_job_releases_guard() {
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = counter.clone();
        let handle = Scheduler::new("panicky", Duration::from_secs(5)).spawn(job(move || {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first run fails");
                }
            }
        }));

        sleep(Duration::from_millis(5_010)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(handle.stats().skipped(), 0);

        handle.stop().await;
    }

    #[test]
    fn test_countdown_sequence_wraps() {
        let mut countdown = Countdown::new(5);
        let shown: Vec<_> = (0..7).map(|_| countdown.tick()).collect();
        assert_eq!(shown, vec![4, 3, 2, 1, 0, 4, 3]);
    }
}

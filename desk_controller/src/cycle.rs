//! Fixed-period control loop.
//!
//! Sleeps until an absolute deadline each cycle (`clock_nanosleep` with
//! `TIMER_ABSTIME` under the `rt` feature, an `Instant` deadline otherwise),
//! so pacing does not drift with the cycle body's duration.
//!
//! Cycle body: poll panel input → [`Coordinator::cycle`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use desk_common::bus::BusTransport;
use tracing::{debug, info, warn};

use crate::coordinator::Coordinator;
use crate::error::CycleError;
use crate::panel::PanelSource;
use crate::power::PowerSwitches;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    pub min_cycle_ns: i64,
    pub max_cycle_ns: i64,
    pub sum_cycle_ns: i64,
    pub overruns: u64,
    /// Maximum wake-up latency [ns].
    pub max_latency_ns: i64,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record a cycle duration and its wake-up latency.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Lock all current and future memory pages.
#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// SCHED_FIFO at `priority`; 0 keeps the default scheduler.
#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    if priority == 0 {
        return Ok(());
    }
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` is a valid sched_param for the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Memory locking and scheduler setup. No-op without the `rt` feature.
pub fn rt_setup(rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Owns the coordinator and its panel source; paces the control loop.
pub struct CycleRunner<B: BusTransport, P: PowerSwitches, S: PanelSource> {
    coordinator: Coordinator<B, P>,
    panel: S,
    running: Arc<AtomicBool>,
    pub stats: CycleStats,
    cycle_time_ns: i64,
    stats_interval: u64,
    epoch: Instant,
}

impl<B: BusTransport, P: PowerSwitches, S: PanelSource> CycleRunner<B, P, S> {
    pub fn new(coordinator: Coordinator<B, P>, panel: S, running: Arc<AtomicBool>) -> Self {
        let timing = coordinator.config().timing;
        Self {
            coordinator,
            panel,
            running,
            stats: CycleStats::new(),
            cycle_time_ns: timing.cycle_time().as_nanos() as i64,
            stats_interval: timing.stats_interval_cycles,
            epoch: Instant::now(),
        }
    }

    pub fn coordinator(&self) -> &Coordinator<B, P> {
        &self.coordinator
    }

    /// Run until the `running` flag is cleared.
    pub fn run(&mut self) -> Result<(), CycleError> {
        self.epoch = Instant::now();
        info!(cycle_time_ns = self.cycle_time_ns, "Entering control loop");

        #[cfg(feature = "rt")]
        let result = self.run_rt_loop();
        #[cfg(not(feature = "rt"))]
        let result = self.run_sim_loop();

        info!(
            cycles = self.stats.cycle_count,
            overruns = self.stats.overruns,
            "Control loop stopped"
        );
        result
    }

    /// One cycle body at monotonic time `now` since loop start.
    pub fn cycle_body(&mut self, now: Duration) {
        self.panel.poll(self.coordinator.events_mut());
        self.coordinator.cycle(now);
    }

    fn finish_cycle(&mut self, duration_ns: i64, latency_ns: i64) {
        self.stats.record(duration_ns, latency_ns);
        if duration_ns > self.cycle_time_ns {
            self.stats.overruns += 1;
            warn!(
                actual_ns = duration_ns,
                budget_ns = self.cycle_time_ns,
                overruns = self.stats.overruns,
                "Cycle overrun"
            );
        }
        if self.stats_interval > 0 && self.stats.cycle_count % self.stats_interval == 0 {
            info!(
                cycles = self.stats.cycle_count,
                avg_us = self.stats.avg_cycle_ns() / 1000,
                max_us = self.stats.max_cycle_ns / 1000,
                max_latency_us = self.stats.max_latency_ns / 1000,
                overruns = self.stats.overruns,
                gearbox = ?self.coordinator.gearbox_state(),
                ui = ?self.coordinator.ui_state(),
                "Cycle stats"
            );
        }
    }

    /// Absolute-time sleep on `CLOCK_MONOTONIC`.
    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self) -> Result<(), CycleError> {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let now = || clock_gettime(clock).map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")));
        let start = now()?;
        let mut next_wake = start;

        while self.running.load(Ordering::Acquire) {
            let cycle_start = now()?;
            let latency_ns = timespec_diff_ns(&cycle_start, &next_wake).abs();
            next_wake = timespec_add_ns(next_wake, self.cycle_time_ns);

            let since_start = timespec_diff_ns(&cycle_start, &start).max(0) as u64;
            self.cycle_body(Duration::from_nanos(since_start));

            let cycle_end = now()?;
            self.finish_cycle(timespec_diff_ns(&cycle_end, &cycle_start), latency_ns);

            if timespec_diff_ns(&next_wake, &cycle_end) < 0 {
                debug!("Behind schedule, resynchronising");
                next_wake = cycle_end;
                continue;
            }
            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
        }
        Ok(())
    }

    /// Sleep until an absolute `Instant` deadline.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self) -> Result<(), CycleError> {
        let period = Duration::from_nanos(self.cycle_time_ns as u64);
        let mut next_wake = self.epoch;

        while self.running.load(Ordering::Acquire) {
            let cycle_start = Instant::now();
            let latency_ns = cycle_start.saturating_duration_since(next_wake).as_nanos() as i64;
            next_wake += period;

            self.cycle_body(cycle_start.duration_since(self.epoch));

            let cycle_end = Instant::now();
            self.finish_cycle((cycle_end - cycle_start).as_nanos() as i64, latency_ns);

            match next_wake.checked_duration_since(cycle_end) {
                Some(remaining) => std::thread::sleep(remaining),
                None => {
                    debug!("Behind schedule, resynchronising");
                    next_wake = cycle_end;
                }
            }
        }
        Ok(())
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    let total = ts.tv_nsec() + ns;
    let sec = ts.tv_sec() + total.div_euclid(1_000_000_000);
    let nsec = total.rem_euclid(1_000_000_000);
    nix::sys::time::TimeSpec::new(sec, nsec)
}

/// `a - b` in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

//! Periodic step scheduling.
//!
//! A ticker thread wakes at absolute deadlines and only increments a due
//! counter. A worker thread drains the counter and runs one
//! [`StepTarget::step`] per due iteration, so a slow step delays work but
//! never loses it.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::unit::StepTarget;

/// Iterations scheduled but not yet executed.
#[derive(Debug, Clone, Default)]
pub struct DueCounter(Arc<AtomicU32>);

impl DueCounter {
    /// Schedule one iteration.
    #[inline]
    pub fn tick(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    /// Take all scheduled iterations.
    #[inline]
    pub fn drain(&self) -> u32 {
        self.0.swap(0, Ordering::AcqRel)
    }

    #[inline]
    pub fn pending(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

/// Run every scheduled iteration against `target`. Returns how many ran.
pub fn run_due<T: StepTarget + ?Sized>(due: &DueCounter, target: &Mutex<T>) -> u32 {
    let n = due.drain();
    if n > 0 {
        let mut target = target.lock();
        for _ in 0..n {
            target.step();
        }
    }
    n
}

/// Running ticker and worker threads.
pub struct StepTimer {
    running: Arc<AtomicBool>,
    due: DueCounter,
    ticker: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl StepTimer {
    /// Start stepping `target` every `interval`.
    pub fn start<T>(name: &str, target: Arc<Mutex<T>>, interval: Duration) -> io::Result<Self>
    where
        T: StepTarget + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let due = DueCounter::default();

        let worker = {
            let running = Arc::clone(&running);
            let due = due.clone();
            thread::Builder::new()
                .name(format!("{name}-step"))
                .spawn(move || {
                    while running.load(Ordering::Acquire) {
                        if run_due(&due, target.as_ref()) == 0 {
                            thread::park_timeout(interval);
                        }
                    }
                })?
        };

        let ticker = {
            let running = Arc::clone(&running);
            let due = due.clone();
            let worker_thread = worker.thread().clone();
            thread::Builder::new()
                .name(format!("{name}-tick"))
                .spawn(move || {
                    let mut next = Instant::now() + interval;
                    while running.load(Ordering::Acquire) {
                        let now = Instant::now();
                        if next > now {
                            thread::sleep(next - now);
                        }
                        due.tick();
                        worker_thread.unpark();
                        next += interval;
                    }
                })
        };
        let ticker = match ticker {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, Ordering::Release);
                worker.thread().unpark();
                let _ = worker.join();
                return Err(e);
            }
        };

        info!(name, interval_us = interval.as_micros() as u64, "Step timer started");
        Ok(Self {
            running,
            due,
            ticker: Some(ticker),
            worker: Some(worker),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn pending(&self) -> u32 {
        self.due.pending()
    }

    /// Stop and join both threads.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.join();
        }
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            let _ = worker.join();
        }
        debug!("Step timer stopped");
    }
}

impl Drop for StepTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

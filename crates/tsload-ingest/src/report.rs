//! Periodic progress reporting.
//!
//! A background thread samples the event and metric counters every
//! reporting period and logs the rate over the last period and over the
//! whole run.

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::info;
use tsload_core::MetricCounter;

/// Handle on a running progress reporter.
pub struct ProgressReporter {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Start reporting every `period`.
    pub fn spawn(
        period: Duration,
        events: MetricCounter,
        metrics: MetricCounter,
    ) -> std::io::Result<Self> {
        let (stop, stopped) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("tsload-reporter".to_string())
            .spawn(move || {
                let start = Instant::now();
                let mut last = Sample::default();

                loop {
                    match stopped.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {
                            let now = Sample {
                                at: start.elapsed(),
                                events: events.get(),
                                metrics: metrics.get(),
                            };
                            let period_secs = (now.at - last.at).as_secs_f64();
                            let total_secs = now.at.as_secs_f64();
                            info!(
                                elapsed_secs = now.at.as_secs(),
                                events = now.events,
                                metrics = now.metrics,
                                "period {:.2} events/sec, {:.2} metrics/sec | overall {:.2} events/sec, {:.2} metrics/sec",
                                rate(now.events - last.events, period_secs),
                                rate(now.metrics - last.metrics, period_secs),
                                rate(now.events, total_secs),
                                rate(now.metrics, total_secs),
                            );
                            last = now;
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        Ok(Self { stop, handle })
    }

    /// Stop the reporter and wait for its thread.
    pub fn stop(self) {
        drop(self.stop);
        let _ = self.handle.join();
    }
}

#[derive(Default, Clone, Copy)]
struct Sample {
    at: Duration,
    events: u64,
    metrics: u64,
}

/// `count / secs`, or zero for an empty interval.
pub fn rate(count: u64, secs: f64) -> f64 {
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

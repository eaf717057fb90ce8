//! One LED breathing on its own thread.
//!
//! A worker writes a fade-in ramp then a fade-out ramp to its channel, one
//! value per step interval, and repeats until asked to stop. Stopping is
//! cooperative: the flag is checked after every write-and-sleep, so a stop
//! request is honoured within one interval and `request_stop` never blocks.
//!
//! Handing a channel from an old worker to a new one is not atomic. If the
//! old worker is between its flag check and its next write when it is
//! superseded, it writes one more stale frame before it exits. That single
//! frame is tolerated rather than locked away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, warn};

use crate::curve::{self, DEFAULT_EXPONENT, STEP_INTERVAL};
use crate::device::Channel;
use crate::error::ConfigError;

/// Shape of one breathing cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PulseSpec {
    pub fade_in: Duration,
    pub fade_out: Duration,
    pub exponent: f64,
    pub interval: Duration,
}

impl PulseSpec {
    /// Equal fade in and fade out, default curve and step.
    pub fn symmetric(half_cycle: Duration) -> Self {
        Self {
            fade_in: half_cycle,
            fade_out: half_cycle,
            exponent: DEFAULT_EXPONENT,
            interval: STEP_INTERVAL,
        }
    }

    pub fn with_exponent(mut self, exponent: f64) -> Self {
        self.exponent = exponent;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.exponent.is_finite() && self.exponent > 0.0) {
            return Err(ConfigError::Exponent(self.exponent));
        }
        if self.interval.is_zero() {
            return Err(ConfigError::StepInterval(self.interval));
        }
        Ok(())
    }

    pub fn steps_in(&self) -> u32 {
        curve::steps(self.fade_in, self.interval)
    }

    pub fn steps_out(&self) -> u32 {
        curve::steps(self.fade_out, self.interval)
    }
}

impl Default for PulseSpec {
    fn default() -> Self {
        Self::symmetric(Duration::from_secs(1))
    }
}

/// Handle to a running pulse thread. Dropping it requests a stop.
pub struct PulseWorker {
    name: String,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PulseWorker {
    /// Spawn a worker pulsing `channel`. Returns as soon as the thread exists.
    pub fn start(
        name: impl Into<String>,
        channel: Arc<dyn Channel>,
        spec: PulseSpec,
    ) -> anyhow::Result<Self> {
        spec.validate()?;
        let name = name.into();
        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let name = name.clone();
            let stop = Arc::clone(&stop);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    if let Err(e) = run_cycle(channel.as_ref(), &spec, &stop) {
                        error!("{name}: channel write failed, stopping: {e:#}");
                    }
                    // Leave the flag ready for reuse.
                    stop.store(false, Ordering::SeqCst);
                    running.store(false, Ordering::SeqCst);
                    debug!("{name}: exited");
                })
        };
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        Ok(Self {
            name,
            stop,
            running,
            handle: Some(handle),
        })
    }

    /// Ask the worker to finish after its current step. Safe to repeat.
    pub fn request_stop(&self) {
        if self.is_running() {
            self.stop.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the thread has exited. Does not request a stop by itself.
    pub fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("{}: thread panicked", self.name);
            }
        }
    }

    /// Request a stop and wait for the thread to exit.
    pub fn stop_and_wait(&mut self) {
        self.request_stop();
        self.wait();
    }
}

impl Drop for PulseWorker {
    fn drop(&mut self) {
        self.request_stop();
    }
}

fn run_cycle(channel: &dyn Channel, spec: &PulseSpec, stop: &AtomicBool) -> anyhow::Result<()> {
    let steps_in = spec.steps_in();
    let steps_out = spec.steps_out();
    debug!("fade in {steps_in} steps, fade out {steps_out} steps");

    loop {
        if steps_in == 0 && steps_out == 0 {
            // Nothing to draw, but stay stoppable without spinning.
            thread::sleep(spec.interval);
            if stop.load(Ordering::SeqCst) {
                return Ok(());
            }
            continue;
        }

        for step in 0..steps_in {
            let value = curve::fade_in(curve::progress(step, steps_in), spec.exponent);
            channel.set_brightness(value)?;
            thread::sleep(spec.interval);
            if stop.load(Ordering::SeqCst) {
                return Ok(());
            }
        }

        for step in 0..steps_out {
            let value = curve::fade_out(curve::progress(step, steps_out), spec.exponent);
            channel.set_brightness(value)?;
            thread::sleep(spec.interval);
            if stop.load(Ordering::SeqCst) {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryChannel;
    use std::time::Instant;

    fn fast(fade_in_ms: u64, fade_out_ms: u64) -> PulseSpec {
        PulseSpec {
            fade_in: Duration::from_millis(fade_in_ms),
            fade_out: Duration::from_millis(fade_out_ms),
            exponent: 2.0,
            interval: Duration::from_millis(5),
        }
    }

    fn wait_until_stopped(worker: &PulseWorker) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while worker.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn rejects_bad_spec() {
        let channel: Arc<dyn Channel> = Arc::new(MemoryChannel::new());
        let spec = fast(20, 20).with_exponent(0.0);
        assert!(PulseWorker::start("bad", Arc::clone(&channel), spec).is_err());
        let spec = fast(20, 20).with_interval(Duration::ZERO);
        assert!(PulseWorker::start("bad", channel, spec).is_err());
    }

    #[test]
    fn writes_fade_in_then_fade_out() {
        let channel = Arc::new(MemoryChannel::new());
        let mut worker = PulseWorker::start("ramp", channel.clone(), fast(20, 20)).unwrap();
        // 4 steps in + 4 steps out, then a few more.
        thread::sleep(Duration::from_millis(150));
        worker.stop_and_wait();

        let values = channel.values();
        assert!(values.len() >= 8, "only {} writes", values.len());
        assert_eq!(values[0], 0.0);
        assert!((values[1] - 0.0625).abs() < 1e-9);
        assert!((values[3] - 0.5625).abs() < 1e-9);
        assert_eq!(values[4], 1.0);
        assert!((values[7] - 0.0625).abs() < 1e-9);
    }

    #[test]
    fn short_fade_in_skips_straight_to_fade_out() {
        let channel = Arc::new(MemoryChannel::new());
        let mut worker = PulseWorker::start("short", channel.clone(), fast(3, 20)).unwrap();
        thread::sleep(Duration::from_millis(30));
        worker.stop_and_wait();

        let values = channel.values();
        assert!(!values.is_empty());
        // Every cycle starts at the top of the fade out.
        assert_eq!(values[0], 1.0);
        for chunk in values.chunks(4) {
            assert_eq!(chunk[0], 1.0);
        }
    }

    #[test]
    fn empty_cycle_still_honours_stop() {
        let channel = Arc::new(MemoryChannel::new());
        let mut worker = PulseWorker::start("empty", channel.clone(), fast(1, 1)).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(worker.is_running());
        worker.stop_and_wait();
        assert!(!worker.is_running());
        assert!(channel.is_empty());
    }

    #[test]
    fn stops_within_one_step() {
        let channel = Arc::new(MemoryChannel::new());
        let worker = PulseWorker::start("stop", channel.clone(), fast(500, 500)).unwrap();
        thread::sleep(Duration::from_millis(30));

        let requested = Instant::now();
        worker.request_stop();
        assert!(requested.elapsed() < Duration::from_millis(5));
        wait_until_stopped(&worker);
        assert!(!worker.is_running());

        let count = channel.len();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(channel.len(), count);
    }

    #[test]
    fn repeated_stop_is_harmless() {
        let channel = Arc::new(MemoryChannel::new());
        let mut worker = PulseWorker::start("twice", channel, fast(20, 20)).unwrap();
        worker.request_stop();
        worker.wait();
        assert!(!worker.is_running());
        assert!(!worker.stop.load(Ordering::SeqCst));

        worker.request_stop();
        worker.request_stop();
        worker.stop_and_wait();
        assert!(!worker.is_running());
    }

    #[test]
    fn write_failure_only_ends_that_worker() {
        let broken = Arc::new(MemoryChannel::failing_after(3));
        let healthy = Arc::new(MemoryChannel::new());
        let bad = PulseWorker::start("bad", broken.clone(), fast(20, 20)).unwrap();
        let mut good = PulseWorker::start("good", healthy.clone(), fast(20, 20)).unwrap();

        wait_until_stopped(&bad);
        assert!(!bad.is_running());
        assert_eq!(broken.attempts(), 4);
        assert_eq!(broken.len(), 3);

        assert!(good.is_running());
        let before = healthy.len();
        thread::sleep(Duration::from_millis(20));
        assert!(healthy.len() > before);
        good.stop_and_wait();
    }

    #[test]
    fn dropping_the_handle_stops_the_thread() {
        let channel = Arc::new(MemoryChannel::new());
        let worker = PulseWorker::start("dropped", channel.clone(), fast(50, 50)).unwrap();
        let running = Arc::clone(&worker.running);
        drop(worker);
        let deadline = Instant::now() + Duration::from_secs(2);
        while running.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!running.load(Ordering::SeqCst));
    }
}

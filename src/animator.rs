use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use log::{debug, info, warn};

use crate::curve::{DEFAULT_EXPONENT, STEP_INTERVAL};
use crate::device::Channel;
use crate::error::ConfigError;
use crate::pulse::{PulseSpec, PulseWorker};

/// Drives a board of LEDs through a staggered breathing wave.
///
/// Holds one worker slot per channel. Every call that changes what the LEDs
/// show takes the slot lock for its whole duration, so two wave sequences
/// never interleave.
pub struct PulseAnimator {
    channels: Vec<Arc<dyn Channel>>,
    exponent: f64,
    interval: Duration,
    workers: Mutex<Vec<Option<PulseWorker>>>,
}

impl PulseAnimator {
    pub fn new(channels: Vec<Arc<dyn Channel>>) -> Self {
        Self {
            channels,
            exponent: DEFAULT_EXPONENT,
            interval: STEP_INTERVAL,
            workers: Mutex::new(Vec::new()),
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

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of workers whose thread is still alive.
    pub fn running_workers(&self) -> usize {
        self.lock_workers()
            .iter()
            .flatten()
            .filter(|w| w.is_running())
            .count()
    }

    /// Start a breathing wave with a full fade in/out period of `cycle`.
    ///
    /// Each LED starts `cycle / n` after the previous one. Blocks the caller
    /// for the whole stagger, i.e. for `cycle`. Workers from an earlier wave
    /// are told to stop as their channel is reached; a superseded worker may
    /// still land one stale frame.
    pub fn pulse(&self, cycle: Duration) -> anyhow::Result<()> {
        if cycle.is_zero() {
            return Err(ConfigError::ZeroCycle.into());
        }
        let count = self.channels.len();
        if count == 0 {
            return Ok(());
        }

        let half = cycle / 2;
        let phase_offset = cycle / u32::try_from(count).unwrap_or(u32::MAX);
        let spec = PulseSpec::symmetric(half)
            .with_exponent(self.exponent)
            .with_interval(self.interval);
        spec.validate()?;

        let mut workers = self.lock_workers();
        // Old workers not yet reached keep running until their slot comes up.
        let mut previous = mem::take(&mut *workers);
        previous.resize_with(count, || None);
        info!("pulsing {count} LEDs over {cycle:?}, {phase_offset:?} apart");

        for (index, channel) in self.channels.iter().enumerate() {
            if let Some(old) = previous[index].take() {
                old.request_stop();
            }
            let name = format!("pulse-{}", index + 1);
            let worker = PulseWorker::start(name, Arc::clone(channel), spec)
                .with_context(|| format!("starting pulse on LED {}", index + 1))?;
            workers.push(Some(worker));
            thread::sleep(phase_offset);
        }
        Ok(())
    }

    /// Stop any wave and hold every LED at `brightness`.
    pub fn set_static(&self, brightness: f64) -> anyhow::Result<()> {
        check_brightness(brightness)?;
        let mut workers = self.lock_workers();
        stop_all(&mut workers);
        debug!("holding all LEDs at {brightness}");
        write_all(self.channels.iter().map(|c| (c, brightness)))
    }

    /// Stop any wave and give each LED its own level, in board order.
    pub fn set_levels(&self, levels: &[f64]) -> anyhow::Result<()> {
        if levels.len() != self.channels.len() {
            return Err(ConfigError::LevelCount {
                expected: self.channels.len(),
                got: levels.len(),
            }
            .into());
        }
        for &level in levels {
            check_brightness(level)?;
        }
        let mut workers = self.lock_workers();
        stop_all(&mut workers);
        debug!("setting LED levels {levels:?}");
        write_all(self.channels.iter().zip(levels.iter().copied()))
    }

    /// Switch one LED full on, counting from 1. Other LEDs are left alone.
    pub fn on(&self, led: usize) -> anyhow::Result<()> {
        let count = self.channels.len();
        if led == 0 || led > count {
            return Err(ConfigError::LedIndex { index: led, count }.into());
        }
        let mut workers = self.lock_workers();
        if let Some(slot) = workers.get_mut(led - 1) {
            if let Some(mut worker) = slot.take() {
                worker.stop_and_wait();
            }
        }
        self.channels[led - 1]
            .set_brightness(1.0)
            .with_context(|| format!("switching on LED {led}"))
    }

    /// Stop every worker and wait for the threads to exit. LEDs keep their
    /// last value.
    pub fn stop(&self) {
        let mut workers = self.lock_workers();
        stop_all(&mut workers);
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<Option<PulseWorker>>> {
        self.workers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for PulseAnimator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn check_brightness(value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Brightness(value))
    }
}

/// Signal everyone first so they wind down together, then join.
fn stop_all(workers: &mut Vec<Option<PulseWorker>>) {
    for worker in workers.iter().flatten() {
        debug!("stopping {}", worker.name());
        worker.request_stop();
    }
    for mut worker in workers.drain(..).flatten() {
        worker.wait();
    }
}

fn write_all<'a>(targets: impl Iterator<Item = (&'a Arc<dyn Channel>, f64)>) -> anyhow::Result<()> {
    let mut first_error = None;
    for (index, (channel, value)) in targets.enumerate() {
        if let Err(e) = channel.set_brightness(value) {
            warn!("LED {}: write failed: {e:#}", index + 1);
            if first_error.is_none() {
                first_error = Some(e.context(format!("writing LED {}", index + 1)));
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

//! In-memory outputs for running the controllers without a Pi attached.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Instant;

use anyhow::bail;

use crate::device::{Channel, Indicator};

/// One brightness write seen by a [`MemoryChannel`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Write {
    pub at: Instant,
    pub value: f64,
    pub thread: ThreadId,
}

/// Channel that records every write.
#[derive(Default)]
pub struct MemoryChannel {
    writes: Mutex<Vec<Write>>,
    fail_after: Option<usize>,
    attempts: AtomicUsize,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel whose writes start failing once `count` have succeeded.
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn values(&self) -> Vec<f64> {
        self.writes().iter().map(|w| w.value).collect()
    }

    pub fn last(&self) -> Option<Write> {
        self.writes.lock().ok().and_then(|w| w.last().copied())
    }

    pub fn len(&self) -> usize {
        self.writes.lock().map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of writes attempted, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Channel for MemoryChannel {
    fn set_brightness(&self, value: f64) -> anyhow::Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| attempt >= limit) {
            bail!("simulated write failure");
        }
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(Write {
                at: Instant::now(),
                value,
                thread: thread::current().id(),
            });
        }
        Ok(())
    }
}

/// Shareable on/off lamp. Clones observe the same state.
#[derive(Clone, Default)]
pub struct MemoryIndicator {
    lit: Arc<Mutex<bool>>,
}

impl MemoryIndicator {
    pub fn new(lit: bool) -> Self {
        Self {
            lit: Arc::new(Mutex::new(lit)),
        }
    }
}

impl Indicator for MemoryIndicator {
    fn set_lit(&mut self, lit: bool) -> anyhow::Result<()> {
        if let Ok(mut state) = self.lit.lock() {
            *state = lit;
        }
        Ok(())
    }

    fn is_lit(&self) -> bool {
        self.lit.lock().map(|l| *l).unwrap_or(false)
    }
}

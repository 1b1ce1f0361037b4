//! Tempo clocks
//!
//! A [`Tempo`] delivers monotonically increasing timestamps (seconds) to a single
//! delegate. The engine never depends on how those timestamps are produced:
//!
//! - [`ManualTempo`]: driven explicitly, for tests and replay
//! - [`TimerTempo`]: fixed-interval beats on the calling thread

use crate::config::TempoConfig;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Receives beats from a tempo
pub trait TempoDelegate {
    fn tempo_beat_update(&mut self, timestamp: f64);
}

/// Shared handle to a delegate
pub type SharedDelegate = Rc<RefCell<dyn TempoDelegate>>;

/// A periodic clock with one subscriber
pub trait Tempo {
    /// Subscribe a delegate, replacing any previous one. The tempo holds it weakly.
    fn set_delegate(&mut self, delegate: Option<&SharedDelegate>);

    /// The current delegate, if it is still alive
    fn delegate(&self) -> Option<SharedDelegate>;

    /// Stop delivering beats and release the delegate
    fn cleanup_resources(&mut self);
}

/// Weak delegate storage shared by the tempo implementations
#[derive(Default)]
struct DelegateSlot {
    delegate: Option<Weak<RefCell<dyn TempoDelegate>>>,
}

impl DelegateSlot {
    fn set(&mut self, delegate: Option<&SharedDelegate>) {
        self.delegate = delegate.map(Rc::downgrade);
    }

    fn get(&self) -> Option<SharedDelegate> {
        self.delegate.as_ref().and_then(|weak| weak.upgrade())
    }

    fn clear(&mut self) {
        self.delegate = None;
    }

    /// Deliver a beat; returns `false` if nobody received it
    fn deliver(&self, timestamp: f64) -> bool {
        let Some(delegate) = self.get() else {
            return false;
        };
        let Ok(mut delegate) = delegate.try_borrow_mut() else {
            warn!(timestamp, "delegate busy, dropping beat");
            return false;
        };
        delegate.tempo_beat_update(timestamp);
        true
    }
}

/// Deterministic tempo driven by explicit calls
pub struct ManualTempo {
    slot: DelegateSlot,
    timestamp: f64,
    interval: f64,
    beats: u64,
    stopped: bool,
}

impl ManualTempo {
    pub fn new() -> Self {
        Self::with_config(&TempoConfig::default())
    }

    /// Create a tempo whose frame interval follows `config.fps`
    pub fn with_config(config: &TempoConfig) -> Self {
        Self {
            slot: DelegateSlot::default(),
            timestamp: 0.0,
            interval: config.interval(),
            beats: 0,
            stopped: false,
        }
    }

    /// Timestamp of the last delivered beat
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Seconds between frames for [`advance_frames`](Self::advance_frames)
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Number of beats delivered so far
    pub fn beats(&self) -> u64 {
        self.beats
    }

    /// Deliver a beat at `timestamp`.
    ///
    /// Timestamps earlier than the previous beat are rejected.
    pub fn beat(&mut self, timestamp: f64) -> bool {
        if self.stopped {
            return false;
        }
        if self.beats > 0 && timestamp < self.timestamp {
            warn!(timestamp, last = self.timestamp, "non-monotonic beat rejected");
            return false;
        }

        self.timestamp = timestamp;
        self.beats += 1;
        trace!(timestamp, "manual beat");
        self.slot.deliver(timestamp)
    }

    /// Deliver a beat `dt` seconds after the previous one
    pub fn advance(&mut self, dt: f64) -> bool {
        self.beat(self.timestamp + dt)
    }

    /// Deliver `frames` beats at the configured interval
    pub fn advance_frames(&mut self, frames: usize) {
        for _ in 0..frames {
            self.advance(self.interval);
        }
    }
}

impl Default for ManualTempo {
    fn default() -> Self {
        Self::new()
    }
}

impl Tempo for ManualTempo {
    fn set_delegate(&mut self, delegate: Option<&SharedDelegate>) {
        self.slot.set(delegate);
    }

    fn delegate(&self) -> Option<SharedDelegate> {
        self.slot.get()
    }

    fn cleanup_resources(&mut self) {
        self.stopped = true;
        self.slot.clear();
    }
}

/// Fixed-interval tempo running on the calling thread
pub struct TimerTempo {
    slot: DelegateSlot,
    origin: Instant,
    interval: Duration,
    stopped: bool,
}

impl TimerTempo {
    pub fn new() -> Self {
        Self::with_config(&TempoConfig::default())
    }

    pub fn with_config(config: &TempoConfig) -> Self {
        Self {
            slot: DelegateSlot::default(),
            origin: Instant::now(),
            interval: Duration::from_secs_f64(config.interval()),
            stopped: false,
        }
    }

    /// Seconds since this tempo was created
    pub fn timestamp(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Deliver one beat at the current time
    pub fn tick(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.slot.deliver(self.timestamp())
    }

    /// Beat at the configured cadence for `duration`, or until the delegate goes away
    pub fn run_for(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        self.run_while(|| Instant::now() < deadline);
    }

    /// Beat at the configured cadence while `condition` holds
    pub fn run_while<F>(&mut self, mut condition: F)
    where
        F: FnMut() -> bool,
    {
        let mut next = Instant::now();
        while !self.stopped && condition() {
            if !self.tick() {
                break;
            }

            next += self.interval;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                // Fell behind; resynchronise instead of bursting
                next = now;
            }
        }
    }
}

impl Default for TimerTempo {
    fn default() -> Self {
        Self::new()
    }
}

impl Tempo for TimerTempo {
    fn set_delegate(&mut self, delegate: Option<&SharedDelegate>) {
        self.slot.set(delegate);
    }

    fn delegate(&self) -> Option<SharedDelegate> {
        self.slot.get()
    }

    fn cleanup_resources(&mut self) {
        self.stopped = true;
        self.slot.clear();
    }
}

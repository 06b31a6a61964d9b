use std::cell::Cell;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::capture::RawPointerSample;
use crate::geometry::Viewport;

/// Monotonic high-resolution clock collaborator. Supplies trial epochs,
/// calibration timing, and frame deltas; milliseconds since an arbitrary
/// origin.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Production clock backed by std::time::Instant.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Test clock advanced by hand; keeps trial timing deterministic.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { now: Cell::new(0.0) }
    }

    pub fn at(start_ms: f64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

/// Unified event type consumed by the trial runner.
///
/// Move carries the full coalesced batch for one frame; every sub-event
/// is ingested, not just the last.
#[derive(Clone, Debug)]
pub enum PointerEvent {
    Down(RawPointerSample),
    Move(Vec<RawPointerSample>),
    Up { t: f64 },
    Leave { t: f64 },
    Resize(Viewport),
    Tick,
}

/// Source of pointer/surface events. The presentation layer owns the
/// real one; tests feed a channel.
pub trait PointerEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<PointerEvent, RecvTimeoutError>;
}

/// Test event source for unit and integration tests
pub struct TestEventSource {
    rx: Receiver<PointerEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<PointerEvent>) -> Self {
        Self { rx }
    }
}

impl PointerEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<PointerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface; the tick stream doubles as the
/// animation-frame collaborator.
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Runner that advances the instrument one event/tick at a time
pub struct Runner<E: PointerEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: PointerEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> PointerEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                PointerEvent::Tick
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let runner = Runner::new(es, ticker);

        // With no events available, step should yield Tick
        let ev = runner.step();
        match ev {
            PointerEvent::Tick => {}
            _ => panic!("expected Tick on timeout"),
        }
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(PointerEvent::Up { t: 12.5 }).unwrap();
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(10));
        let runner = Runner::new(es, ticker);

        match runner.step() {
            PointerEvent::Up { t } => assert_eq!(t, 12.5),
            _ => panic!("expected Up event"),
        }
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let t1 = clock.now_ms();
        let t2 = clock.now_ms();
        assert!(t2 >= t1);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new();
        assert_eq!(clock.now_ms(), 0.0);
        clock.advance(16.7);
        assert_eq!(clock.now_ms(), 16.7);
        clock.set(1000.0);
        assert_eq!(clock.now_ms(), 1000.0);
    }
}

use serde::{Deserialize, Serialize};

use crate::capture::Sample;
use crate::geometry::Point;

/// Floor on replay duration so degenerate captures still scrub.
pub const MIN_REPLAY_DURATION_MS: f64 = 100.0;

/// Time-synchronized playback of a captured path against a virtual
/// clock.
///
/// The session holds only clock state; the path stays owned by the
/// trial. Cursor lookup is a pure function of (path, go_time,
/// virtual_time), so re-seeking to the same value always reproduces the
/// same cursor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplaySession {
    pub virtual_time_ms: f64,
    pub speed: f64,
    pub is_playing: bool,
    pub duration_ms: f64,
    go_time_ms: f64,
}

impl ReplaySession {
    pub fn new(samples: &[Sample], go_time_ms: f64, speed: f64) -> Self {
        let captured = samples
            .last()
            .map(|s| s.t - go_time_ms)
            .unwrap_or(0.0);
        Self {
            virtual_time_ms: 0.0,
            speed: speed.max(0.0),
            is_playing: true,
            duration_ms: captured.max(MIN_REPLAY_DURATION_MS),
            go_time_ms,
        }
    }

    /// Advances the virtual clock by a real frame delta scaled by the
    /// speed factor. Wraps to 0 at the end of the capture (looping
    /// playback, not pause-at-end). Returns the new virtual time.
    pub fn tick(&mut self, real_delta_ms: f64) -> f64 {
        if self.is_playing {
            let next = self.virtual_time_ms + real_delta_ms * self.speed;
            self.virtual_time_ms = if next >= self.duration_ms { 0.0 } else { next };
        }
        self.virtual_time_ms
    }

    /// Scrubs to an absolute virtual time without touching play state.
    pub fn seek(&mut self, ms: f64) {
        self.virtual_time_ms = ms.clamp(0.0, self.duration_ms) % self.duration_ms;
    }

    pub fn set_speed(&mut self, factor: f64) {
        self.speed = factor.max(0.0);
    }

    pub fn toggle_play(&mut self) {
        self.is_playing = !self.is_playing;
    }

    /// Playback position as a fraction of the duration, in [0, 1).
    pub fn progress(&self) -> f64 {
        self.virtual_time_ms / self.duration_ms
    }

    /// Index of the last sample at or before the virtual clock, i.e.
    /// strictly in the past relative to it. None while no sample
    /// qualifies yet.
    pub fn sample_index_at(&self, samples: &[Sample]) -> Option<usize> {
        let cutoff = self.go_time_ms + self.virtual_time_ms;
        let ahead = samples.partition_point(|s| s.t <= cutoff);
        ahead.checked_sub(1)
    }

    /// Cursor position for the current virtual time. Before the first
    /// recorded sample the cursor stays pinned at anchor A, modeling
    /// the reaction-time dead zone.
    pub fn cursor_at(&self, samples: &[Sample], anchor_a: Point) -> Point {
        match self.sample_index_at(samples) {
            Some(idx) => samples[idx].position(),
            None => anchor_a,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: f64, x: f64, y: f64) -> Sample {
        Sample {
            t,
            x,
            y,
            velocity: 0.0,
            acceleration: 0.0,
        }
    }

    fn path() -> Vec<Sample> {
        vec![
            sample(1000.0, 10.0, 10.0),
            sample(1150.0, 20.0, 15.0),
            sample(1300.0, 40.0, 25.0),
            sample(1500.0, 80.0, 40.0),
        ]
    }

    #[test]
    fn duration_spans_capture() {
        let session = ReplaySession::new(&path(), 1000.0, 1.0);
        assert_eq!(session.duration_ms, 500.0);
        assert!(session.is_playing);
        assert_eq!(session.virtual_time_ms, 0.0);
    }

    #[test]
    fn duration_floor_for_short_captures() {
        let session = ReplaySession::new(&[sample(1000.0, 0.0, 0.0)], 1000.0, 1.0);
        assert_eq!(session.duration_ms, MIN_REPLAY_DURATION_MS);
        let empty = ReplaySession::new(&[], 1000.0, 1.0);
        assert_eq!(empty.duration_ms, MIN_REPLAY_DURATION_MS);
    }

    #[test]
    fn tick_scales_by_speed() {
        let mut session = ReplaySession::new(&path(), 1000.0, 0.5);
        session.tick(100.0);
        assert_eq!(session.virtual_time_ms, 50.0);

        session.set_speed(2.0);
        session.tick(100.0);
        assert_eq!(session.virtual_time_ms, 250.0);
    }

    #[test]
    fn tick_wraps_to_zero_at_duration() {
        let mut session = ReplaySession::new(&path(), 1000.0, 1.0);
        session.tick(499.0);
        assert_eq!(session.virtual_time_ms, 499.0);
        session.tick(1.0);
        assert_eq!(session.virtual_time_ms, 0.0);
    }

    #[test]
    fn virtual_time_stays_in_range_over_long_playback() {
        let mut session = ReplaySession::new(&path(), 1000.0, 1.7);
        for _ in 0..1000 {
            let vt = session.tick(16.7);
            assert!((0.0..session.duration_ms).contains(&vt));
        }
    }

    #[test]
    fn paused_session_ignores_ticks() {
        let mut session = ReplaySession::new(&path(), 1000.0, 1.0);
        session.toggle_play();
        assert!(!session.is_playing);
        session.tick(200.0);
        assert_eq!(session.virtual_time_ms, 0.0);
    }

    #[test]
    fn seek_preserves_play_state() {
        let mut session = ReplaySession::new(&path(), 1000.0, 1.0);
        session.toggle_play();
        session.seek(250.0);
        assert_eq!(session.virtual_time_ms, 250.0);
        assert!(!session.is_playing);
    }

    #[test]
    fn seek_clamps_and_wraps_end() {
        let mut session = ReplaySession::new(&path(), 1000.0, 1.0);
        session.seek(-50.0);
        assert_eq!(session.virtual_time_ms, 0.0);
        session.seek(9999.0);
        assert_eq!(session.virtual_time_ms, 0.0); // duration wraps to start
        session.seek(499.9);
        assert!((session.virtual_time_ms - 499.9).abs() < 1e-9);
    }

    #[test]
    fn cursor_follows_last_past_sample() {
        let samples = path();
        let mut session = ReplaySession::new(&samples, 1000.0, 1.0);
        let a = Point::new(10.0, 10.0);

        session.seek(0.0);
        assert_eq!(session.sample_index_at(&samples), Some(0));

        session.seek(149.0);
        assert_eq!(session.sample_index_at(&samples), Some(0));

        session.seek(150.0);
        assert_eq!(session.sample_index_at(&samples), Some(1));
        assert_eq!(session.cursor_at(&samples, a), Point::new(20.0, 15.0));

        session.seek(499.0);
        assert_eq!(session.sample_index_at(&samples), Some(2));
    }

    #[test]
    fn cursor_pinned_at_anchor_before_first_sample() {
        // Recording whose first sample lands after the go signal
        let samples = vec![sample(1200.0, 50.0, 50.0), sample(1400.0, 70.0, 60.0)];
        let mut session = ReplaySession::new(&samples, 1000.0, 1.0);
        let a = Point::new(5.0, 5.0);

        session.seek(100.0);
        assert_eq!(session.sample_index_at(&samples), None);
        assert_eq!(session.cursor_at(&samples, a), a);

        session.seek(250.0);
        assert_eq!(session.cursor_at(&samples, a), Point::new(50.0, 50.0));
    }

    #[test]
    fn seek_is_idempotent() {
        let samples = path();
        let mut session = ReplaySession::new(&samples, 1000.0, 1.0);
        let a = Point::new(10.0, 10.0);

        session.seek(320.0);
        let first = (session.sample_index_at(&samples), session.cursor_at(&samples, a));
        session.seek(10.0);
        session.seek(320.0);
        let second = (session.sample_index_at(&samples), session.cursor_at(&samples, a));
        assert_eq!(first, second);
    }

    #[test]
    fn progress_fraction() {
        let mut session = ReplaySession::new(&path(), 1000.0, 1.0);
        session.seek(125.0);
        assert!((session.progress() - 0.25).abs() < 1e-9);
    }
}

use rand::Rng;
use tracing::debug;

use crate::calibration::CalibrationProfile;
use crate::capture::{RawPointerSample, TrialPath};
use crate::config::{Config, EarlyReleasePolicy};
use crate::geometry::{Point, Viewport};
use crate::metrics::{self, DeviationAnalysis, TrialMetrics};
use crate::placement::{self, AnchorPair};
use crate::replay::ReplaySession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TrialPhase {
    #[strum(serialize = "IDLE")]
    Idle,
    #[strum(serialize = "HOLDING")]
    Holding,
    #[strum(serialize = "ACTIVE")]
    Active,
    #[strum(serialize = "RESULTS")]
    Results,
    #[strum(serialize = "FAILED")]
    Failed,
    #[strum(serialize = "REPLAY")]
    Replay,
    #[strum(serialize = "ANALYSIS")]
    Analysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum FailReason {
    #[strum(serialize = "OUT OF BOUNDS")]
    OutOfBounds,
    #[strum(serialize = "MISSED TARGET")]
    MissedTarget,
    #[strum(serialize = "NO MOVEMENT DETECTED")]
    NoMovement,
    #[strum(serialize = "EARLY RELEASE")]
    EarlyRelease,
}

/// Violation marker kept for diagnostic replay after a failed trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    pub reason: FailReason,
    pub last_position: Point,
}

/// The trial state machine.
///
/// Owns the sample path for the trial's lifetime and every timer handle
/// it arms. The hold countdown is an explicit deadline field, cleared
/// on every transition out of holding, so a stale countdown can never
/// fire into a later trial. Downstream consumers only ever read the
/// path.
#[derive(Debug)]
pub struct TrialMachine {
    pub config: Config,
    viewport: Viewport,
    /// Capture surface offset in client coordinates.
    surface_origin: Point,
    anchors: AnchorPair,
    phase: TrialPhase,
    path: TrialPath,
    calibration: Option<CalibrationProfile>,
    go_time_ms: Option<f64>,
    /// Armed while holding; the one-shot delay timer handle.
    hold_deadline_ms: Option<f64>,
    /// Pointer-down location, seeds the path at the go signal.
    hold_origin: Option<Point>,
    results: Option<TrialMetrics>,
    violation: Option<Violation>,
    replay: Option<ReplaySession>,
}

impl TrialMachine {
    pub fn new<R: Rng>(config: Config, viewport: Viewport, rng: &mut R) -> Self {
        let anchors = placement::place_anchors(
            viewport,
            config.display.pixels_per_meter(),
            &config.placement,
            rng,
        );
        Self {
            config,
            viewport,
            surface_origin: Point::new(0.0, 0.0),
            anchors,
            phase: TrialPhase::Idle,
            path: TrialPath::new(),
            calibration: None,
            go_time_ms: None,
            hold_deadline_ms: None,
            hold_origin: None,
            results: None,
            violation: None,
            replay: None,
        }
    }

    pub fn phase(&self) -> TrialPhase {
        self.phase
    }

    pub fn anchors(&self) -> &AnchorPair {
        &self.anchors
    }

    pub fn path(&self) -> &[crate::capture::Sample] {
        self.path.samples()
    }

    pub fn results(&self) -> Option<&TrialMetrics> {
        self.results.as_ref()
    }

    pub fn violation(&self) -> Option<&Violation> {
        self.violation.as_ref()
    }

    pub fn replay(&self) -> Option<&ReplaySession> {
        self.replay.as_ref()
    }

    pub fn go_time_ms(&self) -> Option<f64> {
        self.go_time_ms
    }

    pub fn calibration(&self) -> Option<&CalibrationProfile> {
        self.calibration.as_ref()
    }

    /// Installs the session calibration profile. Without one, reaction
    /// times are reported uncorrected.
    pub fn set_calibration(&mut self, profile: CalibrationProfile) {
        self.calibration = Some(profile);
    }

    pub fn set_surface_origin(&mut self, origin: Point) {
        self.surface_origin = origin;
    }

    fn overhead_ms(&self) -> f64 {
        self.calibration.map_or(0.0, |c| c.overhead_ms)
    }

    fn to_local(&self, raw: &RawPointerSample) -> Point {
        Point::new(
            raw.client_x - self.surface_origin.x,
            raw.client_y - self.surface_origin.y,
        )
    }

    /// Pointer-down in idle. Arms the randomized hold countdown when
    /// the press lands within the capture radius of anchor A. Returns
    /// whether the press was accepted.
    pub fn on_pointer_down<R: Rng>(&mut self, raw: RawPointerSample, rng: &mut R) -> bool {
        if self.phase != TrialPhase::Idle {
            return false;
        }

        let local = self.to_local(&raw);
        if local.distance_to(self.anchors.a) >= self.config.capture_radius_px {
            return false;
        }

        let delay = rng.gen_range(self.config.hold_delay_min_ms..self.config.hold_delay_max_ms);
        self.hold_deadline_ms = Some(raw.t + delay);
        self.hold_origin = Some(local);
        self.phase = TrialPhase::Holding;
        debug!(deadline_in_ms = delay, "holding: countdown armed");
        true
    }

    /// Clock tick. Fires the holding countdown when its deadline has
    /// passed, recording the trial epoch and seeding the path.
    pub fn on_tick(&mut self, now_ms: f64) {
        if self.phase != TrialPhase::Holding {
            return;
        }
        let Some(deadline) = self.hold_deadline_ms else {
            return;
        };
        if now_ms < deadline {
            return;
        }

        self.hold_deadline_ms = None;
        let origin = self.hold_origin.take().unwrap_or(self.anchors.a);
        self.go_time_ms = Some(now_ms);
        self.path.seed(now_ms, origin);
        self.phase = TrialPhase::Active;
        debug!(go_time_ms = now_ms, "active: go signal");
    }

    /// Coalesced pointer motion; only the active phase captures.
    pub fn on_pointer_move(&mut self, batch: &[RawPointerSample]) {
        if self.phase != TrialPhase::Active {
            return;
        }
        self.path.ingest(
            batch,
            self.surface_origin,
            self.config.display.pixels_per_meter(),
        );
    }

    /// Pointer left the capture surface.
    pub fn on_pointer_leave(&mut self) {
        if self.phase == TrialPhase::Active {
            self.fail(FailReason::OutOfBounds);
        }
    }

    /// Pointer-up. During holding this applies the early-release
    /// policy; during the active phase it ends the trial, checking the
    /// violation triggers before deriving metrics.
    pub fn on_pointer_up(&mut self) {
        match self.phase {
            TrialPhase::Holding => {
                // Cancel the countdown before leaving the state.
                self.hold_deadline_ms = None;
                match self.config.early_release {
                    EarlyReleasePolicy::ReturnToIdle => {
                        self.hold_origin = None;
                        self.phase = TrialPhase::Idle;
                        debug!("holding: early release, countdown cancelled");
                    }
                    EarlyReleasePolicy::Fail => self.fail(FailReason::EarlyRelease),
                }
            }
            TrialPhase::Active => {
                if self.path.len() < 2 {
                    self.fail(FailReason::NoMovement);
                    return;
                }
                let last = self.path.last().copied().expect("non-empty path");
                if last.position().distance_to(self.anchors.b) > self.config.hit_radius_px {
                    self.fail(FailReason::MissedTarget);
                    return;
                }

                self.results = metrics::analyze(
                    self.path.samples(),
                    &self.anchors,
                    self.go_time_ms.unwrap_or(last.t),
                    self.overhead_ms(),
                    &self.config.display,
                    &self.config.analysis,
                );
                self.phase = TrialPhase::Results;
                debug!("results: trial complete");
            }
            _ => {}
        }
    }

    fn fail(&mut self, reason: FailReason) {
        let last_position = self
            .path
            .last()
            .map(|s| s.position())
            .or(self.hold_origin)
            .unwrap_or(self.anchors.a);
        self.violation = Some(Violation {
            reason,
            last_position,
        });
        self.hold_deadline_ms = None;
        self.hold_origin = None;
        self.phase = TrialPhase::Failed;
        debug!(%reason, "failed");
    }

    /// Starts replay from results, or from a failed trial for
    /// diagnostics. Needs a captured path.
    pub fn start_replay(&mut self, speed: f64) -> bool {
        let from_terminal = matches!(self.phase, TrialPhase::Results | TrialPhase::Failed);
        if !from_terminal || self.path.is_empty() {
            return false;
        }
        let go = self.go_time_ms.unwrap_or(self.path.samples()[0].t);
        self.replay = Some(ReplaySession::new(self.path.samples(), go, speed));
        self.phase = TrialPhase::Replay;
        true
    }

    /// Frame callback while replaying.
    pub fn on_replay_frame(&mut self, real_delta_ms: f64) {
        if self.phase != TrialPhase::Replay {
            return;
        }
        if let Some(replay) = self.replay.as_mut() {
            replay.tick(real_delta_ms);
        }
    }

    pub fn replay_mut(&mut self) -> Option<&mut ReplaySession> {
        if self.phase == TrialPhase::Replay {
            self.replay.as_mut()
        } else {
            None
        }
    }

    /// Current replay cursor, pinned at anchor A before motion starts.
    pub fn replay_cursor(&self) -> Option<Point> {
        self.replay
            .as_ref()
            .map(|r| r.cursor_at(self.path.samples(), self.anchors.a))
    }

    /// Stops replay and drops the frame loop; lands on results or
    /// failed depending on whether metrics exist.
    pub fn stop_replay(&mut self) {
        if self.phase != TrialPhase::Replay {
            return;
        }
        self.replay = None;
        self.phase = if self.results.is_some() {
            TrialPhase::Results
        } else {
            TrialPhase::Failed
        };
    }

    /// Opens the static path-deviation view.
    pub fn show_analysis(&mut self) -> bool {
        if self.phase == TrialPhase::Results {
            self.phase = TrialPhase::Analysis;
            true
        } else {
            false
        }
    }

    pub fn back_to_results(&mut self) {
        if self.phase == TrialPhase::Analysis {
            self.phase = TrialPhase::Results;
        }
    }

    /// Deviation metrics for the analysis view, computed on demand.
    pub fn deviation(&self) -> Option<DeviationAnalysis> {
        if self.path.is_empty() {
            return None;
        }
        Some(metrics::analyze_deviation(
            self.path.samples(),
            &self.anchors,
            &self.config.display,
        ))
    }

    /// Clears the trial and regenerates anchors. Every armed handle is
    /// already nulled by the time the phase flips back to idle.
    pub fn reset<R: Rng>(&mut self, rng: &mut R) {
        self.path.clear();
        self.results = None;
        self.violation = None;
        self.replay = None;
        self.hold_deadline_ms = None;
        self.hold_origin = None;
        self.go_time_ms = None;
        self.anchors = placement::place_anchors(
            self.viewport,
            self.config.display.pixels_per_meter(),
            &self.config.placement,
            rng,
        );
        self.phase = TrialPhase::Idle;
        debug!("reset: idle");
    }

    /// Layout change. A trial in flight is abandoned (its geometry no
    /// longer matches the surface) and the anchors are regenerated.
    pub fn on_resize<R: Rng>(&mut self, viewport: Viewport, rng: &mut R) {
        self.viewport = viewport;
        if matches!(self.phase, TrialPhase::Holding | TrialPhase::Active) {
            self.reset(rng);
        } else {
            self.anchors = placement::place_anchors(
                viewport,
                self.config.display.pixels_per_meter(),
                &self.config.placement,
                rng,
            );
        }
    }
}

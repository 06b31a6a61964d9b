use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::capture::Sample;
use crate::geometry::{self, DisplayMetrics, Point};
use crate::placement::AnchorPair;

/// Samples below this count carry no measurable motion; callers must
/// not invoke the analyzer on them.
pub const MIN_ANALYZABLE_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Displacement from the first sample that marks movement onset, meters.
    pub movement_threshold_m: f64,
    /// Peak speed separating the ELITE tier, m/s. A tuned constant, not
    /// derived from anything.
    pub elite_threshold_mps: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            movement_threshold_m: 0.002,
            elite_threshold_mps: 1.5,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
pub enum Tier {
    #[strum(serialize = "ELITE")]
    Elite,
    #[strum(serialize = "STANDARD")]
    Standard,
}

impl Tier {
    /// Inverse of the display label; unknown labels read as STANDARD so
    /// a corrupt history row never fails a load.
    pub fn from_label(label: &str) -> Self {
        match label {
            "ELITE" => Tier::Elite,
            _ => Tier::Standard,
        }
    }
}

/// Derived biomechanical metrics for one completed trial. Computed once,
/// never mutated afterward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialMetrics {
    pub reaction_time_ms: f64,
    pub travel_time_ms: f64,
    /// Peak instantaneous speed, m/s.
    pub peak_velocity: f64,
    /// Peak instantaneous acceleration, m/s².
    pub peak_acceleration: f64,
    pub tier: Tier,
    /// Distance from the final sample to the target, millimeters.
    pub accuracy_mm: f64,
    /// Ideal/actual path length ratio, percent in [0, 100].
    pub path_efficiency_pct: f64,
}

impl TrialMetrics {
    pub fn total_time_ms(&self) -> f64 {
        self.reaction_time_ms + self.travel_time_ms
    }

    /// Fraction of the total measured time spent reacting, in [0, 1].
    /// The replay overlay splits its timeline bar with this.
    pub fn reaction_fraction(&self) -> f64 {
        self.reaction_time_ms / self.total_time_ms()
    }
}

/// Derives the trial metrics from a completed path.
///
/// Pure and deterministic; performs no I/O. Returns None below
/// MIN_ANALYZABLE_SAMPLES rather than guessing at motion that was never
/// captured.
pub fn analyze(
    samples: &[Sample],
    anchors: &AnchorPair,
    go_time_ms: f64,
    overhead_ms: f64,
    display: &DisplayMetrics,
    params: &AnalysisParams,
) -> Option<TrialMetrics> {
    if samples.len() < MIN_ANALYZABLE_SAMPLES {
        return None;
    }

    let ppm = display.pixels_per_meter();
    let start = samples[0];
    let last = samples[samples.len() - 1];

    // Movement onset: first sample displaced beyond the threshold from
    // the start sample. Defaults to the start sample itself when the
    // whole path stays inside the threshold.
    let onset_idx = samples
        .iter()
        .position(|s| start.position().distance_to(s.position()) / ppm > params.movement_threshold_m)
        .unwrap_or(0);
    let onset = samples[onset_idx];

    // The floor keeps overhead subtraction from producing non-positive
    // times. Capture latency affects onset detection more than ongoing
    // sampling, hence the quarter correction on travel.
    let reaction_time_ms = (onset.t - go_time_ms - overhead_ms).max(1.0);
    let travel_time_ms = (last.t - onset.t - overhead_ms / 4.0).max(1.0);

    let peak_velocity = samples.iter().map(|s| s.velocity).fold(f64::MIN, f64::max);
    let peak_acceleration = samples
        .iter()
        .map(|s| s.acceleration)
        .fold(f64::MIN, f64::max);

    let accuracy_mm = display.px_to_millimeters(last.position().distance_to(anchors.b));

    let ideal_px = anchors.ideal_distance_px();
    let actual_px: f64 = samples
        .iter()
        .tuple_windows()
        .map(|(p, q)| p.position().distance_to(q.position()))
        .sum();
    let path_efficiency_pct = if actual_px > 0.0 {
        (ideal_px / actual_px * 100.0).min(100.0)
    } else {
        0.0
    };

    let tier = if peak_velocity > params.elite_threshold_mps {
        Tier::Elite
    } else {
        Tier::Standard
    };

    Some(TrialMetrics {
        reaction_time_ms,
        travel_time_ms,
        peak_velocity,
        peak_acceleration,
        tier,
        accuracy_mm,
        path_efficiency_pct,
    })
}

/// Path deviation summary for the analysis view. Computed lazily, not
/// part of the core metrics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviationAnalysis {
    pub max_deviation_px: f64,
    /// Sample position where the maximum occurred.
    pub at: Option<Point>,
    /// Its projection onto the ideal A–B line.
    pub projection: Option<Point>,
    /// Area enclosed between the path and the ideal segment, mm².
    pub enclosed_area_mm2: f64,
}

/// Measures how far the path strayed from the ideal A–B line:
/// perpendicular distance per sample, the maximum with its location and
/// projection, and the enclosed polygon area via the shoelace formula.
pub fn analyze_deviation(
    samples: &[Sample],
    anchors: &AnchorPair,
    display: &DisplayMetrics,
) -> DeviationAnalysis {
    let mut result = DeviationAnalysis::default();

    for sample in samples {
        let p = sample.position();
        if let Some((dist, projection)) = geometry::point_to_line(p, anchors.a, anchors.b) {
            if dist > result.max_deviation_px {
                result.max_deviation_px = dist;
                result.at = Some(p);
                result.projection = Some(projection);
            }
        }
    }

    let positions: Vec<Point> = samples.iter().map(|s| s.position()).collect();
    let area_px2 = geometry::shoelace_area(&positions);
    let mm_per_px = display.px_to_millimeters(1.0);
    result.enclosed_area_mm2 = area_px2 * mm_per_px * mm_per_px;

    result
}

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// One raw pointer event from the input source, in client (window)
/// coordinates. Timestamps come from the host event stream and are
/// expected to be monotonic; out-of-order samples are dropped on ingest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPointerSample {
    pub t: f64,
    pub client_x: f64,
    pub client_y: f64,
}

impl RawPointerSample {
    pub fn new(t: f64, client_x: f64, client_y: f64) -> Self {
        Self {
            t,
            client_x,
            client_y,
        }
    }
}

/// One captured sample of the pointer's motion.
///
/// `velocity` and `acceleration` are raw finite differences of the pixel
/// stream converted to physical units; no smoothing is applied, so both
/// carry sampling noise on fast strikes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Milliseconds on the host monotonic timeline.
    pub t: f64,
    /// Container-local pixel position.
    pub x: f64,
    pub y: f64,
    /// Instantaneous speed, m/s.
    pub velocity: f64,
    /// Instantaneous acceleration, m/s².
    pub acceleration: f64,
}

impl Sample {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Speed relative to a peak, clamped to [0, 1]. Rendering
    /// collaborators use this to color path segments.
    pub fn speed_ratio(&self, peak: f64) -> f64 {
        let peak = if peak > 0.0 { peak } else { 1.0 };
        (self.velocity / peak).min(1.0)
    }
}

/// The captured motion path for one trial attempt.
///
/// Owned exclusively by the trial state machine while the trial is
/// active; downstream consumers only ever see `&[Sample]`. Samples are
/// appended in non-decreasing timestamp order.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TrialPath {
    samples: Vec<Sample>,
}

impl TrialPath {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    /// Seeds the path with the synthetic trial-start sample at the
    /// pointer-down location, establishing t0 with zero kinematics.
    pub fn seed(&mut self, t: f64, at: Point) {
        self.samples.clear();
        self.samples.push(Sample {
            t,
            x: at.x,
            y: at.y,
            velocity: 0.0,
            acceleration: 0.0,
        });
    }

    /// Ingests one coalesced batch of raw events.
    ///
    /// `origin` is the capture surface's client-space offset and
    /// `pixels_per_meter` the current display conversion ratio. Events
    /// with non-positive dt (duplicate or out-of-order timestamps) are
    /// skipped.
    pub fn ingest(&mut self, batch: &[RawPointerSample], origin: Point, pixels_per_meter: f64) {
        for raw in batch {
            let x = raw.client_x - origin.x;
            let y = raw.client_y - origin.y;

            match self.samples.last().copied() {
                Some(last) => {
                    let dt = (raw.t - last.t) / 1000.0;
                    if dt <= 0.0 {
                        continue;
                    }

                    let dx = (x - last.x) / pixels_per_meter;
                    let dy = (y - last.y) / pixels_per_meter;
                    let dist = (dx * dx + dy * dy).sqrt();
                    let velocity = dist / dt;
                    // No prior velocity to differentiate until the
                    // second real sample.
                    let acceleration = if self.samples.len() > 1 {
                        (velocity - last.velocity) / dt
                    } else {
                        0.0
                    };

                    self.samples.push(Sample {
                        t: raw.t,
                        x,
                        y,
                        velocity,
                        acceleration,
                    });
                }
                None => {
                    self.samples.push(Sample {
                        t: raw.t,
                        x,
                        y,
                        velocity: 0.0,
                        acceleration: 0.0,
                    });
                }
            }
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PPM: f64 = 6299.2125984; // 160 ppi at dpr 1.0

    fn seeded_path() -> TrialPath {
        let mut path = TrialPath::new();
        path.seed(1000.0, Point::new(100.0, 100.0));
        path
    }

    #[test]
    fn seed_establishes_t0_with_zero_kinematics() {
        let path = seeded_path();
        assert_eq!(path.len(), 1);
        let first = path.samples()[0];
        assert_eq!(first.t, 1000.0);
        assert_eq!(first.velocity, 0.0);
        assert_eq!(first.acceleration, 0.0);
    }

    #[test]
    fn ingest_converts_to_local_coordinates() {
        let mut path = seeded_path();
        path.ingest(
            &[RawPointerSample::new(1010.0, 160.0, 170.0)],
            Point::new(50.0, 60.0),
            PPM,
        );
        assert_eq!(path.len(), 2);
        let s = path.samples()[1];
        assert_eq!(s.x, 110.0);
        assert_eq!(s.y, 110.0);
    }

    #[test]
    fn ingest_computes_velocity_from_displacement() {
        let mut path = seeded_path();
        // 10ms later, PPM pixels away: 1 meter in 0.01s -> 100 m/s
        path.ingest(
            &[RawPointerSample::new(1010.0, 100.0 + PPM, 100.0)],
            Point::new(0.0, 0.0),
            PPM,
        );
        let s = path.samples()[1];
        assert!((s.velocity - 100.0).abs() < 1e-6);
        // Second sample still has no prior velocity to differentiate
        assert_eq!(s.acceleration, 0.0);
    }

    #[test]
    fn ingest_computes_acceleration_from_third_sample() {
        let mut path = seeded_path();
        path.ingest(
            &[
                RawPointerSample::new(1010.0, 100.0 + PPM * 0.001, 100.0),
                RawPointerSample::new(1020.0, 100.0 + PPM * 0.003, 100.0),
            ],
            Point::new(0.0, 0.0),
            PPM,
        );
        assert_eq!(path.len(), 3);
        let second = path.samples()[1];
        let third = path.samples()[2];
        // v1 = 1mm/10ms = 0.1 m/s, v2 = 2mm/10ms = 0.2 m/s
        assert!((second.velocity - 0.1).abs() < 1e-9);
        assert!((third.velocity - 0.2).abs() < 1e-9);
        // a = (0.2 - 0.1) / 0.01 = 10 m/s²
        assert!((third.acceleration - 10.0).abs() < 1e-6);
    }

    #[test]
    fn ingest_rejects_non_positive_dt() {
        let mut path = seeded_path();
        path.ingest(
            &[
                RawPointerSample::new(1000.0, 120.0, 100.0), // dt == 0
                RawPointerSample::new(990.0, 130.0, 100.0),  // out of order
            ],
            Point::new(0.0, 0.0),
            PPM,
        );
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn ingest_consumes_whole_coalesced_batch() {
        let mut path = seeded_path();
        let batch: Vec<RawPointerSample> = (1..=5)
            .map(|i| RawPointerSample::new(1000.0 + i as f64 * 4.0, 100.0 + i as f64, 100.0))
            .collect();
        path.ingest(&batch, Point::new(0.0, 0.0), PPM);
        assert_eq!(path.len(), 6);
    }

    #[test]
    fn timestamps_stay_non_decreasing() {
        let mut path = seeded_path();
        path.ingest(
            &[
                RawPointerSample::new(1004.0, 101.0, 100.0),
                RawPointerSample::new(1002.0, 99.0, 100.0),
                RawPointerSample::new(1008.0, 103.0, 100.0),
            ],
            Point::new(0.0, 0.0),
            PPM,
        );
        let times: Vec<f64> = path.samples().iter().map(|s| s.t).collect();
        let mut sorted = times.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(times, sorted);
    }

    #[test]
    fn speed_ratio_clamps() {
        let s = Sample {
            t: 0.0,
            x: 0.0,
            y: 0.0,
            velocity: 3.0,
            acceleration: 0.0,
        };
        assert_eq!(s.speed_ratio(1.5), 1.0);
        assert_eq!(s.speed_ratio(6.0), 0.5);
        // Zero peak falls back to a unit divisor instead of dividing by zero
        assert_eq!(s.speed_ratio(0.0), 1.0);
    }
}

use serde::{Deserialize, Serialize};

use crate::runtime::Clock;

/// Iterations of the synthetic workload timed during calibration.
pub const CALIBRATION_ITERATIONS: usize = 50;

/// How the host delivers pointer input. Touch pipelines carry more
/// latency than desktop pointers, so they get a larger fixed correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum InputClass {
    #[strum(serialize = "DESKTOP PRECISION INPUT")]
    DesktopPointer,
    #[strum(serialize = "MOBILE SENSOR ARRAY")]
    TouchSensor,
}

impl InputClass {
    /// Fixed input-pipeline latency constant, in ms.
    pub fn platform_lag_ms(&self) -> f64 {
        match self {
            InputClass::DesktopPointer => 4.0,
            InputClass::TouchSensor => 8.0,
        }
    }
}

/// Fixed measurement overhead for this session, subtracted from every
/// reaction-time measurement. Computed once at startup; a session that
/// skips calibration reports uncorrected times (overhead 0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub overhead_ms: f64,
    /// Standard deviation of the workload samples; a coarse scheduler
    /// jitter estimate, reported for diagnostics only.
    pub jitter_ms: f64,
    pub input_class: InputClass,
}

impl CalibrationProfile {
    /// Profile for a session that never calibrated.
    pub fn uncorrected() -> Self {
        Self {
            overhead_ms: 0.0,
            jitter_ms: 0.0,
            input_class: InputClass::DesktopPointer,
        }
    }
}

/// Estimates scheduler/measurement overhead by timing a fixed number of
/// cheap synthetic workloads against the monotonic clock, then adds the
/// input class's fixed pipeline constant. Arithmetic only; cannot fail.
pub fn calibrate<C: Clock>(clock: &C, input_class: InputClass) -> CalibrationProfile {
    let mut samples = Vec::with_capacity(CALIBRATION_ITERATIONS);

    for _ in 0..CALIBRATION_ITERATIONS {
        let t0 = clock.now_ms();
        let mut acc = 0.0f64;
        for i in 0..100 {
            acc += (i as f64).sqrt();
        }
        std::hint::black_box(acc);
        let t1 = clock.now_ms();
        samples.push(t1 - t0);
    }

    CalibrationProfile {
        overhead_ms: mean(&samples) + input_class.platform_lag_ms(),
        jitter_ms: std_dev(&samples),
        input_class,
    }
}

fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

fn std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

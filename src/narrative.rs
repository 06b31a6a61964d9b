use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::metrics::TrialMetrics;

/// Free-form narration of a trial's metrics, produced by an external
/// service. Presentation framing only; none of these fields feed back
/// into any measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricNarrative {
    pub synaptic_delay: String,
    pub motor_recruitment: String,
    pub muscle_fiber_type: String,
    pub summary: String,
}

/// External narration collaborator. Implementations may do network I/O
/// and fail; the trial flow never depends on them.
pub trait NarrativeService {
    fn narrate(&self, results: &TrialMetrics) -> Result<BiometricNarrative, String>;
}

/// Default no-op service for sessions without narration configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNarrativeService;

impl NarrativeService for NullNarrativeService {
    fn narrate(&self, _results: &TrialMetrics) -> Result<BiometricNarrative, String> {
        Err("narration not configured".to_string())
    }
}

/// Requests narration, swallowing any failure. A dead or misbehaving
/// service costs the caller nothing but the missing text.
pub fn narrate_best_effort<S: NarrativeService>(
    service: &S,
    results: &TrialMetrics,
) -> Option<BiometricNarrative> {
    match service.narrate(results) {
        Ok(narrative) => Some(narrative),
        Err(e) => {
            warn!(error = %e, "narrative service unavailable, continuing without");
            None
        }
    }
}

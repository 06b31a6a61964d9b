use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::capture::Sample;
use crate::geometry::Viewport;
use crate::metrics::TrialMetrics;
use crate::placement::AnchorPair;
use crate::replay::ReplaySession;
use crate::trial::{TrialMachine, TrialPhase};

/// A completed trial frozen to disk. Everything a replay needs to
/// reproduce the capture exactly on a later run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecording {
    pub go_time_ms: f64,
    pub viewport: Viewport,
    pub anchors: AnchorPair,
    pub samples: Vec<Sample>,
    pub results: Option<TrialMetrics>,
}

impl TrialRecording {
    /// Snapshots a machine that has reached a terminal state. None
    /// while a trial is still running or nothing was captured.
    pub fn from_machine(machine: &TrialMachine, viewport: Viewport) -> Option<Self> {
        if !matches!(machine.phase(), TrialPhase::Results | TrialPhase::Failed) {
            return None;
        }
        let samples = machine.path().to_vec();
        let go_time_ms = machine.go_time_ms().or(samples.first().map(|s| s.t))?;
        Some(Self {
            go_time_ms,
            viewport,
            anchors: *machine.anchors(),
            samples,
            results: machine.results().copied(),
        })
    }

    /// Fresh replay session over this recording.
    pub fn replay(&self, speed: f64) -> ReplaySession {
        ReplaySession::new(&self.samples, self.go_time_ms, speed)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(self).map_err(io::Error::other)?;
        fs::write(path, data)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(io::Error::other)
    }
}

//! Reference-trajectory verification.
//!
//! Frame and quaternion conventions cannot be checked by unit tests alone:
//! they must agree with whatever the policy was trained on. A reference
//! trajectory captures known-good `(state, goal, expected observation)`
//! triples from the training pipeline; [`verify`] replays every state through
//! a [`TaskObservation`] and reports where the rebuilt vector diverges.
//!
//! The file format is JSON lines, one [`ReferenceRecord`] per line. Blank
//! lines and lines starting with `#` are ignored.

use std::fs;
use std::path::Path;

use armobs_hal::ReplayStateSource;
use armobs_types::{GoalPose, ObsError, RobotState};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::task::TaskObservation;

/// Default absolute tolerance, loose enough for `f32` materialisation.
pub const DEFAULT_TOLERANCE: f64 = 1e-5;

/// One known-good observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub state: RobotState,
    pub goal: GoalPose,
    pub expected: Vec<f64>,
}

/// Why a record failed verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    Length { expected: usize, actual: usize },
    Values { max_abs_error: f64, worst_index: usize },
    Build { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordMismatch {
    /// Zero-based record index within the trajectory.
    pub record: usize,
    #[serde(flatten)]
    pub mismatch: Mismatch,
}

/// Outcome of [`verify`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyReport {
    pub records: usize,
    pub tolerance: f64,
    /// Largest element-wise error over all records whose length matched.
    pub max_abs_error: f64,
    pub mismatches: Vec<RecordMismatch>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Parse a JSON-lines reference trajectory.
///
/// # Errors
///
/// Returns [`ObsError::Reference`] naming the 1-based line of the first
/// malformed record.
pub fn parse_reference(raw: &str) -> Result<Vec<ReferenceRecord>, ObsError> {
    let mut records = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record: ReferenceRecord = serde_json::from_str(line)
            .map_err(|e| ObsError::Reference(format!("line {}: {e}", idx + 1)))?;
        records.push(record);
    }
    Ok(records)
}

/// Read and parse a reference trajectory file.
pub fn load_reference(path: &Path) -> Result<Vec<ReferenceRecord>, ObsError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| ObsError::Reference(format!("failed to read {}: {e}", path.display())))?;
    parse_reference(&raw)
}

/// Rebuild every record's observation and compare it against `expected`.
///
/// Build errors are reported per record rather than aborting the run, so a
/// single report shows every divergent tick.
pub fn verify(task: &TaskObservation, records: &[ReferenceRecord], tolerance: f64) -> VerifyReport {
    let mut report = VerifyReport {
        records: records.len(),
        tolerance,
        max_abs_error: 0.0,
        mismatches: Vec::new(),
    };

    for (idx, record) in records.iter().enumerate() {
        let mut source = ReplayStateSource::new("reference", [record.state.clone()]);
        let actual = match task.build_observation(&record.goal, &mut source) {
            Ok((obs, _)) => obs.to_f64_vec(),
            Err(e) => {
                warn!(record = idx, error = %e, "reference record failed to build");
                report.mismatches.push(RecordMismatch {
                    record: idx,
                    mismatch: Mismatch::Build {
                        error: e.to_string(),
                    },
                });
                continue;
            }
        };

        if actual.len() != record.expected.len() {
            warn!(
                record = idx,
                expected = record.expected.len(),
                actual = actual.len(),
                "reference length mismatch"
            );
            report.mismatches.push(RecordMismatch {
                record: idx,
                mismatch: Mismatch::Length {
                    expected: record.expected.len(),
                    actual: actual.len(),
                },
            });
            continue;
        }

        let (worst_index, max_abs_error) = actual
            .iter()
            .zip(&record.expected)
            .map(|(a, e)| (a - e).abs())
            .enumerate()
            .fold((0, 0.0_f64), |best, (i, err)| {
                // NaN on either side counts as an infinite error.
                let err = if err.is_nan() { f64::INFINITY } else { err };
                if err > best.1 { (i, err) } else { best }
            });

        report.max_abs_error = report.max_abs_error.max(max_abs_error);
        if max_abs_error > tolerance {
            warn!(record = idx, worst_index, max_abs_error, "reference value mismatch");
            report.mismatches.push(RecordMismatch {
                record: idx,
                mismatch: Mismatch::Values {
                    max_abs_error,
                    worst_index,
                },
            });
        }
    }

    info!(
        records = report.records,
        mismatches = report.mismatches.len(),
        max_abs_error = report.max_abs_error,
        "reference verification finished"
    );
    report
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

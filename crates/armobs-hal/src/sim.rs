//! In-process simulated state source for CI/CD testing without a physical arm.
//!
//! [`SimStateSource`] returns a scripted [`RobotState`] on every query. The
//! builder-style `with_*` methods set the pose, joints and wrenches; a
//! one-shot failure can be injected to exercise error propagation.
//!
//! # Example
//!
//! ```rust
//! use armobs_hal::sim::SimStateSource;
//! use armobs_hal::StateSource;
//! use nalgebra::Vector3;
//!
//! let mut source = SimStateSource::new("sim_arm")
//!     .with_joint_angles(vec![0.0; 7])
//!     .with_ee_position(Vector3::new(0.5, 0.0, 0.1));
//!
//! let state = source.get_state().expect("sim state must be available");
//! assert_eq!(state.num_joints(), 7);
//! ```

use armobs_types::{ObsError, RobotState, Wrench};
use nalgebra::{Matrix3, Vector3};
use tracing::debug;

use crate::state_source::StateSource;

/// Joint count of the default simulated arm (7-DoF).
pub const SIM_DEFAULT_JOINTS: usize = 7;

/// A simulated arm that reports a fixed, scriptable state.
///
/// Defaults: seven zero joint angles, end effector at the origin with the
/// identity orientation, both wrenches zero.
#[derive(Debug, Clone)]
pub struct SimStateSource {
    id: String,
    state: RobotState,
    pending_failure: Option<String>,
    queries: usize,
}

impl SimStateSource {
    /// Create a new simulated source with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: RobotState {
                joint_angles: vec![0.0; SIM_DEFAULT_JOINTS],
                ee_position: Vector3::zeros(),
                ee_orientation: Matrix3::identity(),
                wrench_estimate: Wrench::zero(),
                wrench_sensor: Wrench::zero(),
            },
            pending_failure: None,
            queries: 0,
        }
    }

    pub fn with_joint_angles(mut self, joint_angles: Vec<f64>) -> Self {
        self.state.joint_angles = joint_angles;
        self
    }

    pub fn with_ee_position(mut self, position: Vector3<f64>) -> Self {
        self.state.ee_position = position;
        self
    }

    pub fn with_ee_orientation(mut self, orientation: Matrix3<f64>) -> Self {
        self.state.ee_orientation = orientation;
        self
    }

    /// Set the model-based (robot estimate) and sensor wrenches.
    pub fn with_wrenches(mut self, estimate: Wrench, sensor: Wrench) -> Self {
        self.state.wrench_estimate = estimate;
        self.state.wrench_sensor = sensor;
        self
    }

    /// Make the next [`get_state`][StateSource::get_state] call fail with
    /// [`ObsError::StateUnavailable`] carrying `details`.
    pub fn fail_next(&mut self, details: impl Into<String>) {
        self.pending_failure = Some(details.into());
    }

    /// Number of successful and failed queries served so far.
    pub fn queries(&self) -> usize {
        self.queries
    }
}

impl StateSource for SimStateSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn get_state(&mut self) -> Result<RobotState, ObsError> {
        self.queries += 1;
        if let Some(details) = self.pending_failure.take() {
            debug!(source = %self.id, %details, "injected state failure");
            return Err(ObsError::StateUnavailable {
                source_id: self.id.clone(),
                details,
            });
        }
        Ok(self.state.clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

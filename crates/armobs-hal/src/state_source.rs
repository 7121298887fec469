//! Generic `StateSource` trait for anything that can report the arm's
//! proprioceptive state.
//!
//! Robot drivers implement this trait; observation builders only ever talk
//! to the trait, so a real arm, a simulator and a recorded trajectory are
//! interchangeable.

use armobs_types::{ObsError, RobotState};

/// A source of complete [`RobotState`] snapshots.
///
/// Each call to [`get_state`][Self::get_state] must return a full snapshot
/// (joint angles, end-effector pose and both wrench estimates) or fail. A
/// partially filled snapshot is never acceptable.
pub trait StateSource: Send {
    /// Stable identifier for this source, e.g. `"franka_arm"`.
    fn id(&self) -> &str;

    /// Query the current robot state.
    ///
    /// # Errors
    ///
    /// Returns [`ObsError::StateUnavailable`] when no snapshot can be
    /// produced (driver disconnected, timeout, exhausted recording). Callers
    /// must not retry inside an observation build.
    fn get_state(&mut self) -> Result<RobotState, ObsError>;
}

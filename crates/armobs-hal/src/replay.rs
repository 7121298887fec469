//! [`ReplayStateSource`] – serves previously recorded snapshots in order.
//!
//! Used to rebuild observations from a logged trajectory so they can be
//! compared against a known-good reference. Running past the end of the
//! recording is a [`ObsError::StateUnavailable`], never a silent repeat.

use std::collections::VecDeque;

use armobs_types::{ObsError, RobotState};

use crate::state_source::StateSource;

/// A state source backed by a queue of recorded [`RobotState`]s.
#[derive(Debug, Clone)]
pub struct ReplayStateSource {
    id: String,
    states: VecDeque<RobotState>,
    served: usize,
}

impl ReplayStateSource {
    pub fn new(id: impl Into<String>, states: impl IntoIterator<Item = RobotState>) -> Self {
        Self {
            id: id.into(),
            states: states.into_iter().collect(),
            served: 0,
        }
    }
}

impl StateSource for ReplayStateSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn get_state(&mut self) -> Result<RobotState, ObsError> {
        match self.states.pop_front() {
            Some(state) => {
                self.served += 1;
                Ok(state)
            }
            None => Err(ObsError::StateUnavailable {
                source_id: self.id.clone(),
                details: format!("recording exhausted after {} snapshot(s)", self.served),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armobs_types::Wrench;
    use nalgebra::{Matrix3, Vector3};

    fn state_at(z: f64) -> RobotState {
        RobotState {
            joint_angles: vec![0.0; 7],
            ee_position: Vector3::new(0.5, 0.0, z),
            ee_orientation: Matrix3::identity(),
            wrench_estimate: Wrench::zero(),
            wrench_sensor: Wrench::zero(),
        }
    }

    #[test]
    fn replays_in_recorded_order() {
        let mut source = ReplayStateSource::new("bag", [state_at(0.3), state_at(0.2)]);
        assert_eq!(source.get_state().unwrap().ee_position.z, 0.3);
        assert_eq!(source.get_state().unwrap().ee_position.z, 0.2);
        assert!(source.get_state().is_err());
    }

    #[test]
    fn exhausted_recording_is_state_unavailable() {
        let mut source = ReplayStateSource::new("bag", [state_at(0.1)]);
        source.get_state().unwrap();

        let err = source.get_state().unwrap_err();
        match err {
            ObsError::StateUnavailable { source_id, details } => {
                assert_eq!(source_id, "bag");
                assert!(details.contains("1 snapshot"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_recording_fails_immediately() {
        let mut source = ReplayStateSource::new("bag", Vec::new());
        assert!(source.get_state().is_err());
    }
}

//! Observation builder for the Insert task.
//!
//! Feature layout (concatenation order is part of the policy contract):
//!
//! | Slice | Content | Len |
//! |---|---|---|
//! | 1 | joint angles | N |
//! | 2 | end-effector position | 3 |
//! | 3 | end-effector orientation, quaternion `(x, y, z, w)` | 4 |
//! | 4 | corrected goal position | 3 |
//! | 5 | corrected goal orientation, quaternion `(x, y, z, w)` | 4 |
//! | 6 | corrected goal position − end-effector position | 3 |
//! | 7 | selected wrench (only with a force source) | 6 |
//!
//! Two goal corrections reproduce what the policy saw during training: the
//! goal z-target sits [`GOAL_Z_OFFSET_M`] below the nominal goal, and, when
//! `override_obs_goal_roll_angle` is configured, the goal orientation is
//! levelled to zero roll and pitch.

use armobs_hal::StateSource;
use armobs_perception::rotation::{level_roll_pitch, matrix_to_quat_xyzw, validate_rotation};
use armobs_types::{
    EulerConvention, ForceSource, GoalPose, ObsError, ObservationVector, RobotState, Wrench,
};
use nalgebra::{Matrix3, Vector3};

use crate::task::TaskContext;

/// Downward shift applied to the goal z-position (metres).
pub const GOAL_Z_OFFSET_M: f64 = 0.003;

/// Pose features that follow the joint angles: position, quaternion, goal
/// position, goal quaternion, goal delta.
pub const POSE_FEATURES: usize = 3 + 4 + 3 + 4 + 3;

/// Trailing wrench features when a force source is configured.
pub const WRENCH_FEATURES: usize = 6;

/// Insert-specific correction parameters, resolved once per task instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertParams {
    pub force_source: Option<ForceSource>,
    /// Zero the goal's roll and pitch before it is observed.
    pub level_goal_orientation: bool,
    pub euler_convention: EulerConvention,
}

impl InsertParams {
    pub fn from_context(context: &TaskContext) -> Self {
        let rl = &context.config().rl;
        Self {
            force_source: context.force_source(),
            level_goal_orientation: rl.override_obs_goal_roll_angle.is_some(),
            euler_convention: rl.euler_convention,
        }
    }

    pub fn observation_len(&self, num_joints: usize) -> usize {
        let wrench = if self.force_source.is_some() {
            WRENCH_FEATURES
        } else {
            0
        };
        num_joints + POSE_FEATURES + wrench
    }
}

/// Shift the goal z-target down by [`GOAL_Z_OFFSET_M`]; x and y are untouched.
pub fn correct_goal_position(position: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(position.x, position.y, position.z - GOAL_Z_OFFSET_M)
}

/// Level the goal orientation when configured, otherwise pass it through.
pub fn correct_goal_orientation(orientation: &Matrix3<f64>, params: &InsertParams) -> Matrix3<f64> {
    if params.level_goal_orientation {
        level_roll_pitch(orientation, params.euler_convention)
    } else {
        *orientation
    }
}

/// Concatenate the features of one tick in layout order.
pub fn assemble(
    state: &RobotState,
    goal_position: &Vector3<f64>,
    goal_orientation: &Matrix3<f64>,
    wrench: Option<&Wrench>,
) -> Vec<f64> {
    let mut values = Vec::with_capacity(
        state.num_joints() + POSE_FEATURES + wrench.map_or(0, |_| WRENCH_FEATURES),
    );
    values.extend_from_slice(&state.joint_angles);
    values.extend(state.ee_position.iter());
    values.extend(matrix_to_quat_xyzw(&state.ee_orientation));
    values.extend(goal_position.iter());
    values.extend(matrix_to_quat_xyzw(goal_orientation));
    values.extend((goal_position - state.ee_position).iter());
    if let Some(w) = wrench {
        values.extend_from_slice(w.as_slice());
    }
    values
}

pub(crate) fn build_observation(
    context: &TaskContext,
    params: &InsertParams,
    goal: &GoalPose,
    source: &mut dyn StateSource,
) -> Result<(ObservationVector, RobotState), ObsError> {
    let state = source.get_state()?;
    validate_rotation(&state.ee_orientation, "ee_orientation")?;
    validate_rotation(&goal.orientation, "goal_orientation")?;

    let wrench = params.force_source.map(|f| f.select(&state));
    let goal_position = correct_goal_position(&goal.position);
    let goal_orientation = correct_goal_orientation(&goal.orientation, params);

    let values = assemble(&state, &goal_position, &goal_orientation, wrench.as_ref());
    Ok((context.materialize(values), state))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::f64::consts::PI;

    use armobs_hal::SimStateSource;
    use armobs_perception::rotation::{matrix_to_euler, quat_xyzw_to_matrix};
    use armobs_types::Precision;
    use nalgebra::Rotation3;

    use crate::task::{GoalRollOverride, RunArgs, TaskInstanceConfig};

    fn context_with(config: TaskInstanceConfig, precision: Precision) -> TaskContext {
        let args = RunArgs {
            precision,
            ..RunArgs::default()
        };
        TaskContext::new(args, config, false, BTreeMap::new()).unwrap()
    }

    fn params(force_source: Option<ForceSource>, level: bool) -> InsertParams {
        InsertParams {
            force_source,
            level_goal_orientation: level,
            euler_convention: EulerConvention::ExtrinsicXyz,
        }
    }

    fn tilted_goal() -> GoalPose {
        let orientation = Rotation3::from_euler_angles(PI, 0.1, -0.8).into_inner();
        GoalPose::new(Vector3::new(0.45, -0.05, 0.12), orientation)
    }

    fn arm() -> SimStateSource {
        SimStateSource::new("sim")
            .with_joint_angles(vec![0.0, -0.4, 0.0, -2.2, 0.0, 1.9, 0.8])
            .with_ee_position(Vector3::new(0.44, -0.04, 0.18))
            .with_wrenches(
                Wrench::new([0.5, -0.2, -4.0], [0.01, 0.02, 0.0]),
                Wrench::new([0.4, -0.1, -3.8], [0.0, 0.03, -0.01]),
            )
    }

    #[test]
    fn goal_z_offset_is_exactly_three_millimetres() {
        let p = Vector3::new(0.1, 0.2, 0.3);
        let c = correct_goal_position(&p);
        assert_eq!(c.x, 0.1);
        assert_eq!(c.y, 0.2);
        assert_eq!(c.z, 0.3 - 0.003);
    }

    #[test]
    fn orientation_passes_through_without_override() {
        let goal = tilted_goal();
        let out = correct_goal_orientation(&goal.orientation, &params(None, false));
        assert_eq!(out, goal.orientation);
    }

    #[test]
    fn orientation_is_levelled_with_override() {
        let goal = tilted_goal();
        let out = correct_goal_orientation(&goal.orientation, &params(None, true));
        let angles = matrix_to_euler(&out, EulerConvention::ExtrinsicXyz);
        assert_eq!(angles.roll, 0.0);
        assert_eq!(angles.pitch, 0.0);
        assert!((angles.yaw + 0.8).abs() < 1e-9, "yaw = {}", angles.yaw);
    }

    #[test]
    fn layout_order_without_wrench() {
        let mut source = arm();
        let state = source.get_state().unwrap();
        let goal = tilted_goal();
        let goal_pos = correct_goal_position(&goal.position);

        let values = assemble(&state, &goal_pos, &goal.orientation, None);
        assert_eq!(values.len(), 7 + POSE_FEATURES);
        assert_eq!(&values[0..7], state.joint_angles.as_slice());
        assert_eq!(&values[7..10], state.ee_position.as_slice());
        assert_eq!(values[10..14], matrix_to_quat_xyzw(&state.ee_orientation));
        assert_eq!(&values[14..17], goal_pos.as_slice());
        assert_eq!(values[17..21], matrix_to_quat_xyzw(&goal.orientation));
        let delta = goal_pos - state.ee_position;
        assert_eq!(&values[21..24], delta.as_slice());
    }

    #[test]
    fn force_selection_law() {
        let goal = tilted_goal();
        let state = arm().get_state().unwrap();

        for (raw, expected) in [
            ("force_sensor", state.wrench_sensor),
            ("robot_estimate", state.wrench_estimate),
        ] {
            let ctx = context_with(
                TaskInstanceConfig::new("insert").with_force_source(raw),
                Precision::F64,
            );
            let p = InsertParams::from_context(&ctx);
            let (obs, _) = build_observation(&ctx, &p, &goal, &mut arm()).unwrap();
            let values = obs.to_f64_vec();
            assert_eq!(values.len(), 7 + POSE_FEATURES + WRENCH_FEATURES);
            assert_eq!(&values[values.len() - 6..], expected.as_slice(), "{raw}");
        }

        let ctx = context_with(TaskInstanceConfig::new("insert"), Precision::F64);
        let p = InsertParams::from_context(&ctx);
        let (obs, _) = build_observation(&ctx, &p, &goal, &mut arm()).unwrap();
        assert_eq!(obs.len(), 7 + POSE_FEATURES);
    }

    #[test]
    fn returns_raw_snapshot_untouched() {
        let ctx = context_with(TaskInstanceConfig::new("insert"), Precision::F32);
        let p = InsertParams::from_context(&ctx);
        let mut source = arm();
        let expected = source.clone().get_state().unwrap();
        let (_, state) = build_observation(&ctx, &p, &tilted_goal(), &mut source).unwrap();
        assert_eq!(state, expected);
        assert_eq!(source.queries(), 1);
    }

    #[test]
    fn quaternion_features_are_unit_norm() {
        let ctx = context_with(
            TaskInstanceConfig::new("insert").with_goal_roll_override(GoalRollOverride::Flag(true)),
            Precision::F64,
        );
        let p = InsertParams::from_context(&ctx);
        let orientation = Rotation3::from_euler_angles(0.3, -0.2, 1.0).into_inner();
        let mut source = arm().with_ee_orientation(orientation);
        let (obs, _) = build_observation(&ctx, &p, &tilted_goal(), &mut source).unwrap();
        let values = obs.to_f64_vec();
        for range in [10..14, 17..21] {
            let norm = values[range].iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-12);
        }
        let back = quat_xyzw_to_matrix([values[10], values[11], values[12], values[13]]);
        assert!((back - orientation).amax() < 1e-9);
    }

    #[test]
    fn invalid_goal_rotation_is_rejected() {
        let ctx = context_with(TaskInstanceConfig::new("insert"), Precision::F32);
        let p = InsertParams::from_context(&ctx);
        let goal = GoalPose::new(Vector3::zeros(), Matrix3::zeros());
        let err = build_observation(&ctx, &p, &goal, &mut arm()).unwrap_err();
        assert!(matches!(err, ObsError::InvalidRotation { ref field, .. } if field == "goal_orientation"));
    }

    #[test]
    fn invalid_ee_rotation_is_rejected() {
        let ctx = context_with(TaskInstanceConfig::new("insert"), Precision::F32);
        let p = InsertParams::from_context(&ctx);
        let mut source = arm().with_ee_orientation(Matrix3::zeros());
        let err = build_observation(&ctx, &p, &tilted_goal(), &mut source).unwrap_err();
        assert!(matches!(err, ObsError::InvalidRotation { ref field, .. } if field == "ee_orientation"));
        assert_eq!(source.queries(), 1);
    }

    #[test]
    fn observation_len_accounts_for_wrench() {
        assert_eq!(params(None, false).observation_len(7), 24);
        assert_eq!(params(Some(ForceSource::ForceSensor), false).observation_len(7), 30);
        assert_eq!(params(Some(ForceSource::RobotEstimate), true).observation_len(6), 29);
    }
}

//! `armobs-perception` – orientation math for observation building.
//!
//! # Modules
//!
//! - [`rotation`] – conversions between rotation matrices, `(x, y, z, w)`
//!   quaternions and Euler angles, plus [`level_roll_pitch`][rotation::level_roll_pitch]
//!   which strips roll and pitch from a goal orientation and
//!   [`validate_rotation`][rotation::validate_rotation] which rejects
//!   malformed matrices before they reach the policy.

pub mod rotation;

pub use rotation::{
    EulerAngles, euler_to_matrix, level_roll_pitch, matrix_to_euler, matrix_to_quat_xyzw,
    quat_xyzw_to_matrix, validate_rotation,
};

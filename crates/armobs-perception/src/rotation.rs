//! Rotation representation engine.
//!
//! Converts between the three orientation representations an observation
//! builder touches:
//!
//! - 3×3 rotation matrices, as reported by the robot and supplied in goals;
//! - unit quaternions in **(x, y, z, w)** component order (scalar last), the
//!   layout the policy consumes;
//! - Euler angles `(roll, pitch, yaw)` under a configurable
//!   [`EulerConvention`], used to level a goal orientation.
//!
//! # Example
//!
//! ```rust
//! use armobs_perception::rotation::{matrix_to_quat_xyzw, quat_xyzw_to_matrix};
//! use nalgebra::Matrix3;
//!
//! let q = matrix_to_quat_xyzw(&Matrix3::identity());
//! assert_eq!(q, [0.0, 0.0, 0.0, 1.0]);
//!
//! let m = quat_xyzw_to_matrix(q);
//! assert!((m - Matrix3::identity()).norm() < 1e-12);
//! ```

use armobs_types::{EulerConvention, ObsError};
use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};
use tracing::debug;

/// Maximum deviation from orthonormality (`|RᵀR − I|` element-wise and
/// `|det R − 1|`) accepted by [`validate_rotation`].
pub const ROTATION_TOLERANCE: f64 = 1e-4;

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

/// Check that `m` is a finite proper rotation matrix.
///
/// `field` names the offending input in the error (e.g. `"goal_orientation"`).
///
/// # Errors
///
/// Returns [`ObsError::InvalidRotation`] when any element is NaN/infinite,
/// when `m` is not orthonormal within [`ROTATION_TOLERANCE`], or when it is a
/// reflection (`det ≈ −1`).
pub fn validate_rotation(m: &Matrix3<f64>, field: &str) -> Result<(), ObsError> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(ObsError::InvalidRotation {
            field: field.to_string(),
            details: "matrix contains non-finite elements".to_string(),
        });
    }

    let gram_error = (m.transpose() * m - Matrix3::identity()).amax();
    if gram_error > ROTATION_TOLERANCE {
        return Err(ObsError::InvalidRotation {
            field: field.to_string(),
            details: format!("matrix is not orthonormal (max |RᵀR − I| = {gram_error:.3e})"),
        });
    }

    let det = m.determinant();
    if (det - 1.0).abs() > ROTATION_TOLERANCE {
        return Err(ObsError::InvalidRotation {
            field: field.to_string(),
            details: format!("determinant is {det:.6}, expected 1"),
        });
    }

    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Quaternions (x, y, z, w)
// ────────────────────────────────────────────────────────────────────────────

/// Convert a rotation matrix to a unit quaternion in `[x, y, z, w]` order.
///
/// Uses the largest-pivot method: whichever of the three diagonal elements
/// or the trace is largest seeds the most numerically stable component, the
/// others are recovered from off-diagonal sums and differences, and the
/// result is normalised. The sign is whatever the pivot produces; no
/// `w ≥ 0` canonicalisation is applied.
pub fn matrix_to_quat_xyzw(m: &Matrix3<f64>) -> [f64; 4] {
    let trace = m[(0, 0)] + m[(1, 1)] + m[(2, 2)];
    let decision = [m[(0, 0)], m[(1, 1)], m[(2, 2)], trace];

    // First maximum wins on ties.
    let mut choice = 0;
    for (idx, value) in decision.iter().enumerate().skip(1) {
        if *value > decision[choice] {
            choice = idx;
        }
    }

    let mut q = [0.0_f64; 4];
    if choice == 3 {
        q[0] = m[(2, 1)] - m[(1, 2)];
        q[1] = m[(0, 2)] - m[(2, 0)];
        q[2] = m[(1, 0)] - m[(0, 1)];
        q[3] = 1.0 + trace;
    } else {
        let i = choice;
        let j = (i + 1) % 3;
        let k = (j + 1) % 3;
        q[i] = 1.0 - trace + 2.0 * m[(i, i)];
        q[j] = m[(j, i)] + m[(i, j)];
        q[k] = m[(k, i)] + m[(i, k)];
        q[3] = m[(k, j)] - m[(j, k)];
    }

    let norm = q.iter().map(|c| c * c).sum::<f64>().sqrt();
    q.map(|c| c / norm)
}

/// Convert an `[x, y, z, w]` quaternion back to a rotation matrix.
///
/// The quaternion is normalised first, so any non-zero quaternion yields a
/// proper rotation.
pub fn quat_xyzw_to_matrix(q: [f64; 4]) -> Matrix3<f64> {
    let [x, y, z, w] = q;
    UnitQuaternion::from_quaternion(Quaternion::new(w, x, y, z))
        .to_rotation_matrix()
        .into_inner()
}

// ────────────────────────────────────────────────────────────────────────────
// Euler angles
// ────────────────────────────────────────────────────────────────────────────

/// Rotation angles about x (`roll`), y (`pitch`) and z (`yaw`), in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }
}

/// Decompose `m` into Euler angles under `convention`.
///
/// At gimbal lock (pitch = ±π/2) the split between roll and yaw is not
/// unique; the third angle is set to zero and the first absorbs the rotation.
pub fn matrix_to_euler(m: &Matrix3<f64>, convention: EulerConvention) -> EulerAngles {
    match convention {
        EulerConvention::ExtrinsicXyz => {
            let (roll, pitch, yaw) = Rotation3::from_matrix_unchecked(*m).euler_angles();
            EulerAngles::new(roll, pitch, yaw)
        }
        EulerConvention::IntrinsicXyz => {
            // R = Rx(roll) · Ry(pitch) · Rz(yaw)
            let s_pitch = m[(0, 2)].clamp(-1.0, 1.0);
            let pitch = s_pitch.asin();
            if s_pitch.abs() < 1.0 - 1e-12 {
                let roll = (-m[(1, 2)]).atan2(m[(2, 2)]);
                let yaw = (-m[(0, 1)]).atan2(m[(0, 0)]);
                EulerAngles::new(roll, pitch, yaw)
            } else {
                debug!(pitch, "intrinsic xyz decomposition at gimbal lock");
                let roll = (m[(1, 0)] * s_pitch.signum()).atan2(m[(1, 1)]);
                EulerAngles::new(roll, pitch, 0.0)
            }
        }
    }
}

/// Compose a rotation matrix from Euler angles under `convention`.
pub fn euler_to_matrix(angles: EulerAngles, convention: EulerConvention) -> Matrix3<f64> {
    match convention {
        EulerConvention::ExtrinsicXyz => {
            Rotation3::from_euler_angles(angles.roll, angles.pitch, angles.yaw).into_inner()
        }
        EulerConvention::IntrinsicXyz => {
            let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), angles.roll);
            let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), angles.pitch);
            let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), angles.yaw);
            (rx * ry * rz).into_inner()
        }
    }
}

/// Remove roll and pitch from `m`, keeping only its yaw under `convention`.
///
/// The result is a pure rotation about the base z axis.
pub fn level_roll_pitch(m: &Matrix3<f64>, convention: EulerConvention) -> Matrix3<f64> {
    let angles = matrix_to_euler(m, convention);
    euler_to_matrix(EulerAngles::new(0.0, 0.0, angles.yaw), convention)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2, FRAC_PI_4, PI};

    fn assert_mat_close(a: &Matrix3<f64>, b: &Matrix3<f64>, tol: f64) {
        let diff = (a - b).amax();
        assert!(diff < tol, "matrices differ by {diff}:\n{a}\n{b}");
    }

    fn rot_z(angle: f64) -> Matrix3<f64> {
        Rotation3::from_axis_angle(&Vector3::z_axis(), angle).into_inner()
    }

    fn rot_x(angle: f64) -> Matrix3<f64> {
        Rotation3::from_axis_angle(&Vector3::x_axis(), angle).into_inner()
    }

    // ── Quaternions ─────────────────────────────────────────────────────────

    #[test]
    fn identity_quaternion_is_scalar_last() {
        let q = matrix_to_quat_xyzw(&Matrix3::identity());
        assert_eq!(q, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn yaw_90deg_quaternion_components() {
        let q = matrix_to_quat_xyzw(&rot_z(FRAC_PI_2));
        assert!(q[0].abs() < 1e-12);
        assert!(q[1].abs() < 1e-12);
        assert!((q[2] - FRAC_1_SQRT_2).abs() < 1e-12, "z = {}", q[2]);
        assert!((q[3] - FRAC_1_SQRT_2).abs() < 1e-12, "w = {}", q[3]);
    }

    #[test]
    fn roll_180deg_uses_diagonal_pivot() {
        // Trace is −1 here, so the x diagonal element drives the conversion.
        let q = matrix_to_quat_xyzw(&rot_x(PI));
        assert!((q[0].abs() - 1.0).abs() < 1e-12, "x = {}", q[0]);
        assert!(q[1].abs() < 1e-12);
        assert!(q[2].abs() < 1e-12);
        assert!(q[3].abs() < 1e-12);
    }

    #[test]
    fn quaternion_is_unit_norm() {
        let m = euler_to_matrix(EulerAngles::new(0.3, -1.1, 2.5), EulerConvention::ExtrinsicXyz);
        let q = matrix_to_quat_xyzw(&m);
        let norm: f64 = q.iter().map(|c| c * c).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn quaternion_roundtrip_on_angle_grid() {
        let steps = [-PI, -2.0, -FRAC_PI_2, -0.4, 0.0, 0.7, FRAC_PI_2, 2.9];
        for &r in &steps {
            for &p in &[-1.2, -FRAC_PI_4, 0.0, 0.5, 1.4] {
                for &y in &steps {
                    let m = euler_to_matrix(EulerAngles::new(r, p, y), EulerConvention::ExtrinsicXyz);
                    let back = quat_xyzw_to_matrix(matrix_to_quat_xyzw(&m));
                    assert_mat_close(&m, &back, 1e-9);
                }
            }
        }
    }

    // ── Euler ───────────────────────────────────────────────────────────────

    #[test]
    fn extrinsic_euler_roundtrip() {
        let angles = EulerAngles::new(0.2, -0.4, 1.3);
        let m = euler_to_matrix(angles, EulerConvention::ExtrinsicXyz);
        let back = matrix_to_euler(&m, EulerConvention::ExtrinsicXyz);
        assert!((back.roll - 0.2).abs() < 1e-9);
        assert!((back.pitch + 0.4).abs() < 1e-9);
        assert!((back.yaw - 1.3).abs() < 1e-9);
    }

    #[test]
    fn extrinsic_is_z_then_y_then_x_product() {
        let angles = EulerAngles::new(0.2, -0.4, 1.3);
        let expected = Rotation3::from_axis_angle(&Vector3::z_axis(), 1.3)
            * Rotation3::from_axis_angle(&Vector3::y_axis(), -0.4)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), 0.2);
        assert_mat_close(
            &euler_to_matrix(angles, EulerConvention::ExtrinsicXyz),
            expected.matrix(),
            1e-12,
        );
    }

    #[test]
    fn intrinsic_euler_roundtrip() {
        let angles = EulerAngles::new(-0.7, 0.9, -2.2);
        let m = euler_to_matrix(angles, EulerConvention::IntrinsicXyz);
        let back = matrix_to_euler(&m, EulerConvention::IntrinsicXyz);
        assert!((back.roll + 0.7).abs() < 1e-9);
        assert!((back.pitch - 0.9).abs() < 1e-9);
        assert!((back.yaw + 2.2).abs() < 1e-9);
    }

    #[test]
    fn intrinsic_gimbal_lock_reconstructs_matrix() {
        let m = euler_to_matrix(EulerAngles::new(0.4, FRAC_PI_2, 0.0), EulerConvention::IntrinsicXyz);
        let angles = matrix_to_euler(&m, EulerConvention::IntrinsicXyz);
        assert_eq!(angles.yaw, 0.0);
        assert_mat_close(&euler_to_matrix(angles, EulerConvention::IntrinsicXyz), &m, 1e-9);
    }

    #[test]
    fn level_roll_pitch_keeps_only_yaw() {
        // Typical insertion goal: gripper pointing down (roll = π) with a yaw.
        let goal = rot_z(0.6) * rot_x(PI);
        let levelled = level_roll_pitch(&goal, EulerConvention::ExtrinsicXyz);
        assert_mat_close(&levelled, &rot_z(0.6), 1e-9);

        let angles = matrix_to_euler(&levelled, EulerConvention::ExtrinsicXyz);
        assert_eq!(angles.roll, 0.0);
        assert_eq!(angles.pitch, 0.0);
    }

    #[test]
    fn level_roll_pitch_is_noop_for_pure_yaw() {
        for convention in [EulerConvention::ExtrinsicXyz, EulerConvention::IntrinsicXyz] {
            let m = rot_z(-1.1);
            assert_mat_close(&level_roll_pitch(&m, convention), &m, 1e-12);
        }
    }

    // ── Validation ──────────────────────────────────────────────────────────

    #[test]
    fn validate_accepts_proper_rotation() {
        assert!(validate_rotation(&rot_z(0.3), "goal").is_ok());
    }

    #[test]
    fn validate_rejects_reflection() {
        let reflection = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0);
        let err = validate_rotation(&reflection, "goal_orientation").unwrap_err();
        assert!(matches!(err, ObsError::InvalidRotation { ref field, .. } if field == "goal_orientation"));
    }

    #[test]
    fn validate_rejects_scaled_and_nan() {
        assert!(validate_rotation(&(Matrix3::identity() * 2.0), "m").is_err());
        let mut m = Matrix3::identity();
        m[(1, 2)] = f64::NAN;
        assert!(validate_rotation(&m, "m").is_err());
    }

    // ── Properties ──────────────────────────────────────────────────────────

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any rotation survives matrix → (x, y, z, w) → matrix.
            #[test]
            fn prop_quaternion_roundtrip(
                roll in -PI..PI,
                pitch in -1.5f64..1.5f64,
                yaw in -PI..PI,
            ) {
                let m = euler_to_matrix(EulerAngles::new(roll, pitch, yaw), EulerConvention::ExtrinsicXyz);
                let back = quat_xyzw_to_matrix(matrix_to_quat_xyzw(&m));
                prop_assert!((m - back).amax() < 1e-9);
            }

            /// Levelling always yields zero roll and pitch.
            #[test]
            fn prop_levelled_has_zero_roll_pitch(
                roll in -PI..PI,
                pitch in -1.5f64..1.5f64,
                yaw in -3.1f64..3.1f64,
            ) {
                let m = euler_to_matrix(EulerAngles::new(roll, pitch, yaw), EulerConvention::ExtrinsicXyz);
                let levelled = level_roll_pitch(&m, EulerConvention::ExtrinsicXyz);
                let angles = matrix_to_euler(&levelled, EulerConvention::ExtrinsicXyz);
                prop_assert!(angles.roll.abs() < 1e-12);
                prop_assert!(angles.pitch.abs() < 1e-12);
            }
        }
    }
}

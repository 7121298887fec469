//! `armobs-types` – shared data model for the ArmObs workspace.
//!
//! Everything that crosses a crate boundary lives here: the robot state
//! snapshot returned by a state source in `armobs-hal`, the goal pose, the
//! configuration enums that shape an observation, the produced
//! [`ObservationVector`] and the global [`ObsError`].

use std::fmt;
use std::str::FromStr;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Robot state
// ────────────────────────────────────────────────────────────────────────────

/// Force/torque wrench at the end effector: `[fx, fy, fz, tx, ty, tz]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Wrench(pub [f64; 6]);

impl Wrench {
    pub fn new(force: [f64; 3], torque: [f64; 3]) -> Self {
        Self([force[0], force[1], force[2], torque[0], torque[1], torque[2]])
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Immutable proprioceptive snapshot returned by a state source on each query.
///
/// Positions are metres in the robot base frame; orientations are 3×3
/// rotation matrices in the same frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    /// Joint angles in radians, base to flange.
    pub joint_angles: Vec<f64>,
    pub ee_position: Vector3<f64>,
    #[serde(with = "row_major")]
    pub ee_orientation: Matrix3<f64>,
    /// Wrench estimated by the robot's dynamics model from joint torques.
    pub wrench_estimate: Wrench,
    /// Wrench measured by the dedicated force/torque sensor.
    pub wrench_sensor: Wrench,
}

impl RobotState {
    pub fn num_joints(&self) -> usize {
        self.joint_angles.len()
    }
}

/// Target pose for one task instance, in the robot base frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalPose {
    pub position: Vector3<f64>,
    #[serde(with = "row_major")]
    pub orientation: Matrix3<f64>,
}

impl GoalPose {
    pub fn new(position: Vector3<f64>, orientation: Matrix3<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

/// Serialises a [`Matrix3`] as three rows (`[[r00, r01, r02], …]`) instead of
/// nalgebra's flat column-major layout, so JSON snapshots read the way the
/// matrices are written on paper.
pub mod row_major {
    use nalgebra::Matrix3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(m: &Matrix3<f64>, s: S) -> Result<S::Ok, S::Error> {
        let rows: [[f64; 3]; 3] = [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ];
        rows.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Matrix3<f64>, D::Error> {
        let r = <[[f64; 3]; 3]>::deserialize(d)?;
        Ok(Matrix3::new(
            r[0][0], r[0][1], r[0][2], //
            r[1][0], r[1][1], r[1][2], //
            r[2][0], r[2][1], r[2][2],
        ))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Observation shaping options
// ────────────────────────────────────────────────────────────────────────────

/// Which wrench is appended to the observation.
///
/// Absence of a force source (`Option::None`) drops the trailing six
/// elements from the vector entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceSource {
    /// Dedicated force/torque sensor.
    ForceSensor,
    /// Model-based estimate from the robot controller.
    RobotEstimate,
}

impl ForceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForceSource::ForceSensor => "force_sensor",
            ForceSource::RobotEstimate => "robot_estimate",
        }
    }

    /// Resolve an optional raw config value.
    ///
    /// # Errors
    ///
    /// Returns [`ObsError::MisconfiguredForceSource`] for any string other
    /// than `"force_sensor"` or `"robot_estimate"`.
    pub fn parse_optional(raw: Option<&str>) -> Result<Option<Self>, ObsError> {
        raw.map(str::parse::<ForceSource>).transpose()
    }

    /// Pick the matching wrench out of a state snapshot.
    pub fn select(&self, state: &RobotState) -> Wrench {
        match self {
            ForceSource::ForceSensor => state.wrench_sensor,
            ForceSource::RobotEstimate => state.wrench_estimate,
        }
    }
}

impl FromStr for ForceSource {
    type Err = ObsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "force_sensor" => Ok(ForceSource::ForceSensor),
            "robot_estimate" => Ok(ForceSource::RobotEstimate),
            other => Err(ObsError::MisconfiguredForceSource(other.to_string())),
        }
    }
}

impl fmt::Display for ForceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis convention used to decompose a goal orientation into Euler angles.
///
/// Lower-case `"xyz"` is extrinsic (fixed axes, `R = Rz·Ry·Rx`); upper-case
/// `"XYZ"` is intrinsic (body axes, `R = Rx·Ry·Rz`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EulerConvention {
    #[default]
    #[serde(rename = "xyz")]
    ExtrinsicXyz,
    #[serde(rename = "XYZ")]
    IntrinsicXyz,
}

/// Numeric precision of the materialised observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    F32,
    F64,
}

impl FromStr for Precision {
    type Err = ObsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "f32" | "float32" => Ok(Precision::F32),
            "f64" | "float64" => Ok(Precision::F64),
            other => Err(ObsError::Config(format!("unknown precision '{other}'"))),
        }
    }
}

/// Device tag carried with the observation for the inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    #[default]
    Cpu,
    Cuda(u32),
}

impl FromStr for Device {
    type Err = ObsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "cpu" {
            return Ok(Device::Cpu);
        }
        if s == "cuda" {
            return Ok(Device::Cuda(0));
        }
        if let Some(idx) = s.strip_prefix("cuda:") {
            return idx
                .parse::<u32>()
                .map(Device::Cuda)
                .map_err(|_| ObsError::Config(format!("invalid cuda device index '{idx}'")));
        }
        Err(ObsError::Config(format!("unknown device '{s}'")))
    }
}

impl TryFrom<String> for Device {
    type Error = ObsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Device> for String {
    fn from(d: Device) -> Self {
        d.to_string()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda(i) => write!(f, "cuda:{i}"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Observation vector
// ────────────────────────────────────────────────────────────────────────────

/// Numeric payload of an [`ObservationVector`] at its target precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "precision", content = "values", rename_all = "lowercase")]
pub enum ObservationData {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Fixed-layout feature vector handed to the policy each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationVector {
    pub data: ObservationData,
    pub device: Device,
}

impl ObservationVector {
    /// Cast `values` to `precision` and tag them with `device`.
    pub fn materialize(values: Vec<f64>, precision: Precision, device: Device) -> Self {
        let data = match precision {
            Precision::F32 => ObservationData::F32(values.into_iter().map(|v| v as f32).collect()),
            Precision::F64 => ObservationData::F64(values),
        };
        Self { data, device }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ObservationData::F32(v) => v.len(),
            ObservationData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn precision(&self) -> Precision {
        match &self.data {
            ObservationData::F32(_) => Precision::F32,
            ObservationData::F64(_) => Precision::F64,
        }
    }

    /// Element `index` widened to `f64`.
    pub fn get(&self, index: usize) -> Option<f64> {
        match &self.data {
            ObservationData::F32(v) => v.get(index).map(|&x| x as f64),
            ObservationData::F64(v) => v.get(index).copied(),
        }
    }

    /// All elements widened to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match &self.data {
            ObservationData::F32(v) => v.iter().map(|&x| x as f64).collect(),
            ObservationData::F64(v) => v.clone(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Global error type for observation construction and its collaborators.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObsError {
    #[error("Misconfigured force source: '{0}' (expected \"force_sensor\" or \"robot_estimate\")")]
    MisconfiguredForceSource(String),

    #[error("State unavailable from {source_id}: {details}")]
    StateUnavailable { source_id: String, details: String },

    #[error("Observation not implemented for task '{task}'")]
    NotImplemented { task: String },

    #[error("Invalid rotation in {field}: {details}")]
    InvalidRotation { field: String, details: String },

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Reference Trajectory Error: {0}")]
    Reference(String),
}

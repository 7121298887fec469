//! Task observation base: the contract shared by every task variant.
//!
//! A [`TaskContext`] is built once per task instance from the run arguments,
//! the task-instance configuration, the sequencing flag and any extra
//! key/value state. It owns the target precision/device and the validated
//! force source, and is immutable for the lifetime of the task instance.
//!
//! [`TaskObservation`] pairs a context with a [`TaskKind`] and is the single
//! dispatch point for `build_observation`. Task families that have no
//! concrete builder resolve to [`TaskKind::Base`], and building an
//! observation for them fails with [`ObsError::NotImplemented`].
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use armobs_hal::SimStateSource;
//! use armobs_runtime::task::{RunArgs, TaskContext, TaskInstanceConfig, TaskObservation};
//! use armobs_types::GoalPose;
//! use nalgebra::{Matrix3, Vector3};
//!
//! let context = TaskContext::new(
//!     RunArgs::default(),
//!     TaskInstanceConfig::new("insert"),
//!     false,
//!     BTreeMap::new(),
//! )
//! .unwrap();
//! let task = TaskObservation::new(context).unwrap();
//!
//! let goal = GoalPose::new(Vector3::new(0.5, 0.0, 0.2), Matrix3::identity());
//! let mut arm = SimStateSource::new("sim_arm");
//! let (obs, _state) = task.build_observation(&goal, &mut arm).unwrap();
//! assert_eq!(obs.len(), 24);
//! ```

use std::collections::BTreeMap;

use armobs_hal::StateSource;
use armobs_types::{
    Device, EulerConvention, ForceSource, GoalPose, ObsError, ObservationVector, Precision,
    RobotState,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::insert::{self, InsertParams};

/// Task names with a shared base but no concrete observation builder.
pub const BASE_ONLY_TASKS: &[&str] = &["reach", "pick", "place"];

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Run-level arguments shared by every task instance of one run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunArgs {
    /// Precision the observation is materialised at.
    #[serde(default)]
    pub precision: Precision,
    /// Device tag handed to the inference engine.
    #[serde(default)]
    pub device: Device,
}

/// Value of `override_obs_goal_roll_angle`.
///
/// Only its presence is significant: any value, `false` included, levels the
/// observed goal orientation. Both the flag and the numeric form parse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GoalRollOverride {
    Flag(bool),
    Angle(f64),
}

/// Policy-facing (`[rl]`) options of a task instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RlConfig {
    /// `"force_sensor"`, `"robot_estimate"`, or absent for no wrench feature.
    /// Kept as the raw string so that a typo surfaces as
    /// [`ObsError::MisconfiguredForceSource`] instead of a parse error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_source: Option<String>,
    /// When present, the observed goal orientation is levelled (roll and
    /// pitch zeroed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_obs_goal_roll_angle: Option<GoalRollOverride>,
    #[serde(default)]
    pub euler_convention: EulerConvention,
}

/// Immutable configuration of one task instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInstanceConfig {
    /// Task family, e.g. `"insert"`.
    pub task: String,
    #[serde(default)]
    pub rl: RlConfig,
}

impl TaskInstanceConfig {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            rl: RlConfig::default(),
        }
    }

    pub fn with_force_source(mut self, force_source: impl Into<String>) -> Self {
        self.rl.force_source = Some(force_source.into());
        self
    }

    pub fn with_goal_roll_override(mut self, value: GoalRollOverride) -> Self {
        self.rl.override_obs_goal_roll_angle = Some(value);
        self
    }

    pub fn with_euler_convention(mut self, convention: EulerConvention) -> Self {
        self.rl.euler_convention = convention;
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TaskContext
// ────────────────────────────────────────────────────────────────────────────

/// Immutable per-instance state shared by all task builders.
#[derive(Debug, Clone)]
pub struct TaskContext {
    args: RunArgs,
    config: TaskInstanceConfig,
    in_sequence: bool,
    extras: BTreeMap<String, String>,
    force_source: Option<ForceSource>,
}

impl TaskContext {
    /// Build the context for one task instance.
    ///
    /// # Errors
    ///
    /// Returns [`ObsError::MisconfiguredForceSource`] when
    /// `config.rl.force_source` is set to an unrecognised value.
    pub fn new(
        args: RunArgs,
        config: TaskInstanceConfig,
        in_sequence: bool,
        extras: BTreeMap<String, String>,
    ) -> Result<Self, ObsError> {
        let force_source = ForceSource::parse_optional(config.rl.force_source.as_deref())?;
        info!(
            task = %config.task,
            force_source = force_source.map(|f| f.as_str()).unwrap_or("none"),
            level_goal = config.rl.override_obs_goal_roll_angle.is_some(),
            precision = ?args.precision,
            device = %args.device,
            in_sequence,
            "task instance configured"
        );
        Ok(Self {
            args,
            config,
            in_sequence,
            extras,
            force_source,
        })
    }

    pub fn task_name(&self) -> &str {
        &self.config.task
    }

    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    pub fn config(&self) -> &TaskInstanceConfig {
        &self.config
    }

    /// Whether this instance runs as part of a task sequence.
    pub fn in_sequence(&self) -> bool {
        self.in_sequence
    }

    pub fn extras(&self) -> &BTreeMap<String, String> {
        &self.extras
    }

    pub fn force_source(&self) -> Option<ForceSource> {
        self.force_source
    }

    pub fn precision(&self) -> Precision {
        self.args.precision
    }

    pub fn device(&self) -> Device {
        self.args.device
    }

    /// Cast assembled features to this instance's precision and device.
    pub fn materialize(&self, values: Vec<f64>) -> ObservationVector {
        ObservationVector::materialize(values, self.args.precision, self.args.device)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TaskKind / TaskObservation
// ────────────────────────────────────────────────────────────────────────────

/// Task variants and their task-specific correction parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskKind {
    /// A known task family without its own observation builder.
    Base { task: String },
    Insert(InsertParams),
}

impl TaskKind {
    /// Resolve the task named in `context`'s configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ObsError::Config`] for a task name nobody knows about.
    pub fn resolve(context: &TaskContext) -> Result<Self, ObsError> {
        let name = context.task_name().trim().to_ascii_lowercase();
        match name.as_str() {
            "insert" => Ok(TaskKind::Insert(InsertParams::from_context(context))),
            other if BASE_ONLY_TASKS.contains(&other) => Ok(TaskKind::Base {
                task: other.to_string(),
            }),
            other => Err(ObsError::Config(format!("unknown task '{other}'"))),
        }
    }
}

/// A task instance ready to build observations every control tick.
#[derive(Debug, Clone)]
pub struct TaskObservation {
    context: TaskContext,
    kind: TaskKind,
}

impl TaskObservation {
    pub fn new(context: TaskContext) -> Result<Self, ObsError> {
        let kind = TaskKind::resolve(&context)?;
        Ok(Self { context, kind })
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    /// Expected observation length for an arm with `num_joints` joints, or
    /// `None` for a task without a builder.
    pub fn observation_len(&self, num_joints: usize) -> Option<usize> {
        match &self.kind {
            TaskKind::Base { .. } => None,
            TaskKind::Insert(params) => Some(params.observation_len(num_joints)),
        }
    }

    /// Query `source` once and assemble this tick's observation.
    ///
    /// Returns the materialised vector together with the raw snapshot it was
    /// built from. Every error propagates unchanged; nothing is retried or
    /// substituted.
    ///
    /// # Errors
    ///
    /// - [`ObsError::NotImplemented`] for [`TaskKind::Base`].
    /// - [`ObsError::StateUnavailable`] from the state source.
    /// - [`ObsError::InvalidRotation`] for malformed orientation matrices.
    pub fn build_observation(
        &self,
        goal: &GoalPose,
        source: &mut dyn StateSource,
    ) -> Result<(ObservationVector, RobotState), ObsError> {
        let (obs, state) = match &self.kind {
            TaskKind::Base { task } => {
                return Err(ObsError::NotImplemented { task: task.clone() });
            }
            TaskKind::Insert(params) => {
                insert::build_observation(&self.context, params, goal, source)?
            }
        };
        debug!(
            task = %self.context.task_name(),
            source = %source.id(),
            len = obs.len(),
            "observation built"
        );
        Ok((obs, state))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

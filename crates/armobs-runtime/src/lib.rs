//! `armobs-runtime` – task observation building.
//!
//! Turns a robot state snapshot and a goal pose into the fixed-layout
//! feature vector a trained policy consumes every control tick.
//!
//! # Modules
//!
//! - [`task`] – [`TaskContext`][task::TaskContext] (per-instance
//!   configuration, target precision/device) and
//!   [`TaskObservation`][task::TaskObservation], the single
//!   `build_observation` entry point dispatching over
//!   [`TaskKind`][task::TaskKind].
//! - [`insert`] – the Insert task builder: goal z-offset, optional goal
//!   levelling, wrench selection and feature assembly.
//! - [`reference`] – replays a known-good trajectory through a builder and
//!   reports divergences, the integration check for frame and quaternion
//!   conventions.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP span export.

pub mod insert;
pub mod reference;
pub mod task;
pub mod telemetry;

pub use insert::{GOAL_Z_OFFSET_M, InsertParams};
pub use reference::{ReferenceRecord, VerifyReport, load_reference, verify};
pub use task::{
    GoalRollOverride, RlConfig, RunArgs, TaskContext, TaskInstanceConfig, TaskKind, TaskObservation,
};
pub use telemetry::{TracerProviderGuard, init_tracing};

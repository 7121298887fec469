//! `armobs-hal` – robot state acquisition.
//!
//! # Modules
//!
//! - [`state_source`] – the [`StateSource`] trait every robot driver
//!   implements.
//! - [`sim`] – [`SimStateSource`][sim::SimStateSource]: scripted state for
//!   headless tests, with one-shot failure injection.
//! - [`replay`] – [`ReplayStateSource`][replay::ReplayStateSource]: serves a
//!   recorded trajectory snapshot by snapshot.

pub mod replay;
pub mod sim;
pub mod state_source;

pub use replay::ReplayStateSource;
pub use sim::SimStateSource;
pub use state_source::StateSource;

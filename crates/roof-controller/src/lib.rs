//! State machine core for the observatory roof motion controller.
//!
//! [`machine::RoofController`] is the single entry point: construct it
//! over a `roof_hal::HatPort`, call `initialize`, then drive it with
//! `open`/`close`/`stop`/`clear_fault`/`dispose`. Every operation
//! returns a [`types::StatusSnapshot`]; subscribe to
//! [`machine::RoofController::subscribe`] for a live feed of the same.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod config;
pub mod health;
pub mod machine;
pub mod publisher;
pub mod relay;
pub mod types;

pub use config::ControllerConfig;
pub use machine::RoofController;
pub use types::{
    CommandIntent, HealthReport, LogicalInputs, RelayCommand, Status, StatusSnapshot, StopReason,
};

//! Backend lifecycle control and its collaborators.
//!
//! This crate owns the backend service lifecycle ([`LifecycleController`]),
//! the settings store and its write-through mirror, the renderer process
//! supervisor, and the remote release check.

pub mod config;
mod controller;
mod network;
mod runtime;
pub mod services;
pub mod settings;
mod state;
pub mod store;

pub use crate::controller::{
    ControllerError, ControllerOptions, LifecycleController, UP_TO_DATE_MESSAGE,
    report_update_outcome,
};
pub use crate::network::local_ip_address;
pub use crate::services::renderer_service::{BackendService, ProcessRenderer};
pub use crate::services::update_service::{UpdateCheckError, UpdateChecker, UpdateOutcome};
pub use crate::state::ServiceState;

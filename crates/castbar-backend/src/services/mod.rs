//! Backend services driven by the lifecycle controller.
//!
//! `renderer_service` holds the blocking backend worker; `update_service`
//! the asynchronous release check run on the controller's runtime.

pub mod renderer_service;
pub mod update_service;

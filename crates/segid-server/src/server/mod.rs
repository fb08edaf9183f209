//! Server-side components of the `segid-server` HTTP service.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/env configuration and validation.
//! - [`error`] - HTTP mapping of allocator errors.
//! - [`service`] - The ID service and its HTTP routes.
//! - [`store`] - Runtime selection of the range store.
//! - [`telemetry`] - Structured logging and optional OpenTelemetry export.

pub mod config;
pub mod error;
pub mod service;
pub mod store;
pub mod telemetry;

//! The ID service and its HTTP surface.
//!
//! ## Structure
//!
//! - [`handler`] - [`IdService`](handler::IdService) and the axum routes
//!   serving `/id`, `/batch`, `/health` and `/stats`.

pub mod handler;

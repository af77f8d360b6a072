//! HTTP status/setpoint API.

pub mod api;
pub mod models;

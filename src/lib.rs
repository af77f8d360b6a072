//! Closed-loop kiln temperature controller.
//!
//! A fixed-period control cycle reads a thermocouple, computes a heating
//! command with a PID controller, runs it through a safety interlock, and
//! drives an on/off solid-state relay by time-proportioning. A small HTTP
//! API exposes the latest control snapshot and accepts setpoint changes.

pub mod alerts;
pub mod config;
pub mod control;
pub mod hardware;
pub mod kiln;
pub mod safety;
pub mod web;

pub use config::Config;
pub use kiln::{ControlState, Kiln};

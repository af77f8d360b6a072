//! Heating command computation: PID plus time-proportioning output.

pub mod pid;
pub mod window;

pub use pid::PidController;
pub use window::WindowedHeaterController;

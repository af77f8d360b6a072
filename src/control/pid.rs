//! PID controller producing a heater duty fraction.

use tokio::time::Instant;

use crate::config::PidConfig;

/// Assumed step when no previous sample exists yet.
const NOMINAL_DT_S: f64 = 0.25;

/// PID controller mapping (setpoint, measured) to a duty command in [0, 1].
///
/// The integral accumulator carries the gain, and is clamped to the output
/// range after every update so it cannot wind up while the output saturates.
/// The derivative term acts on the measurement rather than the error, so a
/// setpoint step does not kick the output.
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,

    integral: f64,
    previous_measured: Option<f64>,
    previous_time: Option<Instant>,
}

impl PidController {
    pub fn new(config: &PidConfig) -> Self {
        Self {
            kp: config.p_gain,
            ki: config.i_gain,
            kd: config.d_gain,
            integral: 0.0,
            previous_measured: None,
            previous_time: None,
        }
    }

    /// Compute the duty command for the current tick.
    ///
    /// `now` is the tick timestamp; elapsed time since the previous call
    /// scales the integral and derivative terms. Always returns a value in
    /// [0, 1] and updates the internal memory as a side effect.
    pub fn update(&mut self, setpoint: f64, measured: f64, now: Instant) -> f64 {
        let dt = self
            .previous_time
            .map(|prev| (now - prev).as_secs_f64())
            .unwrap_or(NOMINAL_DT_S)
            .max(1e-6);

        let error = setpoint - measured;

        self.integral = (self.integral + self.ki * error * dt).clamp(0.0, 1.0);

        let derivative = match self.previous_measured {
            Some(prev) => (measured - prev) / dt,
            None => 0.0,
        };

        let output = self.kp * error + self.integral - self.kd * derivative;

        self.previous_measured = Some(measured);
        self.previous_time = Some(now);

        output.clamp(0.0, 1.0)
    }
}

//! Time-proportioning ("slow PWM") control for an on/off heater.

use tokio::time::{Duration, Instant};

use crate::hardware::{HardwareError, HeaterOutput};

/// Shortest allowed window; anything faster would chatter the relay.
const MIN_CYCLE_S: f64 = 1.0;

/// Converts a duty fraction into relay on/off transitions inside a fixed
/// repeating window. The relay is ON for the leading `duty * cycle` portion
/// of each window and OFF for the remainder.
///
/// The only state is the window anchor; the decision is recomputed from the
/// duty passed to every call, so the duty may change mid-window and takes
/// effect immediately.
pub struct WindowedHeaterController {
    driver: Box<dyn HeaterOutput>,
    cycle: Duration,
    window_start: Instant,
}

impl WindowedHeaterController {
    pub fn new(driver: Box<dyn HeaterOutput>, cycle_time_s: f64, now: Instant) -> Self {
        Self {
            driver,
            cycle: Duration::from_secs_f64(cycle_time_s.max(MIN_CYCLE_S)),
            window_start: now,
        }
    }

    /// Drive the relay for the current instant.
    ///
    /// When a full cycle has elapsed the window anchor advances to `now`
    /// rather than snapping to a fixed grid; delayed ticks therefore let the
    /// window drift. Returns the commanded relay state.
    pub async fn apply(&mut self, duty: f64, now: Instant) -> Result<bool, HardwareError> {
        let duty = duty.clamp(0.0, 1.0);

        if now - self.window_start >= self.cycle {
            self.window_start = now;
        }

        let on_until = self.window_start + self.cycle.mul_f64(duty);
        let on = now < on_until;
        self.driver.set_power(on).await?;
        Ok(on)
    }

    pub fn cycle_time(&self) -> Duration {
        self.cycle
    }
}

//! Safety interlock for the heating loop.
//!
//! Every tick the monitor sees the latest temperature and the candidate
//! heating command and either approves the command or vetoes it with a
//! human-readable reason. Rules run in a fixed order and the first failure
//! wins. Each tick is judged fresh against current readings; the only
//! state carried across ticks is the last approved sample and the
//! stuck-heater timer.

use tokio::time::{Duration, Instant};

use crate::config::SafetyConfig;

/// Commands above this fraction count as "actively heating" for the
/// rate-of-rise rule.
const HEATING_THRESHOLD: f64 = 0.1;
/// Commands below this fraction count as "off" for the stuck-heater rule.
const OFF_THRESHOLD: f64 = 0.05;
/// Temperature rise that marks a heater as stuck while commanded off.
const STUCK_RISE_C: f64 = 1.0;

/// Outcome of one safety evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Approved,
    Vetoed(String),
}

impl Verdict {
    pub fn approved(&self) -> bool {
        matches!(self, Verdict::Approved)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Approved => None,
            Verdict::Vetoed(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct OffTimer {
    since: Instant,
    temp_at_arm: f64,
}

/// Stateful rule evaluator. Constructed once at startup; there is no
/// runtime reset path.
#[derive(Debug)]
pub struct SafetyMonitor {
    max_temp: f64,
    max_rate: f64,
    stuck_detect: bool,
    stuck_window: Duration,

    last_temp: f64,
    last_tick: Instant,
    off_timer: Option<OffTimer>,
}

impl SafetyMonitor {
    pub fn new(config: &SafetyConfig, now: Instant, initial_temp: f64) -> Self {
        Self {
            max_temp: config.max_temp_c,
            max_rate: config.max_rate_c_per_min,
            stuck_detect: config.stuck_heater_detect,
            stuck_window: Duration::from_secs(config.stuck_heater_window_s),
            last_temp: initial_temp,
            last_tick: now,
            off_timer: None,
        }
    }

    /// Judge the candidate heating command against the current reading.
    ///
    /// On approval the last-sample memory advances to this tick. On a veto
    /// it is left untouched, so the failing condition is still measured
    /// against the same baseline on the next tick.
    pub fn evaluate(&mut self, temp_c: f64, candidate_duty: f64, now: Instant) -> Verdict {
        let dt = (now - self.last_tick).as_secs_f64().max(1e-6);
        let rise = temp_c - self.last_temp;
        let rate_per_min = rise / dt * 60.0;

        // Hard ceiling, independent of rate or command.
        if temp_c >= self.max_temp {
            return Verdict::Vetoed(format!(
                "Over-temperature: {:.1}C >= {:.1}C",
                temp_c, self.max_temp
            ));
        }

        // Climb-rate limit, only while actively heating. Residual heat can
        // push the temperature up with the output off; that is not a fault.
        if candidate_duty > HEATING_THRESHOLD && rate_per_min > self.max_rate {
            return Verdict::Vetoed(format!(
                "Rate-of-rise too high: {:.1}C/min > {:.1}",
                rate_per_min, self.max_rate
            ));
        }

        // Stuck-heater heuristic: commanded (near) off for a full window
        // yet the temperature kept climbing since the timer was armed.
        if self.stuck_detect {
            if candidate_duty < OFF_THRESHOLD {
                match self.off_timer {
                    None => {
                        self.off_timer = Some(OffTimer {
                            since: now,
                            temp_at_arm: self.last_temp,
                        });
                    }
                    Some(timer) => {
                        if now - timer.since >= self.stuck_window
                            && temp_c - timer.temp_at_arm > STUCK_RISE_C
                        {
                            return Verdict::Vetoed(
                                "Heater may be stuck ON (temp rising while output is OFF)"
                                    .to_string(),
                            );
                        }
                    }
                }
            } else {
                // The heater is legitimately commanded on; no contradiction
                // is being observed.
                self.off_timer = None;
            }
        }

        self.last_temp = temp_c;
        self.last_tick = now;
        Verdict::Approved
    }
}

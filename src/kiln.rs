//! Control cycle orchestrator.
//!
//! One long-running task owns every piece of control-side state and is the
//! sole writer of the published [`ControlState`] snapshot. The HTTP surface
//! reads snapshots and writes only the setpoint.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tokio::time::{Duration, Instant, sleep, timeout};

use crate::alerts::{self, Alerter};
use crate::config::Config;
use crate::control::{PidController, WindowedHeaterController};
use crate::hardware::{self, TemperatureSensor};
use crate::safety::{SafetyMonitor, Verdict};
use crate::web::{self, api::AppState, models::ConfigEcho};

/// Assumed kiln temperature before the first successful read.
pub const AMBIENT_C: f64 = 25.0;

/// Snapshot of the most recently completed tick.
///
/// Published as a single atomic replace; readers never observe a
/// half-updated tick.
#[derive(Debug, Clone, Serialize)]
pub struct ControlState {
    pub setpoint_c: f64,
    pub temp_c: f64,
    pub duty: f64,
    pub healthy: bool,
    pub abort_reason: Option<String>,
    pub last_update: DateTime<Utc>,
}

impl ControlState {
    fn initial(setpoint_c: f64) -> Self {
        Self {
            setpoint_c,
            temp_c: AMBIENT_C,
            duty: 0.0,
            healthy: true,
            abort_reason: None,
            last_update: Utc::now(),
        }
    }
}

/// Handle owning the shared state and the control-loop lifecycle.
pub struct Kiln {
    config: Config,
    state: Arc<RwLock<ControlState>>,
    setpoint: Arc<RwLock<f64>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Kiln {
    pub fn new(config: Config) -> Self {
        let setpoint = config.control.initial_setpoint_c;
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            state: Arc::new(RwLock::new(ControlState::initial(setpoint))),
            setpoint: Arc::new(RwLock::new(setpoint)),
            shutdown_tx,
        }
    }

    /// Build the hardware backends and spawn the control loop task.
    pub async fn start(&self) -> tokio::task::JoinHandle<()> {
        let (sensor, heater) = hardware::make_backends(&self.config).await;
        let alerter = alerts::make_alerter(&self.config.alerts);
        let control_loop = ControlLoop::new(
            &self.config,
            sensor,
            WindowedHeaterController::new(heater, self.config.heater.cycle_time_s, Instant::now()),
            self.state.clone(),
            self.setpoint.clone(),
            alerter,
        );
        let shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(control_loop.run(shutdown_rx))
    }

    /// Axum router serving the status/setpoint API.
    pub fn router(&self) -> axum::Router {
        web::api::router(AppState {
            state: self.state.clone(),
            setpoint: self.setpoint.clone(),
            config: ConfigEcho {
                max_temp_c: self.config.safety.max_temp_c,
                max_rate_c_per_min: self.config.safety.max_rate_c_per_min,
                cycle_time_s: self.config.heater.cycle_time_s,
                simulate: self.config.simulate,
            },
        })
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub async fn state(&self) -> ControlState {
        self.state.read().await.clone()
    }
}

/// The periodic tick: read, regulate, veto, actuate, publish.
pub struct ControlLoop {
    sensor: Box<dyn TemperatureSensor>,
    pid: PidController,
    safety: SafetyMonitor,
    window: WindowedHeaterController,

    state: Arc<RwLock<ControlState>>,
    setpoint: Arc<RwLock<f64>>,
    alerter: Box<dyn Alerter>,

    abort_on_sensor_fault: bool,
    tick_period: Duration,
    fault_backoff: Duration,
    read_deadline: Duration,

    last_temp: f64,
    last_abort: Option<String>,
}

impl ControlLoop {
    pub fn new(
        config: &Config,
        sensor: Box<dyn TemperatureSensor>,
        window: WindowedHeaterController,
        state: Arc<RwLock<ControlState>>,
        setpoint: Arc<RwLock<f64>>,
        alerter: Box<dyn Alerter>,
    ) -> Self {
        let now = Instant::now();
        Self {
            sensor,
            pid: PidController::new(&config.pid),
            safety: SafetyMonitor::new(&config.safety, now, AMBIENT_C),
            window,
            state,
            setpoint,
            alerter,
            abort_on_sensor_fault: config.safety.abort_on_sensor_fault,
            tick_period: Duration::from_millis(config.control.tick_period_ms),
            fault_backoff: Duration::from_millis(config.control.sensor_fault_backoff_ms),
            read_deadline: Duration::from_millis(config.mcu.read_timeout_ms.max(1)),
            last_temp: AMBIENT_C,
            last_abort: None,
        }
    }

    /// Run ticks until shutdown. The loop itself never terminates on a bad
    /// reading or a safety trip; every failure degrades to "heater off,
    /// reason surfaced".
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        tracing::info!(
            "Control loop started (tick {:?}, window {:?})",
            self.tick_period,
            self.window.cycle_time()
        );
        loop {
            let delay = self.tick().await;
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Control loop shutting down");
                    if let Err(e) = self.window.apply(0.0, Instant::now()).await {
                        tracing::warn!("Failed to drop heater on shutdown: {}", e);
                    }
                    break;
                }
                _ = sleep(delay) => {}
            }
        }
    }

    /// Execute exactly one tick and return the delay until the next one.
    ///
    /// Forward-only: nothing in here is retried; a failed read or a vetoed
    /// command is carried into the published snapshot and the next tick
    /// starts from there.
    pub async fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let setpoint = *self.setpoint.read().await;

        let (temp, healthy, mut abort) = self.read_temperature().await;

        if !healthy && self.abort_on_sensor_fault {
            // Sensor cannot be trusted: drop the heater and skip the
            // regulator entirely for this tick.
            if let Err(e) = self.window.apply(0.0, now).await {
                tracing::warn!("Heater write failed: {}", e);
            }
            self.publish(setpoint, temp, 0.0, false, abort).await;
            return self.fault_backoff;
        }

        let mut duty = self.pid.update(setpoint, temp, now);

        match self.safety.evaluate(temp, duty, now) {
            Verdict::Approved => {
                abort = None;
            }
            Verdict::Vetoed(reason) => {
                abort = Some(reason);
                duty = 0.0;
            }
        }

        if let Err(e) = self.window.apply(duty, now).await {
            tracing::warn!("Heater write failed: {}", e);
        }

        self.publish(setpoint, temp, duty, healthy, abort).await;
        self.tick_period
    }

    /// Read the sensor under a deadline. On any failure the last known
    /// temperature is carried forward and the tick is marked unhealthy.
    async fn read_temperature(&mut self) -> (f64, bool, Option<String>) {
        match timeout(self.read_deadline, self.sensor.read_celsius()).await {
            Ok(Ok(temp)) => {
                self.last_temp = temp;
                if self.sensor.healthy() {
                    (temp, true, None)
                } else {
                    let fault = self
                        .sensor
                        .last_fault()
                        .unwrap_or_else(|| "unknown".to_string());
                    (temp, false, Some(format!("Sensor error: {fault}")))
                }
            }
            Ok(Err(e)) => (self.last_temp, false, Some(format!("Sensor error: {e}"))),
            Err(_) => (
                self.last_temp,
                false,
                Some(format!(
                    "Sensor error: read timed out after {:?}",
                    self.read_deadline
                )),
            ),
        }
    }

    async fn publish(
        &mut self,
        setpoint_c: f64,
        temp_c: f64,
        duty: f64,
        healthy: bool,
        abort_reason: Option<String>,
    ) {
        if abort_reason.is_some() && abort_reason != self.last_abort {
            let reason = abort_reason.as_deref().unwrap_or_default();
            tracing::warn!("Heater forced off: {} (temp {:.1}C)", reason, temp_c);
            self.alerter
                .send(&format!("Kiln abort: {reason} (temp {temp_c:.1}C)"))
                .await;
        } else if abort_reason.is_none() && self.last_abort.is_some() {
            tracing::info!("Abort condition cleared (temp {:.1}C)", temp_c);
        }
        self.last_abort = abort_reason.clone();

        let snapshot = ControlState {
            setpoint_c,
            temp_c,
            duty,
            healthy,
            abort_reason,
            last_update: Utc::now(),
        };
        *self.state.write().await = snapshot;
    }
}

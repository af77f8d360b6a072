//! Hardware capability seam: temperature input and relay output.
//!
//! The control loop only ever talks to the two traits below. Concrete
//! backends are picked once at startup: a serial MCU bridge for real
//! hardware, or software stand-ins in simulate mode. A failed hardware
//! init falls back to simulation with a recorded fault so the condition
//! is visible in the status output rather than silent.

pub mod mcu;
pub mod sim;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Duration;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out after {0:?} waiting for MCU response")]
    Timeout(Duration),
    #[error("unexpected MCU response: {0}")]
    Protocol(String),
    #[error("sensor fault: {0}")]
    Fault(String),
}

/// Produces a temperature reading and a health flag each call.
#[async_trait]
pub trait TemperatureSensor: Send {
    /// Read the current temperature in °C. Must complete with bounded
    /// latency; a read that cannot complete promptly is an error, not a
    /// wait.
    async fn read_celsius(&mut self) -> Result<f64, HardwareError>;

    fn healthy(&self) -> bool;

    fn last_fault(&self) -> Option<String>;
}

/// Accepts a binary power command with bounded latency.
#[async_trait]
pub trait HeaterOutput: Send {
    async fn set_power(&mut self, on: bool) -> Result<(), HardwareError>;
}

/// Build the sensor/heater pair selected by configuration.
///
/// Real-hardware init failure is not fatal: the controller comes up on the
/// simulated backend with the init error recorded as a sensor fault, which
/// keeps the heater off and surfaces the problem in the status snapshot.
pub async fn make_backends(
    config: &Config,
) -> (Box<dyn TemperatureSensor>, Box<dyn HeaterOutput>) {
    if config.simulate {
        tracing::info!("Simulate mode: using software thermocouple and relay");
        return simulated_pair(config, None);
    }

    match mcu::McuBridge::connect(&config.mcu).await {
        Ok(bridge) => {
            tracing::info!(
                "Connected to kiln MCU on {} at {} baud",
                config.mcu.serial,
                config.mcu.baud
            );
            (
                Box::new(mcu::McuSensor::new(bridge.clone())),
                Box::new(mcu::McuHeater::new(bridge)),
            )
        }
        Err(e) => {
            tracing::warn!(
                "MCU init on {} failed ({}); falling back to simulated hardware",
                config.mcu.serial,
                e
            );
            simulated_pair(config, Some(format!("MCU init failed: {e}")))
        }
    }
}

fn simulated_pair(
    config: &Config,
    fault: Option<String>,
) -> (Box<dyn TemperatureSensor>, Box<dyn HeaterOutput>) {
    let mut sensor = sim::SimulatedSensor::new().with_noise(config.sim_noise_c);
    if let Some(fault) = fault {
        sensor.record_fault(fault);
    }
    (Box::new(sensor), Box::new(sim::SimulatedHeater::new()))
}

//! Software stand-ins for the thermocouple and relay.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rand::Rng;

use super::{HardwareError, HeaterOutput, TemperatureSensor};

/// Per-read upward drift emulating residual kiln heat.
const RISE_PER_READ_C: f64 = 0.2;
const MAX_SIM_TEMP_C: f64 = 1200.0;
const AMBIENT_C: f64 = 25.0;

/// Simulated thermocouple with a slow upward drift.
///
/// A shared failure switch lets tests inject read faults mid-run; a sticky
/// fault note marks a backend that only exists because real-hardware init
/// failed.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    temp: f64,
    noise_c: f64,
    fault: Option<String>,
    fail_switch: Arc<AtomicBool>,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self {
            temp: AMBIENT_C,
            noise_c: 0.0,
            fault: None,
            fail_switch: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_noise(mut self, noise_c: f64) -> Self {
        self.noise_c = noise_c;
        self
    }

    /// Attach a sticky fault note; the sensor keeps reading but reports
    /// unhealthy for the rest of its life.
    pub fn record_fault(&mut self, fault: String) {
        self.fault = Some(fault);
    }

    /// Shared switch that makes reads fail while set.
    pub fn fail_switch(&self) -> Arc<AtomicBool> {
        self.fail_switch.clone()
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TemperatureSensor for SimulatedSensor {
    async fn read_celsius(&mut self) -> Result<f64, HardwareError> {
        if self.fail_switch.load(Ordering::Relaxed) {
            return Err(HardwareError::Fault("simulated read failure".to_string()));
        }

        self.temp = (self.temp + RISE_PER_READ_C).min(MAX_SIM_TEMP_C);
        let mut reading = self.temp;
        if self.noise_c > 0.0 {
            reading += rand::rng().random_range(-self.noise_c..self.noise_c);
        }
        Ok(reading)
    }

    fn healthy(&self) -> bool {
        self.fault.is_none() && !self.fail_switch.load(Ordering::Relaxed)
    }

    fn last_fault(&self) -> Option<String> {
        if self.fail_switch.load(Ordering::Relaxed) {
            return Some("simulated read failure".to_string());
        }
        self.fault.clone()
    }
}

/// Simulated relay recording the last commanded state.
#[derive(Debug, Clone)]
pub struct SimulatedHeater {
    on: Arc<AtomicBool>,
}

impl SimulatedHeater {
    pub fn new() -> Self {
        Self {
            on: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }
}

impl Default for SimulatedHeater {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HeaterOutput for SimulatedHeater {
    async fn set_power(&mut self, on: bool) -> Result<(), HardwareError> {
        self.on.store(on, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sensor_drifts_upward_and_caps() {
        let mut sensor = SimulatedSensor::new();
        let first = sensor.read_celsius().await.unwrap();
        let second = sensor.read_celsius().await.unwrap();
        assert!(second > first);

        for _ in 0..10_000 {
            sensor.read_celsius().await.unwrap();
        }
        let capped = sensor.read_celsius().await.unwrap();
        assert_eq!(capped, MAX_SIM_TEMP_C);
    }

    #[tokio::test]
    async fn test_fail_switch_round_trip() {
        let mut sensor = SimulatedSensor::new();
        let switch = sensor.fail_switch();
        assert!(sensor.healthy());

        switch.store(true, Ordering::Relaxed);
        assert!(sensor.read_celsius().await.is_err());
        assert!(!sensor.healthy());
        assert!(sensor.last_fault().is_some());

        switch.store(false, Ordering::Relaxed);
        assert!(sensor.read_celsius().await.is_ok());
        assert!(sensor.healthy());
    }

    #[tokio::test]
    async fn test_sticky_init_fault() {
        let mut sensor = SimulatedSensor::new();
        sensor.record_fault("MCU init failed: no such device".to_string());
        assert!(sensor.read_celsius().await.is_ok());
        assert!(!sensor.healthy());
    }

    #[tokio::test]
    async fn test_heater_records_state() {
        let mut heater = SimulatedHeater::new();
        let observer = heater.clone();
        heater.set_power(true).await.unwrap();
        assert!(observer.is_on());
        heater.set_power(false).await.unwrap();
        assert!(!observer.is_on());
    }
}

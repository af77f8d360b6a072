//! Serial bridge to the MCU that carries the thermocouple amplifier and
//! the heater relay.
//!
//! The protocol is line-oriented: one command per line, one reply per
//! line (`get_temp` -> `temp: 412.5`, `set_heater 1` -> `ok`). Exchanges
//! are lockstep under a mutex, and every reply is awaited under a short
//! deadline so a wedged MCU surfaces as a fault instead of stalling the
//! control loop.

use std::sync::Arc;

use async_trait::async_trait;
use serial2_tokio::SerialPort;
use tokio::sync::Mutex;
use tokio::time::{Duration, timeout};

use super::{HardwareError, HeaterOutput, TemperatureSensor};
use crate::config::McuConfig;

#[derive(Clone)]
pub struct McuBridge {
    inner: Arc<Mutex<BridgeInner>>,
    deadline: Duration,
}

struct BridgeInner {
    port: SerialPort,
    rx: Vec<u8>,
}

impl McuBridge {
    pub async fn connect(config: &McuConfig) -> Result<Self, HardwareError> {
        let port = SerialPort::open(&config.serial, config.baud)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(BridgeInner {
                port,
                rx: Vec::new(),
            })),
            deadline: Duration::from_millis(config.read_timeout_ms),
        })
    }

    /// Send one command and wait for its reply line.
    pub async fn command(&self, command: &str) -> Result<String, HardwareError> {
        let mut inner = self.inner.lock().await;

        // Stale bytes from a previously timed-out exchange would be
        // misattributed to this command.
        inner.rx.clear();

        let line = format!("{command}\n");
        let bytes = line.as_bytes();
        let mut written = 0;
        while written < bytes.len() {
            written += inner.port.write(&bytes[written..]).await?;
        }
        tracing::trace!("MCU TX: {}", command);

        match timeout(self.deadline, Self::read_line(&mut inner)).await {
            Ok(result) => {
                if let Ok(ref reply) = result {
                    tracing::trace!("MCU RX: {}", reply);
                }
                result
            }
            Err(_) => Err(HardwareError::Timeout(self.deadline)),
        }
    }

    async fn read_line(inner: &mut BridgeInner) -> Result<String, HardwareError> {
        loop {
            if let Some(pos) = inner.rx.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = inner.rx.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw).trim().to_string();
                if !line.is_empty() {
                    return Ok(line);
                }
                continue;
            }

            let mut buf = [0u8; 256];
            let n = inner.port.read(&mut buf).await?;
            if n == 0 {
                return Err(HardwareError::Protocol(
                    "serial connection closed".to_string(),
                ));
            }
            inner.rx.extend_from_slice(&buf[..n]);
        }
    }
}

fn parse_temp_reply(reply: &str) -> Result<f64, HardwareError> {
    if let Some(fault) = reply.strip_prefix("fault: ") {
        return Err(HardwareError::Fault(fault.to_string()));
    }
    reply
        .strip_prefix("temp: ")
        .and_then(|s| s.trim().parse::<f64>().ok())
        .ok_or_else(|| HardwareError::Protocol(reply.to_string()))
}

/// Thermocouple read over the MCU bridge.
pub struct McuSensor {
    bridge: McuBridge,
    fault: Option<String>,
}

impl McuSensor {
    pub fn new(bridge: McuBridge) -> Self {
        Self {
            bridge,
            fault: None,
        }
    }
}

#[async_trait]
impl TemperatureSensor for McuSensor {
    async fn read_celsius(&mut self) -> Result<f64, HardwareError> {
        let reply = match self.bridge.command("get_temp").await {
            Ok(reply) => reply,
            Err(e) => {
                self.fault = Some(e.to_string());
                return Err(e);
            }
        };
        match parse_temp_reply(&reply) {
            Ok(temp) => {
                self.fault = None;
                Ok(temp)
            }
            Err(e) => {
                self.fault = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn healthy(&self) -> bool {
        self.fault.is_none()
    }

    fn last_fault(&self) -> Option<String> {
        self.fault.clone()
    }
}

/// Relay command over the MCU bridge.
pub struct McuHeater {
    bridge: McuBridge,
}

impl McuHeater {
    pub fn new(bridge: McuBridge) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl HeaterOutput for McuHeater {
    async fn set_power(&mut self, on: bool) -> Result<(), HardwareError> {
        let command = format!("set_heater {}", u8::from(on));
        let reply = self.bridge.command(&command).await?;
        if reply.starts_with("ok") {
            Ok(())
        } else {
            Err(HardwareError::Protocol(reply))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_temp_reply() {
        assert_eq!(parse_temp_reply("temp: 412.5").unwrap(), 412.5);
        assert_eq!(parse_temp_reply("temp: -3").unwrap(), -3.0);
        assert!(matches!(
            parse_temp_reply("fault: open thermocouple"),
            Err(HardwareError::Fault(_))
        ));
        assert!(matches!(
            parse_temp_reply("garbage"),
            Err(HardwareError::Protocol(_))
        ));
    }
}

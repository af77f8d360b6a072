// End-to-end control cycle tests against the simulated hardware, driven
// tick by tick on the paused tokio clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;
use tokio::time::{Duration, Instant, advance};

use kiln_host::Config;
use kiln_host::alerts::LogAlerter;
use kiln_host::control::WindowedHeaterController;
use kiln_host::hardware::sim::{SimulatedHeater, SimulatedSensor};
use kiln_host::kiln::{ControlLoop, ControlState, Kiln};

fn test_config() -> Config {
    let mut config = Config::default();
    config.simulate = true;
    config
}

struct Harness {
    ctl: ControlLoop,
    state: Arc<RwLock<ControlState>>,
    setpoint: Arc<RwLock<f64>>,
    heater: SimulatedHeater,
    fail: Arc<AtomicBool>,
}

fn harness(config: &Config) -> Harness {
    let sensor = SimulatedSensor::new();
    let fail = sensor.fail_switch();
    let heater = SimulatedHeater::new();
    let window = WindowedHeaterController::new(
        Box::new(heater.clone()),
        config.heater.cycle_time_s,
        Instant::now(),
    );
    let state = Arc::new(RwLock::new(ControlState {
        setpoint_c: config.control.initial_setpoint_c,
        temp_c: 25.0,
        duty: 0.0,
        healthy: true,
        abort_reason: None,
        last_update: chrono::Utc::now(),
    }));
    let setpoint = Arc::new(RwLock::new(config.control.initial_setpoint_c));
    let ctl = ControlLoop::new(
        config,
        Box::new(sensor),
        window,
        state.clone(),
        setpoint.clone(),
        Box::new(LogAlerter::new(false)),
    );
    Harness {
        ctl,
        state,
        setpoint,
        heater,
        fail,
    }
}

async fn run_ticks(harness: &mut Harness, ticks: usize) {
    for _ in 0..ticks {
        harness.ctl.tick().await;
        advance(Duration::from_millis(250)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn duty_saturates_then_falls_as_setpoint_is_reached() {
    // Setpoint 100, simulated kiln climbing 0.2 °C per tick, generous
    // safety limits. Early on the error is large and the duty should sit
    // near 1; once the temperature passes the setpoint it should collapse
    // toward 0.
    let mut config = test_config();
    config.safety.stuck_heater_detect = false;
    let mut h = harness(&config);

    run_ticks(&mut h, 50).await;
    let snapshot = h.state.read().await.clone();
    assert!(snapshot.healthy);
    assert!(snapshot.abort_reason.is_none());
    assert!(
        snapshot.duty > 0.9,
        "expected saturated duty while far below setpoint, got {}",
        snapshot.duty
    );

    run_ticks(&mut h, 450).await;
    let snapshot = h.state.read().await.clone();
    assert!(snapshot.temp_c > 100.0);
    assert!(
        snapshot.duty < 0.1,
        "expected duty near 0 past the setpoint, got {}",
        snapshot.duty
    );
    assert!(snapshot.abort_reason.is_none());
}

#[tokio::test(start_paused = true)]
async fn sensor_fault_forces_heater_off_then_recovers() {
    let config = test_config();
    let mut h = harness(&config);

    run_ticks(&mut h, 10).await;
    let snapshot = h.state.read().await.clone();
    assert!(snapshot.healthy);
    assert!(snapshot.duty > 0.0);

    // Fail the sensor mid-run: the tick must complete with the heater off
    // and the fault surfaced, and the returned delay switches to the
    // sensor-fault backoff.
    h.fail.store(true, Ordering::Relaxed);
    let delay = h.ctl.tick().await;
    assert_eq!(delay, Duration::from_millis(500));
    advance(Duration::from_millis(500)).await;

    let snapshot = h.state.read().await.clone();
    assert!(!snapshot.healthy);
    assert_eq!(snapshot.duty, 0.0);
    let reason = snapshot.abort_reason.expect("abort reason must be set");
    assert!(reason.contains("Sensor error"));
    assert!(!h.heater.is_on());

    // Recovery: the next successful read clears the fault and the loop
    // resumes heating.
    h.fail.store(false, Ordering::Relaxed);
    run_ticks(&mut h, 1).await;
    let snapshot = h.state.read().await.clone();
    assert!(snapshot.healthy);
    assert!(snapshot.abort_reason.is_none());
    assert!(snapshot.duty > 0.0);
}

#[tokio::test(start_paused = true)]
async fn lowering_setpoint_drops_duty_to_zero() {
    let config = test_config();
    let mut h = harness(&config);

    run_ticks(&mut h, 20).await;
    assert!(h.state.read().await.duty > 0.9);

    *h.setpoint.write().await = 10.0;
    run_ticks(&mut h, 1).await;
    let snapshot = h.state.read().await.clone();
    assert_eq!(snapshot.setpoint_c, 10.0);
    assert_eq!(snapshot.duty, 0.0);
}

#[tokio::test(start_paused = true)]
async fn kiln_start_ticks_and_shuts_down() {
    let kiln = Kiln::new(test_config());
    let handle = kiln.start().await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    let snapshot = kiln.state().await;
    assert!(snapshot.healthy);
    assert!(snapshot.temp_c > 25.0, "control loop should be ticking");

    kiln.shutdown();
    handle.await.unwrap();
}

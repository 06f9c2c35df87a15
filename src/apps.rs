//! Built-in demo applications.
//!
//! An app is a registry of devices plus what to do when the operator's page
//! stops sending heartbeats. The CLI picks one by name for `serve` and
//! `generate`.

use anyhow::Result;
use clap::ValueEnum;
use log::warn;
use std::sync::Arc;
use std::time::Duration;

use crate::devices::{DcMotor, Led, Relay, Servo};
use crate::events::EventBus;
use crate::registry::Registry;

pub const LED_ID: &str = "led-1";
pub const SERVO_ID: &str = "servo-1";
pub const DC_MOTOR_ID: &str = "dc-motor-1";
pub const RELAY_ID: &str = "relay-1";

const SERVO_MIN_DEGREE: f64 = 0.0;
const SERVO_MAX_DEGREE: f64 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AppKind {
    Led,
    Servo,
    DcMotor,
    Relay,
    /// LED, servo, DC motor and relay together
    Suite,
}

impl AppKind {
    pub fn name(self) -> &'static str {
        match self {
            AppKind::Led => "led",
            AppKind::Servo => "servo",
            AppKind::DcMotor => "dc-motor",
            AppKind::Relay => "relay",
            AppKind::Suite => "suite",
        }
    }
}

pub type BlackoutHandler = Box<dyn FnOnce(Duration) + Send>;

/// A built registry and its blackout handler
pub struct App {
    pub kind: AppKind,
    pub registry: Registry,
    /// Called once when heartbeats stop; apps with nothing moving have none.
    pub on_blackout: Option<BlackoutHandler>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("kind", &self.kind)
            .field("registry", &self.registry)
            .field("on_blackout", &self.on_blackout.is_some())
            .finish()
    }
}

pub fn build(kind: AppKind, bus: &EventBus) -> Result<App> {
    let mut registry = Registry::new();
    let mut motors: Vec<Arc<DcMotor>> = Vec::new();
    let mut servos: Vec<Arc<Servo>> = Vec::new();

    let with_led = matches!(kind, AppKind::Led | AppKind::Suite);
    let with_servo = matches!(kind, AppKind::Servo | AppKind::Suite);
    let with_motor = matches!(kind, AppKind::DcMotor | AppKind::Suite);
    let with_relay = matches!(kind, AppKind::Relay | AppKind::Suite);

    if with_led {
        Led::attach(&mut registry, LED_ID, bus)?;
    }
    if with_servo {
        servos.push(Servo::attach(&mut registry, SERVO_ID, bus, SERVO_MIN_DEGREE, SERVO_MAX_DEGREE)?);
    }
    if with_motor {
        motors.push(DcMotor::attach(&mut registry, DC_MOTOR_ID, bus)?);
    }
    if with_relay {
        Relay::attach(&mut registry, RELAY_ID, bus)?;
    }

    let on_blackout: Option<BlackoutHandler> = if motors.is_empty() && servos.is_empty() {
        None
    } else {
        Some(Box::new(move |gap: Duration| {
            warn!("Connection lost for {:?}; stopping motion", gap);
            for motor in &motors {
                motor.stop();
            }
            for servo in &servos {
                servo.stop();
            }
        }))
    };

    Ok(App { kind, registry, on_blackout })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;

    #[test]
    fn test_suite_has_all_devices() {
        let app = build(AppKind::Suite, &EventBus::new()).unwrap();
        let ids: Vec<&str> = app.registry.components().map(|c| c.id()).collect();
        assert_eq!(ids, vec![LED_ID, SERVO_ID, DC_MOTOR_ID, RELAY_ID]);
        assert!(app.on_blackout.is_some());
    }

    #[test]
    fn test_led_app_has_no_blackout_handler() {
        let app = build(AppKind::Led, &EventBus::new()).unwrap();
        assert_eq!(app.registry.len(), 1);
        assert!(app.on_blackout.is_none());
    }

    #[test]
    fn test_blackout_stops_motor() {
        let app = build(AppKind::DcMotor, &EventBus::new()).unwrap();
        let on_blackout = app.on_blackout;
        let dispatcher = Dispatcher::new(Arc::new(app.registry));
        let speed = vec![("speed".to_string(), "int:60".to_string())];

        dispatcher.dispatch(DC_MOTOR_ID, "set_speed", &speed).unwrap();
        dispatcher.dispatch(DC_MOTOR_ID, "start", &[]).unwrap();
        assert_eq!(dispatcher.dispatch(DC_MOTOR_ID, "get_speed", &[]).unwrap(), 60);

        (on_blackout.unwrap())(Duration::from_secs(2));
        assert_eq!(dispatcher.dispatch(DC_MOTOR_ID, "get_speed", &[]).unwrap(), 0);
    }
}

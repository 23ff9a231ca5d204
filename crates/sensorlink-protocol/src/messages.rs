//! Message types for the controller channel.
//!
//! - Dashboard → Controller: [`ControlCommand`]
//! - Controller → Dashboard: [`ControllerSnapshot`]
//!
//! Messages are JSON over WebSocket text frames.

use serde::{Deserialize, Serialize};

// ============================================================================
// Commands (Dashboard → Controller)
// ============================================================================

/// Command sent from the dashboard to the controller.
///
/// # Example
/// ```json
/// {"command":"start"}
/// {"command":"setpoint","name":"temperature","value":37.0}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ControlCommand {
    /// Start the currently selected program.
    Start,

    /// Stop all actuators and the running program.
    Stop,

    /// Select a program by name (e.g. "mix", "drain", "fermentation").
    Program { program: String },

    /// Change a controller setpoint.
    Setpoint { name: SetpointName, value: f64 },
}

/// Setpoints the controller regulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SetpointName {
    /// Water temperature in °C.
    Temperature,
    /// pH.
    Ph,
    /// Dissolved oxygen in %.
    DissolvedOxygen,
}

impl ControlCommand {
    /// Shorthand for a program selection command.
    pub fn program(name: impl Into<String>) -> Self {
        ControlCommand::Program {
            program: name.into(),
        }
    }

    /// Shorthand for a setpoint change.
    pub fn setpoint(name: SetpointName, value: f64) -> Self {
        ControlCommand::Setpoint { name, value }
    }
}

// ============================================================================
// Snapshots (Controller → Dashboard)
// ============================================================================

/// Periodic status frame emitted by the controller.
///
/// The firmware uses short keys on the wire; the long names it logs over
/// serial are accepted as aliases. Missing fields default to zero/empty so
/// partial frames still decode.
///
/// # Example
/// ```json
/// {
///   "prog": "Fermentation", "stat": "Running",
///   "ap": 1, "dp": 0, "np": 0, "bp": 0, "sm": 1, "hp": 1, "lg": 0,
///   "wT": 36.8, "aT": 22.1, "pH": 6.95, "tb": 0.42, "ox": 81.0, "af": 1.2
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSnapshot {
    /// Name of the running program ("None" when idle).
    #[serde(rename = "prog", alias = "program")]
    pub program: String,

    /// Program status ("Idle", "Running", ...).
    #[serde(rename = "stat", alias = "status")]
    pub status: String,

    #[serde(flatten)]
    pub actuators: ActuatorStatus,

    #[serde(flatten)]
    pub sensors: SensorReadings,
}

/// On/off state of each actuator (1 = on).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorStatus {
    #[serde(rename = "ap", alias = "airP")]
    pub air_pump: u8,

    #[serde(rename = "dp", alias = "drainP")]
    pub drain_pump: u8,

    #[serde(rename = "np", alias = "nutrientP")]
    pub nutrient_pump: u8,

    #[serde(rename = "bp", alias = "baseP")]
    pub base_pump: u8,

    #[serde(rename = "sm", alias = "stirringM")]
    pub stirring_motor: u8,

    #[serde(rename = "hp", alias = "heatingP")]
    pub heating_plate: u8,

    #[serde(rename = "lg", alias = "led")]
    pub led_grow_light: u8,
}

impl ActuatorStatus {
    /// Names of the actuators that are currently on.
    pub fn active(&self) -> Vec<&'static str> {
        [
            ("air pump", self.air_pump),
            ("drain pump", self.drain_pump),
            ("nutrient pump", self.nutrient_pump),
            ("base pump", self.base_pump),
            ("stirring motor", self.stirring_motor),
            ("heating plate", self.heating_plate),
            ("LED grow light", self.led_grow_light),
        ]
        .into_iter()
        .filter(|(_, state)| *state != 0)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Sensor values in engineering units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorReadings {
    /// Water temperature in °C.
    #[serde(rename = "wT", alias = "waterTemp")]
    pub water_temp: f64,

    /// Air temperature in °C.
    #[serde(rename = "aT", alias = "airTemp")]
    pub air_temp: f64,

    #[serde(rename = "pH", alias = "ph")]
    pub ph: f64,

    #[serde(rename = "tb", alias = "turbidity")]
    pub turbidity: f64,

    /// Dissolved oxygen in %.
    #[serde(rename = "ox", alias = "oxygen", alias = "oxyden")]
    pub oxygen: f64,

    /// Air flow in L/min.
    #[serde(rename = "af", alias = "airFlow")]
    pub air_flow: f64,
}

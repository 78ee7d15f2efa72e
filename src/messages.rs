// Message types crossing the Zenoh boundary

use serde::{Deserialize, Serialize};

use crate::swerve::kinematics::{ModulePosition, ModuleState};

// Command from teleop/autonomy -> runtime.
// Velocities are chassis-frame unless field_relative is set, in which case the
// translation components are interpreted in the field frame and rotated by the
// last published chassis yaw before solving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChassisCommand {
    pub vx: f32,    // m/s, +forward
    pub vy: f32,    // m/s, +left
    pub omega: f32, // rad/s, +counter-clockwise
    #[serde(default)]
    pub field_relative: bool,
}

impl ChassisCommand {
    pub fn zero() -> Self {
        Self { vx: 0.0, vy: 0.0, omega: 0.0, field_relative: false }
    }
}

/// Chassis yaw published by the external pose estimator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct YawUpdate {
    pub yaw_deg: f32,
}

/// Measured module states and accumulated positions, published every cycle
/// for the odometry consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveTelemetry {
    pub states: [ModuleState; 4],
    pub positions: [ModulePosition; 4],
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_relative_defaults_to_false() {
        let cmd: ChassisCommand =
            serde_json::from_str(r#"{"vx": 1.0, "vy": 0.0, "omega": 0.5}"#).unwrap();
        assert!(!cmd.field_relative);
        assert_eq!(cmd.vx, 1.0);
    }

    #[test]
    fn health_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&RuntimeHealth::CmdStale).unwrap(), r#""cmd_stale""#);
    }
}

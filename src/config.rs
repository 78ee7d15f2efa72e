// Timeouts, topics, chassis geometry, per-module calibration
use std::time::Duration;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_CHASSIS: &str = "swerve/cmd/chassis"; // chassis velocity commands
pub const TOPIC_RT_TELEMETRY: &str = "swerve/rt/telemetry"; // module states + positions
pub const TOPIC_HEALTH: &str = "swerve/state/health"; // health status
pub const TOPIC_YAW: &str = "swerve/state/yaw"; // chassis yaw from the pose estimator

// Serial port for the motor controller bus
pub const BUS_PORT: &str = "/dev/ttyUSB0";

// Enable hardware control (set to false to run against the simulated bus)
pub const DRIVE_ENABLED: bool = true;

// Fixed dispatch order for the four modules
pub const MODULE_LABELS: [&str; 4] = ["front-left", "front-right", "back-left", "back-right"];

/// Gains pushed to a controller's onboard closed loop.
#[derive(Debug, Clone, Copy)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub kf: f32,
}

/// Per-module constants, set once at construction.
#[derive(Debug, Clone, Copy)]
pub struct ModuleConfig {
    pub drive_id: u8,
    pub steer_id: u8,
    /// Absolute-encoder reading at wheel-forward, as a fraction of a turn in [0, 1).
    pub zero_offset: f32,
    pub drive_inverted: bool,
    pub steer_inverted: bool,
    /// Mounting position relative to the chassis center, meters (+x forward, +y left).
    pub position: (f32, f32),
}

/// Chassis-wide constants. Built once at startup, validated, never mutated.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub port: String,
    pub wheel_circumference: f32,
    pub drive_gear_ratio: f32,
    pub steer_gear_ratio: f32,
    /// Fastest any single module may be commanded, m/s.
    pub max_speed: f32,
    /// Chassis rotation limit, rad/s.
    pub max_angular_speed: f32,
    pub drive_current_limit_amps: f32,
    pub steer_current_limit_amps: f32,
    pub drive_gains: PidGains,
    pub steer_gains: PidGains,
    /// Front-left, front-right, back-left, back-right.
    pub modules: [ModuleConfig; 4],
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f32 },

    #[error("{module} zero offset {value} outside [0, 1)")]
    OffsetOutOfRange { module: &'static str, value: f32 },

    #[error("controller id {id} assigned twice")]
    DuplicateControllerId { id: u8 },
}

impl DriveConfig {
    /// The competition chassis: 4 in wheels, 6.12:1 drive stage, 12.8:1 steer stage.
    pub fn standard() -> Self {
        let wheel_diameter = 0.1016; // meters
        Self {
            port: BUS_PORT.to_string(),
            wheel_circumference: wheel_diameter * std::f32::consts::PI,
            drive_gear_ratio: 6.12,
            steer_gear_ratio: 12.8,
            max_speed: 5.06,
            max_angular_speed: 7.0 * std::f32::consts::TAU,
            drive_current_limit_amps: 50.0,
            steer_current_limit_amps: 20.0,
            drive_gains: PidGains { kp: 0.5, ki: 0.0, kd: 0.0, kf: 1.0 / 5.06 },
            steer_gains: PidGains { kp: 1.0, ki: 0.0, kd: 0.0, kf: 0.0 },
            modules: [
                ModuleConfig {
                    drive_id: 2,
                    steer_id: 3,
                    zero_offset: 171.82 / 360.0,
                    drive_inverted: false,
                    steer_inverted: false,
                    position: (0.52705 / 2.0, 0.52705 / 2.0),
                },
                ModuleConfig {
                    drive_id: 8,
                    steer_id: 9,
                    zero_offset: 58.36 / 360.0,
                    drive_inverted: true,
                    steer_inverted: false,
                    position: (0.52705 / 2.0, -0.52705 / 2.0),
                },
                ModuleConfig {
                    drive_id: 4,
                    steer_id: 5,
                    zero_offset: 150.61 / 360.0,
                    drive_inverted: false,
                    steer_inverted: false,
                    position: (-0.52705 / 2.0, 0.52705 / 2.0),
                },
                ModuleConfig {
                    drive_id: 18,
                    steer_id: 7,
                    zero_offset: 42.50 / 360.0,
                    drive_inverted: true,
                    steer_inverted: false,
                    position: (-0.52705 / 2.0, -0.52705 / 2.0),
                },
            ],
        }
    }

    /// Reject degenerate geometry before any hardware is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positives = [
            ("wheel_circumference", self.wheel_circumference),
            ("drive_gear_ratio", self.drive_gear_ratio),
            ("steer_gear_ratio", self.steer_gear_ratio),
            ("max_speed", self.max_speed),
            ("max_angular_speed", self.max_angular_speed),
            ("drive_current_limit_amps", self.drive_current_limit_amps),
            ("steer_current_limit_amps", self.steer_current_limit_amps),
        ];
        for (name, value) in positives {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }

        let mut seen = Vec::with_capacity(8);
        for (module, m) in MODULE_LABELS.into_iter().zip(&self.modules) {
            if !(0.0..1.0).contains(&m.zero_offset) {
                return Err(ConfigError::OffsetOutOfRange { module, value: m.zero_offset });
            }
            for id in [m.drive_id, m.steer_id] {
                if seen.contains(&id) {
                    return Err(ConfigError::DuplicateControllerId { id });
                }
                seen.push(id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_validates() {
        DriveConfig::standard().validate().unwrap();
    }

    #[test]
    fn rejects_zero_gear_ratio() {
        let mut cfg = DriveConfig::standard();
        cfg.drive_gear_ratio = 0.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NonPositive { name: "drive_gear_ratio", .. })
        ));
    }

    #[test]
    fn rejects_offset_of_full_turn() {
        let mut cfg = DriveConfig::standard();
        cfg.modules[2].zero_offset = 1.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::OffsetOutOfRange { .. })));
    }

    #[test]
    fn rejects_reused_controller_id() {
        let mut cfg = DriveConfig::standard();
        cfg.modules[3].steer_id = cfg.modules[0].drive_id;
        assert!(matches!(cfg.validate(), Err(ConfigError::DuplicateControllerId { id }) if id == 2));
    }
}

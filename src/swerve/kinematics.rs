// Inverse kinematics for the four-module swerve chassis
// Converts chassis-frame velocities (vx, vy, omega) into per-module speed and
// heading targets, with proportional desaturation against the speed limit.

use serde::{Deserialize, Serialize};

use crate::messages::ChassisCommand;

/// One module's target or measurement: signed wheel speed along its face
/// plus the heading of that face. Heading is interpreted modulo 360 degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleState {
    pub speed: f32,   // m/s
    pub heading: f32, // degrees
}

/// Accumulated drive distance plus current heading, for odometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulePosition {
    pub distance: f32, // meters, monotonic between resets
    pub heading: f32,  // degrees
}

/// Robot-frame chassis velocities handed to the solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChassisSpeeds {
    pub vx: f32,    // m/s, +forward
    pub vy: f32,    // m/s, +left
    pub omega: f32, // rad/s, +counter-clockwise
}

impl ChassisSpeeds {
    /// Rotate field-frame translation into the robot frame given the chassis
    /// yaw (degrees, counter-clockwise from field +x).
    pub fn from_field_relative(vx: f32, vy: f32, omega: f32, yaw_deg: f32) -> Self {
        let (sin, cos) = yaw_deg.to_radians().sin_cos();
        Self { vx: vx * cos + vy * sin, vy: -vx * sin + vy * cos, omega }
    }
}

impl From<&ChassisCommand> for ChassisSpeeds {
    fn from(cmd: &ChassisCommand) -> Self {
        Self { vx: cmd.vx, vy: cmd.vy, omega: cmd.omega }
    }
}

/// Pure geometric solver: chassis speeds in, four module states out, in the
/// same fixed order as the mounting positions it was built with.
pub struct SwerveKinematics {
    positions: [(f32, f32); 4],
}

impl SwerveKinematics {
    /// `positions` are module mounting points relative to the chassis center,
    /// meters, in dispatch order (front-left, front-right, back-left,
    /// back-right).
    pub fn new(positions: [(f32, f32); 4]) -> Self {
        Self { positions }
    }

    /// Each module's velocity vector is the chassis translation plus the
    /// rotational contribution omega x r at its mounting point.
    pub fn solve(&self, speeds: &ChassisSpeeds) -> [ModuleState; 4] {
        self.positions.map(|(x, y)| {
            let vx = speeds.vx - speeds.omega * y;
            let vy = speeds.vy + speeds.omega * x;
            let speed = vx.hypot(vy);
            let heading =
                if speed < 1e-6 { 0.0 } else { vy.atan2(vx).to_degrees().rem_euclid(360.0) };
            ModuleState { speed, heading }
        })
    }

    /// Scale all four speeds uniformly so the fastest does not exceed
    /// `max_speed`, preserving the commanded path curvature. Applied to the
    /// whole set before dispatch, never per module.
    pub fn desaturate(states: &mut [ModuleState; 4], max_speed: f32) {
        let top = states.iter().map(|s| s.speed.abs()).fold(0.0, f32::max);
        if top > max_speed {
            let scale = max_speed / top;
            for state in states.iter_mut() {
                state.speed *= scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_chassis() -> SwerveKinematics {
        let half = 0.52705 / 2.0;
        SwerveKinematics::new([(half, half), (half, -half), (-half, half), (-half, -half)])
    }

    #[test]
    fn pure_forward_drives_all_modules_straight() {
        let states = square_chassis().solve(&ChassisSpeeds { vx: 1.0, vy: 0.0, omega: 0.0 });
        for s in states {
            assert!((s.speed - 1.0).abs() < 1e-6);
            assert_eq!(s.heading, 0.0);
        }
    }

    #[test]
    fn pure_strafe_points_all_modules_left() {
        let states = square_chassis().solve(&ChassisSpeeds { vx: 0.0, vy: 1.0, omega: 0.0 });
        for s in states {
            assert!((s.speed - 1.0).abs() < 1e-6);
            assert!((s.heading - 90.0).abs() < 1e-4);
        }
    }

    #[test]
    fn pure_rotation_is_tangential_and_symmetric() {
        let states = square_chassis().solve(&ChassisSpeeds { vx: 0.0, vy: 0.0, omega: 1.0 });
        let radius = (0.52705 / 2.0) * std::f32::consts::SQRT_2;
        for s in states {
            assert!((s.speed - radius).abs() < 1e-5);
        }
        // front-left wheel of a CCW spin points into quadrant II
        assert!(states[0].heading > 90.0 && states[0].heading < 180.0);
        // diagonally opposite modules are 180 degrees apart
        assert!(((states[0].heading - states[3].heading).abs() - 180.0).abs() < 1e-4);
    }

    #[test]
    fn zero_command_produces_zero_speeds() {
        let states = square_chassis().solve(&ChassisSpeeds::default());
        for s in states {
            assert_eq!(s.speed, 0.0);
            assert_eq!(s.heading, 0.0);
        }
    }

    #[test]
    fn desaturation_scales_proportionally() {
        let mut states = [
            ModuleState { speed: 6.0, heading: 0.0 },
            ModuleState { speed: 3.0, heading: 90.0 },
            ModuleState { speed: 3.0, heading: 180.0 },
            ModuleState { speed: 3.0, heading: 270.0 },
        ];
        SwerveKinematics::desaturate(&mut states, 5.06);
        let scale = 5.06 / 6.0;
        assert!((states[0].speed - 5.06).abs() < 1e-6);
        for s in &states[1..] {
            assert!((s.speed - 3.0 * scale).abs() < 1e-6);
        }
    }

    #[test]
    fn desaturation_leaves_slow_sets_alone() {
        let mut states = [ModuleState { speed: 2.0, heading: 0.0 }; 4];
        SwerveKinematics::desaturate(&mut states, 5.06);
        assert!(states.iter().all(|s| s.speed == 2.0));
    }

    #[test]
    fn desaturation_considers_reversed_speeds() {
        let mut states = [
            ModuleState { speed: -8.0, heading: 0.0 },
            ModuleState { speed: 4.0, heading: 0.0 },
            ModuleState { speed: 4.0, heading: 0.0 },
            ModuleState { speed: 4.0, heading: 0.0 },
        ];
        SwerveKinematics::desaturate(&mut states, 4.0);
        assert!((states[0].speed + 4.0).abs() < 1e-6);
        assert!((states[1].speed - 2.0).abs() < 1e-6);
    }

    #[test]
    fn field_relative_rotates_into_robot_frame() {
        // chassis yawed 90 degrees CCW: field-forward is robot-right
        let speeds = ChassisSpeeds::from_field_relative(1.0, 0.0, 0.0, 90.0);
        assert!(speeds.vx.abs() < 1e-6);
        assert!((speeds.vy + 1.0).abs() < 1e-6);

        // zero yaw is the identity
        let speeds = ChassisSpeeds::from_field_relative(1.0, 0.5, 0.2, 0.0);
        assert_eq!(speeds.vx, 1.0);
        assert_eq!(speeds.vy, 0.5);
        assert_eq!(speeds.omega, 0.2);
    }
}

// One swerve module: a drive controller in velocity mode and a steer
// controller in position mode, closed over the continuous heading tracker.

use tracing::{debug, info, warn};

use crate::config::{DriveConfig, ModuleConfig};

use super::angle;
use super::bus::{BusError, ControllerSetup, MotorIo, OperatingMode};
use super::heading::HeadingTracker;
use super::kinematics::{ModulePosition, ModuleState};
use super::units;

/// Commands slower than this hold the current heading instead of steering
/// toward the solver's degenerate zero-speed direction.
const SPEED_DEADBAND: f32 = 1e-3; // m/s

pub struct ModuleController {
    label: &'static str,
    cfg: ModuleConfig,
    wheel_circumference: f32,
    drive_gear_ratio: f32,
    steer_gear_ratio: f32,
    tracker: HeadingTracker,
    // last successfully read hardware feedback, retained across bad cycles
    last_state: ModuleState,
    last_position: ModulePosition,
    last_current: (f32, f32),
}

impl ModuleController {
    /// Bring one module up: verify both controllers respond, push the static
    /// configuration, seed the steer encoder from the absolute encoder, then
    /// enable torque. Any failure here is fatal.
    pub fn init<B: MotorIo>(
        bus: &mut B,
        label: &'static str,
        cfg: ModuleConfig,
        chassis: &DriveConfig,
    ) -> Result<Self, BusError> {
        for id in [cfg.drive_id, cfg.steer_id] {
            if !bus.ping(id)? {
                warn!("{}: controller {} not responding", label, id);
                return Err(BusError::Timeout { id });
            }
        }

        // torque must be off while modes change and the encoder is seeded
        bus.set_torque(cfg.drive_id, false)?;
        bus.set_torque(cfg.steer_id, false)?;

        bus.configure(
            cfg.drive_id,
            &ControllerSetup {
                mode: OperatingMode::Velocity,
                inverted: cfg.drive_inverted,
                current_limit_ma: units::amps_to_milliamps(chassis.drive_current_limit_amps),
                gains: chassis.drive_gains,
            },
        )?;
        bus.configure(
            cfg.steer_id,
            &ControllerSetup {
                mode: OperatingMode::Position,
                inverted: cfg.steer_inverted,
                current_limit_ma: units::amps_to_milliamps(chassis.steer_current_limit_amps),
                gains: chassis.steer_gains,
            },
        )?;

        // the one absolute read; everything after is relative tracking
        let absolute = units::absolute_fraction(bus.absolute_position(cfg.steer_id)?);
        let (tracker, start_turns) = HeadingTracker::seed(absolute, cfg.zero_offset);
        bus.seed_position(
            cfg.steer_id,
            units::steer_turns_to_ticks(start_turns, chassis.steer_gear_ratio),
        )?;
        info!(
            "{}: absolute encoder {:.4} turn, steer seeded at {:.1} deg",
            label,
            absolute,
            start_turns * 360.0
        );

        bus.set_torque(cfg.drive_id, true)?;
        bus.set_torque(cfg.steer_id, true)?;

        let heading = start_turns * 360.0;
        Ok(Self {
            label,
            cfg,
            wheel_circumference: chassis.wheel_circumference,
            drive_gear_ratio: chassis.drive_gear_ratio,
            steer_gear_ratio: chassis.steer_gear_ratio,
            tracker,
            last_state: ModuleState { speed: 0.0, heading },
            last_position: ModulePosition { distance: 0.0, heading },
            last_current: (0.0, 0.0),
        })
    }

    pub fn drive_id(&self) -> u8 {
        self.cfg.drive_id
    }

    /// Turn a desired state into the two hardware setpoints.
    ///
    /// Transient bus errors are logged and dropped; the next cycle retries
    /// implicitly with fresh input.
    pub fn apply<B: MotorIo>(&mut self, bus: &mut B, desired: ModuleState) {
        if desired.speed.abs() < SPEED_DEADBAND {
            self.command(bus, 0.0, self.tracker.last_setpoint());
            return;
        }

        let measured_turns = match bus.present_position(self.cfg.steer_id) {
            Ok(ticks) => units::steer_ticks_to_turns(ticks, self.steer_gear_ratio),
            Err(e) => {
                warn!("{}: steer position read failed, holding setpoint: {}", self.label, e);
                self.tracker.last_setpoint()
            }
        };

        let current_deg = measured_turns.rem_euclid(1.0) * 360.0;
        let (heading, sign) = angle::optimize(desired.heading, current_deg);

        let previous = self.tracker.last_setpoint();
        let target_turns = self.tracker.setpoint(angle::fraction_of_turn(heading), measured_turns);
        if (target_turns - previous).abs() > 1e-4 {
            debug!("{}: steer target {:.4} turn ({:.1} deg face)", self.label, target_turns, heading);
        }

        self.command(bus, desired.speed * sign, target_turns);
    }

    fn command<B: MotorIo>(&mut self, bus: &mut B, speed_mps: f32, steer_turns: f32) {
        let rpm =
            units::drive_mps_to_rpm(speed_mps, self.wheel_circumference, self.drive_gear_ratio);
        if let Err(e) = bus.set_goal_velocity(self.cfg.drive_id, rpm) {
            warn!("{}: drive command dropped: {}", self.label, e);
        }

        let ticks = units::steer_turns_to_ticks(steer_turns, self.steer_gear_ratio);
        if let Err(e) = bus.set_goal_position(self.cfg.steer_id, ticks) {
            warn!("{}: steer command dropped: {}", self.label, e);
        }
    }

    /// Latched hardware feedback: wheel speed and face heading. Reflects the
    /// sensors, not the tracker's unbounded setpoint; a failed read keeps the
    /// previous good value.
    pub fn measured_state<B: MotorIo>(&mut self, bus: &mut B) -> ModuleState {
        match bus.present_velocity(self.cfg.drive_id) {
            Ok(rpm) => {
                self.last_state.speed =
                    units::drive_rpm_to_mps(rpm, self.wheel_circumference, self.drive_gear_ratio);
            }
            Err(e) => warn!("{}: drive velocity read failed: {}", self.label, e),
        }
        match bus.present_position(self.cfg.steer_id) {
            Ok(ticks) => {
                let turns = units::steer_ticks_to_turns(ticks, self.steer_gear_ratio);
                self.last_state.heading = turns.rem_euclid(1.0) * 360.0;
            }
            Err(e) => warn!("{}: steer position read failed: {}", self.label, e),
        }
        self.last_state
    }

    /// Monotonic drive distance plus current heading, for odometry.
    pub fn position<B: MotorIo>(&mut self, bus: &mut B) -> ModulePosition {
        match bus.present_position(self.cfg.drive_id) {
            Ok(ticks) => {
                self.last_position.distance = units::drive_ticks_to_meters(
                    ticks,
                    self.wheel_circumference,
                    self.drive_gear_ratio,
                );
            }
            Err(e) => warn!("{}: drive position read failed: {}", self.label, e),
        }
        match bus.present_position(self.cfg.steer_id) {
            Ok(ticks) => {
                let turns = units::steer_ticks_to_turns(ticks, self.steer_gear_ratio);
                self.last_position.heading = turns.rem_euclid(1.0) * 360.0;
            }
            Err(e) => warn!("{}: steer position read failed: {}", self.label, e),
        }
        self.last_position
    }

    /// Zero the drive encoder's accumulated distance. Steering is untouched.
    pub fn reset_drive_distance<B: MotorIo>(&mut self, bus: &mut B) {
        if let Err(e) = bus.seed_position(self.cfg.drive_id, 0) {
            warn!("{}: drive distance reset dropped: {}", self.label, e);
            return;
        }
        self.last_position.distance = 0.0;
    }

    /// Instantaneous (drive, steer) current draw in amps.
    pub fn current_draw<B: MotorIo>(&mut self, bus: &mut B) -> (f32, f32) {
        match bus.present_current_ma(self.cfg.drive_id) {
            Ok(ma) => self.last_current.0 = units::milliamps_to_amps(ma),
            Err(e) => warn!("{}: drive current read failed: {}", self.label, e),
        }
        match bus.present_current_ma(self.cfg.steer_id) {
            Ok(ma) => self.last_current.1 = units::milliamps_to_amps(ma),
            Err(e) => warn!("{}: steer current read failed: {}", self.label, e),
        }
        self.last_current
    }
}

// Swerve drive coordinator: four modules behind one chassis-level API.

use tracing::{info, warn};

use crate::config::{ConfigError, DriveConfig, MODULE_LABELS};
use crate::messages::ChassisCommand;

use super::bus::{BusError, MotorBus, MotorIo};
use super::kinematics::{ChassisSpeeds, ModulePosition, ModuleState, SwerveKinematics};
use super::module::ModuleController;

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),
}

/// Owns the bus and the four module controllers, in fixed dispatch order:
/// front-left, front-right, back-left, back-right.
pub struct SwerveDrive<B: MotorIo> {
    bus: B,
    modules: [ModuleController; 4],
    kinematics: SwerveKinematics,
    max_speed: f32,
    max_angular_speed: f32,
}

impl SwerveDrive<MotorBus> {
    /// Validate the configuration, open the serial bus and bring up all four
    /// modules. Any failure here is fatal.
    pub fn open(cfg: &DriveConfig) -> Result<Self, DriveError> {
        cfg.validate()?;
        info!("Opening controller bus on {}", cfg.port);
        let bus = MotorBus::open(&cfg.port)?;
        Self::new(bus, cfg)
    }
}

impl<B: MotorIo> SwerveDrive<B> {
    pub fn new(mut bus: B, cfg: &DriveConfig) -> Result<Self, DriveError> {
        cfg.validate()?;

        let modules = [
            ModuleController::init(&mut bus, MODULE_LABELS[0], cfg.modules[0], cfg)?,
            ModuleController::init(&mut bus, MODULE_LABELS[1], cfg.modules[1], cfg)?,
            ModuleController::init(&mut bus, MODULE_LABELS[2], cfg.modules[2], cfg)?,
            ModuleController::init(&mut bus, MODULE_LABELS[3], cfg.modules[3], cfg)?,
        ];
        let kinematics = SwerveKinematics::new(cfg.modules.map(|m| m.position));

        info!("Swerve drive ready: 4 modules, {:.2} m/s module speed limit", cfg.max_speed);
        Ok(Self {
            bus,
            modules,
            kinematics,
            max_speed: cfg.max_speed,
            max_angular_speed: cfg.max_angular_speed,
        })
    }

    /// One control cycle: solve the chassis command into four module states,
    /// desaturate the whole set, then dispatch in fixed order. `yaw_deg` is
    /// only consulted for field-relative commands.
    pub fn drive(&mut self, cmd: &ChassisCommand, yaw_deg: f32) {
        let mut speeds = if cmd.field_relative {
            ChassisSpeeds::from_field_relative(cmd.vx, cmd.vy, cmd.omega, yaw_deg)
        } else {
            ChassisSpeeds::from(cmd)
        };
        speeds.omega = speeds.omega.clamp(-self.max_angular_speed, self.max_angular_speed);

        let mut states = self.kinematics.solve(&speeds);
        SwerveKinematics::desaturate(&mut states, self.max_speed);

        for (module, state) in self.modules.iter_mut().zip(states) {
            module.apply(&mut self.bus, state);
        }
    }

    /// Measured module states, in dispatch order.
    pub fn module_states(&mut self) -> [ModuleState; 4] {
        let bus = &mut self.bus;
        let mut states = [ModuleState::default(); 4];
        for (out, module) in states.iter_mut().zip(self.modules.iter_mut()) {
            *out = module.measured_state(bus);
        }
        states
    }

    /// Accumulated positions for the odometry consumer, in dispatch order.
    pub fn module_positions(&mut self) -> [ModulePosition; 4] {
        let bus = &mut self.bus;
        let mut positions = [ModulePosition::default(); 4];
        for (out, module) in positions.iter_mut().zip(self.modules.iter_mut()) {
            *out = module.position(bus);
        }
        positions
    }

    /// Zero every module's drive distance; steering state is untouched.
    pub fn reset_drive_distances(&mut self) {
        let bus = &mut self.bus;
        for module in self.modules.iter_mut() {
            module.reset_drive_distance(bus);
        }
    }

    /// Instantaneous (drive, steer) current per module, in dispatch order.
    pub fn current_draw(&mut self) -> [(f32, f32); 4] {
        let bus = &mut self.bus;
        let mut draws = [(0.0, 0.0); 4];
        for (out, module) in draws.iter_mut().zip(self.modules.iter_mut()) {
            *out = module.current_draw(bus);
        }
        draws
    }

    /// Stop all drive motors with a single broadcast write.
    pub fn stop(&mut self) {
        let targets = self.modules.each_ref().map(|m| (m.drive_id(), 0i16));
        if let Err(e) = self.bus.sync_goal_velocity(&targets) {
            warn!("Failed to stop drive motors: {}", e);
        }
    }
}

impl<B: MotorIo> Drop for SwerveDrive<B> {
    fn drop(&mut self) {
        // Safety measure: never leave the chassis rolling
        self.stop();
    }
}

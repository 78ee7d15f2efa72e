// Simulated controller bus: ideal closed loops for hardware-less runs.
//
// The position loop converges instantly (goal position latches straight into
// the present position) and the velocity loop tracks its target exactly.
// Absolute encoders report whatever the test or `for_config` preset them to.

use std::collections::HashMap;

use crate::config::DriveConfig;
use crate::swerve::units::ABS_TICKS_PER_TURN;

use super::bus::{ControllerSetup, MotorIo, Result};

#[derive(Debug, Default, Clone, Copy)]
struct SimController {
    torque: bool,
    position: i32,
    velocity: i16,
    current_ma: u16,
    absolute: u16,
}

#[derive(Debug, Default)]
pub struct SimBus {
    controllers: HashMap<u8, SimController>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus whose steer absolute encoders read exactly the configured zero
    /// offsets, so every simulated module boots pointing straight ahead.
    pub fn for_config(cfg: &DriveConfig) -> Self {
        let mut bus = Self::new();
        for module in &cfg.modules {
            bus.set_absolute(module.steer_id, module.zero_offset);
        }
        bus
    }

    pub fn set_absolute(&mut self, id: u8, fraction: f32) {
        self.entry(id).absolute = (fraction.rem_euclid(1.0) * ABS_TICKS_PER_TURN).round() as u16;
    }

    pub fn set_position(&mut self, id: u8, ticks: i32) {
        self.entry(id).position = ticks;
    }

    pub fn set_current(&mut self, id: u8, ma: u16) {
        self.entry(id).current_ma = ma;
    }

    pub fn torque_enabled(&self, id: u8) -> bool {
        self.controllers.get(&id).is_some_and(|c| c.torque)
    }

    fn entry(&mut self, id: u8) -> &mut SimController {
        self.controllers.entry(id).or_default()
    }
}

impl MotorIo for SimBus {
    fn ping(&mut self, _id: u8) -> Result<bool> {
        Ok(true)
    }

    fn set_torque(&mut self, id: u8, enabled: bool) -> Result<()> {
        self.entry(id).torque = enabled;
        Ok(())
    }

    fn configure(&mut self, id: u8, _setup: &ControllerSetup) -> Result<()> {
        self.entry(id);
        Ok(())
    }

    fn set_goal_velocity(&mut self, id: u8, rpm: i16) -> Result<()> {
        self.entry(id).velocity = rpm;
        Ok(())
    }

    fn set_goal_position(&mut self, id: u8, ticks: i32) -> Result<()> {
        self.entry(id).position = ticks;
        Ok(())
    }

    fn sync_goal_velocity(&mut self, targets: &[(u8, i16)]) -> Result<()> {
        for &(id, rpm) in targets {
            self.entry(id).velocity = rpm;
        }
        Ok(())
    }

    fn present_velocity(&mut self, id: u8) -> Result<i16> {
        Ok(self.entry(id).velocity)
    }

    fn present_position(&mut self, id: u8) -> Result<i32> {
        Ok(self.entry(id).position)
    }

    fn present_current_ma(&mut self, id: u8) -> Result<u16> {
        Ok(self.entry(id).current_ma)
    }

    fn absolute_position(&mut self, id: u8) -> Result<u16> {
        Ok(self.entry(id).absolute)
    }

    fn seed_position(&mut self, id: u8, ticks: i32) -> Result<()> {
        self.entry(id).position = ticks;
        Ok(())
    }
}

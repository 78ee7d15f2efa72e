// Conversions between controller-native units and physical units.
//
// Drive controllers take velocity setpoints in motor RPM and count position in
// encoder ticks on the motor shaft; steer controllers take position setpoints
// in ticks. Everything above the bus works in meters, m/s and module turns.

/// Relative encoder resolution, ticks per motor shaft revolution.
pub const TICKS_PER_MOTOR_REV: f32 = 4096.0;

/// Absolute encoder resolution, ticks per module revolution (12-bit).
pub const ABS_TICKS_PER_TURN: f32 = 4096.0;

/// Wheel speed in m/s to a drive motor RPM setpoint.
pub fn drive_mps_to_rpm(mps: f32, wheel_circumference: f32, gear_ratio: f32) -> i16 {
    let rpm = mps / wheel_circumference * gear_ratio * 60.0;
    rpm.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Measured drive motor RPM back to wheel speed in m/s.
pub fn drive_rpm_to_mps(rpm: i16, wheel_circumference: f32, gear_ratio: f32) -> f32 {
    rpm as f32 / 60.0 / gear_ratio * wheel_circumference
}

/// Accumulated drive encoder ticks to meters travelled.
pub fn drive_ticks_to_meters(ticks: i32, wheel_circumference: f32, gear_ratio: f32) -> f32 {
    ticks as f32 / TICKS_PER_MOTOR_REV / gear_ratio * wheel_circumference
}

/// Steer encoder ticks to module turns (unbounded, signed).
pub fn steer_ticks_to_turns(ticks: i32, gear_ratio: f32) -> f32 {
    ticks as f32 / TICKS_PER_MOTOR_REV / gear_ratio
}

/// Module turns to a steer position setpoint in ticks.
pub fn steer_turns_to_ticks(turns: f32, gear_ratio: f32) -> i32 {
    (turns * gear_ratio * TICKS_PER_MOTOR_REV).round() as i32
}

/// Raw absolute encoder reading to a fraction of a turn in [0, 1).
pub fn absolute_fraction(raw: u16) -> f32 {
    (raw & 0x0FFF) as f32 / ABS_TICKS_PER_TURN
}

pub fn amps_to_milliamps(amps: f32) -> u16 {
    (amps * 1000.0).round().clamp(0.0, u16::MAX as f32) as u16
}

pub fn milliamps_to_amps(ma: u16) -> f32 {
    ma as f32 / 1000.0
}

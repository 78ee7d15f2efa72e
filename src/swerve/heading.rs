// Continuous heading tracking over a wrapping relative encoder.
//
// The steer encoder only means anything modulo one module turn; the position
// loop on the controller wants an unbounded target. The tracker pins the
// desired fraction to the whole-turn count of the measured position,
// correcting across the 0/1 boundary so a sub-turn move is never commanded
// as a near-full-turn sweep.

/// Width of the wrap detection bands on either side of the 0/1 boundary.
/// Assumes the steer axis moves less than a quarter turn between cycles.
const WRAP_BAND: f32 = 0.25;

/// The last commanded unbounded steer setpoint, decomposed into Euclidean
/// whole turns plus a fraction in [0, 1) so the parts always recompose
/// exactly, including below zero.
#[derive(Debug, Clone, Copy)]
pub struct HeadingTracker {
    whole_turns: i32,
    fraction: f32,
}

impl HeadingTracker {
    /// Establish the zero reference from the one startup absolute-encoder
    /// reading. Returns the tracker and the relative-encoder seed value in
    /// module turns; the caller writes the seed to the steer controller.
    pub fn seed(absolute_fraction: f32, zero_offset: f32) -> (Self, f32) {
        let start = (absolute_fraction - zero_offset).rem_euclid(1.0);
        (Self { whole_turns: 0, fraction: start }, start)
    }

    /// Compute the next unbounded setpoint in module turns.
    ///
    /// `desired_fraction` is the post-optimization heading in [0, 1);
    /// `measured_turns` is the current steer position. When the desired
    /// fraction sits in the low band (0, 0.25] and the measured fraction in
    /// the high band [0.75, 1), the target is one turn ahead; the mirrored
    /// case is one turn behind; otherwise no correction.
    pub fn setpoint(&mut self, desired_fraction: f32, measured_turns: f32) -> f32 {
        let whole = measured_turns.div_euclid(1.0);
        let measured_fraction = measured_turns.rem_euclid(1.0);

        let wrap = if in_low_band(desired_fraction) && in_high_band(measured_fraction) {
            1.0
        } else if in_low_band(measured_fraction) && in_high_band(desired_fraction) {
            -1.0
        } else {
            0.0
        };

        let target = whole + wrap + desired_fraction;
        self.whole_turns = target.div_euclid(1.0) as i32;
        self.fraction = target.rem_euclid(1.0);
        target
    }

    /// The setpoint most recently handed to the position loop.
    pub fn last_setpoint(&self) -> f32 {
        self.whole_turns as f32 + self.fraction
    }
}

fn in_low_band(fraction: f32) -> bool {
    fraction > 0.0 && fraction <= WRAP_BAND
}

fn in_high_band(fraction: f32) -> bool {
    fraction >= 1.0 - WRAP_BAND && fraction < 1.0
}

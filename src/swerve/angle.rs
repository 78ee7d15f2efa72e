// Angle reduction and the flip-180 steering optimization.

/// Reduce an angle in degrees to its fraction of one full turn, in [0, 1).
pub fn fraction_of_turn(degrees: f32) -> f32 {
    degrees.rem_euclid(360.0) / 360.0
}

/// Pick the cheaper of "steer to the desired heading" and "steer to the
/// heading rotated 180 degrees and drive backward".
///
/// Both angles are reduced to [0, 360) and compared by raw absolute
/// difference. A difference in the half-open interval (90, 270] flips:
/// the wheel never steers more than a quarter turn for a single command.
/// Returns the heading to steer to and the speed sign multiplier.
pub fn optimize(desired_deg: f32, current_deg: f32) -> (f32, f32) {
    let desired = desired_deg.rem_euclid(360.0);
    let current = current_deg.rem_euclid(360.0);

    let difference = (current - desired).abs();
    if difference > 90.0 && difference <= 270.0 {
        let flipped = if desired > 180.0 { desired - 180.0 } else { desired + 180.0 };
        (flipped.rem_euclid(360.0), -1.0)
    } else {
        (desired, 1.0)
    }
}

//! Bending angle from a pair of accelerometers.
//!
//! Two IMUs sit on either side of a joint. At rest both measure gravity;
//! projected into the body plane (sensor x-y) the two gravity directions
//! differ by the joint's bending angle.

use crate::hal::Vector3;

/// Joint angle between two accelerometer readings.
///
/// Returns `(angle_deg, delta)`: `angle_deg` is the rotation from `acc0`
/// to `acc1` in the x-y plane, wrapped to `(-180, 180]`. `delta` is the
/// difference of the normalized z components. A large `delta` means the
/// sensors do not share a plane and the angle is unreliable.
pub fn calc_angle(acc0: Vector3, acc1: Vector3) -> (f64, f64) {
    let a = acc0.normalized().unwrap_or_default();
    let b = acc1.normalized().unwrap_or_default();

    let heading0 = a.y.atan2(a.x).to_degrees();
    let heading1 = b.y.atan2(b.x).to_degrees();

    (wrap_degrees(heading1 - heading0), b.z - a.z)
}

/// Wrap an angle into `(-180, 180]`.
pub fn wrap_degrees(angle: f64) -> f64 {
    let mut a = angle % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a <= -180.0 {
        a += 360.0;
    }
    a
}

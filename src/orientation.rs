// Orientation estimation: fused rotation-vector samples when the platform
// provides them, tilt-compensated accelerometer+magnetometer otherwise.
// All state is owned by the estimator instance; consumers borrow the
// current rotation matrix per processing call.

use nalgebra::{Matrix3, Vector3};

const GRAVITY: f64 = 9.81;
// Below 10% of normal gravity the device is close to free fall and the
// accel/mag construction is meaningless.
const FREE_FALL_GRAVITY_SQUARED: f64 = 0.01 * GRAVITY * GRAVITY;
// Cross product of field and gravity degenerates when the vectors are
// near-parallel; treat anything under this norm as a failed fix.
const MIN_HORIZON_NORM: f64 = 0.1;

/// Build a rotation matrix from a fused rotation-vector sample.
///
/// The sample carries the quaternion x/y/z and optionally w; the
/// 3-component form reconstructs w from the unit-norm constraint.
pub fn rotation_matrix_from_vector(values: &[f64]) -> Option<Matrix3<f64>> {
    if values.len() < 3 {
        return None;
    }
    let q1 = values[0];
    let q2 = values[1];
    let q3 = values[2];
    let q0 = if values.len() >= 4 {
        values[3]
    } else {
        (1.0 - q1 * q1 - q2 * q2 - q3 * q3).max(0.0).sqrt()
    };

    let sq_q1 = 2.0 * q1 * q1;
    let sq_q2 = 2.0 * q2 * q2;
    let sq_q3 = 2.0 * q3 * q3;
    let q1_q2 = 2.0 * q1 * q2;
    let q3_q0 = 2.0 * q3 * q0;
    let q1_q3 = 2.0 * q1 * q3;
    let q2_q0 = 2.0 * q2 * q0;
    let q2_q3 = 2.0 * q2 * q3;
    let q1_q0 = 2.0 * q1 * q0;

    Some(Matrix3::new(
        1.0 - sq_q2 - sq_q3,
        q1_q2 - q3_q0,
        q1_q3 + q2_q0,
        q1_q2 + q3_q0,
        1.0 - sq_q1 - sq_q3,
        q2_q3 - q1_q0,
        q1_q3 - q2_q0,
        q2_q3 + q1_q0,
        1.0 - sq_q1 - sq_q2,
    ))
}

/// Tilt-compensated rotation matrix from a gravity vector and a magnetic
/// field vector. Returns `None` on degenerate input (free fall, vectors
/// near-parallel); the caller keeps its previous orientation.
pub fn rotation_matrix_from_accel_mag(
    gravity: Vector3<f64>,
    geomagnetic: Vector3<f64>,
) -> Option<Matrix3<f64>> {
    let norm_sq_a = gravity.norm_squared();
    if norm_sq_a < FREE_FALL_GRAVITY_SQUARED {
        return None;
    }

    let mut h = geomagnetic.cross(&gravity);
    let norm_h = h.norm();
    if norm_h < MIN_HORIZON_NORM {
        return None;
    }
    h /= norm_h;

    let a = gravity / norm_sq_a.sqrt();
    let m = a.cross(&h);

    Some(Matrix3::new(
        h.x, h.y, h.z, //
        m.x, m.y, m.z, //
        a.x, a.y, a.z,
    ))
}

/// Extract (yaw, pitch, roll) in radians from a rotation matrix.
/// Yaw is the compass azimuth, -π..π.
pub fn orientation_angles(r: &Matrix3<f64>) -> (f64, f64, f64) {
    let yaw = r[(0, 1)].atan2(r[(1, 1)]);
    let pitch = (-r[(2, 1)]).clamp(-1.0, 1.0).asin();
    let roll = (-r[(2, 0)]).atan2(r[(2, 2)]);
    (yaw, pitch, roll)
}

/// Tracks the current device orientation from whichever source is feeding.
///
/// Once a fused rotation-vector sample has been seen, the accel+mag
/// fallback path is ignored; before that, the fallback requires both a
/// gravity and a field sample and silently keeps the previous orientation
/// when the platform-style matrix construction fails.
pub struct OrientationEstimator {
    rotation: Matrix3<f64>,
    yaw: f64,
    pitch: f64,
    roll: f64,
    accel: Option<Vector3<f64>>,
    magnet: Option<Vector3<f64>>,
    fused_seen: bool,
}

impl OrientationEstimator {
    pub fn new() -> Self {
        Self {
            rotation: Matrix3::identity(),
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            accel: None,
            magnet: None,
            fused_seen: false,
        }
    }

    pub fn update_from_rotation_vector(&mut self, values: &[f64]) {
        let Some(r) = rotation_matrix_from_vector(values) else {
            log::debug!("rotation vector sample with {} components dropped", values.len());
            return;
        };
        self.fused_seen = true;
        self.set_rotation(r);
    }

    pub fn update_accel(&mut self, sample: Vector3<f64>) {
        self.accel = Some(sample);
        self.refresh_from_accel_mag();
    }

    pub fn update_magnet(&mut self, sample: Vector3<f64>) {
        self.magnet = Some(sample);
        self.refresh_from_accel_mag();
    }

    fn refresh_from_accel_mag(&mut self) {
        if self.fused_seen {
            return;
        }
        let (Some(accel), Some(magnet)) = (self.accel, self.magnet) else {
            return;
        };
        // Degenerate vectors: keep the previous orientation, no error.
        if let Some(r) = rotation_matrix_from_accel_mag(accel, magnet) {
            self.set_rotation(r);
        }
    }

    fn set_rotation(&mut self, r: Matrix3<f64>) {
        let (yaw, pitch, roll) = orientation_angles(&r);
        self.rotation = r;
        self.yaw = yaw;
        self.pitch = pitch;
        self.roll = roll;
    }

    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    /// (yaw, pitch, roll) in radians.
    pub fn angles(&self) -> (f64, f64, f64) {
        (self.yaw, self.pitch, self.roll)
    }

    pub fn reset(&mut self) {
        self.rotation = Matrix3::identity();
        self.yaw = 0.0;
        self.pitch = 0.0;
        self.roll = 0.0;
        self.accel = None;
        self.magnet = None;
        self.fused_seen = false;
    }
}

impl Default for OrientationEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Low-pass filtered compass heading in degrees, normalized to [0, 360).
/// Used by the planar integrator, where only yaw is trusted.
pub struct HeadingFilter {
    alpha: f64,
    heading_deg: f64,
    initialized: bool,
}

impl HeadingFilter {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, heading_deg: 0.0, initialized: false }
    }

    /// Feed a yaw angle in radians; returns the smoothed heading in degrees.
    pub fn update(&mut self, yaw_rad: f64) -> f64 {
        let mut deg = yaw_rad.to_degrees();
        if deg < 0.0 {
            deg += 360.0;
        }
        self.heading_deg = if self.initialized {
            self.alpha * deg + (1.0 - self.alpha) * self.heading_deg
        } else {
            deg
        };
        self.initialized = true;
        self.heading_deg
    }

    pub fn heading_deg(&self) -> f64 {
        self.heading_deg
    }

    pub fn reset(&mut self) {
        self.heading_deg = 0.0;
        self.initialized = false;
    }
}

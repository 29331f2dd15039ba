// Acceleration integration. Two variants with genuinely different trust
// assumptions sit behind one mode switch: the full-3D path rotates body
// acceleration through the complete orientation matrix, the planar path
// trusts only the compass heading and works in the ground plane with bias
// subtraction and a noise deadzone.

use nalgebra::{Matrix3, Vector3};

/// Which integration variant is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegratorMode {
    /// Rotate body acceleration by the full 3×3 orientation matrix and
    /// integrate in three dimensions. Constant per-tick velocity damping.
    Full3d,
    /// Rotate 2-D acceleration about the heading axis only. Bias and
    /// deadzone applied upstream; continuous exponential velocity decay.
    PlanarHeading,
}

/// Timing and damping knobs for [`InertialIntegrator`].
#[derive(Clone, Copy, Debug)]
pub struct IntegratorConfig {
    /// Full-3D: dt values above this are clamped, not rejected.
    pub max_dt_secs: f64,
    /// Planar: dt values below this are rejected as sensor jitter.
    pub min_dt_secs: f64,
    /// Planar: dt values above this are rejected outright.
    pub planar_max_dt_secs: f64,
    /// Full-3D: multiplicative velocity damping per tick.
    pub damping_per_tick: f64,
    /// Planar: continuous decay rate k in `v *= e^(-k·dt)`.
    pub damping_rate: f64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            max_dt_secs: 0.1,
            min_dt_secs: 0.001,
            planar_max_dt_secs: 1.0,
            damping_per_tick: 0.98,
            damping_rate: 1.0,
        }
    }
}

/// Integrates linear acceleration into velocity and position. Position is
/// the origin until the first valid sample arrives.
pub struct InertialIntegrator {
    mode: IntegratorMode,
    config: IntegratorConfig,
    last_timestamp_nanos: Option<i64>,
    vel: Vector3<f64>,
    pos: Vector3<f64>,
}

impl InertialIntegrator {
    pub fn new(mode: IntegratorMode, config: IntegratorConfig) -> Self {
        Self {
            mode,
            config,
            last_timestamp_nanos: None,
            vel: Vector3::zeros(),
            pos: Vector3::zeros(),
        }
    }

    /// Derive dt from consecutive sample timestamps. The stored timestamp
    /// always advances; `None` means the sample must be skipped with
    /// velocity and position untouched. The first sample only initializes
    /// the timestamp.
    pub fn advance(&mut self, timestamp_nanos: i64) -> Option<f64> {
        let prev = self.last_timestamp_nanos.replace(timestamp_nanos)?;
        let mut dt = (timestamp_nanos - prev) as f64 * 1e-9;
        if dt <= 0.0 {
            return None;
        }
        match self.mode {
            IntegratorMode::Full3d => {
                if dt > self.config.max_dt_secs {
                    dt = self.config.max_dt_secs;
                }
            }
            IntegratorMode::PlanarHeading => {
                if dt < self.config.min_dt_secs || dt > self.config.planar_max_dt_secs {
                    return None;
                }
            }
        }
        Some(dt)
    }

    /// Full-3D step: `v += (R·a)·dt`, damp, `p += v·dt`.
    pub fn integrate_full(&mut self, a_body: Vector3<f64>, rotation: &Matrix3<f64>, dt: f64) {
        let a_world = rotation * a_body;
        self.vel += a_world * dt;
        self.vel *= self.config.damping_per_tick;
        self.pos += self.vel * dt;
    }

    /// Planar step: rotate the (already bias-corrected, deadzoned) 2-D
    /// acceleration about the heading axis, integrate with exponential
    /// velocity decay.
    pub fn integrate_planar(&mut self, ax: f64, ay: f64, heading_deg: f64, dt: f64) {
        let heading = heading_deg.to_radians();
        let (sin_h, cos_h) = heading.sin_cos();
        let world_ax = ax * cos_h + ay * sin_h;
        let world_ay = -ax * sin_h + ay * cos_h;

        let decay = (-self.config.damping_rate * dt).exp();
        self.vel.x = (self.vel.x + world_ax * dt) * decay;
        self.vel.y = (self.vel.y + world_ay * dt) * decay;
        self.pos.x += self.vel.x * dt;
        self.pos.y += self.vel.y * dt;
    }

    /// Hard zero-velocity update; position is left frozen where it is.
    pub fn zero_velocity(&mut self) {
        self.vel = Vector3::zeros();
    }

    /// Apply a discrete position increment (pedestrian steps).
    pub fn displace(&mut self, dx: f64, dy: f64) {
        self.pos.x += dx;
        self.pos.y += dy;
    }

    pub fn velocity(&self) -> Vector3<f64> {
        self.vel
    }

    pub fn position(&self) -> Vector3<f64> {
        self.pos
    }

    pub fn mode(&self) -> IntegratorMode {
        self.mode
    }

    pub fn reset(&mut self) {
        self.last_timestamp_nanos = None;
        self.vel = Vector3::zeros();
        self.pos = Vector3::zeros();
    }
}

/// Pedestrian dead reckoning: discrete step events advanced along the
/// current smoothed heading with a fixed step length.
pub struct StepAccumulator {
    step_length_m: f64,
    step_count: u32,
}

impl StepAccumulator {
    pub fn new(step_length_m: f64) -> Self {
        Self { step_length_m, step_count: 0 }
    }

    /// Process one step-detector event. The event value means "at least
    /// this many steps" and is clamped to a minimum of one. Returns the
    /// total (dx, dy) position increment for all steps in the event.
    pub fn on_event(&mut self, event_value: f64, yaw_rad: f64) -> (f64, f64) {
        let steps = (event_value as i64).max(1) as u32;
        let dx = self.step_length_m * yaw_rad.sin();
        let dy = self.step_length_m * yaw_rad.cos();
        self.step_count += steps;
        (dx * steps as f64, dy * steps as f64)
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn reset(&mut self) {
        self.step_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn no_damping() -> IntegratorConfig {
        IntegratorConfig { damping_per_tick: 1.0, damping_rate: 0.0, ..Default::default() }
    }

    #[test]
    fn test_first_sample_initializes_timestamp_only() {
        let mut integ = InertialIntegrator::new(IntegratorMode::Full3d, no_damping());
        assert!(integ.advance(1_000_000_000).is_none());
        assert_relative_eq!(integ.advance(1_010_000_000).unwrap(), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_non_positive_dt_rejected_but_timestamp_advances() {
        let mut integ = InertialIntegrator::new(IntegratorMode::Full3d, no_damping());
        integ.advance(2_000_000_000);
        assert!(integ.advance(1_500_000_000).is_none());
        // The rejected sample's timestamp became the new reference.
        assert_relative_eq!(integ.advance(1_510_000_000).unwrap(), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_full3d_clamps_large_dt() {
        let mut integ = InertialIntegrator::new(IntegratorMode::Full3d, no_damping());
        integ.advance(0);
        assert_relative_eq!(integ.advance(5_000_000_000).unwrap(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_planar_rejects_out_of_window_dt() {
        let mut integ = InertialIntegrator::new(IntegratorMode::PlanarHeading, no_damping());
        integ.advance(0);
        // Too small.
        assert!(integ.advance(500_000).is_none());
        // Too large.
        assert!(integ.advance(2_000_000_000).is_none());
        // In range.
        assert!(integ.advance(2_020_000_000).is_some());
    }

    #[test]
    fn test_constant_acceleration_kinematics() {
        // 1 m/s² along world x for 1 s at 100 Hz without damping:
        // v ≈ 1.0 m/s, p ≈ 0.5 m.
        let mut integ = InertialIntegrator::new(IntegratorMode::Full3d, no_damping());
        let identity = Matrix3::identity();
        for _ in 0..100 {
            integ.integrate_full(Vector3::new(1.0, 0.0, 0.0), &identity, 0.01);
        }
        assert_relative_eq!(integ.velocity().x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(integ.position().x, 0.5, epsilon = 0.01);
    }

    #[test]
    fn test_planar_heading_rotation() {
        // Heading 90°: body +x acceleration maps onto world axes through
        // (cos, sin) about the heading.
        let mut integ = InertialIntegrator::new(IntegratorMode::PlanarHeading, no_damping());
        integ.integrate_planar(1.0, 0.0, 90.0, 0.01);
        let v = integ.velocity();
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(v.y, -0.01, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_velocity_freezes_position() {
        let mut integ = InertialIntegrator::new(IntegratorMode::Full3d, no_damping());
        let identity = Matrix3::identity();
        integ.integrate_full(Vector3::new(2.0, 0.0, 0.0), &identity, 0.1);
        let pos = integ.position();
        integ.zero_velocity();
        assert_relative_eq!(integ.velocity().norm(), 0.0);
        assert_relative_eq!(integ.position(), pos);
    }

    #[test]
    fn test_step_accumulator_heading_projection() {
        let mut steps = StepAccumulator::new(0.75);
        // Heading due north (yaw 0): a step moves +y.
        let (dx, dy) = steps.on_event(1.0, 0.0);
        assert_relative_eq!(dx, 0.0, epsilon = 1e-12);
        assert_relative_eq!(dy, 0.75, epsilon = 1e-12);

        // Event value below one still counts a single step.
        let (_, _) = steps.on_event(0.0, 0.0);
        assert_eq!(steps.step_count(), 2);

        // Multi-step event.
        let (dx, dy) = steps.on_event(3.0, std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(dx, 3.0 * 0.75, epsilon = 1e-9);
        assert_relative_eq!(dy, 0.0, epsilon = 1e-9);
        assert_eq!(steps.step_count(), 5);
    }
}

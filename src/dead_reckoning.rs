// dead_reckoning.rs — the inertial pose producer.
//
// Everything here is independent of any platform sensor API or event loop:
// an adapter at the system boundary feeds `SensorEvent`s in, pose
// snapshots come out. That makes the whole pipeline unit-testable by
// replaying synthetic or recorded sample sequences.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{TrackerError, TrackerResult};
use crate::integrator::{InertialIntegrator, IntegratorConfig, IntegratorMode, StepAccumulator};
use crate::orientation::{HeadingFilter, OrientationEstimator};
use crate::types::{
    AccelSample, GyroSample, LinearAccelSample, MagSample, Pose, RotationVectorSample,
    SensorEvent, StepSample, TrackerState,
};
use crate::zupt::{BiasEstimate, StillCountDetector, StillTimeDetector};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
pub struct DrConfig {
    pub mode: IntegratorMode,

    // ── Heading smoothing (planar mode) ──
    pub heading_alpha: f64,

    // ── Stationary detection ──
    pub accel_still_threshold: f64,
    pub gyro_still_threshold: f64,
    pub still_time_required_secs: f64,
    pub still_samples_required: u32,

    // ── Bias / noise suppression (planar mode) ──
    pub bias_alpha: f64,
    pub deadzone: f64,

    // ── Integration timing and damping ──
    pub integrator: IntegratorConfig,

    // ── Pedestrian DR ──
    pub step_length_m: f64,
}

impl Default for DrConfig {
    fn default() -> Self {
        Self {
            mode: IntegratorMode::Full3d,
            heading_alpha: 0.2,
            accel_still_threshold: 0.12,
            gyro_still_threshold: 0.05,
            still_time_required_secs: 0.5,
            still_samples_required: 6,
            bias_alpha: 0.2,
            deadzone: 0.05,
            integrator: IntegratorConfig::default(),
            step_length_m: 0.75,
        }
    }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Point-in-time view of the producer's internal state, for status
/// surfaces and diagnostics.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DrSnapshot {
    pub state: TrackerState,
    pub is_stationary: bool,
    pub still_secs: f64,
    pub bias: (f64, f64),
    pub heading_deg: f64,
    pub step_count: u32,
    pub accel_samples: u64,
    pub gyro_samples: u64,
    pub magnet_samples: u64,
    pub linear_accel_samples: u64,
    pub rotation_vector_samples: u64,
    pub step_events: u64,
}

#[derive(Clone, Copy, Debug, Default)]
struct SampleCounts {
    accel: u64,
    gyro: u64,
    magnet: u64,
    linear_accel: u64,
    rotation_vector: u64,
    step: u64,
}

// ─── The producer ────────────────────────────────────────────────────────────

/// Sensor-fusion dead-reckoning tracker: orientation tracking, stationary
/// detection with ZUPT and bias estimation, acceleration integration, and
/// step-based positioning, emitting one [`Pose`] per processed event.
pub struct DeadReckoningTracker {
    config: DrConfig,
    state: TrackerState,

    orientation: OrientationEstimator,
    heading: HeadingFilter,
    still_time: StillTimeDetector,
    still_count: StillCountDetector,
    bias: BiasEstimate,
    integrator: InertialIntegrator,
    steps: StepAccumulator,

    // Freshest cached gyro for the stationary test; delivery order between
    // sensor kinds is not assumed.
    last_gyro: Option<Vector3<f64>>,
    counts: SampleCounts,
}

impl DeadReckoningTracker {
    pub fn new(config: DrConfig) -> Self {
        Self {
            orientation: OrientationEstimator::new(),
            heading: HeadingFilter::new(config.heading_alpha),
            still_time: StillTimeDetector::new(
                config.accel_still_threshold,
                config.gyro_still_threshold,
                config.still_time_required_secs,
            ),
            still_count: StillCountDetector::new(
                config.accel_still_threshold,
                config.still_samples_required,
            ),
            bias: BiasEstimate::new(config.bias_alpha),
            integrator: InertialIntegrator::new(config.mode, config.integrator),
            steps: StepAccumulator::new(config.step_length_m),
            state: TrackerState::Stopped,
            last_gyro: None,
            counts: SampleCounts::default(),
            config,
        }
    }

    // ── Control surface ──────────────────────────────────────────────────

    /// Begin accepting events. Accumulated state is deliberately kept: a
    /// restart continues the trajectory from where it froze.
    pub fn start(&mut self) -> TrackerResult<()> {
        match self.state {
            TrackerState::Tracking => Err(TrackerError::AlreadyTracking),
            TrackerState::Stopped => {
                self.state = TrackerState::Tracking;
                log::debug!("dead reckoning tracking started");
                Ok(())
            }
        }
    }

    /// Stop accepting events; the last computed state stays frozen.
    pub fn stop(&mut self) -> TrackerResult<()> {
        match self.state {
            TrackerState::Stopped => Err(TrackerError::NotTracking),
            TrackerState::Tracking => {
                self.state = TrackerState::Stopped;
                log::debug!("dead reckoning tracking stopped");
                Ok(())
            }
        }
    }

    /// Zero every accumulator (bias, velocity, position, heading smoothing,
    /// stationary counters, step count) without touching the Stopped /
    /// Tracking state.
    pub fn reset(&mut self) {
        self.orientation.reset();
        self.heading.reset();
        self.still_time.reset();
        self.still_count.reset();
        self.bias.reset();
        self.integrator.reset();
        self.steps.reset();
        self.last_gyro = None;
        self.counts = SampleCounts::default();
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    // ── Event processing ─────────────────────────────────────────────────

    /// Process one sensor event to completion. Returns the refreshed pose,
    /// or `None` when the tracker is stopped or the event was discarded as
    /// degenerate. No error ever crosses this boundary.
    pub fn feed(&mut self, event: &SensorEvent) -> Option<Pose> {
        if self.state != TrackerState::Tracking {
            return None;
        }
        match event {
            SensorEvent::RotationVector(s) => self.on_rotation_vector(s),
            SensorEvent::Accel(s) => self.on_accel(s),
            SensorEvent::Magnet(s) => self.on_magnet(s),
            SensorEvent::Gyro(s) => self.on_gyro(s),
            SensorEvent::LinearAccel(s) => self.on_linear_accel(s),
            SensorEvent::StepDetector(s) => self.on_step(s),
        }
    }

    fn on_rotation_vector(&mut self, sample: &RotationVectorSample) -> Option<Pose> {
        self.counts.rotation_vector += 1;
        self.orientation.update_from_rotation_vector(&sample.values);
        let (yaw, _, _) = self.orientation.angles();
        self.heading.update(yaw);
        Some(self.pose(sample.timestamp_nanos))
    }

    fn on_accel(&mut self, sample: &AccelSample) -> Option<Pose> {
        self.counts.accel += 1;
        self.orientation.update_accel(Vector3::new(sample.x, sample.y, sample.z));
        Some(self.pose(sample.timestamp_nanos))
    }

    fn on_magnet(&mut self, sample: &MagSample) -> Option<Pose> {
        self.counts.magnet += 1;
        self.orientation.update_magnet(Vector3::new(sample.x, sample.y, sample.z));
        Some(self.pose(sample.timestamp_nanos))
    }

    fn on_gyro(&mut self, sample: &GyroSample) -> Option<Pose> {
        self.counts.gyro += 1;
        self.last_gyro = Some(Vector3::new(sample.x, sample.y, sample.z));
        None
    }

    fn on_linear_accel(&mut self, sample: &LinearAccelSample) -> Option<Pose> {
        self.counts.linear_accel += 1;
        let Some(dt) = self.integrator.advance(sample.timestamp_nanos) else {
            log::debug!("linear accel sample at {} rejected by dt gate", sample.timestamp_nanos);
            return None;
        };
        match self.config.mode {
            IntegratorMode::Full3d => self.integrate_full(sample, dt),
            IntegratorMode::PlanarHeading => self.integrate_planar(sample, dt),
        }
    }

    fn integrate_full(&mut self, sample: &LinearAccelSample, dt: f64) -> Option<Pose> {
        let a_body = Vector3::new(sample.x, sample.y, sample.z);
        let gyro_norm = self.last_gyro.map(|g| g.norm()).unwrap_or(0.0);

        if self.still_time.update(a_body.norm(), gyro_norm, dt) {
            // Confirmed still: stop velocity, freeze position.
            self.integrator.zero_velocity();
            return Some(self.pose(sample.timestamp_nanos));
        }

        self.integrator.integrate_full(a_body, self.orientation.rotation(), dt);
        Some(self.pose(sample.timestamp_nanos))
    }

    fn integrate_planar(&mut self, sample: &LinearAccelSample, dt: f64) -> Option<Pose> {
        let mag_2d = sample.x.hypot(sample.y);

        if self.still_count.update(mag_2d) {
            // Bias learns from the raw, unsubtracted reading while still.
            self.bias.update(sample.x, sample.y);
            self.integrator.zero_velocity();
            return Some(self.pose(sample.timestamp_nanos));
        }

        let mut ax = sample.x - self.bias.x;
        let mut ay = sample.y - self.bias.y;
        if ax.abs() < self.config.deadzone {
            ax = 0.0;
        }
        if ay.abs() < self.config.deadzone {
            ay = 0.0;
        }

        self.integrator.integrate_planar(ax, ay, self.heading.heading_deg(), dt);
        Some(self.pose(sample.timestamp_nanos))
    }

    fn on_step(&mut self, sample: &StepSample) -> Option<Pose> {
        self.counts.step += 1;
        let (yaw, _, _) = self.orientation.angles();
        let (dx, dy) = self.steps.on_event(sample.steps, yaw);
        self.integrator.displace(dx, dy);
        Some(self.pose(sample.timestamp_nanos))
    }

    // ── Queries ──────────────────────────────────────────────────────────

    fn pose(&self, timestamp_nanos: i64) -> Pose {
        let pos = self.integrator.position();
        let vel = self.integrator.velocity();
        let (yaw, pitch, roll) = self.orientation.angles();
        Pose {
            timestamp_nanos,
            pos_x: pos.x,
            pos_y: pos.y,
            pos_z: pos.z,
            vel_x: vel.x,
            vel_y: vel.y,
            vel_z: vel.z,
            roll_deg: roll.to_degrees(),
            pitch_deg: pitch.to_degrees(),
            yaw_deg: yaw.to_degrees(),
            step_count: self.steps.step_count(),
        }
    }

    pub fn is_stationary(&self) -> bool {
        match self.config.mode {
            IntegratorMode::Full3d => self.still_time.is_stationary(),
            IntegratorMode::PlanarHeading => self.still_count.is_stationary(),
        }
    }

    pub fn snapshot(&self) -> DrSnapshot {
        DrSnapshot {
            state: self.state,
            is_stationary: self.is_stationary(),
            still_secs: self.still_time.still_secs(),
            bias: (self.bias.x, self.bias.y),
            heading_deg: self.heading.heading_deg(),
            step_count: self.steps.step_count(),
            accel_samples: self.counts.accel,
            gyro_samples: self.counts.gyro,
            magnet_samples: self.counts.magnet,
            linear_accel_samples: self.counts.linear_accel,
            rotation_vector_samples: self.counts.rotation_vector,
            step_events: self.counts.step,
        }
    }

    pub fn config(&self) -> &DrConfig {
        &self.config
    }
}

use serde::{Deserialize, Serialize};

/// Raw 3-axis accelerometer reading (gravity included), body frame.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AccelSample {
    pub timestamp_nanos: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Angular rate reading, rad/s, body frame.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GyroSample {
    pub timestamp_nanos: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Magnetic field reading, µT, body frame.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MagSample {
    pub timestamp_nanos: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Gravity-free acceleration, m/s², body frame.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LinearAccelSample {
    pub timestamp_nanos: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Fused rotation-vector sample. Platforms deliver 3, 4 or 5 components:
/// the quaternion x/y/z, optionally w, optionally a heading accuracy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RotationVectorSample {
    pub timestamp_nanos: i64,
    pub values: Vec<f64>,
}

/// Step-detector event. `steps` is "at least this many steps since the
/// last event" and is clamped to a minimum of one during processing.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StepSample {
    pub timestamp_nanos: i64,
    pub steps: f64,
}

/// One delivered sensor event. Each underlying sensor has its own stream;
/// no interleaving order between kinds is assumed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SensorEvent {
    Accel(AccelSample),
    Gyro(GyroSample),
    Magnet(MagSample),
    LinearAccel(LinearAccelSample),
    RotationVector(RotationVectorSample),
    StepDetector(StepSample),
}

impl SensorEvent {
    pub fn timestamp_nanos(&self) -> i64 {
        match self {
            SensorEvent::Accel(s) => s.timestamp_nanos,
            SensorEvent::Gyro(s) => s.timestamp_nanos,
            SensorEvent::Magnet(s) => s.timestamp_nanos,
            SensorEvent::LinearAccel(s) => s.timestamp_nanos,
            SensorEvent::RotationVector(s) => s.timestamp_nanos,
            SensorEvent::StepDetector(s) => s.timestamp_nanos,
        }
    }
}

/// Immutable pose snapshot, one per processed event. Position/velocity are
/// world-frame metres and m/s; orientation is degrees.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Pose {
    pub timestamp_nanos: i64,
    pub pos_x: f64,
    pub pos_y: f64,
    pub pos_z: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub vel_z: f64,
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
    pub step_count: u32,
}

impl Pose {
    pub fn speed(&self) -> f64 {
        (self.vel_x * self.vel_x + self.vel_y * self.vel_y + self.vel_z * self.vel_z).sqrt()
    }
}

/// A detected keypoint in pixel coordinates with its corner score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub x: u32,
    pub y: u32,
    pub score: u8,
}

/// Correspondence between a previous-frame feature and its best match in
/// the current frame. Lives only within one odometry step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub prev: Feature,
    pub curr: Feature,
}

/// Producer lifecycle. `start()` / `stop()` move between these; `reset()`
/// is orthogonal and touches only accumulated state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerState {
    Stopped,
    Tracking,
}

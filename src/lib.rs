// Smartnav core: inertial dead reckoning and monocular visual odometry
// for handheld devices, fed by raw sensor events and camera luma frames.

pub mod dead_reckoning;
pub mod error;
pub mod integrator;
pub mod orientation;
pub mod types;
pub mod vision;
pub mod zupt;

pub use dead_reckoning::{DeadReckoningTracker, DrConfig, DrSnapshot};
pub use error::{TrackerError, TrackerResult};
pub use integrator::{InertialIntegrator, IntegratorConfig, IntegratorMode, StepAccumulator};
pub use orientation::{HeadingFilter, OrientationEstimator};
pub use types::{Feature, Match, Pose, SensorEvent, TrackerState};
pub use vision::{FrameResult, VisualTracker, VoConfig, VoSnapshot};
pub use zupt::{BiasEstimate, StillCountDetector, StillTimeDetector};

// Monocular visual odometry over raw luma buffers: detect corners, match
// them against the previous frame, and integrate the median pixel motion
// into a planar pose. No mapping, no loop closure; each frame is compared
// only to the one before it.

pub mod detector;
pub mod odometry;
pub mod tracker;

use std::time::Instant;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{TrackerError, TrackerResult};
use crate::types::{Feature, Pose, TrackerState};

pub use detector::{detect_features, DetectorConfig};
pub use odometry::{displacement_to_meters, median_displacement, OdometryConfig};
pub use tracker::{track_features, TrackerConfig};

#[derive(Clone, Debug, Default)]
pub struct VoConfig {
    pub detector: DetectorConfig,
    pub tracker: TrackerConfig,
    pub odometry: OdometryConfig,
}

/// Per-frame output of the visual pipeline. Only the planar position of
/// the pose is estimated; velocity and orientation stay zero.
#[derive(Clone, Debug)]
pub struct FrameResult {
    pub pose: Pose,
    /// Keypoints detected in this frame (they seed the next frame's
    /// matching), for visualization.
    pub keypoints: Vec<Feature>,
    pub match_count: usize,
    /// Frames per second over the last measurement window; 0.0 until the
    /// first window completes.
    pub fps: f64,
}

/// Serializable summary of the visual tracker's accumulated state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VoSnapshot {
    pub state: TrackerState,
    pub pos_x: f64,
    pub pos_y: f64,
    pub frame_count: u64,
    pub fps: f64,
}

/// Previous-frame luma storage. The buffer is owned and reused across
/// frames; `has_previous` says whether it holds valid data, so a cleared
/// store never masquerades as a real frame.
struct FrameStore {
    buf: Vec<u8>,
    width: usize,
    height: usize,
    has_previous: bool,
}

impl FrameStore {
    fn new() -> Self {
        Self { buf: Vec::new(), width: 0, height: 0, has_previous: false }
    }

    fn store(&mut self, gray: &[u8], width: usize, height: usize) {
        let len = width * height;
        if self.width != width || self.height != height {
            self.buf.resize(len, 0);
            self.width = width;
            self.height = height;
        }
        self.buf.copy_from_slice(&gray[..len]);
        self.has_previous = true;
    }

    fn clear(&mut self) {
        self.has_previous = false;
    }
}

/// Frame-to-frame visual odometry producer with the same lifecycle as the
/// inertial tracker: `start()`/`stop()` gate processing, `reset()` zeroes
/// the pose and drops the stored frame in any state.
pub struct VisualTracker {
    config: VoConfig,
    state: TrackerState,
    frames: FrameStore,
    prev_features: Vec<Feature>,
    pos_x: f64,
    pos_y: f64,
    frame_count: u64,
    fps: f64,
    fps_window_start: Option<Instant>,
    fps_window_frames: u32,
}

impl VisualTracker {
    pub fn new(config: VoConfig) -> Self {
        Self {
            config,
            state: TrackerState::Stopped,
            frames: FrameStore::new(),
            prev_features: Vec::new(),
            pos_x: 0.0,
            pos_y: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_window_start: None,
            fps_window_frames: 0,
        }
    }

    pub fn start(&mut self) -> TrackerResult<()> {
        match self.state {
            TrackerState::Tracking => Err(TrackerError::AlreadyTracking),
            TrackerState::Stopped => {
                debug!("visual tracker started");
                self.state = TrackerState::Tracking;
                self.fps_window_start = None;
                self.fps_window_frames = 0;
                Ok(())
            }
        }
    }

    /// Stop processing. The accumulated pose is frozen, not cleared.
    pub fn stop(&mut self) -> TrackerResult<()> {
        match self.state {
            TrackerState::Stopped => Err(TrackerError::NotTracking),
            TrackerState::Tracking => {
                debug!("visual tracker stopped after {} frames", self.frame_count);
                self.state = TrackerState::Stopped;
                Ok(())
            }
        }
    }

    /// Zero the pose and forget the stored frame. Works in any state and
    /// leaves the start/stop state untouched.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.prev_features.clear();
        self.pos_x = 0.0;
        self.pos_y = 0.0;
        self.frame_count = 0;
        self.fps = 0.0;
        self.fps_window_start = None;
        self.fps_window_frames = 0;
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Process one luma frame. Returns `None` while stopped or when the
    /// buffer is too small for the claimed dimensions; a frame without a
    /// usable predecessor yields a zero-displacement result rather than an
    /// error.
    pub fn process_frame(
        &mut self,
        gray: &[u8],
        width: usize,
        height: usize,
        timestamp_nanos: i64,
    ) -> Option<FrameResult> {
        if self.state != TrackerState::Tracking {
            return None;
        }
        if width == 0 || height == 0 || gray.len() < width * height {
            debug!("dropping frame: buffer {} too small for {}x{}", gray.len(), width, height);
            return None;
        }

        // Dimension change invalidates the stored frame.
        if self.frames.has_previous
            && (self.frames.width != width || self.frames.height != height)
        {
            debug!("frame dimensions changed, restarting from this frame");
            self.frames.clear();
            self.prev_features.clear();
        }

        let mut match_count = 0;
        if self.frames.has_previous && !self.prev_features.is_empty() {
            let matches = track_features(
                &self.frames.buf,
                gray,
                width,
                height,
                &self.prev_features,
                &self.config.tracker,
            );
            match_count = matches.len();
            let (dx_px, dy_px) = median_displacement(&matches);
            let (dx_m, dy_m) = displacement_to_meters(dx_px, dy_px, &self.config.odometry);
            self.pos_x += dx_m;
            self.pos_y += dy_m;
        }

        let keypoints = detect_features(gray, width, height, &self.config.detector);
        self.prev_features = keypoints.clone();
        self.frames.store(gray, width, height);

        self.frame_count += 1;
        self.tick_fps();

        Some(FrameResult {
            pose: Pose {
                timestamp_nanos,
                pos_x: self.pos_x,
                pos_y: self.pos_y,
                pos_z: 0.0,
                vel_x: 0.0,
                vel_y: 0.0,
                vel_z: 0.0,
                roll_deg: 0.0,
                pitch_deg: 0.0,
                yaw_deg: 0.0,
                step_count: 0,
            },
            keypoints,
            match_count,
            fps: self.fps,
        })
    }

    pub fn snapshot(&self) -> VoSnapshot {
        VoSnapshot {
            state: self.state,
            pos_x: self.pos_x,
            pos_y: self.pos_y,
            frame_count: self.frame_count,
            fps: self.fps,
        }
    }

    /// One-second windowed frame rate.
    fn tick_fps(&mut self) {
        self.fps_window_frames += 1;
        match self.fps_window_start {
            None => self.fps_window_start = Some(Instant::now()),
            Some(start) => {
                let elapsed = start.elapsed().as_secs_f64();
                if elapsed >= 1.0 {
                    self.fps = self.fps_window_frames as f64 / elapsed;
                    self.fps_window_start = Some(Instant::now());
                    self.fps_window_frames = 0;
                }
            }
        }
    }
}

// Stationary detection and zero-velocity updates. Two gating styles are in
// use: the full-3D integrator accumulates still time from accel and gyro
// norms, the planar integrator counts consecutive quiet 2-D samples.

/// Accumulates still time while both motion magnitudes stay under their
/// thresholds; resets to zero the moment either exceeds it. Stationary once
/// the accumulated time passes the required duration.
pub struct StillTimeDetector {
    accel_threshold: f64,
    gyro_threshold: f64,
    required_secs: f64,
    still_secs: f64,
}

impl StillTimeDetector {
    pub fn new(accel_threshold: f64, gyro_threshold: f64, required_secs: f64) -> Self {
        Self { accel_threshold, gyro_threshold, required_secs, still_secs: 0.0 }
    }

    /// Feed the current accel/gyro norms for one integration tick.
    /// Pass `gyro_norm = 0.0` when no gyroscope is present.
    pub fn update(&mut self, accel_norm: f64, gyro_norm: f64, dt: f64) -> bool {
        if accel_norm < self.accel_threshold && gyro_norm < self.gyro_threshold {
            self.still_secs += dt;
        } else {
            self.still_secs = 0.0;
        }
        self.is_stationary()
    }

    pub fn is_stationary(&self) -> bool {
        self.still_secs > self.required_secs
    }

    pub fn still_secs(&self) -> f64 {
        self.still_secs
    }

    pub fn reset(&mut self) {
        self.still_secs = 0.0;
    }
}

/// Counts consecutive below-threshold 2-D acceleration samples; stationary
/// after a fixed run length.
pub struct StillCountDetector {
    threshold: f64,
    required_samples: u32,
    count: u32,
}

impl StillCountDetector {
    pub fn new(threshold: f64, required_samples: u32) -> Self {
        Self { threshold, required_samples, count: 0 }
    }

    pub fn update(&mut self, accel_mag_2d: f64) -> bool {
        if accel_mag_2d < self.threshold {
            self.count += 1;
        } else {
            self.count = 0;
        }
        self.is_stationary()
    }

    pub fn is_stationary(&self) -> bool {
        self.count >= self.required_samples
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Accelerometer offset in the body x/y plane. Updated only while the
/// device is confirmed stationary, decaying toward the raw reading via
/// exponential smoothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct BiasEstimate {
    pub x: f64,
    pub y: f64,
    alpha: f64,
}

impl BiasEstimate {
    pub fn new(alpha: f64) -> Self {
        Self { x: 0.0, y: 0.0, alpha }
    }

    /// Blend in the raw (unsubtracted) reading: `bias = (1-α)·bias + α·raw`.
    pub fn update(&mut self, raw_x: f64, raw_y: f64) {
        self.x = (1.0 - self.alpha) * self.x + self.alpha * raw_x;
        self.y = (1.0 - self.alpha) * self.y + self.alpha * raw_y;
    }

    pub fn reset(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_still_time_accumulates_and_resets() {
        let mut det = StillTimeDetector::new(0.12, 0.05, 0.5);

        // Quiet samples accumulate monotonically.
        for _ in 0..10 {
            det.update(0.05, 0.01, 0.04);
        }
        assert_relative_eq!(det.still_secs(), 0.4, epsilon = 1e-12);
        assert!(!det.is_stationary());

        det.update(0.05, 0.01, 0.11);
        assert!(det.is_stationary());

        // One loud sample resets outright.
        det.update(0.5, 0.01, 0.01);
        assert_relative_eq!(det.still_secs(), 0.0);
        assert!(!det.is_stationary());
    }

    #[test]
    fn test_still_time_gyro_also_gates() {
        let mut det = StillTimeDetector::new(0.12, 0.05, 0.5);
        for _ in 0..60 {
            det.update(0.05, 0.2, 0.01);
        }
        // Rotating device never goes stationary no matter how quiet the accel.
        assert!(!det.is_stationary());
    }

    #[test]
    fn test_still_count_run_length() {
        let mut det = StillCountDetector::new(0.12, 6);
        for _ in 0..5 {
            assert!(!det.update(0.05));
        }
        assert!(det.update(0.05));

        det.update(1.0);
        assert!(!det.is_stationary());
    }

    #[test]
    fn test_bias_converges_to_constant_input() {
        let mut bias = BiasEstimate::new(0.2);
        for _ in 0..25 {
            bias.update(0.3, -0.1);
        }
        // A few dozen smoothing steps bring the estimate within 1% of the input.
        assert!((bias.x - 0.3).abs() < 0.003);
        assert!((bias.y + 0.1).abs() < 0.001);
    }
}

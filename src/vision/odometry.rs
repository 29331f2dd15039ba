// Robust frame-to-frame motion: the independent medians of the matched
// keypoint displacements. Cheap, and tolerant of a minority of bad
// matches without a full robust regression.

use crate::types::Match;

/// Pixel-to-metre scale and camera-mount axis remap.
#[derive(Clone, Copy, Debug)]
pub struct OdometryConfig {
    pub pixel_to_meter: f64,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self { pixel_to_meter: 0.002 }
    }
}

/// Median pixel displacement of the matches, (0, 0) when there are none.
/// Zero matches is normal degraded behavior, not a failure.
pub fn median_displacement(matches: &[Match]) -> (f64, f64) {
    if matches.is_empty() {
        return (0.0, 0.0);
    }

    let mut xs: Vec<f64> = matches
        .iter()
        .map(|m| m.curr.x as f64 - m.prev.x as f64)
        .collect();
    let mut ys: Vec<f64> = matches
        .iter()
        .map(|m| m.curr.y as f64 - m.prev.y as f64)
        .collect();
    xs.sort_by(|a, b| a.total_cmp(b));
    ys.sort_by(|a, b| a.total_cmp(b));

    (xs[xs.len() / 2], ys[ys.len() / 2])
}

/// Convert a pixel displacement to world metres. The sign flip on x
/// accounts for the camera's mounting orientation relative to the world
/// frame.
pub fn displacement_to_meters(dx_px: f64, dy_px: f64, config: &OdometryConfig) -> (f64, f64) {
    (-dx_px * config.pixel_to_meter, dy_px * config.pixel_to_meter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Feature;
    use approx::assert_relative_eq;

    fn match_at(dx: u32, dy: u32) -> Match {
        Match {
            prev: Feature { x: 0, y: 0, score: 0 },
            curr: Feature { x: dx, y: dy, score: 0 },
        }
    }

    #[test]
    fn test_zero_matches_zero_displacement() {
        assert_eq!(median_displacement(&[]), (0.0, 0.0));
    }

    #[test]
    fn test_median_rejects_outlier() {
        // One wild match out of three must not drag the estimate.
        let matches = vec![match_at(2, 0), match_at(4, 0), match_at(100, 0)];
        let (dx, dy) = median_displacement(&matches);
        assert_relative_eq!(dx, 4.0);
        assert_relative_eq!(dy, 0.0);
    }

    #[test]
    fn test_axes_are_independent() {
        let matches = vec![
            Match {
                prev: Feature { x: 10, y: 0, score: 0 },
                curr: Feature { x: 0, y: 3, score: 0 },
            },
            match_at(5, 1),
            match_at(5, 2),
        ];
        let (dx, dy) = median_displacement(&matches);
        assert_relative_eq!(dx, 5.0);
        assert_relative_eq!(dy, 2.0);
    }

    #[test]
    fn test_meter_conversion_remaps_axes() {
        let config = OdometryConfig::default();
        let (mx, my) = displacement_to_meters(10.0, -5.0, &config);
        assert_relative_eq!(mx, -0.02);
        assert_relative_eq!(my, -0.01);
    }
}

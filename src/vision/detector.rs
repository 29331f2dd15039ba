// FAST-style corner detection on a single-channel luma buffer. The cost is
// bounded up front: fixed scan stride, fixed 16-point sampling ring, grid
// non-maximum suppression, hard output cap.

use crate::types::Feature;

/// Discretized circle of radius 3 around the candidate pixel, 16 samples.
const CIRCLE: [(i32, i32); 16] = [
    (-3, 0),
    (-3, 1),
    (-2, 2),
    (-1, 3),
    (0, 3),
    (1, 3),
    (2, 2),
    (3, 1),
    (3, 0),
    (3, -1),
    (2, -2),
    (1, -3),
    (0, -3),
    (-1, -3),
    (-2, -2),
    (-3, -1),
];

#[derive(Clone, Copy, Debug)]
pub struct DetectorConfig {
    /// Intensity delta (of 255) a ring sample must clear against the center.
    pub threshold: i32,
    /// Ring samples that must agree before the pixel counts as a corner.
    pub min_arc: u8,
    /// Scan every n-th row/column.
    pub scan_stride: usize,
    /// Pixels skipped at each image edge; must cover the sampling ring.
    pub border: usize,
    /// Non-maximum suppression cell size in pixels.
    pub grid_size: usize,
    /// Hard cap on the number of returned keypoints.
    pub max_features: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 20,
            min_arc: 12,
            scan_stride: 3,
            border: 10,
            grid_size: 8,
            max_features: 1000,
        }
    }
}

/// Detect corners in a `width`×`height` luma buffer.
///
/// Deterministic: identical buffers yield identical keypoint sets, in
/// row-major suppression-cell order. At most one keypoint (the
/// highest-scoring) survives per grid cell.
pub fn detect_features(
    gray: &[u8],
    width: usize,
    height: usize,
    config: &DetectorConfig,
) -> Vec<Feature> {
    if width == 0 || height == 0 || gray.len() < width * height {
        return Vec::new();
    }
    if height <= 2 * config.border || width <= 2 * config.border {
        return Vec::new();
    }

    let cells_x = width / config.grid_size + 1;
    let cells_y = height / config.grid_size + 1;
    let mut grid_best: Vec<Option<Feature>> = vec![None; cells_x * cells_y];

    let mut y = config.border;
    while y < height - config.border {
        let mut x = config.border;
        while x < width - config.border {
            let center = gray[y * width + x] as i32;

            let mut brighter = 0u8;
            let mut darker = 0u8;
            for &(dx, dy) in CIRCLE.iter() {
                let sx = (x as i32 + dx) as usize;
                let sy = (y as i32 + dy) as usize;
                let v = gray[sy * width + sx] as i32;
                if v > center + config.threshold {
                    brighter += 1;
                }
                if v < center - config.threshold {
                    darker += 1;
                }
            }

            if brighter >= config.min_arc || darker >= config.min_arc {
                let score = brighter.max(darker);
                let cell = (y / config.grid_size) * cells_x + (x / config.grid_size);
                let replace = match grid_best[cell] {
                    Some(existing) => existing.score < score,
                    None => true,
                };
                if replace {
                    grid_best[cell] = Some(Feature { x: x as u32, y: y as u32, score });
                }
            }

            x += config.scan_stride;
        }
        y += config.scan_stride;
    }

    let mut features: Vec<Feature> = grid_best.into_iter().flatten().collect();
    features.truncate(config.max_features);
    features
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(width: usize, height: usize) -> Vec<u8> {
        vec![128u8; width * height]
    }

    /// Paint a small bright blob. A blob smaller than the sampling ring
    /// makes every ring sample darker than the center, a maximal corner.
    fn paint_blob(img: &mut [u8], width: usize, x0: usize, y0: usize, side: usize) {
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                img[y * width + x] = 255;
            }
        }
    }

    #[test]
    fn test_blank_image_has_no_features() {
        let img = blank(64, 64);
        assert!(detect_features(&img, 64, 64, &DetectorConfig::default()).is_empty());
    }

    #[test]
    fn test_detects_bright_blob() {
        let mut img = blank(64, 64);
        // Centered at (25, 25), which lies on the scan lattice.
        paint_blob(&mut img, 64, 24, 24, 3);
        let features = detect_features(&img, 64, 64, &DetectorConfig::default());
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].x, 25);
        assert_eq!(features[0].y, 25);
        assert_eq!(features[0].score, 16);
    }

    #[test]
    fn test_deterministic_output() {
        let mut img = blank(64, 64);
        paint_blob(&mut img, 64, 24, 24, 3);
        paint_blob(&mut img, 64, 40, 32, 3);
        let config = DetectorConfig::default();
        let a = detect_features(&img, 64, 64, &config);
        let b = detect_features(&img, 64, 64, &config);
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_respects_border_margin() {
        let mut img = blank(64, 64);
        for y in (1..60).step_by(8) {
            for x in (1..60).step_by(8) {
                paint_blob(&mut img, 64, x, y, 3);
            }
        }
        let config = DetectorConfig::default();
        let features = detect_features(&img, 64, 64, &config);
        assert!(!features.is_empty());
        for f in features {
            assert!(f.x as usize >= config.border);
            assert!(f.y as usize >= config.border);
            assert!((f.x as usize) < 64 - config.border);
            assert!((f.y as usize) < 64 - config.border);
        }
    }

    #[test]
    fn test_one_feature_per_grid_cell_and_cap() {
        let mut img = blank(128, 128);
        for y in (8..116).step_by(8) {
            for x in (8..116).step_by(8) {
                paint_blob(&mut img, 128, x, y, 4);
            }
        }
        let config = DetectorConfig { max_features: 50, ..Default::default() };
        let features = detect_features(&img, 128, 128, &config);
        assert!(features.len() <= 50);
        assert!(!features.is_empty());

        // No two features share a suppression cell.
        let mut cells: Vec<(u32, u32)> = features
            .iter()
            .map(|f| (f.x / config.grid_size as u32, f.y / config.grid_size as u32))
            .collect();
        cells.sort_unstable();
        cells.dedup();
        assert_eq!(cells.len(), features.len());
    }

    #[test]
    fn test_undersized_buffer_yields_nothing() {
        let img = blank(32, 32);
        assert!(detect_features(&img[..100], 64, 64, &DetectorConfig::default()).is_empty());
    }
}

// Patch-based feature matching between consecutive frames. Per-frame cost
// is bounded by subsampling the keypoint set, a fixed search window with a
// coarse scan stride, and early termination of the SSD accumulation.

use crate::types::{Feature, Match};

#[derive(Clone, Copy, Debug)]
pub struct TrackerConfig {
    /// Half-extent of the square search window in the current frame.
    pub search_radius: i32,
    /// Scan stride inside the search window.
    pub search_stride: i32,
    /// Half-extent of the comparison patch.
    pub patch_radius: i32,
    /// SSD ceiling: candidates at or above this are rejected, and the
    /// accumulation aborts early once it is crossed.
    pub max_ssd: f64,
    /// Keypoints to track per frame; larger input sets are subsampled.
    pub target_tracked: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            search_radius: 12,
            search_stride: 3,
            patch_radius: 3,
            max_ssd: 2000.0,
            target_tracked: 300,
        }
    }
}

/// For each (subsampled) previous-frame keypoint, find its best SSD match
/// in the current frame. Unmatched keypoints are dropped, not errors.
pub fn track_features(
    prev_gray: &[u8],
    curr_gray: &[u8],
    width: usize,
    height: usize,
    prev_features: &[Feature],
    config: &TrackerConfig,
) -> Vec<Match> {
    let mut matches = Vec::new();
    if prev_features.is_empty() {
        return matches;
    }

    let r = config.patch_radius;
    let patch_len = ((2 * r + 1) * (2 * r + 1)) as usize;
    let mut ref_patch = vec![0u8; patch_len];
    let mut cand_patch = vec![0u8; patch_len];

    let step = (prev_features.len() / config.target_tracked).max(1);

    for feature in prev_features.iter().step_by(step) {
        let px = feature.x as i32;
        let py = feature.y as i32;
        if !in_patch_bounds(px, py, width, height, r) {
            continue;
        }

        extract_patch(prev_gray, width, px, py, r, &mut ref_patch);

        let mut best_ssd = f64::MAX;
        let mut best_x = px;
        let mut best_y = py;

        let mut dy = -config.search_radius;
        while dy <= config.search_radius {
            let mut dx = -config.search_radius;
            while dx <= config.search_radius {
                let cx = px + dx;
                let cy = py + dy;
                if !in_patch_bounds(cx, cy, width, height, r) {
                    dx += config.search_stride;
                    continue;
                }

                extract_patch(curr_gray, width, cx, cy, r, &mut cand_patch);
                let ssd = ssd_with_ceiling(&ref_patch, &cand_patch, config.max_ssd);
                if ssd < best_ssd {
                    best_ssd = ssd;
                    best_x = cx;
                    best_y = cy;
                }

                dx += config.search_stride;
            }
            dy += config.search_stride;
        }

        if best_ssd < config.max_ssd {
            matches.push(Match {
                prev: *feature,
                curr: Feature { x: best_x as u32, y: best_y as u32, score: 0 },
            });
        }
    }

    matches
}

/// Patch coordinates must stay inside `[patch_radius+1, dim-patch_radius-1)`.
fn in_patch_bounds(x: i32, y: i32, width: usize, height: usize, r: i32) -> bool {
    x >= r + 1 && x < width as i32 - r - 1 && y >= r + 1 && y < height as i32 - r - 1
}

fn extract_patch(img: &[u8], width: usize, cx: i32, cy: i32, r: i32, out: &mut [u8]) {
    let mut idx = 0;
    for y in (cy - r)..=(cy + r) {
        let row = y as usize * width;
        for x in (cx - r)..=(cx + r) {
            out[idx] = img[row + x as usize];
            idx += 1;
        }
    }
}

/// Sum of squared differences with early abort once the partial sum
/// crosses the ceiling. The abort only bounds cost; acceptance is decided
/// against the same ceiling by the caller.
fn ssd_with_ceiling(a: &[u8], b: &[u8], ceiling: f64) -> f64 {
    let mut ssd = 0.0;
    for (&pa, &pb) in a.iter().zip(b.iter()) {
        let diff = pa as f64 - pb as f64;
        ssd += diff * diff;
        if ssd > ceiling {
            break;
        }
    }
    ssd
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: usize, height: usize) -> Vec<u8> {
        // Textured pattern so patches are distinctive.
        let mut img = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                img[y * width + x] = ((x * 7 + y * 13) % 251) as u8;
            }
        }
        img
    }

    #[test]
    fn test_identical_frames_match_in_place() {
        let img = gradient_image(64, 64);
        let features = vec![
            Feature { x: 20, y: 20, score: 14 },
            Feature { x: 40, y: 33, score: 12 },
        ];
        let matches =
            track_features(&img, &img, 64, 64, &features, &TrackerConfig::default());
        assert_eq!(matches.len(), 2);
        for m in matches {
            assert_eq!(m.prev.x, m.curr.x);
            assert_eq!(m.prev.y, m.curr.y);
        }
    }

    #[test]
    fn test_recovers_known_translation() {
        // Shift the pattern right by 3 px (one search stride step).
        let width = 64;
        let prev = gradient_image(width, 64);
        let mut curr = vec![0u8; prev.len()];
        for y in 0..64 {
            for x in 0..width {
                let sx = if x >= 3 { x - 3 } else { 0 };
                curr[y * width + x] = prev[y * width + sx];
            }
        }
        let features = vec![Feature { x: 30, y: 30, score: 14 }];
        let matches =
            track_features(&prev, &curr, width, 64, &features, &TrackerConfig::default());
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].curr.x, 33);
        assert_eq!(matches[0].curr.y, 30);
    }

    #[test]
    fn test_no_match_above_ssd_ceiling() {
        let prev = gradient_image(64, 64);
        // Uncorrelated noise-like frame.
        let mut curr = vec![0u8; prev.len()];
        for (i, v) in curr.iter_mut().enumerate() {
            *v = ((i * 101 + 37) % 255) as u8;
        }
        let features = vec![Feature { x: 30, y: 30, score: 14 }];
        let matches =
            track_features(&prev, &curr, 64, 64, &features, &TrackerConfig::default());
        assert!(matches.is_empty());
    }

    #[test]
    fn test_edge_features_skipped() {
        let img = gradient_image(64, 64);
        let features = vec![Feature { x: 2, y: 2, score: 14 }];
        let matches =
            track_features(&img, &img, 64, 64, &features, &TrackerConfig::default());
        assert!(matches.is_empty());
    }

    #[test]
    fn test_large_sets_are_subsampled() {
        let img = gradient_image(256, 256);
        let features: Vec<Feature> = (0..900)
            .map(|i| Feature { x: 20 + (i % 30) * 7, y: 20 + (i / 30) * 7, score: 12 })
            .collect();
        let config = TrackerConfig::default();
        let matches = track_features(&img, &img, 256, 256, &features, &config);
        // Stride 3 over 900 keypoints: at most ~300 tracked.
        assert!(matches.len() <= config.target_tracked);
        assert!(!matches.is_empty());
    }
}

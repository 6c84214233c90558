//! Occlusion mask applied before frames reach the detector.
//!
//! The mask hides regions the detector should never see (timestamps, busy
//! roads at the edge of frame). It is painted destructively; the caller keeps
//! an unmasked clone when the saved output should not show it.

use serde::Deserialize;

use super::surface::{Surface, MASK_FILL};

/// Normalised mask vertex. `start` opens a new closed sub-path.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct MaskPoint {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub start: bool,
}

/// Paint the configured occlusion polygon onto `surface`.
///
/// A mask with fewer than three points is a no-op. Points are visited in
/// order; the first point, and any point flagged `start`, begins a new
/// closed sub-path.
pub fn apply_mask(surface: &mut Surface, mask: &[MaskPoint]) {
    if mask.len() < 3 {
        return;
    }

    let width = surface.width() as f32;
    let height = surface.height() as f32;

    let mut paths: Vec<Vec<(f32, f32)>> = Vec::new();
    for (idx, point) in mask.iter().enumerate() {
        if idx == 0 || point.start {
            paths.push(Vec::new());
        }
        if let Some(path) = paths.last_mut() {
            path.push((point.x * width, point.y * height));
        }
    }

    surface.fill_paths(&paths, MASK_FILL);
}

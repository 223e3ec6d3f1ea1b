//! Page geometry: tiling a page into fixed-height horizontal bands.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Height of one label on the physical sheet, in points.
pub const DEFAULT_BAND_HEIGHT: f64 = 209.1;

/// Remaining height below this is floating-point residue, not a band.
const RESIDUAL_EPSILON: f64 = 1e-6;

/// Smallest accepted band height, in points.
pub const MIN_BAND_HEIGHT: f64 = 1.0;

/// Edges closer than this are the same edge.
const EDGE_TOLERANCE: f64 = 1e-9;

/// A crop window on a page, in points, relative to the page's lower-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    /// Create a new rectangle.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Upper edge.
    pub fn top(&self) -> f64 {
        self.y + self.height
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Shift the rectangle by an offset.
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Point containment. Half-open vertically so that a point on the
    /// boundary between two stacked bands belongs to exactly one of them.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y < self.top()
    }

    /// Whether two rectangles share a region of positive area.
    ///
    /// Edges within rounding distance of each other count as shared, not
    /// overlapping.
    pub fn overlaps(&self, other: &CropRect) -> bool {
        self.x < other.right() - EDGE_TOLERANCE
            && other.x < self.right() - EDGE_TOLERANCE
            && self.y < other.top() - EDGE_TOLERANCE
            && other.y < self.top() - EDGE_TOLERANCE
    }

    /// PDF rectangle form `[llx lly urx ury]`.
    pub fn corners(&self) -> [f64; 4] {
        [self.x, self.y, self.right(), self.top()]
    }

    /// Build from PDF `[llx lly urx ury]`, normalizing swapped corners.
    pub fn from_corners(corners: [f64; 4]) -> Self {
        let [x0, y0, x1, y1] = corners;
        let (llx, urx) = (x0.min(x1), x0.max(x1));
        let (lly, ury) = (y0.min(y1), y0.max(y1));
        Self::new(llx, lly, urx - llx, ury - lly)
    }
}

/// Check that a band height can tile a page.
///
/// Heights below [`MIN_BAND_HEIGHT`] are rejected along with non-finite ones.
pub fn validate_band_height(band_height: f64) -> Result<f64> {
    if band_height.is_finite() && band_height >= MIN_BAND_HEIGHT {
        Ok(band_height)
    } else {
        Err(Error::InvalidBandHeight(band_height))
    }
}

/// Compute the crop rectangles covering a page, top band first.
///
/// Band `i` spans from `page_height - (i + 1) * band_height` (clamped at the
/// page bottom) up to `page_height - i * band_height`. Both edges come from
/// the band index, so a band's bottom and the next band's top are the same
/// value and only the last band can be shorter than nominal. An empty,
/// degenerate or non-finite page yields no bands.
pub fn slice_rects(page_height: f64, page_width: f64, band_height: f64) -> Vec<CropRect> {
    if !page_height.is_finite() || page_height <= 0.0 || validate_band_height(band_height).is_err()
    {
        return Vec::new();
    }

    let width = page_width.max(0.0);
    let edge = |index: usize| page_height - index as f64 * band_height;

    (0..)
        .map_while(|index| {
            let top = edge(index);
            (top > RESIDUAL_EPSILON).then(|| {
                let bottom = edge(index + 1).max(0.0);
                CropRect::new(0.0, bottom, width, top - bottom)
            })
        })
        .collect()
}

/// Number of bands `slice_rects` produces for a page.
pub fn band_count(page_height: f64, band_height: f64) -> usize {
    slice_rects(page_height, 0.0, band_height).len()
}

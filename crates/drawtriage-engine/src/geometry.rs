//! Post-transform vertex geometry: clip-space gather and NDC bounds.

use drawtriage_state::Viewport;

/// Normalized-device-coordinate positions of every emitted post-transform
/// vertex, across all instances and multiview views. Vertices with w == 0
/// are excluded at construction (the perspective divide is undefined for
/// them) and counted separately.
#[derive(Debug, Clone, Default)]
pub struct NdcSet {
    pub positions: Vec<[f32; 3]>,
    /// Total clip-space vertices gathered, including excluded ones.
    pub clip_count: usize,
    pub zero_w_count: usize,
}

impl NdcSet {
    pub fn from_clip(clip: &[[f32; 4]]) -> Self {
        let mut positions = Vec::with_capacity(clip.len());
        let mut zero_w_count = 0;
        for v in clip {
            if v[3] == 0.0 {
                zero_w_count += 1;
                continue;
            }
            positions.push([v[0] / v[3], v[1] / v[3], v[2] / v[3]]);
        }
        NdcSet {
            positions,
            clip_count: clip.len(),
            zero_w_count,
        }
    }

    pub fn all_w_zero(&self) -> bool {
        self.clip_count > 0 && self.zero_w_count == self.clip_count
    }

    fn component_bounds(&self, index: usize) -> Option<(f32, f32)> {
        let mut bounds: Option<(f32, f32)> = None;
        for p in &self.positions {
            let value = p[index];
            if !value.is_finite() {
                continue;
            }
            bounds = Some(match bounds {
                None => (value, value),
                Some((lo, hi)) => (lo.min(value), hi.max(value)),
            });
        }
        bounds
    }

    /// Finite-only min/max of NDC z. `None` when no finite vertex exists.
    pub fn z_bounds(&self) -> Option<(f32, f32)> {
        self.component_bounds(2)
    }

    /// Finite-only bounds of NDC x and y.
    pub fn xy_bounds(&self) -> Option<XyBounds> {
        let (min_x, max_x) = self.component_bounds(0)?;
        let (min_y, max_y) = self.component_bounds(1)?;
        Some(XyBounds {
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XyBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl XyBounds {
    /// Screen-space bounding box area in pixels under `viewport`. NDC xy
    /// spans 2 units across the viewport in each axis.
    pub fn screen_area(&self, viewport: &Viewport) -> f32 {
        let width = (self.max_x - self.min_x) * 0.5 * viewport.width.abs();
        let height = (self.max_y - self.min_y) * 0.5 * viewport.height.abs();
        width * height
    }

    /// Whether the whole box lies within the canonical clip volume in xy.
    pub fn inside_clip_volume(&self) -> bool {
        self.min_x >= -1.0 && self.max_x <= 1.0 && self.min_y >= -1.0 && self.max_y <= 1.0
    }

    /// Whether any extent exceeds `scale` times the canonical clip volume.
    pub fn exceeds_guard_band(&self, scale: f32) -> bool {
        self.min_x < -scale
            || self.max_x > scale
            || self.min_y < -scale
            || self.max_y > scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_w_vertices_are_excluded() {
        let set = NdcSet::from_clip(&[
            [1.0, 2.0, 0.5, 2.0],
            [0.0, 0.0, 0.0, 0.0],
            [-1.0, -2.0, 1.0, 1.0],
        ]);
        assert_eq!(set.positions.len(), 2);
        assert_eq!(set.zero_w_count, 1);
        assert_eq!(set.positions[0], [0.5, 1.0, 0.25]);
    }

    #[test]
    fn all_w_zero_does_not_panic_on_bounds() {
        let set = NdcSet::from_clip(&[[1.0, 1.0, 1.0, 0.0], [2.0, 2.0, 2.0, 0.0]]);
        assert!(set.all_w_zero());
        assert_eq!(set.z_bounds(), None);
        assert!(set.xy_bounds().is_none());
    }

    #[test]
    fn non_finite_components_are_skipped_in_bounds() {
        let set = NdcSet::from_clip(&[
            [0.0, 0.0, f32::NAN, 1.0],
            [0.0, 0.0, 0.25, 1.0],
            [0.0, 0.0, 0.75, 1.0],
        ]);
        assert_eq!(set.z_bounds(), Some((0.25, 0.75)));
    }

    #[test]
    fn screen_area_uses_viewport_extent() {
        let bounds = XyBounds {
            min_x: -0.5,
            max_x: 0.5,
            min_y: -0.5,
            max_y: 0.5,
        };
        let viewport = Viewport {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        assert_eq!(bounds.screen_area(&viewport), 2500.0);
        assert!(bounds.inside_clip_volume());
        assert!(!bounds.exceeds_guard_band(16.0));
    }
}

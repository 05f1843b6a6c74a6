//! Focused depth-test checker, entered when the depth overlay reports
//! that no pixel of the draw passes.

use drawtriage_replay::{DebugOverlay, ReplayController, ReplayError};
use drawtriage_state::{depth_view, raster_view, CompareFunc, PipelineStage, RasterView};

use crate::analysis::Analysis;
use crate::prior::PrevTest;
use crate::trail::ResultStep;

impl<'r, R: ReplayController> Analysis<'r, R> {
    pub(crate) fn check_failed_depth(&mut self) -> Result<(), ReplayError> {
        self.display.overlay = DebugOverlay::Depth;
        self.trail.push(
            ResultStep::text(
                "The depth test overlay shows red, so the draw is completely failing a \
                 depth test.",
            )
            .with_display(&self.display),
        );

        let depth = depth_view(&self.snapshot);
        let raster = raster_view(&self.snapshot);
        let api = self.snapshot.api;

        if !depth.test_enabled {
            self.trail.push(
                ResultStep::text(
                    "The depth test is disabled, yet the depth overlay reports every \
                     pixel failing.\n\nPlease check your depth-stencil setup and report \
                     an issue so this can be investigated.",
                )
                .with_stage(PipelineStage::DepthTest),
            );
            return Ok(());
        }

        if depth.function == CompareFunc::Never {
            self.trail.push(
                ResultStep::text(
                    "The depth comparison function is Never, so the depth test always \
                     fails for this draw.",
                )
                .with_stage(PipelineStage::DepthTest),
            );
            return Ok(());
        }

        let vert_bounds = self.ndc.z_bounds();

        // Near/far clipping in NDC z, only when out-of-range depth is
        // actually clipped.
        if raster.depth_clip {
            let state = RasterView::clip_state_name(api);
            if let Some((lo, hi)) = vert_bounds {
                if hi <= depth.ndc_min {
                    self.trail.push(
                        ResultStep::text(format!(
                            "All of the draw's vertices are in front of the near plane \
                             (NDC z at most {hi}), and the current {state} state means \
                             they get clipped.",
                        ))
                        .with_stage(PipelineStage::Rasterizer)
                        .with_mesh(self.postvs_stage),
                    );
                    return Ok(());
                }
                if lo >= depth.ndc_max {
                    self.trail.push(
                        ResultStep::text(format!(
                            "All of the draw's vertices are behind the far plane (NDC z \
                             at least {lo}), and the current {state} state means they \
                             get clipped.",
                        ))
                        .with_stage(PipelineStage::Rasterizer)
                        .with_mesh(self.postvs_stage),
                    );
                    return Ok(());
                }
            }
        }

        if let Some(bounds) = depth.bounds {
            if self.check_depth_bounds(&depth, bounds, vert_bounds) {
                return Ok(());
            }
        }

        if depth.function == CompareFunc::NotEqual {
            self.trail.push(
                ResultStep::text(
                    "The depth comparison function is Not-Equal. That is not invalid, \
                     but it is unusual and fails whenever the incoming depth exactly \
                     matches the stored depth.",
                )
                .with_stage(PipelineStage::DepthTest),
            );
        }

        self.check_previous_contents(PrevTest::Depth {
            function: depth.function,
        })
    }

    /// Depth-bounds test vs the depths the draw can actually produce.
    /// True when a terminal conclusion was appended.
    fn check_depth_bounds(
        &mut self,
        depth: &drawtriage_state::DepthView,
        bounds: drawtriage_state::DepthBoundsRange,
        vert_bounds: Option<(f32, f32)>,
    ) -> bool {
        let viewport = self.snapshot.viewport;
        let (vp_lo, vp_hi) = (
            viewport.min_depth.min(viewport.max_depth),
            viewport.min_depth.max(viewport.max_depth),
        );

        // The whole viewport depth range outside the bounds fails any
        // geometry.
        if vp_lo > bounds.max || vp_hi < bounds.min {
            self.trail.push(
                ResultStep::text(format!(
                    "The viewport depth range ({vp_lo} to {vp_hi}) lies entirely \
                     outside the enabled depth bounds range ({} to {}), so every pixel \
                     fails the depth bounds test.",
                    bounds.min, bounds.max
                ))
                .with_stage(PipelineStage::ViewportsScissors),
            );
            return true;
        }

        let Some((lo, hi)) = vert_bounds else {
            return false;
        };

        // Viewport-transformed depth of the draw's own vertices.
        let span = depth.ndc_max - depth.ndc_min;
        let map = |z: f32| {
            let t = ((z - depth.ndc_min) / span).clamp(0.0, 1.0);
            viewport.min_depth + t * (viewport.max_depth - viewport.min_depth)
        };
        let (d0, d1) = (map(lo), map(hi));
        let (draw_lo, draw_hi) = (d0.min(d1), d0.max(d1));
        if draw_lo > bounds.max || draw_hi < bounds.min {
            self.trail.push(
                ResultStep::text(format!(
                    "After the viewport transform the draw covers the viewport depth \
                     range {draw_lo} to {draw_hi}, entirely outside the enabled depth \
                     bounds range ({} to {}).",
                    bounds.min, bounds.max
                ))
                .with_stage(PipelineStage::Rasterizer)
                .with_mesh(self.postvs_stage),
            );
            return true;
        }

        // Raw NDC z of the vertices vs the bounds.
        if lo > bounds.max || hi < bounds.min {
            self.trail.push(
                ResultStep::text(format!(
                    "All of the draw's vertices (NDC z {lo} to {hi}) are outside the \
                     enabled depth bounds range ({} to {}).",
                    bounds.min, bounds.max
                ))
                .with_stage(PipelineStage::Rasterizer)
                .with_mesh(self.postvs_stage),
            );
            return true;
        }
        false
    }
}

//! Offscreen branch: the highlight overlay shows nothing, so the draw
//! never rasterizes. Works down from coarse render-area state to the
//! post-transform geometry itself. The viewport was already vetted by
//! the output-area sanity stage before either branch runs.

use drawtriage_replay::{ReplayController, ReplayError};
use drawtriage_state::{raster_view, PipelineStage};

use crate::analysis::{Analysis, GUARD_BAND_SCALE};
use crate::trail::{Flow, ResultStep};

impl<'r, R: ReplayController> Analysis<'r, R> {
    pub(crate) fn check_offscreen(&mut self) -> Result<Flow, ReplayError> {
        self.trail.push(ResultStep::text(
            "The highlight drawcall overlay shows nothing for this draw, meaning it is \
             off-screen.",
        ));

        if let Ok(vk) = self.snapshot.vulkan() {
            let area = vk.render_area;
            if area.width == 0 || area.height == 0 {
                self.trail.push(
                    ResultStep::text(format!(
                        "The render pass render area is empty ({} x {} at {},{}), so \
                         nothing can be rendered.",
                        area.width, area.height, area.x, area.y
                    ))
                    .with_stage(PipelineStage::ViewportsScissors),
                );
                return Ok(Flow::Stop);
            }
            if let Some(desc) = self.target_desc(0) {
                if area.x >= desc.width as i32 || area.y >= desc.height as i32 {
                    self.trail.push(
                        ResultStep::text(format!(
                            "The render pass render area at {},{} lies entirely outside \
                             the {} x {} render target.",
                            area.x, area.y, desc.width, desc.height
                        ))
                        .with_stage(PipelineStage::ViewportsScissors),
                    );
                    return Ok(Flow::Stop);
                }
            }
        }

        if raster_view(&self.snapshot).discard {
            self.trail.push(
                ResultStep::text(
                    "Rasterizer discard is enabled. This state disables rasterization \
                     for the whole draw.",
                )
                .with_stage(PipelineStage::Rasterizer),
            );
            return Ok(Flow::Stop);
        }

        if !self.snapshot.shaders.any_pre_rasterization() {
            self.trail.push(
                ResultStep::text(
                    "No vertex or geometry-producing shader is bound, so there is \
                     nothing to rasterize.",
                )
                .with_stage(PipelineStage::VertexShader),
            );
            return Ok(Flow::Stop);
        }
        if !self.snapshot.position_output {
            self.trail.push(
                ResultStep::text(
                    "The last pre-rasterization shader stage does not write a position \
                     output, so nothing can be rasterized.",
                )
                .with_stage(PipelineStage::VertexShader),
            );
            return Ok(Flow::Stop);
        }

        if self.ndc.all_w_zero() {
            self.trail.push(
                ResultStep::text(
                    "Every post-transform vertex has w == 0, making the perspective \
                     divide invalid for the whole draw. The vertex inputs are the \
                     likely culprit.",
                )
                .with_mesh(self.postvs_stage),
            );
            return self.validate_vertex_input();
        }

        let Some(bounds) = self.ndc.xy_bounds() else {
            self.trail.push(
                ResultStep::text(
                    "I couldn't fetch any post-transform vertex positions for this \
                     draw, so I'll look at the vertex inputs directly.",
                )
                .with_mesh(self.postvs_stage),
            );
            return self.validate_vertex_input();
        };

        let area = bounds.screen_area(&self.snapshot.viewport);
        let sub_pixel_onscreen = area < 1.0 && bounds.inside_clip_volume();
        if sub_pixel_onscreen || bounds.exceeds_guard_band(GUARD_BAND_SCALE) {
            let shape = if sub_pixel_onscreen {
                format!("covers under a pixel ({area:.4} px^2) despite being on screen")
            } else {
                format!(
                    "extends far beyond the clip volume (x {} to {}, y {} to {})",
                    bounds.min_x, bounds.max_x, bounds.min_y, bounds.max_y
                )
            };
            self.trail.push(
                ResultStep::text(format!(
                    "The post-transform geometry looks broken: it {shape}. The vertex \
                     inputs are the likely culprit.",
                ))
                .with_mesh(self.postvs_stage),
            );
            return self.validate_vertex_input();
        }

        self.trail.push(
            ResultStep::text(format!(
                "The draw is legitimately off-screen: its NDC bounds (x {} to {}, y {} \
                 to {}) are reasonable but fall outside the visible region. Check the \
                 transforms feeding the vertex shader.",
                bounds.min_x, bounds.max_x, bounds.min_y, bounds.max_y
            ))
            .with_mesh(self.postvs_stage),
        );
        Ok(Flow::Stop)
    }
}

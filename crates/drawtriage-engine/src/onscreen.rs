//! Onscreen branch: the draw rasterizes somewhere, so walk the
//! test/blend stages looking for the one rejecting every fragment.

use drawtriage_replay::{CompType, DebugOverlay, ReplayController, ReplayError};
use drawtriage_state::{raster_view, scissor_enabled, BackendState, PipelineStage};

use crate::analysis::{Analysis, MAX_HISTORY_PROBES};
use crate::trail::{Flow, ResultStep};

/// Deterministic in-place shuffle (xorshift32, fixed seed) so repeated
/// analyses probe the same pixels and produce identical trails.
fn shuffle_pixels(pixels: &mut [(u32, u32)]) {
    let mut state: u32 = 0x9e37_79b9;
    for i in (1..pixels.len()).rev() {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let j = state as usize % (i + 1);
        pixels.swap(i, j);
    }
}

impl<'r, R: ReplayController> Analysis<'r, R> {
    pub(crate) fn check_onscreen(&mut self) -> Result<Flow, ReplayError> {
        self.display.overlay = DebugOverlay::Drawcall;
        self.trail.push(
            ResultStep::text(
                "The highlight drawcall overlay shows the draw, meaning it is rendering \
                 but failing some tests.",
            )
            .with_display(&self.display),
        );

        // Overlay walk, strict order. A stage with zero passing pixels
        // hands off to its focused checker and terminates the branch.
        if scissor_enabled(&self.snapshot) && !self.scissor_overlay_passes()? {
            self.report_failed_scissor();
            return Ok(Flow::Stop);
        }
        if !self.overlay_passes(DebugOverlay::BackfaceCull)? {
            self.report_failed_backface_culling();
            return Ok(Flow::Stop);
        }
        if !self.overlay_passes(DebugOverlay::Depth)? {
            self.check_failed_depth()?;
            return Ok(Flow::Stop);
        }
        if !self.overlay_passes(DebugOverlay::Stencil)? {
            self.check_failed_stencil()?;
            return Ok(Flow::Stop);
        }

        // Every test passes at least partially; look at state that can
        // silently swallow the output without failing an overlay.
        if self.check_sample_state().stopped() {
            return Ok(Flow::Stop);
        }
        if self.check_write_masks().stopped() {
            return Ok(Flow::Stop);
        }
        self.check_blend_heuristic();
        if self.check_clear_before_draw()?.stopped() {
            return Ok(Flow::Stop);
        }
        self.probe_pixel_history()?;

        Ok(Flow::Continue)
    }

    fn report_failed_scissor(&mut self) {
        self.display.overlay = DebugOverlay::ViewportScissor;
        let viewport = self.snapshot.viewport;
        let message = match self.snapshot.scissor() {
            Some(rect) => format!(
                "The scissor overlay shows no pixels passing, so the draw is entirely \
                 scissored out.\n\nThe scissor rect is {},{} to {},{} ({} x {}), the \
                 viewport {},{} to {},{}.",
                rect.x,
                rect.y,
                rect.x + rect.width,
                rect.y + rect.height,
                rect.width,
                rect.height,
                viewport.x,
                viewport.y,
                viewport.x + viewport.width,
                viewport.y + viewport.height
            ),
            None => "The scissor overlay shows no pixels passing, so the draw is \
                     entirely scissored out."
                .to_string(),
        };
        self.trail.push(
            ResultStep::text(message)
                .with_display(&self.display)
                .with_stage(PipelineStage::ViewportsScissors),
        );
    }

    fn report_failed_backface_culling(&mut self) {
        self.display.overlay = DebugOverlay::BackfaceCull;
        let raster = raster_view(&self.snapshot);
        let winding = if raster.front_ccw {
            "counter-clockwise"
        } else {
            "clockwise"
        };
        self.trail.push(
            ResultStep::text(format!(
                "The backface culling overlay shows red, so the draw is completely \
                 backface culled.\n\nCheck your polygon winding and front-facing state \
                 ({}, front faces are {}).",
                raster.cull_mode, winding
            ))
            .with_display(&self.display)
            .with_stage(PipelineStage::Rasterizer),
        );
    }

    /// Sample mask and (GL) sample coverage: a zero mask or a computed
    /// zero coverage removes every sample before any test runs.
    fn check_sample_state(&mut self) -> Flow {
        if self.snapshot.sample_mask == Some(0) {
            self.trail.push(
                ResultStep::text(
                    "The sample mask is 0, so no sample of any fragment survives. \
                     Nothing will be written.",
                )
                .with_stage(PipelineStage::SampleMask),
            );
            return Flow::Stop;
        }

        if let BackendState::Gl(gl) = &self.snapshot.backend {
            if gl.sample.coverage_enabled {
                let effective = if gl.sample.coverage_invert {
                    1.0 - gl.sample.coverage_value
                } else {
                    gl.sample.coverage_value
                };
                if effective <= 0.0 {
                    self.trail.push(
                        ResultStep::text(format!(
                            "GL_SAMPLE_COVERAGE is enabled and the effective coverage \
                             value computes to 0 (value {}, invert {}). No samples \
                             survive.",
                            gl.sample.coverage_value, gl.sample.coverage_invert
                        ))
                        .with_stage(PipelineStage::SampleMask),
                    );
                    return Flow::Stop;
                }
            }
        }
        Flow::Continue
    }

    /// Color write masks across all bound targets. All-zero masks with
    /// depth writes also off means the draw cannot change anything.
    fn check_write_masks(&mut self) -> Flow {
        let color_count = self.snapshot.color_targets.len();
        if color_count == 0 {
            return Flow::Continue;
        }
        let masks: Vec<_> = self
            .snapshot
            .blend_targets
            .iter()
            .take(color_count)
            .map(|b| b.write_mask)
            .collect();
        let zero_targets: Vec<usize> = masks
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_empty())
            .map(|(i, _)| i)
            .collect();

        let depth = drawtriage_state::depth_view(&self.snapshot);
        let depth_writes =
            self.snapshot.depth_target.is_some() && depth.test_enabled && depth.write_enabled;

        if !masks.is_empty() && zero_targets.len() == masks.len() && !depth_writes {
            self.trail.push(
                ResultStep::text(
                    "The color write mask on every bound target is 0 and depth writes \
                     are disabled. Nothing will be written by this draw.",
                )
                .with_stage(PipelineStage::Blending),
            );
            return Flow::Stop;
        }
        if !zero_targets.is_empty() {
            self.trail.push(
                ResultStep::text(format!(
                    "Color target(s) {:?} have a write mask of 0; the draw's output to \
                     them is discarded. Other targets are still written.",
                    zero_targets
                ))
                .with_stage(PipelineStage::Blending),
            );
        }
        Flow::Continue
    }

    /// Blend factor heuristics: a source factor of zero paired with a
    /// destination factor that never reads the source means the shader
    /// output cannot affect the result.
    fn check_blend_heuristic(&mut self) {
        for (index, blend) in self.snapshot.blend_targets.iter().enumerate() {
            if !blend.enabled {
                continue;
            }
            if blend.src_color == drawtriage_state::BlendFactor::Zero
                && !blend.dst_color.references_source()
            {
                self.trail.push(
                    ResultStep::text(format!(
                        "Blending on target {} multiplies the source color by Zero and \
                         the destination factor ({:?}) never reads the source. The \
                         shader's color output is unused. This may be intentional, but \
                         is worth checking.",
                        index, blend.dst_color
                    ))
                    .with_stage(PipelineStage::Blending),
                );
            }
        }
    }

    /// Render the draw over black-cleared and white-cleared backgrounds
    /// and compare one covered pixel against the real target contents: if
    /// all three match, the draw outputs the color that is already there.
    fn check_clear_before_draw(&mut self) -> Result<Flow, ReplayError> {
        let Some(first) = self.targets.first().copied() else {
            return Ok(Flow::Continue);
        };
        if !first.format.has_depth() && self.snapshot.color_targets.is_empty() {
            return Ok(Flow::Continue);
        }

        let Some((x, y)) = self.first_covered_pixel()? else {
            self.trail.push(ResultStep::text(
                "I wanted to compare the draw's output against cleared backgrounds but \
                 couldn't find a covered pixel!\n\nThis is a bug, please report it so it \
                 can be investigated.",
            ));
            return Ok(Flow::Continue);
        };

        let current = self.replay.pick_pixel(
            first.resource,
            x,
            y,
            self.display.subresource,
            CompType::Typeless,
        )?;

        let on_background = |analysis: &mut Self, white: bool| {
            analysis.display.overlay = DebugOverlay::ClearBeforeDraw;
            let level = if white { 1.0 } else { 0.0 };
            analysis.display.background_color = [level, level, level, 1.0];
            let overlay = analysis.render_overlay(DebugOverlay::ClearBeforeDraw)?;
            analysis
                .replay
                .pick_pixel(overlay, x, y, drawtriage_replay::Subresource::default(), CompType::Typeless)
        };
        let on_black = on_background(self, false)?;
        let on_white = on_background(self, true)?;

        if on_black.float_value == on_white.float_value
            && on_black.float_value == current.float_value
        {
            self.display.overlay = DebugOverlay::ClearBeforeDraw;
            self.trail.push(
                ResultStep::text(format!(
                    "At pixel ({x},{y}) the draw outputs exactly the color already in \
                     the target ({:?}), regardless of the background it renders over. \
                     The draw is working but invisible because it writes the same value \
                     that is already there.",
                    current.float_value
                ))
                .with_display(&self.display),
            );
            return Ok(Flow::Stop);
        }
        Ok(Flow::Continue)
    }

    /// Inconclusive state: probe a few covered pixels' histories for
    /// shader discards or invisible-but-passing fragments.
    fn probe_pixel_history(&mut self) -> Result<(), ReplayError> {
        if !self.props.pixel_history {
            return Ok(());
        }
        let Some(first) = self.targets.first().copied() else {
            return Ok(());
        };

        let mut covered = self.covered_pixels()?;
        if covered.is_empty() {
            self.trail.push(ResultStep::text(
                "I tried to run pixel history on the draw to get more information but \
                 couldn't find a pixel covered!\n\nThis is a bug, please report it so it \
                 can be investigated.",
            ));
            return Ok(());
        }
        shuffle_pixels(&mut covered);
        covered.truncate(MAX_HISTORY_PROBES);

        for (x, y) in covered {
            let history = self.replay.pixel_history(
                first.resource,
                x,
                y,
                self.display.subresource,
                CompType::Typeless,
            )?;
            let fragments: Vec<_> = history
                .iter()
                .filter(|h| h.event_id == self.eid)
                .copied()
                .collect();
            if fragments.is_empty() {
                continue;
            }

            if fragments.iter().any(|f| f.passed()) {
                self.trail.push(
                    ResultStep::text(format!(
                        "Pixel history on ({x},{y}) shows a fragment from this draw \
                         passing all tests. The output may simply be invisible, for \
                         example blending that multiplies by a zero alpha.",
                    ))
                    .with_history(self.history_payload(first.resource, x, y, &history)),
                );
                return Ok(());
            }

            let discards = fragments
                .iter()
                .filter(|f| {
                    f.rejected_by
                        .contains(drawtriage_replay::RejectionFlags::SHADER_DISCARD)
                })
                .count();
            if discards == fragments.len() {
                self.trail.push(
                    ResultStep::text(format!(
                        "Pixel history on ({x},{y}) shows all {} of this draw's \
                         fragments discarding themselves in the shader.",
                        fragments.len()
                    ))
                    .with_history(self.history_payload(first.resource, x, y, &history)),
                );
                return Ok(());
            }
        }
        Ok(())
    }

    pub(crate) fn history_payload(
        &self,
        resource: drawtriage_state::ResourceId,
        x: u32,
        y: u32,
        history: &[drawtriage_replay::PixelModification],
    ) -> crate::trail::PixelHistoryPayload {
        crate::trail::PixelHistoryPayload {
            resource,
            x,
            y,
            display: self.display.clone(),
            history: history.to_vec(),
        }
    }
}

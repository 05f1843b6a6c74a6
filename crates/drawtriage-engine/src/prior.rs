//! Prior-contents investigation shared by the depth and stencil
//! checkers: what was in the depth-stencil target before this draw, and
//! which earlier draw put it there.

use tracing::debug;

use drawtriage_replay::{
    CompType, DebugOverlay, ReplayController, ReplayError, Subresource,
};
use drawtriage_state::{
    CompareFunc, EventId, PipelineStage, StencilFaceState,
};

use crate::analysis::Analysis;
use crate::stencil::stencil_passes;
use crate::trail::ResultStep;

/// Which test the prior-contents investigation is explaining.
pub(crate) enum PrevTest {
    Depth { function: CompareFunc },
    Stencil {
        front: StencilFaceState,
        back: StencilFaceState,
    },
}

impl PrevTest {
    fn name(&self) -> &'static str {
        match self {
            PrevTest::Depth { .. } => "depth",
            PrevTest::Stencil { .. } => "stencil",
        }
    }

    fn overlay(&self) -> DebugOverlay {
        match self {
            PrevTest::Depth { .. } => DebugOverlay::Depth,
            PrevTest::Stencil { .. } => DebugOverlay::Stencil,
        }
    }
}

impl<'r, R: ReplayController> Analysis<'r, R> {
    /// Investigate the depth-stencil target's contents at draw time:
    /// find the last clear, test the clear value against the failing
    /// comparison, then attribute the stored value via pixel history.
    /// Always ends the checker's branch with a step.
    pub(crate) fn check_previous_contents(&mut self, test: PrevTest) -> Result<(), ReplayError> {
        let Some(depth_target) = self.snapshot.depth_target else {
            let stage = match &test {
                PrevTest::Depth { .. } => PipelineStage::DepthTest,
                PrevTest::Stencil { .. } => PipelineStage::StencilTest,
            };
            self.trail.push(
                ResultStep::text(format!(
                    "No depth-stencil target is bound, yet the {} test fails every \
                     pixel. Normally the test should always pass in this case.\n\n\
                     Sorry, I couldn't figure out the exact problem. Please check your \
                     setup and report an issue so this can be investigated.",
                    test.name()
                ))
                .with_stage(stage),
            );
            return Ok(());
        };

        let usage = self.replay.usage(depth_target.resource)?;
        let last_clear = usage
            .iter()
            .filter(|u| {
                u.usage == drawtriage_replay::ResourceUsage::Clear && u.event_id < self.eid
            })
            .map(|u| u.event_id)
            .next_back();

        if let Some(clear_eid) = last_clear {
            debug!(clear = clear_eid.0, "inspecting last depth-stencil clear");
            self.replay.set_frame_event(clear_eid)?;
            self.check_clear_scissor(clear_eid)?;
            let cleared = self.replay.pick_pixel(
                depth_target.resource,
                0,
                0,
                Subresource {
                    mip: depth_target.first_mip,
                    slice: depth_target.first_slice,
                    sample: 0,
                },
                CompType::Typeless,
            )?;
            self.replay.set_frame_event(self.eid)?;

            match &test {
                PrevTest::Depth { function } => {
                    self.check_depth_clear_value(clear_eid, cleared.depth(), *function);
                }
                PrevTest::Stencil { front, back } => {
                    self.check_stencil_clear_value(clear_eid, cleared.stencil(), front, back);
                }
            }
        } else {
            self.trail.push(ResultStep::text(format!(
                "The depth-stencil target was never cleared before this draw, so it may \
                 hold stale contents that the {} test fails against.",
                test.name()
            )));
        }

        self.attribute_prior_write(&test)?;

        self.display.overlay = test.overlay();
        self.trail.push(
            ResultStep::text(format!(
                "This draw appears to be failing the {} test normally. Check what else \
                 rendered before it, and whether it should be occluded or something \
                 else is in the way.",
                test.name()
            ))
            .with_display(&self.display),
        );
        Ok(())
    }

    /// GL clears obey the scissor: one that misses or only partially
    /// covers the target leaves stale contents behind. The replay must be
    /// positioned at the clear event.
    fn check_clear_scissor(&mut self, clear_eid: EventId) -> Result<(), ReplayError> {
        if self.snapshot.gl().is_err() {
            return Ok(());
        }
        let clear_snapshot = self.replay.pipeline_snapshot()?;
        let Some(scissor) = clear_snapshot.scissor().filter(|s| s.enabled) else {
            return Ok(());
        };

        if let Some(desc) = self.depth_target_desc() {
            if scissor.width == 0
                || scissor.height == 0
                || scissor.x >= desc.width as i32
                || scissor.y >= desc.height as i32
            {
                self.trail.push(
                    ResultStep::text(format!(
                        "The last clear of the depth-stencil target at {clear_eid} had \
                         the GL scissor enabled with a rect that does not cover the \
                         target, so the clear had no effect.",
                    ))
                    .with_stage(PipelineStage::ViewportsScissors),
                );
                return Ok(());
            }
        }

        let viewport = self.snapshot.viewport;
        let scissor_right = scissor.x + scissor.width;
        let scissor_bottom = scissor.y + scissor.height;
        if (scissor.x as f32) > viewport.x
            || (scissor.y as f32) > viewport.y
            || (scissor_right as f32) < viewport.x + viewport.width.abs()
            || (scissor_bottom as f32) < viewport.y + viewport.height.abs()
        {
            self.trail.push(
                ResultStep::text(format!(
                    "The last clear of the depth-stencil target at {clear_eid} had the \
                     GL scissor enabled with a rect smaller than this draw's viewport, \
                     so not every pixel the draw touches was cleared.",
                ))
                .with_stage(PipelineStage::ViewportsScissors),
            );
        }
        Ok(())
    }

    fn check_depth_clear_value(
        &mut self,
        clear_eid: EventId,
        cleared: f32,
        function: CompareFunc,
    ) {
        let viewport = self.snapshot.viewport;
        let (vp_lo, vp_hi) = (
            viewport.min_depth.min(viewport.max_depth),
            viewport.min_depth.max(viewport.max_depth),
        );

        // Fragment depth is confined to the viewport depth range; a clear
        // value at or past the relevant end makes the comparison
        // impossible (or razor-thin).
        let impossible = match function {
            CompareFunc::Greater => vp_hi <= cleared,
            CompareFunc::GreaterEqual => vp_hi < cleared,
            CompareFunc::Less => vp_lo >= cleared,
            CompareFunc::LessEqual => vp_lo > cleared,
            CompareFunc::Equal => cleared < vp_lo || cleared > vp_hi,
            _ => false,
        };
        if impossible {
            self.trail.push(
                ResultStep::text(format!(
                    "The last clear of the depth buffer at {clear_eid} cleared depth to \
                     {cleared}, and the depth comparison function is {function}. With \
                     the viewport depth range {vp_lo} to {vp_hi} the comparison can \
                     never pass against the cleared value.",
                ))
                .with_stage(PipelineStage::DepthTest),
            );
            return;
        }

        let unlikely = (function == CompareFunc::GreaterEqual && cleared == vp_hi)
            || (function == CompareFunc::LessEqual && cleared == vp_lo);
        if unlikely {
            self.trail.push(
                ResultStep::text(format!(
                    "The last clear of the depth buffer at {clear_eid} cleared depth to \
                     {cleared}, and the depth comparison function is {function}. Only \
                     fragments at exactly that depth can pass, which is unlikely to be \
                     intended.",
                ))
                .with_stage(PipelineStage::DepthTest),
            );
        }
    }

    fn check_stencil_clear_value(
        &mut self,
        clear_eid: EventId,
        cleared: u32,
        front: &StencilFaceState,
        back: &StencilFaceState,
    ) {
        let front_passes = stencil_passes(front, cleared);
        let back_passes = stencil_passes(back, cleared);
        if !front_passes && !back_passes {
            self.trail.push(
                ResultStep::text(format!(
                    "The last clear of the stencil buffer at {clear_eid} cleared \
                     stencil to {cleared}, which cannot pass the stencil comparison \
                     ({} against reference {}).",
                    front.function, front.reference
                ))
                .with_stage(PipelineStage::StencilTest),
            );
        } else if !front_passes {
            self.trail.push(
                ResultStep::text(format!(
                    "The cleared stencil value {cleared} (cleared at {clear_eid}) \
                     fails the front face comparison ({} against reference {}); only \
                     back faces can pass against cleared contents.",
                    front.function, front.reference
                ))
                .with_stage(PipelineStage::StencilTest),
            );
        } else if !back_passes {
            self.trail.push(
                ResultStep::text(format!(
                    "The cleared stencil value {cleared} (cleared at {clear_eid}) \
                     fails the back face comparison ({} against reference {}); only \
                     front faces can pass against cleared contents.",
                    back.function, back.reference
                ))
                .with_stage(PipelineStage::StencilTest),
            );
        }
    }

    /// Run pixel history on one covered pixel and find the draw that
    /// wrote the depth/stencil value this draw fails against.
    fn attribute_prior_write(&mut self, test: &PrevTest) -> Result<(), ReplayError> {
        if !self.props.pixel_history {
            return Ok(());
        }
        let Some(first) = self.targets.first().copied() else {
            return Ok(());
        };

        let Some((x, y)) = self.first_covered_pixel()? else {
            self.trail.push(ResultStep::text(
                "I tried to run pixel history on the draw to get more information but \
                 couldn't find a pixel covered!\n\nThis is a bug, please report it so \
                 it can be investigated.",
            ));
            return Ok(());
        };

        let history = self.replay.pixel_history(
            first.resource,
            x,
            y,
            self.display.subresource,
            CompType::Typeless,
        )?;
        let this_draw: Vec<_> = history
            .iter()
            .filter(|h| h.event_id == self.eid)
            .copied()
            .collect();
        if this_draw.is_empty() || this_draw.iter().any(|h| h.passed()) {
            self.trail.push(ResultStep::text(format!(
                "I tried to run pixel history on ({x},{y}) but didn't get valid \
                 results!\n\nThis is a bug, please report it so it can be investigated.",
            )));
            return Ok(());
        }

        let value_of = |m: &drawtriage_replay::ModValue| match test {
            PrevTest::Depth { .. } => f64::from(m.depth),
            PrevTest::Stencil { .. } => f64::from(m.stencil),
        };
        let stored = value_of(&this_draw[0].pre_mod);

        // Newest first: the draw that most recently left `stored` behind
        // is the occluder.
        let occluder = history
            .iter()
            .rev()
            .filter(|h| h.event_id != self.eid && h.passed())
            .find(|h| value_of(&h.pre_mod) != stored && value_of(&h.post_mod) == stored)
            .map(|h| h.event_id);

        let mut message = format!(
            "Pixel history on ({x},{y}) shows {} fragment(s) from this draw, all \
             failing against the {} value of {stored} that was stored before the draw.",
            this_draw.len(),
            test.name()
        );
        match occluder {
            Some(eid) => {
                message.push_str(&format!("\n\nThe draw which wrote that value is {eid}."));
            }
            None => {
                message.push_str("\n\nNo previous draw was detected that wrote that value.");
            }
        }
        self.trail.push(
            ResultStep::text(message)
                .with_history(self.history_payload(first.resource, x, y, &history)),
        );
        Ok(())
    }
}

//! Analysis session and orchestrator.
//!
//! One [`Analysis`] owns everything scoped to a single run: the snapshot,
//! the gathered post-transform geometry, the offscreen output hosting
//! overlay renders, and the trail under construction. Cleanup (output
//! destruction, replay position restore) happens in `Drop`, so it runs on
//! every exit path.

use thiserror::Error;
use tracing::{debug, warn};

use drawtriage_replay::{
    ApiProperties, CompType, OutputHandle, ReplayController, ReplayError, Subresource,
    TextureDescription, TextureDisplay,
};
use drawtriage_state::{
    BoundTarget, EventId, MeshDataStage, PipelineSnapshot, PipelineStage,
};

use crate::geometry::NdcSet;
use crate::trail::{Flow, ResultStep, Trail};

/// Overlay green-channel value above which at least one pixel passed.
pub(crate) const OVERLAY_PASS_THRESHOLD: f32 = 0.5;
/// NDC extent multiple beyond which a transform is considered broken.
pub(crate) const GUARD_BAND_SCALE: f32 = 16.0;
/// Cap on pixel-history probes per analysis.
pub(crate) const MAX_HISTORY_PROBES: usize = 5;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The replay could not even be positioned/inspected at the event;
    /// no trail is produced. Distinguishable from an inconclusive trail.
    #[error("analysis setup failed: {0}")]
    Setup(#[from] ReplayError),
}

pub struct Analysis<'r, R: ReplayController> {
    pub(crate) replay: &'r mut R,
    pub(crate) eid: EventId,
    pub(crate) props: ApiProperties,
    pub(crate) snapshot: PipelineSnapshot,
    pub(crate) textures: Vec<TextureDescription>,
    /// Bound targets, color first, depth last.
    pub(crate) targets: Vec<BoundTarget>,
    pub(crate) postvs_stage: MeshDataStage,
    pub(crate) ndc: NdcSet,
    /// Working display template; every step stores a value copy of it.
    pub(crate) display: TextureDisplay,
    pub(crate) output: OutputHandle,
    saved_event: EventId,
    pub(crate) trail: Trail,
}

/// Run the full diagnostic walk for the draw at `eid` and return the
/// ordered trail. The replay position is restored and the temporary
/// output released before this returns, on success and failure alike.
pub fn analyse_draw<R: ReplayController>(
    replay: &mut R,
    eid: EventId,
) -> Result<Vec<ResultStep>, AnalysisError> {
    let mut analysis = Analysis::begin(replay, eid)?;
    analysis.run();
    Ok(analysis.finish())
}

/// Everything `begin` gathers before the session owns the controller
/// borrow.
struct SessionParts {
    props: ApiProperties,
    snapshot: PipelineSnapshot,
    textures: Vec<TextureDescription>,
    targets: Vec<BoundTarget>,
    postvs_stage: MeshDataStage,
    ndc: NdcSet,
    display: TextureDisplay,
    output: OutputHandle,
}

impl<'r, R: ReplayController> Analysis<'r, R> {
    pub fn begin(replay: &'r mut R, eid: EventId) -> Result<Self, AnalysisError> {
        let saved_event = replay.current_event();
        let parts = match Self::gather(&mut *replay, eid) {
            Ok(parts) => parts,
            Err(err) => {
                // Best-effort restore; the seek may be what failed.
                let _ = replay.set_frame_event(saved_event);
                return Err(AnalysisError::Setup(err));
            }
        };
        Ok(Analysis {
            replay,
            eid,
            props: parts.props,
            snapshot: parts.snapshot,
            textures: parts.textures,
            targets: parts.targets,
            postvs_stage: parts.postvs_stage,
            ndc: parts.ndc,
            display: parts.display,
            output: parts.output,
            saved_event,
            trail: Trail::default(),
        })
    }

    fn gather(replay: &mut R, eid: EventId) -> Result<SessionParts, ReplayError> {
        replay.set_frame_event(eid)?;

        let props = replay.api_properties();
        let snapshot = replay.pipeline_snapshot()?;
        let textures = replay.textures()?;

        let targets = snapshot.bound_targets();

        // Post-transform data comes from the last expansion stage when
        // tessellation or a geometry shader runs, otherwise VS output.
        let postvs_stage = if snapshot.shaders.has_expansion_stage() {
            MeshDataStage::GsOut
        } else {
            MeshDataStage::VsOut
        };

        let mut clip = Vec::new();
        for instance in 0..snapshot.draw.num_instances.max(1) {
            for view in 0..snapshot.multiview_count.max(1) {
                match replay.post_vs_positions(instance, view, postvs_stage) {
                    Ok(mut positions) => clip.append(&mut positions),
                    Err(err) => {
                        warn!(instance, view, %err, "post-transform fetch failed");
                    }
                }
            }
        }
        let ndc = NdcSet::from_clip(&clip);

        // The offscreen output spans the bounding box of all targets so
        // every overlay readback sees the whole render area.
        let mut dim = (1u32, 1u32);
        for target in &targets {
            if let Some(desc) = textures.iter().find(|t| t.resource == target.resource) {
                dim.0 = dim.0.max(desc.width);
                dim.1 = dim.1.max(desc.height);
            }
        }
        let output = replay.create_output(dim.0, dim.1)?;

        let mut display = TextureDisplay::default();
        if let Some(first) = targets.first() {
            display.resource = first.resource;
            display.subresource = Subresource {
                mip: first.first_mip,
                slice: first.first_slice,
                sample: 0,
            };
        }

        Ok(SessionParts {
            props,
            snapshot,
            textures,
            targets,
            postvs_stage,
            ndc,
            display,
            output,
        })
    }

    /// Execute the stage walk, appending steps to the trail. Replay
    /// faults mid-walk become a "report this bug" step rather than
    /// discarding what was already gathered.
    pub fn run(&mut self) {
        debug!(event = self.eid.0, api = ?self.props.api, "starting draw analysis");
        let flow = match self.walk() {
            Ok(flow) => flow,
            Err(err) => {
                warn!(%err, "replay fault during analysis walk");
                self.trail.push(ResultStep::text(format!(
                    "I hit a replay problem while analysing ({err}).\n\n\
                     This is a bug, please report it so it can be investigated."
                )));
                Flow::Stop
            }
        };
        if !flow.stopped() {
            self.trail.push(ResultStep::text(
                "Sorry, I couldn't figure out what was wrong! Please report an issue to \
                 see if this is something that should be added to my checks. You can see \
                 what I checked by clicking through the steps.",
            ));
        }
        debug!(steps = self.trail.len(), "analysis finished");
    }

    /// Take the finished trail. Dropping `self` afterwards performs the
    /// scoped cleanup.
    pub fn finish(mut self) -> Vec<ResultStep> {
        std::mem::take(&mut self.trail).into_steps()
    }

    fn walk(&mut self) -> Result<Flow, ReplayError> {
        if self.check_preconditions().stopped() {
            return Ok(Flow::Stop);
        }
        if self.check_output_area().stopped() {
            return Ok(Flow::Stop);
        }

        self.setup_highlight_range()?;

        // Coarse visibility: does the draw rasterize anywhere at all?
        let (_, texmax) = self.overlay_minmax(drawtriage_replay::DebugOverlay::Drawcall)?;
        if texmax.float_value[0] < OVERLAY_PASS_THRESHOLD {
            self.check_offscreen()
        } else {
            self.check_onscreen()
        }
    }

    /// Preconditions: anything bound to render to, and non-trivial draw
    /// parameters. Failing either is itself the conclusion.
    fn check_preconditions(&mut self) -> Flow {
        if self.targets.is_empty() {
            self.trail.push(ResultStep::text(format!(
                "No output render targets or depth target are bound at {}.",
                self.eid
            )));
            return Flow::Stop;
        }

        let draw = &self.snapshot.draw;
        if draw.num_indices == 0 || draw.num_instances == 0 {
            let unit = if draw.indexed { "indices" } else { "vertices" };
            self.trail.push(ResultStep::text(format!(
                "The draw at {} is trivially empty: {} {} over {} instances means \
                 nothing can render.",
                self.eid, draw.num_indices, unit, draw.num_instances
            )));
            return Flow::Stop;
        }
        Flow::Continue
    }

    /// Output-area sanity: a viewport with no area, or positioned wholly
    /// outside the target, renders nothing regardless of geometry.
    fn check_output_area(&mut self) -> Flow {
        let viewport = self.snapshot.viewport;
        if viewport.width.abs() < 1.0 || viewport.height.abs() < 1.0 {
            self.trail.push(
                ResultStep::text(format!(
                    "The viewport is degenerate: {} x {} covers less than a pixel, so \
                     nothing will be rasterized.",
                    viewport.width, viewport.height
                ))
                .with_stage(PipelineStage::ViewportsScissors),
            );
            return Flow::Stop;
        }

        if let Some(desc) = self.target_desc(0) {
            let (width, height) = (desc.width as f32, desc.height as f32);
            if viewport.x >= width
                || viewport.y >= height
                || viewport.x + viewport.width.abs() <= 0.0
                || viewport.y + viewport.height.abs() <= 0.0
            {
                self.trail.push(
                    ResultStep::text(format!(
                        "The viewport at {},{} ({} x {}) lies entirely outside the \
                         {} x {} render target.",
                        viewport.x,
                        viewport.y,
                        viewport.width,
                        viewport.height,
                        desc.width,
                        desc.height
                    ))
                    .with_stage(PipelineStage::ViewportsScissors),
                );
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Set the display range for the highlight target from its actual
    /// min/max so the recorded visualization hints are readable. Channel
    /// selection follows the target's component type.
    fn setup_highlight_range(&mut self) -> Result<(), ReplayError> {
        let Some(first) = self.targets.first().copied() else {
            return Ok(());
        };
        let (texmin, texmax) = self.replay.min_max(
            first.resource,
            self.display.subresource,
            CompType::Typeless,
        )?;
        let (lo, hi) = match first.format.comp_type() {
            CompType::SInt => (
                texmin.int_value.iter().copied().min().unwrap_or(0) as f32,
                texmax.int_value.iter().copied().max().unwrap_or(1) as f32,
            ),
            CompType::UInt => (
                texmin.uint_value.iter().copied().min().unwrap_or(0) as f32,
                texmax.uint_value.iter().copied().max().unwrap_or(1) as f32,
            ),
            _ => (
                texmin.float_value.iter().copied().fold(f32::MAX, f32::min),
                texmax.float_value.iter().copied().fold(f32::MIN, f32::max),
            ),
        };
        self.display.range_min = lo;
        self.display.range_max = hi;
        Ok(())
    }

    pub(crate) fn target_desc(&self, index: usize) -> Option<TextureDescription> {
        let target = self.targets.get(index)?;
        self.textures
            .iter()
            .find(|t| t.resource == target.resource)
            .copied()
    }

    pub(crate) fn depth_target_desc(&self) -> Option<TextureDescription> {
        let depth = self.snapshot.depth_target?;
        self.textures
            .iter()
            .find(|t| t.resource == depth.resource)
            .copied()
    }
}

impl<'r, R: ReplayController> Drop for Analysis<'r, R> {
    fn drop(&mut self) {
        self.replay.destroy_output(self.output);
        if self.replay.current_event() != self.saved_event {
            if let Err(err) = self.replay.set_frame_event(self.saved_event) {
                warn!(%err, "failed to restore replay position after analysis");
            }
        }
    }
}

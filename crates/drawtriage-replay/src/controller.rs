//! The replay/inspection collaborator contract.
//!
//! Everything the diagnostic engine needs from the host replay layer goes
//! through [`ReplayController`]. Implementations wrap a real capture
//! replayer; tests use the scripted controller from the `test-utils`
//! feature. The controller is single-context: callers must finish one
//! analysis before issuing unrelated replay-position-dependent work.

use thiserror::Error;

use drawtriage_state::{
    CompType, EventId, MeshDataStage, PipelineSnapshot, ResourceId, ShaderStage, TextureFormat,
};

use crate::display::{PixelValue, Subresource, TextureData, TextureDisplay};
use crate::history::{EventUsage, PixelModification};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("replay cannot seek to {event}")]
    SeekFailed { event: EventId },

    #[error("no pipeline snapshot available at {event}")]
    SnapshotUnavailable { event: EventId },

    #[error("resource {resource} is not known to the replay")]
    UnknownResource { resource: ResourceId },

    #[error("no replay output with handle {0:?} exists")]
    UnknownOutput(OutputHandle),

    #[error("readback of {resource} failed: {reason}")]
    ReadbackFailed { resource: ResourceId, reason: String },

    #[error("post-transform vertex data is unavailable for instance {instance}, view {view}")]
    PostVsUnavailable { instance: u32, view: u32 },

    #[error("pixel history is not supported by the active backend")]
    PixelHistoryUnsupported,
}

/// Handle to an offscreen replay output hosting overlay renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputHandle(pub u64);

/// Capabilities of the active replay backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiProperties {
    pub api: drawtriage_state::GraphicsApi,
    /// Absence degrades gracefully: history-based advisories are skipped,
    /// the analysis itself still runs.
    pub pixel_history: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescription {
    pub resource: ResourceId,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDescription {
    pub resource: ResourceId,
    pub byte_size: u64,
}

/// A shader constant visible to the vertex input heuristics.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantVariable {
    pub name: String,
    pub rows: u32,
    pub columns: u32,
    pub values: Vec<f32>,
}

impl ConstantVariable {
    pub fn is_matrix(&self) -> bool {
        self.rows > 1 && self.columns > 1
    }
}

/// Contract with the host replay/inspection layer. All methods operate
/// relative to the current replay position set by
/// [`set_frame_event`](ReplayController::set_frame_event).
pub trait ReplayController {
    fn api_properties(&self) -> ApiProperties;

    /// The event the replay is currently positioned at.
    fn current_event(&self) -> EventId;

    /// Position the replay exactly at `event`, with all prior work
    /// applied.
    fn set_frame_event(&mut self, event: EventId) -> Result<(), ReplayError>;

    /// Full pipeline state at the current event. Never partial: either
    /// every field reflects the event or this fails.
    fn pipeline_snapshot(&mut self) -> Result<PipelineSnapshot, ReplayError>;

    fn textures(&mut self) -> Result<Vec<TextureDescription>, ReplayError>;

    fn buffers(&mut self) -> Result<Vec<BufferDescription>, ReplayError>;

    /// Post-transform vertex positions (clip space, xyzw) for one
    /// instance and multiview view of the current draw.
    fn post_vs_positions(
        &mut self,
        instance: u32,
        view: u32,
        stage: MeshDataStage,
    ) -> Result<Vec<[f32; 4]>, ReplayError>;

    fn buffer_data(
        &mut self,
        resource: ResourceId,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, ReplayError>;

    /// Constants bound to `stage`'s shader at the current event.
    fn constant_variables(
        &mut self,
        stage: ShaderStage,
    ) -> Result<Vec<ConstantVariable>, ReplayError>;

    fn create_output(&mut self, width: u32, height: u32) -> Result<OutputHandle, ReplayError>;

    /// Destroying an unknown handle is a no-op; release must be safe on
    /// every exit path.
    fn destroy_output(&mut self, output: OutputHandle);

    /// Configure what `output` displays, including any debug overlay.
    fn set_texture_display(
        &mut self,
        output: OutputHandle,
        display: &TextureDisplay,
    ) -> Result<(), ReplayError>;

    /// The texture holding the most recently rendered overlay for
    /// `output`.
    fn overlay_texture(&mut self, output: OutputHandle) -> Result<ResourceId, ReplayError>;

    fn min_max(
        &mut self,
        resource: ResourceId,
        subresource: Subresource,
        type_cast: CompType,
    ) -> Result<(PixelValue, PixelValue), ReplayError>;

    /// Luminance histogram over `[range.0, range.1]` with `buckets`
    /// equal-width buckets.
    fn histogram(
        &mut self,
        resource: ResourceId,
        subresource: Subresource,
        range: (f32, f32),
        buckets: u32,
    ) -> Result<Vec<u32>, ReplayError>;

    /// Raw RGBA16 readback (see [`TextureData`]).
    fn texture_data(
        &mut self,
        resource: ResourceId,
        subresource: Subresource,
    ) -> Result<TextureData, ReplayError>;

    fn pick_pixel(
        &mut self,
        resource: ResourceId,
        x: u32,
        y: u32,
        subresource: Subresource,
        type_cast: CompType,
    ) -> Result<PixelValue, ReplayError>;

    /// Ordered (oldest first) fragment modification records for one
    /// pixel across the whole capture.
    fn pixel_history(
        &mut self,
        resource: ResourceId,
        x: u32,
        y: u32,
        subresource: Subresource,
        type_cast: CompType,
    ) -> Result<Vec<PixelModification>, ReplayError>;

    /// Every usage of `resource` across the capture, in event order.
    fn usage(&mut self, resource: ResourceId) -> Result<Vec<EventUsage>, ReplayError>;
}

//! Point-in-time pipeline state captured at one draw event.
//!
//! The snapshot holds a normalized, API-independent core (targets,
//! viewport/scissor, blend, vertex input, draw parameters) plus exactly
//! one backend-specific variant for the state whose shape genuinely
//! differs between APIs (rasterizer, depth/stencil, and per-API extras
//! such as Vulkan's render area or GL's sample coverage). Accessing the
//! wrong variant is a typed contract violation, never silent wrong data.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    BlendFactor, BlendOp, ColorWriteMask, CompareFunc, CullMode, EventId, GraphicsApi,
    ResourceId, StencilOp, TextureFormat, VertexFormat,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot holds {actual:?} backend state but {requested:?} state was requested")]
    WrongBackend {
        requested: GraphicsApi,
        actual: GraphicsApi,
    },
}

/// A color or depth output bound at the analyzed event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundTarget {
    pub resource: ResourceId,
    pub first_mip: u32,
    pub first_slice: u32,
    pub format: TextureFormat,
    pub sample_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScissorRect {
    pub enabled: bool,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Blend configuration for one color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlendTarget {
    pub enabled: bool,
    pub write_mask: ColorWriteMask,
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub color_op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOp,
    pub logic_op_enabled: bool,
}

/// One vertex attribute in the input layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexAttribute {
    pub name: String,
    pub buffer_slot: u32,
    pub per_instance: bool,
    pub format: VertexFormat,
    pub byte_offset: u64,
}

/// A vertex buffer bound to one input slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexBufferBinding {
    pub resource: ResourceId,
    pub byte_offset: u64,
    pub byte_stride: u64,
    /// Bound range length. `None` means the binding covers the whole
    /// buffer and the true size must be resolved from the buffer itself.
    pub byte_size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexBufferBinding {
    pub resource: ResourceId,
    pub byte_offset: u64,
    /// 2 or 4.
    pub index_byte_width: u64,
    pub byte_size: Option<u64>,
}

/// Parameters of the analyzed draw itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawParams {
    pub indexed: bool,
    /// Index count for indexed draws, vertex count otherwise.
    pub num_indices: u32,
    pub num_instances: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub restart_enabled: bool,
    pub restart_index: u32,
}

/// Which shader stages have a bound shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShaderBindings {
    pub vertex: Option<ResourceId>,
    pub hull: Option<ResourceId>,
    pub domain: Option<ResourceId>,
    pub geometry: Option<ResourceId>,
    pub pixel: Option<ResourceId>,
}

impl ShaderBindings {
    /// True when any stage ahead of the rasterizer is populated.
    pub fn any_pre_rasterization(&self) -> bool {
        self.vertex.is_some()
            || self.hull.is_some()
            || self.domain.is_some()
            || self.geometry.is_some()
    }

    /// True when the draw uses tessellation or geometry expansion, in
    /// which case post-transform data comes from the last of those stages
    /// rather than the vertex shader.
    pub fn has_expansion_stage(&self) -> bool {
        self.hull.is_some() || self.domain.is_some() || self.geometry.is_some()
    }
}

/// Per-face stencil configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StencilFaceState {
    pub function: CompareFunc,
    pub reference: u32,
    pub compare_mask: u32,
    pub write_mask: u32,
    pub fail_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub pass_op: StencilOp,
}

impl Default for StencilFaceState {
    fn default() -> Self {
        StencilFaceState {
            function: CompareFunc::Always,
            reference: 0,
            compare_mask: 0xff,
            write_mask: 0xff,
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DepthBias {
    pub constant: f32,
    pub slope_scaled: f32,
    pub clamp: f32,
}

// --- GL ------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlVertexProcessing {
    /// GL_RASTERIZER_DISCARD.
    pub discard: bool,
    /// glClipControl depth mode: true means NDC depth spans [-1, 1].
    pub clip_negative_one_to_one: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlRasterizer {
    pub cull_enabled: bool,
    pub cull_mode: CullMode,
    pub front_ccw: bool,
    pub depth_clamp: bool,
    pub depth_bias: DepthBias,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlDepthState {
    pub test_enabled: bool,
    pub function: CompareFunc,
    pub write_enabled: bool,
    pub bounds_enabled: bool,
    pub near_bound: f64,
    pub far_bound: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlStencilState {
    pub test_enabled: bool,
    pub front: StencilFaceState,
    pub back: StencilFaceState,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlSampleState {
    /// GL_SAMPLE_COVERAGE.
    pub coverage_enabled: bool,
    pub coverage_invert: bool,
    pub coverage_value: f32,
    pub alpha_to_coverage: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlState {
    pub vertex_processing: GlVertexProcessing,
    pub rasterizer: GlRasterizer,
    pub depth: GlDepthState,
    pub stencil: GlStencilState,
    pub sample: GlSampleState,
}

// --- Vulkan ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VkRasterizer {
    pub rasterizer_discard_enable: bool,
    pub cull_mode: CullMode,
    pub front_ccw: bool,
    pub depth_clamp_enable: bool,
    pub depth_bias: DepthBias,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VkDepthStencil {
    pub depth_test_enable: bool,
    pub depth_function: CompareFunc,
    pub depth_write_enable: bool,
    pub depth_bounds_enable: bool,
    pub min_depth_bounds: f32,
    pub max_depth_bounds: f32,
    pub stencil_test_enable: bool,
    pub front: StencilFaceState,
    pub back: StencilFaceState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderArea {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulkanState {
    pub rasterizer: VkRasterizer,
    pub depth_stencil: VkDepthStencil,
    pub render_area: RenderArea,
}

// --- D3D11 -----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct D3dRasterizer {
    pub cull_mode: CullMode,
    pub front_ccw: bool,
    /// D3D expresses clamping as `DepthClipEnable = false`.
    pub depth_clip_enable: bool,
    pub scissor_enable: bool,
    pub depth_bias: DepthBias,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct D3dDepthStencil {
    pub depth_enable: bool,
    pub depth_function: CompareFunc,
    pub depth_write_enable: bool,
    pub stencil_enable: bool,
    pub front: StencilFaceState,
    pub back: StencilFaceState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct D3d11State {
    pub rasterizer: D3dRasterizer,
    pub output_merger: D3dDepthStencil,
}

// --- D3D12 -----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct D3d12State {
    pub rasterizer: D3dRasterizer,
    pub output_merger: D3dDepthStencil,
    pub depth_bounds_enable: bool,
    pub min_depth_bounds: f32,
    pub max_depth_bounds: f32,
}

/// The mutually exclusive backend-specific portion of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackendState {
    Gl(GlState),
    Vulkan(VulkanState),
    D3d11(D3d11State),
    D3d12(D3d12State),
}

impl BackendState {
    pub fn api(&self) -> GraphicsApi {
        match self {
            BackendState::Gl(_) => GraphicsApi::Gl,
            BackendState::Vulkan(_) => GraphicsApi::Vulkan,
            BackendState::D3d11(_) => GraphicsApi::D3d11,
            BackendState::D3d12(_) => GraphicsApi::D3d12,
        }
    }
}

/// Read-only capture of all pipeline state the diagnostics consult,
/// taken with the replay positioned exactly at the analyzed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub event: EventId,
    pub api: GraphicsApi,

    pub color_targets: Vec<BoundTarget>,
    pub depth_target: Option<BoundTarget>,

    pub viewport: Viewport,
    pub scissors: Vec<ScissorRect>,

    pub blend_targets: Vec<BlendTarget>,
    /// `None` when the API has no sample mask concept for this pipeline.
    pub sample_mask: Option<u32>,

    pub vertex_attributes: Vec<VertexAttribute>,
    pub vertex_buffers: Vec<VertexBufferBinding>,
    pub index_buffer: Option<IndexBufferBinding>,

    pub draw: DrawParams,
    pub shaders: ShaderBindings,
    /// Whether the last pre-rasterization stage's output signature
    /// includes a position output.
    pub position_output: bool,
    pub multiview_count: u32,

    pub backend: BackendState,
}

impl PipelineSnapshot {
    /// All bound output targets, color first, depth last. Matches the
    /// order the overlay oracle renders against (the first entry hosts
    /// overlays when no color target is bound).
    pub fn bound_targets(&self) -> Vec<BoundTarget> {
        let mut targets: Vec<BoundTarget> = self
            .color_targets
            .iter()
            .copied()
            .filter(|t| !t.resource.is_null())
            .collect();
        if let Some(depth) = self.depth_target {
            if !depth.resource.is_null() {
                targets.push(depth);
            }
        }
        targets
    }

    /// First scissor rect, if any scissor state is recorded.
    pub fn scissor(&self) -> Option<ScissorRect> {
        self.scissors.first().copied()
    }

    pub fn gl(&self) -> Result<&GlState, SnapshotError> {
        match &self.backend {
            BackendState::Gl(state) => Ok(state),
            other => Err(SnapshotError::WrongBackend {
                requested: GraphicsApi::Gl,
                actual: other.api(),
            }),
        }
    }

    pub fn vulkan(&self) -> Result<&VulkanState, SnapshotError> {
        match &self.backend {
            BackendState::Vulkan(state) => Ok(state),
            other => Err(SnapshotError::WrongBackend {
                requested: GraphicsApi::Vulkan,
                actual: other.api(),
            }),
        }
    }

    pub fn d3d11(&self) -> Result<&D3d11State, SnapshotError> {
        match &self.backend {
            BackendState::D3d11(state) => Ok(state),
            other => Err(SnapshotError::WrongBackend {
                requested: GraphicsApi::D3d11,
                actual: other.api(),
            }),
        }
    }

    pub fn d3d12(&self) -> Result<&D3d12State, SnapshotError> {
        match &self.backend {
            BackendState::D3d12(state) => Ok(state),
            other => Err(SnapshotError::WrongBackend {
                requested: GraphicsApi::D3d12,
                actual: other.api(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::d3d11_snapshot;

    #[test]
    fn wrong_backend_access_is_a_typed_error() {
        let snap = d3d11_snapshot();
        assert!(snap.d3d11().is_ok());
        assert_eq!(
            snap.gl().unwrap_err(),
            SnapshotError::WrongBackend {
                requested: GraphicsApi::Gl,
                actual: GraphicsApi::D3d11,
            }
        );
        assert_eq!(
            snap.vulkan().unwrap_err(),
            SnapshotError::WrongBackend {
                requested: GraphicsApi::Vulkan,
                actual: GraphicsApi::D3d11,
            }
        );
    }

    #[test]
    fn bound_targets_orders_depth_last() {
        let snap = d3d11_snapshot();
        let targets = snap.bound_targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].resource, snap.color_targets[0].resource);
        assert_eq!(targets[1].resource, snap.depth_target.unwrap().resource);
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let snap = d3d11_snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let back: PipelineSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}

//! Normalized per-backend accessors.
//!
//! Stage checkers consume these views instead of branching on the API
//! inline: each view is derived once from the snapshot's backend variant
//! by a small per-backend table, so the four state shapes stay confined
//! to this module.

use crate::snapshot::{BackendState, PipelineSnapshot, StencilFaceState};
use crate::types::{CompareFunc, CullMode, GraphicsApi};

/// Rasterizer state as the checkers need it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterView {
    /// Rasterization disabled outright (GL rasterizer discard / Vulkan
    /// `rasterizerDiscardEnable`). Always false on D3D.
    pub discard: bool,
    pub cull_mode: CullMode,
    pub front_ccw: bool,
    /// True when out-of-range depth is clipped rather than clamped.
    pub depth_clip: bool,
}

impl RasterView {
    /// API-appropriate name for the clip/clamp toggle, used in messages.
    pub fn clip_state_name(api: GraphicsApi) -> &'static str {
        if api.is_d3d() {
            "Depth Clip"
        } else {
            "Depth Clamp"
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthBoundsRange {
    pub min: f32,
    pub max: f32,
}

/// Depth test state as the checkers need it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthView {
    pub test_enabled: bool,
    pub function: CompareFunc,
    pub write_enabled: bool,
    pub bounds: Option<DepthBoundsRange>,
    /// NDC depth range before the viewport transform: [-1, 1] for GL with
    /// the default clip control, [0, 1] everywhere else.
    pub ndc_min: f32,
    pub ndc_max: f32,
}

/// Stencil test state as the checkers need it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilView {
    pub test_enabled: bool,
    pub front: StencilFaceState,
    pub back: StencilFaceState,
}

impl StencilView {
    /// Front/back state with cull mode folded in: a culled face's stencil
    /// state never applies, so it is substituted by the surviving face's
    /// state to avoid attributing a failure to state that cannot run.
    pub fn effective_faces(&self, cull: CullMode) -> (StencilFaceState, StencilFaceState) {
        match cull {
            CullMode::None => (self.front, self.back),
            CullMode::Front => (self.back, self.back),
            CullMode::Back => (self.front, self.front),
        }
    }
}

pub fn raster_view(snap: &PipelineSnapshot) -> RasterView {
    match &snap.backend {
        BackendState::Gl(gl) => RasterView {
            discard: gl.vertex_processing.discard,
            cull_mode: if gl.rasterizer.cull_enabled {
                gl.rasterizer.cull_mode
            } else {
                CullMode::None
            },
            front_ccw: gl.rasterizer.front_ccw,
            depth_clip: !gl.rasterizer.depth_clamp,
        },
        BackendState::Vulkan(vk) => RasterView {
            discard: vk.rasterizer.rasterizer_discard_enable,
            cull_mode: vk.rasterizer.cull_mode,
            front_ccw: vk.rasterizer.front_ccw,
            depth_clip: !vk.rasterizer.depth_clamp_enable,
        },
        BackendState::D3d11(d3d) => RasterView {
            discard: false,
            cull_mode: d3d.rasterizer.cull_mode,
            front_ccw: d3d.rasterizer.front_ccw,
            depth_clip: d3d.rasterizer.depth_clip_enable,
        },
        BackendState::D3d12(d3d) => RasterView {
            discard: false,
            cull_mode: d3d.rasterizer.cull_mode,
            front_ccw: d3d.rasterizer.front_ccw,
            depth_clip: d3d.rasterizer.depth_clip_enable,
        },
    }
}

pub fn depth_view(snap: &PipelineSnapshot) -> DepthView {
    match &snap.backend {
        BackendState::Gl(gl) => DepthView {
            test_enabled: gl.depth.test_enabled,
            function: gl.depth.function,
            write_enabled: gl.depth.write_enabled,
            bounds: gl.depth.bounds_enabled.then(|| DepthBoundsRange {
                min: gl.depth.near_bound as f32,
                max: gl.depth.far_bound as f32,
            }),
            ndc_min: if gl.vertex_processing.clip_negative_one_to_one {
                -1.0
            } else {
                0.0
            },
            ndc_max: 1.0,
        },
        BackendState::Vulkan(vk) => DepthView {
            test_enabled: vk.depth_stencil.depth_test_enable,
            function: vk.depth_stencil.depth_function,
            write_enabled: vk.depth_stencil.depth_write_enable,
            bounds: vk.depth_stencil.depth_bounds_enable.then(|| DepthBoundsRange {
                min: vk.depth_stencil.min_depth_bounds,
                max: vk.depth_stencil.max_depth_bounds,
            }),
            ndc_min: 0.0,
            ndc_max: 1.0,
        },
        BackendState::D3d11(d3d) => DepthView {
            test_enabled: d3d.output_merger.depth_enable,
            function: d3d.output_merger.depth_function,
            write_enabled: d3d.output_merger.depth_write_enable,
            bounds: None,
            ndc_min: 0.0,
            ndc_max: 1.0,
        },
        BackendState::D3d12(d3d) => DepthView {
            test_enabled: d3d.output_merger.depth_enable,
            function: d3d.output_merger.depth_function,
            write_enabled: d3d.output_merger.depth_write_enable,
            bounds: d3d.depth_bounds_enable.then(|| DepthBoundsRange {
                min: d3d.min_depth_bounds,
                max: d3d.max_depth_bounds,
            }),
            ndc_min: 0.0,
            ndc_max: 1.0,
        },
    }
}

pub fn stencil_view(snap: &PipelineSnapshot) -> StencilView {
    match &snap.backend {
        BackendState::Gl(gl) => StencilView {
            test_enabled: gl.stencil.test_enabled,
            front: gl.stencil.front,
            back: gl.stencil.back,
        },
        BackendState::Vulkan(vk) => StencilView {
            test_enabled: vk.depth_stencil.stencil_test_enable,
            front: vk.depth_stencil.front,
            back: vk.depth_stencil.back,
        },
        BackendState::D3d11(d3d) => StencilView {
            test_enabled: d3d.output_merger.stencil_enable,
            front: d3d.output_merger.front,
            back: d3d.output_merger.back,
        },
        BackendState::D3d12(d3d) => StencilView {
            test_enabled: d3d.output_merger.stencil_enable,
            front: d3d.output_merger.front,
            back: d3d.output_merger.back,
        },
    }
}

/// Whether the scissor test applies to this draw. D3D gates it on the
/// rasterizer state; GL records it per scissor rect; Vulkan scissors are
/// always in effect.
pub fn scissor_enabled(snap: &PipelineSnapshot) -> bool {
    match &snap.backend {
        BackendState::Gl(_) => snap.scissors.iter().any(|s| s.enabled),
        BackendState::Vulkan(_) => !snap.scissors.is_empty(),
        BackendState::D3d11(d3d) => d3d.rasterizer.scissor_enable,
        BackendState::D3d12(d3d) => d3d.rasterizer.scissor_enable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::StencilFaceState;
    use crate::test_fixtures::{d3d11_snapshot, gl_snapshot, vulkan_snapshot};
    use crate::types::StencilOp;

    #[test]
    fn gl_cull_disabled_reports_no_cull() {
        let mut snap = gl_snapshot();
        if let BackendState::Gl(gl) = &mut snap.backend {
            gl.rasterizer.cull_enabled = false;
            gl.rasterizer.cull_mode = CullMode::Back;
        }
        assert_eq!(raster_view(&snap).cull_mode, CullMode::None);
    }

    #[test]
    fn gl_clip_control_selects_ndc_range() {
        let mut snap = gl_snapshot();
        if let BackendState::Gl(gl) = &mut snap.backend {
            gl.vertex_processing.clip_negative_one_to_one = true;
        }
        let view = depth_view(&snap);
        assert_eq!(view.ndc_min, -1.0);
        assert_eq!(view.ndc_max, 1.0);
    }

    #[test]
    fn d3d_depth_clip_maps_directly() {
        let mut snap = d3d11_snapshot();
        if let BackendState::D3d11(d3d) = &mut snap.backend {
            d3d.rasterizer.depth_clip_enable = false;
        }
        assert!(!raster_view(&snap).depth_clip);
        assert_eq!(
            RasterView::clip_state_name(GraphicsApi::D3d11),
            "Depth Clip"
        );
        assert_eq!(RasterView::clip_state_name(GraphicsApi::Gl), "Depth Clamp");
    }

    #[test]
    fn culled_face_state_is_substituted() {
        let mut snap = vulkan_snapshot();
        let never_face = StencilFaceState {
            function: CompareFunc::Never,
            fail_op: StencilOp::Zero,
            ..StencilFaceState::default()
        };
        if let BackendState::Vulkan(vk) = &mut snap.backend {
            vk.depth_stencil.front = never_face;
        }
        let view = stencil_view(&snap);

        // Front face culled: its Never state must not be blamed.
        let (front, back) = view.effective_faces(CullMode::Front);
        assert_eq!(front, view.back);
        assert_eq!(back, view.back);

        let (front, back) = view.effective_faces(CullMode::Back);
        assert_eq!(front, never_face);
        assert_eq!(back, never_face);
    }
}

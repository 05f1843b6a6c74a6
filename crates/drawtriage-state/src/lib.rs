//! `drawtriage-state` models the pipeline state snapshot the diagnostic
//! engine walks: an API-independent core plus exactly one of four
//! backend-specific state variants (GL, Vulkan, D3D11, D3D12), and the
//! normalized views stage checkers consume.

pub mod snapshot;
pub mod types;
pub mod views;

pub use snapshot::{
    BackendState, BlendTarget, BoundTarget, D3d11State, D3d12State, D3dDepthStencil,
    D3dRasterizer, DepthBias, DrawParams, GlState, IndexBufferBinding, PipelineSnapshot,
    RenderArea, ScissorRect, ShaderBindings, SnapshotError, StencilFaceState, VertexAttribute,
    VertexBufferBinding, Viewport, VulkanState,
};
pub use types::{
    BlendFactor, BlendOp, ColorWriteMask, CompType, CompareFunc, CullMode, EventId, GraphicsApi,
    MeshDataStage, PipelineStage, ResourceId, ShaderStage, StencilOp, TextureFormat, VertexFormat,
};
pub use views::{
    depth_view, raster_view, scissor_enabled, stencil_view, DepthBoundsRange, DepthView,
    RasterView, StencilView,
};

#[cfg(test)]
pub(crate) mod test_fixtures {
    use crate::snapshot::*;
    use crate::types::*;

    fn common(api: GraphicsApi, backend: BackendState) -> PipelineSnapshot {
        PipelineSnapshot {
            event: EventId(100),
            api,
            color_targets: vec![BoundTarget {
                resource: ResourceId(10),
                first_mip: 0,
                first_slice: 0,
                format: TextureFormat::Rgba8Unorm,
                sample_count: 1,
            }],
            depth_target: Some(BoundTarget {
                resource: ResourceId(11),
                first_mip: 0,
                first_slice: 0,
                format: TextureFormat::D24UnormS8Uint,
                sample_count: 1,
            }),
            viewport: Viewport {
                x: 0.0,
                y: 0.0,
                width: 256.0,
                height: 256.0,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            scissors: vec![ScissorRect {
                enabled: false,
                x: 0,
                y: 0,
                width: 256,
                height: 256,
            }],
            blend_targets: vec![BlendTarget {
                enabled: false,
                write_mask: ColorWriteMask::ALL,
                src_color: BlendFactor::One,
                dst_color: BlendFactor::Zero,
                color_op: BlendOp::Add,
                src_alpha: BlendFactor::One,
                dst_alpha: BlendFactor::Zero,
                alpha_op: BlendOp::Add,
                logic_op_enabled: false,
            }],
            sample_mask: Some(!0u32),
            vertex_attributes: vec![VertexAttribute {
                name: "POSITION".to_string(),
                buffer_slot: 0,
                per_instance: false,
                format: VertexFormat::F32x3,
                byte_offset: 0,
            }],
            vertex_buffers: vec![VertexBufferBinding {
                resource: ResourceId(20),
                byte_offset: 0,
                byte_stride: 12,
                byte_size: None,
            }],
            index_buffer: None,
            draw: DrawParams {
                indexed: false,
                num_indices: 3,
                num_instances: 1,
                first_index: 0,
                base_vertex: 0,
                restart_enabled: false,
                restart_index: 0xffff_ffff,
            },
            shaders: ShaderBindings {
                vertex: Some(ResourceId(30)),
                pixel: Some(ResourceId(31)),
                ..ShaderBindings::default()
            },
            position_output: true,
            multiview_count: 1,
            backend,
        }
    }

    pub fn d3d11_snapshot() -> PipelineSnapshot {
        common(
            GraphicsApi::D3d11,
            BackendState::D3d11(D3d11State {
                rasterizer: D3dRasterizer {
                    cull_mode: CullMode::Back,
                    front_ccw: false,
                    depth_clip_enable: true,
                    scissor_enable: false,
                    depth_bias: DepthBias::default(),
                },
                output_merger: D3dDepthStencil {
                    depth_enable: true,
                    depth_function: CompareFunc::LessEqual,
                    depth_write_enable: true,
                    stencil_enable: false,
                    front: StencilFaceState::default(),
                    back: StencilFaceState::default(),
                },
            }),
        )
    }

    pub fn gl_snapshot() -> PipelineSnapshot {
        common(
            GraphicsApi::Gl,
            BackendState::Gl(GlState {
                vertex_processing: GlVertexProcessing {
                    discard: false,
                    clip_negative_one_to_one: false,
                },
                rasterizer: GlRasterizer {
                    cull_enabled: true,
                    cull_mode: CullMode::Back,
                    front_ccw: true,
                    depth_clamp: false,
                    depth_bias: DepthBias::default(),
                },
                depth: GlDepthState {
                    test_enabled: true,
                    function: CompareFunc::Less,
                    write_enabled: true,
                    bounds_enabled: false,
                    near_bound: 0.0,
                    far_bound: 1.0,
                },
                stencil: GlStencilState {
                    test_enabled: false,
                    front: StencilFaceState::default(),
                    back: StencilFaceState::default(),
                },
                sample: GlSampleState {
                    coverage_enabled: false,
                    coverage_invert: false,
                    coverage_value: 1.0,
                    alpha_to_coverage: false,
                },
            }),
        )
    }

    pub fn vulkan_snapshot() -> PipelineSnapshot {
        common(
            GraphicsApi::Vulkan,
            BackendState::Vulkan(VulkanState {
                rasterizer: VkRasterizer {
                    rasterizer_discard_enable: false,
                    cull_mode: CullMode::Back,
                    front_ccw: true,
                    depth_clamp_enable: false,
                    depth_bias: DepthBias::default(),
                },
                depth_stencil: VkDepthStencil {
                    depth_test_enable: true,
                    depth_function: CompareFunc::LessEqual,
                    depth_write_enable: true,
                    depth_bounds_enable: false,
                    min_depth_bounds: 0.0,
                    max_depth_bounds: 1.0,
                    stencil_test_enable: true,
                    front: StencilFaceState::default(),
                    back: StencilFaceState::default(),
                },
                render_area: RenderArea {
                    x: 0,
                    y: 0,
                    width: 256,
                    height: 256,
                },
            }),
        )
    }
}

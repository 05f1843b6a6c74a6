//! Snapshot builders for scripted-replay tests.
//!
//! These describe a healthy 256x256 draw of one triangle; scenario tests
//! mutate the returned snapshot to break exactly the state under test.

use drawtriage_state::snapshot::*;
use drawtriage_state::types::*;

pub const COLOR_TARGET: ResourceId = ResourceId(10);
pub const DEPTH_TARGET: ResourceId = ResourceId(11);
pub const VERTEX_BUFFER: ResourceId = ResourceId(20);
pub const INDEX_BUFFER: ResourceId = ResourceId(21);

fn common(event: EventId, api: GraphicsApi, backend: BackendState) -> PipelineSnapshot {
    PipelineSnapshot {
        event,
        api,
        color_targets: vec![BoundTarget {
            resource: COLOR_TARGET,
            first_mip: 0,
            first_slice: 0,
            format: TextureFormat::Rgba8Unorm,
            sample_count: 1,
        }],
        depth_target: Some(BoundTarget {
            resource: DEPTH_TARGET,
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
            resource: VERTEX_BUFFER,
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

pub fn d3d11_snapshot(event: EventId) -> PipelineSnapshot {
    common(
        event,
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

pub fn d3d12_snapshot(event: EventId) -> PipelineSnapshot {
    common(
        event,
        GraphicsApi::D3d12,
        BackendState::D3d12(D3d12State {
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
            depth_bounds_enable: false,
            min_depth_bounds: 0.0,
            max_depth_bounds: 1.0,
        }),
    )
}

pub fn gl_snapshot(event: EventId) -> PipelineSnapshot {
    common(
        event,
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

pub fn vulkan_snapshot(event: EventId) -> PipelineSnapshot {
    common(
        event,
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
                stencil_test_enable: false,
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

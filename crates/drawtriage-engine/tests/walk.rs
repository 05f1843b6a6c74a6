//! End-to-end walks of the diagnostic engine against scripted replays.

use drawtriage_engine::{analyse_draw, ResultStep};
use drawtriage_replay::fixtures::{
    d3d11_snapshot, gl_snapshot, vulkan_snapshot, COLOR_TARGET, DEPTH_TARGET, VERTEX_BUFFER,
};
use drawtriage_replay::{
    BufferDescription, DebugOverlay, EventUsage, ModValue, PixelModification, PixelValue,
    RejectionFlags, ReplayController, ResourceUsage, ScriptedReplay,
};
use drawtriage_state::{
    BackendState, CompareFunc, CullMode, EventId, PipelineStage, StencilFaceState,
};

const EID: EventId = EventId(100);

fn run(replay: &mut ScriptedReplay) -> Vec<ResultStep> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    analyse_draw(replay, EID).expect("analysis setup should succeed")
}

fn joined(steps: &[ResultStep]) -> String {
    steps
        .iter()
        .map(|s| s.message.as_str())
        .collect::<Vec<_>>()
        .join("\n---\n")
}

#[test]
fn healthy_draw_ends_with_the_exhaustion_step() {
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
    let steps = run(&mut replay);
    assert!(steps
        .last()
        .unwrap()
        .message
        .contains("couldn't figure out what was wrong"));
}

#[test]
fn no_bound_targets_is_a_terminal_conclusion() {
    let mut snapshot = d3d11_snapshot(EID);
    snapshot.color_targets.clear();
    snapshot.depth_target = None;
    let mut replay = ScriptedReplay::new(snapshot);

    let steps = run(&mut replay);
    assert_eq!(steps.len(), 1);
    assert!(steps[0].message.contains("No output render targets"));
}

#[test]
fn zero_count_draw_is_trivially_empty() {
    let mut snapshot = vulkan_snapshot(EID);
    snapshot.draw.num_indices = 0;
    let mut replay = ScriptedReplay::new(snapshot);

    let steps = run(&mut replay);
    assert_eq!(steps.len(), 1);
    assert!(steps[0].message.contains("trivially empty"));
}

#[test]
fn degenerate_viewport_stops_before_any_overlay() {
    let mut snapshot = d3d11_snapshot(EID);
    snapshot.viewport.width = 0.0;
    let mut replay = ScriptedReplay::new(snapshot);

    let steps = run(&mut replay);
    assert_eq!(steps.len(), 1);
    assert!(steps[0].message.contains("viewport is degenerate"));
    assert_eq!(steps[0].pipe_stage, Some(PipelineStage::ViewportsScissors));
}

#[test]
fn failed_scissor_is_reported_before_later_stages() {
    let mut snapshot = d3d11_snapshot(EID);
    if let BackendState::D3d11(d3d) = &mut snapshot.backend {
        d3d.rasterizer.scissor_enable = true;
    }
    let mut replay = ScriptedReplay::new(snapshot);
    // Scissor overlay signal only in the near-black noise bucket, and a
    // depth overlay that also fails. The scissor must win.
    let mut histogram = vec![0u32; 32];
    histogram[0] = 500;
    replay
        .overlay_histogram
        .insert(DebugOverlay::ViewportScissor, histogram);
    replay.fail_overlay(DebugOverlay::Depth);

    let steps = run(&mut replay);
    let all = joined(&steps);
    assert!(all.contains("entirely scissored out"));
    assert!(!all.contains("depth test overlay"));
    assert_eq!(
        steps.last().unwrap().pipe_stage,
        Some(PipelineStage::ViewportsScissors)
    );
}

#[test]
fn failed_backface_cull_names_winding_and_cull_mode() {
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
    replay.fail_overlay(DebugOverlay::BackfaceCull);

    let steps = run(&mut replay);
    let last = steps.last().unwrap();
    assert!(last.message.contains("completely backface culled"));
    assert!(last.message.contains("clockwise"));
    assert_eq!(last.pipe_stage, Some(PipelineStage::Rasterizer));
}

#[test]
fn depth_never_is_terminal() {
    let mut snapshot = d3d11_snapshot(EID);
    if let BackendState::D3d11(d3d) = &mut snapshot.backend {
        d3d.output_merger.depth_function = CompareFunc::Never;
    }
    let mut replay = ScriptedReplay::new(snapshot);
    replay.fail_overlay(DebugOverlay::Depth);

    let steps = run(&mut replay);
    let last = steps.last().unwrap();
    assert!(last.message.contains("Never"));
    assert_eq!(last.pipe_stage, Some(PipelineStage::DepthTest));
}

#[test]
fn depth_bounds_viewport_range_check_fires_before_vertex_check() {
    let mut snapshot = vulkan_snapshot(EID);
    if let BackendState::Vulkan(vk) = &mut snapshot.backend {
        vk.depth_stencil.depth_bounds_enable = true;
        vk.depth_stencil.min_depth_bounds = 0.2;
        vk.depth_stencil.max_depth_bounds = 0.3;
    }
    let mut replay = ScriptedReplay::new(snapshot);
    replay.postvs = vec![
        [-0.5, -0.5, 0.5, 1.0],
        [0.5, -0.5, 0.7, 1.0],
        [0.0, 0.5, 0.9, 1.0],
    ];
    replay.fail_overlay(DebugOverlay::Depth);

    let steps = run(&mut replay);
    let all = joined(&steps);
    assert!(all.contains("viewport depth range"));
    // The raw vertex-vs-bounds wording must not appear: the viewport
    // mapped check concluded first.
    assert!(!all.contains("NDC z"));
}

#[test]
fn uncleared_depth_falls_through_to_normal_occlusion() {
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
    replay.fail_overlay(DebugOverlay::Depth);

    let steps = run(&mut replay);
    let all = joined(&steps);
    assert!(all.contains("never cleared before this draw"));
    assert!(all.contains("failing the depth test normally"));
}

#[test]
fn impossible_depth_clear_value_is_called_out() {
    let mut snapshot = d3d11_snapshot(EID);
    if let BackendState::D3d11(d3d) = &mut snapshot.backend {
        d3d.output_merger.depth_function = CompareFunc::Greater;
    }
    let mut replay = ScriptedReplay::new(snapshot);
    replay.fail_overlay(DebugOverlay::Depth);
    replay.usages.insert(
        DEPTH_TARGET,
        vec![EventUsage {
            event_id: EventId(10),
            usage: ResourceUsage::Clear,
        }],
    );
    replay.picks.insert(
        (DEPTH_TARGET, EventId(10)),
        PixelValue::depth_stencil(1.0, 0),
    );

    let steps = run(&mut replay);
    let all = joined(&steps);
    assert!(all.contains("cleared depth to 1"));
    assert!(all.contains("never pass against the cleared value"));
}

#[test]
fn gl_clear_missing_the_target_is_called_out() {
    let mut snapshot = gl_snapshot(EID);
    // The scissor at clear time sits entirely off the 256x256 target.
    snapshot.scissors[0] = drawtriage_state::ScissorRect {
        enabled: true,
        x: 300,
        y: 0,
        width: 10,
        height: 10,
    };
    let mut replay = ScriptedReplay::new(snapshot);
    replay.fail_overlay(DebugOverlay::Depth);
    replay.usages.insert(
        DEPTH_TARGET,
        vec![EventUsage {
            event_id: EventId(10),
            usage: ResourceUsage::Clear,
        }],
    );

    let steps = run(&mut replay);
    assert!(joined(&steps).contains("the clear had no effect"));
}

#[test]
fn stencil_both_faces_impossible_is_attributed_to_the_test() {
    let mut snapshot = vulkan_snapshot(EID);
    let never = StencilFaceState {
        function: CompareFunc::Never,
        ..StencilFaceState::default()
    };
    if let BackendState::Vulkan(vk) = &mut snapshot.backend {
        vk.rasterizer.cull_mode = CullMode::None;
        vk.depth_stencil.stencil_test_enable = true;
        vk.depth_stencil.front = never;
        vk.depth_stencil.back = never;
    }
    let mut replay = ScriptedReplay::new(snapshot);
    replay.fail_overlay(DebugOverlay::Stencil);

    let steps = run(&mut replay);
    let last = steps.last().unwrap();
    assert!(last.message.contains("The stencil test can never pass"));
    assert!(!last.message.contains("front face"));
    assert!(!last.message.contains("back face"));
}

#[test]
fn stencil_clear_value_that_cannot_pass_is_called_out() {
    let mut snapshot = vulkan_snapshot(EID);
    let equal_one = StencilFaceState {
        function: CompareFunc::Equal,
        reference: 1,
        ..StencilFaceState::default()
    };
    if let BackendState::Vulkan(vk) = &mut snapshot.backend {
        vk.depth_stencil.stencil_test_enable = true;
        vk.depth_stencil.front = equal_one;
        vk.depth_stencil.back = equal_one;
    }
    let mut replay = ScriptedReplay::new(snapshot);
    replay.fail_overlay(DebugOverlay::Stencil);
    replay.usages.insert(
        DEPTH_TARGET,
        vec![EventUsage {
            event_id: EventId(10),
            usage: ResourceUsage::Clear,
        }],
    );
    replay.picks.insert(
        (DEPTH_TARGET, EventId(10)),
        PixelValue::depth_stencil(1.0, 0),
    );

    let steps = run(&mut replay);
    let all = joined(&steps);
    assert!(all.contains("cleared stencil to 0"));
    assert!(all.contains("cannot pass the stencil comparison"));
}

#[test]
fn pixel_history_attributes_the_occluding_draw() {
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
    replay.props.pixel_history = true;
    replay.fail_overlay(DebugOverlay::Depth);
    replay.histories.insert(
        COLOR_TARGET,
        vec![
            PixelModification {
                event_id: EventId(50),
                rejected_by: RejectionFlags::empty(),
                pre_mod: ModValue {
                    depth: 1.0,
                    ..ModValue::default()
                },
                post_mod: ModValue {
                    depth: 0.4,
                    ..ModValue::default()
                },
                shader_out: [1.0; 4],
            },
            PixelModification {
                event_id: EID,
                rejected_by: RejectionFlags::DEPTH_TEST,
                pre_mod: ModValue {
                    depth: 0.4,
                    ..ModValue::default()
                },
                post_mod: ModValue {
                    depth: 0.4,
                    ..ModValue::default()
                },
                shader_out: [0.5; 4],
            },
        ],
    );

    let steps = run(&mut replay);
    let all = joined(&steps);
    assert!(all.contains("The draw which wrote that value is EID 50"));
    // The step carries the history payload for the viewer.
    assert!(steps.iter().any(|s| s.pixel_history.is_some()));
}

#[test]
fn attribution_ignores_passing_draws_that_did_not_write_the_value() {
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
    replay.props.pixel_history = true;
    replay.fail_overlay(DebugOverlay::Depth);
    // EID 60 passes but leaves the stored depth unchanged (0.4 -> 0.4);
    // only EID 50 actually wrote the 0.4 this draw fails against.
    replay.histories.insert(
        COLOR_TARGET,
        vec![
            PixelModification {
                event_id: EventId(50),
                rejected_by: RejectionFlags::empty(),
                pre_mod: ModValue {
                    depth: 1.0,
                    ..ModValue::default()
                },
                post_mod: ModValue {
                    depth: 0.4,
                    ..ModValue::default()
                },
                shader_out: [1.0; 4],
            },
            PixelModification {
                event_id: EventId(60),
                rejected_by: RejectionFlags::empty(),
                pre_mod: ModValue {
                    depth: 0.4,
                    ..ModValue::default()
                },
                post_mod: ModValue {
                    depth: 0.4,
                    ..ModValue::default()
                },
                shader_out: [0.2; 4],
            },
            PixelModification {
                event_id: EID,
                rejected_by: RejectionFlags::DEPTH_TEST,
                pre_mod: ModValue {
                    depth: 0.4,
                    ..ModValue::default()
                },
                post_mod: ModValue {
                    depth: 0.4,
                    ..ModValue::default()
                },
                shader_out: [0.5; 4],
            },
        ],
    );

    let steps = run(&mut replay);
    let all = joined(&steps);
    assert!(all.contains("The draw which wrote that value is EID 50"));
    assert!(!all.contains("EID 60"));
}

#[test]
fn failed_fragments_with_no_occluder_say_so() {
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
    replay.props.pixel_history = true;
    replay.fail_overlay(DebugOverlay::Depth);
    replay.histories.insert(
        COLOR_TARGET,
        vec![PixelModification {
            event_id: EID,
            rejected_by: RejectionFlags::DEPTH_TEST,
            pre_mod: ModValue::default(),
            post_mod: ModValue::default(),
            shader_out: [0.5; 4],
        }],
    );

    let steps = run(&mut replay);
    assert!(joined(&steps).contains("No previous draw was detected"));
}

#[test]
fn zero_sample_mask_is_terminal() {
    let mut snapshot = d3d11_snapshot(EID);
    snapshot.sample_mask = Some(0);
    let mut replay = ScriptedReplay::new(snapshot);

    let steps = run(&mut replay);
    let last = steps.last().unwrap();
    assert!(last.message.contains("sample mask is 0"));
    assert_eq!(last.pipe_stage, Some(PipelineStage::SampleMask));
}

#[test]
fn gl_zero_sample_coverage_is_terminal() {
    let mut snapshot = gl_snapshot(EID);
    if let BackendState::Gl(gl) = &mut snapshot.backend {
        gl.sample.coverage_enabled = true;
        gl.sample.coverage_value = 0.0;
    }
    let mut replay = ScriptedReplay::new(snapshot);

    let steps = run(&mut replay);
    assert!(steps.last().unwrap().message.contains("GL_SAMPLE_COVERAGE"));
}

#[test]
fn all_zero_write_masks_with_depth_writes_off_is_terminal() {
    let mut snapshot = d3d11_snapshot(EID);
    snapshot.blend_targets[0].write_mask = drawtriage_state::ColorWriteMask::empty();
    if let BackendState::D3d11(d3d) = &mut snapshot.backend {
        d3d.output_merger.depth_write_enable = false;
    }
    let mut replay = ScriptedReplay::new(snapshot);

    let steps = run(&mut replay);
    let last = steps.last().unwrap();
    assert!(last.message.contains("write mask on every bound target is 0"));
    assert_eq!(last.pipe_stage, Some(PipelineStage::Blending));
}

#[test]
fn draw_writing_the_existing_color_is_terminal() {
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
    let value = PixelValue::from_float([0.25, 0.5, 0.75, 1.0]);
    replay.picks.insert((COLOR_TARGET, EID), value);
    let black =
        drawtriage_replay::overlay_resource(DebugOverlay::ClearBeforeDraw, [0.0, 0.0, 0.0, 1.0]);
    let white =
        drawtriage_replay::overlay_resource(DebugOverlay::ClearBeforeDraw, [1.0, 1.0, 1.0, 1.0]);
    replay.picks.insert((black, EID), value);
    replay.picks.insert((white, EID), value);

    let steps = run(&mut replay);
    assert!(steps
        .last()
        .unwrap()
        .message
        .contains("writes the same value"));
}

#[test]
fn all_discarding_fragments_are_reported() {
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
    replay.props.pixel_history = true;
    replay.histories.insert(
        COLOR_TARGET,
        vec![PixelModification {
            event_id: EID,
            rejected_by: RejectionFlags::SHADER_DISCARD,
            pre_mod: ModValue::default(),
            post_mod: ModValue::default(),
            shader_out: [0.0; 4],
        }],
    );

    let steps = run(&mut replay);
    assert!(joined(&steps).contains("discarding themselves in the shader"));
}

#[test]
fn rasterizer_discard_is_terminal_offscreen() {
    let mut snapshot = vulkan_snapshot(EID);
    if let BackendState::Vulkan(vk) = &mut snapshot.backend {
        vk.rasterizer.rasterizer_discard_enable = true;
    }
    let mut replay = ScriptedReplay::new(snapshot);
    replay.draw_offscreen();

    let steps = run(&mut replay);
    let last = steps.last().unwrap();
    assert!(last.message.contains("Rasterizer discard is enabled"));
    assert_eq!(last.pipe_stage, Some(PipelineStage::Rasterizer));
}

#[test]
fn reasonable_geometry_outside_the_viewport_is_legitimately_offscreen() {
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
    replay.draw_offscreen();
    replay.postvs = vec![
        [1.5, 0.0, 0.5, 1.0],
        [2.5, 0.0, 0.5, 1.0],
        [2.0, 1.0, 0.5, 1.0],
    ];

    let steps = run(&mut replay);
    assert!(joined(&steps).contains("legitimately off-screen"));
}

#[test]
fn broken_geometry_defers_to_vertex_input_validation() {
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
    replay.draw_offscreen();
    // Positions thousands of units outside the clip volume, fed by an
    // all-zero vertex buffer.
    replay.postvs = vec![
        [-4000.0, 0.0, 0.5, 1.0],
        [4000.0, 0.0, 0.5, 1.0],
        [0.0, 4000.0, 0.5, 1.0],
    ];
    replay.buffers = vec![BufferDescription {
        resource: VERTEX_BUFFER,
        byte_size: 36,
    }];
    replay.buffer_bytes.insert(VERTEX_BUFFER, vec![0u8; 36]);

    let steps = run(&mut replay);
    let all = joined(&steps);
    assert!(all.contains("looks broken"));
    assert!(all.contains("all zeroes"));
    assert!(all.contains("No write to that buffer was found"));
}

#[test]
fn all_w_zero_is_reported_and_vertex_inputs_inspected() {
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
    replay.draw_offscreen();
    replay.postvs = vec![[1.0, 1.0, 1.0, 0.0]; 3];
    replay.buffers = vec![BufferDescription {
        resource: VERTEX_BUFFER,
        byte_size: 36,
    }];
    // Varied, plausible position data: the inputs themselves are fine.
    replay
        .buffer_bytes
        .insert(VERTEX_BUFFER, (0..36).collect::<Vec<u8>>());

    let steps = run(&mut replay);
    let all = joined(&steps);
    assert!(all.contains("w == 0"));
    assert!(all.contains("found no problems"));
    assert!(all.contains("couldn't figure out what was wrong"));
}

#[test]
fn zero_transform_matrix_is_reported() {
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
    replay.draw_offscreen();
    replay.postvs = vec![[0.0, 0.0, 0.0, 1.0]; 3];
    replay.buffers = vec![BufferDescription {
        resource: VERTEX_BUFFER,
        byte_size: 36,
    }];
    replay
        .buffer_bytes
        .insert(VERTEX_BUFFER, (0..36).collect::<Vec<u8>>());
    replay.constants.push(drawtriage_replay::ConstantVariable {
        name: "world_view_proj".to_string(),
        rows: 4,
        columns: 4,
        values: vec![0.0; 16],
    });

    let steps = run(&mut replay);
    assert!(joined(&steps).contains("'world_view_proj' is all zeroes"));
}

#[test]
fn index_buffer_overread_is_reported() {
    let mut snapshot = d3d11_snapshot(EID);
    snapshot.draw.indexed = true;
    snapshot.draw.num_indices = 6;
    snapshot.index_buffer = Some(drawtriage_state::IndexBufferBinding {
        resource: drawtriage_replay::fixtures::INDEX_BUFFER,
        byte_offset: 0,
        index_byte_width: 2,
        byte_size: Some(6),
    });
    let mut replay = ScriptedReplay::new(snapshot);
    replay.draw_offscreen();
    replay.postvs = vec![[-4000.0, 0.0, 0.5, 1.0]; 3];
    replay.buffer_bytes.insert(
        drawtriage_replay::fixtures::INDEX_BUFFER,
        vec![0, 0, 1, 0, 2, 0],
    );
    replay.buffers = vec![BufferDescription {
        resource: VERTEX_BUFFER,
        byte_size: 64,
    }];
    replay
        .buffer_bytes
        .insert(VERTEX_BUFFER, (0..64).collect::<Vec<u8>>());

    let steps = run(&mut replay);
    assert!(joined(&steps).contains("only has 6 bytes available"));
}

#[test]
fn huge_first_index_reports_overread_without_wrapping() {
    let mut snapshot = d3d11_snapshot(EID);
    snapshot.draw.indexed = true;
    snapshot.draw.num_indices = 3;
    snapshot.draw.first_index = u32::MAX - 1;
    snapshot.index_buffer = Some(drawtriage_state::IndexBufferBinding {
        resource: drawtriage_replay::fixtures::INDEX_BUFFER,
        byte_offset: 0,
        index_byte_width: 4,
        byte_size: Some(12),
    });
    let mut replay = ScriptedReplay::new(snapshot);
    replay.draw_offscreen();
    replay.postvs = vec![[-4000.0, 0.0, 0.5, 1.0]; 3];
    replay
        .buffer_bytes
        .insert(drawtriage_replay::fixtures::INDEX_BUFFER, vec![0u8; 12]);
    replay.buffers = vec![BufferDescription {
        resource: VERTEX_BUFFER,
        byte_size: 64,
    }];
    replay
        .buffer_bytes
        .insert(VERTEX_BUFFER, (0..64).collect::<Vec<u8>>());

    let steps = run(&mut replay);
    assert!(joined(&steps).contains("only has 12 bytes available"));
}

#[test]
fn analysis_is_idempotent() {
    let build = || {
        let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
        replay.props.pixel_history = true;
        replay.fail_overlay(DebugOverlay::Depth);
        replay.overlay_coverage = (0..20).map(|i| (i, i)).collect();
        replay.histories.insert(
            COLOR_TARGET,
            vec![PixelModification {
                event_id: EID,
                rejected_by: RejectionFlags::DEPTH_TEST,
                pre_mod: ModValue::default(),
                post_mod: ModValue::default(),
                shader_out: [0.5; 4],
            }],
        );
        replay
    };
    let first = run(&mut build());
    let second = run(&mut build());
    assert_eq!(first, second);
}

#[test]
fn outputs_are_destroyed_and_position_restored_on_every_path() {
    // Terminal conclusion path.
    let mut snapshot = d3d11_snapshot(EID);
    snapshot.sample_mask = Some(0);
    let mut replay = ScriptedReplay::new(snapshot);
    replay.set_frame_event(EventId(7)).unwrap();
    run(&mut replay);
    assert!(replay.outputs_live.is_empty());
    assert_eq!(replay.outputs_created, 1);
    assert_eq!(replay.current_event(), EventId(7));

    // Exhaustion path.
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
    replay.set_frame_event(EventId(7)).unwrap();
    run(&mut replay);
    assert!(replay.outputs_live.is_empty());
    assert_eq!(replay.current_event(), EventId(7));
}

#[test]
fn setup_failure_yields_a_typed_error_and_no_leak() -> anyhow::Result<()> {
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EID));
    replay.fail_snapshot = true;
    replay.set_frame_event(EventId(7))?;

    let result = analyse_draw(&mut replay, EID);
    assert!(result.is_err());
    assert!(replay.outputs_live.is_empty());
    assert_eq!(replay.current_event(), EventId(7));
    Ok(())
}

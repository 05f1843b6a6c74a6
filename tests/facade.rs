//! Smoke tests of the public facade: hosts drive analyses through the
//! replay queue and consume serialized result steps.

use drawtriage::{EventId, ReplayQueue};
use drawtriage_replay::fixtures::d3d11_snapshot;
use drawtriage_replay::{DebugOverlay, ScriptedReplay};

#[test]
fn queued_analysis_produces_an_ordered_trail() {
    let mut replay = ScriptedReplay::new(d3d11_snapshot(EventId(100)));
    replay.fail_overlay(DebugOverlay::BackfaceCull);

    let queue = ReplayQueue::new(replay);
    let steps = queue.analyse_blocking(EventId(100)).unwrap();

    assert!(steps[0].message.contains("highlight drawcall overlay"));
    assert!(steps
        .last()
        .unwrap()
        .message
        .contains("completely backface culled"));
}

#[test]
fn result_steps_serialize_for_host_consumption() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let replay = ScriptedReplay::new(d3d11_snapshot(EventId(100)));
    let queue = ReplayQueue::new(replay);
    let steps = queue.analyse_blocking(EventId(100))?;

    let json = serde_json::to_string(&steps)?;
    let back: Vec<drawtriage::ResultStep> = serde_json::from_str(&json)?;
    assert_eq!(steps, back);
    Ok(())
}

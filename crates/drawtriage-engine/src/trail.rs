//! The diagnosis trail: the ordered, append-only sequence of result
//! steps an analysis produces, and the per-stage flow tag that replaces
//! exception-based short-circuiting.

use serde::{Deserialize, Serialize};

use drawtriage_replay::{PixelModification, TextureDisplay};
use drawtriage_state::{MeshDataStage, PipelineStage, ResourceId};

/// What a stage checker decided about the rest of the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Nothing conclusive; the walk proceeds to the next stage.
    Continue,
    /// A terminal conclusion was appended; no later stage may run.
    Stop,
}

impl Flow {
    pub fn stopped(self) -> bool {
        self == Flow::Stop
    }
}

/// Payload for "open the pixel history viewer on this pixel".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelHistoryPayload {
    pub resource: ResourceId,
    pub x: u32,
    pub y: u32,
    pub display: TextureDisplay,
    pub history: Vec<PixelModification>,
}

/// One entry in the diagnosis trail. The message is the narrative; the
/// optional references let the presentation layer jump to the relevant
/// viewer. Visualization hints are stored by value so later stages can
/// never retroactively change an already-appended step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultStep {
    pub message: String,
    pub tex_display: Option<TextureDisplay>,
    pub pipe_stage: Option<PipelineStage>,
    pub mesh_stage: Option<MeshDataStage>,
    pub pixel_history: Option<PixelHistoryPayload>,
}

impl ResultStep {
    pub fn text(message: impl Into<String>) -> Self {
        ResultStep {
            message: message.into(),
            tex_display: None,
            pipe_stage: None,
            mesh_stage: None,
            pixel_history: None,
        }
    }

    pub fn with_display(mut self, display: &TextureDisplay) -> Self {
        self.tex_display = Some(display.clone());
        self
    }

    pub fn with_stage(mut self, stage: PipelineStage) -> Self {
        self.pipe_stage = Some(stage);
        self
    }

    pub fn with_mesh(mut self, stage: MeshDataStage) -> Self {
        self.mesh_stage = Some(stage);
        self
    }

    pub fn with_history(mut self, payload: PixelHistoryPayload) -> Self {
        self.pixel_history = Some(payload);
        self
    }

    /// Whether the presentation layer should offer a "show more info"
    /// action for this step.
    pub fn has_details(&self) -> bool {
        self.tex_display.is_some()
            || self.pipe_stage.is_some()
            || self.mesh_stage.is_some()
            || self.pixel_history.is_some()
    }
}

/// Append-only step sequence. Order is the causal narrative of the
/// analysis, not a severity ranking.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trail {
    steps: Vec<ResultStep>,
}

impl Trail {
    pub fn push(&mut self, step: ResultStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[ResultStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_steps(self) -> Vec<ResultStep> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_details_requires_a_reference() {
        let step = ResultStep::text("plain note");
        assert!(!step.has_details());

        let step = ResultStep::text("with stage").with_stage(PipelineStage::DepthTest);
        assert!(step.has_details());

        let step = ResultStep::text("with display").with_display(&TextureDisplay::default());
        assert!(step.has_details());
    }

    #[test]
    fn display_hints_are_value_copies() {
        let mut display = TextureDisplay::default();
        let step = ResultStep::text("snapshot").with_display(&display);

        // Mutating the shared configuration afterwards must not change
        // what the step recorded.
        display.range_max = 123.0;
        assert_eq!(step.tex_display.as_ref().unwrap().range_max, 1.0);
    }

    #[test]
    fn trail_preserves_append_order() {
        let mut trail = Trail::default();
        trail.push(ResultStep::text("first"));
        trail.push(ResultStep::text("second"));
        assert_eq!(trail.steps()[0].message, "first");
        assert_eq!(trail.steps()[1].message, "second");
        assert_eq!(trail.len(), 2);
    }
}

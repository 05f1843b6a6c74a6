//! Focused stencil-test checker, entered when the stencil overlay
//! reports that no pixel of the draw passes.

use drawtriage_replay::{DebugOverlay, ReplayController, ReplayError};
use drawtriage_state::{
    raster_view, stencil_view, CompareFunc, CullMode, PipelineStage, StencilFaceState,
};

use crate::analysis::Analysis;
use crate::prior::PrevTest;
use crate::trail::ResultStep;

/// Stencil test: passes when `(stored & mask) FUNC (reference & mask)`.
pub(crate) fn stencil_passes(face: &StencilFaceState, stored: u32) -> bool {
    let lhs = stored & face.compare_mask;
    let rhs = face.reference & face.compare_mask;
    match face.function {
        CompareFunc::Never => false,
        CompareFunc::Less => lhs < rhs,
        CompareFunc::LessEqual => lhs <= rhs,
        CompareFunc::Greater => lhs > rhs,
        CompareFunc::GreaterEqual => lhs >= rhs,
        CompareFunc::Equal => lhs == rhs,
        CompareFunc::NotEqual => lhs != rhs,
        CompareFunc::Always => true,
    }
}

/// A reason this face's stencil test cannot pass for any stored value in
/// `0..=max_value`, or `None` when some value could pass.
fn impossible_reason(face: &StencilFaceState, max_value: u32) -> Option<String> {
    let masked_ref = face.reference & face.compare_mask;
    let masked_max = max_value & face.compare_mask;
    match face.function {
        CompareFunc::Never => Some("the compare function is Never".to_string()),
        CompareFunc::Less if masked_ref == 0 => Some(format!(
            "the compare function is Less with a masked reference of 0 (reference {}, \
             compare mask {:#x}); no stencil value is below 0",
            face.reference, face.compare_mask
        )),
        CompareFunc::Greater if masked_ref >= masked_max => Some(format!(
            "the compare function is Greater with a masked reference of {masked_ref} \
             (reference {}, compare mask {:#x}); no masked stencil value can exceed \
             {masked_max}",
            face.reference, face.compare_mask
        )),
        CompareFunc::GreaterEqual if masked_ref > masked_max => Some(format!(
            "the compare function is Greater-Equal with a masked reference of \
             {masked_ref} (reference {}, compare mask {:#x}); the highest possible \
             masked stencil value is {masked_max}",
            face.reference, face.compare_mask
        )),
        CompareFunc::Equal if masked_ref > masked_max => Some(format!(
            "the compare function is Equal with a masked reference of {masked_ref} \
             (reference {}, compare mask {:#x}); the highest possible masked stencil \
             value is {masked_max}",
            face.reference, face.compare_mask
        )),
        _ => None,
    }
}

impl<'r, R: ReplayController> Analysis<'r, R> {
    pub(crate) fn check_failed_stencil(&mut self) -> Result<(), ReplayError> {
        self.display.overlay = DebugOverlay::Stencil;
        self.trail.push(
            ResultStep::text(
                "The stencil test overlay shows red, so the draw is completely failing \
                 a stencil test.",
            )
            .with_display(&self.display),
        );

        let view = stencil_view(&self.snapshot);
        if !view.test_enabled {
            self.trail.push(
                ResultStep::text(
                    "The stencil test is disabled, yet the stencil overlay reports \
                     every pixel failing.\n\nPlease check your depth-stencil setup and \
                     report an issue so this can be investigated.",
                )
                .with_stage(PipelineStage::StencilTest),
            );
            return Ok(());
        }

        let cull = raster_view(&self.snapshot).cull_mode;
        let (front, back) = view.effective_faces(cull);
        let max_value = self.max_stencil_value();

        let front_reason = impossible_reason(&front, max_value);
        let back_reason = impossible_reason(&back, max_value);
        match (&front_reason, &back_reason) {
            (Some(reason), Some(_)) => {
                // Same state on both live faces, or only one face can
                // rasterize: this is the whole test, not one face of it.
                let reason = if front == back || cull != CullMode::None {
                    reason.clone()
                } else {
                    format!(
                        "front faces: {}; back faces: {}",
                        reason,
                        back_reason.as_deref().unwrap_or_default()
                    )
                };
                self.trail.push(
                    ResultStep::text(format!("The stencil test can never pass: {reason}."))
                        .with_stage(PipelineStage::StencilTest),
                );
                return Ok(());
            }
            (Some(reason), None) => {
                self.trail.push(
                    ResultStep::text(format!(
                        "The front face stencil test can never pass: {reason}. Back \
                         faces could still pass, so this alone may not be the problem."
                    ))
                    .with_stage(PipelineStage::StencilTest),
                );
            }
            (None, Some(reason)) => {
                self.trail.push(
                    ResultStep::text(format!(
                        "The back face stencil test can never pass: {reason}. Front \
                         faces could still pass, so this alone may not be the problem."
                    ))
                    .with_stage(PipelineStage::StencilTest),
                );
            }
            (None, None) => {}
        }

        if front.function == CompareFunc::NotEqual || back.function == CompareFunc::NotEqual {
            self.trail.push(
                ResultStep::text(
                    "A stencil compare function of Not-Equal is not invalid, but it is \
                     unusual and fails whenever the stored value matches the reference.",
                )
                .with_stage(PipelineStage::StencilTest),
            );
        }

        self.check_previous_contents(PrevTest::Stencil { front, back })
    }

    /// Highest storable stencil value, from the bound depth-stencil
    /// format's stencil bit depth. Defaults to 8 bits when no stencil
    /// plane is identifiable.
    pub(crate) fn max_stencil_value(&self) -> u32 {
        let bits = self
            .snapshot
            .depth_target
            .map(|t| t.format.stencil_bits())
            .filter(|&b| b > 0)
            .unwrap_or(8);
        (1u32 << bits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawtriage_state::StencilOp;

    fn face(function: CompareFunc, reference: u32, compare_mask: u32) -> StencilFaceState {
        StencilFaceState {
            function,
            reference,
            compare_mask,
            write_mask: 0xff,
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
        }
    }

    #[test]
    fn less_than_zero_reference_is_impossible() {
        assert!(impossible_reason(&face(CompareFunc::Less, 0, 0xff), 255).is_some());
        assert!(impossible_reason(&face(CompareFunc::Less, 1, 0xff), 255).is_none());
        // Masked down to zero counts too.
        assert!(impossible_reason(&face(CompareFunc::Less, 0xf0, 0x0f), 255).is_some());
    }

    #[test]
    fn greater_than_max_reference_is_impossible() {
        assert!(impossible_reason(&face(CompareFunc::Greater, 255, 0xff), 255).is_some());
        assert!(impossible_reason(&face(CompareFunc::Greater, 254, 0xff), 255).is_none());
    }

    #[test]
    fn max_value_respects_narrow_stencil_formats() {
        // A 4-bit stencil plane tops out at 15, so Greater with ref 15
        // already cannot pass.
        assert!(impossible_reason(&face(CompareFunc::Greater, 15, 0xff), 15).is_some());
        assert!(impossible_reason(&face(CompareFunc::GreaterEqual, 16, 0xff), 15).is_some());
        assert!(impossible_reason(&face(CompareFunc::Equal, 16, 0xff), 15).is_some());
        assert!(impossible_reason(&face(CompareFunc::Equal, 15, 0xff), 15).is_none());
    }

    #[test]
    fn comparison_is_masked_stored_versus_masked_reference() {
        let f = face(CompareFunc::Equal, 0x1f, 0x0f);
        assert!(stencil_passes(&f, 0x0f));
        assert!(stencil_passes(&f, 0xff));
        assert!(!stencil_passes(&f, 0x0e));

        let f = face(CompareFunc::Never, 0, 0xff);
        assert!(!stencil_passes(&f, 0));
    }
}

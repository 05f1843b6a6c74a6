//! Pixel history and resource usage records.

use serde::{Deserialize, Serialize};

use drawtriage_state::EventId;

bitflags::bitflags! {
    /// Which pipeline stage rejected a fragment. Empty flags mean the
    /// fragment passed every test and was written (or blended).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct RejectionFlags: u16 {
        const SAMPLE_MASK = 1 << 0;
        const BACKFACE_CULL = 1 << 1;
        const DEPTH_CLIP = 1 << 2;
        const DEPTH_BOUNDS = 1 << 3;
        const SCISSOR = 1 << 4;
        const SHADER_DISCARD = 1 << 5;
        const DEPTH_TEST = 1 << 6;
        const STENCIL_TEST = 1 << 7;
    }
}

/// Depth/stencil/color values at one point in a pixel's modification
/// history.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModValue {
    pub depth: f32,
    pub stencil: u32,
    pub color: [f32; 4],
}

/// One fragment's attempt to modify a pixel, oldest history entries
/// first. `pre_mod`/`post_mod` bracket the fragment; for failed
/// fragments they are equal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelModification {
    pub event_id: EventId,
    pub rejected_by: RejectionFlags,
    pub pre_mod: ModValue,
    pub post_mod: ModValue,
    pub shader_out: [f32; 4],
}

impl PixelModification {
    pub fn passed(&self) -> bool {
        self.rejected_by.is_empty()
    }
}

/// How a resource was used at one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceUsage {
    Clear,
    ColorTarget,
    DepthStencilTarget,
    VertexBuffer,
    IndexBuffer,
    ConstantBuffer,
    ShaderRead,
    CopySrc,
    CopyDst,
}

impl ResourceUsage {
    /// Usages that write the resource's contents, used for last-write
    /// provenance in vertex input validation.
    pub fn writes_contents(self) -> bool {
        matches!(
            self,
            ResourceUsage::Clear
                | ResourceUsage::ColorTarget
                | ResourceUsage::DepthStencilTarget
                | ResourceUsage::CopyDst
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventUsage {
    pub event_id: EventId,
    pub usage: ResourceUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passed_means_no_rejection_flags() {
        let mut m = PixelModification {
            event_id: EventId(5),
            rejected_by: RejectionFlags::empty(),
            pre_mod: ModValue::default(),
            post_mod: ModValue::default(),
            shader_out: [0.0; 4],
        };
        assert!(m.passed());
        m.rejected_by = RejectionFlags::DEPTH_TEST;
        assert!(!m.passed());
    }

    #[test]
    fn write_usages() {
        assert!(ResourceUsage::Clear.writes_contents());
        assert!(ResourceUsage::CopyDst.writes_contents());
        assert!(!ResourceUsage::VertexBuffer.writes_contents());
        assert!(!ResourceUsage::ShaderRead.writes_contents());
    }
}

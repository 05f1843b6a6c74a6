//! Overlay oracle: turns the replay layer's debug-overlay renders into
//! boolean and quantitative signals ("did any pixel pass this stage?").

use drawtriage_replay::{
    CompType, DebugOverlay, PixelValue, ReplayController, ReplayError, Subresource,
};
use drawtriage_state::ResourceId;

use crate::analysis::{Analysis, OVERLAY_PASS_THRESHOLD};

/// Bucket count for histogram-based overlay signals.
const HISTOGRAM_BUCKETS: u32 = 32;
/// Buckets whose midpoint lies this close to pure black or pure white
/// are treated as background/highlight noise, not stage signal.
const NOISE_BUCKET_MARGIN: f32 = 0.02;

impl<'r, R: ReplayController> Analysis<'r, R> {
    /// Render `overlay` into the session output and return the overlay
    /// texture's min/max.
    pub(crate) fn overlay_minmax(
        &mut self,
        overlay: DebugOverlay,
    ) -> Result<(PixelValue, PixelValue), ReplayError> {
        let resource = self.render_overlay(overlay)?;
        self.replay
            .min_max(resource, Subresource::default(), CompType::Typeless)
    }

    /// Whether any pixel passed the stage `overlay` visualizes: pass/fail
    /// overlays paint passing pixels green.
    pub(crate) fn overlay_passes(&mut self, overlay: DebugOverlay) -> Result<bool, ReplayError> {
        let (_, texmax) = self.overlay_minmax(overlay)?;
        Ok(texmax.float_value[1] >= OVERLAY_PASS_THRESHOLD)
    }

    /// Scissor signal. The viewport/scissor overlay is not a binary
    /// red/green render, so min/max cannot distinguish "all rejected"
    /// from "all passed"; a histogram with the near-black and near-white
    /// noise buckets filtered out can.
    pub(crate) fn scissor_overlay_passes(&mut self) -> Result<bool, ReplayError> {
        let resource = self.render_overlay(DebugOverlay::ViewportScissor)?;
        let histogram = self.replay.histogram(
            resource,
            Subresource::default(),
            (0.0, 1.0),
            HISTOGRAM_BUCKETS,
        )?;
        let mut signal = 0u64;
        for (index, count) in histogram.iter().enumerate() {
            let midpoint = (index as f32 + 0.5) / histogram.len() as f32;
            if midpoint <= NOISE_BUCKET_MARGIN || midpoint >= 1.0 - NOISE_BUCKET_MARGIN {
                continue;
            }
            signal += u64::from(*count);
        }
        Ok(signal > 0)
    }

    /// All pixels the draw rasterizes to, scanned row-major from the
    /// drawcall highlight overlay readback.
    pub(crate) fn covered_pixels(&mut self) -> Result<Vec<(u32, u32)>, ReplayError> {
        let resource = self.render_overlay(DebugOverlay::Drawcall)?;
        let data = self.replay.texture_data(resource, Subresource::default())?;
        let mut covered = Vec::new();
        for y in 0..data.height {
            for x in 0..data.width {
                if let Some(pixel) = data.pixel(x, y) {
                    if pixel[0] != 0 {
                        covered.push((x, y));
                    }
                }
            }
        }
        Ok(covered)
    }

    pub(crate) fn first_covered_pixel(&mut self) -> Result<Option<(u32, u32)>, ReplayError> {
        Ok(self.covered_pixels()?.into_iter().next())
    }

    /// Render `overlay` and return the texture holding the result.
    pub(crate) fn render_overlay(
        &mut self,
        overlay: DebugOverlay,
    ) -> Result<ResourceId, ReplayError> {
        self.display.overlay = overlay;
        self.replay.set_texture_display(self.output, &self.display)?;
        self.replay.overlay_texture(self.output)
    }
}

//! In-memory [`ReplayController`] with scripted responses, for driving
//! the diagnostic engine in tests without a live capture.
//!
//! Every oracle input the engine consults is a plain field on
//! [`ScriptedReplay`]; fixtures set only what their scenario needs.
//! Defaults describe a healthy draw: onscreen, every overlay passing,
//! no pixel history.

use std::collections::{HashMap, HashSet};

use drawtriage_state::{
    CompType, EventId, MeshDataStage, PipelineSnapshot, ResourceId, ShaderStage,
};

use crate::controller::{
    ApiProperties, BufferDescription, ConstantVariable, OutputHandle, ReplayController,
    ReplayError, TextureDescription,
};
use crate::display::{DebugOverlay, PixelValue, Subresource, TextureData, TextureDisplay};
use crate::history::{EventUsage, PixelModification};

/// Synthetic resource ids handed out for rendered overlays, one per
/// overlay mode. For `ClearBeforeDraw` the id also encodes the cleared
/// background so picks can distinguish the black and white renders.
pub fn overlay_resource(overlay: DebugOverlay, background: [f32; 4]) -> ResourceId {
    let base: u64 = 0xd1a6_0000;
    let ordinal = match overlay {
        DebugOverlay::None => 0,
        DebugOverlay::Drawcall => 1,
        DebugOverlay::BackfaceCull => 2,
        DebugOverlay::Depth => 3,
        DebugOverlay::Stencil => 4,
        DebugOverlay::ViewportScissor => 5,
        DebugOverlay::ClearBeforeDraw => {
            if background[0] > 0.5 {
                7
            } else {
                6
            }
        }
    };
    ResourceId(base + ordinal)
}

pub struct ScriptedReplay {
    pub props: ApiProperties,
    pub snapshot: PipelineSnapshot,
    pub textures: Vec<TextureDescription>,
    pub buffers: Vec<BufferDescription>,

    /// Clip-space positions returned for every (instance, view) pair.
    pub postvs: Vec<[f32; 4]>,
    pub buffer_bytes: HashMap<ResourceId, Vec<u8>>,
    pub constants: Vec<ConstantVariable>,

    /// Per-overlay min/max readback. Missing entries report a passing
    /// overlay (max green = 1).
    pub overlay_minmax: HashMap<DebugOverlay, (PixelValue, PixelValue)>,
    /// Per-overlay histogram. Missing entries report weight in a middle
    /// bucket.
    pub overlay_histogram: HashMap<DebugOverlay, Vec<u32>>,
    /// Pixels the `Drawcall` overlay readback reports as covered.
    pub overlay_coverage: Vec<(u32, u32)>,

    /// Min/max of real (non-overlay) textures.
    pub texture_minmax: HashMap<ResourceId, (PixelValue, PixelValue)>,
    /// Pick results keyed by (resource, replay position at pick time).
    pub picks: HashMap<(ResourceId, EventId), PixelValue>,
    pub histories: HashMap<ResourceId, Vec<PixelModification>>,
    pub usages: HashMap<ResourceId, Vec<EventUsage>>,

    /// Events the controller refuses to seek to (setup-fault scenarios).
    pub unseekable: HashSet<EventId>,
    pub fail_snapshot: bool,

    // Observable side effects, asserted on by resource-cleanup tests.
    pub seek_log: Vec<EventId>,
    pub outputs_created: u32,
    pub outputs_live: HashSet<OutputHandle>,

    current: EventId,
    next_output: u64,
    output_dims: HashMap<OutputHandle, (u32, u32)>,
    last_display: Option<TextureDisplay>,
}

impl ScriptedReplay {
    pub fn new(snapshot: PipelineSnapshot) -> Self {
        let props = ApiProperties {
            api: snapshot.api,
            pixel_history: false,
        };
        // Describe every bound target as a 256x256 texture unless the
        // fixture overrides.
        let textures = snapshot
            .bound_targets()
            .iter()
            .map(|t| TextureDescription {
                resource: t.resource,
                width: 256,
                height: 256,
                format: t.format,
            })
            .collect();
        ScriptedReplay {
            props,
            snapshot,
            textures,
            buffers: Vec::new(),
            postvs: vec![
                [-0.5, -0.5, 0.5, 1.0],
                [0.5, -0.5, 0.5, 1.0],
                [0.0, 0.5, 0.5, 1.0],
            ],
            buffer_bytes: HashMap::new(),
            constants: Vec::new(),
            overlay_minmax: HashMap::new(),
            overlay_histogram: HashMap::new(),
            overlay_coverage: vec![(1, 1)],
            texture_minmax: HashMap::new(),
            picks: HashMap::new(),
            histories: HashMap::new(),
            usages: HashMap::new(),
            unseekable: HashSet::new(),
            fail_snapshot: false,
            seek_log: Vec::new(),
            outputs_created: 0,
            outputs_live: HashSet::new(),
            current: EventId(0),
            next_output: 1,
            output_dims: HashMap::new(),
            last_display: None,
        }
    }

    /// Mark an overlay as completely failing (no pixel passed).
    pub fn fail_overlay(&mut self, overlay: DebugOverlay) {
        self.overlay_minmax.insert(
            overlay,
            (
                PixelValue::from_float([0.0, 0.0, 0.0, 0.0]),
                PixelValue::from_float([1.0, 0.0, 0.0, 1.0]),
            ),
        );
    }

    /// Make the `Drawcall` overlay report an offscreen draw.
    pub fn draw_offscreen(&mut self) {
        self.overlay_minmax.insert(
            DebugOverlay::Drawcall,
            (
                PixelValue::from_float([0.0; 4]),
                PixelValue::from_float([0.0; 4]),
            ),
        );
        self.overlay_coverage.clear();
    }

    fn overlay_dims(&self, output: OutputHandle) -> (u32, u32) {
        self.output_dims.get(&output).copied().unwrap_or((256, 256))
    }

    fn default_minmax(passing: bool) -> (PixelValue, PixelValue) {
        if passing {
            (
                PixelValue::from_float([0.0, 0.0, 0.0, 0.0]),
                PixelValue::from_float([1.0, 1.0, 0.0, 1.0]),
            )
        } else {
            (
                PixelValue::from_float([0.0; 4]),
                PixelValue::from_float([0.0; 4]),
            )
        }
    }
}

impl ReplayController for ScriptedReplay {
    fn api_properties(&self) -> ApiProperties {
        self.props
    }

    fn current_event(&self) -> EventId {
        self.current
    }

    fn set_frame_event(&mut self, event: EventId) -> Result<(), ReplayError> {
        if self.unseekable.contains(&event) {
            return Err(ReplayError::SeekFailed { event });
        }
        self.current = event;
        self.seek_log.push(event);
        Ok(())
    }

    fn pipeline_snapshot(&mut self) -> Result<PipelineSnapshot, ReplayError> {
        if self.fail_snapshot {
            return Err(ReplayError::SnapshotUnavailable {
                event: self.current,
            });
        }
        Ok(self.snapshot.clone())
    }

    fn textures(&mut self) -> Result<Vec<TextureDescription>, ReplayError> {
        Ok(self.textures.clone())
    }

    fn buffers(&mut self) -> Result<Vec<BufferDescription>, ReplayError> {
        Ok(self.buffers.clone())
    }

    fn post_vs_positions(
        &mut self,
        _instance: u32,
        _view: u32,
        _stage: MeshDataStage,
    ) -> Result<Vec<[f32; 4]>, ReplayError> {
        Ok(self.postvs.clone())
    }

    fn buffer_data(
        &mut self,
        resource: ResourceId,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, ReplayError> {
        let bytes = self
            .buffer_bytes
            .get(&resource)
            .ok_or(ReplayError::UnknownResource { resource })?;
        let start = (offset as usize).min(bytes.len());
        let end = (offset.saturating_add(length) as usize).min(bytes.len());
        Ok(bytes[start..end].to_vec())
    }

    fn constant_variables(
        &mut self,
        _stage: ShaderStage,
    ) -> Result<Vec<ConstantVariable>, ReplayError> {
        Ok(self.constants.clone())
    }

    fn create_output(&mut self, width: u32, height: u32) -> Result<OutputHandle, ReplayError> {
        let handle = OutputHandle(self.next_output);
        self.next_output += 1;
        self.outputs_created += 1;
        self.outputs_live.insert(handle);
        self.output_dims.insert(handle, (width, height));
        Ok(handle)
    }

    fn destroy_output(&mut self, output: OutputHandle) {
        self.outputs_live.remove(&output);
    }

    fn set_texture_display(
        &mut self,
        output: OutputHandle,
        display: &TextureDisplay,
    ) -> Result<(), ReplayError> {
        if !self.outputs_live.contains(&output) {
            return Err(ReplayError::UnknownOutput(output));
        }
        self.last_display = Some(display.clone());
        Ok(())
    }

    fn overlay_texture(&mut self, output: OutputHandle) -> Result<ResourceId, ReplayError> {
        if !self.outputs_live.contains(&output) {
            return Err(ReplayError::UnknownOutput(output));
        }
        let display = self.last_display.as_ref().cloned().unwrap_or_default();
        Ok(overlay_resource(display.overlay, display.background_color))
    }

    fn min_max(
        &mut self,
        resource: ResourceId,
        _subresource: Subresource,
        _type_cast: CompType,
    ) -> Result<(PixelValue, PixelValue), ReplayError> {
        for overlay in [
            DebugOverlay::Drawcall,
            DebugOverlay::BackfaceCull,
            DebugOverlay::Depth,
            DebugOverlay::Stencil,
            DebugOverlay::ViewportScissor,
        ] {
            if resource == overlay_resource(overlay, [0.0; 4]) {
                return Ok(self
                    .overlay_minmax
                    .get(&overlay)
                    .copied()
                    .unwrap_or_else(|| Self::default_minmax(true)));
            }
        }
        Ok(self
            .texture_minmax
            .get(&resource)
            .copied()
            .unwrap_or_else(|| Self::default_minmax(true)))
    }

    fn histogram(
        &mut self,
        resource: ResourceId,
        _subresource: Subresource,
        _range: (f32, f32),
        buckets: u32,
    ) -> Result<Vec<u32>, ReplayError> {
        if resource == overlay_resource(DebugOverlay::ViewportScissor, [0.0; 4]) {
            if let Some(histogram) = self.overlay_histogram.get(&DebugOverlay::ViewportScissor) {
                return Ok(histogram.clone());
            }
        }
        // Default: weight in a middle bucket, i.e. the check passes.
        let mut histogram = vec![0u32; buckets as usize];
        if let Some(mid) = histogram.get_mut(buckets as usize / 2) {
            *mid = 64;
        }
        Ok(histogram)
    }

    fn texture_data(
        &mut self,
        resource: ResourceId,
        _subresource: Subresource,
    ) -> Result<TextureData, ReplayError> {
        if resource != overlay_resource(DebugOverlay::Drawcall, [0.0; 4]) {
            return Err(ReplayError::ReadbackFailed {
                resource,
                reason: "scripted replay only reads back the drawcall overlay".to_string(),
            });
        }
        let output = *self.outputs_live.iter().next().ok_or(
            ReplayError::ReadbackFailed {
                resource,
                reason: "no live output".to_string(),
            },
        )?;
        let (width, height) = self.overlay_dims(output);
        let mut bytes = vec![0u8; width as usize * height as usize * TextureData::BYTES_PER_PIXEL];
        for &(x, y) in &self.overlay_coverage {
            if x < width && y < height {
                let at = (y as usize * width as usize + x as usize) * TextureData::BYTES_PER_PIXEL;
                bytes[at..at + 2].copy_from_slice(&1u16.to_le_bytes());
            }
        }
        Ok(TextureData {
            width,
            height,
            bytes,
        })
    }

    fn pick_pixel(
        &mut self,
        resource: ResourceId,
        _x: u32,
        _y: u32,
        _subresource: Subresource,
        _type_cast: CompType,
    ) -> Result<PixelValue, ReplayError> {
        if let Some(value) = self.picks.get(&(resource, self.current)) {
            return Ok(*value);
        }
        // Unscripted picks of the clear-before-draw renders return their
        // background, i.e. the draw's output differs between backgrounds.
        if resource == overlay_resource(DebugOverlay::ClearBeforeDraw, [0.0, 0.0, 0.0, 1.0]) {
            return Ok(PixelValue::from_float([0.0, 0.0, 0.0, 1.0]));
        }
        if resource == overlay_resource(DebugOverlay::ClearBeforeDraw, [1.0, 1.0, 1.0, 1.0]) {
            return Ok(PixelValue::from_float([1.0, 1.0, 1.0, 1.0]));
        }
        Ok(PixelValue::default())
    }

    fn pixel_history(
        &mut self,
        resource: ResourceId,
        _x: u32,
        _y: u32,
        _subresource: Subresource,
        _type_cast: CompType,
    ) -> Result<Vec<PixelModification>, ReplayError> {
        if !self.props.pixel_history {
            return Err(ReplayError::PixelHistoryUnsupported);
        }
        Ok(self.histories.get(&resource).cloned().unwrap_or_default())
    }

    fn usage(&mut self, resource: ResourceId) -> Result<Vec<EventUsage>, ReplayError> {
        Ok(self.usages.get(&resource).cloned().unwrap_or_default())
    }
}

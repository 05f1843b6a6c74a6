//! Texture display configuration and overlay readback value types.

use serde::{Deserialize, Serialize};

use drawtriage_state::{CompType, ResourceId};

/// A mip/slice/sample coordinate within a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subresource {
    pub mip: u32,
    pub slice: u32,
    pub sample: u32,
}

/// Debug visualization modes the replay layer can render over a target.
/// Pass/fail overlays paint surviving pixels green and rejected ones red;
/// `Drawcall` highlights every pixel the draw rasterizes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DebugOverlay {
    None,
    Drawcall,
    BackfaceCull,
    Depth,
    Stencil,
    ViewportScissor,
    /// Re-renders the draw over a background cleared to
    /// [`TextureDisplay::background_color`].
    ClearBeforeDraw,
}

/// How a texture (and optionally an overlay on top of it) should be
/// displayed. Steps store value copies of this so later mutation can
/// never retroactively change an earlier step's visualization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureDisplay {
    pub resource: ResourceId,
    pub subresource: Subresource,
    pub type_cast: CompType,
    pub range_min: f32,
    pub range_max: f32,
    pub overlay: DebugOverlay,
    /// Background for the `ClearBeforeDraw` overlay, RGBA.
    pub background_color: [f32; 4],
}

impl Default for TextureDisplay {
    fn default() -> Self {
        TextureDisplay {
            resource: ResourceId::NULL,
            subresource: Subresource::default(),
            type_cast: CompType::Typeless,
            range_min: 0.0,
            range_max: 1.0,
            overlay: DebugOverlay::None,
            background_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// A single pixel's value in all three channel interpretations; which
/// array is meaningful depends on the texture's component type.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelValue {
    pub float_value: [f32; 4],
    pub int_value: [i32; 4],
    pub uint_value: [u32; 4],
}

impl PixelValue {
    pub fn from_float(value: [f32; 4]) -> Self {
        PixelValue {
            float_value: value,
            ..PixelValue::default()
        }
    }

    /// Depth readbacks place the depth value in the first float channel
    /// and the stencil value in the second uint channel.
    pub fn depth_stencil(depth: f32, stencil: u32) -> Self {
        PixelValue {
            float_value: [depth, 0.0, 0.0, 0.0],
            uint_value: [0, stencil, 0, 0],
            ..PixelValue::default()
        }
    }

    pub fn depth(&self) -> f32 {
        self.float_value[0]
    }

    pub fn stencil(&self) -> u32 {
        self.uint_value[1]
    }
}

/// Raw pixel readback of a (typically overlay) texture. Pixels are
/// RGBA16, 8 bytes each, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl TextureData {
    pub const BYTES_PER_PIXEL: usize = 8;

    /// RGBA16 channel values at (x, y), or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u16; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * Self::BYTES_PER_PIXEL;
        let bytes = self.bytes.get(at..at + Self::BYTES_PER_PIXEL)?;
        Some([
            u16::from_le_bytes([bytes[0], bytes[1]]),
            u16::from_le_bytes([bytes[2], bytes[3]]),
            u16::from_le_bytes([bytes[4], bytes[5]]),
            u16::from_le_bytes([bytes[6], bytes[7]]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_data_pixel_access() {
        let mut bytes = vec![0u8; 2 * 2 * TextureData::BYTES_PER_PIXEL];
        // Pixel (1, 1): R = 0x1234.
        let at = (1 * 2 + 1) * TextureData::BYTES_PER_PIXEL;
        bytes[at..at + 2].copy_from_slice(&0x1234u16.to_le_bytes());
        let data = TextureData {
            width: 2,
            height: 2,
            bytes,
        };
        assert_eq!(data.pixel(1, 1).unwrap()[0], 0x1234);
        assert_eq!(data.pixel(0, 0).unwrap()[0], 0);
        assert_eq!(data.pixel(2, 0), None);
    }

    #[test]
    fn depth_stencil_channels() {
        let value = PixelValue::depth_stencil(0.5, 128);
        assert_eq!(value.depth(), 0.5);
        assert_eq!(value.stencil(), 128);
    }
}

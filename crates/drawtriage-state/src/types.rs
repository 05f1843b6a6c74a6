//! Shared identifier and enum types used across snapshots, the replay
//! contract and the diagnostic trail.

use serde::{Deserialize, Serialize};

/// One unit of GPU work at a specific point in the linearized capture
/// timeline. Event ids are totally ordered: `a < b` means `a` executed
/// before `b` during the captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u32);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EID {}", self.0)
    }
}

/// Opaque handle naming a texture or buffer inside the loaded capture.
///
/// `ResourceId::NULL` means "nothing bound".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl ResourceId {
    pub const NULL: ResourceId = ResourceId(0);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResourceId({})", self.0)
    }
}

/// The graphics API the capture was recorded from. Selects which
/// [`BackendState`](crate::snapshot::BackendState) variant a snapshot
/// carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphicsApi {
    Gl,
    Vulkan,
    D3d11,
    D3d12,
}

impl GraphicsApi {
    pub fn is_d3d(self) -> bool {
        matches!(self, GraphicsApi::D3d11 | GraphicsApi::D3d12)
    }
}

/// Depth/stencil comparison function.
///
/// For stencil, the test passes when
/// `(stored & compare_mask) FUNC (reference & compare_mask)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl std::fmt::Display for CompareFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompareFunc::Never => "Never",
            CompareFunc::Less => "Less",
            CompareFunc::Equal => "Equal",
            CompareFunc::LessEqual => "Less-Equal",
            CompareFunc::Greater => "Greater",
            CompareFunc::NotEqual => "Not-Equal",
            CompareFunc::GreaterEqual => "Greater-Equal",
            CompareFunc::Always => "Always",
        };
        f.write_str(name)
    }
}

/// Which primitive faces the rasterizer discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CullMode {
    None,
    Front,
    Back,
}

impl std::fmt::Display for CullMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CullMode::None => "No Culling",
            CullMode::Front => "Cull Front Faces",
            CullMode::Back => "Cull Back Faces",
        };
        f.write_str(name)
    }
}

/// Stencil buffer update operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrSat,
    DecrSat,
    Invert,
    IncrWrap,
    DecrWrap,
}

/// Blend multiplier for one input of the blend equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DstColor,
    InvDstColor,
    DstAlpha,
    InvDstAlpha,
    BlendConstant,
    InvBlendConstant,
    SrcAlphaSat,
}

impl BlendFactor {
    /// True when the factor reads the incoming fragment's color or alpha,
    /// i.e. the source output still influences the blend result.
    pub fn references_source(self) -> bool {
        matches!(
            self,
            BlendFactor::SrcColor
                | BlendFactor::InvSrcColor
                | BlendFactor::SrcAlpha
                | BlendFactor::InvSrcAlpha
                | BlendFactor::SrcAlphaSat
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendOp {
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

bitflags::bitflags! {
    /// Per-target color channel write mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ColorWriteMask: u8 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
    }
}

impl ColorWriteMask {
    pub const ALL: ColorWriteMask = ColorWriteMask::all();
}

/// Pipeline stage tags used by result steps to route "jump to state
/// viewer" requests in the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    VertexInput,
    VertexShader,
    Rasterizer,
    ViewportsScissors,
    DepthTest,
    StencilTest,
    Blending,
    ColorDepthOutput,
    SampleMask,
}

/// Which post-transform mesh data stage a step refers to ("jump to
/// vertex viewer").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshDataStage {
    VsOut,
    GsOut,
}

/// Interpretation of a texture's channel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompType {
    Typeless,
    Float,
    UNorm,
    SInt,
    UInt,
    Depth,
}

/// Texture storage format, reduced to the properties the diagnostics
/// care about: component interpretation and depth/stencil bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    Rgba8Uint,
    Rgba8Sint,
    R32Uint,
    D16Unorm,
    D24UnormS8Uint,
    D32Float,
    D32FloatS8Uint,
}

impl TextureFormat {
    pub fn comp_type(self) -> CompType {
        match self {
            TextureFormat::Rgba8Unorm | TextureFormat::Bgra8Unorm => CompType::UNorm,
            TextureFormat::Rgba16Float | TextureFormat::Rgba32Float => CompType::Float,
            TextureFormat::Rgba8Uint | TextureFormat::R32Uint => CompType::UInt,
            TextureFormat::Rgba8Sint => CompType::SInt,
            TextureFormat::D16Unorm
            | TextureFormat::D24UnormS8Uint
            | TextureFormat::D32Float
            | TextureFormat::D32FloatS8Uint => CompType::Depth,
        }
    }

    pub fn has_depth(self) -> bool {
        self.comp_type() == CompType::Depth
    }

    /// Number of stencil bits in the format, 0 when the format carries no
    /// stencil plane.
    pub fn stencil_bits(self) -> u32 {
        match self {
            TextureFormat::D24UnormS8Uint | TextureFormat::D32FloatS8Uint => 8,
            _ => 0,
        }
    }
}

/// Per-vertex-attribute data format. Only the byte footprint matters to
/// the out-of-bounds checks, but decoded names keep messages readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexFormat {
    F32,
    F32x2,
    F32x3,
    F32x4,
    U8x4,
    U8x4Norm,
    U16x2,
    U16x4,
    U32,
}

impl VertexFormat {
    pub fn byte_size(self) -> u64 {
        match self {
            VertexFormat::F32 | VertexFormat::U32 => 4,
            VertexFormat::F32x2 => 8,
            VertexFormat::F32x3 => 12,
            VertexFormat::F32x4 => 16,
            VertexFormat::U8x4 | VertexFormat::U8x4Norm | VertexFormat::U16x2 => 4,
            VertexFormat::U16x4 => 8,
        }
    }
}

/// Shader stages a snapshot records bindings for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderStage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_factor_source_references() {
        assert!(BlendFactor::SrcAlpha.references_source());
        assert!(BlendFactor::InvSrcColor.references_source());
        assert!(!BlendFactor::Zero.references_source());
        assert!(!BlendFactor::DstColor.references_source());
        assert!(!BlendFactor::BlendConstant.references_source());
    }

    #[test]
    fn stencil_bits_by_format() {
        assert_eq!(TextureFormat::D24UnormS8Uint.stencil_bits(), 8);
        assert_eq!(TextureFormat::D32FloatS8Uint.stencil_bits(), 8);
        assert_eq!(TextureFormat::D32Float.stencil_bits(), 0);
        assert_eq!(TextureFormat::Rgba8Unorm.stencil_bits(), 0);
    }

    #[test]
    fn event_ids_order_by_timeline() {
        assert!(EventId(10) < EventId(42));
        assert_eq!(EventId(7).to_string(), "EID 7");
    }
}

//! `drawtriage-replay` defines the contract between the diagnostic
//! engine and the host replay/inspection layer: the [`ReplayController`]
//! trait plus the value types flowing across it (texture display
//! configurations, overlay readbacks, pixel history, resource usage).
//!
//! The `test-utils` feature adds [`ScriptedReplay`], an in-memory
//! controller for exercising the engine against synthetic captures.

mod controller;
mod display;
mod history;

pub use controller::{
    ApiProperties, BufferDescription, ConstantVariable, OutputHandle, ReplayController,
    ReplayError, TextureDescription,
};
pub use display::{DebugOverlay, PixelValue, Subresource, TextureData, TextureDisplay};
pub use history::{EventUsage, ModValue, PixelModification, RejectionFlags, ResourceUsage};

// Re-exported for callers working purely against the controller trait.
pub use drawtriage_state::{CompType, EventId, ResourceId};

#[cfg(feature = "test-utils")]
pub mod fixtures;
#[cfg(feature = "test-utils")]
mod scripted;
#[cfg(feature = "test-utils")]
pub use scripted::{overlay_resource, ScriptedReplay};

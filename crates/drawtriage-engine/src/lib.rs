//! Draw-call visibility diagnostics.
//!
//! Given a replay controller positioned inside a captured frame, the
//! engine answers "why is this draw not visible?" by walking the
//! pipeline stages in a fixed order and recording a trail of findings:
//!
//! - coarse triage via the highlight overlay (rendering vs offscreen),
//! - per-stage overlay checks (scissor, backface cull, depth, stencil),
//! - focused checkers that explain a failing stage and attribute it to
//!   concrete state or to earlier draws via pixel history,
//! - vertex input validation when the geometry itself looks broken.
//!
//! The walk short-circuits on the first definitive cause. Analyses are
//! serialized through [`ReplayQueue`] because replay controllers are
//! single-context.

mod analysis;
mod depth;
mod geometry;
mod offscreen;
mod onscreen;
mod oracle;
mod prior;
mod queue;
mod stencil;
mod trail;
mod vertex_input;

pub use analysis::{analyse_draw, Analysis, AnalysisError};
pub use geometry::{NdcSet, XyBounds};
pub use queue::ReplayQueue;
pub use trail::{Flow, PixelHistoryPayload, ResultStep, Trail};

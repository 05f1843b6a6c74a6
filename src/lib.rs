//! Facade crate: re-exports the diagnostic engine, the replay controller
//! contract, and the pipeline state model under one roof. Hosts embed
//! this crate and implement [`replay::ReplayController`] over their
//! capture replayer.

pub use drawtriage_engine as engine;
pub use drawtriage_replay as replay;
pub use drawtriage_state as state;

pub use drawtriage_engine::{analyse_draw, AnalysisError, ReplayQueue, ResultStep};
pub use drawtriage_replay::ReplayController;
pub use drawtriage_state::EventId;

//! The orchestration loop and the model abstraction it drives.

pub mod events;
pub mod limits;
pub mod model;
pub mod runner;
pub mod types;

pub use events::{CycleEvent, CycleEventSink};
pub use limits::LoopLimits;
pub use model::{ModelEndpoint, ModelRequest, ModelResponse, ResponseBlock};
pub use runner::Orchestrator;
pub use types::{CycleReport, CycleStatus, DispatchMode};

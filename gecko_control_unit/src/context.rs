//! The context the two flows share, split by ownership.
//!
//! - [`SharedContext`]: cross-flow fields, `Arc`-shared, every access is one
//!   lock or one atomic.
//! - [`ControlContext`]: hardware, controllers and scratch buffers, owned by
//!   the sampling thread.

pub mod runtime;
pub mod shared;

pub use runtime::{ControlContext, ModeSettings};
pub use shared::{
    FaultRecord, GaitState, GaitStatus, ModeCell, Roster, SharedContext, TaskMaps, Telemetry,
    TelemetrySnapshot,
};

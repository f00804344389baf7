//! # GeckoBot Control Unit Library
//!
//! Onboard real-time controller of the pneumatic GeckoBot. One sampling
//! thread runs the mode dispatcher; a communication thread lets the
//! operator switch modes, write tasks and start gait sessions.
//!
//! ## Flows
//!
//! ```text
//!   sampling thread                         communication thread
//!  ┌─────────────────────────┐             ┌──────────────────────┐
//!  │ Dispatcher              │             │ CommThread           │
//!  │  └─ mode handler        │             │  └─ CommEndpoint     │
//!  │      ├─ ControlContext  │             │      └─ OperatorLink │
//!  │      │   (hw, PIDs)     │             └──────────┬───────────┘
//!  │      └─ gait player     │                        │
//!  └───────────┬─────────────┘                        │
//!              └──────────▶ Arc<SharedContext> ◀──────┘
//! ```
//!
//! ## Modules
//!
//! - [`context`]: shared and loop-owned state
//! - [`dispatcher`]: generic mode table
//! - [`modes`]: one handler per operating mode
//! - [`gait`]: pattern playback
//! - [`control`]: PID controller
//! - [`cycle`]: sampling pacer and RT setup
//! - [`comm`]: operator endpoints
//! - [`error`]: error types

pub mod comm;
pub mod context;
pub mod control;
pub mod cycle;
pub mod dispatcher;
pub mod error;
pub mod gait;
pub mod modes;

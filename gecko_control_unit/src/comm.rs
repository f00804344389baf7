//! Operator side: everything that talks to the control loop from outside.
//!
//! ```text
//!  ┌──────────────┐ poll  ┌──────────────┐  one lock / atomic  ┌───────────────┐
//!  │ CommEndpoint │──────▶│ OperatorLink │────────────────────▶│ SharedContext │
//!  └──────────────┘       └──────────────┘                     └───────────────┘
//!        ▲
//!        │ once per sampling period
//!  ┌─────┴──────┐
//!  │ CommThread │
//!  └────────────┘
//! ```
//!
//! Endpoints: [`PanelEndpoint`] for the push-button panel on the robot and
//! [`ScriptEndpoint`] for a timed command list.

pub mod link;
pub mod panel;
pub mod script;
pub mod thread;

pub use link::OperatorLink;
pub use panel::{Button, Led, OperatorPanel, PanelEndpoint};
pub use script::{OperatorCommand, Script, ScriptEndpoint, ScriptStep};
pub use thread::{CommEndpoint, CommThread, EndpointStatus};

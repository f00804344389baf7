//! Control engine root.
//!
//! One PID controller per proportional valve closes the pressure loop;
//! a separate instance closes the IMU angle loop.

pub mod pid;

pub use pid::{Controller, PidController, PidGains};

//! GeckoBot Common Library
//!
//! Shared types for every crate of the GeckoBot controller workspace.
//!
//! # Module Structure
//!
//! - [`mode`] - Operating modes of the control loop
//! - [`pattern`] - Gait pattern rows, layout checks, generator and library
//! - [`hal`] - Hardware proxy traits (sensors, valves, IMUs) and their errors
//! - [`imu`] - Bending angle from a pair of accelerometers
//! - [`config`] - Configuration loading traits and types
//! - [`control_unit`] - Control unit configuration sections
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use gecko_common::prelude::*;
//!
//! let mode: Mode = "USER_REFERENCE".parse().unwrap();
//! assert_eq!(mode, Mode::UserReference);
//! ```

pub mod config;
pub mod consts;
pub mod control_unit;
pub mod hal;
pub mod imu;
pub mod mode;
pub mod pattern;
pub mod prelude;

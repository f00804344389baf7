//! # GeckoBot HAL Library
//!
//! Hardware drivers behind the proxy traits of `gecko_common::hal`.
//!
//! The physical robot uses I2C pressure sensors, PWM proportional valves,
//! GPIO discrete valves and MPU-9150 IMUs. This crate carries the
//! simulated bench used for development and for every test of the
//! control unit.
//!
//! # Module Structure
//!
//! - [`drivers`] - Driver implementations
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     gecko_hal::drivers::simulation            │
//! │  ┌──────────┐   ┌─────────────────┐   ┌────────────────────┐  │
//! │  │ ProxySet │──►│ BenchState      │◄──│ BenchProbe         │  │
//! │  │ (traits) │   │ chambers, feet, │   │ inspection, fault  │  │
//! │  └──────────┘   │ IMUs, faults    │   │ injection          │  │
//! │                 └─────────────────┘   └────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod drivers;

pub use crate::drivers::simulation::{BenchConfig, BenchProbe, SimBench};

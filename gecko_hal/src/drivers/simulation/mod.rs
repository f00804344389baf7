//! Simulation driver module.
//!
//! A software bench for development and testing without the robot: one
//! pneumatic chamber per proportional valve, latching feet, and a pair of
//! IMUs that follow the bending of one joint.

mod bench;
mod chamber;
mod devices;

pub use bench::{BenchConfig, BenchProbe, DvalveEvent, JointCoupling, SimBench, SimFault};
pub use chamber::{Chamber, ChamberModel};

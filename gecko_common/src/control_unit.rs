//! Control unit configuration shared by the controller binary and tools.

pub mod config;

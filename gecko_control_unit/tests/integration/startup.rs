//! Integration test: configuration file → validated config → control
//! context with fully populated maps.

use gecko_common::config::ConfigLoader;
use gecko_common::control_unit::config::ControlUnitConfig;
use gecko_common::mode::Mode;
use gecko_control_unit::comm::Script;
use gecko_control_unit::context::ControlContext;
use gecko_control_unit::error::ContextError;
use gecko_hal::{BenchConfig, SimBench};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

const SAMPLE_CONFIG: &str = include_str!("../../../config/control_unit.toml");
const SAMPLE_SCRIPT: &str = include_str!("../../../config/demo_script.toml");

const SMALL_ROBOT: &str = r#"
sampling_period_us = 2000
start_mode = "USER_REFERENCE"

[hardware]
sensors = ["front", "back", "spare"]
valves = ["front", "back"]
dvalves = ["f0", "f1", "f2"]
imus = []

[gait]
anchor_pair = [0, 2]
active_pattern = "walk"

[[patterns]]
name = "walk"
rows = [[0.5, 0.0, true, false, false, 0.2], [0.0, 0.5, false, true, true, 0.2]]
"#;

fn write_temp(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn sample_files_are_valid() {
    let config = ControlUnitConfig::from_toml(SAMPLE_CONFIG).unwrap();
    config.validate().unwrap();
    let script = Script::parse(SAMPLE_SCRIPT).unwrap();
    assert!(!script.steps.is_empty());
}

#[test]
fn small_robot_from_file() {
    let file = write_temp(SMALL_ROBOT);
    let config = ControlUnitConfig::load(file.path()).unwrap();
    config.validate().unwrap();

    let bench = SimBench::new(&config.hardware, BenchConfig { joint: None, ..Default::default() });
    let ctx = ControlContext::new(&config, bench.proxies()).unwrap();
    assert_eq!(ctx.n_valve(), 2);
    assert_eq!(ctx.n_dvalve(), 3);
    assert_eq!(ctx.requested_mode(), Mode::UserReference);

    let snap = ctx.shared().snapshot();
    assert_eq!(snap.sensors.keys().collect::<Vec<_>>(), ["back", "front", "spare"]);
    assert_eq!(snap.outputs.len(), 2);
    assert_eq!(snap.dvalves.len(), 3);
    assert!(snap.imus.is_empty());
    assert_eq!(snap.gait.active_pattern, "walk");
    assert_eq!(ctx.shared().tasks().references.len(), 2);
}

#[test]
fn missing_file_reported() {
    assert!(ControlUnitConfig::load(Path::new("/nonexistent/gecko.toml")).is_err());
}

#[test]
fn duplicate_proxy_names_rejected() {
    let config = ControlUnitConfig::default();
    let bench = SimBench::new(&config.hardware, BenchConfig::default());
    let mut hw = bench.proxies();
    let extra = SimBench::new(&config.hardware, BenchConfig::default()).proxies();
    hw.sensors.extend(extra.sensors.into_iter().take(1));
    assert!(matches!(
        ControlContext::new(&config, hw),
        Err(ContextError::DuplicateName { .. })
    ));
}

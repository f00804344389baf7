//! Timed operator script.
//!
//! ```toml
//! exit_when_done = true
//!
//! [[step]]
//! at = 0.0
//! command = "request_mode"
//! mode = "USER_REFERENCE"
//!
//! [[step]]
//! command = "wait_running"
//! mode = "USER_REFERENCE"
//!
//! [[step]]
//! at = 0.5
//! command = "set_reference"
//! valve = "0"
//! value = 0.4
//! ```
//!
//! `at` is seconds since the first poll. Steps run in file order; a step
//! whose time has not come holds back the ones after it. `wait_running`
//! holds the script until the loop runs the given mode.

use gecko_common::config::ConfigLoader;
use gecko_common::mode::Mode;
use gecko_common::pattern::{GaitParameters, Pattern, preset};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::link::OperatorLink;
use super::thread::{CommEndpoint, EndpointStatus};
use crate::error::CommError;

/// One operator action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum OperatorCommand {
    RequestMode { mode: Mode },
    WaitRunning { mode: Mode },
    SetReference { valve: String, value: f64 },
    SetDuty { valve: String, value: f64 },
    SetDvalve { dvalve: String, on: bool },
    Confirm { on: bool },
    InfiniteMode { on: bool },
    CycleCountLimit { limit: u32 },
    SelectPattern { name: String },
    UploadPattern { name: String, rows: Pattern },
    /// Generated gait, from a preset name or explicit parameters.
    CustomPattern {
        #[serde(default)]
        preset: Option<String>,
        #[serde(default)]
        gait: Option<GaitParameters>,
    },
}

/// A command and when to run it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    #[serde(default)]
    pub at: f64,
    #[serde(flatten)]
    pub command: OperatorCommand,
}

/// A whole script file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Request `EXIT` after the last step.
    #[serde(default)]
    pub exit_when_done: bool,
    #[serde(default, rename = "step")]
    pub steps: Vec<ScriptStep>,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, CommError> {
        let script = <Self as ConfigLoader>::load(path)?;
        script.validate()?;
        Ok(script)
    }

    pub fn parse(text: &str) -> Result<Self, CommError> {
        let script = Self::from_toml(text)?;
        script.validate()?;
        Ok(script)
    }

    fn validate(&self) -> Result<(), CommError> {
        for (i, step) in self.steps.iter().enumerate() {
            if !step.at.is_finite() || step.at < 0.0 {
                return Err(CommError::Script(format!("step {i}: bad time {}", step.at)));
            }
            if let OperatorCommand::CustomPattern { preset, gait } = &step.command {
                if preset.is_some() == gait.is_some() {
                    return Err(CommError::Script(format!(
                        "step {i}: custom_pattern needs exactly one of preset, gait"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Apply `command` through `link`. `Ok(false)` means "not yet".
pub fn apply(command: &OperatorCommand, link: &OperatorLink) -> Result<bool, CommError> {
    match command {
        OperatorCommand::RequestMode { mode } => {
            link.request_mode(*mode);
        }
        OperatorCommand::WaitRunning { mode } => return Ok(link.running_mode() == *mode),
        OperatorCommand::SetReference { valve, value } => link.set_reference(valve, *value)?,
        OperatorCommand::SetDuty { valve, value } => link.set_duty(valve, *value)?,
        OperatorCommand::SetDvalve { dvalve, on } => link.set_dvalve(dvalve, *on)?,
        OperatorCommand::Confirm { on } => link.set_confirm(*on),
        OperatorCommand::InfiniteMode { on } => link.set_infinite_mode(*on),
        OperatorCommand::CycleCountLimit { limit } => link.set_cycle_count_limit(*limit),
        OperatorCommand::SelectPattern { name } => link.select_pattern(name)?,
        OperatorCommand::UploadPattern { name, rows } => link.upload_pattern(name, rows.clone())?,
        OperatorCommand::CustomPattern { preset: name, gait } => {
            let params = match (name, gait) {
                (Some(name), _) => preset(name)
                    .ok_or_else(|| CommError::Script(format!("unknown preset '{name}'")))?,
                (None, Some(params)) => params.clone(),
                (None, None) => return Err(CommError::Script("custom_pattern without source".into())),
            };
            link.set_custom_pattern(&params)?;
        }
    }
    Ok(true)
}

/// [`CommEndpoint`] replaying a [`Script`].
#[derive(Debug)]
pub struct ScriptEndpoint {
    steps: VecDeque<ScriptStep>,
    exit_when_done: bool,
    started: Option<Instant>,
}

impl ScriptEndpoint {
    pub fn new(script: Script) -> Self {
        Self {
            steps: script.steps.into(),
            exit_when_done: script.exit_when_done,
            started: None,
        }
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl CommEndpoint for ScriptEndpoint {
    fn name(&self) -> &str {
        "script"
    }

    fn poll(&mut self, link: &OperatorLink) -> Result<EndpointStatus, CommError> {
        let started = *self.started.get_or_insert_with(Instant::now);
        let elapsed = started.elapsed();

        while let Some(step) = self.steps.front() {
            if elapsed < Duration::try_from_secs_f64(step.at).unwrap_or_default() {
                return Ok(EndpointStatus::Continue);
            }
            if !apply(&step.command, link)? {
                return Ok(EndpointStatus::Continue);
            }
            debug!("Script step done: {:?}", step.command);
            self.steps.pop_front();
        }

        if self.exit_when_done {
            info!("Script finished, requesting EXIT");
            link.request_mode(Mode::Exit);
        }
        Ok(EndpointStatus::Done)
    }
}

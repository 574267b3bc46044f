//! Assembly of external tool invocations.
//!
//! Arguments are accumulated as structured pieces and only become an argv at
//! the spawn boundary, so paths never pass through a shell. Scalar values the
//! tool's own config file interpolates (STAT_LIST, NAME, LEVEL, CUR_STAT)
//! travel in the per-invocation environment map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::subprocess::ProcessCommand;

/// Builds one invocation at a time: executable, extra args, tagged inputs
/// in insertion order, optional config file, mandatory output path. `clear`
/// resets everything except the bound executable so the builder can be
/// reused across the (init, storm, variable) space.
pub struct ToolCommandBuilder {
    exe: PathBuf,
    args: Vec<String>,
    inputs: Vec<(String, PathBuf)>,
    config_file: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    output_file: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl ToolCommandBuilder {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self {
            exe: exe.into(),
            args: Vec::new(),
            inputs: Vec::new(),
            config_file: None,
            output_dir: None,
            output_file: None,
            env: HashMap::new(),
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Adds an input tagged with its flag, e.g. `add_input("obs", path)`
    /// becomes `-obs <path>`.
    pub fn add_input(&mut self, tag: &str, path: impl Into<PathBuf>) -> &mut Self {
        self.inputs.push((format!("-{tag}"), path.into()));
        self
    }

    pub fn set_config_file(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn set_output_file(&mut self, file: impl Into<PathBuf>) -> &mut Self {
        self.output_file = Some(file.into());
        self
    }

    pub fn env(&mut self, key: &str, value: &str) -> &mut Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    /// Resets accumulated state for the next request. The executable stays
    /// bound.
    pub fn clear(&mut self) {
        self.args.clear();
        self.inputs.clear();
        self.config_file = None;
        self.output_dir = None;
        self.output_file = None;
        self.env.clear();
    }

    /// Produces the invocation with argv in fixed order: extra args, tagged
    /// inputs, `-config`, `-out`. Without a complete output path there is
    /// nothing valid to run, so the result is `None` rather than a malformed
    /// command.
    pub fn build(&self) -> Option<ProcessCommand> {
        let output = match (&self.output_dir, &self.output_file) {
            (Some(_), Some(file)) => file.clone(),
            _ => {
                error!("No output directory specified");
                error!("No output filename specified");
                return None;
            }
        };

        let mut args = self.args.clone();
        for (flag, path) in &self.inputs {
            args.push(flag.clone());
            args.push(path.to_string_lossy().into_owned());
        }
        if let Some(config_file) = &self.config_file {
            args.push("-config".to_string());
            args.push(config_file.to_string_lossy().into_owned());
        }
        args.push("-out".to_string());
        args.push(output.to_string_lossy().into_owned());

        let command = ProcessCommand {
            program: self.exe.to_string_lossy().into_owned(),
            args,
            env: self.env.clone(),
            working_dir: None,
        };
        debug!("Command = {}", command.command_line());
        Some(command)
    }
}

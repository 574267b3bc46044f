use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner};

/// Records every invocation and replays configured responses, keyed by
/// program path. Used by the pipeline integration tests so runs never touch
/// the real external tools.
#[derive(Clone, Default)]
pub struct MockProcessRunner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<ProcessCommand>>>,
}

struct MockExpectation {
    program: String,
    response: ProcessOutput,
}

pub struct MockCommandConfig {
    runner: MockProcessRunner,
    expectation: MockExpectation,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_command(&self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                response: ProcessOutput {
                    status: ExitStatus::Success,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration: Duration::from_millis(10),
                },
            },
        }
    }

    pub fn calls(&self) -> Vec<ProcessCommand> {
        self.call_history.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<ProcessCommand> {
        self.calls()
            .into_iter()
            .filter(|cmd| cmd.program == program)
            .collect()
    }

    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        self.calls_to(program).len() == times
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        self.call_history.lock().unwrap().push(command.clone());

        let expectations = self.expectations.lock().unwrap();
        for expectation in expectations.iter() {
            if expectation.program == command.program {
                return Ok(expectation.response.clone());
            }
        }

        Err(ProcessError::MockExpectationNotMet(format!(
            "No expectation found for command: {}",
            command.command_line()
        )))
    }
}

impl MockCommandConfig {
    pub fn returns_stdout(mut self, stdout: &str) -> Self {
        self.expectation.response.stdout = stdout.to_string();
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.response.status = if code == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::Error(code)
        };
        self
    }

    pub fn finish(self) {
        self.runner
            .expectations
            .lock()
            .unwrap()
            .push(self.expectation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn command(program: &str) -> ProcessCommand {
        ProcessCommand {
            program: program.to_string(),
            args: vec![],
            env: HashMap::new(),
            working_dir: None,
        }
    }

    #[tokio::test]
    async fn replays_configured_response() {
        let mock = MockProcessRunner::new();
        mock.expect_command("tc_stat")
            .returns_stdout("filtered")
            .finish();

        let output = mock.run(command("tc_stat")).await.unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, "filtered");
        assert!(mock.verify_called("tc_stat", 1));
    }

    #[tokio::test]
    async fn unconfigured_program_is_an_error() {
        let mock = MockProcessRunner::new();
        let err = mock.run(command("plot_data_plane")).await.unwrap_err();
        assert!(matches!(err, ProcessError::MockExpectationNotMet(_)));
        // the call is still recorded
        assert_eq!(mock.calls_to("plot_data_plane").len(), 1);
    }

    #[tokio::test]
    async fn nonzero_exit_codes_are_replayed() {
        let mock = MockProcessRunner::new();
        mock.expect_command("convert").returns_exit_code(1).finish();
        let output = mock.run(command("convert")).await.unwrap();
        assert_eq!(output.status, ExitStatus::Error(1));
    }
}

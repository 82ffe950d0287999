#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! Child process handle for tracking external programs

use std::path::Path;
use std::process::{Child, Command, ExitStatus};

use thiserror::Error;

/// Errors from spawning and supervising a child process
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started
    #[error("failed to spawn {program}: {reason}")]
    SpawnFailed {
        /// Program that was launched
        program: String,
        /// Why the launch failed
        reason: String,
    },

    /// Waiting on or signalling the process failed
    #[error("process {pid} could not be supervised: {reason}")]
    Supervision {
        /// Process ID
        pid: u32,
        /// Underlying failure
        reason: String,
    },

    /// The program ran but did not exit successfully
    #[error("{program} exited with {status}")]
    NonZeroExit {
        /// Program that was launched
        program: String,
        /// Exit status reported by the OS
        status: ExitStatus,
    },
}

impl ProcessError {
    /// Exit code to forward for a failed program; `None` for non-exit failures
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { status, .. } => Some(status.code().unwrap_or(1)),
            Self::SpawnFailed { .. } | Self::Supervision { .. } => None,
        }
    }
}

/// A spawned program whose footprint is being tracked
#[derive(Debug)]
pub struct ChildProcess {
    /// The child process handle
    child: Child,

    /// Process ID
    pid: u32,

    /// Program name, for messages
    program: String,
}

impl ChildProcess {
    /// Spawn a program with inherited stdio
    ///
    /// # Errors
    ///
    /// Returns `SpawnFailed` if the program cannot be started
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use memtrail_tracker::ChildProcess;
    /// let child = ChildProcess::spawn("my-app", &["--load-test".to_string()], None);
    /// ```
    pub fn spawn(
        program: &str,
        args: &[String],
        working_dir: Option<&Path>,
    ) -> Result<Self, ProcessError> {
        let mut cmd = Command::new(program);
        cmd.args(args);

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| ProcessError::SpawnFailed {
            program: program.to_string(),
            reason: e.to_string(),
        })?;
        let pid = child.id();

        Ok(Self {
            child,
            pid,
            program: program.to_string(),
        })
    }

    /// Get the process ID
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Get the program name
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Check if the process is still running
    ///
    /// # Errors
    ///
    /// Returns `Supervision` if the process status cannot be determined
    pub fn is_running(&mut self) -> Result<bool, ProcessError> {
        self.child
            .try_wait()
            .map(|status| status.is_none())
            .map_err(|e| self.supervision(&e))
    }

    /// Wait for the process to exit and return its status
    ///
    /// # Errors
    ///
    /// Returns `Supervision` if waiting fails
    pub fn wait(&mut self) -> Result<ExitStatus, ProcessError> {
        self.child.wait().map_err(|e| self.supervision(&e))
    }

    /// Wait for the process and treat a non-zero exit as an error
    ///
    /// # Errors
    ///
    /// Returns `NonZeroExit` if the program failed, `Supervision` if waiting fails
    pub fn wait_success(&mut self) -> Result<ExitStatus, ProcessError> {
        let status = self.wait()?;
        if status.success() {
            Ok(status)
        } else {
            Err(ProcessError::NonZeroExit {
                program: self.program.clone(),
                status,
            })
        }
    }

    /// Kill the process and reap it
    ///
    /// # Errors
    ///
    /// Returns `Supervision` if the kill signal or the reap fails
    pub fn kill(&mut self) -> Result<ExitStatus, ProcessError> {
        self.child.kill().map_err(|e| self.supervision(&e))?;
        self.wait()
    }

    fn supervision(&self, error: &std::io::Error) -> ProcessError {
        ProcessError::Supervision {
            pid: self.pid,
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
#[cfg(unix)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sh(script: &str) -> ChildProcess {
        ChildProcess::spawn("sh", &["-c".to_string(), script.to_string()], None).unwrap()
    }

    #[test]
    fn test_spawn_missing_program() {
        let result = ChildProcess::spawn("memtrail-no-such-program", &[], None);
        assert!(matches!(result, Err(ProcessError::SpawnFailed { .. })));
    }

    #[test]
    fn test_wait_success() {
        let mut child = sh("exit 0");
        assert!(child.pid() > 0);
        assert_eq!(child.program(), "sh");
        assert!(child.wait_success().unwrap().success());
    }

    #[test]
    fn test_non_zero_exit_code_forwarded() {
        let error = sh("exit 3").wait_success().unwrap_err();
        assert!(matches!(error, ProcessError::NonZeroExit { .. }));
        assert_eq!(error.exit_code(), Some(3));
    }

    #[test]
    fn test_kill_running_process() {
        let mut child = sh("sleep 30");
        assert!(child.is_running().unwrap());

        let status = child.kill().unwrap();

        assert!(!status.success());
        assert!(!child.is_running().unwrap());
    }

    #[test]
    fn test_finished_process_is_not_running() {
        let mut child = sh("exit 0");
        child.wait().unwrap();
        assert!(!child.is_running().unwrap());
    }

    #[test]
    fn test_working_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let child = ChildProcess::spawn(
            "sh",
            &["-c".to_string(), "touch marker".to_string()],
            Some(dir.path()),
        )
        .unwrap()
        .wait_success()
        .unwrap();
        assert!(dir.path().join("marker").exists());
    }
}

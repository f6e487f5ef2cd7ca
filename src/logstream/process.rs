//! Log process spawning and control.
//!
//! A builder assembles the log command line; the running process exposes
//! its stdout as a line stream and can be terminated gracefully.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Buffer name that means "let the tool pick", so no `-b` is passed.
pub const BUFFER_DEFAULT: &str = "default";

/// Default log binary.
pub const DEFAULT_BINARY: &str = "logcat";

/// Error type for the external log process.
#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    /// The binary was not found.
    #[error("Log binary not found")]
    NotFound,
    /// Permission denied when spawning.
    #[error("Permission denied")]
    PermissionDenied,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Process stdout not available")]
    NoStdout,
    /// The process exited with a failure status.
    #[error("Process exited abnormally (code {0:?})")]
    AbnormalExit(Option<i32>),
}

impl ProcessError {
    /// Create a `ProcessError` from an I/O error, classifying common cases.
    #[must_use]
    pub fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// Builder for the log command line.
#[derive(Debug, Clone)]
pub struct LogCommand {
    binary: String,
    buffer: Option<String>,
    extra_args: Vec<String>,
}

impl Default for LogCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl LogCommand {
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            buffer: None,
            extra_args: Vec::new(),
        }
    }

    /// Use a different binary (a wrapper script, or `sh` in tests).
    #[must_use]
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Select a log buffer. `default` leaves the choice to the tool.
    #[must_use]
    pub fn buffer(mut self, buffer: impl Into<String>) -> Self {
        self.buffer = Some(buffer.into());
        self
    }

    #[must_use]
    pub fn extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn get_binary(&self) -> &str {
        &self.binary
    }

    /// Build the command-line arguments.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(buffer) = self.buffer.as_deref().filter(|b| *b != BUFFER_DEFAULT) {
            args.push("-b".to_string());
            args.push(buffer.to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Full command line for log output.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.binary.clone())
            .chain(self.build_args())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A running log process.
#[derive(Debug)]
pub struct LogProcess {
    child: Child,
}

impl LogProcess {
    /// Spawn the process with stdout piped and stderr discarded.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError` if the process fails to spawn.
    pub fn spawn(command: &LogCommand) -> Result<Self, ProcessError> {
        let child = Command::new(&command.binary)
            .args(command.build_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(ProcessError::from_io)?;
        Ok(Self { child })
    }

    /// Stream of stdout lines.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::NoStdout` if stdout was already taken.
    pub fn lines(
        &mut self,
    ) -> Result<impl futures_core::Stream<Item = Result<String, ProcessError>> + Send + Unpin, ProcessError>
    {
        let stdout = self.child.stdout.take().ok_or(ProcessError::NoStdout)?;
        let reader = BufReader::new(stdout).lines();

        Ok(Box::pin(futures_util::stream::unfold(reader, |mut reader| async {
            match reader.next_line().await {
                Ok(Some(line)) => Some((Ok(line), reader)),
                Ok(None) => None,
                Err(e) => Some((Err(ProcessError::Io(e)), reader)),
            }
        })))
    }

    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Wait for the process to exit on its own. `None` if it is still
    /// running after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if reaping fails.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => status.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Terminate the process and collect its exit status.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, kills immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if termination or reaping fails.
    pub async fn terminate(&mut self, timeout: Duration) -> std::io::Result<ExitStatus> {
        if let Some(status) = self.child.try_wait()? {
            return Ok(status);
        }

        #[cfg(unix)]
        {
            self.terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.child.kill().await?;
            self.child.wait().await
        }
    }

    #[cfg(unix)]
    async fn terminate_unix(&mut self, timeout: Duration) -> std::io::Result<ExitStatus> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = self.id() {
            let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
            let _ = kill(nix_pid, Signal::SIGTERM);

            if let Ok(status) = tokio::time::timeout(timeout, self.child.wait()).await {
                return status;
            }
            self.child.kill().await?;
        }
        self.child.wait().await
    }
}

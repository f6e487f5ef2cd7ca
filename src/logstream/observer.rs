//! Tails an external log process and forwards lines that pass the filter.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::session::{
    require_all, CallbackSink, ObservableSession, ObserverError, ObserverSession, Permission,
    PermissionCheck, SessionState,
};

use super::filter::LineFilter;
use super::process::{LogCommand, LogProcess, ProcessError};

/// How long the process gets to exit after SIGTERM.
pub const TERMINATE_TIMEOUT: Duration = Duration::from_secs(2);

/// What one reader run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub lines_read: u64,
    pub lines_accepted: u64,
    pub cancelled: bool,
    pub exit_code: Option<i32>,
}

/// Runs the log process on a worker task. Accepted lines go to the sink in
/// the order the process printed them.
pub struct LineStreamObserver {
    command: LogCommand,
    filter: Arc<LineFilter>,
    sink: CallbackSink<String>,
    permissions: Arc<dyn PermissionCheck>,
    session: ObserverSession,
    cancel: Option<CancellationToken>,
    worker: Option<JoinHandle<Result<StreamSummary, ProcessError>>>,
}

impl LineStreamObserver {
    #[must_use]
    pub fn new(
        command: LogCommand,
        filter: LineFilter,
        sink: CallbackSink<String>,
        permissions: Arc<dyn PermissionCheck>,
    ) -> Self {
        Self {
            command,
            filter: Arc::new(filter),
            sink,
            permissions,
            session: ObserverSession::new("line-stream"),
            cancel: None,
            worker: None,
        }
    }

    #[must_use]
    pub fn command(&self) -> &LogCommand {
        &self.command
    }

    /// Whether the reader task is still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Wait for the current reader run to end and return its summary.
    /// Returns `None` if no reader was started.
    pub async fn join(&mut self) -> Option<Result<StreamSummary, ObserverError>> {
        let worker = self.worker.take()?;
        Some(match worker.await {
            Ok(result) => result.map_err(ObserverError::from),
            Err(e) => {
                tracing::warn!(error = %e, "Log reader task failed");
                Err(ObserverError::ChannelClosed)
            }
        })
    }
}

impl ObservableSession for LineStreamObserver {
    /// Spawn the process and the reader task.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` without log access and `Process` if the
    /// binary cannot be started.
    fn start_observing(&mut self) -> Result<(), ObserverError> {
        require_all(self.permissions.as_ref(), &[Permission::ReadLogs])?;
        if self.session.is_observing() {
            tracing::debug!("Line stream already observing");
            return Ok(());
        }

        tracing::debug!(command = %self.command.display(), "Starting log process");
        let process = LogProcess::spawn(&self.command).inspect_err(|e| {
            tracing::warn!(command = %self.command.display(), error = %e, "Log process failed to start");
        })?;

        let cancel = CancellationToken::new();
        self.worker = Some(tokio::spawn(read_lines(
            process,
            Arc::clone(&self.filter),
            self.sink.clone(),
            cancel.clone(),
        )));
        self.cancel = Some(cancel);
        self.session.begin();
        Ok(())
    }

    /// Signal the reader to stop. It exits at its next read boundary.
    fn stop_observing(&mut self) -> Result<(), ObserverError> {
        if self.session.end() {
            if let Some(cancel) = self.cancel.take() {
                cancel.cancel();
            }
        }
        Ok(())
    }

    fn state(&self) -> SessionState {
        self.session.state()
    }
}

impl Drop for LineStreamObserver {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

async fn read_lines(
    mut process: LogProcess,
    filter: Arc<LineFilter>,
    sink: CallbackSink<String>,
    cancel: CancellationToken,
) -> Result<StreamSummary, ProcessError> {
    let mut summary = StreamSummary::default();
    let mut failure = None;
    let mut eof = false;

    match process.lines() {
        Ok(mut lines) => loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    summary.cancelled = true;
                    break;
                }
                next = lines.next() => match next {
                    Some(Ok(line)) => {
                        summary.lines_read += 1;
                        if !filter.accepts(&line) {
                            continue;
                        }
                        summary.lines_accepted += 1;
                        if !sink.deliver(line) {
                            tracing::debug!("Line consumer gone, stopping reader");
                            summary.cancelled = true;
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        failure = Some(e);
                        break;
                    }
                    None => {
                        eof = true;
                        break;
                    }
                },
            }
        },
        Err(e) => failure = Some(e),
    }

    // A process that closed its output on its own gets to exit with its own status.
    let exited = if eof {
        process.wait_timeout(TERMINATE_TIMEOUT).await
    } else {
        Ok(None)
    };
    let status = match exited {
        Ok(Some(status)) => Ok(status),
        Ok(None) => process.terminate(TERMINATE_TIMEOUT).await,
        Err(e) => Err(e),
    };

    match status {
        Ok(status) => {
            summary.exit_code = status.code();
            tracing::debug!(
                exit_code = ?status.code(),
                lines_read = summary.lines_read,
                lines_accepted = summary.lines_accepted,
                "Log process ended"
            );
            if failure.is_none() && !summary.cancelled && !status.success() {
                failure = Some(ProcessError::AbnormalExit(status.code()));
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to reap log process"),
    }

    match failure {
        Some(e) => {
            tracing::warn!(error = %e, "Log reader stopped");
            Err(e)
        }
        None => Ok(summary),
    }
}

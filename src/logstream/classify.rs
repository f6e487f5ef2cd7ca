//! Sorts accepted log lines into named categories.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::session::{ObservableSession, ObserverError, PermissionCheck, SessionState, TaskQueue};

use super::filter::{FilterError, LineFilter, LinePattern};
use super::observer::{LineStreamObserver, StreamSummary};
use super::process::LogCommand;

/// Whether a line goes to its first matching category or to all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    First,
    All,
}

/// A named category and the whole-line pattern that selects it.
#[derive(Debug, Clone)]
pub struct LineCategory {
    name: String,
    pattern: LinePattern,
}

impl LineCategory {
    /// # Errors
    ///
    /// Returns `FilterError::InvalidPattern` if the regex is invalid.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, FilterError> {
        Ok(Self {
            name: name.into(),
            pattern: LinePattern::new(pattern)?,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

/// A line routed to one category. Under `MatchMode::All` one line yields
/// several of these, sharing a `sequence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedLine {
    /// Counts classified lines from 1.
    pub sequence: u64,
    /// Index into the declared categories.
    pub index: usize,
    pub category: String,
    pub line: String,
}

/// Ordered category table.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    categories: Vec<LineCategory>,
    mode: MatchMode,
}

impl Classifier {
    #[must_use]
    pub fn new(categories: Vec<LineCategory>, mode: MatchMode) -> Self {
        Self { categories, mode }
    }

    #[must_use]
    pub fn categories(&self) -> &[LineCategory] {
        &self.categories
    }

    /// Indices of the categories a line belongs to, in declaration order.
    #[must_use]
    pub fn classify(&self, line: &str) -> Vec<usize> {
        let mut hits = self
            .categories
            .iter()
            .enumerate()
            .filter(|(_, c)| c.pattern.matches(line))
            .map(|(i, _)| i);
        match self.mode {
            MatchMode::First => hits.next().into_iter().collect(),
            MatchMode::All => hits.collect(),
        }
    }
}

/// Line stream plus a classifying dispatch queue. The reader task never
/// waits on classification or on listeners.
pub struct ClassifyingLineObserver {
    stream: LineStreamObserver,
    queue: TaskQueue<String>,
    classifier: Arc<Classifier>,
}

impl ClassifyingLineObserver {
    /// Must be called from within a tokio runtime.
    pub fn new(
        command: LogCommand,
        filter: LineFilter,
        classifier: Classifier,
        permissions: Arc<dyn PermissionCheck>,
    ) -> (Self, mpsc::UnboundedReceiver<ClassifiedLine>) {
        let (events, rx) = mpsc::unbounded_channel();
        let classifier = Arc::new(classifier);
        let dispatch = Arc::clone(&classifier);

        let mut sequence = 0u64;
        let queue = TaskQueue::spawn("classify", move |line: String| {
            let hits = dispatch.classify(&line);
            if hits.is_empty() {
                tracing::trace!(line = %line, "Line matched no category");
                return;
            }
            sequence += 1;
            for index in hits {
                let category = dispatch.categories[index].name.clone();
                let event = ClassifiedLine {
                    sequence,
                    index,
                    category,
                    line: line.clone(),
                };
                if events.send(event).is_err() {
                    tracing::trace!("Category listener gone, dropping line");
                    return;
                }
            }
        });

        let stream = LineStreamObserver::new(command, filter, queue.sink(), permissions);
        (
            Self {
                stream,
                queue,
                classifier,
            },
            rx,
        )
    }

    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.stream.is_running()
    }

    /// Wait for the reader to finish, then for every line it produced to
    /// be classified.
    pub async fn join(&mut self) -> Option<Result<StreamSummary, ObserverError>> {
        let result = self.stream.join().await;
        if let Err(e) = self.queue.flush().await {
            tracing::debug!(error = %e, "Classify queue already closed");
        }
        result
    }

    /// Stop the reader, wait for it, then drain and join the dispatch queue.
    pub async fn shutdown(mut self) -> Option<Result<StreamSummary, ObserverError>> {
        let _ = self.stream.stop_observing();
        let result = self.stream.join().await;
        self.queue.shutdown().await;
        result
    }
}

impl ObservableSession for ClassifyingLineObserver {
    fn start_observing(&mut self) -> Result<(), ObserverError> {
        self.stream.start_observing()
    }

    fn stop_observing(&mut self) -> Result<(), ObserverError> {
        self.stream.stop_observing()
    }

    fn state(&self) -> SessionState {
        self.stream.state()
    }
}

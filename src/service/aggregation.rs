//! Background log tracker.
//!
//! Owns a classifying log observer, keeps a bounded buffer per category plus
//! an "all" buffer, counts every line, and periodically hands the lines that
//! arrived since the last update to a bound listener.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::TrackerConfig;
use crate::logstream::{
    ClassifiedLine, Classifier, ClassifyingLineObserver, FilterError, LineCategory, LineFilter,
    LogRingBuffer, StreamSummary,
};
use crate::session::{
    require_all, ObservableSession, ObserverError, Permission, PermissionCheck, SessionState,
};

/// Name of the buffer every classified line lands in.
pub const ALL_CATEGORY: &str = "all";

/// Lifetime counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackerTotals {
    pub all: u64,
    pub categories: BTreeMap<String, u64>,
}

/// Delta published on each update tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogsUpdate {
    /// Lines added to the "all" buffer since the previous update.
    pub new_lines: Vec<String>,
    pub totals: TrackerTotals,
}

#[derive(Debug)]
struct CategoryBuffer {
    name: String,
    count: u64,
    buffer: Option<LogRingBuffer>,
}

#[derive(Debug)]
struct TrackerState {
    all: LogRingBuffer,
    categories: Vec<CategoryBuffer>,
    last_sequence: u64,
    published: u64,
}

impl TrackerState {
    fn new(config: &TrackerConfig) -> Self {
        Self {
            all: LogRingBuffer::new(config.max_lines),
            categories: config
                .categories
                .iter()
                .map(|c| CategoryBuffer {
                    name: c.name.clone(),
                    count: 0,
                    buffer: c.keep_buffer.then(|| LogRingBuffer::new(config.max_lines)),
                })
                .collect(),
            last_sequence: 0,
            published: 0,
        }
    }

    fn record(&mut self, classified: ClassifiedLine) {
        if classified.sequence != self.last_sequence {
            self.last_sequence = classified.sequence;
            self.all.push(classified.line.clone());
        }
        if let Some(category) = self.categories.get_mut(classified.index) {
            category.count += 1;
            if let Some(buffer) = category.buffer.as_mut() {
                buffer.push(classified.line);
            }
        }
    }

    fn totals(&self) -> TrackerTotals {
        TrackerTotals {
            all: self.all.total(),
            categories: self
                .categories
                .iter()
                .map(|c| (c.name.clone(), c.count))
                .collect(),
        }
    }

    /// The pending delta, if anything arrived since the last one.
    fn take_update(&mut self) -> Option<LogsUpdate> {
        if self.all.total() <= self.published {
            return None;
        }
        let new_lines = self.all.since(self.published);
        self.published = self.all.total();
        Some(LogsUpdate {
            new_lines,
            totals: self.totals(),
        })
    }
}

type Listener = Option<mpsc::UnboundedSender<LogsUpdate>>;

struct Shared {
    state: Mutex<TrackerState>,
    listener: Mutex<Listener>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listener(&self) -> MutexGuard<'_, Listener> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_pending(&self) {
        let mut listener = self.listener();
        let Some(tx) = listener.as_ref() else {
            return;
        };
        let Some(update) = self.state().take_update() else {
            return;
        };
        tracing::trace!(new_lines = update.new_lines.len(), total = update.totals.all, "Publishing log update");
        if tx.send(update).is_err() {
            tracing::debug!("Update listener gone, unbinding");
            *listener = None;
        }
    }
}

struct Running {
    observer: ClassifyingLineObserver,
    cancel: CancellationToken,
    collector: JoinHandle<()>,
    ticker: JoinHandle<()>,
}

/// Long-lived log tracker.
pub struct AggregationService {
    config: TrackerConfig,
    filter: LineFilter,
    categories: Vec<LineCategory>,
    permissions: Arc<dyn PermissionCheck>,
    shared: Arc<Shared>,
    running: Option<Running>,
}

impl AggregationService {
    /// Compile the tracker patterns. Nothing runs until `start`.
    ///
    /// # Errors
    ///
    /// Returns `FilterError` if a filter or category pattern is invalid.
    pub fn new(config: TrackerConfig, permissions: Arc<dyn PermissionCheck>) -> Result<Self, FilterError> {
        let filter = config.line_filter()?;
        let categories = config.line_categories()?;
        let shared = Arc::new(Shared {
            state: Mutex::new(TrackerState::new(&config)),
            listener: Mutex::new(None),
        });
        Ok(Self {
            config,
            filter,
            categories,
            permissions,
            shared,
            running: None,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Bind the update listener, replacing any previous one.
    pub fn bind(&self) -> mpsc::UnboundedReceiver<LogsUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.listener() = Some(tx);
        rx
    }

    pub fn unbind(&self) {
        *self.shared.listener() = None;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Whether the log reader is still alive.
    #[must_use]
    pub fn is_reading(&self) -> bool {
        self.running.as_ref().is_some_and(|r| r.observer.is_running())
    }

    /// Start tracking with fresh counters and buffers.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` without log access, or `Process` if the
    /// log binary cannot be started.
    pub fn start(&mut self) -> Result<(), ObserverError> {
        require_all(self.permissions.as_ref(), &[Permission::ReadLogs])?;
        if self.running.is_some() {
            tracing::debug!("Tracker already running");
            return Ok(());
        }

        *self.shared.state() = TrackerState::new(&self.config);

        let classifier = Classifier::new(self.categories.clone(), self.config.match_mode);
        let (mut observer, mut lines) = ClassifyingLineObserver::new(
            self.config.command(),
            self.filter.clone(),
            classifier,
            Arc::clone(&self.permissions),
        );
        observer.start_observing()?;

        let shared = Arc::clone(&self.shared);
        let collector = tokio::spawn(async move {
            while let Some(classified) = lines.recv().await {
                shared.state().record(classified);
            }
        });

        let cancel = CancellationToken::new();
        let ticker = tokio::spawn(tick_updates(
            Arc::clone(&self.shared),
            Duration::from_millis(self.config.update_interval_ms.max(1)),
            cancel.clone(),
        ));

        tracing::info!(command = %self.config.command().display(), "Log tracker started");
        self.running = Some(Running {
            observer,
            cancel,
            collector,
            ticker,
        });
        Ok(())
    }

    /// Stop the reader, drain every classified line, publish what is still
    /// pending, and join the background tasks.
    pub async fn stop(&mut self) -> Option<Result<StreamSummary, ObserverError>> {
        let running = self.running.take()?;
        running.cancel.cancel();
        let summary = running.observer.shutdown().await;
        if let Err(e) = running.collector.await {
            tracing::warn!(error = %e, "Log collector ended abnormally");
        }
        if let Err(e) = running.ticker.await {
            tracing::warn!(error = %e, "Update ticker ended abnormally");
        }
        self.shared.publish_pending();
        tracing::info!(total = self.shared.state().all.total(), "Log tracker stopped");
        summary
    }

    /// Copy of the "all" buffer.
    #[must_use]
    pub fn all_logs(&self) -> Vec<String> {
        self.shared.state().all.lines()
    }

    /// Copy of one category buffer. `None` for unknown categories and for
    /// categories that keep no buffer.
    #[must_use]
    pub fn category_logs(&self, name: &str) -> Option<Vec<String>> {
        if name == ALL_CATEGORY {
            return Some(self.all_logs());
        }
        let state = self.shared.state();
        state
            .categories
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.buffer.as_ref())
            .map(LogRingBuffer::lines)
    }

    #[must_use]
    pub fn totals(&self) -> TrackerTotals {
        self.shared.state().totals()
    }
}

impl ObservableSession for AggregationService {
    fn start_observing(&mut self) -> Result<(), ObserverError> {
        self.start()
    }

    /// Signals the reader only; `stop().await` joins everything.
    fn stop_observing(&mut self) -> Result<(), ObserverError> {
        if let Some(running) = self.running.as_mut() {
            running.cancel.cancel();
            running.observer.stop_observing()?;
        }
        Ok(())
    }

    fn state(&self) -> SessionState {
        self.running
            .as_ref()
            .map_or(SessionState::Idle, |r| r.observer.state())
    }
}

async fn tick_updates(shared: Arc<Shared>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => shared.publish_pending(),
        }
    }
}

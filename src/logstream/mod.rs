//! External log stream: process control, line filtering, classification
//! and bounded buffers.

mod classify;
mod filter;
mod observer;
mod process;
mod ring;

pub use classify::{ClassifiedLine, Classifier, ClassifyingLineObserver, LineCategory, MatchMode};
pub use filter::{FilterError, LineFilter, LinePattern};
pub use observer::{LineStreamObserver, StreamSummary, TERMINATE_TIMEOUT};
pub use process::{LogCommand, LogProcess, ProcessError, BUFFER_DEFAULT, DEFAULT_BINARY};
pub use ring::LogRingBuffer;

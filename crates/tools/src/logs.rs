use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// One captured log message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub text: String,
    /// Time since the buffer was created.
    pub timestamp: Duration,
}

#[derive(Debug)]
struct Inner {
    started: Instant,
    capacity: usize,
    entries: Vec<LogEntry>,
    dropped: usize,
}

/// Shared, bounded store of log messages for the in-app log window.
///
/// Keeps the first `capacity` messages; later ones are only counted.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    inner: Arc<Mutex<Inner>>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl LogBuffer {
    pub const DEFAULT_CAPACITY: usize = 1000;

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                started: Instant::now(),
                capacity,
                entries: Vec::new(),
                dropped: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, level: Level, target: &str, text: String) {
        let mut inner = self.lock();
        if inner.entries.len() >= inner.capacity {
            inner.dropped += 1;
            return;
        }
        let timestamp = inner.started.elapsed();
        inner.entries.push(LogEntry {
            level,
            target: target.to_string(),
            text,
            timestamp,
        });
    }

    /// Up to `limit` of the oldest messages.
    pub fn first(&self, limit: usize) -> Vec<LogEntry> {
        self.lock().entries.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages that arrived after the buffer was full.
    pub fn dropped(&self) -> usize {
        self.lock().dropped
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.dropped = 0;
    }

    /// A subscriber layer feeding this buffer.
    pub fn layer(&self) -> LogCaptureLayer {
        LogCaptureLayer {
            buffer: self.clone(),
            min_level: Level::INFO,
        }
    }
}

/// `tracing` layer that copies events into a [`LogBuffer`].
#[derive(Debug, Clone)]
pub struct LogCaptureLayer {
    buffer: LogBuffer,
    min_level: Level,
}

impl LogCaptureLayer {
    /// Capture events at `level` and more severe. Defaults to `INFO`.
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // Level ordering: TRACE is the greatest, ERROR the least.
        if *metadata.level() > self.min_level {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        visitor.message.push_str(&visitor.fields);
        self.buffer
            .push(*metadata.level(), metadata.target(), visitor.message);
    }
}

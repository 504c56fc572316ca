use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for stream sessions across the process.
///
/// Thread-safe atomic counters; every session updates the global
/// [`STREAM_METRICS`] instance.
#[derive(Default)]
pub struct StreamMetrics {
    /// Sessions that reached the streaming state
    pub sessions_started: AtomicU64,

    /// Sessions that ended at end-of-stream
    pub sessions_completed: AtomicU64,

    /// Sessions ended by their cancellation token
    pub sessions_cancelled: AtomicU64,

    /// Sessions ended by a transport or framing failure
    pub sessions_failed: AtomicU64,

    /// Frames extracted by the assembler
    pub frames_assembled: AtomicU64,

    /// Events handed to callers, including synthesized cancellations
    pub events_dispatched: AtomicU64,

    /// Payload lines dropped because they did not decode
    pub decode_failures: AtomicU64,

    /// Raw body bytes received
    pub bytes_received: AtomicU64,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_completed(&self) {
        self.sessions_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_cancelled(&self) {
        self.sessions_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_failed(&self) {
        self.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_assembled(&self) {
        self.frames_assembled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_dispatched(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failures(&self, count: usize) {
        self.decode_failures
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_bytes_received(&self, count: usize) {
        self.bytes_received
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Sessions that started but have not reached a terminal state
    pub fn active_sessions(&self) -> u64 {
        let started = self.sessions_started.load(Ordering::Relaxed);
        let ended = self.sessions_completed.load(Ordering::Relaxed)
            + self.sessions_cancelled.load(Ordering::Relaxed)
            + self.sessions_failed.load(Ordering::Relaxed);
        started.saturating_sub(ended)
    }

    /// Get snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_completed: self.sessions_completed.load(Ordering::Relaxed),
            sessions_cancelled: self.sessions_cancelled.load(Ordering::Relaxed),
            sessions_failed: self.sessions_failed.load(Ordering::Relaxed),
            frames_assembled: self.frames_assembled.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics (useful for testing)
    pub fn reset(&self) {
        self.sessions_started.store(0, Ordering::Relaxed);
        self.sessions_completed.store(0, Ordering::Relaxed);
        self.sessions_cancelled.store(0, Ordering::Relaxed);
        self.sessions_failed.store(0, Ordering::Relaxed);
        self.frames_assembled.store(0, Ordering::Relaxed);
        self.events_dispatched.store(0, Ordering::Relaxed);
        self.decode_failures.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
    }
}

/// Immutable snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub sessions_cancelled: u64,
    pub sessions_failed: u64,
    pub frames_assembled: u64,
    pub events_dispatched: u64,
    pub decode_failures: u64,
    pub bytes_received: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Stream Metrics: {} sessions ({} completed, {} cancelled, {} failed), {} frames, {} events, {} dropped, {:.1}KB",
            self.sessions_started,
            self.sessions_completed,
            self.sessions_cancelled,
            self.sessions_failed,
            self.frames_assembled,
            self.events_dispatched,
            self.decode_failures,
            self.bytes_received as f64 / 1024.0
        )
    }
}

lazy_static::lazy_static! {
    /// Global metrics instance
    pub static ref STREAM_METRICS: StreamMetrics = StreamMetrics::new();
}

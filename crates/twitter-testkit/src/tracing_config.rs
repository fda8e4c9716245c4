//! Tracing setup and event capture for tests.

use std::fmt;
use std::sync::{Arc, Once};

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    EnvFilter,
    layer::{Context, Layer, SubscriberExt},
    util::SubscriberInitExt,
};

static INIT: Once = Once::new();

/// Initialize global tracing for tests.
///
/// Safe to call from every test; only the first call installs the
/// subscriber. Honors `RUST_LOG`, defaulting to `info,twitter_stream=debug`.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,twitter_stream=debug"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .compact(),
            )
            .try_init();
    });
}

/// Records tracing events emitted on the current thread.
///
/// Install with [`TracingCapture::install`] and keep the guard alive for the
/// duration of the test. Use a current-thread runtime so spawned tasks log
/// through the same subscriber.
#[derive(Debug, Clone, Default)]
pub struct TracingCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

/// A captured tracing event.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub target: String,
}

impl TracingCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make this capture the thread's default subscriber.
    #[must_use = "events are only captured while the guard is alive"]
    pub fn install(&self) -> DefaultGuard {
        tracing_subscriber::registry()
            .with(CaptureLayer {
                events: Arc::clone(&self.events),
            })
            .set_default()
    }

    /// All captured events.
    #[must_use]
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    /// Whether any event message contains `message`.
    #[must_use]
    pub fn contains(&self, message: &str) -> bool {
        self.events.lock().iter().any(|e| e.message.contains(message))
    }

    /// Number of events at `level`.
    #[must_use]
    pub fn count(&self, level: Level) -> usize {
        self.events.lock().iter().filter(|e| e.level == level).count()
    }

    /// Assert no error-level events were captured.
    ///
    /// # Panics
    ///
    /// Panics if any were.
    pub fn assert_no_errors(&self) {
        let errors: Vec<_> = self
            .events
            .lock()
            .iter()
            .filter(|e| e.level == Level::ERROR)
            .cloned()
            .collect();

        assert!(errors.is_empty(), "Expected no errors but found: {errors:?}");
    }
}

struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.events.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            target: event.metadata().target().to_string(),
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_records_levels() {
        let capture = TracingCapture::new();
        {
            let _guard = capture.install();
            tracing::info!("Connected to stream");
            tracing::warn!(status = 500, "Stream connection lost");
        }
        tracing::error!("not captured");

        assert!(capture.contains("Connected"));
        assert_eq!(capture.count(Level::WARN), 1);
        capture.assert_no_errors();
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_panics() {
        let capture = TracingCapture::new();
        let _guard = capture.install();
        tracing::error!("boom");
        capture.assert_no_errors();
    }
}

//! Timer abstraction used to schedule reconnects.

use std::fmt;
use std::time::Duration;

use futures_util::future::BoxFuture;

/// A pending timer. Dropping it cancels the timer.
pub type Sleep = BoxFuture<'static, ()>;

/// Source of reconnect timers.
///
/// The service never reaches for a global timer; production code passes
/// [`TokioClock`] and tests pass a manually advanced clock.
pub trait Clock: Send + Sync + fmt::Debug {
    /// A future that completes once `duration` has elapsed on this clock.
    fn sleep(&self, duration: Duration) -> Sleep;
}

/// Clock backed by the tokio timer wheel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn sleep(&self, duration: Duration) -> Sleep {
        Box::pin(tokio::time::sleep(duration))
    }
}

//! Manually advanced clock.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use parking_lot::Mutex;
use twitter_stream::{Clock, Sleep};

/// A [`Clock`] whose time only moves when the test calls [`ManualClock::advance`].
///
/// Dropped timers are forgotten, so [`ManualClock::pending_timers`] shows
/// whether a reconnect is really scheduled.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<Mutex<ClockState>>,
}

#[derive(Debug, Default)]
struct ClockState {
    now: Duration,
    next_id: u64,
    timers: BTreeMap<u64, Timer>,
}

#[derive(Debug)]
struct Timer {
    deadline: Duration,
    fired: bool,
    waker: Option<Waker>,
}

impl ManualClock {
    /// Create a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since creation.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.lock().now
    }

    /// Move time forward, firing every timer that falls due.
    pub fn advance(&self, by: Duration) {
        let wakers: Vec<Waker> = {
            let mut state = self.inner.lock();
            state.now += by;
            let now = state.now;
            state
                .timers
                .values_mut()
                .filter(|t| !t.fired && t.deadline <= now)
                .filter_map(|t| {
                    t.fired = true;
                    t.waker.take()
                })
                .collect()
        };

        for waker in wakers {
            waker.wake();
        }
    }

    /// Shorthand for `advance(Duration::from_secs(secs))`.
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Number of timers that are scheduled and have not fired.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.lock().timers.values().filter(|t| !t.fired).count()
    }

    /// Time remaining on each pending timer, soonest first.
    #[must_use]
    pub fn pending_delays(&self) -> Vec<Duration> {
        let state = self.inner.lock();
        let mut delays: Vec<_> = state
            .timers
            .values()
            .filter(|t| !t.fired)
            .map(|t| t.deadline.saturating_sub(state.now))
            .collect();
        delays.sort();
        delays
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration) -> Sleep {
        let id = {
            let mut state = self.inner.lock();
            let id = state.next_id;
            state.next_id += 1;
            let deadline = state.now + duration;
            state.timers.insert(
                id,
                Timer {
                    deadline,
                    fired: duration.is_zero(),
                    waker: None,
                },
            );
            id
        };

        Box::pin(ManualSleep {
            id,
            clock: Arc::clone(&self.inner),
        })
    }
}

struct ManualSleep {
    id: u64,
    clock: Arc<Mutex<ClockState>>,
}

impl Future for ManualSleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut state = self.clock.lock();
        match state.timers.get_mut(&self.id) {
            Some(timer) if timer.fired => Poll::Ready(()),
            Some(timer) => {
                timer.waker = Some(cx.waker().clone());
                Poll::Pending
            }
            None => Poll::Ready(()),
        }
    }
}

impl Drop for ManualSleep {
    fn drop(&mut self) {
        self.clock.lock().timers.remove(&self.id);
    }
}

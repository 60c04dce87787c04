//! One-second countdown driving time-based auto-submission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

/// Events emitted by a running countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Seconds left after this tick.
    Tick(u32),
    /// The countdown reached zero. Emitted at most once.
    Expired,
}

/// A repeating countdown running on the tokio runtime.
///
/// Every event is delivered while holding a gate, after checking the stopped
/// flag. `stop` sets the flag and then takes the gate, so once it returns no
/// event is running or will run, even on a multi-thread runtime where a tick
/// was already due.
pub struct CountdownTimer {
    stopped: Arc<AtomicBool>,
    gate: Arc<Mutex<()>>,
    task: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    /// Start counting down from `initial_seconds`, one step per `period`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start<F>(initial_seconds: u32, period: Duration, on_event: F) -> Self
    where
        F: FnMut(TimerEvent) + Send + 'static,
    {
        let stopped = Arc::new(AtomicBool::new(false));
        let gate = Arc::new(Mutex::new(()));
        let task = tokio::spawn(run(
            initial_seconds,
            period,
            Gate {
                stopped: Arc::clone(&stopped),
                lock: Arc::clone(&gate),
            },
            on_event,
        ));
        Self {
            stopped,
            gate,
            task: Some(task),
        }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Cancel pending ticks and wait out an event that is being delivered.
    /// Safe to call repeatedly or after expiry.
    ///
    /// Must not be called from inside the event callback.
    pub fn stop(&mut self) {
        self.cancel();
        drop(self.gate.lock().unwrap_or_else(PoisonError::into_inner));
    }

    fn cancel(&mut self) {
        self.stopped.store(true, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Stop and wait for the ticking task to be gone.
    ///
    /// Must not be awaited from within the timer's own callback.
    pub async fn shutdown(&mut self) {
        self.stopped.store(true, Ordering::Release);
        drop(self.gate.lock().unwrap_or_else(PoisonError::into_inner));
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

// The last handle may be dropped from inside a callback, so dropping only
// cancels and never waits on the gate.
impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct Gate {
    stopped: Arc<AtomicBool>,
    lock: Arc<Mutex<()>>,
}

impl Gate {
    /// Deliver `event` unless stopped. `last` also marks the timer stopped.
    fn deliver<F>(&self, on_event: &mut F, event: TimerEvent, last: bool) -> bool
    where
        F: FnMut(TimerEvent),
    {
        let _held = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let was_stopped = if last {
            self.stopped.swap(true, Ordering::AcqRel)
        } else {
            self.stopped.load(Ordering::Acquire)
        };
        if was_stopped {
            return false;
        }
        on_event(event);
        true
    }
}

async fn run<F>(mut remaining: u32, period: Duration, gate: Gate, mut on_event: F)
where
    F: FnMut(TimerEvent),
{
    let mut ticker = interval_at(Instant::now() + period, period);
    while remaining > 0 {
        ticker.tick().await;
        remaining -= 1;
        if !gate.deliver(&mut on_event, TimerEvent::Tick(remaining), false) {
            return;
        }
    }
    gate.deliver(&mut on_event, TimerEvent::Expired, true);
}

//! Timer scheduler
//!
//! Owned by the presentation side. A dedicated thread sleeps on its own
//! mutex and condition variable and, when the interval elapses, posts a
//! timer firing through [`Coordinator::fire_timer`]. It never touches
//! interpreter state directly.

use std::mem;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::Coordinator;

#[derive(Debug, Default)]
struct TimerState {
    interval: Option<Duration>,
    /// The interval was replaced; restart the countdown
    changed: bool,
    stopped: bool,
}

type Shared = Arc<(Mutex<TimerState>, Condvar)>;

fn lock(shared: &Shared) -> MutexGuard<'_, TimerState> {
    shared.0.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Periodic timer feeding a coordinator
#[derive(Default)]
pub struct TimerScheduler {
    shared: Shared,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TimerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the timer thread for `coordinator`.
    ///
    /// Only a weak reference is kept, so a presenter owning the scheduler
    /// can itself be owned by the coordinator. The thread ends on `stop`
    /// or once the coordinator is gone.
    pub fn attach(&self, coordinator: &Arc<Coordinator>) -> std::io::Result<()> {
        let mut thread = self.thread.lock().unwrap_or_else(PoisonError::into_inner);
        if thread.is_some() {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        let target = Arc::downgrade(coordinator);
        *thread = Some(
            std::thread::Builder::new()
                .name("glk-timer".to_string())
                .spawn(move || run(shared, target))?,
        );
        Ok(())
    }

    /// Replace the interval; `None` stops firing
    pub fn set_interval(&self, interval: Option<Duration>) {
        let mut state = lock(&self.shared);
        state.interval = interval.filter(|d| !d.is_zero());
        state.changed = true;
        self.shared.1.notify_all();
    }

    pub fn interval(&self) -> Option<Duration> {
        lock(&self.shared).interval
    }

    /// Stop the thread and wait for it to end
    pub fn stop(&self) {
        {
            let mut state = lock(&self.shared);
            state.stopped = true;
            self.shared.1.notify_all();
        }
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        let mut state = lock(&self.shared);
        state.stopped = true;
        self.shared.1.notify_all();
        // Don't join in drop; the last coordinator handle may be on the timer thread
    }
}

impl std::fmt::Debug for TimerScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerScheduler")
            .field("state", &*lock(&self.shared))
            .finish()
    }
}

fn run(shared: Shared, target: Weak<Coordinator>) {
    let mut state = lock(&shared);
    let mut deadline: Option<Instant> = None;
    loop {
        if state.stopped {
            break;
        }
        if mem::take(&mut state.changed) {
            deadline = state.interval.map(|interval| Instant::now() + interval);
        }
        let Some(at) = deadline else {
            state = shared.1.wait(state).unwrap_or_else(PoisonError::into_inner);
            continue;
        };
        let now = Instant::now();
        if now < at {
            state = shared
                .1
                .wait_timeout(state, at - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
            continue;
        }

        // Next firing counts from now; missed periods are not replayed
        deadline = state.interval.map(|interval| now + interval);
        drop(state);
        match target.upgrade() {
            Some(coordinator) => coordinator.fire_timer(),
            None => return,
        }
        state = lock(&shared);
    }
    tracing::debug!("timer thread stopped");
}

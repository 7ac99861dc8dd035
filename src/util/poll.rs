//! Fixed-interval polling as a single abortable task.
//!
//! SYSTEM CONTEXT
//! ==============
//! The chat view refreshes its feed on mount and then on a timer for as long
//! as it stays mounted. The caller spawns the returned future on the local
//! executor and keeps the [`PollHandle`] alive for the mount's lifetime.
//!
//! DESIGN
//! ======
//! Each timer fire starts a new tick without waiting for earlier ones; every
//! tick still in flight is driven by the same task, so aborting the task drops
//! them all. The timer source is injected so tests can fire it by hand.

#[cfg(test)]
#[path = "poll_test.rs"]
mod poll_test;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::StreamExt;
use futures::future::{AbortHandle, Abortable};
use futures::stream::FuturesUnordered;

/// Stops the poll task when told to or when dropped.
#[must_use = "dropping the handle stops polling"]
#[derive(Debug)]
pub struct PollHandle {
    abort: AbortHandle,
    running: Arc<AtomicBool>,
}

impl PollHandle {
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::Relaxed) {
            log::debug!("poll task stopped");
        }
        self.abort.abort();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run `tick` now and then every `interval`, timed by `sleep`.
///
/// Returns the stop handle and the task future to spawn. The future resolves
/// once the handle stops it.
pub fn poll_every<T, TF, S, SF>(interval: Duration, mut tick: T, mut sleep: S) -> (PollHandle, impl Future<Output = ()>)
where
    T: FnMut() -> TF,
    TF: Future<Output = ()>,
    S: FnMut(Duration) -> SF,
    SF: Future<Output = ()>,
{
    let running = Arc::new(AtomicBool::new(true));
    let (abort, registration) = AbortHandle::new_pair();
    let task_running = Arc::clone(&running);

    let run = async move {
        let mut in_flight = FuturesUnordered::new();
        while task_running.load(Ordering::Relaxed) {
            in_flight.push(tick());
            let timer = sleep(interval).fuse();
            futures::pin_mut!(timer);
            loop {
                futures::select! {
                    () = timer => break,
                    () = in_flight.select_next_some() => {}
                }
            }
        }
    };

    let task = Abortable::new(run, registration).map(|_| ());
    (PollHandle { abort, running }, task)
}

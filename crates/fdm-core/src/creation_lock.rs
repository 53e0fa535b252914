//! Strictly FIFO async mutex serializing task creation.
//!
//! Waiters queue in arrival order and ownership is handed directly to the
//! head of the queue on release, so a late arrival can never overtake an
//! earlier one. The lock guards no data; it orders `add` calls so path
//! allocation and list insertion happen one creation at a time.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct LockState {
    locked: bool,
    waiters: VecDeque<oneshot::Sender<()>>,
}

#[derive(Debug, Default)]
pub struct CreationLock {
    state: Mutex<LockState>,
}

impl CreationLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits for exclusive ownership. Cancel-safe: dropping the future gives
    /// up the place in line, or passes ownership on if it was already handed over.
    pub async fn lock(&self) -> CreationGuard<'_> {
        loop {
            let rx = {
                let mut st = self.state();
                if !st.locked {
                    st.locked = true;
                    return CreationGuard { lock: self };
                }
                let (tx, rx) = oneshot::channel();
                st.waiters.push_back(tx);
                rx
            };

            let mut wait = PendingAcquire {
                lock: self,
                rx,
                settled: false,
            };
            let handed_over = (&mut wait.rx).await.is_ok();
            wait.settled = true;
            if handed_over {
                return CreationGuard { lock: self };
            }
        }
    }

    /// Number of queued waiters.
    pub fn queue_len(&self) -> usize {
        self.state().waiters.len()
    }

    fn release(&self) {
        let mut st = self.state();
        while let Some(next) = st.waiters.pop_front() {
            // A failed send means that waiter was cancelled; try the next one.
            if next.send(()).is_ok() {
                return;
            }
        }
        st.locked = false;
    }
}

/// Held while creating a task; releases on drop, on every exit path.
#[derive(Debug)]
pub struct CreationGuard<'a> {
    lock: &'a CreationLock,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// A queued `lock()` call. If dropped before it settles, it withdraws.
struct PendingAcquire<'a> {
    lock: &'a CreationLock,
    rx: oneshot::Receiver<()>,
    settled: bool,
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.rx.close();
        if self.rx.try_recv().is_ok() {
            // Ownership arrived after we stopped waiting; pass it on.
            self.lock.release();
        }
    }
}

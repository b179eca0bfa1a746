use crate::errors::EngineError;
use crate::messages::LockSink;
use std::collections::VecDeque;

/// Cooperative FIFO lock.
///
/// The first `lock()` is granted immediately; each later one is granted
/// when its predecessor calls `unlock()`. The arbiter never blocks the
/// request queue itself — callers wanting atomicity hold a lock around
/// their own sends, and callers that take no lock interleave freely.
#[derive(Default)]
pub struct LockArbiter {
    held: bool,
    waiters: VecDeque<LockSink>,
}

impl LockArbiter {
    pub fn new() -> Self {
        Self {
            held: false,
            waiters: VecDeque::new(),
        }
    }

    /// Request the lock. The sink resolves when the lock is granted.
    pub fn lock(&mut self, granted: LockSink) {
        if self.held {
            self.waiters.push_back(granted);
        } else {
            self.held = true;
            let _ = granted.send(Ok(()));
        }
    }

    /// Release the oldest outstanding lock, granting the next waiter if
    /// any. Releasing while nothing is held is a no-op.
    pub fn unlock(&mut self) {
        // A waiter whose caller gave up is skipped, not granted.
        while let Some(next) = self.waiters.pop_front() {
            if next.send(Ok(())).is_ok() {
                return;
            }
        }
        self.held = false;
    }

    /// Whether at least one lock is held.
    pub fn locked(&self) -> bool {
        self.held
    }

    /// Fail every waiter with `Cleared` and drop the held lock.
    pub fn clear(&mut self) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(EngineError::Cleared));
        }
        self.held = false;
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use futures_channel::oneshot;

    fn sink() -> (LockSink, oneshot::Receiver<Result<(), EngineError>>) {
        oneshot::channel()
    }

    #[test]
    fn test_first_grant_is_immediate() {
        let mut arbiter = LockArbiter::new();
        let (tx, mut rx) = sink();
        arbiter.lock(tx);
        assert_eq!(rx.try_recv().unwrap(), Some(Ok(())));
        assert!(arbiter.locked());
    }

    #[test]
    fn test_grants_are_fifo() {
        let mut arbiter = LockArbiter::new();
        let (a, mut ra) = sink();
        let (b, mut rb) = sink();
        let (c, mut rc) = sink();

        arbiter.lock(a);
        arbiter.lock(b);
        arbiter.lock(c);

        assert_eq!(ra.try_recv().unwrap(), Some(Ok(())));
        assert_eq!(rb.try_recv().unwrap(), None);

        arbiter.unlock();
        assert_eq!(rb.try_recv().unwrap(), Some(Ok(())));
        assert_eq!(rc.try_recv().unwrap(), None);

        arbiter.unlock();
        assert_eq!(rc.try_recv().unwrap(), Some(Ok(())));

        arbiter.unlock();
        assert!(!arbiter.locked());
    }

    #[test]
    fn test_unlock_without_lock_is_noop() {
        let mut arbiter = LockArbiter::new();
        arbiter.unlock();
        assert!(!arbiter.locked());
    }

    #[test]
    fn test_abandoned_waiter_is_skipped() {
        let mut arbiter = LockArbiter::new();
        let (a, _ra) = sink();
        let (b, rb) = sink();
        let (c, mut rc) = sink();

        arbiter.lock(a);
        arbiter.lock(b);
        arbiter.lock(c);
        drop(rb); // second caller went away

        arbiter.unlock();
        assert_eq!(rc.try_recv().unwrap(), Some(Ok(())));
        assert!(arbiter.locked());
    }

    #[test]
    fn test_clear_fails_waiters_and_releases() {
        let mut arbiter = LockArbiter::new();
        let (a, _ra) = sink();
        let (b, mut rb) = sink();
        arbiter.lock(a);
        arbiter.lock(b);

        arbiter.clear();
        assert_eq!(rb.try_recv().unwrap(), Some(Err(EngineError::Cleared)));
        assert!(!arbiter.locked());
    }
}

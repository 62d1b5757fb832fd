//! The monitor attached to every object, backing `monitorenter`, `monitorexit` and
//! `Object.wait`/`notify`. §17.1
//!
//! Threads never block the host. A thread that cannot take a monitor is marked `Blocked` and
//! queued. The thread releasing the monitor hands it over directly, lock count included, and
//! marks the next thread `Runnable` again.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::vm::error::{names, JavaException};
use crate::vm::thread::ThreadStatus;

#[derive(Debug)]
struct Waiter {
    thread: u64,
    status: Rc<Cell<ThreadStatus>>,
    /// The number of times the thread had entered the monitor.
    locks: usize,
}

#[derive(Debug, Default)]
pub struct Monitor {
    owner: Option<u64>,
    count: usize,
    /// Threads blocked on entry, in arrival order.
    entry_queue: VecDeque<Waiter>,
    /// Threads that called `wait` and have not been notified.
    wait_set: VecDeque<Waiter>,
}

fn not_owner() -> JavaException {
    JavaException::new(names::ILLEGAL_MONITOR_STATE_EXCEPTION,
                       "current thread is not owner")
}

impl Monitor {
    pub fn new() -> Self {
        Monitor::default()
    }

    pub fn owner(&self) -> Option<u64> {
        self.owner
    }

    /// How many times the owner has entered the monitor.
    pub fn entry_count(&self) -> usize {
        self.count
    }

    pub fn is_owned_by(&self, thread: u64) -> bool {
        self.owner == Some(thread)
    }

    /// Enters the monitor. Returns `false` when the thread had to block; the monitor is then
    /// handed to it later by `exit`, and it resumes as the owner.
    pub fn enter(&mut self, thread: u64, status: &Rc<Cell<ThreadStatus>>) -> bool {
        match self.owner {
            None => {
                self.owner = Some(thread);
                self.count = 1;
                true
            },
            Some(owner) if owner == thread => {
                self.count += 1;
                true
            },
            Some(_) => {
                status.set(ThreadStatus::Blocked);
                self.entry_queue.push_back(Waiter { thread, status: status.clone(), locks: 1 });
                false
            },
        }
    }

    pub fn exit(&mut self, thread: u64) -> Result<(), JavaException> {
        if !self.is_owned_by(thread) {
            return Err(not_owner());
        }
        self.count -= 1;
        if self.count == 0 {
            self.owner = None;
            self.unblock();
        }
        Ok(())
    }

    /// Passes an unowned monitor on to the first thread queued for it.
    fn unblock(&mut self) {
        if self.owner.is_some() {
            return;
        }
        if let Some(next) = self.entry_queue.pop_front() {
            self.owner = Some(next.thread);
            self.count = next.locks;
            next.status.set(ThreadStatus::Runnable);
        }
    }

    /// Releases every lock the thread holds and parks it until notified. A positive `timeout`
    /// only changes the reported status; the thread is still woken by `notify`.
    pub fn wait(&mut self, thread: u64, status: &Rc<Cell<ThreadStatus>>, timeout: i64)
                -> Result<(), JavaException> {
        if !self.is_owned_by(thread) {
            return Err(not_owner());
        }
        status.set(if timeout > 0 { ThreadStatus::TimedWaiting } else { ThreadStatus::Waiting });
        self.wait_set.push_back(Waiter { thread, status: status.clone(), locks: self.count });
        self.owner = None;
        self.count = 0;
        self.unblock();
        Ok(())
    }

    /// Moves one waiting thread to the entry queue.
    pub fn notify(&mut self, thread: u64) -> Result<(), JavaException> {
        if !self.is_owned_by(thread) {
            return Err(not_owner());
        }
        if let Some(waiter) = self.wait_set.pop_front() {
            waiter.status.set(ThreadStatus::Blocked);
            self.entry_queue.push_back(waiter);
        }
        Ok(())
    }

    pub fn notify_all(&mut self, thread: u64) -> Result<(), JavaException> {
        if !self.is_owned_by(thread) {
            return Err(not_owner());
        }
        while let Some(waiter) = self.wait_set.pop_front() {
            waiter.status.set(ThreadStatus::Blocked);
            self.entry_queue.push_back(waiter);
        }
        Ok(())
    }

    pub fn waiting(&self) -> usize {
        self.wait_set.len()
    }

    pub fn blocked(&self) -> usize {
        self.entry_queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> Rc<Cell<ThreadStatus>> {
        Rc::new(Cell::new(ThreadStatus::Runnable))
    }

    #[test]
    fn reentrant_enter_and_exit() {
        let mut monitor = Monitor::new();
        let t1 = status();
        assert!(monitor.enter(1, &t1));
        assert!(monitor.enter(1, &t1));
        assert_eq!(monitor.entry_count(), 2);
        monitor.exit(1).unwrap();
        assert_eq!(monitor.owner(), Some(1));
        monitor.exit(1).unwrap();
        assert_eq!(monitor.owner(), None);
    }

    #[test]
    fn contention_blocks_until_handoff() {
        let mut monitor = Monitor::new();
        let (t1, t2) = (status(), status());
        assert!(monitor.enter(1, &t1));
        assert!(!monitor.enter(2, &t2));
        assert_eq!(t2.get(), ThreadStatus::Blocked);
        monitor.exit(1).unwrap();
        assert_eq!(monitor.owner(), Some(2));
        assert_eq!(t2.get(), ThreadStatus::Runnable);
    }

    #[test]
    fn non_owner_cannot_exit_or_wait() {
        let mut monitor = Monitor::new();
        assert!(monitor.exit(1).is_err());
        assert!(monitor.wait(1, &status(), 0).is_err());
        assert!(monitor.notify(1).is_err());
        assert!(monitor.notify_all(1).is_err());
    }

    #[test]
    fn wait_releases_and_notify_restores_lock_count() {
        let mut monitor = Monitor::new();
        let (t1, t2) = (status(), status());
        monitor.enter(1, &t1);
        monitor.enter(1, &t1);
        monitor.wait(1, &t1, 0).unwrap();
        assert_eq!(t1.get(), ThreadStatus::Waiting);
        assert_eq!(monitor.owner(), None);

        assert!(monitor.enter(2, &t2));
        monitor.notify(2).unwrap();
        assert_eq!(t1.get(), ThreadStatus::Blocked);
        monitor.exit(2).unwrap();
        assert_eq!(t1.get(), ThreadStatus::Runnable);
        assert_eq!(monitor.owner(), Some(1));
        assert_eq!(monitor.entry_count(), 2);
    }

    #[test]
    fn timed_wait_status() {
        let mut monitor = Monitor::new();
        let t1 = status();
        monitor.enter(1, &t1);
        monitor.wait(1, &t1, 10).unwrap();
        assert_eq!(t1.get(), ThreadStatus::TimedWaiting);
    }
}

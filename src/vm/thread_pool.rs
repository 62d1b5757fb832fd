//! Round-robin scheduling of Java threads on the host thread.

use std::collections::VecDeque;

use crate::vm::error::VmError;
use crate::vm::thread::{Thread, ThreadStatus};

#[derive(Default)]
pub struct ThreadPool {
    threads: VecDeque<Thread>,
}

impl ThreadPool {
    pub fn new() -> Self {
        ThreadPool::default()
    }

    pub fn add_thread(&mut self, thread: Thread) {
        debug!("thread pool: adding thread {}", thread.id());
        self.threads.push_back(thread);
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn threads(&self) -> impl Iterator<Item = &Thread> {
        self.threads.iter()
    }

    /// Gives each runnable thread up to `quantum` instructions in turn, until every thread has
    /// terminated or none can make progress. Terminated threads are dropped from the pool and
    /// returned.
    pub fn run(&mut self, quantum: usize) -> Result<Vec<Thread>, VmError> {
        let mut finished = vec![];
        loop {
            let mut progressed = false;
            for _ in 0..self.threads.len() {
                let mut thread = match self.threads.pop_front() {
                    Some(thread) => thread,
                    None => break,
                };
                if thread.is_runnable() {
                    trace!("thread pool: running thread {}", thread.id());
                    if thread.run_for(quantum)? > 0 {
                        progressed = true;
                    }
                }
                if thread.status() == ThreadStatus::Terminated {
                    debug!("thread pool: thread {} finished", thread.id());
                    finished.push(thread);
                } else {
                    self.threads.push_back(thread);
                }
            }
            if self.threads.is_empty() {
                return Ok(finished);
            }
            if !progressed {
                warn!("thread pool: {} threads left, none runnable", self.threads.len());
                return Ok(finished);
            }
        }
    }
}

//! One-shot handle for an asynchronous submission.
//!
//! # Design
//! A `CaptchaTask` moves through `Created -> Running -> Completed | Failed`
//! exactly once. The worker thread publishes its result through a
//! `Completer`; if the worker dies before publishing (a panicking callback,
//! a failed spawn), dropping the completer publishes `Error::WorkerLost` so
//! waiters never hang.
//!
//! A submission cannot be aborted once dispatched: `cancel` accepts the
//! request and does nothing.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::session::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Created,
    Running,
    Completed,
    Failed,
}

#[derive(Debug)]
enum Slot {
    Created,
    Running,
    Done(Result<String>),
}

#[derive(Debug)]
struct Shared {
    slot: Mutex<Slot>,
    done: Condvar,
}

/// Handle to the answer of one asynchronous submission.
#[derive(Debug)]
pub struct CaptchaTask {
    shared: Arc<Shared>,
}

impl CaptchaTask {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::Created),
                done: Condvar::new(),
            }),
        }
    }

    pub fn status(&self) -> TaskStatus {
        match &*lock(&self.shared.slot) {
            Slot::Created => TaskStatus::Created,
            Slot::Running => TaskStatus::Running,
            Slot::Done(Ok(_)) => TaskStatus::Completed,
            Slot::Done(Err(_)) => TaskStatus::Failed,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.status(), TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Block until the submission finishes and return its outcome.
    pub fn wait(&self) -> Result<String> {
        let mut slot = lock(&self.shared.slot);
        loop {
            match &*slot {
                Slot::Created => return Err(Error::NotStarted),
                Slot::Done(result) => return result.clone(),
                Slot::Running => {}
            }
            slot = self
                .shared
                .done
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like `wait`, but give up with `Error::Timeout` after `timeout`.
    ///
    /// Timing out leaves the submission running; call again to keep waiting.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<String> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait();
        };
        let mut slot = lock(&self.shared.slot);
        loop {
            match &*slot {
                Slot::Created => return Err(Error::NotStarted),
                Slot::Done(result) => return result.clone(),
                Slot::Running => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let (guard, _) = self
                .shared
                .done
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }
    }

    /// Always returns `false`: the remote job cannot be aborted.
    pub fn cancel(&self) -> bool {
        log::debug!("cancellation requested; submissions cannot be cancelled");
        false
    }

    /// Move from `Created` to `Running` and hand out the completer.
    pub(crate) fn begin(&self) -> Result<Completer> {
        let mut slot = lock(&self.shared.slot);
        if !matches!(*slot, Slot::Created) {
            return Err(Error::TaskAlreadyStarted);
        }
        *slot = Slot::Running;
        Ok(Completer {
            shared: Arc::clone(&self.shared),
            published: false,
        })
    }
}

/// Worker-side half of a `CaptchaTask`.
#[derive(Debug)]
pub(crate) struct Completer {
    shared: Arc<Shared>,
    published: bool,
}

impl Completer {
    pub(crate) fn complete(mut self, result: Result<String>) {
        self.publish(result);
    }

    fn publish(&mut self, result: Result<String>) {
        *lock(&self.shared.slot) = Slot::Done(result);
        self.published = true;
        self.shared.done.notify_all();
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        if !self.published {
            log::warn!("submission worker exited without publishing a result");
            self.publish(Err(Error::WorkerLost));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn lifecycle_created_running_completed() {
        let task = CaptchaTask::new();
        assert_eq!(task.status(), TaskStatus::Created);
        assert!(matches!(task.wait(), Err(Error::NotStarted)));

        let completer = task.begin().unwrap();
        assert_eq!(task.status(), TaskStatus::Running);
        assert!(!task.is_done());

        completer.complete(Ok("ABCD".to_string()));
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.wait().unwrap(), "ABCD");
        assert_eq!(task.wait().unwrap(), "ABCD");
    }

    #[test]
    fn failure_is_reported_to_every_wait() {
        let task = CaptchaTask::new();
        task.begin().unwrap().complete(Err(Error::Remote {
            message: "INVALID USER".to_string(),
            status: None,
        }));
        assert_eq!(task.status(), TaskStatus::Failed);
        assert!(matches!(task.wait(), Err(Error::Remote { .. })));
        assert!(matches!(task.wait_timeout(Duration::from_millis(1)), Err(Error::Remote { .. })));
    }

    #[test]
    fn begin_twice_is_rejected() {
        let task = CaptchaTask::new();
        let _completer = task.begin().unwrap();
        assert!(matches!(task.begin(), Err(Error::TaskAlreadyStarted)));
    }

    #[test]
    fn wait_timeout_leaves_task_running() {
        let task = CaptchaTask::new();
        let completer = task.begin().unwrap();

        let err = task.wait_timeout(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert_eq!(task.status(), TaskStatus::Running);

        completer.complete(Ok("LATE".to_string()));
        assert_eq!(task.wait_timeout(Duration::from_millis(20)).unwrap(), "LATE");
    }

    #[test]
    fn unbounded_timeout_waits_for_the_result() {
        let task = CaptchaTask::new();
        let completer = task.begin().unwrap();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            completer.complete(Ok("SLOW".to_string()));
        });
        assert_eq!(task.wait_timeout(Duration::MAX).unwrap(), "SLOW");
        worker.join().unwrap();

        let unstarted = CaptchaTask::new();
        assert!(matches!(unstarted.wait_timeout(Duration::MAX), Err(Error::NotStarted)));
    }

    #[test]
    fn wait_blocks_until_worker_publishes() {
        let task = CaptchaTask::new();
        let completer = task.begin().unwrap();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            completer.complete(Ok("DONE".to_string()));
        });
        assert_eq!(task.wait().unwrap(), "DONE");
        worker.join().unwrap();
    }

    #[test]
    fn dropped_completer_reports_worker_lost() {
        let task = CaptchaTask::new();
        let completer = task.begin().unwrap();
        let _ = thread::spawn(move || {
            let _completer = completer;
            panic!("callback blew up");
        })
        .join();
        assert!(matches!(task.wait(), Err(Error::WorkerLost)));
        assert_eq!(task.status(), TaskStatus::Failed);
    }

    #[test]
    fn cancel_is_a_no_op() {
        let task = CaptchaTask::new();
        let completer = task.begin().unwrap();
        assert!(!task.cancel());
        assert_eq!(task.status(), TaskStatus::Running);
        completer.complete(Ok("X".to_string()));
        assert!(!task.cancel());
        assert_eq!(task.wait().unwrap(), "X");
    }
}

//! Frame-aligned deferred task queue
//!
//! Components never block; work that has to wait for the next rendering pass
//! is posted here and drained once per frame by whoever owns the queue. Each
//! task identity occupies a single slot: posting a task that is already
//! pending is a no-op, and cancelling removes it by identity.

use std::fmt::Debug;
use std::time::Duration;

use tracing::trace;

#[derive(Debug, Clone, Copy)]
struct Pending<T> {
    task: T,
    due: Duration,
}

/// Single-slot-per-identity queue of tasks waiting for a frame
#[derive(Debug, Clone)]
pub struct FrameQueue<T> {
    pending: Vec<Pending<T>>,
}

impl<T> Default for FrameQueue<T> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<T: Copy + Eq + Debug> FrameQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` on the next drain at or after `now`.
    ///
    /// Returns `false` if the task was already pending.
    pub fn post(&mut self, task: T, now: Duration) -> bool {
        self.post_delayed(task, now)
    }

    /// Run `task` on the first drain at or after `due`.
    ///
    /// Returns `false` if the task was already pending; the original due time
    /// is kept.
    pub fn post_delayed(&mut self, task: T, due: Duration) -> bool {
        if self.is_pending(task) {
            return false;
        }
        trace!("Posting frame task {:?} due at {:?}", task, due);
        self.pending.push(Pending { task, due });
        true
    }

    /// Remove a pending task. Returns whether it was pending.
    pub fn cancel(&mut self, task: T) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.task != task);
        before != self.pending.len()
    }

    /// Whether `task` is waiting to run
    pub fn is_pending(&self, task: T) -> bool {
        self.pending.iter().any(|p| p.task == task)
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest due time of the pending tasks
    pub fn next_due(&self) -> Option<Duration> {
        self.pending.iter().map(|p| p.due).min()
    }

    /// Remove and return every task due at `now`, in posting order
    pub fn drain_due(&mut self, now: Duration) -> Vec<T> {
        let mut due = Vec::new();
        self.pending.retain(|p| {
            if p.due <= now {
                due.push(p.task);
                false
            } else {
                true
            }
        });
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Task {
        Update,
        Show,
    }

    const NOW: Duration = Duration::from_millis(1000);

    #[test]
    fn test_post_is_idempotent() {
        let mut queue = FrameQueue::new();
        assert!(queue.post(Task::Update, NOW));
        assert!(!queue.post(Task::Update, NOW));
        assert_eq!(queue.drain_due(NOW), vec![Task::Update]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_cancel_by_identity() {
        let mut queue = FrameQueue::new();
        queue.post(Task::Update, NOW);
        queue.post(Task::Show, NOW);
        assert!(queue.cancel(Task::Update));
        assert!(!queue.cancel(Task::Update));
        assert_eq!(queue.drain_due(NOW), vec![Task::Show]);
    }

    #[test]
    fn test_delayed_tasks_wait_for_due_time() {
        let mut queue = FrameQueue::new();
        queue.post_delayed(Task::Show, NOW + Duration::from_millis(320));
        queue.post(Task::Update, NOW);
        assert_eq!(queue.next_due(), Some(NOW));

        assert_eq!(queue.drain_due(NOW), vec![Task::Update]);
        assert!(queue.drain_due(NOW + Duration::from_millis(100)).is_empty());
        assert_eq!(
            queue.drain_due(NOW + Duration::from_millis(320)),
            vec![Task::Show]
        );
    }

    #[test]
    fn test_drain_preserves_posting_order() {
        let mut queue = FrameQueue::new();
        queue.post(Task::Show, NOW);
        queue.post(Task::Update, NOW);
        assert_eq!(queue.drain_due(NOW), vec![Task::Show, Task::Update]);
    }
}

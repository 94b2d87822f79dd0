use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

/// Cooperative macrotask queue.
///
/// A turn runs only the tasks that were queued when it started; anything a
/// task schedules waits for the next turn. A task scheduled during turn `n`
/// therefore runs no later than turn `n + 1`.
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Run one turn. Returns the number of tasks executed.
    pub fn run_turn(&self) -> usize {
        let batch: Vec<Task> = self.tasks.borrow_mut().drain(..).collect();
        let ran = batch.len();
        for task in batch {
            task();
        }
        ran
    }

    /// Run turns until nothing is queued. Returns the number of turns.
    pub fn run_until_idle(&self) -> usize {
        let mut turns = 0;
        while self.run_turn() > 0 {
            turns += 1;
        }
        turns
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

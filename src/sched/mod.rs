//! Cooperative, non-preemptive task scheduler.
//!
//! Two dispatch policies share one task table: [`Kind::Fcfs`] scans for the
//! next `Running` task starting after the last one served; [`Kind::Cfs`]
//! keeps due tasks ordered in a red-black tree by `(next_exec_ts, priority)`
//! and always serves the minimum. Despite the name this is nothing like the
//! Linux CFS scheduler — it's earliest-deadline-first with a priority
//! tiebreak.

pub mod rbtree;
pub mod task;
pub mod worker;

use arrayvec::ArrayVec;

use crate::error::{Error, Result};
use rbtree::RbTree;
use task::{hz_to_ticks, Task, TaskCallback, TaskConfig, TaskId, TaskState, TaskStatus};
use worker::{Affinity, PlatformAffinity};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Kind {
    Fcfs,
    Cfs,
}

pub struct Config {
    pub kind: Kind,
    /// `-1` disables CPU pinning when run on a dedicated thread.
    pub cpu_id: i32,
}

/// `N` bounds the number of tasks the scheduler can ever hold; tasks are
/// never removed from the table once added, only marked [`TaskState::Dead`].
pub struct Scheduler<const N: usize> {
    cfg: Config,
    tasks: ArrayVec<Task, N>,
    fcfs_prev_idx: usize,
    cfs_tree: RbTree<(u64, u32), N>,
    curr_ts: u64,
    elapsed_us: f32,
}

impl<const N: usize> Scheduler<N> {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            tasks: ArrayVec::new(),
            fcfs_prev_idx: 0,
            cfs_tree: RbTree::new(),
            curr_ts: 0,
            elapsed_us: 0.0,
        }
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn task_status(&self, id: TaskId) -> Option<&TaskStatus> {
        self.tasks.get(id).map(|t| &t.status)
    }

    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.get(id).map(|t| t.state)
    }

    /// Appends a task to the table and returns its id (the table slot).
    /// `now_ts` seeds `create_ts`/`next_exec_ts`.
    pub fn add_task(&mut self, cfg: TaskConfig, now_ts: u64) -> Result<TaskId> {
        if self.tasks.is_full() {
            return Err(Error::InvalidArgument(format!(
                "scheduler task table is full (capacity {N})"
            )));
        }
        let id = self.tasks.len();
        let status = TaskStatus {
            exec_cnt: 0,
            elapsed_us: 0.0,
            create_ts: now_ts,
            next_exec_ts: now_ts + cfg.delay_ticks,
        };
        let task = Task {
            id,
            priority: cfg.priority,
            exec_freq_hz: cfg.exec_freq_hz,
            exec_cnt_max: cfg.exec_cnt_max,
            delay_ticks: cfg.delay_ticks,
            callback: cfg.callback,
            state: TaskState::Running,
            status,
        };
        self.tasks.push(task);

        if self.cfg.kind == Kind::Cfs {
            let t = &self.tasks[id];
            self.cfs_tree
                .insert(id, (t.status.next_exec_ts, t.priority));
        }

        Ok(id)
    }

    fn cfs_remove(&mut self, id: TaskId) {
        if self.cfs_tree.is_linked(id) {
            self.cfs_tree.remove(id);
        }
    }

    fn cfs_insert(&mut self, id: TaskId) {
        let t = &self.tasks[id];
        self.cfs_tree
            .insert(id, (t.status.next_exec_ts, t.priority));
    }

    fn get_task_id(&mut self) -> Option<TaskId> {
        match self.cfg.kind {
            Kind::Fcfs => {
                let n = self.tasks.len();
                if n == 0 {
                    return None;
                }
                for i in 0..n {
                    let idx = (self.fcfs_prev_idx + i) % n;
                    if self.tasks[idx].state == TaskState::Running {
                        self.fcfs_prev_idx = idx + 1;
                        return Some(idx);
                    }
                }
                None
            }
            Kind::Cfs => self.cfs_tree.first(),
        }
    }

    /// Runs one dispatch step: finds the next due task (if any) and executes
    /// it. Returns `Ok(None)` when nothing was due, `Ok(Some(id))` for the
    /// task that ran.
    ///
    /// `get_ts` is called once to gate/select the candidate and again right
    /// after the callback returns, so `elapsed_us` and the drift-tolerant
    /// `next_exec_ts` reschedule are computed from the true end-of-callback
    /// time rather than reusing the pre-callback sample.
    pub fn tick(&mut self, get_ts: &dyn Fn() -> u64) -> Result<Option<TaskId>> {
        let now_ts = get_ts();
        self.curr_ts = now_ts;

        let Some(id) = self.get_task_id() else {
            return Ok(None);
        };

        let (create_ts, next_exec_ts, delay_ticks) = {
            let t = &self.tasks[id];
            (t.status.create_ts, t.status.next_exec_ts, t.delay_ticks)
        };

        if now_ts.saturating_sub(create_ts) < delay_ticks {
            return Ok(None);
        }
        if now_ts < next_exec_ts {
            return Ok(None);
        }

        if self.cfg.kind == Kind::Cfs {
            self.cfs_remove(id);
        }

        self.tasks[id].state = TaskState::Running;

        let begin_ts = now_ts;
        (self.tasks[id].callback)();
        let end_ts = get_ts();
        self.curr_ts = end_ts;

        let still_due = {
            let t = &mut self.tasks[id];
            t.status.exec_cnt += 1;
            t.status.elapsed_us = (end_ts.saturating_sub(begin_ts)) as f32;
            self.elapsed_us = t.status.elapsed_us;

            let still_due = t.exec_cnt_max == 0 || t.status.exec_cnt < t.exec_cnt_max;
            if still_due {
                t.status.next_exec_ts = end_ts + hz_to_ticks(t.exec_freq_hz);
            } else {
                t.state = TaskState::Dead;
            }
            still_due
        };

        if still_due && self.cfg.kind == Kind::Cfs {
            self.cfs_insert(id);
        }

        Ok(Some(id))
    }

    pub fn stop_task(&mut self, id: TaskId) {
        if let Some(t) = self.tasks.get_mut(id) {
            if self.cfg.kind == Kind::Cfs && t.state == TaskState::Running {
                self.cfs_tree.remove(id);
            }
            t.state = TaskState::Stopped;
        }
    }

    pub fn wake_task(&mut self, id: TaskId) {
        let key = {
            let Some(t) = self.tasks.get_mut(id) else {
                return;
            };
            if t.state == TaskState::Dead {
                return;
            }
            t.state = TaskState::Running;
            (t.status.next_exec_ts, t.priority)
        };
        if self.cfg.kind == Kind::Cfs && !self.cfs_tree.is_linked(id) {
            self.cfs_tree.insert(id, key);
        }
    }
}

/// Runs `sched` on a dedicated, affinity-bound thread, calling `get_ts` and
/// `tick` in a tight loop. Never returns.
pub fn run_forever<const N: usize>(
    mut sched: Scheduler<N>,
    get_ts: impl Fn() -> u64,
) -> ! {
    PlatformAffinity::bind_current_thread(sched.cfg.cpu_id);
    loop {
        if let Err(e) = sched.tick(&get_ts) {
            log::error!("scheduler tick failed: {e}");
        }
    }
}

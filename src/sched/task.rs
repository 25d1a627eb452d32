//! Task configuration and runtime status.

pub type TaskId = usize;

/// The work a task performs each time it's due. Boxed so tasks with
/// different captured state can live in the same fixed-size table.
pub type TaskCallback = Box<dyn FnMut() + Send>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TaskState {
    Running,
    Sleeping,
    Stopped,
    Dead,
}

/// Parameters fixed at task creation.
pub struct TaskConfig {
    /// Lower values run first on a priority tie.
    pub priority: u32,
    /// Re-exec rate; converted to a tick period via [`hz_to_ticks`].
    pub exec_freq_hz: f32,
    /// 0 means unlimited.
    pub exec_cnt_max: usize,
    /// Ticks to wait after creation before the first execution is eligible.
    pub delay_ticks: u64,
    pub callback: TaskCallback,
}

#[derive(Clone, Copy, Default, Debug)]
pub struct TaskStatus {
    pub exec_cnt: usize,
    pub elapsed_us: f32,
    pub create_ts: u64,
    pub next_exec_ts: u64,
}

pub struct Task {
    pub id: TaskId,
    pub priority: u32,
    pub exec_freq_hz: f32,
    pub exec_cnt_max: usize,
    pub delay_ticks: u64,
    pub callback: TaskCallback,
    pub state: TaskState,
    pub status: TaskStatus,
}

/// Converts a rate in Hz to a period in ticks, assuming ticks are
/// microseconds (the scheduler is driven from [`crate::timebase::mono_us`]
/// by convention, not by construction — callers using a different tick
/// unit must convert their own frequencies accordingly).
pub fn hz_to_ticks(hz: f32) -> u64 {
    if hz <= 0.0 {
        return 0;
    }
    (1_000_000.0 / hz) as u64
}

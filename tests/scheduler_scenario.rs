//! Scenario 3: CFS dispatch order — earliest deadline, priority tie-break.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use motorun::sched::task::{TaskCallback, TaskConfig};
use motorun::sched::{Config, Kind, Scheduler};

fn recording_task(log: Arc<std::sync::Mutex<Vec<&'static str>>>, name: &'static str) -> TaskCallback {
    Box::new(move || {
        log.lock().unwrap().push(name);
    })
}

#[test]
fn earliest_deadline_then_priority_tiebreak() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut sched: Scheduler<4> = Scheduler::new(Config {
        kind: Kind::Cfs,
        cpu_id: -1,
    });
    let log = Arc::new(std::sync::Mutex::new(Vec::new()));

    // A(prio=5, 1000Hz=1000us period), B(prio=1, 500Hz=2000us),
    // C(prio=3, 800Hz), all due at t=0.
    let a = sched
        .add_task(
            TaskConfig {
                priority: 5,
                exec_freq_hz: 1000.0,
                exec_cnt_max: 0,
                delay_ticks: 0,
                callback: recording_task(log.clone(), "A"),
            },
            0,
        )
        .unwrap();
    let b = sched
        .add_task(
            TaskConfig {
                priority: 1,
                exec_freq_hz: 500.0,
                exec_cnt_max: 0,
                delay_ticks: 0,
                callback: recording_task(log.clone(), "B"),
            },
            0,
        )
        .unwrap();
    let c = sched
        .add_task(
            TaskConfig {
                priority: 3,
                exec_freq_hz: 800.0,
                exec_cnt_max: 0,
                delay_ticks: 0,
                callback: recording_task(log.clone(), "C"),
            },
            0,
        )
        .unwrap();

    // B wins the first tie (lowest priority value at equal deadline 0).
    assert_eq!(sched.tick(&|| 0).unwrap(), Some(b));
    // B's next_exec_ts becomes 2000 (500Hz => 2000us period); A and C are
    // still due at 0, and C (priority 3) beats A (priority 5).
    assert_eq!(sched.tick(&|| 0).unwrap(), Some(c));
    assert_eq!(sched.tick(&|| 0).unwrap(), Some(a));
    // Nothing else is due until B's next_exec_ts at 2000.
    assert_eq!(sched.tick(&|| 0).unwrap(), None);
    assert_eq!(sched.tick(&|| 2000).unwrap(), Some(b));

    assert_eq!(*log.lock().unwrap(), vec!["B", "C", "A", "B"]);
}

#[test]
fn exec_cnt_max_retires_to_dead_after_exactly_k_runs() {
    let mut sched: Scheduler<2> = Scheduler::new(Config {
        kind: Kind::Cfs,
        cpu_id: -1,
    });
    let counter = Arc::new(AtomicUsize::new(0));
    let id = sched
        .add_task(
            TaskConfig {
                priority: 0,
                exec_freq_hz: 1_000_000.0,
                exec_cnt_max: 3,
                delay_ticks: 0,
                callback: Box::new({
                    let counter = counter.clone();
                    move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            },
            0,
        )
        .unwrap();

    let mut ts = 0u64;
    for _ in 0..3 {
        sched.tick(&|| ts).unwrap();
        ts += 10;
    }
    assert_eq!(counter.load(Ordering::SeqCst), 3);
    assert_eq!(
        sched.task_state(id),
        Some(motorun::sched::task::TaskState::Dead)
    );
    assert_eq!(sched.tick(&|| 1_000_000).unwrap(), None);
}

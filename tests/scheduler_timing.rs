//! Host-level scheduler timing properties.

use std::sync::Mutex;

use ssd_clock::scheduler::{Scheduler, SchedulerTick};

static TICK: SchedulerTick = SchedulerTick::new();
static FIRES_A: Mutex<Vec<u32>> = Mutex::new(Vec::new());
static FIRES_B: Mutex<Vec<u32>> = Mutex::new(Vec::new());

fn task_a() {
    FIRES_A.lock().unwrap().push(TICK.now());
}

fn task_b() {
    FIRES_B.lock().unwrap().push(TICK.now());
}

/// With a dispatch pass after every tick, each task fires exactly at
/// `phase, phase + period, phase + 2 * period, ...`.
#[test]
fn tasks_fire_exactly_on_their_grid() {
    FIRES_A.lock().unwrap().clear();
    FIRES_B.lock().unwrap().clear();

    let mut scheduler: Scheduler<8> = Scheduler::new();
    scheduler.add_task(task_a, "PTRN", 0, 100).unwrap();
    scheduler.add_task(task_b, "CLK", 75, 1_000).unwrap();

    let start = TICK.now();
    for _ in 0..5_000 {
        TICK.isr_tick();
        scheduler.dispatch_due(&TICK);
    }

    let fires_a = FIRES_A.lock().unwrap();
    // First dispatch runs one tick after `start`; slot 0 is caught there.
    assert_eq!(fires_a[0], start + 1);
    for (n, &at) in fires_a.iter().enumerate().skip(1) {
        assert_eq!(at, start + n as u32 * 100, "fire {n} off-grid");
    }
    // Slots 0, 100, ..., 5000.
    assert_eq!(fires_a.len(), 51);

    let fires_b = FIRES_B.lock().unwrap();
    assert_eq!(fires_b[0], start + 75);
    assert_eq!(fires_b[1], start + 1_075);
    assert_eq!(fires_b.len(), 5);
}

//! Cooperative task scheduler driven by the millisecond timebase.
//!
//! Tasks are registered once at start-up with a phase offset and a period,
//! then dispatched from the foreground loop in registration order. The
//! interrupt side only advances time and raises a flag, so it is O(1) and
//! cannot delay the IR edge interrupt. A task's next due time is advanced
//! by its period rather than recomputed from the current time, so jitter
//! from slow tasks does not accumulate into drift.
//!
//! The scheduler does not detect a task that never returns; recovering
//! from a hung task is the watchdog's job.

use heapless::Vec;
use portable_atomic::{AtomicBool, Ordering};

use crate::timebase::Timebase;
use crate::{Error, Result};

/// Interrupt-side half of the scheduler: the timebase plus a "dispatch
/// pending" flag. Lives in a `static`; ISR methods take `&self`.
pub struct SchedulerTick {
    timebase: Timebase,
    pending: AtomicBool,
}

impl SchedulerTick {
    /// Create the tick source at time zero. A dispatch is already
    /// pending, so tasks with a zero phase offset run on the first
    /// foreground pass rather than one tick late.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timebase: Timebase::new(),
            pending: AtomicBool::new(true),
        }
    }

    /// Advance scheduler time by one tick and request a dispatch pass.
    /// Call from the periodic timer interrupt only.
    pub fn isr_tick(&self) {
        self.timebase.isr_tick();
        self.pending.store(true, Ordering::Release);
    }

    /// Current scheduler time in ticks.
    #[must_use]
    pub fn now(&self) -> u32 {
        self.timebase.now()
    }

    fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::Acquire)
    }
}

impl Default for SchedulerTick {
    fn default() -> Self {
        Self::new()
    }
}

struct TaskSlot {
    entry: fn(),
    name: &'static str,
    phase: u32,
    period: u32,
    next_due: u32,
}

/// Read-only view of a registered task, for the `s1` console listing.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskInfo {
    /// Display name given at registration.
    pub name: &'static str,
    /// First tick at which the task becomes due.
    pub phase: u32,
    /// Ticks between activations.
    pub period: u32,
    /// Next tick at which the task will run.
    pub next_due: u32,
}

/// Foreground half of the scheduler: the fixed task table.
///
/// Owned exclusively by the main loop; interrupt code never touches it.
/// Tasks must not call back into the scheduler.
pub struct Scheduler<const MAX_TASKS: usize = 8> {
    tasks: Vec<TaskSlot, MAX_TASKS>,
}

impl<const MAX_TASKS: usize> Scheduler<MAX_TASKS> {
    /// Create an empty task table.
    #[must_use]
    pub const fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Register a periodic task.
    ///
    /// The task first becomes due at tick `phase` and every `period` ticks
    /// after that. Registration order is dispatch order.
    ///
    /// # Errors
    /// [`Error::TaskTableFull`] once `MAX_TASKS` tasks are registered;
    /// [`Error::InvalidTaskPeriod`] when `period` is zero or `phase` is
    /// not smaller than `period`.
    pub fn add_task(
        &mut self,
        entry: fn(),
        name: &'static str,
        phase: u32,
        period: u32,
    ) -> Result<()> {
        if period == 0 || phase >= period {
            return Err(Error::InvalidTaskPeriod);
        }
        self.tasks
            .push(TaskSlot {
                entry,
                name,
                phase,
                period,
                next_due: phase,
            })
            .map_err(|_| Error::TaskTableFull)
    }

    /// Run every task whose due time has arrived. Call from the foreground
    /// loop. Returns the number of tasks dispatched.
    ///
    /// A task that is due fires once per pass; if dispatching was delayed
    /// past several periods the task catches up on subsequent passes, and
    /// its schedule stays anchored to `phase + n * period`.
    pub fn dispatch_due(&mut self, tick: &SchedulerTick) -> usize {
        if !tick.take_pending() {
            return 0;
        }
        let now = tick.now();
        let mut dispatched = 0;
        for task in &mut self.tasks {
            // Due when now - next_due, taken modulo wraparound, is
            // non-negative.
            let elapsed = Timebase::ticks_since(now, task.next_due);
            if (elapsed as i32) >= 0 {
                task.next_due = task.next_due.wrapping_add(task.period);
                (task.entry)();
                dispatched += 1;
            }
        }
        dispatched
    }

    /// Iterate the registered tasks in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = TaskInfo> + '_ {
        self.tasks.iter().map(|task| TaskInfo {
            name: task.name,
            phase: task.phase,
            period: task.period,
            next_due: task.next_due,
        })
    }
}

impl<const MAX_TASKS: usize> Default for Scheduler<MAX_TASKS> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use portable_atomic::{AtomicU32, Ordering};

    use super::{Scheduler, SchedulerTick};
    use crate::Error;

    fn nop() {}

    #[test]
    fn rejects_zero_period_and_large_phase() {
        let mut scheduler: Scheduler<4> = Scheduler::new();
        assert_eq!(
            scheduler.add_task(nop, "BAD", 0, 0),
            Err(Error::InvalidTaskPeriod)
        );
        assert_eq!(
            scheduler.add_task(nop, "BAD", 100, 100),
            Err(Error::InvalidTaskPeriod)
        );
    }

    #[test]
    fn rejects_registration_past_capacity() {
        let mut scheduler: Scheduler<2> = Scheduler::new();
        assert!(scheduler.add_task(nop, "A", 0, 10).is_ok());
        assert!(scheduler.add_task(nop, "B", 1, 10).is_ok());
        assert_eq!(
            scheduler.add_task(nop, "C", 2, 10),
            Err(Error::TaskTableFull)
        );
    }

    #[test]
    fn fires_at_phase_then_every_period() {
        static FAST: AtomicU32 = AtomicU32::new(0);
        static SLOW: AtomicU32 = AtomicU32::new(0);
        fn fast() {
            FAST.fetch_add(1, Ordering::Relaxed);
        }
        fn slow() {
            SLOW.fetch_add(1, Ordering::Relaxed);
        }

        let tick = SchedulerTick::new();
        let mut scheduler: Scheduler<4> = Scheduler::new();
        scheduler.add_task(fast, "FAST", 0, 100).unwrap();
        scheduler.add_task(slow, "SLOW", 50, 1_000).unwrap();

        for _ in 0..999 {
            tick.isr_tick();
            scheduler.dispatch_due(&tick);
        }
        // now = 999: fast fired for slots 0, 100, ..., 900; slow at 50.
        assert_eq!(FAST.load(Ordering::Relaxed), 10);
        assert_eq!(SLOW.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn late_dispatch_does_not_drift_the_schedule() {
        static RUNS: AtomicU32 = AtomicU32::new(0);
        fn task() {
            RUNS.fetch_add(1, Ordering::Relaxed);
        }

        let tick = SchedulerTick::new();
        let mut scheduler: Scheduler<4> = Scheduler::new();
        scheduler.add_task(task, "TASK", 0, 100).unwrap();

        // Foreground loop only gets around to dispatching every 30 ticks:
        // the task still fires once per 100-tick slot.
        for t in 1..=1_000u32 {
            tick.isr_tick();
            if t % 30 == 0 {
                scheduler.dispatch_due(&tick);
            }
        }
        scheduler.dispatch_due(&tick);
        // Slots 0, 100, ..., 1000 all fired exactly once.
        assert_eq!(RUNS.load(Ordering::Relaxed), 11);
        // The schedule stays anchored at multiples of the period.
        let info = scheduler.tasks().next().unwrap();
        assert_eq!(info.next_due % 100, 0);
    }

    #[test]
    fn dispatch_runs_in_registration_order() {
        static SEQUENCE: AtomicU32 = AtomicU32::new(0);
        static FIRST_WAS_A: AtomicU32 = AtomicU32::new(0);
        fn task_a() {
            if SEQUENCE.fetch_add(1, Ordering::Relaxed) == 0 {
                FIRST_WAS_A.store(1, Ordering::Relaxed);
            }
        }
        fn task_b() {
            SEQUENCE.fetch_add(1, Ordering::Relaxed);
        }

        let tick = SchedulerTick::new();
        let mut scheduler: Scheduler<4> = Scheduler::new();
        // Both due on the first tick; A registered first must run first.
        scheduler.add_task(task_a, "A", 0, 100).unwrap();
        scheduler.add_task(task_b, "B", 0, 100).unwrap();
        tick.isr_tick();
        assert_eq!(scheduler.dispatch_due(&tick), 2);
        assert_eq!(FIRST_WAS_A.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn no_dispatch_without_a_tick() {
        let tick = SchedulerTick::new();
        let mut scheduler: Scheduler<4> = Scheduler::new();
        scheduler.add_task(nop, "NOP", 0, 100).unwrap();
        tick.isr_tick();
        assert_eq!(scheduler.dispatch_due(&tick), 1);
        // No tick since the last pass: nothing to do.
        assert_eq!(scheduler.dispatch_due(&tick), 0);
    }

    #[test]
    fn task_listing_reports_registration_data() {
        let mut scheduler: Scheduler<4> = Scheduler::new();
        scheduler.add_task(nop, "PTRN", 0, 100).unwrap();
        scheduler.add_task(nop, "CLK", 75, 1_000).unwrap();
        let mut tasks = scheduler.tasks();
        let first = tasks.next().unwrap();
        assert_eq!(first.name, "PTRN");
        assert_eq!(first.period, 100);
        let second = tasks.next().unwrap();
        assert_eq!(second.name, "CLK");
        assert_eq!(second.phase, 75);
        assert!(tasks.next().is_none());
    }
}

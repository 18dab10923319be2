//! Host-clock time driver for `embassy-time`.
//!
//! Timers used by the background collector are plain futures polled by
//! `futures::executor::block_on` on ordinary OS threads, so wakers here are not
//! executor-specific. A single scheduler thread sleeps until the earliest
//! registered deadline and wakes everything that is due.

use core::task::Waker;
use embassy_time_driver::{Driver, TICK_HZ, time_driver_impl};
use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant as StdInstant};

#[derive(Default)]
struct SchedulerState {
    // Deadline in ticks -> wakers registered for it
    queue: BTreeMap<u64, Vec<Waker>>,
}

static ORIGIN: OnceLock<StdInstant> = OnceLock::new();
static SCHED: OnceLock<Mutex<SchedulerState>> = OnceLock::new();
static CV: OnceLock<Condvar> = OnceLock::new();
static SCHEDULER_STARTED: OnceLock<()> = OnceLock::new();

fn origin() -> StdInstant {
    *ORIGIN.get_or_init(StdInstant::now)
}

fn sched() -> MutexGuard<'static, SchedulerState> {
    SCHED
        .get_or_init(|| Mutex::new(SchedulerState::default()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn cv() -> &'static Condvar {
    CV.get_or_init(Condvar::new)
}

fn tick_hz() -> u64 {
    TICK_HZ
}

fn real_to_ticks(r: StdInstant) -> u64 {
    let dt = r.saturating_duration_since(origin());
    let ticks = dt.as_nanos() * tick_hz() as u128 / 1_000_000_000u128;
    ticks.min(u64::MAX as u128) as u64
}

fn ticks_to_real(ticks: u64) -> StdInstant {
    let ns = (ticks as u128) * 1_000_000_000u128 / (tick_hz() as u128);
    origin() + Duration::from_nanos(ns.min(u64::MAX as u128) as u64)
}

fn ensure_scheduler_thread() {
    SCHEDULER_STARTED.get_or_init(|| {
        let spawned = std::thread::Builder::new()
            .name("embassy-time-scheduler".into())
            .spawn(scheduler_thread);
        if let Err(e) = spawned {
            log::error!("Failed to start embassy-time scheduler thread: {}", e);
        }
    });
}

fn scheduler_thread() {
    loop {
        let mut guard = sched();
        let next_at = match guard.queue.keys().next().copied() {
            Some(at) => at,
            None => {
                drop(cv().wait(guard).unwrap_or_else(PoisonError::into_inner));
                continue;
            }
        };

        let target = ticks_to_real(next_at);
        let now = StdInstant::now();
        if target > now {
            // New, earlier deadlines notify the condvar and cut this wait short.
            let (woken, _) = cv()
                .wait_timeout(guard, target - now)
                .unwrap_or_else(PoisonError::into_inner);
            drop(woken);
            continue;
        }

        let now_ticks = real_to_ticks(now);
        let still_pending = guard.queue.split_off(&(now_ticks.saturating_add(1)));
        let due = std::mem::replace(&mut guard.queue, still_pending);
        drop(guard);

        for waker in due.into_values().flatten() {
            waker.wake();
        }
    }
}

struct HostClockDriver;

impl Driver for HostClockDriver {
    fn now(&self) -> u64 {
        real_to_ticks(StdInstant::now())
    }

    fn schedule_wake(&self, at: u64, waker: &Waker) {
        ensure_scheduler_thread();
        let mut guard = sched();
        let wakers = guard.queue.entry(at).or_default();
        if !wakers.iter().any(|w| w.will_wake(waker)) {
            wakers.push(waker.clone());
        }
        drop(guard);
        cv().notify_all();
    }
}

time_driver_impl!(static DRIVER: HostClockDriver = HostClockDriver);

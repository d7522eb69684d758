//! Integration Tests for the Channel Runtime
//!
//! These tests exercise cells, combinators, fan-out, timers and the state
//! machine together through the public API only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use cascade_core::channel::{
    BooleanCell, EventCell, EventInput, EventOutput, FloatCell, FloatOutput,
};
use cascade_core::state_machine::StateMachine;
use cascade_core::time::{Clock, ExpirationTimer, Scheduler, Ticker, VirtualClock};
use cascade_core::Error;

fn counter(events: &EventInput) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();
    events.subscribe(EventOutput::from_fn(move || {
        count_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));
    count
}

/// Cells dedupe unchanged writes; events never dedupe.
#[test]
fn cells_dedupe_events_do_not() {
    let cell = FloatCell::new(0.0);
    let cell_count = counter(&cell.as_input().updates());
    cell.set(1.5).unwrap();
    cell.set(1.5).unwrap();
    assert_eq!(cell_count.load(Ordering::SeqCst), 1);

    let event = EventCell::new();
    let event_count = counter(&event.as_input());
    event.event().unwrap();
    event.event().unwrap();
    assert_eq!(event_count.load(Ordering::SeqCst), 2);
}

/// Double negation hands back the very same input.
#[test]
fn not_not_is_identity() {
    let cell = BooleanCell::new(false);
    let x = cell.as_input();
    assert!(x.not().not().ptr_eq(&x));
    assert!((!&(!&x)).ptr_eq(&x));
}

/// A failing member of a fan-out does not stop its siblings.
#[test]
fn combine_isolates_failures() {
    let a = FloatCell::new(0.0);
    let c = FloatCell::new(0.0);
    let b = FloatOutput::from_fn(|_| Err(Error::listener("b failed")));

    let combined = FloatOutput::combine([a.as_output(), b, c.as_output()]);
    let err = combined.set(1.0).unwrap_err();
    assert_eq!(a.get(), 1.0);
    assert_eq!(c.get(), 1.0);
    assert_eq!(err.to_string(), "listener failed: b failed");
    assert!(err.suppressed().is_empty());

    // Several failures: the first is primary, the rest are suppressed.
    let combined = FloatOutput::combine([
        a.as_output(),
        FloatOutput::from_fn(|_| Err(Error::listener("first"))),
        FloatOutput::from_fn(|_| Err(Error::listener("second"))),
        FloatOutput::from_fn(|_| Err(Error::listener("third"))),
    ]);
    let err = combined.set(2.0).unwrap_err();
    assert_eq!(a.get(), 2.0);
    assert_eq!(err.primary().to_string(), "listener failed: first");
    let suppressed: Vec<String> = err.suppressed().iter().map(|e| e.to_string()).collect();
    assert_eq!(
        suppressed,
        vec!["listener failed: second", "listener failed: third"]
    );

    // The safe variant returns normally.
    combined.safe_set(3.0);
    assert_eq!(a.get(), 3.0);
}

/// Debounce with window W: a trigger half a window later is dropped, one
/// past the window end fires.
#[test]
fn debounce_window() {
    let window = Duration::from_millis(100);

    let clock = VirtualClock::new();
    let trigger = EventCell::new();
    let debounced = trigger
        .as_input()
        .debounced(&clock.shared(), window)
        .unwrap();
    let count = counter(&debounced);

    trigger.event().unwrap();
    clock.advance(window / 2);
    trigger.event().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);

    clock.advance(window / 2 + Duration::from_millis(1));
    trigger.event().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);

    assert!(trigger
        .as_input()
        .debounced(&clock.shared(), Duration::ZERO)
        .unwrap_err()
        .is_configuration());
}

/// Ramping moves by at most one step per tick and lands exactly on the
/// target after ceil(|t - c| / S) ticks.
#[test]
fn ramping_reaches_target_in_ceil_ticks() {
    let target = FloatCell::new(2.0);
    let tick = EventCell::new();
    let ramped = target
        .as_input()
        .with_ramping(0.5, &tick.as_input())
        .unwrap();

    target.set(-1.0).unwrap();
    let mut ticks = 0;
    while ramped.get() != -1.0 {
        let before = ramped.get();
        tick.event().unwrap();
        ticks += 1;
        assert!((before - ramped.get()).abs() <= 0.5);
        assert!(ramped.get() >= -1.0);
    }
    assert_eq!(ticks, 6);
}

/// Every hop of the state machine fires one exit, then one enter.
#[test]
fn state_machine_hops() {
    let machine = StateMachine::new("A", ["A", "B", "C"]).unwrap();
    let hops = Arc::new(Mutex::new(Vec::new()));
    for name in ["A", "B", "C"] {
        let exits = hops.clone();
        machine
            .when_exiting(
                name,
                &EventOutput::from_fn(move || {
                    exits.lock().push(format!("exit({name})"));
                    Ok(())
                }),
            )
            .unwrap();
        let enters = hops.clone();
        machine
            .when_entering(
                name,
                &EventOutput::from_fn(move || {
                    enters.lock().push(format!("enter({name})"));
                    Ok(())
                }),
            )
            .unwrap();
    }

    machine.set_state("A").unwrap();
    assert!(hops.lock().is_empty());

    machine.set_state("B").unwrap();
    assert_eq!(*hops.lock(), vec!["exit(A)", "enter(B)"]);

    machine.set_state("C").unwrap();
    machine.set_state("A").unwrap();
    assert_eq!(
        *hops.lock(),
        vec!["exit(A)", "enter(B)", "exit(B)", "enter(C)", "exit(C)", "enter(A)"]
    );

    assert!(StateMachine::new("A", ["A", "A"]).is_err());
    assert!(StateMachine::new("X", ["A", "B"]).is_err());
    assert!(StateMachine::new("A", ["A", ""]).is_err());
}

/// Feeding an expiration timer restarts every window from the feed time.
#[test]
fn expiration_timer_feed_restarts_windows() {
    let clock = VirtualClock::new();
    let scheduler = Scheduler::new(clock.shared());
    let timer = ExpirationTimer::new(&scheduler, "watchdog");

    let fired_at = Arc::new(Mutex::new(Vec::new()));
    for delay in [50u64, 100] {
        let fired_at = fired_at.clone();
        let clock = clock.clone();
        timer
            .schedule(
                Duration::from_millis(delay),
                &EventOutput::from_fn(move || {
                    fired_at.lock().push((delay, clock.now_nanos() / 1_000_000));
                    Ok(())
                }),
            )
            .unwrap();
    }

    timer.start().unwrap();
    for ms in 1..=200 {
        clock.advance(Duration::from_millis(1));
        if ms == 30 {
            timer.feed().unwrap();
        }
        scheduler.run_pending();
    }

    assert_eq!(*fired_at.lock(), vec![(50, 80), (100, 130)]);
}

/// A consumer that takes 35ms on its first tick of a 10ms ticker.
fn slow_first_tick(clock: &VirtualClock, ticker: &Ticker) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();
    let clock = clock.clone();
    ticker
        .on_tick(EventOutput::from_fn(move || {
            if count_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                clock.advance(Duration::from_millis(35));
            }
            Ok(())
        }))
        .unwrap();
    count
}

/// Fixed-rate ticks catch up after an overrun; periodic ticks do not.
#[test]
fn fixed_rate_catches_up_periodic_does_not() {
    let period = Duration::from_millis(10);

    let clock = VirtualClock::new();
    let scheduler = Scheduler::new(clock.shared());
    let fixed = Ticker::new(&scheduler, period, true).unwrap();
    let fixed_ticks = slow_first_tick(&clock, &fixed);

    clock.advance(period);
    scheduler.run_pending();
    assert_eq!(clock.now_nanos(), 45_000_000);
    // Back-to-back passes with no time passing: slots 20, 30 and 40 replay.
    for _ in 0..5 {
        scheduler.run_pending();
    }
    assert_eq!(fixed_ticks.load(Ordering::SeqCst), 4);

    let clock = VirtualClock::new();
    let scheduler = Scheduler::new(clock.shared());
    let periodic = Ticker::new(&scheduler, period, false).unwrap();
    let periodic_ticks = slow_first_tick(&clock, &periodic);

    clock.advance(period);
    scheduler.run_pending();
    for _ in 0..5 {
        scheduler.run_pending();
    }
    assert_eq!(periodic_ticks.load(Ordering::SeqCst), 1);

    // The next periodic tick is a full period after the slow one finished.
    clock.advance(Duration::from_millis(9));
    scheduler.run_pending();
    assert_eq!(periodic_ticks.load(Ordering::SeqCst), 1);
    clock.advance(Duration::from_millis(1));
    scheduler.run_pending();
    assert_eq!(periodic_ticks.load(Ordering::SeqCst), 2);
}

/// A sensor chain end to end: deadzone, gate, ramp, actuator.
#[test]
fn drive_chain() {
    let clock = VirtualClock::new();
    let scheduler = Scheduler::new(clock.shared());
    let ticker = Ticker::new(&scheduler, Duration::from_millis(20), true).unwrap();

    let stick = FloatCell::new(0.0);
    let enabled = BooleanCell::new(false);
    let motor = FloatCell::new(0.0);

    let ramped_motor = motor
        .as_output()
        .add_ramping(0.25, &ticker.events().unwrap())
        .unwrap();
    let command = stick.as_input().deadzone(0.1).unwrap();
    command
        .send(&ramped_motor.filter(&enabled.as_input()))
        .unwrap();

    stick.set(1.0).unwrap();
    clock.advance(Duration::from_millis(100));
    for _ in 0..10 {
        scheduler.run_pending();
    }
    assert_eq!(motor.get(), 0.0);

    enabled.set(true).unwrap();
    for _ in 0..4 {
        clock.advance(Duration::from_millis(20));
        scheduler.run_pending();
    }
    assert_eq!(motor.get(), 1.0);
}

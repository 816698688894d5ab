use pullstream::prelude::*;
use pullstream::stream_configuration::TimingConfig;
use pullstream::timing::{self, ManualScheduler, Scheduler, TokioScheduler};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;

#[test]
fn test_manual_frame_cadence_is_configurable() {
    let config = TimingConfig::new().frame(Duration::from_millis(10));
    let scheduler = Rc::new(ManualScheduler::with_config(config));
    let _guard = timing::set_default(scheduler.clone());

    let frames = Rc::new(Cell::new(0));
    let counter = frames.clone();
    timing::request_frame(move || counter.set(counter.get() + 1));
    scheduler.advance(Duration::from_millis(9));
    assert_eq!(frames.get(), 0);
    scheduler.advance(Duration::from_millis(1));
    assert_eq!(frames.get(), 1);
}

#[test]
fn test_timer_reports_firing_time() {
    let scheduler = Rc::new(ManualScheduler::new());
    let timer = Timer::with_scheduler(Duration::from_millis(250), scheduler.clone());
    let fired = Rc::new(Cell::new(None));
    let slot = fired.clone();
    scheduler.advance(Duration::from_millis(100));
    timer.request(move |at| slot.set(Some(at)));
    scheduler.advance(Duration::from_secs(1));
    assert_eq!(fired.get(), Some(Duration::from_millis(350)));
    assert_eq!(timer.now(), Duration::from_millis(1100));
}

#[test]
fn test_interval_stream_on_manual_clock() {
    let scheduler = Rc::new(ManualScheduler::new());
    let _guard = timing::set_default(scheduler.clone());
    let clock = Stream::interval(Timer::new(Duration::from_secs(1)));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    clock.map(|at| at.as_secs()).each(move |secs| sink.borrow_mut().push(secs));

    scheduler.advance(Duration::from_secs(3));
    assert_eq!(*seen.borrow(), vec![1, 2, 3]);
}

#[test]
fn test_ticks_drain_across_batches() {
    let config = TimingConfig::new().tick_batch(1);
    let scheduler = Rc::new(ManualScheduler::with_config(config));
    let _guard = timing::set_default(scheduler.clone());
    let ran = Rc::new(Cell::new(0));
    for _ in 0..3 {
        let counter = ran.clone();
        timing::request_tick(move || counter.set(counter.get() + 1));
    }
    assert_eq!(scheduler.pending_ticks(), 3);
    scheduler.run_until_idle();
    assert_eq!(ran.get(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_tokio_scheduler_drives_throttle() {
    LocalSet::new()
        .run_until(async {
            let scheduler: Rc<dyn Scheduler> = Rc::new(TokioScheduler::new());
            let _guard = timing::set_default(scheduler.clone());
            let throttle = Throttle::every(Duration::from_millis(100));
            for n in 1..=5 {
                throttle.push(n).unwrap();
            }
            let first = throttle.stream().first();
            assert_eq!(first.await, Some(5));
            assert!(scheduler.now() >= Duration::from_millis(100));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_tokio_interval_until_stopped() {
    LocalSet::new()
        .run_until(async {
            let ticks = Stream::interval(Timer::new(Duration::from_millis(20)));
            let firsts = ticks.clone().take(3);
            let values = firsts.to_vec().await;
            assert_eq!(values.len(), 3);
            assert!(values.windows(2).all(|pair| pair[0] < pair[1]));
            ticks.stop().unwrap();
            assert!(ticks.is_done());
        })
        .await;
}

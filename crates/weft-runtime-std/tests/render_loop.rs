//! Smoke test of the frame loop against the real std-backed services.
//!
//! Wall-clock timing, so assertions poll with generous deadlines rather than
//! counting exact ticks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use weft_frame::{InvalidationAggregator, RenderScheduler};
use weft_runtime_std::{StdTimerDriver, ThreadDispatcher};

fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn one_shot_request_renders_once_and_goes_idle() {
    let timer = Arc::new(StdTimerDriver::new());
    let aggregator = InvalidationAggregator::new(timer.clone());
    let dispatcher = Arc::new(ThreadDispatcher::new());
    let scheduler = RenderScheduler::new(
        aggregator.clone(),
        timer.clone(),
        Some(dispatcher.clone()),
    );

    let renders = Arc::new(AtomicUsize::new(0));
    let _guard = {
        let renders = Arc::clone(&renders);
        let aggregator = aggregator.clone();
        let expected = dispatcher.thread_id();
        scheduler.render_requested().connect(move || {
            assert_eq!(thread::current().id(), expected, "render marshaled");
            renders.fetch_add(1, Ordering::SeqCst);
            aggregator.frame_rendered();
        })
    };

    assert!(!scheduler.is_running());
    aggregator.request_render();

    assert!(
        wait_until(Duration::from_secs(2), || renders.load(Ordering::SeqCst) >= 1),
        "frame rendered within deadline"
    );
    assert!(
        wait_until(Duration::from_secs(2), || !scheduler.is_running()),
        "scheduler disarmed after the frame"
    );

    // Idle stays idle: no stray renders afterwards.
    let settled = renders.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(renders.load(Ordering::SeqCst), settled);
}

#[test]
fn repeated_requests_keep_rendering() {
    let timer = Arc::new(StdTimerDriver::new());
    let aggregator = InvalidationAggregator::new(timer.clone());
    let scheduler = RenderScheduler::new(aggregator.clone(), timer.clone(), None);

    let renders = Arc::new(AtomicUsize::new(0));
    let _guard = {
        let renders = Arc::clone(&renders);
        let aggregator = aggregator.clone();
        scheduler.render_requested().connect(move || {
            let count = renders.fetch_add(1, Ordering::SeqCst) + 1;
            aggregator.frame_rendered();
            // Keep the loop alive for the first few frames.
            if count < 3 {
                aggregator.request_render();
            }
        })
    };

    aggregator.request_render();
    assert!(
        wait_until(Duration::from_secs(2), || renders.load(Ordering::SeqCst) >= 3),
        "three frames rendered"
    );
    assert!(wait_until(Duration::from_secs(2), || !scheduler.is_running()));
}

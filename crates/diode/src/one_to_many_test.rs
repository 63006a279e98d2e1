//! One-to-many (tap) diode tests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::*;
use crate::alerter::DropAlerter;

fn counting_alerter() -> (DropAlerter, Arc<AtomicU64>) {
    let count = Arc::new(AtomicU64::new(0));
    let counted = Arc::clone(&count);
    let alerter: DropAlerter = Arc::new(move |n| {
        counted.fetch_add(n, Ordering::Relaxed);
    });
    (alerter, count)
}

#[test]
fn test_every_subscriber_sees_every_value() {
    let mut publisher = one_to_many::<u64>(16);
    let mut a = publisher.subscribe(crate::noop_alerter());
    let mut b = publisher.subscribe(crate::noop_alerter());

    for i in 0..10 {
        publisher.set(i);
    }

    for i in 0..10 {
        assert_eq!(a.try_next(), Some(i));
    }
    for i in 0..10 {
        assert_eq!(b.try_next(), Some(i));
    }
    assert!(a.try_next().is_none());
    assert!(b.try_next().is_none());
}

#[test]
fn test_subscriber_starts_at_subscription_point() {
    let mut publisher = one_to_many::<u64>(16);
    publisher.set(1);
    publisher.set(2);

    let mut late = publisher.subscribe(crate::noop_alerter());
    assert!(late.try_next().is_none());

    publisher.set(3);
    assert_eq!(late.try_next(), Some(3));
}

#[test]
fn test_slow_subscriber_is_lapped_individually() {
    let mut publisher = one_to_many::<u64>(4);
    let mut fast = publisher.subscribe(crate::noop_alerter());
    let (slow_alerter, slow_drops) = counting_alerter();
    let mut slow = publisher.subscribe(slow_alerter);

    // Fast consumer keeps up.
    for i in 0..10 {
        publisher.set(i);
        assert_eq!(fast.try_next(), Some(i));
    }

    // Slow consumer was lapped: it gets the earliest still-live value
    // onward and its alerter saw the gap.
    assert_eq!(slow.try_next(), Some(6));
    assert_eq!(slow.try_next(), Some(7));
    assert_eq!(slow.try_next(), Some(8));
    assert_eq!(slow.try_next(), Some(9));
    assert!(slow.try_next().is_none());
    assert_eq!(slow_drops.load(Ordering::Relaxed), 6);
}

#[test]
fn test_fast_consumer_unaffected_by_slow_sibling() {
    let mut publisher = one_to_many::<u64>(4);
    let mut fast = publisher.subscribe(crate::noop_alerter());
    let _slow = publisher.subscribe(crate::noop_alerter());

    for i in 0..100 {
        publisher.set(i);
        assert_eq!(fast.try_next(), Some(i));
    }
}

#[test]
fn test_concurrent_fanout_accounting() {
    const TOTAL: u64 = 20_000;
    const SUBSCRIBERS: usize = 3;

    let mut publisher = one_to_many::<u64>(32);
    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let mut handles = Vec::new();
    for _ in 0..SUBSCRIBERS {
        let (alerter, drops) = counting_alerter();
        let mut sub = publisher.subscribe(alerter);
        let done = Arc::clone(&done);
        handles.push(std::thread::spawn(move || {
            let mut seen = 0u64;
            let mut last = None;
            loop {
                match sub.try_next() {
                    Some(v) => {
                        if let Some(prev) = last {
                            assert!(v > prev, "out of order: {prev} then {v}");
                        }
                        last = Some(v);
                        seen += 1;
                    }
                    None => {
                        if done.load(Ordering::Acquire) && sub.try_next().is_none() {
                            break;
                        }
                        std::thread::yield_now();
                    }
                }
            }
            (seen, drops.load(Ordering::Relaxed))
        }));
    }

    for i in 0..TOTAL {
        publisher.set(i);
    }
    done.store(true, Ordering::Release);

    for handle in handles {
        let (seen, dropped) = handle.join().unwrap();
        assert_eq!(seen + dropped, TOTAL);
    }
}

//! One-to-one diode tests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::*;

fn counting_alerter() -> (DropAlerter, Arc<AtomicU64>) {
    let count = Arc::new(AtomicU64::new(0));
    let counted = Arc::clone(&count);
    let alerter: DropAlerter = Arc::new(move |n| {
        counted.fetch_add(n, Ordering::Relaxed);
    });
    (alerter, count)
}

#[test]
fn test_fifo_within_capacity() {
    let (mut tx, mut rx) = one_to_one(8, crate::noop_alerter());

    for i in 0..8u32 {
        tx.set(i);
    }
    for i in 0..8u32 {
        assert_eq!(rx.try_next(), Some(i));
    }
    assert!(rx.try_next().is_none());
}

#[test]
fn test_overflow_drops_oldest() {
    let (alerter, drops) = counting_alerter();
    let (mut tx, mut rx) = one_to_one(4, alerter);

    for i in 0..7u32 {
        tx.set(i);
    }

    // 0..3 were displaced as 4..6 arrived... capacity 4 keeps 3..6.
    assert_eq!(rx.try_next(), Some(3));
    assert_eq!(rx.try_next(), Some(4));
    assert_eq!(rx.try_next(), Some(5));
    assert_eq!(rx.try_next(), Some(6));
    assert!(rx.try_next().is_none());
    assert_eq!(drops.load(Ordering::Relaxed), 3);
}

#[test]
fn test_drain_state() {
    let (mut tx, mut rx) = one_to_one(4, crate::noop_alerter());
    assert!(rx.is_drained());

    tx.set(1u8);
    assert!(!rx.is_drained());
    assert_eq!(rx.values_set(), 1);

    rx.try_next();
    assert!(rx.is_drained());
}

#[test]
fn test_concurrent_spsc_accounting() {
    const TOTAL: u64 = 50_000;

    let (alerter, drops) = counting_alerter();
    let (mut tx, mut rx) = one_to_one(32, alerter);

    let producer = std::thread::spawn(move || {
        for i in 0..TOTAL {
            tx.set(i);
        }
    });

    let consumer = std::thread::spawn(move || {
        let mut seen = Vec::new();
        loop {
            match rx.try_next() {
                Some(v) => seen.push(v),
                None => {
                    if seen.last() == Some(&(TOTAL - 1)) {
                        break;
                    }
                    std::thread::yield_now();
                }
            }
        }
        seen
    });

    producer.join().unwrap();
    let seen = consumer.join().unwrap();

    assert_eq!(seen.len() as u64 + drops.load(Ordering::Relaxed), TOTAL);
    for pair in seen.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

//! Delay queue behaviour on the real system clock, including concurrent
//! producers and consumers.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use time_delay_queue::message::PubSubMessage;
use time_delay_queue::queue::DelayQueue;

const DELAY: Duration = Duration::from_millis(40);
const MSG_LIFETIME: Duration = Duration::from_millis(80);
const NUM_MSGS: usize = 10;

fn text_message() -> PubSubMessage {
    PubSubMessage::simple(Uuid::new_v4(), Uuid::new_v4(), "\"test\"")
}

fn transient_message() -> PubSubMessage {
    PubSubMessage::simple_transient(Uuid::new_v4(), Uuid::new_v4(), "\"test\"", MSG_LIFETIME)
}

// =============================================================================
// Single-threaded behaviour
// =============================================================================

#[test]
fn test_basic_add_retrieve_before_delay() {
    let queue = DelayQueue::new(DELAY);
    queue.add(text_message());
    assert_eq!(queue.retrieve(), None);
}

#[test]
fn test_basic_add_retrieve_after_delay() {
    let queue = DelayQueue::new(DELAY);
    let msg = text_message();
    queue.add(msg.clone());

    thread::sleep(2 * DELAY);
    assert_eq!(queue.retrieve(), Some(msg));
}

#[test]
fn test_transient_expires_on_real_clock() {
    let queue = DelayQueue::new(DELAY);
    let transient = transient_message();
    let persistent = text_message();
    queue.add(transient);
    queue.add(persistent.clone());

    thread::sleep(MSG_LIFETIME + Duration::from_millis(1));
    assert_eq!(queue.retrieve(), Some(persistent));
    assert_eq!(queue.retrieve(), None);
}

#[test]
fn test_message_count_after_retrieval() {
    let queue = DelayQueue::new(DELAY);
    for _ in 0..NUM_MSGS {
        queue.add(text_message());
    }

    thread::sleep(2 * DELAY);
    for _ in 0..NUM_MSGS {
        assert!(queue.retrieve().is_some());
    }

    assert_eq!(queue.total_message_count(), NUM_MSGS as u64);
    assert!(queue.is_empty());
}

// =============================================================================
// Concurrent producers and consumers
// =============================================================================

#[test]
fn test_concurrent_adders_total_count() {
    let queue = Arc::new(DelayQueue::new(DELAY));
    let num_writers = 10;

    let writers: Vec<_> = (0..num_writers)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for _ in 0..NUM_MSGS {
                    assert!(queue.add(transient_message()));
                    thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().expect("writer thread panicked");
    }

    assert_eq!(queue.total_message_count(), (num_writers * NUM_MSGS) as u64);
}

#[test]
fn test_peak_load_covers_whole_run() {
    let queue = Arc::new(DelayQueue::new(DELAY));
    let num_writers = 10;

    let start = Utc::now();
    let writers: Vec<_> = (0..num_writers)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for _ in 0..NUM_MSGS {
                    queue.add(transient_message());
                    thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer thread panicked");
    }
    let end = Utc::now();

    let window = (end - start).to_std().unwrap_or(Duration::ZERO);
    assert_eq!(queue.peak_load(window), num_writers * NUM_MSGS);
}

#[test]
fn test_peak_load_finds_burst_between_pauses() {
    let queue = DelayQueue::new(DELAY);
    queue.add(text_message());
    thread::sleep(Duration::from_millis(200));
    for _ in 0..20 {
        queue.add(text_message());
    }
    thread::sleep(Duration::from_millis(200));
    queue.add(text_message());

    assert_eq!(queue.peak_load(Duration::from_millis(100)), 20);
    assert_eq!(queue.peak_load(Duration::from_secs(10)), 22);
}

#[test]
fn test_each_message_delivered_exactly_once() {
    let queue = Arc::new(DelayQueue::new(Duration::ZERO));
    let total = 200;
    for _ in 0..total {
        queue.add(text_message());
    }

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut received = Vec::new();
                while let Some(msg) = queue.retrieve() {
                    received.push(msg.id());
                }
                received
            })
        })
        .collect();

    let mut all: Vec<Uuid> = readers
        .into_iter()
        .flat_map(|r| r.join().expect("reader thread panicked"))
        .collect();
    assert_eq!(all.len(), total);
    all.sort();
    all.dedup();
    assert_eq!(all.len(), total);
}

#[test]
fn test_concurrent_duplicate_adds_accept_once() {
    let queue = Arc::new(DelayQueue::new(DELAY));
    let msg = text_message();

    let adders: Vec<_> = (0..8)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let msg = msg.clone();
            thread::spawn(move || queue.add(msg))
        })
        .collect();

    let accepted = adders
        .into_iter()
        .map(|a| a.join().expect("adder thread panicked"))
        .filter(|accepted| *accepted)
        .count();

    assert_eq!(accepted, 1);
    assert_eq!(queue.total_message_count(), 1);
    // Rejected attempts still count as load
    assert_eq!(queue.history_len(), 8);
}

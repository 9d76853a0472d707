//! A bounded single-producer/single-consumer ring, used by the loader CLIs
//! to overlap file parsing (background thread) with row insertion
//! (foreground thread, inside one write transaction) — spec §4.6, §5.
//!
//! Per spec §9's redesign guidance, there is no virtual `Produce` base
//! class: the producer is a plain closure, and per-slot results are
//! represented with an enum (`Slot::Item`/`Done`/`Err`) instead of tunneling
//! exceptions across the thread boundary.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

enum Slot<T> {
    Item(T),
    Done,
    Err(String),
}

struct Shared<T> {
    slots: Vec<Mutex<Option<Slot<T>>>>,
    produced: AtomicU64,
    consumed: AtomicU64,
    stop: AtomicBool,
}

impl<T> Shared<T> {
    fn capacity(&self) -> u64 {
        self.slots.len() as u64
    }
}

/// A ring of capacity `R > 1` with one background producer thread and a
/// foreground consumer drained via [`Ring::drain`]/[`Ring::next_item`].
pub struct Ring<T> {
    shared: Arc<Shared<T>>,
    handle: Option<JoinHandle<()>>,
}

/// Result of draining one item from the ring.
pub enum Drained<T> {
    Item(T),
    /// The producer finished without error; no more items will arrive.
    Finished,
}

impl<T: Send + 'static> Ring<T> {
    /// Spawn the background producer. `produce` is called repeatedly on the
    /// background thread; it returns `Some(Ok(item))` to enqueue an item,
    /// `Some(Err(message))` to fail (recorded and re-raised to the
    /// consumer), or `None` once exhausted.
    pub fn spawn<F>(capacity: usize, mut produce: F) -> Self
    where
        F: FnMut() -> Option<std::result::Result<T, String>> + Send + 'static,
    {
        assert!(capacity > 1, "ring capacity must be > 1");
        let shared = Arc::new(Shared {
            slots: (0..capacity).map(|_| Mutex::new(None)).collect(),
            produced: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
            stop: AtomicBool::new(false),
        });

        let worker_shared = shared.clone();
        let handle = thread::spawn(move || {
            let cap = worker_shared.capacity();
            loop {
                if worker_shared.stop.load(Ordering::Acquire) {
                    return;
                }
                // Block (sleep-poll) while the ring is full.
                while worker_shared.produced.load(Ordering::Acquire)
                    - worker_shared.consumed.load(Ordering::Acquire)
                    >= cap
                {
                    if worker_shared.stop.load(Ordering::Acquire) {
                        return;
                    }
                    thread::sleep(Duration::from_micros(200));
                }

                let slot_value = match produce() {
                    Some(Ok(item)) => Slot::Item(item),
                    Some(Err(message)) => Slot::Err(message),
                    None => Slot::Done,
                };
                let is_terminal = matches!(slot_value, Slot::Done | Slot::Err(_));

                let p = worker_shared.produced.load(Ordering::Acquire);
                let idx = (p % cap) as usize;
                *worker_shared.slots[idx].lock().expect("ring slot poisoned") = Some(slot_value);
                worker_shared.produced.fetch_add(1, Ordering::Release);

                if is_terminal {
                    return;
                }
            }
        });

        Ring {
            shared,
            handle: Some(handle),
        }
    }

    /// Drain the next item, blocking (yielding) until one is available.
    /// Returns `Ok(Drained::Finished)` once the producer completes
    /// normally, and `Err(message)` if the producer reported a failure —
    /// re-raised here on the consumer's thread, matching spec §4.6's
    /// "consumer ... re-raises on next drain".
    pub fn next_item(&self) -> std::result::Result<Drained<T>, String> {
        let cap = self.shared.capacity();
        loop {
            let p = self.shared.produced.load(Ordering::Acquire);
            let c = self.shared.consumed.load(Ordering::Acquire);
            if p == c {
                thread::yield_now();
                continue;
            }
            let idx = (c % cap) as usize;
            let slot = self.shared.slots[idx]
                .lock()
                .expect("ring slot poisoned")
                .take()
                .expect("slot claimed by produced counter but empty");
            self.shared.consumed.fetch_add(1, Ordering::Release);
            return match slot {
                Slot::Item(item) => Ok(Drained::Item(item)),
                Slot::Done => Ok(Drained::Finished),
                Slot::Err(message) => Err(message),
            };
        }
    }

    /// Drain all remaining items into `sink` until the producer finishes or
    /// fails, returning the count consumed.
    pub fn drain_into(&self, mut sink: impl FnMut(T)) -> std::result::Result<u64, String> {
        let mut count = 0;
        loop {
            match self.next_item()? {
                Drained::Item(item) => {
                    sink(item);
                    count += 1;
                }
                Drained::Finished => return Ok(count),
            }
        }
    }

    /// Set the stop flag and join the producer thread. The producer exits
    /// at its next checkpoint (spec §4.6's cancellation contract).
    pub fn abort(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn delivers_all_items_in_order() {
        let mut next = 0usize;
        let ring = Ring::spawn(4, move || {
            if next < 1000 {
                let item = next;
                next += 1;
                Some(Ok(item))
            } else {
                None
            }
        });

        let mut received = Vec::new();
        ring.drain_into(|item| received.push(item)).unwrap();
        assert_eq!(received.len(), 1000);
        assert_eq!(received, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn re_raises_producer_error_on_consumer() {
        let ring: Ring<i32> = Ring::spawn(4, || Some(Err("boom".to_string())));
        let result = ring.drain_into(|_| {});
        assert_eq!(result.unwrap_err(), "boom");
    }

    #[test]
    fn abort_terminates_producer_without_leaking() {
        let produced = Arc::new(AtomicUsize::new(0));
        let producer_count = produced.clone();
        let mut ring = Ring::spawn(4, move || {
            producer_count.fetch_add(1, Ordering::Relaxed);
            Some(Ok(()))
        });
        // Let the producer fill the ring, then cancel.
        thread::sleep(Duration::from_millis(5));
        ring.abort();
        // The thread has been joined; no further progress should occur.
        let count_after_abort = produced.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(5));
        assert_eq!(produced.load(Ordering::Relaxed), count_after_abort);
    }

    #[test]
    fn respects_bounded_capacity() {
        // A slow consumer should never observe the producer racing more
        // than `capacity` items ahead.
        let ring = Ring::spawn(4, {
            let mut n = 0;
            move || {
                n += 1;
                if n > 50 {
                    None
                } else {
                    Some(Ok(n))
                }
            }
        });
        thread::sleep(Duration::from_millis(10));
        let mut total = 0;
        while let Ok(Drained::Item(_)) = ring.next_item() {
            total += 1;
            if total == 50 {
                break;
            }
        }
        assert_eq!(total, 50);
    }
}

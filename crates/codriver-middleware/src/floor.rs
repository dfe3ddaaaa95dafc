//! [`Floor`] – the single permit deciding who may start a dialogue turn.
//!
//! A reaction rule takes the floor before it runs and keeps it while the
//! dialogue pipeline speaks; the turn-complete event hands it back.  A user
//! speaking holds the floor too, so no rule talks over them.
//!
//! The permit is one [`AtomicBool`]: [`Floor::try_acquire`] is a
//! compare-and-swap, so two gates racing for the floor cannot both win.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shared single-permit flag.  Hand it around as `Arc<Floor>`.
#[derive(Debug, Default)]
pub struct Floor {
    held: AtomicBool,
}

impl Floor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the permit if it is free.  Returns `true` on success.
    pub fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Mark the floor as held regardless of its current state.
    pub fn block(&self) {
        self.held.store(true, Ordering::Release);
    }

    /// Free the permit.  Releasing a free floor is a no-op.
    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    use super::*;

    #[test]
    fn only_one_acquirer_wins() {
        let floor = Floor::new();
        assert!(floor.try_acquire());
        assert!(!floor.try_acquire());
        floor.release();
        assert!(floor.try_acquire());
    }

    #[test]
    fn block_holds_an_already_held_floor() {
        let floor = Floor::new();
        floor.block();
        floor.block();
        assert!(floor.is_held());
        assert!(!floor.try_acquire());
        floor.release();
        assert!(!floor.is_held());
    }

    #[test]
    fn racing_threads_acquire_exactly_once() {
        let floor = Arc::new(Floor::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let floor = Arc::clone(&floor);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    if floor.try_acquire() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}

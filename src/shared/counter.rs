use std::sync::atomic::{AtomicU64, Ordering};

/// Environment steps taken by all workers. Read only for reporting.
#[derive(Debug, Default)]
pub struct GlobalCounter {
    steps: AtomicU64,
}

impl GlobalCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `steps` and return the new total.
    pub fn add(&self, steps: u64) -> u64 {
        self.steps.fetch_add(steps, Ordering::Relaxed) + steps
    }

    pub fn get(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_concurrent_increments_are_exact() {
        let counter = Arc::new(GlobalCounter::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..500 {
                        counter.add(2);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.get(), 4000);
    }
}

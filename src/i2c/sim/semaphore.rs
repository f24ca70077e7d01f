// Licensed under the Apache-2.0 license

//! Counting semaphore for host tests.
//!
//! Without a pump it is a plain condvar semaphore, good enough for the bus
//! mutex shared by several threads. With a pump installed, `take` plays
//! the part of the interrupt controller: while no unit is available it
//! keeps calling the pump, which delivers pending interrupts and DMA
//! progress, until a unit shows up or the pump reports that nothing moved.

use crate::sync::{Semaphore, TakeTimeout};
use fugit::MillisDurationU32;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Returns whether anything changed.
type Pump = Arc<dyn Fn() -> bool + Send + Sync>;

/// Upper bound on pump rounds for one `take`.
const MAX_ROUNDS: usize = 1_000_000;

#[derive(Default)]
struct Inner {
    count: Mutex<u32>,
    cond: Condvar,
    pump: Mutex<Option<Pump>>,
}

/// Cloning yields another handle onto the same semaphore.
#[derive(Clone, Default)]
pub struct SimSemaphore {
    inner: Arc<Inner>,
}

impl SimSemaphore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pump(&self, pump: impl Fn() -> bool + Send + Sync + 'static) {
        *self.inner.pump.lock().unwrap() = Some(Arc::new(pump));
    }

    pub fn count(&self) -> u32 {
        *self.inner.count.lock().unwrap()
    }

    fn try_take(&self) -> bool {
        let mut count = self.inner.count.lock().unwrap();
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }

    fn wait(&self, timeout: Option<MillisDurationU32>) -> Result<(), TakeTimeout> {
        let count = self.inner.count.lock().unwrap();
        let mut count = match timeout {
            Some(t) => {
                let limit = Duration::from_millis(u64::from(t.ticks()));
                self.inner
                    .cond
                    .wait_timeout_while(count, limit, |c| *c == 0)
                    .unwrap()
                    .0
            }
            None => self.inner.cond.wait_while(count, |c| *c == 0).unwrap(),
        };
        if *count == 0 {
            return Err(TakeTimeout);
        }
        *count -= 1;
        Ok(())
    }
}

impl Semaphore for SimSemaphore {
    fn give(&self) {
        *self.inner.count.lock().unwrap() += 1;
        self.inner.cond.notify_all();
    }

    fn take(&self, timeout: Option<MillisDurationU32>) -> Result<(), TakeTimeout> {
        let pump = self.inner.pump.lock().unwrap().clone();
        let Some(pump) = pump else {
            return self.wait(timeout);
        };
        for _ in 0..MAX_ROUNDS {
            if self.try_take() {
                return Ok(());
            }
            if !pump() {
                if self.try_take() {
                    return Ok(());
                }
                if timeout.is_some() {
                    return Err(TakeTimeout);
                }
                panic!("simulated bus stalled with no completion pending");
            }
        }
        panic!("simulated bus did not settle");
    }

    fn reset(&self) {
        *self.inner.count.lock().unwrap() = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn pump_runs_until_unit_posted() {
        let sem = SimSemaphore::new();
        let rounds = Arc::new(AtomicU32::new(0));
        let handle = sem.clone();
        let seen = Arc::clone(&rounds);
        sem.set_pump(move || {
            if seen.fetch_add(1, Ordering::SeqCst) == 2 {
                handle.give();
            }
            true
        });
        assert_eq!(sem.take(None), Ok(()));
        assert_eq!(rounds.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn idle_pump_times_out_bounded_take() {
        let sem = SimSemaphore::new();
        sem.set_pump(|| false);
        assert_eq!(sem.take(Some(MillisDurationU32::millis(5))), Err(TakeTimeout));
    }

    #[test]
    fn plain_wait_times_out() {
        let sem = SimSemaphore::new();
        assert_eq!(sem.take(Some(MillisDurationU32::millis(1))), Err(TakeTimeout));
        sem.give();
        assert_eq!(sem.take(Some(MillisDurationU32::millis(1))), Ok(()));
    }
}

// Licensed under the Apache-2.0 license

//! Kernel synchronisation collaborator.
//!
//! Drivers block on a host kernel semaphore while interrupt handlers finish
//! their work. The kernel supplies the implementation; the drivers only need
//! the three operations below.

use fugit::MillisDurationU32;

/// A `take` that gave up before a unit was posted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TakeTimeout;

/// Counting semaphore provided by the host kernel.
pub trait Semaphore {
    /// Post one unit. Must be callable from interrupt context.
    fn give(&self);

    /// Wait for a unit. `None` waits forever.
    ///
    /// # Errors
    ///
    /// Returns [`TakeTimeout`] if `timeout` elapsed first.
    fn take(&self, timeout: Option<MillisDurationU32>) -> Result<(), TakeTimeout>;

    /// Discard units posted so far.
    fn reset(&self);
}

/// A unit held on a semaphore used as a mutex, given back on drop.
pub struct SemaphoreGuard<'a, S: Semaphore> {
    sem: &'a S,
}

impl<'a, S: Semaphore> SemaphoreGuard<'a, S> {
    /// Block until the semaphore yields a unit.
    pub fn acquire(sem: &'a S) -> Self {
        while sem.take(None).is_err() {}
        Self { sem }
    }
}

impl<S: Semaphore> Drop for SemaphoreGuard<'_, S> {
    fn drop(&mut self) {
        self.sem.give();
    }
}

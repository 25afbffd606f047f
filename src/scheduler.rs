//! Host scheduler notifications around native calls
//!
//! The executor never calls into a scheduler directly; it goes through the
//! [`Scheduler`] capability so hosts can plug in their own runtime and tests
//! can observe the bracketing.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Block/unblock notifications for the calling logical thread
pub trait Scheduler: Send + Sync {
    /// The calling thread is about to block in native code
    fn enter_blocking(&self);

    /// The native call returned; the thread is schedulable again
    fn exit_blocking(&self);

    /// Run `region` bracketed by enter/exit
    ///
    /// Exit is signaled even if `region` unwinds. Override when the host
    /// needs to own the region, e.g. to hand off its worker thread.
    fn run_blocking(&self, region: &mut dyn FnMut()) {
        let _region = BlockingRegion::enter(self);
        region();
    }
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn enter_blocking(&self) {
        (**self).enter_blocking()
    }

    fn exit_blocking(&self) {
        (**self).exit_blocking()
    }

    fn run_blocking(&self, region: &mut dyn FnMut()) {
        (**self).run_blocking(region)
    }
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
    fn enter_blocking(&self) {
        (**self).enter_blocking()
    }

    fn exit_blocking(&self) {
        (**self).exit_blocking()
    }

    fn run_blocking(&self, region: &mut dyn FnMut()) {
        (**self).run_blocking(region)
    }
}

/// Guard pairing `enter_blocking` with `exit_blocking`
#[must_use = "the blocking region ends when the guard is dropped"]
pub struct BlockingRegion<'a, S: Scheduler + ?Sized> {
    scheduler: &'a S,
}

impl<'a, S: Scheduler + ?Sized> BlockingRegion<'a, S> {
    pub fn enter(scheduler: &'a S) -> Self {
        scheduler.enter_blocking();
        Self { scheduler }
    }
}

impl<S: Scheduler + ?Sized> Drop for BlockingRegion<'_, S> {
    fn drop(&mut self) {
        self.scheduler.exit_blocking();
    }
}

/// Scheduler for hosts without cooperative threads
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScheduler;

impl Scheduler for NoopScheduler {
    #[inline]
    fn enter_blocking(&self) {}

    #[inline]
    fn exit_blocking(&self) {}
}

/// One notification seen by a [`RecordingScheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    Enter,
    Exit,
}

/// Fake scheduler that records every notification
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    events: Mutex<Vec<SchedulerEvent>>,
    depth: AtomicUsize,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().clone()
    }

    /// Regions currently open
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Scheduler for RecordingScheduler {
    fn enter_blocking(&self) {
        self.depth.fetch_add(1, Ordering::SeqCst);
        self.events.lock().push(SchedulerEvent::Enter);
    }

    fn exit_blocking(&self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().push(SchedulerEvent::Exit);
    }
}

#[cfg(feature = "tokio")]
pub use self::tokio_scheduler::TokioScheduler;

#[cfg(feature = "tokio")]
mod tokio_scheduler {
    use super::{BlockingRegion, Scheduler};
    use tokio::runtime::{Handle, RuntimeFlavor};

    /// Hands the worker thread off while a native call blocks
    ///
    /// Inside a multi-threaded Tokio runtime the region runs under
    /// `block_in_place`, so other tasks move to another worker. Anywhere else
    /// the region runs inline.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct TokioScheduler;

    impl Scheduler for TokioScheduler {
        fn enter_blocking(&self) {
            tracing::trace!(event = "blocking_enter", "native region entered");
        }

        fn exit_blocking(&self) {
            tracing::trace!(event = "blocking_exit", "native region exited");
        }

        fn run_blocking(&self, region: &mut dyn FnMut()) {
            let multi_thread = Handle::try_current()
                .map(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread)
                .unwrap_or(false);

            if multi_thread {
                tokio::task::block_in_place(|| {
                    let _region = BlockingRegion::enter(self);
                    region();
                });
            } else {
                let _region = BlockingRegion::enter(self);
                region();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn region_brackets_once() {
        let sched = RecordingScheduler::new();
        let mut ran = false;
        sched.run_blocking(&mut || {
            ran = true;
        });
        assert!(ran);
        assert_eq!(sched.events(), vec![SchedulerEvent::Enter, SchedulerEvent::Exit]);
        assert_eq!(sched.depth(), 0);
    }

    #[test]
    fn exit_survives_unwinding() {
        let sched = RecordingScheduler::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            sched.run_blocking(&mut || panic!("native fault"));
        }));
        assert!(result.is_err());
        assert_eq!(sched.events(), vec![SchedulerEvent::Enter, SchedulerEvent::Exit]);
        assert_eq!(sched.depth(), 0);
    }

    #[test]
    fn depth_visible_inside_region() {
        let sched = Arc::new(RecordingScheduler::new());
        let inner = Arc::clone(&sched);
        sched.run_blocking(&mut || assert_eq!(inner.depth(), 1));
        sched.clear();
        assert!(sched.events().is_empty());
    }

    #[cfg(feature = "tokio")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tokio_multi_thread_runs_region() {
        // Only a spawned task sits on a worker thread
        let hits = tokio::spawn(async {
            let mut hits = 0;
            TokioScheduler.run_blocking(&mut || hits += 1);
            hits
        })
        .await
        .unwrap();
        assert_eq!(hits, 1);
    }

    #[cfg(feature = "tokio")]
    #[tokio::test(flavor = "current_thread")]
    async fn tokio_current_thread_runs_inline() {
        let mut hits = 0;
        TokioScheduler.run_blocking(&mut || hits += 1);
        assert_eq!(hits, 1);
    }
}

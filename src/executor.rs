//! Call executor - binds a block, brackets the trampoline with scheduler
//! notifications
//!
//! Sequence per call:
//! 1. store the block address in the spec
//! 2. `enter_blocking` on the scheduler
//! 3. run the trampoline
//! 4. `exit_blocking`, also when the trampoline unwinds
//!
//! A native function that never returns leaves the calling thread parked for
//! good. There is no timeout or cancellation.

use crate::block::ArgBlock;
use crate::config::{Config, ValidationMode};
use crate::descriptor::ArgumentStruct;
use crate::error::CallError;
use crate::logging;
use crate::scheduler::{NoopScheduler, Scheduler};
use crate::spec::{CallSpec, Fingerprint};
use crate::trampoline::Trampoline;
use core::mem::size_of;
use core::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(all(target_arch = "x86_64", not(windows)))]
use crate::trampoline::NativeTrampoline;

/// Executor statistics for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    pub calls_made: u64,
    /// Calls refused by checked-mode validation
    pub rejected_calls: u64,
}

#[derive(Debug, Default)]
struct Counters {
    calls_made: AtomicU64,
    rejected_calls: AtomicU64,
}

/// Executes call specs against argument blocks
#[derive(Debug)]
pub struct Executor<S, T> {
    scheduler: S,
    trampoline: T,
    config: Config,
    counters: Counters,
}

#[cfg(all(target_arch = "x86_64", not(windows)))]
impl<S: Scheduler> Executor<S, NativeTrampoline> {
    /// Executor using the host trampoline
    pub fn new(scheduler: S, config: Config) -> Self {
        Self::with_trampoline(scheduler, NativeTrampoline::default(), config)
    }
}

#[cfg(all(target_arch = "x86_64", not(windows)))]
impl Default for Executor<NoopScheduler, NativeTrampoline> {
    fn default() -> Self {
        Self::new(NoopScheduler, Config::default())
    }
}

impl<S: Scheduler, T: Trampoline> Executor<S, T> {
    pub fn with_trampoline(scheduler: S, trampoline: T, config: Config) -> Self {
        Self {
            scheduler,
            trampoline,
            config,
            counters: Counters::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            calls_made: self.counters.calls_made.load(Ordering::Relaxed),
            rejected_calls: self.counters.rejected_calls.load(Ordering::Relaxed),
        }
    }

    /// Call with a typed argument struct as the block
    ///
    /// In checked mode the struct's size and layout fingerprint must match
    /// the spec; otherwise the call is refused before any native code runs.
    ///
    /// # Safety
    /// The spec's target must be a function with the signature the spec
    /// describes. In unchecked mode `block` must also have the layout the
    /// spec was built from.
    pub unsafe fn call<D: ArgumentStruct>(&self, spec: &mut CallSpec, block: &mut D) -> Result<(), CallError> {
        if self.config.validation == ValidationMode::Checked {
            self.check_size(spec, size_of::<D>(), true)?;
            if Fingerprint::of(&*block) != spec.fingerprint() {
                return Err(self.reject(
                    spec,
                    CallError::ShapeMismatch {
                        descriptor: D::NAME.to_string(),
                    },
                ));
            }
        }
        self.execute(spec, NonNull::from(block).cast::<u8>());
        Ok(())
    }

    /// Call with an untyped block
    ///
    /// Checked mode verifies the block is at least the spec's block size.
    ///
    /// # Safety
    /// As for [`call`](Self::call); the block contents must follow the
    /// layout the spec was built from.
    pub unsafe fn call_block(&self, spec: &mut CallSpec, block: &mut ArgBlock) -> Result<(), CallError> {
        if self.config.validation == ValidationMode::Checked {
            self.check_size(spec, block.len(), false)?;
        }
        self.execute(spec, block.as_mut_ptr());
        Ok(())
    }

    /// Call with a raw block address, never validated
    ///
    /// # Safety
    /// `base` must point to a live block matching the spec that is neither
    /// moved, freed nor accessed by anyone else until this returns.
    pub unsafe fn call_raw(&self, spec: &mut CallSpec, base: NonNull<u8>) {
        self.execute(spec, base);
    }

    fn check_size(&self, spec: &CallSpec, actual: usize, exact: bool) -> Result<(), CallError> {
        let expected = spec.block_size();
        let ok = if exact { actual == expected } else { actual >= expected };
        if ok {
            Ok(())
        } else {
            Err(self.reject(spec, CallError::BlockSizeMismatch { expected, actual }))
        }
    }

    fn reject(&self, spec: &CallSpec, err: CallError) -> CallError {
        self.counters.rejected_calls.fetch_add(1, Ordering::Relaxed);
        logging::log_validation_failure(spec.descriptor_name(), &err.to_string());
        err
    }

    unsafe fn execute(&self, spec: &mut CallSpec, base: NonNull<u8>) {
        spec.bind(base.as_ptr() as usize);
        logging::log_native_call(spec.descriptor_name(), spec.target().addr(), spec.base());
        self.counters.calls_made.fetch_add(1, Ordering::Relaxed);

        let spec: &CallSpec = spec;
        let trampoline = &self.trampoline;
        self.scheduler.run_blocking(&mut || unsafe { trampoline.invoke(spec) });
    }
}

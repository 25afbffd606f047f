//! fastffi - direct native calls through reusable call specifications
//!
//! A descriptor struct lists a native function's arguments (and at most one
//! return value) in declaration order. [`CallSpec::build`] classifies every
//! field into an x86-64 System V integer register, SSE register or stack slot
//! once; an [`Executor`] then reuses the spec for any number of calls, each
//! with a fresh argument block, while telling the host [`Scheduler`] that the
//! calling thread is blocked in native code.
//!
//! ```ignore
//! fastffi::descriptor! {
//!     #[derive(Default)]
//!     pub struct Hypot {
//!         pub x: f64,
//!         pub y: f64,
//!         #[ffi("ret")]
//!         pub out: f64,
//!     }
//! }
//!
//! let mut spec = CallSpec::of::<Hypot>(NativeFn::new(hypot as *const ()))?;
//! let exec = Executor::default();
//! let mut args = Hypot { x: 3.0, y: 4.0, out: 0.0 };
//! unsafe { exec.call(&mut spec, &mut args)? };
//! assert_eq!(args.out, 5.0);
//! ```
//!
//! # Safety contract
//!
//! Nothing checks at call time that the native function's real signature
//! matches the spec. With [`ValidationMode::Unchecked`] nothing checks the
//! argument block either: a block of the wrong shape, too small, or moved
//! during the call is undefined behavior. [`ValidationMode::Checked`] adds a
//! size and layout-fingerprint comparison before each call.
//!
//! Fields wider than 64 bits, aggregates and variants are rejected when the
//! spec is built. Errors reported by the native function travel through the
//! return slot as ordinary data.

pub mod abi;
pub mod block;
pub mod cache;
pub mod classify;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod logging;
pub mod scheduler;
pub mod shape;
pub mod slot;
pub mod spec;
pub mod trampoline;

pub use block::{ArgBlock, Scalar};
pub use cache::{CacheStats, SpecCache};
pub use classify::{classify, Classified};
pub use config::{Config, LogSettings, ValidationMode};
pub use descriptor::{Annotations, ArgumentStruct, Descriptor, DynamicDescriptor, Field, StaticLayout};
pub use error::{BlockError, CallError, ConfigError, Result, SpecError};
pub use executor::{Executor, ExecutorStats};
pub use scheduler::{BlockingRegion, NoopScheduler, RecordingScheduler, Scheduler, SchedulerEvent};
pub use shape::{FieldShape, NativeType, Sequence, ShapeKind};
pub use slot::{ArgSlot, TypeTag};
pub use spec::{CallSpec, Fingerprint, NativeFn, SpecBuilder};
pub use trampoline::{RegisterImage, Trampoline};

#[cfg(feature = "tokio")]
pub use scheduler::TokioScheduler;

#[cfg(all(target_arch = "x86_64", not(windows)))]
pub use trampoline::{NativeTrampoline, SysVTrampoline};

/// Initialize logging from the environment
pub fn init() {
    logging::init();
}

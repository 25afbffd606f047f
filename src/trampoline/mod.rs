//! Native call trampoline
//!
//! The trampoline turns a bound [`CallSpec`] into a machine-level call:
//! 1. `load_registers` reads every slot from the argument block, extending
//!    or truncating per its tag, into a [`RegisterImage`]
//! 2. an architecture stub moves the image into physical registers and the
//!    outgoing stack, sets the SSE count and calls the target
//! 3. `store_returns` writes RAX/XMM0 back at the return slots
//!
//! Only step 2 is architecture-specific.

use crate::abi::{FLOAT_ARG_REGISTERS, INT_ARG_REGISTERS};
use crate::slot::{ArgSlot, TypeTag};
use crate::spec::CallSpec;
use smallvec::SmallVec;

#[cfg(all(target_arch = "x86_64", not(windows)))]
mod sysv;

#[cfg(all(target_arch = "x86_64", not(windows)))]
pub use sysv::SysVTrampoline;

/// The trampoline for the host platform
#[cfg(all(target_arch = "x86_64", not(windows)))]
pub type NativeTrampoline = SysVTrampoline;

/// Executes a bound call specification
pub trait Trampoline: Send + Sync {
    /// Perform the call described by `spec` against `spec.base()`
    ///
    /// # Safety
    /// `spec.target()` must be a function whose signature matches the spec,
    /// and `spec.base()` must point to a live block of at least
    /// `spec.block_size()` bytes laid out like the spec's descriptor.
    unsafe fn invoke(&self, spec: &CallSpec);
}

/// Register and stack values for one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterImage {
    /// RDI, RSI, RDX, RCX, R8, R9
    pub ints: [u64; INT_ARG_REGISTERS],
    /// XMM0-XMM7, low 64 bits
    pub floats: [u64; FLOAT_ARG_REGISTERS],
    /// Outgoing stack arguments, first argument at the lowest address
    pub stack: SmallVec<[u64; 4]>,
    /// Value for AL
    pub float_count: u8,
}

/// Load one slot as a 64-bit register value
///
/// # Safety
/// `base + slot.offset .. + width` must be readable.
#[inline]
pub unsafe fn load_slot(base: *const u8, slot: ArgSlot) -> u64 {
    let p = base.add(slot.offset as usize);
    match slot.tag {
        TypeTag::Word64 | TypeTag::Float64 => p.cast::<u64>().read_unaligned(),
        TypeTag::Signed32 => p.cast::<i32>().read_unaligned() as i64 as u64,
        TypeTag::Unsigned32 | TypeTag::Float32 => p.cast::<u32>().read_unaligned() as u64,
        TypeTag::Signed16 => p.cast::<i16>().read_unaligned() as i64 as u64,
        TypeTag::Unsigned16 => p.cast::<u16>().read_unaligned() as u64,
        TypeTag::Signed8 => p.cast::<i8>().read() as i64 as u64,
        TypeTag::Unsigned8 => p.read() as u64,
        TypeTag::Unused => 0,
    }
}

/// Store the low bytes of a register value into one slot
///
/// # Safety
/// `base + slot.offset .. + width` must be writable.
#[inline]
pub unsafe fn store_slot(base: *mut u8, slot: ArgSlot, value: u64) {
    let p = base.add(slot.offset as usize);
    match slot.tag.width() {
        8 => p.cast::<u64>().write_unaligned(value),
        4 => p.cast::<u32>().write_unaligned(value as u32),
        2 => p.cast::<u16>().write_unaligned(value as u16),
        1 => p.write(value as u8),
        _ => {}
    }
}

/// Build the register image for a bound spec
///
/// # Safety
/// Same contract as [`Trampoline::invoke`].
pub unsafe fn load_registers(spec: &CallSpec) -> RegisterImage {
    let base = spec.base() as *const u8;
    let mut image = RegisterImage {
        float_count: spec.float_count(),
        ..RegisterImage::default()
    };
    for (reg, slot) in image.ints.iter_mut().zip(spec.int_slots()) {
        *reg = load_slot(base, *slot);
    }
    for (reg, slot) in image.floats.iter_mut().zip(spec.float_slots()) {
        *reg = load_slot(base, *slot);
    }
    image.stack.extend(spec.stack_slots().iter().map(|slot| load_slot(base, *slot)));
    image
}

/// Write RAX and XMM0 back into the block, skipping unused return slots
///
/// # Safety
/// Same contract as [`Trampoline::invoke`].
pub unsafe fn store_returns(spec: &CallSpec, rax: u64, xmm0: u64) {
    let base = spec.base() as *mut u8;
    store_slot(base, spec.int_return(), rax);
    store_slot(base, spec.float_return(), xmm0);
}

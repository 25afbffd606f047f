//! Call specifications and the builder that derives them from descriptors
//!
//! A [`CallSpec`] is built once per descriptor shape and reused for every
//! call against that shape. Only the argument block base changes per call,
//! which is why execution takes `&mut CallSpec`: one instance cannot serve
//! two calls at once.

use crate::abi::{Placement, RegisterAllocator, FLOAT_ARG_REGISTERS, INT_ARG_REGISTERS};
use crate::classify::{classify, Classified};
use crate::descriptor::{ArgumentStruct, Descriptor, Field, StaticLayout};
use crate::error::{Result, SpecError};
use crate::logging;
use crate::shape::ShapeKind;
use crate::slot::ArgSlot;
use smallvec::SmallVec;
use std::fmt;

/// Address of a native function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeFn(usize);

impl NativeFn {
    /// Wrap a function pointer, e.g. `my_fn as *const ()`
    #[inline]
    pub fn new(ptr: *const ()) -> Self {
        Self(ptr as usize)
    }

    #[inline]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    #[inline]
    pub const fn addr(self) -> usize {
        self.0
    }

    #[inline]
    pub fn as_ptr(self) -> *const () {
        self.0 as *const ()
    }
}

/// BLAKE3 digest of a descriptor's layout
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of<D: Descriptor + ?Sized>(desc: &D) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(desc.size() as u64).to_le_bytes());
        for field in desc.fields() {
            let (kind, extra) = match field.shape.kind {
                ShapeKind::Integer => (0u8, 0usize),
                ShapeKind::Word => (1, 0),
                ShapeKind::Pointer => (2, 0),
                ShapeKind::Bool => (3, 0),
                ShapeKind::Float => (4, 0),
                ShapeKind::Sequence { data_offset } => (5, data_offset),
                ShapeKind::Aggregate => (6, 0),
                ShapeKind::Variant => (7, 0),
            };
            hasher.update(&[kind, field.shape.signed as u8]);
            hasher.update(&(field.offset as u64).to_le_bytes());
            hasher.update(&(field.shape.size as u64).to_le_bytes());
            hasher.update(&(extra as u64).to_le_bytes());
            hasher.update(field.tag.as_bytes());
            hasher.update(&[0]);
        }
        Self(*hasher.finalize().as_bytes())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint(")?;
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..)")
    }
}

/// Reusable description of one shape of native call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    target: NativeFn,
    base: usize,
    int_slots: [ArgSlot; INT_ARG_REGISTERS],
    float_slots: [ArgSlot; FLOAT_ARG_REGISTERS],
    stack: SmallVec<[ArgSlot; 4]>,
    int_ret: [ArgSlot; 2],
    float_ret: [ArgSlot; 2],
    float_count: u8,
    block_size: usize,
    fingerprint: Fingerprint,
    descriptor: String,
}

impl CallSpec {
    /// Build a spec for calling `target` with blocks shaped like `desc`
    pub fn build<D: Descriptor + ?Sized>(target: NativeFn, desc: &D) -> Result<Self> {
        SpecBuilder::new(target).build(desc)
    }

    /// Build from an argument struct type alone
    pub fn of<D: ArgumentStruct>(target: NativeFn) -> Result<Self> {
        Self::build(target, &StaticLayout::<D>::new())
    }

    #[inline]
    pub fn target(&self) -> NativeFn {
        self.target
    }

    /// Argument block address bound by the most recent call, 0 before any
    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    #[inline]
    pub(crate) fn bind(&mut self, base: usize) {
        self.base = base;
    }

    #[inline]
    pub fn int_slots(&self) -> &[ArgSlot; INT_ARG_REGISTERS] {
        &self.int_slots
    }

    #[inline]
    pub fn float_slots(&self) -> &[ArgSlot; FLOAT_ARG_REGISTERS] {
        &self.float_slots
    }

    #[inline]
    pub fn stack_slots(&self) -> &[ArgSlot] {
        &self.stack
    }

    #[inline]
    pub fn int_return(&self) -> ArgSlot {
        self.int_ret[0]
    }

    #[inline]
    pub fn float_return(&self) -> ArgSlot {
        self.float_ret[0]
    }

    /// Second halves of >64-bit returns; always unused
    #[inline]
    pub fn secondary_returns(&self) -> (ArgSlot, ArgSlot) {
        (self.int_ret[1], self.float_ret[1])
    }

    /// Float registers filled, passed to the callee in AL
    #[inline]
    pub fn float_count(&self) -> u8 {
        self.float_count
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline]
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    #[inline]
    pub fn descriptor_name(&self) -> &str {
        &self.descriptor
    }
}

/// Walks a descriptor and assigns each field to a register or stack slot
#[derive(Debug, Clone)]
pub struct SpecBuilder {
    target: NativeFn,
}

impl SpecBuilder {
    pub fn new(target: NativeFn) -> Self {
        Self { target }
    }

    pub fn build<D: Descriptor + ?Sized>(&self, desc: &D) -> Result<CallSpec> {
        let name = desc.type_name();
        let size = desc.size();

        let mut int_slots = [ArgSlot::UNUSED; INT_ARG_REGISTERS];
        let mut float_slots = [ArgSlot::UNUSED; FLOAT_ARG_REGISTERS];
        let mut stack = SmallVec::new();
        let mut int_ret = [ArgSlot::UNUSED; 2];
        let mut float_ret = [ArgSlot::UNUSED; 2];
        let mut ret_field: Option<&Field> = None;
        let mut regs = RegisterAllocator::new();

        for field in desc.fields() {
            let roles = field.annotations().map_err(|annotation| SpecError::UnknownAnnotation {
                descriptor: name.to_string(),
                field: field.name.to_string(),
                annotation,
            })?;
            if roles.ignore {
                continue;
            }

            let Classified { slot, is_float } = classify(name, field, roles.type_override.as_deref())?;
            if slot.end() > size {
                return Err(SpecError::SlotOutOfBounds {
                    descriptor: name.to_string(),
                    field: field.name.to_string(),
                    offset: slot.offset as usize,
                    end: slot.end(),
                    size,
                });
            }

            if roles.ret {
                if let Some(first) = ret_field {
                    return Err(SpecError::MultipleReturns {
                        descriptor: name.to_string(),
                        first: first.name.to_string(),
                        second: field.name.to_string(),
                    });
                }
                ret_field = Some(field);
                if is_float {
                    float_ret[0] = slot;
                } else {
                    int_ret[0] = slot;
                }
                continue;
            }

            let placement = regs.place(is_float);
            logging::log_field_placed(name, &field.name, placement);
            match placement {
                Placement::IntRegister(i) => int_slots[i] = slot,
                Placement::FloatRegister(i) => float_slots[i] = slot,
                Placement::Stack(_) => stack.push(slot),
            }
        }

        let spec = CallSpec {
            target: self.target,
            base: 0,
            int_slots,
            float_slots,
            stack,
            int_ret,
            float_ret,
            float_count: regs.float_regs_used() as u8,
            block_size: size,
            fingerprint: Fingerprint::of(desc),
            descriptor: name.to_string(),
        };

        logging::log_spec_built(
            name,
            regs.int_regs_used(),
            regs.float_regs_used(),
            regs.stack_used(),
            ret_field.is_some(),
        );
        Ok(spec)
    }
}

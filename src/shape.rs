//! Static field shapes
//!
//! Every field type usable in a descriptor implements [`NativeType`], which
//! exposes its shape as a constant so descriptor tables can be built at
//! compile time.

use core::fmt;
use core::mem::{size_of, ManuallyDrop};
use core::ptr::NonNull;

/// Kind of value stored in a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Fixed-width integer
    Integer,
    /// Pointer-sized integer (`isize`/`usize`)
    Word,
    /// Raw pointer or handle
    Pointer,
    Bool,
    Float,
    /// Pointer/length/capacity triple; only the data pointer is passed
    Sequence { data_offset: usize },
    /// Struct or array stored inline
    Aggregate,
    /// Enum, trait object or other tagged value
    Variant,
}

/// Kind, size and signedness of a field as declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldShape {
    pub kind: ShapeKind,
    pub size: usize,
    pub signed: bool,
}

impl FieldShape {
    #[inline]
    pub const fn new(kind: ShapeKind, size: usize, signed: bool) -> Self {
        Self { kind, size, signed }
    }

    #[inline]
    pub const fn integer(size: usize, signed: bool) -> Self {
        Self::new(ShapeKind::Integer, size, signed)
    }

    #[inline]
    pub const fn float(size: usize) -> Self {
        Self::new(ShapeKind::Float, size, true)
    }

    #[inline]
    pub const fn aggregate(size: usize) -> Self {
        Self::new(ShapeKind::Aggregate, size, false)
    }
}

impl fmt::Display for FieldShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits = self.size * 8;
        match self.kind {
            ShapeKind::Integer if self.signed => write!(f, "i{}", bits),
            ShapeKind::Integer => write!(f, "u{}", bits),
            ShapeKind::Word if self.signed => write!(f, "isize"),
            ShapeKind::Word => write!(f, "usize"),
            ShapeKind::Pointer => write!(f, "pointer"),
            ShapeKind::Bool => write!(f, "bool"),
            ShapeKind::Float => write!(f, "f{}", bits),
            ShapeKind::Sequence { .. } => write!(f, "sequence"),
            ShapeKind::Aggregate => write!(f, "aggregate of {} bytes", self.size),
            ShapeKind::Variant => write!(f, "variant of {} bytes", self.size),
        }
    }
}

/// Types that may appear as descriptor fields
///
/// # Safety
/// `SHAPE` must describe the type's real in-memory representation: a wrong
/// size or kind makes the trampoline read or write the wrong bytes.
pub unsafe trait NativeType {
    const SHAPE: FieldShape;
}

macro_rules! impl_native_integer {
    ($($ty:ty => $signed:expr),* $(,)?) => {
        $(
            unsafe impl NativeType for $ty {
                const SHAPE: FieldShape = FieldShape::integer(size_of::<$ty>(), $signed);
            }
        )*
    };
}

impl_native_integer! {
    i8 => true,
    i16 => true,
    i32 => true,
    i64 => true,
    i128 => true,
    u8 => false,
    u16 => false,
    u32 => false,
    u64 => false,
    u128 => false,
}

unsafe impl NativeType for isize {
    const SHAPE: FieldShape = FieldShape::new(ShapeKind::Word, size_of::<isize>(), true);
}

unsafe impl NativeType for usize {
    const SHAPE: FieldShape = FieldShape::new(ShapeKind::Word, size_of::<usize>(), false);
}

unsafe impl NativeType for bool {
    const SHAPE: FieldShape = FieldShape::new(ShapeKind::Bool, 1, false);
}

unsafe impl NativeType for f32 {
    const SHAPE: FieldShape = FieldShape::float(4);
}

unsafe impl NativeType for f64 {
    const SHAPE: FieldShape = FieldShape::float(8);
}

unsafe impl<T> NativeType for *const T {
    const SHAPE: FieldShape = FieldShape::new(ShapeKind::Pointer, size_of::<*const T>(), false);
}

unsafe impl<T> NativeType for *mut T {
    const SHAPE: FieldShape = FieldShape::new(ShapeKind::Pointer, size_of::<*mut T>(), false);
}

unsafe impl<T> NativeType for NonNull<T> {
    const SHAPE: FieldShape = FieldShape::new(ShapeKind::Pointer, size_of::<NonNull<T>>(), false);
}

// Niche-optimized to a nullable pointer
unsafe impl<T> NativeType for Option<NonNull<T>> {
    const SHAPE: FieldShape =
        FieldShape::new(ShapeKind::Pointer, size_of::<Option<NonNull<T>>>(), false);
}

unsafe impl<T> NativeType for Sequence<T> {
    const SHAPE: FieldShape = FieldShape::new(
        ShapeKind::Sequence {
            data_offset: core::mem::offset_of!(Sequence<u8>, ptr),
        },
        size_of::<Sequence<T>>(),
        false,
    );
}

unsafe impl<T: NativeType, const N: usize> NativeType for [T; N] {
    const SHAPE: FieldShape = FieldShape::aggregate(size_of::<[T; N]>());
}

/// Owned growable buffer with a stable `#[repr(C)]` header
///
/// Native code receives only the data pointer. Pass the length as a separate
/// field when the callee needs it.
#[repr(C)]
pub struct Sequence<T> {
    ptr: *mut T,
    len: usize,
    cap: usize,
}

impl<T> Sequence<T> {
    pub fn new() -> Self {
        Vec::new().into()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: ptr/len come from a live Vec owned by self
        unsafe { core::slice::from_raw_parts(self.ptr, self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as in as_slice; &mut self makes the borrow unique
        unsafe { core::slice::from_raw_parts_mut(self.ptr, self.len) }
    }

    pub fn into_vec(self) -> Vec<T> {
        let this = ManuallyDrop::new(self);
        // SAFETY: the parts were taken from a Vec in `From<Vec<T>>`
        unsafe { Vec::from_raw_parts(this.ptr, this.len, this.cap) }
    }
}

impl<T> From<Vec<T>> for Sequence<T> {
    fn from(vec: Vec<T>) -> Self {
        let mut vec = ManuallyDrop::new(vec);
        Self {
            ptr: vec.as_mut_ptr(),
            len: vec.len(),
            cap: vec.capacity(),
        }
    }
}

impl<T> Default for Sequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for Sequence<T> {
    fn clone(&self) -> Self {
        self.as_slice().to_vec().into()
    }
}

impl<T: fmt::Debug> fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T> Drop for Sequence<T> {
    fn drop(&mut self) {
        // SAFETY: ptr/len/cap were taken from a Vec and ownership was never
        // handed back, so this rebuilds and frees it exactly once
        unsafe {
            drop(Vec::from_raw_parts(self.ptr, self.len, self.cap));
        }
    }
}

unsafe impl<T: Send> Send for Sequence<T> {}
unsafe impl<T: Sync> Sync for Sequence<T> {}

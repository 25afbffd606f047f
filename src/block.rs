//! Untyped argument blocks for runtime-described layouts
//!
//! Storage is a heap slice of 8-byte words, so the bytes stay put when the
//! `ArgBlock` value itself moves. During a call the executor holds it by
//! `&mut`, which keeps it alive and unaliased until the trampoline returns.

use crate::descriptor::Descriptor;
use crate::error::BlockError;
use core::mem::size_of;
use core::ptr::NonNull;

/// Zero-initialized, 8-byte aligned byte arena
pub struct ArgBlock {
    words: Box<[u64]>,
    len: usize,
}

impl ArgBlock {
    pub fn new(len: usize) -> Self {
        let words = vec![0u64; len.div_ceil(8)].into_boxed_slice();
        Self { words, len }
    }

    /// Block sized for `desc`
    pub fn for_descriptor<D: Descriptor + ?Sized>(desc: &D) -> Self {
        Self::new(desc.size())
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
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: words covers at least len initialized bytes
        unsafe { core::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast::<u8>(), self.len) }
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> NonNull<u8> {
        // Box<[u64]> is never null, even when empty
        NonNull::from(&mut *self.words).cast::<u8>()
    }

    fn check(&self, offset: usize, width: usize) -> Result<(), BlockError> {
        match offset.checked_add(width) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(BlockError {
                offset,
                width,
                len: self.len,
            }),
        }
    }

    /// Read a scalar at `offset`
    pub fn get<T: Scalar>(&self, offset: usize) -> Result<T, BlockError> {
        self.check(offset, size_of::<T>())?;
        // SAFETY: bounds checked above; Scalar types accept any bit pattern
        // they were written with, and the read tolerates misalignment
        Ok(unsafe { self.as_bytes().as_ptr().add(offset).cast::<T>().read_unaligned() })
    }

    /// Write a scalar at `offset`
    pub fn set<T: Scalar>(&mut self, offset: usize, value: T) -> Result<(), BlockError> {
        self.check(offset, size_of::<T>())?;
        unsafe {
            self.as_bytes_mut()
                .as_mut_ptr()
                .add(offset)
                .cast::<T>()
                .write_unaligned(value);
        }
        Ok(())
    }

    /// Read a one-byte flag; any nonzero byte is `true`
    ///
    /// Native code may leave bytes other than 0 and 1 behind, so flags never
    /// go through [`get`](Self::get).
    pub fn get_bool(&self, offset: usize) -> Result<bool, BlockError> {
        Ok(self.get::<u8>(offset)? != 0)
    }

    pub fn set_bool(&mut self, offset: usize, value: bool) -> Result<(), BlockError> {
        self.set(offset, value as u8)
    }

    /// Zero every byte
    pub fn clear(&mut self) {
        self.words.fill(0);
    }
}

impl core::fmt::Debug for ArgBlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ArgBlock")
            .field("len", &self.len)
            .field("bytes", &self.as_bytes())
            .finish()
    }
}

/// Plain values that may be copied in and out of an [`ArgBlock`]
///
/// # Safety
/// Every bit pattern of `size_of::<Self>()` bytes must be a valid value.
/// `bool` is not one; use [`ArgBlock::get_bool`] and [`ArgBlock::set_bool`].
pub unsafe trait Scalar: Copy {}

macro_rules! impl_scalar {
    ($($ty:ty),*) => { $( unsafe impl Scalar for $ty {} )* };
}

impl_scalar!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize, f32, f64);

unsafe impl<T> Scalar for *const T {}
unsafe impl<T> Scalar for *mut T {}

//! x86-64 System V call stub
//!
//! Args in: RDI, RSI, RDX, RCX, R8, R9, XMM0-XMM7, then stack.
//! AL holds the number of XMM registers used.
//! Return in: RAX (int) or XMM0 (float).

use super::{load_registers, store_returns, RegisterImage, Trampoline};
use crate::spec::CallSpec;

/// Trampoline for x86-64 System V targets
#[derive(Debug, Clone, Copy, Default)]
pub struct SysVTrampoline;

impl Trampoline for SysVTrampoline {
    #[inline]
    unsafe fn invoke(&self, spec: &CallSpec) {
        let image = load_registers(spec);
        let (rax, xmm0) = call_with_image(spec.target().addr(), &image);
        store_returns(spec, rax, xmm0);
    }
}

/// Move `image` into argument registers and the outgoing stack, then call
///
/// Stack arguments are pushed last-first so the first lands at the lowest
/// address; an odd count gets one padding word so RSP is 16-byte aligned at
/// the call. R12-R15 are callee-saved, so they still hold the image pointers
/// and the stack count when the callee returns.
#[inline(never)]
unsafe fn call_with_image(target: usize, image: &RegisterImage) -> (u64, u64) {
    let rax: u64;
    let xmm0: f64;

    core::arch::asm!(
        "mov r11, r15",
        "test r15, 1",
        "jz 2f",
        "sub rsp, 8",
        "2:",
        "test r11, r11",
        "jz 4f",
        "3:",
        "push qword ptr [r14 + r11*8 - 8]",
        "dec r11",
        "jnz 3b",
        "4:",
        "movsd xmm0, qword ptr [r13]",
        "movsd xmm1, qword ptr [r13 + 8]",
        "movsd xmm2, qword ptr [r13 + 16]",
        "movsd xmm3, qword ptr [r13 + 24]",
        "movsd xmm4, qword ptr [r13 + 32]",
        "movsd xmm5, qword ptr [r13 + 40]",
        "movsd xmm6, qword ptr [r13 + 48]",
        "movsd xmm7, qword ptr [r13 + 56]",
        "mov rdi, qword ptr [r12]",
        "mov rsi, qword ptr [r12 + 8]",
        "mov rdx, qword ptr [r12 + 16]",
        "mov rcx, qword ptr [r12 + 24]",
        "mov r8, qword ptr [r12 + 32]",
        "mov r9, qword ptr [r12 + 40]",
        "call r10",
        "lea rsp, [rsp + r15*8]",
        "test r15, 1",
        "jz 5f",
        "add rsp, 8",
        "5:",
        in("r10") target,
        in("r12") image.ints.as_ptr(),
        in("r13") image.floats.as_ptr(),
        in("r14") image.stack.as_ptr(),
        in("r15") image.stack.len(),
        inout("rax") image.float_count as u64 => rax,
        lateout("xmm0") xmm0,
        clobber_abi("C"),
    );

    (rax, xmm0.to_bits())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[allow(clippy::too_many_arguments)]
    extern "C" fn sum_nine(a: i64, b: i64, c: i64, d: i64, e: i64, f: i64, g: i64, h: i64, i: i64) -> i64 {
        a + 2 * b + 3 * c + 4 * d + 5 * e + 6 * f + 7 * g + 8 * h + 9 * i
    }

    #[allow(clippy::too_many_arguments)]
    extern "C" fn sum_eight(a: i64, b: i64, c: i64, d: i64, e: i64, f: i64, g: i64, h: i64) -> i64 {
        a + b + c + d + e + f + 7 * g + 8 * h
    }

    extern "C" fn scale(x: f64, y: f32) -> f64 {
        x * y as f64
    }

    #[test]
    fn stack_arguments_keep_order() {
        let image = RegisterImage {
            ints: [1, 1, 1, 1, 1, 1],
            stack: smallvec![10, 100, 1000],
            ..RegisterImage::default()
        };
        let (rax, _) = unsafe { call_with_image(sum_nine as *const () as usize, &image) };
        assert_eq!(rax as i64, 21 + 70 + 800 + 9000);
    }

    #[test]
    fn even_stack_count_stays_aligned() {
        let image = RegisterImage {
            ints: [0; 6],
            stack: smallvec![3, 4],
            ..RegisterImage::default()
        };
        // Calling twice checks RSP was restored by the first call
        for _ in 0..2 {
            let (rax, _) = unsafe { call_with_image(sum_eight as *const () as usize, &image) };
            assert_eq!(rax as i64, 7 * 3 + 8 * 4);
        }
    }

    #[test]
    fn float_registers_and_return() {
        let mut image = RegisterImage {
            float_count: 2,
            ..RegisterImage::default()
        };
        image.floats[0] = 3.0f64.to_bits();
        image.floats[1] = 0.5f32.to_bits() as u64;
        let (_, xmm0) = unsafe { call_with_image(scale as *const () as usize, &image) };
        assert_eq!(f64::from_bits(xmm0), 1.5);
    }
}

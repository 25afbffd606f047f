//! x86-64 System V argument passing
//!
//! Integer arguments: RDI, RSI, RDX, RCX, R8, R9, then stack.
//! Float arguments: XMM0-XMM7, then stack.
//! Return in RAX (int) or XMM0 (float); AL carries the SSE count for varargs.

use std::fmt;

/// Integer/pointer argument registers
pub const INT_ARG_REGISTERS: usize = 6;

/// SSE argument registers
pub const FLOAT_ARG_REGISTERS: usize = 8;

/// Register names in assignment order, for diagnostics
pub const INT_REGISTER_NAMES: [&str; INT_ARG_REGISTERS] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];
pub const FLOAT_REGISTER_NAMES: [&str; FLOAT_ARG_REGISTERS] =
    ["xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7"];

/// Where one argument ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    IntRegister(usize),
    FloatRegister(usize),
    Stack(usize),
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::IntRegister(i) => f.write_str(INT_REGISTER_NAMES[i]),
            Self::FloatRegister(i) => f.write_str(FLOAT_REGISTER_NAMES[i]),
            Self::Stack(i) => write!(f, "stack[{}]", i),
        }
    }
}

/// Greedy per-class register assignment in declaration order
#[derive(Debug, Clone, Default)]
pub struct RegisterAllocator {
    int_regs_used: usize,
    float_regs_used: usize,
    stack_used: usize,
}

impl RegisterAllocator {
    #[inline]
    pub const fn new() -> Self {
        Self {
            int_regs_used: 0,
            float_regs_used: 0,
            stack_used: 0,
        }
    }

    /// Place the next argument of the given class
    #[inline]
    pub fn place(&mut self, is_float: bool) -> Placement {
        if is_float && self.float_regs_used < FLOAT_ARG_REGISTERS {
            self.float_regs_used += 1;
            Placement::FloatRegister(self.float_regs_used - 1)
        } else if !is_float && self.int_regs_used < INT_ARG_REGISTERS {
            self.int_regs_used += 1;
            Placement::IntRegister(self.int_regs_used - 1)
        } else {
            self.stack_used += 1;
            Placement::Stack(self.stack_used - 1)
        }
    }

    #[inline]
    pub fn int_regs_used(&self) -> usize {
        self.int_regs_used
    }

    #[inline]
    pub fn float_regs_used(&self) -> usize {
        self.float_regs_used
    }

    #[inline]
    pub fn stack_used(&self) -> usize {
        self.stack_used
    }

    /// Reset for a new descriptor
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

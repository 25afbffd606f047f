//! Argument slots - where one value lives and how to load it
//!
//! Layout is shared with the trampoline, so both types are `#[repr(C)]`
//! with fixed-width fields.

/// How a slot's bytes become a register value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TypeTag {
    /// movq, 64 bit
    Word64 = 0,
    /// movsx, signed 32 bit
    Signed32 = 1,
    /// zero-extended 32 bit
    Unsigned32 = 2,
    Signed16 = 3,
    Unsigned16 = 4,
    Signed8 = 5,
    Unsigned8 = 6,
    /// movsd
    Float64 = 7,
    /// movss
    Float32 = 8,
    /// No value occupies the physical slot
    Unused = 0xFFFF,
}

impl TypeTag {
    /// Bytes read from (or written to) the argument block
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Self::Word64 | Self::Float64 => 8,
            Self::Signed32 | Self::Unsigned32 | Self::Float32 => 4,
            Self::Signed16 | Self::Unsigned16 => 2,
            Self::Signed8 | Self::Unsigned8 => 1,
            Self::Unused => 0,
        }
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float64 | Self::Float32)
    }

    #[inline]
    pub const fn is_unused(self) -> bool {
        matches!(self, Self::Unused)
    }

    /// Resolve an explicit `type=NAME` override
    pub fn from_override(name: &str) -> Option<Self> {
        let tag = match name.trim() {
            "int64" | "i64" | "uint64" | "u64" | "int" | "uint" | "uintptr" | "pointer" | "word" => {
                Self::Word64
            }
            "int32" | "i32" => Self::Signed32,
            "uint32" | "u32" => Self::Unsigned32,
            "int16" | "i16" => Self::Signed16,
            "uint16" | "u16" => Self::Unsigned16,
            "int8" | "i8" => Self::Signed8,
            "uint8" | "u8" | "bool" => Self::Unsigned8,
            "float32" | "f32" | "float" => Self::Float32,
            "float64" | "f64" | "double" => Self::Float64,
            _ => return None,
        };
        Some(tag)
    }
}

/// A classified location in the argument block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct ArgSlot {
    pub offset: u16,
    pub tag: TypeTag,
}

impl ArgSlot {
    pub const UNUSED: Self = Self {
        offset: 0,
        tag: TypeTag::Unused,
    };

    #[inline]
    pub const fn new(offset: u16, tag: TypeTag) -> Self {
        Self { offset, tag }
    }

    #[inline]
    pub const fn is_unused(&self) -> bool {
        self.tag.is_unused()
    }

    /// First byte past the slot
    #[inline]
    pub const fn end(&self) -> usize {
        self.offset as usize + self.tag.width()
    }
}

impl Default for ArgSlot {
    #[inline]
    fn default() -> Self {
        Self::UNUSED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_encoding_is_stable() {
        assert_eq!(TypeTag::Word64 as u16, 0);
        assert_eq!(TypeTag::Unsigned8 as u16, 6);
        assert_eq!(TypeTag::Float32 as u16, 8);
        assert_eq!(TypeTag::Unused as u16, 0xFFFF);
        assert_eq!(core::mem::size_of::<ArgSlot>(), 4);
    }

    #[test]
    fn unused_differs_from_every_real_tag() {
        let real = [
            TypeTag::Word64,
            TypeTag::Signed32,
            TypeTag::Unsigned32,
            TypeTag::Signed16,
            TypeTag::Unsigned16,
            TypeTag::Signed8,
            TypeTag::Unsigned8,
            TypeTag::Float64,
            TypeTag::Float32,
        ];
        for tag in real {
            assert!(!tag.is_unused());
            assert!(tag.width() > 0);
        }
        assert_eq!(TypeTag::Unused.width(), 0);
    }

    #[test]
    fn override_names() {
        assert_eq!(TypeTag::from_override("int32"), Some(TypeTag::Signed32));
        assert_eq!(TypeTag::from_override("u16"), Some(TypeTag::Unsigned16));
        assert_eq!(TypeTag::from_override("double"), Some(TypeTag::Float64));
        assert_eq!(TypeTag::from_override("pointer"), Some(TypeTag::Word64));
        assert_eq!(TypeTag::from_override("complex128"), None);
    }

    #[test]
    fn slot_end() {
        assert_eq!(ArgSlot::new(8, TypeTag::Signed32).end(), 12);
        assert_eq!(ArgSlot::default(), ArgSlot::UNUSED);
    }
}

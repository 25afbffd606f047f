//! Field classifier - maps one field's static shape to an argument slot

use crate::descriptor::Field;
use crate::error::{Result, SpecError};
use crate::shape::{FieldShape, ShapeKind};
use crate::slot::{ArgSlot, TypeTag};

/// Classification result for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified {
    pub slot: ArgSlot,
    /// Passed in an SSE register rather than a general-purpose one
    pub is_float: bool,
}

/// Natural tag and extra byte offset for a shape, `None` if unsupported
fn natural_tag(shape: &FieldShape) -> Option<(TypeTag, usize)> {
    let tag = match (shape.kind, shape.size, shape.signed) {
        (ShapeKind::Integer | ShapeKind::Word, 8, _) => TypeTag::Word64,
        (ShapeKind::Integer, 4, true) => TypeTag::Signed32,
        (ShapeKind::Integer, 4, false) => TypeTag::Unsigned32,
        (ShapeKind::Integer, 2, true) => TypeTag::Signed16,
        (ShapeKind::Integer, 2, false) => TypeTag::Unsigned16,
        (ShapeKind::Integer, 1, true) => TypeTag::Signed8,
        (ShapeKind::Integer, 1, false) => TypeTag::Unsigned8,
        (ShapeKind::Pointer, 8, _) => TypeTag::Word64,
        (ShapeKind::Bool, 1, _) => TypeTag::Unsigned8,
        (ShapeKind::Float, 8, _) => TypeTag::Float64,
        (ShapeKind::Float, 4, _) => TypeTag::Float32,
        (ShapeKind::Sequence { data_offset }, _, _) => return Some((TypeTag::Word64, data_offset)),
        _ => return None,
    };
    Some((tag, 0))
}

/// Classify `field` of `descriptor`, honoring an explicit type override
pub fn classify(descriptor: &str, field: &Field, type_override: Option<&str>) -> Result<Classified> {
    let (natural, extra) = natural_tag(&field.shape).ok_or_else(|| SpecError::UnsupportedShape {
        descriptor: descriptor.to_string(),
        field: field.name.to_string(),
        shape: field.shape.to_string(),
    })?;

    let tag = match type_override {
        None => natural,
        Some(name) => {
            let tag = TypeTag::from_override(name).ok_or_else(|| SpecError::UnknownTypeOverride {
                descriptor: descriptor.to_string(),
                field: field.name.to_string(),
                name: name.to_string(),
            })?;
            let available = natural.width();
            if tag.width() > available {
                return Err(SpecError::OverrideTooWide {
                    descriptor: descriptor.to_string(),
                    field: field.name.to_string(),
                    name: name.to_string(),
                    needed: tag.width(),
                    available,
                });
            }
            tag
        }
    };

    let offset = field.offset + extra;
    let offset = u16::try_from(offset).map_err(|_| SpecError::OffsetOverflow {
        descriptor: descriptor.to_string(),
        field: field.name.to_string(),
        offset,
    })?;

    Ok(Classified {
        slot: ArgSlot::new(offset, tag),
        is_float: tag.is_float(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{NativeType, Sequence};
    use core::ptr::NonNull;

    fn field_of<T: NativeType>(offset: usize) -> Field {
        Field::new("f", offset, T::SHAPE, "")
    }

    fn tag_of<T: NativeType>() -> (TypeTag, bool) {
        let c = classify("D", &field_of::<T>(16), None).unwrap();
        assert_eq!(c.slot.offset, 16);
        (c.slot.tag, c.is_float)
    }

    #[test]
    fn integers_keep_width_and_sign() {
        assert_eq!(tag_of::<i8>(), (TypeTag::Signed8, false));
        assert_eq!(tag_of::<u8>(), (TypeTag::Unsigned8, false));
        assert_eq!(tag_of::<i16>(), (TypeTag::Signed16, false));
        assert_eq!(tag_of::<u16>(), (TypeTag::Unsigned16, false));
        assert_eq!(tag_of::<i32>(), (TypeTag::Signed32, false));
        assert_eq!(tag_of::<u32>(), (TypeTag::Unsigned32, false));
    }

    #[test]
    fn word_sized_values_are_word64() {
        assert_eq!(tag_of::<i64>(), (TypeTag::Word64, false));
        assert_eq!(tag_of::<u64>(), (TypeTag::Word64, false));
        assert_eq!(tag_of::<isize>(), (TypeTag::Word64, false));
        assert_eq!(tag_of::<usize>(), (TypeTag::Word64, false));
        assert_eq!(tag_of::<*const u8>(), (TypeTag::Word64, false));
        assert_eq!(tag_of::<*mut f64>(), (TypeTag::Word64, false));
        assert_eq!(tag_of::<NonNull<u32>>(), (TypeTag::Word64, false));
        assert_eq!(tag_of::<Option<NonNull<u32>>>(), (TypeTag::Word64, false));
    }

    #[test]
    fn bool_is_unsigned8() {
        assert_eq!(tag_of::<bool>(), (TypeTag::Unsigned8, false));
    }

    #[test]
    fn floats_set_the_float_flag() {
        assert_eq!(tag_of::<f32>(), (TypeTag::Float32, true));
        assert_eq!(tag_of::<f64>(), (TypeTag::Float64, true));
    }

    #[test]
    fn sequence_passes_data_pointer_only() {
        let c = classify("D", &field_of::<Sequence<u8>>(24), None).unwrap();
        assert_eq!(c.slot, ArgSlot::new(24, TypeTag::Word64));
        assert!(!c.is_float);
    }

    #[test]
    fn wide_and_aggregate_shapes_fail() {
        for field in [
            field_of::<i128>(0),
            field_of::<u128>(0),
            field_of::<[u8; 4]>(0),
            Field::new("v", 0, FieldShape::new(ShapeKind::Variant, 16, false), ""),
        ] {
            let err = classify("D", &field, None).unwrap_err();
            assert!(matches!(err, SpecError::UnsupportedShape { .. }), "{:?}", err);
        }
    }

    #[test]
    fn override_narrows_a_handle() {
        let c = classify("D", &field_of::<usize>(8), Some("int32")).unwrap();
        assert_eq!(c.slot, ArgSlot::new(8, TypeTag::Signed32));

        let c = classify("D", &field_of::<u64>(8), Some("double")).unwrap();
        assert!(c.is_float);
    }

    #[test]
    fn override_errors() {
        let err = classify("D", &field_of::<u16>(0), Some("int32")).unwrap_err();
        assert!(matches!(err, SpecError::OverrideTooWide { needed: 4, available: 2, .. }));

        let err = classify("D", &field_of::<u64>(0), Some("quad")).unwrap_err();
        assert!(matches!(err, SpecError::UnknownTypeOverride { .. }));

        let err = classify("D", &field_of::<i128>(0), Some("int64")).unwrap_err();
        assert!(matches!(err, SpecError::UnsupportedShape { .. }));
    }

    #[test]
    fn offset_must_fit_sixteen_bits() {
        let err = classify("D", &field_of::<u8>(70_000), None).unwrap_err();
        assert!(matches!(err, SpecError::OffsetOverflow { offset: 70_000, .. }));
    }
}

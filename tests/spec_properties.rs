//! Spec construction properties over generated layouts

use fastffi::{
    descriptor, CallSpec, DynamicDescriptor, FieldShape, NativeFn, SpecError, StaticLayout, TypeTag,
};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Kind {
    Int(usize, bool),
    Float(usize),
}

fn kind_strategy() -> impl Strategy<Value = Kind> {
    prop_oneof![
        (prop::sample::select(vec![1usize, 2, 4, 8]), any::<bool>()).prop_map(|(size, signed)| Kind::Int(size, signed)),
        prop::sample::select(vec![4usize, 8]).prop_map(Kind::Float),
    ]
}

/// Lay fields out one per 8-byte cell
fn layout(kinds: &[Kind]) -> DynamicDescriptor {
    let mut desc = DynamicDescriptor::new("Generated", kinds.len() * 8);
    for (i, kind) in kinds.iter().enumerate() {
        let shape = match *kind {
            Kind::Int(size, signed) => FieldShape::integer(size, signed),
            Kind::Float(size) => FieldShape::float(size),
        };
        desc = desc.field(format!("f{i}"), i * 8, shape, "");
    }
    desc
}

fn target() -> NativeFn {
    NativeFn::from_addr(0x1000)
}

proptest! {
    #[test]
    fn prop_build_is_deterministic(kinds in prop::collection::vec(kind_strategy(), 0..24)) {
        let desc = layout(&kinds);
        let a = CallSpec::build(target(), &desc).unwrap();
        let b = CallSpec::build(target(), &desc).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_assignment_follows_declaration_order(kinds in prop::collection::vec(kind_strategy(), 0..24)) {
        let spec = CallSpec::build(target(), &layout(&kinds)).unwrap();

        let mut ints = Vec::new();
        let mut floats = Vec::new();
        let mut overflow = Vec::new();
        for (i, kind) in kinds.iter().enumerate() {
            let offset = (i * 8) as u16;
            match kind {
                Kind::Int(..) if ints.len() < 6 => ints.push(offset),
                Kind::Float(_) if floats.len() < 8 => floats.push(offset),
                _ => overflow.push(offset),
            }
        }

        let used_ints: Vec<u16> = spec.int_slots().iter().filter(|s| !s.is_unused()).map(|s| s.offset).collect();
        let used_floats: Vec<u16> = spec.float_slots().iter().filter(|s| !s.is_unused()).map(|s| s.offset).collect();
        let stack: Vec<u16> = spec.stack_slots().iter().map(|s| s.offset).collect();

        prop_assert_eq!(&used_ints, &ints);
        prop_assert_eq!(&used_floats, &floats);
        prop_assert_eq!(&stack, &overflow);
        prop_assert_eq!(spec.float_count() as usize, floats.len());

        // Registers fill without gaps
        let first_unused = spec.int_slots().iter().position(|s| s.is_unused()).unwrap_or(6);
        prop_assert!(spec.int_slots()[first_unused..].iter().all(|s| s.is_unused()));
    }

    #[test]
    fn prop_fewer_than_register_count_never_spills(ints in 0usize..=6, floats in 0usize..=8) {
        let kinds: Vec<Kind> = std::iter::repeat(Kind::Int(8, true))
            .take(ints)
            .chain(std::iter::repeat(Kind::Float(8)).take(floats))
            .collect();
        let spec = CallSpec::build(target(), &layout(&kinds)).unwrap();
        prop_assert!(spec.stack_slots().is_empty());
    }

    #[test]
    fn prop_return_field_is_excluded_from_arguments(kinds in prop::collection::vec(kind_strategy(), 1..16), pick in any::<prop::sample::Index>()) {
        let ret = pick.index(kinds.len());
        let mut desc = DynamicDescriptor::new("Generated", kinds.len() * 8);
        for (i, kind) in kinds.iter().enumerate() {
            let shape = match *kind {
                Kind::Int(size, signed) => FieldShape::integer(size, signed),
                Kind::Float(size) => FieldShape::float(size),
            };
            desc = desc.field(format!("f{i}"), i * 8, shape, if i == ret { "ret" } else { "" });
        }

        let spec = CallSpec::build(target(), &desc).unwrap();
        let offset = (ret * 8) as u16;
        let placed = spec
            .int_slots()
            .iter()
            .chain(spec.float_slots())
            .chain(spec.stack_slots())
            .filter(|s| !s.is_unused())
            .count();

        prop_assert_eq!(placed, kinds.len() - 1);
        match kinds[ret] {
            Kind::Int(..) => {
                prop_assert_eq!(spec.int_return().offset, offset);
                prop_assert!(spec.float_return().is_unused());
            }
            Kind::Float(_) => {
                prop_assert_eq!(spec.float_return().offset, offset);
                prop_assert!(spec.int_return().is_unused());
            }
        }
        let (second_int, second_float) = spec.secondary_returns();
        prop_assert!(second_int.is_unused() && second_float.is_unused());
    }
}

descriptor! {
    #[allow(dead_code)]
    struct TwoReturns {
        a: i64,
        #[ffi("ret")]
        first: i64,
        #[ffi("return")]
        second: f64,
    }
}

descriptor! {
    #[allow(dead_code)]
    struct WideField {
        a: i64,
        big: i128,
    }
}

descriptor! {
    #[allow(dead_code)]
    struct ArrayField {
        lanes: [f32; 4],
    }
}

descriptor! {
    #[allow(dead_code)]
    struct Overrides {
        #[ffi("type=int32")]
        narrowed: i64,
        #[ffi("type=bool")]
        flag: u8,
        #[ffi("ignore")]
        wide_scratch: i128,
    }
}

descriptor! {
    #[allow(dead_code)]
    struct TooWide {
        #[ffi("type=int64")]
        small: i32,
    }
}

#[test]
fn test_two_returns_fail() {
    let err = CallSpec::of::<TwoReturns>(target()).unwrap_err();
    assert_eq!(
        err,
        SpecError::MultipleReturns {
            descriptor: "TwoReturns".to_string(),
            first: "first".to_string(),
            second: "second".to_string(),
        }
    );
}

#[test]
fn test_wide_integer_field_fails() {
    let err = CallSpec::of::<WideField>(target()).unwrap_err();
    match err {
        SpecError::UnsupportedShape { field, .. } => assert_eq!(field, "big"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_aggregate_field_fails() {
    let err = CallSpec::of::<ArrayField>(target()).unwrap_err();
    assert!(matches!(err, SpecError::UnsupportedShape { .. }));
    assert!(err.to_string().contains("lanes"));
}

#[test]
fn test_overrides_and_ignored_fields() {
    let spec = CallSpec::build(target(), &StaticLayout::<Overrides>::new()).unwrap();
    assert_eq!(spec.int_slots()[0].tag, TypeTag::Signed32);
    assert_eq!(spec.int_slots()[1].tag, TypeTag::Unsigned8);
    assert!(spec.int_slots()[2].is_unused());
    assert!(spec.stack_slots().is_empty());
}

#[test]
fn test_override_wider_than_field_fails() {
    let err = CallSpec::of::<TooWide>(target()).unwrap_err();
    assert!(matches!(
        err,
        SpecError::OverrideTooWide {
            needed: 8,
            available: 4,
            ..
        }
    ));
}

#[test]
fn test_unknown_override_fails() {
    let desc = DynamicDescriptor::new("D", 8).field("x", 0, FieldShape::integer(8, true), "type=quad");
    let err = CallSpec::build(target(), &desc).unwrap_err();
    assert!(matches!(err, SpecError::UnknownTypeOverride { ref name, .. } if name == "quad"));
}

#[test]
fn test_offset_beyond_u16_fails() {
    let desc = DynamicDescriptor::new("Huge", 70_000).field("x", 69_000, FieldShape::integer(4, true), "");
    let err = CallSpec::build(target(), &desc).unwrap_err();
    assert!(matches!(err, SpecError::OffsetOverflow { offset: 69_000, .. }));
}

#[test]
fn test_fingerprint_ignores_field_names() {
    let a = DynamicDescriptor::new("A", 16)
        .field("x", 0, FieldShape::integer(8, true), "")
        .field("y", 8, FieldShape::float(8), "ret");
    let b = DynamicDescriptor::new("B", 16)
        .field("left", 0, FieldShape::integer(8, true), "")
        .field("right", 8, FieldShape::float(8), "ret");
    let c = DynamicDescriptor::new("C", 16)
        .field("x", 0, FieldShape::integer(8, true), "")
        .field("y", 8, FieldShape::float(8), "");

    let fa = CallSpec::build(target(), &a).unwrap().fingerprint();
    assert_eq!(fa, CallSpec::build(target(), &b).unwrap().fingerprint());
    assert_ne!(fa, CallSpec::build(target(), &c).unwrap().fingerprint());
}

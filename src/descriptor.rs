//! Descriptor introspection - ordered field tables with shape, offset and tags
//!
//! Two sources feed the spec builder:
//! - [`descriptor!`](crate::descriptor) generates a compile-time table for a
//!   `#[repr(C)]` struct whose values are themselves argument blocks
//! - [`DynamicDescriptor`] describes a layout assembled at runtime, paired
//!   with an [`ArgBlock`](crate::ArgBlock)

use crate::shape::FieldShape;
use core::marker::PhantomData;
use std::borrow::Cow;

/// One field of a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: Cow<'static, str>,
    /// Byte offset from the start of the argument block
    pub offset: usize,
    pub shape: FieldShape,
    /// Raw annotation string, e.g. `"ret,type=int32"`
    pub tag: Cow<'static, str>,
}

impl Field {
    pub const fn new(
        name: &'static str,
        offset: usize,
        shape: FieldShape,
        tag: &'static str,
    ) -> Self {
        Self {
            name: Cow::Borrowed(name),
            offset,
            shape,
            tag: Cow::Borrowed(tag),
        }
    }

    pub fn annotations(&self) -> Result<Annotations, String> {
        Annotations::parse(&self.tag)
    }
}

/// Parsed field roles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    /// Skip the field entirely
    pub ignore: bool,
    /// Field receives the native return value
    pub ret: bool,
    /// Explicit `type=NAME` override
    pub type_override: Option<String>,
}

impl Annotations {
    /// Parse a comma-separated tag list
    ///
    /// Returns the offending word when an annotation is not recognized.
    pub fn parse(tag: &str) -> Result<Self, String> {
        let mut out = Self::default();
        for word in tag.split(',').map(str::trim).filter(|w| !w.is_empty()) {
            match word {
                "ignore" => out.ignore = true,
                "ret" | "return" => out.ret = true,
                _ => match word.strip_prefix("type=") {
                    Some(name) if !name.trim().is_empty() => {
                        out.type_override = Some(name.trim().to_string());
                    }
                    _ => return Err(word.to_string()),
                },
            }
        }
        Ok(out)
    }
}

/// Introspection facility consumed by the spec builder
pub trait Descriptor {
    fn type_name(&self) -> &str;

    /// Size in bytes of the argument block this descriptor lays out
    fn size(&self) -> usize;

    /// Fields in declaration order
    fn fields(&self) -> &[Field];
}

impl<D: Descriptor + ?Sized> Descriptor for &D {
    fn type_name(&self) -> &str {
        (**self).type_name()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn fields(&self) -> &[Field] {
        (**self).fields()
    }
}

impl<D: Descriptor + ?Sized> Descriptor for &mut D {
    fn type_name(&self) -> &str {
        (**self).type_name()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn fields(&self) -> &[Field] {
        (**self).fields()
    }
}

impl<D: Descriptor + ?Sized> Descriptor for Box<D> {
    fn type_name(&self) -> &str {
        (**self).type_name()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn fields(&self) -> &[Field] {
        (**self).fields()
    }
}

/// A `#[repr(C)]` struct whose value is its own argument block
///
/// # Safety
/// `FIELDS` must match the struct's real layout. Implemented by
/// [`descriptor!`](crate::descriptor); hand implementations take on the same
/// obligation.
pub unsafe trait ArgumentStruct: Descriptor + Sized + 'static {
    const NAME: &'static str;
    const FIELDS: &'static [Field];
}

/// Descriptor for an [`ArgumentStruct`] type, without needing a value
pub struct StaticLayout<D>(PhantomData<fn() -> D>);

impl<D: ArgumentStruct> StaticLayout<D> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<D: ArgumentStruct> Default for StaticLayout<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: ArgumentStruct> Descriptor for StaticLayout<D> {
    fn type_name(&self) -> &str {
        D::NAME
    }

    fn size(&self) -> usize {
        core::mem::size_of::<D>()
    }

    fn fields(&self) -> &[Field] {
        D::FIELDS
    }
}

/// Runtime-assembled layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicDescriptor {
    name: String,
    size: usize,
    fields: Vec<Field>,
}

impl DynamicDescriptor {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            fields: Vec::new(),
        }
    }

    /// Append a field (declaration order is push order)
    pub fn field(
        mut self,
        name: impl Into<Cow<'static, str>>,
        offset: usize,
        shape: FieldShape,
        tag: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.fields.push(Field {
            name: name.into(),
            offset,
            shape,
            tag: tag.into(),
        });
        self
    }
}

impl Descriptor for DynamicDescriptor {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> usize {
        self.size
    }

    fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// Declare a `#[repr(C)]` argument struct and its descriptor table
///
/// Each field takes an optional `#[ffi("...")]` annotation with a
/// comma-separated list of `ignore`, `ret` and `type=NAME`. Other field
/// attributes, doc comments included, are kept on the field. The macro adds
/// `#[repr(C)]` itself.
///
/// ```ignore
/// fastffi::descriptor! {
///     #[derive(Debug, Default)]
///     pub struct Scale {
///         /// Value to scale
///         pub value: f64,
///         pub factor: i32,
///         #[ffi("ret")]
///         pub out: f64,
///     }
/// }
/// ```
#[macro_export]
macro_rules! descriptor {
    (@tag) => { "" };
    (@tag $tag:literal) => { $tag };

    // Field munching: [struct attrs] [vis] [name] [done fields] [pending attrs] [pending tag] input
    (@munch $m:tt $v:tt $n:tt [$($done:tt)*] [$($attrs:tt)*] [$($tag:tt)*]
        #[ffi($t:literal)] $($rest:tt)*
    ) => {
        $crate::descriptor!(@munch $m $v $n [$($done)*] [$($attrs)*] [$t] $($rest)*);
    };
    (@munch $m:tt $v:tt $n:tt [$($done:tt)*] [$($attrs:tt)*] [$($tag:tt)*]
        #[$($attr:tt)*] $($rest:tt)*
    ) => {
        $crate::descriptor!(@munch $m $v $n [$($done)*] [$($attrs)* #[$($attr)*]] [$($tag)*] $($rest)*);
    };
    (@munch $m:tt $v:tt $n:tt [$($done:tt)*] [$($attrs:tt)*] [$($tag:tt)*]
        $fvis:vis $field:ident : $ty:ty, $($rest:tt)*
    ) => {
        $crate::descriptor!(@munch $m $v $n
            [$($done)* { [$($attrs)*] [$($tag)*] [$fvis] $field [$ty] }] [] []
            $($rest)*);
    };
    (@munch $m:tt $v:tt $n:tt [$($done:tt)*] [$($attrs:tt)*] [$($tag:tt)*]
        $fvis:vis $field:ident : $ty:ty
    ) => {
        $crate::descriptor!(@munch $m $v $n
            [$($done)* { [$($attrs)*] [$($tag)*] [$fvis] $field [$ty] }] [] []);
    };
    (@munch $m:tt $v:tt $n:tt [$($done:tt)*] [] []) => {
        $crate::descriptor!(@emit $m $v $n [$($done)*]);
    };

    (@emit [$($meta:tt)*] [$vis:vis] [$name:ident]
        [$( { [$($fattr:tt)*] [$($tag:literal)?] [$fvis:vis] $field:ident [$ty:ty] } )*]
    ) => {
        $($meta)*
        #[repr(C)]
        $vis struct $name {
            $( $($fattr)* $fvis $field: $ty, )*
        }

        unsafe impl $crate::ArgumentStruct for $name {
            const NAME: &'static str = ::core::stringify!($name);
            const FIELDS: &'static [$crate::Field] = &[
                $(
                    $crate::Field::new(
                        ::core::stringify!($field),
                        ::core::mem::offset_of!($name, $field),
                        <$ty as $crate::NativeType>::SHAPE,
                        $crate::descriptor!(@tag $($tag)?),
                    ),
                )*
            ];
        }

        impl $crate::Descriptor for $name {
            fn type_name(&self) -> &str {
                <Self as $crate::ArgumentStruct>::NAME
            }

            fn size(&self) -> usize {
                ::core::mem::size_of::<Self>()
            }

            fn fields(&self) -> &[$crate::Field] {
                <Self as $crate::ArgumentStruct>::FIELDS
            }
        }
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($body:tt)*
        }
    ) => {
        $crate::descriptor!(@munch [$(#[$meta])*] [$vis] [$name] [] [] [] $($body)*);
    };
}

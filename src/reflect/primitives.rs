//! `Reflect` and `MemberValue` implementations for scalar types.
//!
//! Scalars have no member table; they participate in mapping as leaf values
//! copied directly or transformed by a registered converter. Numeric types,
//! `bool` and `char` are value types; `String` is scalar-shaped but carries
//! reference semantics, which matters to the sequence converter's
//! same-element fast path.

use std::any::TypeId;
use std::sync::Arc;

use crate::reflect::{
    clone_erased, default_erased, type_info_of, MemberValue, Reflect, TypeInfo, TypeShape,
};
use crate::Result;

fn scalar_info<T: Reflect + Clone + Default>(is_value_type: bool) -> TypeInfo {
    TypeInfo {
        id: TypeId::of::<T>(),
        name: std::any::type_name::<T>(),
        shape: TypeShape::Scalar,
        is_value_type,
        underlying: None,
        default_ctor: Some(default_erased::<T>),
        clone_value: Some(clone_erased::<T>),
        members: Arc::new(boxcar::Vec::new()),
        element: None,
        sequence: None,
    }
}

macro_rules! impl_scalar_reflect {
    ($($ty:ty => $is_value:expr),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn build_type_info() -> TypeInfo {
                    scalar_info::<$ty>($is_value)
                }
            }

            impl MemberValue for $ty {
                fn get_boxed(&self) -> Option<Box<dyn std::any::Any>> {
                    Some(Box::new(self.clone()))
                }

                fn from_boxed(value: Option<Box<dyn std::any::Any>>) -> Result<Self> {
                    match value {
                        Some(v) => Ok(*v
                            .downcast::<$ty>()
                            .map_err(|_| crate::Error::mismatch::<$ty>("member write"))?),
                        None => Ok(<$ty>::default()),
                    }
                }

                fn declared_info() -> &'static TypeInfo {
                    type_info_of::<$ty>()
                }
            }
        )*
    };
}

impl_scalar_reflect! {
    i8 => true,
    i16 => true,
    i32 => true,
    i64 => true,
    i128 => true,
    u8 => true,
    u16 => true,
    u32 => true,
    u64 => true,
    u128 => true,
    isize => true,
    usize => true,
    f32 => true,
    f64 => true,
    bool => true,
    char => true,
    String => false,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_classification() {
        assert!(type_info_of::<i64>().is_value_type);
        assert!(type_info_of::<bool>().is_value_type);
        assert!(!type_info_of::<String>().is_value_type);
    }

    #[test]
    fn test_scalar_member_value_default_on_absent() {
        assert_eq!(i32::from_boxed(None).unwrap(), 0);
        assert!(String::from_boxed(None).unwrap().is_empty());
    }

    #[test]
    fn test_scalar_member_value_rejects_wrong_type() {
        let result = i32::from_boxed(Some(Box::new("nope".to_string())));
        assert!(result.is_err());
    }
}

//! Converter protocol and generic converter providers.
//!
//! Scalar conversions travel as erased [`ScalarFn`] callables. Everything
//! richer - whole-object converters, the sequence converter - implements the
//! [`Converter`] trait, whose optional `initialize` hook receives the
//! resolved type pair and the owning configuration and manager before first
//! use.
//!
//! Generic converters are registered as *providers* against a pair of
//! [`TypePattern`]s. During plan construction the builder walks the
//! registered providers in order; the first whose patterns accept the
//! concrete `(from, to)` pair produces a [`ConverterDescriptor`], from which
//! the builder materializes and initializes the converter instance. The
//! built-in [`SequenceConverterProvider`](crate::convert::SequenceConverterProvider)
//! for collection-to-array conversion is the canonical example.

mod sequence;

pub use sequence::{SequenceConverter, SequenceConverterProvider};

use std::any::Any;
use std::sync::Arc;

use crate::config::MappingConfig;
use crate::exec::MappingState;
use crate::manager::MapperManager;
use crate::reflect::TypeInfo;
use crate::typekey::TypeKey;
use crate::Result;

/// An erased scalar conversion: consumes a boxed value of the source type,
/// produces a boxed value of the destination type.
pub type ScalarFn = Arc<dyn Fn(Box<dyn Any>) -> Result<Box<dyn Any>> + Send + Sync>;

/// A value converter bound into a mapping plan.
///
/// Absence is part of the signature on both sides: a converter receives
/// `None` for an absent source value and may itself yield `None` to write
/// the destination's default.
pub trait Converter: Send + Sync {
    /// One-time initialization with the resolved type pair.
    ///
    /// Called by the plan builder after construction and before the
    /// converter is bound into a plan. The default implementation does
    /// nothing; converters that resolve inner machinery (element
    /// converters, sub-mappers) do it here or lazily from `convert`.
    ///
    /// # Errors
    /// Returns an error if the converter cannot service the pair, which
    /// fails the plan build.
    fn initialize(
        &mut self,
        _from: &'static TypeInfo,
        _to: &'static TypeInfo,
        _config: &MappingConfig,
        _manager: &MapperManager,
    ) -> Result<()> {
        Ok(())
    }

    /// Convert one value.
    ///
    /// # Errors
    /// Propagates conversion failures unchanged to the `map` caller.
    fn convert(
        &self,
        value: Option<Box<dyn Any>>,
        state: &MappingState,
    ) -> Result<Option<Box<dyn Any>>>;
}

/// Adapts a [`ScalarFn`] to the [`Converter`] contract.
///
/// Absent input passes through as absent output; the scalar function only
/// sees present values.
pub struct ScalarConverter {
    func: ScalarFn,
}

impl ScalarConverter {
    /// Wrap an erased scalar conversion.
    #[must_use]
    pub fn new(func: ScalarFn) -> Self {
        ScalarConverter { func }
    }
}

impl Converter for ScalarConverter {
    fn convert(
        &self,
        value: Option<Box<dyn Any>>,
        _state: &MappingState,
    ) -> Result<Option<Box<dyn Any>>> {
        match value {
            Some(v) => Ok(Some((self.func)(v)?)),
            None => Ok(None),
        }
    }
}

/// Type pattern one side of a generic converter registration matches
/// against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypePattern {
    /// Exactly the given type
    Concrete {
        /// Id of the accepted type
        id: std::any::TypeId,
        /// Name of the accepted type, for summaries
        name: &'static str,
    },
    /// Any sequence-shaped type, regardless of element
    Sequence,
    /// Any type
    Any,
}

impl TypePattern {
    /// Pattern accepting exactly `T`.
    #[must_use]
    pub fn concrete<T: 'static>() -> Self {
        TypePattern::Concrete {
            id: std::any::TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Whether `info` satisfies this pattern.
    ///
    /// Nullable wrappers are unwrapped before matching, so a pattern that
    /// accepts `Vec<T>` also accepts `Option<Vec<T>>`.
    #[must_use]
    pub fn matches(&self, info: &'static TypeInfo) -> bool {
        let info = info.effective();
        match self {
            TypePattern::Concrete { id, .. } => info.id == *id,
            TypePattern::Sequence => info.is_collection(),
            TypePattern::Any => true,
        }
    }

    /// Stable label used in configuration-name summaries.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            TypePattern::Concrete { name, .. } => name,
            TypePattern::Sequence => "seq",
            TypePattern::Any => "any",
        }
    }
}

/// What a provider hands back for a concrete `(from, to)` pair: the identity
/// of the converter implementation, the type arguments it closes over, and a
/// factory for the instance.
pub struct ConverterDescriptor {
    /// Name of the converter implementation, for diagnostics
    pub impl_name: &'static str,
    /// The concrete types the instance is closed over
    pub type_args: TypeKey,
    /// Builds the (not yet initialized) converter instance
    pub make: Box<dyn FnOnce() -> Box<dyn Converter> + Send>,
}

impl std::fmt::Debug for ConverterDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterDescriptor")
            .field("impl_name", &self.impl_name)
            .field("type_args", &self.type_args.label())
            .finish_non_exhaustive()
    }
}

/// A generic converter provider: turns a matched `(from, to)` pair into a
/// [`ConverterDescriptor`].
pub trait ConverterProvider: Send + Sync {
    /// Stable provider name, used in configuration-name summaries.
    fn name(&self) -> &'static str;

    /// Produce the descriptor for a pair both patterns accepted.
    ///
    /// # Errors
    /// Returns [`crate::Error::ProviderContract`] if the pair cannot
    /// actually be serviced despite the pattern match.
    fn descriptor(
        &self,
        from: &'static TypeInfo,
        to: &'static TypeInfo,
    ) -> Result<ConverterDescriptor>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::type_info_of;

    #[test]
    fn test_scalar_converter_passes_absence_through() {
        let conv = ScalarConverter::new(Arc::new(|v| {
            let n = *v.downcast::<i32>().map_err(|_| crate::Error::mismatch::<i32>("test"))?;
            Ok(Box::new(n.to_string()) as Box<dyn Any>)
        }));

        let state = MappingState::new();
        assert!(conv.convert(None, &state).unwrap().is_none());

        let out = conv.convert(Some(Box::new(5i32)), &state).unwrap().unwrap();
        assert_eq!(out.downcast_ref::<String>().unwrap(), "5");
    }

    #[test]
    fn test_pattern_matching() {
        let vec_info = type_info_of::<Vec<i32>>();
        let scalar_info = type_info_of::<i32>();

        assert!(TypePattern::Sequence.matches(vec_info));
        assert!(!TypePattern::Sequence.matches(scalar_info));
        assert!(TypePattern::Any.matches(scalar_info));
        assert!(TypePattern::concrete::<i32>().matches(scalar_info));
    }

    #[test]
    fn test_pattern_unwraps_nullable() {
        let info = type_info_of::<Option<Vec<i32>>>();
        assert!(TypePattern::Sequence.matches(info));
    }
}

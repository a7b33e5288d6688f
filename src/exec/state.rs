//! Per-invocation mapping state.

use std::any::{Any, TypeId};

use rustc_hash::FxHashMap;

/// A type-keyed bag of caller-supplied values threaded through one mapping
/// invocation.
///
/// Custom constructors, null substitutors, filters and post-processors all
/// receive the state of the `map` call that invoked them; the engine itself
/// never reads or writes it. Keys are types: one value per type.
#[derive(Debug, Default)]
pub struct MappingState {
    bag: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MappingState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        MappingState::default()
    }

    /// Store a value, replacing any previous value of the same type.
    pub fn set<T: Any + Send + Sync>(&mut self, value: T) {
        self.bag.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Builder-style [`MappingState::set`].
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.set(value);
        self
    }

    /// Borrow the stored value of type `T`, if present.
    #[must_use]
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.bag.get(&TypeId::of::<T>()).and_then(|v| v.downcast_ref())
    }
}

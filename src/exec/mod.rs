//! Executor contract and the typed mapper facade.
//!
//! A compiled mapper is an [`ObjectMapper`]: an erased, immutable executor
//! for one `(source, destination, configuration)` triple, safe for
//! concurrent `map` invocations. The [`PlanCompiler`] seam keeps the
//! backend pluggable; the default backend interprets the operation tree
//! directly ([`InterpreterCompiler`]).
//!
//! Callers normally hold a [`MapperHandle`], the typed facade the manager
//! hands out.

mod interpreter;
mod state;

pub use interpreter::InterpreterCompiler;
pub use state::MappingState;

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::manager::MapperManager;
use crate::plan::{RootOperation, StoredOperation};
use crate::reflect::{Reflect, TypeInfo};
use crate::{Error, Result};

/// A compiled mapping executor for one type pair.
///
/// Implementations hold only immutable plan data plus closed-over converter
/// callables; `map` may be invoked concurrently from any number of threads.
pub trait ObjectMapper: Send + Sync {
    /// The plan's source type.
    fn from_type(&self) -> &'static TypeInfo;

    /// The plan's destination type.
    fn to_type(&self) -> &'static TypeInfo;

    /// Produce a fresh destination value.
    ///
    /// Resolution order: the configuration's custom constructor, the
    /// destination's default constructor, else `None` (the destination has
    /// no absent-free representation and `map` will fail without one).
    ///
    /// # Errors
    /// Propagates constructor failures.
    fn create_target(&self, state: &MappingState) -> Result<Option<Box<dyn Any>>>;

    /// Apply the plan: read `src`, populate and return the destination.
    ///
    /// An absent `dst` is first materialized via
    /// [`ObjectMapper::create_target`].
    ///
    /// # Errors
    /// Propagates converter, accessor and constructor failures unchanged.
    fn map(
        &self,
        src: &dyn Any,
        dst: Option<Box<dyn Any>>,
        state: &MappingState,
    ) -> Result<Box<dyn Any>>;

    /// The plan's flattened leaf operations, in declaration order.
    ///
    /// Stable across calls for a fixed plan; external consumers derive
    /// member lists from it.
    fn stored_operations(&self) -> &[StoredOperation];
}

/// Compiles an operation tree into an executor.
///
/// The engine ships [`InterpreterCompiler`]; alternative backends (code
/// generation, monomorphized specializations) plug in through
/// [`MapperManager::with_compiler`].
pub trait PlanCompiler: Send + Sync {
    /// Compile `plan` into an executor.
    ///
    /// # Errors
    /// Returns an error if the plan cannot be compiled, which fails (and is
    /// cached against) the triple being built.
    fn compile(&self, plan: RootOperation, manager: &MapperManager)
        -> Result<Arc<dyn ObjectMapper>>;
}

/// Typed facade over a cached [`ObjectMapper`].
///
/// Cheap to clone; all clones share the same executor instance.
pub struct MapperHandle<S, D> {
    inner: Arc<dyn ObjectMapper>,
    _types: PhantomData<fn(&S) -> D>,
}

impl<S, D> Clone for MapperHandle<S, D> {
    fn clone(&self) -> Self {
        MapperHandle {
            inner: Arc::clone(&self.inner),
            _types: PhantomData,
        }
    }
}

impl<S, D> std::fmt::Debug for MapperHandle<S, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MapperHandle({} -> {})",
            self.inner.from_type().name,
            self.inner.to_type().name
        )
    }
}

impl<S: Reflect, D: Reflect> MapperHandle<S, D> {
    pub(crate) fn new(inner: Arc<dyn ObjectMapper>) -> Self {
        MapperHandle {
            inner,
            _types: PhantomData,
        }
    }

    /// Produce a fresh destination value.
    ///
    /// # Errors
    /// Returns [`Error::MissingConstructor`] when `D` cannot be created.
    pub fn create_target(&self) -> Result<D> {
        let state = MappingState::new();
        let created = self
            .inner
            .create_target(&state)?
            .ok_or(Error::MissingConstructor(self.inner.to_type().name))?;
        Self::downcast(created)
    }

    /// Map `src` into an existing destination, returning the populated
    /// value. Members the plan does not touch keep their existing values.
    ///
    /// # Errors
    /// Propagates converter and constructor failures unchanged.
    pub fn map(&self, src: &S, dst: D, state: &MappingState) -> Result<D> {
        let mapped = self.inner.map(src, Some(Box::new(dst)), state)?;
        Self::downcast(mapped)
    }

    /// Create a destination and map into it in one call.
    ///
    /// # Errors
    /// Propagates converter and constructor failures unchanged.
    pub fn map_value(&self, src: &S) -> Result<D> {
        self.map_value_with(src, &MappingState::new())
    }

    /// [`MapperHandle::map_value`] with caller-supplied state.
    ///
    /// # Errors
    /// Propagates converter and constructor failures unchanged.
    pub fn map_value_with(&self, src: &S, state: &MappingState) -> Result<D> {
        let mapped = self.inner.map(src, None, state)?;
        Self::downcast(mapped)
    }

    /// The plan's flattened leaf operations, in declaration order.
    #[must_use]
    pub fn stored_operations(&self) -> &[StoredOperation] {
        self.inner.stored_operations()
    }

    /// The shared erased executor.
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn ObjectMapper> {
        &self.inner
    }

    fn downcast(value: Box<dyn Any>) -> Result<D> {
        value
            .downcast::<D>()
            .map(|boxed| *boxed)
            .map_err(|_| Error::mismatch::<D>("mapper facade"))
    }
}

//! The mapper manager: builds and memoizes executors.
//!
//! Compiled mappers are cached per `(source type, destination type,
//! configuration name)` triple. Lookups are lock-free on the fast path;
//! first-time construction for a key is serialized so concurrent callers
//! observe exactly one build and share the resulting executor. Entries -
//! including *failing* builds - live for the process lifetime: a triple that
//! failed to build re-raises the same error on every subsequent request.
//!
//! # Example
//!
//! ```rust
//! use mapforge::{reflect_struct, MapperManager, MappingConfig};
//!
//! reflect_struct! {
//!     #[derive(Clone, Debug, Default)]
//!     pub struct Source { pub a: i32, pub b: String }
//! }
//! reflect_struct! {
//!     #[derive(Clone, Debug, Default, PartialEq)]
//!     pub struct Target { pub a: i32, pub b: String }
//! }
//!
//! let manager = MapperManager::new();
//! let mapper = manager.get::<Source, Target>(&MappingConfig::new())?;
//! let out = mapper.map_value(&Source { a: 1, b: "x".into() })?;
//! assert_eq!(out, Target { a: 1, b: "x".into() });
//! # Ok::<(), mapforge::Error>(())
//! ```

use std::any::TypeId;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::config::MappingConfig;
use crate::exec::{InterpreterCompiler, MapperHandle, ObjectMapper, PlanCompiler};
use crate::plan::PlanBuilder;
use crate::reflect::{type_info_of, Reflect, TypeInfo};
use crate::{Error, Result};

type CacheKey = (TypeId, TypeId, Arc<str>);
type BuildOutcome = std::result::Result<Arc<dyn ObjectMapper>, Arc<Error>>;

struct ManagerInner {
    cache: DashMap<CacheKey, Arc<OnceLock<BuildOutcome>>>,
    compiler: Box<dyn PlanCompiler>,
}

/// Builds, caches and hands out compiled mappers.
///
/// Cheap to clone; all clones share one cache. A process-wide instance is
/// available through [`MapperManager::default_instance`]; tests and embedders
/// that need isolation construct their own.
#[derive(Clone)]
pub struct MapperManager {
    inner: Arc<ManagerInner>,
}

impl MapperManager {
    /// Create a manager using the interpreting executor backend.
    #[must_use]
    pub fn new() -> Self {
        MapperManager::with_compiler(Box::new(InterpreterCompiler))
    }

    /// Create a manager with a custom executor backend.
    #[must_use]
    pub fn with_compiler(compiler: Box<dyn PlanCompiler>) -> Self {
        MapperManager {
            inner: Arc::new(ManagerInner {
                cache: DashMap::new(),
                compiler,
            }),
        }
    }

    /// The process-wide default manager.
    #[must_use]
    pub fn default_instance() -> &'static MapperManager {
        static DEFAULT: OnceLock<MapperManager> = OnceLock::new();
        DEFAULT.get_or_init(MapperManager::new)
    }

    /// Get (building and caching if needed) the typed mapper for `(S, D)`
    /// under `config`.
    ///
    /// Reading the configuration name here freezes it; later registrations
    /// on the same configuration instance no longer affect cache identity.
    ///
    /// # Errors
    /// Returns the (possibly cached) configuration error when the plan
    /// cannot be built.
    pub fn get<S: Reflect, D: Reflect>(
        &self,
        config: &MappingConfig,
    ) -> Result<MapperHandle<S, D>> {
        Ok(MapperHandle::new(self.get_by_info(
            type_info_of::<S>(),
            type_info_of::<D>(),
            config,
        )?))
    }

    /// [`MapperManager::get`] exposing the erased executor and its plan
    /// metadata.
    ///
    /// # Errors
    /// Returns the (possibly cached) configuration error when the plan
    /// cannot be built.
    pub fn get_impl<S: Reflect, D: Reflect>(
        &self,
        config: &MappingConfig,
    ) -> Result<Arc<dyn ObjectMapper>> {
        self.get_by_info(type_info_of::<S>(), type_info_of::<D>(), config)
    }

    /// Erased lookup by interned type infos.
    ///
    /// This is the recursion entry point generic converters use to resolve
    /// element sub-mappers under the same configuration.
    ///
    /// # Errors
    /// Returns the (possibly cached) configuration error when the plan
    /// cannot be built.
    pub fn get_by_info(
        &self,
        from: &'static TypeInfo,
        to: &'static TypeInfo,
        config: &MappingConfig,
    ) -> Result<Arc<dyn ObjectMapper>> {
        let name = config.name();

        let cell = {
            let entry = self
                .inner
                .cache
                .entry((from.id, to.id, name))
                .or_insert_with(|| Arc::new(OnceLock::new()));
            // The shard guard must drop before the (possibly recursive)
            // build below runs.
            Arc::clone(entry.value())
        };

        let outcome = cell.get_or_init(|| self.build(from, to, config).map_err(Arc::new));
        match outcome {
            Ok(mapper) => Ok(mapper.clone()),
            Err(error) => Err(Error::Shared(error.clone())),
        }
    }

    /// Number of cached entries, failing entries included.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.inner.cache.len()
    }

    fn build(
        &self,
        from: &'static TypeInfo,
        to: &'static TypeInfo,
        config: &MappingConfig,
    ) -> Result<Arc<dyn ObjectMapper>> {
        let plan = PlanBuilder::new(config, self).build(from, to)?;
        self.inner.compiler.compile(plan, self)
    }
}

impl Default for MapperManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MapperManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapperManager")
            .field("cached", &self.inner.cache.len())
            .finish()
    }
}

//! Static scalar converter registry.
//!
//! A registry of free-function conversions `(From, To) -> fn`, consulted by
//! the plan builder and the sequence converter before falling back to
//! recursive sub-mappers. A process-wide default instance carries the
//! built-in lossless numeric widenings; configurations may swap in their own
//! registry via [`crate::MappingConfig::with_static_converters`].

use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};

use crossbeam_skiplist::SkipMap;

use crate::convert::ScalarFn;

/// Registry of static scalar conversions keyed by `(from, to)` type ids.
///
/// Insertion and lookup are concurrent; entries are never removed. Lookup
/// returns a clone of the registered callable.
pub struct StaticConverters {
    table: SkipMap<(TypeId, TypeId), ScalarFn>,
}

impl StaticConverters {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        StaticConverters {
            table: SkipMap::new(),
        }
    }

    /// Create a registry pre-populated with the built-in lossless numeric
    /// widenings (`i8 -> i64`, `u16 -> u32`, `f32 -> f64`, ...).
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = StaticConverters::new();
        registry.install_defaults();
        registry
    }

    /// The process-wide default registry.
    ///
    /// Used whenever a configuration does not carry its own registry.
    /// Registrations against it are visible process-wide.
    #[must_use]
    pub fn process_default() -> &'static StaticConverters {
        static DEFAULT: OnceLock<StaticConverters> = OnceLock::new();
        DEFAULT.get_or_init(StaticConverters::with_defaults)
    }

    /// Register a free-function conversion from `F` to `T`.
    ///
    /// Replaces any previous registration for the pair.
    pub fn register<F: Any, T: Any>(&self, func: fn(F) -> T) {
        let erased: ScalarFn = Arc::new(move |value| {
            let value = *value
                .downcast::<F>()
                .map_err(|_| crate::Error::mismatch::<F>("static converter"))?;
            Ok(Box::new(func(value)) as Box<dyn Any>)
        });
        self.table
            .insert((TypeId::of::<F>(), TypeId::of::<T>()), erased);
    }

    /// Look up the conversion for a `(from, to)` id pair.
    #[must_use]
    pub fn lookup_ids(&self, from: TypeId, to: TypeId) -> Option<ScalarFn> {
        self.table.get(&(from, to)).map(|entry| entry.value().clone())
    }

    /// Typed [`StaticConverters::lookup_ids`].
    #[must_use]
    pub fn lookup<F: Any, T: Any>(&self) -> Option<ScalarFn> {
        self.lookup_ids(TypeId::of::<F>(), TypeId::of::<T>())
    }

    /// Number of registered conversions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn install_defaults(&self) {
        macro_rules! widen {
            ($($from:ty => $to:ty),* $(,)?) => {
                $( self.register::<$from, $to>(<$to>::from); )*
            };
        }

        widen! {
            i8 => i16, i8 => i32, i8 => i64,
            i16 => i32, i16 => i64,
            i32 => i64,
            u8 => u16, u8 => u32, u8 => u64, u8 => i16, u8 => i32, u8 => i64,
            u16 => u32, u16 => u64, u16 => i32, u16 => i64,
            u32 => u64, u32 => i64,
            f32 => f64,
            i32 => f64, u32 => f64,
            char => String,
        }
    }
}

impl Default for StaticConverters {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StaticConverters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticConverters")
            .field("len", &self.table.len())
            .finish()
    }
}

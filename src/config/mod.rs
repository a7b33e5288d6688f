//! Mapping configuration.
//!
//! A [`MappingConfig`] collects every user registration that shapes a plan:
//! member ignores, typed converters, generic converter providers, null
//! substitutors, custom constructors, post-processors, source and
//! destination filters, name-stripping rules and plan flags.
//!
//! Each configuration derives a deterministic *configuration name* from its
//! registrations. The name is the cache discriminator: two configurations
//! with equal names are treated as observationally equivalent and share
//! compiled mappers. The name freezes the first time it is read (which the
//! manager does on every `get`); registrations made after that point do not
//! change it and therefore never affect already-cached mappers.
//!
//! # Example
//!
//! ```rust
//! use mapforge::MappingConfig;
//!
//! let config = MappingConfig::new()
//!     .convert_using(|n: i32| n.to_string())
//!     .null_substitution::<String, String>(|_| "N/A".to_string())
//!     .ignore_members::<(), ()>(&["internal_id"]);
//! let name = config.name();
//! ```

mod statics;

pub use statics::StaticConverters;

use std::any::Any;
use std::sync::{Arc, OnceLock};

use bitflags::bitflags;

use crate::convert::{ConverterProvider, ScalarFn, SequenceConverterProvider, TypePattern};
use crate::exec::MappingState;
use crate::typekey::{TypeKey, TypeKeyMap};
use crate::Result;

bitflags! {
    /// Whole-plan behavior flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PlanFlags: u8 {
        /// Same-element collections may be copied without deep-converting
        /// elements, even when the element type has reference semantics.
        const SHALLOW_COPY = 1;
        /// Surface zero-argument methods as read-only source members.
        const MAP_METHODS = 1 << 1;
    }
}

/// Erased null substitutor: produces a destination value for an absent
/// source value.
pub type NullSubstitutor = Arc<dyn Fn(&MappingState) -> Box<dyn Any> + Send + Sync>;

/// Erased custom constructor for a destination type.
pub type TargetConstructor = Arc<dyn Fn(&MappingState) -> Box<dyn Any> + Send + Sync>;

/// Erased post-processor: replaces a finished destination value.
pub type PostProcessor =
    Arc<dyn Fn(Box<dyn Any>, &MappingState) -> Result<Box<dyn Any>> + Send + Sync>;

/// Erased value filter; `false` suppresses the write.
pub type ValueFilter = Arc<dyn Fn(&dyn Any, &MappingState) -> bool + Send + Sync>;

/// A generic converter registration: two type patterns and the provider
/// consulted when both match.
#[derive(Clone)]
pub struct ProviderEntry {
    /// Pattern the source type must satisfy
    pub from: TypePattern,
    /// Pattern the destination type must satisfy
    pub to: TypePattern,
    /// The provider producing converter descriptors for matched pairs
    pub provider: Arc<dyn ConverterProvider>,
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("from", &self.from.label())
            .field("to", &self.to.label())
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// User-declared mapping configuration. See the module docs.
pub struct MappingConfig {
    converters: TypeKeyMap<ScalarFn>,
    null_substitutors: TypeKeyMap<NullSubstitutor>,
    constructors: TypeKeyMap<TargetConstructor>,
    post_processors: TypeKeyMap<PostProcessor>,
    source_filters: TypeKeyMap<ValueFilter>,
    destination_filters: TypeKeyMap<ValueFilter>,
    ignored: TypeKeyMap<Vec<String>>,
    providers: Vec<ProviderEntry>,
    statics: Option<Arc<StaticConverters>>,
    strip_prefixes: Vec<String>,
    strip_postfixes: Vec<String>,
    flags: PlanFlags,
    name_override: Option<String>,
    frozen_name: OnceLock<Arc<str>>,
}

impl MappingConfig {
    /// Create a configuration with the default registrations.
    ///
    /// The default installs the sequence converter provider for
    /// collection-to-array pairs; everything else starts empty.
    #[must_use]
    pub fn new() -> Self {
        MappingConfig {
            converters: TypeKeyMap::new(),
            null_substitutors: TypeKeyMap::new(),
            constructors: TypeKeyMap::new(),
            post_processors: TypeKeyMap::new(),
            source_filters: TypeKeyMap::new(),
            destination_filters: TypeKeyMap::new(),
            ignored: TypeKeyMap::new(),
            providers: vec![ProviderEntry {
                from: TypePattern::Sequence,
                to: TypePattern::Sequence,
                provider: Arc::new(SequenceConverterProvider),
            }],
            statics: None,
            strip_prefixes: Vec::new(),
            strip_postfixes: Vec::new(),
            flags: PlanFlags::empty(),
            name_override: None,
            frozen_name: OnceLock::new(),
        }
    }

    /// Register a typed converter from `F` to `T`.
    ///
    /// Applies to member pairs whose (unwrapped) value types are exactly
    /// `(F, T)`, and to whole-object mapping of the `(F, T)` root pair.
    #[must_use]
    pub fn convert_using<F: Any, T: Any>(
        mut self,
        func: impl Fn(F) -> T + Send + Sync + 'static,
    ) -> Self {
        let erased: ScalarFn = Arc::new(move |value| {
            let value = *value
                .downcast::<F>()
                .map_err(|_| crate::Error::mismatch::<F>("converter"))?;
            Ok(Box::new(func(value)) as Box<dyn Any>)
        });
        self.converters.insert(TypeKey::pair::<F, T>(), erased);
        self
    }

    /// Register a generic converter provider for a pair of type patterns.
    ///
    /// Providers are consulted in registration order; the first whose
    /// patterns accept a concrete pair wins.
    #[must_use]
    pub fn convert_generic(
        mut self,
        from: TypePattern,
        to: TypePattern,
        provider: Arc<dyn ConverterProvider>,
    ) -> Self {
        self.providers.push(ProviderEntry { from, to, provider });
        self
    }

    /// Register a substitution producing a `T` whenever a source member of
    /// type `F` is absent.
    #[must_use]
    pub fn null_substitution<F: Any, T: Any>(
        mut self,
        func: impl Fn(&MappingState) -> T + Send + Sync + 'static,
    ) -> Self {
        let erased: NullSubstitutor = Arc::new(move |state| Box::new(func(state)));
        self.null_substitutors.insert(TypeKey::pair::<F, T>(), erased);
        self
    }

    /// Ignore members by name when mapping `F` to `T`.
    ///
    /// Accumulative: repeated calls extend the list. A member pair is
    /// dropped when either its source-member name or its destination-member
    /// name is listed.
    #[must_use]
    pub fn ignore_members<F: Any, T: Any>(mut self, names: &[&str]) -> Self {
        let key = TypeKey::pair::<F, T>();
        self.ignored
            .entry_or_default(key)
            .extend(names.iter().map(|n| (*n).to_string()));
        self
    }

    /// Register a custom constructor for destination values of type `T`.
    #[must_use]
    pub fn construct_by<T: Any>(
        mut self,
        func: impl Fn(&MappingState) -> T + Send + Sync + 'static,
    ) -> Self {
        let erased: TargetConstructor = Arc::new(move |state| Box::new(func(state)));
        self.constructors.insert(TypeKey::single::<T>(), erased);
        self
    }

    /// Register a post-processor replacing finished destination values of
    /// type `T`.
    #[must_use]
    pub fn post_process<T: Any>(
        mut self,
        func: impl Fn(T, &MappingState) -> T + Send + Sync + 'static,
    ) -> Self {
        let erased: PostProcessor = Arc::new(move |value, state| {
            let value = *value
                .downcast::<T>()
                .map_err(|_| crate::Error::mismatch::<T>("post-processor"))?;
            Ok(Box::new(func(value, state)) as Box<dyn Any>)
        });
        self.post_processors.insert(TypeKey::single::<T>(), erased);
        self
    }

    /// Register a source-side filter for values of type `T`.
    ///
    /// Returning `false` suppresses the write of the member (or, for the
    /// root source type, the whole mapping).
    #[must_use]
    pub fn filter_source<T: Any>(
        mut self,
        func: impl Fn(&T, &MappingState) -> bool + Send + Sync + 'static,
    ) -> Self {
        let erased: ValueFilter =
            Arc::new(move |value, state| value.downcast_ref::<T>().is_none_or(|v| func(v, state)));
        self.source_filters.insert(TypeKey::single::<T>(), erased);
        self
    }

    /// Register a destination-side filter for values of type `T`.
    #[must_use]
    pub fn filter_destination<T: Any>(
        mut self,
        func: impl Fn(&T, &MappingState) -> bool + Send + Sync + 'static,
    ) -> Self {
        let erased: ValueFilter =
            Arc::new(move |value, state| value.downcast_ref::<T>().is_none_or(|v| func(v, state)));
        self.destination_filters.insert(TypeKey::single::<T>(), erased);
        self
    }

    /// Strip any of the given prefixes from member names before matching.
    #[must_use]
    pub fn strip_prefixes(mut self, prefixes: &[&str]) -> Self {
        self.strip_prefixes
            .extend(prefixes.iter().map(|p| (*p).to_string()));
        self
    }

    /// Strip any of the given postfixes from member names before matching.
    #[must_use]
    pub fn strip_postfixes(mut self, postfixes: &[&str]) -> Self {
        self.strip_postfixes
            .extend(postfixes.iter().map(|p| (*p).to_string()));
        self
    }

    /// Set plan flags.
    #[must_use]
    pub fn with_flags(mut self, flags: PlanFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Enable [`PlanFlags::SHALLOW_COPY`].
    #[must_use]
    pub fn shallow_copy(self) -> Self {
        self.with_flags(PlanFlags::SHALLOW_COPY)
    }

    /// Enable [`PlanFlags::MAP_METHODS`].
    #[must_use]
    pub fn map_methods(self) -> Self {
        self.with_flags(PlanFlags::MAP_METHODS)
    }

    /// Use `registry` instead of the process-default static converters.
    #[must_use]
    pub fn with_static_converters(mut self, registry: Arc<StaticConverters>) -> Self {
        self.statics = Some(registry);
        self
    }

    /// Override the derived configuration name.
    ///
    /// Two configurations with equal names share cache entries; overriding
    /// makes that equivalence explicit instead of derived.
    #[must_use]
    pub fn set_config_name(mut self, name: impl Into<String>) -> Self {
        self.name_override = Some(name.into());
        self
    }

    /// The configuration name, frozen on first read.
    #[must_use]
    pub fn name(&self) -> Arc<str> {
        self.frozen_name
            .get_or_init(|| match &self.name_override {
                Some(name) => Arc::from(name.as_str()),
                None => Arc::from(self.build_configuration_name().as_str()),
            })
            .clone()
    }

    /// Derive the textual configuration name from all registrations.
    ///
    /// Deterministic: a configuration built by the same sequence of calls in
    /// the same order yields a byte-identical name across processes.
    #[must_use]
    pub fn build_configuration_name(&self) -> String {
        let flag_names = self
            .flags
            .iter_names()
            .map(|(n, _)| n)
            .collect::<Vec<_>>()
            .join("|");
        [
            format!("conv{{{}}}", self.converters.summary(|k, _| k.label())),
            format!("null{{{}}}", self.null_substitutors.summary(|k, _| k.label())),
            format!("ctor{{{}}}", self.constructors.summary(|k, _| k.label())),
            format!("post{{{}}}", self.post_processors.summary(|k, _| k.label())),
            format!("sfilt{{{}}}", self.source_filters.summary(|k, _| k.label())),
            format!("dfilt{{{}}}", self.destination_filters.summary(|k, _| k.label())),
            format!(
                "ign{{{}}}",
                self.ignored
                    .summary(|k, names| format!("{}:[{}]", k.label(), names.join("|")))
            ),
            format!(
                "gen{{{}}}",
                self.providers
                    .iter()
                    .map(|e| format!("{}->{}:{}", e.from.label(), e.to.label(), e.provider.name()))
                    .collect::<Vec<_>>()
                    .join(",")
            ),
            format!(
                "strip{{pre=[{}],post=[{}]}}",
                self.strip_prefixes.join("|"),
                self.strip_postfixes.join("|")
            ),
            format!(
                "statics{{{}}}",
                match &self.statics {
                    Some(own) => format!("custom:{}", own.len()),
                    None => "default".to_string(),
                }
            ),
            format!("flags{{{flag_names}}}"),
        ]
        .join(";")
    }

    /// Member name with the configured prefix/postfix stripping applied.
    #[must_use]
    pub fn stripped_name<'a>(&self, name: &'a str) -> &'a str {
        let mut name = name;
        for prefix in &self.strip_prefixes {
            if let Some(rest) = name.strip_prefix(prefix.as_str()) {
                name = rest;
                break;
            }
        }
        for postfix in &self.strip_postfixes {
            if let Some(rest) = name.strip_suffix(postfix.as_str()) {
                name = rest;
                break;
            }
        }
        name
    }

    /// Whether `name` is ignored for the given root pair.
    #[must_use]
    pub fn is_ignored(&self, pair: &TypeKey, name: &str) -> bool {
        self.ignored
            .get(pair)
            .is_some_and(|names| names.iter().any(|n| n == name))
    }

    /// The registered converter for a `(from, to)` key, if any.
    #[must_use]
    pub fn converter_for(&self, key: &TypeKey) -> Option<ScalarFn> {
        self.converters.get(key).cloned()
    }

    /// The registered null substitutor for a `(from, to)` key, if any.
    #[must_use]
    pub fn null_substitutor_for(&self, key: &TypeKey) -> Option<NullSubstitutor> {
        self.null_substitutors.get(key).cloned()
    }

    /// The registered constructor for a `(to,)` key, if any.
    #[must_use]
    pub fn constructor_for(&self, key: &TypeKey) -> Option<TargetConstructor> {
        self.constructors.get(key).cloned()
    }

    /// The registered post-processor for a `(t,)` key, if any.
    #[must_use]
    pub fn post_processor_for(&self, key: &TypeKey) -> Option<PostProcessor> {
        self.post_processors.get(key).cloned()
    }

    /// The registered source filter for a `(t,)` key, if any.
    #[must_use]
    pub fn source_filter_for(&self, key: &TypeKey) -> Option<ValueFilter> {
        self.source_filters.get(key).cloned()
    }

    /// The registered destination filter for a `(t,)` key, if any.
    #[must_use]
    pub fn destination_filter_for(&self, key: &TypeKey) -> Option<ValueFilter> {
        self.destination_filters.get(key).cloned()
    }

    /// The registered generic providers, in registration order.
    #[must_use]
    pub fn providers(&self) -> &[ProviderEntry] {
        &self.providers
    }

    /// Look up a static scalar conversion for an id pair.
    ///
    /// The configuration's own registry is consulted first, falling back to
    /// the process-default registry.
    #[must_use]
    pub fn lookup_static(&self, from: std::any::TypeId, to: std::any::TypeId) -> Option<ScalarFn> {
        if let Some(own) = &self.statics {
            if let Some(found) = own.lookup_ids(from, to) {
                return Some(found);
            }
        }
        StaticConverters::process_default().lookup_ids(from, to)
    }

    /// The configured plan flags.
    #[must_use]
    pub fn flags(&self) -> PlanFlags {
        self.flags
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MappingConfig {
    fn clone(&self) -> Self {
        let frozen_name = OnceLock::new();
        if let Some(name) = self.frozen_name.get() {
            let _ = frozen_name.set(name.clone());
        }
        MappingConfig {
            converters: self.converters.clone(),
            null_substitutors: self.null_substitutors.clone(),
            constructors: self.constructors.clone(),
            post_processors: self.post_processors.clone(),
            source_filters: self.source_filters.clone(),
            destination_filters: self.destination_filters.clone(),
            ignored: self.ignored.clone(),
            providers: self.providers.clone(),
            statics: self.statics.clone(),
            strip_prefixes: self.strip_prefixes.clone(),
            strip_postfixes: self.strip_postfixes.clone(),
            flags: self.flags,
            name_override: self.name_override.clone(),
            frozen_name,
        }
    }
}

impl std::fmt::Debug for MappingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingConfig")
            .field("name", &self.frozen_name.get())
            .field("converters", &self.converters.len())
            .field("providers", &self.providers.len())
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_deterministic_for_same_call_sequence() {
        let build = || {
            MappingConfig::new()
                .convert_using(|n: i32| n.to_string())
                .ignore_members::<String, String>(&["b"])
                .shallow_copy()
        };
        assert_eq!(build().build_configuration_name(), build().build_configuration_name());
    }

    #[test]
    fn test_name_distinguishes_registrations() {
        let base = MappingConfig::new();
        let with_conv = MappingConfig::new().convert_using(|n: i32| n.to_string());
        assert_ne!(
            base.build_configuration_name(),
            with_conv.build_configuration_name()
        );
    }

    #[test]
    fn test_name_override() {
        let config = MappingConfig::new()
            .convert_using(|n: i32| n.to_string())
            .set_config_name("custom");
        assert_eq!(&*config.name(), "custom");
    }

    #[test]
    fn test_name_freezes_on_first_read() {
        let config = MappingConfig::new();
        let before = config.name();
        let config = config.convert_using(|n: i32| n.to_string());
        assert_eq!(before, config.name(), "later registrations keep the frozen name");
        assert_ne!(&*config.name(), config.build_configuration_name().as_str());
    }

    #[test]
    fn test_ignore_accumulates() {
        let config = MappingConfig::new()
            .ignore_members::<i32, i32>(&["a"])
            .ignore_members::<i32, i32>(&["b"]);
        let key = TypeKey::pair::<i32, i32>();
        assert!(config.is_ignored(&key, "a"));
        assert!(config.is_ignored(&key, "b"));
        assert!(!config.is_ignored(&key, "c"));
    }

    #[test]
    fn test_stripping() {
        let config = MappingConfig::new().strip_prefixes(&["m_"]).strip_postfixes(&["_field"]);
        assert_eq!(config.stripped_name("m_name"), "name");
        assert_eq!(config.stripped_name("age_field"), "age");
        assert_eq!(config.stripped_name("plain"), "plain");
    }

    #[test]
    fn test_default_installs_sequence_provider() {
        let config = MappingConfig::new();
        assert_eq!(config.providers().len(), 1);
        assert!(config.build_configuration_name().contains("seq->seq"));
    }
}

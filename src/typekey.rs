//! Type-keyed dictionary support.
//!
//! Mapping policies are registered against types: converters against a
//! `(from, to)` pair, constructors against a single `(to,)` tuple. [`TypeKey`]
//! is the ordered tuple of types used as the key everywhere, and
//! [`TypeKeyMap`] is the hash container that additionally remembers insertion
//! order so that [`crate::MappingConfig`] can derive a deterministic textual
//! summary of its registrations.

use std::any::TypeId;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHashMap;

/// An ordered sequence of types used as a map key.
///
/// Equality is element-wise type identity and the hash combines the element
/// hashes in order; the human-readable type names ride along for diagnostics
/// and configuration-name summaries but do not participate in equality.
#[derive(Debug, Clone)]
pub struct TypeKey {
    ids: Vec<TypeId>,
    names: Vec<&'static str>,
}

impl TypeKey {
    /// Key over a single type, e.g. for constructor or post-processor lookup.
    #[must_use]
    pub fn single<T: 'static>() -> Self {
        TypeKey {
            ids: vec![TypeId::of::<T>()],
            names: vec![std::any::type_name::<T>()],
        }
    }

    /// Key over an ordered `(from, to)` pair, e.g. for converter lookup.
    #[must_use]
    pub fn pair<F: 'static, T: 'static>() -> Self {
        TypeKey {
            ids: vec![TypeId::of::<F>(), TypeId::of::<T>()],
            names: vec![std::any::type_name::<F>(), std::any::type_name::<T>()],
        }
    }

    /// Key built from already-resolved ids and names.
    ///
    /// Used by the plan builder, which works on erased
    /// [`crate::reflect::TypeInfo`] values rather than generic parameters.
    #[must_use]
    pub fn from_parts(ids: Vec<TypeId>, names: Vec<&'static str>) -> Self {
        debug_assert_eq!(ids.len(), names.len());
        TypeKey { ids, names }
    }

    /// The type ids forming this key, in order.
    #[must_use]
    pub fn ids(&self) -> &[TypeId] {
        &self.ids
    }

    /// Human-readable label: `From->To` for pairs, the type name for singles.
    #[must_use]
    pub fn label(&self) -> String {
        self.names.join("->")
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for id in &self.ids {
            id.hash(state);
        }
    }
}

/// A hash map keyed by [`TypeKey`] that preserves first-insertion order.
///
/// Lookups go through an [`FxHashMap`]; the separate order log is what makes
/// the configuration-name derivation deterministic for a configuration built
/// by the same sequence of calls.
#[derive(Debug, Clone)]
pub struct TypeKeyMap<V> {
    map: FxHashMap<TypeKey, V>,
    order: Vec<TypeKey>,
}

impl<V> TypeKeyMap<V> {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        TypeKeyMap {
            map: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    /// Insert a value for `key`.
    ///
    /// Re-inserting an existing key replaces the value but keeps the key's
    /// original position in the order log.
    pub fn insert(&mut self, key: TypeKey, value: V) {
        if self.map.insert(key.clone(), value).is_none() {
            self.order.push(key);
        }
    }

    /// Look up the value registered for `key`.
    pub fn get(&self, key: &TypeKey) -> Option<&V> {
        self.map.get(key)
    }

    /// Mutable access to the value for `key`, inserting a default first if
    /// absent. Used by accumulative registrations (ignore lists).
    pub fn entry_or_default(&mut self, key: TypeKey) -> &mut V
    where
        V: Default,
    {
        if !self.map.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.map.entry(key).or_default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate entries in first-insertion order.
    pub fn iter_ordered(&self) -> impl Iterator<Item = (&TypeKey, &V)> {
        self.order.iter().filter_map(|k| self.map.get(k).map(|v| (k, v)))
    }

    /// Deterministic textual summary of the entries, in insertion order.
    ///
    /// ## Arguments
    /// * `entry` - Renders one entry; the result is joined with `,`
    pub fn summary(&self, entry: impl Fn(&TypeKey, &V) -> String) -> String {
        self.iter_ordered()
            .map(|(k, v)| entry(k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl<V> Default for TypeKeyMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality_is_elementwise() {
        assert_eq!(TypeKey::pair::<i32, String>(), TypeKey::pair::<i32, String>());
        assert_ne!(TypeKey::pair::<i32, String>(), TypeKey::pair::<String, i32>());
        assert_ne!(TypeKey::single::<i32>(), TypeKey::pair::<i32, i32>());
    }

    #[test]
    fn test_label() {
        assert_eq!(TypeKey::single::<i32>().label(), "i32");
        assert!(TypeKey::pair::<i32, String>().label().contains("->"));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut map = TypeKeyMap::new();
        map.insert(TypeKey::single::<String>(), 1);
        map.insert(TypeKey::single::<i32>(), 2);
        map.insert(TypeKey::single::<String>(), 3);

        let labels: Vec<_> = map.iter_ordered().map(|(k, v)| (k.label(), *v)).collect();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].1, 3, "re-insert replaces the value");
        assert_eq!(labels[1].1, 2);
        assert!(labels[0].0.contains("String"), "re-insert keeps the slot");
    }

    #[test]
    fn test_summary_deterministic() {
        let build = || {
            let mut map = TypeKeyMap::new();
            map.insert(TypeKey::pair::<i32, String>(), ());
            map.insert(TypeKey::pair::<String, i32>(), ());
            map.summary(|k, ()| k.label())
        };
        assert_eq!(build(), build());
    }
}

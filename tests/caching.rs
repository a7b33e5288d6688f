//! Integration tests for the mapper cache.
//!
//! Cache identity is the `(source, destination, configuration name)`
//! triple: equal names share executors, concurrent first requests observe a
//! single construction, and failing builds are cached and re-raised.

use std::sync::Arc;

use mapforge::prelude::*;
use mapforge::reflect_struct;

reflect_struct! {
    #[derive(Clone, Debug)]
    pub struct From {
        pub a: i32,
    }
}

reflect_struct! {
    #[derive(Clone, Debug)]
    pub struct To {
        pub a: i32,
    }
}

/// Two configurations built by the same call sequence share one executor
/// instance.
#[test]
fn test_equal_names_share_executors() -> Result<()> {
    let manager = MapperManager::new();

    let config_a = MappingConfig::new().ignore_members::<From, To>(&["a"]);
    let config_b = MappingConfig::new().ignore_members::<From, To>(&["a"]);
    assert_eq!(config_a.name(), config_b.name());

    let mapper_a = manager.get_impl::<From, To>(&config_a)?;
    let mapper_b = manager.get_impl::<From, To>(&config_b)?;
    assert!(Arc::ptr_eq(&mapper_a, &mapper_b));
    Ok(())
}

/// Different registrations produce different names and distinct executors.
#[test]
fn test_different_names_do_not_share() -> Result<()> {
    let manager = MapperManager::new();

    let plain = manager.get_impl::<From, To>(&MappingConfig::new())?;
    let ignoring =
        manager.get_impl::<From, To>(&MappingConfig::new().ignore_members::<From, To>(&["a"]))?;
    assert!(!Arc::ptr_eq(&plain, &ignoring));
    Ok(())
}

/// An explicit name override is the whole cache identity: the first build
/// under a name wins.
#[test]
fn test_name_override_shares_cache_entry() -> Result<()> {
    let manager = MapperManager::new();

    let first = MappingConfig::new().set_config_name("pinned");
    let second = MappingConfig::new()
        .ignore_members::<From, To>(&["a"])
        .set_config_name("pinned");

    let mapper_a = manager.get_impl::<From, To>(&first)?;
    let mapper_b = manager.get_impl::<From, To>(&second)?;
    assert!(Arc::ptr_eq(&mapper_a, &mapper_b));

    // The first registration's behavior is the cached one.
    let handle: MapperHandle<From, To> = manager.get(&second)?;
    assert_eq!(handle.map_value(&From { a: 3 })?.a, 3);
    Ok(())
}

/// The configuration name freezes at first manager use; later
/// registrations never affect cached executors.
#[test]
fn test_config_frozen_at_first_use() -> Result<()> {
    let manager = MapperManager::new();

    let config = MappingConfig::new();
    let before = manager.get_impl::<From, To>(&config)?;

    let config = config.ignore_members::<From, To>(&["a"]);
    let after = manager.get_impl::<From, To>(&config)?;
    assert!(Arc::ptr_eq(&before, &after));

    let handle: MapperHandle<From, To> = manager.get(&config)?;
    assert_eq!(handle.map_value(&From { a: 4 })?.a, 4, "ignore had no effect");
    Ok(())
}

/// Concurrent first-time requests observe a single construction.
#[test]
fn test_concurrent_get_single_construction() -> Result<()> {
    let manager = MapperManager::new();

    let mappers: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                scope.spawn(move || manager.get_impl::<From, To>(&MappingConfig::new()))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = mappers[0].as_ref().unwrap();
    for mapper in &mappers {
        assert!(Arc::ptr_eq(first, mapper.as_ref().unwrap()));
    }
    assert_eq!(manager.cached_count(), 1);
    Ok(())
}

reflect_struct! {
    #[derive(Clone, Debug)]
    pub struct BoolFrom {
        pub v: bool,
    }
}

reflect_struct! {
    #[derive(Clone, Debug)]
    pub struct TextTo {
        pub v: String,
    }
}

/// A failing build is cached; every subsequent request re-raises the same
/// configuration error.
#[test]
fn test_failing_entry_is_cached() {
    let manager = MapperManager::new();
    let config = MappingConfig::new();

    let first = manager.get::<BoolFrom, TextTo>(&config).unwrap_err();
    let second = manager.get::<BoolFrom, TextTo>(&config).unwrap_err();

    assert!(matches!(first.root_cause(), Error::NoConversion { .. }));
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(manager.cached_count(), 1, "one failing entry, not two");
}

/// Leaf enumeration order is stable across executors and runs.
#[test]
fn test_stored_operation_order_stable() -> Result<()> {
    reflect_struct! {
        #[derive(Clone, Debug)]
        pub struct Wide {
            pub one: i32,
            pub two: String,
            pub three: bool,
        }
    }

    let names = |manager: &MapperManager| -> Result<Vec<&'static str>> {
        let mapper = manager.get_impl::<Wide, Wide>(&MappingConfig::new())?;
        Ok(mapper
            .stored_operations()
            .iter()
            .filter_map(|leaf| leaf.source.as_ref().map(|d| d.name))
            .collect())
    };

    let first = names(&MapperManager::new())?;
    let second = names(&MapperManager::new())?;
    assert_eq!(first, vec!["one", "two", "three"]);
    assert_eq!(first, second);
    Ok(())
}

/// The process-default manager is one shared instance.
#[test]
fn test_default_instance_is_shared() {
    assert!(std::ptr::eq(
        MapperManager::default_instance(),
        MapperManager::default_instance()
    ));
}

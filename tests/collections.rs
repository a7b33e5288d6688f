//! Integration tests for collection-to-array conversion.
//!
//! Exercises both shapes of the sequence converter: the same-element fast
//! path and the different-element path with its static-converter and
//! sub-mapper resolutions, plus absent-collection pass-through.

use std::collections::VecDeque;
use std::sync::Arc;

use mapforge::prelude::*;
use mapforge::reflect_struct;

reflect_struct! {
    #[derive(Clone, Debug)]
    pub struct IntCollection {
        pub xs: VecDeque<i32>,
    }
}

reflect_struct! {
    #[derive(Clone, Debug)]
    pub struct IntArray {
        pub xs: Vec<i32>,
    }
}

/// Value-type elements take the fast path: iteration order and length are
/// preserved.
#[test]
fn test_same_element_collection() -> Result<()> {
    let manager = MapperManager::new();
    let mapper = manager.get::<IntCollection, IntArray>(&MappingConfig::new())?;

    let source = IntCollection {
        xs: VecDeque::from([1, 2, 3]),
    };
    let out = mapper.map_value(&source)?;
    assert_eq!(out.xs, vec![1, 2, 3]);
    assert_eq!(out.xs.len(), source.xs.len());
    Ok(())
}

reflect_struct! {
    #[derive(Clone, Debug)]
    pub struct StringArray {
        pub xs: Vec<String>,
    }
}

/// Different element types resolve the per-element conversion from the
/// configuration's static registry: element `i` of the output equals
/// `g(input[i])`.
#[test]
fn test_different_element_collection_via_statics() -> Result<()> {
    let statics = Arc::new(StaticConverters::new());
    statics.register::<i32, String>(|n| format!("n={n}"));

    let manager = MapperManager::new();
    let config = MappingConfig::new().with_static_converters(statics);
    let mapper = manager.get::<IntCollection, StringArray>(&config)?;

    let out = mapper.map_value(&IntCollection {
        xs: VecDeque::from([1, 2]),
    })?;
    assert_eq!(out.xs, vec!["n=1".to_string(), "n=2".to_string()]);
    Ok(())
}

reflect_struct! {
    #[derive(Clone, Debug)]
    pub struct MaybeInts {
        pub xs: Option<VecDeque<i32>>,
    }
}

reflect_struct! {
    #[derive(Clone, Debug)]
    pub struct MaybeArray {
        pub xs: Option<Vec<i32>>,
    }
}

/// An absent input collection passes through as an absent output.
#[test]
fn test_absent_collection_passthrough() -> Result<()> {
    let manager = MapperManager::new();
    let mapper = manager.get::<MaybeInts, MaybeArray>(&MappingConfig::new())?;

    let out = mapper.map_value(&MaybeInts { xs: None })?;
    assert!(out.xs.is_none());

    let out = mapper.map_value(&MaybeInts {
        xs: Some(VecDeque::from([7])),
    })?;
    assert_eq!(out.xs, Some(vec![7]));
    Ok(())
}

reflect_struct! {
    #[derive(Clone, Debug)]
    pub struct TextCollection {
        pub xs: VecDeque<String>,
    }
}

reflect_struct! {
    #[derive(Clone, Debug)]
    pub struct TextArray {
        pub xs: Vec<String>,
    }
}

/// Reference-semantics elements of the same type deep-map by default and
/// shallow-copy under the flag; both preserve values.
#[test]
fn test_reference_elements_same_type() -> Result<()> {
    let source = TextCollection {
        xs: VecDeque::from(["a".to_string(), "b".to_string()]),
    };

    let manager = MapperManager::new();
    let deep = manager.get::<TextCollection, TextArray>(&MappingConfig::new())?;
    assert_eq!(deep.map_value(&source)?.xs, vec!["a", "b"]);

    let shallow = manager.get::<TextCollection, TextArray>(&MappingConfig::new().shallow_copy())?;
    assert_eq!(shallow.map_value(&source)?.xs, vec!["a", "b"]);
    Ok(())
}

reflect_struct! {
    #[derive(Clone, Debug, PartialEq)]
    pub struct Point {
        pub x: i32,
        pub y: i32,
    }
}

reflect_struct! {
    #[derive(Clone, Debug, PartialEq)]
    pub struct PointDto {
        pub x: i32,
        pub y: i32,
    }
}

reflect_struct! {
    #[derive(Clone, Debug)]
    pub struct Shape {
        pub points: Vec<Point>,
    }
}

reflect_struct! {
    #[derive(Clone, Debug)]
    pub struct ShapeDto {
        pub points: Vec<PointDto>,
    }
}

/// Struct elements resolve through a recursive sub-mapper for the element
/// pair.
#[test]
fn test_struct_elements_via_sub_mapper() -> Result<()> {
    let manager = MapperManager::new();
    let mapper = manager.get::<Shape, ShapeDto>(&MappingConfig::new())?;

    let out = mapper.map_value(&Shape {
        points: vec![Point { x: 1, y: 2 }, Point { x: 3, y: 4 }],
    })?;
    assert_eq!(
        out.points,
        vec![PointDto { x: 1, y: 2 }, PointDto { x: 3, y: 4 }]
    );
    Ok(())
}

reflect_struct! {
    #[derive(Clone, Debug, PartialEq)]
    pub struct Tree {
        pub name: String,
        pub children: Vec<Tree>,
    }
}

reflect_struct! {
    #[derive(Clone, Debug, PartialEq)]
    pub struct TreeDto {
        pub name: String,
        pub children: Vec<TreeDto>,
    }
}

/// A type holding a collection of itself maps: the element sub-mapper
/// resolves lazily against the cache instead of recursing into the
/// in-flight build.
#[test]
fn test_self_referential_element_type() -> Result<()> {
    let manager = MapperManager::new();
    let mapper = manager.get::<Tree, TreeDto>(&MappingConfig::new())?;

    let out = mapper.map_value(&Tree {
        name: "root".to_string(),
        children: vec![Tree {
            name: "leaf".to_string(),
            children: Vec::new(),
        }],
    })?;
    assert_eq!(out.name, "root");
    assert_eq!(out.children.len(), 1);
    assert_eq!(out.children[0].name, "leaf");
    assert!(out.children[0].children.is_empty());
    Ok(())
}

/// Mapping a bare collection pair at the root goes through the same
/// provider.
#[test]
fn test_root_collection_mapping() -> Result<()> {
    let manager = MapperManager::new();
    let mapper = manager.get::<VecDeque<i32>, Vec<i32>>(&MappingConfig::new())?;

    let out = mapper.map_value(&VecDeque::from([5, 6]))?;
    assert_eq!(out, vec![5, 6]);
    Ok(())
}

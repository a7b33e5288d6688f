//! Member introspection and static type information.
//!
//! This module is the engine's substitute for runtime reflection: every type
//! that participates in mapping exposes a static member table through the
//! [`Reflect`] trait. Tables are built once per type, interned in a global
//! registry, and shared as `&'static` references for the process lifetime.
//!
//! # Key Components
//!
//! - [`TypeInfo`]: interned description of a type (shape, members, element
//!   links, constructors)
//! - [`MemberInfo`] / [`MemberDescriptor`]: one field, property, or surfaced
//!   method of a type, with erased accessor functions
//! - [`Reflect`]: implemented for scalars, `String`, `Option<T>`, `Vec<T>`,
//!   `VecDeque<T>` and, via [`crate::reflect_struct!`], for user structs
//! - [`MemberValue`]: accessor normalization (nullable members traffic in
//!   their underlying value; absence is `None`)
//! - [`type_info_of`]: the global interning registry
//!
//! # Value convention
//!
//! Erased accessors always box the *underlying* value type: a getter for an
//! `Option<String>` member yields `None` when the member is absent and a
//! boxed `String` otherwise, never a boxed `Option<String>`. Setters accept
//! the same shape; writing `None` to a non-nullable member resets it to its
//! default value.

mod macros;
mod primitives;

use std::any::{Any, TypeId};
use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};

use crossbeam_skiplist::SkipMap;
use strum::Display;

use crate::Result;

/// A vector that holds the member table of a type.
pub type MemberList = Arc<boxcar::Vec<MemberInfo>>;

/// Erased member read accessor.
///
/// Returns `Ok(None)` when the member value is absent (a nullable member
/// holding nothing); otherwise the boxed underlying value.
pub type Getter = fn(&dyn Any) -> Result<Option<Box<dyn Any>>>;

/// Erased member write accessor.
///
/// `None` writes the member's default value (absent for nullable members,
/// the zero/default value otherwise).
pub type Setter = fn(&mut dyn Any, Option<Box<dyn Any>>) -> Result<()>;

/// Lazy link to another type's interned [`TypeInfo`].
pub type InfoFn = fn() -> &'static TypeInfo;

/// Erased default constructor.
pub type DefaultCtor = fn() -> Box<dyn Any>;

/// Erased clone of a value behind `&dyn Any`.
pub type CloneFn = fn(&dyn Any) -> Result<Box<dyn Any>>;

/// What kind of member a [`MemberDescriptor`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum MemberKind {
    /// A plain data field
    Field,
    /// An accessor-backed property
    Property,
    /// A zero-argument method surfaced as a read-only member
    Method,
}

/// The fundamental shape of a type, driving plan-builder dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TypeShape {
    /// Primitives, `char`, `String` - mapped by copy or scalar conversion
    Scalar,
    /// A type with a member table - mapped member by member
    Struct,
    /// An ordered collection with an element type
    Sequence,
    /// A parameter sink - destinations that only receive read values
    Sink,
}

/// Abstract record for a field-or-property of a type.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    /// Member name as declared
    pub name: &'static str,
    /// Name of the type declaring the member
    pub declaring_type: &'static str,
    /// Field, property, or surfaced method
    pub kind: MemberKind,
    /// Type id of the declared member value type
    pub value_type: TypeId,
    /// Name of the declared member value type
    pub value_type_name: &'static str,
    /// Whether the member can be read
    pub readable: bool,
    /// Whether the member can be written
    pub writable: bool,
}

/// One entry of a type's member table: descriptor plus erased accessors.
#[derive(Clone)]
pub struct MemberInfo {
    /// The descriptor consumers introspect
    pub descriptor: MemberDescriptor,
    /// Read accessor, present when the member is readable
    pub getter: Option<Getter>,
    /// Write accessor, present when the member is writable
    pub setter: Option<Setter>,
    /// Link to the declared value type's interned info
    pub value_info: InfoFn,
}

impl std::fmt::Debug for MemberInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberInfo")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Erased operations over a sequence-shaped type.
#[derive(Debug, Clone, Copy)]
pub struct SequenceOps {
    /// Element count
    pub len: fn(&dyn Any) -> Result<usize>,
    /// Boxed clones of all elements, in iteration order
    pub iter: fn(&dyn Any) -> Result<Vec<Box<dyn Any>>>,
    /// Build a sequence of this type from boxed elements
    pub collect: fn(Vec<Box<dyn Any>>) -> Result<Box<dyn Any>>,
    /// Whole-sequence shallow copy
    pub clone_whole: CloneFn,
}

/// Interned description of a type participating in mapping.
///
/// One instance exists per type per process, created on first use and shared
/// as `&'static` (see [`type_info_of`]). All fields are immutable after
/// construction.
pub struct TypeInfo {
    /// The type's id
    pub id: TypeId,
    /// The type's full name
    pub name: &'static str,
    /// Fundamental shape
    pub shape: TypeShape,
    /// Whether the type has value semantics (copyable scalar)
    pub is_value_type: bool,
    /// For `Option<T>`: link to `T`'s info
    pub underlying: Option<InfoFn>,
    /// Zero-argument constructor, when the type has one
    pub default_ctor: Option<DefaultCtor>,
    /// Erased clone of a value of this type
    pub clone_value: Option<CloneFn>,
    /// The member table (empty for scalars and sequences)
    pub members: MemberList,
    /// For sequences: link to the element type's info
    pub element: Option<InfoFn>,
    /// For sequences: erased sequence operations
    pub sequence: Option<SequenceOps>,
}

impl TypeInfo {
    /// Whether the type is a nullable wrapper (`Option<T>`).
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.underlying.is_some()
    }

    /// Whether the type is an ordered collection.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.shape == TypeShape::Sequence
    }

    /// Whether the type can be default-constructed.
    #[must_use]
    pub fn has_default_constructor(&self) -> bool {
        self.default_ctor.is_some()
    }

    /// The wrapped type's info for nullable wrappers.
    #[must_use]
    pub fn underlying(&self) -> Option<&'static TypeInfo> {
        self.underlying.map(|f| f())
    }

    /// The info conversions resolve against: the underlying type for
    /// nullable wrappers, the type itself otherwise.
    #[must_use]
    pub fn effective(&'static self) -> &'static TypeInfo {
        self.underlying().unwrap_or(self)
    }

    /// Enumerate the type's public members, de-duplicated by name.
    ///
    /// Duplicates prefer the entry that is both readable and writable, else
    /// the first encountered. Surfaced methods are only included when
    /// `include_methods` is set (the configuration's method-mapping flag).
    #[must_use]
    pub fn public_members(&self, include_methods: bool) -> Vec<&MemberInfo> {
        let mut result: Vec<&MemberInfo> = Vec::new();
        for (_, member) in self.members.iter() {
            if member.descriptor.kind == MemberKind::Method && !include_methods {
                continue;
            }
            match result
                .iter()
                .position(|m| m.descriptor.name == member.descriptor.name)
            {
                Some(at) => {
                    let existing = result[at];
                    let existing_rw = existing.descriptor.readable && existing.descriptor.writable;
                    let candidate_rw = member.descriptor.readable && member.descriptor.writable;
                    if candidate_rw && !existing_rw {
                        result[at] = member;
                    }
                }
                None => result.push(member),
            }
        }
        result
    }
}

impl std::fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("members", &self.members.count())
            .finish_non_exhaustive()
    }
}

/// A type that exposes a static member table to the mapping engine.
///
/// Implemented for scalars, `String`, `Option<T>`, `Vec<T>` and
/// `VecDeque<T>` out of the box; user structs implement it through the
/// [`crate::reflect_struct!`] macro. The table is built at most once per
/// process and interned by [`type_info_of`].
pub trait Reflect: Any {
    /// Build the type's member table.
    ///
    /// Called once per process by the interning registry; do not call this
    /// directly, use [`type_info_of`] instead.
    fn build_type_info() -> TypeInfo
    where
        Self: Sized;
}

/// Accessor normalization for member value types.
///
/// Bridges a concrete member slot and the erased accessor convention:
/// nullable members expose their underlying value, absence travels as
/// `None`, and writing `None` resets the slot to its default.
pub trait MemberValue: Sized + 'static {
    /// Boxed clone of the slot's value, `None` when absent.
    fn get_boxed(&self) -> Option<Box<dyn Any>>;

    /// Build a slot value from a boxed underlying value; `None` yields the
    /// default (absent for nullable slots, the zero value otherwise).
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeMismatch`] if the boxed value is not of
    /// the underlying type.
    fn from_boxed(value: Option<Box<dyn Any>>) -> Result<Self>;

    /// Interned info of the declared slot type.
    fn declared_info() -> &'static TypeInfo;
}

/// Global registry of interned [`TypeInfo`] values.
static INFOS: OnceLock<SkipMap<TypeId, &'static TypeInfo>> = OnceLock::new();

/// Get the interned [`TypeInfo`] for `T`, building it on first use.
///
/// Concurrent first lookups may build the table twice; exactly one instance
/// wins the registry slot and is returned to every caller thereafter.
#[must_use]
pub fn type_info_of<T: Reflect>() -> &'static TypeInfo {
    let registry = INFOS.get_or_init(SkipMap::new);
    if let Some(entry) = registry.get(&TypeId::of::<T>()) {
        return *entry.value();
    }

    let info: &'static TypeInfo = Box::leak(Box::new(T::build_type_info()));
    *registry.get_or_insert(TypeId::of::<T>(), info).value()
}

/// Clone a value of type `T` behind `&dyn Any`.
///
/// The standard [`CloneFn`] implementation used by the built-in `Reflect`
/// impls and the struct macro.
///
/// # Errors
/// Returns [`crate::Error::TypeMismatch`] if `value` is not a `T`.
pub fn clone_erased<T: Clone + 'static>(value: &dyn Any) -> Result<Box<dyn Any>> {
    value
        .downcast_ref::<T>()
        .map(|v| Box::new(v.clone()) as Box<dyn Any>)
        .ok_or_else(|| crate::Error::mismatch::<T>("clone_erased"))
}

/// Box a default value of type `T`.
pub fn default_erased<T: Default + 'static>() -> Box<dyn Any> {
    Box::new(T::default())
}

/// A destination that only receives values read from a source.
///
/// Mapping into a `ParamSink` produces a plan of read-only leaves: the
/// executor records `(member name, value)` pairs in declaration order
/// instead of writing destination members. The SQL adapter uses this to
/// extract bind-parameter values from an object.
#[derive(Debug, Default)]
pub struct ParamSink {
    /// Recorded `(member name, value)` pairs, in plan declaration order
    pub values: Vec<(String, Option<Box<dyn Any>>)>,
}

impl ParamSink {
    /// Take the recorded value for `name`, if any.
    pub fn take(&mut self, name: &str) -> Option<Option<Box<dyn Any>>> {
        self.values
            .iter()
            .position(|(n, _)| n == name)
            .map(|at| self.values.remove(at).1)
    }
}

impl Reflect for ParamSink {
    fn build_type_info() -> TypeInfo {
        TypeInfo {
            id: TypeId::of::<ParamSink>(),
            name: std::any::type_name::<ParamSink>(),
            shape: TypeShape::Sink,
            is_value_type: false,
            underlying: None,
            default_ctor: Some(default_erased::<ParamSink>),
            clone_value: None,
            members: Arc::new(boxcar::Vec::new()),
            element: None,
            sequence: None,
        }
    }
}

// Blanket sequence support for the two container shapes the engine maps:
// `Vec` is the array side, `VecDeque` the collection side of the sequence
// converter's worked example. Both share the erased op set below.

fn sequence_info<C, E>(ops: SequenceOps) -> TypeInfo
where
    C: Any + Default + Clone,
    E: Reflect,
{
    TypeInfo {
        id: TypeId::of::<C>(),
        name: std::any::type_name::<C>(),
        shape: TypeShape::Sequence,
        is_value_type: false,
        underlying: None,
        default_ctor: Some(default_erased::<C>),
        clone_value: Some(clone_erased::<C>),
        members: Arc::new(boxcar::Vec::new()),
        element: Some(type_info_of::<E>),
        sequence: Some(ops),
    }
}

impl<E: Reflect + Clone> Reflect for Vec<E> {
    fn build_type_info() -> TypeInfo {
        sequence_info::<Vec<E>, E>(SequenceOps {
            len: |v| {
                v.downcast_ref::<Vec<E>>()
                    .map(Vec::len)
                    .ok_or_else(|| crate::Error::mismatch::<Vec<E>>("sequence len"))
            },
            iter: |v| {
                let seq = v
                    .downcast_ref::<Vec<E>>()
                    .ok_or_else(|| crate::Error::mismatch::<Vec<E>>("sequence iter"))?;
                Ok(seq
                    .iter()
                    .map(|e| Box::new(e.clone()) as Box<dyn Any>)
                    .collect())
            },
            collect: |items| {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(
                        *item
                            .downcast::<E>()
                            .map_err(|_| crate::Error::mismatch::<E>("sequence collect"))?,
                    );
                }
                Ok(Box::new(out))
            },
            clone_whole: clone_erased::<Vec<E>>,
        })
    }
}

impl<E: Reflect + Clone> Reflect for VecDeque<E> {
    fn build_type_info() -> TypeInfo {
        sequence_info::<VecDeque<E>, E>(SequenceOps {
            len: |v| {
                v.downcast_ref::<VecDeque<E>>()
                    .map(VecDeque::len)
                    .ok_or_else(|| crate::Error::mismatch::<VecDeque<E>>("sequence len"))
            },
            iter: |v| {
                let seq = v
                    .downcast_ref::<VecDeque<E>>()
                    .ok_or_else(|| crate::Error::mismatch::<VecDeque<E>>("sequence iter"))?;
                Ok(seq
                    .iter()
                    .map(|e| Box::new(e.clone()) as Box<dyn Any>)
                    .collect())
            },
            collect: |items| {
                let mut out = VecDeque::with_capacity(items.len());
                for item in items {
                    out.push_back(
                        *item
                            .downcast::<E>()
                            .map_err(|_| crate::Error::mismatch::<E>("sequence collect"))?,
                    );
                }
                Ok(Box::new(out))
            },
            clone_whole: clone_erased::<VecDeque<E>>,
        })
    }
}

impl<E: Reflect + Clone> MemberValue for Vec<E> {
    fn get_boxed(&self) -> Option<Box<dyn Any>> {
        Some(Box::new(self.clone()))
    }

    fn from_boxed(value: Option<Box<dyn Any>>) -> Result<Self> {
        match value {
            Some(v) => Ok(*v
                .downcast::<Vec<E>>()
                .map_err(|_| crate::Error::mismatch::<Vec<E>>("member write"))?),
            None => Ok(Vec::new()),
        }
    }

    fn declared_info() -> &'static TypeInfo {
        type_info_of::<Vec<E>>()
    }
}

impl<E: Reflect + Clone> MemberValue for VecDeque<E> {
    fn get_boxed(&self) -> Option<Box<dyn Any>> {
        Some(Box::new(self.clone()))
    }

    fn from_boxed(value: Option<Box<dyn Any>>) -> Result<Self> {
        match value {
            Some(v) => Ok(*v
                .downcast::<VecDeque<E>>()
                .map_err(|_| crate::Error::mismatch::<VecDeque<E>>("member write"))?),
            None => Ok(VecDeque::new()),
        }
    }

    fn declared_info() -> &'static TypeInfo {
        type_info_of::<VecDeque<E>>()
    }
}

impl<T: Reflect + Clone> Reflect for Option<T> {
    fn build_type_info() -> TypeInfo {
        let inner = type_info_of::<T>();
        TypeInfo {
            id: TypeId::of::<Option<T>>(),
            name: std::any::type_name::<Option<T>>(),
            shape: inner.shape,
            is_value_type: false,
            underlying: Some(type_info_of::<T>),
            default_ctor: Some(default_erased::<Option<T>>),
            clone_value: Some(clone_erased::<Option<T>>),
            members: Arc::clone(&inner.members),
            element: inner.element,
            sequence: inner.sequence,
        }
    }
}

impl<T: Reflect + Clone> MemberValue for Option<T> {
    fn get_boxed(&self) -> Option<Box<dyn Any>> {
        self.as_ref().map(|v| Box::new(v.clone()) as Box<dyn Any>)
    }

    fn from_boxed(value: Option<Box<dyn Any>>) -> Result<Self> {
        match value {
            Some(v) => Ok(Some(
                *v.downcast::<T>()
                    .map_err(|_| crate::Error::mismatch::<T>("member write"))?,
            )),
            None => Ok(None),
        }
    }

    fn declared_info() -> &'static TypeInfo {
        type_info_of::<Option<T>>()
    }
}

//! Mapping operations: the data model a plan is made of.
//!
//! A plan is a [`RootOperation`] holding a tree of [`MapOperation`] nodes.
//! The tree is immutable after the builder returns it; executors either
//! interpret it directly or compile it into something faster. Operations
//! are a tagged sum with per-variant execution, not a class hierarchy.

mod builder;

pub use builder::PlanBuilder;

use std::sync::Arc;

use strum::Display;

use crate::config::{
    NullSubstitutor, PlanFlags, PostProcessor, TargetConstructor, ValueFilter,
};
use crate::convert::{Converter, ScalarFn};
use crate::reflect::{DefaultCtor, Getter, MemberDescriptor, Setter, TypeInfo};

/// The converter bound to a simple leaf.
#[derive(Clone)]
pub enum MemberConverter {
    /// An erased scalar function (typed or static registration)
    Scalar(ScalarFn),
    /// A provider-built converter instance
    Custom(Arc<dyn Converter>),
}

impl std::fmt::Debug for MemberConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberConverter::Scalar(_) => f.write_str("Scalar"),
            MemberConverter::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Leaf: copy one member, with optional conversion, substitution and
/// filtering.
#[derive(Clone)]
pub struct ReadWriteSimple {
    /// Source member being read
    pub source: MemberDescriptor,
    /// Destination member being written
    pub destination: MemberDescriptor,
    /// Source read accessor
    pub getter: Getter,
    /// Destination write accessor
    pub setter: Setter,
    /// Value conversion, when source and destination types differ
    pub converter: Option<MemberConverter>,
    /// Substitution for absent source values
    pub null_substitutor: Option<NullSubstitutor>,
    /// Custom construction for absent values with no substitutor
    pub target_constructor: Option<TargetConstructor>,
    /// Source-side veto
    pub source_filter: Option<ValueFilter>,
    /// Destination-side veto
    pub destination_filter: Option<ValueFilter>,
}

/// Node: recurse into a nested object destination.
#[derive(Clone)]
pub struct ReadWriteComplex {
    /// Source member being read
    pub source: MemberDescriptor,
    /// Destination member being written
    pub destination: MemberDescriptor,
    /// Source read accessor
    pub getter: Getter,
    /// Destination write accessor
    pub setter: Setter,
    /// Custom construction of the intermediate destination value
    pub target_constructor: Option<TargetConstructor>,
    /// Fallback default construction of the intermediate value
    pub default_ctor: Option<DefaultCtor>,
    /// Replaces the finished intermediate value
    pub values_post_processor: Option<PostProcessor>,
    /// The nested plan
    pub operations: Vec<MapOperation>,
}

/// Node: grouping only, no behavior of its own.
#[derive(Clone, Default)]
pub struct OperationsBlock {
    /// The grouped operations, executed in order
    pub operations: Vec<MapOperation>,
}

/// Leaf: read a source member into a parameter sink.
#[derive(Clone)]
pub struct SrcRead {
    /// Source member being read
    pub source: MemberDescriptor,
    /// Source read accessor
    pub getter: Getter,
}

/// Leaf: a destination write slot for non-object destinations.
///
/// Carried for consumers that enumerate plan metadata; the interpreting
/// executor treats it as a no-op.
#[derive(Clone)]
pub struct DstWrite {
    /// Destination member being written
    pub destination: MemberDescriptor,
    /// Destination write accessor
    pub setter: Setter,
}

/// One node of a mapping plan.
#[derive(Clone)]
pub enum MapOperation {
    /// Copy one member
    Simple(ReadWriteSimple),
    /// Recurse into a nested destination
    Complex(ReadWriteComplex),
    /// Grouping
    Block(OperationsBlock),
    /// Read-only leaf for parameter sinks
    SrcRead(SrcRead),
    /// Write-only leaf for non-object destinations
    DstWrite(DstWrite),
}

impl std::fmt::Debug for MapOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapOperation::Simple(op) => write!(
                f,
                "Simple({} -> {})",
                op.source.name, op.destination.name
            ),
            MapOperation::Complex(op) => write!(
                f,
                "Complex({} -> {}, {} ops)",
                op.source.name,
                op.destination.name,
                op.operations.len()
            ),
            MapOperation::Block(op) => write!(f, "Block({} ops)", op.operations.len()),
            MapOperation::SrcRead(op) => write!(f, "SrcRead({})", op.source.name),
            MapOperation::DstWrite(op) => write!(f, "DstWrite({})", op.destination.name),
        }
    }
}

/// The root of every plan: whole-object policies plus the operation list.
#[derive(Clone)]
pub struct RootOperation {
    /// Source type of the plan
    pub from: &'static TypeInfo,
    /// Destination type of the plan
    pub to: &'static TypeInfo,
    /// Plan flags snapshot from the configuration
    pub flags: PlanFlags,
    /// Whole-object converter; when present the operation list is empty
    pub converter: Option<Arc<dyn Converter>>,
    /// Custom destination construction
    pub target_constructor: Option<TargetConstructor>,
    /// Whole-object substitution for absent sources
    pub null_substitutor: Option<NullSubstitutor>,
    /// Replaces the finished destination
    pub values_post_processor: Option<PostProcessor>,
    /// Whole-object source-side veto
    pub source_filter: Option<ValueFilter>,
    /// Whole-object destination-side veto
    pub destination_filter: Option<ValueFilter>,
    /// Member operations, in declaration order
    pub operations: Vec<MapOperation>,
}

impl std::fmt::Debug for RootOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootOperation")
            .field("from", &self.from.name)
            .field("to", &self.to.name)
            .field("flags", &self.flags)
            .field("converter", &self.converter.is_some())
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

/// Kind tag of a flattened leaf operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StoredOperationKind {
    /// A [`ReadWriteSimple`] leaf
    ReadWriteSimple,
    /// A [`SrcRead`] leaf
    SrcRead,
    /// A [`DstWrite`] leaf
    DstWrite,
}

/// Metadata view of one leaf operation, for external consumers.
#[derive(Debug, Clone)]
pub struct StoredOperation {
    /// Which leaf variant this entry describes
    pub kind: StoredOperationKind,
    /// Source member, absent for write-only leaves
    pub source: Option<MemberDescriptor>,
    /// Destination member, absent for read-only leaves
    pub destination: Option<MemberDescriptor>,
}

impl RootOperation {
    /// Flatten the plan's leaf operations in declaration order.
    ///
    /// Complex nodes contribute their nested leaves; blocks are transparent.
    /// The order is stable for a fixed plan, which external consumers (the
    /// SQL adapter) rely on.
    #[must_use]
    pub fn stored_operations(&self) -> Vec<StoredOperation> {
        fn walk(ops: &[MapOperation], out: &mut Vec<StoredOperation>) {
            for op in ops {
                match op {
                    MapOperation::Simple(leaf) => out.push(StoredOperation {
                        kind: StoredOperationKind::ReadWriteSimple,
                        source: Some(leaf.source.clone()),
                        destination: Some(leaf.destination.clone()),
                    }),
                    MapOperation::Complex(node) => walk(&node.operations, out),
                    MapOperation::Block(block) => walk(&block.operations, out),
                    MapOperation::SrcRead(leaf) => out.push(StoredOperation {
                        kind: StoredOperationKind::SrcRead,
                        source: Some(leaf.source.clone()),
                        destination: None,
                    }),
                    MapOperation::DstWrite(leaf) => out.push(StoredOperation {
                        kind: StoredOperationKind::DstWrite,
                        source: None,
                        destination: Some(leaf.destination.clone()),
                    }),
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.operations, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{type_info_of, MemberKind};
    use std::any::{Any, TypeId};

    fn descriptor(name: &'static str) -> MemberDescriptor {
        MemberDescriptor {
            name,
            declaring_type: "test",
            kind: MemberKind::Field,
            value_type: TypeId::of::<i32>(),
            value_type_name: "i32",
            readable: true,
            writable: true,
        }
    }

    fn stub_getter(_src: &dyn Any) -> crate::Result<Option<Box<dyn Any>>> {
        Ok(None)
    }

    fn stub_setter(_dst: &mut dyn Any, _value: Option<Box<dyn Any>>) -> crate::Result<()> {
        Ok(())
    }

    #[test]
    fn test_stored_operations_flatten_blocks() {
        let root = RootOperation {
            from: type_info_of::<i32>(),
            to: type_info_of::<i32>(),
            flags: PlanFlags::empty(),
            converter: None,
            target_constructor: None,
            null_substitutor: None,
            values_post_processor: None,
            source_filter: None,
            destination_filter: None,
            operations: vec![MapOperation::Block(OperationsBlock {
                operations: vec![
                    MapOperation::SrcRead(SrcRead {
                        source: descriptor("a"),
                        getter: stub_getter,
                    }),
                    MapOperation::DstWrite(DstWrite {
                        destination: descriptor("b"),
                        setter: stub_setter,
                    }),
                ],
            })],
        };

        let leaves = root.stored_operations();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].kind, StoredOperationKind::SrcRead);
        assert_eq!(leaves[0].source.as_ref().unwrap().name, "a");
        assert_eq!(leaves[1].kind, StoredOperationKind::DstWrite);
        assert_eq!(leaves[1].destination.as_ref().unwrap().name, "b");
    }
}

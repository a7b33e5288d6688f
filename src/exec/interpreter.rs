//! The interpreting executor: runs an operation tree directly.

use std::any::Any;
use std::sync::Arc;

use crate::exec::{MappingState, ObjectMapper, PlanCompiler};
use crate::manager::MapperManager;
use crate::plan::{
    MapOperation, MemberConverter, ReadWriteComplex, ReadWriteSimple, RootOperation,
    StoredOperation,
};
use crate::reflect::{ParamSink, TypeInfo};
use crate::{Error, Result};

/// The default [`PlanCompiler`]: wraps the plan in an interpreter.
pub struct InterpreterCompiler;

impl PlanCompiler for InterpreterCompiler {
    fn compile(
        &self,
        plan: RootOperation,
        _manager: &MapperManager,
    ) -> Result<Arc<dyn ObjectMapper>> {
        let leaves = plan.stored_operations();
        Ok(Arc::new(InterpretedMapper { plan, leaves }))
    }
}

/// Executor that walks the operation tree per `map` call.
///
/// Holds the immutable plan plus a pre-flattened leaf list; it carries no
/// mutable state, so concurrent invocations are safe.
struct InterpretedMapper {
    plan: RootOperation,
    leaves: Vec<StoredOperation>,
}

impl ObjectMapper for InterpretedMapper {
    fn from_type(&self) -> &'static TypeInfo {
        self.plan.from
    }

    fn to_type(&self) -> &'static TypeInfo {
        self.plan.to
    }

    fn create_target(&self, state: &MappingState) -> Result<Option<Box<dyn Any>>> {
        if let Some(ctor) = &self.plan.target_constructor {
            return Ok(Some(ctor(state)));
        }
        Ok(self.plan.to.default_ctor.map(|ctor| ctor()))
    }

    fn map(
        &self,
        src: &dyn Any,
        dst: Option<Box<dyn Any>>,
        state: &MappingState,
    ) -> Result<Box<dyn Any>> {
        let mut dst = match dst {
            Some(existing) => existing,
            None => self
                .create_target(state)?
                .ok_or(Error::MissingConstructor(self.plan.to.name))?,
        };

        if let Some(filter) = &self.plan.source_filter {
            if !filter(src, state) {
                return Ok(dst);
            }
        }

        if let Some(converter) = &self.plan.converter {
            let clone_value = self.plan.from.clone_value.ok_or_else(|| {
                plan_error!("source type {} does not support cloning", self.plan.from.name)
            })?;
            match converter.convert(Some(clone_value(src)?), state)? {
                Some(converted) => {
                    let vetoed = self
                        .plan
                        .destination_filter
                        .as_ref()
                        .is_some_and(|filter| !filter(converted.as_ref(), state));
                    if !vetoed {
                        dst = converted;
                    }
                }
                None => {
                    if let Some(substitutor) = &self.plan.null_substitutor {
                        dst = substitutor(state);
                    }
                }
            }
        } else {
            self.run_operations(&self.plan.operations, src, dst.as_mut(), state)?;
        }

        if let Some(post) = &self.plan.values_post_processor {
            dst = post(dst, state)?;
        }

        Ok(dst)
    }

    fn stored_operations(&self) -> &[StoredOperation] {
        &self.leaves
    }
}

impl InterpretedMapper {
    fn run_operations(
        &self,
        operations: &[MapOperation],
        src: &dyn Any,
        dst: &mut dyn Any,
        state: &MappingState,
    ) -> Result<()> {
        for operation in operations {
            match operation {
                MapOperation::Simple(leaf) => self.exec_simple(leaf, src, dst, state)?,
                MapOperation::Complex(node) => self.exec_complex(node, src, dst, state)?,
                MapOperation::Block(block) => {
                    self.run_operations(&block.operations, src, dst, state)?;
                }
                MapOperation::SrcRead(leaf) => {
                    let value = (leaf.getter)(src)?;
                    let sink = dst
                        .downcast_mut::<ParamSink>()
                        .ok_or_else(|| Error::mismatch::<ParamSink>("sink write"))?;
                    sink.values.push((leaf.source.name.to_string(), value));
                }
                // Metadata-only: consumed by stored-operation readers.
                MapOperation::DstWrite(_) => {}
            }
        }
        Ok(())
    }

    fn exec_simple(
        &self,
        leaf: &ReadWriteSimple,
        src: &dyn Any,
        dst: &mut dyn Any,
        state: &MappingState,
    ) -> Result<()> {
        let mut value = (leaf.getter)(src)?;

        if let (Some(present), Some(filter)) = (&value, &leaf.source_filter) {
            if !filter(present.as_ref(), state) {
                return Ok(());
            }
        }

        if value.is_none() {
            if let Some(substitutor) = &leaf.null_substitutor {
                value = Some(substitutor(state));
            } else if let Some(ctor) = &leaf.target_constructor {
                value = Some(ctor(state));
            }
        } else if let Some(converter) = &leaf.converter {
            value = match converter {
                MemberConverter::Scalar(func) => value.map(|v| func(v)).transpose()?,
                MemberConverter::Custom(custom) => custom.convert(value, state)?,
            };
        }

        if let (Some(present), Some(filter)) = (&value, &leaf.destination_filter) {
            if !filter(present.as_ref(), state) {
                return Ok(());
            }
        }

        (leaf.setter)(dst, value)
    }

    fn exec_complex(
        &self,
        node: &ReadWriteComplex,
        src: &dyn Any,
        dst: &mut dyn Any,
        state: &MappingState,
    ) -> Result<()> {
        match (node.getter)(src)? {
            None => (node.setter)(dst, None),
            Some(nested_src) => {
                let mut intermediate = match &node.target_constructor {
                    Some(ctor) => ctor(state),
                    None => node
                        .default_ctor
                        .map(|ctor| ctor())
                        .ok_or(Error::MissingConstructor(node.destination.value_type_name))?,
                };
                self.run_operations(
                    &node.operations,
                    nested_src.as_ref(),
                    intermediate.as_mut(),
                    state,
                )?;
                if let Some(post) = &node.values_post_processor {
                    intermediate = post(intermediate, state)?;
                }
                (node.setter)(dst, Some(intermediate))
            }
        }
    }
}

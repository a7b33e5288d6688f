//! The mapping-plan builder.
//!
//! Walks a `(source, destination)` type pair member by member and emits the
//! operation tree the executor runs. All policy resolution happens here, at
//! construction time: converters, substitutors, constructors and filters are
//! looked up once and bound into the plan, so executing a leaf never
//! consults the configuration again.
//!
//! # Resolution order
//!
//! For a member pair (and for the root pair itself) the builder resolves a
//! conversion in this order:
//!
//! 1. a typed converter registered for exactly `(from, to)`
//! 2. the registered generic providers, first pattern match wins
//! 3. for scalar destinations: identity when the types agree, else the
//!    static converter registry in effect
//! 4. for struct destinations: recursion into a nested plan
//!
//! Anything else is a construction-time [`crate::Error::NoConversion`]; the
//! engine never invents implicit narrowing conversions at runtime.

use std::any::TypeId;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::config::MappingConfig;
use crate::convert::{Converter, ScalarConverter};
use crate::manager::MapperManager;
use crate::plan::{
    MapOperation, MemberConverter, ReadWriteComplex, ReadWriteSimple, RootOperation, SrcRead,
};
use crate::reflect::{MemberInfo, TypeInfo, TypeShape};
use crate::typekey::TypeKey;
use crate::{Error, Result};

fn pair_key(from: &'static TypeInfo, to: &'static TypeInfo) -> TypeKey {
    TypeKey::from_parts(vec![from.id, to.id], vec![from.name, to.name])
}

fn single_key(info: &'static TypeInfo) -> TypeKey {
    TypeKey::from_parts(vec![info.id], vec![info.name])
}

/// Derives the operation tree for a `(source, destination, configuration)`
/// triple. One builder instance serves one `build` call; sub-plans are
/// memoized per pair within that call and the ancestor stack guards against
/// cyclic nesting.
pub struct PlanBuilder<'a> {
    config: &'a MappingConfig,
    manager: &'a MapperManager,
    stack: Vec<(TypeId, TypeId)>,
    memo: FxHashMap<(TypeId, TypeId), Vec<MapOperation>>,
}

impl<'a> PlanBuilder<'a> {
    /// Create a builder over a configuration and the manager that owns the
    /// build (generic converters resolve sub-mappers through it).
    pub fn new(config: &'a MappingConfig, manager: &'a MapperManager) -> Self {
        PlanBuilder {
            config,
            manager,
            stack: Vec::new(),
            memo: FxHashMap::default(),
        }
    }

    /// Build the plan for mapping `from` to `to`.
    ///
    /// # Errors
    /// Returns a configuration error ([`Error::NoConversion`],
    /// [`Error::CyclicMapping`], [`Error::ProviderContract`]) when the pair
    /// cannot be covered by the configuration.
    pub fn build(
        &mut self,
        from: &'static TypeInfo,
        to: &'static TypeInfo,
    ) -> Result<RootOperation> {
        let from = from.effective();
        let to = to.effective();

        let converter = self.resolve_converter(from, to)?;
        let operations = if converter.is_some() {
            Vec::new()
        } else {
            match to.shape {
                TypeShape::Sink => self.sink_operations(from, to),
                TypeShape::Struct => {
                    if from.shape != TypeShape::Struct {
                        return Err(Error::NoConversion {
                            from: from.name,
                            to: to.name,
                        });
                    }
                    self.member_operations(from, to)?
                }
                TypeShape::Scalar | TypeShape::Sequence => {
                    return Err(Error::NoConversion {
                        from: from.name,
                        to: to.name,
                    })
                }
            }
        };

        Ok(RootOperation {
            from,
            to,
            flags: self.config.flags(),
            converter,
            target_constructor: self.config.constructor_for(&single_key(to)),
            null_substitutor: self.config.null_substitutor_for(&pair_key(from, to)),
            values_post_processor: self.config.post_processor_for(&single_key(to)),
            source_filter: self.config.source_filter_for(&single_key(from)),
            destination_filter: self.config.destination_filter_for(&single_key(to)),
            operations,
        })
    }

    /// Resolve a whole-value conversion for a pair, if one applies.
    ///
    /// Struct and sink destinations without a registered converter resolve
    /// to `None`, meaning member recursion covers them.
    fn resolve_converter(
        &mut self,
        from: &'static TypeInfo,
        to: &'static TypeInfo,
    ) -> Result<Option<Arc<dyn Converter>>> {
        if let Some(func) = self.config.converter_for(&pair_key(from, to)) {
            return Ok(Some(Arc::new(ScalarConverter::new(func))));
        }

        if let Some(converter) = self.try_providers(from, to)? {
            return Ok(Some(converter));
        }

        if to.shape == TypeShape::Scalar {
            if from.id == to.id {
                // Identity: the boxed value passes through untouched.
                return Ok(Some(Arc::new(ScalarConverter::new(Arc::new(|value| {
                    Ok(value)
                })))));
            }
            if let Some(func) = self.config.lookup_static(from.id, to.id) {
                return Ok(Some(Arc::new(ScalarConverter::new(func))));
            }
            return Err(Error::NoConversion {
                from: from.name,
                to: to.name,
            });
        }

        Ok(None)
    }

    /// Walk the registered generic providers; first pattern match wins.
    fn try_providers(
        &mut self,
        from: &'static TypeInfo,
        to: &'static TypeInfo,
    ) -> Result<Option<Arc<dyn Converter>>> {
        for entry in self.config.providers() {
            if entry.from.matches(from) && entry.to.matches(to) {
                let descriptor = entry.provider.descriptor(from, to)?;
                let mut instance = (descriptor.make)();
                instance.initialize(from, to, self.config, self.manager)?;
                return Ok(Some(Arc::from(instance)));
            }
        }
        Ok(None)
    }

    /// Emit the member operations for a struct-to-struct pair.
    fn member_operations(
        &mut self,
        from: &'static TypeInfo,
        to: &'static TypeInfo,
    ) -> Result<Vec<MapOperation>> {
        let pair = (from.id, to.id);
        if let Some(memoized) = self.memo.get(&pair) {
            return Ok(memoized.clone());
        }
        if self.stack.contains(&pair) {
            return Err(Error::CyclicMapping {
                from: from.name,
                to: to.name,
            });
        }
        self.stack.push(pair);
        let result = self.member_operations_inner(from, to);
        self.stack.pop();

        let operations = result?;
        self.memo.insert(pair, operations.clone());
        Ok(operations)
    }

    fn member_operations_inner(
        &mut self,
        from: &'static TypeInfo,
        to: &'static TypeInfo,
    ) -> Result<Vec<MapOperation>> {
        let root_pair = pair_key(from, to);
        let map_methods = self.config.flags().contains(crate::config::PlanFlags::MAP_METHODS);
        let source_members = from.public_members(map_methods);
        let mut operations = Vec::new();

        for dst in to.public_members(false) {
            if !dst.descriptor.writable || dst.setter.is_none() {
                continue;
            }
            let dst_name = self.config.stripped_name(dst.descriptor.name);
            let Some(src) = source_members.iter().copied().find(|s| {
                s.descriptor.readable
                    && s.getter.is_some()
                    && self.config.stripped_name(s.descriptor.name) == dst_name
            }) else {
                continue;
            };

            if self.config.is_ignored(&root_pair, src.descriptor.name)
                || self.config.is_ignored(&root_pair, dst.descriptor.name)
            {
                continue;
            }

            operations.push(self.member_operation(src, dst)?);
        }

        Ok(operations)
    }

    /// Emit the operation for one matched member pair.
    fn member_operation(&mut self, src: &MemberInfo, dst: &MemberInfo) -> Result<MapOperation> {
        let src_info = (src.value_info)().effective();
        let dst_info = (dst.value_info)().effective();
        let value_pair = pair_key(src_info, dst_info);

        let getter = src.getter.ok_or_else(|| {
            plan_error!("member {} is not readable", src.descriptor.name)
        })?;
        let setter = dst.setter.ok_or_else(|| {
            plan_error!("member {} is not writable", dst.descriptor.name)
        })?;

        // Typed converter or a provider-built one covers the pair as a leaf,
        // regardless of the destination shape.
        let converter = if let Some(func) = self.config.converter_for(&value_pair) {
            Some(MemberConverter::Scalar(func))
        } else if let Some(custom) = self.try_providers(src_info, dst_info)? {
            Some(MemberConverter::Custom(custom))
        } else {
            None
        };

        if converter.is_none() && dst_info.shape == TypeShape::Struct {
            if src_info.shape != TypeShape::Struct {
                return Err(Error::NoConversion {
                    from: src_info.name,
                    to: dst_info.name,
                });
            }
            let operations = self.member_operations(src_info, dst_info)?;
            return Ok(MapOperation::Complex(ReadWriteComplex {
                source: src.descriptor.clone(),
                destination: dst.descriptor.clone(),
                getter,
                setter,
                target_constructor: self.config.constructor_for(&single_key(dst_info)),
                default_ctor: dst_info.default_ctor,
                values_post_processor: self.config.post_processor_for(&single_key(dst_info)),
                operations,
            }));
        }

        let converter = match converter {
            Some(found) => Some(found),
            None if src_info.id == dst_info.id => None,
            None if dst_info.shape == TypeShape::Scalar => Some(MemberConverter::Scalar(
                self.config
                    .lookup_static(src_info.id, dst_info.id)
                    .ok_or(Error::NoConversion {
                        from: src_info.name,
                        to: dst_info.name,
                    })?,
            )),
            None => {
                return Err(Error::NoConversion {
                    from: src_info.name,
                    to: dst_info.name,
                })
            }
        };

        Ok(MapOperation::Simple(ReadWriteSimple {
            source: src.descriptor.clone(),
            destination: dst.descriptor.clone(),
            getter,
            setter,
            converter,
            null_substitutor: self.config.null_substitutor_for(&value_pair),
            target_constructor: self.config.constructor_for(&single_key(dst_info)),
            source_filter: self.config.source_filter_for(&single_key(src_info)),
            destination_filter: self.config.destination_filter_for(&single_key(dst_info)),
        }))
    }

    /// Emit the read-only plan for a parameter-sink destination.
    fn sink_operations(
        &mut self,
        from: &'static TypeInfo,
        to: &'static TypeInfo,
    ) -> Vec<MapOperation> {
        let root_pair = pair_key(from, to);
        let map_methods = self.config.flags().contains(crate::config::PlanFlags::MAP_METHODS);
        from.public_members(map_methods)
            .into_iter()
            .filter(|m| m.descriptor.readable)
            .filter(|m| !self.config.is_ignored(&root_pair, m.descriptor.name))
            .filter_map(|m| {
                m.getter.map(|getter| {
                    MapOperation::SrcRead(SrcRead {
                        source: m.descriptor.clone(),
                        getter,
                    })
                })
            })
            .collect()
    }
}

//! Collection-to-array conversion: the built-in generic converter.
//!
//! Registered by default for any `(sequence, sequence)` pair. Two shapes:
//!
//! - **Same-element fast path** - when the element types agree and either
//!   the element is a value type or the plan carries
//!   [`PlanFlags::SHALLOW_COPY`](crate::config::PlanFlags::SHALLOW_COPY),
//!   the conversion is a linear copy preserving element identity.
//! - **Different-element path** - an element-level conversion is resolved
//!   in order: the configuration's static converter registry, the
//!   process-default registry, and finally a sub-mapper produced by the
//!   owning manager for the element pair under the same configuration.
//!
//! An absent input collection passes through as an absent output.

use std::any::Any;
use std::sync::{Arc, OnceLock};

use crate::config::{MappingConfig, PlanFlags};
use crate::convert::{Converter, ConverterDescriptor, ConverterProvider, ScalarFn};
use crate::exec::{MappingState, ObjectMapper};
use crate::manager::MapperManager;
use crate::reflect::{SequenceOps, TypeInfo};
use crate::typekey::TypeKey;
use crate::{Error, Result};

/// Provider matching any sequence-to-sequence pair.
pub struct SequenceConverterProvider;

impl ConverterProvider for SequenceConverterProvider {
    fn name(&self) -> &'static str {
        "sequence"
    }

    fn descriptor(
        &self,
        from: &'static TypeInfo,
        to: &'static TypeInfo,
    ) -> Result<ConverterDescriptor> {
        let (Some(from_element), Some(to_element)) =
            (from.effective().element, to.effective().element)
        else {
            return Err(Error::ProviderContract {
                provider: "sequence",
                message: format!("{} -> {} is not a sequence pair", from.name, to.name),
            });
        };
        let from_element = from_element();
        let to_element = to_element();

        Ok(ConverterDescriptor {
            impl_name: "SequenceConverter",
            type_args: TypeKey::from_parts(
                vec![from_element.id, to_element.id],
                vec![from_element.name, to_element.name],
            ),
            make: Box::new(|| Box::new(SequenceConverter::new())),
        })
    }
}

/// How each element travels from source to destination sequence.
enum ElementMode {
    /// Linear copy preserving element identity
    Shallow,
    /// A static registry conversion applied per element
    Static(ScalarFn),
    /// A sub-mapper for the element pair, resolved lazily on first use
    Mapped(SubMapper),
}

/// Lazily resolved element sub-mapper.
///
/// Resolution is deferred to the first `convert` call: the parent mapper's
/// cache entry is complete by then, so self-referential element types (a
/// struct holding a collection of itself) resolve against the cache instead
/// of recursing into an in-flight build.
struct SubMapper {
    manager: MapperManager,
    config: MappingConfig,
    from: &'static TypeInfo,
    to: &'static TypeInfo,
    cell: OnceLock<std::result::Result<Arc<dyn ObjectMapper>, Arc<Error>>>,
}

impl SubMapper {
    fn get(&self) -> Result<Arc<dyn ObjectMapper>> {
        let outcome = self.cell.get_or_init(|| {
            self.manager
                .get_by_info(self.from, self.to, &self.config)
                .map_err(Arc::new)
        });
        match outcome {
            Ok(mapper) => Ok(mapper.clone()),
            Err(error) => Err(Error::Shared(error.clone())),
        }
    }
}

/// The collection-to-array converter instance.
///
/// Constructed by [`SequenceConverterProvider`] and initialized by the plan
/// builder with the concrete sequence pair.
pub struct SequenceConverter {
    from_ops: Option<SequenceOps>,
    to_ops: Option<SequenceOps>,
    same_container: bool,
    mode: Option<ElementMode>,
}

impl SequenceConverter {
    /// Create an uninitialized instance.
    #[must_use]
    pub fn new() -> Self {
        SequenceConverter {
            from_ops: None,
            to_ops: None,
            same_container: false,
            mode: None,
        }
    }

    fn ops(&self) -> Result<(&SequenceOps, &SequenceOps, &ElementMode)> {
        match (&self.from_ops, &self.to_ops, &self.mode) {
            (Some(from), Some(to), Some(mode)) => Ok((from, to, mode)),
            _ => Err(plan_error!("sequence converter used before initialization")),
        }
    }
}

impl Default for SequenceConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for SequenceConverter {
    fn initialize(
        &mut self,
        from: &'static TypeInfo,
        to: &'static TypeInfo,
        config: &MappingConfig,
        manager: &MapperManager,
    ) -> Result<()> {
        let from = from.effective();
        let to = to.effective();

        let (Some(from_ops), Some(to_ops), Some(from_element), Some(to_element)) =
            (from.sequence, to.sequence, from.element, to.element)
        else {
            return Err(Error::ProviderContract {
                provider: "sequence",
                message: format!("{} -> {} is not a sequence pair", from.name, to.name),
            });
        };
        let from_element = from_element();
        let to_element = to_element();

        self.from_ops = Some(from_ops);
        self.to_ops = Some(to_ops);
        self.same_container = from.id == to.id;

        let shallow = from_element.id == to_element.id
            && (from_element.is_value_type || config.flags().contains(PlanFlags::SHALLOW_COPY));

        self.mode = Some(if shallow {
            ElementMode::Shallow
        } else {
            match config.lookup_static(from_element.id, to_element.id) {
                Some(func) => ElementMode::Static(func),
                None => ElementMode::Mapped(SubMapper {
                    manager: manager.clone(),
                    config: config.clone(),
                    from: from_element,
                    to: to_element,
                    cell: OnceLock::new(),
                }),
            }
        });

        Ok(())
    }

    fn convert(
        &self,
        value: Option<Box<dyn Any>>,
        state: &MappingState,
    ) -> Result<Option<Box<dyn Any>>> {
        let Some(value) = value else {
            return Ok(None);
        };
        let (from_ops, to_ops, mode) = self.ops()?;

        let converted = match mode {
            ElementMode::Shallow if self.same_container => (from_ops.clone_whole)(value.as_ref())?,
            ElementMode::Shallow => {
                let items = (from_ops.iter)(value.as_ref())?;
                (to_ops.collect)(items)?
            }
            ElementMode::Static(func) => {
                let items = (from_ops.iter)(value.as_ref())?;
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(func(item)?);
                }
                (to_ops.collect)(out)?
            }
            ElementMode::Mapped(sub) => {
                let mapper = sub.get()?;
                let items = (from_ops.iter)(value.as_ref())?;
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(mapper.map(item.as_ref(), None, state)?);
                }
                (to_ops.collect)(out)?
            }
        };

        Ok(Some(converted))
    }
}

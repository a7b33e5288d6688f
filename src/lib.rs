#![deny(missing_docs)]

//! # mapforge
//!
//! An object-to-object mapping engine: given a source value of type `S` and
//! a destination type `D`, it computes an instance of `D` whose members are
//! populated from the corresponding members of `S`, applying a user-declared
//! configuration - member ignores, null substitution, custom constructors,
//! custom and generic converters, source/destination filters and
//! post-processors. Mappings are compiled once per
//! `(S, D, configuration name)` triple into an executor that is cached and
//! reused for every subsequent mapping of that triple.
//!
//! # Architecture
//!
//! The engine is organized into layers that mirror the life of a mapping
//! request:
//!
//! - **Reflection layer**: static member tables describing the types taking
//!   part in a mapping ([`crate::reflect`], the [`reflect_struct!`] macro)
//! - **Configuration layer**: user registrations and the deterministic
//!   configuration name ([`MappingConfig`])
//! - **Plan layer**: the operation tree derived for a type pair
//!   ([`crate::plan`])
//! - **Execution layer**: the executor contract and the interpreting
//!   backend ([`crate::exec`])
//! - **Manager**: the process-wide cache handing out executors
//!   ([`MapperManager`])
//! - **SQL adapter**: a consumer of plan metadata emitting `UPDATE`
//!   commands ([`crate::sql`])
//!
//! # Usage Examples
//!
//! ## Quick Start
//!
//! ```rust
//! use mapforge::{reflect_struct, MapperManager, MappingConfig};
//!
//! reflect_struct! {
//!     #[derive(Clone, Debug)]
//!     pub struct Employee {
//!         pub id: i64,
//!         pub name: String,
//!         pub nickname: Option<String>,
//!     }
//! }
//!
//! reflect_struct! {
//!     #[derive(Clone, Debug)]
//!     pub struct EmployeeDto {
//!         pub id: i64,
//!         pub name: String,
//!         pub nickname: String,
//!     }
//! }
//!
//! let config = MappingConfig::new()
//!     .null_substitution::<String, String>(|_| "n/a".to_string());
//!
//! let mapper = MapperManager::default_instance().get::<Employee, EmployeeDto>(&config)?;
//! let dto = mapper.map_value(&Employee {
//!     id: 7,
//!     name: "Ada".to_string(),
//!     nickname: None,
//! })?;
//! assert_eq!(dto.nickname, "n/a");
//! # Ok::<(), mapforge::Error>(())
//! ```
//!
//! ## Configuration
//!
//! Every aspect of a plan is declared up front on a [`MappingConfig`];
//! nothing is resolved at `map` time. Two configurations producing the same
//! [`MappingConfig::name`] share cached executors.
//!
//! ```rust
//! use mapforge::MappingConfig;
//!
//! let config = MappingConfig::new()
//!     .convert_using(|n: i32| n.to_string())
//!     .ignore_members::<(), ()>(&["revision"])
//!     .shallow_copy();
//! ```
//!
//! # Concurrency
//!
//! Mapping is synchronous and runs entirely on the caller's thread.
//! Executors hold only immutable plan data and are safe for concurrent use;
//! the manager's cache serializes first-time construction per triple and is
//! lock-free afterwards.
//!
//! # Error Handling
//!
//! Configuration problems surface as construction-time errors on the first
//! `get` for a triple and are cached, so every later request fails
//! identically. Runtime mapping propagates converter failures unchanged and
//! never swallows them; see [`Error`].

#[macro_use]
mod error;

mod manager;
mod typekey;

pub mod config;
pub mod convert;
pub mod exec;
pub mod plan;
pub mod reflect;
pub mod sql;

pub use config::{MappingConfig, PlanFlags, StaticConverters};
pub use convert::{
    Converter, ConverterDescriptor, ConverterProvider, ScalarConverter, SequenceConverter,
    SequenceConverterProvider, TypePattern,
};
pub use error::{Error, Result};
pub use exec::{InterpreterCompiler, MapperHandle, MappingState, ObjectMapper, PlanCompiler};
pub use manager::MapperManager;
pub use plan::{StoredOperation, StoredOperationKind};
pub use reflect::{MemberDescriptor, MemberKind, ParamSink, Reflect, TypeShape};
pub use typekey::{TypeKey, TypeKeyMap};

#[doc(hidden)]
pub mod __private {
    pub use boxcar;
}

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Usage Examples
///
/// ```rust
/// use mapforge::prelude::*;
///
/// let manager = MapperManager::new();
/// let config = MappingConfig::new();
/// ```
pub mod prelude {
    pub use crate::config::{MappingConfig, PlanFlags, StaticConverters};
    pub use crate::exec::{MapperHandle, MappingState};
    pub use crate::manager::MapperManager;
    pub use crate::reflect::Reflect;
    pub use crate::reflect_struct;
    pub use crate::{Error, Result};
}

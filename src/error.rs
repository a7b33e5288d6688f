use std::sync::Arc;

use thiserror::Error;

macro_rules! plan_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Plan {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Plan {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, covering every failure this library can surface.
///
/// Most variants are *construction-time* errors: they are raised while a
/// mapping plan is being built for a `(source, destination, configuration)`
/// triple and are cached by the [`crate::MapperManager`] so that repeated
/// requests for the same triple re-raise identically. Runtime mapping only
/// fails on accessor contract violations ([`Error::TypeMismatch`]), which a
/// well-typed plan never provokes.
///
/// # Error Categories
///
/// ## Plan construction
/// - [`Error::NoConversion`] - no converter between two scalar types
/// - [`Error::CyclicMapping`] - cyclic nested destination types
/// - [`Error::MissingConstructor`] - destination cannot be created
/// - [`Error::ProviderContract`] - a generic converter provider misbehaved
/// - [`Error::Plan`] - other contract violations, with source location
///
/// ## Runtime
/// - [`Error::TypeMismatch`] - a value reached an accessor of the wrong type
///
/// ## Caching
/// - [`Error::Shared`] - re-raise of a cached failing cache entry
///
/// ## SQL adapter
/// - [`Error::Sql`] - invalid identifier or unknown id field
#[derive(Error, Debug)]
pub enum Error {
    /// The plan builder detected a contract violation.
    ///
    /// Includes the source location where the violation was detected,
    /// mirroring the level of detail needed to debug a registration that
    /// went wrong.
    #[error("Plan - {file}:{line}: {message}")]
    Plan {
        /// The message to be printed for the Plan error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// No conversion exists between two member value types.
    ///
    /// Raised at plan build time when a matched member pair has differing
    /// scalar types and neither a user-registered converter, a static
    /// converter, nor a generic provider covers the pair. The engine never
    /// performs implicit narrowing conversions.
    #[error("No conversion from {from} to {to}")]
    NoConversion {
        /// Name of the source value type
        from: &'static str,
        /// Name of the destination value type
        to: &'static str,
    },

    /// A destination type has to be created but cannot be.
    ///
    /// The type is not a value type, exposes no default constructor, and the
    /// configuration registered no custom constructor for it.
    #[error("No constructor available for {0}")]
    MissingConstructor(&'static str),

    /// Nested destination types form a cycle.
    ///
    /// The plan builder refuses to recurse into a `(source, destination)`
    /// pair that is already on the ancestor stack unless a user-supplied
    /// converter covers the pair.
    #[error("Cyclic mapping between {from} and {to}")]
    CyclicMapping {
        /// Name of the source type on the cycle
        from: &'static str,
        /// Name of the destination type on the cycle
        to: &'static str,
    },

    /// A value of an unexpected type reached a typed accessor.
    #[error("Type mismatch: expected {expected} in {context}")]
    TypeMismatch {
        /// Name of the type the accessor expected
        expected: &'static str,
        /// Which accessor or facade detected the mismatch
        context: &'static str,
    },

    /// A registered generic converter provider violated its protocol.
    ///
    /// Typically the provider produced a descriptor for a type pair it does
    /// not actually support, or its instance rejected initialization.
    #[error("Provider {provider}: {message}")]
    ProviderContract {
        /// Name of the offending provider
        provider: &'static str,
        /// What the provider did wrong
        message: String,
    },

    /// Re-raise of a failing cache entry.
    ///
    /// The first `get` for a triple that fails to build caches the failure;
    /// subsequent calls observe this variant wrapping the original error.
    #[error("{0}")]
    Shared(Arc<Error>),

    /// SQL command construction failed.
    #[error("SQL - {0}")]
    Sql(String),
}

impl Error {
    /// Create a [`Error::TypeMismatch`] for the given expected type and context.
    pub(crate) fn mismatch<T>(context: &'static str) -> Self {
        Error::TypeMismatch {
            expected: std::any::type_name::<T>(),
            context,
        }
    }

    /// The underlying error, unwrapping any [`Error::Shared`] cache layers.
    #[must_use]
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::Shared(inner) = current {
            current = inner;
        }
        current
    }
}

/// `mapforge` Result type.
///
/// A type alias for `std::result::Result<T, Error>` where the error type is
/// always [`crate::Error`], used consistently throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

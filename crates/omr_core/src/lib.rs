//! Open metadata registry core.
//!
//! Pure domain layer: the instance model, the declarative type registry,
//! the generic repository handler and the typed per-entity handlers.
//! Storage is reached only through the `ports::MetadataStore` trait;
//! adapter crates provide Postgres and in-memory implementations.

pub mod builder;
pub mod context;
pub mod convert;
pub mod error;
pub mod generic;
pub mod handlers;
pub mod instance;
pub mod ports;
pub mod types;
pub mod validate;

pub use context::{CallContext, RegistryConfig, ZonePolicy};
pub use error::OmrError;
pub use generic::GenericHandler;
pub use types::TypeRegistry;

pub type Result<T> = std::result::Result<T, OmrError>;

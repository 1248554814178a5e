//! Typed per-entity handlers. Each one is a thin adapter over
//! `GenericHandler`: validate the request, build the property bag,
//! delegate to the generic substrate, convert the result back into a
//! typed bean.

pub mod annotation;
pub mod collection;
pub mod executor;
pub mod glossary;
pub mod glossary_category;
pub mod governance_action_process_step;
pub mod governance_action_type;
pub mod person_role;
pub mod schema_type;

pub use annotation::AnnotationHandler;
pub use collection::CollectionHandler;
pub use glossary::GlossaryHandler;
pub use glossary_category::GlossaryCategoryHandler;
pub use governance_action_process_step::GovernanceActionProcessStepHandler;
pub use governance_action_type::GovernanceActionTypeHandler;
pub use person_role::PersonRoleHandler;
pub use schema_type::SchemaTypeHandler;

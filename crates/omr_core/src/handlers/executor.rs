//! Governance-engine executor binding, shared by the process-step and
//! action-type handlers. Both element kinds delegate execution to a
//! governance engine through a `GovernanceActionExecutor` relationship
//! carrying the request type and parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::builder::PropertyBuilder;
use crate::context::CallContext;
use crate::error::OmrError;
use crate::generic::GenericHandler;
use crate::instance::{AttachmentEnd, EntityId, InstanceProperties, RelationshipId};
use crate::ports::Result;
use crate::types::name;
use crate::validate;

/// Requested binding of an element to a governance engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorBinding {
    pub governance_engine_guid: EntityId,
    pub request_type: String,
    #[serde(default)]
    pub request_parameters: BTreeMap<String, String>,
}

/// The executor link as stored, returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorLink {
    pub relationship_guid: RelationshipId,
    pub governance_engine_guid: EntityId,
    pub request_type: String,
    #[serde(default)]
    pub request_parameters: BTreeMap<String, String>,
}

fn executor_properties(binding: &ExecutorBinding) -> Result<InstanceProperties> {
    validate::require_name(&binding.request_type, name::REQUEST_TYPE)?;
    Ok(PropertyBuilder::new()
        .set_string(name::REQUEST_TYPE, binding.request_type.clone())?
        .set_string_map(name::REQUEST_PARAMETERS, binding.request_parameters.clone())
        .build())
}

/// The element's current executor link, if any.
pub async fn executor_link(
    generic: &GenericHandler,
    ctx: &CallContext,
    element_guid: EntityId,
) -> Result<Option<ExecutorLink>> {
    let attached = generic
        .get_attached(
            ctx,
            element_guid,
            name::GOVERNANCE_ACTION_EXECUTOR,
            AttachmentEnd::One,
        )
        .await?;
    Ok(attached.into_iter().next().map(|(rel, engine)| ExecutorLink {
        relationship_guid: rel.guid,
        governance_engine_guid: engine.guid,
        request_type: rel
            .properties
            .get_string(name::REQUEST_TYPE)
            .unwrap_or_default()
            .to_string(),
        request_parameters: rel.properties.get_string_map(name::REQUEST_PARAMETERS),
    }))
}

/// Bring the element's executor link in line with `binding`.
///
/// Case analysis on the current link:
/// - no link: create one to the requested engine;
/// - linked to a different engine: unlink it, then link the new engine;
/// - linked to the requested engine: refresh the link's properties.
pub async fn sync_executor_link(
    generic: &GenericHandler,
    ctx: &CallContext,
    element_guid: EntityId,
    binding: &ExecutorBinding,
) -> Result<RelationshipId> {
    let properties = executor_properties(binding)?;
    match executor_link(generic, ctx, element_guid).await? {
        None => {
            generic
                .link_elements(
                    ctx,
                    name::GOVERNANCE_ACTION_EXECUTOR,
                    element_guid,
                    binding.governance_engine_guid,
                    properties,
                )
                .await
        }
        Some(current) if current.governance_engine_guid != binding.governance_engine_guid => {
            generic
                .unlink_elements(
                    ctx,
                    name::GOVERNANCE_ACTION_EXECUTOR,
                    element_guid,
                    current.governance_engine_guid,
                )
                .await?;
            generic
                .link_elements(
                    ctx,
                    name::GOVERNANCE_ACTION_EXECUTOR,
                    element_guid,
                    binding.governance_engine_guid,
                    properties,
                )
                .await
        }
        Some(current) => {
            generic
                .update_link_properties(ctx, current.relationship_guid, properties, false)
                .await?;
            Ok(current.relationship_guid)
        }
    }
}

/// Executor bindings always name a request type.
pub fn validate_binding(binding: &ExecutorBinding) -> Result<()> {
    if binding.request_type.trim().is_empty() {
        return Err(OmrError::invalid_parameter(
            name::REQUEST_TYPE,
            "must not be empty",
        ));
    }
    Ok(())
}

//! Governance action type handler. Action types are standalone templates
//! for governance actions; like process steps they bind to a governance
//! engine through the shared executor link.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::builder::PropertyBuilder;
use crate::context::CallContext;
use crate::convert::{ElementConverter, ElementHeader};
use crate::generic::GenericHandler;
use crate::instance::{Entity, EntityId, InstanceProperties, PropertyValue};
use crate::ports::Result;
use crate::types::name;

use super::executor::{self, ExecutorBinding, ExecutorLink};

// ── Bean types ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceActionTypeProperties {
    pub qualified_name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub domain_identifier: i64,
    #[serde(default)]
    pub wait_time: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceActionTypeElement {
    pub header: ElementHeader,
    pub properties: GovernanceActionTypeProperties,
}

// ── Builder ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct GovernanceActionTypeBuilder {
    properties: GovernanceActionTypeProperties,
    extended: BTreeMap<String, PropertyValue>,
}

impl GovernanceActionTypeBuilder {
    pub fn new(properties: GovernanceActionTypeProperties) -> Self {
        Self {
            properties,
            extended: BTreeMap::new(),
        }
    }

    pub fn with_extended(mut self, extended: BTreeMap<String, PropertyValue>) -> Self {
        self.extended = extended;
        self
    }

    pub fn build(self) -> Result<InstanceProperties> {
        let p = self.properties;
        Ok(PropertyBuilder::new()
            .set_string(name::QUALIFIED_NAME, p.qualified_name)?
            .set_string(name::DISPLAY_NAME, p.display_name)?
            .set_optional_string(name::DESCRIPTION, p.description)
            .set_i64(name::DOMAIN_IDENTIFIER, p.domain_identifier)
            .set_optional_i64(name::WAIT_TIME, p.wait_time)
            .set_string_map(name::ADDITIONAL_PROPERTIES, p.additional_properties)
            .merge_extended(self.extended)
            .build())
    }
}

// ── Converter ─────────────────────────────────────────────────

pub struct GovernanceActionTypeConverter;

impl ElementConverter<GovernanceActionTypeElement> for GovernanceActionTypeConverter {
    fn from_entity(&self, entity: &Entity) -> Result<GovernanceActionTypeElement> {
        let p = &entity.properties;
        Ok(GovernanceActionTypeElement {
            header: ElementHeader::from_entity(entity),
            properties: GovernanceActionTypeProperties {
                qualified_name: p.get_string(name::QUALIFIED_NAME).unwrap_or_default().into(),
                display_name: p.get_string(name::DISPLAY_NAME).unwrap_or_default().into(),
                description: p.get_string(name::DESCRIPTION).map(Into::into),
                domain_identifier: p.get_i64(name::DOMAIN_IDENTIFIER).unwrap_or(0),
                wait_time: p.get_i64(name::WAIT_TIME),
                additional_properties: p.get_string_map(name::ADDITIONAL_PROPERTIES),
            },
        })
    }
}

// ── Handler ───────────────────────────────────────────────────

pub struct GovernanceActionTypeHandler {
    generic: Arc<GenericHandler>,
}

impl GovernanceActionTypeHandler {
    pub fn new(generic: Arc<GenericHandler>) -> Self {
        Self { generic }
    }

    pub async fn create_action_type(
        &self,
        ctx: &CallContext,
        builder: GovernanceActionTypeBuilder,
        executor_binding: ExecutorBinding,
    ) -> Result<EntityId> {
        executor::validate_binding(&executor_binding)?;
        let properties = builder.build()?;
        let action_type_guid = self
            .generic
            .create_bean(
                ctx,
                name::GOVERNANCE_ACTION_TYPE,
                properties,
                Vec::new(),
                None,
            )
            .await?;
        executor::sync_executor_link(&self.generic, ctx, action_type_guid, &executor_binding)
            .await?;
        Ok(action_type_guid)
    }

    /// Same relink case analysis as process steps: rebind when the
    /// engine changed, refresh the link's properties when it did not.
    pub async fn update_action_type(
        &self,
        ctx: &CallContext,
        action_type_guid: EntityId,
        builder: GovernanceActionTypeBuilder,
        executor_binding: ExecutorBinding,
        merge: bool,
    ) -> Result<()> {
        executor::validate_binding(&executor_binding)?;
        let properties = builder.build()?;
        self.generic
            .update_bean(
                ctx,
                action_type_guid,
                name::GOVERNANCE_ACTION_TYPE,
                properties,
                merge,
            )
            .await?;
        executor::sync_executor_link(&self.generic, ctx, action_type_guid, &executor_binding)
            .await?;
        Ok(())
    }

    pub async fn remove_action_type(
        &self,
        ctx: &CallContext,
        action_type_guid: EntityId,
    ) -> Result<()> {
        self.generic
            .delete_bean(ctx, action_type_guid, name::GOVERNANCE_ACTION_TYPE)
            .await
    }

    pub async fn get_action_type(
        &self,
        ctx: &CallContext,
        action_type_guid: EntityId,
    ) -> Result<GovernanceActionTypeElement> {
        let entity = self
            .generic
            .get_bean(ctx, action_type_guid, name::GOVERNANCE_ACTION_TYPE)
            .await?;
        GovernanceActionTypeConverter.from_entity(&entity)
    }

    pub async fn find_action_types(
        &self,
        ctx: &CallContext,
        search_string: &str,
        start_from: usize,
        page_size: usize,
    ) -> Result<Vec<GovernanceActionTypeElement>> {
        let entities = self
            .generic
            .find_beans(
                ctx,
                name::GOVERNANCE_ACTION_TYPE,
                search_string,
                false,
                &[
                    name::QUALIFIED_NAME.to_string(),
                    name::DISPLAY_NAME.to_string(),
                    name::DESCRIPTION.to_string(),
                ],
                start_from,
                page_size,
            )
            .await?;
        entities
            .iter()
            .map(|e| GovernanceActionTypeConverter.from_entity(e))
            .collect()
    }

    pub async fn action_types_by_name(
        &self,
        ctx: &CallContext,
        action_type_name: &str,
        start_from: usize,
        page_size: usize,
    ) -> Result<Vec<GovernanceActionTypeElement>> {
        let entities = self
            .generic
            .find_beans(
                ctx,
                name::GOVERNANCE_ACTION_TYPE,
                action_type_name,
                true,
                &[
                    name::QUALIFIED_NAME.to_string(),
                    name::DISPLAY_NAME.to_string(),
                ],
                start_from,
                page_size,
            )
            .await?;
        entities
            .iter()
            .map(|e| GovernanceActionTypeConverter.from_entity(e))
            .collect()
    }

    pub async fn executor_for_action_type(
        &self,
        ctx: &CallContext,
        action_type_guid: EntityId,
    ) -> Result<Option<ExecutorLink>> {
        executor::executor_link(&self.generic, ctx, action_type_guid).await
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_writes_domain_identifier() {
        let bag = GovernanceActionTypeBuilder::new(GovernanceActionTypeProperties {
            qualified_name: "ActionType:quarantine".into(),
            display_name: "Quarantine Asset".into(),
            domain_identifier: 2,
            ..Default::default()
        })
        .build()
        .unwrap();
        assert_eq!(bag.get_i64(name::DOMAIN_IDENTIFIER), Some(2));
        assert!(bag.get_i64(name::WAIT_TIME).is_none());
    }
}

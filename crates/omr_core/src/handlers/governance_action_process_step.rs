//! Governance action process step handler. Steps belong to a governance
//! action process, chain into a flow via `NextGovernanceActionProcessStep`
//! links, and delegate execution to a governance engine through the
//! shared executor binding.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::builder::PropertyBuilder;
use crate::context::CallContext;
use crate::convert::{ElementConverter, ElementHeader};
use crate::generic::GenericHandler;
use crate::instance::{
    AttachmentEnd, Entity, EntityId, InstanceProperties, PropertyValue, RelationshipId,
};
use crate::ports::Result;
use crate::types::name;

use super::executor::{self, ExecutorBinding, ExecutorLink};

// ── Bean types ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceActionProcessStepProperties {
    pub qualified_name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Governance domain this step belongs to (0 = all domains).
    #[serde(default)]
    pub domain_identifier: i64,
    /// Whether repeated triggering of this step is collapsed.
    #[serde(default)]
    pub ignore_multiple_triggers: bool,
    /// Minutes to wait before the step may run.
    #[serde(default)]
    pub wait_time: Option<i64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceActionProcessStepElement {
    pub header: ElementHeader,
    pub properties: GovernanceActionProcessStepProperties,
}

/// A step reached through a flow link, with the link's guards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextProcessStepLink {
    pub relationship_guid: RelationshipId,
    #[serde(default)]
    pub guard: Option<String>,
    #[serde(default)]
    pub mandatory_guard: bool,
    pub step: GovernanceActionProcessStepElement,
}

// ── Builder ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct GovernanceActionProcessStepBuilder {
    properties: GovernanceActionProcessStepProperties,
    extended: BTreeMap<String, PropertyValue>,
}

impl GovernanceActionProcessStepBuilder {
    pub fn new(properties: GovernanceActionProcessStepProperties) -> Self {
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
            .set_bool(name::IGNORE_MULTIPLE_TRIGGERS, p.ignore_multiple_triggers)
            .set_optional_i64(name::WAIT_TIME, p.wait_time)
            .set_string_map(name::ADDITIONAL_PROPERTIES, p.additional_properties)
            .merge_extended(self.extended)
            .build())
    }
}

// ── Converter ─────────────────────────────────────────────────

pub struct GovernanceActionProcessStepConverter;

impl ElementConverter<GovernanceActionProcessStepElement> for GovernanceActionProcessStepConverter {
    fn from_entity(&self, entity: &Entity) -> Result<GovernanceActionProcessStepElement> {
        let p = &entity.properties;
        Ok(GovernanceActionProcessStepElement {
            header: ElementHeader::from_entity(entity),
            properties: GovernanceActionProcessStepProperties {
                qualified_name: p.get_string(name::QUALIFIED_NAME).unwrap_or_default().into(),
                display_name: p.get_string(name::DISPLAY_NAME).unwrap_or_default().into(),
                description: p.get_string(name::DESCRIPTION).map(Into::into),
                domain_identifier: p.get_i64(name::DOMAIN_IDENTIFIER).unwrap_or(0),
                ignore_multiple_triggers: p.get_bool(name::IGNORE_MULTIPLE_TRIGGERS).unwrap_or(false),
                wait_time: p.get_i64(name::WAIT_TIME),
                additional_properties: p.get_string_map(name::ADDITIONAL_PROPERTIES),
            },
        })
    }
}

// ── Handler ───────────────────────────────────────────────────

pub struct GovernanceActionProcessStepHandler {
    generic: Arc<GenericHandler>,
}

impl GovernanceActionProcessStepHandler {
    pub fn new(generic: Arc<GenericHandler>) -> Self {
        Self { generic }
    }

    /// Create a step and bind it to the governance engine that runs it.
    pub async fn create_process_step(
        &self,
        ctx: &CallContext,
        builder: GovernanceActionProcessStepBuilder,
        executor_binding: ExecutorBinding,
    ) -> Result<EntityId> {
        executor::validate_binding(&executor_binding)?;
        let properties = builder.build()?;
        let step_guid = self
            .generic
            .create_bean(
                ctx,
                name::GOVERNANCE_ACTION_PROCESS_STEP,
                properties,
                Vec::new(),
                None,
            )
            .await?;
        executor::sync_executor_link(&self.generic, ctx, step_guid, &executor_binding).await?;
        Ok(step_guid)
    }

    /// Update the step's properties and reconcile its executor binding.
    /// When the requested governance engine differs from the one linked,
    /// the old executor link is removed and a new one created; when the
    /// engine is unchanged the link's request properties are refreshed.
    pub async fn update_process_step(
        &self,
        ctx: &CallContext,
        step_guid: EntityId,
        builder: GovernanceActionProcessStepBuilder,
        executor_binding: ExecutorBinding,
        merge: bool,
    ) -> Result<()> {
        executor::validate_binding(&executor_binding)?;
        let properties = builder.build()?;
        self.generic
            .update_bean(
                ctx,
                step_guid,
                name::GOVERNANCE_ACTION_PROCESS_STEP,
                properties,
                merge,
            )
            .await?;
        executor::sync_executor_link(&self.generic, ctx, step_guid, &executor_binding).await?;
        Ok(())
    }

    /// Remove the step. Flow and executor links go with it.
    pub async fn remove_process_step(&self, ctx: &CallContext, step_guid: EntityId) -> Result<()> {
        self.generic
            .delete_bean(ctx, step_guid, name::GOVERNANCE_ACTION_PROCESS_STEP)
            .await
    }

    pub async fn get_process_step(
        &self,
        ctx: &CallContext,
        step_guid: EntityId,
    ) -> Result<GovernanceActionProcessStepElement> {
        let entity = self
            .generic
            .get_bean(ctx, step_guid, name::GOVERNANCE_ACTION_PROCESS_STEP)
            .await?;
        GovernanceActionProcessStepConverter.from_entity(&entity)
    }

    pub async fn find_process_steps(
        &self,
        ctx: &CallContext,
        search_string: &str,
        start_from: usize,
        page_size: usize,
    ) -> Result<Vec<GovernanceActionProcessStepElement>> {
        let entities = self
            .generic
            .find_beans(
                ctx,
                name::GOVERNANCE_ACTION_PROCESS_STEP,
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
            .map(|e| GovernanceActionProcessStepConverter.from_entity(e))
            .collect()
    }

    pub async fn process_steps_by_name(
        &self,
        ctx: &CallContext,
        step_name: &str,
        start_from: usize,
        page_size: usize,
    ) -> Result<Vec<GovernanceActionProcessStepElement>> {
        let entities = self
            .generic
            .find_beans(
                ctx,
                name::GOVERNANCE_ACTION_PROCESS_STEP,
                step_name,
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
            .map(|e| GovernanceActionProcessStepConverter.from_entity(e))
            .collect()
    }

    // ── Process flow ───────────────────────────────────────────

    /// Set (or replace) the first step of a governance action process.
    pub async fn setup_first_process_step(
        &self,
        ctx: &CallContext,
        process_guid: EntityId,
        step_guid: EntityId,
        guard: Option<String>,
    ) -> Result<()> {
        self.generic
            .get_bean(ctx, process_guid, name::GOVERNANCE_ACTION_PROCESS)
            .await?;
        self.generic
            .get_bean(ctx, step_guid, name::GOVERNANCE_ACTION_PROCESS_STEP)
            .await?;
        // Only one flow link per process: drop any existing one first.
        let existing = self
            .generic
            .get_attached(
                ctx,
                process_guid,
                name::GOVERNANCE_ACTION_PROCESS_FLOW,
                AttachmentEnd::One,
            )
            .await?;
        for (relationship, _) in existing {
            self.generic.unlink_by_guid(ctx, relationship.guid).await?;
        }
        let properties = PropertyBuilder::new()
            .set_optional_string(name::GUARD, guard)
            .build();
        self.generic
            .link_elements(
                ctx,
                name::GOVERNANCE_ACTION_PROCESS_FLOW,
                process_guid,
                step_guid,
                properties,
            )
            .await?;
        Ok(())
    }

    pub async fn clear_first_process_step(
        &self,
        ctx: &CallContext,
        process_guid: EntityId,
    ) -> Result<()> {
        let existing = self
            .generic
            .get_attached(
                ctx,
                process_guid,
                name::GOVERNANCE_ACTION_PROCESS_FLOW,
                AttachmentEnd::One,
            )
            .await?;
        if existing.is_empty() {
            return Err(crate::error::OmrError::not_found(
                name::GOVERNANCE_ACTION_PROCESS_FLOW,
                process_guid,
            ));
        }
        for (relationship, _) in existing {
            self.generic.unlink_by_guid(ctx, relationship.guid).await?;
        }
        Ok(())
    }

    pub async fn first_process_step(
        &self,
        ctx: &CallContext,
        process_guid: EntityId,
    ) -> Result<Option<NextProcessStepLink>> {
        let attached = self
            .generic
            .get_attached(
                ctx,
                process_guid,
                name::GOVERNANCE_ACTION_PROCESS_FLOW,
                AttachmentEnd::One,
            )
            .await?;
        attached
            .into_iter()
            .next()
            .map(|(rel, entity)| {
                Ok(NextProcessStepLink {
                    relationship_guid: rel.guid,
                    guard: rel.properties.get_string(name::GUARD).map(Into::into),
                    mandatory_guard: false,
                    step: GovernanceActionProcessStepConverter.from_entity(&entity)?,
                })
            })
            .transpose()
    }

    /// Chain `next_step_guid` after `current_step_guid`.
    pub async fn link_next_step(
        &self,
        ctx: &CallContext,
        current_step_guid: EntityId,
        next_step_guid: EntityId,
        guard: Option<String>,
        mandatory_guard: bool,
    ) -> Result<RelationshipId> {
        let properties = PropertyBuilder::new()
            .set_optional_string(name::GUARD, guard)
            .set_bool(name::MANDATORY_GUARD, mandatory_guard)
            .build();
        self.generic
            .link_elements(
                ctx,
                name::NEXT_GOVERNANCE_ACTION_PROCESS_STEP,
                current_step_guid,
                next_step_guid,
                properties,
            )
            .await
    }

    pub async fn update_next_step_link(
        &self,
        ctx: &CallContext,
        relationship_guid: RelationshipId,
        guard: Option<String>,
        mandatory_guard: bool,
    ) -> Result<()> {
        let properties = PropertyBuilder::new()
            .set_optional_string(name::GUARD, guard)
            .set_bool(name::MANDATORY_GUARD, mandatory_guard)
            .build();
        self.generic
            .update_link_properties(ctx, relationship_guid, properties, false)
            .await
    }

    pub async fn unlink_next_step(
        &self,
        ctx: &CallContext,
        relationship_guid: RelationshipId,
    ) -> Result<()> {
        self.generic.unlink_by_guid(ctx, relationship_guid).await
    }

    /// Steps that may run after the given one, with their guards.
    pub async fn next_steps(
        &self,
        ctx: &CallContext,
        step_guid: EntityId,
    ) -> Result<Vec<NextProcessStepLink>> {
        let attached = self
            .generic
            .get_attached(
                ctx,
                step_guid,
                name::NEXT_GOVERNANCE_ACTION_PROCESS_STEP,
                AttachmentEnd::One,
            )
            .await?;
        attached
            .into_iter()
            .map(|(rel, entity)| {
                Ok(NextProcessStepLink {
                    relationship_guid: rel.guid,
                    guard: rel.properties.get_string(name::GUARD).map(Into::into),
                    mandatory_guard: rel
                        .properties
                        .get_bool(name::MANDATORY_GUARD)
                        .unwrap_or(false),
                    step: GovernanceActionProcessStepConverter.from_entity(&entity)?,
                })
            })
            .collect()
    }

    pub async fn executor_for_step(
        &self,
        ctx: &CallContext,
        step_guid: EntityId,
    ) -> Result<Option<ExecutorLink>> {
        executor::executor_link(&self.generic, ctx, step_guid).await
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_carries_flow_controls() {
        let bag = GovernanceActionProcessStepBuilder::new(GovernanceActionProcessStepProperties {
            qualified_name: "Step:verify-asset".into(),
            display_name: "Verify Asset".into(),
            domain_identifier: 4,
            ignore_multiple_triggers: true,
            wait_time: Some(15),
            ..Default::default()
        })
        .build()
        .unwrap();
        assert_eq!(bag.get_i64(name::DOMAIN_IDENTIFIER), Some(4));
        assert_eq!(bag.get_bool(name::IGNORE_MULTIPLE_TRIGGERS), Some(true));
        assert_eq!(bag.get_i64(name::WAIT_TIME), Some(15));
    }

    #[test]
    fn converter_defaults_missing_flow_controls() {
        let bag = GovernanceActionProcessStepBuilder::new(GovernanceActionProcessStepProperties {
            qualified_name: "Step:x".into(),
            display_name: "X".into(),
            ..Default::default()
        })
        .build()
        .unwrap();
        let entity = Entity {
            guid: EntityId::new(),
            type_name: name::GOVERNANCE_ACTION_PROCESS_STEP.into(),
            status: crate::instance::ElementStatus::Active,
            origin: crate::instance::ElementOrigin::Local,
            properties: bag,
            classifications: vec![],
            created_by: "t".into(),
            updated_by: "t".into(),
            create_time: chrono::Utc::now(),
            update_time: chrono::Utc::now(),
            version: 1,
        };
        let element = GovernanceActionProcessStepConverter.from_entity(&entity).unwrap();
        assert_eq!(element.properties.domain_identifier, 0);
        assert!(!element.properties.ignore_multiple_triggers);
        assert_eq!(element.properties.wait_time, None);
    }
}

//! Person role handler. Roles are filled by people through
//! `PersonRoleAppointment` relationships; appointments carry their own
//! effectivity window so the appointee list is a point-in-time query.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::builder::PropertyBuilder;
use crate::context::CallContext;
use crate::convert::{ElementConverter, ElementHeader};
use crate::error::OmrError;
use crate::generic::GenericHandler;
use crate::instance::{
    AttachmentEnd, Entity, EntityId, InstanceProperties, PropertyValue, RelationshipId,
};
use crate::ports::Result;
use crate::types::name;
use crate::validate;

// ── Bean types ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonRoleProperties {
    /// Unique role identifier, stored as the qualified name.
    pub role_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// Number of people expected to fill the role at once.
    #[serde(default)]
    pub head_count: Option<i64>,
    #[serde(default)]
    pub domain_identifier: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRoleElement {
    pub header: ElementHeader,
    pub properties: PersonRoleProperties,
}

/// A person currently (or at the queried time) appointed to a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointee {
    pub appointment_guid: RelationshipId,
    pub person: ElementHeader,
    #[serde(default)]
    pub expected_time_allocation_percent: Option<i64>,
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub effective_to: Option<DateTime<Utc>>,
}

// ── Builder ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct PersonRoleBuilder {
    properties: PersonRoleProperties,
    extended: BTreeMap<String, PropertyValue>,
}

impl PersonRoleBuilder {
    pub fn new(properties: PersonRoleProperties) -> Self {
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
            .set_string(name::QUALIFIED_NAME, p.role_id)?
            .set_string(name::TITLE, p.title)?
            .set_optional_string(name::DESCRIPTION, p.description)
            .set_optional_string(name::SCOPE, p.scope)
            .set_optional_i64(name::HEAD_COUNT, p.head_count)
            .set_i64(name::DOMAIN_IDENTIFIER, p.domain_identifier)
            .set_string_map(name::ADDITIONAL_PROPERTIES, p.additional_properties)
            .merge_extended(self.extended)
            .build())
    }
}

// ── Converter ─────────────────────────────────────────────────

pub struct PersonRoleConverter;

impl ElementConverter<PersonRoleElement> for PersonRoleConverter {
    fn from_entity(&self, entity: &Entity) -> Result<PersonRoleElement> {
        let p = &entity.properties;
        Ok(PersonRoleElement {
            header: ElementHeader::from_entity(entity),
            properties: PersonRoleProperties {
                role_id: p.get_string(name::QUALIFIED_NAME).unwrap_or_default().into(),
                title: p.get_string(name::TITLE).unwrap_or_default().into(),
                description: p.get_string(name::DESCRIPTION).map(Into::into),
                scope: p.get_string(name::SCOPE).map(Into::into),
                head_count: p.get_i64(name::HEAD_COUNT),
                domain_identifier: p.get_i64(name::DOMAIN_IDENTIFIER).unwrap_or(0),
                additional_properties: p.get_string_map(name::ADDITIONAL_PROPERTIES),
            },
        })
    }
}

// ── Handler ───────────────────────────────────────────────────

pub struct PersonRoleHandler {
    generic: Arc<GenericHandler>,
}

impl PersonRoleHandler {
    pub fn new(generic: Arc<GenericHandler>) -> Self {
        Self { generic }
    }

    pub async fn create_person_role(
        &self,
        ctx: &CallContext,
        builder: PersonRoleBuilder,
    ) -> Result<EntityId> {
        let properties = builder.build()?;
        self.generic
            .create_bean(ctx, name::PERSON_ROLE, properties, Vec::new(), None)
            .await
    }

    pub async fn update_person_role(
        &self,
        ctx: &CallContext,
        role_guid: EntityId,
        builder: PersonRoleBuilder,
        merge: bool,
    ) -> Result<()> {
        let properties = builder.build()?;
        self.generic
            .update_bean(ctx, role_guid, name::PERSON_ROLE, properties, merge)
            .await
    }

    pub async fn remove_person_role(&self, ctx: &CallContext, role_guid: EntityId) -> Result<()> {
        self.generic.delete_bean(ctx, role_guid, name::PERSON_ROLE).await
    }

    pub async fn get_person_role(
        &self,
        ctx: &CallContext,
        role_guid: EntityId,
    ) -> Result<PersonRoleElement> {
        let entity = self.generic.get_bean(ctx, role_guid, name::PERSON_ROLE).await?;
        PersonRoleConverter.from_entity(&entity)
    }

    pub async fn find_person_roles(
        &self,
        ctx: &CallContext,
        search_string: &str,
        start_from: usize,
        page_size: usize,
    ) -> Result<Vec<PersonRoleElement>> {
        let entities = self
            .generic
            .find_beans(
                ctx,
                name::PERSON_ROLE,
                search_string,
                false,
                &[
                    name::QUALIFIED_NAME.to_string(),
                    name::TITLE.to_string(),
                    name::DESCRIPTION.to_string(),
                ],
                start_from,
                page_size,
            )
            .await?;
        entities.iter().map(|e| PersonRoleConverter.from_entity(e)).collect()
    }

    pub async fn person_roles_by_name(
        &self,
        ctx: &CallContext,
        role_name: &str,
        start_from: usize,
        page_size: usize,
    ) -> Result<Vec<PersonRoleElement>> {
        let entities = self
            .generic
            .find_beans(
                ctx,
                name::PERSON_ROLE,
                role_name,
                true,
                &[name::QUALIFIED_NAME.to_string(), name::TITLE.to_string()],
                start_from,
                page_size,
            )
            .await?;
        entities.iter().map(|e| PersonRoleConverter.from_entity(e)).collect()
    }

    /// Appoint a person to the role, optionally within an effectivity
    /// window.
    pub async fn appoint_person(
        &self,
        ctx: &CallContext,
        person_guid: EntityId,
        role_guid: EntityId,
        expected_time_allocation_percent: Option<i64>,
        effective_from: Option<DateTime<Utc>>,
        effective_to: Option<DateTime<Utc>>,
    ) -> Result<RelationshipId> {
        validate::validate_effective_dates(effective_from, effective_to)?;
        if let Some(percent) = expected_time_allocation_percent {
            if !(0..=100).contains(&percent) {
                return Err(OmrError::invalid_parameter(
                    name::EXPECTED_TIME_ALLOCATION_PERCENT,
                    "must be between 0 and 100",
                ));
            }
        }
        let properties = PropertyBuilder::new()
            .set_optional_i64(
                name::EXPECTED_TIME_ALLOCATION_PERCENT,
                expected_time_allocation_percent,
            )
            .effectivity(effective_from, effective_to)?
            .build();
        self.generic
            .link_elements(
                ctx,
                name::PERSON_ROLE_APPOINTMENT,
                person_guid,
                role_guid,
                properties,
            )
            .await
    }

    /// End an appointment. The relationship must join the named person
    /// and role.
    pub async fn relieve_person(
        &self,
        ctx: &CallContext,
        person_guid: EntityId,
        role_guid: EntityId,
        appointment_guid: RelationshipId,
    ) -> Result<()> {
        let attached = self
            .generic
            .get_attached(
                ctx,
                role_guid,
                name::PERSON_ROLE_APPOINTMENT,
                AttachmentEnd::Two,
            )
            .await?;
        let matches = attached.iter().any(|(rel, person)| {
            rel.guid == appointment_guid && person.guid == person_guid
        });
        if !matches {
            return Err(OmrError::not_found(
                name::PERSON_ROLE_APPOINTMENT,
                appointment_guid,
            ));
        }
        self.generic.unlink_by_guid(ctx, appointment_guid).await
    }

    /// People filling the role, honoring the context's effective time
    /// against each appointment's window.
    pub async fn appointees(
        &self,
        ctx: &CallContext,
        role_guid: EntityId,
    ) -> Result<Vec<Appointee>> {
        self.generic.get_bean(ctx, role_guid, name::PERSON_ROLE).await?;
        let attached = self
            .generic
            .get_attached(
                ctx,
                role_guid,
                name::PERSON_ROLE_APPOINTMENT,
                AttachmentEnd::Two,
            )
            .await?;
        Ok(attached
            .into_iter()
            .map(|(rel, person)| Appointee {
                appointment_guid: rel.guid,
                person: ElementHeader::from_entity(&person),
                expected_time_allocation_percent: rel
                    .properties
                    .get_i64(name::EXPECTED_TIME_ALLOCATION_PERCENT),
                effective_from: rel.properties.effective_from,
                effective_to: rel.properties.effective_to,
            })
            .collect())
    }
}

// ── Tests ─────────────────────────────────────────────────────

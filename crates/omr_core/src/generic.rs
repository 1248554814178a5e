//! The generic CRUD substrate every typed handler delegates to.
//!
//! One implementation of create/update/delete/find bean, link/unlink,
//! classification management and attachment traversal, with type
//! validation, zone visibility, effective-time filtering and anchor
//! propagation applied uniformly. Typed handlers supply only their type
//! names, builders and converters.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::context::{CallContext, ZonePolicy};
use crate::error::OmrError;
use crate::instance::{
    AttachmentEnd, Classification, ElementStatus, Entity, EntityId, InstanceProperties,
    PropertyValue, Relationship, RelationshipId,
};
use crate::ports::{MetadataStore, Result};
use crate::types::{name, TypeRegistry};
use crate::validate;

/// Upper bound on a single result page.
pub const MAX_PAGE_SIZE: usize = 500;

/// Shared generic handler. Cheap to clone behind `Arc`; the typed
/// handlers each hold one.
pub struct GenericHandler {
    store: Arc<dyn MetadataStore>,
    registry: TypeRegistry,
    zones: ZonePolicy,
}

impl GenericHandler {
    pub fn new(store: Arc<dyn MetadataStore>, registry: TypeRegistry, zones: ZonePolicy) -> Self {
        Self {
            store,
            registry,
            zones,
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    // ── Visibility ─────────────────────────────────────────────

    /// Zone check first, then effectivity: a caller outside the zones
    /// must not learn whether an element would have been effective.
    fn check_visibility(&self, ctx: &CallContext, entity: &Entity) -> Result<()> {
        if !self.zones.is_visible(entity) {
            return Err(OmrError::Unauthorized(format!(
                "element {} is outside the supported governance zones",
                entity.guid
            )));
        }
        if !ctx.for_lineage && !entity.properties.effective_at(ctx.effective_time) {
            return Err(OmrError::not_found(&entity.type_name, entity.guid));
        }
        Ok(())
    }

    fn relationship_effective(&self, ctx: &CallContext, relationship: &Relationship) -> bool {
        ctx.for_lineage || relationship.properties.effective_at(ctx.effective_time)
    }

    // ── Bean CRUD ──────────────────────────────────────────────

    /// Create a new bean. When `anchor` is given the new element is
    /// attached to that anchor (and will be removed with it); top-level
    /// elements are stamped with the policy's default zones instead.
    pub async fn create_bean(
        &self,
        ctx: &CallContext,
        type_name: &str,
        properties: InstanceProperties,
        mut classifications: Vec<Classification>,
        anchor: Option<EntityId>,
    ) -> Result<EntityId> {
        ctx.validate()?;
        let def = self.registry.validate_entity_type(type_name)?;
        for classification in &classifications {
            self.registry
                .validate_classification(&classification.name, type_name)?;
        }
        if let Some(qualified_name) = properties.get_string(name::QUALIFIED_NAME) {
            if !ctx.for_duplicate_processing {
                self.check_unique_qualified_name(type_name, qualified_name, None)
                    .await?;
            }
        }

        if let Some(anchor_guid) = anchor {
            let anchor_entity = self.store.get_entity(anchor_guid).await?;
            if anchor_entity.is_deleted() {
                return Err(OmrError::not_found(&anchor_entity.type_name, anchor_guid));
            }
            self.check_visibility(ctx, &anchor_entity)?;
            let mut props = InstanceProperties::new();
            props.set(
                name::ANCHOR_GUID,
                PropertyValue::String(anchor_guid.to_string()),
            );
            classifications.push(Classification::new(name::ANCHORS, props));
        } else if !self.zones.default_zones.is_empty() {
            let mut props = InstanceProperties::new();
            props.set(
                name::ZONE_MEMBERSHIP_PROP,
                PropertyValue::Array(
                    self.zones
                        .default_zones
                        .iter()
                        .cloned()
                        .map(PropertyValue::String)
                        .collect(),
                ),
            );
            classifications.push(Classification::new(name::ZONE_MEMBERSHIP, props));
        }

        let entity = self
            .store
            .create_entity(
                &def.type_name,
                ElementStatus::Active,
                properties,
                classifications,
                &ctx.user_id,
            )
            .await?;
        tracing::info!(type_name, guid = %entity.guid, user = %ctx.user_id, "created bean");
        Ok(entity.guid)
    }

    /// Fetch a visible, live bean of the expected type.
    pub async fn get_bean(
        &self,
        ctx: &CallContext,
        guid: EntityId,
        expected_type: &str,
    ) -> Result<Entity> {
        ctx.validate()?;
        let entity = self.store.get_entity(guid).await?;
        if entity.is_deleted() {
            return Err(OmrError::not_found(expected_type, guid));
        }
        if !self.registry.is_subtype_of(&entity.type_name, expected_type) {
            return Err(OmrError::TypeViolation(format!(
                "entity {guid} is a {}, expected a {expected_type}",
                entity.type_name
            )));
        }
        self.check_visibility(ctx, &entity)?;
        Ok(entity)
    }

    /// Replace or merge a bean's properties.
    pub async fn update_bean(
        &self,
        ctx: &CallContext,
        guid: EntityId,
        expected_type: &str,
        properties: InstanceProperties,
        merge: bool,
    ) -> Result<()> {
        let current = self.get_bean(ctx, guid, expected_type).await?;
        if let Some(qualified_name) = properties.get_string(name::QUALIFIED_NAME) {
            if current.qualified_name() != Some(qualified_name) && !ctx.for_duplicate_processing {
                self.check_unique_qualified_name(&current.type_name, qualified_name, Some(guid))
                    .await?;
            }
        }
        self.store
            .update_entity_properties(guid, properties, merge, &ctx.user_id)
            .await?;
        tracing::info!(guid = %guid, merge, user = %ctx.user_id, "updated bean");
        Ok(())
    }

    /// Soft-delete a bean and everything anchored to it, removing the
    /// relationships that touch each deleted element. The cascade runs
    /// to a fixpoint so anchors-of-anchors go too.
    pub async fn delete_bean(
        &self,
        ctx: &CallContext,
        guid: EntityId,
        expected_type: &str,
    ) -> Result<()> {
        self.get_bean(ctx, guid, expected_type).await?;

        let mut visited: BTreeSet<EntityId> = BTreeSet::new();
        let mut queue = vec![guid];
        while let Some(next) = queue.pop() {
            if !visited.insert(next) {
                continue;
            }
            for anchored in self.store.anchored_entities(next).await? {
                queue.push(anchored.guid);
            }
            for relationship in self
                .store
                .relationships_for_entity(next, None, AttachmentEnd::Either)
                .await?
            {
                self.store
                    .delete_relationship(relationship.guid, &ctx.user_id)
                    .await?;
            }
            self.store.delete_entity(next, &ctx.user_id).await?;
        }
        tracing::info!(guid = %guid, cascade = visited.len(), user = %ctx.user_id, "deleted bean");
        Ok(())
    }

    /// Search live beans of a type by property value, then apply the
    /// zone and effectivity filters before paging.
    pub async fn find_beans(
        &self,
        ctx: &CallContext,
        type_name: &str,
        search_string: &str,
        exact: bool,
        property_names: &[String],
        start_from: usize,
        page_size: usize,
    ) -> Result<Vec<Entity>> {
        ctx.validate()?;
        validate::require_search_string(search_string)?;
        self.registry.validate_entity_type(type_name)?;
        let page_size = validate::clamp_page_size(page_size, MAX_PAGE_SIZE);

        // Over-fetch so post-filter paging stays correct.
        let raw = self
            .store
            .find_entities_by_property_value(
                type_name,
                search_string,
                exact,
                property_names,
                0,
                start_from + page_size.saturating_mul(2) + MAX_PAGE_SIZE,
            )
            .await?;
        Ok(raw
            .into_iter()
            .filter(|e| self.zones.is_visible(e))
            .filter(|e| ctx.for_lineage || e.properties.effective_at(ctx.effective_time))
            .skip(start_from)
            .take(page_size)
            .collect())
    }

    // ── Attachments ────────────────────────────────────────────

    /// Live, visible entities attached to `guid` through relationships
    /// of `relationship_type`, with the relationship they came through.
    /// `end` names the end that `guid` occupies.
    pub async fn get_attached(
        &self,
        ctx: &CallContext,
        guid: EntityId,
        relationship_type: &str,
        end: AttachmentEnd,
    ) -> Result<Vec<(Relationship, Entity)>> {
        ctx.validate()?;
        self.registry.validate_relationship_type(relationship_type)?;
        let relationships = self
            .store
            .relationships_for_entity(guid, Some(relationship_type), end)
            .await?;

        let mut attached = Vec::new();
        for relationship in relationships {
            if !self.relationship_effective(ctx, &relationship) {
                continue;
            }
            let Some(other) = relationship.other_end(guid) else {
                continue;
            };
            let entity = self.store.get_entity(other).await?;
            if entity.is_deleted() || !self.zones.is_visible(&entity) {
                continue;
            }
            if !ctx.for_lineage && !entity.properties.effective_at(ctx.effective_time) {
                continue;
            }
            attached.push((relationship, entity));
        }
        Ok(attached)
    }

    // ── Links ──────────────────────────────────────────────────

    /// Create a relationship between two visible elements. An identical
    /// live link between the pair is a conflict.
    pub async fn link_elements(
        &self,
        ctx: &CallContext,
        relationship_type: &str,
        end_one: EntityId,
        end_two: EntityId,
        properties: InstanceProperties,
    ) -> Result<RelationshipId> {
        ctx.validate()?;
        let one = self.store.get_entity(end_one).await?;
        let two = self.store.get_entity(end_two).await?;
        for entity in [&one, &two] {
            if entity.is_deleted() {
                return Err(OmrError::not_found(&entity.type_name, entity.guid));
            }
            self.check_visibility(ctx, entity)?;
        }
        self.registry
            .validate_relationship_ends(relationship_type, &one.type_name, &two.type_name)?;

        let existing = self
            .store
            .relationships_for_entity(end_one, Some(relationship_type), AttachmentEnd::One)
            .await?;
        if existing.iter().any(|r| r.end_two == end_two) {
            return Err(OmrError::Conflict(format!(
                "{relationship_type} already links {end_one} to {end_two}"
            )));
        }

        let relationship = self
            .store
            .create_relationship(relationship_type, end_one, end_two, properties, &ctx.user_id)
            .await?;
        tracing::info!(
            relationship_type,
            guid = %relationship.guid,
            %end_one,
            %end_two,
            user = %ctx.user_id,
            "linked elements"
        );
        Ok(relationship.guid)
    }

    /// Remove the live relationship of the given type between the pair.
    pub async fn unlink_elements(
        &self,
        ctx: &CallContext,
        relationship_type: &str,
        end_one: EntityId,
        end_two: EntityId,
    ) -> Result<()> {
        ctx.validate()?;
        self.registry.validate_relationship_type(relationship_type)?;
        let existing = self
            .store
            .relationships_for_entity(end_one, Some(relationship_type), AttachmentEnd::One)
            .await?;
        let Some(relationship) = existing.into_iter().find(|r| r.end_two == end_two) else {
            return Err(OmrError::not_found(relationship_type, end_two));
        };
        self.store
            .delete_relationship(relationship.guid, &ctx.user_id)
            .await?;
        tracing::info!(relationship_type, %end_one, %end_two, user = %ctx.user_id, "unlinked elements");
        Ok(())
    }

    /// Update a relationship's property bag in place.
    pub async fn update_link_properties(
        &self,
        ctx: &CallContext,
        guid: RelationshipId,
        properties: InstanceProperties,
        merge: bool,
    ) -> Result<()> {
        ctx.validate()?;
        self.store
            .update_relationship_properties(guid, properties, merge, &ctx.user_id)
            .await?;
        Ok(())
    }

    /// Remove a relationship by its own guid.
    pub async fn unlink_by_guid(&self, ctx: &CallContext, guid: RelationshipId) -> Result<()> {
        ctx.validate()?;
        self.store.delete_relationship(guid, &ctx.user_id).await?;
        Ok(())
    }

    // ── Classifications ────────────────────────────────────────

    pub async fn set_classification(
        &self,
        ctx: &CallContext,
        guid: EntityId,
        classification_name: &str,
        properties: InstanceProperties,
    ) -> Result<()> {
        ctx.validate()?;
        let entity = self.store.get_entity(guid).await?;
        if entity.is_deleted() {
            return Err(OmrError::not_found(&entity.type_name, guid));
        }
        self.check_visibility(ctx, &entity)?;
        self.registry
            .validate_classification(classification_name, &entity.type_name)?;
        self.store
            .set_classification(
                guid,
                Classification::new(classification_name, properties),
                &ctx.user_id,
            )
            .await?;
        tracing::info!(classification = classification_name, guid = %guid, "set classification");
        Ok(())
    }

    pub async fn remove_classification(
        &self,
        ctx: &CallContext,
        guid: EntityId,
        classification_name: &str,
    ) -> Result<()> {
        ctx.validate()?;
        let entity = self.store.get_entity(guid).await?;
        if entity.is_deleted() {
            return Err(OmrError::not_found(&entity.type_name, guid));
        }
        self.check_visibility(ctx, &entity)?;
        self.store
            .remove_classification(guid, classification_name, &ctx.user_id)
            .await?;
        tracing::info!(classification = classification_name, guid = %guid, "removed classification");
        Ok(())
    }

    // ── Uniqueness ─────────────────────────────────────────────

    async fn check_unique_qualified_name(
        &self,
        type_name: &str,
        qualified_name: &str,
        exclude: Option<EntityId>,
    ) -> Result<()> {
        let matches = self
            .store
            .find_entities_by_property_value(
                type_name,
                qualified_name,
                true,
                &[name::QUALIFIED_NAME.to_string()],
                0,
                2,
            )
            .await?;
        if matches.iter().any(|e| Some(e.guid) != exclude) {
            return Err(OmrError::Conflict(format!(
                "a {type_name} with qualified name `{qualified_name}` already exists"
            )));
        }
        Ok(())
    }
}

//! In-memory implementation of the `MetadataStore` port. Same semantics
//! as the Postgres adapter (soft delete, per-instance version counter,
//! substring property search) behind a pair of async RwLock maps.
//! Used by the handler integration tests and by embedders that want a
//! repository with no external dependencies.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use omr_core::error::OmrError;
use omr_core::instance::{
    AttachmentEnd, Classification, ElementOrigin, ElementStatus, Entity, EntityId,
    InstanceProperties, Relationship, RelationshipId,
};
use omr_core::ports::{MetadataStore, Result};
use omr_core::types::name;

/// Metadata store backed by in-process maps.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    entities: RwLock<BTreeMap<EntityId, Entity>>,
    relationships: RwLock<BTreeMap<RelationshipId, Relationship>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-deleted) entities. Test helper.
    pub async fn live_entity_count(&self) -> usize {
        self.entities
            .read()
            .await
            .values()
            .filter(|e| !e.is_deleted())
            .count()
    }

    /// Number of live relationships. Test helper.
    pub async fn live_relationship_count(&self) -> usize {
        self.relationships
            .read()
            .await
            .values()
            .filter(|r| !r.is_deleted())
            .count()
    }
}

fn property_matches(
    properties: &InstanceProperties,
    property_names: &[String],
    search_string: &str,
    exact: bool,
) -> bool {
    let needle = search_string.to_lowercase();
    property_names.iter().any(|p| {
        properties.get_string(p).is_some_and(|value| {
            if exact {
                value == search_string
            } else {
                value.to_lowercase().contains(&needle)
            }
        })
    })
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    // ── Entities ───────────────────────────────────────────────

    async fn create_entity(
        &self,
        type_name: &str,
        status: ElementStatus,
        properties: InstanceProperties,
        classifications: Vec<Classification>,
        user_id: &str,
    ) -> Result<Entity> {
        let now = Utc::now();
        let entity = Entity {
            guid: EntityId::new(),
            type_name: type_name.to_string(),
            status,
            origin: ElementOrigin::Local,
            properties,
            classifications,
            created_by: user_id.to_string(),
            updated_by: user_id.to_string(),
            create_time: now,
            update_time: now,
            version: 1,
        };
        self.entities
            .write()
            .await
            .insert(entity.guid, entity.clone());
        Ok(entity)
    }

    async fn get_entity(&self, guid: EntityId) -> Result<Entity> {
        self.entities
            .read()
            .await
            .get(&guid)
            .cloned()
            .ok_or_else(|| OmrError::not_found("Entity", guid))
    }

    async fn update_entity_properties(
        &self,
        guid: EntityId,
        properties: InstanceProperties,
        merge: bool,
        user_id: &str,
    ) -> Result<Entity> {
        let mut entities = self.entities.write().await;
        let entity = entities
            .get_mut(&guid)
            .filter(|e| !e.is_deleted())
            .ok_or_else(|| OmrError::not_found("Entity", guid))?;
        if merge {
            entity.properties.merge(properties);
        } else {
            entity.properties = properties;
        }
        entity.version += 1;
        entity.update_time = Utc::now();
        entity.updated_by = user_id.to_string();
        Ok(entity.clone())
    }

    async fn update_entity_status(
        &self,
        guid: EntityId,
        status: ElementStatus,
        user_id: &str,
    ) -> Result<Entity> {
        let mut entities = self.entities.write().await;
        let entity = entities
            .get_mut(&guid)
            .ok_or_else(|| OmrError::not_found("Entity", guid))?;
        entity.status = status;
        entity.version += 1;
        entity.update_time = Utc::now();
        entity.updated_by = user_id.to_string();
        Ok(entity.clone())
    }

    async fn delete_entity(&self, guid: EntityId, user_id: &str) -> Result<()> {
        let mut entities = self.entities.write().await;
        let entity = entities
            .get_mut(&guid)
            .filter(|e| !e.is_deleted())
            .ok_or_else(|| OmrError::not_found("Entity", guid))?;
        entity.status = ElementStatus::Deleted;
        entity.version += 1;
        entity.update_time = Utc::now();
        entity.updated_by = user_id.to_string();
        Ok(())
    }

    async fn find_entities_by_property_value(
        &self,
        type_name: &str,
        search_string: &str,
        exact: bool,
        property_names: &[String],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Entity>> {
        let entities = self.entities.read().await;
        let mut matches: Vec<Entity> = entities
            .values()
            .filter(|e| !e.is_deleted())
            .filter(|e| e.type_name == type_name)
            .filter(|e| property_matches(&e.properties, property_names, search_string, exact))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.create_time.cmp(&b.create_time).then(a.guid.cmp(&b.guid)));
        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }

    async fn anchored_entities(&self, anchor: EntityId) -> Result<Vec<Entity>> {
        let anchor_string = anchor.to_string();
        let entities = self.entities.read().await;
        Ok(entities
            .values()
            .filter(|e| !e.is_deleted())
            .filter(|e| {
                e.classification(name::ANCHORS)
                    .and_then(|c| c.properties.get_string(name::ANCHOR_GUID))
                    == Some(anchor_string.as_str())
            })
            .cloned()
            .collect())
    }

    // ── Classifications ────────────────────────────────────────

    async fn set_classification(
        &self,
        guid: EntityId,
        classification: Classification,
        user_id: &str,
    ) -> Result<Entity> {
        let mut entities = self.entities.write().await;
        let entity = entities
            .get_mut(&guid)
            .filter(|e| !e.is_deleted())
            .ok_or_else(|| OmrError::not_found("Entity", guid))?;
        entity.classifications.retain(|c| c.name != classification.name);
        entity.classifications.push(classification);
        entity.version += 1;
        entity.update_time = Utc::now();
        entity.updated_by = user_id.to_string();
        Ok(entity.clone())
    }

    async fn remove_classification(
        &self,
        guid: EntityId,
        classification_name: &str,
        user_id: &str,
    ) -> Result<Entity> {
        let mut entities = self.entities.write().await;
        let entity = entities
            .get_mut(&guid)
            .filter(|e| !e.is_deleted())
            .ok_or_else(|| OmrError::not_found("Entity", guid))?;
        let before = entity.classifications.len();
        entity.classifications.retain(|c| c.name != classification_name);
        if entity.classifications.len() == before {
            return Err(OmrError::not_found(classification_name, guid));
        }
        entity.version += 1;
        entity.update_time = Utc::now();
        entity.updated_by = user_id.to_string();
        Ok(entity.clone())
    }

    // ── Relationships ──────────────────────────────────────────

    async fn create_relationship(
        &self,
        type_name: &str,
        end_one: EntityId,
        end_two: EntityId,
        properties: InstanceProperties,
        user_id: &str,
    ) -> Result<Relationship> {
        let now = Utc::now();
        let relationship = Relationship {
            guid: RelationshipId::new(),
            type_name: type_name.to_string(),
            end_one,
            end_two,
            status: ElementStatus::Active,
            properties,
            created_by: user_id.to_string(),
            updated_by: user_id.to_string(),
            create_time: now,
            update_time: now,
            version: 1,
        };
        self.relationships
            .write()
            .await
            .insert(relationship.guid, relationship.clone());
        Ok(relationship)
    }

    async fn get_relationship(&self, guid: RelationshipId) -> Result<Relationship> {
        self.relationships
            .read()
            .await
            .get(&guid)
            .cloned()
            .ok_or_else(|| OmrError::not_found("Relationship", guid))
    }

    async fn update_relationship_properties(
        &self,
        guid: RelationshipId,
        properties: InstanceProperties,
        merge: bool,
        user_id: &str,
    ) -> Result<Relationship> {
        let mut relationships = self.relationships.write().await;
        let relationship = relationships
            .get_mut(&guid)
            .filter(|r| !r.is_deleted())
            .ok_or_else(|| OmrError::not_found("Relationship", guid))?;
        if merge {
            relationship.properties.merge(properties);
        } else {
            relationship.properties = properties;
        }
        relationship.version += 1;
        relationship.update_time = Utc::now();
        relationship.updated_by = user_id.to_string();
        Ok(relationship.clone())
    }

    async fn delete_relationship(&self, guid: RelationshipId, user_id: &str) -> Result<()> {
        let mut relationships = self.relationships.write().await;
        let relationship = relationships
            .get_mut(&guid)
            .filter(|r| !r.is_deleted())
            .ok_or_else(|| OmrError::not_found("Relationship", guid))?;
        relationship.status = ElementStatus::Deleted;
        relationship.version += 1;
        relationship.update_time = Utc::now();
        relationship.updated_by = user_id.to_string();
        Ok(())
    }

    async fn relationships_for_entity(
        &self,
        guid: EntityId,
        type_name: Option<&str>,
        end: AttachmentEnd,
    ) -> Result<Vec<Relationship>> {
        let relationships = self.relationships.read().await;
        let mut matches: Vec<Relationship> = relationships
            .values()
            .filter(|r| !r.is_deleted())
            .filter(|r| type_name.is_none_or(|t| r.type_name == t))
            .filter(|r| r.touches(guid, end))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.create_time.cmp(&b.create_time).then(a.guid.cmp(&b.guid)));
        Ok(matches)
    }
}

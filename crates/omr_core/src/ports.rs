//! Storage port trait. Adapter crates (omr_postgres, omr_memory)
//! implement this; the generic handler and everything above it depend
//! only on the trait.

use async_trait::async_trait;

use crate::error::OmrError;
use crate::instance::{
    AttachmentEnd, Classification, ElementStatus, Entity, EntityId, InstanceProperties,
    Relationship, RelationshipId,
};

pub type Result<T> = std::result::Result<T, OmrError>;

/// The type-erased metadata repository API.
///
/// Stores persist what they are given; type validation, zone visibility,
/// effectivity filtering and anchor propagation all happen above this
/// trait in `GenericHandler`. Implementations must bump the per-instance
/// `version` counter on every mutation and keep `update_time` current.
///
/// Deletes are soft (status becomes `Deleted`). `get_entity` returns
/// deleted instances so the layer above can distinguish "gone" from
/// "never existed"; the find and relationship queries return live
/// instances only.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // ── Entities ───────────────────────────────────────────────

    async fn create_entity(
        &self,
        type_name: &str,
        status: ElementStatus,
        properties: InstanceProperties,
        classifications: Vec<Classification>,
        user_id: &str,
    ) -> Result<Entity>;

    /// Fetch by guid, deleted or not. `NotFound` only for unknown guids.
    async fn get_entity(&self, guid: EntityId) -> Result<Entity>;

    /// Replace (merge=false) or overlay (merge=true) the property bag.
    async fn update_entity_properties(
        &self,
        guid: EntityId,
        properties: InstanceProperties,
        merge: bool,
        user_id: &str,
    ) -> Result<Entity>;

    async fn update_entity_status(
        &self,
        guid: EntityId,
        status: ElementStatus,
        user_id: &str,
    ) -> Result<Entity>;

    /// Soft delete. Deleting an already-deleted entity is `NotFound`.
    async fn delete_entity(&self, guid: EntityId, user_id: &str) -> Result<()>;

    /// Substring (or exact) match of `search_string` against the named
    /// string properties of live entities of `type_name`.
    async fn find_entities_by_property_value(
        &self,
        type_name: &str,
        search_string: &str,
        exact: bool,
        property_names: &[String],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Entity>>;

    /// Live entities whose `Anchors` classification names `anchor`.
    /// Drives the delete cascade in the generic handler.
    async fn anchored_entities(&self, anchor: EntityId) -> Result<Vec<Entity>>;

    // ── Classifications ────────────────────────────────────────

    /// Attach or replace (by name) a classification.
    async fn set_classification(
        &self,
        guid: EntityId,
        classification: Classification,
        user_id: &str,
    ) -> Result<Entity>;

    /// Detach a classification; `NotFound` when the entity does not
    /// carry it.
    async fn remove_classification(
        &self,
        guid: EntityId,
        classification_name: &str,
        user_id: &str,
    ) -> Result<Entity>;

    // ── Relationships ──────────────────────────────────────────

    async fn create_relationship(
        &self,
        type_name: &str,
        end_one: EntityId,
        end_two: EntityId,
        properties: InstanceProperties,
        user_id: &str,
    ) -> Result<Relationship>;

    async fn get_relationship(&self, guid: RelationshipId) -> Result<Relationship>;

    async fn update_relationship_properties(
        &self,
        guid: RelationshipId,
        properties: InstanceProperties,
        merge: bool,
        user_id: &str,
    ) -> Result<Relationship>;

    /// Soft delete; `NotFound` when already deleted.
    async fn delete_relationship(&self, guid: RelationshipId, user_id: &str) -> Result<()>;

    /// Live relationships touching `guid` at the given end, optionally
    /// restricted to one relationship type.
    async fn relationships_for_entity(
        &self,
        guid: EntityId,
        type_name: Option<&str>,
        end: AttachmentEnd,
    ) -> Result<Vec<Relationship>>;
}

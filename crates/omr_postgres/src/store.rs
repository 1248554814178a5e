//! Postgres implementation of the `MetadataStore` port.
//!
//! All SQL is runtime-checked (sqlx::query, not sqlx::query!) so the
//! crate builds without a database. Property bags and classification
//! lists live in JSONB columns; read-modify-write paths guard against
//! concurrent writers with a version check and report `Conflict` on a
//! miss.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;

use omr_core::error::OmrError;
use omr_core::instance::{
    AttachmentEnd, Classification, ElementStatus, Entity, EntityId, InstanceProperties,
    Relationship, RelationshipId,
};
use omr_core::ports::{MetadataStore, Result};
use omr_core::types::name;

use crate::sqlx_types::{PgEntityRow, PgRelationshipRow};

const ENTITY_COLUMNS: &str = "guid, type_name, status, origin, properties, classifications, \
     created_by, updated_by, create_time, update_time, version";

const RELATIONSHIP_COLUMNS: &str = "guid, type_name, end_one_guid, end_two_guid, status, \
     properties, created_by, updated_by, create_time, update_time, version";

/// Postgres-backed metadata store over the `omr` schema.
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn entity_from_row(row: PgEntityRow) -> Result<Entity> {
        row.try_into()
            .map_err(|e: String| OmrError::Internal(anyhow!(e)))
    }

    fn relationship_from_row(row: PgRelationshipRow) -> Result<Relationship> {
        row.try_into()
            .map_err(|e: String| OmrError::Internal(anyhow!(e)))
    }

    fn properties_json(properties: &InstanceProperties) -> Result<serde_json::Value> {
        serde_json::to_value(properties).map_err(|e| OmrError::Internal(anyhow!(e)))
    }

    fn classifications_json(classifications: &[Classification]) -> Result<serde_json::Value> {
        serde_json::to_value(classifications).map_err(|e| OmrError::Internal(anyhow!(e)))
    }

    /// Persist a mutated classification list, failing with `Conflict`
    /// when another writer got there first.
    async fn write_classifications(
        &self,
        entity: &Entity,
        classifications: &[Classification],
        user_id: &str,
    ) -> Result<Entity> {
        let row = sqlx::query_as::<_, PgEntityRow>(&format!(
            r#"
            UPDATE omr.entities
            SET classifications = $2,
                version = version + 1,
                update_time = now(),
                updated_by = $3
            WHERE guid = $1 AND version = $4 AND status <> 'deleted'
            RETURNING {ENTITY_COLUMNS}
            "#,
        ))
        .bind(entity.guid.0)
        .bind(Self::classifications_json(classifications)?)
        .bind(user_id)
        .bind(entity.version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        match row {
            Some(row) => Self::entity_from_row(row),
            None => Err(OmrError::Conflict(format!(
                "concurrent update of entity {}",
                entity.guid
            ))),
        }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    // ── Entities ───────────────────────────────────────────────

    async fn create_entity(
        &self,
        type_name: &str,
        status: ElementStatus,
        properties: InstanceProperties,
        classifications: Vec<Classification>,
        user_id: &str,
    ) -> Result<Entity> {
        let row = sqlx::query_as::<_, PgEntityRow>(&format!(
            r#"
            INSERT INTO omr.entities
                (guid, type_name, status, origin, properties, classifications,
                 created_by, updated_by, create_time, update_time, version)
            VALUES ($1, $2, $3, 'local', $4, $5, $6, $6, now(), now(), 1)
            RETURNING {ENTITY_COLUMNS}
            "#,
        ))
        .bind(EntityId::new().0)
        .bind(type_name)
        .bind(status.as_str())
        .bind(Self::properties_json(&properties)?)
        .bind(Self::classifications_json(&classifications)?)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Self::entity_from_row(row)
    }

    async fn get_entity(&self, guid: EntityId) -> Result<Entity> {
        let row = sqlx::query_as::<_, PgEntityRow>(&format!(
            "SELECT {ENTITY_COLUMNS} FROM omr.entities WHERE guid = $1",
        ))
        .bind(guid.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        match row {
            Some(row) => Self::entity_from_row(row),
            None => Err(OmrError::not_found("Entity", guid)),
        }
    }

    async fn update_entity_properties(
        &self,
        guid: EntityId,
        properties: InstanceProperties,
        merge: bool,
        user_id: &str,
    ) -> Result<Entity> {
        let new_properties = if merge {
            let current = self.get_entity(guid).await?;
            if current.is_deleted() {
                return Err(OmrError::not_found("Entity", guid));
            }
            let mut merged = current.properties;
            merged.merge(properties);
            // Re-check the version on write so a concurrent writer's
            // properties are never silently overwritten.
            let row = sqlx::query_as::<_, PgEntityRow>(&format!(
                r#"
                UPDATE omr.entities
                SET properties = $2,
                    version = version + 1,
                    update_time = now(),
                    updated_by = $3
                WHERE guid = $1 AND version = $4 AND status <> 'deleted'
                RETURNING {ENTITY_COLUMNS}
                "#,
            ))
            .bind(guid.0)
            .bind(Self::properties_json(&merged)?)
            .bind(user_id)
            .bind(current.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
            return match row {
                Some(row) => Self::entity_from_row(row),
                None => Err(OmrError::Conflict(format!(
                    "concurrent update of entity {guid}"
                ))),
            };
        } else {
            Self::properties_json(&properties)?
        };

        let row = sqlx::query_as::<_, PgEntityRow>(&format!(
            r#"
            UPDATE omr.entities
            SET properties = $2,
                version = version + 1,
                update_time = now(),
                updated_by = $3
            WHERE guid = $1 AND status <> 'deleted'
            RETURNING {ENTITY_COLUMNS}
            "#,
        ))
        .bind(guid.0)
        .bind(new_properties)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        match row {
            Some(row) => Self::entity_from_row(row),
            None => Err(OmrError::not_found("Entity", guid)),
        }
    }

    async fn update_entity_status(
        &self,
        guid: EntityId,
        status: ElementStatus,
        user_id: &str,
    ) -> Result<Entity> {
        let row = sqlx::query_as::<_, PgEntityRow>(&format!(
            r#"
            UPDATE omr.entities
            SET status = $2,
                version = version + 1,
                update_time = now(),
                updated_by = $3
            WHERE guid = $1
            RETURNING {ENTITY_COLUMNS}
            "#,
        ))
        .bind(guid.0)
        .bind(status.as_str())
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        match row {
            Some(row) => Self::entity_from_row(row),
            None => Err(OmrError::not_found("Entity", guid)),
        }
    }

    async fn delete_entity(&self, guid: EntityId, user_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE omr.entities
            SET status = 'deleted',
                version = version + 1,
                update_time = now(),
                updated_by = $2
            WHERE guid = $1 AND status <> 'deleted'
            "#,
        )
        .bind(guid.0)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(OmrError::not_found("Entity", guid));
        }
        tracing::debug!(%guid, "soft-deleted entity");
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
        // Property names come from crate constants; anything else is
        // dropped before interpolation into the JSONB path.
        let conditions: Vec<String> = property_names
            .iter()
            .filter(|p| {
                !p.is_empty()
                    && p.chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_')
            })
            .map(|p| {
                if exact {
                    format!("properties->'properties'->'{p}'->>'string' = $2")
                } else {
                    format!(
                        "properties->'properties'->'{p}'->>'string' ILIKE '%' || $2 || '%'"
                    )
                }
            })
            .collect();
        if conditions.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            r#"
            SELECT {ENTITY_COLUMNS}
            FROM omr.entities
            WHERE type_name = $1
              AND status <> 'deleted'
              AND ({})
            ORDER BY create_time, guid
            LIMIT $3 OFFSET $4
            "#,
            conditions.join(" OR "),
        );
        let rows = sqlx::query_as::<_, PgEntityRow>(&query)
            .bind(type_name)
            .bind(search_string)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        rows.into_iter().map(Self::entity_from_row).collect()
    }

    async fn anchored_entities(&self, anchor: EntityId) -> Result<Vec<Entity>> {
        let query = format!(
            r#"
            SELECT {ENTITY_COLUMNS}
            FROM omr.entities
            WHERE status <> 'deleted'
              AND EXISTS (
                  SELECT 1
                  FROM jsonb_array_elements(classifications) c
                  WHERE c->>'name' = '{anchors}'
                    AND c->'properties'->'properties'->'{anchor_guid}'->>'string' = $1
              )
            "#,
            anchors = name::ANCHORS,
            anchor_guid = name::ANCHOR_GUID,
        );
        let rows = sqlx::query_as::<_, PgEntityRow>(&query)
            .bind(anchor.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        rows.into_iter().map(Self::entity_from_row).collect()
    }

    // ── Classifications ────────────────────────────────────────

    async fn set_classification(
        &self,
        guid: EntityId,
        classification: Classification,
        user_id: &str,
    ) -> Result<Entity> {
        let entity = self.get_entity(guid).await?;
        if entity.is_deleted() {
            return Err(OmrError::not_found("Entity", guid));
        }
        let mut classifications: Vec<Classification> = entity
            .classifications
            .iter()
            .filter(|c| c.name != classification.name)
            .cloned()
            .collect();
        classifications.push(classification);
        self.write_classifications(&entity, &classifications, user_id)
            .await
    }

    async fn remove_classification(
        &self,
        guid: EntityId,
        classification_name: &str,
        user_id: &str,
    ) -> Result<Entity> {
        let entity = self.get_entity(guid).await?;
        if entity.is_deleted() {
            return Err(OmrError::not_found("Entity", guid));
        }
        if !entity.has_classification(classification_name) {
            return Err(OmrError::not_found(classification_name, guid));
        }
        let classifications: Vec<Classification> = entity
            .classifications
            .iter()
            .filter(|c| c.name != classification_name)
            .cloned()
            .collect();
        self.write_classifications(&entity, &classifications, user_id)
            .await
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
        let row = sqlx::query_as::<_, PgRelationshipRow>(&format!(
            r#"
            INSERT INTO omr.relationships
                (guid, type_name, end_one_guid, end_two_guid, status, properties,
                 created_by, updated_by, create_time, update_time, version)
            VALUES ($1, $2, $3, $4, 'active', $5, $6, $6, now(), now(), 1)
            RETURNING {RELATIONSHIP_COLUMNS}
            "#,
        ))
        .bind(RelationshipId::new().0)
        .bind(type_name)
        .bind(end_one.0)
        .bind(end_two.0)
        .bind(Self::properties_json(&properties)?)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Self::relationship_from_row(row)
    }

    async fn get_relationship(&self, guid: RelationshipId) -> Result<Relationship> {
        let row = sqlx::query_as::<_, PgRelationshipRow>(&format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM omr.relationships WHERE guid = $1",
        ))
        .bind(guid.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        match row {
            Some(row) => Self::relationship_from_row(row),
            None => Err(OmrError::not_found("Relationship", guid)),
        }
    }

    async fn update_relationship_properties(
        &self,
        guid: RelationshipId,
        properties: InstanceProperties,
        merge: bool,
        user_id: &str,
    ) -> Result<Relationship> {
        let new_properties = if merge {
            let current = self.get_relationship(guid).await?;
            if current.is_deleted() {
                return Err(OmrError::not_found("Relationship", guid));
            }
            let mut merged = current.properties;
            merged.merge(properties);
            merged
        } else {
            properties
        };
        let row = sqlx::query_as::<_, PgRelationshipRow>(&format!(
            r#"
            UPDATE omr.relationships
            SET properties = $2,
                version = version + 1,
                update_time = now(),
                updated_by = $3
            WHERE guid = $1 AND status <> 'deleted'
            RETURNING {RELATIONSHIP_COLUMNS}
            "#,
        ))
        .bind(guid.0)
        .bind(Self::properties_json(&new_properties)?)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        match row {
            Some(row) => Self::relationship_from_row(row),
            None => Err(OmrError::not_found("Relationship", guid)),
        }
    }

    async fn delete_relationship(&self, guid: RelationshipId, user_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE omr.relationships
            SET status = 'deleted',
                version = version + 1,
                update_time = now(),
                updated_by = $2
            WHERE guid = $1 AND status <> 'deleted'
            "#,
        )
        .bind(guid.0)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(OmrError::not_found("Relationship", guid));
        }
        Ok(())
    }

    async fn relationships_for_entity(
        &self,
        guid: EntityId,
        type_name: Option<&str>,
        end: AttachmentEnd,
    ) -> Result<Vec<Relationship>> {
        let end_condition = match end {
            AttachmentEnd::One => "end_one_guid = $1",
            AttachmentEnd::Two => "end_two_guid = $1",
            AttachmentEnd::Either => "(end_one_guid = $1 OR end_two_guid = $1)",
        };
        let type_condition = if type_name.is_some() {
            " AND type_name = $2"
        } else {
            ""
        };
        let query = format!(
            r#"
            SELECT {RELATIONSHIP_COLUMNS}
            FROM omr.relationships
            WHERE status <> 'deleted' AND {end_condition}{type_condition}
            ORDER BY create_time, guid
            "#,
        );
        let mut q = sqlx::query_as::<_, PgRelationshipRow>(&query).bind(guid.0);
        if let Some(t) = type_name {
            q = q.bind(t);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(|e| anyhow!(e))?;
        rows.into_iter().map(Self::relationship_from_row).collect()
    }
}

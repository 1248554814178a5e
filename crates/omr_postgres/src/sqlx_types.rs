//! Row types with sqlx derives and their fallible conversions into the
//! pure instance types. Unknown status/origin strings mean the row was
//! written by something newer than this binary, so they surface as
//! internal errors rather than panics.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use omr_core::instance::{
    Classification, ElementOrigin, ElementStatus, Entity, EntityId, InstanceProperties,
    Relationship, RelationshipId,
};

#[derive(Debug, FromRow)]
pub struct PgEntityRow {
    pub guid: Uuid,
    pub type_name: String,
    pub status: String,
    pub origin: String,
    pub properties: serde_json::Value,
    pub classifications: serde_json::Value,
    pub created_by: String,
    pub updated_by: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub version: i64,
}

impl TryFrom<PgEntityRow> for Entity {
    type Error = String;

    fn try_from(row: PgEntityRow) -> Result<Self, Self::Error> {
        let status = ElementStatus::from_str(&row.status)
            .ok_or_else(|| format!("unknown entity status `{}`", row.status))?;
        let origin = ElementOrigin::from_str(&row.origin)
            .ok_or_else(|| format!("unknown entity origin `{}`", row.origin))?;
        let properties: InstanceProperties = serde_json::from_value(row.properties)
            .map_err(|e| format!("bad properties column: {e}"))?;
        let classifications: Vec<Classification> = serde_json::from_value(row.classifications)
            .map_err(|e| format!("bad classifications column: {e}"))?;
        Ok(Entity {
            guid: EntityId(row.guid),
            type_name: row.type_name,
            status,
            origin,
            properties,
            classifications,
            created_by: row.created_by,
            updated_by: row.updated_by,
            create_time: row.create_time,
            update_time: row.update_time,
            version: row.version,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct PgRelationshipRow {
    pub guid: Uuid,
    pub type_name: String,
    pub end_one_guid: Uuid,
    pub end_two_guid: Uuid,
    pub status: String,
    pub properties: serde_json::Value,
    pub created_by: String,
    pub updated_by: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub version: i64,
}

impl TryFrom<PgRelationshipRow> for Relationship {
    type Error = String;

    fn try_from(row: PgRelationshipRow) -> Result<Self, Self::Error> {
        let status = ElementStatus::from_str(&row.status)
            .ok_or_else(|| format!("unknown relationship status `{}`", row.status))?;
        let properties: InstanceProperties = serde_json::from_value(row.properties)
            .map_err(|e| format!("bad properties column: {e}"))?;
        Ok(Relationship {
            guid: RelationshipId(row.guid),
            type_name: row.type_name,
            end_one: EntityId(row.end_one_guid),
            end_two: EntityId(row.end_two_guid),
            status,
            properties,
            created_by: row.created_by,
            updated_by: row.updated_by,
            create_time: row.create_time,
            update_time: row.update_time,
            version: row.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity_row() -> PgEntityRow {
        PgEntityRow {
            guid: Uuid::new_v4(),
            type_name: "Glossary".into(),
            status: "active".into(),
            origin: "local".into(),
            properties: json!({
                "properties": {
                    "qualified_name": {"string": "Glossary:A"},
                    "display_name": {"string": "A"}
                }
            }),
            classifications: json!([]),
            created_by: "kim".into(),
            updated_by: "kim".into(),
            create_time: Utc::now(),
            update_time: Utc::now(),
            version: 1,
        }
    }

    #[test]
    fn entity_row_converts() {
        let entity: Entity = entity_row().try_into().unwrap();
        assert_eq!(entity.status, ElementStatus::Active);
        assert_eq!(entity.qualified_name(), Some("Glossary:A"));
        assert!(entity.classifications.is_empty());
    }

    #[test]
    fn unknown_status_is_an_error() {
        let mut row = entity_row();
        row.status = "archived".into();
        let err = Entity::try_from(row).unwrap_err();
        assert!(err.contains("archived"));
    }

    #[test]
    fn classification_column_round_trips() {
        let mut row = entity_row();
        row.classifications = json!([{
            "name": "Anchors",
            "properties": {
                "properties": {"anchor_guid": {"string": "abc"}}
            },
            "origin": "local"
        }]);
        let entity: Entity = row.try_into().unwrap();
        assert_eq!(
            entity
                .classification("Anchors")
                .unwrap()
                .properties
                .get_string("anchor_guid"),
            Some("abc")
        );
    }

    #[test]
    fn relationship_row_converts() {
        let row = PgRelationshipRow {
            guid: Uuid::new_v4(),
            type_name: "CategoryAnchor".into(),
            end_one_guid: Uuid::new_v4(),
            end_two_guid: Uuid::new_v4(),
            status: "active".into(),
            properties: json!({"properties": {}}),
            created_by: "kim".into(),
            updated_by: "kim".into(),
            create_time: Utc::now(),
            update_time: Utc::now(),
            version: 1,
        };
        let relationship: Relationship = row.try_into().unwrap();
        assert_eq!(relationship.type_name, "CategoryAnchor");
        assert_eq!(relationship.status, ElementStatus::Active);
    }
}

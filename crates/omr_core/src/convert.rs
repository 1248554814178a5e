//! Entity-to-bean conversion. `ElementHeader` carries the repository
//! provenance every typed bean shares; each handler module provides a
//! converter that reads the properties its builder wrote.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OmrError;
use crate::instance::{ElementOrigin, ElementStatus, Entity, Relationship};
use crate::types::{name, TypeRegistry};

/// Classification snapshot as exposed on beans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementClassification {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// Repository header common to every typed bean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementHeader {
    pub guid: String,
    pub type_name: String,
    pub status: ElementStatus,
    pub origin: ElementOrigin,
    pub version: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classifications: Vec<ElementClassification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<DateTime<Utc>>,
    pub created_by: String,
    pub updated_by: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl ElementHeader {
    pub fn from_entity(entity: &Entity) -> Self {
        let classifications = entity
            .classifications
            .iter()
            .map(|c| ElementClassification {
                name: c.name.clone(),
                properties: c
                    .properties
                    .properties
                    .iter()
                    .map(|(k, v)| {
                        (
                            k.clone(),
                            serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
                        )
                    })
                    .collect(),
            })
            .collect();
        Self {
            guid: entity.guid.to_string(),
            type_name: entity.type_name.clone(),
            status: entity.status,
            origin: entity.origin,
            version: entity.version,
            classifications,
            effective_from: entity.properties.effective_from,
            effective_to: entity.properties.effective_to,
            created_by: entity.created_by.clone(),
            updated_by: entity.updated_by.clone(),
            create_time: entity.create_time,
            update_time: entity.update_time,
        }
    }

    /// The anchor guid recorded by the `Anchors` classification, if any.
    pub fn anchor_guid(&self) -> Option<String> {
        self.classifications
            .iter()
            .find(|c| c.name == name::ANCHORS)
            .and_then(|c| c.properties.get(name::ANCHOR_GUID))
            .and_then(|v| v.get("string"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

/// Converts repository entities into a typed bean `B`.
pub trait ElementConverter<B>: Send + Sync {
    fn from_entity(&self, entity: &Entity) -> Result<B, OmrError>;

    /// For beans assembled from an entity plus the relationship it was
    /// reached through. Only relationship-aware converters override this.
    fn from_entity_and_relationship(
        &self,
        entity: &Entity,
        _relationship: &Relationship,
    ) -> Result<B, OmrError> {
        self.from_entity(entity)
    }
}

/// Guard shared by all converters: the stored entity must carry the
/// expected type (or a subtype of it).
pub fn check_entity_type(
    registry: &TypeRegistry,
    entity: &Entity,
    expected: &str,
) -> Result<(), OmrError> {
    if registry.is_subtype_of(&entity.type_name, expected) {
        Ok(())
    } else {
        Err(OmrError::TypeViolation(format!(
            "expected a {expected}, entity {} is a {}",
            entity.guid, entity.type_name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Classification, EntityId, InstanceProperties, PropertyValue};

    fn sample_entity() -> Entity {
        let mut props = InstanceProperties::new();
        props.set(
            name::QUALIFIED_NAME,
            PropertyValue::String("Glossary:Trading".into()),
        );
        let mut anchor_props = InstanceProperties::new();
        anchor_props.set(
            name::ANCHOR_GUID,
            PropertyValue::String("11111111-2222-3333-4444-555555555555".into()),
        );
        Entity {
            guid: EntityId::new(),
            type_name: name::GLOSSARY.into(),
            status: ElementStatus::Active,
            origin: ElementOrigin::Local,
            properties: props,
            classifications: vec![Classification::new(name::ANCHORS, anchor_props)],
            created_by: "kim".into(),
            updated_by: "kim".into(),
            create_time: Utc::now(),
            update_time: Utc::now(),
            version: 3,
        }
    }

    #[test]
    fn header_carries_provenance() {
        let entity = sample_entity();
        let header = ElementHeader::from_entity(&entity);
        assert_eq!(header.guid, entity.guid.to_string());
        assert_eq!(header.type_name, name::GLOSSARY);
        assert_eq!(header.version, 3);
        assert_eq!(header.classifications.len(), 1);
    }

    #[test]
    fn header_extracts_anchor_guid() {
        let header = ElementHeader::from_entity(&sample_entity());
        assert_eq!(
            header.anchor_guid().as_deref(),
            Some("11111111-2222-3333-4444-555555555555")
        );
    }

    #[test]
    fn type_guard_accepts_subtypes() {
        let registry = TypeRegistry::builtin();
        let entity = sample_entity();
        assert!(check_entity_type(&registry, &entity, name::GLOSSARY).is_ok());
        assert!(check_entity_type(&registry, &entity, name::REFERENCEABLE).is_ok());
        let err = check_entity_type(&registry, &entity, name::COLLECTION).unwrap_err();
        assert_eq!(err.http_status(), 422);
    }
}

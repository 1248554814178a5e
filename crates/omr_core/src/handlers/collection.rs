//! Collection handler. Collections group arbitrary referenceables via
//! `CollectionMembership`; a `Folder` classification marks ordered
//! collections.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::builder::PropertyBuilder;
use crate::context::CallContext;
use crate::convert::{ElementConverter, ElementHeader};
use crate::generic::GenericHandler;
use crate::instance::{
    AttachmentEnd, Classification, Entity, EntityId, InstanceProperties, PropertyValue,
    Relationship,
};
use crate::ports::Result;
use crate::types::name;

// ── Bean types ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionProperties {
    pub qualified_name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub effective_to: Option<DateTime<Utc>>,
}

/// Ordering of members within a folder collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionOrder {
    NameAscending,
    NameDescending,
    OwnerAscending,
    DateAdded,
    Other,
}

impl CollectionOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NameAscending => "name_ascending",
            Self::NameDescending => "name_descending",
            Self::OwnerAscending => "owner_ascending",
            Self::DateAdded => "date_added",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "name_ascending" => Some(Self::NameAscending),
            "name_descending" => Some(Self::NameDescending),
            "owner_ascending" => Some(Self::OwnerAscending),
            "date_added" => Some(Self::DateAdded),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Properties of the `Folder` classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderProperties {
    pub ordering: CollectionOrder,
    /// Property driving the order when `ordering` is `Other`.
    #[serde(default)]
    pub order_property_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionElement {
    pub header: ElementHeader,
    pub properties: CollectionProperties,
}

/// A member of a collection together with its membership rationale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionMember {
    pub header: ElementHeader,
    #[serde(default)]
    pub qualified_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub membership_rationale: Option<String>,
}

// ── Builder ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct CollectionBuilder {
    properties: CollectionProperties,
    extended: BTreeMap<String, PropertyValue>,
}

impl CollectionBuilder {
    pub fn new(properties: CollectionProperties) -> Self {
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
            .set_string_map(name::ADDITIONAL_PROPERTIES, p.additional_properties)
            .merge_extended(self.extended)
            .effectivity(p.effective_from, p.effective_to)?
            .build())
    }
}

fn folder_classification(folder: &FolderProperties) -> Classification {
    let properties = PropertyBuilder::new()
        .set_enum(name::ORDERING, folder.ordering.as_str())
        .set_optional_string(name::ORDER_PROPERTY_NAME, folder.order_property_name.clone())
        .build();
    Classification::new(name::FOLDER, properties)
}

// ── Converters ────────────────────────────────────────────────

pub struct CollectionConverter;

impl ElementConverter<CollectionElement> for CollectionConverter {
    fn from_entity(&self, entity: &Entity) -> Result<CollectionElement> {
        let p = &entity.properties;
        Ok(CollectionElement {
            header: ElementHeader::from_entity(entity),
            properties: CollectionProperties {
                qualified_name: p.get_string(name::QUALIFIED_NAME).unwrap_or_default().into(),
                display_name: p.get_string(name::DISPLAY_NAME).unwrap_or_default().into(),
                description: p.get_string(name::DESCRIPTION).map(Into::into),
                additional_properties: p.get_string_map(name::ADDITIONAL_PROPERTIES),
                effective_from: p.effective_from,
                effective_to: p.effective_to,
            },
        })
    }
}

/// Member conversion needs the membership relationship for the rationale.
pub struct CollectionMemberConverter;

impl ElementConverter<CollectionMember> for CollectionMemberConverter {
    fn from_entity(&self, entity: &Entity) -> Result<CollectionMember> {
        Ok(CollectionMember {
            header: ElementHeader::from_entity(entity),
            qualified_name: entity.properties.get_string(name::QUALIFIED_NAME).map(Into::into),
            display_name: entity.properties.get_string(name::DISPLAY_NAME).map(Into::into),
            membership_rationale: None,
        })
    }

    fn from_entity_and_relationship(
        &self,
        entity: &Entity,
        relationship: &Relationship,
    ) -> Result<CollectionMember> {
        let mut member = self.from_entity(entity)?;
        member.membership_rationale = relationship
            .properties
            .get_string(name::MEMBERSHIP_RATIONALE)
            .map(Into::into);
        Ok(member)
    }
}

// ── Handler ───────────────────────────────────────────────────

pub struct CollectionHandler {
    generic: Arc<GenericHandler>,
}

impl CollectionHandler {
    pub fn new(generic: Arc<GenericHandler>) -> Self {
        Self { generic }
    }

    /// Create a collection, optionally classified as an ordered folder.
    pub async fn create_collection(
        &self,
        ctx: &CallContext,
        builder: CollectionBuilder,
        folder: Option<FolderProperties>,
    ) -> Result<EntityId> {
        let properties = builder.build()?;
        let classifications = folder
            .as_ref()
            .map(|f| vec![folder_classification(f)])
            .unwrap_or_default();
        self.generic
            .create_bean(ctx, name::COLLECTION, properties, classifications, None)
            .await
    }

    pub async fn update_collection(
        &self,
        ctx: &CallContext,
        collection_guid: EntityId,
        builder: CollectionBuilder,
        merge: bool,
    ) -> Result<()> {
        let properties = builder.build()?;
        self.generic
            .update_bean(ctx, collection_guid, name::COLLECTION, properties, merge)
            .await
    }

    pub async fn remove_collection(
        &self,
        ctx: &CallContext,
        collection_guid: EntityId,
    ) -> Result<()> {
        self.generic
            .delete_bean(ctx, collection_guid, name::COLLECTION)
            .await
    }

    pub async fn get_collection(
        &self,
        ctx: &CallContext,
        collection_guid: EntityId,
    ) -> Result<CollectionElement> {
        let entity = self
            .generic
            .get_bean(ctx, collection_guid, name::COLLECTION)
            .await?;
        CollectionConverter.from_entity(&entity)
    }

    pub async fn find_collections(
        &self,
        ctx: &CallContext,
        search_string: &str,
        start_from: usize,
        page_size: usize,
    ) -> Result<Vec<CollectionElement>> {
        let entities = self
            .generic
            .find_beans(
                ctx,
                name::COLLECTION,
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
        entities.iter().map(|e| CollectionConverter.from_entity(e)).collect()
    }

    pub async fn collections_by_name(
        &self,
        ctx: &CallContext,
        collection_name: &str,
        start_from: usize,
        page_size: usize,
    ) -> Result<Vec<CollectionElement>> {
        let entities = self
            .generic
            .find_beans(
                ctx,
                name::COLLECTION,
                collection_name,
                true,
                &[
                    name::QUALIFIED_NAME.to_string(),
                    name::DISPLAY_NAME.to_string(),
                ],
                start_from,
                page_size,
            )
            .await?;
        entities.iter().map(|e| CollectionConverter.from_entity(e)).collect()
    }

    /// Add a referenceable to the collection.
    pub async fn add_member(
        &self,
        ctx: &CallContext,
        collection_guid: EntityId,
        member_guid: EntityId,
        membership_rationale: Option<String>,
    ) -> Result<()> {
        self.generic.get_bean(ctx, collection_guid, name::COLLECTION).await?;
        let properties = PropertyBuilder::new()
            .set_optional_string(name::MEMBERSHIP_RATIONALE, membership_rationale)
            .build();
        self.generic
            .link_elements(
                ctx,
                name::COLLECTION_MEMBERSHIP,
                collection_guid,
                member_guid,
                properties,
            )
            .await?;
        Ok(())
    }

    pub async fn remove_member(
        &self,
        ctx: &CallContext,
        collection_guid: EntityId,
        member_guid: EntityId,
    ) -> Result<()> {
        self.generic
            .unlink_elements(
                ctx,
                name::COLLECTION_MEMBERSHIP,
                collection_guid,
                member_guid,
            )
            .await
    }

    pub async fn collection_members(
        &self,
        ctx: &CallContext,
        collection_guid: EntityId,
    ) -> Result<Vec<CollectionMember>> {
        self.generic.get_bean(ctx, collection_guid, name::COLLECTION).await?;
        let attached = self
            .generic
            .get_attached(
                ctx,
                collection_guid,
                name::COLLECTION_MEMBERSHIP,
                AttachmentEnd::One,
            )
            .await?;
        attached
            .iter()
            .map(|(rel, e)| CollectionMemberConverter.from_entity_and_relationship(e, rel))
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_classification_properties() {
        let c = folder_classification(&FolderProperties {
            ordering: CollectionOrder::Other,
            order_property_name: Some("priority".into()),
        });
        assert_eq!(c.name, name::FOLDER);
        assert_eq!(c.properties.get_enum(name::ORDERING), Some("other"));
        assert_eq!(
            c.properties.get_string(name::ORDER_PROPERTY_NAME),
            Some("priority")
        );
    }

    #[test]
    fn collection_order_round_trip() {
        for o in [
            CollectionOrder::NameAscending,
            CollectionOrder::NameDescending,
            CollectionOrder::OwnerAscending,
            CollectionOrder::DateAdded,
            CollectionOrder::Other,
        ] {
            assert_eq!(CollectionOrder::from_str(o.as_str()), Some(o));
        }
        assert_eq!(CollectionOrder::from_str("random"), None);
    }

    #[test]
    fn builder_rejects_missing_display_name() {
        let err = CollectionBuilder::new(CollectionProperties {
            qualified_name: "Collection:Q3".into(),
            display_name: "".into(),
            ..Default::default()
        })
        .build()
        .unwrap_err();
        assert!(err.to_string().contains(name::DISPLAY_NAME));
    }
}

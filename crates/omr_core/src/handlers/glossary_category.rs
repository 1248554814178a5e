//! Glossary category handler. Categories are anchored to their glossary
//! and arranged into a hierarchy via `CategoryHierarchyLink`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::builder::PropertyBuilder;
use crate::context::CallContext;
use crate::convert::{ElementConverter, ElementHeader};
use crate::error::OmrError;
use crate::generic::GenericHandler;
use crate::instance::{AttachmentEnd, Entity, EntityId, InstanceProperties, PropertyValue};
use crate::ports::Result;
use crate::types::name;

// ── Bean types ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlossaryCategoryProperties {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryCategoryElement {
    pub header: ElementHeader,
    pub properties: GlossaryCategoryProperties,
}

// ── Builder ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct GlossaryCategoryBuilder {
    properties: GlossaryCategoryProperties,
    extended: BTreeMap<String, PropertyValue>,
}

impl GlossaryCategoryBuilder {
    pub fn new(properties: GlossaryCategoryProperties) -> Self {
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

// ── Converter ─────────────────────────────────────────────────

pub struct GlossaryCategoryConverter;

impl ElementConverter<GlossaryCategoryElement> for GlossaryCategoryConverter {
    fn from_entity(&self, entity: &Entity) -> Result<GlossaryCategoryElement> {
        let p = &entity.properties;
        Ok(GlossaryCategoryElement {
            header: ElementHeader::from_entity(entity),
            properties: GlossaryCategoryProperties {
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

// ── Handler ───────────────────────────────────────────────────

pub struct GlossaryCategoryHandler {
    generic: Arc<GenericHandler>,
}

impl GlossaryCategoryHandler {
    pub fn new(generic: Arc<GenericHandler>) -> Self {
        Self { generic }
    }

    /// Create a category anchored to its owning glossary.
    pub async fn create_category(
        &self,
        ctx: &CallContext,
        glossary_guid: EntityId,
        builder: GlossaryCategoryBuilder,
    ) -> Result<EntityId> {
        // Assert the glossary is live and visible before anchoring to it.
        self.generic.get_bean(ctx, glossary_guid, name::GLOSSARY).await?;
        let properties = builder.build()?;
        let category_guid = self
            .generic
            .create_bean(
                ctx,
                name::GLOSSARY_CATEGORY,
                properties,
                Vec::new(),
                Some(glossary_guid),
            )
            .await?;
        self.generic
            .link_elements(
                ctx,
                name::CATEGORY_ANCHOR,
                glossary_guid,
                category_guid,
                InstanceProperties::new(),
            )
            .await?;
        Ok(category_guid)
    }

    pub async fn update_category(
        &self,
        ctx: &CallContext,
        category_guid: EntityId,
        builder: GlossaryCategoryBuilder,
        merge: bool,
    ) -> Result<()> {
        let properties = builder.build()?;
        self.generic
            .update_bean(ctx, category_guid, name::GLOSSARY_CATEGORY, properties, merge)
            .await
    }

    pub async fn remove_category(&self, ctx: &CallContext, category_guid: EntityId) -> Result<()> {
        self.generic
            .delete_bean(ctx, category_guid, name::GLOSSARY_CATEGORY)
            .await
    }

    pub async fn get_category(
        &self,
        ctx: &CallContext,
        category_guid: EntityId,
    ) -> Result<GlossaryCategoryElement> {
        let entity = self
            .generic
            .get_bean(ctx, category_guid, name::GLOSSARY_CATEGORY)
            .await?;
        GlossaryCategoryConverter.from_entity(&entity)
    }

    pub async fn find_categories(
        &self,
        ctx: &CallContext,
        search_string: &str,
        start_from: usize,
        page_size: usize,
    ) -> Result<Vec<GlossaryCategoryElement>> {
        let entities = self
            .generic
            .find_beans(
                ctx,
                name::GLOSSARY_CATEGORY,
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
            .map(|e| GlossaryCategoryConverter.from_entity(e))
            .collect()
    }

    /// All categories anchored under one glossary.
    pub async fn categories_for_glossary(
        &self,
        ctx: &CallContext,
        glossary_guid: EntityId,
    ) -> Result<Vec<GlossaryCategoryElement>> {
        self.generic.get_bean(ctx, glossary_guid, name::GLOSSARY).await?;
        let attached = self
            .generic
            .get_attached(ctx, glossary_guid, name::CATEGORY_ANCHOR, AttachmentEnd::One)
            .await?;
        attached
            .iter()
            .map(|(_, e)| GlossaryCategoryConverter.from_entity(e))
            .collect()
    }

    /// Make `child_guid` a subcategory of `parent_guid`.
    pub async fn set_parent_category(
        &self,
        ctx: &CallContext,
        parent_guid: EntityId,
        child_guid: EntityId,
    ) -> Result<()> {
        if parent_guid == child_guid {
            return Err(OmrError::invalid_parameter(
                "child_guid",
                "a category cannot be its own parent",
            ));
        }
        self.generic
            .link_elements(
                ctx,
                name::CATEGORY_HIERARCHY_LINK,
                parent_guid,
                child_guid,
                InstanceProperties::new(),
            )
            .await?;
        Ok(())
    }

    pub async fn clear_parent_category(
        &self,
        ctx: &CallContext,
        parent_guid: EntityId,
        child_guid: EntityId,
    ) -> Result<()> {
        self.generic
            .unlink_elements(ctx, name::CATEGORY_HIERARCHY_LINK, parent_guid, child_guid)
            .await
    }

    /// The category's parent in the hierarchy, when it has one.
    pub async fn parent_category(
        &self,
        ctx: &CallContext,
        category_guid: EntityId,
    ) -> Result<Option<GlossaryCategoryElement>> {
        let attached = self
            .generic
            .get_attached(
                ctx,
                category_guid,
                name::CATEGORY_HIERARCHY_LINK,
                AttachmentEnd::Two,
            )
            .await?;
        attached
            .first()
            .map(|(_, e)| GlossaryCategoryConverter.from_entity(e))
            .transpose()
    }

    pub async fn subcategories(
        &self,
        ctx: &CallContext,
        category_guid: EntityId,
    ) -> Result<Vec<GlossaryCategoryElement>> {
        let attached = self
            .generic
            .get_attached(
                ctx,
                category_guid,
                name::CATEGORY_HIERARCHY_LINK,
                AttachmentEnd::One,
            )
            .await?;
        attached
            .iter()
            .map(|(_, e)| GlossaryCategoryConverter.from_entity(e))
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_qualified_name() {
        let err = GlossaryCategoryBuilder::new(GlossaryCategoryProperties {
            qualified_name: String::new(),
            display_name: "Products".into(),
            ..Default::default()
        })
        .build()
        .unwrap_err();
        assert!(err.to_string().contains(name::QUALIFIED_NAME));
    }

    #[test]
    fn extended_properties_survive_build() {
        let bag = GlossaryCategoryBuilder::new(GlossaryCategoryProperties {
            qualified_name: "Category:Products".into(),
            display_name: "Products".into(),
            ..Default::default()
        })
        .with_extended(BTreeMap::from([(
            "icon".to_string(),
            PropertyValue::String("folder".into()),
        )]))
        .build()
        .unwrap();
        assert_eq!(bag.get_string("icon"), Some("folder"));
    }
}

//! Glossary handler. Glossaries are top-level elements; their categories
//! and terms are anchored to them, so removing a glossary cascades.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::builder::PropertyBuilder;
use crate::context::CallContext;
use crate::convert::{check_entity_type, ElementConverter, ElementHeader};
use crate::generic::GenericHandler;
use crate::instance::{Entity, EntityId, InstanceProperties, PropertyValue};
use crate::ports::Result;
use crate::types::name;

// ── Bean types ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlossaryProperties {
    pub qualified_name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub usage: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub effective_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlossaryElement {
    pub header: ElementHeader,
    pub properties: GlossaryProperties,
}

// ── Builder ───────────────────────────────────────────────────

/// Serializes `GlossaryProperties` plus caller extensions into a
/// repository property bag.
#[derive(Debug, Default)]
pub struct GlossaryBuilder {
    properties: GlossaryProperties,
    extended: BTreeMap<String, PropertyValue>,
}

impl GlossaryBuilder {
    pub fn new(properties: GlossaryProperties) -> Self {
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
            .set_optional_string(name::LANGUAGE, p.language)
            .set_optional_string(name::USAGE, p.usage)
            .set_string_map(name::ADDITIONAL_PROPERTIES, p.additional_properties)
            .merge_extended(self.extended)
            .effectivity(p.effective_from, p.effective_to)?
            .build())
    }
}

// ── Converter ─────────────────────────────────────────────────

pub struct GlossaryConverter;

impl ElementConverter<GlossaryElement> for GlossaryConverter {
    fn from_entity(&self, entity: &Entity) -> Result<GlossaryElement> {
        let p = &entity.properties;
        Ok(GlossaryElement {
            header: ElementHeader::from_entity(entity),
            properties: GlossaryProperties {
                qualified_name: p.get_string(name::QUALIFIED_NAME).unwrap_or_default().into(),
                display_name: p.get_string(name::DISPLAY_NAME).unwrap_or_default().into(),
                description: p.get_string(name::DESCRIPTION).map(Into::into),
                language: p.get_string(name::LANGUAGE).map(Into::into),
                usage: p.get_string(name::USAGE).map(Into::into),
                additional_properties: p.get_string_map(name::ADDITIONAL_PROPERTIES),
                effective_from: p.effective_from,
                effective_to: p.effective_to,
            },
        })
    }
}

// ── Handler ───────────────────────────────────────────────────

pub struct GlossaryHandler {
    generic: Arc<GenericHandler>,
}

impl GlossaryHandler {
    pub fn new(generic: Arc<GenericHandler>) -> Self {
        Self { generic }
    }

    pub async fn create_glossary(
        &self,
        ctx: &CallContext,
        builder: GlossaryBuilder,
    ) -> Result<EntityId> {
        let properties = builder.build()?;
        self.generic
            .create_bean(ctx, name::GLOSSARY, properties, Vec::new(), None)
            .await
    }

    pub async fn update_glossary(
        &self,
        ctx: &CallContext,
        glossary_guid: EntityId,
        builder: GlossaryBuilder,
        merge: bool,
    ) -> Result<()> {
        let properties = builder.build()?;
        self.generic
            .update_bean(ctx, glossary_guid, name::GLOSSARY, properties, merge)
            .await
    }

    /// Removes the glossary and, via the anchor cascade, every category
    /// and term anchored to it.
    pub async fn remove_glossary(&self, ctx: &CallContext, glossary_guid: EntityId) -> Result<()> {
        self.generic
            .delete_bean(ctx, glossary_guid, name::GLOSSARY)
            .await
    }

    pub async fn get_glossary(
        &self,
        ctx: &CallContext,
        glossary_guid: EntityId,
    ) -> Result<GlossaryElement> {
        let entity = self.generic.get_bean(ctx, glossary_guid, name::GLOSSARY).await?;
        check_entity_type(self.generic.registry(), &entity, name::GLOSSARY)?;
        GlossaryConverter.from_entity(&entity)
    }

    /// Substring search over names and description.
    pub async fn find_glossaries(
        &self,
        ctx: &CallContext,
        search_string: &str,
        start_from: usize,
        page_size: usize,
    ) -> Result<Vec<GlossaryElement>> {
        let entities = self
            .generic
            .find_beans(
                ctx,
                name::GLOSSARY,
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
        entities.iter().map(|e| GlossaryConverter.from_entity(e)).collect()
    }

    /// Exact match on qualified or display name.
    pub async fn glossaries_by_name(
        &self,
        ctx: &CallContext,
        glossary_name: &str,
        start_from: usize,
        page_size: usize,
    ) -> Result<Vec<GlossaryElement>> {
        let entities = self
            .generic
            .find_beans(
                ctx,
                name::GLOSSARY,
                glossary_name,
                true,
                &[
                    name::QUALIFIED_NAME.to_string(),
                    name::DISPLAY_NAME.to_string(),
                ],
                start_from,
                page_size,
            )
            .await?;
        entities.iter().map(|e| GlossaryConverter.from_entity(e)).collect()
    }

    /// Mark the glossary as organized along a formal taxonomy.
    pub async fn set_taxonomy_classification(
        &self,
        ctx: &CallContext,
        glossary_guid: EntityId,
        organizing_principle: Option<String>,
    ) -> Result<()> {
        let properties = PropertyBuilder::new()
            .set_optional_string(name::ORGANIZING_PRINCIPLE, organizing_principle)
            .build();
        self.generic
            .set_classification(ctx, glossary_guid, name::TAXONOMY, properties)
            .await
    }

    pub async fn clear_taxonomy_classification(
        &self,
        ctx: &CallContext,
        glossary_guid: EntityId,
    ) -> Result<()> {
        self.generic
            .remove_classification(ctx, glossary_guid, name::TAXONOMY)
            .await
    }

    /// Mark the glossary as the canonical vocabulary for a scope.
    pub async fn set_canonical_vocabulary(
        &self,
        ctx: &CallContext,
        glossary_guid: EntityId,
        scope: Option<String>,
    ) -> Result<()> {
        let properties = PropertyBuilder::new()
            .set_optional_string(name::SCOPE, scope)
            .build();
        self.generic
            .set_classification(ctx, glossary_guid, name::CANONICAL_VOCABULARY, properties)
            .await
    }

    pub async fn clear_canonical_vocabulary(
        &self,
        ctx: &CallContext,
        glossary_guid: EntityId,
    ) -> Result<()> {
        self.generic
            .remove_classification(ctx, glossary_guid, name::CANONICAL_VOCABULARY)
            .await
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{ElementOrigin, ElementStatus};

    fn sample_properties() -> GlossaryProperties {
        GlossaryProperties {
            qualified_name: "Glossary:Trading".into(),
            display_name: "Trading".into(),
            description: Some("Terms used on the trading desk".into()),
            language: Some("en".into()),
            usage: None,
            additional_properties: BTreeMap::from([("owner".to_string(), "kim".to_string())]),
            effective_from: None,
            effective_to: None,
        }
    }

    #[test]
    fn builder_writes_expected_properties() {
        let bag = GlossaryBuilder::new(sample_properties()).build().unwrap();
        assert_eq!(bag.get_string(name::QUALIFIED_NAME), Some("Glossary:Trading"));
        assert_eq!(bag.get_string(name::DISPLAY_NAME), Some("Trading"));
        assert_eq!(bag.get_string(name::LANGUAGE), Some("en"));
        assert!(bag.get_string(name::USAGE).is_none());
        assert_eq!(
            bag.get_string_map(name::ADDITIONAL_PROPERTIES)
                .get("owner")
                .map(String::as_str),
            Some("kim")
        );
    }

    #[test]
    fn builder_requires_names() {
        let mut p = sample_properties();
        p.display_name = String::new();
        let err = GlossaryBuilder::new(p).build().unwrap_err();
        assert!(err.to_string().contains(name::DISPLAY_NAME));
    }

    #[test]
    fn converter_round_trips_builder_output() {
        let bag = GlossaryBuilder::new(sample_properties()).build().unwrap();
        let entity = Entity {
            guid: EntityId::new(),
            type_name: name::GLOSSARY.into(),
            status: ElementStatus::Active,
            origin: ElementOrigin::Local,
            properties: bag,
            classifications: vec![],
            created_by: "t".into(),
            updated_by: "t".into(),
            create_time: Utc::now(),
            update_time: Utc::now(),
            version: 1,
        };
        let element = GlossaryConverter.from_entity(&entity).unwrap();
        assert_eq!(element.properties.qualified_name, "Glossary:Trading");
        assert_eq!(element.properties.display_name, "Trading");
        assert_eq!(
            element.properties.description.as_deref(),
            Some("Terms used on the trading desk")
        );
        assert_eq!(element.header.type_name, name::GLOSSARY);
    }
}

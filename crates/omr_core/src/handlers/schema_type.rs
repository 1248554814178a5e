//! Schema type handler. Schema types describe the structure of data
//! assets; a choice schema type offers alternatives through
//! `SchemaTypeOption` links.

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
pub struct SchemaTypeProperties {
    pub qualified_name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version_number: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub usage: Option<String>,
    #[serde(default)]
    pub encoding_standard: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Derivation formula for calculated schema types.
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub effective_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaTypeElement {
    pub header: ElementHeader,
    pub properties: SchemaTypeProperties,
}

// ── Builder ───────────────────────────────────────────────────

/// Accumulates the full schema type surface into a repository property
/// bag. The richest of the builders: schema types carry authorship and
/// encoding metadata alongside the usual naming fields.
#[derive(Debug, Default)]
pub struct SchemaTypeBuilder {
    properties: SchemaTypeProperties,
    extended: BTreeMap<String, PropertyValue>,
}

impl SchemaTypeBuilder {
    pub fn new(properties: SchemaTypeProperties) -> Self {
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
            .set_optional_string(name::VERSION_NUMBER, p.version_number)
            .set_optional_string(name::AUTHOR, p.author)
            .set_optional_string(name::USAGE, p.usage)
            .set_optional_string(name::ENCODING_STANDARD, p.encoding_standard)
            .set_optional_string(name::NAMESPACE, p.namespace)
            .set_optional_string(name::FORMULA, p.formula)
            .set_bool(name::IS_DEPRECATED, p.is_deprecated)
            .set_string_map(name::ADDITIONAL_PROPERTIES, p.additional_properties)
            .merge_extended(self.extended)
            .effectivity(p.effective_from, p.effective_to)?
            .build())
    }
}

// ── Converter ─────────────────────────────────────────────────

pub struct SchemaTypeConverter;

impl ElementConverter<SchemaTypeElement> for SchemaTypeConverter {
    fn from_entity(&self, entity: &Entity) -> Result<SchemaTypeElement> {
        let p = &entity.properties;
        Ok(SchemaTypeElement {
            header: ElementHeader::from_entity(entity),
            properties: SchemaTypeProperties {
                qualified_name: p.get_string(name::QUALIFIED_NAME).unwrap_or_default().into(),
                display_name: p.get_string(name::DISPLAY_NAME).unwrap_or_default().into(),
                description: p.get_string(name::DESCRIPTION).map(Into::into),
                version_number: p.get_string(name::VERSION_NUMBER).map(Into::into),
                author: p.get_string(name::AUTHOR).map(Into::into),
                usage: p.get_string(name::USAGE).map(Into::into),
                encoding_standard: p.get_string(name::ENCODING_STANDARD).map(Into::into),
                namespace: p.get_string(name::NAMESPACE).map(Into::into),
                formula: p.get_string(name::FORMULA).map(Into::into),
                is_deprecated: p.get_bool(name::IS_DEPRECATED).unwrap_or(false),
                additional_properties: p.get_string_map(name::ADDITIONAL_PROPERTIES),
                effective_from: p.effective_from,
                effective_to: p.effective_to,
            },
        })
    }
}

// ── Handler ───────────────────────────────────────────────────

pub struct SchemaTypeHandler {
    generic: Arc<GenericHandler>,
}

impl SchemaTypeHandler {
    pub fn new(generic: Arc<GenericHandler>) -> Self {
        Self { generic }
    }

    pub async fn create_schema_type(
        &self,
        ctx: &CallContext,
        builder: SchemaTypeBuilder,
    ) -> Result<EntityId> {
        let properties = builder.build()?;
        self.generic
            .create_bean(ctx, name::SCHEMA_TYPE, properties, Vec::new(), None)
            .await
    }

    pub async fn update_schema_type(
        &self,
        ctx: &CallContext,
        schema_type_guid: EntityId,
        builder: SchemaTypeBuilder,
        merge: bool,
    ) -> Result<()> {
        let properties = builder.build()?;
        self.generic
            .update_bean(ctx, schema_type_guid, name::SCHEMA_TYPE, properties, merge)
            .await
    }

    pub async fn remove_schema_type(
        &self,
        ctx: &CallContext,
        schema_type_guid: EntityId,
    ) -> Result<()> {
        self.generic
            .delete_bean(ctx, schema_type_guid, name::SCHEMA_TYPE)
            .await
    }

    pub async fn get_schema_type(
        &self,
        ctx: &CallContext,
        schema_type_guid: EntityId,
    ) -> Result<SchemaTypeElement> {
        let entity = self
            .generic
            .get_bean(ctx, schema_type_guid, name::SCHEMA_TYPE)
            .await?;
        SchemaTypeConverter.from_entity(&entity)
    }

    pub async fn find_schema_types(
        &self,
        ctx: &CallContext,
        search_string: &str,
        start_from: usize,
        page_size: usize,
    ) -> Result<Vec<SchemaTypeElement>> {
        let entities = self
            .generic
            .find_beans(
                ctx,
                name::SCHEMA_TYPE,
                search_string,
                false,
                &[
                    name::QUALIFIED_NAME.to_string(),
                    name::DISPLAY_NAME.to_string(),
                    name::DESCRIPTION.to_string(),
                    name::NAMESPACE.to_string(),
                ],
                start_from,
                page_size,
            )
            .await?;
        entities.iter().map(|e| SchemaTypeConverter.from_entity(e)).collect()
    }

    pub async fn schema_types_by_name(
        &self,
        ctx: &CallContext,
        schema_type_name: &str,
        start_from: usize,
        page_size: usize,
    ) -> Result<Vec<SchemaTypeElement>> {
        let entities = self
            .generic
            .find_beans(
                ctx,
                name::SCHEMA_TYPE,
                schema_type_name,
                true,
                &[
                    name::QUALIFIED_NAME.to_string(),
                    name::DISPLAY_NAME.to_string(),
                ],
                start_from,
                page_size,
            )
            .await?;
        entities.iter().map(|e| SchemaTypeConverter.from_entity(e)).collect()
    }

    /// Offer `option_guid` as an alternative of the choice schema type.
    pub async fn add_schema_type_option(
        &self,
        ctx: &CallContext,
        choice_guid: EntityId,
        option_guid: EntityId,
    ) -> Result<()> {
        if choice_guid == option_guid {
            return Err(OmrError::invalid_parameter(
                "option_guid",
                "a schema type cannot be an option of itself",
            ));
        }
        self.generic
            .link_elements(
                ctx,
                name::SCHEMA_TYPE_OPTION,
                choice_guid,
                option_guid,
                InstanceProperties::new(),
            )
            .await?;
        Ok(())
    }

    pub async fn remove_schema_type_option(
        &self,
        ctx: &CallContext,
        choice_guid: EntityId,
        option_guid: EntityId,
    ) -> Result<()> {
        self.generic
            .unlink_elements(ctx, name::SCHEMA_TYPE_OPTION, choice_guid, option_guid)
            .await
    }

    pub async fn schema_type_options(
        &self,
        ctx: &CallContext,
        choice_guid: EntityId,
    ) -> Result<Vec<SchemaTypeElement>> {
        let attached = self
            .generic
            .get_attached(ctx, choice_guid, name::SCHEMA_TYPE_OPTION, AttachmentEnd::One)
            .await?;
        attached
            .iter()
            .map(|(_, e)| SchemaTypeConverter.from_entity(e))
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SchemaTypeProperties {
        SchemaTypeProperties {
            qualified_name: "SchemaType:trades-v2".into(),
            display_name: "Trades v2".into(),
            description: Some("Trade record layout".into()),
            version_number: Some("2.1".into()),
            author: Some("data-platform".into()),
            encoding_standard: Some("avro".into()),
            namespace: Some("trading".into()),
            formula: None,
            is_deprecated: false,
            ..Default::default()
        }
    }

    #[test]
    fn builder_writes_schema_surface() {
        let bag = SchemaTypeBuilder::new(sample()).build().unwrap();
        assert_eq!(bag.get_string(name::VERSION_NUMBER), Some("2.1"));
        assert_eq!(bag.get_string(name::AUTHOR), Some("data-platform"));
        assert_eq!(bag.get_string(name::ENCODING_STANDARD), Some("avro"));
        assert_eq!(bag.get_string(name::NAMESPACE), Some("trading"));
        assert_eq!(bag.get_bool(name::IS_DEPRECATED), Some(false));
        assert!(bag.get_string(name::FORMULA).is_none());
    }

    #[test]
    fn converter_round_trips_builder_output() {
        let bag = SchemaTypeBuilder::new(sample()).build().unwrap();
        let entity = Entity {
            guid: EntityId::new(),
            type_name: name::SCHEMA_TYPE.into(),
            status: crate::instance::ElementStatus::Active,
            origin: crate::instance::ElementOrigin::Local,
            properties: bag,
            classifications: vec![],
            created_by: "t".into(),
            updated_by: "t".into(),
            create_time: Utc::now(),
            update_time: Utc::now(),
            version: 1,
        };
        let element = SchemaTypeConverter.from_entity(&entity).unwrap();
        assert_eq!(element.properties.qualified_name, "SchemaType:trades-v2");
        assert_eq!(element.properties.version_number.as_deref(), Some("2.1"));
        assert!(!element.properties.is_deprecated);
    }

    #[test]
    fn derived_schema_type_carries_formula() {
        let mut p = sample();
        p.formula = Some("price * quantity".into());
        let bag = SchemaTypeBuilder::new(p).build().unwrap();
        assert_eq!(bag.get_string(name::FORMULA), Some("price * quantity"));
    }
}

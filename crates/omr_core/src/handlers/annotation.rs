//! Annotation handler. Annotations hang off a discovery analysis report
//! (their anchor) and may extend one another; their review lifecycle is
//! carried in the `annotation_status` property.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::builder::PropertyBuilder;
use crate::context::CallContext;
use crate::convert::{ElementConverter, ElementHeader};
use crate::generic::GenericHandler;
use crate::instance::{AttachmentEnd, Entity, EntityId, InstanceProperties};
use crate::ports::Result;
use crate::types::name;

// ── Status ────────────────────────────────────────────────────

/// Review lifecycle of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStatus {
    New,
    Reviewed,
    Approved,
    Actioned,
    Invalid,
    Ignored,
}

impl AnnotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Reviewed => "reviewed",
            Self::Approved => "approved",
            Self::Actioned => "actioned",
            Self::Invalid => "invalid",
            Self::Ignored => "ignored",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "reviewed" => Some(Self::Reviewed),
            "approved" => Some(Self::Approved),
            "actioned" => Some(Self::Actioned),
            "invalid" => Some(Self::Invalid),
            "ignored" => Some(Self::Ignored),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnnotationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Bean types ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationProperties {
    pub annotation_type: String,
    pub summary: String,
    #[serde(default)]
    pub confidence_level: Option<i64>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub analysis_step: Option<String>,
    /// Free-form payload produced by the discovery service.
    #[serde(default)]
    pub json_properties: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationElement {
    pub header: ElementHeader,
    pub status: AnnotationStatus,
    pub properties: AnnotationProperties,
}

// ── Builder ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct AnnotationBuilder {
    properties: AnnotationProperties,
}

impl AnnotationBuilder {
    pub fn new(properties: AnnotationProperties) -> Self {
        Self { properties }
    }

    pub fn build(self) -> Result<InstanceProperties> {
        let p = self.properties;
        Ok(PropertyBuilder::new()
            .set_string(name::ANNOTATION_TYPE, p.annotation_type)?
            .set_string(name::SUMMARY, p.summary)?
            .set_optional_i64(name::CONFIDENCE_LEVEL, p.confidence_level)
            .set_optional_string(name::EXPRESSION, p.expression)
            .set_optional_string(name::EXPLANATION, p.explanation)
            .set_optional_string(name::ANALYSIS_STEP, p.analysis_step)
            .set_optional_string(name::JSON_PROPERTIES, p.json_properties)
            .set_enum(name::ANNOTATION_STATUS, AnnotationStatus::New.as_str())
            .build())
    }
}

// ── Converter ─────────────────────────────────────────────────

pub struct AnnotationConverter;

impl ElementConverter<AnnotationElement> for AnnotationConverter {
    fn from_entity(&self, entity: &Entity) -> Result<AnnotationElement> {
        let p = &entity.properties;
        let status = p
            .get_enum(name::ANNOTATION_STATUS)
            .and_then(AnnotationStatus::from_str)
            .unwrap_or(AnnotationStatus::New);
        Ok(AnnotationElement {
            header: ElementHeader::from_entity(entity),
            status,
            properties: AnnotationProperties {
                annotation_type: p.get_string(name::ANNOTATION_TYPE).unwrap_or_default().into(),
                summary: p.get_string(name::SUMMARY).unwrap_or_default().into(),
                confidence_level: p.get_i64(name::CONFIDENCE_LEVEL),
                expression: p.get_string(name::EXPRESSION).map(Into::into),
                explanation: p.get_string(name::EXPLANATION).map(Into::into),
                analysis_step: p.get_string(name::ANALYSIS_STEP).map(Into::into),
                json_properties: p.get_string(name::JSON_PROPERTIES).map(Into::into),
            },
        })
    }
}

// ── Handler ───────────────────────────────────────────────────

pub struct AnnotationHandler {
    generic: Arc<GenericHandler>,
}

impl AnnotationHandler {
    pub fn new(generic: Arc<GenericHandler>) -> Self {
        Self { generic }
    }

    /// Record a new annotation on a discovery analysis report. The
    /// report anchors the annotation, so clearing the report removes it.
    pub async fn add_annotation_to_report(
        &self,
        ctx: &CallContext,
        report_guid: EntityId,
        builder: AnnotationBuilder,
    ) -> Result<EntityId> {
        self.generic
            .get_bean(ctx, report_guid, name::DISCOVERY_REPORT)
            .await?;
        let properties = builder.build()?;
        let annotation_guid = self
            .generic
            .create_bean(ctx, name::ANNOTATION, properties, Vec::new(), Some(report_guid))
            .await?;
        self.generic
            .link_elements(
                ctx,
                name::REPORTED_ANNOTATION,
                report_guid,
                annotation_guid,
                InstanceProperties::new(),
            )
            .await?;
        Ok(annotation_guid)
    }

    /// Attach a refinement to an existing annotation. The extension
    /// inherits the parent's anchor so the whole tree is removed with
    /// the report.
    pub async fn add_extension_annotation(
        &self,
        ctx: &CallContext,
        parent_annotation_guid: EntityId,
        builder: AnnotationBuilder,
    ) -> Result<EntityId> {
        let parent = self
            .generic
            .get_bean(ctx, parent_annotation_guid, name::ANNOTATION)
            .await?;
        let anchor = ElementHeader::from_entity(&parent)
            .anchor_guid()
            .and_then(|g| g.parse().ok().map(crate::instance::EntityId))
            .unwrap_or(parent_annotation_guid);
        let properties = builder.build()?;
        let extension_guid = self
            .generic
            .create_bean(ctx, name::ANNOTATION, properties, Vec::new(), Some(anchor))
            .await?;
        self.generic
            .link_elements(
                ctx,
                name::ANNOTATION_EXTENSION,
                parent_annotation_guid,
                extension_guid,
                InstanceProperties::new(),
            )
            .await?;
        Ok(extension_guid)
    }

    /// Full replacement of the annotation's analysis properties; the
    /// review status is preserved.
    pub async fn update_annotation(
        &self,
        ctx: &CallContext,
        annotation_guid: EntityId,
        builder: AnnotationBuilder,
    ) -> Result<()> {
        let current = self
            .generic
            .get_bean(ctx, annotation_guid, name::ANNOTATION)
            .await?;
        let status = current
            .properties
            .get_enum(name::ANNOTATION_STATUS)
            .and_then(AnnotationStatus::from_str)
            .unwrap_or(AnnotationStatus::New);
        let mut properties = builder.build()?;
        properties.set(
            name::ANNOTATION_STATUS,
            crate::instance::PropertyValue::Enum {
                symbolic_name: status.as_str().into(),
            },
        );
        self.generic
            .update_bean(ctx, annotation_guid, name::ANNOTATION, properties, false)
            .await
    }

    pub async fn remove_annotation(
        &self,
        ctx: &CallContext,
        annotation_guid: EntityId,
    ) -> Result<()> {
        self.generic
            .delete_bean(ctx, annotation_guid, name::ANNOTATION)
            .await
    }

    pub async fn get_annotation(
        &self,
        ctx: &CallContext,
        annotation_guid: EntityId,
    ) -> Result<AnnotationElement> {
        let entity = self
            .generic
            .get_bean(ctx, annotation_guid, name::ANNOTATION)
            .await?;
        AnnotationConverter.from_entity(&entity)
    }

    /// Annotations recorded on a report, optionally restricted to one
    /// review status.
    pub async fn annotations_for_report(
        &self,
        ctx: &CallContext,
        report_guid: EntityId,
        status_filter: Option<AnnotationStatus>,
    ) -> Result<Vec<AnnotationElement>> {
        self.generic
            .get_bean(ctx, report_guid, name::DISCOVERY_REPORT)
            .await?;
        let attached = self
            .generic
            .get_attached(
                ctx,
                report_guid,
                name::REPORTED_ANNOTATION,
                AttachmentEnd::One,
            )
            .await?;
        let mut annotations = Vec::new();
        for (_, entity) in &attached {
            let element = AnnotationConverter.from_entity(entity)?;
            if status_filter.is_none_or(|s| element.status == s) {
                annotations.push(element);
            }
        }
        Ok(annotations)
    }

    pub async fn extension_annotations(
        &self,
        ctx: &CallContext,
        annotation_guid: EntityId,
    ) -> Result<Vec<AnnotationElement>> {
        let attached = self
            .generic
            .get_attached(
                ctx,
                annotation_guid,
                name::ANNOTATION_EXTENSION,
                AttachmentEnd::One,
            )
            .await?;
        attached
            .iter()
            .map(|(_, e)| AnnotationConverter.from_entity(e))
            .collect()
    }

    /// Move the annotation through its review lifecycle.
    pub async fn set_annotation_status(
        &self,
        ctx: &CallContext,
        annotation_guid: EntityId,
        status: AnnotationStatus,
    ) -> Result<()> {
        self.generic
            .get_bean(ctx, annotation_guid, name::ANNOTATION)
            .await?;
        let properties = PropertyBuilder::new()
            .set_enum(name::ANNOTATION_STATUS, status.as_str())
            .build();
        self.generic
            .update_bean(ctx, annotation_guid, name::ANNOTATION, properties, true)
            .await
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_annotations_start_in_new_status() {
        let bag = AnnotationBuilder::new(AnnotationProperties {
            annotation_type: "schema-analysis".into(),
            summary: "3 columns profiled".into(),
            confidence_level: Some(85),
            ..Default::default()
        })
        .build()
        .unwrap();
        assert_eq!(bag.get_enum(name::ANNOTATION_STATUS), Some("new"));
        assert_eq!(bag.get_i64(name::CONFIDENCE_LEVEL), Some(85));
    }

    #[test]
    fn builder_requires_type_and_summary() {
        let err = AnnotationBuilder::new(AnnotationProperties {
            annotation_type: "".into(),
            summary: "x".into(),
            ..Default::default()
        })
        .build()
        .unwrap_err();
        assert!(err.to_string().contains(name::ANNOTATION_TYPE));
    }

    #[test]
    fn status_round_trip() {
        for s in [
            AnnotationStatus::New,
            AnnotationStatus::Reviewed,
            AnnotationStatus::Approved,
            AnnotationStatus::Actioned,
            AnnotationStatus::Invalid,
            AnnotationStatus::Ignored,
        ] {
            assert_eq!(AnnotationStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(AnnotationStatus::from_str("done"), None);
    }
}

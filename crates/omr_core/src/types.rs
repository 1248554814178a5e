//! Declarative type registry. One descriptor per open metadata type,
//! looked up by name; the typed handlers stay thin because everything
//! type-specific (valid ends, valid classifications, property names)
//! lives here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use uuid::Uuid;

use crate::error::OmrError;

// ── Well-known names ──────────────────────────────────────────

/// Type and property name constants shared by the typed handlers.
pub mod name {
    // Entity types
    pub const REFERENCEABLE: &str = "Referenceable";
    pub const GLOSSARY: &str = "Glossary";
    pub const GLOSSARY_CATEGORY: &str = "GlossaryCategory";
    pub const GLOSSARY_TERM: &str = "GlossaryTerm";
    pub const COLLECTION: &str = "Collection";
    pub const ANNOTATION: &str = "Annotation";
    pub const DISCOVERY_REPORT: &str = "OpenDiscoveryAnalysisReport";
    pub const GOVERNANCE_ACTION_PROCESS: &str = "GovernanceActionProcess";
    pub const GOVERNANCE_ACTION_PROCESS_STEP: &str = "GovernanceActionProcessStep";
    pub const GOVERNANCE_ACTION_TYPE: &str = "GovernanceActionType";
    pub const GOVERNANCE_ENGINE: &str = "GovernanceEngine";
    pub const PERSON: &str = "Person";
    pub const PERSON_ROLE: &str = "PersonRole";
    pub const SCHEMA_TYPE: &str = "SchemaType";

    // Relationship types
    pub const CATEGORY_ANCHOR: &str = "CategoryAnchor";
    pub const CATEGORY_HIERARCHY_LINK: &str = "CategoryHierarchyLink";
    pub const TERM_ANCHOR: &str = "TermAnchor";
    pub const TERM_CATEGORIZATION: &str = "TermCategorization";
    pub const COLLECTION_MEMBERSHIP: &str = "CollectionMembership";
    pub const REPORTED_ANNOTATION: &str = "ReportedAnnotation";
    pub const ANNOTATION_EXTENSION: &str = "AnnotationExtension";
    pub const GOVERNANCE_ACTION_PROCESS_FLOW: &str = "GovernanceActionProcessFlow";
    pub const NEXT_GOVERNANCE_ACTION_PROCESS_STEP: &str = "NextGovernanceActionProcessStep";
    pub const GOVERNANCE_ACTION_EXECUTOR: &str = "GovernanceActionExecutor";
    pub const PERSON_ROLE_APPOINTMENT: &str = "PersonRoleAppointment";
    pub const SCHEMA_TYPE_OPTION: &str = "SchemaTypeOption";

    // Classification types
    pub const ANCHORS: &str = "Anchors";
    pub const ZONE_MEMBERSHIP: &str = "ZoneMembership";
    pub const TAXONOMY: &str = "Taxonomy";
    pub const CANONICAL_VOCABULARY: &str = "CanonicalVocabulary";
    pub const FOLDER: &str = "Folder";
    pub const EDITING_GLOSSARY: &str = "EditingGlossary";
    pub const MEMENTO: &str = "Memento";

    // Property names
    pub const QUALIFIED_NAME: &str = "qualified_name";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const DESCRIPTION: &str = "description";
    pub const ADDITIONAL_PROPERTIES: &str = "additional_properties";
    pub const ANCHOR_GUID: &str = "anchor_guid";
    pub const ZONE_MEMBERSHIP_PROP: &str = "zone_membership";
    pub const ORGANIZING_PRINCIPLE: &str = "organizing_principle";
    pub const SCOPE: &str = "scope";
    pub const ORDERING: &str = "ordering";
    pub const ORDER_PROPERTY_NAME: &str = "order_property_name";
    pub const MEMBERSHIP_RATIONALE: &str = "membership_rationale";
    pub const GUARD: &str = "guard";
    pub const MANDATORY_GUARD: &str = "mandatory_guard";
    pub const REQUEST_TYPE: &str = "request_type";
    pub const REQUEST_PARAMETERS: &str = "request_parameters";
    pub const EXPECTED_TIME_ALLOCATION_PERCENT: &str = "expected_time_allocation_percent";
    pub const ANNOTATION_STATUS: &str = "annotation_status";
    pub const DOMAIN_IDENTIFIER: &str = "domain_identifier";
    pub const HEAD_COUNT: &str = "head_count";
    pub const LANGUAGE: &str = "language";
    pub const USAGE: &str = "usage";
    pub const TITLE: &str = "title";
    pub const VERSION_NUMBER: &str = "version_number";
    pub const AUTHOR: &str = "author";
    pub const ENCODING_STANDARD: &str = "encoding_standard";
    pub const NAMESPACE: &str = "namespace";
    pub const FORMULA: &str = "formula";
    pub const IS_DEPRECATED: &str = "is_deprecated";
    pub const ANNOTATION_TYPE: &str = "annotation_type";
    pub const SUMMARY: &str = "summary";
    pub const CONFIDENCE_LEVEL: &str = "confidence_level";
    pub const EXPRESSION: &str = "expression";
    pub const EXPLANATION: &str = "explanation";
    pub const ANALYSIS_STEP: &str = "analysis_step";
    pub const JSON_PROPERTIES: &str = "json_properties";
    pub const IGNORE_MULTIPLE_TRIGGERS: &str = "ignore_multiple_triggers";
    pub const WAIT_TIME: &str = "wait_time";
}

// ── Descriptors ───────────────────────────────────────────────

/// Descriptor of an entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTypeDef {
    pub type_name: String,
    pub type_id: Uuid,
    #[serde(default)]
    pub super_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_classifications: Vec<String>,
}

/// Descriptor of a relationship type and its permitted end types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipTypeDef {
    pub type_name: String,
    pub type_id: Uuid,
    pub end_one_type: String,
    pub end_two_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_names: Vec<String>,
}

/// Descriptor of a classification type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationTypeDef {
    pub type_name: String,
    pub type_id: Uuid,
    /// Entity types this classification may be attached to. Empty means
    /// any entity type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_entity_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property_names: Vec<String>,
}

/// YAML overlay document: extra descriptors merged over the builtin set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypeOverlay {
    #[serde(default)]
    pub entity_types: Vec<EntityTypeDef>,
    #[serde(default)]
    pub relationship_types: Vec<RelationshipTypeDef>,
    #[serde(default)]
    pub classification_types: Vec<ClassificationTypeDef>,
}

// ── Builtin seed ──────────────────────────────────────────────

/// Entity types every deployment starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumIter, strum::IntoStaticStr)]
pub enum BuiltinEntityType {
    Referenceable,
    Glossary,
    GlossaryCategory,
    GlossaryTerm,
    Collection,
    Annotation,
    OpenDiscoveryAnalysisReport,
    GovernanceActionProcess,
    GovernanceActionProcessStep,
    GovernanceActionType,
    GovernanceEngine,
    Person,
    PersonRole,
    SchemaType,
}

impl BuiltinEntityType {
    fn super_type(&self) -> Option<&'static str> {
        match self {
            Self::Referenceable => None,
            // Annotations are not Referenceables in the open metadata model
            Self::Annotation => None,
            _ => Some(name::REFERENCEABLE),
        }
    }

    fn valid_classifications(&self) -> Vec<String> {
        let common = [name::ANCHORS, name::ZONE_MEMBERSHIP, name::MEMENTO];
        let extra: &[&str] = match self {
            Self::Glossary => &[
                name::TAXONOMY,
                name::CANONICAL_VOCABULARY,
                name::EDITING_GLOSSARY,
            ],
            Self::Collection => &[name::FOLDER],
            _ => &[],
        };
        common.iter().chain(extra).map(|s| s.to_string()).collect()
    }
}

// ── Registry ──────────────────────────────────────────────────

/// Lookup table for all registered type descriptors.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    entities: BTreeMap<String, EntityTypeDef>,
    relationships: BTreeMap<String, RelationshipTypeDef>,
    classifications: BTreeMap<String, ClassificationTypeDef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with every type the typed handlers use.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        for entity_type in BuiltinEntityType::iter() {
            let type_name: &'static str = entity_type.into();
            registry.register_entity(EntityTypeDef {
                type_name: type_name.to_string(),
                type_id: type_id_for(type_name),
                super_type: entity_type.super_type().map(str::to_string),
                property_names: vec![
                    name::QUALIFIED_NAME.into(),
                    name::DISPLAY_NAME.into(),
                    name::DESCRIPTION.into(),
                    name::ADDITIONAL_PROPERTIES.into(),
                ],
                valid_classifications: entity_type.valid_classifications(),
            });
        }

        let relationship_defs: &[(&str, &str, &str, &[&str])] = &[
            (name::CATEGORY_ANCHOR, name::GLOSSARY, name::GLOSSARY_CATEGORY, &[]),
            (
                name::CATEGORY_HIERARCHY_LINK,
                name::GLOSSARY_CATEGORY,
                name::GLOSSARY_CATEGORY,
                &[],
            ),
            (name::TERM_ANCHOR, name::GLOSSARY, name::GLOSSARY_TERM, &[]),
            (
                name::TERM_CATEGORIZATION,
                name::GLOSSARY_CATEGORY,
                name::GLOSSARY_TERM,
                &[name::DESCRIPTION],
            ),
            (
                name::COLLECTION_MEMBERSHIP,
                name::COLLECTION,
                name::REFERENCEABLE,
                &[name::MEMBERSHIP_RATIONALE],
            ),
            (
                name::REPORTED_ANNOTATION,
                name::DISCOVERY_REPORT,
                name::ANNOTATION,
                &[],
            ),
            (
                name::ANNOTATION_EXTENSION,
                name::ANNOTATION,
                name::ANNOTATION,
                &[],
            ),
            (
                name::GOVERNANCE_ACTION_PROCESS_FLOW,
                name::GOVERNANCE_ACTION_PROCESS,
                name::GOVERNANCE_ACTION_PROCESS_STEP,
                &[name::GUARD],
            ),
            (
                name::NEXT_GOVERNANCE_ACTION_PROCESS_STEP,
                name::GOVERNANCE_ACTION_PROCESS_STEP,
                name::GOVERNANCE_ACTION_PROCESS_STEP,
                &[name::GUARD, name::MANDATORY_GUARD],
            ),
            (
                name::GOVERNANCE_ACTION_EXECUTOR,
                name::REFERENCEABLE,
                name::GOVERNANCE_ENGINE,
                &[name::REQUEST_TYPE, name::REQUEST_PARAMETERS],
            ),
            (
                name::PERSON_ROLE_APPOINTMENT,
                name::PERSON,
                name::PERSON_ROLE,
                &[name::EXPECTED_TIME_ALLOCATION_PERCENT],
            ),
            (
                name::SCHEMA_TYPE_OPTION,
                name::SCHEMA_TYPE,
                name::SCHEMA_TYPE,
                &[],
            ),
        ];
        for (type_name, end_one, end_two, props) in relationship_defs {
            registry.register_relationship(RelationshipTypeDef {
                type_name: type_name.to_string(),
                type_id: type_id_for(type_name),
                end_one_type: end_one.to_string(),
                end_two_type: end_two.to_string(),
                property_names: props.iter().map(|s| s.to_string()).collect(),
            });
        }

        let classification_defs: &[(&str, &[&str], &[&str])] = &[
            (name::ANCHORS, &[], &[name::ANCHOR_GUID]),
            (name::ZONE_MEMBERSHIP, &[], &[name::ZONE_MEMBERSHIP_PROP]),
            (name::TAXONOMY, &[name::GLOSSARY], &[name::ORGANIZING_PRINCIPLE]),
            (name::CANONICAL_VOCABULARY, &[name::GLOSSARY], &[name::SCOPE]),
            (
                name::FOLDER,
                &[name::COLLECTION],
                &[name::ORDERING, name::ORDER_PROPERTY_NAME],
            ),
            (name::EDITING_GLOSSARY, &[name::GLOSSARY], &[name::DESCRIPTION]),
            (name::MEMENTO, &[], &[]),
        ];
        for (type_name, valid_entities, props) in classification_defs {
            registry.register_classification(ClassificationTypeDef {
                type_name: type_name.to_string(),
                type_id: type_id_for(type_name),
                valid_entity_types: valid_entities.iter().map(|s| s.to_string()).collect(),
                property_names: props.iter().map(|s| s.to_string()).collect(),
            });
        }

        registry
    }

    /// Merge descriptors parsed from a YAML overlay document.
    /// Later registrations replace earlier ones with the same type name.
    pub fn from_yaml(yaml: &str) -> Result<Self, OmrError> {
        let mut registry = Self::builtin();
        registry.apply_yaml(yaml)?;
        Ok(registry)
    }

    pub fn apply_yaml(&mut self, yaml: &str) -> Result<(), OmrError> {
        let overlay: TypeOverlay = serde_yaml::from_str(yaml)
            .map_err(|e| OmrError::invalid_parameter("type_overlay", e.to_string()))?;
        for def in overlay.entity_types {
            self.register_entity(def);
        }
        for def in overlay.relationship_types {
            self.register_relationship(def);
        }
        for def in overlay.classification_types {
            self.register_classification(def);
        }
        Ok(())
    }

    pub fn register_entity(&mut self, def: EntityTypeDef) {
        self.entities.insert(def.type_name.clone(), def);
    }

    pub fn register_relationship(&mut self, def: RelationshipTypeDef) {
        self.relationships.insert(def.type_name.clone(), def);
    }

    pub fn register_classification(&mut self, def: ClassificationTypeDef) {
        self.classifications.insert(def.type_name.clone(), def);
    }

    pub fn entity_def(&self, type_name: &str) -> Option<&EntityTypeDef> {
        self.entities.get(type_name)
    }

    pub fn relationship_def(&self, type_name: &str) -> Option<&RelationshipTypeDef> {
        self.relationships.get(type_name)
    }

    pub fn classification_def(&self, type_name: &str) -> Option<&ClassificationTypeDef> {
        self.classifications.get(type_name)
    }

    /// Whether `type_name` is `expected` or a (transitive) subtype of it.
    pub fn is_subtype_of(&self, type_name: &str, expected: &str) -> bool {
        let mut current = Some(type_name.to_string());
        while let Some(t) = current {
            if t == expected {
                return true;
            }
            current = self.entities.get(&t).and_then(|d| d.super_type.clone());
        }
        false
    }

    pub fn validate_entity_type(&self, type_name: &str) -> Result<&EntityTypeDef, OmrError> {
        self.entity_def(type_name).ok_or_else(|| {
            OmrError::TypeViolation(format!("unknown entity type `{type_name}`"))
        })
    }

    pub fn validate_relationship_type(
        &self,
        type_name: &str,
    ) -> Result<&RelationshipTypeDef, OmrError> {
        self.relationship_def(type_name).ok_or_else(|| {
            OmrError::TypeViolation(format!("unknown relationship type `{type_name}`"))
        })
    }

    /// Check that the two end entities satisfy the relationship descriptor.
    pub fn validate_relationship_ends(
        &self,
        type_name: &str,
        end_one_type: &str,
        end_two_type: &str,
    ) -> Result<(), OmrError> {
        let def = self.validate_relationship_type(type_name)?;
        if !self.is_subtype_of(end_one_type, &def.end_one_type) {
            return Err(OmrError::TypeViolation(format!(
                "`{type_name}` end one must be a {} (got {end_one_type})",
                def.end_one_type
            )));
        }
        if !self.is_subtype_of(end_two_type, &def.end_two_type) {
            return Err(OmrError::TypeViolation(format!(
                "`{type_name}` end two must be a {} (got {end_two_type})",
                def.end_two_type
            )));
        }
        Ok(())
    }

    /// Check that a classification may be attached to an entity type.
    pub fn validate_classification(
        &self,
        classification_name: &str,
        entity_type: &str,
    ) -> Result<&ClassificationTypeDef, OmrError> {
        let def = self.classification_def(classification_name).ok_or_else(|| {
            OmrError::TypeViolation(format!(
                "unknown classification type `{classification_name}`"
            ))
        })?;
        if !def.valid_entity_types.is_empty()
            && !def
                .valid_entity_types
                .iter()
                .any(|t| self.is_subtype_of(entity_type, t))
        {
            return Err(OmrError::TypeViolation(format!(
                "classification `{classification_name}` is not valid for `{entity_type}`"
            )));
        }
        Ok(def)
    }
}

/// Deterministic type id derived from the type name, so every registry
/// instance agrees on ids without a central allocation step.
fn type_id_for(type_name: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, type_name.as_bytes())
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_all_handler_types() {
        let r = TypeRegistry::builtin();
        for t in [
            name::GLOSSARY,
            name::GLOSSARY_CATEGORY,
            name::COLLECTION,
            name::ANNOTATION,
            name::GOVERNANCE_ACTION_PROCESS_STEP,
            name::GOVERNANCE_ACTION_TYPE,
            name::PERSON_ROLE,
            name::SCHEMA_TYPE,
        ] {
            assert!(r.entity_def(t).is_some(), "missing entity def {t}");
        }
        assert!(r.relationship_def(name::CATEGORY_ANCHOR).is_some());
        assert!(r.classification_def(name::ANCHORS).is_some());
    }

    #[test]
    fn subtype_of_referenceable() {
        let r = TypeRegistry::builtin();
        assert!(r.is_subtype_of(name::GLOSSARY, name::REFERENCEABLE));
        assert!(r.is_subtype_of(name::GLOSSARY, name::GLOSSARY));
        assert!(!r.is_subtype_of(name::ANNOTATION, name::REFERENCEABLE));
        assert!(!r.is_subtype_of("NoSuchType", name::REFERENCEABLE));
    }

    #[test]
    fn relationship_end_validation() {
        let r = TypeRegistry::builtin();
        assert!(r
            .validate_relationship_ends(
                name::CATEGORY_ANCHOR,
                name::GLOSSARY,
                name::GLOSSARY_CATEGORY
            )
            .is_ok());
        // CollectionMembership end two accepts any Referenceable subtype
        assert!(r
            .validate_relationship_ends(
                name::COLLECTION_MEMBERSHIP,
                name::COLLECTION,
                name::GLOSSARY_TERM
            )
            .is_ok());
        let err = r
            .validate_relationship_ends(name::CATEGORY_ANCHOR, name::COLLECTION, name::GLOSSARY)
            .unwrap_err();
        assert_eq!(err.http_status(), 422);
    }

    #[test]
    fn classification_scoping() {
        let r = TypeRegistry::builtin();
        assert!(r.validate_classification(name::TAXONOMY, name::GLOSSARY).is_ok());
        assert!(r
            .validate_classification(name::TAXONOMY, name::COLLECTION)
            .is_err());
        // Anchors attaches anywhere
        assert!(r.validate_classification(name::ANCHORS, name::ANNOTATION).is_ok());
    }

    #[test]
    fn yaml_overlay_replaces_and_adds() {
        let yaml = r#"
entity_types:
  - type_name: DataAsset
    type_id: 6f2c1a9e-18e1-4f11-9a36-2f5b8f1d1a01
    super_type: Referenceable
relationship_types: []
classification_types:
  - type_name: Confidentiality
    type_id: 6f2c1a9e-18e1-4f11-9a36-2f5b8f1d1a02
    property_names: [level]
"#;
        let r = TypeRegistry::from_yaml(yaml).unwrap();
        assert!(r.entity_def("DataAsset").is_some());
        assert!(r.is_subtype_of("DataAsset", name::REFERENCEABLE));
        assert!(r.classification_def("Confidentiality").is_some());
        // builtin types still present
        assert!(r.entity_def(name::GLOSSARY).is_some());
    }

    #[test]
    fn yaml_overlay_rejects_garbage() {
        let err = TypeRegistry::from_yaml("entity_types: 12").unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn type_ids_are_stable() {
        assert_eq!(type_id_for(name::GLOSSARY), type_id_for(name::GLOSSARY));
        assert_ne!(type_id_for(name::GLOSSARY), type_id_for(name::COLLECTION));
    }
}

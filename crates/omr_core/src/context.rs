//! Per-request call context and the zone visibility policy.
//!
//! Identity is always explicit: every handler operation takes a
//! `CallContext` carrying the calling user id. There is no implicit or
//! thread-local identity anywhere in the crate.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::OmrError;
use crate::instance::Entity;
use crate::types::name;
use crate::validate;

// ── CallContext ───────────────────────────────────────────────

/// Options carried by every handler call.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub user_id: String,
    /// Point-in-time filter. None means "now, ignore effectivity".
    pub effective_time: Option<DateTime<Utc>>,
    /// Lineage queries may see elements outside their effectivity window.
    pub for_lineage: bool,
    /// Duplicate-processing passes skip unique qualified-name enforcement.
    pub for_duplicate_processing: bool,
}

impl CallContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            effective_time: None,
            for_lineage: false,
            for_duplicate_processing: false,
        }
    }

    pub fn at_time(mut self, effective_time: DateTime<Utc>) -> Self {
        self.effective_time = Some(effective_time);
        self
    }

    pub fn for_lineage(mut self) -> Self {
        self.for_lineage = true;
        self
    }

    pub fn for_duplicate_processing(mut self) -> Self {
        self.for_duplicate_processing = true;
        self
    }

    pub fn validate(&self) -> Result<(), OmrError> {
        validate::require_user_id(&self.user_id)
    }
}

// ── ZonePolicy ────────────────────────────────────────────────

/// Governance-zone visibility configuration for a service instance.
///
/// An entity carrying a `ZoneMembership` classification is visible only
/// when its zones intersect `supported_zones`. Entities without the
/// classification are visible to everyone. An empty `supported_zones`
/// list disables filtering entirely.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZonePolicy {
    #[serde(default)]
    pub supported_zones: Vec<String>,
    /// Zones stamped onto newly created top-level elements.
    #[serde(default)]
    pub default_zones: Vec<String>,
}

impl ZonePolicy {
    /// A policy that sees everything and stamps nothing.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_visible(&self, entity: &Entity) -> bool {
        if self.supported_zones.is_empty() {
            return true;
        }
        let Some(classification) = entity.classification(name::ZONE_MEMBERSHIP) else {
            return true;
        };
        let zones = classification
            .properties
            .get_string_array(name::ZONE_MEMBERSHIP_PROP);
        zones.iter().any(|z| self.supported_zones.contains(z))
    }
}

/// Service configuration loaded from YAML: the zone policy plus any type
/// overlay to merge over the builtin registry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub zones: ZonePolicy,
    #[serde(default)]
    pub type_overlay: Option<crate::types::TypeOverlay>,
}

impl RegistryConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, OmrError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| OmrError::invalid_parameter("registry_config", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{
        Classification, ElementOrigin, ElementStatus, EntityId, InstanceProperties, PropertyValue,
    };

    fn entity_with_zones(zones: &[&str]) -> Entity {
        let mut classifications = Vec::new();
        if !zones.is_empty() {
            let mut props = InstanceProperties::new();
            props.set(
                name::ZONE_MEMBERSHIP_PROP,
                PropertyValue::Array(
                    zones
                        .iter()
                        .map(|z| PropertyValue::String(z.to_string()))
                        .collect(),
                ),
            );
            classifications.push(Classification::new(name::ZONE_MEMBERSHIP, props));
        }
        Entity {
            guid: EntityId::new(),
            type_name: name::GLOSSARY.into(),
            status: ElementStatus::Active,
            origin: ElementOrigin::Local,
            properties: InstanceProperties::new(),
            classifications,
            created_by: "test".into(),
            updated_by: "test".into(),
            create_time: Utc::now(),
            update_time: Utc::now(),
            version: 1,
        }
    }

    #[test]
    fn open_policy_sees_everything() {
        let policy = ZonePolicy::open();
        assert!(policy.is_visible(&entity_with_zones(&["quarantine"])));
        assert!(policy.is_visible(&entity_with_zones(&[])));
    }

    #[test]
    fn zoned_entity_needs_intersection() {
        let policy = ZonePolicy {
            supported_zones: vec!["curated".into(), "production".into()],
            default_zones: vec![],
        };
        assert!(policy.is_visible(&entity_with_zones(&["curated"])));
        assert!(!policy.is_visible(&entity_with_zones(&["quarantine"])));
        // unclassified elements are visible under any policy
        assert!(policy.is_visible(&entity_with_zones(&[])));
    }

    #[test]
    fn call_context_builder() {
        let t = Utc::now();
        let ctx = CallContext::new("kim").at_time(t).for_lineage();
        assert_eq!(ctx.user_id, "kim");
        assert_eq!(ctx.effective_time, Some(t));
        assert!(ctx.for_lineage);
        assert!(!ctx.for_duplicate_processing);
        assert!(ctx.validate().is_ok());
        assert!(CallContext::new("").validate().is_err());
    }

    #[test]
    fn registry_config_from_yaml() {
        let yaml = r#"
zones:
  supported_zones: [curated]
  default_zones: [quarantine]
type_overlay:
  entity_types:
    - type_name: DataAsset
      type_id: 6f2c1a9e-18e1-4f11-9a36-2f5b8f1d1a01
"#;
        let cfg = RegistryConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.zones.supported_zones, vec!["curated".to_string()]);
        assert_eq!(
            cfg.type_overlay.unwrap().entity_types[0].type_name,
            "DataAsset"
        );
        assert!(RegistryConfig::from_yaml("zones: 7").is_err());
    }
}

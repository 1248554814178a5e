//! Repository instance model: pure value types for entities, relationships
//! and classifications. No storage dependencies; adapters map these to and
//! from their own row types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Id newtypes ───────────────────────────────────────────────

/// Unique identifier of an entity instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a relationship instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipId(pub Uuid);

impl RelationshipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RelationshipId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Property values ───────────────────────────────────────────

/// A single typed property value inside an instance property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    /// Enumerated value, stored by symbolic name.
    Enum { symbolic_name: String },
    Array(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&str> {
        match self {
            Self::Enum { symbolic_name } => Some(symbolic_name),
            _ => None,
        }
    }
}

/// Ordered property bag attached to entities, relationships and
/// classifications, together with the instance's effectivity window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceProperties {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<DateTime<Utc>>,
}

impl InstanceProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropertyValue::as_string)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(PropertyValue::as_i64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(PropertyValue::as_bool)
    }

    pub fn get_enum(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(PropertyValue::as_enum)
    }

    pub fn get_string_array(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            Some(PropertyValue::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_string().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn get_string_map(&self, name: &str) -> BTreeMap<String, String> {
        match self.get(name) {
            Some(PropertyValue::Map(map)) => map
                .iter()
                .filter_map(|(k, v)| v.as_string().map(|s| (k.clone(), s.to_string())))
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.properties.insert(name.into(), value);
    }

    /// Overlay `other` onto this bag. Properties present in `other` win;
    /// effectivity dates are taken from `other` when set there.
    pub fn merge(&mut self, other: InstanceProperties) {
        self.properties.extend(other.properties);
        if other.effective_from.is_some() {
            self.effective_from = other.effective_from;
        }
        if other.effective_to.is_some() {
            self.effective_to = other.effective_to;
        }
    }

    /// Whether this instance is effective at `time`. `None` disables the
    /// point-in-time filter and always matches.
    pub fn effective_at(&self, time: Option<DateTime<Utc>>) -> bool {
        let Some(t) = time else { return true };
        if let Some(from) = self.effective_from {
            if t < from {
                return false;
            }
        }
        if let Some(to) = self.effective_to {
            if t >= to {
                return false;
            }
        }
        true
    }
}

// ── Status and origin ─────────────────────────────────────────

/// Lifecycle status of an entity or relationship instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementStatus {
    Draft,
    Prepared,
    Proposed,
    Approved,
    Active,
    Deprecated,
    Deleted,
}

impl ElementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Prepared => "prepared",
            Self::Proposed => "proposed",
            Self::Approved => "approved",
            Self::Active => "active",
            Self::Deprecated => "deprecated",
            Self::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "prepared" => Some(Self::Prepared),
            "proposed" => Some(Self::Proposed),
            "approved" => Some(Self::Approved),
            "active" => Some(Self::Active),
            "deprecated" => Some(Self::Deprecated),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for ElementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provenance of an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementOrigin {
    #[default]
    Local,
    ContentPack,
    External,
}

impl ElementOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::ContentPack => "content_pack",
            Self::External => "external",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Self::Local),
            "content_pack" => Some(Self::ContentPack),
            "external" => Some(Self::External),
            _ => None,
        }
    }
}

impl std::fmt::Display for ElementOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Classification ────────────────────────────────────────────

/// A tag-with-properties attached to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub name: String,
    #[serde(default)]
    pub properties: InstanceProperties,
    #[serde(default)]
    pub origin: ElementOrigin,
}

impl Classification {
    pub fn new(name: impl Into<String>, properties: InstanceProperties) -> Self {
        Self {
            name: name.into(),
            properties,
            origin: ElementOrigin::Local,
        }
    }
}

// ── Entity ────────────────────────────────────────────────────

/// A node in the metadata repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub guid: EntityId,
    pub type_name: String,
    pub status: ElementStatus,
    pub origin: ElementOrigin,
    pub properties: InstanceProperties,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classifications: Vec<Classification>,
    pub created_by: String,
    pub updated_by: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    /// Monotonic per-instance version, bumped on every mutation.
    pub version: i64,
}

impl Entity {
    pub fn classification(&self, name: &str) -> Option<&Classification> {
        self.classifications.iter().find(|c| c.name == name)
    }

    pub fn has_classification(&self, name: &str) -> bool {
        self.classification(name).is_some()
    }

    /// The `qualified_name` property, when present.
    pub fn qualified_name(&self) -> Option<&str> {
        self.properties.get_string("qualified_name")
    }

    pub fn is_deleted(&self) -> bool {
        self.status == ElementStatus::Deleted
    }
}

// ── Relationship ──────────────────────────────────────────────

/// Which end(s) of a relationship an entity occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AttachmentEnd {
    One,
    Two,
    Either,
}

/// An edge between two entities in the metadata repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub guid: RelationshipId,
    pub type_name: String,
    pub end_one: EntityId,
    pub end_two: EntityId,
    pub status: ElementStatus,
    pub properties: InstanceProperties,
    pub created_by: String,
    pub updated_by: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub version: i64,
}

impl Relationship {
    /// The entity at the opposite end from `guid`, or None when the
    /// relationship does not touch `guid` at all.
    pub fn other_end(&self, guid: EntityId) -> Option<EntityId> {
        if self.end_one == guid {
            Some(self.end_two)
        } else if self.end_two == guid {
            Some(self.end_one)
        } else {
            None
        }
    }

    pub fn touches(&self, guid: EntityId, end: AttachmentEnd) -> bool {
        match end {
            AttachmentEnd::One => self.end_one == guid,
            AttachmentEnd::Two => self.end_two == guid,
            AttachmentEnd::Either => self.end_one == guid || self.end_two == guid,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.status == ElementStatus::Deleted
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn props_with(name: &str, value: PropertyValue) -> InstanceProperties {
        let mut p = InstanceProperties::new();
        p.set(name, value);
        p
    }

    #[test]
    fn property_accessors() {
        let mut p = InstanceProperties::new();
        p.set("display_name", PropertyValue::String("Customer".into()));
        p.set("head_count", PropertyValue::Int(3));
        p.set("is_deprecated", PropertyValue::Boolean(false));
        p.set(
            "status",
            PropertyValue::Enum {
                symbolic_name: "approved".into(),
            },
        );
        assert_eq!(p.get_string("display_name"), Some("Customer"));
        assert_eq!(p.get_i64("head_count"), Some(3));
        assert_eq!(p.get_bool("is_deprecated"), Some(false));
        assert_eq!(p.get_enum("status"), Some("approved"));
        assert_eq!(p.get_string("missing"), None);
    }

    #[test]
    fn string_array_and_map_accessors() {
        let mut p = InstanceProperties::new();
        p.set(
            "zone_membership",
            PropertyValue::Array(vec![
                PropertyValue::String("quarantine".into()),
                PropertyValue::String("curated".into()),
            ]),
        );
        let mut m = BTreeMap::new();
        m.insert("owner".to_string(), PropertyValue::String("kim".into()));
        p.set("additional_properties", PropertyValue::Map(m));

        assert_eq!(
            p.get_string_array("zone_membership"),
            vec!["quarantine".to_string(), "curated".to_string()]
        );
        let map = p.get_string_map("additional_properties");
        assert_eq!(map.get("owner").map(String::as_str), Some("kim"));
    }

    #[test]
    fn merge_overlays_and_keeps_effectivity() {
        let mut base = props_with("a", PropertyValue::Int(1));
        base.set("b", PropertyValue::Int(2));
        base.effective_from = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let mut update = props_with("b", PropertyValue::Int(20));
        update.effective_to = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

        base.merge(update);
        assert_eq!(base.get_i64("a"), Some(1));
        assert_eq!(base.get_i64("b"), Some(20));
        assert!(base.effective_from.is_some());
        assert!(base.effective_to.is_some());
    }

    #[test]
    fn effective_at_window() {
        let mut p = InstanceProperties::new();
        p.effective_from = Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        p.effective_to = Some(Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap());

        let before = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let inside = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
        let at_end = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();

        assert!(!p.effective_at(Some(before)));
        assert!(p.effective_at(Some(inside)));
        // effective_to is exclusive
        assert!(!p.effective_at(Some(at_end)));
        // disabled filter always matches
        assert!(p.effective_at(None));
    }

    #[test]
    fn status_round_trip() {
        for s in [
            ElementStatus::Draft,
            ElementStatus::Prepared,
            ElementStatus::Proposed,
            ElementStatus::Approved,
            ElementStatus::Active,
            ElementStatus::Deprecated,
            ElementStatus::Deleted,
        ] {
            assert_eq!(ElementStatus::from_str(s.as_str()), Some(s));
        }
        assert_eq!(ElementStatus::from_str("archived"), None);
    }

    #[test]
    fn relationship_ends() {
        let a = EntityId::new();
        let b = EntityId::new();
        let c = EntityId::new();
        let rel = Relationship {
            guid: RelationshipId::new(),
            type_name: "CategoryAnchor".into(),
            end_one: a,
            end_two: b,
            status: ElementStatus::Active,
            properties: InstanceProperties::new(),
            created_by: "test".into(),
            updated_by: "test".into(),
            create_time: Utc::now(),
            update_time: Utc::now(),
            version: 1,
        };
        assert_eq!(rel.other_end(a), Some(b));
        assert_eq!(rel.other_end(b), Some(a));
        assert_eq!(rel.other_end(c), None);
        assert!(rel.touches(a, AttachmentEnd::One));
        assert!(!rel.touches(a, AttachmentEnd::Two));
        assert!(rel.touches(b, AttachmentEnd::Either));
    }

    #[test]
    fn property_value_serde_tagging() {
        let v = PropertyValue::Enum {
            symbolic_name: "new".into(),
        };
        let json = serde_json::to_value(&v).unwrap();
        assert!(json["enum"]["symbolic_name"].is_string());

        let s = PropertyValue::String("x".into());
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["string"], "x");
    }
}

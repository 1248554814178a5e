//! Property-bag construction. `PropertyBuilder` accumulates typed fields
//! and serializes them into `InstanceProperties` for repository writes;
//! the per-bean builders in the handler modules compose it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::OmrError;
use crate::instance::{InstanceProperties, PropertyValue};
use crate::validate;

/// Accumulates typed fields into an instance property bag.
#[derive(Debug, Default)]
pub struct PropertyBuilder {
    properties: InstanceProperties,
}

impl PropertyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Required string property. Empty values are rejected with the
    /// property name as the offending parameter.
    pub fn set_string(
        mut self,
        property: &str,
        value: impl Into<String>,
    ) -> Result<Self, OmrError> {
        let value = value.into();
        validate::require_name(&value, property)?;
        self.properties.set(property, PropertyValue::String(value));
        Ok(self)
    }

    /// Optional string property; None and empty strings are skipped.
    pub fn set_optional_string(mut self, property: &str, value: Option<String>) -> Self {
        if let Some(v) = value {
            if !v.trim().is_empty() {
                self.properties.set(property, PropertyValue::String(v));
            }
        }
        self
    }

    pub fn set_i64(mut self, property: &str, value: i64) -> Self {
        self.properties.set(property, PropertyValue::Int(value));
        self
    }

    pub fn set_optional_i64(mut self, property: &str, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.properties.set(property, PropertyValue::Int(v));
        }
        self
    }

    pub fn set_bool(mut self, property: &str, value: bool) -> Self {
        self.properties.set(property, PropertyValue::Boolean(value));
        self
    }

    pub fn set_date(mut self, property: &str, value: DateTime<Utc>) -> Self {
        self.properties.set(property, PropertyValue::Date(value));
        self
    }

    pub fn set_enum(mut self, property: &str, symbolic_name: impl Into<String>) -> Self {
        self.properties.set(
            property,
            PropertyValue::Enum {
                symbolic_name: symbolic_name.into(),
            },
        );
        self
    }

    pub fn set_string_array(mut self, property: &str, values: Vec<String>) -> Self {
        if !values.is_empty() {
            self.properties.set(
                property,
                PropertyValue::Array(values.into_iter().map(PropertyValue::String).collect()),
            );
        }
        self
    }

    pub fn set_string_map(mut self, property: &str, map: BTreeMap<String, String>) -> Self {
        if !map.is_empty() {
            self.properties.set(
                property,
                PropertyValue::Map(
                    map.into_iter()
                        .map(|(k, v)| (k, PropertyValue::String(v)))
                        .collect(),
                ),
            );
        }
        self
    }

    /// Overlay caller-supplied extended properties. Typed fields win over
    /// extended ones with the same name, so extended bags cannot shadow
    /// the modelled schema.
    pub fn merge_extended(mut self, extended: BTreeMap<String, PropertyValue>) -> Self {
        for (k, v) in extended {
            self.properties.properties.entry(k).or_insert(v);
        }
        self
    }

    pub fn effectivity(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Self, OmrError> {
        validate::validate_effective_dates(from, to)?;
        self.properties.effective_from = from;
        self.properties.effective_to = to;
        Ok(self)
    }

    pub fn build(self) -> InstanceProperties {
        self.properties
    }
}

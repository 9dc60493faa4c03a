//! Request-level classification
//!
//! A query carries the category and whatever raw values the caller
//! submitted. Every modelled attribute of the category is looked up the same
//! way; input fields in other units are mapped through [`UnitConversion`].

use super::classify;
use crate::models::ClassificationResult;
use crate::registry::ModelRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maps a raw input field onto a modelled attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConversion {
    pub input: String,
    pub attribute: String,
    pub factor: f64,
}

impl UnitConversion {
    pub fn new(input: impl Into<String>, attribute: impl Into<String>, factor: f64) -> Self {
        Self {
            input: input.into(),
            attribute: attribute.into(),
            factor,
        }
    }

    /// Camera resolution entered in megapixels, modelled in pixels
    pub fn megapixels() -> Self {
        Self::new("camera_pixel", "camera_pixel_max", 1_000_000.0)
    }

    /// Conversions applied unless the caller supplies its own
    pub fn defaults() -> Vec<Self> {
        vec![Self::megapixels()]
    }
}

/// Raw values submitted for one product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeQuery {
    pub category: u32,
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

impl AttributeQuery {
    pub fn new(category: u32) -> Self {
        Self {
            category,
            values: BTreeMap::new(),
        }
    }

    /// Record a submitted value. `None` leaves the field absent.
    pub fn set(&mut self, field: &str, value: Option<f64>) -> &mut Self {
        if let Some(value) = value {
            self.values.insert(field.to_string(), value);
        }
        self
    }

    pub fn with(mut self, field: &str, value: f64) -> Self {
        self.values.insert(field.to_string(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }
}

/// Classifies whole queries against a registry
#[derive(Debug, Clone)]
pub struct QueryClassifier<'a> {
    registry: &'a ModelRegistry,
    conversions: Vec<UnitConversion>,
}

impl<'a> QueryClassifier<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self {
            registry,
            conversions: UnitConversion::defaults(),
        }
    }

    pub fn with_conversions(mut self, conversions: Vec<UnitConversion>) -> Self {
        self.conversions = conversions;
        self
    }

    /// Value for `attribute` in model units.
    ///
    /// A field named exactly like the attribute wins over a converted one.
    pub fn resolve(&self, query: &AttributeQuery, attribute: &str) -> Option<f64> {
        if let Some(value) = query.get(attribute) {
            return Some(value);
        }
        self.conversions
            .iter()
            .filter(|c| c.attribute == attribute)
            .find_map(|c| query.get(&c.input).map(|v| v * c.factor))
    }

    /// One result per modelled attribute that has a value, in catalog order
    pub fn classify(&self, query: &AttributeQuery) -> Vec<ClassificationResult> {
        self.registry
            .attributes(query.category)
            .filter_map(|attribute| {
                let value = self.resolve(query, attribute)?;
                classify(query.category, attribute, value, self.registry)
            })
            .collect()
    }
}

/// Classify `query` with the default unit conversions
pub fn classify_query(query: &AttributeQuery, registry: &ModelRegistry) -> Vec<ClassificationResult> {
    QueryClassifier::new(registry).classify(query)
}

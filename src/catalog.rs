//! Attribute catalog
//!
//! Which numeric attributes are modelled for which product category.
//! Built once at startup (built-in default or `[catalog]` in
//! `attrguard.toml`) and never mutated afterwards.

use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Errors building a catalog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("category key '{0}' is not a non-negative integer")]
    InvalidCategory(String),

    #[error("category {0} is declared more than once")]
    DuplicateCategory(u32),

    #[error("category {category} lists attribute '{attribute}' more than once")]
    DuplicateAttribute { category: u32, attribute: String },

    #[error("category {0} contains an empty attribute name")]
    EmptyAttributeName(u32),
}

/// Ordered mapping from category id to its attribute names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeCatalog {
    categories: BTreeMap<u32, Vec<String>>,
}

impl AttributeCatalog {
    /// Build a catalog, validating attribute names per category
    pub fn new<I, A, S>(categories: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (u32, A)>,
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (category, attributes) in categories {
            let mut seen = HashSet::new();
            let mut names = Vec::new();
            for attribute in attributes {
                let attribute: String = attribute.into();
                let attribute = attribute.trim().to_string();
                if attribute.is_empty() {
                    return Err(CatalogError::EmptyAttributeName(category));
                }
                if !seen.insert(attribute.clone()) {
                    return Err(CatalogError::DuplicateAttribute {
                        category,
                        attribute,
                    });
                }
                names.push(attribute);
            }
            if map.insert(category, names).is_some() {
                return Err(CatalogError::DuplicateCategory(category));
            }
        }
        Ok(Self { categories: map })
    }

    /// Build from string-keyed categories, as they appear in TOML tables
    pub fn from_named(named: &BTreeMap<String, Vec<String>>) -> Result<Self, CatalogError> {
        let mut parsed = Vec::with_capacity(named.len());
        for (key, attributes) in named {
            let category = key
                .trim()
                .parse::<u32>()
                .map_err(|_| CatalogError::InvalidCategory(key.clone()))?;
            parsed.push((category, attributes.clone()));
        }
        Self::new(parsed)
    }

    /// Catalog shipped with the binary
    pub fn builtin() -> Self {
        let dimensions = ["weight", "width", "height", "depth"];
        let mut categories: BTreeMap<u32, Vec<String>> = BTreeMap::new();

        // 1: smartphones
        categories.insert(
            1,
            dimensions
                .iter()
                .chain(["storage_size", "screen_size", "camera_pixel_max"].iter())
                .map(|s| s.to_string())
                .collect(),
        );
        // 2: laptops and tablets
        categories.insert(
            2,
            dimensions
                .iter()
                .chain(["storage_size", "screen_size"].iter())
                .map(|s| s.to_string())
                .collect(),
        );
        // 3: furniture
        categories.insert(
            3,
            ["weight", "width", "length", "height"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );

        Self { categories }
    }

    /// Attributes for `category`, in declared order (empty if unknown)
    pub fn attributes(&self, category: u32) -> &[String] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = u32> + '_ {
        self.categories.keys().copied()
    }

    /// Every (category, attribute) pair, categories ascending
    pub fn pairs(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.categories
            .iter()
            .flat_map(|(&c, attrs)| attrs.iter().map(move |a| (c, a.as_str())))
    }

    pub fn pair_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn contains(&self, category: u32, attribute: &str) -> bool {
        self.attributes(category).iter().any(|a| a == attribute)
    }

    pub fn is_empty(&self) -> bool {
        self.pair_count() == 0
    }
}

impl Default for AttributeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Category Taxonomy
//!
//! Activities carry a short ordered list of categories drawn from a configured
//! taxonomy. The taxonomy is an ordered list of groups:
//!
//! - a group with no items is itself a selectable category (a flat taxonomy is
//!   simply a list of such groups)
//! - a group with items is a compound category whose items are selectable,
//!   but the group name is not
//!
//! The taxonomy is injected through configuration and passed to the validator
//! explicitly.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::domain::error::CoordinatorError;

pub const DEFAULT_CATEGORIES_MAX: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
}

impl CategoryGroup {
    pub fn header(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn compound(name: impl Into<String>, items: Vec<String>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }

    pub fn is_compound(&self) -> bool {
        !self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTaxonomy {
    /// Maximum number of categories per activity
    #[serde(default = "default_categories_max")]
    pub categories_max: usize,

    #[serde(default)]
    pub groups: Vec<CategoryGroup>,
}

/// Category configuration as exposed to clients building activity forms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyMetadata {
    pub top_levels: Vec<String>,
    pub compound_categories: Vec<String>,
    pub subcategories: BTreeMap<String, Vec<String>>,
    pub categories_max: usize,
}

fn default_categories_max() -> usize {
    DEFAULT_CATEGORIES_MAX
}

impl Default for CategoryTaxonomy {
    fn default() -> Self {
        Self {
            categories_max: DEFAULT_CATEGORIES_MAX,
            groups: vec![
                CategoryGroup::header("University Activities"),
                CategoryGroup::compound(
                    "Enhance Competencies",
                    vec![
                        "Development of Morality and Ethics".to_string(),
                        "Development of Thinking and Learning Skills".to_string(),
                        "Development of Interpersonal Skills and Relationship Building".to_string(),
                        "Development of Health and Well-being".to_string(),
                    ],
                ),
                CategoryGroup::header("Social Engagement Activities"),
            ],
        }
    }
}

impl CategoryTaxonomy {
    /// Flat taxonomy where every name is directly selectable
    pub fn flat<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories_max: DEFAULT_CATEGORIES_MAX,
            groups: names.into_iter().map(CategoryGroup::header).collect(),
        }
    }

    pub fn with_max(mut self, categories_max: usize) -> Self {
        self.categories_max = categories_max;
        self
    }

    /// Selectable category names in configuration order
    pub fn allowed(&self) -> Vec<&str> {
        let mut allowed = Vec::new();
        for group in &self.groups {
            if group.is_compound() {
                allowed.extend(group.items.iter().map(String::as_str));
            } else {
                allowed.push(group.name.as_str());
            }
        }
        allowed
    }

    /// Validate a category selection, returning the trimmed list.
    pub fn validate(&self, categories: &[String]) -> Result<Vec<String>, CoordinatorError> {
        if categories.is_empty() || categories.len() > self.categories_max {
            return Err(CoordinatorError::validation(format!(
                "categories must have between 1 and {} items",
                self.categories_max
            )));
        }

        let allowed = self.allowed();
        if allowed.is_empty() {
            return Err(CoordinatorError::validation(
                "category configuration missing: no selectable categories configured",
            ));
        }

        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(categories.len());
        let mut invalid = Vec::new();

        for category in categories {
            let category = category.trim();
            if category.is_empty() {
                return Err(CoordinatorError::validation(
                    "each category must be a non-empty string",
                ));
            }
            if !seen.insert(category) {
                return Err(CoordinatorError::validation(format!(
                    "duplicate category: {}",
                    category
                )));
            }
            if !allowed.contains(&category) {
                invalid.push(category.to_string());
            }
            normalized.push(category.to_string());
        }

        if !invalid.is_empty() {
            return Err(CoordinatorError::validation(format!(
                "invalid category(ies): {:?}. Allowed: {:?}",
                invalid, allowed
            )));
        }

        Ok(normalized)
    }

    pub fn metadata(&self) -> TaxonomyMetadata {
        let headers = self
            .groups
            .iter()
            .filter(|g| !g.is_compound())
            .map(|g| g.name.clone());
        let compound: Vec<String> = self
            .groups
            .iter()
            .filter(|g| g.is_compound())
            .map(|g| g.name.clone())
            .collect();

        TaxonomyMetadata {
            top_levels: headers.chain(compound.iter().cloned()).collect(),
            subcategories: self
                .groups
                .iter()
                .filter(|g| g.is_compound())
                .map(|g| (g.name.clone(), g.items.clone()))
                .collect(),
            compound_categories: compound,
            categories_max: self.categories_max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_header_group_is_selectable() {
        let taxonomy = CategoryTaxonomy::default();
        let result = taxonomy.validate(&names(&["University Activities"]));
        assert_eq!(result.unwrap(), names(&["University Activities"]));
    }

    #[test]
    fn test_compound_group_name_not_selectable() {
        let taxonomy = CategoryTaxonomy::default();
        assert!(taxonomy.validate(&names(&["Enhance Competencies"])).is_err());
        assert!(taxonomy
            .validate(&names(&["Development of Health and Well-being"]))
            .is_ok());
    }

    #[test]
    fn test_category_count_bounds() {
        let taxonomy = CategoryTaxonomy::flat(["a", "b", "c", "d", "e"]);
        assert!(taxonomy.validate(&[]).is_err());
        assert!(taxonomy.validate(&names(&["a", "b", "c", "d"])).is_ok());
        assert!(taxonomy.validate(&names(&["a", "b", "c", "d", "e"])).is_err());

        let narrow = taxonomy.with_max(3);
        assert!(narrow.validate(&names(&["a", "b", "c", "d"])).is_err());
    }

    #[test]
    fn test_rejects_duplicates_and_blank_entries() {
        let taxonomy = CategoryTaxonomy::flat(["a", "b"]);
        assert!(taxonomy.validate(&names(&["a", " a "])).is_err());
        assert!(taxonomy.validate(&names(&["  "])).is_err());
    }

    #[test]
    fn test_empty_taxonomy_rejects_everything() {
        let taxonomy = CategoryTaxonomy {
            categories_max: 4,
            groups: vec![],
        };
        let err = taxonomy.validate(&names(&["a"])).unwrap_err();
        assert!(err.to_string().contains("configuration missing"));
    }

    #[test]
    fn test_metadata_lists_headers_before_compound_groups() {
        let metadata = CategoryTaxonomy::default().metadata();
        assert_eq!(
            metadata.top_levels,
            names(&[
                "University Activities",
                "Social Engagement Activities",
                "Enhance Competencies"
            ])
        );
        assert_eq!(metadata.compound_categories, names(&["Enhance Competencies"]));
        assert_eq!(metadata.subcategories["Enhance Competencies"].len(), 4);
        assert_eq!(metadata.categories_max, DEFAULT_CATEGORIES_MAX);
    }

    #[test]
    fn test_taxonomy_from_yaml() {
        let yaml = r#"
categories_max: 2
groups:
  - name: Campus
  - name: Community
    items: [Elderly Care, Beach Cleanup]
"#;
        let taxonomy: CategoryTaxonomy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(taxonomy.allowed(), vec!["Campus", "Elderly Care", "Beach Cleanup"]);
        assert!(taxonomy
            .validate(&names(&["Campus", "Elderly Care", "Beach Cleanup"]))
            .is_err());
    }
}

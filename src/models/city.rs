//! City directory model.

use serde::{Deserialize, Serialize};

use super::Coordinates;

/// A browsable category of a city, optionally behind a purchase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    /// Label filters a place must intersect to belong here.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub needs_purchase: bool,
    /// Payment provider product unlocking this category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

/// A city keyed by its lower-cased name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub name: String,
    pub center: Coordinates,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl City {
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Merge imported labels into the category of that name, creating it when
    /// absent. Purchase settings of an existing category are left untouched.
    pub fn merge_category(&mut self, name: &str, labels: impl IntoIterator<Item = String>) {
        let index = match self.categories.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.categories.push(Category {
                    name: name.to_string(),
                    ..Category::default()
                });
                self.categories.len() - 1
            }
        };
        let category = &mut self.categories[index];
        for label in labels {
            if !category.labels.contains(&label) {
                category.labels.push(label);
            }
        }
        category.labels.sort();
    }
}

//! Fields and the per-season field collection.
//!
//! A field is identified by its name together with its variety, since one
//! meadow can carry several varieties that ripen at different times.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::datadir;
use crate::error::{Error, Result};

fn default_rounds() -> u32 {
    1
}

/// One field (or field section) planted with a single variety.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field name.
    pub field: String,
    /// Apple variety grown on the field.
    pub variety: String,
    /// Number of harvest passes. Zero means the field is skipped this season.
    #[serde(default = "default_rounds", alias = "harvest_round")]
    pub harvest_rounds: u32,
    /// Scheduling position. Unordered fields follow the ordered ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    /// Labor hours per harvest round, overriding the model estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
}

impl Field {
    /// Create a field with one harvest round and no explicit hours.
    #[must_use]
    pub fn new(field: impl Into<String>, variety: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            variety: variety.into(),
            harvest_rounds: 1,
            order: None,
            hours: None,
        }
    }

    /// Set the number of harvest rounds.
    #[must_use]
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.harvest_rounds = rounds;
        self
    }

    /// Set the scheduling position.
    #[must_use]
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    /// Set explicit labor hours per round.
    #[must_use]
    pub fn with_hours(mut self, hours: f64) -> Self {
        self.hours = Some(hours);
        self
    }

    /// Whether this field has the given identity.
    #[must_use]
    pub fn is(&self, field: &str, variety: &str) -> bool {
        self.field == field && self.variety == variety
    }

    /// Check the field definition.
    ///
    /// # Errors
    ///
    /// Returns an error for empty names or invalid hours.
    pub fn validate(&self) -> Result<()> {
        if self.field.trim().is_empty() {
            return Err(Error::invalid_field(&self.field, "name must not be empty"));
        }
        if self.variety.trim().is_empty() {
            return Err(Error::invalid_field(&self.field, "variety must not be empty"));
        }
        if let Some(hours) = self.hours {
            if !hours.is_finite() || hours < 0.0 {
                return Err(Error::InvalidHours {
                    field: self.field.clone(),
                    hours,
                });
            }
        }
        Ok(())
    }
}

/// The fields planned in one season, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldCollection {
    fields: Vec<Field>,
}

impl FieldCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection, enforcing identity uniqueness.
    ///
    /// # Errors
    ///
    /// Returns an error on the first invalid or duplicate field.
    pub fn from_fields(fields: impl IntoIterator<Item = Field>) -> Result<Self> {
        let mut collection = Self::new();
        for field in fields {
            collection.add(field)?;
        }
        Ok(collection)
    }

    /// Add a field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is invalid or its identity already exists.
    pub fn add(&mut self, field: Field) -> Result<()> {
        field.validate()?;
        if self.get(&field.field, &field.variety).is_some() {
            return Err(Error::DuplicateField {
                field: field.field,
                variety: field.variety,
            });
        }
        self.fields.push(field);
        Ok(())
    }

    /// Look up a field by identity.
    #[must_use]
    pub fn get(&self, field: &str, variety: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.is(field, variety))
    }

    /// Replace a field, keeping its position.
    ///
    /// # Errors
    ///
    /// Returns an error if the field does not exist, the replacement is
    /// invalid, or the replacement's identity belongs to another field.
    pub fn update(&mut self, field: &str, variety: &str, new_field: Field) -> Result<()> {
        new_field.validate()?;
        let idx = self.position(field, variety)?;
        let collides = self
            .fields
            .iter()
            .enumerate()
            .any(|(i, f)| i != idx && f.is(&new_field.field, &new_field.variety));
        if collides {
            return Err(Error::DuplicateField {
                field: new_field.field,
                variety: new_field.variety,
            });
        }
        self.fields[idx] = new_field;
        Ok(())
    }

    /// Remove a field and return it.
    ///
    /// # Errors
    ///
    /// Returns an error if the field does not exist.
    pub fn remove(&mut self, field: &str, variety: &str) -> Result<Field> {
        let idx = self.position(field, variety)?;
        Ok(self.fields.remove(idx))
    }

    fn position(&self, field: &str, variety: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.is(field, variety))
            .ok_or_else(|| Error::FieldNotFound {
                field: field.to_string(),
                variety: variety.to_string(),
            })
    }

    /// Iterate fields in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields sorted by `order`, unordered fields last, ties in file order.
    #[must_use]
    pub fn in_schedule_order(&self) -> Vec<&Field> {
        let mut fields: Vec<&Field> = self.fields.iter().collect();
        fields.sort_by_key(|f| (f.order.is_none(), f.order));
        fields
    }

    /// Load a collection from a YAML file.
    ///
    /// A missing or empty file yields an empty collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or contains invalid or
    /// duplicate fields.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let fields: Vec<Field> = datadir::read_list(path)?.unwrap_or_default();
        let collection = Self::from_fields(fields)?;
        debug!("Loaded {} fields from {}", collection.len(), path.display());
        Ok(collection)
    }

    /// Save the collection as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        datadir::write_list(path.as_ref(), &self.fields)
    }
}

impl<'a> IntoIterator for &'a FieldCollection {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

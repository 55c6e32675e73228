//! Catalog of queryable collections.

use std::collections::BTreeMap;
use std::sync::Arc;

use common_error::{Location, QuarryError, QuarryResult};
use serde::{Deserialize, Serialize};

use crate::types::{RecordType, Type};

/// Read-only mapping from collection name to element record type.
///
/// A catalog is assembled once with a [`CatalogBuilder`] and never mutated
/// afterwards; share it between threads as `Arc<Catalog>`. Deserializing
/// goes through the builder, so a loaded catalog satisfies the same checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CatalogDef")]
pub struct Catalog {
    /// Collections by name.
    collections: BTreeMap<String, RecordType>,
}

impl Catalog {
    /// Start building a catalog.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// An empty catalog.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a catalog from JSON (`{"collections": {"People": {...}}}`).
    ///
    /// # Errors
    ///
    /// `SerdeJsonError` for malformed JSON, `TypeError` for a row type the
    /// builder rejects.
    pub fn from_json(json: &str) -> QuarryResult<Self> {
        let def: CatalogDef = serde_json::from_str(json)?;
        Self::try_from(def)
    }

    /// Serialize this catalog to JSON.
    pub fn to_json(&self) -> QuarryResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Get the row type of a collection.
    pub fn get(&self, name: &str) -> Option<&RecordType> {
        self.collections.get(name)
    }

    /// Get the row type of a collection, or a type error naming it.
    pub fn resolve(&self, name: &str, location: &Location) -> QuarryResult<&RecordType> {
        self.get(name).ok_or_else(|| {
            QuarryError::type_error(
                "a collection registered in the catalog",
                format!("unknown collection `{name}`"),
                location.clone(),
            )
        })
    }

    /// The type of a collection reference: `Collection<row>`.
    pub fn collection_type(&self, name: &str) -> Option<Type> {
        self.get(name)
            .map(|row| Type::collection(Type::Record(row.clone())))
    }

    /// List all collection names, sorted.
    pub fn list(&self) -> Vec<&str> {
        self.collections.keys().map(String::as_str).collect()
    }

    /// Check if a collection exists.
    pub fn exists(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Number of registered collections.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// Whether no collection is registered.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// Wire form of a catalog, checked by [`CatalogBuilder`] on load.
#[derive(Deserialize)]
struct CatalogDef {
    #[serde(default)]
    collections: BTreeMap<String, RecordType>,
}

impl TryFrom<CatalogDef> for Catalog {
    type Error = QuarryError;

    fn try_from(def: CatalogDef) -> QuarryResult<Self> {
        def.collections
            .into_iter()
            .try_fold(Catalog::builder(), |builder, (name, row)| {
                builder.register(name, row)
            })
            .map(CatalogBuilder::build)
    }
}

/// Accumulates collection definitions before the catalog is frozen.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    collections: BTreeMap<String, RecordType>,
}

impl CatalogBuilder {
    /// Register a collection. Row types must be flat records of base types
    /// with unique labels.
    pub fn register(mut self, name: impl Into<String>, row: RecordType) -> QuarryResult<Self> {
        let name = name.into();
        let location = Location::root().child(name.clone());
        if self.collections.contains_key(&name) {
            return Err(QuarryError::type_error(
                "a unique collection name",
                format!("duplicate collection `{name}`"),
                location,
            ));
        }
        if !row.has_unique_labels() {
            return Err(QuarryError::type_error(
                "a record with unique labels",
                row.to_string(),
                location,
            ));
        }
        if !row.is_flat() {
            return Err(QuarryError::type_error(
                "a record of base-typed fields",
                row.to_string(),
                location,
            ));
        }
        self.collections.insert(name, row);
        Ok(self)
    }

    /// Freeze the catalog.
    pub fn build(self) -> Catalog {
        Catalog {
            collections: self.collections,
        }
    }

    /// Freeze the catalog behind an `Arc` for sharing.
    pub fn build_shared(self) -> Arc<Catalog> {
        Arc::new(self.build())
    }
}

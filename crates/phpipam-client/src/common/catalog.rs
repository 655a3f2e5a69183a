//! Indexing of controller items
//!
//! phpIPAM returns collections as JSON lists. A [`Catalog`] indexes such a
//! list by the values of one or more fields so items can be looked up by
//! name, by `(name, location)` pairs and so on.

use crate::error::PhpIpamError;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map;
use std::hash::Hash;

/// Lookup key of a catalog: one string per key field, in field order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogKey(Vec<String>);

impl CatalogKey {
    /// Key parts in field order
    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for CatalogKey {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for CatalogKey {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<(&str, &str)> for CatalogKey {
    fn from((a, b): (&str, &str)) -> Self {
        Self(vec![a.to_string(), b.to_string()])
    }
}

impl From<(&str, &str, &str)> for CatalogKey {
    fn from((a, b, c): (&str, &str, &str)) -> Self {
        Self(vec![a.to_string(), b.to_string(), c.to_string()])
    }
}

impl From<Vec<String>> for CatalogKey {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl From<&[&str]> for CatalogKey {
    fn from(value: &[&str]) -> Self {
        Self(value.iter().map(|s| (*s).to_string()).collect())
    }
}

/// Items of a controller indexed by key fields
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    fields: Vec<String>,
    entries: HashMap<CatalogKey, Value>,
}

impl Catalog {
    /// Fields the catalog is keyed by
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Look up an item
    pub fn get(&self, key: impl Into<CatalogKey>) -> Option<&Value> {
        self.entries.get(&key.into())
    }

    /// Whether an item with `key` exists
    pub fn contains(&self, key: impl Into<CatalogKey>) -> bool {
        self.entries.contains_key(&key.into())
    }

    /// Number of indexed items
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over keys and items
    pub fn iter(&self) -> hash_map::Iter<'_, CatalogKey, Value> {
        self.entries.iter()
    }

    /// Consume the catalog into its map
    #[must_use]
    pub fn into_inner(self) -> HashMap<CatalogKey, Value> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = (&'a CatalogKey, &'a Value);
    type IntoIter = hash_map::Iter<'a, CatalogKey, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Index `items` by the values of `fields`
///
/// String values are used as-is, `null` becomes an empty string and any
/// other JSON value its JSON text. When two items share a key the later one
/// wins.
///
/// # Errors
/// * `PhpIpamError::MissingField` - an item lacks one of the fields
/// * `PhpIpamError::InvalidConfig` - `fields` is empty
pub fn create_index<I>(items: I, fields: &[&str]) -> Result<Catalog, PhpIpamError>
where
    I: IntoIterator<Item = Value>,
{
    if fields.is_empty() {
        return Err(PhpIpamError::InvalidConfig(
            "a catalog needs at least one key field".to_string(),
        ));
    }

    let mut entries = HashMap::new();
    for item in items {
        let key = fields
            .iter()
            .map(|field| field_text(&item, field))
            .collect::<Result<Vec<_>, _>>()?;
        entries.insert(CatalogKey(key), item);
    }

    Ok(Catalog {
        fields: fields.iter().map(|f| (*f).to_string()).collect(),
        entries,
    })
}

/// Index `items` by a caller-supplied key function
pub fn index_by<I, K, F>(items: I, mut key: F) -> HashMap<K, Value>
where
    I: IntoIterator<Item = Value>,
    K: Eq + Hash,
    F: FnMut(&Value) -> K,
{
    items.into_iter().map(|item| (key(&item), item)).collect()
}

fn field_text(item: &Value, field: &str) -> Result<String, PhpIpamError> {
    match item.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) => Ok(String::new()),
        Some(other) => Ok(other.to_string()),
        None => Err(PhpIpamError::MissingField {
            field: field.to_string(),
        }),
    }
}

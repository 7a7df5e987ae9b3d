//! A single table row as a name-value property collection.

use std::collections::BTreeMap;

use crate::value::Value;

/// One row of a table: an ordered collection of column values keyed by
/// field name, with typed accessors.
///
/// Records are the exchange format between the dataset layer and the
/// storage adapter; the adapter is responsible for mapping them onto the
/// columnar representation declared by the table schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Record {
        Record(BTreeMap::new())
    }

    /// Sets a column value, replacing any previous value under the same
    /// name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style variant of [`set`](Record::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Record {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns the non-null value of a column, if present.
    pub fn get_non_null(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_bytes(&self, name: &str) -> Option<&[u8]> {
        self.get(name).and_then(Value::as_bytes)
    }

    /// The row id, when the record carries the conventional `id` column.
    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Drops every column not listed in `names`.
    pub fn retain_columns(&mut self, names: &[&str]) {
        self.0.retain(|k, _| names.contains(&k.as_str()));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    pub fn from_json(json: &serde_json::Value) -> Option<Record> {
        let map = json.as_object()?;
        Some(Record(
            map.iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v)))
                .collect(),
        ))
    }
}

impl From<BTreeMap<String, Value>> for Record {
    fn from(map: BTreeMap<String, Value>) -> Record {
        Record(map)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Record {
        Record(iter.into_iter().collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_access() {
        let record = Record::new()
            .with("id", "item_0")
            .with("width", 640i64)
            .with("fps", 29.97f64)
            .with("is_key", true);
        assert_eq!(record.id(), Some("item_0"));
        assert_eq!(record.get_i64("width"), Some(640));
        assert_eq!(record.get_f64("fps"), Some(29.97));
        assert_eq!(record.get_bool("is_key"), Some(true));
        assert_eq!(record.get_str("missing"), None);
    }

    #[test]
    fn projection_retains_listed_columns() {
        let mut record = Record::new()
            .with("id", "a")
            .with("split", "train")
            .with("url", "train/a.jpg");
        record.retain_columns(&["id", "url"]);
        assert_eq!(record.len(), 2);
        assert!(!record.contains("split"));
    }
}

//! Key/value propagation envelope carried along DAG edges.
//!
//! A [`Context`] is owned by one subtask instance. Downstream instances get
//! their own copy through [`Context::merge`]; nothing shares a context by
//! reference.

pub mod keys;
pub mod merge;

pub use merge::MergeConflict;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    #[serde(default)]
    pub string_map: BTreeMap<String, String>,
    #[serde(default)]
    pub list_map: BTreeMap<String, Vec<String>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.string_map.is_empty() && self.list_map.is_empty()
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.string_map.insert(key.into(), value.into());
        self
    }

    pub fn put_list<I, S>(&mut self, key: impl Into<String>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.list_map
            .insert(key.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Appends `value` unless the list already holds it.
    pub fn append_list(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        let list = self.list_map.entry(key.into()).or_default();
        if !list.contains(&value) {
            list.push(value);
        }
        self
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let string = self.string_map.remove(key).is_some();
        let list = self.list_map.remove(key).is_some();
        string || list
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.string_map.get(key).map(String::as_str)
    }

    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        self.list_map.get(key).map(Vec::as_slice)
    }

    pub fn list_contains(&self, key: &str, value: &str) -> bool {
        self.list_map
            .get(key)
            .is_some_and(|values| values.iter().any(|v| v == value))
    }

    /// Reads `key` as seen by a fanned-out sibling.
    ///
    /// With a parallel index the `idx`-th list element wins; otherwise, or
    /// when the list is too short, the scalar value is returned.
    pub fn get(&self, key: &str, parallel_idx: Option<usize>) -> Option<&str> {
        if let Some(idx) = parallel_idx {
            if let Some(value) = self.list_map.get(key).and_then(|values| values.get(idx)) {
                return Some(value.as_str());
            }
        }
        self.get_string(key)
    }

    /// Copy of this context with each list's `idx`-th element exposed as the
    /// scalar value of the same key.
    pub fn parallel_view(&self, idx: usize) -> Context {
        let mut view = self.clone();
        for (key, values) in &self.list_map {
            if let Some(value) = values.get(idx) {
                view.string_map.insert(key.clone(), value.clone());
            }
        }
        view
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Size in bytes of the persisted (JSON) form.
    pub fn serialized_size(&self) -> usize {
        self.to_json().map(|json| json.len()).unwrap_or(usize::MAX)
    }
}

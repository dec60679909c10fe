// ── Collections ──
//
// Typeified list envelopes. Members may be cached entities; the collection
// itself never is.

use indexmap::IndexMap;

use super::entity::Entity;
use super::value::Value;

/// Meta keys copied from a collection envelope by default.
pub const DEFAULT_META_KEYS: &[&str] = &[
    "actionLinks",
    "createDefaults",
    "createTypes",
    "filters",
    "links",
    "pagination",
    "resourceType",
    "sort",
    "sortLinks",
    "type",
];

/// An ordered list of typeified members plus echoed envelope metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    content: Vec<Value>,
    meta: IndexMap<String, serde_json::Value>,
}

impl Collection {
    pub fn new(content: Vec<Value>) -> Self {
        Self {
            content,
            meta: IndexMap::new(),
        }
    }

    pub fn content(&self) -> &[Value] {
        &self.content
    }

    pub fn into_content(self) -> Vec<Value> {
        self.content
    }

    /// Members that are typed records.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.content.iter().filter_map(Value::as_entity)
    }

    /// `true` if this exact instance is a member.
    pub fn contains_entity(&self, entity: &Entity) -> bool {
        self.entities().any(|e| Entity::ptr_eq(e, entity))
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn meta(&self, key: &str) -> Option<&serde_json::Value> {
        self.meta.get(key)
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.meta.insert(key.into(), value);
    }

    pub fn meta_entries(&self) -> &IndexMap<String, serde_json::Value> {
        &self.meta
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.meta("resourceType").and_then(serde_json::Value::as_str)
    }
}

/// Something that can be assembled from several result pages.
pub trait Paginatable {
    /// URL of the named pagination link (`next`, `prev`, `first`, ...).
    fn page_for(&self, name: &str) -> Option<String>;

    /// Continuation URL, if more pages exist.
    fn next_page(&self) -> Option<String> {
        self.page_for("next")
    }

    /// Append a subsequent page, adopting its pagination state.
    fn append_page(&mut self, page: Collection);
}

impl Paginatable for Collection {
    fn page_for(&self, name: &str) -> Option<String> {
        self.meta("pagination")?
            .get(name)?
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    }

    fn append_page(&mut self, page: Collection) {
        let Collection { content, mut meta } = page;
        self.content.extend(content);
        match meta.shift_remove("pagination") {
            Some(pagination) => {
                self.meta.insert("pagination".into(), pagination);
            }
            None => {
                self.meta.shift_remove("pagination");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(ids: &[&str], next: Option<&str>) -> Collection {
        let mut c = Collection::new(ids.iter().map(|id| Value::from(*id)).collect());
        c.set_meta("pagination", json!({ "next": next, "limit": 2 }));
        c
    }

    #[test]
    fn next_page_reads_pagination() {
        assert_eq!(
            page(&["a"], Some("/v1/w?marker=b")).next_page().as_deref(),
            Some("/v1/w?marker=b")
        );
        assert!(page(&["a"], None).next_page().is_none());
    }

    #[test]
    fn append_page_concatenates_and_advances() {
        let mut first = page(&["a", "b"], Some("/v1/w?marker=c"));
        first.append_page(page(&["c"], None));

        assert_eq!(first.len(), 3);
        assert_eq!(first.content()[2], Value::from("c"));
        assert!(first.next_page().is_none());
    }
}

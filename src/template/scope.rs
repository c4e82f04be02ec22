// ABOUTME: Variable scope management for template rendering
// ABOUTME: Holds caller bindings, global SET variables and loop-local values

use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

use super::error::Result;
use super::model::Model;
use super::value::Value;

/// Ordered name → value bindings visible to a placeholder.
///
/// A scope is one frame of a lookup chain: its own bindings come first,
/// then each enclosing frame in order. Loop iterations and SET globals are
/// layered on top of the caller's bindings this way instead of copying them.
///
/// Bare names match exactly. The root segment of a dotted path may also
/// match case-insensitively through [`Scope::get_ignore_case`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    vars: IndexMap<String, Value>,
    parents: Vec<Arc<Scope>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty frame over `parents`, searched in the order given
    pub fn layered(parents: impl IntoIterator<Item = Arc<Scope>>) -> Self {
        Self {
            vars: IndexMap::new(),
            parents: parents.into_iter().collect(),
        }
    }

    /// Build a scope from the top-level keys of a JSON object.
    /// Anything other than an object yields an empty scope.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(key, value)| (key, Value::from(value)))
                .collect(),
            _ => Self::default(),
        }
    }

    /// Build a scope from any serializable struct or map
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::from_json(serde_json::to_value(value)?))
    }

    /// Add or update a variable
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Builder form of [`Scope::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Bind a model under the lowercase form of its class name
    pub fn insert_model(&mut self, model: Arc<dyn Model>) {
        let name = model.class_name().to_lowercase();
        self.vars.insert(name, Value::Model(model));
    }

    pub fn with_model(mut self, model: Arc<dyn Model>) -> Self {
        self.insert_model(model);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars
            .get(key)
            .or_else(|| self.parents.iter().find_map(|parent| parent.get(key)))
    }

    /// Exact match first, then the first case-insensitive match
    pub fn get_ignore_case(&self, key: &str) -> Option<&Value> {
        self.get(key)
            .or_else(|| self.find_ignore_case(&key.to_lowercase()))
    }

    fn find_ignore_case(&self, lowered: &str) -> Option<&Value> {
        self.vars
            .iter()
            .find(|(name, _)| name.to_lowercase() == lowered)
            .map(|(_, value)| value)
            .or_else(|| {
                self.parents
                    .iter()
                    .find_map(|parent| parent.find_ignore_case(lowered))
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of bindings in this frame, not counting enclosing frames
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty() && self.parents.is_empty()
    }

    pub fn clear(&mut self) {
        self.vars.clear();
        self.parents.clear();
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Scope {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut scope = Scope::new();
        scope.extend(iter);
        scope
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Scope {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Invoice;

    impl Model for Invoice {
        fn class_name(&self) -> &str {
            "Invoice"
        }

        fn attribute(&self, name: &str) -> Option<Value> {
            (name == "id").then(|| Value::from(7))
        }
    }

    #[test]
    fn test_scope_from_json() {
        let scope = Scope::from_json(json!({"name": "Bob", "count": 3}));
        assert_eq!(scope.len(), 2);
        assert_eq!(scope.get("name"), Some(&Value::from("Bob")));
        assert_eq!(scope.get("count"), Some(&Value::Number(3.0)));

        assert!(Scope::from_json(json!([1, 2])).is_empty());
    }

    #[test]
    fn test_bare_lookup_is_case_sensitive() {
        let scope = Scope::new().with("nonExistenD", "ooo");
        assert!(scope.get("nonExistend").is_none());
        assert_eq!(scope.get_ignore_case("nonexistend"), Some(&Value::from("ooo")));
    }

    #[test]
    fn test_model_binding_uses_lowercase_class_name() {
        let scope = Scope::new().with_model(Arc::new(Invoice));
        assert!(scope.contains("invoice"));
        assert!(matches!(scope.get_ignore_case("Invoice"), Some(Value::Model(_))));
    }

    #[test]
    fn test_layered_frames_shadow_in_order() {
        let base = Arc::new(Scope::new().with("total", 1).with("name", "x"));
        let globals = Arc::new(Scope::new().with("total", 5));

        let bindings = Scope::layered([Arc::clone(&globals), Arc::clone(&base)]);
        assert_eq!(bindings.get("total"), Some(&Value::Number(5.0)));
        assert_eq!(bindings.get("name"), Some(&Value::from("x")));
        assert!(bindings.contains("name"));
        assert_eq!(bindings.len(), 0);
        assert_eq!(base.get("total"), Some(&Value::Number(1.0)));

        let local = Scope::layered([Arc::new(bindings)]).with("name", "y");
        assert_eq!(local.get("name"), Some(&Value::from("y")));
        assert_eq!(local.get_ignore_case("TOTAL"), Some(&Value::Number(5.0)));
    }
}

//! Immutable route snapshot.

use std::collections::HashMap;

/// Strip one leading `/` from a key or request path.
///
/// `"/a"` and `"a"` name the same route; `"//a"` becomes `"/a"`.
pub fn normalize_key(key: &str) -> &str {
    key.strip_prefix('/').unwrap_or(key)
}

/// A frozen key → target mapping.
///
/// Built once per load and shared behind an `Arc`; there is no way to
/// modify a table after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: HashMap<String, String>,
}

impl RouteTable {
    /// Resolve a normalized key to its target.
    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.routes.get(key).map(String::as_str)
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True when the table holds no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Iterate `(key, target)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for RouteTable
where
    K: AsRef<str>,
    V: Into<String>,
{
    /// Later entries win when two keys normalize to the same value.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let routes = iter
            .into_iter()
            .map(|(k, v)| (normalize_key(k.as_ref()).to_string(), v.into()))
            .collect();
        Self { routes }
    }
}

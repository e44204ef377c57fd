use std::fmt;

/// An ordered, opaque key identifying a cached resource.
///
/// Keys are sequences of segments. Equality is order-sensitive, and cache
/// commands match by prefix: `["items"]` addresses `["items"]` as well as
/// `["items", "42"]`.
///
/// ```
/// use tears_query::query::QueryKey;
///
/// let all = QueryKey::from("items");
/// let one = QueryKey::from(["items", "42"]);
///
/// assert!(one.starts_with(&all));
/// assert!(!all.starts_with(&one));
/// assert_eq!(one.to_string(), "items/42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    /// Creates a key from its segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self(segments.into_iter().map(|s| s.to_string()).collect())
    }

    /// Returns a new key with `segment` appended.
    #[must_use]
    pub fn child(&self, segment: impl ToString) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    /// The segments of this key.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Returns `true` if `prefix` is a leading subsequence of this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl From<&str> for QueryKey {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for QueryKey {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl<S: ToString, const N: usize> From<[S; N]> for QueryKey {
    fn from(value: [S; N]) -> Self {
        Self::new(value)
    }
}

impl<S: ToString> From<Vec<S>> for QueryKey {
    fn from(value: Vec<S>) -> Self {
        Self::new(value)
    }
}

impl From<&QueryKey> for QueryKey {
    fn from(value: &QueryKey) -> Self {
        value.clone()
    }
}

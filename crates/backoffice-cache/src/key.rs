use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered tuple of strings identifying a cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// `[...self, segment]`
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl From<&[&str]> for CacheKey {
    fn from(segments: &[&str]) -> Self {
        Self::new(segments.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for CacheKey {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{:?}", segment)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_and_prefix() {
        let shipments = CacheKey::from(["shipments"]);
        let one = shipments.child("S1");
        assert_eq!(one, CacheKey::from(["shipments", "S1"]));
        assert!(one.starts_with(&shipments));
        assert!(!shipments.starts_with(&one));
        assert!(!CacheKey::from(["shipmentsX"]).starts_with(&shipments));
    }

    #[test]
    fn display_is_tuple_like() {
        assert_eq!(CacheKey::from(["chat", "S1"]).to_string(), r#"["chat","S1"]"#);
    }
}

use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, convert::Infallible, fmt, str};

/// The identifier of a node in a [`Topology`].
///
/// Identifiers are opaque strings chosen by the editor. They only need to
/// be unique within one session.
///
/// [`Topology`]: crate::topology::Topology
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl str::FromStr for NodeId {
    type Err = Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print() {
        assert_eq!(format!("{}", NodeId::new("app-1")), "app-1")
    }

    #[test]
    fn parse() {
        assert_eq!("lb".parse::<NodeId>().unwrap(), NodeId::new("lb"));
    }

    #[test]
    fn serde_is_a_plain_string() {
        let id: NodeId = serde_json::from_str("\"db-primary\"").unwrap();
        assert_eq!(id.as_str(), "db-primary");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"db-primary\"");
    }

    #[test]
    fn lookup_by_str() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(NodeId::new("a"), 1);
        assert_eq!(map.get("a"), Some(&1));
    }
}

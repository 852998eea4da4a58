use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt};

/// The identifier of a session in a [`SessionRegistry`].
///
/// Ids generated by the registry are 8 lowercase hexadecimal characters,
/// but any string is accepted when looking a session up.
///
/// [`SessionRegistry`]: crate::SessionRegistry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id rendered from the low 32 bits of `bits`.
    pub(crate) fn from_bits(bits: u64) -> Self {
        Self(format!("{:08x}", bits as u32))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

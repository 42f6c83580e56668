use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// A single capability, named by a dotted string.
///
/// The marketplace uses names like `"listings.approve"` or `"cart.write"`;
/// `.own.` variants scope a capability to resources the caller owns (the
/// aggregate enforces the ownership itself). This layer treats the name as
/// opaque apart from the wildcard `"*"`, which grants everything and is
/// reserved for the admin role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// A named role carried in the JWT.
///
/// The marketplace ships four: `admin`, `manager`, `seller`, `buyer`. This
/// type deliberately knows nothing about what any of them can do; role names
/// resolve to permissions through the single policy function in infra, so
/// adding a role never touches this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

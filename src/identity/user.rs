use std::fmt;

use serde::{Deserialize, Serialize};

/// User id as written by the sign-in layer; numeric today, strings accepted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(u64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

/// Identity of a signed-in chat user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub name: String,
    /// Avatar index picked by the sign-in layer
    #[serde(rename = "image", default)]
    pub avatar_index: u32,
}

impl UserIdentity {
    pub fn new(id: impl Into<UserId>, name: impl Into<String>, avatar_index: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar_index,
        }
    }
}

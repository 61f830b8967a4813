use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of a logical record.
///
/// A record is known by its queue id until the remote store assigns it an
/// id; from then on the remote id is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Identity {
    Local(Uuid),
    Remote(String),
}

impl Identity {
    pub fn is_remote(&self) -> bool {
        matches!(self, Identity::Remote(_))
    }

    pub fn remote_id(&self) -> Option<&str> {
        match self {
            Identity::Remote(id) => Some(id),
            Identity::Local(_) => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Local(id) => write!(f, "local:{}", id),
            Identity::Remote(id) => write!(f, "{}", id),
        }
    }
}

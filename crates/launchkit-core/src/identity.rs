use std::fmt;

use serde::{Deserialize, Serialize};

/// The only stable identity of an app. Two apps sharing a name but coming
/// from different sources are distinct entities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AppIdentity {
    pub source: String,
    pub name: String,
}

impl AppIdentity {
    pub fn new(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for AppIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.name)
    }
}

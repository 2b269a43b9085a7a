use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("source '{0}' already exists")]
    DuplicateName(String),
    #[error("source '{0}' is built in and cannot be added or removed")]
    BuiltInSource(String),
    #[error("source '{0}' not found")]
    SourceNotFound(String),
    #[error("invalid source name '{0}': must match [a-z0-9][a-z0-9_-]*")]
    InvalidName(String),
    #[error("schema validation failed for {path}: {detail}")]
    Schema { path: String, detail: String },
    #[error("failed accessing {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl RegistryError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn schema(path: &std::path::Path, detail: impl Into<String>) -> Self {
        Self::Schema {
            path: path.display().to_string(),
            detail: detail.into(),
        }
    }
}

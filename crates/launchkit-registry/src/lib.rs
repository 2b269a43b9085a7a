mod app_info_store;
mod error;
mod fs_ops;
mod migrations;
mod source_store;
mod source_types;

pub use app_info_store::{AppInfoFile, AppInfoStore, APP_INFO_SCHEMA_VERSION};
pub use error::RegistryError;
pub use migrations::{MigrationReport, SchemaMigrator};
pub use source_store::SourceRegistry;
pub use source_types::{
    classify_source_state, has_restricted_access_url, is_deprecated_url, rewrite_source_url,
    Source, SourceRecordV1, SourceState, SourcesFile, LOCAL_SOURCE, OFFICIAL_SOURCE,
    OFFICIAL_SOURCE_URL,
};

#[cfg(test)]
mod tests;

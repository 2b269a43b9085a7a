mod fetch;
mod merge;
mod transport;

pub use fetch::{fetch_all, AppFetchError, CatalogSnapshot, SourceFetchError};
pub use merge::merge_installed;
pub use transport::{CredentialLookup, ManifestTransport, NoCredentials};

#[cfg(test)]
mod tests;

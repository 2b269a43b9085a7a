use anyhow::Result;
use semver::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptReply {
    Yes,
    No,
    /// The question is showing in a modal dialog and no answer exists yet;
    /// the sequence interrupts and resumes once the user has decided.
    Pending,
}

pub trait UserPrompt {
    fn confirm(&self, question: &str) -> PromptReply;
}

/// Telemetry consent flag. `None` means the user was never asked.
pub trait ConsentStore {
    fn get(&self) -> Result<Option<bool>>;
    fn set(&self, granted: bool) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenInformation {
    Set { set_at_unix: u64, preview: String },
    NotSet,
    /// A token record exists but cannot be read or decoded.
    EncryptionUnavailable,
}

/// External store for the restricted-source bearer credential. The source
/// registry classifies sources; it never holds tokens itself.
pub trait CredentialStore {
    fn token(&self) -> Result<Option<String>>;
    fn set_token(&self, value: &str) -> Result<()>;
    fn information(&self) -> Result<TokenInformation>;
}

/// Release feed for self-updating components (the launcher itself and its
/// bundled companion tool). Returns the newest version strictly greater
/// than `current`, if any.
pub trait UpdateChannel {
    fn latest(&self, component: &str, current: &Version) -> Result<Option<Version>>;
}

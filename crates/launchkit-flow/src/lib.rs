mod ops;
mod ports;
mod runner;
mod startup;
mod update;

pub use ops::{displayed_apps, refresh_catalog, remove_source_cascade};
pub use ports::{
    ConsentStore, CredentialStore, PromptReply, TokenInformation, UpdateChannel, UserPrompt,
};
pub use runner::{run_steps, ProcessStep, StepFlow, StepQueue};
pub use startup::{startup_steps, StartupContext};
pub use update::{update_steps, UpdateContext, COMPANION_TOOL_COMPONENT, LAUNCHER_COMPONENT};

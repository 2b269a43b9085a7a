use anyhow::{Context, Result};
use launchkit_catalog::{CatalogSnapshot, CredentialLookup, ManifestTransport};
use launchkit_registry::{AppInfoStore, SourceRegistry};
use semver::Version;

use crate::ops::refresh_catalog;
use crate::ports::{PromptReply, UpdateChannel, UserPrompt};
use crate::runner::{ProcessStep, StepFlow, StepQueue};

pub const LAUNCHER_COMPONENT: &str = "launcher";
pub const COMPANION_TOOL_COMPONENT: &str = "device-bridge";

/// Context for the background update sequence: the bundled device-bridge
/// tool, the launcher itself, then a full app-info refresh.
pub struct UpdateContext<'a> {
    pub registry: &'a SourceRegistry,
    pub store: &'a AppInfoStore,
    pub transport: &'a dyn ManifestTransport,
    pub credentials: &'a dyn CredentialLookup,
    pub channel: &'a dyn UpdateChannel,
    pub prompt: &'a dyn UserPrompt,

    pub launcher_version: Version,
    pub companion_version: Version,

    pub companion_update: Option<Version>,
    pub companion_update_accepted: bool,
    pub self_update: Option<Version>,
    pub self_update_accepted: bool,
    pub snapshot: Option<CatalogSnapshot>,
}

impl<'a> UpdateContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: &'a SourceRegistry,
        store: &'a AppInfoStore,
        transport: &'a dyn ManifestTransport,
        credentials: &'a dyn CredentialLookup,
        channel: &'a dyn UpdateChannel,
        prompt: &'a dyn UserPrompt,
        launcher_version: Version,
        companion_version: Version,
    ) -> Self {
        Self {
            registry,
            store,
            transport,
            credentials,
            channel,
            prompt,
            launcher_version,
            companion_version,
            companion_update: None,
            companion_update_accepted: false,
            self_update: None,
            self_update_accepted: false,
            snapshot: None,
        }
    }
}

pub fn update_steps<'a>() -> StepQueue<UpdateContext<'a>> {
    let mut queue = StepQueue::new();
    queue.push(CompanionUpdateCheckStep);
    queue.push(SelfUpdateCheckStep);
    queue.push(RefreshAppInfoStep);
    queue
}

struct CompanionUpdateCheckStep;

impl ProcessStep<UpdateContext<'_>> for CompanionUpdateCheckStep {
    fn name(&self) -> &'static str {
        "companion-update-check"
    }

    fn run(&mut self, cx: &mut UpdateContext<'_>) -> Result<StepFlow> {
        let current = cx.companion_version.clone();
        let Some(latest) = cx
            .channel
            .latest(COMPANION_TOOL_COMPONENT, &current)
            .context("failed checking for device-bridge updates")?
        else {
            return Ok(StepFlow::Continue);
        };

        cx.companion_update = Some(latest.clone());
        match cx
            .prompt
            .confirm(&format!("Update the device bridge to {latest}?"))
        {
            PromptReply::Yes => cx.companion_update_accepted = true,
            PromptReply::No => {}
            PromptReply::Pending => return Ok(StepFlow::Interrupt),
        }
        Ok(StepFlow::Continue)
    }
}

struct SelfUpdateCheckStep;

impl ProcessStep<UpdateContext<'_>> for SelfUpdateCheckStep {
    fn name(&self) -> &'static str {
        "launcher-self-update-check"
    }

    fn run(&mut self, cx: &mut UpdateContext<'_>) -> Result<StepFlow> {
        let current = cx.launcher_version.clone();
        let Some(latest) = cx
            .channel
            .latest(LAUNCHER_COMPONENT, &current)
            .context("failed checking for launcher updates")?
        else {
            return Ok(StepFlow::Continue);
        };

        cx.self_update = Some(latest.clone());
        match cx
            .prompt
            .confirm(&format!("Update the launcher to {latest}?"))
        {
            PromptReply::Yes => cx.self_update_accepted = true,
            PromptReply::No => {}
            PromptReply::Pending => return Ok(StepFlow::Interrupt),
        }
        Ok(StepFlow::Continue)
    }
}

struct RefreshAppInfoStep;

impl ProcessStep<UpdateContext<'_>> for RefreshAppInfoStep {
    fn name(&self) -> &'static str {
        "refresh-app-info"
    }

    fn run(&mut self, cx: &mut UpdateContext<'_>) -> Result<StepFlow> {
        cx.snapshot = Some(refresh_catalog(
            cx.registry,
            cx.store,
            cx.transport,
            cx.credentials,
        )?);
        Ok(StepFlow::Continue)
    }
}

use anyhow::{Context, Result};
use launchkit_core::AppInfo;
use launchkit_installer::{InstallationLifecycle, NullSink};
use launchkit_registry::{AppInfoStore, Source, SourceRegistry};

use crate::ops::remove_source_cascade;
use crate::ports::{ConsentStore, CredentialStore, PromptReply, TokenInformation, UserPrompt};
use crate::runner::{ProcessStep, StepFlow, StepQueue};

/// Everything the startup sequence reads and produces. The schema migrator
/// must have run before this context is built — these steps read persisted
/// state and assume it is on the current schema.
pub struct StartupContext<'a> {
    pub registry: &'a SourceRegistry,
    pub store: &'a AppInfoStore,
    pub lifecycle: &'a InstallationLifecycle,
    pub consent: &'a dyn ConsentStore,
    pub credentials: &'a dyn CredentialStore,
    pub prompt: &'a dyn UserPrompt,

    pub sources: Vec<Source>,
    pub cached_apps: Vec<AppInfo>,
    pub restricted_token: Option<String>,
    pub token_unavailable: bool,
    pub deprecated_sources: Vec<Source>,
    pub missing_credential_sources: Vec<Source>,
    pub update_checks_requested: bool,
}

impl<'a> StartupContext<'a> {
    pub fn new(
        registry: &'a SourceRegistry,
        store: &'a AppInfoStore,
        lifecycle: &'a InstallationLifecycle,
        consent: &'a dyn ConsentStore,
        credentials: &'a dyn CredentialStore,
        prompt: &'a dyn UserPrompt,
    ) -> Self {
        Self {
            registry,
            store,
            lifecycle,
            consent,
            credentials,
            prompt,
            sources: Vec::new(),
            cached_apps: Vec::new(),
            restricted_token: None,
            token_unavailable: false,
            deprecated_sources: Vec::new(),
            missing_credential_sources: Vec::new(),
            update_checks_requested: false,
        }
    }

    pub fn local_apps(&self) -> Vec<&AppInfo> {
        self.cached_apps
            .iter()
            .filter(|app| app.installed.is_some())
            .collect()
    }
}

pub fn startup_steps<'a>() -> StepQueue<StartupContext<'a>> {
    let mut queue = StepQueue::new();
    queue.push(TelemetryConsentStep);
    queue.push(LoadSourcesStep);
    queue.push(LoadAppsStep);
    queue.push(LoadCredentialsStep);
    queue.push(CheckDeprecatedSourcesStep);
    queue.push(CheckMissingCredentialsStep);
    queue.push(StartUpdateChecksStep);
    queue
}

/// Asks for telemetry consent on first launch. While the consent dialog is
/// open the sequence interrupts; the dialog handler records the answer and
/// resumes the remaining queue.
struct TelemetryConsentStep;

impl ProcessStep<StartupContext<'_>> for TelemetryConsentStep {
    fn name(&self) -> &'static str {
        "telemetry-consent"
    }

    fn run(&mut self, cx: &mut StartupContext<'_>) -> Result<StepFlow> {
        if cx.consent.get().context("failed reading consent flag")?.is_some() {
            return Ok(StepFlow::Continue);
        }

        match cx.prompt.confirm("Share anonymous usage statistics?") {
            PromptReply::Yes => cx.consent.set(true).context("failed storing consent")?,
            PromptReply::No => cx.consent.set(false).context("failed storing consent")?,
            PromptReply::Pending => return Ok(StepFlow::Interrupt),
        }
        Ok(StepFlow::Continue)
    }
}

struct LoadSourcesStep;

impl ProcessStep<StartupContext<'_>> for LoadSourcesStep {
    fn name(&self) -> &'static str {
        "load-sources"
    }

    fn run(&mut self, cx: &mut StartupContext<'_>) -> Result<StepFlow> {
        cx.sources = cx.registry.get_all().context("failed loading sources")?;
        Ok(StepFlow::Continue)
    }
}

struct LoadAppsStep;

impl ProcessStep<StartupContext<'_>> for LoadAppsStep {
    fn name(&self) -> &'static str {
        "load-apps"
    }

    fn run(&mut self, cx: &mut StartupContext<'_>) -> Result<StepFlow> {
        cx.cached_apps = cx
            .store
            .load()
            .context("failed loading the app-info cache")?
            .apps;
        Ok(StepFlow::Continue)
    }
}

struct LoadCredentialsStep;

impl ProcessStep<StartupContext<'_>> for LoadCredentialsStep {
    fn name(&self) -> &'static str {
        "load-credentials"
    }

    fn run(&mut self, cx: &mut StartupContext<'_>) -> Result<StepFlow> {
        match cx
            .credentials
            .information()
            .context("failed reading credential store")?
        {
            TokenInformation::Set { .. } => {
                cx.restricted_token = cx
                    .credentials
                    .token()
                    .context("failed reading credential token")?;
            }
            TokenInformation::NotSet => {}
            TokenInformation::EncryptionUnavailable => cx.token_unavailable = true,
        }
        Ok(StepFlow::Continue)
    }
}

/// Surfaces deprecated sources for an opt-in bulk removal. Saying no keeps
/// them; only an explicit yes removes them, cascading to installed apps.
struct CheckDeprecatedSourcesStep;

impl ProcessStep<StartupContext<'_>> for CheckDeprecatedSourcesStep {
    fn name(&self) -> &'static str {
        "check-deprecated-sources"
    }

    fn run(&mut self, cx: &mut StartupContext<'_>) -> Result<StepFlow> {
        cx.deprecated_sources = cx
            .registry
            .deprecated_sources()
            .context("failed classifying deprecated sources")?;
        if cx.deprecated_sources.is_empty() {
            return Ok(StepFlow::Continue);
        }

        let question = format!(
            "Remove {} source(s) hosted on retired servers?",
            cx.deprecated_sources.len()
        );
        match cx.prompt.confirm(&question) {
            PromptReply::Yes => {
                for source in std::mem::take(&mut cx.deprecated_sources) {
                    remove_source_cascade(
                        cx.registry,
                        cx.store,
                        cx.lifecycle,
                        &source.name,
                        &NullSink,
                    )?;
                }
            }
            PromptReply::No => {}
            PromptReply::Pending => return Ok(StepFlow::Interrupt),
        }
        Ok(StepFlow::Continue)
    }
}

/// Restricted sources are unreachable without a token; point the user at
/// the token flow instead of failing every fetch silently.
struct CheckMissingCredentialsStep;

impl ProcessStep<StartupContext<'_>> for CheckMissingCredentialsStep {
    fn name(&self) -> &'static str {
        "check-missing-credentials"
    }

    fn run(&mut self, cx: &mut StartupContext<'_>) -> Result<StepFlow> {
        if cx.restricted_token.is_some() {
            return Ok(StepFlow::Continue);
        }

        cx.missing_credential_sources = cx
            .sources
            .iter()
            .filter(|source| cx.registry.has_restricted_access(source))
            .cloned()
            .collect();
        if cx.missing_credential_sources.is_empty() {
            return Ok(StepFlow::Continue);
        }

        let question = format!(
            "{} source(s) need an access token. Set one up now?",
            cx.missing_credential_sources.len()
        );
        match cx.prompt.confirm(&question) {
            PromptReply::Yes | PromptReply::No => Ok(StepFlow::Continue),
            PromptReply::Pending => Ok(StepFlow::Interrupt),
        }
    }
}

struct StartUpdateChecksStep;

impl ProcessStep<StartupContext<'_>> for StartUpdateChecksStep {
    fn name(&self) -> &'static str {
        "start-update-checks"
    }

    fn run(&mut self, cx: &mut StartupContext<'_>) -> Result<StepFlow> {
        cx.update_checks_requested = true;
        Ok(StepFlow::Continue)
    }
}

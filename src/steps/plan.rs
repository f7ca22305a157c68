use super::{StepError, StepOutcome, StepRunner, StepScope};
use crate::config::{Settings, ToolConfig};
use crate::credentials::{
    ActivationOutcome, Authenticator, CommandAuthenticator, CredentialStore, Secret, StoreOutcome,
    PRIMARY_SLOT,
};
use crate::environment::{lookup_value, split_credential_list, SettingsLookup};
use crate::privilege::{
    probe_as, run_as, run_privileged, CommandOutput, ExecutionIdentity, Invocation,
    PrivilegeError,
};
use crate::profile::ensure_profile_block;
use crate::reconcile::{ConfigPatch, ConfigReconciler, KeyPath};
use crate::shared::ids::StepName;
use serde_json::Value;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Everything the built-in steps read: provisioner settings, a snapshot of
/// the setting values they reference and the auth collaborator.
pub struct PlanInputs {
    pub settings: Settings,
    pub values: BTreeMap<String, String>,
    pub forwarded_env: BTreeMap<String, String>,
    pub authenticator: Rc<dyn Authenticator>,
}

impl PlanInputs {
    pub fn from_lookup(settings: Settings, lookup: &dyn SettingsLookup) -> Self {
        Self::assemble(settings, lookup, |settings, forwarded_env| {
            let authenticator: Rc<dyn Authenticator> = Rc::new(
                CommandAuthenticator::new(
                    settings.credentials.status_command.clone(),
                    settings.credentials.login_command.clone(),
                )
                .with_env(forwarded_env.clone()),
            );
            authenticator
        })
    }

    pub fn with_authenticator(
        settings: Settings,
        lookup: &dyn SettingsLookup,
        authenticator: Rc<dyn Authenticator>,
    ) -> Self {
        Self::assemble(settings, lookup, |_, _| authenticator)
    }

    fn assemble(
        settings: Settings,
        lookup: &dyn SettingsLookup,
        authenticator: impl FnOnce(&Settings, &BTreeMap<String, String>) -> Rc<dyn Authenticator>,
    ) -> Self {
        let mut values = BTreeMap::new();
        let referenced = settings
            .required_settings
            .iter()
            .chain(settings.secondary_credentials_setting.iter());
        for name in referenced {
            if let Some(value) = lookup_value(lookup, name.as_str()) {
                values.insert(name.as_str().to_string(), value);
            }
        }
        let forwarded_env = forwarded_env(&settings, lookup);
        let authenticator = authenticator(&settings, &forwarded_env);
        Self {
            settings,
            values,
            forwarded_env,
            authenticator,
        }
    }

    fn value(&self, name: &str) -> Result<&str, StepError> {
        self.values
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| StepError::Message(format!("setting `{name}` is not set")))
    }

    fn invocation(&self, argv: &[String]) -> Result<Invocation, StepError> {
        Ok(Invocation::from_argv(argv)?.envs(&self.forwarded_env))
    }

    pub fn credential_store(&self, identity: &ExecutionIdentity) -> CredentialStore {
        let primary = self
            .values
            .get(self.settings.credentials.primary_setting.as_str())
            .map(|value| Secret::new(value.as_str()));
        CredentialStore::for_identity(identity, &self.settings.credentials.dir, primary)
    }
}

fn forwarded_env(settings: &Settings, lookup: &dyn SettingsLookup) -> BTreeMap<String, String> {
    settings
        .forward_env
        .iter()
        .filter_map(|name| {
            lookup
                .get(name.as_str())
                .map(|value| (name.as_str().to_string(), value))
        })
        .collect()
}

fn step_name(raw: &'static str) -> StepName {
    StepName::from_static(raw)
}

pub fn build_plan(inputs: PlanInputs) -> StepRunner {
    let inputs = Rc::new(inputs);
    let mut runner = StepRunner::new();

    let ctx = Rc::clone(&inputs);
    runner.register(
        step_name("system-packages"),
        "install system packages",
        StepScope::System,
        move |identity| install_packages(&ctx, identity),
    );

    let ctx = Rc::clone(&inputs);
    runner.register(
        step_name("git-identity"),
        "configure git identity",
        StepScope::User,
        move |identity| configure_git_identity(&ctx, identity),
    );

    let ctx = Rc::clone(&inputs);
    runner.register(
        step_name("credentials"),
        "configure GitHub credentials",
        StepScope::User,
        move |identity| configure_credentials(&ctx, identity),
    );

    let ctx = Rc::clone(&inputs);
    runner.register(
        step_name("user-tools"),
        "install user tools",
        StepScope::User,
        move |identity| install_tools(&ctx, identity),
    );

    let ctx = Rc::clone(&inputs);
    runner.register(
        step_name("tool-config"),
        "reconcile tool configuration",
        StepScope::User,
        move |identity| reconcile_tool_config(&ctx, identity),
    );

    let ctx = inputs;
    runner.register(
        step_name("shell-profile"),
        "add shell profile helpers",
        StepScope::User,
        move |identity| ensure_shell_profile(&ctx, identity),
    );

    runner
}

fn install_packages(inputs: &PlanInputs, identity: &ExecutionIdentity) -> Result<StepOutcome, StepError> {
    let packages = &inputs.settings.packages;
    if packages.names.is_empty() {
        return Ok(StepOutcome::Unchanged);
    }

    if !packages.check.is_empty() {
        let check = inputs
            .invocation(&packages.check)?
            .args(packages.names.iter().cloned());
        match run_privileged(identity, &check) {
            Ok(_) => return Ok(StepOutcome::Unchanged),
            Err(PrivilegeError::CommandFailed { .. }) => {}
            Err(err) => return Err(err.into()),
        }
    }

    let install = inputs
        .invocation(&packages.install)?
        .envs(&packages.env)
        .args(packages.names.iter().cloned());
    run_privileged(identity, &install)?;
    Ok(StepOutcome::Changed)
}

fn git_config_value(identity: &ExecutionIdentity, key: &str, env: &BTreeMap<String, String>) -> Result<Option<String>, StepError> {
    let query = Invocation::new("git")
        .args(["config", "--global", "--get", key])
        .envs(env);
    let output: CommandOutput = probe_as(identity, &query)?;
    Ok(output
        .success
        .then(|| output.stdout.trim().to_string())
        .filter(|value| !value.is_empty()))
}

fn configure_git_identity(
    inputs: &PlanInputs,
    identity: &ExecutionIdentity,
) -> Result<StepOutcome, StepError> {
    let git = &inputs.settings.git;
    let desired = [
        ("user.name", inputs.value(git.name_setting.as_str())?),
        ("user.email", inputs.value(git.email_setting.as_str())?),
    ];

    let mut changed = false;
    for (key, value) in desired {
        if git_config_value(identity, key, &inputs.forwarded_env)?.as_deref() == Some(value) {
            continue;
        }
        let set = Invocation::new("git")
            .args(["config", "--global", key, value])
            .envs(&inputs.forwarded_env);
        run_as(identity, &set)?;
        tracing::info!(key, "updated git config");
        changed = true;
    }
    Ok(StepOutcome::from_changed(changed))
}

fn configure_credentials(
    inputs: &PlanInputs,
    identity: &ExecutionIdentity,
) -> Result<StepOutcome, StepError> {
    let store = inputs.credential_store(identity);
    let mut changed = store.activate(PRIMARY_SLOT, inputs.authenticator.as_ref(), identity)?
        == ActivationOutcome::Activated;

    let secondary = inputs
        .settings
        .secondary_credentials_setting
        .as_ref()
        .and_then(|name| inputs.values.get(name.as_str()))
        .map(|raw| split_credential_list(raw))
        .unwrap_or_default();
    for (offset, secret) in secondary.iter().enumerate() {
        let slot = PRIMARY_SLOT + 1 + offset as u32;
        if store.store_secondary(slot, secret)? == StoreOutcome::Created {
            changed = true;
        }
    }
    Ok(StepOutcome::from_changed(changed))
}

/// A check command that is not on the search path yet means "not installed".
fn tool_available(identity: &ExecutionIdentity, check: &Invocation) -> Result<bool, StepError> {
    match probe_as(identity, check) {
        Ok(output) => Ok(output.success),
        Err(PrivilegeError::MissingBinary { .. }) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

fn install_tool(
    inputs: &PlanInputs,
    identity: &ExecutionIdentity,
    tool: &ToolConfig,
) -> Result<bool, StepError> {
    let check = inputs.invocation(&tool.check)?;
    if tool_available(identity, &check)? {
        tracing::debug!(tool = %tool.name, "already installed");
        return Ok(false);
    }

    tracing::info!(tool = %tool.name, "installing");
    run_as(identity, &inputs.invocation(&tool.install)?)?;
    if !tool_available(identity, &check)? {
        return Err(StepError::Message(format!(
            "tool `{}` is still unavailable after install (`{}` failed)",
            tool.name,
            check.command_form()
        )));
    }
    Ok(true)
}

fn install_tools(inputs: &PlanInputs, identity: &ExecutionIdentity) -> Result<StepOutcome, StepError> {
    let mut changed = false;
    for tool in &inputs.settings.tools {
        changed |= install_tool(inputs, identity, tool)?;
    }
    Ok(StepOutcome::from_changed(changed))
}

pub fn tool_config_patch(inputs: &PlanInputs) -> Result<ConfigPatch, StepError> {
    let document = &inputs.settings.tool_config;
    let mut patch = ConfigPatch::new();
    for entry in &document.values {
        let path = KeyPath::parse(&entry.key).map_err(StepError::Message)?;
        let value = match (&entry.from_setting, &entry.value) {
            (Some(name), _) => Value::from(inputs.value(name.as_str())?),
            (None, Some(value)) => value.clone(),
            (None, None) => {
                return Err(StepError::Message(format!(
                    "tool config key `{}` has no value",
                    entry.key
                )))
            }
        };
        patch = patch.set(path, value);
    }
    for collection in &document.collections {
        let path = KeyPath::parse(&collection.key).map_err(StepError::Message)?;
        for element in &collection.entries {
            patch = patch.upsert(path.clone(), collection.id_field.clone(), element.clone());
        }
    }
    Ok(patch)
}

fn reconcile_tool_config(
    inputs: &PlanInputs,
    identity: &ExecutionIdentity,
) -> Result<StepOutcome, StepError> {
    let patch = tool_config_patch(inputs)?;
    let path = identity.home_path(&inputs.settings.tool_config.path);
    let changed = ConfigReconciler::new(identity.file_owner()).reconcile(&path, &patch)?;
    Ok(StepOutcome::from_changed(changed))
}

fn ensure_shell_profile(
    inputs: &PlanInputs,
    identity: &ExecutionIdentity,
) -> Result<StepOutcome, StepError> {
    let profile = &inputs.settings.profile;
    let changed = ensure_profile_block(
        &identity.home_path(&profile.path),
        &profile.marker,
        &profile.content,
        identity.file_owner().as_ref(),
    )?;
    Ok(StepOutcome::from_changed(changed))
}

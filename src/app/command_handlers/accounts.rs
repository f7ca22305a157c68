use crate::app::cli::CliOptions;
use crate::app::command_support::{load_cli_settings, plan_inputs, resolve_process_identity};
use crate::credentials::{ActivationOutcome, Secret};
use crate::environment::ProcessEnvironment;

pub fn cmd_accounts(options: &CliOptions) -> Result<String, String> {
    let settings = load_cli_settings(options)?;
    let identity = resolve_process_identity(&settings).map_err(|err| err.to_string())?;
    let inputs = plan_inputs(settings, &ProcessEnvironment);
    let store = inputs.credential_store(&identity);

    let active: Option<Secret> = match inputs.authenticator.active_secret(&identity) {
        Ok(active) => active,
        Err(err) => {
            tracing::warn!(error = %err, "could not determine the active credential");
            None
        }
    };

    let slots = store.list_slots().map_err(|err| err.to_string())?;
    let mut lines = Vec::with_capacity(slots.len());
    for slot in slots {
        let secret = store.resolve(slot).ok();
        let marker = match (&secret, &active) {
            (Some(secret), Some(active)) if secret == active => "*",
            _ => " ",
        };
        let source = match store.record(slot).storage_path {
            Some(path) => path.display().to_string(),
            None => format!("${}", inputs.settings.credentials.primary_setting),
        };
        let state = if secret.is_some() { "" } else { " (missing)" };
        lines.push(format!("{marker} slot {slot}  {source}{state}"));
    }
    Ok(lines.join("\n"))
}

pub fn cmd_switch(options: &CliOptions, args: &[String]) -> Result<String, String> {
    let [raw] = args else {
        return Err("usage: devprov switch <slot>".to_string());
    };
    let slot = raw
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|slot| *slot > 0)
        .ok_or_else(|| format!("invalid slot `{raw}`: expected a positive integer"))?;

    let settings = load_cli_settings(options)?;
    let identity = resolve_process_identity(&settings).map_err(|err| err.to_string())?;
    let inputs = plan_inputs(settings, &ProcessEnvironment);
    let store = inputs.credential_store(&identity);

    match store
        .activate(slot, inputs.authenticator.as_ref(), &identity)
        .map_err(|err| err.to_string())?
    {
        ActivationOutcome::Activated => Ok(format!("switched to slot {slot}")),
        ActivationOutcome::AlreadyActive => Ok(format!("slot {slot} is already active")),
    }
}

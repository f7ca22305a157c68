use crate::app::cli::CliOptions;
use crate::config::{load_settings, ConfigError, Settings};
use crate::environment::SettingsLookup;
use crate::privilege::{
    resolve, ExecutionIdentity, PrivilegeError, PrivilegeProbe, SystemUserDirectory,
};
use crate::steps::PlanInputs;

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

pub fn load_cli_settings(options: &CliOptions) -> Result<Settings, String> {
    load_settings(options.settings_path.clone()).map_err(map_config_err)
}

pub fn resolve_process_identity(settings: &Settings) -> Result<ExecutionIdentity, PrivilegeError> {
    resolve(
        &PrivilegeProbe::from_process(),
        &SystemUserDirectory,
        &settings.extra_path,
    )
}

pub(crate) fn plan_inputs(settings: Settings, lookup: &dyn SettingsLookup) -> PlanInputs {
    PlanInputs::from_lookup(settings, lookup)
}


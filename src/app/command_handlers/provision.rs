use crate::app::cli::CliOptions;
use crate::app::command_support::{load_cli_settings, plan_inputs, resolve_process_identity};
use crate::environment::ProcessEnvironment;
use crate::steps::{build_plan, StepScope};

pub fn cmd_provision(options: &CliOptions, args: &[String]) -> Result<String, String> {
    if !args.is_empty() {
        return Err("usage: devprov [--settings PATH] provision".to_string());
    }
    let settings = load_cli_settings(options)?;
    let spec = settings.environment_spec();
    let lookup = ProcessEnvironment;
    let identity_settings = settings.clone();
    let runner = build_plan(plan_inputs(settings, &lookup));

    match runner.run_with(&spec, &lookup, || resolve_process_identity(&identity_settings)) {
        Ok(summary) => Ok(summary.render()),
        Err(err) => {
            let mut message = err.to_string();
            if let Some(report) = runner.abort_report() {
                message.push('\n');
                message.push_str(&report);
            }
            Err(message)
        }
    }
}

pub fn cmd_steps(options: &CliOptions) -> Result<String, String> {
    let settings = load_cli_settings(options)?;
    let runner = build_plan(plan_inputs(settings, &ProcessEnvironment));
    let lines: Vec<String> = runner
        .steps()
        .iter()
        .map(|step| {
            let scope = match step.scope {
                StepScope::System => "system",
                StepScope::User => "user",
            };
            format!(
                "{}. {:<16} [{scope}] {}",
                step.ordinal,
                step.name.as_str(),
                step.description
            )
        })
        .collect();
    Ok(lines.join("\n"))
}
